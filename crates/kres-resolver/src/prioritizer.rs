//! Candidate ranking
//!
//! Models and strategies are ordered by a list of criteria, compared one
//! after the other, best value first. Which criteria apply and in which
//! order comes from a ranking string such as
//! `"lexical-scope 1 priority 2 evidence 3"`; a weight of 0 disables a
//! criterion.

use crate::error::ResolverError;
use crate::scope::ContextScope;
use dashmap::DashMap;
use kres_knowledge::{
    ContextualizableKind, Model, Observable, ObservationStrategy, OperationKind, Scale,
    ScaleSignature,
};
use std::cmp::Ordering;

/// One ranking criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// Closeness of the candidate's namespace/project to the scope's
    LexicalScope,
    /// Declared rank
    Priority,
    /// How directly the candidate produces the observable
    SemanticConcordance,
    /// Data-backed and dependency-free candidates first
    Evidence,
    /// Fraction of the scale the candidate covers
    ScaleCoverage,
    /// How much of the candidate's own coverage the scale uses
    ScaleSpecificity,
}

impl Criterion {
    fn from_name(name: &str) -> Option<Self> {
        match name.strip_prefix("im:").unwrap_or(name) {
            "lexical-scope" => Some(Self::LexicalScope),
            "priority" => Some(Self::Priority),
            "semantic-concordance" => Some(Self::SemanticConcordance),
            "evidence" => Some(Self::Evidence),
            "scale-coverage" => Some(Self::ScaleCoverage),
            "scale-specificity" => Some(Self::ScaleSpecificity),
            _ => None,
        }
    }
}

/// Ordered list of active criteria
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingStrategy {
    criteria: Vec<Criterion>,
}

impl RankingStrategy {
    /// Parse `"<criterion> <weight> ..."`
    ///
    /// Criteria are applied in increasing weight order. Unknown criteria
    /// are ignored.
    ///
    /// # Errors
    /// Returns [`ResolverError::Config`] if a criterion has no weight or
    /// the weight is not a non-negative integer.
    pub fn parse(text: &str) -> Result<Self, ResolverError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut weighted = Vec::new();
        for pair in tokens.chunks(2) {
            let [name, weight] = pair else {
                return Err(ResolverError::Config(format!(
                    "ranking criterion {} has no weight",
                    pair[0]
                )));
            };
            let weight: u32 = weight.parse().map_err(|_| {
                ResolverError::Config(format!("invalid weight {weight} for ranking criterion {name}"))
            })?;
            match Criterion::from_name(name) {
                Some(_) if weight == 0 => {}
                Some(criterion) => weighted.push((weight, criterion)),
                None => tracing::debug!("Ignoring unknown ranking criterion {}", name),
            }
        }
        weighted.sort_by_key(|(weight, _)| *weight);
        Ok(Self {
            criteria: weighted.into_iter().map(|(_, c)| c).collect(),
        })
    }

    #[inline]
    #[must_use]
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Order two candidates' criteria, better first
    #[must_use]
    pub fn compare(&self, a: &RankingCriteria, b: &RankingCriteria) -> Ordering {
        self.criteria
            .iter()
            .map(|c| b.get(*c).total_cmp(&a.get(*c)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Criterion values of one candidate, each in [0, 100] except priority
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RankingCriteria {
    pub lexical_scope: f64,
    pub priority: f64,
    pub semantic_concordance: f64,
    pub evidence: f64,
    pub scale_coverage: f64,
    pub scale_specificity: f64,
}

impl RankingCriteria {
    #[must_use]
    pub const fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::LexicalScope => self.lexical_scope,
            Criterion::Priority => self.priority,
            Criterion::SemanticConcordance => self.semantic_concordance,
            Criterion::Evidence => self.evidence,
            Criterion::ScaleCoverage => self.scale_coverage,
            Criterion::ScaleSpecificity => self.scale_specificity,
        }
    }
}

/// What the prioritizer needs to know about a candidate
pub trait Rankable {
    fn urn(&self) -> &str;
    fn rank(&self) -> i32;
    fn namespace(&self) -> &str;
    fn project(&self) -> &str;
    /// 100 if it directly produces `observable`, lower for indirect matches
    fn concordance(&self, observable: &Observable) -> f64;
    fn native_coverage(&self) -> Option<&Scale>;
    fn dependency_count(&self) -> usize;
    /// True if it reads data rather than computing from other observations
    fn is_data_backed(&self) -> bool;
}

impl Rankable for Model {
    fn urn(&self) -> &str {
        Self::urn(self)
    }

    fn rank(&self) -> i32 {
        Self::rank(self)
    }

    fn namespace(&self) -> &str {
        Self::namespace(self)
    }

    fn project(&self) -> &str {
        Self::project(self)
    }

    fn concordance(&self, observable: &Observable) -> f64 {
        match self.observables().iter().position(|o| o.urn() == observable.urn()) {
            Some(0) => 100.0,
            Some(_) => 50.0,
            None => 0.0,
        }
    }

    fn native_coverage(&self) -> Option<&Scale> {
        self.coverage()
    }

    fn dependency_count(&self) -> usize {
        self.dependencies().len()
    }

    fn is_data_backed(&self) -> bool {
        self.computation()
            .iter()
            .any(|c| matches!(c.kind(), ContextualizableKind::ResourceUrns(_)))
    }
}

impl Rankable for ObservationStrategy {
    fn urn(&self) -> &str {
        Self::urn(self)
    }

    fn rank(&self) -> i32 {
        Self::rank(self)
    }

    fn namespace(&self) -> &str {
        Self::namespace(self)
    }

    fn project(&self) -> &str {
        ""
    }

    fn concordance(&self, observable: &Observable) -> f64 {
        let observes = self.operations().iter().any(|op| {
            op.kind() == OperationKind::Observe && op.observable().is_some_and(|o| o.urn() == observable.urn())
        });
        if observes {
            100.0
        } else {
            50.0
        }
    }

    fn native_coverage(&self) -> Option<&Scale> {
        None
    }

    fn dependency_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| op.kind() == OperationKind::Resolve)
            .count()
    }

    fn is_data_backed(&self) -> bool {
        self.operations().iter().any(|op| op.kind() == OperationKind::Observe)
    }
}

/// Everything computed criteria depend on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CriteriaKey {
    candidate: String,
    observable: String,
    scale: ScaleSignature,
    namespace: Option<String>,
    project: Option<String>,
    scenarios: Vec<String>,
}

impl CriteriaKey {
    fn new(candidate: &str, observable: &Observable, scope: &ContextScope, scale: &Scale) -> Self {
        Self {
            candidate: candidate.to_owned(),
            observable: observable.urn().to_owned(),
            scale: scale.signature(),
            namespace: scope.resolution_namespace().map(str::to_owned),
            project: scope.resolution_project().map(str::to_owned),
            scenarios: scope.scenarios().to_vec(),
        }
    }
}

/// Ranks candidates for one resolution session
///
/// Criteria are computed once per candidate, observable, scale and lexical
/// scope, and cached.
#[derive(Debug)]
pub struct Prioritizer {
    ranking: RankingStrategy,
    cache: DashMap<CriteriaKey, RankingCriteria>,
}

impl Prioritizer {
    #[must_use]
    pub fn new(ranking: RankingStrategy) -> Self {
        Self {
            ranking,
            cache: DashMap::new(),
        }
    }

    /// Criteria of `candidate` for resolving `observable` over `scale`
    pub fn compute_criteria<R: Rankable + ?Sized>(
        &self,
        candidate: &R,
        observable: &Observable,
        scope: &ContextScope,
        scale: &Scale,
    ) -> RankingCriteria {
        let key = CriteriaKey::new(candidate.urn(), observable, scope, scale);
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }

        let criteria = RankingCriteria {
            lexical_scope: lexical_scope(candidate, scope),
            priority: f64::from(candidate.rank()),
            semantic_concordance: candidate.concordance(observable),
            evidence: match (candidate.dependency_count(), candidate.is_data_backed()) {
                (0, true) => 100.0,
                (0, false) => 50.0,
                _ => 0.0,
            },
            scale_coverage: 100.0 * scale.covered_fraction(candidate.native_coverage()),
            scale_specificity: scale_specificity(scale, candidate.native_coverage()),
        };
        self.cache.insert(key, criteria);
        criteria
    }

    /// Order two candidates, better first; ties go to the smaller urn
    pub fn compare<R: Rankable>(
        &self,
        a: &R,
        b: &R,
        observable: &Observable,
        scope: &ContextScope,
        scale: &Scale,
    ) -> Ordering {
        let ca = self.compute_criteria(a, observable, scope, scale);
        let cb = self.compute_criteria(b, observable, scope, scale);
        self.ranking
            .compare(&ca, &cb)
            .then_with(|| a.urn().cmp(b.urn()))
    }

    /// Sort `candidates` best first; ties go to the smaller urn
    pub fn sort<R: Rankable>(
        &self,
        candidates: &mut Vec<R>,
        observable: &Observable,
        scope: &ContextScope,
        scale: &Scale,
    ) {
        self.sort_with(candidates, observable, scope, scale, |a, b| a.urn().cmp(b.urn()));
    }

    /// Sort `candidates` best first, keeping their given order among equals
    ///
    /// For candidates that arrive already ordered, like the reasoner's
    /// strategies.
    pub fn sort_stable<R: Rankable>(
        &self,
        candidates: &mut Vec<R>,
        observable: &Observable,
        scope: &ContextScope,
        scale: &Scale,
    ) {
        self.sort_with(candidates, observable, scope, scale, |_, _| Ordering::Equal);
    }

    fn sort_with<R, F>(
        &self,
        candidates: &mut Vec<R>,
        observable: &Observable,
        scope: &ContextScope,
        scale: &Scale,
        tie: F,
    ) where
        R: Rankable,
        F: Fn(&R, &R) -> Ordering,
    {
        let mut ranked: Vec<(RankingCriteria, R)> = candidates
            .drain(..)
            .map(|c| (self.compute_criteria(&c, observable, scope, scale), c))
            .collect();
        ranked.sort_by(|(ca, a), (cb, b)| self.ranking.compare(ca, cb).then_with(|| tie(a, b)));
        candidates.extend(ranked.into_iter().map(|(_, c)| c));
    }

    #[inline]
    #[must_use]
    pub fn ranking(&self) -> &RankingStrategy {
        &self.ranking
    }
}

fn lexical_scope<R: Rankable + ?Sized>(candidate: &R, scope: &ContextScope) -> f64 {
    let namespace = candidate.namespace();
    if namespace.is_empty() {
        return 0.0;
    }
    if scope.scenarios().iter().any(|s| s == namespace) {
        100.0
    } else if scope.resolution_namespace() == Some(namespace) {
        75.0
    } else if !candidate.project().is_empty() && scope.resolution_project() == Some(candidate.project()) {
        50.0
    } else {
        0.0
    }
}

fn scale_specificity(scale: &Scale, native: Option<&Scale>) -> f64 {
    let Some(native) = native else {
        return 0.0;
    };
    let total = native.measure();
    if total <= 0.0 {
        return 0.0;
    }
    scale
        .intersection(native)
        .map_or(0.0, |common| (100.0 * common.measure() / total).clamp(0.0, 100.0))
}
