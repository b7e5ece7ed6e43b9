//! Resolution graph
//!
//! A [`ResolutionGraph`] records how one resolvable (its *target*) is
//! resolved: which strategies, models and sub-observations contribute, and
//! how much of the target scale each of them covers. Resolution builds a
//! fresh child graph for every step with [`ResolutionGraph::create_child`]
//! and folds successful children back into their parent with
//! [`ResolutionGraph::merge`]; failed children are simply dropped.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. A node is stored
//! once per [`ResolvableKey`], so the same observable reached by two paths
//! is a single node with two incoming edges.

use crate::cache::{Available, AvailableCache};
use im::HashSet;
use indexmap::IndexMap;
use kres_knowledge::{
    Coverage, CoveragePolicy, CoverageStatus, KnowledgeError, LogicalConnector, Observable,
    Observation, Resolvable, ResolvableKey, ResourceSet, Scale,
};
use std::fmt;
use std::sync::Arc;

/// Index of a node in a graph's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// "Resolved by" edge: `source` is resolved by `target` for `coverage`
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub coverage: Coverage,
    /// Name the dependency is known by inside the source
    pub local_name: Option<String>,
}

/// Nodes, edges and resources of a resolution, detached from any session
#[derive(Debug, Clone, Default)]
pub struct GraphFragment {
    nodes: Vec<Resolvable>,
    edges: Vec<Edge>,
    resources: ResourceSet,
}

impl GraphFragment {
    #[must_use]
    pub fn nodes(&self) -> &[Resolvable] {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Graph of resolvables resolving a target over a scale
#[derive(Debug)]
pub struct ResolutionGraph {
    target: Option<NodeId>,
    scale: Scale,
    coverage: Coverage,
    nodes: Vec<Resolvable>,
    index: IndexMap<ResolvableKey, NodeId>,
    edges: Vec<Edge>,
    resources: ResourceSet,
    resolving: HashSet<ResolvableKey>,
    linked: HashSet<(String, ResolvableKey)>,
    depth: usize,
    policy: CoveragePolicy,
    cache: Arc<AvailableCache>,
}

impl ResolutionGraph {
    /// Root graph of a new resolution session
    ///
    /// The root has no target; resolution starts by creating a child of it.
    #[must_use]
    pub fn new(policy: CoveragePolicy) -> Self {
        let scale = Scale::scalar();
        Self {
            target: None,
            scale,
            coverage: Coverage::empty(&scale).with_policy(policy),
            nodes: Vec::new(),
            index: IndexMap::new(),
            edges: Vec::new(),
            resources: ResourceSet::native(),
            resolving: HashSet::new(),
            linked: HashSet::new(),
            depth: 0,
            policy,
            cache: Arc::new(AvailableCache::new()),
        }
    }

    /// A failed resolution
    ///
    /// Merging an empty graph anywhere is a no-op.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(CoveragePolicy::default())
    }

    /// Spawn a graph resolving `resolvable` over `scale`
    ///
    /// The child shares this graph's cache and policy and inherits its
    /// resolution path, extended with `resolvable`.
    #[must_use]
    pub fn create_child(&self, resolvable: Resolvable, scale: &Scale) -> Self {
        let key = resolvable.key();
        let coverage = resolvable.initial_coverage(scale).with_policy(self.policy);
        let mut index = IndexMap::new();
        index.insert(key.clone(), NodeId(0));
        Self {
            target: Some(NodeId(0)),
            scale: *scale,
            coverage,
            nodes: vec![resolvable],
            index,
            edges: Vec::new(),
            resources: ResourceSet::native(),
            resolving: self.resolving.update(key),
            linked: self.linked.clone(),
            depth: self.depth + 1,
            policy: self.policy,
            cache: Arc::clone(&self.cache),
        }
    }

    /// Spawn a graph pointing to an observation that is already resolved
    ///
    /// Its coverage is what the observation's geometry covers of `scale`.
    #[must_use]
    pub fn create_reference(&self, observation: Arc<Observation>, scale: &Scale) -> Self {
        let coverage = Coverage::of(scale, observation.geometry()).with_policy(self.policy);
        let mut child = self.create_child(Resolvable::Observation(observation), scale);
        child.coverage = coverage;
        child
    }

    /// Re-express this resolution's coverage over `scale`
    ///
    /// Used when a step was resolved over a different extent than its
    /// parent's, e.g. collectives resolved in the observer's extent. The
    /// fraction becomes the share of `scale` covered by ours, times our own
    /// fraction.
    #[must_use]
    pub fn rebase(mut self, scale: &Scale) -> Self {
        if self.scale.signature() == scale.signature() || self.target.is_none() {
            return self;
        }
        let fraction = (self.coverage.fraction() * scale.covered_fraction(Some(&self.scale))).clamp(0.0, 1.0);
        self.coverage = Coverage::new(scale, fraction)
            .unwrap_or_else(|_| Coverage::empty(scale))
            .with_policy(self.policy);
        self.scale = *scale;
        self
    }

    /// The resolvable this graph resolves
    #[must_use]
    pub fn target(&self) -> Option<&Resolvable> {
        self.target.and_then(|id| self.node(id))
    }

    #[inline]
    #[must_use]
    pub const fn target_id(&self) -> Option<NodeId> {
        self.target
    }

    #[inline]
    #[must_use]
    pub const fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Coverage of the target achieved so far
    #[inline]
    #[must_use]
    pub const fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    #[inline]
    #[must_use]
    pub const fn policy(&self) -> CoveragePolicy {
        self.policy
    }

    /// Number of resolution steps from the session root
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &AvailableCache {
        &self.cache
    }

    /// True if there is no target or nothing of it is covered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target.is_none() || self.coverage.is_empty()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.target.is_some() && self.coverage.is_complete()
    }

    /// True if `key` is on the resolution path leading to this graph
    #[must_use]
    pub fn is_resolving(&self, key: &ResolvableKey) -> bool {
        self.resolving.contains(key)
    }

    fn connector(&self) -> LogicalConnector {
        self.target()
            .map_or(LogicalConnector::Union, Resolvable::connector)
    }

    /// Classify what merging `child` would do to this graph's coverage
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] if the child covers a
    /// different scale.
    pub fn check_coverage(&self, child: &Self) -> Result<CoverageStatus, KnowledgeError> {
        if child.is_empty() {
            return Ok(CoverageStatus::Empty);
        }
        self.coverage.classify(&child.coverage, self.connector())
    }

    /// Fold a successful child resolution into this graph
    ///
    /// Adds the child's nodes, edges and resources, links our target to the
    /// child's target and merges the child's coverage using the target's
    /// connector. Empty children are ignored.
    ///
    /// # Returns
    /// True if our coverage is complete after the merge
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] on mismatched scales.
    pub fn merge(&mut self, child: Self, local_name: Option<&str>) -> Result<bool, KnowledgeError> {
        if child.is_empty() {
            return Ok(self.is_complete());
        }
        let coverage = self.coverage.merge(&child.coverage, self.connector())?;
        self.absorb(child, local_name);
        self.coverage = coverage;
        Ok(self.is_complete())
    }

    /// Fold several alternative resolutions of one requirement
    ///
    /// The alternatives' coverages are united among themselves first; the
    /// union is then merged with the target's connector. Empty children are
    /// ignored; if all are empty nothing changes.
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] on mismatched scales.
    pub fn merge_alternatives(&mut self, children: Vec<Self>) -> Result<bool, KnowledgeError> {
        let children: Vec<Self> = children.into_iter().filter(|c| !c.is_empty()).collect();
        if children.is_empty() {
            return Ok(self.is_complete());
        }
        let mut united = Coverage::empty(&self.scale).with_policy(self.policy);
        for child in &children {
            united = united.merge(&child.coverage, LogicalConnector::Union)?;
        }
        let coverage = self.coverage.merge(&united, self.connector())?;
        for child in children {
            self.absorb(child, None);
        }
        self.coverage = coverage;
        Ok(self.is_complete())
    }

    /// Attach a cached contributor to the target with `coverage`
    ///
    /// The contributor's own resolution is copied in, so that compiling
    /// this graph does not depend on the cache. Children created afterwards
    /// remember the link, see [`ResolutionGraph::is_linked`].
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] on mismatched scales.
    pub fn link(&mut self, available: &Available, coverage: &Coverage) -> Result<bool, KnowledgeError> {
        let merged = self.coverage.merge(coverage, self.connector())?;
        self.absorb_fragment(available.fragment());
        let linked = self.intern(available.resolvable());
        if let Some(source) = self.target {
            self.add_edge(source, linked, coverage.clone(), None);
        }
        let entry = self
            .target()
            .map(|target| (target.urn().to_owned(), available.resolvable().key()));
        if let Some(entry) = entry {
            self.linked.insert(entry);
        }
        self.coverage = merged;
        Ok(self.is_complete())
    }

    /// True if `key` was linked from the cache for `observable` on the way
    /// to this graph
    ///
    /// A linked contributor already counts toward the coverage of
    /// `observable` and must not be counted again.
    #[must_use]
    pub fn is_linked(&self, observable: &Observable, key: &ResolvableKey) -> bool {
        self.linked.contains(&(observable.urn().to_owned(), key.clone()))
    }

    /// Cached contributors for `observable` worth linking over `scale`,
    /// best first
    #[must_use]
    pub fn get_resolving(&self, observable: &Observable, scale: &Scale) -> Vec<(Available, Coverage)> {
        self.cache
            .resolving(observable, scale, self.policy.min_relevant_gain)
            .into_iter()
            .map(|(available, coverage)| (available, coverage.with_policy(self.policy)))
            .collect()
    }

    /// Register `resolved` as a contributor for `observable` in the
    /// session cache
    ///
    /// Only non-empty resolutions with a target are registered.
    ///
    /// # Returns
    /// True if the cache stored it
    pub fn accept(&self, observable: &Observable, resolved: &Self, priority: f64) -> bool {
        let Some(resolvable) = resolved.target().cloned() else {
            return false;
        };
        if resolved.is_empty() {
            return false;
        }
        let extent = match resolvable.as_model().and_then(|m| m.coverage()) {
            Some(native) => native.intersection(&resolved.scale).unwrap_or(resolved.scale),
            None => resolved.scale,
        };
        self.cache.accept(
            observable,
            Available::new(resolvable, extent, priority, Arc::new(resolved.snapshot())),
        )
    }

    /// Record resources the runtime needs for this resolution
    pub fn add_resources(&mut self, resources: &ResourceSet) {
        self.resources.merge(resources);
    }

    /// Resources collected from every merged resolution
    #[inline]
    #[must_use]
    pub const fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Resolvable> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub fn node_id(&self, key: &ResolvableKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Resolvable)> {
        self.nodes.iter().enumerate().map(|(i, r)| (NodeId(i), r))
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving `id`, in the order they were added
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Nodes without incoming edges
    #[must_use]
    pub fn root_nodes(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| !self.edges.iter().any(|e| e.target == *id))
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Detached copy of nodes, edges and resources
    #[must_use]
    pub fn snapshot(&self) -> GraphFragment {
        GraphFragment {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            resources: self.resources.clone(),
        }
    }

    fn intern(&mut self, resolvable: &Resolvable) -> NodeId {
        let key = resolvable.key();
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(resolvable.clone());
        self.index.insert(key, id);
        id
    }

    fn add_edge(&mut self, source: NodeId, target: NodeId, coverage: Coverage, local_name: Option<String>) {
        if source == target
            || self
                .edges
                .iter()
                .any(|e| e.source == source && e.target == target)
        {
            return;
        }
        self.edges.push(Edge {
            source,
            target,
            coverage,
            local_name,
        });
    }

    fn absorb_fragment(&mut self, fragment: &GraphFragment) -> Vec<NodeId> {
        let ids: Vec<NodeId> = fragment.nodes.iter().map(|r| self.intern(r)).collect();
        for edge in &fragment.edges {
            self.add_edge(
                ids[edge.source.0],
                ids[edge.target.0],
                edge.coverage.clone(),
                edge.local_name.clone(),
            );
        }
        self.resources.merge(&fragment.resources);
        ids
    }

    fn absorb(&mut self, child: Self, local_name: Option<&str>) {
        let fragment = GraphFragment {
            nodes: child.nodes,
            edges: child.edges,
            resources: child.resources,
        };
        let ids = self.absorb_fragment(&fragment);
        if let (Some(source), Some(target)) = (self.target, child.target) {
            self.add_edge(source, ids[target.0], child.coverage, local_name.map(str::to_owned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kres_knowledge::{Envelope, Model, ObservationStrategy, SemanticType};

    fn scale() -> Scale {
        Scale::spatial(Envelope::new(0.0, 0.0, 10.0, 10.0).unwrap())
    }

    fn part(min_x: f64, max_x: f64) -> Scale {
        Scale::spatial(Envelope::new(min_x, 0.0, max_x, 10.0).unwrap())
    }

    fn elevation() -> Observable {
        Observable::new("geo:Elevation", SemanticType::Quality)
    }

    fn observation_graph(root: &ResolutionGraph) -> ResolutionGraph {
        root.create_child(Observation::new(elevation(), Some(scale())).into(), &scale())
    }

    #[test]
    fn child_inherits_path() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let obs = observation_graph(&root);
        let strategy = obs.create_child(ObservationStrategy::new("s1", vec![]).into(), &scale());

        assert!(strategy.is_resolving(&ResolvableKey::Observable("geo:Elevation".into())));
        assert!(strategy.is_resolving(&ResolvableKey::Strategy("s1".into())));
        assert!(!obs.is_resolving(&ResolvableKey::Strategy("s1".into())));
        assert_eq!(strategy.depth(), 2);
    }

    #[test]
    fn observations_accumulate_by_union() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let mut obs = observation_graph(&root);
        assert!(obs.is_empty());

        let m1 = obs.create_child(Model::new("m1", elevation()).with_coverage(part(0.0, 6.0)).into(), &scale());
        let m2 = obs.create_child(Model::new("m2", elevation()).with_coverage(part(5.0, 10.0)).into(), &scale());

        assert_eq!(obs.check_coverage(&m1).unwrap(), CoverageStatus::Relevant);
        assert!(!obs.merge(m1, None).unwrap());
        assert_eq!(obs.check_coverage(&m2).unwrap(), CoverageStatus::Complete);
        assert!(obs.merge(m2, None).unwrap());

        let target = obs.target_id().unwrap();
        assert_eq!(obs.outgoing(target).count(), 2);
        assert_eq!(obs.root_nodes(), vec![target]);
    }

    #[test]
    fn merging_empty_is_noop() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let mut obs = observation_graph(&root);
        let before = obs.coverage().clone();

        assert!(!obs.merge(ResolutionGraph::empty(), None).unwrap());
        assert_eq!(obs.coverage(), &before);
        assert_eq!(obs.node_count(), 1);
        assert_eq!(obs.check_coverage(&ResolutionGraph::empty()).unwrap(), CoverageStatus::Empty);
    }

    #[test]
    fn model_dependencies_intersect() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let obs = observation_graph(&root);
        let slope = Observable::new("geo:Slope", SemanticType::Quality);
        let mut model = obs.create_child(Model::new("m", slope).with_dependency(elevation()).into(), &scale());
        assert!(model.is_complete());

        let mut dep = model.create_child(Observation::new(elevation(), None).into(), &scale());
        let provider = dep.create_child(Model::new("half", elevation()).with_coverage(part(0.0, 5.0)).into(), &scale());
        dep.merge(provider, None).unwrap();

        model.merge(dep, Some("elevation")).unwrap();
        assert!((model.coverage().fraction() - 0.5).abs() < 1e-12);
        let edge = model.outgoing(model.target_id().unwrap()).next().unwrap();
        assert_eq!(edge.local_name.as_deref(), Some("elevation"));
    }

    #[test]
    fn alternatives_are_united_before_merging() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let obs = observation_graph(&root);
        let mut strategy = obs.create_child(ObservationStrategy::new("s", vec![]).into(), &scale());

        let a = strategy.create_child(Model::new("a", elevation()).with_coverage(part(0.0, 6.0)).into(), &scale());
        let b = strategy.create_child(Model::new("b", elevation()).with_coverage(part(5.0, 10.0)).into(), &scale());

        assert!(strategy.merge_alternatives(vec![a, b]).unwrap());
        assert_eq!(strategy.outgoing(strategy.target_id().unwrap()).count(), 2);
    }

    #[test]
    fn accepted_resolution_can_be_linked() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let mut obs = observation_graph(&root);
        let model = obs.create_child(Model::new("m", elevation()).into(), &scale());
        assert!(obs.accept(&elevation(), &model, 1.0));
        obs.merge(model, None).unwrap();

        let mut again = root.create_child(Observation::new(elevation(), None).into(), &scale());
        let cached = again.get_resolving(&elevation(), &scale());
        assert_eq!(cached.len(), 1);

        let (available, coverage) = &cached[0];
        assert!(again.link(available, coverage).unwrap());
        let target = again.target_id().unwrap();
        let linked: Vec<_> = again
            .outgoing(target)
            .filter_map(|e| again.node(e.target))
            .map(Resolvable::urn)
            .collect();
        assert_eq!(linked, vec!["m"]);

        let strategy = again.create_child(ObservationStrategy::new("s", vec![]).into(), &scale());
        let key = ResolvableKey::Model("m".into());
        assert!(strategy.is_linked(&elevation(), &key));
        assert!(!strategy.is_linked(&Observable::new("geo:Slope", SemanticType::Quality), &key));
        assert!(!obs.is_linked(&elevation(), &key));
    }

    proptest::proptest! {
        #[test]
        fn observation_coverage_never_decreases(widths in proptest::collection::vec(0.0f64..10.0, 1..8)) {
            let root = ResolutionGraph::new(CoveragePolicy::default());
            let mut obs = observation_graph(&root);
            let mut last = 0.0;
            for (i, w) in widths.into_iter().enumerate() {
                let model = Model::new(format!("m{i}"), elevation()).with_coverage(part(0.0, w.max(0.01)));
                let child = obs.create_child(model.into(), &scale());
                obs.merge(child, None).unwrap();
                proptest::prop_assert!(obs.coverage().fraction() >= last);
                last = obs.coverage().fraction();
            }
        }
    }

    #[test]
    fn references_cover_their_geometry() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let known = Arc::new(Observation::new(elevation(), Some(part(0.0, 5.0))).resolved());
        let reference = root.create_reference(known, &scale());
        assert!((reference.coverage().fraction() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rebase_scales_coverage() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let wide = Scale::spatial(Envelope::new(0.0, 0.0, 20.0, 10.0).unwrap());
        let obs = root.create_child(Observation::new(elevation(), None).into(), &part(0.0, 5.0));
        let model = obs.create_child(Model::new("m", elevation()).into(), &part(0.0, 5.0));

        // fully covers the left half of the requested scale
        let rebased = model.rebase(&scale());
        assert_eq!(rebased.scale(), &scale());
        assert!((rebased.coverage().fraction() - 0.5).abs() < 1e-12);

        let covering = obs.create_child(Model::new("w", elevation()).into(), &wide).rebase(&scale());
        assert!(covering.is_complete());
    }

    #[test]
    fn mismatched_scales_are_errors() {
        let root = ResolutionGraph::new(CoveragePolicy::default());
        let mut obs = observation_graph(&root);
        let model = obs.create_child(Model::new("m", elevation()).into(), &part(0.0, 5.0));
        assert!(obs.merge(model, None).is_err());
    }
}
