//! Session-wide catalog of contributors that resolved an observable
//!
//! Once a model or an observation has been successfully used for an
//! observable over some scale, later resolutions of the same observable can
//! link it instead of searching again. The catalog is shared by every graph
//! of one resolution session and is safe to use from concurrent branches.

use crate::graph::GraphFragment;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kres_knowledge::{Coverage, Observable, Resolvable, Scale, ScaleSignature};
use std::sync::Arc;

/// Cache key: observable urn and the signature of the scale it was resolved in
pub type AvailableKey = (String, ScaleSignature);

/// A contributor that has resolved an observable
#[derive(Debug, Clone)]
pub struct Available {
    resolvable: Resolvable,
    extent: Scale,
    priority: f64,
    fragment: Arc<GraphFragment>,
}

impl Available {
    /// Create a catalog entry
    ///
    /// # Arguments
    /// * `resolvable` - The model or observation that did the resolving
    /// * `extent` - The scale it is known to cover
    /// * `priority` - Higher entries replace lower ones for the same key
    /// * `fragment` - The resolution subgraph hanging off `resolvable`
    #[must_use]
    pub fn new(resolvable: Resolvable, extent: Scale, priority: f64, fragment: Arc<GraphFragment>) -> Self {
        Self {
            resolvable,
            extent,
            priority,
            fragment,
        }
    }

    #[inline]
    #[must_use]
    pub const fn resolvable(&self) -> &Resolvable {
        &self.resolvable
    }

    #[inline]
    #[must_use]
    pub const fn extent(&self) -> &Scale {
        &self.extent
    }

    #[inline]
    #[must_use]
    pub const fn priority(&self) -> f64 {
        self.priority
    }

    #[inline]
    #[must_use]
    pub fn fragment(&self) -> &GraphFragment {
        &self.fragment
    }

    /// Coverage of `scale` this entry would contribute
    #[must_use]
    pub fn coverage_of(&self, scale: &Scale) -> Coverage {
        Coverage::of(scale, Some(&self.extent))
    }
}

/// Concurrent catalog keyed by (observable, scale)
#[derive(Debug, Default)]
pub struct AvailableCache {
    entries: DashMap<AvailableKey, Available>,
}

impl AvailableCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `available` for `observable`
    ///
    /// At most one entry is kept per (observable, scale); an existing entry
    /// is only replaced by one with strictly higher priority.
    ///
    /// # Returns
    /// True if the entry was stored
    pub fn accept(&self, observable: &Observable, available: Available) -> bool {
        let key = (observable.urn().to_owned(), available.extent.signature());
        match self.entries.entry(key) {
            Entry::Occupied(mut existing) => {
                if available.priority > existing.get().priority {
                    tracing::debug!(
                        "Replacing cached resolver of {} with {}",
                        observable,
                        available.resolvable
                    );
                    existing.insert(available);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                tracing::debug!("Caching {} as resolver of {}", available.resolvable, observable);
                slot.insert(available);
                true
            }
        }
    }

    /// Entries for `observable` covering `scale` by at least `min_fraction`,
    /// best coverage first
    #[must_use]
    pub fn resolving(&self, observable: &Observable, scale: &Scale, min_fraction: f64) -> Vec<(Available, Coverage)> {
        let mut found: Vec<(Available, Coverage)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == observable.urn())
            .filter_map(|entry| {
                let coverage = entry.value().coverage_of(scale);
                (coverage.fraction() >= min_fraction).then(|| (entry.value().clone(), coverage))
            })
            .collect();

        found.sort_by(|(a, ca), (b, cb)| {
            cb.fraction()
                .total_cmp(&ca.fraction())
                .then_with(|| b.priority.total_cmp(&a.priority))
                .then_with(|| a.resolvable.urn().cmp(b.resolvable.urn()))
        });

        if !found.is_empty() {
            tracing::trace!("Cache hit for {}: {} candidates", observable, found.len());
        }
        found
    }

    /// Number of cached entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
