use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::pattern::Pattern;

/// In-memory authoritative set of active patterns, mirrored to the store by
/// whoever drives a mutation (the forced-rollback handler). Readers get a
/// wait-free, always-coherent snapshot.
#[derive(Clone)]
pub struct PatternRegistry {
    inner: Arc<ArcSwap<HashSet<Pattern>>>,
}

impl PatternRegistry {
    pub fn new(initial: HashSet<Pattern>) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<HashSet<Pattern>> {
        self.inner.load_full()
    }

    pub fn contains(&self, pattern: &Pattern) -> bool {
        self.inner.load().contains(pattern)
    }

    pub fn overlaps(&self, pattern: &Pattern) -> bool {
        pattern.overlaps(&self.inner.load())
    }

    pub fn insert_many(&self, patterns: impl IntoIterator<Item = Pattern>) {
        let patterns: Vec<Pattern> = patterns.into_iter().collect();
        self.inner.rcu(|set| {
            let mut next = (**set).clone();
            next.extend(patterns.iter().cloned());
            next
        });
    }

    pub fn remove(&self, pattern: &Pattern) {
        self.inner.rcu(|set| {
            let mut next = (**set).clone();
            next.remove(pattern);
            next
        });
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new(HashSet::new())
    }
}
