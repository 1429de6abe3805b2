//! Caller-owned memoization of derived aggregates.
//!
//! Aggregation depends only on input content, so a result can be reused
//! as long as the underlying records did not change. The cache key is
//! the (issue ids, question id, region filter) signature of a request;
//! invalidation is explicit and tied to upstream data changes, per
//! issue.

use log::debug;

use std::collections::HashMap;

use crate::AnalyticsErrors;

/// Signature of one aggregation request. Ids are normalized (sorted,
/// deduplicated) so the key does not depend on the order the caller
/// listed them in.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct CacheKey {
    issue_ids: Vec<u64>,
    question_id: u64,
    region_ids: Vec<u64>,
}

impl CacheKey {
    pub fn new(issue_ids: &[u64], question_id: u64, region_ids: &[u64]) -> CacheKey {
        CacheKey {
            issue_ids: normalize(issue_ids),
            question_id,
            region_ids: normalize(region_ids),
        }
    }
}

fn normalize(ids: &[u64]) -> Vec<u64> {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

pub struct AggregateCache<V> {
    entries: HashMap<CacheKey, V>,
}

impl<V: Clone> AggregateCache<V> {
    pub fn new() -> AggregateCache<V> {
        AggregateCache {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&V> {
        self.entries.get(key)
    }

    /// Returns the memoized value for this key, computing and storing
    /// it on a miss. A failed computation is not cached.
    pub fn get_or_compute<F>(&mut self, key: CacheKey, compute: F) -> Result<V, AnalyticsErrors>
    where
        F: FnOnce() -> Result<V, AnalyticsErrors>,
    {
        if let Some(v) = self.entries.get(&key) {
            debug!("get_or_compute: hit for {:?}", key);
            return Ok(v.clone());
        }
        let v = compute()?;
        self.entries.insert(key, v.clone());
        Ok(v)
    }

    /// Drops every entry whose request touched this issue.
    pub fn invalidate_issue(&mut self, issue_id: u64) {
        self.entries
            .retain(|key, _| !key.issue_ids.contains(&issue_id));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for AggregateCache<V> {
    fn default() -> Self {
        AggregateCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_order_insensitive() {
        let a = CacheKey::new(&[3, 1, 2], 7, &[5, 4]);
        let b = CacheKey::new(&[1, 2, 3, 3], 7, &[4, 5]);
        assert_eq!(a, b);
    }

    #[test]
    fn memoizes_computed_values() {
        let mut cache: AggregateCache<u64> = AggregateCache::new();
        let key = CacheKey::new(&[1], 7, &[]);
        let mut calls = 0;
        let first = cache
            .get_or_compute(key.clone(), || {
                calls += 1;
                Ok(42)
            })
            .unwrap();
        let second = cache
            .get_or_compute(key, || {
                calls += 1;
                Ok(43)
            })
            .unwrap();
        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn failed_computations_are_not_cached() {
        let mut cache: AggregateCache<u64> = AggregateCache::new();
        let key = CacheKey::new(&[1], 7, &[]);
        let res = cache.get_or_compute(key.clone(), || {
            Err(AnalyticsErrors::UnknownIssue { issue_id: 1 })
        });
        assert!(res.is_err());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn invalidation_drops_only_touched_issues() {
        let mut cache: AggregateCache<u64> = AggregateCache::new();
        let touched = CacheKey::new(&[1, 2], 7, &[]);
        let untouched = CacheKey::new(&[3], 7, &[]);
        cache.get_or_compute(touched.clone(), || Ok(1)).unwrap();
        cache.get_or_compute(untouched.clone(), || Ok(2)).unwrap();
        cache.invalidate_issue(2);
        assert!(cache.get(&touched).is_none());
        assert_eq!(cache.get(&untouched), Some(&2));
    }
}
