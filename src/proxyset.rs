// src/proxyset.rs
//
// ProxySet (spec §4.6): an indexed set of proxy addresses supporting O(1)
// add/remove via swap-delete and uniform k-sampling without replacement.
// No direct corpus file covers this structure; it's built straight from the
// spec's invariant (index[addr] == i <=> data[i] == addr) in the teacher's
// plain-struct, no-unsafe style.

use std::collections::HashMap;

use rand::seq::index::sample;
use rand::Rng;

#[derive(Debug, Default)]
pub struct ProxySet {
    data: Vec<String>,
    index: HashMap<String, usize>,
}

impl ProxySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Insert `addr` if absent. No-op if already present.
    pub fn add(&mut self, addr: String) {
        if self.index.contains_key(&addr) {
            return;
        }
        let i = self.data.len();
        self.index.insert(addr.clone(), i);
        self.data.push(addr);
    }

    /// Remove `addr` if present via swap-delete with the last element.
    /// No-op if absent.
    pub fn del(&mut self, addr: &str) {
        let Some(i) = self.index.remove(addr) else {
            return;
        };
        let last = self.data.len() - 1;
        if i != last {
            self.data.swap(i, last);
            let moved = self.data[i].clone();
            self.index.insert(moved, i);
        }
        self.data.pop();
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.index.contains_key(addr)
    }

    /// Uniform sample of `k` distinct addresses without replacement. Returns
    /// fewer than `k` if the set holds fewer than `k` entries (spec §4.6).
    pub fn sample<R: Rng>(&self, rng: &mut R, k: usize) -> Vec<String> {
        let k = k.min(self.data.len());
        sample(rng, self.data.len(), k)
            .into_iter()
            .map(|i| self.data[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;
    use std::collections::HashSet;

    #[test]
    fn add_is_idempotent() {
        let mut set = ProxySet::new();
        set.add("1.1.1.1".into());
        set.add("1.1.1.1".into());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn del_is_idempotent_and_noop_when_absent() {
        let mut set = ProxySet::new();
        set.add("1.1.1.1".into());
        set.del("2.2.2.2".into());
        assert_eq!(set.len(), 1);
        set.del("1.1.1.1".into());
        set.del("1.1.1.1".into());
        assert_eq!(set.len(), 0);
        assert!(!set.contains("1.1.1.1"));
    }

    #[test]
    fn swap_delete_preserves_index_invariant() {
        let mut set = ProxySet::new();
        for addr in ["a", "b", "c", "d"] {
            set.add(addr.into());
        }
        set.del("b");
        assert_eq!(set.len(), 3);
        for (addr, &i) in set.index.iter() {
            assert_eq!(&set.data[i], addr);
        }
        assert!(!set.contains("b"));
        for addr in ["a", "c", "d"] {
            assert!(set.contains(addr));
        }
    }

    #[test]
    fn sample_is_unique_and_bounded_by_set_size() {
        let mut set = ProxySet::new();
        for addr in ["a", "b", "c"] {
            set.add(addr.into());
        }
        let mut rng = thread_rng();
        let sampled = set.sample(&mut rng, 10);
        assert_eq!(sampled.len(), 3);
        let unique: HashSet<_> = sampled.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn sample_k_within_bounds_returns_k_distinct() {
        let mut set = ProxySet::new();
        for addr in ["a", "b", "c", "d", "e"] {
            set.add(addr.into());
        }
        let mut rng = thread_rng();
        let sampled = set.sample(&mut rng, 2);
        assert_eq!(sampled.len(), 2);
        let unique: HashSet<_> = sampled.iter().collect();
        assert_eq!(unique.len(), 2);
    }
}
