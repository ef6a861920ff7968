use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;

/// Clone-out helpers for `DashMap`.
///
/// Each helper copies what it needs and drops the shard guard before
/// returning, so results may be held across `.await` points or passed to
/// event listeners that touch the same map.
pub trait DashMapExt<K, V> {
    /// Clone the value for `key`.
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone;

    /// Clone every value.
    fn values_cloned(&self) -> Vec<V>
    where
        V: Clone;

    /// Clone the first value whose entry satisfies `pred`.
    fn find_cloned<F>(&self, pred: F) -> Option<V>
    where
        F: Fn(&K, &V) -> bool,
        V: Clone;

    /// Clone the keys of every entry whose value satisfies `pred`.
    fn keys_where<F>(&self, pred: F) -> Vec<K>
    where
        F: Fn(&V) -> bool,
        K: Clone;
}

impl<K, V> DashMapExt<K, V> for DashMap<K, V>
where
    K: Eq + Hash,
{
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get(key).map(|r| r.value().clone())
    }

    fn values_cloned(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|e| e.value().clone()).collect()
    }

    fn find_cloned<F>(&self, pred: F) -> Option<V>
    where
        F: Fn(&K, &V) -> bool,
        V: Clone,
    {
        self.iter()
            .find(|e| pred(e.key(), e.value()))
            .map(|e| e.value().clone())
    }

    fn keys_where<F>(&self, pred: F) -> Vec<K>
    where
        F: Fn(&V) -> bool,
        K: Clone,
    {
        self.iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.key().clone())
            .collect()
    }
}
