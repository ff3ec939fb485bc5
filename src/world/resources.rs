use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::content::ResourceId;

/// Sparse resource amounts. An absent entry reads as zero through [`ResourceMap::get_or_zero`];
/// that equivalence is only relied upon for stored amounts and recipe tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceMap(BTreeMap<ResourceId, f64>);

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, res: &str) -> Option<f64> {
        self.0.get(res).copied()
    }

    pub fn get_or_zero(&self, res: &str) -> f64 {
        self.0.get(res).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, res: ResourceId, amount: f64) {
        self.0.insert(res, amount);
    }

    pub fn add(&mut self, res: &ResourceId, amount: f64) {
        match self.0.get_mut(res.as_str()) {
            Some(value) => *value += amount,
            None => {
                self.0.insert(res.clone(), amount);
            }
        }
    }

    /// Removes `amount`, clamping the stored value at zero.
    pub fn deduct(&mut self, res: &ResourceId, amount: f64) {
        let stored = self.get_or_zero(res.as_str());
        if stored + 1e-9 < amount {
            warn!(resource = %res, stored, amount, "not enough resource to deduct, clamping to zero");
            self.0.insert(res.clone(), 0.0);
        } else {
            self.0.insert(res.clone(), (stored - amount).max(0.0));
        }
    }

    pub fn remove(&mut self, res: &str) -> Option<f64> {
        self.0.remove(res)
    }

    pub fn contains(&self, res: &str) -> bool {
        self.0.contains_key(res)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceId> {
        self.0.keys()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// `true` when every entry of `required` is covered by this map.
    pub fn has_enough(&self, required: &ResourceMap) -> bool {
        required
            .iter()
            .all(|(res, amount)| self.get_or_zero(res.as_str()) >= amount)
    }

    pub fn add_all(&mut self, other: &ResourceMap) {
        for (res, amount) in other.iter() {
            self.add(res, amount);
        }
    }

    pub fn deduct_all(&mut self, other: &ResourceMap) {
        for (res, amount) in other.iter() {
            self.deduct(res, amount);
        }
    }

    pub fn filter(&self, mut keep: impl FnMut(&ResourceId) -> bool) -> ResourceMap {
        ResourceMap(
            self.0
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        )
    }

    pub fn scaled(&self, factor: f64) -> ResourceMap {
        ResourceMap(self.0.iter().map(|(k, v)| (k.clone(), v * factor)).collect())
    }
}

impl FromIterator<(ResourceId, f64)> for ResourceMap {
    fn from_iter<T: IntoIterator<Item = (ResourceId, f64)>>(iter: T) -> Self {
        let mut map = ResourceMap::new();
        for (res, amount) in iter {
            map.add(&res, amount);
        }
        map
    }
}

impl<const N: usize> From<[(&str, f64); N]> for ResourceMap {
    fn from(entries: [(&str, f64); N]) -> Self {
        entries
            .into_iter()
            .map(|(k, v)| (ResourceId::new(k), v))
            .collect()
    }
}
