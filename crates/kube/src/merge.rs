//! Dedup merger: collapses resources reachable through more than one API
//! group into one entry per identity.

use std::collections::HashMap;

use caravel_core::{Identity, Resource};

/// Order-preserving accumulation keyed by [`Identity`]. Last writer wins on
/// a duplicate; the write order among concurrent workers is unspecified.
#[derive(Debug, Default)]
pub struct ResourceSet {
    map: HashMap<Identity, Resource>,
    order: Vec<Identity>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: Resource) {
        let id = resource.identity();
        if self.map.insert(id.clone(), resource).is_none() {
            self.order.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn into_vec(mut self) -> Vec<Resource> {
        self.order
            .iter()
            .filter_map(|id| self.map.remove(id))
            .collect()
    }
}

impl Extend<Resource> for ResourceSet {
    fn extend<T: IntoIterator<Item = Resource>>(&mut self, iter: T) {
        for r in iter {
            self.insert(r);
        }
    }
}

/// Merge per-type result sets into one set with unique identity.
pub fn merge<I>(groups: I) -> Vec<Resource>
where
    I: IntoIterator<Item = Vec<Resource>>,
{
    let mut set = ResourceSet::new();
    for group in groups {
        set.extend(group);
    }
    set.into_vec()
}
