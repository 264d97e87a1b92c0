use std::{
    fmt,
    ops::Deref,
    rc::{Rc, Weak},
};

use rustc_hash::FxHashMap;

use crate::node::NodeId;

/// Object exposed through a ref in place of a host node.
///
/// Cloning shares the same object; identity is compared with [`MockNode::ptr_eq`].
#[derive(Clone)]
pub struct MockNode(Rc<serde_json::Value>);

impl MockNode {
    pub fn new(value: serde_json::Value) -> Self {
        Self(Rc::new(value))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new(serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl Deref for MockNode {
    type Target = serde_json::Value;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<serde_json::Value> for MockNode {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for MockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MockNode").field(&*self.0).finish()
    }
}

/// Back-references from vended mock nodes to the instances that produced them.
///
/// Holds neither the mock nor the node alive, and is only ever used for point lookups.
#[derive(Debug, Default)]
pub(crate) struct MockRegistry {
    entries: FxHashMap<usize, (Weak<serde_json::Value>, NodeId)>,
    /// Addresses registered per node, so freeing a node drops its entries.
    by_node: FxHashMap<NodeId, Vec<usize>>,
}

impl MockRegistry {
    pub(crate) fn insert(&mut self, mock: &MockNode, node: NodeId) {
        let address = mock.address();
        let entries = &mut self.entries;
        let addresses = self.by_node.entry(node).or_default();

        // Mocks of this node that nobody holds any more can never be looked up again.
        addresses.retain(|registered| {
            let state = entries
                .get(registered)
                .map(|(weak, owner)| (*owner == node, weak.strong_count() > 0));
            match state {
                Some((true, true)) => *registered != address,
                Some((true, false)) => {
                    entries.remove(registered);
                    false
                }
                Some((false, _)) | None => false,
            }
        });

        entries.insert(address, (Rc::downgrade(&mock.0), node));
        addresses.push(address);
    }

    pub(crate) fn get(&mut self, mock: &MockNode) -> Option<NodeId> {
        let address = mock.address();
        let (value, node) = self
            .entries
            .get(&address)
            .map(|(weak, node)| (weak.upgrade(), *node))?;

        match value {
            Some(value) if Rc::ptr_eq(&value, &mock.0) => Some(node),
            _ => {
                // The address was recycled by an unrelated allocation.
                self.entries.remove(&address);
                None
            }
        }
    }

    /// Forgets every mock registered for `node`.
    pub(crate) fn remove_node(&mut self, node: NodeId) {
        let Some(addresses) = self.by_node.remove(&node) else {
            return;
        };

        for address in addresses {
            if self.entries.get(&address).is_some_and(|(_, owner)| *owner == node) {
                self.entries.remove(&address);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Memoizes one wrapper per node so repeated lookups hand out the same object.
///
/// Wrappers are held weakly: the cache never keeps one alive on its own, and an
/// identity only has to be stable while somebody can still observe it.
#[derive(Debug)]
pub(crate) struct WrapperCache<T> {
    wrappers: FxHashMap<NodeId, Weak<T>>,
}

impl<T> Default for WrapperCache<T> {
    fn default() -> Self {
        Self {
            wrappers: FxHashMap::default(),
        }
    }
}

impl<T> WrapperCache<T> {
    pub(crate) fn get_or_insert_with(&mut self, node: NodeId, create: impl FnOnce() -> T) -> Rc<T> {
        if let Some(wrapper) = self.wrappers.get(&node).and_then(Weak::upgrade) {
            return wrapper;
        }

        let wrapper = Rc::new(create());
        self.wrappers.insert(node, Rc::downgrade(&wrapper));
        wrapper
    }

    pub(crate) fn remove(&mut self, node: NodeId) {
        self.wrappers.remove(&node);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.wrappers.len()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn node_ids(n: usize) -> Vec<NodeId> {
        let mut map: SlotMap<NodeId, ()> = SlotMap::default();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_mock_registry_lookup() {
        let ids = node_ids(2);
        let mut registry = MockRegistry::default();
        let first = MockNode::default();
        let second = MockNode::new(serde_json::json!({"id": 2}));

        registry.insert(&first, ids[0]);
        registry.insert(&second, ids[1]);

        assert_eq!(registry.get(&first), Some(ids[0]));
        assert_eq!(registry.get(&second), Some(ids[1]));
        assert_eq!(registry.get(&first.clone()), Some(ids[0]));
        assert_eq!(registry.get(&MockNode::default()), None);
    }

    #[test]
    fn test_mock_registry_does_not_own_mocks() {
        let ids = node_ids(1);
        let mut registry = MockRegistry::default();
        let mock = MockNode::default();
        let weak = Rc::downgrade(&mock.0);

        registry.insert(&mock, ids[0]);
        drop(mock);

        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_mock_registry_remove_node() {
        let ids = node_ids(2);
        let mut registry = MockRegistry::default();
        let first = MockNode::default();
        let second = MockNode::default();
        let other = MockNode::default();

        registry.insert(&first, ids[0]);
        registry.insert(&second, ids[0]);
        registry.insert(&other, ids[1]);
        registry.remove_node(ids[0]);

        assert_eq!(registry.get(&first), None);
        assert_eq!(registry.get(&second), None);
        assert_eq!(registry.get(&other), Some(ids[1]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_mock_registry_prunes_dropped_mocks_of_a_node() {
        let ids = node_ids(1);
        let mut registry = MockRegistry::default();

        for _ in 0..100 {
            registry.insert(&MockNode::default(), ids[0]);
        }
        let held = MockNode::default();
        registry.insert(&held, ids[0]);
        registry.insert(&held, ids[0]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&held), Some(ids[0]));
    }

    #[test]
    fn test_wrapper_cache_returns_same_wrapper() {
        let ids = node_ids(2);
        let mut cache = WrapperCache::default();

        let first = cache.get_or_insert_with(ids[0], || "first");
        let again = cache.get_or_insert_with(ids[0], || "other");
        let second = cache.get_or_insert_with(ids[1], || "second");

        assert!(Rc::ptr_eq(&first, &again));
        assert_eq!(*again, "first");
        assert_eq!(*second, "second");
    }

    #[test]
    fn test_wrapper_cache_recreates_dropped_wrapper() {
        let ids = node_ids(1);
        let mut cache = WrapperCache::default();

        drop(cache.get_or_insert_with(ids[0], || 1));
        let recreated = cache.get_or_insert_with(ids[0], || 2);

        assert_eq!(*recreated, 2);

        cache.remove(ids[0]);
        assert_eq!(cache.len(), 0);
    }
}
