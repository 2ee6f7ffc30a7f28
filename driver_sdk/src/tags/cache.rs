use crate::tags::structures::TagKey;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Store of the last accepted value per `(device, tag)`.
///
/// `update` must run the closure while holding exclusive access to the key,
/// so that concurrent samples for the same tag see each other's writes in order.
pub trait PreviousValueCache: Send + Sync {
    fn get(&self, key: &TagKey) -> Option<Decimal>;

    fn set(&self, key: &TagKey, value: Decimal);

    fn remove(&self, key: &TagKey);

    /// Read the previous value and, if the closure returns `Some`, replace it.
    fn update(&self, key: &TagKey, f: &mut dyn FnMut(Option<Decimal>) -> Option<Decimal>);
}

/// In-memory cache backed by DashMap.
#[derive(Debug, Clone, Default)] // Clone provides cheap Arc clones
pub struct MemoryValueCache {
    values: Arc<DashMap<TagKey, Decimal>>,
}

impl MemoryValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PreviousValueCache for MemoryValueCache {
    fn get(&self, key: &TagKey) -> Option<Decimal> {
        self.values.get(key).map(|v| *v)
    }

    fn set(&self, key: &TagKey, value: Decimal) {
        self.values.insert(key.clone(), value);
    }

    fn remove(&self, key: &TagKey) {
        self.values.remove(key);
    }

    fn update(&self, key: &TagKey, f: &mut dyn FnMut(Option<Decimal>) -> Option<Decimal>) {
        // The entry guard holds the shard write lock until it is dropped.
        match self.values.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if let Some(next) = f(Some(*entry.get())) {
                    entry.insert(next);
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                if let Some(next) = f(None) {
                    entry.insert(next);
                }
            }
        }
    }
}
