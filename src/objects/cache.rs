use std::collections::HashMap;
use std::sync::Mutex;

use crate::foundation::core::lock;
use crate::foundation::error::NotResolved;
use crate::objects::SharedObject;

type Subscriber = Box<dyn FnOnce(&SharedObject) + Send>;

enum Slot {
    Pending(Vec<Subscriber>),
    Resolved(SharedObject),
}

/// Resolve-once map from object id to a shared object.
///
/// Producers call [`ObjectCache::resolve`] exactly once per id. Consumers either read
/// synchronously with [`ObjectCache::get`] or register a callback with
/// [`ObjectCache::subscribe`]; callbacks always run outside the internal lock.
#[derive(Default)]
pub struct ObjectCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("entries", &self.len())
            .field("pending", &self.pending())
            .finish()
    }
}

impl ObjectCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `id` and wake every pending subscriber.
    ///
    /// Returns `false` (and keeps the first value) if `id` was already resolved.
    pub fn resolve(&self, id: impl Into<String>, value: SharedObject) -> bool {
        let id = id.into();
        let subscribers = {
            let mut slots = lock(&self.slots);
            match slots.remove(&id) {
                Some(first @ Slot::Resolved(_)) => {
                    tracing::warn!(id = %id, "object resolved more than once; keeping the first value");
                    slots.insert(id, first);
                    return false;
                }
                Some(Slot::Pending(subs)) => {
                    slots.insert(id, Slot::Resolved(value.clone()));
                    subs
                }
                None => {
                    slots.insert(id, Slot::Resolved(value.clone()));
                    Vec::new()
                }
            }
        };
        for cb in subscribers {
            cb(&value);
        }
        true
    }

    /// Wake the subscribers waiting on `id` with a value stored elsewhere.
    ///
    /// The pending slot is dropped; a resolved slot is left alone.
    pub fn notify_pending(&self, id: &str, value: &SharedObject) {
        let subscribers = {
            let mut slots = lock(&self.slots);
            match slots.get(id) {
                Some(Slot::Pending(_)) => match slots.remove(id) {
                    Some(Slot::Pending(subs)) => subs,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            }
        };
        for cb in subscribers {
            cb(value);
        }
    }

    /// `true` once `id` has been resolved.
    pub fn has(&self, id: &str) -> bool {
        matches!(lock(&self.slots).get(id), Some(Slot::Resolved(_)))
    }

    /// Resolved value for `id`.
    pub fn get(&self, id: &str) -> Result<SharedObject, NotResolved> {
        match lock(&self.slots).get(id) {
            Some(Slot::Resolved(v)) => Ok(v.clone()),
            _ => Err(NotResolved { id: id.to_owned() }),
        }
    }

    /// Run `callback` with the value of `id`: immediately if resolved, otherwise on resolution.
    pub fn subscribe(&self, id: &str, callback: impl FnOnce(&SharedObject) + Send + 'static) {
        let ready = {
            let mut slots = lock(&self.slots);
            match slots
                .entry(id.to_owned())
                .or_insert_with(|| Slot::Pending(Vec::new()))
            {
                Slot::Resolved(v) => Some(v.clone()),
                Slot::Pending(subs) => {
                    subs.push(Box::new(callback));
                    return;
                }
            }
        };
        if let Some(v) = ready {
            callback(&v);
        }
    }

    /// Number of resolved objects.
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|s| matches!(s, Slot::Resolved(_)))
            .count()
    }

    /// Number of ids that have subscribers but no value yet.
    pub fn pending(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|s| matches!(s, Slot::Pending(_)))
            .count()
    }

    /// `true` when nothing has been resolved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, including pending subscriptions.
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/objects/cache.rs"]
mod tests;
