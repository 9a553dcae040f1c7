use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, Weak};

use crate::foundation::core::lock;
use crate::foundation::error::{PaintError, PaintResult};
use crate::oplist::{OperatorList, OperatorListChunk};

/// Receives a notification whenever a stream grows.
pub trait OperatorListListener: Send + Sync {
    /// Called after a chunk was appended.
    fn operator_list_changed(&self);
}

struct StreamInner {
    list: RwLock<OperatorList>,
    listeners: Mutex<Vec<Weak<dyn OperatorListListener>>>,
}

/// Operator list shared between the producer and the render tasks reading it.
///
/// The producer appends chunks; readers only ever see a prefix of the final list.
#[derive(Clone)]
pub struct OperatorListStream {
    inner: Arc<StreamInner>,
}

impl Default for OperatorListStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OperatorListStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let list = self.read();
        f.debug_struct("OperatorListStream")
            .field("len", &list.len())
            .field("last_chunk", &list.last_chunk)
            .finish()
    }
}

impl OperatorListStream {
    /// Empty stream awaiting chunks.
    pub fn new() -> Self {
        Self::from_list(OperatorList::new())
    }

    /// Stream seeded with `list` (complete if `list.last_chunk` is set).
    pub fn from_list(list: OperatorList) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                list: RwLock::new(list),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append a chunk and notify every attached listener.
    pub fn append(&self, chunk: OperatorListChunk) -> PaintResult<()> {
        {
            let mut list = self
                .inner
                .list
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if list.last_chunk {
                return Err(PaintError::validation(
                    "operator list already received its final chunk",
                ));
            }
            list.append(chunk);
        }
        let listeners: Vec<_> = {
            let mut ls = lock(&self.inner.listeners);
            ls.retain(|w| w.strong_count() > 0);
            ls.iter().filter_map(Weak::upgrade).collect()
        };
        for l in listeners {
            l.operator_list_changed();
        }
        Ok(())
    }

    /// Attach a listener; it is dropped automatically once its owner goes away.
    pub fn attach(&self, listener: Weak<dyn OperatorListListener>) {
        lock(&self.inner.listeners).push(listener);
    }

    /// Number of entries currently available.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// `true` when no entries have arrived yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the final chunk has been appended.
    pub fn is_complete(&self) -> bool {
        self.read().last_chunk
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, OperatorList> {
        self.inner
            .list
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
