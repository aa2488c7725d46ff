use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque handle to live object map. Handles are `<prefix>-<n>` with `n`
/// strictly increasing for the lifetime of the table, so a released handle
/// is never handed out again.
pub struct HandleTable<T: ?Sized> {
    prefix: &'static str,
    counter: AtomicU64,
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> HandleTable<T> {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` under a freshly minted handle and returns the handle.
    pub fn insert(&self, value: Arc<T>) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = format!("{}-{n}", self.prefix);
        self.entries().insert(handle.clone(), value);
        handle
    }

    pub fn get(&self, handle: &str) -> Option<Arc<T>> {
        self.entries().get(handle).cloned()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.entries().contains_key(handle)
    }

    pub fn remove(&self, handle: &str) -> Option<Arc<T>> {
        self.entries().remove(handle)
    }

    /// Empties the table. Minted numbers keep counting up.
    pub fn drain(&self) -> Vec<(String, Arc<T>)> {
        self.entries().drain().collect()
    }

    pub fn handles(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
