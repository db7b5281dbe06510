use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::listener::{
    identifier::Identifier,
    record::{Listener, ListenerId, ListenerType},
};

/// Per-kind ordered collection of live listeners.
///
/// The lock is never held across an `.await`, so dispatch callbacks may
/// register or stop listeners while a dispatch pass is running.
pub struct ListenerRegistry<P> {
    buckets: Mutex<HashMap<ListenerType, Vec<Arc<Listener<P>>>>>,
}

impl<P> Default for ListenerRegistry<P> {
    fn default() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

impl<P> ListenerRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ListenerType, Vec<Arc<Listener<P>>>>> {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends to the bucket for the listener's type. Overlapping patterns are allowed.
    pub fn register(&self, listener: Arc<Listener<P>>) -> ListenerId {
        let id = listener.id;
        self.lock()
            .entry(listener.listener_type)
            .or_default()
            .push(listener);
        id
    }

    /// Every listener whose identifier is matched by `pattern`, in registration order.
    pub fn find_matching(
        &self,
        pattern: &Identifier,
        listener_type: ListenerType,
    ) -> Vec<Arc<Listener<P>>> {
        self.lock()
            .get(&listener_type)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|l| pattern.matches(&l.identifier))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn find_first_matching(
        &self,
        pattern: &Identifier,
        listener_type: ListenerType,
    ) -> Option<Arc<Listener<P>>> {
        self.lock()
            .get(&listener_type)?
            .iter()
            .find(|l| pattern.matches(&l.identifier))
            .cloned()
    }

    /// Removes by identity. Returns `false` if the listener was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut buckets = self.lock();
        for bucket in buckets.values_mut() {
            if let Some(pos) = bucket.iter().position(|l| l.id == id) {
                bucket.remove(pos);
                return true;
            }
        }
        false
    }

    /// Removes by identity and runs `f` on the record before the lock is released,
    /// so no other thread can observe the listener as both gone and unresolved.
    pub(crate) fn remove_with<R>(
        &self,
        id: ListenerId,
        f: impl FnOnce(&Listener<P>) -> R,
    ) -> Option<R> {
        let mut buckets = self.lock();
        for bucket in buckets.values_mut() {
            if let Some(pos) = bucket.iter().position(|l| l.id == id) {
                let listener = bucket.remove(pos);
                return Some(f(&listener));
            }
        }
        None
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.lock()
            .values()
            .any(|bucket| bucket.iter().any(|l| l.id == id))
    }

    /// Stable copy of one bucket for iteration outside the lock.
    pub fn snapshot(&self, listener_type: ListenerType) -> Vec<Arc<Listener<P>>> {
        self.lock()
            .get(&listener_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, listener_type: ListenerType) -> usize {
        self.lock().get(&listener_type).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values().all(Vec::is_empty)
    }
}
