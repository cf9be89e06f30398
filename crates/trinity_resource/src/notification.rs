//! Notification protocol
//!
//! Objects that cache data derived from a resource (device handles, mirrored
//! vertices, area tables) register a [`ResourceObserver`] on it. The resource
//! calls:
//! - [`release_cached_data`](ResourceObserver::release_cached_data) right
//!   before its storage is reclaimed (purge, reload, shutdown)
//! - [`rebuild_cached_data`](ResourceObserver::rebuild_cached_data) right after
//!   a (re)prepare succeeds
//! - [`load_finished`](ResourceObserver::load_finished) when a load attempt
//!   ends, successfully or not
//!
//! Observers are held weakly. Dropping the observer is enough to stop
//! receiving notifications; dead entries are pruned on the next dispatch.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

use crate::resource::Resource;

/// Receiver of resource lifecycle notifications
///
/// Callbacks run on the frame loop with no registry or resource lock held,
/// so they may query the resource freely.
pub trait ResourceObserver: Send + Sync {
    /// The resource's data is about to become invalid; drop anything derived from it
    fn release_cached_data(&self, resource: &Resource);

    /// The resource is good again; recompute derived data
    fn rebuild_cached_data(&self, resource: &Resource);

    /// A load attempt finished
    fn load_finished(&self, _resource: &Resource, _success: bool) {}
}

/// Weak observer list with idempotent registration
#[derive(Default)]
pub(crate) struct ObserverList {
    observers: Mutex<Vec<Weak<dyn ResourceObserver>>>,
}

impl ObserverList {
    /// Add an observer; returns `false` if it was already registered
    pub(crate) fn register(&self, observer: Weak<dyn ResourceObserver>) -> bool {
        let mut observers = self.observers.lock();
        observers.retain(|o| o.strong_count() > 0);
        if observers.iter().any(|o| Weak::ptr_eq(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Remove an observer; returns `false` if it was not registered
    pub(crate) fn unregister(&self, observer: &Weak<dyn ResourceObserver>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !Weak::ptr_eq(o, observer));
        observers.len() != before
    }

    /// Live observers in registration order, pruning dead entries
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn ResourceObserver>> {
        let mut observers = self.observers.lock();
        let mut live = Vec::with_capacity(observers.len());
        observers.retain(|o| match o.upgrade() {
            Some(strong) => {
                live.push(strong);
                true
            }
            None => false,
        });
        live
    }

    /// Number of live observers
    pub(crate) fn len(&self) -> usize {
        self.observers
            .lock()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl ResourceObserver for Nop {
        fn release_cached_data(&self, _resource: &Resource) {}
        fn rebuild_cached_data(&self, _resource: &Resource) {}
    }

    fn weak(observer: &Arc<Nop>) -> Weak<dyn ResourceObserver> {
        let weak: Weak<dyn ResourceObserver> = Arc::downgrade(observer) as Weak<Nop>;
        weak
    }

    #[test]
    fn test_register_is_idempotent() {
        let list = ObserverList::default();
        let observer = Arc::new(Nop);

        assert!(list.register(weak(&observer)));
        assert!(!list.register(weak(&observer)));
        assert_eq!(list.len(), 1);

        assert!(list.unregister(&weak(&observer)));
        assert!(!list.unregister(&weak(&observer)));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_dropped_observers_are_pruned() {
        let list = ObserverList::default();
        let kept = Arc::new(Nop);
        let dropped = Arc::new(Nop);

        list.register(weak(&kept));
        list.register(weak(&dropped));
        drop(dropped);

        assert_eq!(list.snapshot().len(), 1);
        assert_eq!(list.len(), 1);
    }
}
