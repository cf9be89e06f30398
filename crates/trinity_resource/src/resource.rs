//! Resource - the cached, loadable unit
//!
//! A resource is created by the registry on the first request for its path
//! and lives until the registry is torn down. Its heavyweight payload (the
//! [`ResourceKind`]) can be purged and lazily reloaded; the bookkeeping shell
//! stays put so every holder keeps pointing at the same instance.
//!
//! Lifecycle:
//! - `Unloaded -> Loading -> Good | Failed`
//! - `Good -> Purged` when idle, `Purged -> Loading` on the next access
//! - `Good | Failed | Loading -> Loading` on an explicit reload

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use trinity_core::Device;

use crate::error::Result;
use crate::loader::{PrepareContext, PrepareStatus, ResourceKind};
use crate::notification::{ObserverList, ResourceObserver};
use crate::registry::RegistryInner;

/// Snapshot of a resource's lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Never loaded, or torn down with the registry
    Unloaded,
    /// Fetch or prepare in flight
    Loading,
    /// Prepared and usable
    Good,
    /// Last load attempt failed, or no loader exists for the extension
    Failed,
    /// Storage reclaimed; the next access reloads
    Purged,
}

#[derive(Debug, Default)]
struct Flags {
    loading: bool,
    good: bool,
    purged: bool,
    failed: bool,
    generation: u64,
}

/// A path-keyed, purgeable, reloadable resource
pub struct Resource {
    path: String,
    extension: String,
    self_ref: Weak<Resource>,
    registry: Weak<RegistryInner>,
    flags: Mutex<Flags>,
    kind: RwLock<Option<Box<dyn ResourceKind>>>,
    observers: ObserverList,
    active_frame: AtomicU64,
    do_not_purge: AtomicU32,
}

impl Resource {
    pub(crate) fn new(
        path: String,
        extension: String,
        kind: Option<Box<dyn ResourceKind>>,
        registry: Weak<RegistryInner>,
    ) -> Arc<Self> {
        let failed = kind.is_none();
        Arc::new_cyclic(|me| Self {
            path,
            extension,
            self_ref: me.clone(),
            registry,
            flags: Mutex::new(Flags {
                failed,
                ..Default::default()
            }),
            kind: RwLock::new(kind),
            observers: ObserverList::default(),
            active_frame: AtomicU64::new(0),
            do_not_purge: AtomicU32::new(0),
        })
    }

    /// Normalized path, the cache key
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Lowercase extension used to pick the kind
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether a factory existed for the extension
    pub fn has_loader(&self) -> bool {
        self.kind.read().is_some()
    }

    /// Current state, without counting as an access
    pub fn state(&self) -> LoadState {
        let flags = self.flags.lock();
        if flags.loading {
            LoadState::Loading
        } else if flags.good {
            LoadState::Good
        } else if flags.purged {
            LoadState::Purged
        } else if flags.failed {
            LoadState::Failed
        } else {
            LoadState::Unloaded
        }
    }

    /// Check if the resource is prepared; counts as an access
    pub fn is_good(&self) -> bool {
        self.keep_alive();
        self.flags.lock().good
    }

    /// Check if a load is in flight; counts as an access
    pub fn is_loading(&self) -> bool {
        self.keep_alive();
        self.flags.lock().loading
    }

    /// Check if the storage has been reclaimed
    pub fn is_purged(&self) -> bool {
        self.flags.lock().purged
    }

    /// Check if the last load attempt failed
    pub fn is_failed(&self) -> bool {
        self.state() == LoadState::Failed
    }

    /// Token of the current load attempt
    pub fn load_generation(&self) -> u64 {
        self.flags.lock().generation
    }

    /// Registry frame of the last access
    pub fn active_frame(&self) -> u64 {
        self.active_frame.load(Ordering::Relaxed)
    }

    /// Mark the resource as used this frame; reloads it if it was purged
    pub fn keep_alive(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        self.active_frame.store(registry.frame(), Ordering::Relaxed);

        let purged = self.flags.lock().purged;
        if purged {
            log::debug!("Reloading purged resource '{}'", self.path);
            self.reload_with(&registry);
        }
    }

    /// Drop the current payload and fetch it again
    pub fn reload(&self) {
        match self.registry.upgrade() {
            Some(registry) => self.reload_with(&registry),
            None => log::warn!("Cannot reload '{}': registry is gone", self.path),
        }
    }

    fn reload_with(&self, registry: &RegistryInner) {
        if let Some(me) = self.self_ref.upgrade() {
            registry.reload(&me);
        }
    }

    /// Prevent purging; returns the new pin count
    pub fn pin(&self) -> u32 {
        self.do_not_purge.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Undo one [`pin`](Self::pin); returns the new pin count
    pub fn unpin(&self) -> u32 {
        match self
            .do_not_purge
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                log::warn!("Unbalanced unpin on '{}'", self.path);
                0
            }
        }
    }

    /// Current pin count
    pub fn pin_count(&self) -> u32 {
        self.do_not_purge.load(Ordering::SeqCst)
    }

    /// Register an observer
    ///
    /// Registering the same observer twice is a no-op. An observer registered
    /// on a resource that is already good gets an immediate
    /// `rebuild_cached_data` call.
    pub fn register_notification<O: ResourceObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<dyn ResourceObserver> = Arc::downgrade(observer) as Weak<O>;
        if !self.observers.register(weak) {
            return;
        }
        let good = self.flags.lock().good;
        if good {
            observer.rebuild_cached_data(self);
        }
    }

    /// Remove an observer; returns `false` if it was not registered
    pub fn unregister_notification<O: ResourceObserver + 'static>(&self, observer: &Arc<O>) -> bool {
        let weak: Weak<dyn ResourceObserver> = Arc::downgrade(observer) as Weak<O>;
        self.observers.unregister(&weak)
    }

    /// Number of live observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Check if the payload is of kind `T`
    pub fn is_kind<T: ResourceKind>(&self) -> bool {
        self.kind
            .read()
            .as_ref()
            .map_or(false, |k| k.as_any().is::<T>())
    }

    /// Borrow the payload as `T`
    pub fn get_as<T: ResourceKind>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.kind.read(), |kind| {
            kind.as_ref()?.as_any().downcast_ref::<T>()
        })
        .ok()
    }

    /// Run `f` against the payload as `T`
    pub fn with_kind<T: ResourceKind, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.get_as::<T>().map(|kind| f(&kind))
    }

    /// Name of the payload kind
    pub fn kind_name(&self) -> Option<&'static str> {
        self.kind.read().as_ref().map(|k| k.kind_name())
    }

    /// Approximate memory held by the payload
    pub fn memory_usage(&self) -> usize {
        self.kind.read().as_ref().map_or(0, |k| k.memory_usage())
    }

    /// Check if `generation` is the load attempt in flight
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let flags = self.flags.lock();
        flags.loading && flags.generation == generation
    }

    /// Enter `Loading` with a fresh generation
    ///
    /// Returns the generation and whether a load was already in flight, or
    /// `None` when no loader exists.
    pub(crate) fn begin_load(&self) -> Option<(u64, bool)> {
        if !self.has_loader() {
            return None;
        }
        let mut flags = self.flags.lock();
        let was_loading = flags.loading;
        flags.generation += 1;
        flags.loading = true;
        flags.good = false;
        flags.purged = false;
        flags.failed = false;
        Some((flags.generation, was_loading))
    }

    pub(crate) fn prepare(&self, data: &[u8], ctx: &PrepareContext<'_>) -> Result<PrepareStatus> {
        match self.kind.write().as_mut() {
            Some(kind) => kind.prepare(data, ctx),
            None => Ok(PrepareStatus::Ready),
        }
    }

    pub(crate) fn unload(&self, device: &dyn Device) {
        if let Some(kind) = self.kind.write().as_mut() {
            kind.unload(device);
        }
    }

    /// Leave `Loading` for `Good` or `Failed`; `false` if `generation` is stale
    pub(crate) fn finish_load(&self, generation: u64, success: bool) -> bool {
        let mut flags = self.flags.lock();
        if !flags.loading || flags.generation != generation {
            return false;
        }
        flags.loading = false;
        flags.good = success;
        flags.failed = !success;
        true
    }

    /// Notify release, then unload; the caller decides the resulting state
    pub(crate) fn release(&self, device: &dyn Device) {
        self.notify_release();
        self.unload(device);
    }

    /// Reclaim storage of a good, unpinned resource
    pub(crate) fn purge(&self, device: &dyn Device) -> bool {
        if self.state() != LoadState::Good || self.pin_count() > 0 {
            return false;
        }
        self.release(device);
        let mut flags = self.flags.lock();
        flags.good = false;
        flags.purged = true;
        true
    }

    /// Release everything and forget any load in flight
    pub(crate) fn shutdown(&self, device: &dyn Device) {
        if self.state() == LoadState::Good {
            self.notify_release();
        }
        self.unload(device);
        let failed = !self.has_loader();
        let mut flags = self.flags.lock();
        let generation = flags.generation + 1;
        *flags = Flags {
            failed,
            generation,
            ..Default::default()
        };
    }

    pub(crate) fn is_purgeable(&self, frame: u64, idle_frame_limit: u64) -> bool {
        self.pin_count() == 0
            && self.state() == LoadState::Good
            && frame.saturating_sub(self.active_frame()) > idle_frame_limit
    }

    pub(crate) fn notify_release(&self) {
        for observer in self.observers.snapshot() {
            observer.release_cached_data(self);
        }
    }

    pub(crate) fn notify_rebuild(&self) {
        for observer in self.observers.snapshot() {
            observer.rebuild_cached_data(self);
        }
    }

    pub(crate) fn notify_finished(&self, success: bool) {
        for observer in self.observers.snapshot() {
            observer.load_finished(self, success);
        }
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("active_frame", &self.active_frame())
            .field("pins", &self.pin_count())
            .finish()
    }
}
