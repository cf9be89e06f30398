//! Resource Registry - path-keyed cache of loadable resources
//!
//! The registry is the only owner of the path -> [`Resource`] map and of the
//! frame counter. It supports:
//! - Identity caching (one instance per normalized path)
//! - Per-extension kind dispatch
//! - A FIFO prepare queue drained under a per-frame time budget
//! - Idle purging with lazy reload on next access
//!
//! ```ignore
//! let registry = ResourceRegistry::new(RegistryConfig::default(), device, fetcher);
//! registry.register_kind::<TextureResource>("png");
//!
//! let texture = registry.get_resource("res:/textures/ship.png");
//!
//! // Once per frame
//! let report = registry.tick();
//! if texture.is_good() { /* use it */ }
//! ```

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use trinity_core::{Clock, Device, FrameBudget, SystemClock, TextureDesc, TextureHandle};

use crate::config::RegistryConfig;
use crate::error::{FetchError, ResourceError, Result};
use crate::fetch::Fetcher;
use crate::kinds::TextureResource;
use crate::loader::{
    DefaultFactory, FactoryTable, FnFactory, PrepareContext, PrepareStatus, ResourceFactory,
    ResourceKind,
};
use crate::path;
use crate::resource::{LoadState, Resource};

/// Pixel of the flat fallback texture (RGBA8)
const FALLBACK_PIXEL: [u8; 4] = [128, 128, 128, 255];

/// Raw bytes delivered by a fetcher for a specific load attempt
struct FetchCompletion {
    resource: Weak<Resource>,
    generation: u64,
    result: std::result::Result<Vec<u8>, FetchError>,
}

/// A resource waiting for its prepare step
struct PrepareItem {
    resource: Arc<Resource>,
    generation: u64,
    data: Vec<u8>,
}

/// What one [`ResourceRegistry::tick`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Frame number after the tick
    pub frame: u64,
    /// Resources that finished preparing
    pub prepared: usize,
    /// Resources whose fetch or prepare failed
    pub failed: usize,
    /// Resources purged by the idle sweep
    pub purged: usize,
    /// Fetch completions dropped because a newer load superseded them
    pub stale: usize,
    /// Prepare queue entries left for the next tick
    pub remaining: usize,
}

/// Registry statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Current frame
    pub frame: u64,
    /// Cached resources
    pub resources: usize,
    /// Resources in `Good`
    pub good: usize,
    /// Resources in `Loading`
    pub loading: usize,
    /// Resources in `Failed`
    pub failed: usize,
    /// Resources in `Purged`
    pub purged: usize,
    /// Resources with a non-zero pin count
    pub pinned: usize,
    /// Entries waiting in the prepare queue
    pub queued: usize,
    /// Sum of payload memory usage
    pub memory_bytes: usize,
}

pub(crate) struct RegistryInner {
    config: RegistryConfig,
    device: Arc<dyn Device>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    resources: RwLock<BTreeMap<String, Arc<Resource>>>,
    factories: RwLock<FactoryTable>,
    prepare_queue: Mutex<VecDeque<PrepareItem>>,
    completion_tx: Sender<FetchCompletion>,
    completion_rx: Receiver<FetchCompletion>,
    pending_loads: AtomicUsize,
    active_frame: AtomicU64,
    fallback: Mutex<Option<TextureHandle>>,
}

impl RegistryInner {
    pub(crate) fn frame(&self) -> u64 {
        self.active_frame.load(Ordering::SeqCst)
    }

    /// Restart the load of `resource`
    ///
    /// A good resource notifies its observers before unloading. Any other
    /// state has nothing cached, but a partially prepared payload is still
    /// dropped.
    pub(crate) fn reload(&self, resource: &Arc<Resource>) {
        if !resource.has_loader() {
            log::warn!("Cannot reload '{}': no loader for its extension", resource.path());
            return;
        }
        if resource.state() == LoadState::Good {
            resource.release(self.device.as_ref());
        } else {
            resource.unload(self.device.as_ref());
        }
        self.start_load(resource);
    }

    fn start_load(&self, resource: &Arc<Resource>) {
        let Some((generation, was_loading)) = resource.begin_load() else {
            return;
        };
        if !was_loading {
            self.pending_loads.fetch_add(1, Ordering::SeqCst);
        }

        let url = path::resolve_url(resource.path(), &self.config.path_prefixes);
        log::debug!("Fetching '{}' (generation {})", url, generation);

        let sender = self.completion_tx.clone();
        let weak = Arc::downgrade(resource);
        self.fetcher.fetch(
            &url,
            Box::new(move |result| {
                let completion = FetchCompletion {
                    resource: weak,
                    generation,
                    result,
                };
                if sender.send(completion).is_err() {
                    log::trace!("Fetch completed after the registry was dropped");
                }
            }),
        );
    }

    fn complete_load(&self, resource: &Resource, generation: u64, success: bool) {
        if !resource.finish_load(generation, success) {
            return;
        }
        let _ = self
            .pending_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        if success {
            resource.notify_rebuild();
        }
        resource.notify_finished(success);
    }

    fn drain_completions(&self, report: &mut TickReport) {
        while let Ok(completion) = self.completion_rx.try_recv() {
            let Some(resource) = completion.resource.upgrade() else {
                continue;
            };
            if !resource.is_current(completion.generation) {
                log::debug!(
                    "Dropping stale fetch of '{}' (generation {})",
                    resource.path(),
                    completion.generation
                );
                report.stale += 1;
                continue;
            }

            match completion.result {
                Ok(data) => self.prepare_queue.lock().push_back(PrepareItem {
                    resource,
                    generation: completion.generation,
                    data,
                }),
                Err(e) => {
                    log::warn!("Failed to fetch '{}': {}", resource.path(), e);
                    self.complete_load(&resource, completion.generation, false);
                    report.failed += 1;
                }
            }
        }
    }

    fn drain_prepare_queue(&self, budget: &FrameBudget<'_>, report: &mut TickReport) {
        loop {
            let Some(item) = self.prepare_queue.lock().pop_front() else {
                break;
            };
            if !item.resource.is_current(item.generation) {
                report.stale += 1;
                continue;
            }

            let ctx = PrepareContext {
                path: item.resource.path(),
                device: self.device.as_ref(),
                config: &self.config,
            };
            match item.resource.prepare(&item.data, &ctx) {
                Ok(PrepareStatus::Ready) => {
                    self.complete_load(&item.resource, item.generation, true);
                    report.prepared += 1;
                }
                Ok(PrepareStatus::Pending) => {
                    self.prepare_queue.lock().push_front(item);
                }
                Err(e) => {
                    log::error!("Failed to prepare '{}': {}", item.resource.path(), e);
                    item.resource.unload(self.device.as_ref());
                    self.complete_load(&item.resource, item.generation, false);
                    report.failed += 1;
                }
            }

            if budget.exhausted() {
                break;
            }
        }
    }

    fn purge_idle(&self) -> usize {
        let frame = self.frame();
        let limit = self.config.idle_frame_limit;
        let candidates: Vec<Arc<Resource>> = self
            .resources
            .read()
            .values()
            .filter(|r| r.is_purgeable(frame, limit))
            .cloned()
            .collect();

        let mut purged = 0;
        for resource in candidates {
            if resource.purge(self.device.as_ref()) {
                log::debug!(
                    "Purged idle resource '{}' (last active frame {}, now {})",
                    resource.path(),
                    resource.active_frame(),
                    frame
                );
                purged += 1;
            }
        }
        purged
    }

    fn unload_all(&self) {
        let resources = std::mem::take(&mut *self.resources.write());
        self.prepare_queue.lock().clear();
        while self.completion_rx.try_recv().is_ok() {}

        for resource in resources.values() {
            resource.shutdown(self.device.as_ref());
        }
        self.pending_loads.store(0, Ordering::SeqCst);

        if let Some(handle) = self.fallback.lock().take() {
            self.device.destroy_texture(handle);
        }
        if !resources.is_empty() {
            log::info!("Unloaded {} resources", resources.len());
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.unload_all();
    }
}

/// The resource registry
///
/// Cheap to clone; every clone shares the same cache.
#[derive(Clone)]
pub struct ResourceRegistry {
    inner: Arc<RegistryInner>,
}

impl ResourceRegistry {
    /// Create a registry timed by the system clock
    pub fn new(config: RegistryConfig, device: Arc<dyn Device>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_clock(config, device, fetcher, Arc::new(SystemClock::new()))
    }

    /// Create a registry timed by `clock`
    pub fn with_clock(
        config: RegistryConfig,
        device: Arc<dyn Device>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        Self {
            inner: Arc::new(RegistryInner {
                config,
                device,
                fetcher,
                clock,
                resources: RwLock::new(BTreeMap::new()),
                factories: RwLock::new(FactoryTable::new()),
                prepare_queue: Mutex::new(VecDeque::new()),
                completion_tx,
                completion_rx,
                pending_loads: AtomicUsize::new(0),
                active_frame: AtomicU64::new(0),
                fallback: Mutex::new(None),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// The device resources are prepared on
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.inner.device
    }

    /// The registry clock
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Current frame counter
    pub fn frame(&self) -> u64 {
        self.inner.frame()
    }

    /// Register the factory for an extension
    pub fn register_extension(&self, extension: &str, factory: impl ResourceFactory + 'static) {
        self.inner.factories.write().register(extension, Arc::new(factory));
    }

    /// Register a closure as the factory for an extension
    pub fn register_extension_fn<F>(&self, extension: &str, factory: F)
    where
        F: Fn(&str) -> Box<dyn ResourceKind> + Send + Sync + 'static,
    {
        self.register_extension(extension, FnFactory(factory));
    }

    /// Register a `Default`-constructible kind for an extension
    pub fn register_kind<T: ResourceKind + Default>(&self, extension: &str) {
        self.register_extension(extension, DefaultFactory::<T>::new());
    }

    /// Check if an extension has a factory
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.inner.factories.read().supports_extension(extension)
    }

    /// Get or create the resource for `path`
    ///
    /// The first request constructs the kind registered for the extension and
    /// starts the fetch. Without a factory the resource is permanently
    /// `Failed`; that is logged and not an error.
    pub fn get_resource(&self, path: &str) -> Arc<Resource> {
        let key = path::normalize(path);

        let cached = self.inner.resources.read().get(&key).cloned();
        if let Some(resource) = cached {
            resource.keep_alive();
            return resource;
        }

        let (resource, created) = {
            let mut resources = self.inner.resources.write();
            match resources.get(&key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let extension = path::extension(&key).unwrap_or_default().to_string();
                    let kind = self
                        .inner
                        .factories
                        .read()
                        .get(&extension)
                        .map(|factory| factory.create(&key));
                    let resource =
                        Resource::new(key.clone(), extension, kind, Arc::downgrade(&self.inner));
                    resources.insert(key, Arc::clone(&resource));
                    (resource, true)
                }
            }
        };

        if created {
            if resource.has_loader() {
                self.inner.start_load(&resource);
            } else {
                log::error!(
                    "No loader registered for '{}' (extension '{}')",
                    resource.path(),
                    resource.extension()
                );
            }
        }
        resource.keep_alive();
        resource
    }

    /// Get the resource for `path`, checking that it holds a `T`
    pub fn get_resource_as<T: ResourceKind>(&self, path: &str) -> Result<Arc<Resource>> {
        let resource = self.get_resource(path);
        if !resource.has_loader() {
            return Err(ResourceError::NoLoader {
                path: resource.path().to_string(),
                extension: resource.extension().to_string(),
            });
        }
        if !resource.is_kind::<T>() {
            return Err(ResourceError::WrongKind {
                path: resource.path().to_string(),
                expected: std::any::type_name::<T>(),
            });
        }
        Ok(resource)
    }

    /// Look up a cached resource without creating it or counting an access
    pub fn resource(&self, path: &str) -> Option<Arc<Resource>> {
        self.inner.resources.read().get(&path::normalize(path)).cloned()
    }

    /// Reload a cached resource; `false` if the path was never requested
    pub fn reload_resource(&self, path: &str) -> bool {
        match self.resource(path) {
            Some(resource) => {
                resource.reload();
                true
            }
            None => false,
        }
    }

    /// Advance one frame using the configured prepare budget
    pub fn tick(&self) -> TickReport {
        let budget = FrameBudget::from_millis(self.inner.clock.as_ref(), self.inner.config.prepare_budget_ms);
        self.tick_with_budget(&budget)
    }

    /// Advance one frame, draining the prepare queue under `budget`
    ///
    /// Order: bump the frame counter, collect fetch completions, sweep idle
    /// resources (every `purge_interval_frames`), then prepare queued
    /// resources FIFO. At least one queued resource is prepared per tick.
    pub fn tick_with_budget(&self, budget: &FrameBudget<'_>) -> TickReport {
        let inner = &self.inner;
        let frame = inner.active_frame.fetch_add(1, Ordering::SeqCst) + 1;
        let mut report = TickReport {
            frame,
            ..Default::default()
        };

        inner.drain_completions(&mut report);

        let interval = inner.config.purge_interval_frames;
        if inner.config.auto_purge && interval > 0 && frame % interval == 0 {
            report.purged = inner.purge_idle();
        }

        inner.drain_prepare_queue(budget, &mut report);
        report.remaining = inner.prepare_queue.lock().len();

        if report.prepared + report.failed + report.purged > 0 {
            log::trace!(
                "Registry frame {}: prepared {}, failed {}, purged {}, {} queued",
                frame,
                report.prepared,
                report.failed,
                report.purged,
                report.remaining
            );
        }
        report
    }

    /// Purge every idle, unpinned, good resource now
    pub fn purge_idle(&self) -> usize {
        self.inner.purge_idle()
    }

    /// Check if any load is in flight
    pub fn is_loading(&self) -> bool {
        self.pending_loads() > 0
    }

    /// Number of loads in flight (fetching or queued for prepare)
    pub fn pending_loads(&self) -> usize {
        self.inner.pending_loads.load(Ordering::SeqCst)
    }

    /// Entries waiting in the prepare queue
    pub fn prepare_queue_len(&self) -> usize {
        self.inner.prepare_queue.lock().len()
    }

    /// Number of cached resources
    pub fn resource_count(&self) -> usize {
        self.inner.resources.read().len()
    }

    /// Cached paths in order
    pub fn paths(&self) -> Vec<String> {
        self.inner.resources.read().keys().cloned().collect()
    }

    /// Forget resource shells nobody else holds
    ///
    /// Only unpinned resources that are not good or loading and have no
    /// outside references are dropped. Returns the number removed.
    pub fn clear(&self) -> usize {
        let mut resources = self.inner.resources.write();
        let before = resources.len();
        resources.retain(|_, resource| {
            let idle = matches!(
                resource.state(),
                LoadState::Purged | LoadState::Failed | LoadState::Unloaded
            );
            !(idle && resource.pin_count() == 0 && Arc::strong_count(resource) == 1)
        });
        before - resources.len()
    }

    /// Release and unload every resource and empty the cache
    pub fn unload_and_clear(&self) {
        self.inner.unload_all();
    }

    /// Current statistics
    pub fn stats(&self) -> RegistryStats {
        let resources = self.inner.resources.read();
        let mut stats = RegistryStats {
            frame: self.frame(),
            resources: resources.len(),
            queued: self.prepare_queue_len(),
            ..Default::default()
        };
        for resource in resources.values() {
            match resource.state() {
                LoadState::Good => stats.good += 1,
                LoadState::Loading => stats.loading += 1,
                LoadState::Failed => stats.failed += 1,
                LoadState::Purged => stats.purged += 1,
                LoadState::Unloaded => {}
            }
            if resource.pin_count() > 0 {
                stats.pinned += 1;
            }
            stats.memory_bytes += resource.memory_usage();
        }
        stats
    }

    /// Device texture for `path`, or the flat fallback while it is not good
    pub fn texture_or_fallback(&self, path: &str) -> Result<TextureHandle> {
        let resource = self.get_resource(path);
        if resource.is_good() {
            if let Some(handle) = resource.with_kind(|t: &TextureResource| t.handle()).flatten() {
                return Ok(handle);
            }
        }
        self.fallback_texture()
    }

    /// The 1x1 flat fallback texture, created on first use
    pub fn fallback_texture(&self) -> Result<TextureHandle> {
        let mut slot = self.inner.fallback.lock();
        if let Some(handle) = *slot {
            return Ok(handle);
        }
        let desc = TextureDesc::rgba8("trinity:fallback", 1, 1);
        let handle = self.inner.device.create_texture(&desc, &FALLBACK_PIXEL)?;
        *slot = Some(handle);
        Ok(handle)
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("frame", &self.frame())
            .field("resources", &self.resource_count())
            .field("pending_loads", &self.pending_loads())
            .finish()
    }
}
