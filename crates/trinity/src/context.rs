//! Renderer context
//!
//! Owns the device, the resource registry and the object loader, and drives
//! them once per frame. A frame is:
//!
//! 1. [`Context::frame`]: advance the registry (completions, purge sweep,
//!    budgeted preparation), then construct queued object files under the
//!    construction budget.
//! 2. [`Context::render`] for each pass: collect batches from a renderable
//!    and draw them.

use std::sync::Arc;

use trinity_core::{Clock, Device, FrameBudget, RenderMode, SystemClock};
use trinity_reader::{ObjectLoader, Result as ReadResult, TypeRegistry, Value};
use trinity_render::{back_to_front, BatchAccumulator, RenderStats, Renderable};
use trinity_resource::{register_builtin_kinds, Fetcher, RegistryStats, ResourceRegistry, TickReport};

use crate::config::TrinityConfig;
use crate::objects::register_builtin_types;

/// What one [`Context::frame`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frames run so far, this one included
    pub frame: u64,
    /// Registry tick results
    pub registry: TickReport,
    /// Object files whose construction finished
    pub objects_constructed: usize,
    /// Object requests still waiting
    pub pending_objects: usize,
}

/// The renderer context
pub struct Context {
    config: TrinityConfig,
    device: Arc<dyn Device>,
    registry: ResourceRegistry,
    types: Arc<TypeRegistry>,
    loader: ObjectLoader,
    clock: Arc<dyn Clock>,
    frames: u64,
}

impl Context {
    /// Context timed by the system clock, with the built-in resource kinds
    /// and object types
    pub fn new(config: TrinityConfig, device: Arc<dyn Device>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_clock(config, device, fetcher, Arc::new(SystemClock::new()))
    }

    /// Context timed by `clock`
    pub fn with_clock(
        config: TrinityConfig,
        device: Arc<dyn Device>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut types = TypeRegistry::new();
        register_builtin_types(&mut types);
        Self::with_types(config, device, fetcher, clock, types)
    }

    /// Context constructing objects from `types`
    ///
    /// `types` is used as given; call
    /// [`register_builtin_types`](crate::objects::register_builtin_types)
    /// on it to keep the built-in objects.
    pub fn with_types(
        config: TrinityConfig,
        device: Arc<dyn Device>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        types: TypeRegistry,
    ) -> Self {
        let registry =
            ResourceRegistry::with_clock(config.registry.clone(), Arc::clone(&device), fetcher, Arc::clone(&clock));
        register_builtin_kinds(&registry);

        let types = Arc::new(types);
        let loader = ObjectLoader::new(registry.clone(), Arc::clone(&types), config.reader.clone());
        log::info!("Trinity context created ({} object types)", types.len());

        Self {
            config,
            device,
            registry,
            types,
            loader,
            clock,
            frames: 0,
        }
    }

    /// Configuration
    pub fn config(&self) -> &TrinityConfig {
        &self.config
    }

    /// Rendering device
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Resource registry
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Object types
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Object loader
    pub fn loader(&self) -> &ObjectLoader {
        &self.loader
    }

    /// Frames run so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Request a fresh object graph from the file at `path`
    ///
    /// `callback` runs from a later [`frame`](Context::frame).
    pub fn load_object<F>(&self, path: &str, callback: F)
    where
        F: FnOnce(ReadResult<Value>) + Send + 'static,
    {
        self.loader.get_object(path, callback);
    }

    /// Run the per-frame resource and object work
    pub fn frame(&mut self) -> FrameReport {
        self.frames += 1;
        let registry = self.registry.tick();

        let budget = FrameBudget::from_millis(self.clock.as_ref(), self.config.reader.construct_budget_ms);
        let objects_constructed = self.loader.tick(&budget);

        let report = FrameReport {
            frame: self.frames,
            registry,
            objects_constructed,
            pending_objects: self.loader.pending(),
        };
        if report.registry.prepared + report.registry.failed + report.objects_constructed > 0 {
            log::debug!("Frame {}: {:?}", self.frames, report);
        }
        report
    }

    /// Draw `renderable` for one pass
    ///
    /// Blended passes are sorted back to front; others keep commit order.
    pub fn render(&self, renderable: &dyn Renderable, mode: RenderMode, technique: &str) -> RenderStats {
        let mut accumulator = if mode.is_blended() {
            BatchAccumulator::with_sort(back_to_front)
        } else {
            BatchAccumulator::new()
        };
        renderable.get_batches(mode, &mut accumulator, None);
        accumulator.render(self.device.as_ref(), technique)
    }

    /// Release every resource and empty the cache
    pub fn shutdown(&self) {
        log::info!("Trinity context shutting down after {} frames", self.frames);
        self.registry.unload_and_clear();
    }

    /// Registry statistics
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("frames", &self.frames)
            .field("loader", &self.loader)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trinity_core::{HeadlessDevice, ManualClock};
    use trinity_resource::MemoryFetcher;

    #[test]
    fn test_frame_counts_and_report() {
        let device = Arc::new(HeadlessDevice::new());
        let fetcher = Arc::new(MemoryFetcher::new());
        let mut ctx = Context::with_clock(
            TrinityConfig::default(),
            device,
            fetcher,
            Arc::new(ManualClock::new()),
        );

        assert!(ctx.types().contains("Mesh"));
        let report = ctx.frame();
        assert_eq!(report.frame, 1);
        assert_eq!(report.objects_constructed, 0);
        assert_eq!(report.pending_objects, 0);
        assert_eq!(ctx.frame_count(), 1);
    }
}
