//! # trinity_resource - Resource Registry
//!
//! Path-keyed caching of externally authored data with:
//! - Pluggable kinds, dispatched on file extension
//! - Asynchronous fetches whose results are prepared on the frame loop
//! - A per-frame time budget for preparation
//! - Idle purging and lazy reload on next access
//! - Observer notifications around every invalidation
//!
//! ## Example
//!
//! ```ignore
//! use trinity_resource::prelude::*;
//!
//! let registry = ResourceRegistry::new(RegistryConfig::default(), device, fetcher);
//! register_builtin_kinds(&registry);
//!
//! let geometry = registry.get_resource("res:/ships/frigate.geo");
//! geometry.register_notification(&mesh_binding);
//!
//! // Each frame
//! registry.tick();
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod kinds;
pub mod loader;
pub mod notification;
pub mod path;
pub mod registry;
pub mod resource;

pub use config::RegistryConfig;
pub use error::{FetchError, ResourceError, Result};
pub use fetch::{DeferredFetcher, FetchCallback, Fetcher, FileFetcher, MemoryFetcher};
pub use kinds::{register_builtin_kinds, GeometryResource, TextureResource};
pub use loader::{
    DefaultFactory, FactoryTable, FnFactory, PrepareContext, PrepareStatus, ResourceFactory,
    ResourceKind,
};
pub use notification::ResourceObserver;
pub use registry::{RegistryStats, ResourceRegistry, TickReport};
pub use resource::{LoadState, Resource};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::RegistryConfig;
    pub use crate::error::{FetchError, ResourceError};
    pub use crate::fetch::{DeferredFetcher, Fetcher, FileFetcher, MemoryFetcher};
    pub use crate::kinds::{register_builtin_kinds, GeometryResource, TextureResource};
    pub use crate::loader::{PrepareContext, PrepareStatus, ResourceKind};
    pub use crate::notification::ResourceObserver;
    pub use crate::registry::{ResourceRegistry, TickReport};
    pub use crate::resource::{LoadState, Resource};
}
