//! Resource kinds and the per-extension factory table
//!
//! A [`ResourceKind`] is the concrete payload of a resource: it turns fetched
//! bytes into device objects in [`prepare`](ResourceKind::prepare) and gives
//! them back in [`unload`](ResourceKind::unload). Kinds are created by a
//! [`ResourceFactory`] chosen purely by the path's extension.
//!
//! ```ignore
//! registry.register_kind::<TextureResource>("png");
//! registry.register_extension_fn("geo", |_path| Box::new(GeometryResource::default()));
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use trinity_core::Device;

use crate::config::RegistryConfig;
use crate::error::Result;

/// Outcome of one prepare call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepareStatus {
    /// The resource is fully prepared
    Ready,
    /// Progress was made but more calls are needed; the resource keeps its
    /// place at the head of the prepare queue
    Pending,
}

/// What a kind gets to work with while preparing
pub struct PrepareContext<'a> {
    /// Normalized resource path
    pub path: &'a str,
    /// Device to allocate handles on
    pub device: &'a dyn Device,
    /// Registry configuration
    pub config: &'a RegistryConfig,
}

/// Concrete resource payload
pub trait ResourceKind: Send + Sync + 'static {
    /// Human readable kind name
    fn kind_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Turn fetched bytes into device objects
    ///
    /// Called on the frame loop from the budgeted prepare drain. The same
    /// `data` is passed again after a [`PrepareStatus::Pending`] return.
    fn prepare(&mut self, data: &[u8], ctx: &PrepareContext<'_>) -> Result<PrepareStatus>;

    /// Release every device object; must be safe to call when nothing is held
    fn unload(&mut self, device: &dyn Device);

    /// Approximate memory held, in bytes
    fn memory_usage(&self) -> usize {
        0
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Creates a fresh kind for a newly requested path
pub trait ResourceFactory: Send + Sync {
    /// Construct the kind for `path`
    fn create(&self, path: &str) -> Box<dyn ResourceKind>;
}

/// Factory for kinds with a `Default` constructor
pub struct DefaultFactory<T>(PhantomData<fn() -> T>);

impl<T> DefaultFactory<T> {
    /// Create the factory
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DefaultFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ResourceKind + Default> ResourceFactory for DefaultFactory<T> {
    fn create(&self, _path: &str) -> Box<dyn ResourceKind> {
        Box::new(T::default())
    }
}

/// Factory backed by a closure
pub struct FnFactory<F>(pub F);

impl<F> ResourceFactory for FnFactory<F>
where
    F: Fn(&str) -> Box<dyn ResourceKind> + Send + Sync,
{
    fn create(&self, path: &str) -> Box<dyn ResourceKind> {
        (self.0)(path)
    }
}

/// Extension -> factory table
///
/// Extensions are matched case-insensitively and without the leading dot.
#[derive(Default)]
pub struct FactoryTable {
    by_extension: BTreeMap<String, Arc<dyn ResourceFactory>>,
}

impl FactoryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn key(extension: &str) -> String {
        extension.trim_start_matches('.').to_lowercase()
    }

    /// Register `factory` for `extension`, replacing any previous one
    pub fn register(&mut self, extension: &str, factory: Arc<dyn ResourceFactory>) {
        let key = Self::key(extension);
        if self.by_extension.insert(key.clone(), factory).is_some() {
            log::warn!("Replacing resource factory for extension '{}'", key);
        }
    }

    /// Factory for `extension`
    pub fn get(&self, extension: &str) -> Option<Arc<dyn ResourceFactory>> {
        self.by_extension.get(&Self::key(extension)).cloned()
    }

    /// Check if an extension is supported
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.by_extension.contains_key(&Self::key(extension))
    }

    /// Registered extensions
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TextResource {
        text: Option<String>,
    }

    impl ResourceKind for TextResource {
        fn prepare(&mut self, data: &[u8], ctx: &PrepareContext<'_>) -> Result<PrepareStatus> {
            let text = std::str::from_utf8(data)
                .map_err(|e| crate::error::ResourceError::parse(ctx.path, e))?;
            self.text = Some(text.to_string());
            Ok(PrepareStatus::Ready)
        }

        fn unload(&mut self, _device: &dyn Device) {
            self.text = None;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_factory_table() {
        let mut table = FactoryTable::new();
        table.register("TXT", Arc::new(DefaultFactory::<TextResource>::new()));
        table.register(".text", Arc::new(FnFactory(|_: &str| {
            Box::new(TextResource::default()) as Box<dyn ResourceKind>
        })));

        assert!(table.supports_extension("txt"));
        assert!(table.supports_extension("Text"));
        assert!(!table.supports_extension("png"));
        assert_eq!(table.extensions().collect::<Vec<_>>(), vec!["text", "txt"]);
    }

    #[test]
    fn test_prepare_text_kind() {
        let device = trinity_core::HeadlessDevice::new();
        let config = RegistryConfig::default();
        let ctx = PrepareContext {
            path: "a.txt",
            device: &device,
            config: &config,
        };

        let mut kind = DefaultFactory::<TextResource>::new().create("a.txt");
        assert_eq!(kind.prepare(b"hello", &ctx).unwrap(), PrepareStatus::Ready);
        let text = kind.as_any().downcast_ref::<TextResource>().unwrap();
        assert_eq!(text.text.as_deref(), Some("hello"));

        assert!(kind.prepare(&[0xff, 0xfe], &ctx).is_err());
        assert!(kind.kind_name().ends_with("TextResource"));
    }
}
