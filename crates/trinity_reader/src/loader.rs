//! Object files as resources
//!
//! [`ObjectResource`] caches the parsed node tree of an object file in the
//! resource registry, so it is fetched once and purged like any other
//! resource. [`ObjectLoader`] turns cached trees into fresh object graphs,
//! one [`ObjectReader`] per request, spread over frames by a budget.
//!
//! ```ignore
//! let loader = ObjectLoader::new(registry.clone(), types.clone(), ReaderConfig::default());
//! loader.get_object("res:/scenes/harbor.red", |result| match result {
//!     Ok(scene) => install(scene),
//!     Err(e) => log::error!("{e}"),
//! });
//!
//! // Each frame, after registry.tick()
//! loader.tick(&FrameBudget::from_millis(&clock, 10));
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use trinity_core::{Device, FrameBudget};
use trinity_resource::{
    PrepareContext, PrepareStatus, Resource, ResourceError, ResourceKind, ResourceRegistry,
};

use crate::config::ReaderConfig;
use crate::error::{ReaderError, Result};
use crate::node::Node;
use crate::object::InitContext;
use crate::reader::{ObjectReader, ReadStatus};
use crate::types::TypeRegistry;
use crate::value::Value;

/// Extensions handled by [`ObjectResource`]
pub const OBJECT_EXTENSIONS: [&str; 2] = ["red", "xml"];

/// Parsed node tree of an object file
#[derive(Debug, Default)]
pub struct ObjectResource {
    root: Option<Arc<Node>>,
    byte_size: usize,
}

impl ObjectResource {
    /// Root node, present while the resource is good
    pub fn root(&self) -> Option<Arc<Node>> {
        self.root.clone()
    }
}

impl ResourceKind for ObjectResource {
    fn kind_name(&self) -> &'static str {
        "object"
    }

    fn prepare(&mut self, data: &[u8], ctx: &PrepareContext<'_>) -> trinity_resource::Result<PrepareStatus> {
        let root = Node::parse_xml_bytes(data).map_err(|e| ResourceError::parse(ctx.path, e))?;
        log::debug!("Parsed '{}': {} nodes", ctx.path, root.node_count());
        self.root = Some(root);
        self.byte_size = data.len();
        Ok(PrepareStatus::Ready)
    }

    fn unload(&mut self, _device: &dyn Device) {
        self.root = None;
        self.byte_size = 0;
    }

    fn memory_usage(&self) -> usize {
        self.byte_size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Register [`ObjectResource`] for every object file extension
pub fn register_object_kind(registry: &ResourceRegistry) {
    for extension in OBJECT_EXTENSIONS {
        registry.register_kind::<ObjectResource>(extension);
    }
}

/// Receives the constructed graph or the reason there is none
pub type ObjectCallback = Box<dyn FnOnce(Result<Value>) + Send>;

struct Request {
    resource: Arc<Resource>,
    reader: Option<ObjectReader>,
    callback: ObjectCallback,
}

enum Progress {
    Waiting(Request),
    Finished(ObjectCallback, Result<Value>),
}

/// Budgeted construction of object graphs from object files
pub struct ObjectLoader {
    registry: ResourceRegistry,
    types: Arc<TypeRegistry>,
    config: ReaderConfig,
    requests: Mutex<VecDeque<Request>>,
}

impl ObjectLoader {
    /// Loader reading through `registry`; registers the object file kind
    pub fn new(registry: ResourceRegistry, types: Arc<TypeRegistry>, config: ReaderConfig) -> Self {
        register_object_kind(&registry);
        Self {
            registry,
            types,
            config,
            requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Reader configuration
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Type registry objects are constructed from
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Request a fresh object graph built from the file at `path`
    ///
    /// The callback runs from a later [`tick`](ObjectLoader::tick), never
    /// from inside this call. Every request gets its own instances, even for
    /// the same path.
    pub fn get_object<F>(&self, path: &str, callback: F)
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let resource = self.registry.get_resource(path);
        self.requests.lock().push_back(Request {
            resource,
            reader: None,
            callback: Box::new(callback),
        });
    }

    /// Requests not yet answered
    pub fn pending(&self) -> usize {
        self.requests.lock().len()
    }

    /// Advance requests under `budget`; returns the number answered
    ///
    /// Requests are served in order. The first reader to run always makes
    /// progress, later ones only while the budget lasts. Callbacks run after
    /// the queue lock is released and may issue new requests.
    pub fn tick(&self, budget: &FrameBudget<'_>) -> usize {
        let mut queue = std::mem::take(&mut *self.requests.lock());
        let ctx = InitContext::with_registry(&self.registry);
        let mut waiting = VecDeque::new();
        let mut finished = Vec::new();
        let mut stepped = false;

        while let Some(request) = queue.pop_front() {
            let may_step = !stepped || !budget.exhausted();
            match self.advance(request, may_step, &mut stepped, budget, &ctx) {
                Progress::Waiting(request) => waiting.push_back(request),
                Progress::Finished(callback, result) => finished.push((callback, result)),
            }
        }

        {
            let mut requests = self.requests.lock();
            while let Some(request) = waiting.pop_back() {
                requests.push_front(request);
            }
        }

        let count = finished.len();
        for (callback, result) in finished {
            callback(result);
        }
        count
    }

    fn advance(
        &self,
        mut request: Request,
        may_step: bool,
        stepped: &mut bool,
        budget: &FrameBudget<'_>,
        ctx: &InitContext<'_>,
    ) -> Progress {
        if request.reader.is_none() {
            let resource = &request.resource;
            if resource.is_failed() {
                let error = ReaderError::LoadFailed(resource.path().to_string());
                return Progress::Finished(request.callback, Err(error));
            }
            if !resource.is_good() {
                return Progress::Waiting(request);
            }
            let root = match resource.with_kind(|object: &ObjectResource| object.root()) {
                Some(Some(root)) => root,
                Some(None) => return Progress::Waiting(request),
                None => {
                    let error = ResourceError::WrongKind {
                        path: resource.path().to_string(),
                        expected: "object file",
                    };
                    return Progress::Finished(request.callback, Err(error.into()));
                }
            };
            request.reader = Some(ObjectReader::new(root, Arc::clone(&self.types)));
        }

        if !may_step {
            return Progress::Waiting(request);
        }
        let Some(reader) = request.reader.as_mut() else {
            return Progress::Waiting(request);
        };

        *stepped = true;
        match reader.step(budget, ctx) {
            Ok(ReadStatus::Pending) => Progress::Waiting(request),
            Ok(ReadStatus::Done) => {
                let value = reader.take_result().unwrap_or_default();
                log::debug!(
                    "Constructed '{}' in {} units over {} steps",
                    request.resource.path(),
                    reader.units(),
                    reader.steps()
                );
                Progress::Finished(request.callback, Ok(value))
            }
            Err(error) => Progress::Finished(request.callback, Err(error)),
        }
    }
}

impl std::fmt::Debug for ObjectLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLoader")
            .field("pending", &self.pending())
            .field("types", &self.types.len())
            .finish()
    }
}
