//! # trinity_reader - Object Files
//!
//! Builds live object graphs from declarative node trees:
//! - **Nodes**: XML object files parsed with quick-xml
//! - **Types**: a closed name to constructor table
//! - **Reader**: a resumable state machine that yields when its frame budget
//!   runs out and picks up where it stopped
//! - **Loader**: object files cached as resources, constructed per request
//!
//! ## Example
//!
//! ```ignore
//! use trinity_reader::prelude::*;
//!
//! let mut types = TypeRegistry::new();
//! types.register::<Mesh>("Trinity.Mesh");
//!
//! let root = Node::parse_xml(source)?;
//! let mut reader = ObjectReader::new(root, Arc::new(types));
//! while reader.step(&FrameBudget::from_millis(&clock, 4), &InitContext::new())? == ReadStatus::Pending {
//!     next_frame();
//! }
//! ```

pub mod coerce;
pub mod config;
pub mod dump;
pub mod error;
pub mod loader;
pub mod node;
pub mod object;
pub mod reader;
pub mod types;
pub mod value;

pub use coerce::{coerce_leaf, coerce_text};
pub use config::ReaderConfig;
pub use error::{FieldError, ReaderError, Result};
pub use loader::{register_object_kind, ObjectCallback, ObjectLoader, ObjectResource, OBJECT_EXTENSIONS};
pub use node::Node;
pub use object::{Dict, InitContext, ReadObject};
pub use reader::{ObjectReader, ReadPhase, ReadStatus};
pub use types::{Constructor, TypeRegistry};
pub use value::{ListRef, ObjectRef, Value};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::ReaderConfig;
    pub use crate::error::{FieldError, ReaderError};
    pub use crate::loader::{ObjectLoader, ObjectResource};
    pub use crate::node::Node;
    pub use crate::object::{Dict, InitContext, ReadObject};
    pub use crate::reader::{ObjectReader, ReadPhase, ReadStatus};
    pub use crate::types::TypeRegistry;
    pub use crate::value::{ObjectRef, Value};
}
