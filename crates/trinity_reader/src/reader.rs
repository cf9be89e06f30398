//! Time-budgeted object graph reader
//!
//! [`ObjectReader`] turns a [`Node`] tree into live objects in small units of
//! work and stops whenever the frame budget runs out. Calling
//! [`step`](ObjectReader::step) again resumes exactly where it stopped.
//!
//! ## Phases
//!
//! - **Running**: nodes are popped from an explicit stack and constructed
//! - **Initializing**: the stack is empty; queued `initialize` hooks run in
//!   the order their objects finished
//! - **Done**: the root value is available
//!
//! Children are pushed in reverse so they are visited in declaration order.
//! Ids are registered when their node is popped, before any of its children,
//! and the id table spans the whole read.
//!
//! ```ignore
//! let mut reader = ObjectReader::new(root, types.clone());
//! // Each frame
//! let budget = FrameBudget::from_millis(&clock, 4);
//! if reader.step(&budget, &InitContext::with_registry(&registry))? == ReadStatus::Done {
//!     let scene = reader.take_result();
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use trinity_core::{FrameBudget, SystemClock};

use crate::coerce::coerce_leaf;
use crate::error::{ReaderError, Result};
use crate::node::Node;
use crate::object::InitContext;
use crate::types::TypeRegistry;
use crate::value::{ListRef, ObjectRef, Value};

/// Outcome of one [`ObjectReader::step`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// The budget ran out; call again next frame
    Pending,
    /// The graph is complete
    Done,
}

/// Where a reader is in its work
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadPhase {
    /// Constructing nodes
    Running,
    /// Running deferred initialization
    Initializing,
    /// Finished
    Done,
}

enum Target {
    Root,
    Object(ObjectRef),
    List(ListRef),
}

enum Key {
    Root,
    Field(String),
    Index(usize),
}

struct Frame {
    /// `None` marks deferred initialization of the target object
    node: Option<Arc<Node>>,
    target: Target,
    key: Key,
}

/// Resumable builder of one object graph
pub struct ObjectReader {
    types: Arc<TypeRegistry>,
    stack: Vec<Frame>,
    init_queue: VecDeque<ObjectRef>,
    ids: HashMap<String, Value>,
    root: Option<Value>,
    error: Option<ReaderError>,
    units: u64,
    steps: u64,
}

impl ObjectReader {
    /// Reader for the tree under `root`
    pub fn new(root: Arc<Node>, types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            stack: vec![Frame {
                node: Some(root),
                target: Target::Root,
                key: Key::Root,
            }],
            init_queue: VecDeque::new(),
            ids: HashMap::new(),
            root: None,
            error: None,
            units: 0,
            steps: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> ReadPhase {
        if !self.stack.is_empty() {
            ReadPhase::Running
        } else if !self.init_queue.is_empty() {
            ReadPhase::Initializing
        } else {
            ReadPhase::Done
        }
    }

    /// Check if the graph is complete
    pub fn is_done(&self) -> bool {
        self.error.is_none() && self.phase() == ReadPhase::Done
    }

    /// Error that aborted the read, if any
    pub fn error(&self) -> Option<&ReaderError> {
        self.error.as_ref()
    }

    /// Units of work performed so far
    pub fn units(&self) -> u64 {
        self.units
    }

    /// Number of `step` calls that did work
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Value registered under `id`
    pub fn lookup(&self, id: &str) -> Option<&Value> {
        self.ids.get(id)
    }

    /// The root value, once done
    pub fn result(&self) -> Option<&Value> {
        if self.is_done() {
            self.root.as_ref()
        } else {
            None
        }
    }

    /// Move the root value out, once done
    pub fn take_result(&mut self) -> Option<Value> {
        if self.is_done() {
            self.root.take()
        } else {
            None
        }
    }

    /// Do work until the graph is complete or `budget` runs out
    ///
    /// At least one unit of work runs per call, so a zero budget still makes
    /// progress. Once a call fails, every later call returns the same error.
    pub fn step(&mut self, budget: &FrameBudget<'_>, ctx: &InitContext<'_>) -> Result<ReadStatus> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.phase() == ReadPhase::Done {
            return Ok(ReadStatus::Done);
        }

        self.steps += 1;
        let mut worked = false;
        loop {
            if worked && budget.exhausted() {
                log::trace!("Object reader yielding after {} units", self.units);
                return Ok(ReadStatus::Pending);
            }

            if let Some(frame) = self.stack.pop() {
                if let Err(error) = self.process(frame) {
                    log::error!("Object read aborted: {}", error);
                    self.error = Some(error.clone());
                    return Err(error);
                }
            } else if let Some(object) = self.init_queue.pop_front() {
                object.write().initialize(ctx);
            } else {
                return Ok(ReadStatus::Done);
            }

            self.units += 1;
            worked = true;
        }
    }

    /// Step with an unlimited budget and return the root value
    pub fn run_to_completion(&mut self, ctx: &InitContext<'_>) -> Result<Value> {
        let clock = SystemClock::new();
        self.step(&FrameBudget::unlimited(&clock), ctx)?;
        Ok(self.take_result().unwrap_or_default())
    }

    fn process(&mut self, frame: Frame) -> Result<()> {
        let Frame { node, target, key } = frame;

        let Some(node) = node else {
            if let Target::Object(object) = target {
                if object.read().needs_initialize() {
                    self.init_queue.push_back(object);
                }
            }
            return Ok(());
        };

        if let Some(id) = node.reference() {
            let value = self
                .ids
                .get(id)
                .cloned()
                .ok_or_else(|| ReaderError::UnresolvedReference {
                    id: id.to_string(),
                    node: node.name().to_string(),
                })?;
            self.assign(&target, &key, value);
            return Ok(());
        }

        if let Some(type_name) = node.type_name() {
            let object = self.types.create_for(type_name, node.name())?;
            self.stack.push(Frame {
                node: None,
                target: Target::Object(object.clone()),
                key: Key::Root,
            });
            for child in node.children().iter().rev() {
                self.stack.push(Frame {
                    node: Some(child.clone()),
                    target: Target::Object(object.clone()),
                    key: Key::Field(child.name().to_string()),
                });
            }
            self.finish_container(&node, Value::Object(object), &target, &key);
            return Ok(());
        }

        if node.is_list() {
            let list: ListRef = Arc::new(RwLock::new(Vec::with_capacity(node.children().len())));
            for (index, child) in node.children().iter().enumerate().rev() {
                self.stack.push(Frame {
                    node: Some(child.clone()),
                    target: Target::List(list.clone()),
                    key: Key::Index(index),
                });
            }
            self.finish_container(&node, Value::List(list), &target, &key);
            return Ok(());
        }

        let value = coerce_leaf(&node)?;
        self.assign(&target, &key, value);
        Ok(())
    }

    fn finish_container(&mut self, node: &Node, value: Value, target: &Target, key: &Key) {
        if let Some(id) = node.id() {
            if self.ids.insert(id.to_string(), value.clone()).is_some() {
                log::warn!("Duplicate id '{}' on <{}>; later node wins", id, node.name());
            }
        }
        self.assign(target, key, value);
    }

    fn assign(&mut self, target: &Target, key: &Key, value: Value) {
        match (target, key) {
            (Target::Root, _) => self.root = Some(value),
            (Target::Object(object), Key::Field(name)) => {
                let mut object = object.write();
                if let Err(error) = object.set_field(name, value) {
                    log::warn!("{}; skipped", error);
                }
            }
            (Target::List(list), Key::Index(index)) => {
                let mut list = list.write();
                if *index >= list.len() {
                    list.resize(*index + 1, Value::Null);
                }
                list[*index] = value;
            }
            _ => log::warn!("Value with no place to go dropped"),
        }
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("phase", &self.phase())
            .field("stack", &self.stack.len())
            .field("init_queue", &self.init_queue.len())
            .field("ids", &self.ids.len())
            .field("units", &self.units)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use trinity_core::ManualClock;

    use crate::error::FieldError;
    use crate::object::{Dict, ReadObject};

    /// Records the order fields arrive and when it was initialized
    #[derive(Default)]
    struct Probe {
        seen: Vec<String>,
        initialized: bool,
    }

    impl ReadObject for Probe {
        fn type_name(&self) -> &str {
            "Probe"
        }

        fn set_field(&mut self, name: &str, _value: Value) -> std::result::Result<(), FieldError> {
            if name == "bogus" {
                return Err(FieldError::unknown("Probe", name));
            }
            self.seen.push(name.to_string());
            Ok(())
        }

        fn get_field(&self, _name: &str) -> Option<Value> {
            None
        }

        fn field_names(&self) -> Vec<String> {
            Vec::new()
        }

        fn needs_initialize(&self) -> bool {
            true
        }

        fn initialize(&mut self, _ctx: &InitContext<'_>) {
            self.initialized = true;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn types() -> Arc<TypeRegistry> {
        let mut types = TypeRegistry::new();
        types.register::<Probe>("Probe");
        Arc::new(types)
    }

    fn read(xml: &str) -> Result<Value> {
        let root = Node::parse_xml(xml)?;
        ObjectReader::new(root, types()).run_to_completion(&InitContext::new())
    }

    #[test]
    fn test_fields_arrive_in_declaration_order() {
        let value = read("<p type=\"Probe\"><c>1</c><a>2</a><bogus>3</bogus><b>4</b></p>").unwrap();
        let seen = value.with_object(|p: &Probe| (p.seen.clone(), p.initialized)).unwrap();
        assert_eq!(seen.0, vec!["c", "a", "b"]);
        assert!(seen.1);
    }

    #[test]
    fn test_list_indices_and_dict() {
        let value = read(
            r#"<d type="dict">
                <items list="1"><i>1</i><i>two</i><i>on</i></items>
                <speed>2.5</speed>
            </d>"#,
        )
        .unwrap();

        let items = value.with_object(|d: &Dict| d.get("items").cloned()).unwrap().unwrap();
        let items = items.as_list().unwrap().read().clone();
        assert_eq!(items, vec![Value::Int(1), Value::from("two"), Value::Bool(true)]);
        assert_eq!(
            value.with_object(|d: &Dict| d.get("speed").cloned()).unwrap(),
            Some(Value::Float(2.5))
        );
    }

    #[test]
    fn test_back_reference_is_same_instance() {
        let value = read(
            r#"<l list="1">
                <a type="dict" id="A"><n>1</n></a>
                <holder type="dict"><link ref="A"/></holder>
                <again ref="A"/>
            </l>"#,
        )
        .unwrap();

        let list = value.as_list().unwrap().read().clone();
        let target = list[0].as_object().unwrap().clone();
        let linked = list[1].with_object(|d: &Dict| d.get("link").cloned()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&target, linked.as_object().unwrap()));
        assert!(Arc::ptr_eq(&target, list[2].as_object().unwrap()));
    }

    #[test]
    fn test_unknown_type_is_fatal_and_sticky() {
        let root = Node::parse_xml(r#"<l list="1"><ok>1</ok><x type="Nope"/></l>"#).unwrap();
        let mut reader = ObjectReader::new(root, types());
        let clock = ManualClock::new();
        let budget = FrameBudget::unlimited(&clock);

        let err = reader.step(&budget, &InitContext::new()).unwrap_err();
        assert_eq!(
            err,
            ReaderError::UnknownType {
                type_name: "Nope".into(),
                node: "x".into()
            }
        );
        assert_eq!(reader.step(&budget, &InitContext::new()).unwrap_err(), err);
        assert!(reader.result().is_none());
    }

    #[test]
    fn test_unresolved_reference_is_fatal() {
        let err = read(r#"<l list="1"><a ref="later"/><b type="dict" id="later"/></l>"#).unwrap_err();
        assert!(matches!(err, ReaderError::UnresolvedReference { ref id, .. } if id == "later"));
    }

    #[test]
    fn test_bad_json_is_fatal() {
        let err = read(r#"<d type="dict"><v json="1">{oops</v></d>"#).unwrap_err();
        assert!(matches!(err, ReaderError::BadJson { .. }));
    }

    #[test]
    fn test_zero_budget_still_progresses() {
        let root = Node::parse_xml(r#"<p type="Probe"><a>1</a><b>2</b></p>"#).unwrap();
        let mut reader = ObjectReader::new(root, types());
        let clock = ManualClock::new();

        let mut calls = 0;
        loop {
            calls += 1;
            let status = reader.step(&FrameBudget::zero(&clock), &InitContext::new()).unwrap();
            if status == ReadStatus::Done {
                break;
            }
            assert!(calls < 100);
        }
        // Probe, two fields, the init marker, then initialize
        assert_eq!(reader.units(), 5);
        assert_eq!(reader.phase(), ReadPhase::Done);
        assert!(reader.result().is_some());
    }

    #[test]
    fn test_phases_in_order() {
        let root = Node::parse_xml(r#"<p type="Probe"><a>1</a></p>"#).unwrap();
        let mut reader = ObjectReader::new(root, types());
        let clock = ManualClock::new();
        let ctx = InitContext::new();
        assert_eq!(reader.phase(), ReadPhase::Running);

        // Probe, field, init marker
        for _ in 0..3 {
            reader.step(&FrameBudget::zero(&clock), &ctx).unwrap();
        }
        assert_eq!(reader.phase(), ReadPhase::Initializing);

        assert_eq!(reader.step(&FrameBudget::zero(&clock), &ctx).unwrap(), ReadStatus::Pending);
        assert_eq!(reader.phase(), ReadPhase::Done);
        assert_eq!(reader.step(&FrameBudget::zero(&clock), &ctx).unwrap(), ReadStatus::Done);
    }
}
