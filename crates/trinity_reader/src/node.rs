//! Declarative node trees
//!
//! An object file is a tree of named nodes. Attributes steer construction:
//!
//! - `type`: name of the type to construct (`dict` for a generic map)
//! - `list`: the node is an ordered sequence
//! - `id`: register the constructed value for later references
//! - `ref`: use the value registered under this id
//! - `json`: the text is a JSON payload
//! - `notnum`: keep a JSON number array as JSON instead of packed floats
//!
//! Any other node is a scalar leaf whose text is coerced into a value.
//!
//! ```ignore
//! let root = Node::parse_xml(r#"
//!     <scene type="Scene">
//!         <objects list="1">
//!             <item type="Mesh" id="hull"><geometry>res:/ships/hull.geo</geometry></item>
//!             <item ref="hull"/>
//!         </objects>
//!     </scene>"#)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ReaderError, Result};

/// Attribute naming the type to construct
pub const TYPE_ATTR: &str = "type";
/// Attribute marking an ordered sequence
pub const LIST_ATTR: &str = "list";
/// Attribute registering the constructed value
pub const ID_ATTR: &str = "id";
/// Attribute referencing a registered value
pub const REF_ATTR: &str = "ref";
/// Attribute marking JSON text
pub const JSON_ATTR: &str = "json";
/// Attribute suppressing float array packing of JSON text
pub const NOTNUM_ATTR: &str = "notnum";

/// One node of a declarative tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    name: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Arc<Node>>,
    text: String,
}

impl Node {
    /// Empty node called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Set an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Append a child
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Append text
    pub fn with_text(mut self, text: impl AsRef<str>) -> Self {
        self.text.push_str(text.as_ref());
        self
    }

    /// Element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Check if an attribute is present, whatever its value
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// All attributes in key order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Child nodes in declaration order
    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    /// Text directly inside this node
    pub fn text(&self) -> &str {
        &self.text
    }

    /// This node's text followed by every descendant's, in document order
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push_str(&node.text);
            stack.extend(node.children.iter().rev().map(Arc::as_ref));
        }
        out
    }

    /// `type` attribute
    pub fn type_name(&self) -> Option<&str> {
        self.attribute(TYPE_ATTR)
    }

    /// `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.attribute(ID_ATTR)
    }

    /// `ref` attribute
    pub fn reference(&self) -> Option<&str> {
        self.attribute(REF_ATTR)
    }

    /// Check for the `list` attribute
    pub fn is_list(&self) -> bool {
        self.has_attribute(LIST_ATTR)
    }

    /// Total number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter().map(Arc::as_ref));
        }
        count
    }

    /// Parse the first element of an XML document
    ///
    /// Whitespace around text is trimmed; comments, processing instructions
    /// and the declaration are ignored.
    pub fn parse_xml(source: &str) -> Result<Arc<Node>> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut open: Vec<Node> = Vec::new();
        let mut root: Option<Node> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| ReaderError::Xml(format!("{e} at byte {}", reader.buffer_position())))?;
            match event {
                Event::Start(start) => open.push(element(&start)?),
                Event::Empty(start) => {
                    let node = element(&start)?;
                    attach(&mut open, &mut root, node);
                }
                Event::End(_) => {
                    let node = open
                        .pop()
                        .ok_or_else(|| ReaderError::Xml("unbalanced closing tag".into()))?;
                    attach(&mut open, &mut root, node);
                }
                Event::Text(text) => {
                    if let Some(node) = open.last_mut() {
                        let text = text.unescape().map_err(|e| ReaderError::Xml(e.to_string()))?;
                        node.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = open.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(ReaderError::Xml(format!("unclosed element <{}>", unclosed.name)));
        }
        root.map(Arc::new)
            .ok_or_else(|| ReaderError::Xml("document has no root element".into()))
    }

    /// Parse UTF-8 bytes of an XML document
    pub fn parse_xml_bytes(bytes: &[u8]) -> Result<Arc<Node>> {
        let source = std::str::from_utf8(bytes).map_err(|e| ReaderError::Xml(e.to_string()))?;
        Self::parse_xml(source)
    }
}

impl Drop for Node {
    // Unlinks uniquely owned subtrees one level at a time so deep trees do
    // not recurse on drop
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(child) = stack.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                stack.append(&mut node.children);
            }
        }
    }
}

fn element(start: &BytesStart<'_>) -> Result<Node> {
    let mut node = Node::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| ReaderError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| ReaderError::Xml(e.to_string()))?
            .into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

fn attach(open: &mut [Node], root: &mut Option<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.children.push(Arc::new(node)),
        None => {
            if root.is_none() {
                *root = Some(node);
            } else {
                log::warn!("Ignoring extra top-level element <{}>", node.name);
            }
        }
    }
}
