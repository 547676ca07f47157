//! Immutable document nodes.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute map of a node. Keys are kept sorted so snapshots are deterministic.
pub type Attrs = serde_json::Map<String, Value>;

/// Type name used for text nodes.
pub const TEXT_TYPE: &str = "text";

/// An immutable node in a document tree.
///
/// Cloning a `Node` is shallow with respect to its children: they are shared
/// through `Rc`. Builder methods consume `self` and return a new value with
/// the flattened size recomputed.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeJson", into = "NodeJson")]
pub struct Node {
    node_type: String,
    attrs: Attrs,
    children: Vec<Rc<Node>>,
    text: Option<String>,
    size: usize,
}

impl Node {
    /// Create a childless node of the given type with no attributes.
    #[must_use]
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attrs: Attrs::new(),
            children: Vec::new(),
            text: None,
            size: 1,
        }
    }

    /// Create a text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let size = text.chars().count();
        Self {
            node_type: TEXT_TYPE.to_string(),
            attrs: Attrs::new(),
            children: Vec::new(),
            text: Some(text),
            size,
        }
    }

    /// Set a single attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Replace the whole attribute map.
    #[must_use]
    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Replace the children.
    #[must_use]
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Rc<Node>>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self.size = self.compute_size();
        self
    }

    /// Structural copy with `overrides` layered on top of the current attrs.
    ///
    /// Children are shared with `self`, not deep-copied.
    #[must_use]
    pub fn copy_with_attrs<'a, I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut copy = self.clone();
        for (key, value) in overrides {
            copy.attrs.insert(key.clone(), value.clone());
        }
        copy
    }

    /// Set an attribute in place. Used by owners of a private copy.
    pub fn set_attr(&mut self, key: impl Into<String>, value: Value) {
        self.attrs.insert(key.into(), value);
    }

    #[must_use]
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    #[must_use]
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Look up one attribute.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Look up a string attribute.
    #[must_use]
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    /// Look up an integer attribute.
    #[must_use]
    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        self.attrs.get(key).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn children(&self) -> &[Rc<Node>] {
        &self.children
    }

    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    /// Whether this node occupies a single position.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.text.is_none() && self.children.is_empty()
    }

    /// Size of this node in the flattened addressing scheme.
    #[must_use]
    pub fn node_size(&self) -> usize {
        self.size
    }

    /// Size of this node's content (excludes the open and close tokens).
    #[must_use]
    pub fn content_size(&self) -> usize {
        self.children.iter().map(|c| c.node_size()).sum()
    }

    /// Call `f` for every descendant in document order with its start position.
    ///
    /// The node itself is not visited; its content starts at position 0.
    pub fn descendants<F>(&self, mut f: F)
    where
        F: FnMut(&Rc<Node>, usize),
    {
        self.walk_content(0, &mut f);
    }

    fn walk_content<F>(&self, start: usize, f: &mut F)
    where
        F: FnMut(&Rc<Node>, usize),
    {
        let mut pos = start;
        for child in &self.children {
            f(child, pos);
            child.walk_content(pos + 1, f);
            pos += child.node_size();
        }
    }

    fn compute_size(&self) -> usize {
        if let Some(text) = &self.text {
            text.chars().count()
        } else if self.children.is_empty() {
            1
        } else {
            2 + self.content_size()
        }
    }

    /// Parse a node from its JSON form.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Render this node to its JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        // A tree of strings and JSON maps always serializes.
        serde_json::to_value(NodeJson::from(self)).unwrap_or(Value::Null)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Node");
        s.field("type", &self.node_type);
        if !self.attrs.is_empty() {
            s.field("attrs", &self.attrs);
        }
        if let Some(text) = &self.text {
            s.field("text", text);
        }
        if !self.children.is_empty() {
            s.field("children", &self.children);
        }
        s.finish()
    }
}

/// Wire shape: `{ "type", "attrs"?, "content"?, "text"? }`.
#[derive(Serialize, Deserialize)]
struct NodeJson {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    content: Vec<NodeJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl From<NodeJson> for Node {
    fn from(json: NodeJson) -> Self {
        let base = match json.text {
            Some(text) => {
                let mut node = Node::text(text);
                node.node_type = json.node_type;
                node
            }
            None => Node::new(json.node_type),
        };
        base.with_attrs(json.attrs)
            .with_children(json.content.into_iter().map(Node::from))
    }
}

impl From<&Node> for NodeJson {
    fn from(node: &Node) -> Self {
        Self {
            node_type: node.node_type.clone(),
            attrs: node.attrs.clone(),
            content: node.children.iter().map(|c| NodeJson::from(&**c)).collect(),
            text: node.text.clone(),
        }
    }
}

impl From<Node> for NodeJson {
    fn from(node: Node) -> Self {
        NodeJson::from(&node)
    }
}
