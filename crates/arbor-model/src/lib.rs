#![forbid(unsafe_code)]

//! Document tree model for arbor.
//!
//! Nodes are immutable once built. A node carries a type name, a map of JSON
//! attribute values, ordered children shared through [`Rc`](std::rc::Rc), and
//! optional text content. Every node caches its flattened size so position
//! ranges can be computed during a single [`Node::descendants`] walk.
//!
//! # Flattened addressing
//!
//! - A text node's size is its character count.
//! - A childless, non-text node is a leaf of size 1.
//! - Any other node has size `2 + sum(children)` (an open and a close token).
//!
//! The content of the node a walk starts from begins at position 0.
//!
//! # Example
//!
//! ```
//! use arbor_model::Node;
//! use serde_json::json;
//!
//! let doc: Node = serde_json::from_value(json!({
//!     "type": "doc",
//!     "content": [
//!         { "type": "paragraph", "content": [{ "type": "text", "text": "hey" }] },
//!         { "type": "counter", "attrs": { "id": "c1" } }
//!     ]
//! }))
//! .unwrap();
//!
//! let mut positions = Vec::new();
//! doc.descendants(|node, pos| positions.push((node.node_type().to_string(), pos)));
//! assert_eq!(positions[2], ("counter".to_string(), 5));
//! ```

pub mod node;

pub use node::{Attrs, Node};

/// Re-exported so callers can build attribute values without a direct dependency.
pub use serde_json::{Value, json};
