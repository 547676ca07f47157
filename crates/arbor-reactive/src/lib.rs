#![forbid(unsafe_code)]

//! Hook-based reactive attributes for arbor document trees.
//!
//! Node types registered as reactive get attributes whose values are
//! computed by functions that can keep state between passes through hooks.
//! A [`DocumentComputation`] walks a document, runs every reactive node,
//! resolves cross-node dependencies within the pass and reports which nodes
//! changed.
//!
//! # Layers
//!
//! | Layer | Type | Owns |
//! |-------|------|------|
//! | Hook cells | [`HookRuntime`] | cursor, retained state, effect teardowns |
//! | Attribute | [`AttributeComputation`] | one compute function and its runtime |
//! | Node | [`NodeComputation`] | one attribute computation per reactive attr, shadow copy |
//! | Document | [`DocumentComputation`] | node computations by stable ID, shared state |
//!
//! # Example
//!
//! ```
//! use arbor_model::{Node, json};
//! use arbor_reactive::{DocumentComputation, DocumentConfig, NodeTypeSpec, Reaction, Schema};
//!
//! let schema = Schema::builder()
//!     .node(NodeTypeSpec::new("doc"))
//!     .node(
//!         NodeTypeSpec::new("calc")
//!             .reactive()
//!             .attrs(["id", "x"])
//!             .reactive_attr("square", |node, _| {
//!                 let x = node.attr_i64("x").unwrap_or(0);
//!                 Ok(Reaction::ready(x * x))
//!             }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let doc = Node::from_json(json!({
//!     "type": "doc",
//!     "content": [{ "type": "calc", "attrs": { "id": "c", "x": 3 } }]
//! }))
//! .unwrap();
//!
//! let mut computation = DocumentComputation::new(schema, DocumentConfig::new().with_invalidate(|_| {}));
//! let invalidated = computation.run(&doc).unwrap();
//! assert_eq!(invalidated["c"], 0..1);
//! assert_eq!(computation.available_nodes()["c"].attr_i64("square"), Some(9));
//! ```
//!
//! Everything is single-threaded: handles are `Rc`-based and not `Send`.

pub mod attribute;
pub mod clock;
pub mod deferred;
pub mod document;
pub mod error;
pub mod hooks;
pub mod node;
pub mod schema;
pub mod state;

pub use attribute::{AttrFn, AttrKey, AttributeComputation, OnInvalidateAttr};
pub use clock::{ManualScheduler, TimerId};
pub use deferred::{AvailableNodes, DeferredRequest, NodeId, Reaction};
pub use document::{DocumentComputation, DocumentConfig, InvalidationMap};
pub use error::{ReactiveError, Result};
pub use hooks::{HookKind, HookRuntime, Hooks, Liveness, StateSetter, Teardown};
pub use node::{NodeComputation, NodeUpdate, OnInvalidateNode};
pub use schema::{DEFAULT_ID_ATTR, NodeTypeSpec, Schema, SchemaBuilder};
pub use state::{DocumentScope, KeyPathState, SharedState, StateMap};
