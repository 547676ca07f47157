#![forbid(unsafe_code)]

//! Arbor public facade crate.
//!
//! Re-exports the document model and the reactive engine, and provides
//! [`reacted_document`] for one-shot evaluation of a tree.

pub use arbor_model as model;
#[cfg(feature = "reactive")]
pub use arbor_reactive as reactive;

pub mod prelude {
    pub use arbor_model::{Attrs, Node, Value, json};
    #[cfg(feature = "reactive")]
    pub use arbor_reactive::{
        DocumentComputation, DocumentConfig, Hooks, ManualScheduler, NodeTypeSpec, Reaction,
        ReactiveError, Result, Schema, StateMap, StateSetter, Teardown,
    };
}

#[cfg(feature = "reactive")]
use arbor_model::Node;
#[cfg(feature = "reactive")]
use arbor_reactive::{DocumentComputation, DocumentConfig, Schema, StateMap};

/// Evaluate every reactive node of `doc` once and return the tree with
/// reactive attrs filled in.
///
/// State updates made by effects after the pass go nowhere; the computation
/// is dropped, and its teardowns run, before this returns.
///
/// # Errors
///
/// Whatever the pass returns: compute failures or hook violations.
#[cfg(feature = "reactive")]
pub fn reacted_document(schema: Schema, doc: &Node) -> arbor_reactive::Result<Node> {
    reacted_document_with_state(schema, doc, StateMap::new())
}

/// Like [`reacted_document`], seeding the document-scoped state.
#[cfg(feature = "reactive")]
pub fn reacted_document_with_state(
    schema: Schema,
    doc: &Node,
    document_state: StateMap,
) -> arbor_reactive::Result<Node> {
    let config = DocumentConfig::new()
        .with_invalidate(|id| tracing::trace!(node = id, "update after one-shot pass ignored"))
        .with_document_state(document_state);
    let mut computation = DocumentComputation::new(schema, config);
    computation.run(doc)?;
    Ok(rebuild(doc, &computation))
}

#[cfg(feature = "reactive")]
fn rebuild(node: &Node, computation: &DocumentComputation) -> Node {
    let base = match computation.reacted_copy(node) {
        Some(reacted) => Node::clone(&reacted),
        None => node.clone(),
    };
    if node.children().is_empty() {
        return base;
    }
    base.with_children(node.children().iter().map(|child| rebuild(child, computation)))
}
