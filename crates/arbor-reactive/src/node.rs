//! Reactive computation for one node.
//!
//! # Design
//!
//! A [`NodeComputation`] owns one [`AttributeComputation`] per reactive attr
//! of its node type and a private shadow copy of the node. Each run rebases
//! the shadow on the authored node, then overlays the latest reactive values.
//! Compute functions always see the authored node, never the shadow.
//!
//! When some attrs defer, the run yields a single combined request for the
//! union of their IDs. Resolving it finishes those attrs and returns the
//! updated snapshot.
//!
//! # Invariants
//!
//! 1. Attributes are evaluated in declaration order.
//! 2. `changed` is true iff at least one reactive value differs from the value
//!    it had after the previous run of this computation.
//! 3. Snapshots share children with the authored node.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use arbor_model::Node;
use serde_json::Value;
use tracing::trace;

use crate::attribute::{AttrKey, AttributeComputation, OnInvalidateAttr};
use crate::deferred::{DeferredRequest, NodeId, Reaction};
use crate::error::Result;
use crate::schema::NodeTypeSpec;
use crate::state::DocumentScope;

/// Notified with the node ID whenever one of the node's attrs invalidates.
pub type OnInvalidateNode = Rc<dyn Fn(&str)>;

/// Result of one node run.
#[derive(Clone, Debug)]
pub struct NodeUpdate {
    /// Whether any reactive value changed.
    pub changed: bool,
    /// Snapshot with the reactive values applied.
    pub node: Rc<Node>,
}

struct ReactedState {
    shadow: Node,
    values: BTreeMap<AttrKey, Value>,
    has_run: bool,
}

impl ReactedState {
    fn rebase(&mut self, node: &Node) {
        self.shadow = node.copy_with_attrs(&self.values);
        self.has_run = true;
    }

    /// Store `value` and report whether it differs from the previous one.
    fn apply(&mut self, key: &str, value: Value) -> bool {
        let changed = self.values.get(key) != Some(&value);
        self.shadow.set_attr(key, value.clone());
        self.values.insert(key.to_string(), value);
        changed
    }

    fn snapshot(&self) -> Rc<Node> {
        Rc::new(self.shadow.clone())
    }
}

pub struct NodeComputation {
    id: NodeId,
    node_type: String,
    attrs: Vec<AttributeComputation>,
    reacted: Rc<RefCell<ReactedState>>,
}

impl fmt::Debug for NodeComputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeComputation")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

impl NodeComputation {
    pub fn new(id: impl Into<NodeId>, spec: &NodeTypeSpec, on_invalidate: Option<OnInvalidateNode>) -> Self {
        let id = id.into();
        let attr_invalidate = on_invalidate.map(|callback| {
            let id = id.clone();
            Rc::new(move |attr: &str| {
                trace!(node = %id, attr, "attr invalidated");
                callback(&id);
            }) as OnInvalidateAttr
        });
        let attrs = spec
            .reactive_attrs()
            .map(|(key, compute)| AttributeComputation::new(key, Rc::clone(compute), attr_invalidate.clone()))
            .collect();
        Self {
            id,
            node_type: spec.name().to_string(),
            attrs,
            reacted: Rc::new(RefCell::new(ReactedState {
                shadow: Node::new(spec.name()),
                values: BTreeMap::new(),
                has_run: false,
            })),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Type this computation was built for.
    #[must_use]
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn attrs(&self) -> &[AttributeComputation] {
        &self.attrs
    }

    /// Evaluate every reactive attr against the authored `node`.
    ///
    /// # Errors
    ///
    /// The first attribute error aborts the run. Attributes evaluated before
    /// it keep their new state and have flushed their effects.
    pub fn run(&mut self, node: &Node, scope: &DocumentScope) -> Result<Reaction<NodeUpdate>> {
        self.reacted.borrow_mut().rebase(node);

        let mut results = Vec::with_capacity(self.attrs.len());
        for attr in &mut self.attrs {
            let reaction = attr.run(node, scope)?;
            results.push((attr.key().to_string(), reaction));
        }

        let mut changed = false;
        let mut deferred = Vec::new();
        {
            let mut reacted = self.reacted.borrow_mut();
            for (key, reaction) in results {
                match reaction {
                    Reaction::Ready(value) => changed |= reacted.apply(&key, value),
                    Reaction::Deferred(request) => deferred.push((key, request)),
                }
            }
            if deferred.is_empty() {
                return Ok(Reaction::Ready(NodeUpdate {
                    changed,
                    node: reacted.snapshot(),
                }));
            }
        }

        let requested: BTreeSet<NodeId> = deferred
            .iter()
            .flat_map(|(_, request)| request.requested_ids().iter().cloned())
            .collect();
        trace!(node = %self.id, waiting_on = requested.len(), "node deferred");
        let reacted = Rc::clone(&self.reacted);
        Ok(Reaction::Deferred(DeferredRequest::new(requested, move |nodes| {
            let values: Vec<_> = deferred
                .into_iter()
                .map(|(key, request)| (key, request.resolve(nodes)))
                .collect();
            let mut reacted = reacted.borrow_mut();
            let mut changed = changed;
            for (key, value) in values {
                changed |= reacted.apply(&key, value);
            }
            NodeUpdate {
                changed,
                node: reacted.snapshot(),
            }
        })))
    }

    /// Latest snapshot, or `None` before the first run.
    #[must_use]
    pub fn reacted_copy(&self) -> Option<Rc<Node>> {
        let reacted = self.reacted.borrow();
        reacted.has_run.then(|| reacted.snapshot())
    }

    /// Last value computed for `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Value> {
        self.reacted.borrow().values.get(key).cloned()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.attrs.iter().all(AttributeComputation::is_alive)
    }

    /// Destroy every attribute computation, in declaration order.
    pub fn destroy(&mut self) {
        for attr in &mut self.attrs {
            attr.destroy();
        }
    }
}
