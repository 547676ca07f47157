//! Whole-document pass.
//!
//! # Design
//!
//! A [`DocumentComputation`] keeps one [`NodeComputation`] per stable node ID.
//! [`run`](DocumentComputation::run) walks the document in order, runs every
//! reactive node and collects deferred requests. It then sweeps those
//! requests until all of them have resolved. A request may resolve once none
//! of its IDs belong to a request that is still outstanding.
//!
//! # Invariants
//!
//! 1. A deferred request never sees a snapshot from a node whose own request
//!    is still outstanding.
//! 2. After a successful pass, the available nodes hold exactly the nodes
//!    that carried a stable ID in the document, and a computation exists only
//!    for IDs among them whose node is of a reactive type.
//! 3. Transaction state is reset at the start of every pass; document state
//!    is never reset.
//!
//! # Failure Modes
//!
//! - **Compute error**: the pass stops and the error is returned. The
//!   previous pass's available nodes are kept.
//! - **Dependency cycle**: without the cycle guard the pass never returns.
//!   With it, a sweep that resolves nothing fails with
//!   [`ReactiveError::DeferredCycle`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use arbor_model::Node;
use tracing::{debug, debug_span, error, field, trace, warn};

use crate::deferred::{AvailableNodes, DeferredRequest, NodeId, Reaction};
use crate::error::{ReactiveError, Result};
use crate::node::{NodeComputation, NodeUpdate, OnInvalidateNode};
use crate::schema::{NodeTypeSpec, Schema};
use crate::state::{DocumentScope, StateMap};

/// Invalidated node IDs with their position ranges in the pass's document.
pub type InvalidationMap = BTreeMap<NodeId, Range<usize>>;

/// Options for a [`DocumentComputation`].
#[derive(Clone, Default)]
pub struct DocumentConfig {
    on_invalidate: Option<OnInvalidateNode>,
    document_state: StateMap,
    cycle_guard: bool,
}

impl fmt::Debug for DocumentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentConfig")
            .field("on_invalidate", &self.on_invalidate.is_some())
            .field("document_state", &self.document_state)
            .field("cycle_guard", &self.cycle_guard)
            .finish()
    }
}

impl DocumentConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the node ID when a node's retained state changes.
    #[must_use]
    pub fn with_invalidate(mut self, callback: impl Fn(&str) + 'static) -> Self {
        self.on_invalidate = Some(Rc::new(callback));
        self
    }

    /// Initial contents of the document-scoped state root.
    #[must_use]
    pub fn with_document_state(mut self, seed: StateMap) -> Self {
        self.document_state = seed;
        self
    }

    /// Fail a pass whose deferred requests stop making progress.
    #[must_use]
    pub fn with_cycle_guard(mut self, enabled: bool) -> Self {
        self.cycle_guard = enabled;
        self
    }

    #[must_use]
    pub fn cycle_guard(&self) -> bool {
        self.cycle_guard
    }
}

struct Placed {
    node: Rc<Node>,
    range: Range<usize>,
}

/// Nodes with a stable ID, in document order. A repeated ID keeps its first
/// position in the order but takes the later node and range.
#[derive(Default)]
struct Collected {
    order: Vec<NodeId>,
    placed: AHashMap<NodeId, Placed>,
}

impl Collected {
    fn from_document(doc: &Node, schema: &Schema) -> Self {
        let mut collected = Self::default();
        doc.descendants(|node, pos| {
            let Some(id) = schema.stable_id(node) else {
                return;
            };
            let placed = Placed {
                node: Rc::clone(node),
                range: pos..pos + node.node_size(),
            };
            if collected.placed.insert(id.clone(), placed).is_some() {
                trace!(node = %id, "duplicate stable ID; later node wins");
            } else {
                collected.order.push(id);
            }
        });
        collected
    }
}

pub struct DocumentComputation {
    schema: Schema,
    on_invalidate: Option<OnInvalidateNode>,
    cycle_guard: bool,
    scope: DocumentScope,
    available: AvailableNodes,
    nodes: BTreeMap<NodeId, NodeComputation>,
    passes: u64,
}

impl fmt::Debug for DocumentComputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentComputation")
            .field("id_attr", &self.schema.id_attr())
            .field("tracked", &self.nodes.len())
            .field("available", &self.available.len())
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

impl DocumentComputation {
    pub fn new(schema: Schema, config: DocumentConfig) -> Self {
        if config.on_invalidate.is_none() {
            warn!("no invalidate callback configured; state updates between passes will be dropped");
        }
        Self {
            schema,
            on_invalidate: config.on_invalidate,
            cycle_guard: config.cycle_guard,
            scope: DocumentScope::new(config.document_state),
            available: AvailableNodes::default(),
            nodes: BTreeMap::new(),
            passes: 0,
        }
    }

    /// Run one pass over `doc`.
    ///
    /// Returns the IDs whose reactive values changed, mapped to their
    /// position ranges in `doc`.
    ///
    /// # Errors
    ///
    /// Propagates the first compute or hook error, and with the cycle guard
    /// enabled reports requests that can never resolve.
    pub fn run(&mut self, doc: &Node) -> Result<InvalidationMap> {
        self.passes += 1;
        let span = debug_span!("arbor.run", pass = self.passes, nodes = field::Empty);
        let _guard = span.enter();

        self.scope.begin_transaction();
        let collected = Collected::from_document(doc, &self.schema);
        span.record("nodes", collected.order.len());

        let mut available = AvailableNodes::with_capacity(collected.order.len());
        let mut outstanding: Vec<(NodeId, DeferredRequest<NodeUpdate>)> = Vec::new();
        let mut invalidated: Vec<NodeId> = Vec::new();

        for id in &collected.order {
            let Some(placed) = collected.placed.get(id) else {
                continue;
            };
            let Some(spec) = self.schema.reactive_type(placed.node.node_type()) else {
                if let Some(mut old) = self.nodes.remove(id) {
                    debug!(
                        node = %id,
                        from = old.node_type(),
                        to = placed.node.node_type(),
                        "node no longer reactive; destroying"
                    );
                    old.destroy();
                }
                available.insert(id.clone(), Rc::clone(&placed.node));
                continue;
            };
            let computation = computation_for(&mut self.nodes, id, spec, &self.on_invalidate);
            let reaction = computation.run(&placed.node, &self.scope).map_err(|err| {
                error!(node = %id, %err, "node computation failed");
                err
            })?;
            match reaction {
                Reaction::Ready(update) => {
                    if update.changed {
                        invalidated.push(id.clone());
                    }
                    available.insert(id.clone(), update.node);
                }
                Reaction::Deferred(request) => outstanding.push((id.clone(), request)),
            }
        }

        let deferred = outstanding.len();
        resolve_outstanding(outstanding, &mut available, &mut invalidated, self.cycle_guard)?;

        self.available = available;
        let evicted = self.evict_missing();

        let map: InvalidationMap = invalidated
            .into_iter()
            .filter_map(|id| {
                let range = collected.placed.get(&id)?.range.clone();
                Some((id, range))
            })
            .collect();
        debug!(
            invalidated = map.len(),
            deferred,
            evicted,
            resolved = self.available.len(),
            tracked = self.nodes.len(),
            "pass complete"
        );
        Ok(map)
    }

    /// Latest reacted snapshot of `node`, if its ID is tracked.
    #[must_use]
    pub fn reacted_copy(&self, node: &Node) -> Option<Rc<Node>> {
        let id = self.schema.stable_id(node)?;
        if !self.nodes.contains_key(&id) {
            return None;
        }
        self.available.get(&id).cloned()
    }

    /// Whether `a` and `b` carry the same stable ID. Nodes without one never
    /// compare equal.
    #[must_use]
    pub fn compare_nodes_by_id(&self, a: &Node, b: &Node) -> bool {
        match (self.schema.stable_id(a), self.schema.stable_id(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Snapshots from the last successful pass, keyed by stable ID.
    #[must_use]
    pub fn available_nodes(&self) -> &AvailableNodes {
        &self.available
    }

    /// Document-scoped state shared by every compute function.
    #[must_use]
    pub fn document_state(&self) -> &DocumentScope {
        &self.scope
    }

    /// IDs that currently have a node computation, in sorted order.
    pub fn tracked_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn node_computation(&self, id: &str) -> Option<&NodeComputation> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of passes started so far.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    fn evict_missing(&mut self) -> usize {
        let available = &self.available;
        let before = self.nodes.len();
        self.nodes.retain(|id, computation| {
            let keep = available.contains_key(id);
            if !keep {
                debug!(node = %id, "evicting node computation");
                computation.destroy();
            }
            keep
        });
        before - self.nodes.len()
    }
}

/// Computation for `id`, replacing one built for a different node type.
fn computation_for<'a>(
    nodes: &'a mut BTreeMap<NodeId, NodeComputation>,
    id: &str,
    spec: &NodeTypeSpec,
    on_invalidate: &Option<OnInvalidateNode>,
) -> &'a mut NodeComputation {
    let stale = nodes
        .get(id)
        .is_some_and(|existing| existing.node_type() != spec.name());
    if stale && let Some(mut old) = nodes.remove(id) {
        debug!(node = %id, from = old.node_type(), to = spec.name(), "node type changed; recreating");
        old.destroy();
    }
    nodes.entry(id.to_string()).or_insert_with(|| {
        debug!(node = %id, node_type = spec.name(), "creating node computation");
        NodeComputation::new(id, spec, on_invalidate.clone())
    })
}

/// Sweep outstanding requests until none are left.
///
/// Within a sweep, a resolved request stops being outstanding immediately,
/// so later requests in the same sweep may depend on it.
fn resolve_outstanding(
    mut outstanding: Vec<(NodeId, DeferredRequest<NodeUpdate>)>,
    available: &mut AvailableNodes,
    invalidated: &mut Vec<NodeId>,
    cycle_guard: bool,
) -> Result<()> {
    let mut pending: AHashSet<NodeId> = outstanding.iter().map(|(id, _)| id.clone()).collect();
    let mut sweep = 0_usize;
    while !outstanding.is_empty() {
        sweep += 1;
        let before = outstanding.len();
        let mut waiting = Vec::with_capacity(before);
        for (id, request) in outstanding {
            if request.waits_on(|requested| pending.contains(requested)) {
                waiting.push((id, request));
                continue;
            }
            let update = request.resolve(available);
            pending.remove(&id);
            if update.changed {
                invalidated.push(id.clone());
            }
            available.insert(id, update.node);
        }
        trace!(sweep, resolved = before - waiting.len(), waiting = waiting.len(), "deferred sweep");
        if cycle_guard && waiting.len() == before {
            let mut stuck: Vec<NodeId> = waiting.into_iter().map(|(id, _)| id).collect();
            stuck.sort();
            let err = ReactiveError::DeferredCycle { pending: stuck };
            error!(%err, "deferred requests cannot make progress");
            return Err(err);
        }
        outstanding = waiting;
    }
    Ok(())
}
