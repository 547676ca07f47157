//! Hook API handed to reactive attribute compute functions.
//!
//! A compute function receives a [`Hooks`] handle for the duration of one
//! evaluation. Hooks must be called unconditionally and in the same order on
//! every evaluation of the same attribute.
//!
//! | Hook | Retains across evaluations |
//! |------|----------------------------|
//! | [`use_state`](Hooks::use_state) | a value plus a setter that can request re-evaluation |
//! | [`use_effect`](Hooks::use_effect) | the last teardown and deps |
//! | [`use_ref`](Hooks::use_ref) | a mutable box that never requests re-evaluation |
//! | [`use_document_state`](Hooks::use_document_state) | nothing per attr; the map lives on the document |
//! | [`use_transaction_state`](Hooks::use_transaction_state) | nothing; the map lives for the current pass |
//! | [`use_deferred_node`](Hooks::use_deferred_node) | nothing; builds a [`Reaction`] to return |

mod runtime;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use arbor_model::Node;
use serde_json::Value;

pub(crate) use runtime::Invalidator;
pub use runtime::{HookRuntime, Liveness, StateSetter, Teardown};

use crate::deferred::{DeferredRequest, NodeId, Reaction};
use crate::error::Result;
use crate::state::{DocumentScope, SharedState, StateMap};

/// Kind of a retained hook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    State,
    Effect,
    Ref,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::State => "state",
            Self::Effect => "effect",
            Self::Ref => "ref",
        })
    }
}

/// Per-evaluation hook handle.
pub struct Hooks<'a> {
    runtime: &'a HookRuntime,
    scope: &'a DocumentScope,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(runtime: &'a HookRuntime, scope: &'a DocumentScope) -> Self {
        Self { runtime, scope }
    }

    /// Key of the attribute being computed.
    #[must_use]
    pub fn attr(&self) -> &str {
        self.runtime.attr()
    }

    /// Retained state. `initial` is used only on the first evaluation.
    pub fn use_state<T>(&mut self, initial: T) -> Result<(T, StateSetter<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        self.runtime.use_state(move || initial)
    }

    /// Like [`use_state`](Self::use_state) with a lazily built initial value.
    pub fn use_state_with<T>(&mut self, init: impl FnOnce() -> T) -> Result<(T, StateSetter<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        self.runtime.use_state(init)
    }

    /// Side effect run after every successful evaluation.
    pub fn use_effect<F>(&mut self, effect: F) -> Result<()>
    where
        F: FnOnce() -> Option<Teardown> + 'static,
    {
        self.runtime.use_effect(None::<()>, effect)
    }

    /// Side effect run only when `deps` differs from the last run's deps.
    pub fn use_effect_with<D, F>(&mut self, deps: D, effect: F) -> Result<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<Teardown> + 'static,
    {
        self.runtime.use_effect(Some(deps), effect)
    }

    /// Mutable box retained across evaluations. Writes never invalidate.
    pub fn use_ref<T: 'static>(&mut self, initial: T) -> Result<Rc<RefCell<T>>> {
        self.runtime.use_ref(move || initial)
    }

    /// Map at `path` in the document-scoped state.
    pub fn use_document_state(&mut self, path: &[&str], initial: StateMap) -> SharedState {
        self.scope.document().get(path, initial)
    }

    /// Map at `path` in the state of the current pass.
    pub fn use_transaction_state(&mut self, path: &[&str], initial: StateMap) -> SharedState {
        self.scope.transaction().get(path, initial)
    }

    /// Defer this attribute until the node `id` has resolved.
    ///
    /// `resolve` receives `None` if no node with that ID is in the document.
    pub fn use_deferred_node<V, F>(&mut self, id: impl Into<NodeId>, resolve: F) -> Reaction<Value>
    where
        V: Into<Value>,
        F: FnOnce(Option<&Rc<Node>>) -> V + 'static,
    {
        let id = id.into();
        DeferredRequest::single(id.clone(), move |nodes| resolve(nodes.get(&id)).into()).into()
    }

    /// Defer this attribute until every node in `ids` has resolved.
    ///
    /// `resolve` receives one entry per requested ID in the order given.
    pub fn use_deferred_nodes<I, S, V, F>(&mut self, ids: I, resolve: F) -> Reaction<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
        V: Into<Value>,
        F: FnOnce(&[Option<Rc<Node>>]) -> V + 'static,
    {
        let ids: Vec<NodeId> = ids.into_iter().map(Into::into).collect();
        let requested = ids.clone();
        DeferredRequest::new(requested, move |nodes| {
            let resolved: Vec<_> = ids.iter().map(|id| nodes.get(id).cloned()).collect();
            resolve(&resolved).into()
        })
        .into()
    }

    /// Liveness of this attribute, for effects that outlive the evaluation.
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.runtime.liveness()
    }
}
