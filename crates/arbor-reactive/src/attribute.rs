//! One reactive attribute of one node.

use std::fmt;
use std::rc::Rc;

use arbor_model::Node;
use serde_json::Value;
use tracing::warn;

use crate::deferred::Reaction;
use crate::error::Result;
use crate::hooks::{HookRuntime, Hooks, Invalidator, Liveness};
use crate::state::DocumentScope;

/// Attribute name.
pub type AttrKey = String;

/// Compute function of a reactive attribute.
///
/// Receives the node as authored and a hook handle. Returns the attribute's
/// value, or a deferred request that produces it later in the same pass.
pub type AttrFn = Rc<dyn Fn(&Node, &mut Hooks<'_>) -> Result<Reaction<Value>>>;

/// Notified with the attribute key whenever retained state changes.
pub type OnInvalidateAttr = Rc<dyn Fn(&str)>;

/// Pairs a compute function with the hook runtime that keeps its state.
///
/// Dropping an `AttributeComputation` destroys it.
pub struct AttributeComputation {
    key: AttrKey,
    compute: AttrFn,
    runtime: HookRuntime,
}

impl fmt::Debug for AttributeComputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeComputation")
            .field("key", &self.key)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl AttributeComputation {
    pub fn new(key: impl Into<AttrKey>, compute: AttrFn, on_invalidate: Option<OnInvalidateAttr>) -> Self {
        let key = key.into();
        let notify_key = key.clone();
        let invalidate: Invalidator = match on_invalidate {
            Some(callback) => Rc::new(move || callback(&notify_key)),
            None => Rc::new(move || {
                warn!(attr = %notify_key, "state changed but no invalidate callback is set; update dropped");
            }),
        };
        Self {
            runtime: HookRuntime::new(key.clone(), invalidate),
            key,
            compute,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.runtime.is_alive()
    }

    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.runtime.liveness()
    }

    /// Hook runtime backing this attribute.
    #[must_use]
    pub fn runtime(&self) -> &HookRuntime {
        &self.runtime
    }

    /// Evaluate against `node`.
    ///
    /// On success the queued effects are flushed before returning. On
    /// failure no effect runs and the error carries this attribute's key.
    pub fn run(&mut self, node: &Node, scope: &DocumentScope) -> Result<Reaction<Value>> {
        self.runtime.begin();
        let outcome = {
            let mut hooks = Hooks::new(&self.runtime, scope);
            (self.compute)(node, &mut hooks)
        };
        let reaction = match outcome {
            Ok(reaction) => reaction,
            Err(err) => {
                self.runtime.abort();
                return Err(err.with_attr(&self.key));
            }
        };
        self.runtime.finish()?;
        self.runtime.flush_effects();
        Ok(reaction)
    }

    /// Run registered teardowns and make every outstanding setter inert.
    pub fn destroy(&mut self) {
        self.runtime.destroy();
    }
}

impl Drop for AttributeComputation {
    fn drop(&mut self) {
        self.runtime.destroy();
    }
}
