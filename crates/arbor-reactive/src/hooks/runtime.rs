#![forbid(unsafe_code)]

//! Per-attribute hook storage.
//!
//! # Design
//!
//! A [`HookRuntime`] owns an ordered list of type-erased cells. Each hook call
//! during an evaluation advances a cursor and claims the cell at that
//! position. The first evaluation that completes seals the list: from then on
//! every evaluation must claim exactly the same cells in the same order.
//!
//! Effects are not run when they are declared. They are queued and flushed
//! only once the compute function has returned successfully and the cursor
//! check has passed.
//!
//! # Invariants
//!
//! 1. After sealing, the number of cells never changes.
//! 2. The cell at a given index always holds the same [`HookKind`] and value
//!    type.
//! 3. For any effect cell, at most one teardown is registered at a time, and
//!    it runs before the cell's callback runs again.
//! 4. After [`destroy`](HookRuntime::destroy), no callback, compute function
//!    or invalidation originating from this runtime runs again, except the
//!    teardowns that `destroy` itself runs (once each).
//!
//! # Failure Modes
//!
//! - **Extra hook after sealing**: [`ReactiveError::ConditionalHooks`].
//! - **Missing hooks at the end**: [`ReactiveError::ConditionalHooks`]; the
//!   queued effects are discarded.
//! - **Kind mismatch**: [`ReactiveError::HooksOutOfOrder`].
//! - **Value type mismatch**: [`ReactiveError::HookTypeMismatch`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::rc::Rc;

use tracing::{error, trace};

use super::HookKind;
use crate::error::{ReactiveError, Result};

/// Shared liveness flag of a [`HookRuntime`].
///
/// Clones observe the same flag. Once revoked it never becomes live again.
#[derive(Clone, Debug)]
pub struct Liveness(Rc<Cell<bool>>);

impl Liveness {
    pub(crate) fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.get()
    }

    fn revoke(&self) {
        self.0.set(false);
    }
}

/// Called when a state setter changes a value.
pub(crate) type Invalidator = Rc<dyn Fn()>;

/// Cleanup returned by an effect.
pub struct Teardown(Box<dyn FnOnce()>);

impl Teardown {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Teardown")
    }
}

/// Updates one state cell and asks for re-evaluation when the value changes.
///
/// Setters stay valid after the evaluation that produced them. Once the
/// owning runtime is destroyed they do nothing.
pub struct StateSetter<T> {
    value: Rc<RefCell<T>>,
    liveness: Liveness,
    invalidate: Invalidator,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            liveness: self.liveness.clone(),
            invalidate: Rc::clone(&self.invalidate),
        }
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("alive", &self.liveness.is_alive())
            .finish_non_exhaustive()
    }
}

impl<T: PartialEq + 'static> StateSetter<T> {
    /// Replace the stored value.
    pub fn set(&self, next: T) {
        self.update(move |_| next);
    }

    /// Compute the next value from the current one.
    ///
    /// Invalidation fires only if the new value differs from the old one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        if !self.liveness.is_alive() {
            trace!("state update after teardown ignored");
            return;
        }
        let next = f(&self.value.borrow());
        let changed = {
            let mut current = self.value.borrow_mut();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        };
        if changed {
            (self.invalidate)();
        }
    }
}

impl<T: Clone> StateSetter<T> {
    /// The value as of now, including updates made since the last evaluation.
    #[must_use]
    pub fn current(&self) -> T {
        self.value.borrow().clone()
    }
}

struct EffectCell {
    deps: Option<Box<dyn Any>>,
    teardown: Option<u64>,
}

enum HookCell {
    State(Rc<dyn Any>),
    Effect(EffectCell),
    Ref(Rc<dyn Any>),
}

impl HookCell {
    fn kind(&self) -> HookKind {
        match self {
            Self::State(_) => HookKind::State,
            Self::Effect(_) => HookKind::Effect,
            Self::Ref(_) => HookKind::Ref,
        }
    }
}

struct PendingEffect {
    index: usize,
    deps: Option<Box<dyn Any>>,
    callback: Box<dyn FnOnce() -> Option<Teardown>>,
}

#[derive(Default)]
struct RuntimeState {
    cells: Vec<HookCell>,
    cursor: usize,
    sealed: bool,
    pending: Vec<PendingEffect>,
    /// Registered teardowns, keyed in registration order.
    teardowns: BTreeMap<u64, Teardown>,
    next_teardown: u64,
}

enum Slot {
    Existing(usize),
    Fresh(usize),
    /// The runtime is destroyed; hooks hand out inert values.
    Inert,
}

/// Hook cells, cursor and effect queue for one reactive attribute.
pub struct HookRuntime {
    attr: String,
    state: RefCell<RuntimeState>,
    liveness: Liveness,
    invalidate: Invalidator,
}

impl fmt::Debug for HookRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HookRuntime")
            .field("attr", &self.attr)
            .field("cells", &state.cells.len())
            .field("sealed", &state.sealed)
            .field("alive", &self.liveness.is_alive())
            .finish()
    }
}

impl HookRuntime {
    pub(crate) fn new(attr: impl Into<String>, invalidate: Invalidator) -> Self {
        Self {
            attr: attr.into(),
            state: RefCell::default(),
            liveness: Liveness::new(),
            invalidate,
        }
    }

    #[must_use]
    pub fn attr(&self) -> &str {
        &self.attr
    }

    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Number of claimed cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.state.borrow().cells.len()
    }

    /// Whether an evaluation has completed and fixed the hook layout.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state.borrow().sealed
    }

    /// Start an evaluation.
    pub(crate) fn begin(&self) {
        let mut state = self.state.borrow_mut();
        state.cursor = 0;
        state.pending.clear();
    }

    /// End an evaluation whose compute function succeeded.
    ///
    /// Checks the cursor, seals the layout and leaves the effect queue ready
    /// for [`flush_effects`](Self::flush_effects).
    pub(crate) fn finish(&self) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        let mut state = self.state.borrow_mut();
        if state.cursor != state.cells.len() {
            state.pending.clear();
            let err = ReactiveError::ConditionalHooks {
                attr: self.attr.clone(),
                expected: state.cells.len(),
                found: state.cursor,
            };
            error!(attr = %self.attr, %err, "hook contract violated");
            return Err(err);
        }
        state.sealed = true;
        Ok(())
    }

    /// End an evaluation that failed. Queued effects never run.
    pub(crate) fn abort(&self) {
        self.state.borrow_mut().pending.clear();
    }

    fn claim(&self, kind: HookKind) -> Result<Slot> {
        if !self.is_alive() {
            return Ok(Slot::Inert);
        }
        let mut state = self.state.borrow_mut();
        let index = state.cursor;
        state.cursor += 1;
        let err = match state.cells.get(index) {
            Some(cell) if cell.kind() == kind => return Ok(Slot::Existing(index)),
            None if !state.sealed => return Ok(Slot::Fresh(index)),
            Some(cell) => ReactiveError::HooksOutOfOrder {
                attr: self.attr.clone(),
                index,
                expected: cell.kind(),
                found: kind,
            },
            None => ReactiveError::ConditionalHooks {
                attr: self.attr.clone(),
                expected: state.cells.len(),
                found: index + 1,
            },
        };
        error!(attr = %self.attr, %err, "hook contract violated");
        Err(err)
    }

    fn type_mismatch(&self, index: usize, kind: HookKind) -> ReactiveError {
        let err = ReactiveError::HookTypeMismatch {
            attr: self.attr.clone(),
            index,
            kind,
        };
        error!(attr = %self.attr, %err, "hook contract violated");
        err
    }

    pub(crate) fn use_state<T>(&self, init: impl FnOnce() -> T) -> Result<(T, StateSetter<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        let value = match self.claim(HookKind::State)? {
            Slot::Existing(index) => {
                let erased = match &self.state.borrow().cells[index] {
                    HookCell::State(value) => Rc::clone(value),
                    _ => return Err(self.type_mismatch(index, HookKind::State)),
                };
                erased
                    .downcast::<RefCell<T>>()
                    .map_err(|_| self.type_mismatch(index, HookKind::State))?
            }
            Slot::Fresh(_) => {
                let value = Rc::new(RefCell::new(init()));
                let erased: Rc<dyn Any> = value.clone();
                self.state.borrow_mut().cells.push(HookCell::State(erased));
                value
            }
            Slot::Inert => Rc::new(RefCell::new(init())),
        };
        let current = value.borrow().clone();
        let setter = StateSetter {
            value,
            liveness: self.liveness.clone(),
            invalidate: Rc::clone(&self.invalidate),
        };
        Ok((current, setter))
    }

    pub(crate) fn use_ref<T: 'static>(&self, init: impl FnOnce() -> T) -> Result<Rc<RefCell<T>>> {
        match self.claim(HookKind::Ref)? {
            Slot::Existing(index) => {
                let erased = match &self.state.borrow().cells[index] {
                    HookCell::Ref(value) => Rc::clone(value),
                    _ => return Err(self.type_mismatch(index, HookKind::Ref)),
                };
                erased
                    .downcast::<RefCell<T>>()
                    .map_err(|_| self.type_mismatch(index, HookKind::Ref))
            }
            Slot::Fresh(_) => {
                let value = Rc::new(RefCell::new(init()));
                let erased: Rc<dyn Any> = value.clone();
                self.state.borrow_mut().cells.push(HookCell::Ref(erased));
                Ok(value)
            }
            Slot::Inert => Ok(Rc::new(RefCell::new(init()))),
        }
    }

    /// Queue `callback` if `deps` is absent or differs from the last flushed
    /// deps of this cell.
    pub(crate) fn use_effect<D, F>(&self, deps: Option<D>, callback: F) -> Result<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<Teardown> + 'static,
    {
        let index = match self.claim(HookKind::Effect)? {
            Slot::Inert => return Ok(()),
            Slot::Existing(index) => {
                let state = self.state.borrow();
                let HookCell::Effect(cell) = &state.cells[index] else {
                    return Err(self.type_mismatch(index, HookKind::Effect));
                };
                let unchanged = match (&deps, &cell.deps) {
                    (Some(next), Some(prev)) => prev.downcast_ref::<D>() == Some(next),
                    _ => false,
                };
                if unchanged {
                    return Ok(());
                }
                index
            }
            Slot::Fresh(index) => {
                self.state.borrow_mut().cells.push(HookCell::Effect(EffectCell {
                    deps: None,
                    teardown: None,
                }));
                index
            }
        };
        self.state.borrow_mut().pending.push(PendingEffect {
            index,
            deps: deps.map(|d| Box::new(d) as Box<dyn Any>),
            callback: Box::new(callback),
        });
        Ok(())
    }

    /// Run queued effects in declaration order.
    ///
    /// For each one, the cell's previous teardown runs first, then the
    /// callback, then its returned teardown is registered.
    pub(crate) fn flush_effects(&self) {
        let pending = mem::take(&mut self.state.borrow_mut().pending);
        if !pending.is_empty() {
            trace!(attr = %self.attr, effects = pending.len(), "flushing effects");
        }
        for effect in pending {
            if !self.is_alive() {
                break;
            }
            let previous = {
                let mut guard = self.state.borrow_mut();
                let state = &mut *guard;
                match state.cells.get_mut(effect.index) {
                    Some(HookCell::Effect(cell)) => cell
                        .teardown
                        .take()
                        .and_then(|id| state.teardowns.remove(&id)),
                    _ => None,
                }
            };
            if let Some(teardown) = previous {
                teardown.run();
            }

            let next = (effect.callback)();

            if !self.is_alive() {
                if let Some(teardown) = next {
                    teardown.run();
                }
                break;
            }
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let id = next.map(|teardown| {
                let id = state.next_teardown;
                state.next_teardown += 1;
                state.teardowns.insert(id, teardown);
                id
            });
            if let Some(HookCell::Effect(cell)) = state.cells.get_mut(effect.index) {
                cell.deps = effect.deps;
                cell.teardown = id;
            }
        }
    }

    /// Revoke liveness and run every registered teardown in registration
    /// order. Calling it again does nothing.
    pub(crate) fn destroy(&self) {
        if !self.is_alive() {
            return;
        }
        self.liveness.revoke();
        let teardowns = {
            let mut state = self.state.borrow_mut();
            state.pending.clear();
            state.cells.clear();
            mem::take(&mut state.teardowns)
        };
        trace!(attr = %self.attr, teardowns = teardowns.len(), "destroying hook runtime");
        for teardown in teardowns.into_values() {
            teardown.run();
        }
    }
}
