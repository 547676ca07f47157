//! Key-path namespaced shared state.
//!
//! A [`KeyPathState`] is a tree of mutable maps addressed by a path of string
//! keys. Looking up a path creates any missing maps along the way; the
//! `initial` map seeds only the final segment, and only on creation.
//!
//! The document computation owns two of these: one that lives as long as the
//! document computation and one that is recreated at the start of every pass.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;

/// A mutable bag of JSON values.
pub type StateMap = serde_json::Map<String, Value>;

/// Shared handle to one map in a [`KeyPathState`].
pub type SharedState = Rc<RefCell<StateMap>>;

#[derive(Debug, Default)]
pub struct KeyPathState {
    state: SharedState,
    children: RefCell<AHashMap<String, Rc<KeyPathState>>>,
}

impl KeyPathState {
    #[must_use]
    pub fn new(seed: StateMap) -> Self {
        Self {
            state: Rc::new(RefCell::new(seed)),
            children: RefCell::default(),
        }
    }

    /// Map at `path`, creating it (seeded with `initial`) when missing.
    ///
    /// Intermediate maps are created empty. An empty path returns the root
    /// map and ignores `initial`.
    pub fn get(&self, path: &[&str], initial: StateMap) -> SharedState {
        match path {
            [] => self.root(),
            [last] => self.child(last, initial).root(),
            [first, rest @ ..] => self.child(first, StateMap::new()).get(rest, initial),
        }
    }

    /// Root map.
    #[must_use]
    pub fn root(&self) -> SharedState {
        Rc::clone(&self.state)
    }

    /// Whether a map exists at `path` without creating one.
    #[must_use]
    pub fn contains(&self, path: &[&str]) -> bool {
        match path {
            [] => true,
            [first, rest @ ..] => self
                .children
                .borrow()
                .get(*first)
                .cloned()
                .is_some_and(|child| child.contains(rest)),
        }
    }

    fn child(&self, key: &str, initial: StateMap) -> Rc<KeyPathState> {
        let mut children = self.children.borrow_mut();
        Rc::clone(
            children
                .entry(key.to_string())
                .or_insert_with(|| Rc::new(KeyPathState::new(initial))),
        )
    }
}

/// Shared state visible to every compute function during a pass.
#[derive(Debug, Default)]
pub struct DocumentScope {
    document: KeyPathState,
    transaction: KeyPathState,
}

impl DocumentScope {
    #[must_use]
    pub fn new(document_seed: StateMap) -> Self {
        Self {
            document: KeyPathState::new(document_seed),
            transaction: KeyPathState::default(),
        }
    }

    /// State that persists across passes.
    #[must_use]
    pub fn document(&self) -> &KeyPathState {
        &self.document
    }

    /// State that lives for the current pass only.
    #[must_use]
    pub fn transaction(&self) -> &KeyPathState {
        &self.transaction
    }

    /// Discard the transaction-scoped state.
    pub fn begin_transaction(&mut self) {
        self.transaction = KeyPathState::default();
    }
}
