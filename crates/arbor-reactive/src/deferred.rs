//! Values that may have to wait for other nodes before they resolve.
//!
//! A compute function that needs data from other nodes returns a
//! [`DeferredRequest`] instead of a value. The request names the node IDs it
//! needs and carries a resume callback. The document computation calls the
//! callback later in the same pass, once every requested ID is available.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use arbor_model::Node;

/// Stable identifier of a node across passes.
pub type NodeId = String;

/// Resolved snapshots by ID, as handed to resume callbacks.
pub type AvailableNodes = AHashMap<NodeId, Rc<Node>>;

type Resume<T> = Box<dyn FnOnce(&AvailableNodes) -> T>;

/// A pending computation that needs other nodes' resolved snapshots.
///
/// Consumed exactly once by [`resolve`](DeferredRequest::resolve).
pub struct DeferredRequest<T> {
    requested: BTreeSet<NodeId>,
    resume: Resume<T>,
}

impl<T: 'static> DeferredRequest<T> {
    pub fn new<I, S>(ids: I, resume: impl FnOnce(&AvailableNodes) -> T + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self {
            requested: ids.into_iter().map(Into::into).collect(),
            resume: Box::new(resume),
        }
    }

    /// A request for exactly one node.
    pub fn single(id: impl Into<NodeId>, resume: impl FnOnce(&AvailableNodes) -> T + 'static) -> Self {
        Self::new([id.into()], resume)
    }

    /// Transform the eventual result without resolving.
    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> DeferredRequest<U> {
        let resume = self.resume;
        DeferredRequest {
            requested: self.requested,
            resume: Box::new(move |nodes| f(resume(nodes))),
        }
    }
}

impl<T> DeferredRequest<T> {
    #[must_use]
    pub fn requested_ids(&self) -> &BTreeSet<NodeId> {
        &self.requested
    }

    /// Whether any requested ID satisfies `outstanding`.
    pub fn waits_on(&self, mut outstanding: impl FnMut(&str) -> bool) -> bool {
        self.requested.iter().any(|id| outstanding(id))
    }

    /// Run the resume callback.
    ///
    /// Missing IDs are simply absent from `nodes`; the callback decides what
    /// that means.
    pub fn resolve(self, nodes: &AvailableNodes) -> T {
        (self.resume)(nodes)
    }
}

impl<T> fmt::Debug for DeferredRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRequest")
            .field("requested", &self.requested)
            .finish_non_exhaustive()
    }
}

/// Outcome of one evaluation: a value now, or a request to resume later.
#[derive(Debug)]
pub enum Reaction<T> {
    Ready(T),
    Deferred(DeferredRequest<T>),
}

impl<T> Reaction<T> {
    pub fn ready(value: impl Into<T>) -> Self {
        Self::Ready(value.into())
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// The immediate value, if there is one.
    pub fn into_ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    /// The pending request, if there is one.
    pub fn into_deferred(self) -> Option<DeferredRequest<T>> {
        match self {
            Self::Ready(_) => None,
            Self::Deferred(request) => Some(request),
        }
    }
}

impl<T> From<DeferredRequest<T>> for Reaction<T> {
    fn from(request: DeferredRequest<T>) -> Self {
        Self::Deferred(request)
    }
}
