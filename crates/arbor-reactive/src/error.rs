//! Error types for the reactive engine.

use thiserror::Error;

use crate::hooks::HookKind;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("reactive node type `{node_type}` must declare a non-reactive ID attr called `{id_attr}`")]
    MissingIdAttr { node_type: String, id_attr: String },

    #[error("reactive node type `{node_type}` must declare one or more reactive attrs")]
    NoReactiveAttrs { node_type: String },

    #[error("attr `{attr}` on `{node_type}` is declared more than once")]
    AttrDeclaredTwice { node_type: String, attr: String },

    #[error("ID attr `{id_attr}` on `{node_type}` cannot be reactive")]
    ReactiveIdAttr { node_type: String, id_attr: String },

    #[error("node type `{node_type}` is registered more than once")]
    DuplicateNodeType { node_type: String },

    #[error("hooks called conditionally in attr `{attr}`: expected {expected} hook calls, saw {found}")]
    ConditionalHooks {
        attr: String,
        expected: usize,
        found: usize,
    },

    #[error("hooks called out of order in attr `{attr}`: cell {index} holds {expected}, got {found}")]
    HooksOutOfOrder {
        attr: String,
        index: usize,
        expected: HookKind,
        found: HookKind,
    },

    #[error("hooks called out of order in attr `{attr}`: {kind} cell {index} holds a different value type")]
    HookTypeMismatch {
        attr: String,
        index: usize,
        kind: HookKind,
    },

    #[error("deferred requests never resolved (dependency cycle?): {}", pending.join(", "))]
    DeferredCycle { pending: Vec<String> },

    #[error("attr `{attr}` failed: {message}")]
    Compute { attr: String, message: String },
}

impl ReactiveError {
    /// Build a failure from inside a compute function.
    ///
    /// The attr key is filled in by the attribute computation that ran it.
    #[must_use]
    pub fn compute(message: impl Into<String>) -> Self {
        Self::Compute {
            attr: String::new(),
            message: message.into(),
        }
    }

    /// Whether this error is a hook-contract violation by a compute function.
    #[must_use]
    pub fn is_hook_violation(&self) -> bool {
        matches!(
            self,
            Self::ConditionalHooks { .. }
                | Self::HooksOutOfOrder { .. }
                | Self::HookTypeMismatch { .. }
        )
    }

    /// Whether this error was raised while building a schema.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingIdAttr { .. }
                | Self::NoReactiveAttrs { .. }
                | Self::AttrDeclaredTwice { .. }
                | Self::ReactiveIdAttr { .. }
                | Self::DuplicateNodeType { .. }
        )
    }

    pub(crate) fn with_attr(self, key: &str) -> Self {
        match self {
            Self::Compute { attr, message } if attr.is_empty() => Self::Compute {
                attr: key.to_string(),
                message,
            },
            other => other,
        }
    }
}
