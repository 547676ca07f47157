//! Node type registration.
//!
//! A [`Schema`] names the attribute that carries a node's stable ID and
//! describes each node type: its static attrs and, for reactive types, the
//! compute functions of its reactive attrs.
//!
//! ```
//! use arbor_reactive::{NodeTypeSpec, Reaction, Schema};
//!
//! let schema = Schema::builder()
//!     .node(NodeTypeSpec::new("paragraph"))
//!     .node(
//!         NodeTypeSpec::new("counter")
//!             .reactive()
//!             .attr("id")
//!             .reactive_attr("count", |_, hooks| {
//!                 let (count, _) = hooks.use_state(0)?;
//!                 Ok(Reaction::ready(count))
//!             }),
//!     )
//!     .build()
//!     .unwrap();
//! assert!(schema.reactive_type("counter").is_some());
//! assert!(schema.reactive_type("paragraph").is_none());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use arbor_model::Node;
use serde_json::Value;
use tracing::warn;

use crate::attribute::{AttrFn, AttrKey};
use crate::deferred::Reaction;
use crate::error::{ReactiveError, Result};
use crate::hooks::Hooks;

/// Attribute that carries a node's stable ID unless configured otherwise.
pub const DEFAULT_ID_ATTR: &str = "id";

/// Declaration of one node type.
#[derive(Clone)]
pub struct NodeTypeSpec {
    name: String,
    reactive: bool,
    attrs: BTreeSet<AttrKey>,
    reactive_attrs: Vec<(AttrKey, AttrFn)>,
}

impl fmt::Debug for NodeTypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeSpec")
            .field("name", &self.name)
            .field("reactive", &self.reactive)
            .field("attrs", &self.attrs)
            .field("reactive_attrs", &self.reactive_attr_keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeTypeSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reactive: false,
            attrs: BTreeSet::new(),
            reactive_attrs: Vec::new(),
        }
    }

    /// Mark this type reactive.
    #[must_use]
    pub fn reactive(mut self) -> Self {
        self.reactive = true;
        self
    }

    /// Declare a static attr.
    #[must_use]
    pub fn attr(mut self, name: impl Into<AttrKey>) -> Self {
        self.attrs.insert(name.into());
        self
    }

    /// Declare several static attrs.
    #[must_use]
    pub fn attrs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AttrKey>,
    {
        self.attrs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare a reactive attr computed by `compute`.
    ///
    /// Evaluation order follows declaration order.
    #[must_use]
    pub fn reactive_attr<F>(mut self, name: impl Into<AttrKey>, compute: F) -> Self
    where
        F: Fn(&Node, &mut Hooks<'_>) -> Result<Reaction<Value>> + 'static,
    {
        self.reactive_attrs.push((name.into(), Rc::new(compute)));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    #[must_use]
    pub fn static_attrs(&self) -> &BTreeSet<AttrKey> {
        &self.attrs
    }

    /// Reactive attrs with their compute functions, in declaration order.
    pub fn reactive_attrs(&self) -> impl Iterator<Item = (&str, &AttrFn)> {
        self.reactive_attrs.iter().map(|(key, f)| (key.as_str(), f))
    }

    pub fn reactive_attr_keys(&self) -> impl Iterator<Item = &str> {
        self.reactive_attrs.iter().map(|(key, _)| key.as_str())
    }

    fn validate(&self, id_attr: &str) -> Result<()> {
        if !self.reactive {
            if !self.reactive_attrs.is_empty() {
                warn!(
                    node_type = %self.name,
                    "reactive attrs declared on a node type that is not reactive; ignoring them"
                );
            }
            return Ok(());
        }
        if !self.attrs.contains(id_attr) {
            return Err(ReactiveError::MissingIdAttr {
                node_type: self.name.clone(),
                id_attr: id_attr.to_string(),
            });
        }
        if self.reactive_attrs.is_empty() {
            return Err(ReactiveError::NoReactiveAttrs {
                node_type: self.name.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for key in self.reactive_attr_keys() {
            if key == id_attr {
                return Err(ReactiveError::ReactiveIdAttr {
                    node_type: self.name.clone(),
                    id_attr: id_attr.to_string(),
                });
            }
            if self.attrs.contains(key) || !seen.insert(key) {
                return Err(ReactiveError::AttrDeclaredTwice {
                    node_type: self.name.clone(),
                    attr: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Validated set of node types.
#[derive(Clone, Debug)]
pub struct Schema {
    id_attr: AttrKey,
    types: BTreeMap<String, NodeTypeSpec>,
}

impl Schema {
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Attribute that carries a node's stable ID.
    #[must_use]
    pub fn id_attr(&self) -> &str {
        &self.id_attr
    }

    #[must_use]
    pub fn node_type(&self, name: &str) -> Option<&NodeTypeSpec> {
        self.types.get(name)
    }

    /// The declaration of `name` if it is a reactive type.
    #[must_use]
    pub fn reactive_type(&self, name: &str) -> Option<&NodeTypeSpec> {
        self.types.get(name).filter(|spec| spec.is_reactive())
    }

    pub fn types(&self) -> impl Iterator<Item = &NodeTypeSpec> {
        self.types.values()
    }

    /// Stable ID of `node`: a non-empty string, or a non-zero number rendered
    /// as a string, in the ID attr.
    ///
    /// `1` and `"1"` name the same node.
    #[must_use]
    pub fn stable_id(&self, node: &Node) -> Option<String> {
        match node.attr(&self.id_attr)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) if id.as_f64().is_some_and(|n| n != 0.0) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    id_attr: AttrKey,
    types: Vec<NodeTypeSpec>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self {
            id_attr: DEFAULT_ID_ATTR.to_string(),
            types: Vec::new(),
        }
    }
}

impl SchemaBuilder {
    /// Use a different attribute for stable IDs.
    #[must_use]
    pub fn id_attr(mut self, key: impl Into<AttrKey>) -> Self {
        self.id_attr = key.into();
        self
    }

    #[must_use]
    pub fn node(mut self, spec: NodeTypeSpec) -> Self {
        self.types.push(spec);
        self
    }

    #[must_use]
    pub fn nodes(mut self, specs: impl IntoIterator<Item = NodeTypeSpec>) -> Self {
        self.types.extend(specs);
        self
    }

    /// Validate every declaration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found, in registration order.
    pub fn build(self) -> Result<Schema> {
        let mut types = BTreeMap::new();
        for spec in self.types {
            spec.validate(&self.id_attr)?;
            if types.contains_key(spec.name()) {
                return Err(ReactiveError::DuplicateNodeType {
                    node_type: spec.name().to_string(),
                });
            }
            types.insert(spec.name().to_string(), spec);
        }
        Ok(Schema {
            id_attr: self.id_attr,
            types,
        })
    }
}
