//! Dynamic attribute resolution
//!
//! Handlers compute attributes from a protected value at decision time
//! (for example `owned` from a record's owner id). They are registered in an
//! explicit table keyed by specificity:
//!
//! 1. exact `(resource, action)` pair
//! 2. resource only
//! 3. generic
//!
//! Only the single most specific handler runs. A failing handler, whether it
//! returns `Err` or panics, yields an empty mapping, never extra grants.
//!
//! # Example
//!
//! ```rust
//! use warrant_authz::{AttributeResolver, Attributes};
//! use serde_json::json;
//!
//! struct Book { owner: String }
//!
//! let resolver = AttributeResolver::new();
//! resolver
//!     .register_typed::<Book, _>(Some("Book"), None, |book| {
//!         let mut attrs = Attributes::new();
//!         attrs.insert("owned".into(), json!(book.owner == "alice"));
//!         Ok(attrs)
//!     })
//!     .unwrap();
//!
//! let book = Book { owner: "alice".into() };
//! let attrs = resolver.resolve("Book", "get", &book);
//! assert_eq!(attrs.get("owned"), Some(&json!(true)));
//! ```

use crate::error::{AuthzError, Result};
use crate::types::Attributes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler signature: protected value in, attributes out
pub type HandlerFn = dyn Fn(&dyn Any) -> anyhow::Result<Attributes> + Send + Sync;

/// Registration key, ordered from most to least specific
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HandlerKey {
    /// Handler for one `(resource, action)` pair
    Exact { resource: String, action: String },
    /// Handler for every action on a resource
    Resource(String),
    /// Fallback handler for everything
    Generic,
}

impl HandlerKey {
    /// Build a key from optional resource/action
    ///
    /// An action without a resource has no place in the lookup order and is
    /// rejected.
    pub fn from_parts(resource: Option<&str>, action: Option<&str>) -> Result<Self> {
        match (resource, action) {
            (Some(""), _) | (_, Some("")) => Err(AuthzError::InvalidInput(
                "handler resource/action cannot be empty".to_string(),
            )),
            (Some(resource), Some(action)) => Ok(Self::Exact {
                resource: resource.to_string(),
                action: action.to_string(),
            }),
            (Some(resource), None) => Ok(Self::Resource(resource.to_string())),
            (None, None) => Ok(Self::Generic),
            (None, Some(action)) => Err(AuthzError::InvalidInput(format!(
                "handler for action '{}' requires a resource",
                action
            ))),
        }
    }

    /// Lookup chain for a request, most specific first
    fn chain(resource: &str, action: &str) -> [HandlerKey; 3] {
        [
            Self::Exact {
                resource: resource.to_string(),
                action: action.to_string(),
            },
            Self::Resource(resource.to_string()),
            Self::Generic,
        ]
    }
}

/// Which side wins when static and dynamic attributes share a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributePrecedence {
    /// Values derived from the protected value override caller values
    #[default]
    Dynamic,
    /// Caller-supplied values override derived values
    Static,
}

/// Merge caller attributes with resolver output
pub fn merge_attributes(
    static_attrs: &Attributes,
    dynamic_attrs: Attributes,
    precedence: AttributePrecedence,
) -> Attributes {
    let mut merged = static_attrs.clone();

    for (key, value) in dynamic_attrs {
        match precedence {
            AttributePrecedence::Dynamic => {
                merged.insert(key, value);
            }
            AttributePrecedence::Static => {
                merged.entry(key).or_insert(value);
            }
        }
    }

    merged
}

/// Specificity-ordered handler table
pub struct AttributeResolver {
    handlers: RwLock<HashMap<HandlerKey, Arc<HandlerFn>>>,

    /// Handler failures contained so far
    failures: AtomicU64,
}

impl AttributeResolver {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            failures: AtomicU64::new(0),
        }
    }

    /// Register an untyped handler
    ///
    /// A second registration for the same key replaces the first.
    pub fn register<H>(&self, resource: Option<&str>, action: Option<&str>, handler: H) -> Result<()>
    where
        H: Fn(&dyn Any) -> anyhow::Result<Attributes> + Send + Sync + 'static,
    {
        let key = HandlerKey::from_parts(resource, action)?;

        let previous = self.handlers.write().insert(key.clone(), Arc::new(handler));
        if previous.is_some() {
            debug!(?key, "Attribute handler replaced");
        } else {
            debug!(?key, "Attribute handler registered");
        }

        Ok(())
    }

    /// Register a handler for protected values of type `T`
    ///
    /// A protected value of any other type counts as a handler failure.
    pub fn register_typed<T, F>(&self, resource: Option<&str>, action: Option<&str>, handler: F) -> Result<()>
    where
        T: Any,
        F: Fn(&T) -> anyhow::Result<Attributes> + Send + Sync + 'static,
    {
        self.register(resource, action, move |value: &dyn Any| {
            let typed = value.downcast_ref::<T>().ok_or_else(|| {
                anyhow::anyhow!(
                    "protected value is not a {}",
                    std::any::type_name::<T>()
                )
            })?;
            handler(typed)
        })
    }

    /// Most specific handler for `(resource, action)`, if any
    pub fn lookup(&self, resource: &str, action: &str) -> Option<(HandlerKey, Arc<HandlerFn>)> {
        let handlers = self.handlers.read();

        HandlerKey::chain(resource, action)
            .into_iter()
            .find_map(|key| handlers.get(&key).map(|h| (key, Arc::clone(h))))
    }

    /// Run the most specific handler, surfacing its failure
    pub fn try_resolve(&self, resource: &str, action: &str, value: &dyn Any) -> Result<Attributes> {
        // Handlers may block; never call one while holding the table lock.
        let Some((key, handler)) = self.lookup(resource, action) else {
            debug!(resource, action, "No attribute handler registered");
            return Ok(Attributes::new());
        };

        debug!(resource, action, ?key, "Invoking attribute handler");

        let outcome = catch_unwind(AssertUnwindSafe(|| handler(value)));
        let message = match outcome {
            Ok(Ok(attrs)) => return Ok(attrs),
            Ok(Err(e)) => format!("{:#}", e),
            Err(payload) => panic_message(payload.as_ref()),
        };

        self.failures.fetch_add(1, Ordering::Relaxed);
        Err(AuthzError::AttributeHandler {
            resource: resource.to_string(),
            action: action.to_string(),
            message,
        })
    }

    /// Run the most specific handler, degrading any failure to no attributes
    pub fn resolve(&self, resource: &str, action: &str, value: &dyn Any) -> Attributes {
        match self.try_resolve(resource, action, value) {
            Ok(attrs) => attrs,
            Err(e) => {
                warn!("{}; continuing with no dynamic attributes", e);
                Attributes::new()
            }
        }
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Number of handler failures contained since creation
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for AttributeResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
