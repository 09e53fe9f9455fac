//! Guarded retrieval
//!
//! Fuses "fetch a protected value" with "may the caller see it": the value
//! leaves the guard only inside [`Yielded::Granted`]. A denied value is
//! dropped inside the guard, and a fetch that finds nothing skips the check
//! entirely.
//!
//! # Example
//!
//! ```rust
//! use warrant_authz::{AccessRequest, AuthorizationEngine, EngineConfig, Privilege};
//!
//! let engine = AuthorizationEngine::new(EngineConfig::default()).unwrap();
//! engine.registry().add_global(Privilege::new("Book", "get").unwrap());
//!
//! let mut title = None;
//! engine
//!     .guard(None)
//!     .fetch(&AccessRequest::new("Book", "get"), || Some("Dune".to_string()))
//!     .unwrap()
//!     .on_granted(|book| title = Some(book.clone()))
//!     .on_denied(|| panic!("denied"))
//!     .on_not_found(|| panic!("missing"));
//!
//! assert_eq!(title.as_deref(), Some("Dune"));
//! ```

use crate::engine::AuthorizationEngine;
use crate::error::{AuthzError, Result};
use crate::registry::ScopeId;
use crate::types::AccessRequest;
use std::any::Any;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// Outcome of a guarded retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Yielded<T> {
    /// Value fetched and access permitted
    Granted(T),
    /// Value fetched but access refused; the value was discarded
    Denied,
    /// Nothing to protect; no check was made
    NotFound,
}

impl<T> Yielded<T> {
    /// Run `f` with the value if granted
    pub fn on_granted<F: FnOnce(&T)>(self, f: F) -> Self {
        if let Yielded::Granted(value) = &self {
            f(value);
        }
        self
    }

    /// Run `f` if denied
    pub fn on_denied<F: FnOnce()>(self, f: F) -> Self {
        if let Yielded::Denied = self {
            f();
        }
        self
    }

    /// Run `f` if nothing was found
    pub fn on_not_found<F: FnOnce()>(self, f: F) -> Self {
        if let Yielded::NotFound = self {
            f();
        }
        self
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Yielded::Granted(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Yielded::Denied)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Yielded::NotFound)
    }

    /// Borrow the value if granted
    pub fn as_granted(&self) -> Option<&T> {
        match self {
            Yielded::Granted(value) => Some(value),
            _ => None,
        }
    }

    /// Take the value if granted
    pub fn granted(self) -> Option<T> {
        match self {
            Yielded::Granted(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Yielded<U> {
        match self {
            Yielded::Granted(value) => Yielded::Granted(f(value)),
            Yielded::Denied => Yielded::Denied,
            Yielded::NotFound => Yielded::NotFound,
        }
    }

    /// Convert to a `Result` so callers can use `?`
    pub fn into_result(self) -> std::result::Result<T, Refusal> {
        match self {
            Yielded::Granted(value) => Ok(value),
            Yielded::Denied => Err(Refusal::Denied),
            Yielded::NotFound => Err(Refusal::NotFound),
        }
    }
}

/// Why a guarded retrieval produced no value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("protected value not found")]
    NotFound,
    #[error("access to protected value denied")]
    Denied,
}

/// Guarded retrieval bound to one engine and scope
///
/// Obtained from [`AuthorizationEngine::guard`].
#[derive(Clone, Copy)]
pub struct YieldGuard<'e> {
    engine: &'e AuthorizationEngine,
    scope: Option<ScopeId>,
}

impl<'e> YieldGuard<'e> {
    pub(crate) fn new(engine: &'e AuthorizationEngine, scope: Option<ScopeId>) -> Self {
        Self { engine, scope }
    }

    pub fn scope(&self) -> Option<&ScopeId> {
        self.scope.as_ref()
    }

    /// Fetch with `fetch`, then authorize the value against `request`
    ///
    /// The fetched value doubles as the protected value for dynamic
    /// attribute resolution.
    pub fn fetch<T, F>(&self, request: &AccessRequest, fetch: F) -> Result<Yielded<T>>
    where
        T: Any,
        F: FnOnce() -> Option<T>,
    {
        self.ensure_scope()?;
        self.check(request, fetch())
    }

    /// Await `fetch`, then authorize the value against `request`
    pub async fn fetch_async<T, Fut>(&self, request: &AccessRequest, fetch: Fut) -> Result<Yielded<T>>
    where
        T: Any,
        Fut: Future<Output = Option<T>>,
    {
        self.ensure_scope()?;
        let value = fetch.await;
        self.check(request, value)
    }

    fn ensure_scope(&self) -> Result<()> {
        match &self.scope {
            Some(id) if !self.engine.registry().is_active(id) => Err(AuthzError::ScopeMisuse {
                scope: id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn check<T: Any>(&self, request: &AccessRequest, value: Option<T>) -> Result<Yielded<T>> {
        let Some(value) = value else {
            debug!(resource = %request.resource, action = %request.action, "Guarded fetch found nothing");
            self.engine.record_not_found();
            return Ok(Yielded::NotFound);
        };

        let granted = self
            .engine
            .permitted_with_value(request, self.scope.as_ref(), &value)?;

        if granted {
            Ok(Yielded::Granted(value))
        } else {
            Ok(Yielded::Denied)
        }
    }
}
