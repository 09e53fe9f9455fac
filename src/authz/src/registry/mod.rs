//! Layered privilege registry
//!
//! Holds the process-lifetime ("global") rule layer plus one isolated
//! layer per active operation scope. Scope identity is always an explicit
//! [`ScopeId`] handle, never thread identity, so the registry works the same
//! under a multi-threaded runtime and under cooperative single-thread
//! multiplexing.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use warrant_authz::{Privilege, PrivilegeRegistry};
//!
//! let registry = Arc::new(PrivilegeRegistry::new());
//! registry.add_global(Privilege::new("Book", "list").unwrap());
//!
//! let scope = registry.begin_scope();
//! scope.add(Privilege::new("Book", "read").unwrap()).unwrap();
//! assert_eq!(registry.view(Some(scope.id())).unwrap().len(), 2);
//!
//! scope.end().unwrap();
//! assert_eq!(registry.global_len(), 1);
//! ```

mod scope;
mod store;


pub use scope::{OperationScope, ScopeId};
pub use store::{Insertion, PrivilegeRegistry, RegistrationReport, RuleView};
