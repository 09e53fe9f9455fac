//! # Warrant Authorization Engine
//!
//! Hybrid role/attribute-based access control for request-driven services.
//!
//! ## Features
//!
//! - **Privilege rules** with optional role, resource, action and
//!   key/value restrictions
//! - **Layered registry**: process-lifetime rules plus per-operation rules
//!   that vanish when the operation's scope ends
//! - **Dynamic attributes** computed from the protected value at decision time
//! - **Guarded retrieval** that only hands data out after a grant
//! - **Decision events** for tracing, audit trails and metrics
//!
//! ## Example
//!
//! ```rust
//! use warrant_authz::{AccessRequest, AuthorizationEngine, EngineConfig, Privilege};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AuthorizationEngine::new(EngineConfig::default())?;
//!
//! engine.registry().add_global(Privilege::new("Book", "list")?);
//! engine.registry().add_global_group("admin", vec![Privilege::new("User", "edit")?])?;
//!
//! assert!(engine.permitted(&AccessRequest::new("Book", "list"), None)?);
//! assert!(!engine.permitted(&AccessRequest::new("User", "edit"), None)?);
//! assert!(engine.permitted(&AccessRequest::new("User", "edit").with_role("admin"), None)?);
//!
//! // Rules loaded for one request only
//! let scope = engine.begin_scope();
//! scope.add(Privilege::new("Book", "read")?)?;
//! assert!(engine.permitted(&AccessRequest::new("Book", "read"), Some(scope.id()))?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod privilege;
pub mod registry;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use config::{AuditConfig, EngineConfig, RuleGroup, RuleSet};
pub use engine::{
    AuditLog, AuditStats, AuthorizationEngine, DecisionEvent, DecisionSink, EngineMetrics,
    TracingSink,
};
pub use error::{AuthzError, Result};
pub use guard::{Refusal, YieldGuard, Yielded};
pub use privilege::{Privilege, PrivilegeBuilder, PrivilegeDef, Restrictions};
pub use registry::{Insertion, OperationScope, PrivilegeRegistry, RegistrationReport, RuleView, ScopeId};
pub use resolver::{merge_attributes, AttributePrecedence, AttributeResolver, HandlerKey};
pub use types::{AccessRequest, Attributes};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
