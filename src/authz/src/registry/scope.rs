//! Operation scope handles
//!
//! A scope is the lifetime of one logical operation (typically one inbound
//! request). The [`OperationScope`] guard ends its scope when dropped, so
//! the scoped layer is released on every exit path, including `?` returns
//! and panics unwinding through the handler.

use super::store::{Insertion, PrivilegeRegistry, RegistrationReport};
use crate::error::Result;
use crate::privilege::Privilege;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier of one operation scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(Uuid);

impl ScopeId {
    /// Fresh, never-registered identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RAII guard over an active scope
///
/// Created by [`PrivilegeRegistry::begin_scope`]. Dropping the guard ends
/// the scope; [`OperationScope::end`] does the same but reports misuse.
pub struct OperationScope {
    registry: Arc<PrivilegeRegistry>,
    id: ScopeId,
    ended: bool,
}

impl OperationScope {
    pub(crate) fn new(registry: Arc<PrivilegeRegistry>, id: ScopeId) -> Self {
        Self {
            registry,
            id,
            ended: false,
        }
    }

    /// Handle to pass to decision calls
    pub fn id(&self) -> &ScopeId {
        &self.id
    }

    /// Register a scope-local privilege
    pub fn add(&self, privilege: Privilege) -> Result<Insertion> {
        self.registry.add_scoped(&self.id, privilege)
    }

    /// Register scope-local privileges, forcing `role` on each
    pub fn add_group(&self, role: &str, privileges: Vec<Privilege>) -> Result<RegistrationReport> {
        self.registry.add_scoped_group(&self.id, role, privileges)
    }

    /// Register scope-local privileges as-is
    pub fn add_unscoped(&self, privileges: Vec<Privilege>) -> Result<RegistrationReport> {
        self.registry.add_scoped_unscoped(&self.id, privileges)
    }

    /// Number of privileges in this scope's own layer
    pub fn len(&self) -> usize {
        self.registry.scope_len(&self.id).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End the scope now, discarding its layer
    pub fn end(mut self) -> Result<()> {
        self.ended = true;
        self.registry.end_scope(&self.id)
    }
}

impl fmt::Debug for OperationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationScope")
            .field("id", &self.id)
            .field("ended", &self.ended)
            .finish()
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if self.ended {
            return;
        }

        match self.registry.end_scope(&self.id) {
            Ok(()) => debug!(scope = %self.id, "Scope released on drop"),
            Err(e) => warn!(scope = %self.id, "Scope release on drop failed: {}", e),
        }
    }
}
