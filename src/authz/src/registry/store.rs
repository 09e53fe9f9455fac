//! Registry storage: global snapshot plus per-scope layers

use super::scope::{OperationScope, ScopeId};
use crate::config::RuleSet;
use crate::error::{AuthzError, Result};
use crate::privilege::{validate_role, Privilege};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a single registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Stored in the target layer
    Inserted,
    /// An equal privilege is already visible; nothing was stored
    Duplicate,
}

impl Insertion {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Insertion::Duplicate)
    }
}

/// Summary of a grouped registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Privileges stored
    pub inserted: usize,
    /// Privileges skipped as duplicates
    pub duplicates: usize,
}

impl RegistrationReport {
    fn record(&mut self, insertion: Insertion) {
        match insertion {
            Insertion::Inserted => self.inserted += 1,
            Insertion::Duplicate => self.duplicates += 1,
        }
    }

    /// Combine two reports
    pub fn merge(mut self, other: RegistrationReport) -> Self {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self
    }
}

/// Read view of the rules visible to one scope: global ++ scoped
///
/// Holds shared snapshots, so later registrations never alter a view that
/// is already being scanned.
#[derive(Debug, Clone)]
pub struct RuleView {
    global: Arc<Vec<Privilege>>,
    scoped: Option<Arc<Vec<Privilege>>>,
}

impl RuleView {
    /// Iterate global entries first, then scoped entries, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Privilege> {
        self.global
            .iter()
            .chain(self.scoped.iter().flat_map(|layer| layer.iter()))
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.scoped.as_ref().map_or(0, |layer| layer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<Privilege> {
        self.iter().cloned().collect()
    }
}

/// Process-wide privilege registry
///
/// # Thread Safety
///
/// The global layer is a copy-on-write snapshot behind a `parking_lot`
/// lock: writers swap in a new vector only when readers still hold the old
/// one, and readers clone the `Arc` without blocking each other. Scope
/// layers live in a `DashMap` keyed by [`ScopeId`], so independent
/// operations never contend on the same shard lock for long.
pub struct PrivilegeRegistry {
    /// Process-lifetime rules
    global: RwLock<Arc<Vec<Privilege>>>,

    /// Active scopes and their layers
    scopes: DashMap<ScopeId, Arc<Vec<Privilege>>>,
}

impl PrivilegeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            global: RwLock::new(Arc::new(Vec::new())),
            scopes: DashMap::new(),
        }
    }

    fn global_snapshot(&self) -> Arc<Vec<Privilege>> {
        self.global.read().clone()
    }

    // ------------------------------------------------------------------
    // Global layer
    // ------------------------------------------------------------------

    /// Insert into the global layer, deduplicating against global only
    pub fn add_global(&self, privilege: Privilege) -> Insertion {
        let mut global = self.global.write();

        if global.iter().any(|p| p.is_equal(&privilege)) {
            warn!(rule = %privilege, "Duplicate global privilege skipped");
            return Insertion::Duplicate;
        }

        debug!(rule = %privilege, "Global privilege registered");
        Arc::make_mut(&mut *global).push(privilege);
        Insertion::Inserted
    }

    /// Insert a group into the global layer, forcing `role` on each entry
    pub fn add_global_group(
        &self,
        role: &str,
        privileges: Vec<Privilege>,
    ) -> Result<RegistrationReport> {
        validate_role(role)?;

        let mut report = RegistrationReport::default();
        for privilege in privileges {
            report.record(self.add_global(privilege.assign_role(role)));
        }
        Ok(report)
    }

    /// Insert a group into the global layer without touching roles
    pub fn add_global_unscoped(&self, privileges: Vec<Privilege>) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        for privilege in privileges {
            report.record(self.add_global(privilege));
        }
        report
    }

    /// Register every entry of a rule file into the global layer
    pub fn load_rules(&self, rules: &RuleSet) -> Result<RegistrationReport> {
        let mut report = self.add_global_unscoped(rules.privileges.clone());

        for group in &rules.groups {
            report = report.merge(self.add_global_group(&group.role, group.privileges.clone())?);
        }

        info!(
            "Loaded rule set: {} inserted, {} duplicates",
            report.inserted, report.duplicates
        );
        Ok(report)
    }

    /// Number of global privileges
    pub fn global_len(&self) -> usize {
        self.global.read().len()
    }

    // ------------------------------------------------------------------
    // Scope lifecycle
    // ------------------------------------------------------------------

    /// Open a scope and return a guard that ends it when dropped
    pub fn begin_scope(self: &Arc<Self>) -> OperationScope {
        let id = self.open_scope();
        OperationScope::new(Arc::clone(self), id)
    }

    /// Open a scope without a guard
    ///
    /// The caller must pair this with [`PrivilegeRegistry::end_scope`] on
    /// every exit path. Prefer [`PrivilegeRegistry::begin_scope`].
    pub fn open_scope(&self) -> ScopeId {
        let id = ScopeId::new();
        // Vec::new does not allocate; the layer grows on first scoped write.
        self.scopes.insert(id, Arc::new(Vec::new()));
        debug!(scope = %id, "Scope opened");
        id
    }

    /// Discard a scope's layer
    pub fn end_scope(&self, scope: &ScopeId) -> Result<()> {
        match self.scopes.remove(scope) {
            Some((_, layer)) => {
                debug!(scope = %scope, rules = layer.len(), "Scope ended");
                Ok(())
            }
            None => Err(scope_misuse(scope)),
        }
    }

    pub fn is_active(&self, scope: &ScopeId) -> bool {
        self.scopes.contains_key(scope)
    }

    /// Number of scopes currently open
    pub fn active_scopes(&self) -> usize {
        self.scopes.len()
    }

    /// Number of privileges in a scope's own layer
    pub fn scope_len(&self, scope: &ScopeId) -> Result<usize> {
        self.scopes
            .get(scope)
            .map(|layer| layer.len())
            .ok_or_else(|| scope_misuse(scope))
    }

    // ------------------------------------------------------------------
    // Scoped layer
    // ------------------------------------------------------------------

    /// Insert into a scope's layer, deduplicating against global ∪ scope
    pub fn add_scoped(&self, scope: &ScopeId, privilege: Privilege) -> Result<Insertion> {
        let mut layer = self.scopes.get_mut(scope).ok_or_else(|| scope_misuse(scope))?;

        let global = self.global_snapshot();
        let duplicate = global
            .iter()
            .chain(layer.iter())
            .any(|p| p.is_equal(&privilege));

        if duplicate {
            warn!(scope = %scope, rule = %privilege, "Duplicate scoped privilege skipped");
            return Ok(Insertion::Duplicate);
        }

        debug!(scope = %scope, rule = %privilege, "Scoped privilege registered");
        Arc::make_mut(layer.value_mut()).push(privilege);
        Ok(Insertion::Inserted)
    }

    /// Insert a group into a scope's layer, forcing `role` on each entry
    pub fn add_scoped_group(
        &self,
        scope: &ScopeId,
        role: &str,
        privileges: Vec<Privilege>,
    ) -> Result<RegistrationReport> {
        validate_role(role)?;

        let mut report = RegistrationReport::default();
        for privilege in privileges {
            report.record(self.add_scoped(scope, privilege.assign_role(role))?);
        }
        Ok(report)
    }

    /// Insert a group into a scope's layer without touching roles
    pub fn add_scoped_unscoped(
        &self,
        scope: &ScopeId,
        privileges: Vec<Privilege>,
    ) -> Result<RegistrationReport> {
        let mut report = RegistrationReport::default();
        for privilege in privileges {
            report.record(self.add_scoped(scope, privilege)?);
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Rules visible to `scope`, or the global layer alone for `None`
    pub fn view(&self, scope: Option<&ScopeId>) -> Result<RuleView> {
        let global = self.global_snapshot();

        let scoped = match scope {
            None => None,
            Some(id) => {
                let layer = self.scopes.get(id).ok_or_else(|| scope_misuse(id))?;
                Some(Arc::clone(layer.value()))
            }
        };

        Ok(RuleView { global, scoped })
    }
}

impl Default for PrivilegeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn scope_misuse(scope: &ScopeId) -> AuthzError {
    AuthzError::ScopeMisuse {
        scope: scope.to_string(),
    }
}
