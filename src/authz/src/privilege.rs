//! Privilege rule definition
//!
//! A [`Privilege`] is a single authorization rule: an optional role, a
//! resource, an action, and a set of restrictions the request attributes
//! must satisfy. Two separate comparisons exist:
//!
//! - [`Privilege::is_equal`] is structural identity, used to deduplicate
//!   registrations.
//! - [`Privilege::accepts`] is the decision-time match: role membership,
//!   exact resource/action, and a *subset* test on restrictions.

use crate::error::{AuthzError, Result};
use crate::types::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Required key/value pairs a privilege imposes on request attributes
pub type Restrictions = BTreeMap<String, Value>;

/// Immutable authorization rule
///
/// Constructed through [`Privilege::new`] or [`Privilege::builder`], both of
/// which validate; a `Privilege` value is therefore always well formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PrivilegeDef", into = "PrivilegeDef")]
pub struct Privilege {
    role: Option<String>,
    resource: String,
    action: String,
    restrictions: Restrictions,
}

impl Privilege {
    /// Create an any-role, unrestricted privilege
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Result<Self> {
        Self::builder(resource, action).build()
    }

    /// Start building a privilege
    pub fn builder(resource: impl Into<String>, action: impl Into<String>) -> PrivilegeBuilder {
        PrivilegeBuilder {
            role: None,
            resource: resource.into(),
            action: action.into(),
            restrictions: Restrictions::new(),
        }
    }

    /// Role constraint, `None` means the rule applies to any role
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn restrictions(&self) -> &Restrictions {
        &self.restrictions
    }

    /// Structural equality used for deduplication
    ///
    /// Absent and empty restriction sets are the same value here, since both
    /// are stored as an empty map.
    pub fn is_equal(&self, other: &Privilege) -> bool {
        self == other
    }

    /// Decision-time match against a candidate request
    ///
    /// Passes when the role constraint is absent or present in `roles`
    /// (exact, case-sensitive), resource and action match exactly, and every
    /// restriction is present in `attributes` with an equal value. Extra
    /// attributes are ignored. An empty candidate resource or action never
    /// matches.
    pub fn accepts<S: AsRef<str>>(
        &self,
        resource: &str,
        action: &str,
        roles: &[S],
        attributes: &Attributes,
    ) -> bool {
        if resource.is_empty() || action.is_empty() {
            return false;
        }

        self.role_matches(roles)
            && self.resource == resource
            && self.action == action
            && self.restrictions_satisfied(attributes)
    }

    fn role_matches<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        match &self.role {
            None => true,
            Some(required) => roles.iter().any(|r| r.as_ref() == required),
        }
    }

    fn restrictions_satisfied(&self, attributes: &Attributes) -> bool {
        self.restrictions
            .iter()
            .all(|(key, expected)| attributes.get(key) == Some(expected))
    }

    /// Overwrite the role during grouped registration
    pub(crate) fn assign_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.resource.is_empty() {
            return Err(AuthzError::InvalidPrivilege(
                "resource cannot be empty".to_string(),
            ));
        }

        if self.action.is_empty() {
            return Err(AuthzError::InvalidPrivilege(format!(
                "action cannot be empty (resource '{}')",
                self.resource
            )));
        }

        if let Some(role) = &self.role {
            validate_role(role)?;
        }

        if self.restrictions.keys().any(|k| k.is_empty()) {
            return Err(AuthzError::InvalidPrivilege(format!(
                "restriction keys cannot be empty ({} => {})",
                self.resource, self.action
            )));
        }

        Ok(())
    }
}

/// Reject a present-but-empty role label
pub(crate) fn validate_role(role: &str) -> Result<()> {
    if role.is_empty() {
        return Err(AuthzError::InvalidPrivilege(
            "role cannot be an empty string".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for Privilege {
    /// Renders `[role] resource => action(k=v,...)`, with `*` for any role
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} => {}",
            self.role.as_deref().unwrap_or("*"),
            self.resource,
            self.action
        )?;

        if !self.restrictions.is_empty() {
            let pairs: Vec<String> = self
                .restrictions
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{}={}", k, s),
                    other => format!("{}={}", k, other),
                })
                .collect();
            write!(f, "({})", pairs.join(","))?;
        }

        Ok(())
    }
}

/// Builder for [`Privilege`]; validation happens in [`PrivilegeBuilder::build`]
#[derive(Debug, Clone)]
pub struct PrivilegeBuilder {
    role: Option<String>,
    resource: String,
    action: String,
    restrictions: Restrictions,
}

impl PrivilegeBuilder {
    /// Restrict the privilege to holders of `role`
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Require `key` to equal `value` in the request attributes
    pub fn restrict(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.restrictions.insert(key.into(), value.into());
        self
    }

    /// Add a full restriction set
    pub fn restrictions(mut self, restrictions: Restrictions) -> Self {
        self.restrictions.extend(restrictions);
        self
    }

    pub fn build(self) -> Result<Privilege> {
        let privilege = Privilege {
            role: self.role,
            resource: self.resource,
            action: self.action,
            restrictions: self.restrictions,
        };
        privilege.validate()?;
        Ok(privilege)
    }
}

/// Serialized form of a privilege, as found in rule files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivilegeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    pub resource: String,

    pub action: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub restrictions: Restrictions,
}

impl TryFrom<PrivilegeDef> for Privilege {
    type Error = AuthzError;

    fn try_from(def: PrivilegeDef) -> Result<Self> {
        let mut builder = Privilege::builder(def.resource, def.action).restrictions(def.restrictions);
        if let Some(role) = def.role {
            builder = builder.role(role);
        }
        builder.build()
    }
}

impl From<Privilege> for PrivilegeDef {
    fn from(p: Privilege) -> Self {
        Self {
            role: p.role,
            resource: p.resource,
            action: p.action,
            restrictions: p.restrictions,
        }
    }
}
