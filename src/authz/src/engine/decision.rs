//! Decision events emitted once per authorization check

use crate::privilege::Privilege;
use crate::registry::ScopeId;
use crate::types::Attributes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured record of one grant/deny decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// Unique decision ID
    pub id: Uuid,

    /// Whether the request is permitted
    pub granted: bool,

    pub resource: String,

    pub action: String,

    /// Roles presented by the requester
    pub roles: Vec<String>,

    /// Static and dynamic attributes after merging
    pub attributes: Attributes,

    /// First accepting rule in registry order; diagnostic only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<Privilege>,

    /// Scope the decision was evaluated in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,

    /// Decision timestamp
    pub timestamp: DateTime<Utc>,
}

impl DecisionEvent {
    /// Grant decision
    pub fn grant(
        resource: impl Into<String>,
        action: impl Into<String>,
        roles: Vec<String>,
        attributes: Attributes,
        matched_rule: Privilege,
    ) -> Self {
        Self::new(true, resource, action, roles, attributes, Some(matched_rule))
    }

    /// Deny decision
    pub fn deny(
        resource: impl Into<String>,
        action: impl Into<String>,
        roles: Vec<String>,
        attributes: Attributes,
    ) -> Self {
        Self::new(false, resource, action, roles, attributes, None)
    }

    fn new(
        granted: bool,
        resource: impl Into<String>,
        action: impl Into<String>,
        roles: Vec<String>,
        attributes: Attributes,
        matched_rule: Option<Privilege>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            granted,
            resource: resource.into(),
            action: action.into(),
            roles,
            attributes,
            matched_rule,
            scope: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the evaluation scope
    pub fn in_scope(mut self, scope: Option<ScopeId>) -> Self {
        self.scope = scope;
        self
    }

    /// Best-effort one-line summary for logs
    pub fn summary(&self) -> String {
        let mut attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        attrs.sort();

        let verdict = if self.granted { "GRANTED" } else { "DENIED" };
        let mut line = format!(
            "{} {} => {} roles=[{}] attrs={{{}}}",
            verdict,
            self.resource,
            self.action,
            self.roles.join(","),
            attrs.join(",")
        );

        if let Some(rule) = &self.matched_rule {
            line.push_str(&format!(" by {}", rule));
        }

        line
    }
}
