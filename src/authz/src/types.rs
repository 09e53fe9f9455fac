//! Core request types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Contextual attribute mapping used for restriction matching
pub type Attributes = HashMap<String, Value>;

/// A single access question: may these roles perform `action` on `resource`
/// given these attributes?
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Resource label (e.g., "Book")
    pub resource: String,

    /// Action label (e.g., "get", "delete")
    pub action: String,

    /// Role labels held by the requester, already resolved by the host
    #[serde(default)]
    pub roles: Vec<String>,

    /// Caller-supplied static attributes
    #[serde(default)]
    pub attributes: Attributes,
}

impl AccessRequest {
    /// Create a request with no roles and no attributes
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            roles: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Add a single role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Add several roles
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add a static attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Replace the static attribute mapping
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}
