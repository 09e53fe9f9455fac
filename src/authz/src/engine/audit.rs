//! Decision sinks
//!
//! The engine hands every [`DecisionEvent`] to each configured sink exactly
//! once. Two sinks ship with the crate:
//! - [`TracingSink`] writes structured `tracing` events
//! - [`AuditLog`] keeps a bounded in-memory trail, searchable by resource
//!   and role

use super::decision::DecisionEvent;
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Observer for authorization decisions
pub trait DecisionSink: Send + Sync {
    /// Record one decision
    fn record(&self, event: &DecisionEvent);
}

/// Sink that logs decisions through `tracing`
///
/// Grants log at `info`, denials at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DecisionSink for TracingSink {
    fn record(&self, event: &DecisionEvent) {
        if event.granted {
            info!(
                decision = %event.id,
                resource = %event.resource,
                action = %event.action,
                roles = ?event.roles,
                "{}",
                event.summary()
            );
        } else {
            debug!(
                decision = %event.id,
                resource = %event.resource,
                action = %event.action,
                roles = ?event.roles,
                "{}",
                event.summary()
            );
        }
    }
}

/// Bounded in-memory audit trail
pub struct AuditLog {
    entries: RwLock<VecDeque<DecisionEvent>>,
    capacity: usize,
}

impl AuditLog {
    /// Create a trail holding at most `capacity` events; oldest are evicted first
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Most recent events, newest first
    pub fn recent(&self, limit: usize) -> Vec<DecisionEvent> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    /// Events for one resource, newest first
    pub fn query_by_resource(&self, resource: &str, limit: usize) -> Vec<DecisionEvent> {
        self.entries
            .read()
            .iter()
            .rev()
            .filter(|e| e.resource == resource)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Events where the requester held `role`, newest first
    pub fn query_by_role(&self, role: &str, limit: usize) -> Vec<DecisionEvent> {
        self.entries
            .read()
            .iter()
            .rev()
            .filter(|e| e.roles.iter().any(|r| r == role))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> AuditStats {
        let entries = self.entries.read();
        let granted = entries.iter().filter(|e| e.granted).count();

        AuditStats {
            total_decisions: entries.len(),
            granted_decisions: granted,
            denied_decisions: entries.len() - granted,
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl DecisionSink for AuditLog {
    fn record(&self, event: &DecisionEvent) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.write();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event.clone());
    }
}

/// Audit statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub total_decisions: usize,
    pub granted_decisions: usize,
    pub denied_decisions: usize,
}
