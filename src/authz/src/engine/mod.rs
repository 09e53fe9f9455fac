//! Authorization engine
//!
//! Evaluates a request against the rules visible to its scope, merging
//! caller attributes with attributes derived from the protected value.
//!
//! # Pipeline
//!
//! ```text
//! AccessRequest ─┬─> PrivilegeRegistry::view(scope) ─┐
//!                └─> AttributeResolver::resolve ─────┴─> any accepts? ─> DecisionEvent
//!                                                                            ↓
//!                                                                 [Sinks]  [Metrics]
//! ```
//!
//! Decisions are "any matching rule permits": there is no precedence among
//! rules and no deny rules. The first accepting rule is reported on the
//! event for diagnostics only.

pub mod audit;
pub mod decision;
pub mod metrics;

pub use audit::{AuditLog, AuditStats, DecisionSink, TracingSink};
pub use decision::DecisionEvent;
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::guard::YieldGuard;
use crate::registry::{OperationScope, PrivilegeRegistry, ScopeId};
use crate::resolver::{merge_attributes, AttributeResolver};
use crate::types::{AccessRequest, Attributes};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Main decision engine
///
/// Cheap to share behind an `Arc`: every method takes `&self`, and the
/// registry and resolver handle their own synchronization.
pub struct AuthorizationEngine {
    /// Static and scoped rules
    registry: Arc<PrivilegeRegistry>,

    /// Dynamic attribute handlers
    resolver: Arc<AttributeResolver>,

    /// Decision observers
    sinks: Vec<Arc<dyn DecisionSink>>,

    /// In-memory trail, when enabled in config
    audit: Option<Arc<AuditLog>>,

    /// Counters, when enabled in config
    metrics: Option<Arc<MetricsCollector>>,

    config: EngineConfig,
}

impl AuthorizationEngine {
    /// Create an engine with a fresh registry and resolver
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_components(
            config,
            Arc::new(PrivilegeRegistry::new()),
            Arc::new(AttributeResolver::new()),
        )
    }

    /// Create an engine over an existing registry and resolver
    pub fn with_components(
        config: EngineConfig,
        registry: Arc<PrivilegeRegistry>,
        resolver: Arc<AttributeResolver>,
    ) -> Result<Self> {
        config.validate()?;

        let mut sinks: Vec<Arc<dyn DecisionSink>> = Vec::new();
        if config.log_decisions {
            sinks.push(Arc::new(TracingSink));
        }

        let audit = if config.audit.enabled {
            let log = Arc::new(AuditLog::new(config.audit.capacity));
            sinks.push(Arc::clone(&log) as Arc<dyn DecisionSink>);
            Some(log)
        } else {
            None
        };

        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            "AuthorizationEngine initialized with precedence={:?}, log_decisions={}, audit={}, metrics={}",
            config.attribute_precedence,
            config.log_decisions,
            config.audit.enabled,
            config.enable_metrics
        );

        Ok(Self {
            registry,
            resolver,
            sinks,
            audit,
            metrics,
            config,
        })
    }

    /// Attach an additional decision sink
    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn registry(&self) -> &Arc<PrivilegeRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<AttributeResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// In-memory audit trail, if enabled
    pub fn audit_log(&self) -> Option<&Arc<AuditLog>> {
        self.audit.as_ref()
    }

    /// Counter snapshot, if metrics are enabled
    pub fn metrics(&self) -> Option<EngineMetrics> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    /// Open an operation scope on the engine's registry
    pub fn begin_scope(&self) -> OperationScope {
        self.registry.begin_scope()
    }

    /// Guarded retrieval bound to `scope`
    pub fn guard(&self, scope: Option<&ScopeId>) -> YieldGuard<'_> {
        YieldGuard::new(self, scope.copied())
    }

    // ------------------------------------------------------------------
    // Decision surface
    // ------------------------------------------------------------------

    /// Whether `request` is permitted in `scope`
    pub fn permitted(&self, request: &AccessRequest, scope: Option<&ScopeId>) -> Result<bool> {
        Ok(self.evaluate(request, scope, None)?.granted)
    }

    /// Whether `request` is permitted, deriving dynamic attributes from `protected`
    pub fn permitted_with_value(
        &self,
        request: &AccessRequest,
        scope: Option<&ScopeId>,
        protected: &dyn Any,
    ) -> Result<bool> {
        Ok(self.evaluate(request, scope, Some(protected))?.granted)
    }

    /// Full decision record for `request`
    pub fn decide(&self, request: &AccessRequest, scope: Option<&ScopeId>) -> Result<DecisionEvent> {
        self.evaluate(request, scope, None)
    }

    /// Full decision record, deriving dynamic attributes from `protected`
    pub fn decide_with_value(
        &self,
        request: &AccessRequest,
        scope: Option<&ScopeId>,
        protected: &dyn Any,
    ) -> Result<DecisionEvent> {
        self.evaluate(request, scope, Some(protected))
    }

    pub(crate) fn record_not_found(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_not_found();
        }
    }

    /// Scan the visible rules and emit one event
    ///
    /// Scope misuse fails before any handler runs or any event is emitted.
    fn evaluate(
        &self,
        request: &AccessRequest,
        scope: Option<&ScopeId>,
        protected: Option<&dyn Any>,
    ) -> Result<DecisionEvent> {
        let start = Instant::now();

        let view = self.registry.view(scope)?;

        let dynamic = match protected {
            Some(value) => self.resolver.resolve(&request.resource, &request.action, value),
            None => Attributes::new(),
        };
        let attributes = merge_attributes(
            &request.attributes,
            dynamic,
            self.config.attribute_precedence,
        );

        debug!(
            resource = %request.resource,
            action = %request.action,
            candidates = view.len(),
            "Scanning privileges"
        );

        let matched = view
            .iter()
            .find(|p| p.accepts(&request.resource, &request.action, &request.roles, &attributes))
            .cloned();

        let event = match matched {
            Some(rule) => DecisionEvent::grant(
                request.resource.clone(),
                request.action.clone(),
                request.roles.clone(),
                attributes,
                rule,
            ),
            None => DecisionEvent::deny(
                request.resource.clone(),
                request.action.clone(),
                request.roles.clone(),
                attributes,
            ),
        }
        .in_scope(scope.copied());

        for sink in &self.sinks {
            sink.record(&event);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(event.granted, start.elapsed());
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::error::AuthzError;
    use crate::privilege::Privilege;
    use crate::resolver::AttributePrecedence;
    use serde_json::json;

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            log_decisions: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = AuthorizationEngine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.sinks.len(), 1);
        assert!(engine.audit_log().is_none());
        assert!(engine.metrics().is_some());
    }

    #[test]
    fn test_audit_sink_receives_each_decision_once() {
        let config = EngineConfig {
            audit: AuditConfig {
                enabled: true,
                capacity: 16,
            },
            ..quiet_config()
        };
        let engine = AuthorizationEngine::new(config).unwrap();
        engine.registry().add_global(Privilege::new("Book", "list").unwrap());

        assert!(engine.permitted(&AccessRequest::new("Book", "list"), None).unwrap());
        assert!(!engine.permitted(&AccessRequest::new("Book", "burn"), None).unwrap());

        let audit = engine.audit_log().unwrap();
        assert_eq!(audit.stats().total_decisions, 2);
        assert_eq!(audit.stats().granted_decisions, 1);
    }

    #[test]
    fn test_decide_reports_first_match() {
        let engine = AuthorizationEngine::new(quiet_config()).unwrap();
        engine
            .registry()
            .add_global(Privilege::builder("Book", "get").restrict("owned", true).build().unwrap());
        engine
            .registry()
            .add_global(Privilege::builder("Book", "get").restrict("public", true).build().unwrap());

        let request = AccessRequest::new("Book", "get")
            .with_attribute("owned", true)
            .with_attribute("public", true);
        let event = engine.decide(&request, None).unwrap();

        assert!(event.granted);
        assert_eq!(
            event.matched_rule.unwrap().restrictions().get("owned"),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_static_precedence_config() {
        let config = EngineConfig {
            attribute_precedence: AttributePrecedence::Static,
            ..quiet_config()
        };
        let engine = AuthorizationEngine::new(config).unwrap();
        engine
            .registry()
            .add_global(Privilege::builder("Book", "get").restrict("owned", true).build().unwrap());
        engine
            .resolver()
            .register(Some("Book"), None, |_: &dyn Any| {
                let mut attrs = Attributes::new();
                attrs.insert("owned".to_string(), json!(false));
                Ok(attrs)
            })
            .unwrap();

        let request = AccessRequest::new("Book", "get").with_attribute("owned", true);
        assert!(engine.permitted_with_value(&request, None, &()).unwrap());
    }

    #[test]
    fn test_scope_misuse_emits_nothing() {
        let config = EngineConfig {
            audit: AuditConfig {
                enabled: true,
                capacity: 16,
            },
            ..quiet_config()
        };
        let engine = AuthorizationEngine::new(config).unwrap();

        let result = engine.permitted(&AccessRequest::new("Book", "list"), Some(&ScopeId::new()));
        assert!(matches!(result, Err(AuthzError::ScopeMisuse { .. })));
        assert!(engine.audit_log().unwrap().is_empty());
        assert_eq!(engine.metrics().unwrap().total_decisions, 0);
    }
}
