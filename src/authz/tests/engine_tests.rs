//! Decision engine tests
//!
//! Tests for the decision pipeline:
//! Registry view → Attribute merge → Any-match grant → Decision event

use proptest::prelude::*;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;
use warrant_authz::{
    AccessRequest, Attributes, AuditConfig, AuthorizationEngine, DecisionEvent, DecisionSink,
    EngineConfig, Privilege, PrivilegeRegistry, AttributeResolver,
};

fn engine() -> AuthorizationEngine {
    AuthorizationEngine::new(EngineConfig {
        log_decisions: false,
        ..Default::default()
    })
    .unwrap()
}

fn restricted(resource: &str, action: &str, restrictions: &[(&str, Value)]) -> Privilege {
    restrictions
        .iter()
        .fold(Privilege::builder(resource, action), |b, (k, v)| b.restrict(*k, v.clone()))
        .build()
        .unwrap()
}

/// Sink that keeps every event it sees
#[derive(Default)]
struct CollectingSink {
    events: parking_lot::Mutex<Vec<DecisionEvent>>,
}

impl DecisionSink for CollectingSink {
    fn record(&self, event: &DecisionEvent) {
        self.events.lock().push(event.clone());
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_any_role_privilege_grants_without_roles() {
    let engine = engine();
    engine.registry().add_global(Privilege::new("Book", "list").unwrap());

    assert!(engine.permitted(&AccessRequest::new("Book", "list"), None).unwrap());
}

#[test]
fn test_role_group_requires_role() {
    let engine = engine();
    engine
        .registry()
        .add_global_group("admin", vec![Privilege::new("User", "edit").unwrap()])
        .unwrap();

    let request = AccessRequest::new("User", "edit");
    assert!(!engine.permitted(&request, None).unwrap());
    assert!(engine.permitted(&request.clone().with_role("admin"), None).unwrap());
    assert!(!engine.permitted(&request.with_role("Admin"), None).unwrap());
}

#[test]
fn test_alternative_restrictions_any_match_grants() {
    let engine = engine();
    engine.registry().add_global(restricted("Book", "get", &[("owned", json!(true))]));
    engine.registry().add_global(restricted("Book", "get", &[("public", json!(true))]));

    let owned = AccessRequest::new("Book", "get")
        .with_attribute("owned", true)
        .with_attribute("public", false);
    assert!(engine.permitted(&owned, None).unwrap());

    let neither = AccessRequest::new("Book", "get")
        .with_attribute("owned", false)
        .with_attribute("public", false);
    assert!(!engine.permitted(&neither, None).unwrap());
}

#[test]
fn test_all_restrictions_required() {
    let engine = engine();
    engine.registry().add_global(restricted(
        "Book",
        "delete",
        &[("owned", json!(true)), ("unlocked", json!(true))],
    ));

    let partial = AccessRequest::new("Book", "delete").with_attribute("owned", true);
    assert!(!engine.permitted(&partial, None).unwrap());

    let full = partial.with_attribute("unlocked", true);
    assert!(engine.permitted(&full, None).unwrap());
}

#[test]
fn test_scoped_privilege_visible_only_in_its_scope() {
    let engine = engine();
    let request = AccessRequest::new("Book", "read");

    let first = engine.begin_scope();
    first.add(Privilege::new("Book", "read").unwrap()).unwrap();
    assert!(engine.permitted(&request, Some(first.id())).unwrap());
    assert!(!engine.permitted(&request, None).unwrap());
    first.end().unwrap();

    let second = engine.begin_scope();
    assert!(!engine.permitted(&request, Some(second.id())).unwrap());
}

// ============================================================================
// MISMATCHES
// ============================================================================

#[test]
fn test_mismatched_and_unregistered_requests_denied() {
    let engine = engine();
    engine.registry().add_global(Privilege::new("Book", "list").unwrap());

    assert!(!engine.permitted(&AccessRequest::new("Book", "burn"), None).unwrap());
    assert!(!engine.permitted(&AccessRequest::new("Shelf", "list"), None).unwrap());
    assert!(!engine.permitted(&AccessRequest::new("book", "list"), None).unwrap());
    assert!(!engine.permitted(&AccessRequest::new("", "list"), None).unwrap());
    assert!(!engine.permitted(&AccessRequest::new("Book", ""), None).unwrap());
}

#[test]
fn test_empty_registry_denies() {
    let engine = engine();
    let event = engine.decide(&AccessRequest::new("Book", "list"), None).unwrap();
    assert!(!event.granted);
    assert!(event.matched_rule.is_none());
}

// ============================================================================
// DYNAMIC ATTRIBUTES
// ============================================================================

struct Book {
    owner: String,
}

#[test]
fn test_dynamic_attributes_from_protected_value() {
    let engine = engine();
    engine.registry().add_global(restricted("Book", "edit", &[("owned", json!(true))]));
    engine
        .resolver()
        .register_typed::<Book, _>(Some("Book"), None, |book| {
            let mut attrs = Attributes::new();
            attrs.insert("owned".to_string(), json!(book.owner == "alice"));
            Ok(attrs)
        })
        .unwrap();

    let request = AccessRequest::new("Book", "edit");
    let mine = Book { owner: "alice".to_string() };
    let theirs = Book { owner: "bob".to_string() };

    assert!(engine.permitted_with_value(&request, None, &mine).unwrap());
    assert!(!engine.permitted_with_value(&request, None, &theirs).unwrap());
}

#[test]
fn test_dynamic_attributes_win_by_default() {
    let engine = engine();
    engine.registry().add_global(restricted("Book", "edit", &[("owned", json!(true))]));
    engine
        .resolver()
        .register(Some("Book"), Some("edit"), |_: &dyn Any| {
            let mut attrs = Attributes::new();
            attrs.insert("owned".to_string(), json!(false));
            Ok(attrs)
        })
        .unwrap();

    let request = AccessRequest::new("Book", "edit").with_attribute("owned", true);
    assert!(!engine.permitted_with_value(&request, None, &()).unwrap());
    // Without a protected value no handler runs
    assert!(engine.permitted(&request, None).unwrap());
}

#[test]
fn test_failing_handler_degrades_to_static_attributes() {
    let engine = engine();
    engine.registry().add_global(restricted("Book", "get", &[("public", json!(true))]));
    engine
        .resolver()
        .register(None, None, |_: &dyn Any| Err(anyhow::anyhow!("catalog offline")))
        .unwrap();

    let request = AccessRequest::new("Book", "get").with_attribute("public", true);
    assert!(engine.permitted_with_value(&request, None, &()).unwrap());
    assert_eq!(engine.resolver().failure_count(), 1);
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_one_event_per_decision() {
    let sink = Arc::new(CollectingSink::default());
    let engine = engine().with_sink(Arc::clone(&sink) as Arc<dyn DecisionSink>);
    engine.registry().add_global(Privilege::new("Book", "list").unwrap());

    engine.permitted(&AccessRequest::new("Book", "list"), None).unwrap();
    engine.permitted(&AccessRequest::new("Book", "burn"), None).unwrap();
    engine
        .decide(&AccessRequest::new("Book", "list").with_role("reader"), None)
        .unwrap();

    let events = sink.events.lock();
    assert_eq!(events.len(), 3);
    assert!(events[0].granted);
    assert!(!events[1].granted);
    assert_eq!(events[2].roles, vec!["reader".to_string()]);
    assert_eq!(events[0].matched_rule.as_ref().map(|p| p.action()), Some("list"));
}

#[test]
fn test_event_carries_scope() {
    let sink = Arc::new(CollectingSink::default());
    let engine = engine().with_sink(Arc::clone(&sink) as Arc<dyn DecisionSink>);
    let scope = engine.begin_scope();

    engine.permitted(&AccessRequest::new("Book", "list"), Some(scope.id())).unwrap();

    assert_eq!(sink.events.lock()[0].scope, Some(*scope.id()));
}

#[test]
fn test_metrics_and_audit_track_decisions() {
    let engine = AuthorizationEngine::new(EngineConfig {
        log_decisions: false,
        audit: AuditConfig {
            enabled: true,
            capacity: 2,
        },
        ..Default::default()
    })
    .unwrap();
    engine.registry().add_global(Privilege::new("Book", "list").unwrap());

    for action in ["list", "burn", "list"] {
        engine.permitted(&AccessRequest::new("Book", action), None).unwrap();
    }

    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.total_decisions, 3);
    assert_eq!(metrics.granted, 2);
    assert_eq!(metrics.denied, 1);

    // Capacity 2 keeps only the latest two
    let audit = engine.audit_log().unwrap();
    assert_eq!(audit.len(), 2);
    assert_eq!(audit.recent(1)[0].action, "list");
}

#[test]
fn test_shared_registry_between_engines() {
    let registry = Arc::new(PrivilegeRegistry::new());
    let resolver = Arc::new(AttributeResolver::new());
    let quiet = EngineConfig {
        log_decisions: false,
        ..Default::default()
    };

    let a = AuthorizationEngine::with_components(quiet.clone(), Arc::clone(&registry), Arc::clone(&resolver)).unwrap();
    let b = AuthorizationEngine::with_components(quiet, Arc::clone(&registry), resolver).unwrap();

    a.registry().add_global(Privilege::new("Book", "list").unwrap());
    assert!(b.permitted(&AccessRequest::new("Book", "list"), None).unwrap());
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn label() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,8}"
}

fn restriction_map() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec((label(), any::<bool>()), 0..4)
}

fn build(resource: &str, action: &str, role: Option<&str>, restrictions: &[(String, bool)]) -> Privilege {
    let mut builder = Privilege::builder(resource, action);
    if let Some(role) = role {
        builder = builder.role(role);
    }
    for (key, value) in restrictions {
        builder = builder.restrict(key.clone(), *value);
    }
    builder.build().unwrap()
}

proptest! {
    #[test]
    fn prop_equality_is_reflexive_and_symmetric(
        resource in label(),
        action in label(),
        role in prop::option::of(label()),
        restrictions in restriction_map(),
    ) {
        let a = build(&resource, &action, role.as_deref(), &restrictions);
        let b = build(&resource, &action, role.as_deref(), &restrictions);
        prop_assert!(a.is_equal(&a));
        prop_assert!(a.is_equal(&b));
        prop_assert!(b.is_equal(&a));
    }

    #[test]
    fn prop_different_action_is_not_equal(
        resource in label(),
        action in label(),
        restrictions in restriction_map(),
    ) {
        let a = build(&resource, &action, None, &restrictions);
        let b = build(&resource, &format!("{}x", action), None, &restrictions);
        prop_assert!(!a.is_equal(&b));
        prop_assert!(!b.is_equal(&a));
    }

    #[test]
    fn prop_extra_attributes_still_accept(
        resource in label(),
        action in label(),
        restrictions in restriction_map(),
        extra in prop::collection::vec((label(), any::<bool>()), 0..4),
    ) {
        let privilege = build(&resource, &action, None, &restrictions);

        let mut attributes = Attributes::new();
        for (key, value) in &extra {
            attributes.insert(format!("extra_{}", key), json!(value));
        }
        for (key, value) in privilege.restrictions() {
            attributes.insert(key.clone(), value.clone());
        }

        let no_roles: [&str; 0] = [];
        prop_assert!(privilege.accepts(&resource, &action, &no_roles, &attributes));
    }

    #[test]
    fn prop_role_gate(
        role in label(),
        roles in prop::collection::vec(label(), 0..4),
    ) {
        let any_role = build("Book", "list", None, &[]);
        let gated = build("Book", "list", Some(&role), &[]);
        let attributes = Attributes::new();

        prop_assert!(any_role.accepts("Book", "list", &roles, &attributes));
        prop_assert_eq!(
            gated.accepts("Book", "list", &roles, &attributes),
            roles.contains(&role)
        );
    }

    #[test]
    fn prop_permitted_iff_some_rule_accepts(
        actions in prop::collection::vec(label(), 0..6),
        probe in label(),
    ) {
        let engine = engine();
        for action in &actions {
            engine.registry().add_global(Privilege::new("Book", action.as_str()).unwrap());
        }

        let granted = engine.permitted(&AccessRequest::new("Book", probe.as_str()), None).unwrap();
        prop_assert_eq!(granted, actions.contains(&probe));
    }
}
