#![cfg(feature = "memory-store")]

use futures::executor::block_on;
use scope_rbac::{
    Catalog, CompanyId, Decision, DenyReason, Engine, EngineBuilder, Error, Identity, MemoryStore,
    PermissionCode, PolicyRegistry, RequestContext, Requirement, RoleCode, ScopeDenial, ScopeNode,
    ScopeNodeId, ScopeType, Synchronizer, UserId,
};
use std::collections::HashSet;

const MANAGER: UserId = UserId::new(1);
const EMPLOYEE: UserId = UserId::new(2);
const ROOT: UserId = UserId::new(3);

fn node(id: i64) -> ScopeNodeId {
    ScopeNodeId::new(id)
}

/// Company 1: 10 -> {20, 30}, 20 -> 55. Company 2: 999 -> 7.
fn setup() -> MemoryStore {
    let store = MemoryStore::new();
    block_on(Synchronizer::new(store.clone(), Catalog::standard()).synchronize(false)).unwrap();

    let company = ScopeNode::root(node(10), ScopeType::Company, CompanyId::new(1));
    let state_a = ScopeNode::child_of(&company, node(20), ScopeType::State);
    let state_b = ScopeNode::child_of(&company, node(30), ScopeType::State);
    let district = ScopeNode::child_of(&state_a, node(55), ScopeType::District);
    let other = ScopeNode::root(node(999), ScopeType::Company, CompanyId::new(2));
    let other_state = ScopeNode::child_of(&other, node(7), ScopeType::State);
    for scope_node in [company, state_a, state_b, district, other, other_state] {
        store.add_scope_node(scope_node).unwrap();
    }

    store.assign_role(MANAGER, store.role_id("Cmanager").unwrap());
    store.assign_role(EMPLOYEE, store.role_id("Cemployee").unwrap());
    store.assign_role(ROOT, store.role_id("SuperAdmin").unwrap());
    store
}

fn engine() -> Engine<MemoryStore> {
    EngineBuilder::new(setup()).build()
}

fn resolve(code: &str) -> Requirement {
    PolicyRegistry::from_catalog(&Catalog::standard())
        .resolve(code)
        .unwrap()
}

fn ids(values: &[i64]) -> HashSet<ScopeNodeId> {
    values.iter().copied().map(ScopeNodeId::new).collect()
}

#[test]
fn subtree_should_include_self_and_descendants_only() {
    let engine = engine();

    assert_eq!(
        block_on(engine.accessible_scope_ids(node(10))).unwrap(),
        ids(&[10, 20, 30, 55])
    );
    assert_eq!(
        block_on(engine.accessible_scope_ids(node(20))).unwrap(),
        ids(&[20, 55])
    );
    assert_eq!(
        block_on(engine.accessible_scope_ids(node(55))).unwrap(),
        ids(&[55])
    );
    assert!(
        block_on(engine.accessible_scope_ids(node(12345)))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn descendants_should_not_reach_ancestors_or_siblings() {
    let engine = engine();

    assert!(block_on(engine.can_access(node(10), node(55))).unwrap());
    assert!(!block_on(engine.can_access(node(55), node(20))).unwrap());
    assert!(!block_on(engine.can_access(node(20), node(30))).unwrap());
    assert!(!block_on(engine.can_access(node(10), node(999))).unwrap());

    let result = block_on(engine.ensure_in_subtree(node(20), node(30)));
    assert!(matches!(
        result,
        Err(Error::ScopeDenied(ScopeDenial::OutsideSubtree { .. }))
    ));
}

#[test]
fn permissions_should_follow_the_grant_matrix() {
    let engine = engine();

    assert!(block_on(engine.has_permission(MANAGER, "PRODUCTS_READ")).unwrap());
    assert!(!block_on(engine.has_permission(MANAGER, "PRODUCTS_DELETE")).unwrap());
    assert!(!block_on(engine.has_permission(MANAGER, "products_read")).unwrap());
    assert!(
        block_on(engine.has_any_permission(EMPLOYEE, &["PRODUCTS_DELETE", "SALES_CREATE"]))
            .unwrap()
    );
    assert!(block_on(engine.user_permissions(UserId::new(404))).unwrap().is_empty());
}

#[test]
fn manager_should_be_denied_missing_permission_before_scope() {
    let engine = engine();
    let request = RequestContext::new(Identity::new(MANAGER).with_scope_node(node(10)))
        .with_query("scopeNodeId", "55");

    let decision = block_on(engine.authorize(&resolve("PRODUCTS_DELETE"), &request)).unwrap();

    assert_eq!(
        decision,
        Decision::Deny(DenyReason::PermissionDenied {
            permission: PermissionCode::try_from("PRODUCTS_DELETE").unwrap(),
        })
    );
}

#[test]
fn manager_should_reach_own_subtree_only() {
    let engine = engine();
    let identity = Identity::new(MANAGER).with_scope_node(node(10));

    let inside = RequestContext::new(identity.clone()).with_query("scopeNodeId", "55");
    assert_eq!(
        block_on(engine.authorize(&resolve("PRODUCTS_READ"), &inside)).unwrap(),
        Decision::Allow
    );

    let outside = RequestContext::new(identity).with_route("scopeNodeId", "999");
    assert_eq!(
        block_on(engine.authorize(&resolve("PRODUCTS_READ"), &outside)).unwrap(),
        Decision::Deny(DenyReason::ScopeDenied(ScopeDenial::OutsideSubtree {
            actor: node(10),
            target: node(999),
        }))
    );
}

#[test]
fn actor_without_scope_should_be_denied_scoped_targets() {
    let engine = engine();
    let identity = Identity::new(EMPLOYEE);

    let scoped = RequestContext::new(identity.clone()).with_query("scopeNodeId", "7");
    assert_eq!(
        block_on(engine.authorize(&resolve("PRODUCTS_READ"), &scoped)).unwrap(),
        Decision::Deny(DenyReason::ScopeDenied(ScopeDenial::NoActorScope {
            target: node(7),
        }))
    );

    let unscoped = RequestContext::new(identity);
    assert!(
        block_on(engine.authorize(&resolve("PRODUCTS_READ"), &unscoped))
            .unwrap()
            .is_allowed()
    );
}

#[test]
fn super_admin_should_bypass_permission_and_scope() {
    let engine = engine();
    let anything = Requirement::new(PermissionCode::try_from("ANYTHING_DELETE").unwrap());

    let stored = RequestContext::new(Identity::new(ROOT).with_scope_node(node(20)))
        .with_query("scopeNodeId", "999");
    assert_eq!(
        block_on(engine.authorize(&anything, &stored)).unwrap(),
        Decision::Allow
    );

    let marker = RequestContext::new(
        Identity::new(UserId::new(77)).with_role(RoleCode::try_from("SuperAdmin").unwrap()),
    )
    .with_query("scopeNodeId", "7");
    assert_eq!(
        block_on(engine.authorize(&anything, &marker)).unwrap(),
        Decision::Allow
    );
}

#[test]
fn anonymous_request_should_require_authentication() {
    let engine = engine();
    let decision =
        block_on(engine.authorize(&resolve("PRODUCTS_READ"), &RequestContext::anonymous()))
            .unwrap();

    assert_eq!(decision, Decision::Deny(DenyReason::AuthenticationRequired));
    assert!(matches!(
        decision.into_result(),
        Err(Error::AuthenticationRequired)
    ));
}

#[cfg(feature = "memory-cache")]
#[test]
fn cached_subtree_should_follow_company_invalidation() {
    use scope_rbac::MemoryCache;
    use std::time::Duration;

    let store = setup();
    let engine = EngineBuilder::new(store.clone())
        .cache(MemoryCache::new(64).with_ttl(Duration::from_secs(60)))
        .build();
    assert_eq!(
        block_on(engine.accessible_scope_ids(node(30))).unwrap(),
        ids(&[30])
    );

    let state_b = ScopeNode {
        id: node(30),
        scope_type: ScopeType::State,
        company_id: CompanyId::new(1),
        parent_id: Some(node(10)),
        is_active: true,
    };
    store
        .add_scope_node(ScopeNode::child_of(&state_b, node(31), ScopeType::District))
        .unwrap();
    assert_eq!(
        block_on(engine.accessible_scope_ids(node(30))).unwrap(),
        ids(&[30])
    );

    block_on(engine.invalidate_company(CompanyId::new(1)));
    assert_eq!(
        block_on(engine.accessible_scope_ids(node(30))).unwrap(),
        ids(&[30, 31])
    );
}
