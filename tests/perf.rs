#![cfg(all(feature = "memory-store", feature = "memory-cache"))]

use futures::executor::block_on;
use scope_rbac::{
    Catalog, CompanyId, Decision, EngineBuilder, Identity, MemoryCache, MemoryStore,
    PolicyRegistry, RequestContext, Requirement, ScopeNode, ScopeNodeId, ScopeType, Synchronizer,
    UserId, subtree,
};
use std::hint::black_box;
use std::time::{Duration, Instant};

const REPEATS: usize = 5;
const USER: UserId = UserId::new(1);

fn benchmark_sync<F>(name: &str, iterations: usize, mut op: F)
where
    F: FnMut(),
{
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        for _ in 0..iterations {
            op();
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / iterations as f64;

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1} (iters={iterations}, repeats={REPEATS})"
    );
}

/// One company node with `fanout` states, each with `fanout` districts.
fn build_tree(fanout: i64) -> Vec<ScopeNode> {
    let company = ScopeNode::root(ScopeNodeId::new(1), ScopeType::Company, CompanyId::new(1));
    let mut nodes = vec![company.clone()];
    let mut next = 2;
    for _ in 0..fanout {
        let state = ScopeNode::child_of(&company, ScopeNodeId::new(next), ScopeType::State);
        next += 1;
        for _ in 0..fanout {
            nodes.push(ScopeNode::child_of(
                &state,
                ScopeNodeId::new(next),
                ScopeType::District,
            ));
            next += 1;
        }
        nodes.push(state);
    }
    nodes
}

fn setup_store(fanout: i64) -> (MemoryStore, ScopeNodeId) {
    let store = MemoryStore::new();
    block_on(Synchronizer::new(store.clone(), Catalog::standard()).synchronize(false)).unwrap();

    let mut nodes = build_tree(fanout);
    nodes.sort_by_key(|node| node.scope_type);
    for node in nodes {
        store.add_scope_node(node).unwrap();
    }
    store.assign_role(USER, store.role_id("Cmanager").unwrap());

    let last = ScopeNodeId::new(1 + fanout + fanout * fanout);
    (store, last)
}

#[test]
#[ignore = "manual performance test; run with --ignored --nocapture"]
fn perf_subtree_and_authorize() {
    let iterations = 20_000;

    let nodes = build_tree(32);
    benchmark_sync("subtree_bfs_1057_nodes", iterations / 10, || {
        black_box(subtree(&nodes, ScopeNodeId::new(1)));
    });

    let requirement: Requirement = PolicyRegistry::from_catalog(&Catalog::standard())
        .resolve("PRODUCTS_READ")
        .unwrap();

    let (store, target) = setup_store(32);
    let request = RequestContext::new(Identity::new(USER).with_scope_node(ScopeNodeId::new(1)))
        .with_query("scopeNodeId", target.to_string());
    let engine = EngineBuilder::new(store).build();
    benchmark_sync("authorize_scoped_no_cache", iterations / 10, || {
        let decision = block_on(engine.authorize(&requirement, &request)).unwrap();
        black_box(decision);
    });

    let (store, _) = setup_store(32);
    let engine = EngineBuilder::new(store)
        .cache(MemoryCache::new(8_192).with_ttl(Duration::from_secs(60)))
        .build();
    let warm = block_on(engine.authorize(&requirement, &request)).unwrap();
    assert_eq!(warm, Decision::Allow);
    benchmark_sync("authorize_scoped_hot_cache", iterations, || {
        let decision = block_on(engine.authorize(&requirement, &request)).unwrap();
        black_box(decision);
    });
}
