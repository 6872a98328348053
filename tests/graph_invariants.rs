/// Property-style tests for the tag tree under long random operation sequences.
///
/// Every structural operation goes through `KnowledgeBase` backed by an
/// `InMemoryStore`, and the full invariant check runs after each step:
/// - subtree entry totals
/// - `modified_at` monotonicity along every parent chain
/// - an acyclic tree reachable from the root
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tagmap::graph::GraphError;
use tagmap::{
    EntryId, EntryRecord, InMemoryStore, KnowledgeBase, ServiceError, Snapshot, TagId, TagRecord,
    Vector,
};
use time::macros::datetime;

fn snapshot() -> Snapshot {
    let mut main = TagRecord::new(TagId::new(1), "main");
    main.children = vec![TagId::new(2), TagId::new(3), TagId::new(4)];
    let mut rust = TagRecord::new(TagId::new(2), "rust");
    rust.children = vec![TagId::new(5)];
    let at = datetime!(2021-06-01 00:00:00 UTC);
    let entry = |id: i64, category: i64| EntryRecord {
        id: EntryId::new(id),
        title: format!("entry {id}"),
        content: String::new(),
        created_at: at,
        modified_at: at,
        category: TagId::new(category),
    };
    Snapshot {
        tags: vec![
            main,
            rust,
            TagRecord::new(TagId::new(3), "other"),
            TagRecord::new(TagId::new(4), "cooking"),
            TagRecord::new(TagId::new(5), "async"),
        ],
        entries: vec![entry(10, 2), entry(11, 5), entry(12, 4), entry(13, 3)],
    }
}

fn load(seed: u64) -> KnowledgeBase {
    let store = Arc::new(InMemoryStore::from_snapshot(snapshot()));
    KnowledgeBase::load_with_rng(
        Box::new(store),
        Vector::new(4000.0, 4000.0),
        StdRng::seed_from_u64(seed),
    )
    .expect("failed to load knowledge base")
}

fn random_tag(kb: &KnowledgeBase, rng: &mut StdRng) -> TagId {
    *kb.graph()
        .tag_ids()
        .choose(rng)
        .expect("graph always has a root")
}

fn random_entry(kb: &KnowledgeBase, rng: &mut StdRng) -> Option<EntryId> {
    let ids: Vec<EntryId> = kb.graph().entries().map(|entry| entry.id()).collect();
    ids.choose(rng).copied()
}

/// Applies one random operation. Rejections are fine; corruption is not.
fn random_step(kb: &mut KnowledgeBase, rng: &mut StdRng) {
    let tag = random_tag(kb, rng);
    let other_tag = random_tag(kb, rng);
    let entry = random_entry(kb, rng);
    let result = match (rng.gen_range(0..6), entry) {
        (0, _) => kb.create_tag(tag).map(|_| ()),
        (1, _) => kb.delete_tag(tag),
        (2, _) => kb.reparent_tag(tag, other_tag),
        (3, _) => kb
            .select_tag(tag)
            .and_then(|()| kb.create_entry().map(|_| ())),
        (4, Some(entry)) => kb.delete_entry(entry),
        (_, Some(entry)) => kb.change_entry_parent(entry, tag),
        (_, None) => Ok(()),
    };
    if let Err(e) = result {
        assert!(
            matches!(e, ServiceError::Graph(_)),
            "only local rejections are expected, got {e}"
        );
    }
}

#[test]
fn invariants_hold_after_random_operations() {
    for seed in 0..20 {
        let mut kb = load(seed);
        let mut rng = StdRng::seed_from_u64(seed);

        for step in 0..200 {
            random_step(&mut kb, &mut rng);
            if let Err(e) = kb.graph().verify_invariants() {
                panic!("seed {seed} step {step}: {e}");
            }
        }
    }
}

#[test]
fn totals_match_a_fresh_count() {
    let mut kb = load(3);
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..300 {
        random_step(&mut kb, &mut rng);
    }

    let graph = kb.graph();
    for tag in graph.tags() {
        let counted = graph
            .subtree_entries(tag.id())
            .expect("subtree of a live tag")
            .len();
        assert_eq!(tag.total_entries(), counted, "tag {}", tag.id());
    }
    let root = graph.tag(graph.root()).expect("root exists");
    assert_eq!(root.total_entries(), graph.entry_count());
}

#[test]
fn closest_tag_never_returns_self_other_or_descendant() {
    for seed in 0..10 {
        let mut kb = load(seed);
        let mut rng = StdRng::seed_from_u64(seed + 100);
        for _ in 0..50 {
            random_step(&mut kb, &mut rng);
        }

        let graph = kb.graph();
        for &source in graph.tag_ids() {
            let Some(closest) = graph.closest_tag(source).expect("live tag") else {
                continue;
            };
            assert_ne!(closest, source);
            assert_ne!(Some(closest), graph.other());
            assert!(!graph.is_ancestor(source, closest));
        }
    }
}

#[test]
fn reparent_into_descendant_is_always_rejected() {
    let mut kb = load(1);

    let result = kb.reparent_tag(TagId::new(2), TagId::new(5));

    assert!(matches!(
        result,
        Err(ServiceError::Graph(GraphError::CyclicParent { .. }))
    ));
    kb.graph().verify_invariants().expect("tree untouched");
}
