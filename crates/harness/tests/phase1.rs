use std::collections::HashSet;

use calcgraph_core::{NodeBody, NodeId, NodeKind, NodePosition, Provenance};
use calcgraph_engine::find_duplicate_symbols;
use calcgraph_harness::TestBench;

// ============================================================================
// Node factory defaults
// ============================================================================

#[test]
fn add_node_assigns_variant_defaults() {
    let mut bench = TestBench::new();
    for kind in NodeKind::ALL {
        let id = bench.session.add_node(kind, None).unwrap();
        let node = bench.session.document().node(id).unwrap();
        assert_eq!(node.kind(), kind);
        assert!(matches!(node.provenance, Provenance::User { .. }));
        assert!(node.verification.is_unverified());
        assert!(node.dependencies.is_empty());
        assert!(node.dependents.is_empty());
        assert!(node.assumptions.is_empty());
        assert!(node.position.is_some());
        assert!(!node.is_stale);
    }
    assert_eq!(bench.session.document().nodes.len(), 8);
}

#[test]
fn add_node_selects_the_new_node() {
    let mut bench = TestBench::new();
    let id = bench.session.add_node(NodeKind::Text, None).unwrap();
    assert_eq!(bench.session.selected_node(), Some(id));
}

#[test]
fn added_nodes_stack_downward_without_explicit_position() {
    let mut bench = TestBench::new();
    let first = bench.session.add_node(NodeKind::Text, None).unwrap();
    let second = bench.session.add_node(NodeKind::Text, None).unwrap();
    let doc = bench.session.document();
    let y0 = doc.node(first).unwrap().position.unwrap().y;
    let y1 = doc.node(second).unwrap().position.unwrap().y;
    assert!(y1 > y0);
}

// ============================================================================
// Symbol collision resolution
// ============================================================================

#[test]
fn two_default_givens_get_suffixed_symbols() {
    let mut bench = TestBench::new();
    let first = bench.session.add_node(NodeKind::Given, None).unwrap();
    let second = bench.session.add_node(NodeKind::Given, None).unwrap();
    assert_eq!(bench.symbol_of(first), "x_1");
    assert_eq!(bench.symbol_of(second), "x_2");
}

#[test]
fn renaming_to_a_bare_symbol_demotes_the_holder() {
    let mut bench = TestBench::new();
    let holder = bench.add_given("F", 100.0, Some("N"));
    let editing = bench.session.add_node(NodeKind::Given, None).unwrap();

    bench.session.update_node(editing, |node| {
        if let NodeBody::Given { symbol, .. } = &mut node.body {
            *symbol = "F".to_string();
        }
    });

    assert_eq!(bench.symbol_of(holder), "F_1");
    assert_eq!(bench.symbol_of(editing), "F_2");
}

#[test]
fn collision_with_gapped_suffixes_takes_max_plus_one() {
    let mut bench = TestBench::new();
    let f1 = bench.insert_raw_given("F_1", 1.0);
    let f3 = bench.insert_raw_given("F_3", 3.0);
    let incoming = bench.session.add_node(NodeKind::Given, None).unwrap();

    bench.session.update_node(incoming, |node| {
        if let NodeBody::Given { symbol, .. } = &mut node.body {
            *symbol = "F".to_string();
        }
    });

    assert_eq!(bench.symbol_of(f1), "F_1");
    assert_eq!(bench.symbol_of(f3), "F_3");
    assert_eq!(bench.symbol_of(incoming), "F_4");
}

#[test]
fn symbol_uniqueness_holds_under_mixed_operations() {
    let mut bench = TestBench::new();
    let seed = bench.add_given("F", 10.0, Some("N"));
    for _ in 0..4 {
        bench.session.duplicate_node(seed).unwrap();
    }
    for _ in 0..3 {
        let id = bench.session.add_node(NodeKind::Given, None).unwrap();
        bench.session.update_node(id, |node| {
            if let NodeBody::Given { symbol, .. } = &mut node.body {
                *symbol = "F".to_string();
            }
        });
    }

    let doc = bench.session.document();
    let symbols: Vec<&str> = doc.givens().filter_map(|n| n.given_symbol()).collect();
    let unique: HashSet<&str> = symbols.iter().copied().collect();
    assert_eq!(symbols.len(), unique.len(), "duplicate symbols: {symbols:?}");
    assert!(find_duplicate_symbols(doc).is_empty());
}

#[test]
fn raw_insertion_bypasses_resolution_and_lint_reports_it() {
    let mut bench = TestBench::new();
    let a = bench.insert_raw_given("F", 1.0);
    let b = bench.insert_raw_given("F", 2.0);

    let duplicates = find_duplicate_symbols(bench.session.document());
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].0, "F");
    assert_eq!(duplicates[0].1, vec![a, b]);
}

// ============================================================================
// update_node
// ============================================================================

#[test]
fn update_node_on_missing_id_is_a_noop() {
    let mut bench = TestBench::new();
    bench.add_given("F", 1.0, None);
    let before = bench.session.document().clone();

    let touched = bench.session.update_node(NodeId::new(), |node| {
        node.is_stale = true;
    });

    assert!(!touched);
    assert_eq!(*bench.session.document(), before);
}

#[test]
fn update_node_preserves_identity() {
    let mut bench = TestBench::new();
    let id = bench.add_given("F", 1.0, None);
    bench.session.update_node(id, |node| {
        node.id = NodeId::new();
    });
    assert!(bench.session.document().node(id).is_some());
}

#[test]
fn unchanged_symbol_is_not_resolved_against_itself() {
    let mut bench = TestBench::new();
    let id = bench.add_given("F", 1.0, None);
    bench.session.update_node(id, |node| {
        if let NodeBody::Given { description, .. } = &mut node.body {
            *description = Some("applied load".to_string());
        }
    });
    assert_eq!(bench.symbol_of(id), "F");
}

#[test]
fn mutations_advance_updated_at() {
    let mut bench = TestBench::new();
    let t0 = bench.session.document().updated_at;
    bench.session.add_node(NodeKind::Text, None).unwrap();
    let t1 = bench.session.document().updated_at;
    bench.session.add_node(NodeKind::Text, None).unwrap();
    let t2 = bench.session.document().updated_at;
    assert!(t1 > t0);
    assert!(t2 > t1);
    assert!(bench.session.is_dirty());
}

// ============================================================================
// Deletion cascade
// ============================================================================

#[test]
fn deletion_plan_lists_computed_dependents() {
    let mut bench = TestBench::new();
    let f = bench.add_given("F", 100.0, Some("N"));
    let d1 = bench.add_computed_result("delta", 0.2, vec![f]);
    let d2 = bench.add_computed_result("sigma", 42.0, vec![f]);

    let plan = bench.session.plan_deletion(f).unwrap();
    assert_eq!(plan.node_id, f);
    assert_eq!(plan.cascading_stale, vec![d1, d2]);

    // Planning alone mutates nothing.
    assert!(bench.session.document().node(f).is_some());
    assert!(!bench.session.document().node(d1).unwrap().is_stale);
}

#[test]
fn deletion_cascade_marks_exactly_the_dependents() {
    let mut bench = TestBench::new();
    let f = bench.add_given("F", 100.0, Some("N"));
    let m = bench.add_given("m", 10.0, Some("kg"));
    let from_f = bench.add_computed_result("delta", 0.2, vec![f]);
    let from_m = bench.add_computed_result("a", 9.81, vec![m]);

    let outcome = bench.session.commit_deletion(f).unwrap();
    assert_eq!(outcome.removed, f);
    assert_eq!(outcome.stale_marked, vec![from_f]);

    let doc = bench.session.document();
    assert!(doc.node(f).is_none());
    assert!(doc.node(from_f).unwrap().is_stale);
    assert!(!doc.node(from_m).unwrap().is_stale);
    assert!(!doc.node(m).unwrap().is_stale);
}

#[test]
fn deleting_a_node_with_no_dependents_cascades_nothing() {
    let mut bench = TestBench::new();
    let note = bench.session.add_node(NodeKind::Text, None).unwrap();
    let plan = bench.session.plan_deletion(note).unwrap();
    assert!(plan.cascading_stale.is_empty());

    let outcome = bench.session.commit_deletion(note).unwrap();
    assert!(outcome.stale_marked.is_empty());
}

#[test]
fn deletion_of_missing_id_is_a_noop() {
    let mut bench = TestBench::new();
    bench.add_given("F", 1.0, None);
    let before = bench.session.document().clone();

    assert!(bench.session.plan_deletion(NodeId::new()).is_none());
    assert!(bench.session.commit_deletion(NodeId::new()).is_none());
    assert_eq!(*bench.session.document(), before);
}

#[test]
fn deletion_clears_selection_and_prunes_assumption_scope() {
    let mut bench = TestBench::new();
    let f = bench.add_given("F", 1.0, None);
    let assumption = bench
        .session
        .add_assumption("static loading only", None, vec![f])
        .unwrap();
    bench.session.select_node(Some(f));

    bench.session.commit_deletion(f).unwrap();

    assert_eq!(bench.session.selected_node(), None);
    let ledger = bench.session.document().assumption(assumption).unwrap();
    assert!(ledger.scope.is_empty());
}

// ============================================================================
// duplicate_node
// ============================================================================

#[test]
fn duplicate_resets_provenance_and_resolves_symbol() {
    let mut bench = TestBench::new();
    let original = bench.add_given("F", 100.0, Some("N"));
    bench.session.update_node_position(original, NodePosition::at(10.0, 20.0));

    let copy = bench.session.duplicate_node(original).unwrap();

    assert_ne!(copy, original);
    assert_eq!(bench.symbol_of(original), "F_1");
    assert_eq!(bench.symbol_of(copy), "F_2");

    let doc = bench.session.document();
    let copied = doc.node(copy).unwrap();
    assert!(matches!(copied.provenance, Provenance::User { .. }));
    assert!(copied.verification.is_unverified());
    let position = copied.position.unwrap();
    assert_eq!(position.x, 50.0);
    assert_eq!(position.y, 60.0);

    // The copy lands right after the original.
    assert_eq!(doc.node_index(copy), Some(doc.node_index(original).unwrap() + 1));
    assert_eq!(bench.session.selected_node(), Some(copy));
}

#[test]
fn duplicate_of_missing_id_is_a_noop() {
    let mut bench = TestBench::new();
    bench.add_given("F", 1.0, None);
    let before = bench.session.document().clone();
    assert!(bench.session.duplicate_node(NodeId::new()).is_none());
    assert_eq!(*bench.session.document(), before);
}

#[test]
fn duplicated_verified_node_starts_unverified() {
    let mut bench = TestBench::new();
    let original = bench.add_given("F", 100.0, Some("N"));
    let compute = calcgraph_harness::StubCompute::passing();
    bench.session.verify_node(&compute, original);
    assert!(bench
        .session
        .document()
        .node(original)
        .unwrap()
        .verification
        .is_verified());

    let copy = bench.session.duplicate_node(original).unwrap();
    assert!(bench
        .session
        .document()
        .node(copy)
        .unwrap()
        .verification
        .is_unverified());
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn selecting_a_nonexistent_id_clears_selection() {
    let mut bench = TestBench::new();
    let id = bench.session.add_node(NodeKind::Text, None).unwrap();
    bench.session.select_node(Some(id));
    assert_eq!(bench.session.selected_node(), Some(id));

    bench.session.select_node(Some(NodeId::new()));
    assert_eq!(bench.session.selected_node(), None);
}

// ============================================================================
// set_given and staleness propagation
// ============================================================================

#[test]
fn set_given_creates_when_missing_and_updates_in_place() {
    let mut bench = TestBench::new();
    let id = bench.add_given("F", 100.0, Some("N"));
    let again = bench.add_given("F", 250.0, None);
    assert_eq!(id, again);

    let doc = bench.session.document();
    assert_eq!(doc.givens().count(), 1);
    let value = doc.node(id).unwrap().value().unwrap();
    assert_eq!(value.value, 250.0);
    // The unit is kept when the update doesn't supply one.
    assert_eq!(value.unit.as_ref().unwrap().expression, "N");
}

#[test]
fn set_given_marks_transitive_dependents_stale() {
    let mut bench = TestBench::new();
    let f = bench.add_given("F", 100.0, Some("N"));
    let mid = bench.add_computed_result("delta", 0.2, vec![f]);
    let leaf = bench.add_computed_result("ratio", 0.5, vec![mid]);
    let unrelated = bench.add_computed_result("other", 1.0, vec![]);

    bench.add_given("F", 300.0, None);

    let doc = bench.session.document();
    assert!(doc.node(mid).unwrap().is_stale);
    assert!(doc.node(leaf).unwrap().is_stale);
    assert!(!doc.node(unrelated).unwrap().is_stale);
    assert!(doc.node(f).unwrap().verification.is_unverified());
}

// ============================================================================
// Assumption ledger
// ============================================================================

#[test]
fn assumption_scope_is_bidirectional() {
    let mut bench = TestBench::new();
    let f = bench.add_given("F", 1.0, None);
    let m = bench.add_given("m", 2.0, None);

    let a = bench
        .session
        .add_assumption("loads are static", Some("dF/dt = 0"), vec![f])
        .unwrap();

    let doc = bench.session.document();
    assert_eq!(doc.assumption(a).unwrap().scope, vec![f]);
    assert!(doc.node(f).unwrap().assumptions.contains(&a));
    assert!(!doc.node(m).unwrap().assumptions.contains(&a));

    assert!(bench.session.add_to_scope(a, m));
    let doc = bench.session.document();
    assert_eq!(doc.assumption(a).unwrap().scope, vec![f, m]);
    assert!(doc.node(m).unwrap().assumptions.contains(&a));

    assert!(bench.session.remove_from_scope(a, f));
    let doc = bench.session.document();
    assert_eq!(doc.assumption(a).unwrap().scope, vec![m]);
    assert!(!doc.node(f).unwrap().assumptions.contains(&a));
}

#[test]
fn removing_an_assumption_strips_it_from_nodes() {
    let mut bench = TestBench::new();
    let f = bench.add_given("F", 1.0, None);
    let a = bench
        .session
        .add_assumption("small deflections", None, vec![f])
        .unwrap();

    assert!(bench.session.remove_assumption(a));
    let doc = bench.session.document();
    assert!(doc.assumption(a).is_none());
    assert!(doc.node(f).unwrap().assumptions.is_empty());
}

#[test]
fn toggling_assumption_active() {
    let mut bench = TestBench::new();
    let a = bench
        .session
        .add_assumption("frictionless", None, vec![])
        .unwrap();
    assert!(bench.session.document().assumption(a).unwrap().active);

    assert!(bench.session.set_assumption_active(a, false));
    assert!(!bench.session.document().assumption(a).unwrap().active);
}

#[test]
fn assumption_scope_drops_unknown_node_ids() {
    let mut bench = TestBench::new();
    let f = bench.add_given("F", 1.0, None);
    let a = bench
        .session
        .add_assumption("scoped", None, vec![f, NodeId::new()])
        .unwrap();
    assert_eq!(bench.session.document().assumption(a).unwrap().scope, vec![f]);
}
