use pretty_assertions::assert_eq;
use proptest::prelude::*;

use xform_engine::{DependencyGraph, Expr, Triggerable, TriggerableId};
use xform_model::{DataInstance, DataType, TreeElement, TreeReference};

fn leaves(count: usize) -> DataInstance {
    DataInstance::new(TreeElement::group(
        "d",
        (0..count)
            .map(|i| TreeElement::leaf(format!("v{i}"), DataType::Decimal))
            .collect(),
    ))
}

/// `target = concat(sources..)`
fn calc(sources: &[&str], target: &str) -> Triggerable {
    Triggerable::recalculate(
        Expr::call("concat", sources.iter().map(|s| Expr::path(s)).collect()),
        &TreeReference::path(target),
    )
}

fn position(order: &[TriggerableId], id: TriggerableId) -> usize {
    order.iter().position(|&o| o == id).unwrap()
}

#[test]
fn diamond_is_ordered_source_first() {
    let inst = leaves(4);
    let mut g = DependencyGraph::new();
    let d = g.add(calc(&["/d/v1", "/d/v2"], "/d/v3"), &inst);
    let c = g.add(calc(&["/d/v0"], "/d/v2"), &inst);
    let b = g.add(calc(&["/d/v0"], "/d/v1"), &inst);
    g.finalize().unwrap();

    assert_eq!(g.order(), &[c, b, d]);
    assert_eq!(g.stats().edges, 2);
    assert_eq!(g.stats().rounds, 2);
}

#[test]
fn shared_dependent_runs_once_after_all_inputs() {
    let inst = leaves(4);
    let mut g = DependencyGraph::new();
    let sink = g.add(calc(&["/d/v1", "/d/v2"], "/d/v3"), &inst);
    let mid = g.add(calc(&["/d/v0"], "/d/v1"), &inst);
    let other = g.add(calc(&["/d/v0"], "/d/v2"), &inst);
    g.finalize().unwrap();

    let direct = g.triggered_by(&TreeReference::path("/d/v0").genericize()).to_vec();
    assert_eq!(direct, vec![mid, other]);
    let closure = g.cascade_closure(direct);
    assert_eq!(g.in_order(&closure), vec![mid, other, sink]);
}

#[test]
fn two_cycle_is_reported_at_finalize() {
    let inst = leaves(2);
    let mut g = DependencyGraph::new();
    g.add(calc(&["/d/v0"], "/d/v1"), &inst);
    g.add(calc(&["/d/v1"], "/d/v0"), &inst);

    let err = g.finalize().unwrap_err();
    let targets: Vec<String> = err.targets.iter().map(ToString::to_string).collect();
    assert_eq!(targets, vec!["/d[*]/v1[*]", "/d[*]/v0[*]"]);
    assert_eq!(
        err.to_string(),
        "dependency cycle among: /d[*]/v1[*] -> /d[*]/v0[*]"
    );
    assert!(!g.is_finalized());
}

#[test]
fn equal_triggerables_share_one_registration() {
    let inst = leaves(2);
    let mut g = DependencyGraph::new();
    let first = g.add(calc(&["/d/v0"], "/d/v1"), &inst);
    let second = g.add(calc(&["/d/v0"], "/d/v1"), &inst);
    assert_eq!(first, second);
    assert_eq!(g.len(), 1);

    // Same logic, different target: a distinct triggerable.
    let third = g.add(calc(&["/d/v0"], "/d/v0"), &inst);
    assert_ne!(first, third);
    assert_eq!(g.len(), 2);
}

/// For node `i`, a bit per earlier node saying whether `i` reads it.
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<bool>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(any::<bool>(), i))
            .collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn order_respects_every_edge(reads in dag_strategy(), reverse in any::<bool>()) {
        let n = reads.len();
        let inst = leaves(n);
        let mut specs: Vec<(Vec<String>, String)> = reads
            .iter()
            .enumerate()
            .map(|(i, deps)| {
                let sources = deps
                    .iter()
                    .enumerate()
                    .filter(|&(_, &read)| read)
                    .map(|(j, _)| format!("/d/v{j}"))
                    .collect();
                (sources, format!("/d/v{i}"))
            })
            .collect();
        if reverse {
            specs.reverse();
        }

        let mut g = DependencyGraph::new();
        for (sources, target) in &specs {
            let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
            g.add(calc(&sources, target), &inst);
        }
        g.finalize().unwrap();

        let order = g.order().to_vec();
        prop_assert_eq!(order.len(), n);
        for (from, to) in g.edges() {
            prop_assert!(position(&order, from) < position(&order, to));
        }
    }
}
