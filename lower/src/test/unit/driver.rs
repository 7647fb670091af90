use tessel_ir::affine::AffineMap;
use tessel_ir::graph::{Graph, NodeId};
use tessel_ir::node::NodeKind;

use crate::driver::{Rule, RuleOutcome, RuleSet, lower_graph};
use crate::error::Error;
use crate::test::helpers::*;

/// Graph with one of each dispatchable idiom plus an unmatched node.
fn mixed_graph(graph: &mut Graph) -> NodeId {
    let dest = graph.alloc(static_buf(&[32, 64])).unwrap();
    fill_zero(graph, dest);

    let input = graph.alloc(static_buf(&[32, 64])).unwrap();
    let output = graph.alloc(static_buf(&[32, 64])).unwrap();
    compute_2d(graph, input, output, AffineMap::identity(2), relu_body());

    let a = graph.alloc(static_buf(&[32, 48])).unwrap();
    let b = graph.alloc(static_buf(&[48, 64])).unwrap();
    let c = graph.alloc(static_buf(&[32, 64])).unwrap();
    matmul_node(graph, a, b, c, mul_acc_body(false, false, 0));

    // A max body without a zero side matches nothing.
    let u = graph.alloc(static_buf(&[32, 64])).unwrap();
    let v = graph.alloc(static_buf(&[32, 64])).unwrap();
    compute_2d(graph, u, v, AffineMap::identity(2), max_args_body())
}

#[test]
fn test_lowers_whole_graph() {
    let mut g = Graph::new();
    let unmatched = mixed_graph(&mut g);

    let applied = lower_graph(&mut g, &RuleSet::default_rules()).unwrap();
    assert_eq!(applied, 3);

    // Three dispatch/invoke pairs, no surviving matchable nodes except the
    // deliberately unmatched one.
    let dispatches = g.nodes().filter(|n| matches!(n.kind, NodeKind::KernelDispatch { .. })).count();
    let invokes = g.nodes().filter(|n| matches!(n.kind, NodeKind::KernelInvoke { .. })).count();
    assert_eq!(dispatches, 3);
    assert_eq!(invokes, 3);
    assert!(g.is_live(unmatched), "unmatched nodes pass through untouched");
}

#[test]
fn test_fixpoint_idempotence() {
    let mut g = Graph::new();
    mixed_graph(&mut g);

    let first = lower_graph(&mut g, &RuleSet::default_rules()).unwrap();
    assert!(first > 0);
    let second = lower_graph(&mut g, &RuleSet::default_rules()).unwrap();
    assert_eq!(second, 0, "a second run must be a no-op");
}

#[test]
fn test_empty_rule_set_is_noop() {
    let mut g = Graph::new();
    mixed_graph(&mut g);
    let before = g.len();

    let applied = lower_graph(&mut g, &RuleSet::new(Vec::new())).unwrap();
    assert_eq!(applied, 0);
    assert_eq!(g.len(), before);
}

#[test]
fn test_non_convergence_is_reported() {
    // A rule that claims success without changing the graph never reaches a
    // fixpoint; the driver must fail loudly instead of truncating silently.
    fn spinning(_: &mut Graph, _: NodeId) -> crate::Result<RuleOutcome> {
        Ok(RuleOutcome::Applied)
    }

    let mut g = Graph::new();
    g.alloc(static_buf(&[4, 4])).unwrap();

    let rules = RuleSet::new(vec![Rule { name: "spinning", apply: spinning }]);
    let err = lower_graph(&mut g, &rules).unwrap_err();
    assert!(matches!(err, Error::NonConvergence { .. }));
}

#[test]
fn test_first_matching_rule_wins() {
    // The fill node matches fill-to-zero before anything else; reversing the
    // table order must not change the fixpoint, only the diagnostics.
    let mut g = Graph::new();
    let dest = g.alloc(static_buf(&[32, 64])).unwrap();
    fill_zero(&mut g, dest);

    let mut rules: Vec<Rule> = RuleSet::default_rules().rules().to_vec();
    rules.reverse();
    let applied = lower_graph(&mut g, &RuleSet::new(rules)).unwrap();
    assert_eq!(applied, 1);
    assert!(g.nodes().any(|n| matches!(n.kind, NodeKind::KernelDispatch { .. })));
}
