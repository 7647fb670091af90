//! Rule table and fixpoint driver.
//!
//! The driver sweeps the whole graph in program order, applying the first
//! matching rule per node, and repeats until a full sweep fires nothing.
//! Rules match disjoint node shapes and only ever emit destination-dialect
//! nodes that no rule matches, so the fixpoint is the same regardless of
//! application order; the fixed table order exists for reproducible
//! diagnostics, not for correctness.

use tessel_ir::graph::{Graph, NodeId};

use crate::error::{NonConvergenceSnafu, Result};

/// Outcome of trying one rule on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The rule replaced the node. The old handle is now stale.
    Applied,
    /// A precondition failed; the node is untouched. The reason is surfaced
    /// in trace-level diagnostics and never treated as an error.
    NoMatch { reason: &'static str },
}

/// A named rewrite rule. Rules are plain functions; any state they need
/// lives in the graph they receive.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&mut Graph, NodeId) -> Result<RuleOutcome>,
}

/// Ordered rule table, constructed once and passed by value into the driver.
/// There is no global registry; callers compose their own set if the default
/// one does not fit.
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The full lowering table in its fixed precedence order.
    pub fn default_rules() -> Self {
        Self::new(vec![
            Rule { name: "fill-to-zero", apply: crate::rules::fill_to_zero },
            Rule { name: "transpose-to-unary", apply: crate::rules::transpose_to_unary },
            Rule { name: "relu", apply: crate::rules::relu_rule },
            Rule { name: "matmul", apply: crate::rules::matmul_rule },
            Rule { name: "add", apply: crate::rules::add_rule },
            Rule { name: "identity", apply: crate::rules::identity_rule },
            Rule { name: "transfer-read-to-descriptor", apply: crate::transfer::transfer_read_rule },
        ])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Sweep bound. Every applied rule strictly shrinks the set of matchable
/// nodes, so a healthy table converges in a couple of sweeps; hitting the
/// bound means a rule keeps firing without making progress.
const MAX_SWEEPS: usize = 100;

/// Apply the rule table to the whole graph until no rule fires.
///
/// Returns the number of applied rewrites. Non-convergence within the sweep
/// bound is reported as a pass-level error, never silently truncated.
pub fn lower_graph(graph: &mut Graph, rules: &RuleSet) -> Result<usize> {
    let mut total = 0;
    for sweep in 0..MAX_SWEEPS {
        let mut changed = false;
        for id in graph.node_ids() {
            // The snapshot may hold handles a previous rewrite erased.
            if !graph.is_live(id) {
                continue;
            }
            for rule in rules.rules() {
                match (rule.apply)(graph, id)? {
                    RuleOutcome::Applied => {
                        tracing::debug!(rule = rule.name, node = %id, sweep, "rule applied");
                        changed = true;
                        total += 1;
                        break;
                    }
                    RuleOutcome::NoMatch { reason } => {
                        tracing::trace!(rule = rule.name, node = %id, reason, "no match");
                    }
                }
            }
        }
        if !changed {
            tracing::debug!(sweeps = sweep + 1, applied = total, "reached fixpoint");
            return Ok(total);
        }
    }
    NonConvergenceSnafu { sweeps: MAX_SWEEPS }.fail()
}
