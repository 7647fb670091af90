use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Rules kept firing without reaching a fixpoint. Reported to the caller
    /// as a pass failure; the graph is left in its last consistent state.
    #[snafu(display("rewriting did not converge after {sweeps} sweeps"))]
    NonConvergence { sweeps: usize },

    /// A rule's emission hit a structural graph error. This indicates a bug
    /// in the rule, not in the input graph.
    #[snafu(display("graph mutation failed: {source}"))]
    Graph { source: tessel_ir::Error },
}
