use snafu::Snafu;

use crate::body::BodyValue;
use crate::graph::NodeId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Operand references a slot that was never allocated or has been erased.
    #[snafu(display("operand {operand} is dead or out of range"))]
    DeadOperand { operand: NodeId },

    /// Iterator-kind list and index-map dimensionality disagree.
    #[snafu(display(
        "compute node has {iterators} iterator kinds but index map {map_index} is over {map_dims} dimensions"
    ))]
    IteratorMapMismatch { iterators: usize, map_index: usize, map_dims: usize },

    /// A compute node must carry exactly one index map per operand.
    #[snafu(display("compute node has {operands} operands but {maps} index maps"))]
    MapCountMismatch { operands: usize, maps: usize },

    /// Body argument arity must equal the operand count.
    #[snafu(display("computation body expects {body_args} arguments but the node has {operands} operands"))]
    BodyArityMismatch { body_args: usize, operands: usize },

    /// A body operand must be a loop argument, an earlier op result, or a constant.
    #[snafu(display("body value {value:?} is not defined at this point"))]
    UndefinedBodyValue { value: BodyValue },

    /// Transfer source rank and permutation-map dimensionality disagree.
    #[snafu(display("transfer permutation map is over {map_dims} dimensions but the source has rank {rank}"))]
    TransferMapRankMismatch { map_dims: usize, rank: usize },

    /// Erasing a node whose value still has consumers would dangle them.
    #[snafu(display("cannot erase {node}: it still has {users} users"))]
    EraseWithUsers { node: NodeId, users: usize },

    /// A handle that used to be valid points at a tombstoned slot.
    #[snafu(display("{node} has been erased"))]
    ErasedNode { node: NodeId },
}
