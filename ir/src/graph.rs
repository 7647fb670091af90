//! Arena-based operation graph.
//!
//! Nodes live in slots addressed by [`NodeId`]; erasing or replacing a node
//! tombstones its slot, so a stale handle held by an in-flight worklist is
//! detectably invalid (lookups return `None`) rather than dangling. An
//! explicit program-order list defines both iteration order and the
//! consumer-list ordering that provenance tracing relies on.

use std::collections::HashMap;

use smallvec::SmallVec;
use tessel_dtype::DType;

use crate::buffer::{BufferType, ValueType};
use crate::error::{self, Error, Result};
use crate::node::{Node, NodeKind};
use crate::types::ConstValue;

/// Stable handle to a node. Handles survive graph mutation; a handle to an
/// erased node simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Mutable operation graph with stable node identity.
#[derive(Debug, Default)]
pub struct Graph {
    slots: Vec<Option<Node>>,
    /// Consumers of each slot's value, in append order. Program ordering is
    /// recovered through [`Graph::users_in_order`].
    users: Vec<Vec<NodeId>>,
    /// Live nodes in program order.
    order: Vec<NodeId>,
    next_arg: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.slots.get(id.0 as usize).is_some_and(Option::is_some)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    pub fn value_type(&self, id: NodeId) -> Option<&ValueType> {
        self.node(id).and_then(|n| n.ty.as_ref())
    }

    pub fn buffer_type(&self, id: NodeId) -> Option<&BufferType> {
        self.value_type(id).and_then(ValueType::as_buffer)
    }

    /// Live nodes in program order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.node(*id))
    }

    /// Snapshot of the current program order. Safe to hold across mutation;
    /// erased entries stop resolving.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.order.clone()
    }

    /// Position of a live node in program order.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|n| *n == id)
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Append a node at the end of the program.
    pub fn add(&mut self, kind: NodeKind, ty: Option<ValueType>) -> Result<NodeId> {
        let pos = self.order.len();
        self.create_at(pos, kind, ty)
    }

    /// Insert a node immediately before `anchor` in program order.
    pub fn insert_before(&mut self, anchor: NodeId, kind: NodeKind, ty: Option<ValueType>) -> Result<NodeId> {
        let pos = self.position(anchor).ok_or(Error::ErasedNode { node: anchor })?;
        self.create_at(pos, kind, ty)
    }

    fn create_at(&mut self, pos: usize, kind: NodeKind, ty: Option<ValueType>) -> Result<NodeId> {
        self.validate(&kind)?;
        let id = NodeId(self.slots.len() as u32);
        for operand in kind.operands() {
            self.users[operand.0 as usize].push(id);
        }
        self.slots.push(Some(Node { id, kind, ty }));
        self.users.push(Vec::new());
        self.order.insert(pos, id);
        Ok(id)
    }

    fn validate(&self, kind: &NodeKind) -> Result<()> {
        for operand in kind.operands() {
            snafu::ensure!(self.is_live(operand), error::DeadOperandSnafu { operand });
        }
        match kind {
            NodeKind::Compute(node) => {
                let operands = node.operand_count();
                snafu::ensure!(
                    node.maps.len() == operands,
                    error::MapCountMismatchSnafu { operands, maps: node.maps.len() }
                );
                snafu::ensure!(
                    node.body.num_args() == operands,
                    error::BodyArityMismatchSnafu { body_args: node.body.num_args(), operands }
                );
                for (i, map) in node.maps.iter().enumerate() {
                    snafu::ensure!(
                        map.num_dims() == node.iterators.len(),
                        error::IteratorMapMismatchSnafu {
                            iterators: node.iterators.len(),
                            map_index: i,
                            map_dims: map.num_dims(),
                        }
                    );
                }
            }
            NodeKind::TransferRead { source, map, .. } => {
                if let Some(buf) = self.buffer_type(*source) {
                    snafu::ensure!(
                        map.num_dims() == buf.rank(),
                        error::TransferMapRankMismatchSnafu { map_dims: map.num_dims(), rank: buf.rank() }
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    // Convenience constructors for the handful of nodes rules and tests
    // create most often.

    pub fn argument(&mut self, ty: ValueType) -> Result<NodeId> {
        let index = self.next_arg;
        self.next_arg += 1;
        self.add(NodeKind::Argument { index }, Some(ty))
    }

    pub fn alloc(&mut self, buf: BufferType) -> Result<NodeId> {
        self.add(NodeKind::Alloc, Some(ValueType::Buffer(buf)))
    }

    pub fn constant(&mut self, value: ConstValue, dtype: DType) -> Result<NodeId> {
        self.add(NodeKind::Constant { value }, Some(ValueType::Scalar(dtype)))
    }

    pub fn index_const(&mut self, value: i64) -> Result<NodeId> {
        self.add(NodeKind::IndexConst { value }, Some(ValueType::Index))
    }

    // =========================================================================
    // Consumer lists
    // =========================================================================

    /// Consumers of `id`'s value, sorted into program order. This ordering is
    /// part of the graph contract: provenance tracing performs its
    /// closest-preceding-user search over exactly this sequence.
    pub fn users_in_order(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        let Some(raw) = self.users.get(id.0 as usize) else {
            return SmallVec::new();
        };
        let positions: HashMap<NodeId, usize> = self.order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let mut users: SmallVec<[NodeId; 4]> = raw.iter().copied().filter(|u| positions.contains_key(u)).collect();
        users.sort_by_key(|u| positions[u]);
        users
    }

    /// Among the consumers of `value`, the one immediately before `current`
    /// in program order. Returns `None` when `current` is not a consumer of
    /// `value` or has no earlier sibling. The search is bounded by the
    /// consumer-list length.
    pub fn closest_preceding_user(&self, value: NodeId, current: NodeId) -> Option<NodeId> {
        let users = self.users_in_order(value);
        let at = users.iter().position(|u| *u == current)?;
        at.checked_sub(1).map(|i| users[i])
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Rewire every use of `from`'s value to `to`.
    pub fn replace_all_uses(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        snafu::ensure!(self.is_live(from), error::ErasedNodeSnafu { node: from });
        snafu::ensure!(self.is_live(to), error::ErasedNodeSnafu { node: to });
        if from == to {
            return Ok(());
        }
        let moved = std::mem::take(&mut self.users[from.0 as usize]);
        for user in &moved {
            if let Some(node) = self.slots[user.0 as usize].as_mut() {
                for slot in node.kind.operands_mut() {
                    if *slot == from {
                        *slot = to;
                    }
                }
            }
        }
        tracing::debug!(from = %from, to = %to, users = moved.len(), "replaced all uses");
        self.users[to.0 as usize].extend(moved);
        Ok(())
    }

    /// Erase a node whose value has no remaining consumers.
    pub fn erase(&mut self, id: NodeId) -> Result<()> {
        let operands = self.node(id).ok_or(Error::ErasedNode { node: id })?.kind.operands();
        let live_users = self.users_in_order(id).len();
        snafu::ensure!(live_users == 0, error::EraseWithUsersSnafu { node: id, users: live_users });
        for operand in operands {
            self.users[operand.0 as usize].retain(|u| *u != id);
        }
        tracing::debug!(node = %id, "erased node");
        self.slots[id.0 as usize] = None;
        self.order.retain(|n| *n != id);
        Ok(())
    }

    /// Replace `target` with an already-inserted substitute: uses of
    /// `target`'s value (if any) are rewired to `with`, then `target` is
    /// erased. Rules call this last, so the swap is the only state any later
    /// observer can see.
    pub fn replace_node(&mut self, target: NodeId, with: Option<NodeId>) -> Result<()> {
        if let Some(with) = with {
            self.replace_all_uses(target, with)?;
        }
        self.erase(target)
    }
}
