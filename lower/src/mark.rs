//! Library-call marks.
//!
//! Upstream passes may pre-annotate a compute node with a library-call name
//! under the `ukr.` prefix (e.g. `ukr.gemm`). The helpers here recognize
//! those marks; no lowering rule depends on them.

use tessel_ir::node::ComputeNode;

/// Prefix reserved for microkernel library-call annotations.
pub const KERNEL_MARK_PREFIX: &str = "ukr";

/// Whether the node carries any `ukr.`-prefixed library-call mark.
pub fn has_kernel_mark(node: &ComputeNode) -> bool {
    let Some(call) = node.library_call.as_deref() else {
        return false;
    };
    if call.is_empty() {
        return false;
    }
    call.split('.').next() == Some(KERNEL_MARK_PREFIX)
}

/// Whether the node is marked with exactly the given library call.
pub fn is_marked_with(node: &ComputeNode, target: &str) -> bool {
    has_kernel_mark(node) && node.library_call.as_deref() == Some(target)
}
