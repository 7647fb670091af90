//! Structural matching of scalar computation bodies.
//!
//! All matchers tolerate chains of single-operand wrapper operations between
//! the structural anchors: a body computing `u5(u1(c) + u2(u3(a) * u4(b)))`
//! still reads as multiply-accumulate for any chain lengths u1..u5 (zero or
//! more each, type changes allowed).

use tessel_ir::body::{Body, BodyFn, BodyOp, BodyValue};
use tessel_ir::types::BinaryFn;

/// Whether the chain from `v` back to `target` consists of zero or more
/// single-operand operations. The walk is bounded by the body length, so a
/// malformed body cannot loop it.
fn chains_to(body: &Body, mut v: BodyValue, target: BodyValue) -> bool {
    let mut steps = 0;
    loop {
        if v == target {
            return true;
        }
        let BodyValue::Op(id) = v else {
            return false;
        };
        let Some(op) = body.op(id) else {
            return false;
        };
        if op.operands.len() != 1 {
            return false;
        }
        v = op.operands[0];
        steps += 1;
        if steps > body.len() {
            return false;
        }
    }
}

/// Detect whether the body encodes multiply-accumulate over its three loop
/// arguments: the yielded value chains to a unique add, one add operand
/// chains to the accumulator argument and the other to a unique multiply,
/// and the multiply's operands chain to the two input arguments — each pair
/// in either order, since the host graph may present commutative operands
/// either way.
///
/// Non-unique add or multiply operations fail the match outright.
pub fn is_mul_acc_body(body: &Body) -> bool {
    if body.num_args() != 3 {
        return false;
    }

    let Some(add_id) = body.single_binary(BinaryFn::Add) else {
        return false;
    };
    let Some(mul_id) = body.single_binary(BinaryFn::Mul) else {
        return false;
    };
    let (Some(add), Some(mul)) = (body.op(add_id), body.op(mul_id)) else {
        return false;
    };

    let (c1, c2) = (add.operands[0], add.operands[1]);
    let (a, b) = (mul.operands[0], mul.operands[1]);
    let (arg_a, arg_b, arg_acc) = (BodyValue::Arg(0), BodyValue::Arg(1), BodyValue::Arg(2));
    let mul_res = BodyValue::Op(mul_id);

    let yields_add = chains_to(body, body.yielded(), BodyValue::Op(add_id));
    let add_ok = (chains_to(body, c1, arg_acc) && chains_to(body, c2, mul_res))
        || (chains_to(body, c1, mul_res) && chains_to(body, c2, arg_acc));
    let mul_ok = (chains_to(body, a, arg_a) && chains_to(body, b, arg_b))
        || (chains_to(body, a, arg_b) && chains_to(body, b, arg_a));

    yields_add && add_ok && mul_ok
}

/// Match a body holding exactly one elementwise operation of the requested
/// binary kind plus the yield, with an int-or-float result type. Extra
/// operations are always a non-match — no partial credit.
pub fn single_elementwise(body: &Body, f: BinaryFn) -> Option<&BodyOp> {
    if body.len() != 1 {
        return None;
    }
    let (id, op) = body.ops().next()?;
    if op.op != BodyFn::Binary(f) || !op.ty.is_int_or_float() {
        return None;
    }
    if body.yielded() != BodyValue::Op(id) {
        return None;
    }
    Some(op)
}

/// Pure-copy body: no operations at all, the yield forwards a loop argument.
pub fn has_copy_body(body: &Body) -> bool {
    body.is_empty() && matches!(body.yielded(), BodyValue::Arg(_))
}
