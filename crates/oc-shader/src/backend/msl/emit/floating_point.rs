use super::{binary, ternary, unary, EmitResult};
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::InstId;

pub(super) fn abs32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::F32, |x| format!("abs({x})"))
}

pub(super) fn abs64(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::F64, |x| format!("abs({x})"))
}

pub(super) fn add32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::F32, |a, b| format!("{a}+{b}"))
}

pub(super) fn add64(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::F64, |a, b| format!("{a}+{b}"))
}

pub(super) fn fma32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    ternary(ctx, inst, VarType::F32, |a, b, c| format!("fma({a},{b},{c})"))
}

pub(super) fn fma64(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    ternary(ctx, inst, VarType::F64, |a, b, c| format!("fma({a},{b},{c})"))
}

pub(super) fn max32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::F32, |a, b| format!("max({a},{b})"))
}

pub(super) fn min32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::F32, |a, b| format!("min({a},{b})"))
}

pub(super) fn mul32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::F32, |a, b| format!("{a}*{b}"))
}

pub(super) fn mul64(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::F64, |a, b| format!("{a}*{b}"))
}

pub(super) fn neg32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::F32, |x| format!("-({x})"))
}

pub(super) fn neg64(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::F64, |x| format!("-({x})"))
}

pub(super) fn recip32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::F32, |x| format!("1.0f/({x})"))
}

/// Single-argument intrinsic over `float`
pub(super) fn intrinsic32(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    function: &'static str,
) -> EmitResult {
    unary(ctx, inst, VarType::F32, |x| format!("{function}({x})"))
}

pub(super) fn clamp32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    ternary(ctx, inst, VarType::F32, |x, lo, hi| format!("clamp({x},{lo},{hi})"))
}

/// Ordered or unordered comparison
pub(super) fn compare32(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    op: &'static str,
    ordered: bool,
) -> EmitResult {
    binary(ctx, inst, VarType::U1, |a, b| match (op, ordered) {
        ("==", false) => format!("{a}=={b}||isnan({a})||isnan({b})"),
        ("!=", true) => format!("{a}!={b}&&!isnan({a})&&!isnan({b})"),
        _ => format!("{a}{op}{b}"),
    })
}

pub(super) fn is_nan32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U1, |x| format!("isnan({x})"))
}

/// Quad swizzle add: each lane picks its operand signs from the swizzle word
pub(super) fn swizzle_add(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    ternary(ctx, inst, VarType::F32, |a, b, swizzle| {
        let mask = format!("(({swizzle}>>((__lane&3u)<<1u))&3u)");
        format!("({a}*FSWZ_A[{mask}])+({b}*FSWZ_B[{mask}])")
    })
}
