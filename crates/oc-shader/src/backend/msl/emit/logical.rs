use super::{binary, ternary, unary, EmitResult};
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::InstId;

pub(super) fn or(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::U1, |a, b| format!("{a}||{b}"))
}

pub(super) fn and(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::U1, |a, b| format!("{a}&&{b}"))
}

pub(super) fn xor(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::U1, |a, b| format!("{a}!={b}"))
}

pub(super) fn not(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U1, |x| format!("!{x}"))
}

pub(super) fn select(ctx: &mut EmitContext<'_>, inst: InstId, ty: VarType) -> EmitResult {
    ternary(ctx, inst, ty, |cond, t, f| format!("{cond}?{t}:{f}"))
}
