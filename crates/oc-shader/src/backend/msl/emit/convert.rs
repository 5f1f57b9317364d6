//! Bit casts and packing

use super::{unary, EmitResult};
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::InstId;

/// Reinterpret the bits of the operand as `target`
pub(super) fn bit_cast(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    ty: VarType,
    target: &'static str,
) -> EmitResult {
    unary(ctx, inst, ty, |x| format!("as_type<{target}>({x})"))
}

pub(super) fn pack_half2x16(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U32, |x| format!("as_type<uint>(half2({x}))"))
}

pub(super) fn unpack_half2x16(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::F32x2, |x| {
        format!("float2(as_type<half2>({x}))")
    })
}
