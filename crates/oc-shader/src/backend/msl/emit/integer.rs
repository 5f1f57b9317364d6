use super::{binary, ternary, unary, EmitResult};
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::InstId;

/// Infix operator over two values of the same type
pub(super) fn infix(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    ty: VarType,
    op: &'static str,
) -> EmitResult {
    binary(ctx, inst, ty, |a, b| format!("{a}{op}{b}"))
}

/// 32-bit add that leaves its carry out in `carry`
pub(super) fn add_carry32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let [a, b] = ctx.consume_args::<2>(inst);
    // Before the define: the result may take over the slot of an operand
    ctx.add(format!("carry=uint({b}>~{a});"));
    ctx.add_define(inst, VarType::U32, &format!("{a}+{b}"));
    Ok(())
}

pub(super) fn neg32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U32, |x| format!("uint(-int({x}))"))
}

pub(super) fn neg64(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U64, |x| format!("ulong(-long({x}))"))
}

pub(super) fn abs32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U32, |x| format!("uint(abs(int({x})))"))
}

pub(super) fn shift_right_arithmetic32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::U32, |a, b| format!("uint(int({a})>>{b})"))
}

pub(super) fn shift_right_arithmetic64(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    binary(ctx, inst, VarType::U64, |a, b| format!("ulong(long({a})>>{b})"))
}

pub(super) fn bitwise_not32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U32, |x| format!("~{x}"))
}

pub(super) fn bit_field_insert(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let [base, insert, offset, count] = ctx.consume_args::<4>(inst);
    ctx.add_define(
        inst,
        VarType::U32,
        &format!("insert_bits({base},{insert},{offset},{count})"),
    );
    Ok(())
}

pub(super) fn bit_field_s_extract(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    ternary(ctx, inst, VarType::U32, |base, offset, count| {
        format!("uint(extract_bits(int({base}),{offset},{count}))")
    })
}

pub(super) fn bit_field_u_extract(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    ternary(ctx, inst, VarType::U32, |base, offset, count| {
        format!("extract_bits({base},{offset},{count})")
    })
}

pub(super) fn intrinsic32(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    function: &'static str,
) -> EmitResult {
    unary(ctx, inst, VarType::U32, |x| format!("{function}({x})"))
}

/// Index of the highest bit that differs from the sign bit, `~0u` if none
pub(super) fn find_s_msb32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U32, |x| {
        format!("uint(31-int(clz(int({x})<0?~{x}:{x})))")
    })
}

pub(super) fn find_u_msb32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    unary(ctx, inst, VarType::U32, |x| format!("uint(31-int(clz({x})))"))
}

/// Two-operand intrinsic, optionally on the signed reinterpretation
pub(super) fn min_max32(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    function: &'static str,
    signed: bool,
) -> EmitResult {
    binary(ctx, inst, VarType::U32, |a, b| {
        if signed {
            format!("uint({function}(int({a}),int({b})))")
        } else {
            format!("{function}({a},{b})")
        }
    })
}

pub(super) fn clamp32(ctx: &mut EmitContext<'_>, inst: InstId, signed: bool) -> EmitResult {
    ternary(ctx, inst, VarType::U32, |x, lo, hi| {
        if signed {
            format!("uint(clamp(int({x}),int({lo}),int({hi})))")
        } else {
            format!("clamp({x},{lo},{hi})")
        }
    })
}

pub(super) fn compare(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    op: &'static str,
    signed: bool,
) -> EmitResult {
    binary(ctx, inst, VarType::U1, |a, b| {
        if signed {
            format!("int({a}){op}int({b})")
        } else {
            format!("{a}{op}{b}")
        }
    })
}
