//! Shared and storage memory atomics
//!
//! Native `atomic_*_explicit` calls cover the integer operations Metal has.
//! Everything else runs a compare-and-swap loop around one of the `Cas*`
//! helpers declared by the emit context.

use super::EmitResult;
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::{InstId, Type};
use oc_core::ShaderError;

/// Native atomic function and whether it works on the signed view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AtomicOp {
    Add,
    SMin,
    UMin,
    SMax,
    UMax,
    And,
    Or,
    Xor,
    Exchange,
}

impl AtomicOp {
    fn function(self) -> &'static str {
        match self {
            AtomicOp::Add => "atomic_fetch_add_explicit",
            AtomicOp::SMin | AtomicOp::UMin => "atomic_fetch_min_explicit",
            AtomicOp::SMax | AtomicOp::UMax => "atomic_fetch_max_explicit",
            AtomicOp::And => "atomic_fetch_and_explicit",
            AtomicOp::Or => "atomic_fetch_or_explicit",
            AtomicOp::Xor => "atomic_fetch_xor_explicit",
            AtomicOp::Exchange => "atomic_exchange_explicit",
        }
    }

    fn is_signed(self) -> bool {
        matches!(self, AtomicOp::SMin | AtomicOp::SMax)
    }
}

/// Where the atomic word lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Space {
    Shared,
    Storage,
}

impl Space {
    /// Index of the first operand after the address
    fn value_index(self) -> usize {
        match self {
            Space::Shared => 1,
            Space::Storage => 2,
        }
    }
}

/// Address of the targeted word as an `atomic_uint*` or `atomic_int*`
fn pointer(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    space: Space,
    signed: bool,
) -> Result<String, ShaderError> {
    let atomic = if signed { "atomic_int" } else { "atomic_uint" };
    match space {
        Space::Shared => {
            let offset = ctx.consume_arg(inst, 0);
            Ok(format!("(threadgroup {atomic}*)&smem[({offset})>>2]"))
        }
        Space::Storage => {
            let binding = ctx.arg(inst, 0).as_u32().ok_or_else(|| {
                ShaderError::not_implemented("dynamic storage buffer binding")
            })?;
            let offset = ctx.consume_arg(inst, 1);
            Ok(format!(
                "(device {atomic}*)&{}_ssbo{binding}[({offset})>>2]",
                ctx.stage_name
            ))
        }
    }
}

pub(super) fn native(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    space: Space,
    op: AtomicOp,
) -> EmitResult {
    let signed = op.is_signed();
    let ptr = pointer(ctx, inst, space, signed)?;
    let value = ctx.consume_arg(inst, space.value_index());
    let ret = ctx.define(inst, VarType::U32);
    let function = op.function();
    if signed {
        ctx.add(format!(
            "{ret}=uint({function}({ptr},int({value}),memory_order_relaxed));"
        ));
    } else {
        ctx.add(format!("{ret}={function}({ptr},{value},memory_order_relaxed);"));
    }
    Ok(())
}

/// Retry `helper(old, value)` until the swap lands; the result is the old word
pub(super) fn cas_loop(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    space: Space,
    helper: &str,
) -> EmitResult {
    let ptr = pointer(ctx, inst, space, false)?;
    let value = ctx.consume_arg(inst, space.value_index());
    let ty = if ctx.insts[inst].result_type() == Type::F32 {
        VarType::F32
    } else {
        VarType::U32
    };
    let ret = ctx.define(inst, ty);
    let old = if ty == VarType::F32 {
        "as_type<float>(__old)"
    } else {
        "__old"
    };
    ctx.add(format!(
        "{{uint __old=atomic_load_explicit({ptr},memory_order_relaxed);\
         while(!atomic_compare_exchange_weak_explicit({ptr},&__old,{helper}(__old,{value}),\
         memory_order_relaxed,memory_order_relaxed)){{}}{ret}={old};}}"
    ));
    Ok(())
}

pub(super) fn global_unsupported(ctx: &EmitContext<'_>, inst: InstId) -> EmitResult {
    Err(ShaderError::not_implemented(format!(
        "{} without a bound storage buffer",
        ctx.insts[inst].opcode()
    )))
}
