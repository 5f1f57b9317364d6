use super::EmitResult;
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::{format_immediate, VarId, VarType};
use crate::ir::{InstId, Value};
use crate::types::{CompareFunction, Stage};
use oc_core::ShaderError;

fn phi_type(ctx: &EmitContext<'_>, phi: InstId) -> Result<VarType, ShaderError> {
    let ty = ctx.insts[phi].result_type();
    VarType::from_ir(ty).ok_or_else(|| ShaderError::not_implemented(format!("phi of type {ty}")))
}

/// Make sure a phi owns a variable before any move into it is emitted
fn define_phi(ctx: &mut EmitContext<'_>, phi: InstId) -> EmitResult {
    if !VarId::from(ctx.insts[phi].definition()).valid {
        let ty = phi_type(ctx, phi)?;
        ctx.var_alloc.add_define(ctx.insts, phi, ty);
    }
    Ok(())
}

/// Phis produce no code; the incoming moves were placed by precoloring
pub(super) fn phi(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let num_args = ctx.insts[inst].num_args();
    for index in 0..num_args {
        ctx.consume_arg(inst, index);
    }
    define_phi(ctx, inst)
}

pub(super) fn phi_move(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let Value::Inst(phi) = ctx.arg(inst, 0) else {
        return Err(ShaderError::Logic("phi move target is not an instruction".into()));
    };
    define_phi(ctx, phi)?;
    let phi_reg = ctx.consume_arg(inst, 0);
    let val_reg = ctx.consume_arg(inst, 1);
    if phi_reg != val_reg {
        ctx.add(format!("{phi_reg}={val_reg};"));
    }
    Ok(())
}

pub(super) fn reference(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    ctx.consume_arg(inst, 0);
    Ok(())
}

pub(super) fn prologue(ctx: &mut EmitContext<'_>) -> EmitResult {
    if ctx.stage.is_vertex_like() {
        if let Some(size) = ctx.runtime_info.fixed_state_point_size {
            ctx.add(format!(
                "__out.point_size={};",
                format_immediate(&Value::F32(size))
            ));
        }
    }
    Ok(())
}

fn alpha_test(ctx: &mut EmitContext<'_>, func: CompareFunction) {
    match func.operator() {
        Some(op) => {
            if !ctx.info.stores_frag_color[0] {
                return;
            }
            let reference = format_immediate(&Value::F32(ctx.runtime_info.alpha_test_reference));
            ctx.add(format!(
                "if(!(__out.color0.a{op}{reference})){{discard_fragment();}}"
            ));
        }
        None if func == CompareFunction::Never => ctx.add("discard_fragment();"),
        None => {}
    }
}

pub(super) fn epilogue(ctx: &mut EmitContext<'_>) -> EmitResult {
    if ctx.stage == Stage::Fragment {
        if let Some(func) = ctx.runtime_info.alpha_test_func {
            alpha_test(ctx, func);
        }
    }
    Ok(())
}

pub(super) fn demote_to_helper_invocation(ctx: &mut EmitContext<'_>) -> EmitResult {
    ctx.add("discard_fragment();");
    Ok(())
}

pub(super) fn barrier(ctx: &mut EmitContext<'_>, flags: &str) -> EmitResult {
    ctx.add(format!("threadgroup_barrier(mem_flags::{flags});"));
    Ok(())
}

pub(super) fn undef(ctx: &mut EmitContext<'_>, inst: InstId, ty: VarType) -> EmitResult {
    let value = match ty {
        VarType::U1 => "false",
        VarType::U32 => "0u",
        VarType::U64 => "0ul",
        _ => return Err(ShaderError::not_implemented(format!("undefined {}", ty.msl_type()))),
    };
    ctx.add_define(inst, ty, value);
    Ok(())
}
