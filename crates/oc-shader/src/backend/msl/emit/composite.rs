use super::EmitResult;
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::{InstId, Value};

const SWIZZLE: [char; 4] = ['x', 'y', 'z', 'w'];

/// `type(a,b,...)` from every argument
pub(super) fn construct(ctx: &mut EmitContext<'_>, inst: InstId, ty: VarType) -> EmitResult {
    let num_args = ctx.insts[inst].num_args();
    let parts: Vec<String> = (0..num_args).map(|i| ctx.consume_arg(inst, i)).collect();
    let rhs = format!("{}({})", ty.msl_type(), parts.join(","));
    ctx.add_define(inst, ty, &rhs);
    Ok(())
}

fn element(index: &Value, text: &str) -> String {
    match index {
        Value::U32(i) if *i < 4 => format!(".{}", SWIZZLE[*i as usize]),
        _ => format!("[{text}]"),
    }
}

/// Component of a vector; constant indices become swizzles
pub(super) fn extract(ctx: &mut EmitContext<'_>, inst: InstId, ty: VarType) -> EmitResult {
    let vector = ctx.consume_arg(inst, 0);
    let index = ctx.arg(inst, 1);
    let index_text = ctx.consume(&index);
    let rhs = format!("{vector}{}", element(&index, &index_text));
    ctx.add_define(inst, ty, &rhs);
    Ok(())
}

pub(super) fn insert_f32x4(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let vector = ctx.consume_arg(inst, 0);
    let object = ctx.consume_arg(inst, 1);
    let index = ctx.arg(inst, 2);
    let index_text = ctx.consume(&index);
    let ret = ctx.define(inst, VarType::F32x4);
    ctx.add(format!(
        "{ret}={vector};{ret}{}={object};",
        element(&index, &index_text)
    ));
    Ok(())
}
