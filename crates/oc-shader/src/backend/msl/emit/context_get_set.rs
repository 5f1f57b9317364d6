//! Constant buffers, stage inputs and outputs, builtins and local memory

use super::EmitResult;
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::{format_immediate, VarType};
use crate::ir::{Attribute, InstId, Value};
use crate::types::Stage;
use oc_core::ShaderError;

fn cbuf_binding(ctx: &EmitContext<'_>, inst: InstId) -> Result<String, ShaderError> {
    match ctx.arg(inst, 0) {
        Value::U32(index) => Ok(ctx.cbuf_name(index)),
        _ => Err(ShaderError::not_implemented("indirect constant buffer binding")),
    }
}

/// `float` element holding the word at `offset`
fn cbuf_word(cbuf: &str, offset: &Value, offset_text: &str, extra: u32) -> String {
    match offset {
        Value::U32(offset) => {
            let offset = offset + extra;
            let component = ['x', 'y', 'z', 'w'][((offset / 4) % 4) as usize];
            format!("{cbuf}[{}].{component}", offset / 16)
        }
        _ => {
            let offset = if extra == 0 {
                offset_text.to_string()
            } else {
                format!("{offset_text}+{extra}u")
            };
            format!("{cbuf}[({offset})>>4u][(({offset})>>2u)&3u]")
        }
    }
}

/// Sub-word constant buffer read
pub(super) fn get_cbuf_narrow(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    bits: u32,
    signed: bool,
) -> EmitResult {
    let cbuf = cbuf_binding(ctx, inst)?;
    let offset = ctx.arg(inst, 1);
    let offset_text = ctx.consume(&offset);
    let word = cbuf_word(&cbuf, &offset, &offset_text, 0);
    let shift = match offset {
        Value::U32(offset) => format!("{}u", (offset % 4) / (bits / 8) * bits),
        _ => format!("((({offset_text})&3u)/{}u)*{bits}u", bits / 8),
    };
    let rhs = if signed {
        format!("uint(extract_bits(as_type<int>({word}),{shift},{bits}u))")
    } else {
        format!("extract_bits(as_type<uint>({word}),{shift},{bits}u)")
    };
    ctx.add_define(inst, VarType::U32, &rhs);
    Ok(())
}

pub(super) fn get_cbuf_u32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let cbuf = cbuf_binding(ctx, inst)?;
    let offset = ctx.arg(inst, 1);
    let offset_text = ctx.consume(&offset);
    let word = cbuf_word(&cbuf, &offset, &offset_text, 0);
    ctx.add_define(inst, VarType::U32, &format!("as_type<uint>({word})"));
    Ok(())
}

pub(super) fn get_cbuf_f32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let cbuf = cbuf_binding(ctx, inst)?;
    let offset = ctx.arg(inst, 1);
    let offset_text = ctx.consume(&offset);
    let word = cbuf_word(&cbuf, &offset, &offset_text, 0);
    ctx.add_define(inst, VarType::F32, &word);
    Ok(())
}

pub(super) fn get_cbuf_u32x2(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let cbuf = cbuf_binding(ctx, inst)?;
    let offset = ctx.arg(inst, 1);
    let offset_text = ctx.consume(&offset);
    let low = cbuf_word(&cbuf, &offset, &offset_text, 0);
    let high = cbuf_word(&cbuf, &offset, &offset_text, 4);
    ctx.add_define(
        inst,
        VarType::U32x2,
        &format!("uint2(as_type<uint>({low}),as_type<uint>({high}))"),
    );
    Ok(())
}

fn attribute_arg(ctx: &EmitContext<'_>, inst: InstId) -> Result<Attribute, ShaderError> {
    ctx.arg(inst, 0)
        .as_attribute()
        .ok_or_else(|| ShaderError::Logic(format!("{} without attribute", ctx.insts[inst].opcode())))
}

fn unsupported_attribute(ctx: &EmitContext<'_>, verb: &str, attr: Attribute) -> ShaderError {
    ShaderError::not_implemented(format!("{verb} of {attr} in {} programs", ctx.stage.name()))
}

/// `float` expression reading input attribute `attr`
fn input_attribute(ctx: &EmitContext<'_>, attr: Attribute) -> Result<String, ShaderError> {
    if let Some(index) = attr.generic_index() {
        if ctx.input_generics[index] {
            return Ok(format!("__in.attr{index}.{}", attr.swizzle()));
        }
        // Inputs the previous stage never wrote read as (0,0,0,1)
        return Ok(if attr.element() == 3 { "1.0f" } else { "0.0f" }.to_string());
    }
    let expr = match (ctx.stage, attr) {
        (Stage::Fragment, attr) if attr.is_position() => {
            format!("__in.position.{}", attr.swizzle())
        }
        (Stage::VertexA | Stage::VertexB, Attribute::VERTEX_ID) => {
            "as_type<float>(__vertex_id)".to_string()
        }
        (Stage::VertexA | Stage::VertexB, Attribute::INSTANCE_ID) => {
            "as_type<float>(__instance_id)".to_string()
        }
        (Stage::Fragment, Attribute::FRONT_FACE) => {
            "(__front_facing?as_type<float>(0xffffffffu):0.0f)".to_string()
        }
        _ => return Err(unsupported_attribute(ctx, "load", attr)),
    };
    Ok(expr)
}

pub(super) fn get_attribute(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let attr = attribute_arg(ctx, inst)?;
    let _vertex = ctx.consume_arg(inst, 1);
    let rhs = input_attribute(ctx, attr)?;
    ctx.add_define(inst, VarType::F32, &rhs);
    Ok(())
}

pub(super) fn get_attribute_u32(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let attr = attribute_arg(ctx, inst)?;
    let _vertex = ctx.consume_arg(inst, 1);
    let rhs = match (ctx.stage, attr) {
        (Stage::VertexA | Stage::VertexB, Attribute::VERTEX_ID) => "__vertex_id".to_string(),
        (Stage::VertexA | Stage::VertexB, Attribute::INSTANCE_ID) => "__instance_id".to_string(),
        (Stage::Fragment, Attribute::FRONT_FACE) => "(__front_facing?0xffffffffu:0u)".to_string(),
        _ => format!("as_type<uint>({})", input_attribute(ctx, attr)?),
    };
    ctx.add_define(inst, VarType::U32, &rhs);
    Ok(())
}

pub(super) fn set_attribute(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let attr = attribute_arg(ctx, inst)?;
    if !ctx.has_output || ctx.stage == Stage::Fragment {
        return Err(unsupported_attribute(ctx, "store", attr));
    }
    let value = ctx.consume_arg(inst, 1);
    let _vertex = ctx.consume_arg(inst, 2);
    if let Some(index) = attr.generic_index() {
        let name = ctx.output_generics[index][attr.element()].name.clone();
        if name.is_empty() {
            return Err(ShaderError::Logic(format!("store to undeclared output {attr}")));
        }
        ctx.add(format!("{name}.{}={value};", attr.swizzle()));
        return Ok(());
    }
    match attr {
        attr if attr.is_position() => ctx.add(format!("__out.position.{}={value};", attr.swizzle())),
        // The fixed point size written in the prologue wins over guest stores
        Attribute::POINT_SIZE if ctx.runtime_info.fixed_state_point_size.is_some() => {}
        Attribute::POINT_SIZE => ctx.add(format!("__out.point_size={value};")),
        Attribute::LAYER => ctx.add(format!("__out.layer=as_type<uint>({value});")),
        Attribute::VIEWPORT_INDEX => {
            ctx.add(format!("__out.viewport_index=as_type<uint>({value});"))
        }
        _ => return Err(unsupported_attribute(ctx, "store", attr)),
    }
    Ok(())
}

pub(super) fn get_attribute_indexed(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let [offset, _vertex] = ctx.consume_args::<2>(inst);
    let rhs = format!(
        "IndexedAttrLoad(int({offset}){})",
        ctx.indexed_attribute_args()
    );
    ctx.add_define(inst, VarType::F32, &rhs);
    Ok(())
}

fn immediate_u32(ctx: &EmitContext<'_>, inst: InstId, index: usize) -> Result<u32, ShaderError> {
    ctx.arg(inst, index).as_u32().ok_or_else(|| {
        ShaderError::not_implemented(format!(
            "dynamic operand {index} of {}",
            ctx.insts[inst].opcode()
        ))
    })
}

pub(super) fn set_frag_color(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let index = immediate_u32(ctx, inst, 0)?;
    let component = immediate_u32(ctx, inst, 1)?;
    let value = ctx.consume_arg(inst, 2);
    let swizzle = ['x', 'y', 'z', 'w'][(component % 4) as usize];
    ctx.add(format!("__out.color{index}.{swizzle}={value};"));
    Ok(())
}

pub(super) fn set_sample_mask(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let [value] = ctx.consume_args::<1>(inst);
    ctx.add(format!("__out.sample_mask={value};"));
    Ok(())
}

pub(super) fn set_frag_depth(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let [value] = ctx.consume_args::<1>(inst);
    ctx.add(format!("__out.depth={value};"));
    Ok(())
}

/// Result read straight from a builtin or uniform
pub(super) fn builtin(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    ty: VarType,
    expr: &str,
) -> EmitResult {
    ctx.add_define(inst, ty, expr);
    Ok(())
}

pub(super) fn y_direction(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let direction = if ctx.runtime_info.y_negate { -1.0 } else { 1.0 };
    ctx.add_define(inst, VarType::F32, &format_immediate(&Value::F32(direction)));
    Ok(())
}

pub(super) fn load_local(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let [offset] = ctx.consume_args::<1>(inst);
    ctx.add_define(inst, VarType::U32, &format!("lmem[{offset}]"));
    Ok(())
}

pub(super) fn write_local(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let [offset, value] = ctx.consume_args::<2>(inst);
    ctx.add(format!("lmem[{offset}]={value};"));
    Ok(())
}
