//! Global, storage buffer and shared memory access
//!
//! Storage buffers are bound as `device uint*` and shared memory as a
//! `threadgroup uint` array, so every access is word addressed: byte offsets
//! are shifted down by two and wider values are split per word.

use super::EmitResult;
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::InstId;
use oc_core::ShaderError;

fn require_int64(ctx: &EmitContext<'_>) -> EmitResult {
    if ctx.profile.support_int64 {
        Ok(())
    } else {
        Err(ShaderError::not_implemented(
            "global memory without 64-bit integer support",
        ))
    }
}

pub(super) fn load_global(ctx: &mut EmitContext<'_>, inst: InstId, bits: u32) -> EmitResult {
    require_int64(ctx)?;
    let ty = match bits {
        32 => VarType::U32,
        64 => VarType::U32x2,
        _ => VarType::U32x4,
    };
    let [address] = ctx.consume_args::<1>(inst);
    let rhs = format!("LoadGlobal{bits}({address}{})", ctx.global_memory_args);
    ctx.add_define(inst, ty, &rhs);
    Ok(())
}

pub(super) fn write_global(ctx: &mut EmitContext<'_>, inst: InstId, bits: u32) -> EmitResult {
    require_int64(ctx)?;
    let [address, value] = ctx.consume_args::<2>(inst);
    let line = format!("WriteGlobal{bits}({address},{value}{});", ctx.global_memory_args);
    ctx.add(line);
    Ok(())
}

fn storage_name(ctx: &EmitContext<'_>, inst: InstId) -> Result<String, ShaderError> {
    let binding = ctx
        .arg(inst, 0)
        .as_u32()
        .ok_or_else(|| ShaderError::not_implemented("dynamic storage buffer binding"))?;
    Ok(format!("{}_ssbo{binding}", ctx.stage_name))
}

/// Word `word` past byte offset `offset` of buffer `buffer`
fn word(buffer: &str, offset: &str, word: u32) -> String {
    if word == 0 {
        format!("{buffer}[({offset})>>2]")
    } else {
        format!("{buffer}[(({offset})+{}u)>>2]", word * 4)
    }
}

fn vector_load(buffer: &str, offset: &str, words: u32) -> (VarType, String) {
    let parts: Vec<String> = (0..words).map(|i| word(buffer, offset, i)).collect();
    match words {
        1 => (VarType::U32, parts.join(",")),
        2 => (VarType::U32x2, format!("uint2({})", parts.join(","))),
        _ => (VarType::U32x4, format!("uint4({})", parts.join(","))),
    }
}

fn vector_store(buffer: &str, offset: &str, value: &str, words: u32) -> String {
    if words == 1 {
        return format!("{}={value};", word(buffer, offset, 0));
    }
    (0..words)
        .map(|i| {
            let component = ['x', 'y', 'z', 'w'][i as usize];
            format!("{}={value}.{component};", word(buffer, offset, i))
        })
        .collect()
}

pub(super) fn load_storage(ctx: &mut EmitContext<'_>, inst: InstId, words: u32) -> EmitResult {
    let buffer = storage_name(ctx, inst)?;
    let offset = ctx.consume_arg(inst, 1);
    let (ty, rhs) = vector_load(&buffer, &offset, words);
    ctx.add_define(inst, ty, &rhs);
    Ok(())
}

pub(super) fn write_storage(ctx: &mut EmitContext<'_>, inst: InstId, words: u32) -> EmitResult {
    let buffer = storage_name(ctx, inst)?;
    let offset = ctx.consume_arg(inst, 1);
    let value = ctx.consume_arg(inst, 2);
    ctx.add(vector_store(&buffer, &offset, &value, words));
    Ok(())
}

pub(super) fn load_shared(ctx: &mut EmitContext<'_>, inst: InstId, words: u32) -> EmitResult {
    let [offset] = ctx.consume_args::<1>(inst);
    let (ty, rhs) = vector_load("smem", &offset, words);
    ctx.add_define(inst, ty, &rhs);
    Ok(())
}

pub(super) fn write_shared(ctx: &mut EmitContext<'_>, inst: InstId, words: u32) -> EmitResult {
    let [offset, value] = ctx.consume_args::<2>(inst);
    ctx.add(vector_store("smem", &offset, &value, words));
    Ok(())
}
