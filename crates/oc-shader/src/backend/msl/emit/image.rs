//! Texture sampling and storage image access
//!
//! The handle operand is an immediate index into the resources declared by
//! the emit context, in descriptor order.

use super::EmitResult;
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::{InstId, TextureDescriptor};
use crate::types::TextureType;
use oc_core::ShaderError;

/// How a sampling instruction picks its level of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Lod {
    Implicit,
    Explicit,
}

fn handle(ctx: &EmitContext<'_>, inst: InstId) -> Result<usize, ShaderError> {
    ctx.arg(inst, 0)
        .as_u32()
        .map(|index| index as usize)
        .ok_or_else(|| ShaderError::not_implemented("dynamic texture handle"))
}

fn out_of_range(kind: &str, index: usize) -> ShaderError {
    ShaderError::Logic(format!("{kind} handle {index} out of range"))
}

/// Texture, sampler and descriptor behind a sampled-texture handle
fn texture(
    ctx: &EmitContext<'_>,
    inst: InstId,
) -> Result<(String, String, TextureDescriptor), ShaderError> {
    let index = handle(ctx, inst)?;
    let binding = ctx
        .textures
        .get(index)
        .ok_or_else(|| out_of_range("texture", index))?
        .binding;
    let desc = *ctx
        .info
        .texture_descriptors
        .get(index)
        .ok_or_else(|| out_of_range("texture", index))?;
    let name = ctx.stage_name;
    Ok((
        format!("{name}_tex{binding}"),
        format!("{name}_samp{binding}"),
        desc,
    ))
}

/// Coordinate arguments of `sample`, splitting the array layer off
fn sample_coords(ty: TextureType, coords: &str) -> Result<String, ShaderError> {
    Ok(match ty {
        TextureType::Color1D
        | TextureType::Color2D
        | TextureType::Color2DRect
        | TextureType::Color3D
        | TextureType::ColorCube => coords.to_string(),
        TextureType::ColorArray1D => format!("{coords}.x,uint({coords}.y)"),
        TextureType::ColorArray2D => format!("{coords}.xy,uint({coords}.z)"),
        TextureType::ColorArrayCube => format!("{coords}.xyz,uint({coords}.w)"),
        TextureType::Buffer => {
            return Err(ShaderError::not_implemented("sampling a texture buffer"))
        }
    })
}

/// Coordinate arguments of `read` and `write` on integer coordinates
fn texel_coords(ty: TextureType, coords: &str) -> Result<String, ShaderError> {
    Ok(match ty {
        TextureType::Color1D
        | TextureType::Color2D
        | TextureType::Color2DRect
        | TextureType::Color3D
        | TextureType::Buffer => coords.to_string(),
        TextureType::ColorArray1D => format!("{coords}.x,{coords}.y"),
        TextureType::ColorArray2D => format!("{coords}.xy,{coords}.z"),
        TextureType::ColorCube | TextureType::ColorArrayCube => {
            return Err(ShaderError::not_implemented(format!(
                "texel access on {ty:?} textures"
            )))
        }
    })
}

/// Level of detail option; 1D textures have a single level in Metal
fn lod_option(ty: TextureType, option: String) -> String {
    if ty == TextureType::Color1D {
        String::new()
    } else {
        format!(",{option}")
    }
}

pub(super) fn sample(ctx: &mut EmitContext<'_>, inst: InstId, lod: Lod) -> EmitResult {
    let (tex, samp, desc) = texture(ctx, inst)?;
    let coords = ctx.consume_arg(inst, 1);
    let lod_value = ctx.consume_arg(inst, 2);
    let option = match lod {
        Lod::Implicit => format!("bias({lod_value})"),
        Lod::Explicit => format!("level({lod_value})"),
    };
    let rhs = format!(
        "{tex}.sample({samp},{}{})",
        sample_coords(desc.ty, &coords)?,
        lod_option(desc.ty, option)
    );
    let rhs = if desc.is_depth {
        format!("float4({rhs})")
    } else {
        rhs
    };
    ctx.add_define(inst, VarType::F32x4, &rhs);
    Ok(())
}

pub(super) fn sample_dref(ctx: &mut EmitContext<'_>, inst: InstId, lod: Lod) -> EmitResult {
    let (tex, samp, desc) = texture(ctx, inst)?;
    if !desc.is_depth {
        return Err(ShaderError::not_implemented("depth compare on a color texture"));
    }
    let coords = ctx.consume_arg(inst, 1);
    let dref = ctx.consume_arg(inst, 2);
    let level = match lod {
        Lod::Implicit => String::new(),
        Lod::Explicit => format!(",level({})", ctx.consume_arg(inst, 3)),
    };
    let rhs = format!(
        "{tex}.sample_compare({samp},{},{dref}{level})",
        sample_coords(desc.ty, &coords)?
    );
    ctx.add_define(inst, VarType::F32, &rhs);
    Ok(())
}

pub(super) fn gather(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let (tex, samp, desc) = texture(ctx, inst)?;
    let component = ctx.arg(inst, 2).as_u32().ok_or_else(|| {
        ShaderError::not_implemented("dynamic gather component")
    })?;
    let coords = ctx.consume_arg(inst, 1);
    let coords = sample_coords(desc.ty, &coords)?;
    let rhs = if desc.is_depth {
        format!("{tex}.gather({samp},{coords})")
    } else {
        let component = ['x', 'y', 'z', 'w'][(component % 4) as usize];
        format!("{tex}.gather({samp},{coords},int2(0),component::{component})")
    };
    ctx.add_define(inst, VarType::F32x4, &rhs);
    Ok(())
}

pub(super) fn fetch(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let (tex, _, desc) = texture(ctx, inst)?;
    let coords = ctx.consume_arg(inst, 1);
    let lod = ctx.consume_arg(inst, 2);
    let coords = texel_coords(desc.ty, &coords)?;
    let rhs = if desc.ty == TextureType::Color1D {
        format!("{tex}.read({coords})")
    } else {
        format!("{tex}.read({coords},{lod})")
    };
    let rhs = if desc.is_depth {
        format!("float4({rhs})")
    } else {
        rhs
    };
    ctx.add_define(inst, VarType::F32x4, &rhs);
    Ok(())
}

pub(super) fn query_dimensions(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let (tex, _, desc) = texture(ctx, inst)?;
    let lod = ctx.consume_arg(inst, 1);
    let rhs = if desc.is_multisample {
        format!("uint4({tex}.get_width(),{tex}.get_height(),1u,1u)")
    } else if desc.ty == TextureType::Color1D {
        format!("uint4({tex}.get_width(),1u,1u,1u)")
    } else if desc.ty == TextureType::ColorArray1D {
        format!("uint4({tex}.get_width(),{tex}.get_array_size(),1u,1u)")
    } else {
        let third = match desc.ty {
            TextureType::Color3D => format!("{tex}.get_depth({lod})"),
            TextureType::ColorArray2D | TextureType::ColorArrayCube => {
                format!("{tex}.get_array_size()")
            }
            _ => "1u".to_string(),
        };
        format!(
            "uint4({tex}.get_width({lod}),{tex}.get_height({lod}),{third},{tex}.get_num_mip_levels())"
        )
    };
    ctx.add_define(inst, VarType::U32x4, &rhs);
    Ok(())
}

/// Storage image name and dimensionality behind a handle
fn image(ctx: &EmitContext<'_>, inst: InstId) -> Result<(String, TextureType), ShaderError> {
    let index = handle(ctx, inst)?;
    let binding = ctx
        .images
        .get(index)
        .ok_or_else(|| out_of_range("image", index))?
        .binding;
    let ty = ctx
        .info
        .image_descriptors
        .get(index)
        .ok_or_else(|| out_of_range("image", index))?
        .ty;
    Ok((format!("{}_img{binding}", ctx.stage_name), ty))
}

pub(super) fn image_read(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let (img, ty) = image(ctx, inst)?;
    let coords = ctx.consume_arg(inst, 1);
    let rhs = format!("{img}.read({})", texel_coords(ty, &coords)?);
    ctx.add_define(inst, VarType::U32x4, &rhs);
    Ok(())
}

pub(super) fn image_write(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let (img, ty) = image(ctx, inst)?;
    let coords = ctx.consume_arg(inst, 1);
    let value = ctx.consume_arg(inst, 2);
    ctx.add(format!("{img}.write({value},{});", texel_coords(ty, &coords)?));
    Ok(())
}

fn buffer_binding(
    ctx: &EmitContext<'_>,
    inst: InstId,
    images: bool,
) -> Result<u32, ShaderError> {
    let index = handle(ctx, inst)?;
    let (table, kind) = if images {
        (&ctx.image_buffers, "image buffer")
    } else {
        (&ctx.texture_buffers, "texture buffer")
    };
    table
        .get(index)
        .map(|definition| definition.binding)
        .ok_or_else(|| out_of_range(kind, index))
}

pub(super) fn texture_buffer_fetch(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let binding = buffer_binding(ctx, inst, false)?;
    let offset = ctx.consume_arg(inst, 1);
    let rhs = format!("{}_texbuf{binding}.read({offset})", ctx.stage_name);
    ctx.add_define(inst, VarType::F32x4, &rhs);
    Ok(())
}

pub(super) fn image_buffer_read(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let binding = buffer_binding(ctx, inst, true)?;
    let offset = ctx.consume_arg(inst, 1);
    let rhs = format!("{}_imgbuf{binding}.read({offset})", ctx.stage_name);
    ctx.add_define(inst, VarType::U32x4, &rhs);
    Ok(())
}

pub(super) fn image_buffer_write(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    let binding = buffer_binding(ctx, inst, true)?;
    let offset = ctx.consume_arg(inst, 1);
    let value = ctx.consume_arg(inst, 2);
    ctx.add(format!(
        "{}_imgbuf{binding}.write({value},{offset});",
        ctx.stage_name
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_layers_split_off() {
        assert_eq!(
            sample_coords(TextureType::ColorArray2D, "f3_0").unwrap(),
            "f3_0.xy,uint(f3_0.z)"
        );
        assert_eq!(
            sample_coords(TextureType::ColorArrayCube, "f4_1").unwrap(),
            "f4_1.xyz,uint(f4_1.w)"
        );
        assert_eq!(sample_coords(TextureType::ColorCube, "f3_0").unwrap(), "f3_0");
    }

    #[test]
    fn test_cube_texel_access_is_rejected() {
        assert!(matches!(
            texel_coords(TextureType::ColorCube, "u3_0"),
            Err(ShaderError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_1d_has_no_lod_option() {
        assert_eq!(lod_option(TextureType::Color1D, "bias(0.0f)".into()), "");
        assert_eq!(
            lod_option(TextureType::Color2D, "level(f_0)".into()),
            ",level(f_0)"
        );
    }
}
