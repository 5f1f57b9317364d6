//! Instruction rules
//!
//! One rule per opcode, each consuming its operands through the variable
//! allocator and appending MSL statements to the emit context. [`emit_code`]
//! walks the structured control flow list and dispatches every instruction
//! of every block.

mod atomic;
mod composite;
mod context_get_set;
mod convert;
mod floating_point;
mod image;
mod integer;
mod logical;
mod memory;
mod special;
mod warp;

use super::emit_context::EmitContext;
use super::var_alloc::VarType;
use crate::ir::{Block, InstId, Opcode, SyntaxNode, Value};
use atomic::{AtomicOp, Space};
use image::Lod;
use oc_core::ShaderError;

pub(super) type EmitResult = Result<(), ShaderError>;

/// Define the result of a one-operand expression
pub(super) fn unary(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    ty: VarType,
    expr: impl FnOnce(&str) -> String,
) -> EmitResult {
    let [x] = ctx.consume_args::<1>(inst);
    ctx.add_define(inst, ty, &expr(&x));
    Ok(())
}

pub(super) fn binary(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    ty: VarType,
    expr: impl FnOnce(&str, &str) -> String,
) -> EmitResult {
    let [a, b] = ctx.consume_args::<2>(inst);
    ctx.add_define(inst, ty, &expr(&a, &b));
    Ok(())
}

pub(super) fn ternary(
    ctx: &mut EmitContext<'_>,
    inst: InstId,
    ty: VarType,
    expr: impl FnOnce(&str, &str, &str) -> String,
) -> EmitResult {
    let [a, b, c] = ctx.consume_args::<3>(inst);
    ctx.add_define(inst, ty, &expr(&a, &b, &c));
    Ok(())
}

fn not_implemented(ctx: &EmitContext<'_>, inst: InstId) -> EmitResult {
    let opcode = ctx.insts[inst].opcode();
    tracing::debug!(%opcode, stage = ctx.stage.name(), "no MSL translation");
    Err(ShaderError::not_implemented(opcode.name()))
}

/// Emit one instruction
pub(super) fn emit_inst(ctx: &mut EmitContext<'_>, inst: InstId) -> EmitResult {
    use Opcode::*;
    match ctx.insts[inst].opcode() {
        Phi => special::phi(ctx, inst),
        Void => Ok(()),
        Reference => special::reference(ctx, inst),
        PhiMove => special::phi_move(ctx, inst),
        Prologue => special::prologue(ctx),
        Epilogue => special::epilogue(ctx),
        Join | EmitVertex | EndPrimitive => not_implemented(ctx, inst),
        DemoteToHelperInvocation => special::demote_to_helper_invocation(ctx),

        Barrier | WorkgroupMemoryBarrier => special::barrier(ctx, "mem_threadgroup"),
        DeviceMemoryBarrier => special::barrier(ctx, "mem_device"),

        UndefU1 => special::undef(ctx, inst, VarType::U1),
        UndefU32 => special::undef(ctx, inst, VarType::U32),
        UndefU64 => special::undef(ctx, inst, VarType::U64),
        UndefU8 | UndefU16 => not_implemented(ctx, inst),

        GetCbufU8 => context_get_set::get_cbuf_narrow(ctx, inst, 8, false),
        GetCbufS8 => context_get_set::get_cbuf_narrow(ctx, inst, 8, true),
        GetCbufU16 => context_get_set::get_cbuf_narrow(ctx, inst, 16, false),
        GetCbufS16 => context_get_set::get_cbuf_narrow(ctx, inst, 16, true),
        GetCbufU32 => context_get_set::get_cbuf_u32(ctx, inst),
        GetCbufF32 => context_get_set::get_cbuf_f32(ctx, inst),
        GetCbufU32x2 => context_get_set::get_cbuf_u32x2(ctx, inst),
        GetAttribute => context_get_set::get_attribute(ctx, inst),
        GetAttributeU32 => context_get_set::get_attribute_u32(ctx, inst),
        SetAttribute => context_get_set::set_attribute(ctx, inst),
        GetAttributeIndexed => context_get_set::get_attribute_indexed(ctx, inst),
        SetAttributeIndexed => not_implemented(ctx, inst),
        SetFragColor => context_get_set::set_frag_color(ctx, inst),
        SetSampleMask => context_get_set::set_sample_mask(ctx, inst),
        SetFragDepth => context_get_set::set_frag_depth(ctx, inst),
        WorkgroupId => context_get_set::builtin(ctx, inst, VarType::U32x3, "__workgroup_id"),
        LocalInvocationId => {
            context_get_set::builtin(ctx, inst, VarType::U32x3, "__local_invocation_id")
        }
        InvocationId => not_implemented(ctx, inst),
        SampleId => context_get_set::builtin(ctx, inst, VarType::U32, "__sample_id"),
        IsHelperInvocation => {
            context_get_set::builtin(ctx, inst, VarType::U1, "simd_is_helper_thread()")
        }
        YDirection => context_get_set::y_direction(ctx, inst),
        ResolutionDownFactor => context_get_set::builtin(ctx, inst, VarType::F32, "scaling.z"),
        RenderArea => context_get_set::builtin(ctx, inst, VarType::F32x4, "render_area"),
        LoadLocal => context_get_set::load_local(ctx, inst),
        WriteLocal => context_get_set::write_local(ctx, inst),

        LoadGlobal32 => memory::load_global(ctx, inst, 32),
        LoadGlobal64 => memory::load_global(ctx, inst, 64),
        LoadGlobal128 => memory::load_global(ctx, inst, 128),
        WriteGlobal32 => memory::write_global(ctx, inst, 32),
        WriteGlobal64 => memory::write_global(ctx, inst, 64),
        WriteGlobal128 => memory::write_global(ctx, inst, 128),
        LoadStorage32 => memory::load_storage(ctx, inst, 1),
        LoadStorage64 => memory::load_storage(ctx, inst, 2),
        LoadStorage128 => memory::load_storage(ctx, inst, 4),
        WriteStorage32 => memory::write_storage(ctx, inst, 1),
        WriteStorage64 => memory::write_storage(ctx, inst, 2),
        WriteStorage128 => memory::write_storage(ctx, inst, 4),
        LoadSharedU32 => memory::load_shared(ctx, inst, 1),
        LoadSharedU64 => memory::load_shared(ctx, inst, 2),
        WriteSharedU32 => memory::write_shared(ctx, inst, 1),
        WriteSharedU64 => memory::write_shared(ctx, inst, 2),

        CompositeConstructU32x2 => composite::construct(ctx, inst, VarType::U32x2),
        CompositeConstructU32x3 => composite::construct(ctx, inst, VarType::U32x3),
        CompositeConstructU32x4 => composite::construct(ctx, inst, VarType::U32x4),
        CompositeExtractU32x2 | CompositeExtractU32x3 | CompositeExtractU32x4 => {
            composite::extract(ctx, inst, VarType::U32)
        }
        CompositeConstructF16x2 => not_implemented(ctx, inst),
        CompositeConstructF32x2 => composite::construct(ctx, inst, VarType::F32x2),
        CompositeConstructF32x3 => composite::construct(ctx, inst, VarType::F32x3),
        CompositeConstructF32x4 => composite::construct(ctx, inst, VarType::F32x4),
        CompositeExtractF32x2 | CompositeExtractF32x3 | CompositeExtractF32x4 => {
            composite::extract(ctx, inst, VarType::F32)
        }
        CompositeInsertF32x4 => composite::insert_f32x4(ctx, inst),

        SelectU1 => logical::select(ctx, inst, VarType::U1),
        SelectU32 => logical::select(ctx, inst, VarType::U32),
        SelectU64 => logical::select(ctx, inst, VarType::U64),
        SelectF32 => logical::select(ctx, inst, VarType::F32),
        SelectF64 => logical::select(ctx, inst, VarType::F64),
        SelectU8 | SelectU16 | SelectF16 => not_implemented(ctx, inst),

        BitCastU16F16 => not_implemented(ctx, inst),
        BitCastU32F32 => convert::bit_cast(ctx, inst, VarType::U32, "uint"),
        BitCastU64F64 => convert::bit_cast(ctx, inst, VarType::U64, "ulong"),
        BitCastF32U32 => convert::bit_cast(ctx, inst, VarType::F32, "float"),
        BitCastF64U64 => convert::bit_cast(ctx, inst, VarType::F64, "double"),
        PackUint2x32 => convert::bit_cast(ctx, inst, VarType::U64, "ulong"),
        UnpackUint2x32 => convert::bit_cast(ctx, inst, VarType::U32x2, "uint2"),
        PackHalf2x16 => convert::pack_half2x16(ctx, inst),
        UnpackHalf2x16 => convert::unpack_half2x16(ctx, inst),
        PackFloat2x16 => convert::bit_cast(ctx, inst, VarType::U32, "uint"),
        UnpackFloat2x16 => convert::bit_cast(ctx, inst, VarType::F16x2, "half2"),

        FPAbs32 => floating_point::abs32(ctx, inst),
        FPAbs64 => floating_point::abs64(ctx, inst),
        FPAdd16 => not_implemented(ctx, inst),
        FPAdd32 => floating_point::add32(ctx, inst),
        FPAdd64 => floating_point::add64(ctx, inst),
        FPFma32 => floating_point::fma32(ctx, inst),
        FPFma64 => floating_point::fma64(ctx, inst),
        FPMax32 => floating_point::max32(ctx, inst),
        FPMin32 => floating_point::min32(ctx, inst),
        FPMul32 => floating_point::mul32(ctx, inst),
        FPMul64 => floating_point::mul64(ctx, inst),
        FPNeg32 => floating_point::neg32(ctx, inst),
        FPNeg64 => floating_point::neg64(ctx, inst),
        FPRecip32 => floating_point::recip32(ctx, inst),
        FPRecipSqrt32 => floating_point::intrinsic32(ctx, inst, "rsqrt"),
        FPSqrt => floating_point::intrinsic32(ctx, inst, "sqrt"),
        FPSin => floating_point::intrinsic32(ctx, inst, "sin"),
        FPCos => floating_point::intrinsic32(ctx, inst, "cos"),
        FPExp2 => floating_point::intrinsic32(ctx, inst, "exp2"),
        FPLog2 => floating_point::intrinsic32(ctx, inst, "log2"),
        FPSaturate32 => floating_point::intrinsic32(ctx, inst, "saturate"),
        FPClamp32 => floating_point::clamp32(ctx, inst),
        FPRoundEven32 => floating_point::intrinsic32(ctx, inst, "rint"),
        FPFloor32 => floating_point::intrinsic32(ctx, inst, "floor"),
        FPCeil32 => floating_point::intrinsic32(ctx, inst, "ceil"),
        FPTrunc32 => floating_point::intrinsic32(ctx, inst, "trunc"),
        FPOrdEqual32 => floating_point::compare32(ctx, inst, "==", true),
        FPUnordEqual32 => floating_point::compare32(ctx, inst, "==", false),
        FPOrdNotEqual32 => floating_point::compare32(ctx, inst, "!=", true),
        FPUnordNotEqual32 => floating_point::compare32(ctx, inst, "!=", false),
        FPOrdLessThan32 => floating_point::compare32(ctx, inst, "<", true),
        FPOrdGreaterThan32 => floating_point::compare32(ctx, inst, ">", true),
        FPOrdLessThanEqual32 => floating_point::compare32(ctx, inst, "<=", true),
        FPOrdGreaterThanEqual32 => floating_point::compare32(ctx, inst, ">=", true),
        FPIsNan32 => floating_point::is_nan32(ctx, inst),
        FSwizzleAdd => floating_point::swizzle_add(ctx, inst),

        IAdd32 => integer::infix(ctx, inst, VarType::U32, "+"),
        IAddCarry32 => integer::add_carry32(ctx, inst),
        GetCarry => context_get_set::builtin(ctx, inst, VarType::U1, "carry!=0u"),
        IAdd64 => integer::infix(ctx, inst, VarType::U64, "+"),
        ISub32 => integer::infix(ctx, inst, VarType::U32, "-"),
        ISub64 => integer::infix(ctx, inst, VarType::U64, "-"),
        IMul32 => integer::infix(ctx, inst, VarType::U32, "*"),
        INeg32 => integer::neg32(ctx, inst),
        INeg64 => integer::neg64(ctx, inst),
        IAbs32 => integer::abs32(ctx, inst),
        ShiftLeftLogical32 => integer::infix(ctx, inst, VarType::U32, "<<"),
        ShiftLeftLogical64 => integer::infix(ctx, inst, VarType::U64, "<<"),
        ShiftRightLogical32 => integer::infix(ctx, inst, VarType::U32, ">>"),
        ShiftRightLogical64 => integer::infix(ctx, inst, VarType::U64, ">>"),
        ShiftRightArithmetic32 => integer::shift_right_arithmetic32(ctx, inst),
        ShiftRightArithmetic64 => integer::shift_right_arithmetic64(ctx, inst),
        BitwiseAnd32 => integer::infix(ctx, inst, VarType::U32, "&"),
        BitwiseOr32 => integer::infix(ctx, inst, VarType::U32, "|"),
        BitwiseXor32 => integer::infix(ctx, inst, VarType::U32, "^"),
        BitwiseNot32 => integer::bitwise_not32(ctx, inst),
        BitFieldInsert => integer::bit_field_insert(ctx, inst),
        BitFieldSExtract => integer::bit_field_s_extract(ctx, inst),
        BitFieldUExtract => integer::bit_field_u_extract(ctx, inst),
        BitReverse32 => integer::intrinsic32(ctx, inst, "reverse_bits"),
        BitCount32 => integer::intrinsic32(ctx, inst, "popcount"),
        FindSMsb32 => integer::find_s_msb32(ctx, inst),
        FindUMsb32 => integer::find_u_msb32(ctx, inst),
        SMin32 => integer::min_max32(ctx, inst, "min", true),
        UMin32 => integer::min_max32(ctx, inst, "min", false),
        SMax32 => integer::min_max32(ctx, inst, "max", true),
        UMax32 => integer::min_max32(ctx, inst, "max", false),
        SClamp32 => integer::clamp32(ctx, inst, true),
        UClamp32 => integer::clamp32(ctx, inst, false),
        SLessThan => integer::compare(ctx, inst, "<", true),
        ULessThan => integer::compare(ctx, inst, "<", false),
        IEqual => integer::compare(ctx, inst, "==", false),
        SLessThanEqual => integer::compare(ctx, inst, "<=", true),
        ULessThanEqual => integer::compare(ctx, inst, "<=", false),
        SGreaterThan => integer::compare(ctx, inst, ">", true),
        UGreaterThan => integer::compare(ctx, inst, ">", false),
        INotEqual => integer::compare(ctx, inst, "!=", false),
        SGreaterThanEqual => integer::compare(ctx, inst, ">=", true),
        UGreaterThanEqual => integer::compare(ctx, inst, ">=", false),

        LogicalOr => logical::or(ctx, inst),
        LogicalAnd => logical::and(ctx, inst),
        LogicalXor => logical::xor(ctx, inst),
        LogicalNot => logical::not(ctx, inst),

        ConvertS32F32 => unary(ctx, inst, VarType::U32, |x| format!("uint(int({x}))")),
        ConvertU32F32 => unary(ctx, inst, VarType::U32, |x| format!("uint({x})")),
        ConvertF32S32 => unary(ctx, inst, VarType::F32, |x| format!("float(int({x}))")),
        ConvertF32U32 => unary(ctx, inst, VarType::F32, |x| format!("float({x})")),
        ConvertF64F32 => unary(ctx, inst, VarType::F64, |x| format!("double({x})")),
        ConvertF32F64 => unary(ctx, inst, VarType::F32, |x| format!("float({x})")),
        ConvertU64U32 => unary(ctx, inst, VarType::U64, |x| format!("ulong({x})")),
        ConvertU32U64 => unary(ctx, inst, VarType::U32, |x| format!("uint({x})")),
        ConvertF16F32 | ConvertF32F16 => not_implemented(ctx, inst),

        SharedAtomicIAdd32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::Add),
        SharedAtomicSMin32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::SMin),
        SharedAtomicUMin32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::UMin),
        SharedAtomicSMax32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::SMax),
        SharedAtomicUMax32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::UMax),
        SharedAtomicInc32 => atomic::cas_loop(ctx, inst, Space::Shared, "CasIncrement"),
        SharedAtomicDec32 => atomic::cas_loop(ctx, inst, Space::Shared, "CasDecrement"),
        SharedAtomicAnd32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::And),
        SharedAtomicOr32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::Or),
        SharedAtomicXor32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::Xor),
        SharedAtomicExchange32 => atomic::native(ctx, inst, Space::Shared, AtomicOp::Exchange),
        StorageAtomicIAdd32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::Add),
        StorageAtomicSMin32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::SMin),
        StorageAtomicUMin32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::UMin),
        StorageAtomicSMax32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::SMax),
        StorageAtomicUMax32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::UMax),
        StorageAtomicInc32 => atomic::cas_loop(ctx, inst, Space::Storage, "CasIncrement"),
        StorageAtomicDec32 => atomic::cas_loop(ctx, inst, Space::Storage, "CasDecrement"),
        StorageAtomicAnd32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::And),
        StorageAtomicOr32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::Or),
        StorageAtomicXor32 => atomic::native(ctx, inst, Space::Storage, AtomicOp::Xor),
        StorageAtomicExchange32 => {
            atomic::native(ctx, inst, Space::Storage, AtomicOp::Exchange)
        }
        StorageAtomicAddF32 => atomic::cas_loop(ctx, inst, Space::Storage, "CasFloatAdd"),
        StorageAtomicAddF16x2 => atomic::cas_loop(ctx, inst, Space::Storage, "CasFloatAdd16x2"),
        StorageAtomicAddF32x2 => atomic::cas_loop(ctx, inst, Space::Storage, "CasFloatAdd32x2"),
        StorageAtomicMinF16x2 => atomic::cas_loop(ctx, inst, Space::Storage, "CasFloatMin16x2"),
        StorageAtomicMinF32x2 => atomic::cas_loop(ctx, inst, Space::Storage, "CasFloatMin32x2"),
        StorageAtomicMaxF16x2 => atomic::cas_loop(ctx, inst, Space::Storage, "CasFloatMax16x2"),
        StorageAtomicMaxF32x2 => atomic::cas_loop(ctx, inst, Space::Storage, "CasFloatMax32x2"),
        GlobalAtomicIAdd32 => atomic::global_unsupported(ctx, inst),

        ShuffleIndex => warp::shuffle(ctx, inst, warp::Shuffle::Index),
        ShuffleUp => warp::shuffle(ctx, inst, warp::Shuffle::Up),
        ShuffleDown => warp::shuffle(ctx, inst, warp::Shuffle::Down),
        ShuffleButterfly => warp::shuffle(ctx, inst, warp::Shuffle::Butterfly),
        ShuffleInBounds => context_get_set::builtin(ctx, inst, VarType::U1, "shfl_in_bounds"),

        ImageSampleImplicitLod => image::sample(ctx, inst, Lod::Implicit),
        ImageSampleExplicitLod => image::sample(ctx, inst, Lod::Explicit),
        ImageSampleDrefImplicitLod => image::sample_dref(ctx, inst, Lod::Implicit),
        ImageSampleDrefExplicitLod => image::sample_dref(ctx, inst, Lod::Explicit),
        ImageGather => image::gather(ctx, inst),
        ImageFetch => image::fetch(ctx, inst),
        ImageQueryDimensions => image::query_dimensions(ctx, inst),
        ImageRead => image::image_read(ctx, inst),
        ImageWrite => image::image_write(ctx, inst),
        TextureBufferFetch => image::texture_buffer_fetch(ctx, inst),
        ImageBufferRead => image::image_buffer_read(ctx, inst),
        ImageBufferWrite => image::image_buffer_write(ctx, inst),
    }
}

/// Emit the structured control flow of a program into the context body
pub(super) fn emit_code(
    ctx: &mut EmitContext<'_>,
    blocks: &[Block],
    syntax_list: &[SyntaxNode],
) -> EmitResult {
    for node in syntax_list {
        match node {
            SyntaxNode::Block(block) => {
                for &inst in &blocks[block.index()].insts {
                    emit_inst(ctx, inst)?;
                }
            }
            SyntaxNode::If { cond } => {
                let cond = ctx.consume(cond);
                ctx.add(format!("if({cond}){{"));
            }
            SyntaxNode::EndIf => ctx.add("}"),
            SyntaxNode::Loop => ctx.add("for(;;){"),
            SyntaxNode::Break { cond } => match cond {
                Value::U1(true) => ctx.add("break;"),
                Value::U1(false) => {}
                cond => {
                    let cond = ctx.consume(cond);
                    ctx.add(format!("if({cond}){{break;}}"));
                }
            },
            SyntaxNode::Repeat { cond } => {
                let cond = ctx.consume(cond);
                if ctx.profile.disable_loop_safety_checks {
                    ctx.add(format!("if(!{cond}){{break;}}}}"));
                } else {
                    let counter = ctx.num_safety_loop_vars;
                    ctx.num_safety_loop_vars += 1;
                    ctx.add(format!("if(--loop{counter}<0 || !{cond}){{break;}}}}"));
                }
            }
            SyntaxNode::Return | SyntaxNode::Unreachable => {
                let statement = ctx.return_statement();
                ctx.add(statement);
            }
        }
    }
    if !matches!(
        syntax_list.last(),
        Some(SyntaxNode::Return | SyntaxNode::Unreachable)
    ) {
        let statement = ctx.return_statement();
        ctx.add(statement);
    }
    Ok(())
}
