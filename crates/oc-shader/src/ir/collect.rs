//! Shader info collection pass
//!
//! Walks every instruction of a program and folds its resource and feature
//! usage into [`Info`]. Descriptors that need guest state to build (storage
//! buffers, textures, images) are left to the frontend.

use super::info::{ConstantBufferDescriptor, Info, NUM_CONSTANT_BUFFERS, NUM_RENDER_TARGETS};
use super::opcodes::Opcode;
use super::program::Program;
use super::value::Value;

/// Largest constant buffer the guest can bind
const MAX_CBUF_SIZE: u32 = 0x1_0000;

fn cbuf_access_size(opcode: Opcode) -> u32 {
    match opcode {
        Opcode::GetCbufU8 | Opcode::GetCbufS8 => 1,
        Opcode::GetCbufU16 | Opcode::GetCbufS16 => 2,
        Opcode::GetCbufU32x2 => 8,
        _ => 4,
    }
}

fn mark_cbuf(info: &mut Info, opcode: Opcode, binding: &Value, offset: &Value) {
    let Some(index) = binding.as_u32() else {
        // Indirect binding: any buffer may be read
        info.constant_buffer_mask = (1 << NUM_CONSTANT_BUFFERS) - 1;
        info.constant_buffer_used_sizes = [MAX_CBUF_SIZE; NUM_CONSTANT_BUFFERS];
        return;
    };
    let index = index as usize;
    if index >= NUM_CONSTANT_BUFFERS {
        return;
    }
    info.constant_buffer_mask |= 1 << index;
    let end = match offset.as_u32() {
        Some(offset) => offset.saturating_add(cbuf_access_size(opcode)).min(MAX_CBUF_SIZE),
        None => MAX_CBUF_SIZE,
    };
    let used = &mut info.constant_buffer_used_sizes[index];
    *used = (*used).max(end);
}

fn mark_attribute(state: &mut super::varying::VaryingState, attr: &Value) {
    if let Some(attr) = attr.as_attribute() {
        state.set(attr, true);
    }
}

/// Fold the usage of every instruction in `program` into `program.info`
pub fn collect_shader_info(program: &mut Program) {
    let Program { insts, info, .. } = program;

    for (_, inst) in insts.iter() {
        let args = inst.args();
        match inst.opcode() {
            Opcode::GetCbufU8
            | Opcode::GetCbufS8
            | Opcode::GetCbufU16
            | Opcode::GetCbufS16
            | Opcode::GetCbufU32
            | Opcode::GetCbufF32
            | Opcode::GetCbufU32x2 => mark_cbuf(info, inst.opcode(), &args[0], &args[1]),
            Opcode::GetAttribute | Opcode::GetAttributeU32 => mark_attribute(&mut info.loads, &args[0]),
            Opcode::SetAttribute => mark_attribute(&mut info.stores, &args[0]),
            Opcode::GetAttributeIndexed => info.loads_indexed_attributes = true,
            Opcode::SetAttributeIndexed => info.stores_indexed_attributes = true,
            Opcode::SetFragColor => {
                if let Some(index) = args[0].as_u32() {
                    if (index as usize) < NUM_RENDER_TARGETS {
                        info.stores_frag_color[index as usize] = true;
                    }
                }
            }
            Opcode::SetFragDepth => info.stores_frag_depth = true,
            Opcode::SetSampleMask => info.stores_sample_mask = true,
            Opcode::WorkgroupId => info.uses_workgroup_id = true,
            Opcode::LocalInvocationId => info.uses_local_invocation_id = true,
            Opcode::InvocationId => info.uses_invocation_id = true,
            Opcode::SampleId => info.uses_sample_id = true,
            Opcode::IsHelperInvocation => info.uses_is_helper_invocation = true,
            Opcode::DemoteToHelperInvocation => info.uses_demote_to_helper_invocation = true,
            Opcode::ResolutionDownFactor => info.uses_rescaling_uniform = true,
            Opcode::RenderArea => info.uses_render_area = true,
            Opcode::FSwizzleAdd => info.uses_fswzadd = true,
            Opcode::IAddCarry32 | Opcode::GetCarry => info.uses_cc_carry = true,
            Opcode::ShuffleIndex
            | Opcode::ShuffleUp
            | Opcode::ShuffleDown
            | Opcode::ShuffleButterfly
            | Opcode::ShuffleInBounds => info.uses_subgroup_shuffles = true,
            Opcode::LoadGlobal32
            | Opcode::LoadGlobal64
            | Opcode::LoadGlobal128
            | Opcode::WriteGlobal32
            | Opcode::WriteGlobal64
            | Opcode::WriteGlobal128
            | Opcode::GlobalAtomicIAdd32 => info.uses_global_memory = true,
            Opcode::SharedAtomicInc32 => info.uses_shared_increment = true,
            Opcode::SharedAtomicDec32 => info.uses_shared_decrement = true,
            Opcode::StorageAtomicInc32 => info.uses_global_increment = true,
            Opcode::StorageAtomicDec32 => info.uses_global_decrement = true,
            Opcode::StorageAtomicAddF32 => info.uses_atomic_f32_add = true,
            Opcode::StorageAtomicAddF16x2 => info.uses_atomic_f16x2_add = true,
            Opcode::StorageAtomicMinF16x2 => info.uses_atomic_f16x2_min = true,
            Opcode::StorageAtomicMaxF16x2 => info.uses_atomic_f16x2_max = true,
            Opcode::StorageAtomicAddF32x2 => info.uses_atomic_f32x2_add = true,
            Opcode::StorageAtomicMinF32x2 => info.uses_atomic_f32x2_min = true,
            Opcode::StorageAtomicMaxF32x2 => info.uses_atomic_f32x2_max = true,
            _ => {}
        }
    }

    info.constant_buffer_descriptors = (0..NUM_CONSTANT_BUFFERS as u32)
        .filter(|index| info.constant_buffer_mask & (1 << index) != 0)
        .map(|index| ConstantBufferDescriptor { index, count: 1 })
        .collect();
}
