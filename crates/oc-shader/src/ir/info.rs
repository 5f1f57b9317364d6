//! Aggregate resource and feature usage of a program

use super::attribute::NUM_GENERICS;
use super::varying::VaryingState;
use crate::types::{Interpolation, TextureType};

/// Constant buffer slots per stage
pub const NUM_CONSTANT_BUFFERS: usize = 18;
/// Render targets a fragment program can write
pub const NUM_RENDER_TARGETS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferDescriptor {
    pub index: u32,
    pub count: u32,
}

/// Storage buffer whose address and size live in a constant buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageBufferDescriptor {
    pub cbuf_index: u32,
    pub cbuf_offset: u32,
    pub count: u32,
    pub is_written: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBufferDescriptor {
    pub cbuf_index: u32,
    pub cbuf_offset: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBufferDescriptor {
    pub is_written: bool,
    pub is_read: bool,
    pub cbuf_index: u32,
    pub cbuf_offset: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub ty: TextureType,
    pub is_depth: bool,
    pub is_multisample: bool,
    pub cbuf_index: u32,
    pub cbuf_offset: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub ty: TextureType,
    pub is_written: bool,
    pub is_read: bool,
    pub cbuf_index: u32,
    pub cbuf_offset: u32,
    pub count: u32,
}

/// Everything the backend needs to know about a program up front
#[derive(Debug, Clone)]
pub struct Info {
    pub constant_buffer_mask: u32,
    pub constant_buffer_used_sizes: [u32; NUM_CONSTANT_BUFFERS],
    pub constant_buffer_descriptors: Vec<ConstantBufferDescriptor>,
    pub storage_buffers_descriptors: Vec<StorageBufferDescriptor>,
    pub texture_buffer_descriptors: Vec<TextureBufferDescriptor>,
    pub image_buffer_descriptors: Vec<ImageBufferDescriptor>,
    pub texture_descriptors: Vec<TextureDescriptor>,
    pub image_descriptors: Vec<ImageDescriptor>,
    /// Storage buffers reachable through raw global memory addresses
    pub global_storage_buffer_mask: u32,

    pub loads: VaryingState,
    pub stores: VaryingState,
    pub loads_indexed_attributes: bool,
    pub stores_indexed_attributes: bool,
    pub interpolation: [Interpolation; NUM_GENERICS],
    pub stores_frag_color: [bool; NUM_RENDER_TARGETS],
    pub stores_frag_depth: bool,
    pub stores_sample_mask: bool,

    pub uses_global_memory: bool,
    pub uses_workgroup_id: bool,
    pub uses_local_invocation_id: bool,
    pub uses_invocation_id: bool,
    pub uses_sample_id: bool,
    pub uses_is_helper_invocation: bool,
    pub uses_demote_to_helper_invocation: bool,
    pub uses_global_increment: bool,
    pub uses_global_decrement: bool,
    pub uses_shared_increment: bool,
    pub uses_shared_decrement: bool,
    pub uses_atomic_f32_add: bool,
    pub uses_atomic_f16x2_add: bool,
    pub uses_atomic_f16x2_min: bool,
    pub uses_atomic_f16x2_max: bool,
    pub uses_atomic_f32x2_add: bool,
    pub uses_atomic_f32x2_min: bool,
    pub uses_atomic_f32x2_max: bool,
    pub uses_fswzadd: bool,
    pub uses_subgroup_shuffles: bool,
    /// Carry out of an add is read back through `GetCarry`
    pub uses_cc_carry: bool,
    pub uses_rescaling_uniform: bool,
    pub uses_render_area: bool,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            constant_buffer_mask: 0,
            constant_buffer_used_sizes: [0; NUM_CONSTANT_BUFFERS],
            constant_buffer_descriptors: Vec::new(),
            storage_buffers_descriptors: Vec::new(),
            texture_buffer_descriptors: Vec::new(),
            image_buffer_descriptors: Vec::new(),
            texture_descriptors: Vec::new(),
            image_descriptors: Vec::new(),
            global_storage_buffer_mask: 0,
            loads: VaryingState::default(),
            stores: VaryingState::default(),
            loads_indexed_attributes: false,
            stores_indexed_attributes: false,
            interpolation: [Interpolation::Smooth; NUM_GENERICS],
            stores_frag_color: [false; NUM_RENDER_TARGETS],
            stores_frag_depth: false,
            stores_sample_mask: false,
            uses_global_memory: false,
            uses_workgroup_id: false,
            uses_local_invocation_id: false,
            uses_invocation_id: false,
            uses_sample_id: false,
            uses_is_helper_invocation: false,
            uses_demote_to_helper_invocation: false,
            uses_global_increment: false,
            uses_global_decrement: false,
            uses_shared_increment: false,
            uses_shared_decrement: false,
            uses_atomic_f32_add: false,
            uses_atomic_f16x2_add: false,
            uses_atomic_f16x2_min: false,
            uses_atomic_f16x2_max: false,
            uses_atomic_f32x2_add: false,
            uses_atomic_f32x2_min: false,
            uses_atomic_f32x2_max: false,
            uses_fswzadd: false,
            uses_subgroup_shuffles: false,
            uses_cc_carry: false,
            uses_rescaling_uniform: false,
            uses_render_area: false,
        }
    }
}

impl Info {
    /// Whether storage buffer `index` is reachable through global memory
    pub fn is_global_storage_buffer(&self, index: usize) -> bool {
        index < 32 && self.global_storage_buffer_mask & (1 << index) != 0
    }
}
