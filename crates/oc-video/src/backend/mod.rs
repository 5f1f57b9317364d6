//! Host device abstraction
//!
//! The pipeline cache reaches Metal only through [`HostDevice`]: compiling
//! MSL into functions and turning functions plus fixed state into pipeline
//! state objects. Handles are opaque to the cache.

pub mod null;

use crate::maxwell_to_mtl::{
    FormatCaps, MtlPixelFormat, MtlPrimitiveTopologyClass, MtlVertexFormat, MtlVertexStepFunction,
};
use crate::regs::NUM_RENDER_TARGETS;

/// Compiled shader function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle(pub u64);

/// Render or compute pipeline state object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineStateHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAttachmentDescriptor {
    pub pixel_format: MtlPixelFormat,
    pub blending_enabled: bool,
    /// RGBA write mask, bit 0 is red
    pub write_mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeDescriptor {
    pub index: u32,
    pub format: MtlVertexFormat,
    pub buffer_index: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayoutDescriptor {
    pub buffer_index: u32,
    /// `None` when the stride is supplied per draw
    pub stride: Option<u32>,
    pub step_function: MtlVertexStepFunction,
    pub step_rate: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RenderPipelineDescriptor {
    pub vertex_function: Option<FunctionHandle>,
    pub fragment_function: Option<FunctionHandle>,
    pub color_attachments: [Option<ColorAttachmentDescriptor>; NUM_RENDER_TARGETS],
    pub depth_stencil_format: Option<MtlPixelFormat>,
    pub vertex_attributes: Vec<VertexAttributeDescriptor>,
    pub vertex_layouts: Vec<VertexLayoutDescriptor>,
    pub input_primitive_topology: Option<MtlPrimitiveTopologyClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputePipelineDescriptor {
    pub function: FunctionHandle,
    pub threads_per_threadgroup: [u32; 3],
}

/// Metal device operations the pipeline cache needs
///
/// Calls may block for as long as the host compiler takes. Errors carry the
/// host's diagnostic text.
pub trait HostDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Optional pixel format support
    fn format_caps(&self) -> FormatCaps;

    /// Compile MSL source and look up `entry_point` in the resulting library
    fn compile_function(&self, source: &str, entry_point: &str) -> Result<FunctionHandle, String>;

    fn new_render_pipeline_state(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<PipelineStateHandle, String>;

    fn new_compute_pipeline_state(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<PipelineStateHandle, String>;
}
