//! Graphics pipeline objects
//!
//! Functions are compiled when the pipeline is created; the host pipeline
//! state object additionally depends on the attachment formats and is only
//! built once a draw arrives with a framebuffer bound.

use crate::backend::{
    ColorAttachmentDescriptor, FunctionHandle, HostDevice, PipelineStateHandle,
    RenderPipelineDescriptor, VertexAttributeDescriptor, VertexLayoutDescriptor,
};
use crate::cache_key::GraphicsPipelineCacheKey;
use crate::maxwell_to_mtl::{
    primitive_topology_class, vertex_format, vertex_step_function, FormatTable, MtlVertexFormat,
    PixelFormat,
};
use crate::regs::{ShaderProgram, NUM_PROGRAMS, NUM_RENDER_TARGETS, NUM_VERTEX_ATTRIBUTES};
use oc_core::PipelineError;
use oc_shader::bindings::{MAX_VERTEX_BUFFERS, VERTEX_BUFFER_SLOT_BASE};
use oc_shader::ir::{Info, NUM_CONSTANT_BUFFERS};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Attachment formats of the bound render targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Framebuffer {
    pub color: [Option<PixelFormat>; NUM_RENDER_TARGETS],
    pub depth: Option<PixelFormat>,
}

impl Framebuffer {
    pub fn is_empty(&self) -> bool {
        self.depth.is_none() && self.color.iter().all(Option::is_none)
    }
}

/// Constant buffer bindings one stage needs at draw time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformBufferUsage {
    pub mask: u32,
    /// Bytes read from each buffer, rounded up to 16
    pub sizes: [u32; NUM_CONSTANT_BUFFERS],
}

impl UniformBufferUsage {
    pub(crate) fn from_info(info: &Info) -> Self {
        let mut sizes = [0; NUM_CONSTANT_BUFFERS];
        for (size, used) in sizes.iter_mut().zip(&info.constant_buffer_used_sizes) {
            *size = used.next_multiple_of(16);
        }
        Self {
            mask: info.constant_buffer_mask,
            sizes,
        }
    }
}

pub struct GraphicsPipeline {
    key: GraphicsPipelineCacheKey,
    functions: [Option<FunctionHandle>; NUM_PROGRAMS],
    infos: [Option<Box<Info>>; NUM_PROGRAMS],
    uniform_buffers: [UniformBufferUsage; NUM_PROGRAMS],
    /// Built state objects, one per attachment configuration seen
    pipeline_states: Mutex<Vec<(Framebuffer, PipelineStateHandle)>>,
    /// Pipeline used for the draw that followed the last use of this one
    transition: Mutex<Option<(GraphicsPipelineCacheKey, Weak<GraphicsPipeline>)>>,
}

impl GraphicsPipeline {
    pub fn new(
        key: GraphicsPipelineCacheKey,
        functions: [Option<FunctionHandle>; NUM_PROGRAMS],
        infos: [Option<Box<Info>>; NUM_PROGRAMS],
    ) -> Self {
        let uniform_buffers = std::array::from_fn(|index| {
            infos[index]
                .as_deref()
                .map(UniformBufferUsage::from_info)
                .unwrap_or_default()
        });
        Self {
            key,
            functions,
            infos,
            uniform_buffers,
            pipeline_states: Mutex::new(Vec::new()),
            transition: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &GraphicsPipelineCacheKey {
        &self.key
    }

    pub fn function(&self, program: ShaderProgram) -> Option<FunctionHandle> {
        self.functions[program.index()]
    }

    pub fn info(&self, program: ShaderProgram) -> Option<&Info> {
        self.infos[program.index()].as_deref()
    }

    pub fn uniform_buffers(&self, program: ShaderProgram) -> &UniformBufferUsage {
        &self.uniform_buffers[program.index()]
    }

    /// Follow the transition recorded for `key`, if it is still alive
    pub fn next(&self, key: &GraphicsPipelineCacheKey) -> Option<Arc<GraphicsPipeline>> {
        let transition = self.transition.lock();
        match transition.as_ref() {
            Some((next_key, next)) if next_key == key => next.upgrade(),
            _ => None,
        }
    }

    pub fn add_transition(&self, key: GraphicsPipelineCacheKey, next: &Arc<GraphicsPipeline>) {
        *self.transition.lock() = Some((key, Arc::downgrade(next)));
    }

    pub fn is_built(&self, framebuffer: &Framebuffer) -> bool {
        self.pipeline_states
            .lock()
            .iter()
            .any(|(built_for, _)| built_for == framebuffer)
    }

    /// State object for drawing into `framebuffer`, built on first use
    pub fn pipeline_state(
        &self,
        device: &dyn HostDevice,
        framebuffer: &Framebuffer,
        formats: &FormatTable,
    ) -> Result<PipelineStateHandle, PipelineError> {
        let mut states = self.pipeline_states.lock();
        if let Some((_, handle)) = states.iter().find(|(built_for, _)| built_for == framebuffer) {
            return Ok(*handle);
        }

        let descriptor = self.render_descriptor(framebuffer, formats)?;
        let handle = device
            .new_render_pipeline_state(&descriptor)
            .map_err(PipelineError::PipelineState)?;
        tracing::debug!(
            "GraphicsPipeline: built state object for key 0x{:016x}",
            self.key.hash64()
        );
        states.push((*framebuffer, handle));
        Ok(handle)
    }

    pub fn render_descriptor(
        &self,
        framebuffer: &Framebuffer,
        formats: &FormatTable,
    ) -> Result<RenderPipelineDescriptor, PipelineError> {
        let state = &self.key.state;
        let mut descriptor = RenderPipelineDescriptor {
            vertex_function: self.function(ShaderProgram::VertexB),
            fragment_function: self.function(ShaderProgram::Fragment),
            input_primitive_topology: Some(primitive_topology_class(state.topology())),
            ..Default::default()
        };

        if let Some(info) = self.info(ShaderProgram::VertexB) {
            for index in 0..NUM_VERTEX_ATTRIBUTES {
                let attribute = state.attribute(index);
                if !info.loads.generic(index) || !attribute.is_enabled() {
                    continue;
                }
                let (Some(ty), Some(size)) = (attribute.ty(), attribute.size()) else {
                    continue;
                };
                let format = vertex_format(ty, size);
                if format == MtlVertexFormat::Invalid {
                    continue;
                }
                let stream = attribute.buffer();
                if stream >= MAX_VERTEX_BUFFERS {
                    return Err(PipelineError::PipelineState(format!(
                        "vertex stream {} has no buffer slot",
                        stream
                    )));
                }
                let buffer_index = VERTEX_BUFFER_SLOT_BASE + stream;
                descriptor.vertex_attributes.push(VertexAttributeDescriptor {
                    index: index as u32,
                    format,
                    buffer_index,
                    offset: attribute.offset(),
                });
                if descriptor.vertex_layouts.iter().all(|layout| layout.buffer_index != buffer_index) {
                    let stride = (!state.extended_dynamic_state())
                        .then(|| u32::from(state.dynamic_state.vertex_strides[stream as usize]));
                    let divisor = state.binding_divisor(stream as usize);
                    descriptor.vertex_layouts.push(VertexLayoutDescriptor {
                        buffer_index,
                        stride,
                        step_function: vertex_step_function(divisor),
                        step_rate: divisor.max(1),
                    });
                }
            }
        }

        for (index, format) in framebuffer.color.iter().enumerate() {
            let Some(format) = format else {
                continue;
            };
            let info = formats.info(*format);
            if !info.can_be_render_target || info.pixel_format.is_depth_stencil() {
                return Err(PipelineError::PipelineState(format!(
                    "{:?} cannot be bound as render target {}",
                    format, index
                )));
            }
            let blend = state.color_blend(index);
            descriptor.color_attachments[index] = Some(ColorAttachmentDescriptor {
                pixel_format: info.pixel_format,
                blending_enabled: blend.enabled,
                write_mask: blend.color_write_mask,
            });
        }

        if let Some(format) = framebuffer.depth {
            let pixel_format = formats.info(format).pixel_format;
            if !pixel_format.is_depth_stencil() {
                return Err(PipelineError::PipelineState(format!(
                    "{:?} cannot be bound as depth target",
                    format
                )));
            }
            descriptor.depth_stencil_format = Some(pixel_format);
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullDevice;
    use crate::maxwell_to_mtl::{MtlPixelFormat, MtlVertexStepFunction, DEFAULT_FORMAT_TABLE};
    use crate::regs::{Maxwell3dRegs, VertexAttribute, VertexAttributeSize, VertexAttributeType};
    use bytemuck::Zeroable;
    use oc_shader::ir::Attribute;

    fn key_for(regs: &Maxwell3dRegs, extended: bool) -> GraphicsPipelineCacheKey {
        let mut key = GraphicsPipelineCacheKey::zeroed();
        key.unique_hashes[ShaderProgram::VertexB.index()] = 1;
        key.unique_hashes[ShaderProgram::Fragment.index()] = 2;
        key.state.refresh(regs, extended);
        key
    }

    fn make_pipeline(key: GraphicsPipelineCacheKey, loads: &[usize]) -> GraphicsPipeline {
        let mut vertex_info = Info::default();
        for index in loads {
            for element in 0..4 {
                vertex_info.loads.set(Attribute::generic(*index, element), true);
            }
        }
        let mut functions = [None; NUM_PROGRAMS];
        functions[ShaderProgram::VertexB.index()] = Some(FunctionHandle(10));
        functions[ShaderProgram::Fragment.index()] = Some(FunctionHandle(11));
        let mut infos: [Option<Box<Info>>; NUM_PROGRAMS] = Default::default();
        infos[ShaderProgram::VertexB.index()] = Some(Box::new(vertex_info));
        infos[ShaderProgram::Fragment.index()] = Some(Box::default());
        GraphicsPipeline::new(key, functions, infos)
    }

    fn color_framebuffer(format: PixelFormat) -> Framebuffer {
        let mut framebuffer = Framebuffer::default();
        framebuffer.color[0] = Some(format);
        framebuffer
    }

    #[test]
    fn test_vertex_input_descriptor() {
        let mut regs = Maxwell3dRegs::default();
        regs.vertex_attribs[0] =
            VertexAttribute::new(0, 0, VertexAttributeSize::R32G32B32A32, VertexAttributeType::Float);
        regs.vertex_attribs[1] =
            VertexAttribute::new(0, 16, VertexAttributeSize::R8G8B8A8, VertexAttributeType::UNorm);
        // Enabled in registers but never read by the shader
        regs.vertex_attribs[2] =
            VertexAttribute::new(1, 0, VertexAttributeSize::R32, VertexAttributeType::Float);
        regs.vertex_streams[0].enabled = true;
        regs.vertex_streams[0].stride = 20;

        let pipeline = make_pipeline(key_for(&regs, false), &[0, 1]);
        let descriptor = pipeline
            .render_descriptor(&Framebuffer::default(), &DEFAULT_FORMAT_TABLE)
            .unwrap();
        assert_eq!(descriptor.vertex_attributes.len(), 2);
        assert_eq!(descriptor.vertex_attributes[1].offset, 16);
        assert_eq!(descriptor.vertex_attributes[1].format, MtlVertexFormat::UChar4Normalized);
        assert_eq!(descriptor.vertex_layouts.len(), 1);
        assert_eq!(descriptor.vertex_layouts[0].buffer_index, VERTEX_BUFFER_SLOT_BASE);
        assert_eq!(descriptor.vertex_layouts[0].stride, Some(20));
        assert_eq!(descriptor.vertex_layouts[0].step_function, MtlVertexStepFunction::PerVertex);

        // Strides come with each draw under extended dynamic state
        let pipeline = make_pipeline(key_for(&regs, true), &[0, 1]);
        let descriptor = pipeline
            .render_descriptor(&Framebuffer::default(), &DEFAULT_FORMAT_TABLE)
            .unwrap();
        assert_eq!(descriptor.vertex_layouts[0].stride, None);
    }

    #[test]
    fn test_instanced_stream() {
        let mut regs = Maxwell3dRegs::default();
        regs.vertex_attribs[0] =
            VertexAttribute::new(2, 0, VertexAttributeSize::R32G32, VertexAttributeType::Float);
        regs.vertex_streams[2].enabled = true;
        regs.vertex_streams[2].stride = 8;
        regs.vertex_streams[2].divisor = 4;

        let pipeline = make_pipeline(key_for(&regs, false), &[0]);
        let descriptor = pipeline
            .render_descriptor(&Framebuffer::default(), &DEFAULT_FORMAT_TABLE)
            .unwrap();
        let layout = descriptor.vertex_layouts[0];
        assert_eq!(layout.buffer_index, VERTEX_BUFFER_SLOT_BASE + 2);
        assert_eq!(layout.step_function, MtlVertexStepFunction::PerInstance);
        assert_eq!(layout.step_rate, 4);
    }

    #[test]
    fn test_attachment_formats() {
        let pipeline = make_pipeline(key_for(&Maxwell3dRegs::default(), false), &[]);
        let mut framebuffer = color_framebuffer(PixelFormat::B8G8R8A8Unorm);
        framebuffer.depth = Some(PixelFormat::D32Float);
        let descriptor = pipeline
            .render_descriptor(&framebuffer, &DEFAULT_FORMAT_TABLE)
            .unwrap();
        let attachment = descriptor.color_attachments[0].unwrap();
        assert_eq!(attachment.pixel_format, MtlPixelFormat::BGRA8Unorm);
        assert_eq!(attachment.write_mask, 0xF);
        assert_eq!(descriptor.depth_stencil_format, Some(MtlPixelFormat::Depth32Float));

        let compressed = color_framebuffer(PixelFormat::Bc1RgbaUnorm);
        assert!(pipeline.render_descriptor(&compressed, &DEFAULT_FORMAT_TABLE).is_err());
        let depth_as_color = color_framebuffer(PixelFormat::D16Unorm);
        assert!(pipeline.render_descriptor(&depth_as_color, &DEFAULT_FORMAT_TABLE).is_err());
    }

    #[test]
    fn test_state_built_once_per_framebuffer() {
        let device = NullDevice::new();
        let pipeline = make_pipeline(key_for(&Maxwell3dRegs::default(), false), &[]);
        let rgba = color_framebuffer(PixelFormat::A8B8G8R8Unorm);
        let bgra = color_framebuffer(PixelFormat::B8G8R8A8Unorm);

        assert!(!pipeline.is_built(&rgba));
        let first = pipeline.pipeline_state(&device, &rgba, &DEFAULT_FORMAT_TABLE).unwrap();
        assert!(pipeline.is_built(&rgba));
        assert_eq!(
            pipeline.pipeline_state(&device, &rgba, &DEFAULT_FORMAT_TABLE).unwrap(),
            first
        );
        assert_eq!(device.render_pipeline_count(), 1);

        assert!(!pipeline.is_built(&bgra));
        pipeline.pipeline_state(&device, &bgra, &DEFAULT_FORMAT_TABLE).unwrap();
        assert_eq!(device.render_pipeline_count(), 2);
    }

    #[test]
    fn test_transition() {
        let regs = Maxwell3dRegs::default();
        let first = Arc::new(make_pipeline(key_for(&regs, false), &[]));
        let mut other_regs = Maxwell3dRegs::default();
        other_regs.early_z = true;
        let second_key = key_for(&other_regs, false);
        let second = Arc::new(make_pipeline(second_key, &[]));

        assert!(first.next(&second_key).is_none());
        first.add_transition(second_key, &second);
        assert!(Arc::ptr_eq(&first.next(&second_key).unwrap(), &second));
        assert!(first.next(first.key()).is_none());

        // Transitions never keep their target alive
        drop(second);
        assert!(first.next(&second_key).is_none());
    }

    #[test]
    fn test_uniform_buffer_usage() {
        let mut info = Info::default();
        info.constant_buffer_mask = 0b101;
        info.constant_buffer_used_sizes[0] = 20;
        info.constant_buffer_used_sizes[2] = 64;
        let usage = UniformBufferUsage::from_info(&info);
        assert_eq!(usage.mask, 0b101);
        assert_eq!(usage.sizes[0], 32);
        assert_eq!(usage.sizes[2], 64);
        assert_eq!(usage.sizes[1], 0);
    }
}
