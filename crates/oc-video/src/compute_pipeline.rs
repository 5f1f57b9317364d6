//! Compute pipeline objects

use crate::backend::{ComputePipelineDescriptor, FunctionHandle, HostDevice, PipelineStateHandle};
use crate::cache_key::ComputePipelineCacheKey;
use crate::graphics_pipeline::UniformBufferUsage;
use oc_core::PipelineError;
use oc_shader::ir::Info;

/// Compute pipelines have no attachment state, so the state object is
/// created together with the function
pub struct ComputePipeline {
    key: ComputePipelineCacheKey,
    function: FunctionHandle,
    info: Box<Info>,
    uniform_buffers: UniformBufferUsage,
    pipeline_state: PipelineStateHandle,
}

impl ComputePipeline {
    pub fn new(
        device: &dyn HostDevice,
        key: ComputePipelineCacheKey,
        function: FunctionHandle,
        info: Box<Info>,
    ) -> Result<Self, PipelineError> {
        let descriptor = ComputePipelineDescriptor {
            function,
            threads_per_threadgroup: key.threadgroup_size,
        };
        let pipeline_state = device
            .new_compute_pipeline_state(&descriptor)
            .map_err(PipelineError::PipelineState)?;
        Ok(Self {
            key,
            function,
            uniform_buffers: UniformBufferUsage::from_info(&info),
            info,
            pipeline_state,
        })
    }

    pub fn key(&self) -> &ComputePipelineCacheKey {
        &self.key
    }

    pub fn function(&self) -> FunctionHandle {
        self.function
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn uniform_buffers(&self) -> &UniformBufferUsage {
        &self.uniform_buffers
    }

    pub fn pipeline_state(&self) -> PipelineStateHandle {
        self.pipeline_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullDevice;

    #[test]
    fn test_new() {
        let device = NullDevice::new();
        let key = ComputePipelineCacheKey::new(0xABCD, 1024, [64, 1, 1]);
        let pipeline = ComputePipeline::new(&device, key, FunctionHandle(3), Box::default()).unwrap();
        assert_eq!(pipeline.key(), &key);
        assert_eq!(pipeline.function(), FunctionHandle(3));
        assert_eq!(device.compute_pipeline_count(), 1);
    }

    #[test]
    fn test_zero_threadgroup_rejected() {
        let device = NullDevice::new();
        let key = ComputePipelineCacheKey::new(0xABCD, 0, [0, 1, 1]);
        let err = ComputePipeline::new(&device, key, FunctionHandle(3), Box::default()).err();
        assert!(matches!(err, Some(PipelineError::PipelineState(_))));
    }
}
