//! Null device for testing and headless runs
//!
//! Accepts any source that defines the requested entry point, hands out
//! sequential handles and records what it was asked to do.

use super::{
    ComputePipelineDescriptor, FunctionHandle, HostDevice, PipelineStateHandle,
    RenderPipelineDescriptor,
};
use crate::maxwell_to_mtl::FormatCaps;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct NullDevice {
    caps: FormatCaps,
    next_handle: AtomicU64,
    compile_count: AtomicU64,
    render_pipeline_count: AtomicU64,
    compute_pipeline_count: AtomicU64,
    /// Sources containing any of these fail to compile
    rejected: Mutex<Vec<String>>,
    sources: Mutex<Vec<String>>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::with_caps(FormatCaps::default())
    }

    pub fn with_caps(caps: FormatCaps) -> Self {
        Self {
            caps,
            next_handle: AtomicU64::new(1),
            compile_count: AtomicU64::new(0),
            render_pipeline_count: AtomicU64::new(0),
            compute_pipeline_count: AtomicU64::new(0),
            rejected: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Make every later compilation of a source containing `needle` fail
    pub fn reject_sources_containing(&self, needle: impl Into<String>) {
        self.rejected.lock().push(needle.into());
    }

    /// Compilation attempts, failed ones included
    pub fn compile_count(&self) -> u64 {
        self.compile_count.load(Ordering::Acquire)
    }

    pub fn render_pipeline_count(&self) -> u64 {
        self.render_pipeline_count.load(Ordering::Acquire)
    }

    pub fn compute_pipeline_count(&self) -> u64 {
        self.compute_pipeline_count.load(Ordering::Acquire)
    }

    /// Every source passed to `compile_function`, in call order
    pub fn compiled_sources(&self) -> Vec<String> {
        self.sources.lock().clone()
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::AcqRel)
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice for NullDevice {
    fn name(&self) -> &str {
        "Null"
    }

    fn format_caps(&self) -> FormatCaps {
        self.caps
    }

    fn compile_function(&self, source: &str, entry_point: &str) -> Result<FunctionHandle, String> {
        self.compile_count.fetch_add(1, Ordering::AcqRel);
        self.sources.lock().push(source.to_string());

        if let Some(needle) = self.rejected.lock().iter().find(|needle| source.contains(needle.as_str())) {
            return Err(format!("program_source: error: rejected construct '{}'", needle));
        }
        if !source.contains(&format!(" {}(", entry_point)) {
            return Err(format!("function '{}' not found in library", entry_point));
        }
        Ok(FunctionHandle(self.next_handle()))
    }

    fn new_render_pipeline_state(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<PipelineStateHandle, String> {
        if descriptor.vertex_function.is_none() {
            return Err("render pipeline requires a vertex function".to_string());
        }
        for (index, attachment) in descriptor.color_attachments.iter().enumerate() {
            if let Some(attachment) = attachment {
                if attachment.pixel_format.is_depth_stencil() {
                    return Err(format!(
                        "color attachment {} has depth format {:?}",
                        index, attachment.pixel_format
                    ));
                }
            }
        }
        self.render_pipeline_count.fetch_add(1, Ordering::AcqRel);
        Ok(PipelineStateHandle(self.next_handle()))
    }

    fn new_compute_pipeline_state(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<PipelineStateHandle, String> {
        if descriptor.threads_per_threadgroup.iter().product::<u32>() == 0 {
            return Err("threadgroup size must be non-zero".to_string());
        }
        self.compute_pipeline_count.fetch_add(1, Ordering::AcqRel);
        Ok(PipelineStateHandle(self.next_handle()))
    }
}
