//! Pipeline cache
//!
//! Graphics lookups first try the pipeline used by the previous draw and
//! the transition it recorded, then the full key map. Keys are rebuilt from
//! the bound channel's registers on every lookup, re-hashing any program
//! whose pages were written, so rewritten code misses without explicit
//! invalidation.
//!
//! Failed builds are cached as `None` until a write invalidates one of the
//! programs they were built from. All methods take `&mut self`; the caller
//! serializes access.

use crate::backend::HostDevice;
use crate::builder::{GraphicsEnvironments, PipelineBuilder};
use crate::cache_key::{ComputePipelineCacheKey, GraphicsPipelineCacheKey};
use crate::channel::{ChannelId, ChannelSetup, ChannelState};
use crate::compute_pipeline::ComputePipeline;
use crate::environment::GuestEnvironment;
use crate::graphics_pipeline::GraphicsPipeline;
use crate::maxwell_to_mtl::FormatTable;
use crate::regs::{ShaderProgram, NUM_PROGRAMS};
use crate::shader_info::ShaderInfo;
use crate::worker::{BuildJob, BuildResult, PipelineWorker};
use bytemuck::Zeroable;
use oc_core::{Config, PipelineError};
use oc_memory::GpuMemoryManager;
use oc_shader::ShaderFrontend;
use std::collections::HashMap;
use std::sync::Arc;

/// Guest address ranges a pipeline was built from
type SourceRanges = Vec<(u64, u64)>;

fn ranges_overlap(ranges: &[(u64, u64)], address: u64, size: u64) -> bool {
    ranges
        .iter()
        .any(|&(start, len)| address < start + len && start < address.saturating_add(size))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub transition_hits: u64,
    pub builds: u64,
    pub failures: u64,
}

pub struct PipelineCache {
    builder: Arc<PipelineBuilder>,
    formats: FormatTable,
    extended_dynamic_state: bool,
    channels: ChannelSetup,

    graphics_key: GraphicsPipelineCacheKey,
    /// Programs behind `graphics_key`
    stage_infos: [Option<ShaderInfo>; NUM_PROGRAMS],
    current_pipeline: Option<Arc<GraphicsPipeline>>,

    graphics_cache: HashMap<GraphicsPipelineCacheKey, Option<Arc<GraphicsPipeline>>>,
    compute_cache: HashMap<ComputePipelineCacheKey, Option<Arc<ComputePipeline>>>,
    failed_graphics: HashMap<GraphicsPipelineCacheKey, SourceRanges>,
    failed_compute: HashMap<ComputePipelineCacheKey, SourceRanges>,
    pending_graphics: HashMap<GraphicsPipelineCacheKey, SourceRanges>,
    pending_compute: HashMap<ComputePipelineCacheKey, SourceRanges>,

    worker: Option<PipelineWorker>,
    stats: CacheStats,
}

impl PipelineCache {
    pub fn new(
        device: Arc<dyn HostDevice>,
        frontend: Arc<dyn ShaderFrontend>,
        config: &Config,
    ) -> Result<Self, PipelineError> {
        let formats = FormatTable::new(device.format_caps());
        tracing::info!("PipelineCache: using device {}", device.name());
        let builder = Arc::new(PipelineBuilder::new(device, frontend, config));
        let worker = if config.shader.async_shader_builds {
            Some(PipelineWorker::new(
                builder.clone(),
                config.shader.shader_worker_threads,
            )?)
        } else {
            None
        };

        Ok(Self {
            builder,
            formats,
            extended_dynamic_state: config.gpu.extended_dynamic_state,
            channels: ChannelSetup::new(),
            graphics_key: GraphicsPipelineCacheKey::zeroed(),
            stage_infos: [None; NUM_PROGRAMS],
            current_pipeline: None,
            graphics_cache: HashMap::new(),
            compute_cache: HashMap::new(),
            failed_graphics: HashMap::new(),
            failed_compute: HashMap::new(),
            pending_graphics: HashMap::new(),
            pending_compute: HashMap::new(),
            worker,
            stats: CacheStats::default(),
        })
    }

    pub fn create_channel(&mut self, id: ChannelId, memory: Arc<GpuMemoryManager>) {
        self.channels.create_channel(id, memory);
    }

    pub fn bind_channel(&mut self, id: ChannelId) -> Result<(), PipelineError> {
        self.channels.bind_channel(id)
    }

    pub fn erase_channel(&mut self, id: ChannelId) {
        self.channels.erase_channel(id);
    }

    /// State of the bound channel, for register updates
    pub fn channel_mut(&mut self) -> Option<&mut ChannelState> {
        self.channels.current_mut()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn formats(&self) -> &FormatTable {
        &self.formats
    }

    /// Number of keys cached, failed ones included
    pub fn graphics_pipeline_count(&self) -> usize {
        self.graphics_cache.len()
    }

    pub fn compute_pipeline_count(&self) -> usize {
        self.compute_cache.len()
    }

    /// Block until background builds have finished, then collect them
    pub fn wait_for_builds(&mut self) {
        if let Some(worker) = &self.worker {
            worker.wait_idle();
        }
        self.drain_worker();
    }

    /// Pipeline for the next draw, `None` when the draw must be skipped
    pub fn current_graphics_pipeline(&mut self) -> Option<Arc<GraphicsPipeline>> {
        let Some(channel) = self.channels.current_mut() else {
            tracing::debug!("PipelineCache: draw without a bound channel");
            return None;
        };
        if let Err(e) = refresh_stages(channel, &mut self.graphics_key, &mut self.stage_infos) {
            tracing::warn!("PipelineCache: skipping draw: {}", e);
            self.current_pipeline = None;
            return None;
        }
        self.graphics_key
            .state
            .refresh(&channel.maxwell3d, self.extended_dynamic_state);
        let key = self.graphics_key;

        if let Some(current) = &self.current_pipeline {
            if current.key() == &key {
                self.stats.hits += 1;
                let current = current.clone();
                return self.built_pipeline(current);
            }
            if let Some(next) = current.next(&key) {
                self.stats.transition_hits += 1;
                tracing::trace!("PipelineCache: transition to 0x{:016x}", key.hash64());
                self.current_pipeline = Some(next.clone());
                return self.built_pipeline(next);
            }
        }
        self.current_graphics_pipeline_slow_path(key)
    }

    fn current_graphics_pipeline_slow_path(
        &mut self,
        key: GraphicsPipelineCacheKey,
    ) -> Option<Arc<GraphicsPipeline>> {
        self.drain_worker();

        let pipeline = match self.graphics_cache.get(&key) {
            Some(Some(pipeline)) => {
                self.stats.hits += 1;
                tracing::debug!("PipelineCache: hit 0x{:016x}", key.hash64());
                pipeline.clone()
            }
            Some(None) => {
                self.stats.hits += 1;
                tracing::warn!("PipelineCache: 0x{:016x} failed to build before", key.hash64());
                self.current_pipeline = None;
                return None;
            }
            None => {
                self.stats.misses += 1;
                tracing::debug!("PipelineCache: miss 0x{:016x}", key.hash64());
                self.build_graphics(key)?
            }
        };

        if let Some(previous) = &self.current_pipeline {
            previous.add_transition(key, &pipeline);
        }
        self.current_pipeline = Some(pipeline.clone());
        self.built_pipeline(pipeline)
    }

    fn build_graphics(&mut self, key: GraphicsPipelineCacheKey) -> Option<Arc<GraphicsPipeline>> {
        if self.pending_graphics.contains_key(&key) {
            return None;
        }
        let ranges: SourceRanges = self
            .stage_infos
            .iter()
            .flatten()
            .map(|info| (info.address, info.size_bytes))
            .collect();
        let mut envs = match self.graphics_environments() {
            Ok(envs) => envs,
            Err(e) => {
                self.insert_graphics(key, Err(e), ranges);
                return None;
            }
        };

        if let Some(worker) = &self.worker {
            if worker.queue(BuildJob::Graphics { key, envs }) {
                self.pending_graphics.insert(key, ranges);
                return None;
            }
            self.stop_worker();
            return self.build_graphics(key);
        }

        let result = self.builder.build_graphics(&key, &mut envs);
        self.insert_graphics(key, result, ranges)
    }

    fn graphics_environments(&mut self) -> Result<Box<GraphicsEnvironments>, PipelineError> {
        let channel = self.channels.current_mut().ok_or(PipelineError::NoChannel)?;
        let mut envs: Box<GraphicsEnvironments> = Box::default();
        for program in ShaderProgram::ALL {
            if let Some(info) = &self.stage_infos[program.index()] {
                envs[program.index()] = Some(GuestEnvironment::graphics(
                    channel.memory.clone(),
                    &channel.maxwell3d,
                    program,
                    info,
                )?);
            }
        }
        Ok(envs)
    }

    fn insert_graphics(
        &mut self,
        key: GraphicsPipelineCacheKey,
        result: Result<GraphicsPipeline, PipelineError>,
        ranges: SourceRanges,
    ) -> Option<Arc<GraphicsPipeline>> {
        match result {
            Ok(pipeline) => {
                self.stats.builds += 1;
                let pipeline = Arc::new(pipeline);
                self.graphics_cache.insert(key, Some(pipeline.clone()));
                Some(pipeline)
            }
            Err(e) => {
                self.stats.failures += 1;
                tracing::error!("PipelineCache: graphics pipeline 0x{:016x} failed: {}", key.hash64(), e);
                self.graphics_cache.insert(key, None);
                self.failed_graphics.insert(key, ranges);
                None
            }
        }
    }

    /// `pipeline` if its state object exists or can be built for the bound
    /// framebuffer
    fn built_pipeline(&self, pipeline: Arc<GraphicsPipeline>) -> Option<Arc<GraphicsPipeline>> {
        let Some(framebuffer) = self.channels.current().and_then(|channel| channel.framebuffer) else {
            tracing::debug!("PipelineCache: no framebuffer bound, skipping draw");
            return None;
        };
        if pipeline.is_built(&framebuffer) {
            return Some(pipeline);
        }
        match pipeline.pipeline_state(self.builder.device().as_ref(), &framebuffer, &self.formats) {
            Ok(_) => Some(pipeline),
            Err(e) => {
                tracing::error!(
                    "PipelineCache: state object for 0x{:016x} failed: {}",
                    pipeline.key().hash64(),
                    e
                );
                None
            }
        }
    }

    /// Pipeline for the next dispatch, `None` when it must be skipped
    pub fn current_compute_pipeline(&mut self) -> Option<Arc<ComputePipeline>> {
        self.drain_worker();

        let channel = self.channels.current_mut()?;
        let address = channel.compute.program_address();
        let info = match channel.shader_info(address) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("PipelineCache: skipping dispatch: {}", e);
                return None;
            }
        };
        let key = ComputePipelineCacheKey::new(
            info.unique_hash,
            channel.compute.shared_alloc,
            channel.compute.block_dim,
        );

        match self.compute_cache.get(&key) {
            Some(Some(pipeline)) => {
                self.stats.hits += 1;
                return Some(pipeline.clone());
            }
            Some(None) => {
                self.stats.hits += 1;
                tracing::warn!("PipelineCache: 0x{:016x} failed to build before", key.hash64());
                return None;
            }
            None => {}
        }
        self.stats.misses += 1;
        if self.pending_compute.contains_key(&key) {
            return None;
        }

        let ranges = vec![(info.address, info.size_bytes)];
        let mut env = match GuestEnvironment::compute(channel.memory.clone(), &channel.compute, &info) {
            Ok(env) => env,
            Err(e) => return self.insert_compute(key, Err(e), ranges),
        };
        if let Some(worker) = &self.worker {
            if worker.queue(BuildJob::Compute {
                key,
                env: Box::new(env),
            }) {
                self.pending_compute.insert(key, ranges);
                return None;
            }
            self.stop_worker();
            return self.current_compute_pipeline();
        }
        let result = self.builder.build_compute(&key, &mut env);
        self.insert_compute(key, result, ranges)
    }

    fn insert_compute(
        &mut self,
        key: ComputePipelineCacheKey,
        result: Result<ComputePipeline, PipelineError>,
        ranges: SourceRanges,
    ) -> Option<Arc<ComputePipeline>> {
        match result {
            Ok(pipeline) => {
                self.stats.builds += 1;
                let pipeline = Arc::new(pipeline);
                self.compute_cache.insert(key, Some(pipeline.clone()));
                Some(pipeline)
            }
            Err(e) => {
                self.stats.failures += 1;
                tracing::error!("PipelineCache: compute pipeline 0x{:016x} failed: {}", key.hash64(), e);
                self.compute_cache.insert(key, None);
                self.failed_compute.insert(key, ranges);
                None
            }
        }
    }

    /// Guest memory in `[address, address + size)` was written
    pub fn invalidate_region(&mut self, address: u64, size: u64) {
        for channel in self.channels.iter_mut() {
            channel.invalidate_region(address, size);
        }

        let graphics_cache = &mut self.graphics_cache;
        self.failed_graphics.retain(|key, ranges| {
            let stale = ranges_overlap(ranges, address, size);
            if stale {
                graphics_cache.remove(key);
            }
            !stale
        });
        let compute_cache = &mut self.compute_cache;
        self.failed_compute.retain(|key, ranges| {
            let stale = ranges_overlap(ranges, address, size);
            if stale {
                compute_cache.remove(key);
            }
            !stale
        });
    }

    /// Fall back to building on the calling thread once the workers are gone
    fn stop_worker(&mut self) {
        tracing::error!("PipelineCache: shader workers exited, building synchronously");
        self.drain_worker();
        self.worker = None;
    }

    fn drain_worker(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };
        for result in worker.drain() {
            match result {
                BuildResult::Graphics { key, result } => {
                    let ranges = self.pending_graphics.remove(&key).unwrap_or_default();
                    self.insert_graphics(key, result, ranges);
                }
                BuildResult::Compute { key, result } => {
                    let ranges = self.pending_compute.remove(&key).unwrap_or_default();
                    self.insert_compute(key, result, ranges);
                }
            }
        }
    }
}

/// Hash every enabled program of the bound channel into `key`
fn refresh_stages(
    channel: &mut ChannelState,
    key: &mut GraphicsPipelineCacheKey,
    infos: &mut [Option<ShaderInfo>; NUM_PROGRAMS],
) -> Result<(), PipelineError> {
    for program in ShaderProgram::ALL {
        let index = program.index();
        if !channel.maxwell3d.is_program_enabled(program) {
            key.unique_hashes[index] = 0;
            infos[index] = None;
            continue;
        }
        let address = channel.maxwell3d.program_address(program);
        let info = channel.shader_info(address)?;
        key.unique_hashes[index] = info.unique_hash;
        infos[index] = Some(info);
    }
    if infos[ShaderProgram::VertexB.index()].is_none() {
        return Err(PipelineError::NoVertexProgram);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_overlap() {
        let ranges = vec![(0x1000, 0x100), (0x4000, 0x10)];
        assert!(ranges_overlap(&ranges, 0x10F0, 0x20));
        assert!(ranges_overlap(&ranges, 0x4008, 1));
        assert!(!ranges_overlap(&ranges, 0x1100, 0x100));
        assert!(!ranges_overlap(&ranges, 0, 0x1000));
        assert!(!ranges_overlap(&[], 0, u64::MAX));
    }
}
