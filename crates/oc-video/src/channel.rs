//! Per-channel GPU state
//!
//! Each channel has its own register file and address space. Pipelines are
//! shared between channels; only the state the keys are built from is not.

use crate::graphics_pipeline::Framebuffer;
use crate::regs::{ComputeRegs, Maxwell3dRegs};
use crate::shader_info::{ShaderInfo, ShaderInfoCache};
use oc_core::PipelineError;
use oc_memory::GpuMemoryManager;
use std::collections::HashMap;
use std::sync::Arc;

pub type ChannelId = u32;

pub struct ChannelState {
    pub memory: Arc<GpuMemoryManager>,
    pub maxwell3d: Maxwell3dRegs,
    pub compute: ComputeRegs,
    /// Render targets of the next draw, `None` until the guest binds any
    pub framebuffer: Option<Framebuffer>,
    shader_infos: ShaderInfoCache,
}

impl ChannelState {
    pub fn new(memory: Arc<GpuMemoryManager>) -> Self {
        Self {
            memory,
            maxwell3d: Maxwell3dRegs::default(),
            compute: ComputeRegs::default(),
            framebuffer: None,
            shader_infos: ShaderInfoCache::new(),
        }
    }

    pub fn shader_info(&mut self, address: u64) -> Result<ShaderInfo, PipelineError> {
        self.shader_infos.get(&self.memory, address)
    }

    pub fn invalidate_region(&mut self, address: u64, size: u64) -> Vec<ShaderInfo> {
        self.shader_infos.invalidate_region(&self.memory, address, size)
    }
}

#[derive(Default)]
pub struct ChannelSetup {
    channels: HashMap<ChannelId, ChannelState>,
    current: Option<ChannelId>,
}

impl ChannelSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel; an existing channel with the same id is replaced
    pub fn create_channel(&mut self, id: ChannelId, memory: Arc<GpuMemoryManager>) {
        tracing::debug!("Channel {}: created", id);
        if self.channels.insert(id, ChannelState::new(memory)).is_some() {
            tracing::warn!("Channel {}: replaced existing channel", id);
        }
    }

    pub fn bind_channel(&mut self, id: ChannelId) -> Result<(), PipelineError> {
        if !self.channels.contains_key(&id) {
            return Err(PipelineError::NoChannel);
        }
        self.current = Some(id);
        Ok(())
    }

    pub fn erase_channel(&mut self, id: ChannelId) {
        if self.channels.remove(&id).is_some() {
            tracing::debug!("Channel {}: erased", id);
        }
        if self.current == Some(id) {
            self.current = None;
        }
    }

    pub fn current_id(&self) -> Option<ChannelId> {
        self.current
    }

    pub fn current(&self) -> Option<&ChannelState> {
        self.current.and_then(|id| self.channels.get(&id))
    }

    pub fn current_mut(&mut self) -> Option<&mut ChannelState> {
        self.current.and_then(|id| self.channels.get_mut(&id))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelState> {
        self.channels.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let memory = Arc::new(GpuMemoryManager::new());
        let mut setup = ChannelSetup::new();
        assert!(setup.current().is_none());
        assert!(matches!(setup.bind_channel(1), Err(PipelineError::NoChannel)));

        setup.create_channel(1, memory.clone());
        setup.create_channel(2, memory);
        setup.bind_channel(2).unwrap();
        assert_eq!(setup.current_id(), Some(2));

        setup.current_mut().unwrap().maxwell3d.early_z = true;
        setup.bind_channel(1).unwrap();
        assert!(!setup.current().unwrap().maxwell3d.early_z);

        setup.erase_channel(1);
        assert!(setup.current().is_none());
        assert!(setup.bind_channel(2).is_ok());
    }
}
