//! Guest state a frontend reads while translating a program

use crate::ir::Program;
use crate::profile::HostTranslateInfo;
use crate::types::{Stage, TextureType};
use oc_core::ShaderError;

/// View of guest memory and register state for one shader stage
pub trait Environment {
    fn stage(&self) -> Stage;

    /// Guest address of the first instruction after the program header
    fn start_address(&self) -> u32;

    /// 64-bit instruction word at `address`, relative to the code base
    fn read_instruction(&mut self, address: u32) -> u64;

    fn read_cbuf_value(&mut self, cbuf_index: u32, cbuf_offset: u32) -> u32;

    /// Dimensionality of the texture descriptor behind `handle`
    fn read_texture_type(&mut self, handle: u32) -> TextureType;

    fn local_memory_size(&self) -> u32;

    fn shared_memory_size(&self) -> u32;

    fn workgroup_size(&self) -> [u32; 3];
}

/// Decodes guest machine code into IR
///
/// The decoder itself lives outside this crate; the pipeline cache only
/// depends on this seam.
pub trait ShaderFrontend: Send + Sync {
    fn translate(
        &self,
        env: &mut dyn Environment,
        host_info: &HostTranslateInfo,
    ) -> Result<Program, ShaderError>;
}
