//! Guest environments handed to the shader frontend
//!
//! Program code is captured when the environment is created, so a
//! translation that runs later (or on a worker thread) sees exactly the bytes
//! that were hashed into the cache key.

use crate::regs::{ComputeRegs, ConstBufferBinding, Maxwell3dRegs, ShaderProgram};
use crate::shader_info::{ShaderInfo, PROGRAM_HEADER_SIZE};
use oc_core::PipelineError;
use oc_memory::GpuMemoryManager;
use oc_shader::{Environment, Stage, TextureType};
use std::sync::Arc;

/// Size of one texture image control entry
const TIC_ENTRY_SIZE: u64 = 0x20;

pub struct GuestEnvironment {
    stage: Stage,
    memory: Arc<GpuMemoryManager>,
    /// Base that instruction addresses are relative to
    program_base: u64,
    /// Offset of the program header from `program_base`
    start_offset: u32,
    /// Header and instructions, terminator included
    code: Vec<u64>,
    cbufs: Vec<ConstBufferBinding>,
    tex_header_address: u64,
    local_memory_size: u32,
    shared_memory_size: u32,
    workgroup_size: [u32; 3],
    unique_hash: u64,
}

impl GuestEnvironment {
    pub fn graphics(
        memory: Arc<GpuMemoryManager>,
        regs: &Maxwell3dRegs,
        program: ShaderProgram,
        info: &ShaderInfo,
    ) -> Result<Self, PipelineError> {
        let code = capture_code(&memory, info)?;
        let local_memory_size = header_local_memory_size(&code);
        Ok(Self {
            stage: program.stage(),
            memory,
            program_base: regs.program_region,
            start_offset: regs.shader_programs[program.index()].offset,
            code,
            cbufs: regs.const_buffers[program.index()].to_vec(),
            tex_header_address: regs.tex_header_address,
            local_memory_size,
            shared_memory_size: 0,
            workgroup_size: [1, 1, 1],
            unique_hash: info.unique_hash,
        })
    }

    pub fn compute(
        memory: Arc<GpuMemoryManager>,
        regs: &ComputeRegs,
        info: &ShaderInfo,
    ) -> Result<Self, PipelineError> {
        let code = capture_code(&memory, info)?;
        Ok(Self {
            stage: Stage::Compute,
            memory,
            program_base: regs.code_address,
            start_offset: regs.program_start,
            code,
            cbufs: regs.const_buffers.to_vec(),
            tex_header_address: regs.tex_header_address,
            local_memory_size: regs.local_memory_size,
            shared_memory_size: regs.shared_alloc,
            workgroup_size: regs.block_dim,
            unique_hash: info.unique_hash,
        })
    }

    pub fn unique_hash(&self) -> u64 {
        self.unique_hash
    }

    /// Captured program bytes, header included
    pub fn code(&self) -> &[u64] {
        &self.code
    }
}

fn capture_code(memory: &GpuMemoryManager, info: &ShaderInfo) -> Result<Vec<u64>, PipelineError> {
    let mut code = vec![0u64; (info.size_bytes / 8) as usize];
    memory.read_block(info.address, bytemuck::cast_slice_mut(&mut code))?;
    for word in &mut code {
        *word = u64::from_le(*word);
    }
    Ok(code)
}

/// Local memory declared by a graphics program header, rounded up to 16 bytes
fn header_local_memory_size(code: &[u64]) -> u32 {
    let common0 = code.first().copied().unwrap_or(0);
    let common2 = code.get(1).copied().unwrap_or(0);
    let low = ((common0 >> 32) & 0xFF_FFFF) as u32;
    let high = (common2 & 0xFF) as u32;
    let size = low | (high << 24);
    size.saturating_add(15) & !15
}

fn texture_type_from_tic(raw: u32) -> Option<TextureType> {
    Some(match raw {
        0 => TextureType::Color1D,
        1 | 7 => TextureType::Color2D,
        2 => TextureType::Color3D,
        3 => TextureType::ColorCube,
        4 => TextureType::ColorArray1D,
        5 => TextureType::ColorArray2D,
        6 => TextureType::Buffer,
        8 => TextureType::ColorArrayCube,
        _ => return None,
    })
}

impl Environment for GuestEnvironment {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn start_address(&self) -> u32 {
        self.start_offset + PROGRAM_HEADER_SIZE as u32
    }

    fn read_instruction(&mut self, address: u32) -> u64 {
        let captured = address
            .checked_sub(self.start_offset)
            .map(|offset| (offset / 8) as usize)
            .and_then(|index| self.code.get(index).copied());
        if let Some(inst) = captured {
            return inst;
        }
        // Outside the scanned range, e.g. a frontend peeking past the terminator
        match self.memory.read::<u64>(self.program_base + u64::from(address)) {
            Ok(inst) => u64::from_le(inst),
            Err(e) => {
                tracing::warn!("GuestEnvironment: instruction read at 0x{:x} failed: {}", address, e);
                0
            }
        }
    }

    fn read_cbuf_value(&mut self, cbuf_index: u32, cbuf_offset: u32) -> u32 {
        let Some(binding) = self.cbufs.get(cbuf_index as usize).filter(|binding| binding.enabled) else {
            tracing::warn!("GuestEnvironment: read from unbound cbuf{}", cbuf_index);
            return 0;
        };
        if cbuf_offset.saturating_add(4) > binding.size {
            tracing::warn!(
                "GuestEnvironment: cbuf{} offset 0x{:x} beyond size 0x{:x}",
                cbuf_index,
                cbuf_offset,
                binding.size
            );
            return 0;
        }
        match self.memory.read::<u32>(binding.address + u64::from(cbuf_offset)) {
            Ok(value) => u32::from_le(value),
            Err(e) => {
                tracing::warn!("GuestEnvironment: cbuf{} read failed: {}", cbuf_index, e);
                0
            }
        }
    }

    fn read_texture_type(&mut self, handle: u32) -> TextureType {
        let index = u64::from(handle & 0xF_FFFF);
        let word4 = self
            .memory
            .read::<u32>(self.tex_header_address + index * TIC_ENTRY_SIZE + 16)
            .map(u32::from_le);
        match word4.ok().and_then(|word| texture_type_from_tic((word >> 23) & 0xF)) {
            Some(ty) => ty,
            None => {
                tracing::warn!("GuestEnvironment: invalid texture header for handle 0x{:x}", handle);
                TextureType::Color2D
            }
        }
    }

    fn local_memory_size(&self) -> u32 {
        self.local_memory_size
    }

    fn shared_memory_size(&self) -> u32 {
        self.shared_memory_size
    }

    fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader_info::ShaderInfoCache;
    use oc_memory::PageFlags;

    const REGION: u64 = 0x40_0000;
    const TERMINATOR: u64 = 0xE240_0FFF_FF87_000F;

    fn setup() -> (Arc<GpuMemoryManager>, Maxwell3dRegs) {
        let memory = Arc::new(GpuMemoryManager::new());
        memory.map(REGION, 0x10000, PageFlags::RW).unwrap();
        let mut regs = Maxwell3dRegs::default();
        regs.program_region = REGION;
        let slot = ShaderProgram::Fragment.index();
        regs.shader_programs[slot].enabled = true;
        regs.shader_programs[slot].offset = 0x100;
        (memory, regs)
    }

    #[test]
    fn test_captured_code() {
        let (memory, regs) = setup();
        let start = REGION + 0x100;
        // 0x230 bytes of local memory in the header
        memory.write(start, 0x0000_0230_0000_0000u64).unwrap();
        memory.write(start + PROGRAM_HEADER_SIZE, 0x1234u64).unwrap();
        memory.write(start + PROGRAM_HEADER_SIZE + 8, TERMINATOR).unwrap();

        let info = ShaderInfoCache::new().get(&memory, start).unwrap();
        let mut env = GuestEnvironment::graphics(memory.clone(), &regs, ShaderProgram::Fragment, &info).unwrap();
        assert_eq!(env.stage(), Stage::Fragment);
        assert_eq!(env.start_address(), 0x150);
        assert_eq!(env.read_instruction(0x150), 0x1234);
        assert_eq!(env.local_memory_size(), 0x230);

        // Later writes do not leak into a captured environment
        memory.write(start + PROGRAM_HEADER_SIZE, 0x9999u64).unwrap();
        assert_eq!(env.read_instruction(0x150), 0x1234);
    }

    #[test]
    fn test_cbuf_reads() {
        let (memory, mut regs) = setup();
        let start = REGION + 0x100;
        memory.write(start + PROGRAM_HEADER_SIZE, TERMINATOR).unwrap();
        memory.write(REGION + 0x8004, 0xCAFEu32).unwrap();
        regs.const_buffers[ShaderProgram::Fragment.index()][1] = ConstBufferBinding {
            enabled: true,
            address: REGION + 0x8000,
            size: 0x100,
        };

        let info = ShaderInfoCache::new().get(&memory, start).unwrap();
        let mut env = GuestEnvironment::graphics(memory, &regs, ShaderProgram::Fragment, &info).unwrap();
        assert_eq!(env.read_cbuf_value(1, 4), 0xCAFE);
        assert_eq!(env.read_cbuf_value(1, 0x100), 0);
        assert_eq!(env.read_cbuf_value(2, 0), 0);
    }

    #[test]
    fn test_texture_type() {
        let (memory, mut regs) = setup();
        let start = REGION + 0x100;
        memory.write(start + PROGRAM_HEADER_SIZE, TERMINATOR).unwrap();
        regs.tex_header_address = REGION + 0xA000;
        // Entry 2 is a 2D array
        memory.write(REGION + 0xA000 + 2 * TIC_ENTRY_SIZE + 16, 5u32 << 23).unwrap();

        let info = ShaderInfoCache::new().get(&memory, start).unwrap();
        let mut env = GuestEnvironment::graphics(memory, &regs, ShaderProgram::Fragment, &info).unwrap();
        assert_eq!(env.read_texture_type(2), TextureType::ColorArray2D);
        assert_eq!(env.read_texture_type(0), TextureType::Color1D);
    }
}
