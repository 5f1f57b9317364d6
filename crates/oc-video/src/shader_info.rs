//! Guest program discovery and content hashing
//!
//! A program's length is not stored anywhere: it is found by scanning for
//! the self-branch the compiler places after the last instruction. The
//! content hash covers the header and every instruction up to and including
//! that terminator, re-read from guest memory whenever a page it covers has
//! been written since the last hash.

use oc_core::{MemoryError, PipelineError};
use oc_memory::pages::{PAGE_MASK, PAGE_SIZE};
use oc_memory::GpuMemoryManager;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;

/// Shader program header preceding the first instruction
pub const PROGRAM_HEADER_SIZE: u64 = 0x50;
/// Scan limit after the header
pub const MAXIMUM_PROGRAM_SIZE: u64 = 0x10_0000;

const INST_SIZE: u64 = 8;
const SELF_BRANCH_A: u64 = 0xE240_0FFF_FF87_000F;
const SELF_BRANCH_B: u64 = 0xE240_0FFF_FF07_000F;

/// Identity of one guest program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderInfo {
    pub address: u64,
    pub unique_hash: u64,
    /// Header plus instructions, terminator included
    pub size_bytes: u64,
    /// Write generation of the covered pages when the hash was taken
    generation: u64,
}

impl ShaderInfo {
    /// Hash the program at `address` from current memory
    pub fn compute(memory: &GpuMemoryManager, address: u64) -> Result<Self, PipelineError> {
        let size_bytes =
            find_program_size(memory, address)?.ok_or(PipelineError::UnterminatedProgram(address))?;
        let generation = memory.region_generation(address, size_bytes);
        let code = memory.read_bytes(address, size_bytes as usize)?;
        Ok(Self {
            address,
            unique_hash: xxh3_64(&code),
            size_bytes,
            generation,
        })
    }

    pub fn overlaps(&self, address: u64, size: u64) -> bool {
        address < self.address + self.size_bytes && self.address < address.saturating_add(size)
    }
}

/// Byte length of the program at `address`, `None` when no terminator is
/// found within [`MAXIMUM_PROGRAM_SIZE`]
pub fn find_program_size(memory: &GpuMemoryManager, address: u64) -> Result<Option<u64>, MemoryError> {
    let code_start = address + PROGRAM_HEADER_SIZE;
    let mut words = vec![0u64; (PAGE_SIZE / INST_SIZE) as usize];
    let mut offset = 0;
    while offset < MAXIMUM_PROGRAM_SIZE {
        // Stop each read at a page boundary so a program ending just before
        // an unmapped page is still found
        let cur = code_start + offset;
        let to_page_end = PAGE_SIZE - (cur & PAGE_MASK);
        let count = (to_page_end / INST_SIZE)
            .max(1)
            .min((MAXIMUM_PROGRAM_SIZE - offset) / INST_SIZE) as usize;
        let chunk = &mut words[..count];
        memory.read_block(cur, bytemuck::cast_slice_mut(chunk))?;

        let terminator = chunk.iter().position(|word| {
            let inst = u64::from_le(*word);
            inst == SELF_BRANCH_A || inst == SELF_BRANCH_B
        });
        if let Some(index) = terminator {
            return Ok(Some(PROGRAM_HEADER_SIZE + offset + (index as u64 + 1) * INST_SIZE));
        }
        offset += count as u64 * INST_SIZE;
    }
    Ok(None)
}

/// Per-address memo of [`ShaderInfo`] for one guest address space
#[derive(Debug, Default)]
pub struct ShaderInfoCache {
    entries: HashMap<u64, ShaderInfo>,
}

impl ShaderInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Info for the program at `address`, re-hashed if any covered page was
    /// written since it was last computed
    pub fn get(&mut self, memory: &GpuMemoryManager, address: u64) -> Result<ShaderInfo, PipelineError> {
        if let Some(info) = self.entries.get(&address) {
            if memory.region_generation(address, info.size_bytes) == info.generation {
                return Ok(*info);
            }
            tracing::trace!("ShaderInfo: 0x{:010x} written since last hash", address);
        }

        let info = ShaderInfo::compute(memory, address)?;
        memory.set_cached(address, info.size_bytes, true);
        tracing::debug!(
            "ShaderInfo: 0x{:010x} size=0x{:x} hash=0x{:016x}",
            address,
            info.size_bytes,
            info.unique_hash
        );
        self.entries.insert(address, info);
        Ok(info)
    }

    /// Forget every program overlapping the range; returns the dropped entries
    pub fn invalidate_region(&mut self, memory: &GpuMemoryManager, address: u64, size: u64) -> Vec<ShaderInfo> {
        let mut removed = Vec::new();
        self.entries.retain(|_, info| {
            if info.overlaps(address, size) {
                removed.push(*info);
                false
            } else {
                true
            }
        });
        for info in &removed {
            memory.set_cached(info.address, info.size_bytes, false);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oc_memory::pages::PageFlags;

    const BASE: u64 = 0x20_0000;

    fn memory_with_program(code: &[u64]) -> GpuMemoryManager {
        let memory = GpuMemoryManager::new();
        memory.map(BASE, 0x4000, PageFlags::RW).unwrap();
        for (index, word) in code.iter().enumerate() {
            memory
                .write(BASE + PROGRAM_HEADER_SIZE + index as u64 * INST_SIZE, *word)
                .unwrap();
        }
        memory
    }

    #[test]
    fn test_program_size() {
        let memory = memory_with_program(&[0x1111, 0x2222, SELF_BRANCH_A]);
        assert_eq!(
            find_program_size(&memory, BASE).unwrap(),
            Some(PROGRAM_HEADER_SIZE + 3 * INST_SIZE)
        );

        let memory = memory_with_program(&[SELF_BRANCH_B]);
        assert_eq!(
            find_program_size(&memory, BASE).unwrap(),
            Some(PROGRAM_HEADER_SIZE + INST_SIZE)
        );
    }

    #[test]
    fn test_program_ending_before_unmapped_page() {
        let memory = GpuMemoryManager::new();
        memory.map(BASE, PAGE_SIZE, PageFlags::RW).unwrap();
        let last_word = BASE + PAGE_SIZE - INST_SIZE;
        memory.write(last_word, SELF_BRANCH_A).unwrap();
        assert_eq!(
            find_program_size(&memory, BASE).unwrap(),
            Some(PAGE_SIZE)
        );
    }

    #[test]
    fn test_unterminated_program() {
        let memory = memory_with_program(&[0x1111]);
        // Scanning runs off the mapping before finding a terminator
        let err = ShaderInfo::compute(&memory, BASE).unwrap_err();
        assert!(matches!(err, PipelineError::Memory(MemoryError::Unmapped(_))));
    }

    #[test]
    fn test_rehash_after_write() {
        let memory = memory_with_program(&[0x1111, SELF_BRANCH_A]);
        let mut cache = ShaderInfoCache::new();
        let first = cache.get(&memory, BASE).unwrap();
        assert_eq!(cache.get(&memory, BASE).unwrap(), first);
        assert!(memory.page_flags(BASE).unwrap().contains(PageFlags::CACHED));

        // Same bytes, new generation: same hash
        memory.write(BASE + PROGRAM_HEADER_SIZE, 0x1111u64).unwrap();
        let same = cache.get(&memory, BASE).unwrap();
        assert_eq!(same.unique_hash, first.unique_hash);

        memory.write(BASE + PROGRAM_HEADER_SIZE, 0x3333u64).unwrap();
        let changed = cache.get(&memory, BASE).unwrap();
        assert_ne!(changed.unique_hash, first.unique_hash);
    }

    #[test]
    fn test_invalidate_region() {
        let memory = memory_with_program(&[0x1111, SELF_BRANCH_A]);
        let mut cache = ShaderInfoCache::new();
        let info = cache.get(&memory, BASE).unwrap();

        assert!(cache.invalidate_region(&memory, BASE + info.size_bytes, 0x100).is_empty());
        let removed = cache.invalidate_region(&memory, BASE + 0x10, 4);
        assert_eq!(removed, vec![info]);
        assert!(cache.is_empty());
        assert!(!memory.page_flags(BASE).unwrap().contains(PageFlags::CACHED));
    }
}
