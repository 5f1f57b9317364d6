//! Pipeline cache keys
//!
//! Keys are compared and hashed as raw bytes. Build them from
//! `Zeroable::zeroed()` so padding and unused tails never differ between
//! otherwise identical states.

use crate::fixed_state::FixedPipelineState;
use crate::regs::NUM_PROGRAMS;
use bytemuck::{Pod, Zeroable};
use std::hash::{Hash, Hasher};
use std::mem::{offset_of, size_of};
use xxhash_rust::xxh3::xxh3_64;

/// Key of a graphics pipeline: per-slot program hashes plus fixed state
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GraphicsPipelineCacheKey {
    /// Content hash of each program slot, 0 when the slot is disabled
    pub unique_hashes: [u64; NUM_PROGRAMS],
    pub state: FixedPipelineState,
}

impl GraphicsPipelineCacheKey {
    /// Meaningful prefix length in bytes
    pub fn size(&self) -> usize {
        offset_of!(GraphicsPipelineCacheKey, state) + self.state.size()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::bytes_of(self)[..self.size()]
    }

    pub fn hash64(&self) -> u64 {
        xxh3_64(self.as_bytes())
    }

    /// Number of program slots in use
    pub fn active_stages(&self) -> usize {
        self.unique_hashes.iter().filter(|hash| **hash != 0).count()
    }
}

impl PartialEq for GraphicsPipelineCacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for GraphicsPipelineCacheKey {}

impl Hash for GraphicsPipelineCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash64());
    }
}

/// Key of a compute pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ComputePipelineCacheKey {
    pub unique_hash: u64,
    pub shared_memory_size: u32,
    pub threadgroup_size: [u32; 3],
}

impl ComputePipelineCacheKey {
    pub fn new(unique_hash: u64, shared_memory_size: u32, threadgroup_size: [u32; 3]) -> Self {
        let mut key = Self::zeroed();
        key.unique_hash = unique_hash;
        key.shared_memory_size = shared_memory_size;
        key.threadgroup_size = threadgroup_size;
        key
    }

    pub fn size(&self) -> usize {
        size_of::<Self>()
    }

    pub fn hash64(&self) -> u64 {
        xxh3_64(bytemuck::bytes_of(self))
    }
}

impl PartialEq for ComputePipelineCacheKey {
    fn eq(&self, other: &Self) -> bool {
        bytemuck::bytes_of(self) == bytemuck::bytes_of(other)
    }
}

impl Eq for ComputePipelineCacheKey {}

impl Hash for ComputePipelineCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{Maxwell3dRegs, PrimitiveTopology};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn key_from(regs: &Maxwell3dRegs, hashes: [u64; NUM_PROGRAMS], extended: bool) -> GraphicsPipelineCacheKey {
        let mut key = GraphicsPipelineCacheKey::zeroed();
        key.unique_hashes = hashes;
        key.state.refresh(regs, extended);
        key
    }

    #[test]
    fn test_vertex_fragment_key() {
        let regs = Maxwell3dRegs::default();
        let a = key_from(&regs, [0xAAAA, 0, 0, 0, 0xBBBB], false);
        let b = key_from(&regs, [0xAAAA, 0, 0, 0, 0xBBBB], false);
        assert_eq!(a, b);
        assert_eq!(a.hash64(), b.hash64());
        assert_eq!(a.active_stages(), 2);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn test_unrelated_registers_do_not_split_keys() {
        let mut regs = Maxwell3dRegs::default();
        let a = key_from(&regs, [1, 0, 0, 0, 2], false);
        // Point size only matters for point topologies
        regs.point_size = 16.0;
        regs.vertex_streams[3].address = 0xDEAD_0000;
        let b = key_from(&regs, [1, 0, 0, 0, 2], false);
        assert_eq!(a, b);

        regs.topology = PrimitiveTopology::Points;
        let c = key_from(&regs, [1, 0, 0, 0, 2], false);
        assert_ne!(a, c);
    }

    #[test]
    fn test_dynamic_state_ignored_when_extended() {
        let mut regs = Maxwell3dRegs::default();
        let a = key_from(&regs, [1, 0, 0, 0, 2], true);
        regs.depth_test_enable = true;
        let b = key_from(&regs, [1, 0, 0, 0, 2], true);
        assert_eq!(a, b);
        assert!(a.size() < size_of::<GraphicsPipelineCacheKey>());

        let c = key_from(&regs, [1, 0, 0, 0, 2], false);
        let d = key_from(&Maxwell3dRegs::default(), [1, 0, 0, 0, 2], false);
        assert_ne!(c, d);
    }

    #[test]
    fn test_trailing_bytes_beyond_size_are_ignored() {
        let regs = Maxwell3dRegs::default();
        let a = key_from(&regs, [7, 0, 0, 0, 9], true);
        let mut b = a;
        b.state.dynamic_state.raw1 = 0xFFFF;
        assert_eq!(a, b);
        assert_eq!(a.hash64(), b.hash64());
    }

    #[test]
    fn test_compute_key() {
        let a = ComputePipelineCacheKey::new(0x1234, 0, [1, 1, 1]);
        let b = ComputePipelineCacheKey::new(0x1234, 0, [1, 1, 1]);
        assert_eq!(a, b);
        assert_eq!(a.hash64(), b.hash64());
        assert_ne!(a, ComputePipelineCacheKey::new(0x1234, 0, [2, 1, 1]));
        assert_ne!(a, ComputePipelineCacheKey::new(0x1234, 256, [1, 1, 1]));
        assert_eq!(a.size(), 24);
    }

    proptest! {
        #[test]
        fn prop_equal_keys_hash_equal(
            hashes in proptest::array::uniform5(any::<u64>()),
            topology in 0u32..15,
            point_size in any::<f32>(),
            extended in any::<bool>(),
        ) {
            let mut regs = Maxwell3dRegs::default();
            regs.topology = PrimitiveTopology::from_raw(topology).unwrap();
            regs.point_size = point_size;
            let a = key_from(&regs, hashes, extended);
            let b = key_from(&regs, hashes, extended);
            prop_assert_eq!(a, a);
            prop_assert_eq!(a, b);
            prop_assert_eq!(b, a);
            prop_assert_eq!(a.hash64(), b.hash64());
        }

        #[test]
        fn prop_differing_hashes_split_keys(
            hashes in proptest::array::uniform5(any::<u64>()),
            slot in 0usize..NUM_PROGRAMS,
            delta in 1u64..,
        ) {
            let regs = Maxwell3dRegs::default();
            let a = key_from(&regs, hashes, false);
            let mut changed = hashes;
            changed[slot] = changed[slot].wrapping_add(delta);
            let b = key_from(&regs, changed, false);
            prop_assert_ne!(a, b);
        }
    }
}
