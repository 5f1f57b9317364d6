//! Stress tests for GPU memory under load

use oc_memory::{GpuMemoryManager, PageFlags, PAGE_SIZE};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_many_small_mappings() {
    let mem = GpuMemoryManager::new();

    for i in 0..100u64 {
        let addr = 0x100_0000 + i * 0x2_0000;
        mem.map(addr, PAGE_SIZE, PageFlags::RW).unwrap();
        mem.write::<u32>(addr, 0xDEADBEEF).unwrap();
    }
    assert_eq!(mem.mapped_pages(), 100);

    for i in 0..100u64 {
        let addr = 0x100_0000 + i * 0x2_0000;
        assert_eq!(mem.read::<u32>(addr).unwrap(), 0xDEADBEEF);
        mem.unmap(addr, PAGE_SIZE).unwrap();
    }
    assert_eq!(mem.mapped_pages(), 0);
}

#[test]
fn test_concurrent_writers() {
    let mem = Arc::new(GpuMemoryManager::new());
    mem.map(0, 0x10_0000, PageFlags::RW).unwrap();

    let num_threads = 4u64;
    let mut handles = vec![];

    for t in 0..num_threads {
        let mem_clone = Arc::clone(&mem);
        handles.push(thread::spawn(move || {
            let base = t * 0x4_0000;
            for i in 0..256u64 {
                mem_clone.write::<u64>(base + i * 8, t << 32 | i).unwrap();
            }
            for i in 0..256u64 {
                assert_eq!(mem_clone.read::<u64>(base + i * 8).unwrap(), t << 32 | i);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_generation_is_monotonic_across_threads() {
    let mem = Arc::new(GpuMemoryManager::new());
    mem.map(0, PAGE_SIZE, PageFlags::RW).unwrap();
    let before = mem.region_generation(0, PAGE_SIZE);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let mem = Arc::clone(&mem);
            thread::spawn(move || {
                for i in 0..64u32 {
                    mem.write::<u32>(t * 4, i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(mem.region_generation(0, PAGE_SIZE) >= before + 4 * 64);
}

proptest! {
    #[test]
    fn prop_block_round_trip(offset in 0u64..0x3000, data in proptest::collection::vec(any::<u8>(), 0..0x1800)) {
        let mem = GpuMemoryManager::new();
        mem.map(0, 0x5000, PageFlags::RW).unwrap();
        mem.write_block(offset, &data).unwrap();
        prop_assert_eq!(mem.read_bytes(offset, data.len()).unwrap(), data);
    }
}
