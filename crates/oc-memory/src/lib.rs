//! Guest GPU memory for oxidized-maxwell
//!
//! This crate provides the sparse GPU virtual address space that shader
//! programs and constant buffers are read from, with per-page write
//! generations so cached shader hashes can notice modified code.

pub mod manager;
pub mod pages;

pub use manager::GpuMemoryManager;
pub use pages::{page_index, pages_in_range, PageFlags, GPU_ADDRESS_BITS, PAGE_BITS, PAGE_MASK, PAGE_SIZE};
