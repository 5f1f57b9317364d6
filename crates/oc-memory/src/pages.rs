//! Page flags and address helpers

use bitflags::bitflags;

/// Guest page granularity (4 KiB small pages)
pub const PAGE_BITS: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_BITS;
pub const PAGE_MASK: u64 = PAGE_SIZE - 1;

/// Width of the GPU virtual address space
pub const GPU_ADDRESS_BITS: u32 = 40;

bitflags! {
    /// Page protection and tracking flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageFlags: u32 {
        /// Page is readable
        const READ    = 0b0000_0001;
        /// Page is writable
        const WRITE   = 0b0000_0010;
        /// Page holds bytes that a cached shader hash was computed from
        const CACHED  = 0b0000_0100;

        /// Read + Write
        const RW = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Index of the page containing `addr`
#[inline]
pub fn page_index(addr: u64) -> u64 {
    addr >> PAGE_BITS
}

/// Iterate the page indices overlapped by `[addr, addr + size)`
pub fn pages_in_range(addr: u64, size: u64) -> impl Iterator<Item = u64> {
    let first = page_index(addr);
    let last = if size == 0 {
        first
    } else {
        page_index(addr.saturating_add(size - 1))
    };
    let count = if size == 0 { 0 } else { last - first + 1 };
    (0..count).map(move |i| first + i)
}
