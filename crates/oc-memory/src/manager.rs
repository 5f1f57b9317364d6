//! GPU memory manager implementation

use crate::pages::{page_index, pages_in_range, PageFlags, GPU_ADDRESS_BITS, PAGE_MASK, PAGE_SIZE};
use bytemuck::Pod;
use oc_core::error::MemoryError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One guest page
struct Page {
    data: Box<[u8]>,
    flags: PageFlags,
    /// Value of the global write counter at the last write to this page
    generation: u64,
}

impl Page {
    fn new(flags: PageFlags) -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE as usize].into_boxed_slice(),
            flags,
            generation: 0,
        }
    }
}

/// Sparse GPU virtual address space.
///
/// Pages are created on `map` and zero-filled. Every write stamps the touched
/// pages with a fresh value of a global write counter, so a consumer that
/// recorded [`GpuMemoryManager::region_generation`] can later tell whether any
/// byte in the region may have changed.
pub struct GpuMemoryManager {
    pages: RwLock<HashMap<u64, Page>>,
    write_counter: AtomicU64,
}

impl GpuMemoryManager {
    /// Create an empty address space
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            write_counter: AtomicU64::new(0),
        }
    }

    fn check_range(addr: u64, size: u64) -> Result<(), MemoryError> {
        let end = addr.checked_add(size).ok_or(MemoryError::OutOfRange { addr, size })?;
        if end > (1u64 << GPU_ADDRESS_BITS) {
            return Err(MemoryError::OutOfRange { addr, size });
        }
        Ok(())
    }

    /// Map `[addr, addr + size)`; already mapped pages keep their contents
    pub fn map(&self, addr: u64, size: u64, flags: PageFlags) -> Result<(), MemoryError> {
        Self::check_range(addr, size)?;
        let mut pages = self.pages.write();
        for index in pages_in_range(addr, size) {
            pages.entry(index).or_insert_with(|| Page::new(flags)).flags |= flags;
        }
        tracing::trace!("GpuMemory: mapped 0x{:010x}+0x{:x}", addr, size);
        Ok(())
    }

    /// Unmap `[addr, addr + size)`
    pub fn unmap(&self, addr: u64, size: u64) -> Result<(), MemoryError> {
        Self::check_range(addr, size)?;
        let mut pages = self.pages.write();
        for index in pages_in_range(addr, size) {
            pages.remove(&index);
        }
        Ok(())
    }

    /// Check whether every page of the range is mapped
    pub fn is_mapped(&self, addr: u64, size: u64) -> bool {
        let pages = self.pages.read();
        pages_in_range(addr, size.max(1)).all(|index| pages.contains_key(&index))
    }

    /// Copy guest bytes into `out`
    pub fn read_block(&self, addr: u64, out: &mut [u8]) -> Result<(), MemoryError> {
        let size = out.len() as u64;
        Self::check_range(addr, size)?;
        let pages = self.pages.read();
        let mut done = 0usize;
        while done < out.len() {
            let cur = addr + done as u64;
            let page = pages
                .get(&page_index(cur))
                .filter(|page| page.flags.contains(PageFlags::READ))
                .ok_or(MemoryError::Unmapped(cur))?;
            let offset = (cur & PAGE_MASK) as usize;
            let chunk = (PAGE_SIZE as usize - offset).min(out.len() - done);
            out[done..done + chunk].copy_from_slice(&page.data[offset..offset + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Read `size` bytes into a new buffer
    pub fn read_bytes(&self, addr: u64, size: usize) -> Result<Vec<u8>, MemoryError> {
        let mut out = vec![0u8; size];
        self.read_block(addr, &mut out)?;
        Ok(out)
    }

    /// Copy `data` into guest memory, bumping the generation of every touched page
    pub fn write_block(&self, addr: u64, data: &[u8]) -> Result<(), MemoryError> {
        let size = data.len() as u64;
        Self::check_range(addr, size)?;
        let mut pages = self.pages.write();

        // Validate first so a failed write leaves memory untouched
        for index in pages_in_range(addr, size) {
            match pages.get(&index) {
                Some(page) if page.flags.contains(PageFlags::WRITE) => {}
                _ => return Err(MemoryError::Unmapped(index << crate::pages::PAGE_BITS)),
            }
        }

        let generation = self.write_counter.fetch_add(1, Ordering::AcqRel) + 1;
        let mut done = 0usize;
        while done < data.len() {
            let cur = addr + done as u64;
            let Some(page) = pages.get_mut(&page_index(cur)) else {
                return Err(MemoryError::Unmapped(cur));
            };
            let offset = (cur & PAGE_MASK) as usize;
            let chunk = (PAGE_SIZE as usize - offset).min(data.len() - done);
            page.data[offset..offset + chunk].copy_from_slice(&data[done..done + chunk]);
            page.generation = generation;
            done += chunk;
        }
        Ok(())
    }

    /// Read a plain-old-data value (little endian, as the guest stores it)
    #[inline]
    pub fn read<T: Pod>(&self, addr: u64) -> Result<T, MemoryError> {
        let mut value = T::zeroed();
        self.read_block(addr, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Write a plain-old-data value
    #[inline]
    pub fn write<T: Pod>(&self, addr: u64, value: T) -> Result<(), MemoryError> {
        self.write_block(addr, bytemuck::bytes_of(&value))
    }

    /// Latest write generation over the pages of a region.
    ///
    /// Unmapped pages count as generation 0. The value only grows, so a
    /// changed result means at least one page of the region was written.
    pub fn region_generation(&self, addr: u64, size: u64) -> u64 {
        let pages = self.pages.read();
        pages_in_range(addr, size)
            .filter_map(|index| pages.get(&index).map(|page| page.generation))
            .max()
            .unwrap_or(0)
    }

    /// Mark or unmark pages as backing cached shader code
    pub fn set_cached(&self, addr: u64, size: u64, cached: bool) {
        let mut pages = self.pages.write();
        for index in pages_in_range(addr, size) {
            if let Some(page) = pages.get_mut(&index) {
                page.flags.set(PageFlags::CACHED, cached);
            }
        }
    }

    /// Flags of the page containing `addr`
    pub fn page_flags(&self, addr: u64) -> Option<PageFlags> {
        self.pages.read().get(&page_index(addr)).map(|page| page.flags)
    }

    /// Number of mapped pages
    pub fn mapped_pages(&self) -> usize {
        self.pages.read().len()
    }
}

impl Default for GpuMemoryManager {
    fn default() -> Self {
        Self::new()
    }
}
