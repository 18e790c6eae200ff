// SPDX-License-Identifier: MIT
//! Physical memory.
//!
//! Bring-up happens in two steps. [`MemoryManager::init_heap`] opens the heap window right after
//! the kernel image from linker-provided bounds, so the device tree parser can allocate. Once the
//! tree is parsed, [`MemoryManager::init`] builds the page frame pool from its memory nodes.

pub mod allocator;
mod address;
mod frame_pool;
mod heap;
mod layout;
mod page;
#[cfg(test)]
pub(crate) mod testing;

use core::alloc::Layout;
use core::fmt;

use crate::dtb::{DeviceTree, Region};
use crate::sync::interface::Mutex;
use crate::sync::SpinLock;

use frame_pool::FramePool;
use heap::KernelHeap;

pub use address::PhysicalAddress;
pub use layout::KernelLayout;
pub use page::MemoryPage;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------
const PAGE_SHIFT: usize = 12;

/// The page size in bytes, 4 KiB.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    AlreadyInitialized,
    NotInitialized,
    NoMemoryNode,
    MalformedMemoryNode,
    NoUsableMemory,
    OutOfMemory,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::AlreadyInitialized => "memory manager already initialised",
            Self::NotInitialized => "memory manager not initialised",
            Self::NoMemoryNode => "device tree has no memory node",
            Self::MalformedMemoryNode => "memory node has no usable reg property",
            Self::NoUsableMemory => "no usable memory above the heap window",
            Self::OutOfMemory => "out of memory",
        };
        f.write_str(msg)
    }
}

/// Frame pool counters; `allocated_frames + free_frames == total_frames`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub total_frames: usize,
    pub allocated_frames: usize,
    pub free_frames: usize,
}

pub struct MemoryManager {
    inner: SpinLock<MemoryManagerInner>,
}

//--------------------------------------------------------------------------------------------------
// Private definitions
//--------------------------------------------------------------------------------------------------
struct MemoryManagerInner {
    layout: Option<KernelLayout>,
    heap: Option<KernelHeap>,
    pool: Option<FramePool>,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------
impl MemoryManager {
    pub const fn new() -> Self {
        Self {
            inner: SpinLock::new(MemoryManagerInner {
                layout: None,
                heap: None,
                pool: None,
            }),
        }
    }

    /// Opens the heap window above the kernel image.
    ///
    /// # Safety
    ///
    /// The memory between `layout.heap_start()` and `layout.pool_floor()` must be identity
    /// mapped and otherwise unused.
    pub unsafe fn init_heap(&self, layout: KernelLayout) -> Result<(), MemoryError> {
        self.inner.lock(|inner| {
            if inner.heap.is_some() {
                return Err(MemoryError::AlreadyInitialized);
            }

            inner.layout = Some(layout);
            inner.heap = Some(KernelHeap::new(layout.heap_start(), layout.pool_floor()));
            Ok(())
        })?;

        info!(
            "mem: kernel {:#x}..{:#x}, heap window {:#x}..{:#x}",
            layout.kernel_start,
            layout.kernel_end,
            layout.heap_start(),
            layout.pool_floor()
        );
        Ok(())
    }

    /// Builds the page frame pool from the memory nodes of `dt`.
    ///
    /// The pool gets every RAM frame above the heap window except the reservation block, the
    /// children of `/reserved-memory` and the blob itself. The heap is capped at the end of the
    /// RAM region it sits in.
    ///
    /// # Safety
    ///
    /// All RAM described by `dt` above the heap window must be identity mapped and unused by
    /// anything but this manager from now on.
    pub unsafe fn init(&self, dt: &DeviceTree) -> Result<(), MemoryError> {
        let layout = self.inner.lock(|inner| {
            if inner.pool.is_some() {
                return Err(MemoryError::AlreadyInitialized);
            }
            inner.layout.ok_or(MemoryError::NotInitialized)
        })?;

        // Everything that allocates happens before the lock is taken again.
        if dt.memory_nodes().next().is_none() {
            return Err(MemoryError::NoMemoryNode);
        }
        let ram = dt.memory_regions().ok_or(MemoryError::MalformedMemoryNode)?;
        if ram.is_empty() {
            return Err(MemoryError::MalformedMemoryNode);
        }
        let mut reserved = dt.reserved_regions();
        reserved.push(dt.blob_region());

        let heap_start = layout.heap_start() as u64;
        let heap_region_end = ram
            .iter()
            .find(|r| r.base <= heap_start && heap_start < r.end())
            .map(Region::end);

        let (stats, bitmap, overhead) = self.inner.lock(|inner| {
            if inner.pool.is_some() {
                return Err(MemoryError::AlreadyInitialized);
            }

            let pool = FramePool::build(&ram, &reserved, layout.pool_floor())?;
            if let (Some(heap), Some(end)) = (inner.heap.as_mut(), heap_region_end) {
                heap.restrict(usize::try_from(end).unwrap_or(usize::MAX));
            }

            let summary = (stats_of(&pool), pool.bitmap_address(), pool.overhead());
            inner.pool = Some(pool);
            Ok(summary)
        })?;

        if heap_region_end.is_none() {
            warn!("mem: heap window lies outside every memory node");
        }
        info!(
            "mem: {} RAM region(s), {} reserved, {} frames free, bitmap at {:#x} ({} bytes)",
            ram.len(),
            reserved.len(),
            stats.free_frames,
            bitmap.0,
            overhead
        );
        Ok(())
    }

    /// Hands out a zeroed page frame, or `None` once the pool is empty.
    pub fn new_page(&self) -> Option<MemoryPage<'_>> {
        let frame = self
            .inner
            .lock(|inner| inner.pool.as_mut().and_then(|pool| pool.alloc()))?;

        unsafe { core::ptr::write_bytes(frame.as_mut_ptr(), 0, PAGE_SIZE) };
        Some(MemoryPage::new(self, frame))
    }

    /// Current end of the kernel heap, `0` before [`Self::init_heap`].
    pub fn get_heap_end(&self) -> usize {
        self.inner
            .lock(|inner| inner.heap.as_ref().map_or(0, |heap| heap.end()))
    }

    /// Grows the heap by exactly `delta` bytes and returns the new end.
    ///
    /// Fails, leaving the end where it was, if the heap would run into the frame pool or off the
    /// end of its RAM region.
    pub fn change_heap_end(&self, delta: usize) -> Result<usize, MemoryError> {
        let result = self.inner.lock(|inner| {
            inner
                .heap
                .as_mut()
                .ok_or(MemoryError::NotInitialized)?
                .grow(delta)
        });

        if let Err(e) = result {
            warn!("mem: cannot grow heap by {:#x}: {}", delta, e);
        }
        result
    }

    /// Bytes spent on the frame bitmap.
    pub fn get_memory_overhead(&self) -> usize {
        self.inner
            .lock(|inner| inner.pool.as_ref().map_or(0, |pool| pool.overhead()))
    }

    pub fn stats(&self) -> MemoryStats {
        self.inner
            .lock(|inner| inner.pool.as_ref().map(stats_of).unwrap_or_default())
    }

    /// Upper bound `change_heap_end` can reach.
    pub fn heap_limit(&self) -> usize {
        self.inner
            .lock(|inner| inner.heap.as_ref().map_or(0, |heap| heap.limit()))
    }

    /// Bytes handed out from the heap so far.
    pub fn heap_used(&self) -> usize {
        self.inner
            .lock(|inner| inner.heap.as_ref().map_or(0, |heap| heap.end() - heap.start()))
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Private code
//--------------------------------------------------------------------------------------------------
impl MemoryManager {
    pub(crate) fn heap_alloc(&self, layout: Layout) -> Option<usize> {
        self.inner
            .lock(|inner| inner.heap.as_mut().and_then(|heap| heap.alloc(layout)))
    }

    fn release_frame(&self, frame: PhysicalAddress) {
        let released = self
            .inner
            .lock(|inner| inner.pool.as_mut().map_or(false, |pool| pool.free(frame)));

        if !released {
            warn!("mem: {} was not allocated from the pool", frame);
        }
    }
}

fn stats_of(pool: &FramePool) -> MemoryStats {
    MemoryStats {
        total_frames: pool.total(),
        allocated_frames: pool.allocated(),
        free_frames: pool.free_count(),
    }
}
