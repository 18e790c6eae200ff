// SPDX-License-Identifier: MIT
//! Bitmap of physical page frames.
//!
//! One bit per frame between the lowest and highest usable RAM address, set when the frame is
//! allocated or not usable at all. The bitmap lives in the first free run of frames it covers.

use core::ops::Range;

use crate::dtb::Region;
use crate::mem::allocator::{align_down, align_up, checked_align_up};
use crate::mem::{MemoryError, PhysicalAddress, PAGE_SIZE};

const BITS: usize = u64::BITS as usize;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------
pub(super) struct FramePool {
    base: usize,
    bitmap: &'static mut [u64],
    bitmap_frames: Range<usize>,
    total: usize,
    allocated: usize,
    hint: usize,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------
impl FramePool {
    /// Builds the pool over every frame of `ram` at or above `floor` that no `reserved` range
    /// touches.
    ///
    /// # Safety
    ///
    /// Those frames must be identity mapped and unused by anything else for `'static`.
    pub unsafe fn build(
        ram: &[Region],
        reserved: &[Region],
        floor: usize,
    ) -> Result<Self, MemoryError> {
        let spans = || ram.iter().filter_map(|r| usable_span(r, floor));
        let base = spans().map(|s| s.start).min().ok_or(MemoryError::NoUsableMemory)?;
        let top = spans().map(|s| s.end).max().ok_or(MemoryError::NoUsableMemory)?;

        let frames = (top - base) / PAGE_SIZE;
        let words = (frames + BITS - 1) / BITS;
        let needed = align_up(words * 8, PAGE_SIZE) / PAGE_SIZE;

        let available = |frame: usize| {
            let addr = base + frame * PAGE_SIZE;
            spans().any(|s| s.contains(&addr)) && !reserved.iter().any(|r| overlaps(r, addr))
        };

        let first = find_run(frames, needed, &available).ok_or(MemoryError::NoUsableMemory)?;
        let bitmap_frames = first..first + needed;

        let bitmap = core::slice::from_raw_parts_mut((base + first * PAGE_SIZE) as *mut u64, words);
        bitmap.fill(u64::MAX);

        let mut pool = Self {
            base,
            bitmap,
            bitmap_frames,
            total: 0,
            allocated: 0,
            hint: 0,
        };
        for frame in 0..frames {
            if !pool.bitmap_frames.contains(&frame) && available(frame) {
                pool.clear(frame);
                pool.total += 1;
            }
        }

        Ok(pool)
    }

    /// Takes the first free frame at or after the search hint, wrapping once.
    pub fn alloc(&mut self) -> Option<PhysicalAddress> {
        if self.allocated == self.total {
            return None;
        }

        let words = self.bitmap.len();
        for step in 0..words {
            let index = (self.hint + step) % words;
            let word = self.bitmap[index];
            if word == u64::MAX {
                continue;
            }

            let bit = (!word).trailing_zeros() as usize;
            self.bitmap[index] |= 1 << bit;
            self.allocated += 1;
            self.hint = index;

            return Some(PhysicalAddress(self.base + (index * BITS + bit) * PAGE_SIZE));
        }

        None
    }

    /// Returns a frame; `false` if it was not handed out by this pool.
    pub fn free(&mut self, frame: PhysicalAddress) -> bool {
        let Some(index) = self.index_of(frame) else {
            return false;
        };
        if !self.is_set(index) || self.bitmap_frames.contains(&index) {
            return false;
        }

        self.clear(index);
        self.allocated -= 1;
        true
    }

    pub fn is_allocated(&self, frame: PhysicalAddress) -> bool {
        self.index_of(frame).map_or(false, |i| self.is_set(i))
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn free_count(&self) -> usize {
        self.total - self.allocated
    }

    /// Bytes taken by the bitmap, rounded to whole frames.
    pub fn overhead(&self) -> usize {
        self.bitmap_frames.len() * PAGE_SIZE
    }

    pub fn bitmap_address(&self) -> PhysicalAddress {
        PhysicalAddress(self.base + self.bitmap_frames.start * PAGE_SIZE)
    }
}

//--------------------------------------------------------------------------------------------------
// Private code
//--------------------------------------------------------------------------------------------------
impl FramePool {
    fn index_of(&self, frame: PhysicalAddress) -> Option<usize> {
        if !frame.is_page_aligned() || frame.0 < self.base {
            return None;
        }

        let index = (frame.0 - self.base) / PAGE_SIZE;
        (index < self.bitmap.len() * BITS).then_some(index)
    }

    fn is_set(&self, index: usize) -> bool {
        self.bitmap[index / BITS] & (1 << (index % BITS)) != 0
    }

    fn clear(&mut self, index: usize) {
        self.bitmap[index / BITS] &= !(1 << (index % BITS));
    }
}

/// The page-aligned part of `region` at or above `floor`.
fn usable_span(region: &Region, floor: usize) -> Option<Range<usize>> {
    let start = usize::try_from(region.base).ok()?.max(floor);
    let end = usize::try_from(region.end()).unwrap_or(usize::MAX);
    let span = checked_align_up(start, PAGE_SIZE)?..align_down(end, PAGE_SIZE);

    (span.start < span.end).then_some(span)
}

fn overlaps(region: &Region, addr: usize) -> bool {
    let start = addr as u64;
    region.size > 0 && region.base < start + PAGE_SIZE as u64 && start < region.end()
}

fn find_run(frames: usize, needed: usize, available: impl Fn(usize) -> bool) -> Option<usize> {
    let mut run = 0;
    for frame in 0..frames {
        if available(frame) {
            run += 1;
            if run == needed {
                return Some(frame + 1 - needed);
            }
        } else {
            run = 0;
        }
    }

    None
}
