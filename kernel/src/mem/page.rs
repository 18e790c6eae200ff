// SPDX-License-Identifier: MIT
use core::ptr;

use crate::mem::{MemoryManager, PhysicalAddress, PAGE_SIZE};

/// Exclusive handle to one allocated page frame.
///
/// The frame goes back to the pool when the handle is freed or dropped, so it cannot be
/// returned twice.
pub struct MemoryPage<'m> {
    manager: &'m MemoryManager,
    frame: PhysicalAddress,
}

impl<'m> MemoryPage<'m> {
    pub(super) fn new(manager: &'m MemoryManager, frame: PhysicalAddress) -> Self {
        Self { manager, frame }
    }

    pub fn address(&self) -> PhysicalAddress {
        self.frame
    }

    /// Copies `data` into the page at `offset`, stopping at the page end.
    ///
    /// Returns how many bytes were written: `0` if `offset` is past the page.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> usize {
        let len = clamp(offset, data.len());
        if len > 0 {
            // The frame is ours alone and `offset + len` stays inside it.
            unsafe { ptr::copy_nonoverlapping(data.as_ptr(), (self.frame + offset).as_mut_ptr(), len) };
        }

        len
    }

    /// Copies from the page at `offset` into `buf`, stopping at the page end.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> usize {
        let len = clamp(offset, buf.len());
        if len > 0 {
            unsafe { ptr::copy_nonoverlapping((self.frame + offset).as_ptr(), buf.as_mut_ptr(), len) };
        }

        len
    }

    /// Gives the frame back to the pool.
    pub fn free(self) {}
}

impl Drop for MemoryPage<'_> {
    fn drop(&mut self) {
        self.manager.release_frame(self.frame);
    }
}

impl core::fmt::Debug for MemoryPage<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("MemoryPage").field(&self.frame).finish()
    }
}

fn clamp(offset: usize, len: usize) -> usize {
    PAGE_SIZE.saturating_sub(offset).min(len)
}
