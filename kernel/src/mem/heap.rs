// SPDX-License-Identifier: MIT
use core::alloc::Layout;

use crate::mem::MemoryError;

/// The kernel heap: everything between `start` and `end` has been handed out.
pub(super) struct KernelHeap {
    start: usize,
    end: usize,
    limit: usize,
}

impl KernelHeap {
    pub const fn new(start: usize, limit: usize) -> Self {
        Self {
            start,
            end: start,
            limit,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Lowers the ceiling, never below what is already in use.
    pub fn restrict(&mut self, limit: usize) {
        self.limit = self.limit.min(limit).max(self.end);
    }

    /// Moves the end up by exactly `delta`, or not at all.
    pub fn grow(&mut self, delta: usize) -> Result<usize, MemoryError> {
        let end = self
            .end
            .checked_add(delta)
            .filter(|end| *end <= self.limit)
            .ok_or(MemoryError::OutOfMemory)?;
        self.end = end;

        Ok(end)
    }

    /// Carves `layout` off the end; returns its address.
    pub fn alloc(&mut self, layout: Layout) -> Option<usize> {
        let mask = layout.align() - 1;
        let start = self.end.checked_add(mask)? & !mask;
        let end = start.checked_add(layout.size())?;
        self.grow(end - self.end).ok()?;

        Some(start)
    }
}
