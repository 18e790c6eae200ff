// SPDX-License-Identifier: MIT
use crate::mem::allocator::align_up;
use crate::mem::PAGE_SIZE;

/// Where the kernel image ends and what lies directly above it.
///
/// ```text
/// kernel_start   kernel_end  heap_start             pool_floor
///      |  image      |  pad   |   heap window        |   frame pool ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelLayout {
    pub kernel_start: usize,
    pub kernel_end: usize,
    /// Bytes kept for the kernel heap between the image and the frame pool.
    pub heap_window: usize,
}

impl KernelLayout {
    pub const fn new(kernel_start: usize, kernel_end: usize, heap_window: usize) -> Self {
        Self {
            kernel_start,
            kernel_end,
            heap_window,
        }
    }

    /// First page boundary after the image.
    pub const fn heap_start(&self) -> usize {
        align_up(self.kernel_end, PAGE_SIZE)
    }

    /// Lowest address the frame pool may hand out; the heap never grows past it.
    pub const fn pool_floor(&self) -> usize {
        align_up(self.heap_start() + self.heap_window, PAGE_SIZE)
    }

    pub const fn image_size(&self) -> usize {
        self.kernel_end - self.kernel_start
    }
}
