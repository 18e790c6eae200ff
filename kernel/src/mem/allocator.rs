// SPDX-License-Identifier: MIT

use core::alloc::{GlobalAlloc, Layout};

use crate::mem::MemoryManager;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------

/// Bump allocator over the kernel heap window.
///
/// Every allocation moves the heap end forward through [`MemoryManager`]; nothing is ever handed
/// back, so `dealloc` is a no-op.
pub struct HeapAllocator<'m> {
    manager: &'m MemoryManager,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------

/// Align downwards. Returns the greatest x with alignment `align`
/// so that x <= addr. The alignment must be a power of 2.
pub const fn align_down(size: usize, align: usize) -> usize {
    if align.is_power_of_two() {
        size & !(align - 1)
    } else if align == 0 {
        size
    } else {
        panic!("`align` must be a power of 2");
    }
}

/// Align the given address upwards to the given alignment.
///
/// Requires that the alignment is a power of two.
pub const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

/// [`align_up`], or `None` if the result does not fit in a `usize`.
pub const fn checked_align_up(addr: usize, align: usize) -> Option<usize> {
    match addr.checked_add(align - 1) {
        Some(end) => Some(end & !(align - 1)),
        None => None,
    }
}

impl<'m> HeapAllocator<'m> {
    pub const fn new(manager: &'m MemoryManager) -> Self {
        Self { manager }
    }
}

unsafe impl GlobalAlloc for HeapAllocator<'_> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.manager
            .heap_alloc(layout)
            .map_or(core::ptr::null_mut(), |addr| addr as *mut u8)
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::testing::Ram;
    use crate::mem::PAGE_SIZE;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_up(0x1001, PAGE_SIZE), 0x2000);
        assert_eq!(align_up(0x2000, PAGE_SIZE), 0x2000);
        assert_eq!(align_down(0x1fff, PAGE_SIZE), 0x1000);
        assert_eq!(align_down(0x1fff, 0), 0x1fff);
        assert_eq!(checked_align_up(0x1001, PAGE_SIZE), Some(0x2000));
        assert_eq!(checked_align_up(usize::MAX - 0x10, PAGE_SIZE), None);
    }

    #[test]
    fn allocations_bump_the_heap_end() {
        let ram = Ram::new(8);
        let manager = MemoryManager::new();
        unsafe { manager.init_heap(ram.layout()) }.unwrap();
        let heap = HeapAllocator::new(&manager);
        let start = manager.get_heap_end();

        let a = unsafe { heap.alloc(Layout::from_size_align(3, 1).unwrap()) };
        let b = unsafe { heap.alloc(Layout::from_size_align(16, 16).unwrap()) };

        assert_eq!(a as usize, start);
        assert_eq!(b as usize, align_up(start + 3, 16));
        assert_eq!(manager.get_heap_end(), b as usize + 16);

        unsafe { heap.dealloc(b, Layout::from_size_align(16, 16).unwrap()) };
        assert_eq!(manager.get_heap_end(), b as usize + 16);
    }

    #[test]
    fn exhausted_window_yields_null() {
        let ram = Ram::new(8);
        let manager = MemoryManager::new();
        unsafe { manager.init_heap(ram.layout()) }.unwrap();
        let heap = HeapAllocator::new(&manager);

        let too_big = Layout::from_size_align(3 * PAGE_SIZE, 8).unwrap();
        assert!(unsafe { heap.alloc(too_big) }.is_null());

        let fits = Layout::from_size_align(2 * PAGE_SIZE, 8).unwrap();
        assert!(!unsafe { heap.alloc(fits) }.is_null());
    }

    #[test]
    fn nothing_is_handed_out_before_init() {
        let manager = MemoryManager::new();
        let heap = HeapAllocator::new(&manager);

        assert!(unsafe { heap.alloc(Layout::new::<u64>()) }.is_null());
    }
}
