// SPDX-License-Identifier: MIT
//! Raspberry Pi (3B+/4B, AArch64).

mod entry;

use rpi_kernel::mem::KernelLayout;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------

/// Bytes of kernel heap between the image and the page frame pool.
pub const HEAP_WINDOW: usize = 16 * 1024 * 1024;

pub const BOARD_NAME: &str = "Raspberry Pi";

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------

/// Kernel image bounds as placed by `kernel.ld`.
pub fn kernel_layout() -> KernelLayout {
    extern "C" {
        static __kernel_start: u8;
        static __kernel_end: u8;
    }

    // Only the symbol addresses are used, never their contents.
    let (start, end) = unsafe {
        (
            core::ptr::addr_of!(__kernel_start) as usize,
            core::ptr::addr_of!(__kernel_end) as usize,
        )
    };

    KernelLayout::new(start, end, HEAP_WINDOW)
}
