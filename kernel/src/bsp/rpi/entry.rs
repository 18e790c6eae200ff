// SPDX-License-Identifier: MIT
//! Firmware entry point.
//!
//! The firmware loads the image at `0x80000` and jumps to `_start` with the device tree blob
//! address in `x0`. Secondary cores are parked; the boot core gets the stack below the load
//! address, clears `.bss` and enters Rust with `x0` untouched.

use core::arch::global_asm;

global_asm!(
    r#"
.section .text._start
.global _start

_start:
    mrs     x1, mpidr_el1
    and     x1, x1, #0b11
    cbnz    x1, .L_park

    mov     x19, x0

    ldr     x1, =__boot_core_stack_end
    mov     sp, x1

    ldr     x1, =__bss_start
    ldr     x2, =__bss_end
.L_clear_bss:
    cmp     x1, x2
    b.hs    .L_bss_done
    stp     xzr, xzr, [x1], #16
    b       .L_clear_bss
.L_bss_done:

    mov     x0, x19
    b       _start_rust

.L_park:
    wfe
    b       .L_park
"#
);

/// First Rust code on the boot core.
///
/// # Safety
///
/// Only `_start` may call this, once, with the firmware's blob pointer.
#[no_mangle]
pub unsafe extern "C" fn _start_rust(dtb: *const u8) -> ! {
    crate::boot::kernel_init(dtb)
}
