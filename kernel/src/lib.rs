// SPDX-License-Identifier: MIT
//! Early-boot core of the Raspberry Pi kernel.
//!
//! Everything here runs before any scheduler exists: the device tree store that describes the
//! board, the physical frame pool and kernel heap end, and the interrupt-masking spinlock plus
//! the wait list the scheduler will later block tasks on.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod print;

pub mod console;
pub mod dtb;
pub mod exception;
pub mod mem;
pub mod sync;
pub mod task;
pub mod time;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[path = "arch/aarch64/cpu.rs"]
pub mod cpu;
