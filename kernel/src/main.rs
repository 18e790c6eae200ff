// SPDX-License-Identifier: MIT
#![no_std]
#![no_main]

extern crate alloc;

use rpi_kernel::mem::allocator::HeapAllocator;
use rpi_kernel::mem::MemoryManager;

mod boot;
mod bsp;
mod panic;

/// Owner of the page frame pool and the heap end.
static KERNEL_MEMORY: MemoryManager = MemoryManager::new();

#[global_allocator]
static KERNEL_HEAP: HeapAllocator<'static> = HeapAllocator::new(&KERNEL_MEMORY);
