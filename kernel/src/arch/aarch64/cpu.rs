// SPDX-License-Identifier: MIT
use aarch64_cpu::asm;
use aarch64_cpu::registers::{CurrentEL, MPIDR_EL1};
use tock_registers::interfaces::Readable;

#[inline(always)]
pub fn wait_forever() -> ! {
    loop {
        asm::wfe();
    }
}

#[inline(always)]
pub fn core_id<T>() -> T
where
    T: From<u8>,
{
    const CORE_MASK: u64 = 0b11;
    T::from((MPIDR_EL1.get() & CORE_MASK) as u8)
}

/// The exception level the core runs at, 0 to 3.
#[inline(always)]
pub fn current_el() -> u8 {
    CurrentEL.read(CurrentEL::EL) as u8
}

#[inline(always)]
pub fn stack_pointer() -> usize {
    let sp: usize;
    unsafe { core::arch::asm!("mov {}, sp", out(reg) sp, options(nomem, nostack)) };
    sp
}
