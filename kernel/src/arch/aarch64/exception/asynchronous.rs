// SPDX-License-Identifier: MIT
use core::arch::asm;

use aarch64_cpu::registers::DAIF;
use bitflags::bitflags;
use tock_registers::interfaces::{Readable, Writeable};

use crate::exception::interface::IrqState;

bitflags! {
    /// Exception mask bits of the `DAIF` register.
    struct Daif: u64 {
        const IRQ = 1 << 7;
    }
}

// Public code
#[inline(always)]
pub fn is_local_irq_masked() -> bool {
    Daif::from_bits_truncate(DAIF.get()).contains(Daif::IRQ)
}

#[inline(always)]
pub fn local_irq_unmask() {
    // DAIFClr takes the 4-bit D:A:I:F immediate, I = 0b0010.
    unsafe {
        asm!("msr DAIFClr, #2", options(nomem, nostack, preserves_flags));
    }
}

#[inline(always)]
pub fn local_irq_mask() {
    unsafe {
        asm!("msr DAIFSet, #2", options(nomem, nostack, preserves_flags));
    }
}

#[inline(always)]
pub fn local_irq_mask_save() -> IrqState {
    let daif = DAIF.get();
    local_irq_mask();

    daif
}

#[inline(always)]
pub fn local_irq_restore(flags: IrqState) {
    DAIF.set(flags);
}
