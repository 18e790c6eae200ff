// SPDX-License-Identifier: MIT
//! Hosted builds run as an ordinary process: there is no local interrupt line to mask.

use crate::exception::interface::IrqState;

#[inline(always)]
pub fn is_local_irq_masked() -> bool {
    false
}

#[inline(always)]
pub fn local_irq_unmask() {}

#[inline(always)]
pub fn local_irq_mask() {}

#[inline(always)]
pub fn local_irq_mask_save() -> IrqState {
    0
}

#[inline(always)]
pub fn local_irq_restore(_flags: IrqState) {}
