// SPDX-License-Identifier: MIT
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[path = "../arch/aarch64/exception/asynchronous.rs"]
mod arch_asynchronous;

#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
#[path = "../arch/hosted/exception/asynchronous.rs"]
mod arch_asynchronous;

use crate::exception::interface::{IrqState, LocalIrqControl};

pub use arch_asynchronous::{
    is_local_irq_masked, local_irq_mask, local_irq_mask_save, local_irq_restore, local_irq_unmask,
};

/// The executing core's interrupt controller, as seen by the kernel's locks.
pub struct LocalIrq;

impl LocalIrqControl for LocalIrq {
    #[inline(always)]
    fn mask_save() -> IrqState {
        local_irq_mask_save()
    }

    #[inline(always)]
    fn restore(state: IrqState) {
        local_irq_restore(state)
    }

    #[inline(always)]
    fn is_masked() -> bool {
        is_local_irq_masked()
    }
}

/// Runs `f` with IRQs masked on the local core, restoring the previous state afterwards.
#[inline(always)]
pub fn exec_with_masked_irqs<T>(f: impl FnOnce() -> T) -> T {
    let saved = local_irq_mask_save();
    let ret = f();
    local_irq_restore(saved);

    ret
}

/// Critical sections for third-party crates, built on the same IRQ masking as the kernel locks.
///
/// Concept derived from the `CriticalSection` of <https://github.com/rust-embedded/bare-metal>.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
struct KernelCriticalSection;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
critical_section::set_impl!(KernelCriticalSection);

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
unsafe impl critical_section::Impl for KernelCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        local_irq_mask_save()
    }

    unsafe fn release(restore_state: critical_section::RawRestoreState) {
        local_irq_restore(restore_state);
    }
}
