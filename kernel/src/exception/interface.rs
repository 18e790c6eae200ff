// SPDX-License-Identifier: MIT

/// Saved interrupt state of one core, as returned by [`LocalIrqControl::mask_save`].
///
/// Shares its representation with `critical_section::RawRestoreState` so that the kernel's
/// critical-section implementation can hand it through unchanged.
pub type IrqState = critical_section::RawRestoreState;

/// Control over IRQ delivery on the executing core.
///
/// Locks that may be taken from both task and interrupt context are generic over this trait so
/// that the masking discipline can be exercised away from real hardware.
pub trait LocalIrqControl {
    /// Masks IRQs on the executing core and returns the state to restore afterwards.
    fn mask_save() -> IrqState;

    /// Restores a state previously returned by [`LocalIrqControl::mask_save`].
    fn restore(state: IrqState);

    /// Whether IRQs are currently masked on the executing core.
    fn is_masked() -> bool;
}
