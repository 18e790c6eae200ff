// SPDX-License-Identifier: MIT
//! ARM generic timer as the log clock.

use aarch64_cpu::asm::barrier;
use aarch64_cpu::registers::{CNTFRQ_EL0, CNTPCT_EL0};
use tock_registers::interfaces::Readable;

use crate::sync::OnceCell;

const MILLIS_PER_SEC: u128 = 1_000;

// set once on the boot core, before anything reads the clock
static KERNEL_TIMER_DATA: OnceCell<KernelTimerData> = OnceCell::new();

struct KernelTimerData {
    arch_timer_counter_frequency: u64,
    kernel_boot_time: u64,
}

#[inline(always)]
fn read_cntpct() -> u64 {
    // Prevent reordering of instructions from reading the counter ahead of time.
    barrier::isb(barrier::SY);
    CNTPCT_EL0.get()
}

fn elapsed_ticks() -> Option<(u64, u64)> {
    let data = KERNEL_TIMER_DATA.get()?;
    if data.arch_timer_counter_frequency == 0 {
        return None;
    }

    Some((
        read_cntpct().wrapping_sub(data.kernel_boot_time),
        data.arch_timer_counter_frequency,
    ))
}

// Public code
/// Latches the counter frequency and the boot timestamp.
pub fn init() {
    let data = KernelTimerData {
        arch_timer_counter_frequency: CNTFRQ_EL0.get(),
        kernel_boot_time: read_cntpct(),
    };

    // A second call keeps the original boot timestamp.
    let _ = KERNEL_TIMER_DATA.set(data);
}

/// Milliseconds since [`init`], excluding firmware time. Zero before [`init`].
///
/// Log clock callback for [`crate::time::TimeManager::set_log_timer`].
pub fn uptime_ms() -> u64 {
    match elapsed_ticks() {
        Some((ticks, freq)) => (u128::from(ticks) * MILLIS_PER_SEC / u128::from(freq)) as u64,
        None => 0,
    }
}
