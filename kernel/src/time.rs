// SPDX-License-Identifier: MIT
//! Timestamps for log lines.
//!
//! The timer itself belongs to the platform; the log layer only needs an elapsed-milliseconds
//! callback, registered once it is available.

use crate::sync::interface::Mutex;
use crate::sync::SpinLock;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[path = "arch/aarch64/time.rs"]
pub mod arch_time;

/// Returns the milliseconds elapsed since boot.
pub type LogTimer = fn() -> u64;

pub struct TimeManager {
    log_timer: SpinLock<Option<LogTimer>>,
}

static TIME_MANAGER: TimeManager = TimeManager::new();

pub fn time_manager() -> &'static TimeManager {
    &TIME_MANAGER
}

impl TimeManager {
    pub const fn new() -> Self {
        Self {
            log_timer: SpinLock::new(None),
        }
    }

    /// Installs the clock used to timestamp log lines, replacing any previous one.
    pub fn set_log_timer(&self, timer: LogTimer) {
        self.log_timer.lock(|t| *t = Some(timer));
    }

    /// Milliseconds since boot according to the registered clock, or 0 before one is set.
    pub fn uptime_ms(&self) -> u64 {
        // Copy the callback out so it never runs under the lock.
        let timer = self.log_timer.lock(|t| *t);
        timer.map_or(0, |f| f())
    }
}
