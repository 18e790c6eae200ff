// SPDX-License-Identifier: MIT
use core::fmt;

use crate::{console, time};

/// Severity of a log line, rendered as the tag inside the timestamp brackets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Critical,
}

impl Level {
    const fn tag(self) -> char {
        match self {
            Level::Info => ' ',
            Level::Warn => 'W',
            Level::Error => 'E',
            Level::Critical => 'C',
        }
    }
}

#[doc(hidden)]
pub fn kprint(args: fmt::Arguments) {
    // Nothing sensible can be done about a failing sink.
    let _ = console::console().write_fmt(args);
}

#[doc(hidden)]
pub fn klog(level: Level, args: fmt::Arguments) {
    let ms = time::time_manager().uptime_ms();

    kprint(format_args!(
        "[{} {:>3}.{:03}] {}\n",
        level.tag(),
        ms / 1000,
        ms % 1000,
        args
    ));
}

/// Prints without a newline.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ($crate::print::kprint(format_args!($($arg)*)));
}

/// Prints with a newline.
#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ({
        $crate::print::kprint(format_args!("{}\n", format_args!($($arg)*)));
    })
}

/// Prints an info, with a newline.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => ({
        $crate::print::klog($crate::print::Level::Info, format_args!($($arg)*));
    })
}

/// Prints a warning, with a newline.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        $crate::print::klog($crate::print::Level::Warn, format_args!($($arg)*));
    })
}

/// Prints an error, with a newline.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ({
        $crate::print::klog($crate::print::Level::Error, format_args!($($arg)*));
    })
}

/// Prints a critical error, with a newline.
#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => ({
        $crate::print::klog($crate::print::Level::Critical, format_args!($($arg)*));
    })
}
