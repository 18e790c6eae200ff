// SPDX-License-Identifier: MIT
//! The log sink.
//!
//! The kernel formats its own lines; whatever transport carries them (a UART on the board, a
//! capture buffer in tests) registers itself here.

use core::fmt::Arguments;

use crate::console::interface::{All, Statistics, Write};
use crate::sync::interface::Mutex;
use crate::sync::SpinLock;

pub mod interface {
    use core::fmt;

    pub trait Write {
        fn write_char(&self, c: char);

        fn write_fmt(&self, args: fmt::Arguments) -> fmt::Result;

        fn flush(&self);
    }

    pub trait Statistics {
        /// Returns the number of characters written to the console.
        fn get_tx_count(&self) -> usize {
            0
        }
    }

    pub trait All: Write + Statistics {}
}

struct NullConsole;

impl NullConsole {
    pub const fn new() -> NullConsole {
        NullConsole
    }
}

impl Write for NullConsole {
    fn write_char(&self, _c: char) {}

    fn write_fmt(&self, _args: Arguments) -> core::fmt::Result {
        Ok(())
    }

    fn flush(&self) {}
}

impl Statistics for NullConsole {}

impl All for NullConsole {}

static NULL_CONSOLE: NullConsole = NullConsole::new();
static CUR_CONSOLE: SpinLock<&'static (dyn All + Sync)> = SpinLock::new(&NULL_CONSOLE);

pub fn console() -> &'static (dyn All + Sync) {
    CUR_CONSOLE.lock(|con| *con)
}

pub fn register_console(con: &'static (dyn All + Sync)) {
    CUR_CONSOLE.lock(|cur| *cur = con);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fmt::Write as _;
    use std::sync::Mutex;

    use super::interface::{All, Statistics, Write};

    /// Collects everything written to it; registered by tests that inspect log output.
    pub struct CaptureConsole {
        buf: Mutex<String>,
    }

    impl CaptureConsole {
        pub const fn new() -> Self {
            Self {
                buf: Mutex::new(String::new()),
            }
        }

        pub fn contents(&self) -> String {
            self.buf.lock().unwrap().clone()
        }
    }

    impl Write for CaptureConsole {
        fn write_char(&self, c: char) {
            self.buf.lock().unwrap().push(c);
        }

        fn write_fmt(&self, args: core::fmt::Arguments) -> core::fmt::Result {
            self.buf.lock().unwrap().write_fmt(args)
        }

        fn flush(&self) {}
    }

    impl Statistics for CaptureConsole {
        fn get_tx_count(&self) -> usize {
            self.buf.lock().unwrap().len()
        }
    }

    impl All for CaptureConsole {}

    pub static CAPTURE: CaptureConsole = CaptureConsole::new();
}
