// SPDX-License-Identifier: MIT
mod once_cell;
mod spinlock;

pub mod interface;

pub use self::once_cell::*;
pub use self::spinlock::*;
