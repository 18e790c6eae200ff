// SPDX-License-Identifier: MIT
//! Scheduler-facing primitives.

mod wait_list;

pub use wait_list::WaitList;
