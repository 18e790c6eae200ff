// SPDX-License-Identifier: MIT
//! Local interrupt masking.
//!
//! Vector installation lives outside this crate; all the core needs is the ability to mask and
//! restore IRQ delivery on the executing core around its critical sections.

pub mod asynchronous;
pub mod interface;
