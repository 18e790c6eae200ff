// SPDX-License-Identifier: MIT
//! Conditional reexporting of Board Support Packages.

#[cfg(feature = "bsp_rpi")]
mod rpi;

#[cfg(feature = "bsp_rpi")]
pub use rpi::*;
