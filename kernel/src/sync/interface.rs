// SPDX-License-Identifier: MIT

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------
/// Mutual exclusion over a piece of data.
///
/// Access is only granted for the duration of the closure, so the lock can never be leaked or
/// released twice by a caller.
pub trait Mutex {
    type Data;

    /// Locks the mutex and grants the closure temporary mutable access to the wrapped data.
    fn lock<R>(&self, f: impl FnOnce(&mut Self::Data) -> R) -> R;
}
