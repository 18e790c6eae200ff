// SPDX-License-Identifier: MIT
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ops::Deref;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------
/// A cell written exactly once during boot and read-only afterwards.
pub struct OnceCell<T> {
    state: AtomicU8,
    data: UnsafeCell<MaybeUninit<T>>,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------
unsafe impl<T> Send for OnceCell<T> where T: Send {}
unsafe impl<T> Sync for OnceCell<T> where T: Send + Sync {}

impl<T> OnceCell<T> {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Stores `value`, or hands it back if the cell was already set.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }

        unsafe { (*self.data.get()).write(value) };
        self.state.store(READY, Ordering::Release);

        Ok(())
    }

    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            Some(unsafe { (*self.data.get()).assume_init_ref() })
        } else {
            None
        }
    }
}

impl<T> Deref for OnceCell<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get().unwrap_or_else(|| panic!("OnceCell not initialized"))
    }
}

impl<T> Drop for OnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            unsafe { self.data.get_mut().assume_init_drop() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_set_is_rejected() {
        let cell: OnceCell<u32> = OnceCell::new();

        assert!(cell.get().is_none());
        assert_eq!(cell.set(1u32), Ok(()));
        assert_eq!(cell.set(2u32), Err(2));
        assert_eq!(*cell, 1);
    }

    #[test]
    #[should_panic(expected = "OnceCell not initialized")]
    fn deref_before_set_panics() {
        let cell: OnceCell<u32> = OnceCell::new();
        let _ = *cell;
    }
}
