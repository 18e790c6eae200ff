// SPDX-License-Identifier: MIT
//! Interrupt-masking spinlock.
//!
//! The lock may be taken from task context and from IRQ handlers on the same core. Acquiring it
//! therefore masks IRQs on the local core *before* spinning, and releasing it restores the mask
//! state that was saved, so nested acquisitions unwind correctly.

use core::cell::UnsafeCell;
use core::hint;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::exception::asynchronous::LocalIrq;
use crate::exception::interface::{IrqState, LocalIrqControl};
use crate::sync::interface::Mutex;

/// Upper bound on the number of spin hints issued between two polls of a contended lock.
const MAX_BACKOFF: u32 = 64;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------
/// A bare test-and-test-and-set lock word.
///
/// `RawSpinLock` protects nothing by itself; it is the building block of [`SpinLock`] and of
/// structures that need to hold a lock across something other than a closure.
pub struct RawSpinLock<I = LocalIrq> {
    locked: AtomicBool,
    _irq: PhantomData<fn() -> I>,
}

/// Proof that a [`RawSpinLock`] was acquired, carrying the interrupt state to restore.
#[must_use = "dropping the token without releasing the lock leaves it held forever"]
pub struct IrqToken {
    saved: IrqState,
}

/// A spinlock owning the data it protects.
pub struct SpinLock<T, I = LocalIrq> {
    raw: RawSpinLock<I>,
    data: UnsafeCell<T>,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------
unsafe impl<T, I> Send for SpinLock<T, I> where T: Send {}
unsafe impl<T, I> Sync for SpinLock<T, I> where T: Send {}

impl<I> RawSpinLock<I>
where
    I: LocalIrqControl,
{
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            _irq: PhantomData,
        }
    }

    /// Spins until the lock is obtained.
    ///
    /// IRQs stay masked on this core until the returned token is handed to [`Self::release`].
    pub fn acquire(&self) -> IrqToken {
        let saved = I::mask_save();
        let mut backoff = 1;

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Poll with plain loads so waiting cores do not keep stealing the cache line.
            while self.locked.load(Ordering::Relaxed) {
                for _ in 0..backoff {
                    hint::spin_loop();
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }

        IrqToken { saved }
    }

    /// Takes the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<IrqToken> {
        let saved = I::mask_save();

        match self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => Some(IrqToken { saved }),
            Err(_) => {
                I::restore(saved);
                None
            }
        }
    }

    /// Releases the lock and restores the interrupt state saved by the matching acquire.
    ///
    /// # Safety
    ///
    /// - `token` must come from an acquire of this very lock.
    /// - The caller must not touch the protected data afterwards.
    pub unsafe fn release(&self, token: IrqToken) {
        self.locked.store(false, Ordering::Release);
        I::restore(token.saved);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl<T, I> SpinLock<T, I>
where
    I: LocalIrqControl,
{
    pub const fn new(data: T) -> Self {
        Self {
            raw: RawSpinLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Runs `f` under the lock if it can be taken without spinning.
    ///
    /// Meant for IRQ handlers that must not wait on the code they interrupted.
    pub fn try_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let token = self.raw.try_acquire()?;
        let held = Held { raw: &self.raw, token: Some(token) };
        let data = unsafe { &mut *self.data.get() };
        let ret = f(data);
        drop(held);

        Some(ret)
    }

    /// Exclusive access through `&mut self`, no locking required.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl<T, I> Mutex for SpinLock<T, I>
where
    I: LocalIrqControl,
{
    type Data = T;

    fn lock<R>(&self, f: impl FnOnce(&mut Self::Data) -> R) -> R {
        let held = Held {
            raw: &self.raw,
            token: Some(self.raw.acquire()),
        };
        let data = unsafe { &mut *self.data.get() };
        let ret = f(data);
        drop(held);

        ret
    }
}

//--------------------------------------------------------------------------------------------------
// Private definitions
//--------------------------------------------------------------------------------------------------
/// Releases the lock when dropped, including while unwinding out of the critical section.
struct Held<'a, I>
where
    I: LocalIrqControl,
{
    raw: &'a RawSpinLock<I>,
    token: Option<IrqToken>,
}

impl<I> Drop for Held<'_, I>
where
    I: LocalIrqControl,
{
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            unsafe { self.raw.release(token) }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::thread;

    use super::*;

    thread_local! {
        static MASKED: Cell<bool> = Cell::new(false);
        static MASK_CALLS: Cell<usize> = Cell::new(0);
    }

    /// Per-thread stand-in for a core's IRQ mask.
    struct MockIrq;

    impl LocalIrqControl for MockIrq {
        fn mask_save() -> IrqState {
            MASK_CALLS.with(|c| c.set(c.get() + 1));
            let was = MASKED.with(|m| m.replace(true));
            was as IrqState
        }

        fn restore(state: IrqState) {
            MASKED.with(|m| m.set(state != 0));
        }

        fn is_masked() -> bool {
            MASKED.with(|m| m.get())
        }
    }

    #[test]
    fn lock_masks_irqs_while_held() {
        let lock: SpinLock<u32, MockIrq> = SpinLock::new(0);

        assert!(!MockIrq::is_masked());
        lock.lock(|value| {
            assert!(MockIrq::is_masked());
            *value += 1;
        });
        assert!(!MockIrq::is_masked());
        assert!(!lock.is_locked());
    }

    #[test]
    fn nested_locks_restore_outer_state() {
        let outer: SpinLock<(), MockIrq> = SpinLock::new(());
        let inner: SpinLock<(), MockIrq> = SpinLock::new(());

        outer.lock(|_| {
            inner.lock(|_| assert!(MockIrq::is_masked()));
            // Releasing the inner lock must not unmask while the outer one is still held.
            assert!(MockIrq::is_masked());
        });
        assert!(!MockIrq::is_masked());
    }

    #[test]
    fn already_masked_state_survives_release() {
        let lock: SpinLock<(), MockIrq> = SpinLock::new(());

        let saved = MockIrq::mask_save();
        lock.lock(|_| {});
        assert!(MockIrq::is_masked());
        MockIrq::restore(saved);
        assert!(!MockIrq::is_masked());
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock: SpinLock<u8, MockIrq> = SpinLock::new(7);

        let token = lock.raw.acquire();
        assert!(lock.try_lock(|v| *v).is_none());
        // A failed attempt gives the mask back to the state the holder established.
        assert!(MockIrq::is_masked());
        unsafe { lock.raw.release(token) };

        assert_eq!(lock.try_lock(|v| *v), Some(7));
        assert!(!MockIrq::is_masked());
    }

    #[test]
    fn raw_lock_masks_before_spinning() {
        let raw: RawSpinLock<MockIrq> = RawSpinLock::new();
        let calls_before = MASK_CALLS.with(|c| c.get());

        let token = raw.acquire();
        assert!(raw.is_locked());
        assert_eq!(MASK_CALLS.with(|c| c.get()), calls_before + 1);
        unsafe { raw.release(token) };
        assert!(!raw.is_locked());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        const THREADS: usize = 2;
        const INCREMENTS: u64 = 100_000;

        let counter: SpinLock<u64, MockIrq> = SpinLock::new(0);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..INCREMENTS {
                        counter.lock(|c| *c += 1);
                    }
                });
            }
        });

        assert_eq!(counter.into_inner(), THREADS as u64 * INCREMENTS);
    }

    #[test]
    fn lock_is_released_when_critical_section_panics() {
        let lock: SpinLock<u32, MockIrq> = SpinLock::new(1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            lock.lock(|_| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(!lock.is_locked());
        assert_eq!(lock.lock(|v| *v), 1);
    }
}
