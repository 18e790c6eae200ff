// SPDX-License-Identifier: MIT
use alloc::collections::VecDeque;
use alloc::sync::Arc;

use crate::exception::asynchronous::LocalIrq;
use crate::exception::interface::LocalIrqControl;
use crate::sync::interface::Mutex;
use crate::sync::SpinLock;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------

/// Tasks blocked on some condition, woken in the order they were added.
///
/// The list only shares ownership of its tasks. Woken tasks are handed back to the caller (or
/// to a callback) after the list's own lock has been released, so waking never runs scheduler
/// code under it.
pub struct WaitList<T: ?Sized, I = LocalIrq> {
    waiters: SpinLock<VecDeque<Arc<T>>, I>,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------
impl<T: ?Sized, I> WaitList<T, I>
where
    I: LocalIrqControl,
{
    pub const fn new() -> Self {
        Self {
            waiters: SpinLock::new(VecDeque::new()),
        }
    }

    /// Queues `task` behind every task already waiting.
    pub fn add(&self, task: Arc<T>) {
        self.waiters.lock(|w| w.push_back(task));
    }

    /// Removes the longest-waiting task; `None` if nobody waits.
    pub fn wake_one(&self) -> Option<Arc<T>> {
        self.waiters.lock(|w| w.pop_front())
    }

    /// Removes every task waiting right now, oldest first.
    ///
    /// Tasks added after the snapshot stay queued for the next wake-up.
    pub fn wake_all(&self) -> VecDeque<Arc<T>> {
        self.waiters.lock(core::mem::take)
    }

    /// Like [`Self::wake_one`], passing the task to `wake`. Returns whether a task was woken.
    pub fn wake_one_with(&self, wake: impl FnOnce(Arc<T>)) -> bool {
        match self.wake_one() {
            Some(task) => {
                wake(task);
                true
            }
            None => false,
        }
    }

    /// Like [`Self::wake_all`], passing each task to `wake`. Returns how many were woken.
    pub fn wake_all_with(&self, mut wake: impl FnMut(Arc<T>)) -> usize {
        let woken = self.wake_all();
        let count = woken.len();
        woken.into_iter().for_each(&mut wake);

        count
    }

    pub fn len(&self) -> usize {
        self.waiters.lock(|w| w.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this exact task (not an equal one) is waiting.
    pub fn contains(&self, task: &Arc<T>) -> bool {
        self.waiters.lock(|w| w.iter().any(|t| Arc::ptr_eq(t, task)))
    }
}

impl<T: ?Sized, I> Default for WaitList<T, I>
where
    I: LocalIrqControl,
{
    fn default() -> Self {
        Self::new()
    }
}
