//! Synchronization primitives the containers compose with.
//!
//! The containers in this crate hold no locks of their own; concurrency
//! is the caller's concern, assembled from the pieces here:
//!
//! - [`Semaphore`]: counting semaphore with blocking, non-blocking, and
//!   timed acquires. A timed acquire converts its relative timeout to
//!   an absolute deadline exactly once, at the call boundary.
//! - [`FairRwLock`]: reader/writer lock built from three semaphores —
//!   an `order` ticket for fairness, `access` for exclusive use of the
//!   resource, and `read` guarding the shared reader count. Writers
//!   cannot be starved by a reader stream.
//! - [`BoundedQueue`]: classic bounded buffer — a [`Fifo`] body, an
//!   `empty`-slots semaphore, a `full`-slots semaphore, and a mutex.

use core::cell::UnsafeCell;
use std::time::{Duration, Instant};

use log::trace;
use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::fifo::Fifo;

/// Counting semaphore.
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// Release one unit and wake a waiter.
    pub fn post(&self) {
        let mut c = self.count.lock();
        *c += 1;
        self.cond.notify_one();
    }

    /// Acquire one unit, blocking until available.
    pub fn wait(&self) {
        let mut c = self.count.lock();
        while *c == 0 {
            self.cond.wait(&mut c);
        }
        *c -= 1;
    }

    /// Acquire one unit only if immediately available.
    pub fn try_wait(&self) -> bool {
        let mut c = self.count.lock();
        if *c == 0 {
            return false;
        }
        *c -= 1;
        true
    }

    /// Acquire one unit, giving up after `timeout`. The relative
    /// timeout becomes an absolute deadline once, up front; retries
    /// after spurious wakeups reuse the same deadline.
    pub fn timed_wait(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut c = self.count.lock();
        while *c == 0 {
            if self.cond.wait_until(&mut c, deadline).timed_out() && *c == 0 {
                trace!("semaphore: timed_wait expired");
                return Err(Error::Timeout);
            }
        }
        *c -= 1;
        Ok(())
    }
}

/// Fairness-preserving reader/writer lock around a `T`.
///
/// Readers share; the first reader in takes `access` and the last one
/// out releases it. Every acquisition passes through the `order`
/// ticket, so arrival order is serviced roughly FIFO and writers are
/// not starved.
pub struct FairRwLock<T> {
    order: Semaphore,
    access: Semaphore,
    read: Semaphore,
    readers: UnsafeCell<usize>,
    data: UnsafeCell<T>,
}

// Safety: `data` is only reachable through the semaphore protocol
// (shared behind `access` for readers, exclusive for the writer), and
// `readers` only under the `read` semaphore.
unsafe impl<T: Send + Sync> Sync for FairRwLock<T> {}
unsafe impl<T: Send> Send for FairRwLock<T> {}

impl<T> FairRwLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            order: Semaphore::new(1),
            access: Semaphore::new(1),
            read: Semaphore::new(1),
            readers: UnsafeCell::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire shared access.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.order.wait();
        self.read.wait();
        // Safety: `read` is held.
        let readers = unsafe { &mut *self.readers.get() };
        *readers += 1;
        if *readers == 1 {
            self.access.wait();
        }
        self.read.post();
        self.order.post();
        ReadGuard { lock: self }
    }

    /// Acquire exclusive access.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.order.wait();
        self.access.wait();
        self.order.post();
        WriteGuard { lock: self }
    }
}

pub struct ReadGuard<'a, T> {
    lock: &'a FairRwLock<T>,
}

impl<'a, T> core::ops::Deref for ReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: `access` is held (shared) while any reader is live.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> Drop for ReadGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.read.wait();
        // Safety: `read` is held.
        let readers = unsafe { &mut *self.lock.readers.get() };
        *readers -= 1;
        if *readers == 0 {
            self.lock.access.post();
        }
        self.lock.read.post();
    }
}

pub struct WriteGuard<'a, T> {
    lock: &'a FairRwLock<T>,
}

impl<'a, T> core::ops::Deref for WriteGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: `access` is held exclusively.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> core::ops::DerefMut for WriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: `access` is held exclusively.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for WriteGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.access.post();
    }
}

/// Bounded multi-producer/multi-consumer queue.
///
/// `push` blocks on a free slot, `pop` blocks on an occupied one; both
/// serialize the ring itself through one mutex.
pub struct BoundedQueue<T: 'static> {
    fifo: Mutex<Fifo<'static, T>>,
    empty: Semaphore,
    full: Semaphore,
}

impl<T: 'static> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            fifo: Mutex::new(Fifo::new(capacity)?),
            empty: Semaphore::new(capacity),
            full: Semaphore::new(0),
        })
    }

    fn enqueue(&self, value: T) {
        self.fifo
            .lock()
            .push(value)
            .expect("slot reserved by empty semaphore");
        self.full.post();
    }

    fn dequeue(&self) -> T {
        let value = self
            .fifo
            .lock()
            .pop()
            .expect("element reserved by full semaphore");
        self.empty.post();
        value
    }

    /// Enqueue, blocking while the queue is full.
    pub fn push(&self, value: T) {
        self.empty.wait();
        self.enqueue(value);
    }

    /// Enqueue only if a slot is immediately free; the value is handed
    /// back on failure.
    pub fn try_push(&self, value: T) -> core::result::Result<(), T> {
        if !self.empty.try_wait() {
            return Err(value);
        }
        self.enqueue(value);
        Ok(())
    }

    /// Enqueue, giving up (and handing the value back) after `timeout`.
    pub fn timed_push(&self, value: T, timeout: Duration) -> core::result::Result<(), T> {
        if self.empty.timed_wait(timeout).is_err() {
            return Err(value);
        }
        self.enqueue(value);
        Ok(())
    }

    /// Dequeue, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        self.full.wait();
        self.dequeue()
    }

    /// Dequeue only if an element is immediately available.
    pub fn try_pop(&self) -> Option<T> {
        self.full.try_wait().then(|| self.dequeue())
    }

    /// Dequeue, giving up after `timeout`.
    pub fn timed_pop(&self, timeout: Duration) -> Result<T> {
        self.full.timed_wait(timeout)?;
        Ok(self.dequeue())
    }

    pub fn len(&self) -> usize {
        self.fifo.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
