//! Fixed-capacity ring buffer.
//!
//! The FIFO underneath [`crate::sync::BoundedQueue`]; also usable on
//! its own. Storage is owned or caller-lent, capacity is fixed either
//! way, and `push` reports `NoSpace` rather than overwriting.

use core::mem::MaybeUninit;

use crate::error::{Error, Result};

enum Store<'a, T> {
    Owned(Box<[MaybeUninit<T>]>),
    Lent(&'a mut [MaybeUninit<T>]),
}

impl<'a, T> Store<'a, T> {
    fn buf(&self) -> &[MaybeUninit<T>] {
        match self {
            Store::Owned(b) => b,
            Store::Lent(b) => b,
        }
    }

    fn buf_mut(&mut self) -> &mut [MaybeUninit<T>] {
        match self {
            Store::Owned(b) => b,
            Store::Lent(b) => b,
        }
    }
}

/// Bounded first-in/first-out queue over a ring of slots.
pub struct Fifo<'a, T> {
    store: Store<'a, T>,
    head: usize,
    len: usize,
}

impl<T> Fifo<'static, T> {
    /// Heap-owned ring of exactly `capacity` slots.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument("fifo capacity must be non-zero"));
        }
        let buf: Box<[MaybeUninit<T>]> = (0..capacity).map(|_| MaybeUninit::uninit()).collect();
        Ok(Self {
            store: Store::Owned(buf),
            head: 0,
            len: 0,
        })
    }
}

impl<'a, T> Fifo<'a, T> {
    /// Ring over a caller-lent buffer.
    pub fn with_storage(buf: &'a mut [MaybeUninit<T>]) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument("fifo storage must be non-empty"));
        }
        Ok(Self {
            store: Store::Lent(buf),
            head: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.store.buf().len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Enqueue at the tail; `NoSpace` when full.
    pub fn push(&mut self, value: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::NoSpace);
        }
        let cap = self.capacity();
        let tail = (self.head + self.len) % cap;
        self.store.buf_mut()[tail].write(value);
        self.len += 1;
        Ok(())
    }

    /// Dequeue from the head.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let cap = self.capacity();
        let head = self.head;
        self.head = (head + 1) % cap;
        self.len -= 1;
        // Safety: slots between head and tail were written by push.
        Some(unsafe { self.store.buf()[head].assume_init_read() })
    }

    /// Borrow the element that `pop` would return next.
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // Safety: head slot is initialized while len > 0.
        Some(unsafe { self.store.buf()[self.head].assume_init_ref() })
    }
}

impl<'a, T> Drop for Fifo<'a, T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: FIFO ordering holds across wrap-around.
    #[test]
    fn ordering_across_wrap() {
        let mut f: Fifo<u32> = Fifo::new(3).unwrap();
        f.push(1).unwrap();
        f.push(2).unwrap();
        assert_eq!(f.pop(), Some(1));
        f.push(3).unwrap();
        f.push(4).unwrap(); // wraps
        assert_eq!(f.pop(), Some(2));
        assert_eq!(f.pop(), Some(3));
        assert_eq!(f.pop(), Some(4));
        assert_eq!(f.pop(), None);
    }

    /// Invariant: push at capacity fails without clobbering contents.
    #[test]
    fn push_full_fails() {
        let mut f: Fifo<u32> = Fifo::new(2).unwrap();
        f.push(1).unwrap();
        f.push(2).unwrap();
        assert_eq!(f.push(3), Err(Error::NoSpace));
        assert_eq!(f.front(), Some(&1));
        assert_eq!(f.len(), 2);
    }

    /// Invariant: lent storage round-trips and drops its live elements.
    #[test]
    fn lent_storage() {
        use std::rc::Rc;
        let token = Rc::new(());
        let mut buf: Vec<MaybeUninit<Rc<()>>> = (0..2).map(|_| MaybeUninit::uninit()).collect();
        {
            let mut f = Fifo::with_storage(&mut buf).unwrap();
            f.push(token.clone()).unwrap();
            f.push(token.clone()).unwrap();
            assert_eq!(Rc::strong_count(&token), 3);
        }
        assert_eq!(Rc::strong_count(&token), 1);
    }
}
