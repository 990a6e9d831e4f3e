//! Fixed-capacity slot-pool allocator: the storage layer every container
//! in this crate is built on.
//!
//! A pool is a flat arena of slots plus a per-slot integer occupancy
//! marker. Allocation probes forward from a caller-provided hint
//! (typically the container's live-element count) and wraps at most
//! once; deallocation is O(1) index arithmetic. Slots are addressed by
//! arena-relative indices rather than pointers, so a stale reference is
//! an `Option::None`, never a dangling pointer.
//!
//! Storage for the arena is a tri-state role fixed at construction:
//!
//! - [`SlotPool::new`] — heap-owned, fixed capacity.
//! - [`SlotPool::growable`] — heap-owned, unbounded; a failed probe
//!   appends a fresh slot instead of failing.
//! - [`SlotPool::with_storage`] — caller-owned flat buffer, lent to the
//!   pool for its lifetime. The pool owns the *values* placed in the
//!   buffer (and drops them), never the buffer itself.

use core::mem::MaybeUninit;
use log::{debug, trace};

use crate::error::{Error, Result};

/// Marker value for an unoccupied slot.
const FREE: isize = -1;
/// Marker value for a slot holding a live element.
const OCCUPIED: isize = 0;

/// One arena slot: an occupancy marker and room for one element.
///
/// Callers only ever see this type when lending storage to a pool via
/// [`SlotPool::with_storage`]; the fields are private and a fresh slot
/// is always free.
pub struct PoolSlot<T> {
    marker: isize,
    value: MaybeUninit<T>,
}

impl<T> PoolSlot<T> {
    /// A free slot, fit for lending to [`SlotPool::with_storage`].
    pub fn empty() -> Self {
        Self {
            marker: FREE,
            value: MaybeUninit::uninit(),
        }
    }
}

impl<T> Default for PoolSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Bytes of marker overhead for a caller-sized flat buffer.
pub fn meta_space(max_elts: usize) -> usize {
    max_elts * core::mem::size_of::<isize>()
}

/// Total bytes a caller-supplied flat buffer must provide for
/// `max_elts` elements of `T`: marker overhead plus element storage.
pub fn element_space<T>(max_elts: usize) -> usize {
    meta_space(max_elts) + max_elts * core::mem::size_of::<T>()
}

enum Store<'a, T> {
    Fixed(Box<[PoolSlot<T>]>),
    Growable(Vec<PoolSlot<T>>),
    Borrowed(&'a mut [PoolSlot<T>]),
}

impl<'a, T> Store<'a, T> {
    fn slots(&self) -> &[PoolSlot<T>] {
        match self {
            Store::Fixed(s) => s,
            Store::Growable(s) => s,
            Store::Borrowed(s) => s,
        }
    }

    fn slots_mut(&mut self) -> &mut [PoolSlot<T>] {
        match self {
            Store::Fixed(s) => s,
            Store::Growable(s) => s,
            Store::Borrowed(s) => s,
        }
    }
}

/// Fixed-capacity allocator of `T`-sized slots with probe-from-hint
/// allocation and index-based deallocation.
pub struct SlotPool<'a, T> {
    store: Store<'a, T>,
    live: usize,
}

impl<T> SlotPool<'static, T> {
    /// Heap-owned pool of exactly `capacity` slots.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument("pool capacity must be non-zero"));
        }
        let slots: Box<[PoolSlot<T>]> = (0..capacity).map(|_| PoolSlot::empty()).collect();
        trace!("slot_pool: new fixed pool, capacity={}", capacity);
        Ok(Self {
            store: Store::Fixed(slots),
            live: 0,
        })
    }

    /// Heap-owned pool with no capacity bound; exhausted probes append a
    /// slot instead of failing.
    pub fn growable() -> Self {
        Self {
            store: Store::Growable(Vec::new()),
            live: 0,
        }
    }

    /// Allocate a caller-owned storage buffer suitable for
    /// [`SlotPool::with_storage`].
    pub fn storage(capacity: usize) -> Box<[PoolSlot<T>]> {
        (0..capacity).map(|_| PoolSlot::empty()).collect()
    }
}

impl<'a, T> SlotPool<'a, T> {
    /// Pool over a caller-owned buffer. Every lent slot must be free;
    /// buffers from [`SlotPool::storage`] or built from
    /// [`PoolSlot::empty`] qualify.
    pub fn with_storage(slots: &'a mut [PoolSlot<T>]) -> Result<Self> {
        if slots.is_empty() {
            return Err(Error::InvalidArgument("pool storage must be non-empty"));
        }
        if slots.iter().any(|s| s.marker != FREE) {
            return Err(Error::InvalidArgument("pool storage contains occupied slots"));
        }
        Ok(Self {
            store: Store::Borrowed(slots),
            live: 0,
        })
    }

    /// Number of live (occupied) slots.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Physical slot count. For growable pools this is the current
    /// high-water mark, not a bound.
    pub fn capacity(&self) -> usize {
        self.store.slots().len()
    }

    /// Whether the pool's capacity is fixed at construction.
    pub fn is_bounded(&self) -> bool {
        !matches!(self.store, Store::Growable(_))
    }

    pub fn is_full(&self) -> bool {
        self.is_bounded() && self.live == self.capacity()
    }

    /// Place `value` in the first free slot found scanning forward from
    /// `hint % capacity`, wrapping at most once. Returns the slot index.
    ///
    /// Using the container's live-element count as the hint keeps early
    /// allocations near index 0 and amortizes to O(1) when removals are
    /// roughly uniform; the worst case is O(capacity).
    pub fn insert(&mut self, value: T, hint: usize) -> Result<usize> {
        let index = match self.probe(hint) {
            Some(i) => i,
            None => match &mut self.store {
                Store::Growable(v) => {
                    v.push(PoolSlot::empty());
                    debug!("slot_pool: grew to {} slots", v.len());
                    v.len() - 1
                }
                _ => {
                    trace!("slot_pool: exhausted at capacity {}", self.capacity());
                    return Err(Error::NoSpace);
                }
            },
        };
        let slot = &mut self.store.slots_mut()[index];
        slot.marker = OCCUPIED;
        slot.value.write(value);
        self.live += 1;
        Ok(index)
    }

    /// Free slot `index`, returning its value. Freeing an index that is
    /// already free (or out of range) is a no-op returning `None`.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let slot = self.store.slots_mut().get_mut(index)?;
        if slot.marker != OCCUPIED {
            return None;
        }
        slot.marker = FREE;
        self.live -= 1;
        // Safety: the marker said OCCUPIED, so the value was written by
        // `insert` and not yet taken.
        Some(unsafe { slot.value.assume_init_read() })
    }

    /// Whether `index` currently holds a live element.
    pub fn contains(&self, index: usize) -> bool {
        self.store
            .slots()
            .get(index)
            .map(|s| s.marker == OCCUPIED)
            .unwrap_or(false)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        let slot = self.store.slots().get(index)?;
        if slot.marker != OCCUPIED {
            return None;
        }
        // Safety: occupied slots are initialized.
        Some(unsafe { slot.value.assume_init_ref() })
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let slot = self.store.slots_mut().get_mut(index)?;
        if slot.marker != OCCUPIED {
            return None;
        }
        // Safety: occupied slots are initialized.
        Some(unsafe { slot.value.assume_init_mut() })
    }

    /// Iterate over `(index, &value)` for every live slot.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.store
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.marker == OCCUPIED)
            // Safety: occupied slots are initialized.
            .map(|(i, s)| (i, unsafe { s.value.assume_init_ref() }))
    }

    fn probe(&self, hint: usize) -> Option<usize> {
        let cap = self.capacity();
        if cap == 0 {
            return None;
        }
        let start = hint % cap;
        let slots = self.store.slots();
        (0..cap)
            .map(|i| {
                let j = start + i;
                if j >= cap {
                    j - cap
                } else {
                    j
                }
            })
            .find(|&i| slots[i].marker == FREE)
    }
}

impl<'a, T> Drop for SlotPool<'a, T> {
    fn drop(&mut self) {
        for slot in self.store.slots_mut() {
            if slot.marker == OCCUPIED {
                slot.marker = FREE;
                // Safety: occupied slots are initialized; marker cleared
                // first so a borrowed buffer is left fully free.
                unsafe { slot.value.assume_init_drop() };
            }
        }
    }
}
