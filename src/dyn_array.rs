//! Policy-flagged contiguous array with owned or caller-lent storage.
//!
//! `DynArray` is the bucket primitive for [`crate::hash_map`] and a
//! standalone container in its own right. The dense prefix `[0, len)`
//! is always initialized; storage is either an owned `Vec` (grows by
//! doubling, shrinks by halving at load factor <= 1/4) or a
//! caller-supplied `&mut [MaybeUninit<T>]` with fixed capacity.
//!
//! Two policy flags shape the mutation operations:
//!
//! - `maintain_order`: insert shifts the tail right (O(n)) instead of
//!   swapping the displaced element to the end (O(1), breaks order).
//! - `keep_sorted`: a full re-sort runs after every insert and removal
//!   shifts instead of swap-removing. Requires a comparator; the
//!   combination is rejected at construction otherwise.

use core::cmp::Ordering;
use core::mem::MaybeUninit;
use log::trace;

use crate::error::{Error, Result};

/// Comparator used by sorted modes and queries.
pub type CmpFn<T> = fn(&T, &T) -> Ordering;

/// Construction-time options; the storage role is picked by the
/// constructor, everything else lives here.
pub struct ArrayOpts<T> {
    /// Upper bound on element count; `None` means unbounded (owned
    /// storage only — lent storage is always bounded by the buffer).
    pub max_elts: Option<usize>,
    /// Preserve insertion order on unordered inserts (O(n) shift).
    pub maintain_order: bool,
    /// Re-sort eagerly after every insert; keep removals order-stable.
    pub keep_sorted: bool,
    /// Comparator; required by `keep_sorted`, `sort`, and queries.
    pub compare: Option<CmpFn<T>>,
}

impl<T> Default for ArrayOpts<T> {
    fn default() -> Self {
        Self {
            max_elts: None,
            maintain_order: false,
            keep_sorted: false,
            compare: None,
        }
    }
}

impl<T> Clone for ArrayOpts<T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}
impl<T> Copy for ArrayOpts<T> {}

enum Store<'a, T> {
    Owned(Vec<T>),
    Lent {
        buf: &'a mut [MaybeUninit<T>],
        len: usize,
    },
}

impl<'a, T> Store<'a, T> {
    fn len(&self) -> usize {
        match self {
            Store::Owned(v) => v.len(),
            Store::Lent { len, .. } => *len,
        }
    }

    fn capacity(&self) -> usize {
        match self {
            Store::Owned(v) => v.capacity(),
            Store::Lent { buf, .. } => buf.len(),
        }
    }

    fn as_slice(&self) -> &[T] {
        match self {
            Store::Owned(v) => v,
            // Safety: `[0, len)` is the initialized dense prefix.
            Store::Lent { buf, len } => unsafe {
                core::slice::from_raw_parts(buf.as_ptr().cast::<T>(), *len)
            },
        }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Store::Owned(v) => v,
            // Safety: `[0, len)` is the initialized dense prefix.
            Store::Lent { buf, len } => unsafe {
                core::slice::from_raw_parts_mut(buf.as_mut_ptr().cast::<T>(), *len)
            },
        }
    }

    /// Append. Space must have been checked for lent storage.
    fn push(&mut self, value: T) {
        match self {
            Store::Owned(v) => {
                if v.len() == v.capacity() {
                    // Double (minimum 1) rather than Vec's default policy
                    // so shrink arithmetic stays predictable.
                    v.reserve_exact(v.capacity().max(1));
                }
                v.push(value);
            }
            Store::Lent { buf, len } => {
                debug_assert!(*len < buf.len());
                buf[*len].write(value);
                *len += 1;
            }
        }
    }

    /// Shift-insert preserving order. Space must have been checked.
    fn insert_at(&mut self, index: usize, value: T) {
        match self {
            Store::Owned(v) => v.insert(index, value),
            Store::Lent { buf, len } => {
                debug_assert!(*len < buf.len() && index <= *len);
                // Safety: moves the initialized tail up by one slot
                // within the buffer's capacity.
                unsafe {
                    let p = buf.as_mut_ptr().add(index);
                    core::ptr::copy(p, p.add(1), *len - index);
                }
                buf[index].write(value);
                *len += 1;
            }
        }
    }

    /// Shift-remove preserving order.
    fn remove_at(&mut self, index: usize) -> T {
        match self {
            Store::Owned(v) => v.remove(index),
            Store::Lent { buf, len } => {
                debug_assert!(index < *len);
                // Safety: reads the initialized element, then closes the
                // gap; `len` is decremented so the tail slot is treated
                // as uninitialized again.
                unsafe {
                    let p = buf.as_mut_ptr().add(index);
                    let value = p.cast::<T>().read();
                    core::ptr::copy(p.add(1), p, *len - index - 1);
                    *len -= 1;
                    value
                }
            }
        }
    }

    /// O(1) remove: the last element moves into the vacated slot.
    fn swap_remove(&mut self, index: usize) -> T {
        match self {
            Store::Owned(v) => v.swap_remove(index),
            Store::Lent { buf, len } => {
                debug_assert!(index < *len);
                // Safety: both indices are within the initialized prefix.
                unsafe {
                    let p = buf.as_mut_ptr();
                    let value = p.add(index).cast::<T>().read();
                    if index != *len - 1 {
                        core::ptr::copy_nonoverlapping(p.add(*len - 1), p.add(index), 1);
                    }
                    *len -= 1;
                    value
                }
            }
        }
    }
}

/// Growable/fixed contiguous buffer with order and sortedness policies.
pub struct DynArray<'a, T> {
    store: Store<'a, T>,
    opts: ArrayOpts<T>,
    sorted: bool,
}

impl<T> DynArray<'static, T> {
    /// Owned storage, initially empty.
    pub fn new(opts: ArrayOpts<T>) -> Result<Self> {
        Self::with_capacity(0, opts)
    }

    /// Owned storage with `capacity` slots pre-reserved.
    pub fn with_capacity(capacity: usize, opts: ArrayOpts<T>) -> Result<Self> {
        Self::validate(&opts)?;
        Ok(Self {
            store: Store::Owned(Vec::with_capacity(capacity)),
            opts,
            sorted: false,
        })
    }
}

impl<'a, T> DynArray<'a, T> {
    /// Caller-lent storage; capacity is fixed at `buf.len()`.
    pub fn with_storage(buf: &'a mut [MaybeUninit<T>], opts: ArrayOpts<T>) -> Result<Self> {
        Self::validate(&opts)?;
        if buf.is_empty() {
            return Err(Error::InvalidArgument("array storage must be non-empty"));
        }
        Ok(Self {
            store: Store::Lent { buf, len: 0 },
            opts,
            sorted: false,
        })
    }

    fn validate(opts: &ArrayOpts<T>) -> Result<()> {
        if opts.keep_sorted && opts.compare.is_none() {
            return Err(Error::InvalidArgument("keep_sorted requires a comparator"));
        }
        if opts.max_elts == Some(0) {
            return Err(Error::InvalidArgument("max_elts must be non-zero"));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical capacity currently reserved.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Hard bound on element count, if any.
    pub fn max_elts(&self) -> Option<usize> {
        match &self.store {
            Store::Owned(_) => self.opts.max_elts,
            Store::Lent { buf, .. } => {
                Some(self.opts.max_elts.map_or(buf.len(), |m| m.min(buf.len())))
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.max_elts().is_some_and(|m| self.len() >= m)
    }

    /// Whether the contents are currently known to be sorted.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn as_slice(&self) -> &[T] {
        self.store.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.store.as_mut_slice()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.store.as_mut_slice().get_mut(index)
    }

    /// Overwrite the element at `index`.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let slot = self
            .store
            .as_mut_slice()
            .get_mut(index)
            .ok_or(Error::InvalidArgument("index out of bounds"))?;
        *slot = value;
        self.sorted = false;
        Ok(())
    }

    /// Insert `value` at `index` (`index == len` appends).
    ///
    /// Without `maintain_order`, the element previously at `index` is
    /// swapped to the end (O(1)); with it, the tail shifts right (O(n)).
    /// With `keep_sorted`, a full re-sort follows — O(n log n) per
    /// insert, acceptable only for small arrays.
    pub fn insert(&mut self, value: T, index: usize) -> Result<()> {
        if index > self.len() {
            return Err(Error::InvalidArgument("insert index out of bounds"));
        }
        if self.is_full() {
            return Err(Error::NoSpace);
        }
        if index == self.len() {
            self.store.push(value);
        } else if self.opts.maintain_order {
            self.store.insert_at(index, value);
        } else {
            let displaced = core::mem::replace(&mut self.store.as_mut_slice()[index], value);
            self.store.push(displaced);
        }
        self.sorted = false;
        if self.opts.keep_sorted {
            self.sort()?;
        }
        Ok(())
    }

    /// Append at the end.
    pub fn push(&mut self, value: T) -> Result<()> {
        self.insert(value, self.len())
    }

    /// Remove and return the element at `index`.
    ///
    /// With `keep_sorted` the tail shifts left to preserve order;
    /// otherwise the last element moves into the vacated slot. Owned
    /// storage shrinks by half once load factor drops to 1/4 (never
    /// below the live count).
    pub fn remove(&mut self, index: usize) -> Result<T> {
        if index >= self.len() {
            return Err(Error::InvalidArgument("remove index out of bounds"));
        }
        let value = if self.opts.keep_sorted {
            self.store.remove_at(index)
        } else {
            self.sorted = false;
            self.store.swap_remove(index)
        };
        self.maybe_shrink();
        Ok(value)
    }

    fn maybe_shrink(&mut self) {
        if let Store::Owned(v) = &mut self.store {
            if v.capacity() >= 4 && v.len() * 4 <= v.capacity() {
                let target = (v.capacity() / 2).max(v.len());
                v.shrink_to(target);
                trace!("dyn_array: shrank to capacity {}", v.capacity());
            }
        }
    }

    /// Adjust reserved capacity. Fails on lent storage (fixed) and when
    /// `new_capacity` cannot hold the live elements.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        match &mut self.store {
            Store::Owned(v) => {
                if new_capacity < v.len() {
                    return Err(Error::InvalidArgument("resize below live count"));
                }
                if new_capacity > v.capacity() {
                    v.reserve_exact(new_capacity - v.len());
                } else {
                    v.shrink_to(new_capacity);
                }
                Ok(())
            }
            Store::Lent { .. } => Err(Error::InvalidArgument("lent storage has fixed capacity")),
        }
    }

    /// Sort the contents with the configured comparator.
    pub fn sort(&mut self) -> Result<()> {
        let cmp = self.opts.compare.ok_or(Error::NoComparator)?;
        self.store.as_mut_slice().sort_by(cmp);
        self.sorted = true;
        Ok(())
    }

    /// Locate an element equal (per the comparator) to `needle`.
    ///
    /// Binary search when the array is known sorted. Otherwise a linear
    /// scan that deliberately does not short-circuit: the index of the
    /// *last* match is returned. Callers relying on first-match order
    /// must sort first.
    pub fn index_query(&self, needle: &T) -> Result<Option<usize>> {
        let cmp = self.opts.compare.ok_or(Error::NoComparator)?;
        if self.sorted {
            return Ok(self.as_slice().binary_search_by(|e| cmp(e, needle)).ok());
        }
        let mut found = None;
        for (i, e) in self.as_slice().iter().enumerate() {
            if cmp(e, needle) == Ordering::Equal {
                found = Some(i);
            }
        }
        Ok(found)
    }

    /// Move every element matching `pred` out into a new owned array
    /// (same options). Source retains exactly the non-matching elements.
    pub fn filter<F>(&mut self, mut pred: F) -> Result<DynArray<'static, T>>
    where
        F: FnMut(&T) -> bool,
    {
        let mut out = DynArray::new(self.opts)?;
        let mut i = 0;
        while i < self.len() {
            if pred(&self.as_slice()[i]) {
                let v = self.remove(i)?;
                out.store.push(v);
                // Swap-remove moved an unexamined element into `i`.
            } else {
                i += 1;
            }
        }
        if self.opts.keep_sorted {
            out.sort()?;
        }
        Ok(out)
    }

    /// Deep copy into owned storage; mutating the copy never affects
    /// the original.
    pub fn copy(&self) -> Result<DynArray<'static, T>>
    where
        T: Clone,
    {
        let mut out = DynArray::with_capacity(self.len(), self.opts)?;
        if let Store::Owned(v) = &mut out.store {
            v.extend_from_slice(self.as_slice());
        }
        out.sorted = self.sorted;
        Ok(out)
    }

    /// Apply `f` to every element in place.
    pub fn map<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        for e in self.store.as_mut_slice() {
            f(e);
        }
        self.sorted = false;
    }

    /// Fold the elements left to right.
    pub fn fold<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, &T) -> A,
    {
        self.as_slice().iter().fold(init, f)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<'a, T> Drop for DynArray<'a, T> {
    fn drop(&mut self) {
        if let Store::Lent { buf, len } = &mut self.store {
            // Safety: drops exactly the initialized prefix of the lent
            // buffer; the buffer itself belongs to the caller.
            unsafe {
                core::ptr::drop_in_place(core::slice::from_raw_parts_mut(
                    buf.as_mut_ptr().cast::<T>(),
                    *len,
                ));
            }
            *len = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending(a: &i32, b: &i32) -> Ordering {
        a.cmp(b)
    }

    fn opts() -> ArrayOpts<i32> {
        ArrayOpts::default()
    }

    /// Scenario: maintain_order off, insert [10,20,30], remove index 0
    /// -> the last element moves into the hole: [30, 20].
    #[test]
    fn swap_remove_moves_last_into_hole() {
        let mut a = DynArray::new(opts()).unwrap();
        for v in [10, 20, 30] {
            a.push(v).unwrap();
        }
        assert_eq!(a.remove(0).unwrap(), 10);
        assert_eq!(a.as_slice(), &[30, 20]);
    }

    /// Invariant: maintain_order inserts shift the tail; order holds.
    #[test]
    fn ordered_insert_shifts() {
        let mut a = DynArray::new(ArrayOpts {
            maintain_order: true,
            ..opts()
        })
        .unwrap();
        for v in [1, 3, 4] {
            a.push(v).unwrap();
        }
        a.insert(2, 1).unwrap();
        assert_eq!(a.as_slice(), &[1, 2, 3, 4]);
    }

    /// Invariant: unordered insert at an interior index swaps the
    /// displaced element to the end.
    #[test]
    fn unordered_insert_swaps_displaced_to_end() {
        let mut a = DynArray::new(opts()).unwrap();
        for v in [1, 2, 3] {
            a.push(v).unwrap();
        }
        a.insert(9, 0).unwrap();
        assert_eq!(a.as_slice(), &[9, 2, 3, 1]);
    }

    /// Invariant: bounded arrays reject inserts at max_elts with
    /// NoSpace and state is untouched.
    #[test]
    fn bounded_insert_fails_full() {
        let mut a = DynArray::new(ArrayOpts {
            max_elts: Some(2),
            ..opts()
        })
        .unwrap();
        a.push(1).unwrap();
        a.push(2).unwrap();
        assert_eq!(a.push(3), Err(Error::NoSpace));
        assert_eq!(a.as_slice(), &[1, 2]);
    }

    /// Invariant: keep_sorted without a comparator is rejected at init.
    #[test]
    fn keep_sorted_requires_comparator() {
        let r = DynArray::<i32>::new(ArrayOpts {
            keep_sorted: true,
            ..ArrayOpts::default()
        });
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
    }

    /// Invariant: keep_sorted re-sorts after every insert and removal
    /// preserves order via shift.
    #[test]
    fn keep_sorted_stays_sorted() {
        let mut a = DynArray::new(ArrayOpts {
            keep_sorted: true,
            compare: Some(ascending),
            ..ArrayOpts::default()
        })
        .unwrap();
        for v in [5, 1, 4, 2, 3] {
            a.push(v).unwrap();
        }
        assert_eq!(a.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(a.remove(2).unwrap(), 3);
        assert_eq!(a.as_slice(), &[1, 2, 4, 5]);
        assert!(a.is_sorted());
    }

    /// Documented quirk: the unsorted linear scan returns the *last*
    /// matching index, not the first.
    #[test]
    fn index_query_returns_last_match_when_unsorted() {
        let mut a = DynArray::new(ArrayOpts {
            compare: Some(ascending),
            ..ArrayOpts::default()
        })
        .unwrap();
        for v in [7, 1, 7, 2, 7] {
            a.push(v).unwrap();
        }
        assert_eq!(a.index_query(&7).unwrap(), Some(4));
        assert_eq!(a.index_query(&3).unwrap(), None);
    }

    /// Invariant: once sorted, queries use binary search and hit.
    #[test]
    fn index_query_binary_after_sort() {
        let mut a = DynArray::new(ArrayOpts {
            compare: Some(ascending),
            ..ArrayOpts::default()
        })
        .unwrap();
        for v in [9, 3, 7, 1] {
            a.push(v).unwrap();
        }
        a.sort().unwrap();
        assert_eq!(a.index_query(&7).unwrap(), Some(2));
        assert!(a.index_query(&0).unwrap().is_none());
    }

    /// Invariant: queries without a comparator are rejected.
    #[test]
    fn index_query_without_comparator_errors() {
        let mut a = DynArray::new(opts()).unwrap();
        a.push(1).unwrap();
        assert_eq!(a.index_query(&1), Err(Error::NoComparator));
    }

    /// Invariant: filter partitions — result matches, remainder doesn't;
    /// counts add up.
    #[test]
    fn filter_partitions() {
        let mut a = DynArray::new(opts()).unwrap();
        for v in 0..10 {
            a.push(v).unwrap();
        }
        let evens = a.filter(|v| v % 2 == 0).unwrap();
        assert_eq!(evens.len() + a.len(), 10);
        assert!(evens.iter().all(|v| v % 2 == 0));
        assert!(a.iter().all(|v| v % 2 == 1));
    }

    /// Invariant: copy is deep — mutating the copy leaves the original.
    #[test]
    fn copy_is_independent() {
        let mut a = DynArray::new(opts()).unwrap();
        for v in [1, 2, 3] {
            a.push(v).unwrap();
        }
        let mut b = a.copy().unwrap();
        b.set(0, 99).unwrap();
        b.push(4).unwrap();
        assert_eq!(a.as_slice(), &[1, 2, 3]);
        assert_eq!(b.as_slice(), &[99, 2, 3, 4]);
    }

    /// Invariant: map/fold visit every element.
    #[test]
    fn map_and_fold() {
        let mut a = DynArray::new(opts()).unwrap();
        for v in [1, 2, 3] {
            a.push(v).unwrap();
        }
        a.map(|v| *v *= 10);
        assert_eq!(a.fold(0, |acc, v| acc + v), 60);
    }

    /// Invariant: round trip returns to empty; removal indexes stay
    /// valid throughout.
    #[test]
    fn insert_all_remove_all() {
        let mut a = DynArray::new(opts()).unwrap();
        for v in 0..64 {
            a.push(v).unwrap();
        }
        while !a.is_empty() {
            a.remove(0).unwrap();
        }
        assert_eq!(a.len(), 0);
    }

    /// Invariant: lent storage enforces its fixed capacity and resize
    /// is refused.
    #[test]
    fn lent_storage_fixed_capacity() {
        let mut buf: Vec<MaybeUninit<i32>> = (0..3).map(|_| MaybeUninit::uninit()).collect();
        let mut a = DynArray::with_storage(&mut buf, ArrayOpts::default()).unwrap();
        for v in [1, 2, 3] {
            a.push(v).unwrap();
        }
        assert_eq!(a.push(4), Err(Error::NoSpace));
        assert!(matches!(a.resize(8), Err(Error::InvalidArgument(_))));
        assert_eq!(a.as_slice(), &[1, 2, 3]);
    }

    /// Invariant: lent storage drops its live elements when the array
    /// is dropped.
    #[test]
    fn lent_storage_drops_elements() {
        use std::rc::Rc;
        let token = Rc::new(());
        let mut buf: Vec<MaybeUninit<Rc<()>>> = (0..4).map(|_| MaybeUninit::uninit()).collect();
        {
            let mut a = DynArray::with_storage(&mut buf, ArrayOpts::default()).unwrap();
            for _ in 0..3 {
                a.push(token.clone()).unwrap();
            }
            assert_eq!(Rc::strong_count(&token), 4);
        }
        assert_eq!(Rc::strong_count(&token), 1);
    }

    /// Invariant: owned storage shrinks by half at load factor <= 1/4,
    /// never below the live count.
    #[test]
    fn shrink_on_low_load() {
        let mut a = DynArray::new(opts()).unwrap();
        for v in 0..32 {
            a.push(v).unwrap();
        }
        let cap_before = a.capacity();
        while a.len() > 4 {
            a.remove(a.len() - 1).unwrap();
        }
        assert!(a.capacity() < cap_before);
        assert!(a.capacity() >= a.len());
    }
}
