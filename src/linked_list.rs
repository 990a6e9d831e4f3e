//! Doubly-linked list threaded through slot pools.
//!
//! Nodes and element payloads live in two *independent*
//! [`SlotPool`](crate::slot_pool::SlotPool) roles, so either can be
//! heap-owned (fixed or growable) or caller-lent, in any combination.
//! Links are arena-relative indices; a [`NodeRef`] is an index plus
//! nothing else, so the list can be restructured freely without any
//! pointer invalidation hazards.
//!
//! The element payload is freed before its node on every removal, and
//! the merge sort re-counts the chain afterwards, surfacing
//! `StructuralInvariant` rather than silently truncating.

use core::cmp::Ordering;
use log::trace;

use crate::dyn_array::CmpFn;
use crate::error::{Error, Result};
use crate::slot_pool::{PoolSlot, SlotPool};

/// Link record stored in the node pool. Opaque to callers; public only
/// so caller-lent node storage can be sized and lent
/// (`&mut [PoolSlot<ListNode>]`).
pub struct ListNode {
    prev: Option<usize>,
    next: Option<usize>,
    data: usize,
}

/// Stable reference to a node in a particular list. Only meaningful for
/// the list that produced it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NodeRef(usize);

/// Construction-time options.
pub struct ListOpts<T> {
    /// Upper bound on element count; `None` means unbounded.
    pub max_elts: Option<usize>,
    /// Re-sort eagerly after every append/prepend (O(n log n) each;
    /// the documented tradeoff for cheap ordered reads).
    pub keep_sorted: bool,
    /// Comparator; required by `keep_sorted`, `sort`, `remove`, and
    /// `find`.
    pub compare: Option<CmpFn<T>>,
}

impl<T> Default for ListOpts<T> {
    fn default() -> Self {
        Self {
            max_elts: None,
            keep_sorted: false,
            compare: None,
        }
    }
}

impl<T> Clone for ListOpts<T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}
impl<T> Copy for ListOpts<T> {}

/// Doubly-linked list over slot-pool node and element storage.
pub struct LinkedList<'a, T> {
    nodes: SlotPool<'a, ListNode>,
    elements: SlotPool<'a, T>,
    first: Option<usize>,
    last: Option<usize>,
    len: usize,
    opts: ListOpts<T>,
    sorted: bool,
}

impl<T> LinkedList<'static, T> {
    /// Heap-managed storage: fixed pools when `max_elts` is bounded,
    /// growable pools otherwise.
    pub fn new(opts: ListOpts<T>) -> Result<Self> {
        Self::validate(&opts)?;
        let (nodes, elements) = match opts.max_elts {
            Some(m) => (SlotPool::new(m)?, SlotPool::new(m)?),
            None => (SlotPool::growable(), SlotPool::growable()),
        };
        Ok(Self::assemble(nodes, elements, opts))
    }

    /// Caller-owned node storage buffer for `max_elts` nodes.
    pub fn node_storage(max_elts: usize) -> Box<[PoolSlot<ListNode>]> {
        SlotPool::storage(max_elts)
    }

    /// Caller-owned element storage buffer for `max_elts` elements.
    pub fn element_storage(max_elts: usize) -> Box<[PoolSlot<T>]> {
        SlotPool::storage(max_elts)
    }
}

impl<'a, T> LinkedList<'a, T> {
    /// Both storage roles lent by the caller. The effective bound is
    /// the smaller of the two buffers (and `opts.max_elts`, if set).
    pub fn with_storage(
        nodes: &'a mut [PoolSlot<ListNode>],
        elements: &'a mut [PoolSlot<T>],
        opts: ListOpts<T>,
    ) -> Result<Self> {
        Self::validate(&opts)?;
        Ok(Self::assemble(
            SlotPool::with_storage(nodes)?,
            SlotPool::with_storage(elements)?,
            opts,
        ))
    }

    /// Fully general constructor: each role brings its own pool, so
    /// owned and lent roles mix freely. Pools must be empty.
    pub fn with_pools(
        nodes: SlotPool<'a, ListNode>,
        elements: SlotPool<'a, T>,
        opts: ListOpts<T>,
    ) -> Result<Self> {
        Self::validate(&opts)?;
        if !nodes.is_empty() || !elements.is_empty() {
            return Err(Error::InvalidArgument("pools must start empty"));
        }
        Ok(Self::assemble(nodes, elements, opts))
    }

    fn assemble(
        nodes: SlotPool<'a, ListNode>,
        elements: SlotPool<'a, T>,
        opts: ListOpts<T>,
    ) -> Self {
        Self {
            nodes,
            elements,
            first: None,
            last: None,
            len: 0,
            opts,
            sorted: false,
        }
    }

    fn validate(opts: &ListOpts<T>) -> Result<()> {
        if opts.keep_sorted && opts.compare.is_none() {
            return Err(Error::InvalidArgument("keep_sorted requires a comparator"));
        }
        if opts.max_elts == Some(0) {
            return Err(Error::InvalidArgument("max_elts must be non-zero"));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Effective capacity bound, combining `max_elts` with any bounded
    /// storage role.
    pub fn max_elts(&self) -> Option<usize> {
        let mut bound = self.opts.max_elts;
        if self.nodes.is_bounded() {
            let c = self.nodes.capacity();
            bound = Some(bound.map_or(c, |b| b.min(c)));
        }
        if self.elements.is_bounded() {
            let c = self.elements.capacity();
            bound = Some(bound.map_or(c, |b| b.min(c)));
        }
        bound
    }

    pub fn is_full(&self) -> bool {
        self.max_elts().is_some_and(|m| self.len >= m)
    }

    pub fn head(&self) -> Option<NodeRef> {
        self.first.map(NodeRef)
    }

    pub fn tail(&self) -> Option<NodeRef> {
        self.last.map(NodeRef)
    }

    pub fn next(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.get(node.0)?.next.map(NodeRef)
    }

    pub fn prev(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.get(node.0)?.prev.map(NodeRef)
    }

    /// Borrow the element held by `node`.
    pub fn value(&self, node: NodeRef) -> Option<&T> {
        let n = self.nodes.get(node.0)?;
        self.elements.get(n.data)
    }

    pub fn value_mut(&mut self, node: NodeRef) -> Option<&mut T> {
        let data = self.nodes.get(node.0)?.data;
        self.elements.get_mut(data)
    }

    pub fn front(&self) -> Option<&T> {
        self.head().and_then(|n| self.value(n))
    }

    pub fn back(&self) -> Option<&T> {
        self.tail().and_then(|n| self.value(n))
    }

    fn alloc(&mut self, value: T) -> Result<usize> {
        if self.is_full() {
            return Err(Error::NoSpace);
        }
        let data = self.elements.insert(value, self.len)?;
        let node = ListNode {
            prev: None,
            next: None,
            data,
        };
        match self.nodes.insert(node, self.len) {
            Ok(i) => Ok(i),
            Err(e) => {
                // Unwind the element allocation so no slot leaks.
                self.elements.remove(data);
                Err(e)
            }
        }
    }

    fn link_mut(&mut self, index: usize) -> &mut ListNode {
        // Index came from our own chain; a miss means the structure is
        // corrupt, which is a crate bug.
        self.nodes.get_mut(index).expect("live list node")
    }

    fn link(&self, index: usize) -> &ListNode {
        self.nodes.get(index).expect("live list node")
    }

    /// Append to the tail: O(1), plus a full re-sort in keep_sorted
    /// mode.
    pub fn append(&mut self, value: T) -> Result<()> {
        let idx = self.alloc(value)?;
        self.link_mut(idx).prev = self.last;
        match self.last {
            Some(t) => self.link_mut(t).next = Some(idx),
            None => self.first = Some(idx),
        }
        self.last = Some(idx);
        self.len += 1;
        self.sorted = false;
        if self.opts.keep_sorted {
            self.sort()?;
        }
        Ok(())
    }

    /// Prepend to the head: O(1), plus a full re-sort in keep_sorted
    /// mode.
    pub fn prepend(&mut self, value: T) -> Result<()> {
        let idx = self.alloc(value)?;
        self.link_mut(idx).next = self.first;
        match self.first {
            Some(h) => self.link_mut(h).prev = Some(idx),
            None => self.last = Some(idx),
        }
        self.first = Some(idx);
        self.len += 1;
        self.sorted = false;
        if self.opts.keep_sorted {
            self.sort()?;
        }
        Ok(())
    }

    /// Unlink and free `node`, returning its element. The payload slot
    /// is released before the node slot.
    ///
    /// The four unlink shapes (sole node, head, tail, interior) are
    /// handled explicitly.
    pub fn delete(&mut self, node: NodeRef) -> Result<T> {
        if !self.nodes.contains(node.0) {
            return Err(Error::InvalidArgument("node does not belong to this list"));
        }
        Ok(self.unlink(node.0))
    }

    fn unlink(&mut self, index: usize) -> T {
        let (prev, next, data) = {
            let n = self.link(index);
            (n.prev, n.next, n.data)
        };
        match (prev, next) {
            // Sole node in the list.
            (None, None) => {
                self.first = None;
                self.last = None;
            }
            // Head node.
            (None, Some(nx)) => {
                self.link_mut(nx).prev = None;
                self.first = Some(nx);
            }
            // Tail node.
            (Some(pv), None) => {
                self.link_mut(pv).next = None;
                self.last = Some(pv);
            }
            // Interior node.
            (Some(pv), Some(nx)) => {
                self.link_mut(pv).next = Some(nx);
                self.link_mut(nx).prev = Some(pv);
            }
        }
        self.len -= 1;
        let value = self.elements.remove(data).expect("live element slot");
        self.nodes.remove(index);
        value
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.first.map(|i| self.unlink(i))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        self.last.map(|i| self.unlink(i))
    }

    /// Find the first node whose element compares equal to `key`.
    pub fn find(&self, key: &T) -> Result<Option<NodeRef>> {
        let cmp = self.opts.compare.ok_or(Error::NoComparator)?;
        let mut cur = self.first;
        while let Some(i) = cur {
            let n = self.link(i);
            let v = self.elements.get(n.data).expect("live element slot");
            if cmp(v, key) == Ordering::Equal {
                return Ok(Some(NodeRef(i)));
            }
            cur = n.next;
        }
        Ok(None)
    }

    /// Remove the first element comparing equal to `key`. Absence is
    /// success (`Ok(None)`): removing something already gone is not a
    /// failure.
    pub fn remove(&mut self, key: &T) -> Result<Option<T>> {
        match self.find(key)? {
            Some(node) => Ok(Some(self.unlink(node.0))),
            None => Ok(None),
        }
    }

    /// Insert `value` immediately before `at`.
    pub fn insert_before(&mut self, at: NodeRef, value: T) -> Result<()> {
        if !self.nodes.contains(at.0) {
            return Err(Error::InvalidArgument("node does not belong to this list"));
        }
        let idx = self.alloc(value)?;
        let prev = self.link(at.0).prev;
        self.link_mut(idx).prev = prev;
        self.link_mut(idx).next = Some(at.0);
        self.link_mut(at.0).prev = Some(idx);
        match prev {
            Some(pv) => self.link_mut(pv).next = Some(idx),
            None => self.first = Some(idx),
        }
        self.len += 1;
        self.sorted = false;
        Ok(())
    }

    /// Move every element of `other` into this list, contiguously and
    /// in order, immediately before `at`. Consumes `other` (its storage
    /// is released when it drops empty).
    ///
    /// Fails with `EmptyOperand` when either list is empty and
    /// `NoSpace` when the combined count would exceed this list's
    /// bound; nothing moves on failure.
    pub fn splice(&mut self, mut other: LinkedList<'_, T>, at: NodeRef) -> Result<()> {
        if self.is_empty() || other.is_empty() {
            return Err(Error::EmptyOperand);
        }
        if !self.nodes.contains(at.0) {
            return Err(Error::InvalidArgument("node does not belong to this list"));
        }
        if let Some(m) = self.max_elts() {
            if self.len + other.len > m {
                return Err(Error::NoSpace);
            }
        }
        trace!("linked_list: splicing {} elements", other.len());
        while let Some(v) = other.pop_front() {
            self.insert_before(at, v)?;
        }
        Ok(())
    }

    /// Move matching elements out into a new heap-managed list,
    /// preserving their relative order.
    ///
    /// The traversal cursor is advanced *before* a matched node is
    /// unlinked; unlinking the node under the cursor would corrupt the
    /// walk.
    pub fn filter<F>(&mut self, mut pred: F) -> Result<LinkedList<'static, T>>
    where
        F: FnMut(&T) -> bool,
    {
        let mut out = LinkedList::new(ListOpts {
            max_elts: None,
            ..self.opts
        })?;
        let mut cur = self.first;
        while let Some(i) = cur {
            let n = self.link(i);
            let next = n.next;
            let matches = {
                let v = self.elements.get(n.data).expect("live element slot");
                pred(v)
            };
            if matches {
                let v = self.unlink(i);
                out.append(v)?;
            }
            cur = next;
        }
        Ok(out)
    }

    /// Deep copy into a new heap-managed list.
    pub fn copy(&self) -> Result<LinkedList<'static, T>>
    where
        T: Clone,
    {
        let mut out = LinkedList::new(ListOpts {
            max_elts: None,
            keep_sorted: false,
            ..self.opts
        })?;
        for v in self.iter() {
            out.append(v.clone())?;
        }
        out.opts.keep_sorted = self.opts.keep_sorted;
        out.sorted = self.sorted;
        Ok(out)
    }

    /// Apply `f` to every element, front to back.
    pub fn map<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        let mut cur = self.first;
        while let Some(i) = cur {
            let (data, next) = {
                let n = self.link(i);
                (n.data, n.next)
            };
            f(self.elements.get_mut(data).expect("live element slot"));
            cur = next;
        }
        self.sorted = false;
    }

    /// Fold the elements front to back.
    pub fn fold<A, F>(&self, init: A, mut f: F) -> A
    where
        F: FnMut(A, &T) -> A,
    {
        let mut acc = init;
        for v in self.iter() {
            acc = f(acc, v);
        }
        acc
    }

    /// Bottom-up iterative merge sort (stable). Rebuilds `prev` links
    /// and the tail pointer afterwards, and re-counts the chain: a
    /// mismatch against the pre-sort count surfaces as
    /// `StructuralInvariant`.
    pub fn sort(&mut self) -> Result<()> {
        let cmp = self.opts.compare.ok_or(Error::NoComparator)?;
        if self.len < 2 {
            self.sorted = true;
            return Ok(());
        }

        let mut head = self.first;
        let mut width = 1usize;
        loop {
            let mut merges = 0usize;
            let mut remainder = head;
            head = None;
            let mut tail: Option<usize> = None;

            while let Some(p_start) = remainder {
                merges += 1;
                // Carve a run of `width` nodes starting at p_start.
                let mut q_start = Some(p_start);
                let mut p_len = 0usize;
                for _ in 0..width {
                    match q_start {
                        Some(i) => {
                            p_len += 1;
                            q_start = self.link(i).next;
                        }
                        None => break,
                    }
                }
                let mut p = Some(p_start);
                let mut q = q_start;
                let mut q_len = width;

                // Merge the p-run with the q-run.
                while p_len > 0 || (q_len > 0 && q.is_some()) {
                    let take_p = if p_len == 0 {
                        false
                    } else if q_len == 0 || q.is_none() {
                        true
                    } else {
                        let pv = self.node_value(p.expect("run head"));
                        let qv = self.node_value(q.expect("run head"));
                        cmp(pv, qv) != Ordering::Greater
                    };
                    let e = if take_p {
                        let i = p.expect("run head");
                        p = self.link(i).next;
                        p_len -= 1;
                        i
                    } else {
                        let i = q.expect("run head");
                        q = self.link(i).next;
                        q_len -= 1;
                        i
                    };
                    match tail {
                        Some(t) => self.link_mut(t).next = Some(e),
                        None => head = Some(e),
                    }
                    tail = Some(e);
                }
                remainder = q;
            }
            if let Some(t) = tail {
                self.link_mut(t).next = None;
            }
            if merges <= 1 {
                break;
            }
            width *= 2;
        }

        // Rebuild prev links and the tail pointer; verify the count.
        self.first = head;
        let mut count = 0usize;
        let mut prev: Option<usize> = None;
        let mut cur = head;
        while let Some(i) = cur {
            self.link_mut(i).prev = prev;
            prev = Some(i);
            count += 1;
            cur = self.link(i).next;
        }
        self.last = prev;
        if count != self.len {
            return Err(Error::StructuralInvariant("merge sort lost nodes"));
        }
        self.sorted = true;
        Ok(())
    }

    fn node_value(&self, index: usize) -> &T {
        let data = self.link(index).data;
        self.elements.get(data).expect("live element slot")
    }

    pub fn iter(&self) -> Iter<'_, 'a, T> {
        Iter {
            list: self,
            front: self.first,
            back: self.last,
            remaining: self.len,
        }
    }
}

/// Double-ended element iterator.
pub struct Iter<'l, 'a, T> {
    list: &'l LinkedList<'a, T>,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'l, 'a, T> Iterator for Iter<'l, 'a, T> {
    type Item = &'l T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let i = self.front?;
        self.remaining -= 1;
        self.front = self.list.link(i).next;
        Some(self.list.node_value(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'l, 'a, T> DoubleEndedIterator for Iter<'l, 'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let i = self.back?;
        self.remaining -= 1;
        self.back = self.list.link(i).prev;
        Some(self.list.node_value(i))
    }
}

impl<'l, 'a, T> ExactSizeIterator for Iter<'l, 'a, T> {}
