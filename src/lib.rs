//! slotpool: fixed-capacity containers backed by an intrusive
//! slot-pool allocator.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: give every container the same manual-memory discipline — a
//!   capped arena of fixed-size slots with per-slot occupancy markers —
//!   so backing storage can come from the heap or from an
//!   application-owned buffer, chosen per role at construction.
//! - Layers:
//!   - SlotPool<T>: the allocator. Probe-from-hint allocation over a
//!     flat slot arena, O(1) index-based deallocation, tri-state
//!     storage (owned fixed / growable / caller-lent).
//!   - DynArray<T>: contiguous buffer with order/sortedness policies;
//!     doubles as the bucket primitive for the hash map.
//!   - LinkedList<T>: index-linked doubly linked list whose node and
//!     element storage are two *independent* pool roles.
//!   - PoolHashMap<K, V>: bucket array of bounded DynArrays of hash
//!     nodes, payloads in one shared SlotPool, bucket-granular linear
//!     probing.
//!   - Fifo<T> / sync: bounded ring buffer, counting semaphore, fair
//!     reader/writer lock, bounded MPMC queue composed from them.
//!
//! Constraints
//! - Slots are addressed by arena-relative indices, never pointers; a
//!   stale reference is a `None`, not a dangling pointer.
//! - Containers are not internally thread-safe; `sync` provides the
//!   pieces callers compose around them.
//! - Element references are borrows, valid until the next structural
//!   mutation; no pointer-stability guarantees across insert/remove.
//! - Storage roles are fixed at construction and enforced by the type
//!   system (constructor choice), not by runtime flag checks.
//!
//! Why this split?
//! - Localize invariants: the allocator's occupancy/live-count contract
//!   is stated and tested once, then leaned on by every container.
//! - Minimize unsafe: `MaybeUninit` handling is confined to the storage
//!   layers (SlotPool, DynArray, Fifo); the container logic above them
//!   is safe index manipulation.
//! - Clear failure boundaries: every public operation validates its
//!   preconditions and fails before mutating; defensive structural
//!   checks surface as `Error::StructuralInvariant` instead of being
//!   ignored.
//!
//! Error policy
//! - Absence is not failure: lookups return `Option`, removals of
//!   absent keys return `Ok(None)`.
//! - Capacity exhaustion is `Error::NoSpace` wherever it arises (full
//!   bucket, full pool, full ring); retry policy belongs to the caller.

mod dyn_array;
mod error;
mod fifo;
pub mod hash;
mod hash_map;
mod hash_map_proptest;
mod linked_list;
mod slot_pool;
mod slot_pool_proptest;
pub mod sync;

// Public surface
pub use dyn_array::{ArrayOpts, CmpFn, DynArray};
pub use error::{Error, Result};
pub use fifo::Fifo;
pub use hash_map::{DuplicateCheck, HashFn, HashNode, MapOpts, MapStats, PoolHashMap};
pub use linked_list::{LinkedList, ListNode, ListOpts, NodeRef};
pub use slot_pool::{element_space, meta_space, PoolSlot, SlotPool};
