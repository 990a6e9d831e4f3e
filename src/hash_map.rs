//! Bucketed hash map over slot-pool payload storage.
//!
//! Layout follows the classic fixed-table design: `n_buckets` buckets,
//! each a bounded [`DynArray`] of hash nodes (key + stored hash +
//! payload index), with every payload allocated from one shared
//! [`SlotPool`]. The pool allocation hint is a remix of the key hash,
//! deliberately decorrelated from the bucket index so bucket clustering
//! does not produce pool hotspots.
//!
//! Collision handling is *bucket-granular* linear probing: when a home
//! bucket is full (and probing is enabled), the add scans subsequent
//! buckets — not slots — wrapping once, and takes the first bucket with
//! free capacity. Lookups and removals retrace the same path.
//!
//! Duplicate detection is scoped by [`DuplicateCheck`]. The legacy
//! `TargetBucket` mode checks only the bucket the add lands in; under
//! probing, a key whose home bucket is full can therefore be inserted
//! again next to a copy it never saw. That blind spot is preserved as
//! documented behavior (and tested); `WholeTable` is the strict mode.

use log::trace;

use crate::dyn_array::{ArrayOpts, CmpFn, DynArray};
use crate::error::{Error, Result};
use crate::slot_pool::{PoolSlot, SlotPool};

/// Pure, deterministic hash over a key. `crate::hash` ships FNV-1a,
/// DJB2, and an avalanche mixer for byte-slice keys.
pub type HashFn<K> = fn(&K) -> u64;

/// One bucket entry. Public only so node math stays visible to sizing
/// helpers; fields are private.
pub struct HashNode<K> {
    key: K,
    hash: u64,
    data: usize,
}

/// Scope of duplicate-key detection on `add`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum DuplicateCheck {
    /// Legacy: only the bucket the add targets is searched. Under
    /// probing this can admit a duplicate whose copy sits in the (full)
    /// home bucket.
    #[default]
    TargetBucket,
    /// Strict: the whole table is searched before any insert.
    WholeTable,
}

/// Construction-time options.
pub struct MapOpts<K> {
    /// Probe forward through buckets when the home bucket is full.
    pub linear_probing: bool,
    /// Keep every bucket sorted by key; lookups binary-search.
    pub keep_sorted: bool,
    /// Every Nth successful add triggers a sort of all buckets,
    /// amortizing binary-search benefit against sort cost.
    pub sort_thresh: Option<usize>,
    pub duplicate_check: DuplicateCheck,
    /// Key ordering; required by `keep_sorted` and `sort_thresh`.
    pub compare: Option<CmpFn<K>>,
}

impl<K> Default for MapOpts<K> {
    fn default() -> Self {
        Self {
            linear_probing: false,
            keep_sorted: false,
            sort_thresh: None,
            duplicate_check: DuplicateCheck::default(),
            compare: None,
        }
    }
}

impl<K> Clone for MapOpts<K> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}
impl<K> Copy for MapOpts<K> {}

/// Diagnostic counters; not correctness-critical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapStats {
    pub n_buckets: usize,
    pub bucket_capacity: usize,
    pub n_nodes: usize,
    pub n_adds: usize,
    pub n_addfails: usize,
    pub n_collisions: usize,
    pub collision_ratio: f64,
    pub min_utilization: f64,
    pub max_utilization: f64,
    pub avg_utilization: f64,
}

/// Fixed-geometry hash map: `n_buckets * bucket_capacity` is the hard
/// element bound.
pub struct PoolHashMap<'a, K: 'static, V> {
    buckets: Vec<DynArray<'static, HashNode<K>>>,
    elements: SlotPool<'a, V>,
    hash: HashFn<K>,
    bucket_capacity: usize,
    opts: MapOpts<K>,
    sorted: bool,
    n_nodes: usize,
    n_adds: usize,
    n_addfails: usize,
    n_collisions: usize,
}

impl<K: Eq, V> PoolHashMap<'static, K, V> {
    /// Heap-managed payload storage.
    pub fn new(
        n_buckets: usize,
        bucket_capacity: usize,
        hash: HashFn<K>,
        opts: MapOpts<K>,
    ) -> Result<Self> {
        Self::validate(n_buckets, bucket_capacity, &opts)?;
        let elements = SlotPool::new(n_buckets * bucket_capacity)?;
        Self::assemble(n_buckets, bucket_capacity, hash, elements, opts)
    }

    /// Caller-owned payload storage buffer sized for the full table.
    pub fn element_storage(n_buckets: usize, bucket_capacity: usize) -> Box<[PoolSlot<V>]> {
        SlotPool::storage(n_buckets * bucket_capacity)
    }
}

impl<'a, K: Eq + 'static, V> PoolHashMap<'a, K, V> {
    /// Payload storage lent by the caller; must cover the full table
    /// (`n_buckets * bucket_capacity` slots).
    pub fn with_element_storage(
        n_buckets: usize,
        bucket_capacity: usize,
        hash: HashFn<K>,
        storage: &'a mut [PoolSlot<V>],
        opts: MapOpts<K>,
    ) -> Result<Self> {
        Self::validate(n_buckets, bucket_capacity, &opts)?;
        if storage.len() < n_buckets * bucket_capacity {
            return Err(Error::InvalidArgument("element storage smaller than table"));
        }
        let elements = SlotPool::with_storage(storage)?;
        Self::assemble(n_buckets, bucket_capacity, hash, elements, opts)
    }

    fn validate(n_buckets: usize, bucket_capacity: usize, opts: &MapOpts<K>) -> Result<()> {
        if n_buckets == 0 || bucket_capacity == 0 {
            return Err(Error::InvalidArgument("table geometry must be non-zero"));
        }
        if (opts.keep_sorted || opts.sort_thresh.is_some()) && opts.compare.is_none() {
            return Err(Error::InvalidArgument("sorted modes require a comparator"));
        }
        if opts.sort_thresh == Some(0) {
            return Err(Error::InvalidArgument("sort_thresh must be non-zero"));
        }
        Ok(())
    }

    fn assemble(
        n_buckets: usize,
        bucket_capacity: usize,
        hash: HashFn<K>,
        elements: SlotPool<'a, V>,
        opts: MapOpts<K>,
    ) -> Result<Self> {
        let mut buckets = Vec::with_capacity(n_buckets);
        for _ in 0..n_buckets {
            buckets.push(DynArray::with_capacity(
                bucket_capacity,
                ArrayOpts {
                    max_elts: Some(bucket_capacity),
                    ..ArrayOpts::default()
                },
            )?);
        }
        Ok(Self {
            buckets,
            elements,
            hash,
            bucket_capacity,
            opts,
            sorted: false,
            n_nodes: 0,
            n_adds: 0,
            n_addfails: 0,
            n_collisions: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.n_nodes
    }

    pub fn is_empty(&self) -> bool {
        self.n_nodes == 0
    }

    pub fn n_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Hard bound on element count.
    pub fn max_elts(&self) -> usize {
        self.buckets.len() * self.bucket_capacity
    }

    pub fn is_full(&self) -> bool {
        self.n_nodes >= self.max_elts()
    }

    fn home_bucket(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Pool hint remixed from the hash; intentionally not the bucket
    /// index, so bucket clustering doesn't hotspot the pool probe.
    fn pool_hint(hash: u64) -> usize {
        (hash ^ (hash >> 32)).wrapping_mul(0x9e37_79b9_7f4a_7c15) as usize
    }

    /// Position of `key` within one bucket, binary-searching when the
    /// table is known sorted.
    fn position_in(&self, bucket: usize, key: &K, hash: u64) -> Option<usize> {
        let nodes = self.buckets[bucket].as_slice();
        if self.sorted {
            if let Some(cmp) = self.opts.compare {
                let i = nodes.binary_search_by(|n| cmp(&n.key, key)).ok()?;
                return (nodes[i].key == *key).then_some(i);
            }
        }
        nodes
            .iter()
            .position(|n| n.hash == hash && n.key == *key)
    }

    /// Walk the probe path (home bucket, then forward with wrap when
    /// probing is enabled) until `visit` returns a result.
    fn probe_path<R>(&self, home: usize, mut visit: impl FnMut(usize) -> Option<R>) -> Option<R> {
        let n = self.buckets.len();
        let span = if self.opts.linear_probing { n } else { 1 };
        (0..span)
            .map(|i| (home + i) % n)
            .find_map(|b| visit(b))
    }

    /// Insert `key -> value`.
    ///
    /// Fails with `NoSpace` when the home bucket is full and probing is
    /// off, or every bucket on the probe path is full. Fails with
    /// `DuplicateKey` per the configured [`DuplicateCheck`] scope —
    /// note the `TargetBucket` blind spot described at module level.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        match self.try_add(key, value) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.n_addfails += 1;
                Err(e)
            }
        }
    }

    fn try_add(&mut self, key: K, value: V) -> Result<()> {
        let hash = (self.hash)(&key);
        let home = self.home_bucket(hash);

        if self.opts.duplicate_check == DuplicateCheck::WholeTable {
            let dup = (0..self.buckets.len()).any(|b| self.position_in(b, &key, hash).is_some());
            if dup {
                return Err(Error::DuplicateKey);
            }
        }

        let target = self
            .probe_path(home, |b| (!self.buckets[b].is_full()).then_some(b))
            .ok_or(Error::NoSpace)?;
        if target != home {
            trace!("hash_map: probed from bucket {} to {}", home, target);
        }

        if self.opts.duplicate_check == DuplicateCheck::TargetBucket
            && self.position_in(target, &key, hash).is_some()
        {
            return Err(Error::DuplicateKey);
        }

        let data = self.elements.insert(value, Self::pool_hint(hash))?;
        let node = HashNode { key, hash, data };
        if let Err(e) = self.buckets[target].push(node) {
            // Unreachable given the is_full pre-check; unwind anyway so
            // the payload slot cannot leak.
            self.elements.remove(data);
            return Err(e);
        }

        if self.buckets[target].len() > 1 {
            self.n_collisions += 1;
        }
        self.n_nodes += 1;
        self.n_adds += 1;
        self.sorted = false;

        if self.opts.keep_sorted {
            self.sort()?;
        } else if let Some(thresh) = self.opts.sort_thresh {
            if self.n_adds % thresh == 0 {
                self.sort()?;
            }
        }
        Ok(())
    }

    fn locate(&self, key: &K) -> Option<(usize, usize)> {
        let hash = (self.hash)(key);
        let home = self.home_bucket(hash);
        self.probe_path(home, |b| self.position_in(b, key, hash).map(|i| (b, i)))
    }

    /// Borrow the value stored for `key`; absence is `None`, not an
    /// error.
    pub fn get(&self, key: &K) -> Option<&V> {
        let (b, i) = self.locate(key)?;
        self.elements.get(self.buckets[b].as_slice()[i].data)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (b, i) = self.locate(key)?;
        let data = self.buckets[b].as_slice()[i].data;
        self.elements.get_mut(data)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }

    /// Remove `key`, returning its value. Removing an absent key is
    /// success (`Ok(None)`) and leaves every counter untouched.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let Some((b, i)) = self.locate(key) else {
            return Ok(None);
        };
        let node = self.buckets[b].remove(i)?;
        let value = self
            .elements
            .remove(node.data)
            .ok_or(Error::StructuralInvariant("payload slot already free"))?;
        self.n_nodes -= 1;
        if self.opts.keep_sorted {
            // Bucket removal is swap-based; restore order eagerly.
            self.sort_bucket(b);
        } else {
            self.sorted = false;
        }
        Ok(Some(value))
    }

    fn sort_bucket(&mut self, bucket: usize) {
        if let Some(cmp) = self.opts.compare {
            self.buckets[bucket]
                .as_mut_slice()
                .sort_by(|a, b| cmp(&a.key, &b.key));
        }
    }

    /// Sort every bucket by key.
    pub fn sort(&mut self) -> Result<()> {
        if self.opts.compare.is_none() {
            return Err(Error::NoComparator);
        }
        for b in 0..self.buckets.len() {
            self.sort_bucket(b);
        }
        self.sorted = true;
        Ok(())
    }

    /// Iterate `(key, value)` in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets.iter().flat_map(move |bucket| {
            bucket.iter().map(move |n| {
                let v = self.elements.get(n.data).expect("live payload slot");
                (&n.key, v)
            })
        })
    }

    /// Utilization and collision counters.
    pub fn stats(&self) -> MapStats {
        let n = self.buckets.len();
        let cap = self.bucket_capacity as f64;
        let utils = self.buckets.iter().map(|b| b.len() as f64 / cap);
        let (mut min, mut max, mut sum) = (f64::MAX, 0.0f64, 0.0f64);
        for u in utils {
            min = min.min(u);
            max = max.max(u);
            sum += u;
        }
        MapStats {
            n_buckets: n,
            bucket_capacity: self.bucket_capacity,
            n_nodes: self.n_nodes,
            n_adds: self.n_adds,
            n_addfails: self.n_addfails,
            n_collisions: self.n_collisions,
            collision_ratio: if self.n_adds == 0 {
                0.0
            } else {
                self.n_collisions as f64 / self.n_adds as f64
            },
            min_utilization: if n == 0 { 0.0 } else { min },
            max_utilization: max,
            avg_utilization: if n == 0 { 0.0 } else { sum / n as f64 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::fnv1a;

    fn str_hash(k: &&str) -> u64 {
        fnv1a(k.as_bytes())
    }

    /// Hash by trailing digit so tests can steer keys into buckets:
    /// "a0" -> bucket 0 (of 2), "b1" -> bucket 1, etc.
    fn steered(k: &&str) -> u64 {
        u64::from(k.as_bytes()[k.len() - 1] - b'0')
    }

    fn str_cmp(a: &&str, b: &&str) -> core::cmp::Ordering {
        a.cmp(b)
    }

    /// Invariant: add then get round-trips; remove then get misses;
    /// counters track live nodes.
    #[test]
    fn add_get_remove_round_trip() {
        let mut m: PoolHashMap<&str, u32> =
            PoolHashMap::new(4, 4, str_hash, MapOpts::default()).unwrap();
        m.add("alpha", 1).unwrap();
        m.add("beta", 2).unwrap();
        assert_eq!(m.get(&"alpha"), Some(&1));
        assert_eq!(m.get(&"beta"), Some(&2));
        assert_eq!(m.len(), 2);

        assert_eq!(m.remove(&"alpha").unwrap(), Some(1));
        assert_eq!(m.get(&"alpha"), None);
        assert_eq!(m.len(), 1);
    }

    /// Invariant: removing an absent key is success and leaves n_nodes
    /// unchanged.
    #[test]
    fn remove_idempotent() {
        let mut m: PoolHashMap<&str, u32> =
            PoolHashMap::new(2, 2, str_hash, MapOpts::default()).unwrap();
        m.add("k", 7).unwrap();
        assert_eq!(m.remove(&"missing").unwrap(), None);
        assert_eq!(m.remove(&"k").unwrap(), Some(7));
        assert_eq!(m.remove(&"k").unwrap(), None);
        assert_eq!(m.len(), 0);
    }

    /// Scenario: n_buckets=2, bucket_capacity=2, probing off. Two keys
    /// fill bucket 0; a third bucket-0 key fails with NoSpace even
    /// though bucket 1 has space; a bucket-1 key still succeeds.
    #[test]
    fn full_home_bucket_without_probing() {
        let mut m: PoolHashMap<&str, u32> =
            PoolHashMap::new(2, 2, steered, MapOpts::default()).unwrap();
        m.add("a0", 1).unwrap();
        m.add("b0", 2).unwrap();
        assert_eq!(m.add("c0", 3), Err(Error::NoSpace));
        m.add("d1", 4).unwrap();
        assert_eq!(m.get(&"d1"), Some(&4));
        assert_eq!(m.stats().n_addfails, 1);
    }

    /// Invariant: with probing enabled the same overflow lands in the
    /// next bucket with space, and lookups retrace the probe path.
    #[test]
    fn probing_overflows_to_next_bucket() {
        let mut m: PoolHashMap<&str, u32> = PoolHashMap::new(
            2,
            2,
            steered,
            MapOpts {
                linear_probing: true,
                ..MapOpts::default()
            },
        )
        .unwrap();
        m.add("a0", 1).unwrap();
        m.add("b0", 2).unwrap();
        m.add("c0", 3).unwrap(); // probes into bucket 1
        assert_eq!(m.get(&"c0"), Some(&3));
        assert_eq!(m.remove(&"c0").unwrap(), Some(3));

        // With probing, the table fills completely before NoSpace.
        m.add("c0", 3).unwrap();
        m.add("d1", 4).unwrap();
        assert!(m.is_full());
        assert_eq!(m.add("e0", 5), Err(Error::NoSpace));
    }

    /// Invariant: duplicates are rejected within the target bucket.
    #[test]
    fn duplicate_in_target_bucket_rejected() {
        let mut m: PoolHashMap<&str, u32> =
            PoolHashMap::new(2, 2, steered, MapOpts::default()).unwrap();
        m.add("a0", 1).unwrap();
        assert_eq!(m.add("a0", 2), Err(Error::DuplicateKey));
        assert_eq!(m.get(&"a0"), Some(&1));
        assert_eq!(m.stats().n_addfails, 1);
    }

    /// Documented blind spot: under probing with the legacy
    /// TargetBucket scope, a duplicate whose home bucket is full lands
    /// in the probed bucket undetected.
    #[test]
    fn legacy_duplicate_blind_spot_under_probing() {
        let mut m: PoolHashMap<&str, u32> = PoolHashMap::new(
            2,
            2,
            steered,
            MapOpts {
                linear_probing: true,
                ..MapOpts::default()
            },
        )
        .unwrap();
        m.add("a0", 1).unwrap();
        m.add("b0", 2).unwrap();
        // Home bucket 0 is full; the duplicate probes to bucket 1 and
        // is admitted next to nothing it recognizes.
        m.add("a0", 99).unwrap();
        assert_eq!(m.len(), 3);
    }

    /// Invariant: WholeTable scope closes the blind spot.
    #[test]
    fn strict_duplicate_check_spans_table() {
        let mut m: PoolHashMap<&str, u32> = PoolHashMap::new(
            2,
            2,
            steered,
            MapOpts {
                linear_probing: true,
                duplicate_check: DuplicateCheck::WholeTable,
                ..MapOpts::default()
            },
        )
        .unwrap();
        m.add("a0", 1).unwrap();
        m.add("b0", 2).unwrap();
        assert_eq!(m.add("a0", 99), Err(Error::DuplicateKey));
        assert_eq!(m.len(), 2);
    }

    /// Invariant: collision counting is per-bucket occupancy (2nd+
    /// element), and the ratio tracks adds.
    #[test]
    fn collision_accounting() {
        let mut m: PoolHashMap<&str, u32> =
            PoolHashMap::new(2, 4, steered, MapOpts::default()).unwrap();
        m.add("a0", 1).unwrap();
        m.add("b1", 2).unwrap();
        assert_eq!(m.stats().n_collisions, 0);
        m.add("c0", 3).unwrap();
        m.add("d0", 4).unwrap();
        let s = m.stats();
        assert_eq!(s.n_collisions, 2);
        assert_eq!(s.n_adds, 4);
        assert!((s.collision_ratio - 0.5).abs() < f64::EPSILON);
    }

    /// Invariant: utilization stats reflect bucket fill levels.
    #[test]
    fn utilization_stats() {
        let mut m: PoolHashMap<&str, u32> =
            PoolHashMap::new(2, 2, steered, MapOpts::default()).unwrap();
        m.add("a0", 1).unwrap();
        m.add("b0", 2).unwrap();
        let s = m.stats();
        assert_eq!(s.min_utilization, 0.0);
        assert_eq!(s.max_utilization, 1.0);
        assert!((s.avg_utilization - 0.5).abs() < f64::EPSILON);
    }

    /// Invariant: keep_sorted buckets stay key-ordered across adds and
    /// removals, and lookups still hit.
    #[test]
    fn keep_sorted_buckets() {
        let mut m: PoolHashMap<&str, u32> = PoolHashMap::new(
            1,
            8,
            str_hash,
            MapOpts {
                keep_sorted: true,
                compare: Some(str_cmp),
                ..MapOpts::default()
            },
        )
        .unwrap();
        for (i, k) in ["delta", "alpha", "echo", "bravo", "charlie"]
            .into_iter()
            .enumerate()
        {
            m.add(k, i as u32).unwrap();
        }
        let keys: Vec<&str> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta", "echo"]);
        m.remove(&"charlie").unwrap();
        let keys: Vec<&str> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "delta", "echo"]);
        assert_eq!(m.get(&"echo"), Some(&2));
    }

    /// Invariant: sort_thresh sorts all buckets every Nth successful
    /// add.
    #[test]
    fn periodic_sort_threshold() {
        let mut m: PoolHashMap<&str, u32> = PoolHashMap::new(
            1,
            8,
            str_hash,
            MapOpts {
                sort_thresh: Some(4),
                compare: Some(str_cmp),
                ..MapOpts::default()
            },
        )
        .unwrap();
        for (i, k) in ["d", "a", "c", "b"].into_iter().enumerate() {
            m.add(k, i as u32).unwrap();
        }
        let keys: Vec<&str> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    /// Invariant: sorted modes without a comparator are rejected at
    /// construction.
    #[test]
    fn sorted_modes_require_comparator() {
        let r: Result<PoolHashMap<&str, u32>> = PoolHashMap::new(
            2,
            2,
            str_hash,
            MapOpts {
                keep_sorted: true,
                ..MapOpts::default()
            },
        );
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
    }

    /// Invariant: caller-lent payload storage backs the table; an
    /// undersized buffer is rejected before construction.
    #[test]
    fn lent_element_storage() {
        let mut buf = PoolHashMap::<&str, u32>::element_storage(2, 2);
        {
            let mut m =
                PoolHashMap::with_element_storage(2, 2, steered, &mut buf, MapOpts::default())
                    .unwrap();
            m.add("a0", 1).unwrap();
            m.add("b1", 2).unwrap();
            assert_eq!(m.get(&"a0"), Some(&1));
        }
        let mut small = PoolHashMap::<&str, u32>::element_storage(1, 1);
        let r = PoolHashMap::<&str, u32>::with_element_storage(
            2,
            2,
            steered,
            &mut small,
            MapOpts::default(),
        );
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
    }

    /// Invariant: filling the whole table with unique keys succeeds up
    /// to max_elts with probing, then fails.
    #[test]
    fn fill_entire_table_with_probing() {
        let mut m: PoolHashMap<String, usize> = PoolHashMap::new(
            4,
            4,
            |k: &String| fnv1a(k.as_bytes()),
            MapOpts {
                linear_probing: true,
                ..MapOpts::default()
            },
        )
        .unwrap();
        for i in 0..16 {
            m.add(format!("key-{i}"), i).unwrap();
        }
        assert!(m.is_full());
        assert_eq!(m.add("overflow".to_string(), 99), Err(Error::NoSpace));
        for i in 0..16 {
            assert_eq!(m.get(&format!("key-{i}")), Some(&i));
        }
    }
}
