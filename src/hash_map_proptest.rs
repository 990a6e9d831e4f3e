#![cfg(test)]

// Property tests for PoolHashMap kept inside the crate so they can use
// the same hash functions the map sees.

use crate::error::Error;
use crate::hash::fnv1a;
use crate::hash_map::{DuplicateCheck, MapOpts, PoolHashMap};
use proptest::prelude::*;
use std::collections::HashMap;

fn key_hash(k: &String) -> u64 {
    fnv1a(k.as_bytes())
}

#[derive(Clone, Debug)]
enum Op {
    Add(usize, i32),
    Remove(usize),
    Get(usize),
    Iterate,
}

// Pool-indexed operations, as in the rest of the suite: indices shrink
// to earlier keys and op lists shrink in length.
fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{1,6}", 1..=10).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Add(i, v)),
            idx.clone().prop_map(Op::Remove),
            idx.clone().prop_map(Op::Get),
            Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: With probing enabled and whole-table duplicate checking,
// the map is state-machine equivalent to std HashMap, except that adds
// fail with NoSpace exactly when the table holds max_elts entries.
// Invariants exercised:
// - Add/get/remove round-trip; duplicate adds reject; absent removes
//   are Ok(None) and leave counters untouched.
// - len parity with the model after every operation.
// - Iteration yields each live entry exactly once.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_probing((pool, ops) in arb_scenario()) {
        const N_BUCKETS: usize = 4;
        const BSIZE: usize = 2;
        const MAX: usize = N_BUCKETS * BSIZE;

        let mut sut: PoolHashMap<String, i32> = PoolHashMap::new(
            N_BUCKETS,
            BSIZE,
            key_hash,
            MapOpts {
                linear_probing: true,
                duplicate_check: DuplicateCheck::WholeTable,
                ..MapOpts::default()
            },
        )
        .unwrap();
        let mut model: HashMap<String, i32> = HashMap::new();

        for op in ops {
            match op {
                Op::Add(i, v) => {
                    let k = pool[i].clone();
                    let already = model.contains_key(&k);
                    match sut.add(k.clone(), v) {
                        Ok(()) => {
                            prop_assert!(!already, "duplicate must reject");
                            prop_assert!(model.len() < MAX, "add must fail at max_elts");
                            model.insert(k, v);
                        }
                        Err(Error::DuplicateKey) => prop_assert!(already),
                        Err(Error::NoSpace) => {
                            prop_assert!(!already);
                            prop_assert_eq!(model.len(), MAX);
                        }
                        Err(e) => prop_assert!(false, "unexpected error {:?}", e),
                    }
                }
                Op::Remove(i) => {
                    let k = &pool[i];
                    let got = sut.remove(k).unwrap();
                    prop_assert_eq!(got, model.remove(k));
                }
                Op::Get(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.get(k).copied(), model.get(k).copied());
                    prop_assert_eq!(sut.contains_key(k), model.contains_key(k));
                }
                Op::Iterate => {
                    let mut seen: Vec<(String, i32)> =
                        sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    let mut expect: Vec<(String, i32)> =
                        model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    seen.sort();
                    expect.sort();
                    prop_assert_eq!(seen, expect);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.stats().n_nodes, model.len());
        }
    }
}

// Property: With probing disabled, admission is bucket-local — an add
// succeeds iff the key's home bucket has space and does not already
// hold the key. The model tracks per-bucket membership using the same
// hash function as the map.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_bucket_local_admission((pool, ops) in arb_scenario()) {
        const N_BUCKETS: usize = 4;
        const BSIZE: usize = 2;

        let mut sut: PoolHashMap<String, i32> =
            PoolHashMap::new(N_BUCKETS, BSIZE, key_hash, MapOpts::default()).unwrap();
        // Model: per-bucket vector of (key, value).
        let mut buckets: Vec<Vec<(String, i32)>> = vec![Vec::new(); N_BUCKETS];
        let home = |k: &String| (key_hash(k) % N_BUCKETS as u64) as usize;

        for op in ops {
            match op {
                Op::Add(i, v) => {
                    let k = pool[i].clone();
                    let b = home(&k);
                    let dup = buckets[b].iter().any(|(mk, _)| *mk == k);
                    let full = buckets[b].len() == BSIZE;
                    match sut.add(k.clone(), v) {
                        Ok(()) => {
                            prop_assert!(!dup && !full);
                            buckets[b].push((k, v));
                        }
                        // A full home bucket reports NoSpace before the
                        // duplicate check ever runs.
                        Err(Error::DuplicateKey) => prop_assert!(dup && !full),
                        Err(Error::NoSpace) => prop_assert!(full),
                        Err(e) => prop_assert!(false, "unexpected error {:?}", e),
                    }
                }
                Op::Remove(i) => {
                    let k = &pool[i];
                    let b = home(k);
                    let expect = buckets[b]
                        .iter()
                        .position(|(mk, _)| mk == k)
                        .map(|p| buckets[b].remove(p).1);
                    prop_assert_eq!(sut.remove(k).unwrap(), expect);
                }
                Op::Get(i) => {
                    let k = &pool[i];
                    let b = home(k);
                    let expect = buckets[b]
                        .iter()
                        .find(|(mk, _)| mk == k)
                        .map(|(_, v)| *v);
                    prop_assert_eq!(sut.get(k).copied(), expect);
                }
                Op::Iterate => {}
            }

            let total: usize = buckets.iter().map(Vec::len).sum();
            prop_assert_eq!(sut.len(), total);
        }
    }
}
