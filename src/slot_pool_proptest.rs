#![cfg(test)]

// Property tests for SlotPool kept inside the crate so they exercise
// the allocator directly, without going through a container.

use crate::error::Error;
use crate::slot_pool::SlotPool;
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, usize), // value, hint
    Remove(usize),      // slot index (may be stale or out of range)
    Get(usize),
}

fn arb_ops(capacity: usize) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        (any::<u16>(), 0..capacity * 2).prop_map(|(v, h)| Op::Insert(v, h)),
        (0..capacity + 2).prop_map(Op::Remove),
        (0..capacity + 2).prop_map(Op::Get),
    ];
    proptest::collection::vec(op, 1..80)
}

// Property: State-machine equivalence against a map of live slots.
// Invariants exercised across random operation sequences:
// - The occupied count always equals the number of outstanding
//   (un-freed) allocations.
// - Insert succeeds exactly while live < capacity; at capacity it
//   fails with NoSpace and changes nothing.
// - Returned indices are free at allocation time and never alias a
//   live slot.
// - Remove returns the exact value stored at that index, exactly once;
//   repeats and wild indices are no-ops.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops(8)) {
        const CAP: usize = 8;
        let mut sut: SlotPool<u16> = SlotPool::new(CAP).unwrap();
        let mut model: HashMap<usize, u16> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(v, hint) => {
                    match sut.insert(v, hint) {
                        Ok(idx) => {
                            prop_assert!(model.len() < CAP, "insert must fail at capacity");
                            prop_assert!(idx < CAP);
                            let prev = model.insert(idx, v);
                            prop_assert!(prev.is_none(), "allocated index was already live");
                        }
                        Err(e) => {
                            prop_assert_eq!(e, Error::NoSpace);
                            prop_assert_eq!(model.len(), CAP, "NoSpace only at capacity");
                        }
                    }
                }
                Op::Remove(idx) => {
                    let got = sut.remove(idx);
                    let expect = model.remove(&idx);
                    prop_assert_eq!(got, expect);
                }
                Op::Get(idx) => {
                    prop_assert_eq!(sut.get(idx).copied(), model.get(&idx).copied());
                    prop_assert_eq!(sut.contains(idx), model.contains_key(&idx));
                }
            }

            // Post-conditions after each op.
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_full(), model.len() == CAP);
            let live: usize = sut.iter().count();
            prop_assert_eq!(live, model.len());
        }
    }
}

// Property: the probe scans forward from the hint and returns the
// first free slot, wrapping at most once. Checked by reconstructing
// the expected index from the model's occupancy.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_probe_first_free_from_hint(ops in arb_ops(6)) {
        const CAP: usize = 6;
        let mut sut: SlotPool<u16> = SlotPool::new(CAP).unwrap();
        let mut model: HashMap<usize, u16> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(v, hint) => {
                    let expect = (0..CAP)
                        .map(|i| (hint % CAP + i) % CAP)
                        .find(|i| !model.contains_key(i));
                    match (sut.insert(v, hint), expect) {
                        (Ok(idx), Some(e)) => {
                            prop_assert_eq!(idx, e, "probe must take the first free slot");
                            model.insert(idx, v);
                        }
                        (Err(Error::NoSpace), None) => {}
                        (got, want) => {
                            prop_assert!(false, "mismatch: got {:?}, expected {:?}", got, want);
                        }
                    }
                }
                Op::Remove(idx) => {
                    prop_assert_eq!(sut.remove(idx), model.remove(&idx));
                }
                Op::Get(_) => {}
            }
        }
    }
}
