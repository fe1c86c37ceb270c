//! Property tests for slot allocation and the subscription registry.

use proptest::prelude::*;
use std::collections::HashSet;
use xplane_udp_client::{SlotTable, SubscriptionRegistry};

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    Release(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..8).prop_map(Op::Alloc),
        (0usize..32).prop_map(Op::Release),
    ]
}

proptest! {
    #[test]
    fn live_ranges_never_overlap(ops in proptest::collection::vec(op(), 1..64)) {
        let mut table = SlotTable::new();
        let mut live: Vec<(usize, usize)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(len) => {
                    let start = table.find_space(len);
                    for &(other, other_len) in &live {
                        prop_assert!(start + len <= other || other + other_len <= start);
                    }
                    prop_assert!(start + len <= table.len());
                    live.push((start, len));
                }
                Op::Release(pick) => {
                    if !live.is_empty() {
                        let (start, len) = live.swap_remove(pick % live.len());
                        table.release(start, len);
                    }
                }
            }
            let used: usize = live.iter().map(|&(_, len)| len).sum();
            prop_assert_eq!(table.used_count(), used);
        }
    }

    #[test]
    fn release_and_reallocate_stays_below_high_water(
        lens in proptest::collection::vec(1usize..6, 1..16),
    ) {
        let mut table = SlotTable::new();
        let starts: Vec<usize> = lens.iter().map(|&len| table.find_space(len)).collect();
        let high_water = table.len();

        for (&start, &len) in starts.iter().zip(&lens) {
            table.release(start, len);
            let again = table.find_space(len);
            prop_assert!(again + len <= high_water);
        }
        prop_assert_eq!(table.len(), high_water);
    }

    #[test]
    fn table_grows_by_exactly_the_request(lens in proptest::collection::vec(1usize..10, 1..20)) {
        let mut table = SlotTable::new();
        let mut expected = 0;
        for len in lens {
            prop_assert_eq!(table.find_space(len), expected);
            expected += len;
            prop_assert_eq!(table.len(), expected);
        }
    }

    #[test]
    fn duplicate_names_share_a_handle(
        names in proptest::collection::vec("[a-c]{1,2}", 1..32),
    ) {
        let mut registry = SubscriptionRegistry::new();
        let mut handles = Vec::new();
        for name in &names {
            let added = registry
                .add_scalar(name, 1)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            handles.push((name.clone(), added.handle));
        }

        let unique: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(registry.len(), unique.len());
        prop_assert_eq!(registry.slots().len(), unique.len());
        for (name, handle) in handles {
            prop_assert_eq!(registry.handle_of(&name), Some(handle));
        }
    }

    #[test]
    fn active_requests_cover_every_live_slot(
        lens in proptest::collection::vec(1usize..5, 1..10),
        stop in proptest::collection::vec(any::<bool>(), 10),
    ) {
        let mut registry = SubscriptionRegistry::new();
        let mut handles = Vec::new();
        for (i, &len) in lens.iter().enumerate() {
            let added = registry
                .add_array(&format!("arr{i}"), len, 2)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            handles.push(added.handle);
        }
        for (handle, &stop) in handles.iter().zip(&stop) {
            if stop {
                registry
                    .change_frequency(*handle, 0)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
        }

        let slots: HashSet<i32> = registry.active_requests().iter().map(|r| r.slot).collect();
        let live = registry.slots().used_count();
        prop_assert_eq!(slots.len(), live);
        for slot in slots {
            let slot = usize::try_from(slot).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(registry.slots().is_used(slot));
        }
    }
}
