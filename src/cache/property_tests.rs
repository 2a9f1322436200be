//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the memory tier limits and the disk sweep ordering.

use proptest::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::cache::{DiskStore, MemoryStore};
use crate::key::ResourceKey;

// == Strategies ==
/// Generates resource addresses from a small alphabet so keys repeat
fn address_strategy() -> impl Strategy<Value = String> {
    "https://img\\.example\\.com/[a-e]{1,2}\\.png"
}

#[derive(Debug, Clone)]
enum MemoryOp {
    Put { address: String, cost: usize },
    Get { address: String },
    Remove { address: String },
    RemoveAll,
}

fn memory_op_strategy() -> impl Strategy<Value = MemoryOp> {
    prop_oneof![
        6 => (address_strategy(), 0usize..400)
            .prop_map(|(address, cost)| MemoryOp::Put { address, cost }),
        3 => address_strategy().prop_map(|address| MemoryOp::Get { address }),
        1 => address_strategy().prop_map(|address| MemoryOp::Remove { address }),
        1 => Just(MemoryOp::RemoveAll),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, the memory tier never exceeds its cost
    // or count limit, and its reported cost equals the sum of live entries.
    #[test]
    fn prop_memory_limits_hold(
        ops in prop::collection::vec(memory_op_strategy(), 1..80),
        cost_limit in 100usize..1000,
        count_limit in 1usize..8,
    ) {
        let mut store = MemoryStore::new(cost_limit, count_limit);
        let mut costs: HashMap<String, usize> = HashMap::new();

        for op in ops {
            match op {
                MemoryOp::Put { address, cost } => {
                    store.put(ResourceKey::new(address.clone()), cost, cost);
                    costs.insert(address, cost);
                }
                MemoryOp::Get { address } => {
                    if let Some(value) = store.get(&ResourceKey::new(address.clone())) {
                        prop_assert_eq!(Some(&value), costs.get(&address));
                    }
                }
                MemoryOp::Remove { address } => {
                    store.remove(&ResourceKey::new(address));
                }
                MemoryOp::RemoveAll => store.remove_all(),
            }

            prop_assert!(store.len() <= count_limit, "count {} > {}", store.len(), count_limit);
            prop_assert!(store.total_cost() <= cost_limit, "cost {} > {}", store.total_cost(), cost_limit);

            let live: usize = costs
                .iter()
                .filter(|(address, _)| store.contains(&ResourceKey::new(address.as_str())))
                .map(|(_, cost)| *cost)
                .sum();
            prop_assert_eq!(live, store.total_cost());
        }
    }

    // The most recently written entry survives any insertion that fits on its own.
    #[test]
    fn prop_latest_put_survives(
        ops in prop::collection::vec((address_strategy(), 0usize..100), 1..40),
    ) {
        let mut store = MemoryStore::new(100, 3);
        for (address, cost) in ops {
            let key = ResourceKey::new(address);
            store.put(key.clone(), cost, cost);
            prop_assert!(store.contains(&key));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // After a sweep, the disk tier fits its size limit, and every surviving
    // record is newer than every record removed for capacity.
    #[test]
    fn prop_disk_sweep_removes_oldest_first(
        sizes in prop::collection::vec(1usize..64, 1..12),
        size_limit in 0u64..400,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskStore::new(temp_dir.path(), size_limit, Duration::from_secs(3600));

        // Record i is (n - i) minutes old: insertion order is oldest to newest
        let n = sizes.len() as u64;
        let mut paths = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let path = store.path_for(&ResourceKey::new(format!("r{}", i)));
            fs::write(&path, vec![0u8; *size]).unwrap();
            let mtime = SystemTime::now() - Duration::from_secs((n - i as u64) * 60);
            filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(mtime)).unwrap();
            paths.push(path);
        }

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let report = runtime.block_on(store.run_maintenance());
        let remaining = runtime.block_on(store.size_on_disk());

        prop_assert!(remaining <= size_limit);
        prop_assert_eq!(remaining, report.bytes_remaining);

        let survived: Vec<bool> = paths.iter().map(|p| p.exists()).collect();
        if let Some(first_kept) = survived.iter().position(|kept| *kept) {
            prop_assert!(survived[first_kept..].iter().all(|kept| *kept));
        }

        let second = runtime.block_on(store.run_maintenance());
        prop_assert_eq!(second.removed(), 0);
    }
}
