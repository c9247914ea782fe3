/*!
 * Paging Invariant Tests
 * Random admit/release/access sequences keep page accounting exact
 */

use myos_kernel::config::MemoryConfig;
use myos_kernel::memory::{MemoryError, MemoryManager};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Admit { pid: u32, size: usize },
    Release { pid: u32 },
    Read { pid: u32, address: usize },
    Write { pid: u32, address: usize, value: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..6, 1usize..24).prop_map(|(pid, size)| Op::Admit { pid, size }),
        (1u32..6).prop_map(|pid| Op::Release { pid }),
        (1u32..6, 0usize..24).prop_map(|(pid, address)| Op::Read { pid, address }),
        (1u32..6, 0usize..24, any::<u8>())
            .prop_map(|(pid, address, value)| Op::Write { pid, address, value }),
    ]
}

fn manager() -> MemoryManager {
    MemoryManager::with_config(&MemoryConfig {
        total_memory: 32,
        page_size: 4,
        page_table_capacity: 6,
    })
}

fn apply(mm: &MemoryManager, op: &Op) {
    match *op {
        Op::Admit { pid, size } => {
            let _ = mm.admit(pid, size);
        }
        Op::Release { pid } => {
            mm.release(pid);
        }
        Op::Read { pid, address } => {
            if let Err(MemoryError::PageFault { .. }) = mm.read(pid, address) {
                let _ = mm.read(pid, address);
            }
        }
        Op::Write {
            pid,
            address,
            value,
        } => {
            if let Err(MemoryError::PageFault { .. }) = mm.write(pid, address, value) {
                let _ = mm.write(pid, address, value);
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_pages_always_accounted(ops in prop::collection::vec(op(), 1..60)) {
        let mm = manager();
        for op in &ops {
            apply(&mm, op);
            prop_assert!(mm.check_invariant(), "invariant broken after {:?}", op);
        }
    }

    #[test]
    fn prop_blocks_cover_total_memory(ops in prop::collection::vec(op(), 1..60)) {
        let mm = manager();
        for op in &ops {
            apply(&mm, op);
        }

        let free: usize = mm.free_blocks().iter().map(|b| b.size).sum();
        let used: usize = mm.allocated_blocks().iter().map(|b| b.size).sum();
        prop_assert_eq!(free + used, mm.total_memory());
        prop_assert_eq!(free, mm.free_memory());
    }

    #[test]
    fn prop_failed_admission_leaves_no_trace(size in 25usize..64) {
        let mm = manager();
        let before = mm.page_status();
        prop_assert!(mm.admit(9, size).is_err());
        prop_assert!(!mm.is_admitted(9));
        prop_assert_eq!(mm.page_status(), before);
    }
}

#[test]
fn test_written_values_survive_eviction() {
    let mm = manager();
    mm.admit(1, 16).unwrap();
    for vpn in 0..4 {
        mm.write(1, vpn * 4, vpn as u8 + 10).unwrap();
    }
    // Fill the rest of memory and push pid 1 out page by page
    mm.admit(2, 16).unwrap();
    mm.admit(3, 16).unwrap();
    assert!(mm.swapped_page_count() >= 4);

    for vpn in 0..4 {
        let address = vpn * 4;
        let value = match mm.read(1, address) {
            Err(MemoryError::PageFault { .. }) => mm.read(1, address).unwrap(),
            other => other.unwrap(),
        };
        assert_eq!(value, vpn as u8 + 10);
    }
    assert!(mm.check_invariant());
}
