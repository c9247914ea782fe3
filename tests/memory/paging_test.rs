/*!
 * Paging Tests
 * Admission, LRU replacement, page faults and derived views
 */

use myos_kernel::config::MemoryConfig;
use myos_kernel::memory::{MemoryError, MemoryManager};
use pretty_assertions::assert_eq;

/// Four pages of four units, four pages per table
fn small() -> MemoryManager {
    MemoryManager::with_config(&MemoryConfig {
        total_memory: 16,
        page_size: 4,
        page_table_capacity: 4,
    })
}

#[test]
fn test_admission_maps_ceil_pages() {
    let mm = small();
    assert_eq!(mm.admit(1, 5).unwrap(), 2);
    assert_eq!(mm.free_pages(), 2);
    assert_eq!(mm.page_status(), vec![1, 1, 0, 0]);

    let table = mm.page_table(1).unwrap();
    assert_eq!(table.len(), 4);
    assert!(table[0].valid && table[1].valid);
    assert!(!table[2].valid && !table[3].valid);
}

#[test]
fn test_admission_rejections() {
    let mm = MemoryManager::with_config(&MemoryConfig {
        total_memory: 16,
        page_size: 4,
        page_table_capacity: 2,
    });

    assert_eq!(
        mm.admit(1, 12),
        Err(MemoryError::PageTableCapacityExceeded {
            requested: 3,
            capacity: 2
        })
    );
    assert!(!mm.is_admitted(1));

    mm.admit(1, 4).unwrap();
    assert_eq!(mm.admit(1, 4), Err(MemoryError::AlreadyAdmitted(1)));
    assert_eq!(mm.free_pages(), 3);
}

#[test]
fn test_release_frees_pages_and_swap_entries() {
    let mm = small();
    mm.admit(1, 16).unwrap();
    mm.admit(2, 4).unwrap();
    assert_eq!(mm.swapped_page_count(), 1);

    let freed = mm.release(1);
    assert_eq!(freed, 12);
    assert_eq!(mm.swapped_page_count(), 0);
    assert!(mm.page_table(1).is_none());
    assert_eq!(mm.release(1), 0);
    assert!(mm.check_invariant());
}

#[test]
fn test_lru_eviction_when_memory_full() {
    let mm = small();

    mm.admit(1, 8).unwrap();
    mm.write(1, 4, 99).unwrap();
    mm.admit(2, 8).unwrap();
    mm.write(1, 0, 11).unwrap();
    mm.read(2, 0).unwrap();
    mm.read(2, 4).unwrap();
    assert_eq!(mm.free_pages(), 0);

    // PID 1 vpn 1 (ppn 1) has the oldest visit
    assert_eq!(mm.admit(3, 4).unwrap(), 1);
    assert_eq!(mm.page_status(), vec![1, 3, 2, 2]);
    assert!(mm.is_page_swapped(1, 1));
    assert!(!mm.page_table(1).unwrap()[1].valid);
    assert!(mm.check_invariant());
}

#[test]
fn test_fault_restores_swapped_content() {
    let mm = small();

    mm.admit(1, 8).unwrap();
    mm.write(1, 4, 99).unwrap();
    mm.admit(2, 8).unwrap();
    mm.write(1, 0, 11).unwrap();
    mm.read(2, 0).unwrap();
    mm.read(2, 4).unwrap();
    mm.admit(3, 4).unwrap();

    assert_eq!(mm.read(1, 4), Err(MemoryError::PageFault { pid: 1, vpn: 1 }));
    // The fault evicted PID 2 vpn 0, the least recent page of another process
    assert!(!mm.is_page_swapped(1, 1));
    assert!(mm.is_page_swapped(2, 0));
    assert_eq!(mm.read(1, 4).unwrap(), 99);
    assert_eq!(mm.read(1, 0).unwrap(), 11);
    assert!(mm.check_invariant());
}

#[test]
fn test_access_without_page_table() {
    let mm = small();
    assert_eq!(mm.read(7, 0), Err(MemoryError::NoPageTable(7)));
    mm.admit(7, 4).unwrap();
    assert_eq!(
        mm.read(7, 16),
        Err(MemoryError::InvalidAddress { pid: 7, address: 16 })
    );
}

#[test]
fn test_block_views_cover_all_memory() {
    let mm = small();
    mm.admit(1, 4).unwrap();
    mm.admit(2, 4).unwrap();
    mm.release(1);

    let free = mm.free_blocks();
    let allocated = mm.allocated_blocks();
    assert_eq!(free.len(), 2);
    assert_eq!(free[0].address, 0);
    assert_eq!(allocated.len(), 1);
    assert_eq!(allocated[0].owner_pid, Some(2));
    assert_eq!(allocated[0].address, 4);

    let total: usize = free.iter().chain(allocated.iter()).map(|b| b.size).sum();
    assert_eq!(total, mm.total_memory());
    assert!((mm.usage() - 0.25).abs() < f64::EPSILON);
}
