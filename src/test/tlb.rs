use std::collections::HashSet;

use super::get_test_kernel;
use crate::modules::executable::SliceImage;
use crate::PAGE_SIZE;

#[test]
fn test_empty_slots_are_filled_first() {
    let kernel = get_test_kernel(8, 4, 8);
    let mut process = kernel.create_process(SliceImage::new());
    assert!(process.alloc_pages(0, 2, false));

    process.handle_fault(0).unwrap();
    process.handle_fault(PAGE_SIZE).unwrap();

    let state = kernel.state();
    assert!(state.tlb.read(0).valid);
    assert!(state.tlb.read(1).valid);
    assert!(!state.tlb.read(2).valid);
    assert!(!state.tlb.read(3).valid);
    assert_eq!(state.tlb.read(0).vpn, 0);
    assert_eq!(state.tlb.read(1).vpn, 1);
}

/// The §8 scenario: a TLB of size 4, five distinct resident pages touched in
/// sequence. The fifth installation replaces one slot, and the access bits
/// that slot accumulated must land in the page table before it is
/// overwritten.
#[test]
fn test_fifth_page_replaces_a_slot_and_merges_bits() {
    let kernel = get_test_kernel(8, 4, 8);
    let mut process = kernel.create_process(SliceImage::new());
    assert!(process.alloc_pages(0, 5, false));

    for vpn in 0..4 {
        process.handle_fault(vpn * PAGE_SIZE).unwrap();
        // hardware sets the bits on the TLB copy, not in the page table
        process.write_bytes(vpn * PAGE_SIZE, &[vpn as u8; 16]).unwrap();
        let entry = kernel.state().page_table.get(process.pid(), vpn).unwrap();
        assert!(!entry.dirty, "bits leaked into the table early");
    }

    process.handle_fault(4 * PAGE_SIZE).unwrap();

    let state = kernel.state();
    let in_tlb: HashSet<usize> = (0..4)
        .map(|slot| {
            let entry = state.tlb.read(slot);
            assert!(entry.valid);
            entry.vpn
        })
        .collect();
    assert_eq!(in_tlb.len(), 4, "tlb holds a duplicate mapping");
    assert!(in_tlb.contains(&4));

    // exactly one of the first four pages was displaced; its bits must have
    // been merged back
    let displaced: Vec<usize> = (0..4).filter(|vpn| !in_tlb.contains(vpn)).collect();
    assert_eq!(displaced.len(), 1);
    let entry = state.page_table.get(process.pid(), displaced[0]).unwrap();
    assert!(entry.used, "used bit lost on tlb replacement");
    assert!(entry.dirty, "dirty bit lost on tlb replacement");
}

#[test]
fn test_eviction_reconciles_the_tlb_copy() {
    // one frame: faulting the second page evicts the first, whose only
    // dirty bit lives in its TLB slot
    let kernel = get_test_kernel(1, 4, 8);
    let mut process = kernel.create_process(SliceImage::new());
    assert!(process.alloc_pages(0, 2, false));

    process.handle_fault(0).unwrap();
    process.write_bytes(0, &[0x42u8; PAGE_SIZE]).unwrap();
    {
        let state = kernel.state();
        let entry = state.page_table.get(process.pid(), 0).unwrap();
        assert!(!entry.dirty, "dirty bit should only be in the tlb yet");
    }

    process.handle_fault(PAGE_SIZE).unwrap();

    let state = kernel.state();
    // the victim's tlb slot was invalidated and its content written out
    assert!(state.tlb.find(0, 0).is_none());
    let entry = state.page_table.get(process.pid(), 0).unwrap();
    assert!(!entry.valid);
    drop(state);

    let mut back = [0u8; PAGE_SIZE];
    process.read_bytes(0, &mut back).unwrap();
    assert_eq!(back, [0x42u8; PAGE_SIZE]);
}
