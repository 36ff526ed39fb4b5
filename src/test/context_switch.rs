use super::get_test_kernel;
use crate::modules::executable::SliceImage;
use crate::PAGE_SIZE;

#[test]
fn test_save_merges_bits_and_restore_drops_evicted_mappings() {
    // a single frame makes the victim deterministic
    let kernel = get_test_kernel(1, 2, 8);
    let mut a = kernel.create_process(SliceImage::new());
    assert!(a.alloc_pages(0, 1, false));

    a.handle_fault(0).unwrap();
    a.write_bytes(0, &[0xaau8; PAGE_SIZE]).unwrap();

    // switching away: the dirty bit sitting in the TLB must reach the table
    a.save_state();
    {
        let state = kernel.state();
        let entry = state.page_table.get(a.pid(), 0).unwrap();
        assert!(entry.dirty);
        assert!(entry.used);
    }

    // b runs (fresh shadow clears the TLB) and pushes a's page out
    let mut b = kernel.create_process(SliceImage::new());
    assert!(b.alloc_pages(0, 1, false));
    b.restore_state();
    b.write_bytes(0, &[1u8; PAGE_SIZE]).unwrap();
    b.save_state();

    // switching back: a's shadow slot points at an evicted page and must
    // not be reactivated
    a.restore_state();
    {
        let state = kernel.state();
        assert!(!state.page_table.get(a.pid(), 0).unwrap().valid);
        for slot in 0..2 {
            assert!(!state.tlb.read(slot).valid);
        }
    }

    // the page still faults back in with its content
    let mut back = [0u8; PAGE_SIZE];
    a.read_bytes(0, &mut back).unwrap();
    assert_eq!(back, [0xaau8; PAGE_SIZE]);
}

#[test]
fn test_restore_keeps_only_still_valid_mappings() {
    let kernel = get_test_kernel(3, 2, 8);
    let mut a = kernel.create_process(SliceImage::new());
    assert!(a.alloc_pages(0, 2, false));

    a.handle_fault(0).unwrap();
    a.handle_fault(PAGE_SIZE).unwrap();
    a.save_state();

    // b's two dirty pages force one eviction somewhere among the three
    // resident pages
    let mut b = kernel.create_process(SliceImage::new());
    assert!(b.alloc_pages(0, 2, false));
    b.restore_state();
    b.write_bytes(0, &[1u8; PAGE_SIZE]).unwrap();
    b.write_bytes(PAGE_SIZE, &[2u8; PAGE_SIZE]).unwrap();
    b.save_state();

    a.restore_state();

    // every restored slot must agree with the page table; no stale mapping
    let state = kernel.state();
    for slot in 0..2 {
        let tlb_entry = state.tlb.read(slot);
        if tlb_entry.valid {
            let entry = state.page_table.get(a.pid(), tlb_entry.vpn).unwrap();
            assert!(entry.valid);
            assert_eq!(entry.ppn, tlb_entry.ppn);
        }
    }
}
