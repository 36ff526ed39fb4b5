use super::get_test_kernel;
use crate::modules::executable::SliceImage;
use crate::PAGE_SIZE;

#[test]
fn test_teardown_releases_everything() {
    let kernel = get_test_kernel(2, 4, 8);
    let mut process = kernel.create_process(SliceImage::new());
    assert!(process.alloc_pages(0, 3, false));

    // three dirty pages through two frames: at least one swap slot assigned
    for vpn in 0..3 {
        let page = [vpn as u8; PAGE_SIZE];
        process.write_bytes(vpn * PAGE_SIZE, &page).unwrap();
    }
    assert_eq!(kernel.free_frames(), 0);
    assert!(kernel.state().swap.free_slot_count() < 8);

    process.release_all();

    assert_eq!(kernel.resident_pages(), 0);
    assert_eq!(kernel.free_frames(), 2);
    assert_eq!(kernel.state().swap.declared_pages(), 0);
    assert_eq!(kernel.state().swap.free_slot_count(), 8);
    assert_eq!(process.page_count(), 0);
}

#[test]
fn test_teardown_is_idempotent() {
    let kernel = get_test_kernel(2, 4, 8);
    let mut process = kernel.create_process(SliceImage::new());
    assert!(process.alloc_pages(0, 2, false));
    process.write_bytes(0, &[5u8; PAGE_SIZE]).unwrap();

    process.release_all();
    process.release_all();
    assert_eq!(kernel.free_frames(), 2);
}

#[test]
fn test_drop_tears_the_address_space_down() {
    let kernel = get_test_kernel(2, 4, 8);
    {
        let mut process = kernel.create_process(SliceImage::new());
        assert!(process.alloc_pages(0, 2, false));
        process.write_bytes(0, &[9u8; PAGE_SIZE]).unwrap();
        assert!(kernel.free_frames() < 2);
    }
    assert_eq!(kernel.free_frames(), 2);
    assert_eq!(kernel.resident_pages(), 0);
}

#[test]
fn test_teardown_leaves_other_processes_alone() {
    let kernel = get_test_kernel(3, 4, 8);
    let mut keeper = kernel.create_process(SliceImage::new());
    let mut goner = kernel.create_process(SliceImage::new());
    assert!(keeper.alloc_pages(0, 2, false));
    assert!(goner.alloc_pages(0, 2, false));

    let keep0 = [0x10u8; PAGE_SIZE];
    let keep1 = [0x11u8; PAGE_SIZE];
    keeper.write_bytes(0, &keep0).unwrap();
    keeper.write_bytes(PAGE_SIZE, &keep1).unwrap();
    goner.write_bytes(0, &[0xddu8; PAGE_SIZE]).unwrap();
    goner.write_bytes(PAGE_SIZE, &[0xeeu8; PAGE_SIZE]).unwrap();

    drop(goner);

    let mut back = [0u8; PAGE_SIZE];
    keeper.read_bytes(0, &mut back).unwrap();
    assert_eq!(back, keep0);
    keeper.read_bytes(PAGE_SIZE, &mut back).unwrap();
    assert_eq!(back, keep1);
}
