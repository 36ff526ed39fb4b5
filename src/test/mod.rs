use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::RngCore;

use crate::modules::frame_allocator::StackFrameAllocator;
use crate::modules::storage::MemStorageModule;
use crate::{VmConfig, VmKernel, PAGE_SIZE};

mod context_switch;
mod teardown;
mod tlb;

pub(crate) type TestKernel = VmKernel<MemStorageModule, StackFrameAllocator>;

pub(crate) fn get_test_kernel(
    phys_pages: usize,
    tlb_size: usize,
    swap_pages: usize,
) -> Arc<TestKernel> {
    let _ = env_logger::builder().is_test(true).try_init();

    Arc::new(VmKernel::new(
        VmConfig {
            phys_pages,
            tlb_size,
            rng_seed: 0x5eed_0001,
        },
        MemStorageModule::new(swap_pages * PAGE_SIZE),
    ))
}

pub(crate) fn rand_page(rand: &mut SmallRng) -> [u8; PAGE_SIZE] {
    std::array::from_fn(|_| rand.next_u32() as u8)
}
