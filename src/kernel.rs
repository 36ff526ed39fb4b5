/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::machine::{PhysMemory, Tlb};
use crate::modules::executable::ExecutableImage;
use crate::modules::frame_allocator::FrameAllocatorModule;
use crate::modules::storage::StorageModule;
use crate::page_table::PageTable;
use crate::process_vm::ProcessVm;
use crate::swap_store::SwapStore;
use crate::vm_config::VmConfig;

/// Everything the paging code shares across processes. Mutated only while
/// the kernel lock is held.
pub(crate) struct VmState<S: StorageModule, F: FrameAllocatorModule> {
    pub(crate) page_table: PageTable,
    pub(crate) swap: SwapStore<S>,
    pub(crate) frames: F,
    pub(crate) memory: PhysMemory,
    pub(crate) tlb: Tlb,
    pub(crate) rng: SmallRng,
}

/// The virtual-memory kernel.
///
/// Owns the page table, the swap store, the frame pool, physical memory and
/// the TLB behind one coarse lock: eviction may pick a victim belonging to
/// *any* process, so fault resolution is serialized system-wide and frame
/// allocation, eviction and TLB/page-table/swap reconciliation happen as one
/// atomic step.
pub struct VmKernel<S: StorageModule, F: FrameAllocatorModule> {
    state: Mutex<VmState<S, F>>,
    next_pid: AtomicUsize,
}

impl<S: StorageModule, F: FrameAllocatorModule> VmKernel<S, F> {
    /// Boots the kernel over the given swap backing storage.
    pub fn new(config: VmConfig, storage: S) -> Self {
        info!(
            "vm kernel: {} frames, tlb size {}, {} swap slots",
            config.phys_pages,
            config.tlb_size,
            storage.max_size() / crate::PAGE_SIZE
        );

        Self {
            state: Mutex::new(VmState {
                page_table: PageTable::new(config.phys_pages),
                swap: SwapStore::new(storage),
                frames: F::new(config.phys_pages),
                memory: PhysMemory::new(config.phys_pages),
                tlb: Tlb::new(config.tlb_size),
                rng: SmallRng::seed_from_u64(config.rng_seed),
            }),
            next_pid: AtomicUsize::new(0),
        }
    }

    /// Creates the address space of a new process around an executable
    /// image. Call [`ProcessVm::map_image`] to declare its sections.
    pub fn create_process<E: ExecutableImage>(self: &Arc<Self>, image: E) -> ProcessVm<S, F, E> {
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let tlb_size = self.state().tlb.len();
        ProcessVm::new(Arc::clone(self), pid, image, tlb_size)
    }

    /// Frames currently unallocated.
    pub fn free_frames(&self) -> usize {
        self.state().frames.free_frames()
    }

    /// Pages currently resident across all processes.
    pub fn resident_pages(&self) -> usize {
        self.state().page_table.resident_count()
    }

    // A poisoned lock only means some other thread panicked mid-test; the
    // structures behind it stay structurally sound, so keep going.
    pub(crate) fn state(&self) -> MutexGuard<'_, VmState<S, F>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::modules::executable::SliceImage;
    use crate::modules::frame_allocator::StackFrameAllocator;
    use crate::modules::storage::MemStorageModule;
    use crate::{VmConfig, VmKernel, PAGE_SIZE};

    #[test]
    fn test_pids_count_up() {
        let kernel: Arc<VmKernel<MemStorageModule, StackFrameAllocator>> = Arc::new(VmKernel::new(
            VmConfig::default(),
            MemStorageModule::new(8 * PAGE_SIZE),
        ));

        let a = kernel.create_process(SliceImage::new());
        let b = kernel.create_process(SliceImage::new());
        assert_eq!(a.pid(), 0);
        assert_eq!(b.pid(), 1);
    }

    #[test]
    fn test_fresh_kernel_has_all_frames_free() {
        let kernel: Arc<VmKernel<MemStorageModule, StackFrameAllocator>> = Arc::new(VmKernel::new(
            VmConfig {
                phys_pages: 5,
                ..VmConfig::default()
            },
            MemStorageModule::new(8 * PAGE_SIZE),
        ));

        assert_eq!(kernel.free_frames(), 5);
        assert_eq!(kernel.resident_pages(), 0);
    }
}
