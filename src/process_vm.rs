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

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use rand::Rng;

use crate::kernel::{VmKernel, VmState};
use crate::modules::executable::ExecutableImage;
use crate::modules::frame_allocator::FrameAllocatorModule;
use crate::modules::storage::StorageModule;
use crate::page_table::{Pid, Ppn, TranslationEntry, Vpn};
use crate::swap_store::SwapError;
use crate::vm_config::PAGE_SIZE;

/// Why a fault could not be resolved. Fatal to the faulting process only;
/// the caller is expected to terminate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmFault {
    /// The virtual page was never declared for this process.
    UnmappedPage,
    /// A write hit a read-only mapping.
    ReadOnly,
    /// No frame obtainable, or the swap area is full.
    OutOfMemory,
    /// Swap or executable I/O failed.
    Storage,
}

/// The per-process address-space manager.
///
/// Owns the process's set of virtual pages, the lazy-load descriptors of its
/// executable sections and the TLB shadow used across context switches, and
/// drives each page through lazy -> resident -> evicted -> resident. All
/// shared state it touches lives behind the kernel lock.
pub struct ProcessVm<S: StorageModule, F: FrameAllocatorModule, E: ExecutableImage> {
    kernel: Arc<VmKernel<S, F>>,
    pid: Pid,
    image: E,

    /// vpn -> (section, page within section) for pages not yet loaded from
    /// the image; consumed on first touch.
    lazy_pages: HashMap<Vpn, (usize, usize)>,

    /// Every vpn this process ever declared, for teardown.
    pages: Vec<Vpn>,

    /// Saved TLB contents across context switches.
    saved_tlb: Box<[TranslationEntry]>,
}

impl<S: StorageModule, F: FrameAllocatorModule, E: ExecutableImage> ProcessVm<S, F, E> {
    pub(crate) fn new(kernel: Arc<VmKernel<S, F>>, pid: Pid, image: E, tlb_size: usize) -> Self {
        Self {
            kernel,
            pid,
            image,
            lazy_pages: HashMap::new(),
            pages: Vec::new(),
            saved_tlb: vec![TranslationEntry::empty(); tlb_size].into_boxed_slice(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Number of pages declared so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Declares `count` fresh pages starting at `vpn`.
    ///
    /// Each page gets an invalid page-table entry and a swap reservation;
    /// nothing is materialized yet. Returns false if any page was already
    /// declared.
    pub fn alloc_pages(&mut self, vpn: Vpn, count: usize, read_only: bool) -> bool {
        let kernel = Arc::clone(&self.kernel);
        let mut guard = kernel.state();
        let state = &mut *guard;

        for i in 0..count {
            let page = vpn + i;
            if !state
                .page_table
                .add(self.pid, TranslationEntry::unmapped(page, read_only))
            {
                return false;
            }
            state.swap.reserve(self.pid, page);
            self.pages.push(page);
        }
        true
    }

    /// Declares the executable's sections for demand paging: allocates their
    /// pages and registers a lazy descriptor per page, so content is pulled
    /// from the image on first touch.
    pub fn map_image(&mut self) -> bool {
        for index in 0..self.image.section_count() {
            let section = self.image.section(index);
            trace!(
                "pid {}: mapping section {} at vpn {} ({} pages)",
                self.pid,
                index,
                section.first_vpn,
                section.page_count
            );

            if !self.alloc_pages(section.first_vpn, section.page_count, section.read_only) {
                return false;
            }
            for page in 0..section.page_count {
                self.lazy_pages.insert(section.first_vpn + page, (index, page));
            }
        }
        true
    }

    /// The TLB-miss entry point: resolves the faulting address and installs
    /// the mapping into one TLB slot.
    ///
    /// An empty slot is preferred; with all slots full a random one is
    /// replaced, its accumulated access bits merged back into the page table
    /// first.
    pub fn handle_fault(&mut self, vaddr: usize) -> Result<(), VmFault> {
        let kernel = Arc::clone(&self.kernel);
        let mut guard = kernel.state();
        let state = &mut *guard;

        let vpn = vaddr / PAGE_SIZE;
        self.resolve(state, vpn)?;
        let entry = state
            .page_table
            .get(self.pid, vpn)
            .ok_or(VmFault::UnmappedPage)?;

        let slot = match state.tlb.first_invalid() {
            Some(slot) => slot,
            None => state.rng.gen_range(0..state.tlb.len()),
        };

        let old = state.tlb.read(slot);
        if old.valid {
            state.page_table.merge(self.pid, old);
        }
        state.tlb.write(slot, entry);
        trace!(
            "pid {}: vpn {} -> ppn {} installed in tlb slot {}",
            self.pid,
            vpn,
            entry.ppn,
            slot
        );
        Ok(())
    }

    /// Copies virtual memory into `dest`, faulting pages in as needed.
    pub fn read_bytes(&mut self, vaddr: usize, dest: &mut [u8]) -> Result<(), VmFault> {
        let kernel = Arc::clone(&self.kernel);
        let mut guard = kernel.state();
        let state = &mut *guard;

        let mut vaddr = vaddr;
        let mut copied = 0;
        while copied < dest.len() {
            let vpn = vaddr / PAGE_SIZE;
            let offset = vaddr % PAGE_SIZE;
            let chunk = (PAGE_SIZE - offset).min(dest.len() - copied);

            let ppn = self.resolve(state, vpn)?;
            dest[copied..copied + chunk]
                .copy_from_slice(&state.memory.frame(ppn)[offset..offset + chunk]);
            self.mark_access(state, vpn, ppn, false);

            copied += chunk;
            vaddr += chunk;
        }
        Ok(())
    }

    /// Copies `src` into virtual memory, faulting pages in as needed.
    pub fn write_bytes(&mut self, vaddr: usize, src: &[u8]) -> Result<(), VmFault> {
        let kernel = Arc::clone(&self.kernel);
        let mut guard = kernel.state();
        let state = &mut *guard;

        let mut vaddr = vaddr;
        let mut copied = 0;
        while copied < src.len() {
            let vpn = vaddr / PAGE_SIZE;
            let offset = vaddr % PAGE_SIZE;
            let chunk = (PAGE_SIZE - offset).min(src.len() - copied);

            let entry = state
                .page_table
                .get(self.pid, vpn)
                .ok_or(VmFault::UnmappedPage)?;
            if entry.read_only {
                return Err(VmFault::ReadOnly);
            }

            let ppn = self.resolve(state, vpn)?;
            state.memory.frame_mut(ppn)[offset..offset + chunk]
                .copy_from_slice(&src[copied..copied + chunk]);
            self.mark_access(state, vpn, ppn, true);

            copied += chunk;
            vaddr += chunk;
        }
        Ok(())
    }

    /// Saves the TLB into this process's shadow before a context switch,
    /// merging the access bits of every valid slot into the page table so
    /// they are not lost while another process runs.
    pub fn save_state(&mut self) {
        let kernel = Arc::clone(&self.kernel);
        let mut guard = kernel.state();
        let state = &mut *guard;

        for slot in 0..state.tlb.len() {
            let entry = state.tlb.read(slot);
            self.saved_tlb[slot] = entry;
            if entry.valid {
                state.page_table.merge(self.pid, entry);
            }
        }
    }

    /// Restores this process's shadow into the TLB after a context switch.
    ///
    /// A shadow slot is only re-installed if its page-table entry is still
    /// valid; the page may have been evicted by another process's fault in
    /// the meantime, and a stale mapping must not be reactivated.
    pub fn restore_state(&mut self) {
        let kernel = Arc::clone(&self.kernel);
        let mut guard = kernel.state();
        let state = &mut *guard;

        for slot in 0..state.tlb.len() {
            let saved = self.saved_tlb[slot];
            let still_valid = saved.valid
                && state
                    .page_table
                    .get(self.pid, saved.vpn)
                    .map(|entry| entry.valid)
                    .unwrap_or(false);

            state.tlb.write(
                slot,
                if still_valid {
                    saved
                } else {
                    TranslationEntry::empty()
                },
            );
        }
    }

    /// Tears the address space down: every page-table entry is removed
    /// (still-resident frames go back to the allocator), every swap slot is
    /// returned, and TLB slots still carrying one of the mappings are
    /// scrubbed. Idempotent; also run on drop.
    pub fn release_all(&mut self) {
        if self.pages.is_empty() {
            return;
        }

        let kernel = Arc::clone(&self.kernel);
        let mut guard = kernel.state();
        let state = &mut *guard;

        debug!("pid {}: releasing {} pages", self.pid, self.pages.len());
        for vpn in self.pages.drain(..) {
            if let Some(entry) = state.page_table.remove(self.pid, vpn) {
                if entry.valid {
                    state.frames.free(entry.ppn);
                    if let Some(slot) = state.tlb.find(vpn, entry.ppn) {
                        state.tlb.write(slot, TranslationEntry::empty());
                    }
                }
            }
            state.swap.remove(self.pid, vpn);
        }
        self.lazy_pages.clear();
    }

    /// Makes `vpn` resident and returns its frame. A no-op for pages that
    /// already are.
    fn resolve(&mut self, state: &mut VmState<S, F>, vpn: Vpn) -> Result<Ppn, VmFault> {
        let entry = state
            .page_table
            .get(self.pid, vpn)
            .ok_or(VmFault::UnmappedPage)?;
        if entry.valid {
            return Ok(entry.ppn);
        }

        let ppn = self.obtain_frame(state)?;
        if let Err(fault) = self.materialize(state, vpn, ppn) {
            // the frame is unowned at this point, hand it back instead of
            // leaking it with the dying process
            state.frames.free(ppn);
            return Err(fault);
        }
        Ok(ppn)
    }

    /// Gets a frame from the allocator, evicting a victim page system-wide
    /// if the pool is dry. An evicted victim's frame is reused directly and
    /// never passes through the allocator.
    fn obtain_frame(&mut self, state: &mut VmState<S, F>) -> Result<Ppn, VmFault> {
        if let Some(ppn) = state.frames.allocate() {
            return Ok(ppn);
        }

        let (victim_pid, victim) = state
            .page_table
            .pick_victim(&mut state.rng)
            .ok_or(VmFault::OutOfMemory)?;
        debug!(
            "pid {}: evicting vpn {} of pid {} from ppn {}",
            self.pid, victim.vpn, victim_pid, victim.ppn
        );
        Self::evict(state, victim_pid, victim)?;
        Ok(victim.ppn)
    }

    /// Pushes a resident page out of its frame.
    ///
    /// Any TLB slot still holding the mapping is reconciled first (its
    /// access bits are the freshest), then the page is written to swap if
    /// dirty and marked invalid in the page table.
    fn evict(
        state: &mut VmState<S, F>,
        owner: Pid,
        victim: TranslationEntry,
    ) -> Result<(), VmFault> {
        for slot in 0..state.tlb.len() {
            let tlb_entry = state.tlb.read(slot);
            if tlb_entry.valid && tlb_entry.vpn == victim.vpn && tlb_entry.ppn == victim.ppn {
                state.page_table.merge(owner, tlb_entry);
                let mut cleared = tlb_entry;
                cleared.valid = false;
                state.tlb.write(slot, cleared);
                break;
            }
        }

        let mut entry = state
            .page_table
            .get(owner, victim.vpn)
            .ok_or(VmFault::UnmappedPage)?;

        if entry.dirty {
            let mut page = [0u8; PAGE_SIZE];
            page.copy_from_slice(state.memory.frame(entry.ppn));
            state
                .swap
                .write(owner, entry.vpn, &page)
                .map_err(|err| match err {
                    SwapError::Full => VmFault::OutOfMemory,
                    SwapError::Io => VmFault::Storage,
                })?;
        }

        entry.valid = false;
        state.page_table.set(owner, entry);
        Ok(())
    }

    /// Fills `ppn` with the page's content and installs the valid entry.
    ///
    /// First touch of a lazy page loads from the executable image and marks
    /// the page dirty: its in-memory content may diverge from the section
    /// image, so it must never be dropped silently on a later eviction.
    /// Everything else comes back from swap with clean bits.
    fn materialize(&mut self, state: &mut VmState<S, F>, vpn: Vpn, ppn: Ppn) -> Result<(), VmFault> {
        let mut entry = state
            .page_table
            .get(self.pid, vpn)
            .ok_or(VmFault::UnmappedPage)?;
        debug_assert!(!entry.valid);

        if let Some((section, page)) = self.lazy_pages.remove(&vpn) {
            trace!(
                "pid {}: loading section {} page {} into vpn {} (ppn {})",
                self.pid,
                section,
                page,
                vpn,
                ppn
            );
            self.image
                .load_page(section, page, state.memory.frame_mut(ppn))
                .map_err(|_| VmFault::Storage)?;
            entry.used = true;
            entry.dirty = true;
        } else {
            trace!("pid {}: swapping in vpn {} to ppn {}", self.pid, vpn, ppn);
            let VmState { swap, memory, .. } = state;
            swap.read(self.pid, vpn, memory.frame_mut(ppn))
                .map_err(|_| VmFault::Storage)?;
            entry.used = false;
            entry.dirty = false;
        }

        entry.valid = true;
        entry.ppn = ppn;
        state.page_table.set(self.pid, entry);
        Ok(())
    }

    /// Records an access the way the hardware would: on the TLB copy while
    /// the mapping is loaded in a slot, otherwise straight into the page
    /// table.
    fn mark_access(&self, state: &mut VmState<S, F>, vpn: Vpn, ppn: Ppn, write: bool) {
        if let Some(slot) = state.tlb.find(vpn, ppn) {
            let mut entry = state.tlb.read(slot);
            entry.used = true;
            entry.dirty |= write;
            state.tlb.write(slot, entry);
        } else if let Some(mut entry) = state.page_table.get(self.pid, vpn) {
            entry.used = true;
            entry.dirty |= write;
            state.page_table.merge(self.pid, entry);
        }
    }
}

impl<S: StorageModule, F: FrameAllocatorModule, E: ExecutableImage> Drop for ProcessVm<S, F, E> {
    fn drop(&mut self) {
        self.release_all();
    }
}
