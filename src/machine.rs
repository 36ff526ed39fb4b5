use crate::page_table::{Ppn, TranslationEntry, Vpn};
use crate::vm_config::PAGE_SIZE;

/// The byte storage behind the physical frame pool.
///
/// Frames are addressed by physical page number; nothing here knows which
/// process a frame belongs to, that is the page table's job.
pub struct PhysMemory {
    data: Box<[u8]>,
}

impl PhysMemory {
    pub fn new(phys_pages: usize) -> Self {
        Self {
            data: vec![0u8; phys_pages * PAGE_SIZE].into_boxed_slice(),
        }
    }

    /// Number of frames in the pool.
    pub fn phys_pages(&self) -> usize {
        self.data.len() / PAGE_SIZE
    }

    #[inline]
    pub fn frame(&self, ppn: Ppn) -> &[u8] {
        &self.data[ppn * PAGE_SIZE..(ppn + 1) * PAGE_SIZE]
    }

    #[inline]
    pub fn frame_mut(&mut self, ppn: Ppn) -> &mut [u8] {
        &mut self.data[ppn * PAGE_SIZE..(ppn + 1) * PAGE_SIZE]
    }
}

/// The software managed TLB.
///
/// The kernel fills slots explicitly on a miss; there is no hardware walker.
/// Slots are read and written whole, like the machine registers they model.
pub struct Tlb {
    slots: Box<[TranslationEntry]>,
}

impl Tlb {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![TranslationEntry::empty(); size].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn read(&self, slot: usize) -> TranslationEntry {
        self.slots[slot]
    }

    #[inline]
    pub fn write(&mut self, slot: usize, entry: TranslationEntry) {
        self.slots[slot] = entry;
    }

    /// First slot not holding a valid mapping, if any.
    pub fn first_invalid(&self) -> Option<usize> {
        self.slots.iter().position(|entry| !entry.valid)
    }

    /// Slot currently holding the valid mapping `vpn -> ppn`, if any.
    pub fn find(&self, vpn: Vpn, ppn: Ppn) -> Option<usize> {
        self.slots
            .iter()
            .position(|entry| entry.valid && entry.vpn == vpn && entry.ppn == ppn)
    }
}
