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

use log::trace;
use rand::Rng;

pub type Pid = usize;
pub type Vpn = usize;
pub type Ppn = usize;

/// One virtual-to-physical translation as the TLB sees it.
///
/// `used` and `dirty` are set by the simulated hardware while the entry sits
/// in a TLB slot and by the kernel when it touches the page itself; both
/// views are reconciled through [`PageTable::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationEntry {
    pub vpn: Vpn,
    pub ppn: Ppn,
    pub valid: bool,
    pub read_only: bool,
    pub used: bool,
    pub dirty: bool,
}

impl TranslationEntry {
    /// An all-invalid slot filler.
    pub fn empty() -> Self {
        Self {
            vpn: 0,
            ppn: 0,
            valid: false,
            read_only: false,
            used: false,
            dirty: false,
        }
    }

    /// A declared but not yet resident page.
    pub fn unmapped(vpn: Vpn, read_only: bool) -> Self {
        Self {
            vpn,
            ppn: 0,
            valid: false,
            read_only,
            used: false,
            dirty: false,
        }
    }
}

/// The kernel-wide page table.
///
/// Maps `(pid, vpn)` to its current translation and keeps a reverse index
/// from physical frame to the owning key, so eviction can inspect any frame
/// in O(1). The reverse index holds the *key* rather than a copy of the
/// entry; the map is the single source of truth.
///
/// Invariant: a frame slot is `Some` exactly while one valid entry maps that
/// frame, and no two valid entries ever share a frame.
pub struct PageTable {
    entries: HashMap<(Pid, Vpn), TranslationEntry>,
    frame_owners: Vec<Option<(Pid, Vpn)>>,
}

impl PageTable {
    pub fn new(phys_pages: usize) -> Self {
        Self {
            entries: HashMap::new(),
            frame_owners: vec![None; phys_pages],
        }
    }

    /// Inserts a brand-new entry. Returns false if the page was already
    /// declared for this process.
    pub fn add(&mut self, pid: Pid, entry: TranslationEntry) -> bool {
        let key = (pid, entry.vpn);
        if self.entries.contains_key(&key) {
            return false;
        }

        if entry.valid {
            self.claim_frame(entry.ppn, key);
        }
        self.entries.insert(key, entry);
        true
    }

    /// Returns a copy of the current entry, or `None` if the page was never
    /// declared for this process.
    pub fn get(&self, pid: Pid, vpn: Vpn) -> Option<TranslationEntry> {
        self.entries.get(&(pid, vpn)).copied()
    }

    /// Replaces the entry at an existing key. A no-op if the key is unknown.
    pub fn set(&mut self, pid: Pid, entry: TranslationEntry) {
        let key = (pid, entry.vpn);
        let Some(old) = self.entries.get(&key).copied() else {
            return;
        };

        if old.valid {
            self.release_frame(old.ppn, key);
        }
        if entry.valid {
            self.claim_frame(entry.ppn, key);
        }
        self.entries.insert(key, entry);
    }

    /// Like [`PageTable::set`], but ORs the incoming `used`/`dirty` bits with
    /// the stored ones, so access information accumulated in a TLB slot is
    /// not lost when reconciling.
    pub fn merge(&mut self, pid: Pid, entry: TranslationEntry) {
        let Some(old) = self.get(pid, entry.vpn) else {
            return;
        };

        let mut merged = entry;
        merged.used = entry.used || old.used;
        merged.dirty = entry.dirty || old.dirty;
        self.set(pid, merged);
    }

    /// Deletes the key, clearing the reverse index if the entry was resident.
    pub fn remove(&mut self, pid: Pid, vpn: Vpn) -> Option<TranslationEntry> {
        let entry = self.entries.remove(&(pid, vpn))?;
        if entry.valid {
            self.release_frame(entry.ppn, (pid, vpn));
        }
        Some(entry)
    }

    /// Picks one currently resident page uniformly at random.
    ///
    /// One reservoir-sampling pass over the frame owners, so this terminates
    /// no matter how sparse the valid entries are. `None` means nothing is
    /// resident at all.
    pub fn pick_victim<R: Rng>(&self, rng: &mut R) -> Option<(Pid, TranslationEntry)> {
        let mut chosen = None;
        let mut seen = 0usize;
        for owner in self.frame_owners.iter().flatten() {
            seen += 1;
            if rng.gen_range(0..seen) == 0 {
                chosen = Some(*owner);
            }
        }

        let (pid, vpn) = chosen?;
        let entry = self.get(pid, vpn)?;
        debug_assert!(entry.valid, "reverse index points at an invalid entry");
        trace!("picked victim vpn {} of pid {} (ppn {})", vpn, pid, entry.ppn);
        Some((pid, entry))
    }

    /// Who currently holds this frame, if anyone.
    pub fn owner_of(&self, ppn: Ppn) -> Option<(Pid, Vpn)> {
        self.frame_owners[ppn]
    }

    /// How many pages are resident across all processes.
    pub fn resident_count(&self) -> usize {
        self.frame_owners.iter().flatten().count()
    }

    fn claim_frame(&mut self, ppn: Ppn, key: (Pid, Vpn)) {
        let slot = &mut self.frame_owners[ppn];
        debug_assert!(
            slot.is_none() || *slot == Some(key),
            "frame {} already owned by {:?}, cannot claim for {:?}",
            ppn,
            slot,
            key
        );
        *slot = Some(key);
    }

    fn release_frame(&mut self, ppn: Ppn, key: (Pid, Vpn)) {
        debug_assert_eq!(
            self.frame_owners[ppn],
            Some(key),
            "frame {} released by a non-owner",
            ppn
        );
        self.frame_owners[ppn] = None;
    }
}
