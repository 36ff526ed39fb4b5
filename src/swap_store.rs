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

use log::{debug, trace};

use crate::modules::storage::StorageModule;
use crate::page_table::{Pid, Vpn};
use crate::vm_config::PAGE_SIZE;

/// Backing state of one declared virtual page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwapSlot {
    /// Declared but never written out. Reading it yields a zero page; this
    /// is the first-touch path for anonymous (stack/argument) pages.
    Reserved,
    /// Written at least once; the slot holds the last evicted image.
    Stored(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapError {
    /// No slot left in the backing area.
    Full,
    /// The underlying storage failed.
    Io,
}

/// The swap store: a `(pid, vpn)`-indexed backing area of page-sized slots.
///
/// Slot assignment is deferred until the first write-out; freed slots go to
/// a free list and are reused before the watermark grows.
pub struct SwapStore<S: StorageModule> {
    storage: S,
    slots: HashMap<(Pid, Vpn), SwapSlot>,
    free_slots: Vec<usize>,
    next_slot: usize,
    capacity: usize,
}

impl<S: StorageModule> SwapStore<S> {
    pub fn new(storage: S) -> Self {
        let capacity = storage.max_size() / PAGE_SIZE;
        Self {
            storage,
            slots: HashMap::new(),
            free_slots: Vec::new(),
            next_slot: 0,
            capacity,
        }
    }

    /// Registers a page as known to the store without assigning a slot.
    pub fn reserve(&mut self, pid: Pid, vpn: Vpn) {
        self.slots.entry((pid, vpn)).or_insert(SwapSlot::Reserved);
    }

    /// Writes one page out, assigning a slot on first write. Returns the
    /// slot index.
    pub fn write(&mut self, pid: Pid, vpn: Vpn, page: &[u8]) -> Result<usize, SwapError> {
        debug_assert_eq!(page.len(), PAGE_SIZE);

        let (index, newly_assigned) = match self.slots.get(&(pid, vpn)) {
            Some(SwapSlot::Stored(index)) => (*index, false),
            Some(SwapSlot::Reserved) => {
                let index = self.alloc_slot().ok_or(SwapError::Full)?;
                debug!("assigned swap slot {} to vpn {} of pid {}", index, vpn, pid);
                (index, true)
            }
            None => {
                debug_assert!(false, "swap write for undeclared vpn {} of pid {}", vpn, pid);
                return Err(SwapError::Io);
            }
        };

        if self.storage.write(index * PAGE_SIZE, page).is_err() {
            if newly_assigned {
                self.free_slots.push(index);
            }
            return Err(SwapError::Io);
        }

        self.slots.insert((pid, vpn), SwapSlot::Stored(index));
        Ok(index)
    }

    /// Reads one page back into `dest`.
    ///
    /// A `Reserved` page yields a zero page: the page was declared but never
    /// evicted with content, which is exactly the zero-fill semantics
    /// anonymous pages rely on. A page the store has never heard of is an
    /// invariant violation, not a zero page.
    pub fn read(&mut self, pid: Pid, vpn: Vpn, dest: &mut [u8]) -> Result<(), ()> {
        debug_assert_eq!(dest.len(), PAGE_SIZE);

        match self.slots.get(&(pid, vpn)) {
            Some(SwapSlot::Stored(index)) => self.storage.read(index * PAGE_SIZE, dest),
            Some(SwapSlot::Reserved) => {
                trace!("zero-filling never-written vpn {} of pid {}", vpn, pid);
                dest.fill(0);
                Ok(())
            }
            None => {
                debug_assert!(false, "swap read for undeclared vpn {} of pid {}", vpn, pid);
                Err(())
            }
        }
    }

    /// Forgets a page, returning its slot (if one was ever assigned) to the
    /// free list.
    pub fn remove(&mut self, pid: Pid, vpn: Vpn) {
        if let Some(SwapSlot::Stored(index)) = self.slots.remove(&(pid, vpn)) {
            trace!("recycling swap slot {} of pid {}", index, pid);
            self.free_slots.push(index);
        }
    }

    fn alloc_slot(&mut self) -> Option<usize> {
        if let Some(index) = self.free_slots.pop() {
            return Some(index);
        }
        if self.next_slot >= self.capacity {
            return None;
        }
        let index = self.next_slot;
        self.next_slot += 1;
        Some(index)
    }

    #[cfg(test)]
    pub(crate) fn declared_pages(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn free_slot_count(&self) -> usize {
        self.free_slots.len() + (self.capacity - self.next_slot)
    }
}
