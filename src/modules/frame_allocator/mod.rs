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

use log::trace;

use crate::page_table::Ppn;

/// The physical frame pool.
///
/// Every frame the paging code obtains is returned exactly once, either by
/// teardown or by an eviction reusing it in place (in which case it never
/// comes back here at all).
pub trait FrameAllocatorModule {
    fn new(phys_pages: usize) -> Self;

    /// Hands out a free frame, or `None` when the pool is exhausted.
    fn allocate(&mut self) -> Option<Ppn>;

    /// Returns a frame to the pool.
    fn free(&mut self, ppn: Ppn);

    /// How many frames are currently free.
    fn free_frames(&self) -> usize;
}

/// Watermark allocator with a recycle list: frames are handed out
/// sequentially first, freed frames are reused before the watermark moves.
pub struct StackFrameAllocator {
    current: usize,
    end: usize,
    recycled: Vec<Ppn>,
}

impl FrameAllocatorModule for StackFrameAllocator {
    fn new(phys_pages: usize) -> Self {
        Self {
            current: 0,
            end: phys_pages,
            recycled: Vec::new(),
        }
    }

    fn allocate(&mut self) -> Option<Ppn> {
        if let Some(ppn) = self.recycled.pop() {
            trace!("reusing recycled frame {}", ppn);
            return Some(ppn);
        }
        if self.current == self.end {
            return None;
        }
        let ppn = self.current;
        self.current += 1;
        Some(ppn)
    }

    fn free(&mut self, ppn: Ppn) {
        debug_assert!(
            ppn < self.current && !self.recycled.contains(&ppn),
            "frame {} freed while not allocated",
            ppn
        );
        self.recycled.push(ppn);
    }

    fn free_frames(&self) -> usize {
        self.end - self.current + self.recycled.len()
    }
}
