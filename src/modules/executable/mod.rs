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

use crate::page_table::Vpn;
use crate::vm_config::PAGE_SIZE;

/// One loadable section of an executable image.
#[derive(Debug, Clone, Copy)]
pub struct ImageSection {
    pub first_vpn: Vpn,
    pub page_count: usize,
    pub read_only: bool,
}

/// The loader-facing view of an executable image.
///
/// Only consumed during first-touch materialization of a lazy page; after
/// that the page lives in memory or in swap and the image is never asked
/// for it again.
pub trait ExecutableImage {
    fn section_count(&self) -> usize;

    fn section(&self, index: usize) -> ImageSection;

    /// Loads one page of a section into `dest` (exactly `PAGE_SIZE` bytes).
    fn load_page(&mut self, section: usize, page: usize, dest: &mut [u8]) -> Result<(), ()>;
}

/// An executable image assembled from in-memory byte slices. Sections are
/// padded to whole pages.
#[derive(Default)]
pub struct SliceImage {
    sections: Vec<(ImageSection, Vec<u8>)>,
}

impl SliceImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a section starting at `first_vpn` containing `bytes`,
    /// zero-padded up to the next page boundary.
    pub fn push_section(&mut self, first_vpn: Vpn, read_only: bool, bytes: &[u8]) {
        let page_count = bytes.len().div_ceil(PAGE_SIZE).max(1);
        let mut data = bytes.to_vec();
        data.resize(page_count * PAGE_SIZE, 0);

        self.sections.push((
            ImageSection {
                first_vpn,
                page_count,
                read_only,
            },
            data,
        ));
    }
}

impl ExecutableImage for SliceImage {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section(&self, index: usize) -> ImageSection {
        self.sections[index].0
    }

    fn load_page(&mut self, section: usize, page: usize, dest: &mut [u8]) -> Result<(), ()> {
        let (info, data) = self.sections.get(section).ok_or(())?;
        if page >= info.page_count {
            return Err(());
        }
        dest.copy_from_slice(&data[page * PAGE_SIZE..(page + 1) * PAGE_SIZE]);
        Ok(())
    }
}
