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

use super::StorageModule;

/// In-memory storage, mostly useful for tests and embedders that do not
/// want a swap file on disk.
pub struct MemStorageModule {
    data: Box<[u8]>,
}

impl MemStorageModule {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }
}

impl StorageModule for MemStorageModule {
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()> {
        let end = offset.checked_add(dest.len()).ok_or(())?;
        if end > self.data.len() {
            return Err(());
        }
        dest.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()> {
        let end = offset.checked_add(src.len()).ok_or(())?;
        if end > self.data.len() {
            return Err(());
        }
        self.data[offset..end].copy_from_slice(src);
        Ok(())
    }

    fn max_size(&self) -> usize {
        self.data.len()
    }
}
