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

mod file_storage;
mod mem_storage;

pub use file_storage::FileStorageModule;
pub use mem_storage::MemStorageModule;

/// Byte-range storage behind the swap store.
///
/// The backing area has a fixed size; it is illegal to read or write across
/// that border.
pub trait StorageModule {
    /// Reads `[offset, offset + dest.len())` into `dest`.
    ///
    /// If this call fails, part of `dest` may already have been overwritten.
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()>;

    /// Writes `src` to `[offset, offset + src.len())`.
    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()>;

    /// Maximum size in bytes of this storage.
    fn max_size(&self) -> usize;
}
