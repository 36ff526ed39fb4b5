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

use std::{
    fs::{remove_file, File},
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use log::warn;

use super::StorageModule;

/// Swap backing area living in a real file.
///
/// The file is created (and sized) up front and unlinked again when the
/// module is dropped, so a kernel shutdown leaves no swap file behind.
pub struct FileStorageModule {
    file: File,
    path: PathBuf,
    size: usize,
}

impl FileStorageModule {
    pub fn new(path: impl Into<PathBuf>, size: usize) -> std::io::Result<Self> {
        let path = path.into();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(size as u64)?;

        Ok(Self { file, path, size })
    }
}

impl StorageModule for FileStorageModule {
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()> {
        debug_assert!(
            offset + dest.len() <= self.size,
            "illegal read, offset: {}, len: {}, size: {}",
            offset,
            dest.len(),
            self.size
        );

        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|_| ())?;
        self.file.read_exact(dest).map_err(|_| ())?;
        Ok(())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()> {
        debug_assert!(
            offset + src.len() <= self.size,
            "illegal write, offset: {}, len: {}, size: {}",
            offset,
            src.len(),
            self.size
        );

        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|_| ())?;
        self.file.write_all(src).map_err(|_| ())?;
        Ok(())
    }

    fn max_size(&self) -> usize {
        self.size
    }
}

impl Drop for FileStorageModule {
    fn drop(&mut self) {
        // unlinking while the handle is still open is fine on unix, the
        // inode goes away once `file` is closed
        if let Err(err) = remove_file(&self.path) {
            warn!("could not remove swap file {:?}: {}", self.path, err);
        }
    }
}
