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
    mem::ManuallyDrop,
    path::Path,
};

use super::BlockDeviceModule;
use crate::{VmError, SECTOR_SIZE};

/// Swap device that is backed by a host file.
///
/// The file is created (or truncated) on construction and removed again on drop.
pub struct FileBlockDevice {
    /// underlying file
    file: ManuallyDrop<File>,

    /// path of file, save for deleting file later
    file_path: String,

    /// cached sector count, so no `metadata` call necessary
    sector_count: usize,
}

impl FileBlockDevice {
    pub fn new(filepath: String, sector_count: usize) -> std::io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(true)
            .create(true)
            .open(filepath.clone())?;

        file.set_len((sector_count * SECTOR_SIZE) as u64)?;

        Ok(Self {
            file: ManuallyDrop::new(file),
            file_path: filepath,
            sector_count,
        })
    }

    fn seek_to(&mut self, sector: usize) -> Result<(), VmError> {
        if sector >= self.sector_count {
            return Err(VmError::Device(sector));
        }

        self.file
            .seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))
            .map_err(|_| VmError::Device(sector))?;

        Ok(())
    }
}

impl BlockDeviceModule for FileBlockDevice {
    fn read_sector(&mut self, sector: usize, dest: &mut [u8]) -> Result<(), VmError> {
        debug_assert_eq!(dest.len(), SECTOR_SIZE);

        self.seek_to(sector)?;
        self.file
            .read_exact(dest)
            .map_err(|_| VmError::Device(sector))
    }

    fn write_sector(&mut self, sector: usize, src: &[u8]) -> Result<(), VmError> {
        debug_assert_eq!(src.len(), SECTOR_SIZE);

        self.seek_to(sector)?;
        self.file.write_all(src).map_err(|_| VmError::Device(sector))
    }

    fn sector_count(&self) -> usize {
        self.sector_count
    }
}

impl Drop for FileBlockDevice {
    fn drop(&mut self) {
        // close file before removing it
        unsafe {
            ManuallyDrop::drop(&mut self.file);
        }

        if Path::new(self.file_path.as_str()).exists() {
            let _ = remove_file(self.file_path.as_str());
        }
    }
}
