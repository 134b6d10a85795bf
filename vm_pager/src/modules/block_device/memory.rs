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

use super::BlockDeviceModule;
use crate::{VmError, SECTOR_SIZE};

/// Block device that only lives in memory
pub struct MemoryBlockDevice {
    data: Vec<u8>,
}

impl MemoryBlockDevice {
    pub fn new(sector_count: usize) -> Self {
        Self {
            data: vec![0u8; sector_count * SECTOR_SIZE],
        }
    }

    fn range(&self, sector: usize) -> Result<core::ops::Range<usize>, VmError> {
        if sector >= self.sector_count() {
            return Err(VmError::Device(sector));
        }

        let start = sector * SECTOR_SIZE;
        Ok(start..start + SECTOR_SIZE)
    }
}

impl BlockDeviceModule for MemoryBlockDevice {
    fn read_sector(&mut self, sector: usize, dest: &mut [u8]) -> Result<(), VmError> {
        debug_assert_eq!(dest.len(), SECTOR_SIZE);
        let range = self.range(sector)?;
        dest.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_sector(&mut self, sector: usize, src: &[u8]) -> Result<(), VmError> {
        debug_assert_eq!(src.len(), SECTOR_SIZE);
        let range = self.range(sector)?;
        self.data[range].copy_from_slice(src);
        Ok(())
    }

    fn sector_count(&self) -> usize {
        self.data.len() / SECTOR_SIZE
    }
}
