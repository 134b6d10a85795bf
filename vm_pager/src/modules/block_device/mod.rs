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

mod file;
mod memory;

use crate::{VmError, SECTOR_SIZE};

pub use file::FileBlockDevice;
pub use memory::MemoryBlockDevice;

/// Sector addressed storage, used as the swap device.
pub trait BlockDeviceModule {
    /// Reads sector `sector` into `dest` which has to be exactly `SECTOR_SIZE` bytes big.
    fn read_sector(&mut self, sector: usize, dest: &mut [u8]) -> Result<(), VmError>;

    /// Writes `src` (exactly `SECTOR_SIZE` bytes) to sector `sector`.
    fn write_sector(&mut self, sector: usize, src: &[u8]) -> Result<(), VmError>;

    /// Number of sectors on this device
    fn sector_count(&self) -> usize;

    /// Size of this device in bytes
    fn size(&self) -> usize {
        self.sector_count() * SECTOR_SIZE
    }
}
