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

use super::FileModule;
use crate::VmError;

/// File whose content lives in memory
pub struct MemoryFile {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl FileModule for MemoryFile {
    fn seek(&mut self, offset: usize) -> Result<(), VmError> {
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, dest: &mut [u8]) -> Result<usize, VmError> {
        let start = self.pos.min(self.data.len());
        let count = dest.len().min(self.data.len() - start);

        dest[..count].copy_from_slice(&self.data[start..start + count]);
        self.pos += count;
        Ok(count)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, VmError> {
        let start = self.pos.min(self.data.len());
        let count = src.len().min(self.data.len() - start);

        self.data[start..start + count].copy_from_slice(&src[..count]);
        self.pos += count;
        Ok(count)
    }

    fn length(&self) -> usize {
        self.data.len()
    }
}
