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
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
};

use super::FileModule;
use crate::VmError;

/// File that lives on the host filesystem.
///
/// The length is fixed when the file is opened, writes past it are cut off.
pub struct HostFile {
    file: File,
    length: usize,
    pos: usize,
}

impl HostFile {
    pub fn open(path: &str) -> std::io::Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        let length = file.metadata()?.len() as usize;

        Ok(Self {
            file,
            length,
            pos: 0,
        })
    }
}

impl FileModule for HostFile {
    fn seek(&mut self, offset: usize) -> Result<(), VmError> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|_| VmError::InvalidArgument("seek failed"))?;
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, dest: &mut [u8]) -> Result<usize, VmError> {
        let mut total = 0;
        while total < dest.len() {
            match self.file.read(&mut dest[total..]) {
                Ok(0) => break,
                Ok(count) => total += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }

        self.pos += total;
        Ok(total)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, VmError> {
        let count = src.len().min(self.length.saturating_sub(self.pos));
        if self.file.write_all(&src[..count]).is_err() {
            return Ok(0);
        }

        self.pos += count;
        Ok(count)
    }

    fn length(&self) -> usize {
        self.length
    }
}
