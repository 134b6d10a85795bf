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

use crate::{
    modules::{
        file::{FileRef, FsLock},
        page_table::PageTableModule,
    },
    VmError, PAGE_SIZE,
};

/// A page sized window into a file
#[derive(Debug, Clone)]
pub struct FileSegment {
    pub file: FileRef,
    pub offset: usize,

    /// Bytes of this page that come from the file, the rest is zero
    pub read_bytes: usize,
}

impl FileSegment {
    /// Fails if `read_bytes` does not fit into one page
    pub fn new(file: FileRef, offset: usize, read_bytes: usize) -> Result<Self, VmError> {
        if read_bytes > PAGE_SIZE {
            return Err(VmError::InvalidArgument("segment is bigger than a page"));
        }

        Ok(Self {
            file,
            offset,
            read_bytes,
        })
    }

    /// Reads the segment into `kva`, which is expected to be zeroed already
    pub(crate) fn load(&self, kva: &mut [u8], fs_lock: &FsLock) -> Result<(), VmError> {
        self.file
            .read_exact_at(fs_lock, self.offset, &mut kva[..self.read_bytes])
    }

    /// Writes the meaningful part of `kva` back to the file
    pub(crate) fn write_back(&self, kva: &[u8], fs_lock: &FsLock) -> Result<(), VmError> {
        self.file
            .write_exact_at(fs_lock, self.offset, &kva[..self.read_bytes])
    }
}

/// Page that mirrors a file segment, modified pages are written back to the file
#[derive(Debug)]
pub(crate) struct FilePage {
    pub(crate) segment: FileSegment,
}

impl FilePage {
    pub(crate) fn new(segment: FileSegment) -> Self {
        Self { segment }
    }

    pub(crate) fn swap_in(&mut self, kva: &mut [u8], fs_lock: &FsLock) -> Result<(), VmError> {
        kva[self.segment.read_bytes..].fill(0);
        self.segment.load(kva, fs_lock)
    }

    /// Writes the page back if it is dirty, clean pages can simply be reloaded
    pub(crate) fn swap_out(
        &mut self,
        va: usize,
        kva: &[u8],
        page_table: &mut dyn PageTableModule,
        fs_lock: &FsLock,
    ) -> Result<(), VmError> {
        if page_table.is_dirty(va) {
            trace!(
                "Writing back {} bytes of {:#x} to offset {}",
                self.segment.read_bytes,
                va,
                self.segment.offset
            );
            self.segment.write_back(kva, fs_lock)?;
            page_table.set_dirty(va, false);
        }
        Ok(())
    }
}
