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

mod host;
mod memory;

use core::fmt;
use std::sync::Arc;

use log::error;

use crate::VmError;

pub use host::HostFile;
pub use memory::MemoryFile;

/// The filesystem primitives a mapped file has to provide.
///
/// A file keeps its own position, so a seek and the following read or write
/// have to run under the [`FsLock`] together.
pub trait FileModule {
    /// Moves the file position to `offset`
    fn seek(&mut self, offset: usize) -> Result<(), VmError>;

    /// Reads up to `dest.len()` bytes from the current position and
    /// returns how many bytes were actually read.
    fn read(&mut self, dest: &mut [u8]) -> Result<usize, VmError>;

    /// Writes up to `src.len()` bytes at the current position and returns how many bytes were
    /// actually written. Writes never extend the file.
    fn write(&mut self, src: &[u8]) -> Result<usize, VmError>;

    /// Current length of the file in bytes
    fn length(&self) -> usize;
}

/// Global lock that serializes every seek+read and seek+write pair that crosses into the filesystem
pub struct FsLock {
    inner: spin::Mutex<()>,
}

impl FsLock {
    pub fn new() -> Self {
        Self {
            inner: spin::Mutex::new(()),
        }
    }
}

impl Default for FsLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to an open file.
///
/// Every mapping page holds one of these, so the file stays alive until the last page is gone,
/// no matter what the process does with its own handle.
#[derive(Clone)]
pub struct FileRef(Arc<spin::Mutex<dyn FileModule + Send>>);

impl FileRef {
    pub fn new<F: FileModule + Send + 'static>(file: F) -> Self {
        FileRef(Arc::new(spin::Mutex::new(file)))
    }

    pub fn length(&self) -> usize {
        self.0.lock().length()
    }

    /// Reads exactly `dest.len()` bytes starting at `offset`
    pub fn read_exact_at(
        &self,
        fs_lock: &FsLock,
        offset: usize,
        dest: &mut [u8],
    ) -> Result<(), VmError> {
        let actual = {
            let _guard = fs_lock.inner.lock();
            let mut file = self.0.lock();
            file.seek(offset)?;
            file.read(dest)?
        };

        if actual != dest.len() {
            error!(
                "Short read at file offset {}: expected {} bytes, got {}",
                offset,
                dest.len(),
                actual
            );
            return Err(VmError::ShortRead {
                expected: dest.len(),
                actual,
            });
        }

        Ok(())
    }

    /// Writes exactly `src.len()` bytes starting at `offset`
    pub fn write_exact_at(&self, fs_lock: &FsLock, offset: usize, src: &[u8]) -> Result<(), VmError> {
        let actual = {
            let _guard = fs_lock.inner.lock();
            let mut file = self.0.lock();
            file.seek(offset)?;
            file.write(src)?
        };

        if actual != src.len() {
            error!(
                "Short write at file offset {}: expected {} bytes, wrote {}",
                offset,
                src.len(),
                actual
            );
            return Err(VmError::ShortWrite {
                expected: src.len(),
                actual,
            });
        }

        Ok(())
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRef")
            .field("refs", &Arc::strong_count(&self.0))
            .finish()
    }
}
