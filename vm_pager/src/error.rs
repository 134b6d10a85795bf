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

use thiserror::Error;

/// Everything that can go wrong while managing a process's virtual memory.
///
/// Logic errors and I/O errors are fatal for the faulting process only.
/// [`VmError::OutOfMemory`] is the only error that leaves the whole kernel without a safe way forward.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("address {0:#x} lies in kernel space")]
    KernelAddress(usize),

    #[error("write to read-only page at {0:#x}")]
    ProtectionViolation(usize),

    #[error("no page registered at {0:#x}")]
    InvalidAddress(usize),

    #[error("a page is already registered at {0:#x}")]
    AlreadyMapped(usize),

    #[error("{0:#x} is not part of a file mapping")]
    NotMapped(usize),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("file-backed pages can only be loaded from a file segment")]
    InvalidLoader,

    #[error("no free frame left and no frame could be evicted")]
    OutOfMemory,

    #[error("no free swap slot left")]
    SwapFull,

    #[error("page at {0:#x} is in transit")]
    PageBusy(usize),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("block device error at sector {0}")]
    Device(usize),

    #[error("page table refused to map {0:#x}")]
    MappingFailed(usize),
}

impl VmError {
    /// Returns `true` if there is no safe way to recover from this error.
    pub fn is_fatal_for_kernel(&self) -> bool {
        matches!(self, VmError::OutOfMemory)
    }
}
