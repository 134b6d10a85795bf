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

mod ram;

use core::fmt;

use crate::PAGE_SIZE;

pub use ram::RamPhysicalMemory;

/// Physical address of a frame
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(usize);

impl PhysAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

/// The raw pool of physical frames that user pages can live in.
///
/// Exhaustion is not an error for this module, the frame table evicts pages in that case.
/// Freeing a frame that was never handed out means the pool is corrupt, implementations should panic.
pub trait PhysicalMemoryModule {
    /// Hands out a free frame, its content is undefined
    fn allocate_frame(&mut self) -> Option<PhysAddr>;

    /// Gives `frame` back to the pool
    fn free_frame(&mut self, frame: PhysAddr);

    /// Total number of frames in this pool
    fn frame_count(&self) -> usize;

    /// Number of frames that can still be allocated
    fn free_frame_count(&self) -> usize;

    /// Kernel view of the memory of `frame`, exactly `PAGE_SIZE` bytes
    fn frame(&self, frame: PhysAddr) -> &[u8];

    /// Mutable kernel view of the memory of `frame`, exactly `PAGE_SIZE` bytes
    fn frame_mut(&mut self, frame: PhysAddr) -> &mut [u8];

    /// Copies the whole content of `src` into `dst`
    fn copy_frame(&mut self, src: PhysAddr, dst: PhysAddr) {
        if src == dst {
            return;
        }

        let mut buffer = [0u8; PAGE_SIZE];
        buffer.copy_from_slice(self.frame(src));
        self.frame_mut(dst).copy_from_slice(&buffer);
    }
}
