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

use super::{PhysAddr, PhysicalMemoryModule};
use crate::{util::bit_array::BitArray, PAGE_SIZE};

/// Frame pool backed by a heap buffer.
///
/// Frame `i` is reported at physical address `base + i * PAGE_SIZE`.
pub struct RamPhysicalMemory {
    memory: Vec<u8>,
    allocated: BitArray,
    base: usize,
    free: usize,
}

impl RamPhysicalMemory {
    pub fn new(frame_count: usize) -> Self {
        Self::with_base(0x10_0000, frame_count)
    }

    pub fn with_base(base: usize, frame_count: usize) -> Self {
        assert_eq!(base % PAGE_SIZE, 0, "pool base has to be page aligned");

        Self {
            memory: vec![0u8; frame_count * PAGE_SIZE],
            allocated: BitArray::new(frame_count),
            base,
            free: frame_count,
        }
    }

    fn index_of(&self, frame: PhysAddr) -> usize {
        let addr = frame.as_usize();
        assert!(
            addr >= self.base && (addr - self.base) % PAGE_SIZE == 0,
            "{:?} is not a frame of this pool",
            frame
        );

        let index = (addr - self.base) / PAGE_SIZE;
        assert!(index < self.allocated.len(), "{:?} is outside of this pool", frame);
        index
    }
}

impl PhysicalMemoryModule for RamPhysicalMemory {
    fn allocate_frame(&mut self) -> Option<PhysAddr> {
        let index = self.allocated.first_unset()?;
        self.allocated.set(true, index);
        self.free -= 1;

        Some(PhysAddr::new(self.base + index * PAGE_SIZE))
    }

    fn free_frame(&mut self, frame: PhysAddr) {
        let index = self.index_of(frame);
        assert!(
            self.allocated.is_set(index),
            "double free of {:?}, frame pool is corrupt",
            frame
        );

        self.allocated.set(false, index);
        self.free += 1;
    }

    fn frame_count(&self) -> usize {
        self.allocated.len()
    }

    fn free_frame_count(&self) -> usize {
        self.free
    }

    fn frame(&self, frame: PhysAddr) -> &[u8] {
        let start = self.index_of(frame) * PAGE_SIZE;
        &self.memory[start..start + PAGE_SIZE]
    }

    fn frame_mut(&mut self, frame: PhysAddr) -> &mut [u8] {
        let start = self.index_of(frame) * PAGE_SIZE;
        &mut self.memory[start..start + PAGE_SIZE]
    }
}
