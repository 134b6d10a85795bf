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

use std::sync::Weak;

use log::{debug, error, trace, warn};
use try_lock::TryLock;

use crate::{
    modules::{
        block_device::BlockDeviceModule, page_table::PageTableModule,
        physical_memory::PhysicalMemoryModule,
    },
    page::Page,
    vm::BackingStore,
    PhysAddr, VmError,
};

/// Who a resident frame belongs to.
///
/// Only weak references, a frame never keeps its page or address space alive.
pub(crate) struct FrameOwner {
    pub(crate) page: Weak<TryLock<Page>>,
    pub(crate) page_table: Weak<spin::Mutex<dyn PageTableModule + Send>>,
    pub(crate) va: usize,
}

struct FrameEntry {
    frame: PhysAddr,
    owner: FrameOwner,
}

/// Wraps the physical frame pool and keeps track of every frame that backs a user page.
///
/// If the pool runs dry, a resident page is evicted with the clock algorithm
/// (pages whose accessed bit is set get a second chance).
pub(crate) struct FrameTable<P: PhysicalMemoryModule> {
    memory: P,

    /// resident frames in clock order
    resident: Vec<FrameEntry>,

    /// clock hand, index into `resident`
    hand: usize,

    evictions: usize,
}

impl<P: PhysicalMemoryModule> FrameTable<P> {
    pub(crate) fn new(memory: P) -> Self {
        Self {
            memory,
            resident: Vec::new(),
            hand: 0,
            evictions: 0,
        }
    }

    /// Returns a zeroed frame, evicting a resident page if no frame is free
    pub(crate) fn acquire<D: BlockDeviceModule>(
        &mut self,
        backing: &BackingStore<D>,
    ) -> Result<PhysAddr, VmError> {
        let frame = match self.memory.allocate_frame() {
            Some(frame) => frame,
            None => self.evict(backing)?,
        };

        self.memory.frame_mut(frame).fill(0);
        Ok(frame)
    }

    /// Records that `frame` now backs the page described by `owner`
    pub(crate) fn register(&mut self, frame: PhysAddr, owner: FrameOwner) {
        debug_assert!(
            self.resident.iter().all(|entry| entry.frame != frame),
            "{:?} is registered twice",
            frame
        );

        trace!("Frame {:?} now backs {:#x}", frame, owner.va);
        self.resident.push(FrameEntry { frame, owner });
    }

    /// Forgets the owner of `frame` and gives it back to the pool
    pub(crate) fn release(&mut self, frame: PhysAddr) {
        let index = self
            .resident
            .iter()
            .position(|entry| entry.frame == frame);

        match index {
            Some(index) => {
                self.remove_entry(index);
                self.memory.free_frame(frame);
            }
            None => panic!("released {:?} which is not resident", frame),
        }
    }

    /// Gives a frame that was acquired but never registered back to the pool
    pub(crate) fn release_unregistered(&mut self, frame: PhysAddr) {
        self.memory.free_frame(frame);
    }

    pub(crate) fn frame(&self, frame: PhysAddr) -> &[u8] {
        self.memory.frame(frame)
    }

    pub(crate) fn frame_mut(&mut self, frame: PhysAddr) -> &mut [u8] {
        self.memory.frame_mut(frame)
    }

    pub(crate) fn copy_frame(&mut self, src: PhysAddr, dst: PhysAddr) {
        self.memory.copy_frame(src, dst);
    }

    pub(crate) fn total_frames(&self) -> usize {
        self.memory.frame_count()
    }

    pub(crate) fn resident_frames(&self) -> usize {
        self.resident.len()
    }

    pub(crate) fn free_frames(&self) -> usize {
        self.memory.free_frame_count()
    }

    pub(crate) fn evictions(&self) -> usize {
        self.evictions
    }

    fn remove_entry(&mut self, index: usize) {
        self.resident.remove(index);

        if index < self.hand {
            self.hand -= 1;
        }
        if self.hand >= self.resident.len() {
            self.hand = 0;
        }
    }

    fn evict<D: BlockDeviceModule>(&mut self, backing: &BackingStore<D>) -> Result<PhysAddr, VmError> {
        debug!(
            "No free frame left, evicting one of {} resident frames",
            self.resident.len()
        );

        // two rounds, so every accessed page loses its second chance at least once
        for _ in 0..2 * self.resident.len() {
            if self.resident.is_empty() {
                break;
            }
            if self.hand >= self.resident.len() {
                self.hand = 0;
            }

            let index = self.hand;
            if let Some(frame) = self.try_evict(index, true, backing) {
                return Ok(frame);
            }

            self.hand = (index + 1) % self.resident.len();
        }

        // ignore the accessed bits, anything that can be persisted goes
        let mut index = 0;
        while index < self.resident.len() {
            if let Some(frame) = self.try_evict(index, false, backing) {
                return Ok(frame);
            }
            index += 1;
        }

        error!(
            "Out of memory: none of the {} resident frames can be evicted",
            self.resident.len()
        );
        Err(VmError::OutOfMemory)
    }

    /// Tries to free the frame at `index`.
    ///
    /// Returns the frame, which is still allocated, on success.
    fn try_evict<D: BlockDeviceModule>(
        &mut self,
        index: usize,
        second_chance: bool,
        backing: &BackingStore<D>,
    ) -> Option<PhysAddr> {
        let entry = &self.resident[index];
        let frame = entry.frame;
        let va = entry.owner.va;

        let page_ref = match entry.owner.page.upgrade() {
            Some(page_ref) => page_ref,
            None => {
                debug!("Reclaiming orphaned frame {:?} of {:#x}", frame, va);
                if let Some(page_table) = entry.owner.page_table.upgrade() {
                    page_table.lock().clear(va);
                }

                self.remove_entry(index);
                return Some(frame);
            }
        };

        let mut page = match page_ref.try_lock() {
            Some(page) => page,
            None => {
                trace!("Skipping {:#x}, page is in transit", va);
                return None;
            }
        };

        let page_table = match entry.owner.page_table.upgrade() {
            Some(page_table) => page_table,
            None => {
                warn!("Page {:#x} outlived its page table, cannot evict it", va);
                return None;
            }
        };
        let mut pt = page_table.lock();

        if second_chance && pt.is_accessed(va) {
            pt.set_accessed(va, false);
            return None;
        }

        debug!("Evicting {:#x} ({:?}) from {:?}", va, page.page_type(), frame);
        if let Err(err) = page.swap_out(self.memory.frame(frame), &mut *pt, backing) {
            warn!("Could not evict {:#x}: {}", va, err);
            return None;
        }

        drop(pt);
        drop(page);

        self.evictions += 1;
        self.remove_entry(index);
        Some(frame)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Weak;

    use try_lock::TryLock;

    use super::{FrameOwner, FrameTable};
    use crate::{
        modules::{
            block_device::MemoryBlockDevice, page_table::PageTableModule,
            physical_memory::RamPhysicalMemory,
        },
        page::Page,
        swap::SwapStore,
        vm::BackingStore,
        VmError,
    };

    fn orphan(va: usize) -> FrameOwner {
        let page_table: Weak<spin::Mutex<dyn PageTableModule + Send>> =
            Weak::<spin::Mutex<crate::modules::page_table::SoftPageTable>>::new();

        FrameOwner {
            page: Weak::<TryLock<Page>>::new(),
            page_table,
            va,
        }
    }

    fn backing() -> BackingStore<MemoryBlockDevice> {
        BackingStore::new(SwapStore::new(MemoryBlockDevice::new(0)))
    }

    #[test]
    fn test_acquire_zeroes_frames() {
        let backing = backing();
        let mut frames = FrameTable::new(RamPhysicalMemory::new(1));

        let frame = frames.acquire(&backing).unwrap();
        frames.frame_mut(frame).fill(0xFF);
        frames.release_unregistered(frame);

        let frame = frames.acquire(&backing).unwrap();
        assert!(frames.frame(frame).iter().all(|x| *x == 0));
    }

    #[test]
    fn test_orphans_are_reclaimed() {
        let backing = backing();
        let mut frames = FrameTable::new(RamPhysicalMemory::new(2));

        let a = frames.acquire(&backing).unwrap();
        frames.register(a, orphan(0x1000));
        let b = frames.acquire(&backing).unwrap();
        frames.register(b, orphan(0x2000));
        assert_eq!(frames.free_frames(), 0);

        let c = frames.acquire(&backing).unwrap();
        assert!(c == a || c == b);
        assert_eq!(frames.resident_frames(), 1);

        // reclaiming is not an eviction
        assert_eq!(frames.evictions(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let backing = backing();
        let mut frames = FrameTable::new(RamPhysicalMemory::new(1));

        // acquired but never registered, so nothing can be evicted
        let _frame = frames.acquire(&backing).unwrap();
        assert_eq!(frames.acquire(&backing), Err(VmError::OutOfMemory));
    }

    #[test]
    fn test_release_keeps_hand_in_bounds() {
        let backing = backing();
        let mut frames = FrameTable::new(RamPhysicalMemory::new(3));

        let list: Vec<_> = (0..3)
            .map(|i| {
                let frame = frames.acquire(&backing).unwrap();
                frames.register(frame, orphan(i * 0x1000));
                frame
            })
            .collect();

        frames.hand = 2;
        frames.release(list[0]);
        assert_eq!(frames.hand, 1);
        frames.release(list[2]);
        assert_eq!(frames.hand, 0);
        assert_eq!(frames.resident_frames(), 1);
        assert_eq!(frames.free_frames(), 2);
    }
}
