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

use log::{error, trace, warn};

use crate::{
    modules::block_device::BlockDeviceModule, util::bit_array::BitArray, VmError, PAGE_SIZE,
    SECTORS_PER_PAGE, SECTOR_SIZE,
};

/// Index of one page sized slot on the swap device
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapSlot(usize);

impl SwapSlot {
    pub fn index(self) -> usize {
        self.0
    }

    fn first_sector(self) -> usize {
        self.0 * SECTORS_PER_PAGE
    }
}

struct SwapInner<D: BlockDeviceModule> {
    device: D,
    used: BitArray,
}

impl<D: BlockDeviceModule> SwapInner<D> {
    fn write_page(&mut self, slot: SwapSlot, src: &[u8]) -> Result<(), VmError> {
        for (i, chunk) in src.chunks_exact(SECTOR_SIZE).enumerate() {
            self.device.write_sector(slot.first_sector() + i, chunk)?;
        }
        Ok(())
    }

    fn read_page(&mut self, slot: SwapSlot, dest: &mut [u8]) -> Result<(), VmError> {
        for (i, chunk) in dest.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            self.device.read_sector(slot.first_sector() + i, chunk)?;
        }
        Ok(())
    }

    fn check_occupied(&self, slot: SwapSlot) -> Result<(), VmError> {
        if slot.0 >= self.used.len() || !self.used.is_set(slot.0) {
            error!("Swap slot {} is not occupied", slot.0);
            return Err(VmError::InvalidArgument("swap slot is not occupied"));
        }
        Ok(())
    }
}

/// Partitions the swap device into page sized slots and tracks which of them hold data.
///
/// Reserving a slot and writing the page to it is one step under the store's lock,
/// so two evictions can never end up in the same slot.
pub struct SwapStore<D: BlockDeviceModule> {
    inner: spin::Mutex<SwapInner<D>>,
    slot_count: usize,
}

impl<D: BlockDeviceModule> SwapStore<D> {
    /// Creates a new store, trailing sectors that do not make up a whole page are unused
    pub fn new(device: D) -> Self {
        let slot_count = device.size() / PAGE_SIZE;
        trace!("Swap store with {} slots", slot_count);

        Self {
            inner: spin::Mutex::new(SwapInner {
                device,
                used: BitArray::new(slot_count),
            }),
            slot_count,
        }
    }

    /// Writes the page `src` to a free slot and marks it as occupied
    pub fn swap_out(&self, src: &[u8]) -> Result<SwapSlot, VmError> {
        debug_assert_eq!(src.len(), PAGE_SIZE);

        let mut inner = self.inner.lock();
        let slot = match inner.used.first_unset() {
            Some(index) => SwapSlot(index),
            None => {
                warn!("Swap device is full ({} slots)", self.slot_count);
                return Err(VmError::SwapFull);
            }
        };

        // slot stays free if the device fails
        inner.write_page(slot, src)?;
        inner.used.set(true, slot.0);

        trace!("Swapped out page to slot {}", slot.0);
        Ok(slot)
    }

    /// Reads the page stored in `slot` into `dest` and frees the slot
    pub fn swap_in(&self, slot: SwapSlot, dest: &mut [u8]) -> Result<(), VmError> {
        debug_assert_eq!(dest.len(), PAGE_SIZE);

        let mut inner = self.inner.lock();
        inner.check_occupied(slot)?;
        inner.read_page(slot, dest)?;
        inner.used.set(false, slot.0);

        trace!("Swapped in page from slot {}", slot.0);
        Ok(())
    }

    /// Reads the page stored in `slot` into `dest`, the slot stays occupied
    pub fn read_slot(&self, slot: SwapSlot, dest: &mut [u8]) -> Result<(), VmError> {
        debug_assert_eq!(dest.len(), PAGE_SIZE);

        let mut inner = self.inner.lock();
        inner.check_occupied(slot)?;
        inner.read_page(slot, dest)
    }

    /// Frees `slot` without reading it
    pub fn release(&self, slot: SwapSlot) {
        let mut inner = self.inner.lock();
        assert!(
            inner.used.is_set(slot.0),
            "swap slot {} released twice",
            slot.0
        );
        inner.used.set(false, slot.0);
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn used_slots(&self) -> usize {
        self.inner.lock().used.count_set()
    }
}
