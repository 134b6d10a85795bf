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

use crate::{modules::block_device::BlockDeviceModule, swap::SwapStore, SwapSlot, VmError};

/// Page without a file behind it, its content goes to swap on eviction
#[derive(Debug, Default)]
pub(crate) struct AnonPage {
    /// Where the content lives while the page is not resident
    pub(crate) slot: Option<SwapSlot>,
}

impl AnonPage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Restores the content into `kva`, a page that was never swapped out stays zeroed
    pub(crate) fn swap_in<D: BlockDeviceModule>(
        &mut self,
        kva: &mut [u8],
        swap: &SwapStore<D>,
    ) -> Result<(), VmError> {
        if let Some(slot) = self.slot {
            swap.swap_in(slot, kva)?;
            self.slot = None;
        }
        Ok(())
    }

    pub(crate) fn swap_out<D: BlockDeviceModule>(
        &mut self,
        kva: &[u8],
        swap: &SwapStore<D>,
    ) -> Result<(), VmError> {
        debug_assert!(self.slot.is_none(), "resident page owns a swap slot");

        self.slot = Some(swap.swap_out(kva)?);
        Ok(())
    }

    pub(crate) fn destroy<D: BlockDeviceModule>(&mut self, swap: &SwapStore<D>) {
        if let Some(slot) = self.slot.take() {
            trace!("Releasing swap slot {}", slot.index());
            swap.release(slot);
        }
    }
}
