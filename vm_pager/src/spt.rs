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

use std::{collections::BTreeMap, mem, sync::Arc};

use log::{trace, warn};
use try_lock::TryLock;

use crate::{
    address_space::do_claim_page,
    modules::{
        block_device::BlockDeviceModule, page_table::SharedPageTable,
        physical_memory::PhysicalMemoryModule,
    },
    page::{Page, PageRef, PageType},
    pg_round_down, Vm, VmError,
};

/// Per process map from page address to page, the authoritative record of a process's memory.
///
/// The hardware page table only knows the pages that are resident right now.
#[derive(Default)]
pub struct SupplementalPageTable {
    pages: BTreeMap<usize, PageRef>,
}

impl SupplementalPageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the page that contains `addr`
    pub fn find(&self, addr: usize) -> Option<PageRef> {
        self.pages.get(&pg_round_down(addr)).cloned()
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.pages.contains_key(&pg_round_down(addr))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All pages ordered by address
    pub fn pages(&self) -> impl Iterator<Item = &PageRef> {
        self.pages.values()
    }

    /// Registers `page`, fails if its address is taken already
    pub fn insert(&mut self, page: Page) -> Result<PageRef, VmError> {
        let va = page.va();
        if self.pages.contains_key(&va) {
            return Err(VmError::AlreadyMapped(va));
        }

        let page_ref = Arc::new(TryLock::new(page));
        self.pages.insert(va, page_ref.clone());
        Ok(page_ref)
    }

    /// Deallocates the page at `addr` and removes its entry
    pub(crate) fn remove<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        addr: usize,
        vm: &Vm<P, D>,
        page_table: &SharedPageTable,
    ) -> Result<(), VmError> {
        let va = pg_round_down(addr);
        let page_ref = self
            .pages
            .get(&va)
            .cloned()
            .ok_or(VmError::InvalidAddress(va))?;

        let mut page = page_ref.try_lock().ok_or(VmError::PageBusy(va))?;
        self.pages.remove(&va);

        trace!("Removing page {:#x}", va);
        page.destroy(vm, page_table)
    }

    /// Deallocates every page, the table is empty afterwards.
    ///
    /// Keeps going on errors and returns the first one.
    pub(crate) fn destroy<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        page_table: &SharedPageTable,
    ) -> Result<(), VmError> {
        let mut result = Ok(());

        for (va, page_ref) in mem::take(&mut self.pages) {
            let res = match page_ref.try_lock() {
                Some(mut page) => page.destroy(vm, page_table),
                None => {
                    warn!("Page {:#x} is in transit while its table is destroyed", va);
                    Err(VmError::PageBusy(va))
                }
            };

            if let Err(err) = res {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        result
    }

    /// Duplicates every page of `src` into this table.
    ///
    /// Non-resident pages are copied lazily. Resident and swapped out pages are materialized
    /// right away and get a private copy of the parent's current content.
    /// On error, whatever was copied so far stays in this table.
    pub(crate) fn copy_from<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        src: &SupplementalPageTable,
        vm: &Vm<P, D>,
        page_table: &SharedPageTable,
        src_page_table: &SharedPageTable,
    ) -> Result<(), VmError> {
        for (&va, src_ref) in src.pages.iter() {
            let src_page = src_ref.try_lock().ok_or(VmError::PageBusy(va))?;
            let child_ref = self.insert(src_page.lazy_copy())?;

            let slot = src_page.swap_slot();
            if !src_page.is_resident() && slot.is_none() {
                continue;
            }

            let mut child = child_ref.try_lock().ok_or(VmError::PageBusy(va))?;
            let child_frame = do_claim_page(&child_ref, &mut child, vm, page_table)?;

            if let Some(src_frame) = src_page.frame() {
                vm.frames.lock().copy_frame(src_frame, child_frame);

                if src_page.page_type() == PageType::File && src_page_table.lock().is_dirty(va) {
                    page_table.lock().set_dirty(va, true);
                }
            } else if let Some(slot) = slot {
                let mut frames = vm.frames.lock();
                vm.backing.swap.read_slot(slot, frames.frame_mut(child_frame))?;
            }

            trace!("Copied page {:#x} into {:?}", va, child_frame);
        }

        Ok(())
    }
}
