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

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::{
    modules::{
        block_device::BlockDeviceModule, file::FileRef, physical_memory::PhysicalMemoryModule,
    },
    page::{FileSegment, LazyLoad, MapId, PageType},
    pg_round_down,
    util::{ceil_div, is_page_aligned},
    AddressSpace, Vm, VmError, PAGE_SIZE,
};

impl AddressSpace {
    /// Maps `length` bytes of `file` starting at `offset` to `addr`.
    ///
    /// Pages are loaded lazily. Bytes past the end of the file read as zero and are never written back.
    /// Either all pages are registered or none.
    pub fn do_map<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
        length: usize,
        writable: bool,
        file: &FileRef,
        offset: usize,
    ) -> Result<usize, VmError> {
        if addr == 0 {
            return Err(VmError::InvalidArgument("cannot map page zero"));
        }
        if !is_page_aligned(addr) {
            return Err(VmError::InvalidArgument("mapping address is not page aligned"));
        }
        if !is_page_aligned(offset) {
            return Err(VmError::InvalidArgument("file offset is not page aligned"));
        }
        if length == 0 {
            return Err(VmError::InvalidArgument("mapping is empty"));
        }
        if vm.config.is_kernel_vaddr(addr) || !vm.config.is_user_range(addr, length) {
            return Err(VmError::KernelAddress(addr));
        }

        let file_length = file.length();
        if file_length == 0 {
            return Err(VmError::InvalidArgument("cannot map an empty file"));
        }

        let page_count = ceil_div(length, PAGE_SIZE);
        (page_count - 1)
            .checked_mul(PAGE_SIZE)
            .and_then(|last| offset.checked_add(last))
            .ok_or(VmError::InvalidArgument("file offset out of range"))?;

        if let Some(taken) = (0..page_count)
            .map(|i| addr + i * PAGE_SIZE)
            .find(|va| self.spt.contains(*va))
        {
            return Err(VmError::AlreadyMapped(taken));
        }

        let mapping = vm.next_map_id();
        let mut remaining = length.min(file_length.saturating_sub(offset));

        for i in 0..page_count {
            let va = addr + i * PAGE_SIZE;
            let read_bytes = remaining.min(PAGE_SIZE);
            remaining -= read_bytes;

            let res = FileSegment::new(file.clone(), offset + i * PAGE_SIZE, read_bytes)
                .and_then(|segment| {
                    self.allocate_page(
                        vm,
                        PageType::File,
                        va,
                        writable,
                        LazyLoad::Segment(segment),
                        Some(mapping),
                    )
                });

            if let Err(err) = res {
                warn!("Mapping {:#x} failed at {:#x}: {}", addr, va, err);
                self.rollback_mapping(vm, addr, i);
                return Err(err);
            }
        }

        debug!(
            "Mapped {} bytes of file offset {} at {:#x} ({:?})",
            length, offset, addr, mapping
        );
        Ok(addr)
    }

    /// Removes the first `count` pages of a mapping that never got touched
    fn rollback_mapping<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
        count: usize,
    ) {
        for i in 0..count {
            let _ = self.spt.remove(addr + i * PAGE_SIZE, vm, &self.page_table);
        }
    }

    /// Removes the mapping that contains `addr`. Dirty pages are written back to the file.
    ///
    /// Returns the number of pages that were unmapped.
    pub fn do_unmap<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
    ) -> Result<usize, VmError> {
        let va = pg_round_down(addr);
        let mapping = self
            .mapping_of(va)
            .ok_or(VmError::NotMapped(addr))?;

        let mut result = Ok(());
        let mut count = 0;
        let mut current = va;

        while self.mapping_of(current) == Some(mapping) {
            if let Err(err) = self.spt.remove(current, vm, &self.page_table) {
                warn!("Could not unmap {:#x}: {}", current, err);
                if result.is_ok() {
                    result = Err(err);
                }
                // a busy page is still there, do not loop on it
                if self.spt.contains(current) {
                    break;
                }
            }

            count += 1;
            current += PAGE_SIZE;
        }

        trace!("Unmapped {} pages of {:?} at {:#x}", count, mapping, va);
        result.map(|_| count)
    }

    /// Unmaps every mapping of this address space, keeps going on errors and returns the first one
    pub fn unmap_all<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
    ) -> Result<(), VmError> {
        // lowest address of each mapping
        let mut starts: BTreeMap<MapId, usize> = BTreeMap::new();
        for page_ref in self.spt.pages() {
            if let Some(page) = page_ref.try_lock() {
                if let Some(mapping) = page.mapping() {
                    starts.entry(mapping).or_insert(page.va());
                }
            }
        }

        let mut result = Ok(());
        for (_, start) in starts {
            if let Err(err) = self.do_unmap(vm, start) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        result
    }

    fn mapping_of(&self, va: usize) -> Option<MapId> {
        let page_ref = self.spt.find(va)?;
        let page = page_ref.try_lock()?;
        page.mapping()
    }
}
