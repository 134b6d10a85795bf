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

use std::sync::Arc;

use log::{debug, error, trace, warn};

use crate::{
    frame_table::FrameOwner,
    modules::{
        block_device::BlockDeviceModule,
        page_table::{share_page_table, SharedPageTable, SoftPageTable},
        physical_memory::PhysicalMemoryModule,
    },
    page::{LazyLoad, MapId, Page, PageRef, PageType},
    pg_round_down,
    util::is_page_aligned,
    PhysAddr, SupplementalPageTable, Vm, VmError, PAGE_SIZE,
};

/// Everything the trap layer knows about a page fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFault {
    /// faulting address
    pub addr: usize,

    /// the access came from user mode. Only logged, the pager treats both modes the same.
    pub user: bool,

    /// the access was a write
    pub write: bool,

    /// `true` if the page was not present, `false` for a protection violation
    pub not_present: bool,

    /// user stack pointer at the time of the fault.
    /// For a fault in kernel mode this has to be the one saved on entry from user mode.
    pub stack_pointer: usize,
}

/// The virtual memory of one process: its supplemental page table and its hardware page table
pub struct AddressSpace {
    pub(crate) spt: SupplementalPageTable,
    pub(crate) page_table: SharedPageTable,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new(share_page_table(SoftPageTable::new()))
    }
}

impl AddressSpace {
    pub fn new(page_table: SharedPageTable) -> Self {
        Self {
            spt: SupplementalPageTable::new(),
            page_table,
        }
    }

    pub fn spt(&self) -> &SupplementalPageTable {
        &self.spt
    }

    pub fn page_table(&self) -> &SharedPageTable {
        &self.page_table
    }

    pub fn find_page(&self, addr: usize) -> Option<PageRef> {
        self.spt.find(addr)
    }

    /// Type the page at `addr` has (or will have once it is touched)
    pub fn page_type(&self, addr: usize) -> Result<PageType, VmError> {
        let page_ref = self
            .spt
            .find(addr)
            .ok_or(VmError::InvalidAddress(addr))?;
        let page = page_ref
            .try_lock()
            .ok_or(VmError::PageBusy(pg_round_down(addr)))?;

        Ok(page.page_type())
    }

    /// Number of pages that are resident right now
    pub fn resident_pages(&self) -> usize {
        self.spt
            .pages()
            .filter(|page_ref| page_ref.try_lock().is_some_and(|page| page.is_resident()))
            .count()
    }

    /// Registers a page at `va` whose content is produced by `init` on first access
    pub fn allocate_lazy_page<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        page_type: PageType,
        va: usize,
        writable: bool,
        init: LazyLoad,
    ) -> Result<(), VmError> {
        self.allocate_page(vm, page_type, va, writable, init, None)
            .map(|_| ())
    }

    pub(crate) fn allocate_page<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        page_type: PageType,
        va: usize,
        writable: bool,
        init: LazyLoad,
        mapping: Option<MapId>,
    ) -> Result<PageRef, VmError> {
        if !is_page_aligned(va) {
            return Err(VmError::InvalidArgument("page address is not page aligned"));
        }
        if vm.config.is_kernel_vaddr(va) {
            return Err(VmError::KernelAddress(va));
        }

        let page = Page::new_uninit(va, writable, page_type, init, mapping)?;
        let page_ref = self.spt.insert(page)?;

        trace!("Allocated lazy {:?} page at {:#x}", page_type, va);
        Ok(page_ref)
    }

    /// Makes the page at `addr` resident without a fault
    pub fn claim_page<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
    ) -> Result<PhysAddr, VmError> {
        let va = pg_round_down(addr);
        let page_ref = self.spt.find(va).ok_or(VmError::InvalidAddress(addr))?;
        let mut page = page_ref.try_lock().ok_or(VmError::PageBusy(va))?;

        match page.frame() {
            Some(frame) => Ok(frame),
            None => do_claim_page(&page_ref, &mut page, vm, &self.page_table),
        }
    }

    /// Resolves a page fault. Any error is fatal for the faulting process.
    pub fn handle_fault<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        fault: PageFault,
    ) -> Result<(), VmError> {
        trace!("{:?}", fault);

        if vm.config.is_kernel_vaddr(fault.addr) {
            return Err(VmError::KernelAddress(fault.addr));
        }
        if !fault.not_present {
            return Err(VmError::ProtectionViolation(fault.addr));
        }

        let va = pg_round_down(fault.addr);
        let page_ref = match self.spt.find(va) {
            Some(page_ref) => page_ref,
            None if vm.config.is_stack_growth(fault.addr, fault.stack_pointer) => {
                debug!("Growing stack down to {:#x}", va);
                self.allocate_page(vm, PageType::Anon, va, true, LazyLoad::Zeroed, None)?
            }
            None => return Err(VmError::InvalidAddress(fault.addr)),
        };

        let mut page = page_ref.try_lock().ok_or(VmError::PageBusy(va))?;
        if fault.write && !page.writable() {
            return Err(VmError::ProtectionViolation(fault.addr));
        }
        if page.is_resident() {
            // raced with another fault on the same page
            return Ok(());
        }

        do_claim_page(&page_ref, &mut page, vm, &self.page_table).map(|_| ())
    }

    /// Creates the first stack page right below the stack top and returns the initial stack pointer
    pub fn setup_stack<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
    ) -> Result<usize, VmError> {
        let stack_bottom = vm.config.stack_top - PAGE_SIZE;
        self.allocate_page(vm, PageType::Anon, stack_bottom, true, LazyLoad::Zeroed, None)?;
        self.claim_page(vm, stack_bottom)?;

        Ok(vm.config.stack_top)
    }

    /// Duplicates this address space into a new one that uses `page_table`.
    ///
    /// The copy is torn down again if anything fails.
    pub fn fork<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &self,
        vm: &Vm<P, D>,
        page_table: SharedPageTable,
    ) -> Result<AddressSpace, VmError> {
        let mut child = AddressSpace::new(page_table);

        if let Err(err) = child.copy_from(vm, self) {
            error!("Fork failed: {}", err);
            if let Err(teardown) = child.destroy(vm) {
                warn!("Could not tear down partial fork: {}", teardown);
            }
            return Err(err);
        }

        debug!("Forked address space with {} pages", child.spt.len());
        Ok(child)
    }

    /// Copies every page of `src` into this address space, see [`AddressSpace::fork`].
    ///
    /// On error, the pages copied so far stay in this address space.
    pub fn copy_from<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        src: &AddressSpace,
    ) -> Result<(), VmError> {
        self.spt
            .copy_from(&src.spt, vm, &self.page_table, &src.page_table)
    }

    /// Deallocates the page at `addr`
    pub fn remove_page<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
    ) -> Result<(), VmError> {
        self.spt.remove(addr, vm, &self.page_table)
    }

    /// Releases every page of this address space.
    ///
    /// Dirty file pages are written back, frames and swap slots are freed.
    pub fn destroy<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        mut self,
        vm: &Vm<P, D>,
    ) -> Result<(), VmError> {
        self.spt.destroy(vm, &self.page_table)
    }

    /// Process exit: unmaps every file mapping, then destroys everything else
    pub fn exit<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        mut self,
        vm: &Vm<P, D>,
    ) -> Result<(), VmError> {
        let unmapped = self.unmap_all(vm);
        let destroyed = self.destroy(vm);

        unmapped.and(destroyed)
    }
}

/// Gives the locked, non-resident `page` a frame, maps it and loads its content.
///
/// Nothing is left behind if this fails: the frame goes back to the pool and the mapping is removed.
pub(crate) fn do_claim_page<P: PhysicalMemoryModule, D: BlockDeviceModule>(
    page_ref: &PageRef,
    page: &mut Page,
    vm: &Vm<P, D>,
    page_table: &SharedPageTable,
) -> Result<PhysAddr, VmError> {
    let va = page.va();
    let mut frames = vm.frames.lock();
    let frame = frames.acquire(&vm.backing)?;

    if !page_table.lock().install(va, frame, page.writable()) {
        error!("Could not map {:#x} to {:?}", va, frame);
        frames.release_unregistered(frame);
        return Err(VmError::MappingFailed(va));
    }

    if let Err(err) = page.swap_in(frame, frames.frame_mut(frame), &vm.backing) {
        error!("Could not load {:#x}: {}", va, err);
        page_table.lock().clear(va);
        frames.release_unregistered(frame);
        return Err(err);
    }

    frames.register(
        frame,
        FrameOwner {
            page: Arc::downgrade(page_ref),
            page_table: Arc::downgrade(page_table),
            va,
        },
    );

    trace!("Claimed {:#x} in {:?}", va, frame);
    Ok(frame)
}
