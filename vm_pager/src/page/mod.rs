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

mod anon;
mod file;
mod uninit;

use std::sync::Arc;

use log::trace;
use try_lock::TryLock;

use crate::{
    modules::{
        block_device::BlockDeviceModule,
        page_table::{PageTableModule, SharedPageTable},
        physical_memory::PhysicalMemoryModule,
    },
    vm::BackingStore,
    PhysAddr, SwapSlot, Vm, VmError,
};

pub(crate) use anon::AnonPage;
pub use file::FileSegment;
pub(crate) use file::FilePage;
pub use uninit::LazyLoad;
pub(crate) use uninit::UninitPage;

/// Handle to a page, shared between its supplemental page table and the frame table.
///
/// Holding the lock marks the page as in transit, the eviction engine skips locked pages.
pub type PageRef = Arc<TryLock<Page>>;

/// Identifies all pages that were created by one mapping request
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MapId(pub(crate) usize);

/// What a page is (or will be once it is touched)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageType {
    Anon,
    File,
}

#[derive(Debug)]
pub(crate) enum PageKind {
    Uninit(UninitPage),
    Anon(AnonPage),
    File(FilePage),
}

/// A user virtual page, resident or not
#[derive(Debug)]
pub struct Page {
    va: usize,
    writable: bool,
    frame: Option<PhysAddr>,
    mapping: Option<MapId>,
    pub(crate) kind: PageKind,
}

impl Page {
    pub(crate) fn new_uninit(
        va: usize,
        writable: bool,
        target: PageType,
        init: LazyLoad,
        mapping: Option<MapId>,
    ) -> Result<Self, VmError> {
        Ok(Self {
            va,
            writable,
            frame: None,
            mapping,
            kind: PageKind::Uninit(UninitPage::new(target, init)?),
        })
    }

    pub fn va(&self) -> usize {
        self.va
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Frame this page currently lives in
    pub fn frame(&self) -> Option<PhysAddr> {
        self.frame
    }

    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    /// Mapping span this page belongs to, if it was created by a file mapping
    pub fn mapping(&self) -> Option<MapId> {
        self.mapping
    }

    /// Type of this page, uninitialized pages report the type they will turn into
    pub fn page_type(&self) -> PageType {
        match &self.kind {
            PageKind::Uninit(uninit) => uninit.target,
            PageKind::Anon(_) => PageType::Anon,
            PageKind::File(_) => PageType::File,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.kind, PageKind::Uninit(_))
    }

    /// Swap slot holding the content of this page, if it is swapped out
    pub fn swap_slot(&self) -> Option<SwapSlot> {
        match &self.kind {
            PageKind::Anon(anon) => anon.slot,
            _ => None,
        }
    }

    /// File segment behind this page, if any
    pub fn file_segment(&self) -> Option<&FileSegment> {
        match &self.kind {
            PageKind::Uninit(UninitPage {
                init: LazyLoad::Segment(segment),
                ..
            }) => Some(segment),
            PageKind::File(file) => Some(&file.segment),
            _ => None,
        }
    }

    /// Fills the zeroed frame `frame` (kernel view `kva`) with the content of this page.
    ///
    /// Uninitialized pages run their loader and become anonymous or file-backed.
    /// On error the page keeps its previous state and stays non-resident.
    pub(crate) fn swap_in<D: BlockDeviceModule>(
        &mut self,
        frame: PhysAddr,
        kva: &mut [u8],
        backing: &BackingStore<D>,
    ) -> Result<(), VmError> {
        debug_assert!(self.frame.is_none(), "page {:#x} is resident already", self.va);

        match &mut self.kind {
            PageKind::Uninit(uninit) => {
                let kind = uninit.initialize(kva, &backing.fs_lock)?;
                trace!("Initialized {:#x} as {:?}", self.va, self.page_type());
                self.kind = kind;
            }
            PageKind::Anon(anon) => anon.swap_in(kva, &backing.swap)?,
            PageKind::File(file) => file.swap_in(kva, &backing.fs_lock)?,
        }

        self.frame = Some(frame);
        Ok(())
    }

    /// Persists the content of the resident page `kva` and unmaps it.
    ///
    /// The caller releases the frame afterwards.
    pub(crate) fn swap_out<D: BlockDeviceModule>(
        &mut self,
        kva: &[u8],
        page_table: &mut dyn PageTableModule,
        backing: &BackingStore<D>,
    ) -> Result<(), VmError> {
        match &mut self.kind {
            PageKind::Anon(anon) => anon.swap_out(kva, &backing.swap)?,
            PageKind::File(file) => file.swap_out(self.va, kva, page_table, &backing.fs_lock)?,
            PageKind::Uninit(_) => unreachable!("uninitialized page {:#x} is resident", self.va),
        }

        page_table.clear(self.va);
        self.frame = None;
        Ok(())
    }

    /// Releases everything this page holds: its frame, its swap slot and its mapping.
    ///
    /// Dirty file pages are written back first. Resources are released even if that fails,
    /// the first error is returned.
    pub(crate) fn destroy<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        page_table: &SharedPageTable,
    ) -> Result<(), VmError> {
        let mut result = Ok(());

        if let Some(frame) = self.frame.take() {
            let mut frames = vm.frames.lock();
            let mut pt = page_table.lock();

            if let PageKind::File(file) = &mut self.kind {
                result = file.swap_out(self.va, frames.frame(frame), &mut *pt, &vm.backing.fs_lock);
            }

            pt.clear(self.va);
            drop(pt);
            frames.release(frame);
        }

        if let PageKind::Anon(anon) = &mut self.kind {
            anon.destroy(&vm.backing.swap);
        }

        result
    }

    /// A non-resident page that produces the same content as this one does right now,
    /// as long as this page is not resident and was never written to.
    ///
    /// Content that only lives in a frame or a swap slot has to be copied separately.
    pub(crate) fn lazy_copy(&self) -> Page {
        let (target, init) = match &self.kind {
            PageKind::Uninit(uninit) => (uninit.target, uninit.init.clone()),
            PageKind::Anon(_) => (PageType::Anon, LazyLoad::Zeroed),
            PageKind::File(file) => (PageType::File, LazyLoad::Segment(file.segment.clone())),
        };

        Page {
            va: self.va,
            writable: self.writable,
            frame: None,
            mapping: self.mapping,
            kind: PageKind::Uninit(UninitPage { target, init }),
        }
    }
}
