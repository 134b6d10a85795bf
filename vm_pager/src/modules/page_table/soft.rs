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

use super::{PageTableEntry, PageTableModule};
use crate::{util::is_page_aligned, PhysAddr};

/// Page table that lives completely in software.
///
/// Accessed and dirty bits are only updated by whoever simulates the CPU
/// (see `AddressSpace::read_user` and `AddressSpace::write_user`).
#[derive(Debug, Default)]
pub struct SoftPageTable {
    entries: BTreeMap<usize, PageTableEntry>,

    /// maximum number of mappings, `None` means unlimited
    limit: Option<usize>,
}

impl SoftPageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a page table which refuses to install more than `limit` mappings
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            limit: Some(limit),
        }
    }
}

impl PageTableModule for SoftPageTable {
    fn install(&mut self, va: usize, frame: PhysAddr, writable: bool) -> bool {
        debug_assert!(is_page_aligned(va), "unaligned address {:#x}", va);

        if self.entries.contains_key(&va) {
            return false;
        }
        if self.limit.is_some_and(|limit| self.entries.len() >= limit) {
            return false;
        }

        self.entries.insert(
            va,
            PageTableEntry {
                frame,
                writable,
                accessed: false,
                dirty: false,
            },
        );
        true
    }

    fn clear(&mut self, va: usize) {
        self.entries.remove(&va);
    }

    fn translate(&self, va: usize) -> Option<PageTableEntry> {
        self.entries.get(&va).copied()
    }

    fn is_dirty(&self, va: usize) -> bool {
        self.entries.get(&va).is_some_and(|entry| entry.dirty)
    }

    fn set_dirty(&mut self, va: usize, dirty: bool) {
        if let Some(entry) = self.entries.get_mut(&va) {
            entry.dirty = dirty;
        }
    }

    fn is_accessed(&self, va: usize) -> bool {
        self.entries.get(&va).is_some_and(|entry| entry.accessed)
    }

    fn set_accessed(&mut self, va: usize, accessed: bool) {
        if let Some(entry) = self.entries.get_mut(&va) {
            entry.accessed = accessed;
        }
    }
}
