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

mod soft;

use std::sync::Arc;

use crate::PhysAddr;

pub use soft::SoftPageTable;

/// A single resident mapping as seen by the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub frame: PhysAddr,
    pub writable: bool,
    pub accessed: bool,
    pub dirty: bool,
}

/// The hardware page table of one process.
///
/// It only knows resident pages, everything else is tracked by the supplemental page table.
/// All addresses passed to this module are page aligned.
pub trait PageTableModule {
    /// Maps the page at `va` to `frame`.
    ///
    /// Returns `false` if the mapping could not be installed
    /// (e.g. `va` is already mapped or no memory for the page table itself is left).
    fn install(&mut self, va: usize, frame: PhysAddr, writable: bool) -> bool;

    /// Removes the mapping of `va`, so that the next access faults again.
    /// Does nothing if `va` is not mapped.
    fn clear(&mut self, va: usize);

    /// Looks up the current mapping of `va`
    fn translate(&self, va: usize) -> Option<PageTableEntry>;

    /// Returns `true` if the page was written to since the bit was cleared last.
    /// Unmapped pages are never dirty.
    fn is_dirty(&self, va: usize) -> bool;

    fn set_dirty(&mut self, va: usize, dirty: bool);

    /// Returns `true` if the page was accessed since the bit was cleared last.
    /// Unmapped pages are never accessed.
    fn is_accessed(&self, va: usize) -> bool;

    fn set_accessed(&mut self, va: usize, accessed: bool);
}

/// Page table handle that is shared between its process and the eviction engine
pub type SharedPageTable = Arc<spin::Mutex<dyn PageTableModule + Send>>;

pub fn share_page_table<T: PageTableModule + Send + 'static>(page_table: T) -> SharedPageTable {
    Arc::new(spin::Mutex::new(page_table))
}
