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

mod address_space;
mod error;
mod frame_table;
mod mmap;
mod page;
mod spt;
mod swap;
mod user_access;
mod util;
mod vm;
mod vm_config;

#[cfg(test)]
mod test;

pub mod modules;

pub use address_space::{AddressSpace, PageFault};
pub use error::VmError;
pub use modules::physical_memory::PhysAddr;
pub use page::{FileSegment, LazyLoad, MapId, Page, PageRef, PageType};
pub use spt::SupplementalPageTable;
pub use swap::{SwapSlot, SwapStore};
pub use util::{pg_offset, pg_round_down, pg_round_up};
pub use vm::Vm;
pub use vm_config::VmConfig;

/// Size of one virtual page and of one physical frame in bytes
pub const PAGE_SIZE: usize = 4096;

/// Size of one sector of a block device in bytes
pub const SECTOR_SIZE: usize = 512;

/// How many device sectors are needed to hold one page
pub const SECTORS_PER_PAGE: usize = PAGE_SIZE / SECTOR_SIZE;

static_assertions::const_assert_eq!(PAGE_SIZE % SECTOR_SIZE, 0);
static_assertions::const_assert!(PAGE_SIZE.is_power_of_two());
