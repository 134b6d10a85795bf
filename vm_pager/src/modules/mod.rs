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

//! Collaborators the virtual memory subsystem is built on top of.
//!
//! Each of them is hidden behind a trait, so a kernel can plug in its real MMU, frame pool,
//! disk driver and filesystem, while tests and the desktop demo use the in-memory versions.

pub mod block_device;
pub mod file;
pub mod page_table;
pub mod physical_memory;
