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

pub(crate) mod bit_array;

use crate::PAGE_SIZE;

/// Rounds `addr` down to the start of its page
#[inline]
pub fn pg_round_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// Rounds `addr` up to the next page boundary
#[inline]
pub fn pg_round_up(addr: usize) -> usize {
    pg_round_down(addr + PAGE_SIZE - 1)
}

/// Offset of `addr` inside its page
#[inline]
pub fn pg_offset(addr: usize) -> usize {
    addr & (PAGE_SIZE - 1)
}

#[inline]
pub(crate) fn is_page_aligned(addr: usize) -> bool {
    pg_offset(addr) == 0
}

/// efficient way to calculate: ceil(x / y)
#[inline]
pub(crate) const fn ceil_div(x: usize, y: usize) -> usize {
    (x + y - 1) / y
}
