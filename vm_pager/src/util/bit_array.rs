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

/// Fixed size bitmap, all bits are unset initially
pub(crate) struct BitArray {
    arr: Vec<u8>,
    len: usize,
}

impl BitArray {
    pub(crate) fn new(len: usize) -> Self {
        BitArray {
            arr: vec![0u8; len.div_ceil(8)],
            len,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn set(&mut self, value: bool, index: usize) {
        assert!(index < self.len, "bit index {} out of bounds ({})", index, self.len);
        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = &mut self.arr[arr_index];
        if value {
            // set bit
            *item |= 1u8 << internal_index;
        } else {
            // unset bit
            *item &= !(1u8 << internal_index);
        }
    }

    pub(crate) fn is_set(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index {} out of bounds ({})", index, self.len);
        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = self.arr[arr_index];
        (item & (1u8 << internal_index)) != 0
    }

    /// Index of the first unset bit, scanning from the start
    pub(crate) fn first_unset(&self) -> Option<usize> {
        self.arr
            .iter()
            .enumerate()
            .find(|(_, item)| **item != u8::MAX)
            .map(|(arr_index, item)| arr_index * 8 + item.trailing_ones() as usize)
            .filter(|index| *index < self.len)
    }

    pub(crate) fn count_set(&self) -> usize {
        self.arr.iter().map(|item| item.count_ones() as usize).sum()
    }
}
