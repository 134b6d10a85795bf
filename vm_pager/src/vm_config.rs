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

use crate::PAGE_SIZE;

/// Geometry of a user address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// First virtual address that belongs to the kernel.
    /// Every address at or above it is off limits for user pages.
    pub kernel_base: usize,

    /// Address right above the highest byte of the user stack
    pub stack_top: usize,

    /// The stack is allowed to grow up to this many bytes below `stack_top`
    pub max_stack_size: usize,

    /// Accesses up to this many bytes below the stack pointer still count as stack accesses
    /// (e.g. `push` writes before it moves the stack pointer)
    pub stack_slack: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            kernel_base: 0x80_0400_0000,
            stack_top: 0x4748_0000,
            max_stack_size: 1 << 20,
            stack_slack: 8,
        }
    }
}

impl VmConfig {
    #[inline]
    pub fn is_kernel_vaddr(&self, addr: usize) -> bool {
        addr >= self.kernel_base
    }

    /// Lowest address the stack may ever grow to
    #[inline]
    pub fn stack_limit(&self) -> usize {
        self.stack_top.saturating_sub(self.max_stack_size)
    }

    /// Checks whether a fault at `addr` looks like the stack growing down past its last page.
    pub fn is_stack_growth(&self, addr: usize, stack_pointer: usize) -> bool {
        addr < self.stack_top
            && addr >= self.stack_limit()
            && addr.saturating_add(self.stack_slack) >= stack_pointer
    }

    /// Checks that `[addr, addr + len)` lies completely inside user space
    pub fn is_user_range(&self, addr: usize, len: usize) -> bool {
        match addr.checked_add(len) {
            Some(end) => end <= self.kernel_base,
            None => false,
        }
    }

    pub(crate) fn validate(&self) {
        assert_eq!(self.stack_top % PAGE_SIZE, 0, "stack top has to be page aligned");
        assert_eq!(self.kernel_base % PAGE_SIZE, 0, "kernel base has to be page aligned");
        assert!(self.stack_top <= self.kernel_base, "stack has to live in user space");
    }
}
