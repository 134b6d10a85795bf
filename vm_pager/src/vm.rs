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

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    frame_table::FrameTable,
    modules::{
        block_device::BlockDeviceModule, file::FsLock, physical_memory::PhysicalMemoryModule,
    },
    page::MapId,
    SwapStore, VmConfig,
};

/// Where non-resident page content lives: the swap device and the filesystem
pub(crate) struct BackingStore<D: BlockDeviceModule> {
    pub(crate) swap: SwapStore<D>,
    pub(crate) fs_lock: FsLock,
}

impl<D: BlockDeviceModule> BackingStore<D> {
    pub(crate) fn new(swap: SwapStore<D>) -> Self {
        Self {
            swap,
            fs_lock: FsLock::new(),
        }
    }
}

/// Kernel wide state that is shared by every address space.
///
/// Each operation on an [`crate::AddressSpace`] takes the `Vm` it lives in.
pub struct Vm<P: PhysicalMemoryModule, D: BlockDeviceModule> {
    pub(crate) config: VmConfig,
    pub(crate) frames: spin::Mutex<FrameTable<P>>,
    pub(crate) backing: BackingStore<D>,
    next_map_id: AtomicUsize,
}

impl<P: PhysicalMemoryModule, D: BlockDeviceModule> Vm<P, D> {
    /// Creates a new context that hands out frames of `memory` and swaps to `swap_device`
    pub fn new(config: VmConfig, memory: P, swap_device: D) -> Self {
        config.validate();

        Self {
            config,
            frames: spin::Mutex::new(FrameTable::new(memory)),
            backing: BackingStore::new(SwapStore::new(swap_device)),
            next_map_id: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn swap(&self) -> &SwapStore<D> {
        &self.backing.swap
    }

    pub fn fs_lock(&self) -> &FsLock {
        &self.backing.fs_lock
    }

    /// Size of the frame pool
    pub fn total_frames(&self) -> usize {
        self.frames.lock().total_frames()
    }

    /// Number of frames that currently back a user page
    pub fn resident_frames(&self) -> usize {
        self.frames.lock().resident_frames()
    }

    pub fn free_frames(&self) -> usize {
        self.frames.lock().free_frames()
    }

    /// Number of pages that were evicted so far
    pub fn evictions(&self) -> usize {
        self.frames.lock().evictions()
    }

    pub(crate) fn next_map_id(&self) -> MapId {
        MapId(self.next_map_id.fetch_add(1, Ordering::Relaxed))
    }
}
