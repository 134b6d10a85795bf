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

use rand::{rngs::SmallRng, RngCore, SeedableRng};

use crate::{
    modules::{
        block_device::MemoryBlockDevice,
        file::{FileRef, MemoryFile},
        physical_memory::RamPhysicalMemory,
    },
    AddressSpace, Vm, VmConfig, SECTORS_PER_PAGE,
};

mod fork;
mod mmap;

pub(crate) type TestVm = Vm<RamPhysicalMemory, MemoryBlockDevice>;

pub(crate) const SEED: u64 = 5446535461589659585;

/// Base address the scenario tests place their pages at
pub(crate) const USER_BASE: usize = 0x1000_0000;

pub(crate) fn get_test_vm(frames: usize, swap_slots: usize) -> TestVm {
    init_logger();

    Vm::new(
        VmConfig::default(),
        RamPhysicalMemory::new(frames),
        MemoryBlockDevice::new(swap_slots * SECTORS_PER_PAGE),
    )
}

pub(crate) fn get_test_space() -> AddressSpace {
    AddressSpace::default()
}

pub(crate) fn rand_data(rand: &mut SmallRng, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand.fill_bytes(&mut data);
    data
}

/// In-memory file with `len` random bytes, returns the file and its initial content
pub(crate) fn get_test_file(len: usize) -> (FileRef, Vec<u8>) {
    let mut rand = SmallRng::seed_from_u64(SEED ^ len as u64);
    let data = rand_data(&mut rand, len);

    (FileRef::new(MemoryFile::new(data.clone())), data)
}

pub(crate) fn read_file(vm: &TestVm, file: &FileRef) -> Vec<u8> {
    let mut content = vec![0u8; file.length()];
    file.read_exact_at(vm.fs_lock(), 0, &mut content).unwrap();
    content
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
