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

use std::{error::Error, fs};

use env_logger::{Builder, Env};
use log::{info, warn};
use rand::{rngs::SmallRng, RngCore, SeedableRng};
use vm_pager::{
    modules::{
        block_device::FileBlockDevice,
        file::{FileRef, HostFile},
        page_table::{share_page_table, SoftPageTable},
        physical_memory::RamPhysicalMemory,
    },
    AddressSpace, LazyLoad, PageType, Vm, VmConfig, PAGE_SIZE, SECTORS_PER_PAGE,
};

const SEED: u64 = 5446535461589659585;

const FRAME_COUNT: usize = 4;
const SWAP_SLOTS: usize = 64;
const ANON_PAGES: usize = 16;

const MAPPED_FILE: &str = "/tmp/paging_demo_mapped.data";
const SWAP_FILE: &str = "/tmp/paging_demo_swap.data";

const HEAP_BASE: usize = 0x1000_0000;
const MAP_BASE: usize = 0x2000_0000;

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Info)
        .format_module_path(false)
        .init();

    let mut rand = SmallRng::seed_from_u64(SEED);

    let mut file_content = vec![0u8; 3 * PAGE_SIZE + 123];
    rand.fill_bytes(&mut file_content);
    fs::write(MAPPED_FILE, &file_content)?;

    let swap = FileBlockDevice::new(SWAP_FILE.into(), SWAP_SLOTS * SECTORS_PER_PAGE)?;
    let vm = Vm::new(VmConfig::default(), RamPhysicalMemory::new(FRAME_COUNT), swap);

    let mut parent = AddressSpace::default();
    let stack_pointer = parent.setup_stack(&vm)?;
    info!("stack set up, stack pointer at {:#x}", stack_pointer);

    // file mapping, partially overwritten
    let file = FileRef::new(HostFile::open(MAPPED_FILE)?);
    parent.do_map(&vm, MAP_BASE, file_content.len(), true, &file, 0)?;
    parent.write_user(&vm, MAP_BASE + PAGE_SIZE, b"written through a mapping", stack_pointer)?;

    // anonymous memory pressure, much more than fits into the frame pool
    let mut anon_content = Vec::with_capacity(ANON_PAGES);
    for i in 0..ANON_PAGES {
        let va = HEAP_BASE + i * PAGE_SIZE;
        let mut data = vec![0u8; PAGE_SIZE];
        rand.fill_bytes(&mut data);

        parent.allocate_lazy_page(&vm, PageType::Anon, va, true, LazyLoad::Zeroed)?;
        parent.write_user(&vm, va, &data, stack_pointer)?;
        anon_content.push(data);
    }
    info!(
        "{} anonymous pages written: {} evictions, {} of {} swap slots used",
        ANON_PAGES,
        vm.evictions(),
        vm.swap().used_slots(),
        vm.swap().slot_count()
    );

    // stack growth: push right below the first stack page
    let pushed = stack_pointer - PAGE_SIZE - 8;
    parent.write_user(&vm, pushed, &0xdead_beef_u64.to_le_bytes(), pushed)?;

    let mut child = parent.fork(&vm, share_page_table(SoftPageTable::new()))?;
    info!("forked, child has {} pages", child.spt().len());

    let mut mismatches = 0;
    let mut buffer = vec![0u8; PAGE_SIZE];
    for (i, data) in anon_content.iter().enumerate() {
        child.read_user(&vm, HEAP_BASE + i * PAGE_SIZE, &mut buffer, stack_pointer)?;
        if buffer != *data {
            warn!("child page {} differs from its parent", i);
            mismatches += 1;
        }
    }

    // the child scribbles over its copy, the parent must not notice
    child.write_user(&vm, HEAP_BASE, &[0u8; 64], stack_pointer)?;
    parent.read_user(&vm, HEAP_BASE, &mut buffer, stack_pointer)?;
    if buffer != anon_content[0] {
        warn!("parent page changed after the child wrote to its copy");
        mismatches += 1;
    }

    child.exit(&vm)?;
    parent.exit(&vm)?;

    let on_disk = fs::read(MAPPED_FILE)?;
    let expected = b"written through a mapping";
    if &on_disk[PAGE_SIZE..PAGE_SIZE + expected.len()] != expected {
        warn!("mapping was not written back");
        mismatches += 1;
    }

    info!(
        "done: {} evictions, {} of {} frames resident, {} used swap slots, {} mismatches",
        vm.evictions(),
        vm.resident_frames(),
        vm.total_frames(),
        vm.swap().used_slots(),
        mismatches
    );

    drop(file);
    fs::remove_file(MAPPED_FILE)?;
    Ok(())
}
