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

use crate::{
    modules::{block_device::BlockDeviceModule, physical_memory::PhysicalMemoryModule},
    pg_offset, pg_round_down, AddressSpace, PageFault, Vm, VmError, PAGE_SIZE,
};

impl AddressSpace {
    /// Reads user memory at `addr` the way the CPU would, faulting pages in as needed
    pub fn read_user<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
        dest: &mut [u8],
        stack_pointer: usize,
    ) -> Result<(), VmError> {
        self.access(vm, addr, dest.len(), false, stack_pointer, |kva, done| {
            let len = kva.len();
            dest[done..done + len].copy_from_slice(kva);
        })
    }

    /// Writes user memory at `addr` the way the CPU would, faulting pages in as needed
    pub fn write_user<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
        src: &[u8],
        stack_pointer: usize,
    ) -> Result<(), VmError> {
        self.access(vm, addr, src.len(), true, stack_pointer, |kva, done| {
            let len = kva.len();
            kva.copy_from_slice(&src[done..done + len]);
        })
    }

    /// Walks `[addr, addr + len)` page by page and hands the kernel view of every chunk to `copy`
    /// together with the number of bytes handled before it.
    fn access<P: PhysicalMemoryModule, D: BlockDeviceModule>(
        &mut self,
        vm: &Vm<P, D>,
        addr: usize,
        len: usize,
        write: bool,
        stack_pointer: usize,
        mut copy: impl FnMut(&mut [u8], usize),
    ) -> Result<(), VmError> {
        if addr.checked_add(len).is_none() {
            return Err(VmError::InvalidArgument("access wraps around the address space"));
        }

        let mut done = 0;
        while done < len {
            let current = addr + done;
            let va = pg_round_down(current);
            let offset = pg_offset(current);
            let chunk = (PAGE_SIZE - offset).min(len - done);

            let fault = PageFault {
                addr: current,
                user: true,
                write,
                not_present: true,
                stack_pointer,
            };

            loop {
                let mut frames = vm.frames.lock();
                let mut pt = self.page_table.lock();
                let translation = pt.translate(va);

                match translation {
                    Some(entry) if write && !entry.writable => {
                        drop(pt);
                        drop(frames);
                        return self.handle_fault(
                            vm,
                            PageFault {
                                not_present: false,
                                ..fault
                            },
                        );
                    }
                    Some(entry) => {
                        pt.set_accessed(va, true);
                        if write {
                            pt.set_dirty(va, true);
                        }
                        drop(pt);

                        copy(&mut frames.frame_mut(entry.frame)[offset..offset + chunk], done);
                        break;
                    }
                    None => {
                        drop(pt);
                        drop(frames);
                        self.handle_fault(vm, fault)?;
                    }
                }
            }

            done += chunk;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{
        page::{LazyLoad, PageType},
        test::{get_test_space, get_test_vm},
        VmError, PAGE_SIZE,
    };

    #[test]
    fn test_access_across_pages() {
        let vm = get_test_vm(4, 4);
        let mut space = get_test_space();
        for va in [0x10000, 0x11000] {
            space
                .allocate_lazy_page(&vm, PageType::Anon, va, true, LazyLoad::Zeroed)
                .unwrap();
        }

        let data: Vec<u8> = (0..200u8).collect();
        let addr = 0x11000 - 100;
        space.write_user(&vm, addr, &data, 0).unwrap();

        let mut buffer = vec![0u8; 200];
        space.read_user(&vm, addr, &mut buffer, 0).unwrap();
        assert_eq!(buffer, data);
        assert_eq!(space.resident_pages(), 2);

        let pt = space.page_table().lock();
        assert!(pt.is_dirty(0x10000));
        assert!(pt.is_accessed(0x11000));
    }

    #[test]
    fn test_write_to_read_only_page() {
        let vm = get_test_vm(4, 4);
        let mut space = get_test_space();
        space
            .allocate_lazy_page(&vm, PageType::Anon, 0x10000, false, LazyLoad::Zeroed)
            .unwrap();

        // reading faults the page in
        let mut buffer = [1u8; 16];
        space.read_user(&vm, 0x10000, &mut buffer, 0).unwrap();
        assert_eq!(buffer, [0u8; 16]);

        assert_eq!(
            space.write_user(&vm, 0x10008, &[1, 2, 3], 0),
            Err(VmError::ProtectionViolation(0x10008))
        );

        // not resident yet: the fault itself is rejected
        space
            .allocate_lazy_page(&vm, PageType::Anon, 0x20000, false, LazyLoad::Zeroed)
            .unwrap();
        assert_eq!(
            space.write_user(&vm, 0x20000 + PAGE_SIZE - 1, &[1], 0),
            Err(VmError::ProtectionViolation(0x20000 + PAGE_SIZE - 1))
        );
    }

    #[test]
    fn test_access_unmapped() {
        let vm = get_test_vm(4, 4);
        let mut space = get_test_space();

        let mut buffer = [0u8; 4];
        assert_eq!(
            space.read_user(&vm, 0x1234, &mut buffer, 0),
            Err(VmError::InvalidAddress(0x1234))
        );

        let kernel = vm.config().kernel_base;
        assert_eq!(
            space.read_user(&vm, kernel + 4, &mut buffer, 0),
            Err(VmError::KernelAddress(kernel + 4))
        );
    }
}
