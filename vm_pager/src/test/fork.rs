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

use rand::{rngs::SmallRng, SeedableRng};

use crate::{
    modules::page_table::{share_page_table, SoftPageTable},
    test::{get_test_file, get_test_space, get_test_vm, rand_data, read_file, SEED, USER_BASE},
    LazyLoad, PageType, VmError, PAGE_SIZE,
};

#[test]
fn test_fork_copies_resident_page() {
    let vm = get_test_vm(4, 4);
    let mut parent = get_test_space();
    let mut rand = SmallRng::seed_from_u64(SEED);
    let data = rand_data(&mut rand, PAGE_SIZE);

    parent
        .allocate_lazy_page(&vm, PageType::Anon, USER_BASE, true, LazyLoad::Zeroed)
        .unwrap();
    parent.write_user(&vm, USER_BASE, &data, 0).unwrap();

    let mut child = parent
        .fork(&vm, share_page_table(SoftPageTable::new()))
        .unwrap();
    assert_eq!(child.resident_pages(), 1);
    assert_eq!(vm.resident_frames(), 2);

    let parent_frame = parent.find_page(USER_BASE).unwrap().try_lock().unwrap().frame();
    let child_frame = child.find_page(USER_BASE).unwrap().try_lock().unwrap().frame();
    assert_ne!(parent_frame, child_frame);

    let mut content = vec![0u8; PAGE_SIZE];
    child.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    assert_eq!(content, data);

    // both copies are independent
    child.write_user(&vm, USER_BASE, &[0u8; 32], 0).unwrap();
    parent.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    assert_eq!(content, data);
}

#[test]
fn test_fork_keeps_lazy_pages_lazy() {
    let vm = get_test_vm(4, 4);
    let mut parent = get_test_space();
    let (file, data) = get_test_file(PAGE_SIZE);

    parent
        .allocate_lazy_page(&vm, PageType::Anon, USER_BASE, true, LazyLoad::Zeroed)
        .unwrap();
    parent
        .do_map(&vm, USER_BASE + PAGE_SIZE, PAGE_SIZE, false, &file, 0)
        .unwrap();

    let mut child = parent
        .fork(&vm, share_page_table(SoftPageTable::new()))
        .unwrap();
    assert_eq!(child.spt().len(), 2);
    assert_eq!(child.resident_pages(), 0);
    assert_eq!(vm.resident_frames(), 0);
    assert_eq!(child.page_type(USER_BASE + PAGE_SIZE), Ok(PageType::File));

    // the child's mapping is a mapping as well
    let mut content = vec![0u8; PAGE_SIZE];
    child
        .read_user(&vm, USER_BASE + PAGE_SIZE, &mut content, 0)
        .unwrap();
    assert_eq!(content, data);
    assert_eq!(child.do_unmap(&vm, USER_BASE + PAGE_SIZE), Ok(1));
    assert!(parent.find_page(USER_BASE + PAGE_SIZE).is_some());
}

#[test]
fn test_fork_copies_swapped_out_page() {
    let vm = get_test_vm(1, 8);
    let mut parent = get_test_space();
    let mut rand = SmallRng::seed_from_u64(SEED);
    let first = rand_data(&mut rand, PAGE_SIZE);
    let second = rand_data(&mut rand, PAGE_SIZE);

    for (i, data) in [&first, &second].into_iter().enumerate() {
        let va = USER_BASE + i * PAGE_SIZE;
        parent
            .allocate_lazy_page(&vm, PageType::Anon, va, true, LazyLoad::Zeroed)
            .unwrap();
        parent.write_user(&vm, va, data, 0).unwrap();
    }
    assert!(parent
        .find_page(USER_BASE)
        .unwrap()
        .try_lock()
        .unwrap()
        .swap_slot()
        .is_some());

    let mut child = parent
        .fork(&vm, share_page_table(SoftPageTable::new()))
        .unwrap();

    for (i, data) in [&first, &second].into_iter().enumerate() {
        let mut content = vec![0u8; PAGE_SIZE];
        child
            .read_user(&vm, USER_BASE + i * PAGE_SIZE, &mut content, 0)
            .unwrap();
        assert_eq!(&content, data);

        parent
            .read_user(&vm, USER_BASE + i * PAGE_SIZE, &mut content, 0)
            .unwrap();
        assert_eq!(&content, data);
    }
}

#[test]
fn test_fork_carries_dirty_file_pages() {
    let vm = get_test_vm(4, 4);
    let mut parent = get_test_space();
    let (file, mut expected) = get_test_file(PAGE_SIZE);

    parent.do_map(&vm, USER_BASE, PAGE_SIZE, true, &file, 0).unwrap();
    parent.write_user(&vm, USER_BASE, b"parent", 0).unwrap();
    expected[..6].copy_from_slice(b"parent");

    let mut child = parent
        .fork(&vm, share_page_table(SoftPageTable::new()))
        .unwrap();
    assert!(child.page_table().lock().is_dirty(USER_BASE));

    // the parent's write is not lost if only the child unmaps
    child.do_unmap(&vm, USER_BASE).unwrap();
    assert_eq!(read_file(&vm, &file), expected);
}

#[test]
fn test_failed_fork_is_torn_down() {
    let vm = get_test_vm(1, 4);
    let mut parent = get_test_space();

    parent
        .allocate_lazy_page(&vm, PageType::Anon, USER_BASE, true, LazyLoad::Zeroed)
        .unwrap();
    parent.write_user(&vm, USER_BASE, &[1u8; 4], 0).unwrap();

    // the only frame belongs to the page that is being copied
    let res = parent.fork(&vm, share_page_table(SoftPageTable::new()));
    assert_eq!(res.err(), Some(VmError::OutOfMemory));

    assert_eq!(vm.resident_frames(), 1);
    assert_eq!(vm.swap().used_slots(), 0);

    let mut content = [0u8; 4];
    parent.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    assert_eq!(content, [1u8; 4]);
}
