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
    modules::file::{FileRef, MemoryFile},
    test::{get_test_file, get_test_space, get_test_vm, read_file, USER_BASE},
    LazyLoad, PageType, VmError, PAGE_SIZE,
};

#[test]
fn test_map_ten_bytes() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, data) = get_test_file(10);

    assert_eq!(space.do_map(&vm, USER_BASE, 10, true, &file, 0), Ok(USER_BASE));
    assert_eq!(space.spt().len(), 1);

    {
        let page_ref = space.find_page(USER_BASE).unwrap();
        let page = page_ref.try_lock().unwrap();
        assert_eq!(page.page_type(), PageType::File);
        assert!(page.mapping().is_some());
        assert_eq!(page.file_segment().unwrap().read_bytes, 10);
        assert!(!page.is_resident());
    }

    let mut content = vec![0xFFu8; PAGE_SIZE];
    space.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    assert_eq!(&content[..10], &data[..]);
    assert!(content[10..].iter().all(|x| *x == 0));
}

#[test]
fn test_map_partial_last_page() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let length = 2 * PAGE_SIZE + PAGE_SIZE / 2;
    let (file, data) = get_test_file(length);

    space.do_map(&vm, USER_BASE, length, false, &file, 0).unwrap();
    assert_eq!(space.spt().len(), 3);

    let mut content = vec![0u8; 3 * PAGE_SIZE];
    space.read_user(&vm, USER_BASE, &mut content, 0).unwrap();

    // only the final page is padded
    assert_eq!(&content[..length], &data[..]);
    assert!(content[length..].iter().all(|x| *x == 0));

    let read_bytes: Vec<usize> = space
        .spt()
        .pages()
        .map(|page_ref| page_ref.try_lock().unwrap().file_segment().unwrap().read_bytes)
        .collect();
    assert_eq!(read_bytes, vec![PAGE_SIZE, PAGE_SIZE, PAGE_SIZE / 2]);
}

#[test]
fn test_map_beyond_end_of_file() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, data) = get_test_file(3 * PAGE_SIZE + 100);

    // starts at the second page of the file and is longer than what is left
    space
        .do_map(&vm, USER_BASE, 4 * PAGE_SIZE, true, &file, PAGE_SIZE)
        .unwrap();

    let read_bytes: Vec<usize> = space
        .spt()
        .pages()
        .map(|page_ref| page_ref.try_lock().unwrap().file_segment().unwrap().read_bytes)
        .collect();
    assert_eq!(read_bytes, vec![PAGE_SIZE, PAGE_SIZE, 100, 0]);

    let mut content = vec![0xFFu8; 4 * PAGE_SIZE];
    space.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    assert_eq!(&content[..2 * PAGE_SIZE + 100], &data[PAGE_SIZE..]);
    assert!(content[2 * PAGE_SIZE + 100..].iter().all(|x| *x == 0));

    // writing to the padding never reaches the file
    space
        .write_user(&vm, USER_BASE + 3 * PAGE_SIZE, &[1u8; 64], 0)
        .unwrap();
    space.do_unmap(&vm, USER_BASE).unwrap();
    assert_eq!(read_file(&vm, &file), data);
}

#[test]
fn test_map_validation() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, _) = get_test_file(PAGE_SIZE);
    let empty = FileRef::new(MemoryFile::new(Vec::new()));
    let kernel = vm.config().kernel_base;

    let invalid = [
        space.do_map(&vm, 0, PAGE_SIZE, true, &file, 0),
        space.do_map(&vm, USER_BASE + 1, PAGE_SIZE, true, &file, 0),
        space.do_map(&vm, USER_BASE, 0, true, &file, 0),
        space.do_map(&vm, USER_BASE, PAGE_SIZE, true, &file, 100),
        space.do_map(&vm, USER_BASE, PAGE_SIZE, true, &empty, 0),
        space.do_map(&vm, USER_BASE, 2 * PAGE_SIZE, true, &file, usize::MAX & !(PAGE_SIZE - 1)),
    ];
    for res in invalid {
        assert!(matches!(res, Err(VmError::InvalidArgument(_))), "{:?}", res);
    }

    assert_eq!(
        space.do_map(&vm, kernel, PAGE_SIZE, true, &file, 0),
        Err(VmError::KernelAddress(kernel))
    );
    assert_eq!(
        space.do_map(&vm, kernel - PAGE_SIZE, 2 * PAGE_SIZE, true, &file, 0),
        Err(VmError::KernelAddress(kernel - PAGE_SIZE))
    );

    assert!(space.spt().is_empty());
}

#[test]
fn test_overlapping_map_leaves_nothing_behind() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, _) = get_test_file(4 * PAGE_SIZE);

    space
        .allocate_lazy_page(&vm, PageType::Anon, USER_BASE + 2 * PAGE_SIZE, true, LazyLoad::Zeroed)
        .unwrap();

    assert_eq!(
        space.do_map(&vm, USER_BASE, 4 * PAGE_SIZE, true, &file, 0),
        Err(VmError::AlreadyMapped(USER_BASE + 2 * PAGE_SIZE))
    );
    assert_eq!(space.spt().len(), 1);
    assert_eq!(space.page_type(USER_BASE + 2 * PAGE_SIZE), Ok(PageType::Anon));
}

#[test]
fn test_unmap_writes_back_dirty_pages() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, mut expected) = get_test_file(2 * PAGE_SIZE);

    space
        .do_map(&vm, USER_BASE, 2 * PAGE_SIZE, true, &file, 0)
        .unwrap();

    let mut content = vec![0u8; 2 * PAGE_SIZE];
    space.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    space
        .write_user(&vm, USER_BASE + PAGE_SIZE + 7, b"hello", 0)
        .unwrap();
    expected[PAGE_SIZE + 7..PAGE_SIZE + 12].copy_from_slice(b"hello");

    assert_eq!(vm.resident_frames(), 2);
    assert_eq!(space.do_unmap(&vm, USER_BASE), Ok(2));

    assert_eq!(read_file(&vm, &file), expected);
    assert!(space.spt().is_empty());
    assert_eq!(vm.resident_frames(), 0);
    assert_eq!(vm.free_frames(), 4);
    assert_eq!(space.page_table().lock().translate(USER_BASE), None);
}

#[test]
fn test_unmap_not_mapped() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();

    space
        .allocate_lazy_page(&vm, PageType::Anon, USER_BASE, true, LazyLoad::Zeroed)
        .unwrap();
    space.write_user(&vm, USER_BASE, &[5u8; 8], 0).unwrap();

    assert_eq!(
        space.do_unmap(&vm, USER_BASE + 0x1234),
        Err(VmError::NotMapped(USER_BASE + 0x1234))
    );
    // anonymous pages are not part of a mapping
    assert_eq!(space.do_unmap(&vm, USER_BASE), Err(VmError::NotMapped(USER_BASE)));

    let mut content = [0u8; 8];
    space.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    assert_eq!(content, [5u8; 8]);
    assert_eq!(space.spt().len(), 1);
}

#[test]
fn test_unmap_stops_at_next_mapping() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, _) = get_test_file(2 * PAGE_SIZE);

    space
        .do_map(&vm, USER_BASE, 2 * PAGE_SIZE, true, &file, 0)
        .unwrap();
    space
        .do_map(&vm, USER_BASE + 2 * PAGE_SIZE, PAGE_SIZE, true, &file, 0)
        .unwrap();

    let first = space.find_page(USER_BASE).unwrap();
    let second = space.find_page(USER_BASE + 2 * PAGE_SIZE).unwrap();
    assert_ne!(
        first.try_lock().unwrap().mapping(),
        second.try_lock().unwrap().mapping()
    );

    assert_eq!(space.do_unmap(&vm, USER_BASE + 10), Ok(2));
    assert_eq!(space.spt().len(), 1);
    assert!(space.find_page(USER_BASE + 2 * PAGE_SIZE).is_some());
}

#[test]
fn test_mapping_keeps_file_alive() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, data) = get_test_file(100);

    space.do_map(&vm, USER_BASE, 100, true, &file, 0).unwrap();
    // the process closes its handle
    drop(file);

    let mut content = vec![0u8; 100];
    space.read_user(&vm, USER_BASE, &mut content, 0).unwrap();
    assert_eq!(content, data);
}

#[test]
fn test_unmap_all() {
    let vm = get_test_vm(4, 4);
    let mut space = get_test_space();
    let (file, mut expected) = get_test_file(PAGE_SIZE);

    space.do_map(&vm, USER_BASE, PAGE_SIZE, true, &file, 0).unwrap();
    space
        .do_map(&vm, USER_BASE + 4 * PAGE_SIZE, 2 * PAGE_SIZE, false, &file, 0)
        .unwrap();
    space
        .allocate_lazy_page(&vm, PageType::Anon, USER_BASE + 8 * PAGE_SIZE, true, LazyLoad::Zeroed)
        .unwrap();

    space.write_user(&vm, USER_BASE, &[3u8; 3], 0).unwrap();
    expected[..3].fill(3);

    space.unmap_all(&vm).unwrap();

    assert_eq!(space.spt().len(), 1);
    assert_eq!(read_file(&vm, &file), expected);
}
