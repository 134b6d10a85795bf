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

use core::fmt;
use std::sync::Arc;

use super::{anon::AnonPage, file::FilePage, FileSegment, PageKind, PageType};
use crate::{modules::file::FsLock, VmError, PAGE_SIZE};

/// How the content of a page is produced when it is touched the first time
#[derive(Clone)]
pub enum LazyLoad {
    /// The page starts out as all zeros
    Zeroed,

    /// `read_bytes` bytes are read from a file, the rest of the page is zero
    Segment(FileSegment),

    /// Runs a custom loader on the (zeroed) page
    Custom(Arc<dyn Fn(&mut [u8]) -> Result<(), VmError> + Send + Sync>),
}

impl LazyLoad {
    /// Fills `kva` which is zeroed already
    fn load(&self, kva: &mut [u8], fs_lock: &FsLock) -> Result<(), VmError> {
        match self {
            LazyLoad::Zeroed => Ok(()),
            LazyLoad::Segment(segment) => segment.load(kva, fs_lock),
            LazyLoad::Custom(loader) => loader(kva),
        }
    }
}

impl fmt::Debug for LazyLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyLoad::Zeroed => write!(f, "Zeroed"),
            LazyLoad::Segment(segment) => f.debug_tuple("Segment").field(segment).finish(),
            LazyLoad::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A page that was registered but never touched
#[derive(Debug, Clone)]
pub(crate) struct UninitPage {
    pub(crate) target: PageType,
    pub(crate) init: LazyLoad,
}

impl UninitPage {
    pub(crate) fn new(target: PageType, init: LazyLoad) -> Result<Self, VmError> {
        if target == PageType::File && !matches!(init, LazyLoad::Segment(_)) {
            return Err(VmError::InvalidLoader);
        }
        if let LazyLoad::Segment(segment) = &init {
            if segment.read_bytes > PAGE_SIZE {
                return Err(VmError::InvalidArgument("segment is bigger than a page"));
            }
        }

        Ok(Self { target, init })
    }

    /// Runs the loader and returns what this page turns into.
    ///
    /// On error the page has to stay uninitialized, so this does not consume `self`.
    pub(crate) fn initialize(&self, kva: &mut [u8], fs_lock: &FsLock) -> Result<PageKind, VmError> {
        self.init.load(kva, fs_lock)?;

        Ok(match (self.target, &self.init) {
            (PageType::Anon, _) => PageKind::Anon(AnonPage::new()),
            (PageType::File, LazyLoad::Segment(segment)) => {
                PageKind::File(FilePage::new(segment.clone()))
            }
            (PageType::File, _) => unreachable!("checked on construction"),
        })
    }
}
