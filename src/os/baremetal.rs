use crate::{
    Result, map_error,
    os::{MapFlags, Mmap, ProtFlags},
};
use core::ffi::c_void;

/// Placeholder mapping primitive for targets without an OS.
///
/// Every operation fails; bare-metal consumers supply their own [`Mmap`]
/// implementation backed by their memory manager.
pub struct DefaultMmap;

impl Mmap for DefaultMmap {
    unsafe fn mmap(
        _addr: Option<usize>,
        _len: usize,
        _prot: ProtFlags,
        _flags: MapFlags,
        _offset: usize,
        _fd: Option<isize>,
        _need_copy: &mut bool,
    ) -> Result<*mut c_void> {
        Err(map_error("no mapping primitive on this target"))
    }

    unsafe fn mmap_anonymous(
        _addr: usize,
        _len: usize,
        _prot: ProtFlags,
        _flags: MapFlags,
    ) -> Result<*mut c_void> {
        Err(map_error("no mapping primitive on this target"))
    }

    unsafe fn munmap(_addr: *mut c_void, _len: usize) -> Result<()> {
        Err(map_error("no mapping primitive on this target"))
    }

    unsafe fn mprotect(_addr: *mut c_void, _len: usize, _prot: ProtFlags) -> Result<()> {
        Err(map_error("no mapping primitive on this target"))
    }

    unsafe fn mmap_reserve(
        _addr: Option<usize>,
        _len: usize,
        _use_file: bool,
    ) -> Result<*mut c_void> {
        Err(map_error("no mapping primitive on this target"))
    }
}
