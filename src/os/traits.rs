use crate::{
    Result,
    os::{MapFlags, ProtFlags},
};
use core::ffi::c_void;

/// The memory-mapping primitive an [`ElfImage`](crate::ElfImage) maps
/// through.
///
/// Hosted targets use [`DefaultMmap`](super::DefaultMmap); kernels and
/// bare-metal environments implement this trait over whatever their memory
/// manager provides. Every method is unsafe because the implementations
/// manipulate the address space directly.
pub trait Mmap {
    /// Maps `len` bytes of the file `fd` starting at `offset`, optionally at
    /// the fixed address `addr`.
    ///
    /// When `fd` is `None` the source bytes cannot be mapped directly; the
    /// implementation sets `need_copy` and returns an address (inside an
    /// existing reservation) for the caller to copy into. `offset` must be
    /// page-aligned.
    unsafe fn mmap(
        addr: Option<usize>,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
        offset: usize,
        fd: Option<isize>,
        need_copy: &mut bool,
    ) -> Result<*mut c_void>;

    /// Maps `len` bytes of zero-initialized memory at the fixed address
    /// `addr`.
    unsafe fn mmap_anonymous(
        addr: usize,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
    ) -> Result<*mut c_void>;

    /// Releases a mapping created by any method of this trait.
    unsafe fn munmap(addr: *mut c_void, len: usize) -> Result<()>;

    /// Changes the protection of an existing mapping.
    unsafe fn mprotect(addr: *mut c_void, len: usize, prot: ProtFlags) -> Result<()>;

    /// Reserves `len` bytes of contiguous address space, optionally at
    /// `addr`.
    ///
    /// With `use_file` set the reservation is inaccessible until file pages
    /// are fixed over it; otherwise it is zeroed read-write memory ready to
    /// be copied into.
    unsafe fn mmap_reserve(addr: Option<usize>, len: usize, use_file: bool)
    -> Result<*mut c_void>;
}
