use crate::{
    Result, io_error, map_error,
    os::{MapFlags, Mmap, ProtFlags},
};
use alloc::{
    ffi::CString,
    format,
    string::{String, ToString},
};
use core::{ffi::c_void, str::FromStr};
use libc::{O_RDONLY, SEEK_SET, mmap, mprotect, munmap};

/// An implementation of the [`Mmap`] trait over the unix `mmap` family.
pub struct DefaultMmap;

impl Mmap for DefaultMmap {
    unsafe fn mmap(
        addr: Option<usize>,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
        offset: usize,
        fd: Option<isize>,
        need_copy: &mut bool,
    ) -> Result<*mut c_void> {
        let ptr = if let Some(fd) = fd {
            unsafe {
                mmap(
                    addr.unwrap_or(0) as _,
                    len,
                    prot.bits(),
                    flags.bits(),
                    fd as i32,
                    offset as _,
                )
            }
        } else {
            // No file descriptor to map; the caller copies the bytes into
            // the reservation at `addr` instead.
            *need_copy = true;
            addr.unwrap() as _
        };
        if core::ptr::eq(ptr, libc::MAP_FAILED) {
            return Err(map_error("mmap failed"));
        }
        Ok(ptr)
    }

    unsafe fn mmap_anonymous(
        addr: usize,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
    ) -> Result<*mut c_void> {
        let ptr = unsafe {
            mmap(
                addr as _,
                len,
                prot.bits(),
                flags.union(MapFlags::MAP_ANONYMOUS).bits(),
                -1,
                0,
            )
        };
        if core::ptr::eq(ptr, libc::MAP_FAILED) {
            return Err(map_error("mmap anonymous failed"));
        }
        Ok(ptr)
    }

    unsafe fn munmap(addr: *mut c_void, len: usize) -> Result<()> {
        let res = unsafe { munmap(addr, len) };
        if res != 0 {
            return Err(map_error("munmap failed"));
        }
        Ok(())
    }

    unsafe fn mprotect(addr: *mut c_void, len: usize, prot: ProtFlags) -> Result<()> {
        let res = unsafe { mprotect(addr, len, prot.bits()) };
        if res != 0 {
            return Err(map_error("mprotect failed"));
        }
        Ok(())
    }

    unsafe fn mmap_reserve(
        addr: Option<usize>,
        len: usize,
        use_file: bool,
    ) -> Result<*mut c_void> {
        let flags = MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS;
        let prot = if use_file {
            ProtFlags::PROT_NONE
        } else {
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE
        };
        let ptr = unsafe {
            mmap(
                addr.unwrap_or(0) as _,
                len,
                prot.bits(),
                flags.bits(),
                -1,
                0,
            )
        };
        if core::ptr::eq(ptr, libc::MAP_FAILED) {
            return Err(map_error("mmap reserve failed"));
        }
        Ok(ptr)
    }
}

/// An open file descriptor with its path, closed on drop.
pub(crate) struct RawFile {
    name: String,
    fd: isize,
}

impl Drop for RawFile {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd as i32) };
    }
}

impl RawFile {
    pub(crate) fn from_path(path: &str) -> Result<Self> {
        let name = CString::from_str(path).map_err(|_| io_error("path contains a NUL byte"))?;
        let fd = unsafe { libc::open(name.as_ptr(), O_RDONLY) };
        if fd == -1 {
            return Err(io_error(format!("open failed: {}", path)));
        }
        Ok(Self {
            name: path.to_string(),
            fd: fd as isize,
        })
    }

    pub(crate) fn from_owned_fd(path: &str, raw_fd: i32) -> Self {
        Self {
            name: path.to_string(),
            fd: raw_fd as isize,
        }
    }

    pub(crate) fn file_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn fd(&self) -> isize {
        self.fd
    }

    pub(crate) fn len(&self) -> Result<usize> {
        let mut stat = unsafe { core::mem::zeroed::<libc::stat>() };
        if unsafe { libc::fstat(self.fd as i32, &mut stat) } != 0 {
            return Err(io_error(format!("fstat failed: {}", self.name)));
        }
        Ok(stat.st_size as usize)
    }

    pub(crate) fn read(&mut self, mut bytes: &mut [u8], offset: usize) -> Result<()> {
        lseek(self.fd as i32, offset)?;
        loop {
            if bytes.is_empty() {
                return Ok(());
            }
            let ptr = bytes.as_mut_ptr() as *mut libc::c_void;
            let result = unsafe { libc::read(self.fd as i32, ptr, bytes.len()) };
            if result < 0 {
                return Err(io_error("read error"));
            } else if result == 0 {
                return Err(io_error("failed to fill buffer"));
            }
            bytes = &mut bytes[result as usize..];
        }
    }
}

fn lseek(fd: i32, offset: usize) -> Result<()> {
    let off = unsafe { libc::lseek(fd, offset as _, SEEK_SET) };
    if off == -1 || off as usize != offset {
        return Err(io_error("lseek failed"));
    }
    Ok(())
}
