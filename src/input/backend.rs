use super::ElfReader;
use crate::{Result, io_error};
use alloc::string::{String, ToString};

#[cfg(unix)]
use crate::os::RawFile;

/// An ELF source backed by an in-memory byte slice.
///
/// This is useful for inspecting ELF images that are already in memory,
/// such as those embedded in the binary or received over a network. The
/// bytes cannot be memory-mapped, so opening one copies them into an
/// anonymous mapping instead.
#[derive(Debug)]
pub struct ElfBinary<'bytes> {
    /// The name assigned to this ELF source.
    name: String,
    /// The raw ELF data.
    bytes: &'bytes [u8],
}

impl<'bytes> ElfBinary<'bytes> {
    /// Creates a new memory-based ELF source from a byte slice.
    ///
    /// # Examples
    /// ```rust
    /// use elf32_image::input::ElfBinary;
    ///
    /// let data = &[]; // In practice, the bytes of an ELF file
    /// let binary = ElfBinary::new("app.elf", data);
    /// ```
    pub fn new(name: &str, bytes: &'bytes [u8]) -> Self {
        Self {
            name: name.to_string(),
            bytes,
        }
    }
}

impl ElfReader for ElfBinary<'_> {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, buf: &mut [u8], offset: usize) -> Result<()> {
        let end = offset
            .checked_add(buf.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| io_error("read offset out of bounds"))?;
        buf.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }

    /// Returns `None` since memory-based sources have no file descriptor.
    fn as_fd(&self) -> Option<isize> {
        None
    }
}

/// An ELF source backed by a file on the filesystem.
///
/// The file's descriptor is handed to the mapping primitive, so the open
/// sequence and segment loading map pages directly instead of copying.
#[cfg(unix)]
pub struct ElfFile {
    inner: RawFile,
    len: usize,
}

#[cfg(unix)]
impl ElfFile {
    /// Creates a new file-based ELF source by opening the file at `path`.
    pub fn from_path(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref();
        #[cfg(feature = "log")]
        log::debug!("Opening ELF file: {}", path);

        let inner = RawFile::from_path(path).map_err(|e| {
            #[cfg(feature = "log")]
            log::error!("Failed to open ELF file {}: {:?}", path, e);
            e
        })?;
        let len = inner.len()?;
        Ok(ElfFile { inner, len })
    }

    /// Creates a new file-based ELF source from an owned file descriptor.
    ///
    /// # Safety
    /// The caller must ensure that `raw_fd` is valid and owned by this
    /// source from now on.
    pub unsafe fn from_owned_fd(path: &str, raw_fd: i32) -> Result<Self> {
        let inner = RawFile::from_owned_fd(path, raw_fd);
        let len = inner.len()?;
        Ok(ElfFile { inner, len })
    }
}

#[cfg(unix)]
impl ElfReader for ElfFile {
    fn file_name(&self) -> &str {
        self.inner.file_name()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn read(&mut self, buf: &mut [u8], offset: usize) -> Result<()> {
        self.inner.read(buf, offset)
    }

    fn as_fd(&self) -> Option<isize> {
        Some(self.inner.fd())
    }
}

// Byte slices are accepted directly for in-memory ELF data.
impl ElfReader for &[u8] {
    fn file_name(&self) -> &str {
        "<memory>"
    }

    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read(&mut self, buf: &mut [u8], offset: usize) -> Result<()> {
        let end = offset
            .checked_add(buf.len())
            .filter(|end| *end <= <[u8]>::len(self))
            .ok_or_else(|| io_error("read offset out of bounds"))?;
        buf.copy_from_slice(&self[offset..end]);
        Ok(())
    }

    fn as_fd(&self) -> Option<isize> {
        None
    }
}
