use crate::Result;

/// A byte-addressable source an ELF image is parsed from.
///
/// An [`ElfImage`](crate::ElfImage) borrows its reader for the whole of its
/// lifetime: the open sequence maps or copies from it, and a later
/// [`load`](crate::ElfImage::load) goes back to it for segment contents.
/// The image never closes the source; ownership stays with the caller.
pub trait ElfReader {
    /// Returns the name of the source, used in error messages and logs.
    fn file_name(&self) -> &str;

    /// Returns the total size of the source in bytes.
    fn len(&self) -> usize;

    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// Fails with [`Error::Io`](crate::Error::Io) when the requested range
    /// is not fully available.
    fn read(&mut self, buf: &mut [u8], offset: usize) -> Result<()>;

    /// Returns a file descriptor suitable for memory mapping, if the source
    /// has one. Sources without a descriptor are copied instead of mapped.
    fn as_fd(&self) -> Option<isize>;
}
