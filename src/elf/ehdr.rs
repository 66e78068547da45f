//! ELF header parsing and validation.
//!
//! The header is read once at open time and is immutable afterwards. Every
//! later table access derives its location from the offsets and counts
//! recorded here, so validation happens before any other view is produced.

use crate::{
    Result,
    elf::{
        EHDR_SIZE,
        abi::{EI_CLASS, EI_DATA, EI_VERSION, ELFCLASS32, ELFMAGIC, EV_CURRENT},
        defs::ElfEhdr,
    },
    format_error,
};
use alloc::format;
use core::ops::Deref;

/// The data encoding this host parses natively.
#[cfg(target_endian = "little")]
const E_DATA: u8 = crate::elf::abi::ELFDATA2LSB;
#[cfg(target_endian = "big")]
const E_DATA: u8 = crate::elf::abi::ELFDATA2MSB;

/// A validated view of the ELF32 file header.
///
/// Construction checks the identification bytes, class, data encoding, and
/// version; a reference to `ElfHeader` therefore always describes an image
/// this crate can parse. Field access goes through `Deref` to [`ElfEhdr`];
/// the `usize`-returning helpers below exist for offset arithmetic.
#[repr(transparent)]
pub struct ElfHeader {
    ehdr: ElfEhdr,
}

impl Deref for ElfHeader {
    type Target = ElfEhdr;

    fn deref(&self) -> &Self::Target {
        &self.ehdr
    }
}

impl ElfHeader {
    /// Reinterprets `data` as an ELF header and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`](crate::Error::Format) if the bytes do not
    /// describe a 32-bit ELF image in the host's data encoding.
    ///
    /// The caller must ensure that `data` contains at least `EHDR_SIZE`
    /// bytes of suitably aligned memory.
    pub(crate) fn new(data: &[u8]) -> Result<&Self> {
        debug_assert!(data.len() >= EHDR_SIZE);
        debug_assert!(data.as_ptr().addr() % align_of::<ElfEhdr>() == 0);
        let ehdr: &ElfHeader = unsafe { &*(data.as_ptr().cast()) };
        ehdr.validate()?;
        Ok(ehdr)
    }

    /// Validates the ELF magic, class, data encoding, and version.
    pub fn validate(&self) -> Result<()> {
        if self.e_ident[0..4] != ELFMAGIC {
            return Err(format_error("invalid ELF magic"));
        }

        if self.e_ident[EI_CLASS] != ELFCLASS32 {
            return Err(format_error(format!(
                "file class mismatch: expected {}, found {}",
                ELFCLASS32, self.e_ident[EI_CLASS]
            )));
        }

        if self.e_ident[EI_DATA] != E_DATA {
            return Err(format_error(format!(
                "data encoding mismatch: expected {}, found {}",
                E_DATA, self.e_ident[EI_DATA]
            )));
        }

        if self.e_ident[EI_VERSION] != EV_CURRENT {
            return Err(format_error("invalid ELF version"));
        }

        Ok(())
    }

    /// Returns the program's entry point address.
    #[inline]
    pub fn entry_point(&self) -> usize {
        self.ehdr.e_entry as usize
    }

    /// Returns the number of program headers.
    #[inline]
    pub fn e_phnum(&self) -> usize {
        self.ehdr.e_phnum as usize
    }

    /// Returns the size of each program header entry.
    #[inline]
    pub fn e_phentsize(&self) -> usize {
        self.ehdr.e_phentsize as usize
    }

    /// Returns the file offset of the program header table.
    #[inline]
    pub fn e_phoff(&self) -> usize {
        self.ehdr.e_phoff as usize
    }

    /// Returns the file offset of the section header table.
    #[inline]
    pub fn e_shoff(&self) -> usize {
        self.ehdr.e_shoff as usize
    }

    /// Returns the size of each section header entry.
    #[inline]
    pub fn e_shentsize(&self) -> usize {
        self.ehdr.e_shentsize as usize
    }

    /// Returns the number of section headers.
    #[inline]
    pub fn e_shnum(&self) -> usize {
        self.ehdr.e_shnum as usize
    }

    /// Returns the index of the section-name string table.
    #[inline]
    pub fn e_shstrndx(&self) -> usize {
        self.ehdr.e_shstrndx as usize
    }

    /// Returns the `(start, end)` file offsets of the program header table.
    #[inline]
    pub fn phdr_range(&self) -> (usize, usize) {
        let phdrs_size = self.e_phentsize() * self.e_phnum();
        let phdr_start = self.e_phoff();
        (phdr_start, phdr_start + phdrs_size)
    }

    /// Returns the `(start, end)` file offsets of the section header table.
    #[inline]
    pub fn shdr_range(&self) -> (usize, usize) {
        let shdrs_size = self.e_shentsize() * self.e_shnum();
        let shdr_start = self.e_shoff();
        (shdr_start, shdr_start + shdrs_size)
    }
}
