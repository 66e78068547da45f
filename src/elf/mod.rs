//! ELF (Executable and Linkable Format) definitions for the 32-bit class.
//!
//! This module provides the record layouts and utilities for working with
//! the ELF32 format as defined in the System V ABI: the file header, program
//! and section headers, symbol and dynamic entries, relocation entries, and
//! the SysV hash table.

pub mod abi;
mod defs;
mod ehdr;
mod hash;

pub(crate) use hash::{HashTable, elf_hash};

pub use defs::{ElfDyn, ElfEhdr, ElfPhdr, ElfRel, ElfRela, ElfShdr, ElfSym};
pub use ehdr::ElfHeader;

pub(crate) use defs::{
    DYN_SIZE, EHDR_SIZE, PHDR_SIZE, SHDR_SIZE, STN_UNDEF, SYM_SIZE, is_symbol_section_type,
};
