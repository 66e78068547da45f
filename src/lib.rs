//! # elf32-image
//!
//! A parser and lightweight loader for the 32-bit ELF object format. It serves
//! two callers with one type: ahead-of-time tooling that inspects a compiled
//! artifact without executing it, and a runtime that maps a program's `PT_LOAD`
//! segments at their virtual addresses for execution.
//!
//! The crate validates the binary layout before handing out any view: the
//! identification bytes, class, data encoding, and version are checked at open
//! time, and every table access is bounds-checked against the mapped extent.
//! Accessors return references into the mapped memory, never copies.
//!
//! ## Access modes
//!
//! [`ElfImage::open`] takes a `header_only` flag. With it set, only the ELF
//! header and program header table are mapped; section-level accessors report
//! [`Error::Mode`] until [`ElfImage::load`] places the `PT_LOAD` segments and
//! the dynamic-linking tables become reachable through `PT_DYNAMIC`. Without
//! it, the whole file is mapped and the section header table is scanned once
//! for the well-known sections.
//!
//! ## Symbol lookup
//!
//! Two interchangeable strategies resolve names over the same symbol tables:
//! a cached name→symbol map built by one linear pass
//! ([`ElfImage::find_symbol_by_name`]), and a SysV hash-table walk over
//! `.dynsym` ([`ElfImage::find_dynamic_symbol_address`]) that avoids scanning
//! every symbol. Both return the same symbol for the same table and name.
//!
//! ## Quick start
//!
//! ```no_run
//! use elf32_image::{ElfImage, input::ElfFile};
//! use elf32_image::elf::abi::SHT_DYNSYM;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut file = ElfFile::from_path("app.elf")?;
//!     let mut image = ElfImage::open(&mut file, false, false)?;
//!     if let Some(sym) = image.find_symbol_by_name(SHT_DYNSYM, "main", true)? {
//!         println!("main is at {:#x}", sym.st_value);
//!     }
//!     Ok(())
//! }
//! ```
#![no_std]
#![warn(
    clippy::unnecessary_wraps,
    clippy::unnecessary_lazy_evaluations,
    clippy::collapsible_if,
    clippy::cast_lossless,
    clippy::explicit_iter_loop,
    clippy::manual_assert,
    clippy::needless_question_mark,
    clippy::needless_return,
    clippy::redundant_clone,
    clippy::redundant_else,
    clippy::redundant_static_lifetimes
)]
#![allow(clippy::len_without_is_empty)]
extern crate alloc;

pub mod elf;
mod error;
pub mod image;
pub mod input;
mod mapping;
pub mod os;

pub(crate) use error::*;

pub use error::Error;
pub use image::ElfImage;

/// A type alias for `Result`s returned by `elf32_image` functions.
///
/// This is a convenience alias that eliminates the need to repeatedly specify
/// the `Error` type in function signatures.
pub type Result<T> = core::result::Result<T, Error>;
