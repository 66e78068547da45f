//! ELF input abstraction and data sources.
//!
//! This module provides the trait and implementations for accessing ELF data
//! from diverse sources, such as files in a filesystem or byte buffers in
//! memory. It abstracts the reading mechanism so the accessor operates
//! uniformly regardless of how the ELF data is stored.

#[cfg(unix)]
pub use backend::ElfFile;
pub use backend::ElfBinary;
pub use traits::ElfReader;

mod backend;
mod traits;
