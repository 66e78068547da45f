//! ELF ABI constants.
//!
//! Re-exports the System V ABI constant vocabulary (`ELFMAGIC`, `EI_*`,
//! `PT_*`, `SHT_*`, `DT_*`, `STT_*`, `PF_*`, ...) for use by this crate and
//! its callers when selecting table kinds and entry types.

pub use ::elf::abi::*;

/// The four identification bytes every ELF image starts with.
pub const ELFMAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
