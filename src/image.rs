//! The ELF image aggregate.
//!
//! [`ElfImage`] owns the mappings an ELF file is viewed through and exposes
//! validated, bounds-checked accessors over the tables inside them: program
//! and section headers, symbol and string tables, the dynamic section,
//! relocation entries, and the SysV hash table. It also carries the segment
//! loader that places `PT_LOAD` segments for execution.
//!
//! Accessors return references into mapped memory; nothing is copied out.
//! All such references are tied to the borrow of the image, so they cannot
//! outlive the mappings that back them.

use crate::{
    Result,
    elf::{
        DYN_SIZE, EHDR_SIZE, ElfDyn, ElfHeader, ElfPhdr, ElfRel, ElfRela, ElfShdr, ElfSym,
        HashTable, PHDR_SIZE, SHDR_SIZE, STN_UNDEF, SYM_SIZE,
        abi::{
            DT_HASH, DT_NULL, DT_STRSZ, DT_STRTAB, DT_SYMTAB, PT_DYNAMIC, PT_LOAD, PF_R, PF_W,
            PF_X, SHT_DYNAMIC, SHT_DYNSYM, SHT_HASH, SHT_REL, SHT_RELA, SHT_STRTAB, SHT_SYMTAB,
            STT_NOTYPE,
        },
        elf_hash, is_symbol_section_type,
    },
    format_error, index_error,
    input::ElfReader,
    load_error,
    mapping::{Mapping, PAGE_SIZE, rounddown, roundup},
    mode_error,
    os::{DefaultMmap, MapFlags, Mmap, ProtFlags},
    truncated_error,
};
use alloc::{boxed::Box, format, vec::Vec};
use core::marker::PhantomData;
use hashbrown::HashMap;

/// A typed table inside a mapping: a raw base pointer and an entry count.
///
/// The pointer targets memory owned by the `ElfImage` holding this table;
/// the accessors below re-tie the lifetime to a borrow of the holder.
struct Table<T> {
    ptr: *const T,
    num: usize,
}

impl<T> Copy for Table<T> {}
impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Table<T> {
    fn from_slice(entries: &[T]) -> Self {
        Self {
            ptr: entries.as_ptr(),
            num: entries.len(),
        }
    }

    /// Builds a table from a pointer that was range- and alignment-checked
    /// by the caller.
    unsafe fn from_raw(ptr: *const T, num: usize) -> Self {
        Self { ptr, num }
    }

    #[inline]
    fn get(&self, idx: usize) -> Option<&T> {
        (idx < self.num).then(|| unsafe { &*self.ptr.add(idx) })
    }

    #[inline]
    fn as_slice(&self) -> &[T] {
        unsafe { core::slice::from_raw_parts(self.ptr, self.num) }
    }
}

/// A string table: raw bytes interpreted as NUL-terminated names.
#[derive(Clone, Copy)]
struct StrBytes {
    ptr: *const u8,
    len: usize,
}

impl StrBytes {
    fn from_slice(bytes: &[u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    unsafe fn from_raw(ptr: *const u8, len: usize) -> Self {
        Self { ptr, len }
    }

    /// The string at `offset`, or `None` for the reserved offset 0.
    ///
    /// Offset 0 is the "no string" sentinel and is never dereferenced as
    /// real string data.
    fn get<'a>(&self, offset: u32) -> Result<Option<&'a str>> {
        if offset == 0 {
            return Ok(None);
        }
        let offset = offset as usize;
        if offset >= self.len {
            return Err(truncated_error(format!(
                "string offset {:#x} outside table of {:#x} bytes",
                offset, self.len
            )));
        }
        let tail = unsafe { core::slice::from_raw_parts(self.ptr.add(offset), self.len - offset) };
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| truncated_error("string is not NUL-terminated within its table"))?;
        let name = core::str::from_utf8(&tail[..nul])
            .map_err(|_| format_error("string table entry is not valid UTF-8"))?;
        Ok(Some(name))
    }
}

/// A symbol table paired with the string table its names index into.
struct SymbolSource {
    syms: Table<ElfSym>,
    strings: StrBytes,
}

/// Name→index map over one symbol table, built lazily by a full scan.
type SymbolCache = HashMap<Box<str>, usize>;

/// Dynamic-linking tables recovered from a loaded image via `PT_DYNAMIC`.
struct RuntimeTables {
    dynamic: Table<ElfDyn>,
    dynsym: Option<SymbolSource>,
    hash: Option<HashTable>,
}

/// A parsed 32-bit ELF image.
///
/// Created by [`open`](Self::open) from a borrowed [`ElfReader`]; the reader
/// stays owned by the caller and is never closed here. The image exclusively
/// owns its mappings — the primary one made at open time and the loaded
/// segment region — and releases them when dropped.
///
/// An image opened with `header_only` exposes only the header and program
/// header table until [`load`](Self::load) places the `PT_LOAD` segments, at
/// which point the dynamic-linking tables become reachable through
/// `PT_DYNAMIC`. A fully mapped image additionally resolves `.symtab`,
/// `.dynsym`, `.dynamic`, and `.hash` from the section header table at open
/// time.
///
/// The lazy symbol caches mutate through `&mut self`; every `&self` accessor
/// is read-only, so shared use from several threads is confined to the
/// methods that do not take `&mut self`.
pub struct ElfImage<'f, M: Mmap = DefaultMmap> {
    file: &'f mut dyn ElfReader,
    header_only: bool,
    /// Covers the ELF and program headers in header-only mode, the entire
    /// file otherwise.
    map: Mapping,
    /// The reservation spanning every loaded `PT_LOAD` segment. At most one
    /// entry today; releasing it releases every segment placed inside it.
    segments: Vec<Mapping>,
    /// Amount to add to a virtual address to reach its loaded location.
    load_bias: usize,
    loaded: bool,

    phdrs: Table<ElfPhdr>,
    shdrs: Option<Table<ElfShdr>>,
    dynamic: Option<Table<ElfDyn>>,
    symtab: Option<SymbolSource>,
    dynsym: Option<SymbolSource>,
    hash: Option<HashTable>,

    symtab_cache: Option<SymbolCache>,
    dynsym_cache: Option<SymbolCache>,
    _marker: PhantomData<M>,
}

impl<'f, M: Mmap> core::fmt::Debug for ElfImage<'f, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ElfImage")
            .field("header_only", &self.header_only)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl<'f> ElfImage<'f, DefaultMmap> {
    /// Opens `file` with the platform's default mapping primitive.
    ///
    /// See [`open_with`](Self::open_with).
    pub fn open(file: &'f mut dyn ElfReader, writable: bool, header_only: bool) -> Result<Self> {
        Self::open_with(file, writable, header_only)
    }
}

impl<'f, M: Mmap> ElfImage<'f, M> {
    /// Opens `file` as a 32-bit ELF image.
    ///
    /// With `header_only` set, only the ELF header and program header table
    /// are mapped; otherwise the entire file is. `writable` selects the
    /// protection of the primary mapping.
    ///
    /// # Errors
    ///
    /// [`Error::Format`](crate::Error::Format) when the identification
    /// bytes, class, data encoding, version, or a table entry size are
    /// wrong; [`Error::Truncated`](crate::Error::Truncated) when a header
    /// table extends past the file. No partially constructed image is ever
    /// returned, and a failed open releases everything it mapped.
    pub fn open_with(
        file: &'f mut dyn ElfReader,
        writable: bool,
        header_only: bool,
    ) -> Result<Self> {
        let file_len = file.len();
        if file_len < EHDR_SIZE {
            return Err(truncated_error(format!(
                "{}: {:#x} bytes is too small for an ELF header",
                file.file_name(),
                file_len
            )));
        }

        let mut prot = ProtFlags::PROT_READ;
        if writable {
            prot |= ProtFlags::PROT_WRITE;
        }

        let map_len = if header_only { EHDR_SIZE } else { file_len };
        let mut map = Self::map_file(file, map_len, prot)?;

        let (ph_start, ph_end, phnum, phentsize) = {
            let ehdr = ElfHeader::new(map.bytes(0, EHDR_SIZE)?)?;
            let (start, end) = ehdr.phdr_range();
            (start, end, ehdr.e_phnum(), ehdr.e_phentsize())
        };
        if phnum > 0 && phentsize != PHDR_SIZE {
            return Err(format_error(format!(
                "unexpected program header entry size {phentsize}"
            )));
        }
        if ph_end > file_len {
            return Err(truncated_error(format!(
                "program header table {:#x}..{:#x} extends past file of {:#x} bytes",
                ph_start, ph_end, file_len
            )));
        }
        if header_only && ph_end > map.len() {
            // Grow the prefix mapping to cover the program header table.
            map = Self::map_file(file, ph_end, prot)?;
        }
        let phdrs = Table::from_slice(map.slice::<ElfPhdr>(ph_start, phnum)?);

        let mut image = Self {
            file,
            header_only,
            map,
            segments: Vec::new(),
            load_bias: 0,
            loaded: false,
            phdrs,
            shdrs: None,
            dynamic: None,
            symtab: None,
            dynsym: None,
            hash: None,
            symtab_cache: None,
            dynsym_cache: None,
            _marker: PhantomData,
        };

        if !header_only {
            image.locate_sections(file_len)?;
        }

        #[cfg(feature = "log")]
        log::debug!(
            "[{}] opened ({}), {} program headers",
            image.file.file_name(),
            if header_only { "header-only" } else { "full" },
            image.phdr_num(),
        );

        Ok(image)
    }

    /// Maps the first `len` bytes of `file`, copying when the source has no
    /// descriptor to map from.
    fn map_file(file: &mut dyn ElfReader, len: usize, prot: ProtFlags) -> Result<Mapping> {
        if let Some(fd) = file.as_fd() {
            let mut need_copy = false;
            let ptr = unsafe {
                M::mmap(
                    None,
                    len,
                    prot,
                    MapFlags::MAP_PRIVATE,
                    0,
                    Some(fd),
                    &mut need_copy,
                )
            }?;
            Ok(unsafe { Mapping::new(ptr, len, M::munmap) })
        } else {
            let ptr = unsafe { M::mmap_reserve(None, len, false) }?;
            let mut map = unsafe { Mapping::new(ptr, len, M::munmap) };
            file.read(unsafe { map.as_bytes_mut() }, 0)?;
            if !prot.contains(ProtFlags::PROT_WRITE) {
                unsafe { M::mprotect(ptr, len, prot) }?;
            }
            Ok(map)
        }
    }

    /// Validates the section header table and scans it once for the
    /// well-known sections. Full-map mode only.
    fn locate_sections(&mut self, file_len: usize) -> Result<()> {
        let (sh_start, sh_end, shnum, shentsize, _) = {
            let ehdr = self.header();
            let (start, end) = ehdr.shdr_range();
            (
                start,
                end,
                ehdr.e_shnum(),
                ehdr.e_shentsize(),
                ehdr.e_shstrndx(),
            )
        };
        if shnum > 0 && shentsize != SHDR_SIZE {
            return Err(format_error(format!(
                "unexpected section header entry size {shentsize}"
            )));
        }
        if sh_end > file_len {
            return Err(truncated_error(format!(
                "section header table {:#x}..{:#x} extends past file of {:#x} bytes",
                sh_start, sh_end, file_len
            )));
        }
        let shdrs = Table::from_slice(self.map.slice::<ElfShdr>(sh_start, shnum)?);

        let mut symtab_shdr = None;
        let mut dynsym_shdr = None;
        for shdr in shdrs.as_slice() {
            match shdr.sh_type {
                SHT_SYMTAB => symtab_shdr = Some(shdr),
                SHT_DYNSYM => dynsym_shdr = Some(shdr),
                SHT_DYNAMIC => self.dynamic = Some(self.dynamic_table(shdr)?),
                SHT_HASH => self.hash = Some(self.hash_table(shdr)?),
                _ => {}
            }
        }
        if let Some(shdr) = symtab_shdr {
            self.symtab = Some(self.symbol_table(&shdrs, shdr)?);
        }
        if let Some(shdr) = dynsym_shdr {
            self.dynsym = Some(self.symbol_table(&shdrs, shdr)?);
        }
        self.shdrs = Some(shdrs);
        Ok(())
    }

    fn dynamic_table(&self, shdr: &ElfShdr) -> Result<Table<ElfDyn>> {
        if shdr.sh_entsize as usize != DYN_SIZE {
            return Err(format_error(format!(
                "unexpected dynamic entry size {}",
                shdr.sh_entsize
            )));
        }
        let count = shdr.sh_size as usize / DYN_SIZE;
        Ok(Table::from_slice(
            self.map.slice::<ElfDyn>(shdr.sh_offset as usize, count)?,
        ))
    }

    fn hash_table(&self, shdr: &ElfShdr) -> Result<HashTable> {
        let words = self
            .map
            .slice::<u32>(shdr.sh_offset as usize, shdr.sh_size as usize / 4)?;
        unsafe { HashTable::new(words.as_ptr(), words.len()) }
            .ok_or_else(|| truncated_error("hash section too small for its bucket/chain counts"))
    }

    /// Resolves one symbol table section together with the string table its
    /// `sh_link` names.
    fn symbol_table(&self, shdrs: &Table<ElfShdr>, shdr: &ElfShdr) -> Result<SymbolSource> {
        if shdr.sh_entsize as usize != SYM_SIZE {
            return Err(format_error(format!(
                "unexpected symbol entry size {}",
                shdr.sh_entsize
            )));
        }
        let count = shdr.sh_size as usize / SYM_SIZE;
        let syms = self.map.slice::<ElfSym>(shdr.sh_offset as usize, count)?;

        let strtab = shdrs.get(shdr.sh_link as usize).ok_or_else(|| {
            format_error(format!(
                "symbol table links to section {} which does not exist",
                shdr.sh_link
            ))
        })?;
        if strtab.sh_type != SHT_STRTAB {
            return Err(format_error(format!(
                "symbol table links to section of type {}, expected a string table",
                strtab.sh_type
            )));
        }
        let strings = self
            .map
            .bytes(strtab.sh_offset as usize, strtab.sh_size as usize)?;
        Ok(SymbolSource {
            syms: Table::from_slice(syms),
            strings: StrBytes::from_slice(strings),
        })
    }

    /// Returns `true` if `section_type` names one of the two symbol tables.
    pub fn is_symbol_section_type(section_type: u32) -> bool {
        is_symbol_section_type(section_type)
    }

    /// The name of the underlying file.
    pub fn file_name(&self) -> &str {
        self.file.file_name()
    }

    /// Whether only the ELF and program headers were mapped at open time.
    pub fn is_header_only(&self) -> bool {
        self.header_only
    }

    /// Whether [`load`](Self::load) has completed on this image.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// First byte of the image: the loaded extent once `load` has run, the
    /// primary mapping before that.
    pub fn begin(&self) -> *const u8 {
        match self.segments.first() {
            Some(region) => region.base() as *const u8,
            None => self.map.base() as *const u8,
        }
    }

    /// One past the last byte of the image.
    pub fn end(&self) -> *const u8 {
        unsafe { self.begin().add(self.len()) }
    }

    /// Size in bytes of the extent `begin` points at.
    pub fn len(&self) -> usize {
        match self.segments.first() {
            Some(region) => region.len(),
            None => self.map.len(),
        }
    }

    /// The validated ELF header.
    pub fn header(&self) -> &ElfHeader {
        // Validated by `open`; the primary mapping always covers it.
        unsafe { &*(self.map.base() as *const ElfHeader) }
    }

    /// Number of program header table entries.
    pub fn phdr_num(&self) -> usize {
        self.phdrs.num
    }

    /// The program header at `idx`.
    ///
    /// Passing an index at or past [`phdr_num`](Self::phdr_num) is a usage
    /// error reported as [`Error::Index`](crate::Error::Index).
    pub fn phdr(&self, idx: usize) -> Result<&ElfPhdr> {
        self.phdrs.get(idx).ok_or_else(|| {
            index_error(format!(
                "program header {} out of range ({} entries)",
                idx, self.phdrs.num
            ))
        })
    }

    /// The first program header of the given type, or `None` — absence is a
    /// normal outcome, not an error.
    pub fn find_phdr_by_type(&self, p_type: u32) -> Option<&ElfPhdr> {
        self.phdrs.as_slice().iter().find(|p| p.p_type == p_type)
    }

    fn shdr_table(&self) -> Result<&Table<ElfShdr>> {
        self.shdrs
            .as_ref()
            .ok_or_else(|| mode_error("section headers are not mapped in header-only mode"))
    }

    /// Number of section header table entries.
    pub fn shdr_num(&self) -> Result<usize> {
        Ok(self.shdr_table()?.num)
    }

    /// The section header at `idx`.
    pub fn shdr(&self, idx: usize) -> Result<&ElfShdr> {
        let shdrs = self.shdr_table()?;
        shdrs.get(idx).ok_or_else(|| {
            index_error(format!(
                "section header {} out of range ({} entries)",
                idx, shdrs.num
            ))
        })
    }

    /// The first section header of the given type, or `None`.
    pub fn find_shdr_by_type(&self, sh_type: u32) -> Result<Option<&ElfShdr>> {
        Ok(self
            .shdr_table()?
            .as_slice()
            .iter()
            .find(|s| s.sh_type == sh_type))
    }

    /// The section-name string table's header, named by `e_shstrndx`.
    pub fn section_name_table(&self) -> Result<&ElfShdr> {
        self.shdr(self.header().e_shstrndx())
    }

    /// The string at `offset` inside the string table section `shdr`, or
    /// `None` for the reserved offset 0.
    pub fn get_string(&self, shdr: &ElfShdr, offset: u32) -> Result<Option<&str>> {
        if self.shdrs.is_none() {
            return Err(mode_error(
                "section string data is not mapped in header-only mode",
            ));
        }
        if shdr.sh_type != SHT_STRTAB {
            return Err(index_error(format!(
                "section of type {} is not a string table",
                shdr.sh_type
            )));
        }
        let bytes = self
            .map
            .bytes(shdr.sh_offset as usize, shdr.sh_size as usize)?;
        StrBytes::from_slice(bytes).get(offset)
    }

    /// The string at `offset` in the string table associated with the given
    /// symbol table kind (`SHT_SYMTAB` or `SHT_DYNSYM`).
    pub fn get_string_by_type(&self, section_type: u32, offset: u32) -> Result<Option<&str>> {
        match self.symbol_source(section_type)? {
            Some(source) => source.strings.get(offset),
            None => Ok(None),
        }
    }

    /// Fails when section-level data is unreachable: header-only mode
    /// before a successful `load`.
    fn require_section_data(&self) -> Result<()> {
        if self.header_only && !self.loaded {
            return Err(mode_error(
                "section data requires a full mapping or loaded segments",
            ));
        }
        Ok(())
    }

    /// Number of dynamic section entries; 0 when the image has none.
    pub fn dynamic_num(&self) -> Result<usize> {
        self.require_section_data()?;
        Ok(self.dynamic.as_ref().map_or(0, |d| d.num))
    }

    /// The dynamic entry at `idx`.
    pub fn dynamic(&self, idx: usize) -> Result<&ElfDyn> {
        let num = self.dynamic_num()?;
        self.dynamic
            .as_ref()
            .and_then(|d| d.get(idx))
            .ok_or_else(|| index_error(format!("dynamic entry {idx} out of range ({num} entries)")))
    }

    /// The value of the first dynamic entry with tag `tag`, or `None`.
    /// The scan stops at `DT_NULL` like a consumer of the table would.
    pub fn find_dynamic_value_by_type(&self, tag: i64) -> Result<Option<u32>> {
        self.require_section_data()?;
        let Some(dynamic) = self.dynamic.as_ref() else {
            return Ok(None);
        };
        for entry in dynamic.as_slice() {
            let d_tag = i64::from(entry.d_tag);
            if d_tag == DT_NULL {
                break;
            }
            if d_tag == tag {
                return Ok(Some(entry.d_un));
            }
        }
        Ok(None)
    }

    fn rel_section(&self, shdr: &ElfShdr, kind: u32, entsize: usize) -> Result<usize> {
        if self.shdrs.is_none() {
            return Err(mode_error(
                "relocation data is not mapped in header-only mode",
            ));
        }
        if shdr.sh_type != kind {
            return Err(index_error(format!(
                "section of type {} is not the requested relocation kind {}",
                shdr.sh_type, kind
            )));
        }
        if shdr.sh_entsize as usize != entsize {
            return Err(format_error(format!(
                "unexpected relocation entry size {}",
                shdr.sh_entsize
            )));
        }
        Ok(shdr.sh_size as usize / entsize)
    }

    /// Number of `REL` entries in the relocation section `shdr`.
    pub fn rel_num(&self, shdr: &ElfShdr) -> Result<usize> {
        self.rel_section(shdr, SHT_REL, size_of::<ElfRel>())
    }

    /// The `REL` entry at `idx` in the relocation section `shdr`.
    pub fn rel(&self, shdr: &ElfShdr, idx: usize) -> Result<&ElfRel> {
        let num = self.rel_num(shdr)?;
        if idx >= num {
            return Err(index_error(format!(
                "relocation {idx} out of range ({num} entries)"
            )));
        }
        Ok(&self.map.slice::<ElfRel>(shdr.sh_offset as usize, num)?[idx])
    }

    /// Number of `RELA` entries in the relocation section `shdr`.
    pub fn rela_num(&self, shdr: &ElfShdr) -> Result<usize> {
        self.rel_section(shdr, SHT_RELA, size_of::<ElfRela>())
    }

    /// The `RELA` entry at `idx` in the relocation section `shdr`.
    pub fn rela(&self, shdr: &ElfShdr, idx: usize) -> Result<&ElfRela> {
        let num = self.rela_num(shdr)?;
        if idx >= num {
            return Err(index_error(format!(
                "relocation {idx} out of range ({num} entries)"
            )));
        }
        Ok(&self.map.slice::<ElfRela>(shdr.sh_offset as usize, num)?[idx])
    }

    /// The symbol source for a table kind, `None` when this image has no
    /// such table (or it is not reachable in the current mode, for
    /// `.symtab` after a header-only load).
    fn symbol_source(&self, section_type: u32) -> Result<Option<&SymbolSource>> {
        if !is_symbol_section_type(section_type) {
            return Err(index_error(format!(
                "section type {section_type} is not a symbol table kind"
            )));
        }
        self.require_section_data()?;
        Ok(match section_type {
            SHT_SYMTAB => self.symtab.as_ref(),
            _ => self.dynsym.as_ref(),
        })
    }

    /// Number of entries in the given symbol table; 0 when absent.
    pub fn symbol_num(&self, section_type: u32) -> Result<usize> {
        Ok(self.symbol_source(section_type)?.map_or(0, |s| s.syms.num))
    }

    /// The symbol at `idx` in the given table kind.
    pub fn symbol(&self, section_type: u32, idx: usize) -> Result<&ElfSym> {
        let num = self.symbol_num(section_type)?;
        self.symbol_source(section_type)?
            .and_then(|s| s.syms.get(idx))
            .ok_or_else(|| index_error(format!("symbol {idx} out of range ({num} entries)")))
    }

    /// Finds a symbol by name in the given table kind.
    ///
    /// With `build_cache` set, the first call scans the table once and
    /// builds a name→symbol map that later calls reuse; unnamed symbols and
    /// `STT_NOTYPE` entries stay out of the map because their duplicates
    /// would make it inconsistent, and of duplicate named entries the last
    /// one wins. Without `build_cache`, the table is scanned linearly and
    /// no cache is built or consulted.
    ///
    /// Building the cache mutates the image, hence `&mut self`; callers
    /// needing shared lookups use the hash-table path instead.
    ///
    /// Absence is `Ok(None)`, never an error.
    pub fn find_symbol_by_name(
        &mut self,
        section_type: u32,
        name: &str,
        build_cache: bool,
    ) -> Result<Option<&ElfSym>> {
        // Validate the kind and the access mode up front.
        if self.symbol_source(section_type)?.is_none() {
            return Ok(None);
        }

        let Self {
            symtab,
            dynsym,
            symtab_cache,
            dynsym_cache,
            ..
        } = self;
        let (source, cache_slot) = if section_type == SHT_SYMTAB {
            (symtab.as_ref(), symtab_cache)
        } else {
            (dynsym.as_ref(), dynsym_cache)
        };
        let Some(source) = source else {
            return Ok(None);
        };

        if build_cache {
            if cache_slot.is_none() {
                let mut cache = SymbolCache::new();
                for (i, sym) in source.syms.as_slice().iter().enumerate() {
                    if sym.st_name == 0 || sym.st_type() == STT_NOTYPE {
                        continue;
                    }
                    let Some(sym_name) = source.strings.get(sym.st_name)? else {
                        continue;
                    };
                    // Later entries with the same name overwrite earlier ones.
                    cache.insert(Box::from(sym_name), i);
                }
                *cache_slot = Some(cache);
            }
            let Some(&idx) = cache_slot.as_ref().and_then(|c| c.get(name)) else {
                return Ok(None);
            };
            Ok(source.syms.get(idx))
        } else {
            for sym in source.syms.as_slice() {
                // Same eligibility as the cache, so both strategies resolve
                // a name to the same symbol.
                if sym.st_name == 0 || sym.st_type() == STT_NOTYPE {
                    continue;
                }
                if source.strings.get(sym.st_name)? == Some(name) {
                    return Ok(Some(sym));
                }
            }
            Ok(None)
        }
    }

    /// The `st_value` of the named symbol, or `None` when absent. See
    /// [`find_symbol_by_name`](Self::find_symbol_by_name) for `build_cache`.
    pub fn find_symbol_address(
        &mut self,
        section_type: u32,
        name: &str,
        build_cache: bool,
    ) -> Result<Option<u32>> {
        Ok(self
            .find_symbol_by_name(section_type, name, build_cache)?
            .map(|sym| sym.st_value))
    }

    /// Finds a symbol in `.dynsym` through the SysV hash table and returns
    /// its address in the loaded image (its `st_value` before a load, when
    /// the bias is zero).
    ///
    /// This walk touches only one bucket chain instead of the whole table
    /// and builds no cache, so it is the preferred lookup at load/link
    /// time. `Ok(None)` when the name is absent or the image carries no
    /// hash table.
    pub fn find_dynamic_symbol_address(&self, name: &str) -> Result<Option<*const u8>> {
        self.require_section_data()?;
        let (Some(source), Some(hash)) = (self.dynsym.as_ref(), self.hash) else {
            return Ok(None);
        };

        let mut steps = 0;
        let mut idx = hash.bucket(elf_hash(name.as_bytes()));
        while idx != STN_UNDEF {
            // A malformed chain could cycle; it cannot be longer than the
            // table it indexes.
            if steps > hash.nchain() {
                return Err(truncated_error("hash chain does not terminate"));
            }
            steps += 1;
            let sym = source.syms.get(idx as usize).ok_or_else(|| {
                truncated_error(format!("hash chain names symbol {idx} out of range"))
            })?;
            if source.strings.get(sym.st_name)? == Some(name) {
                let addr = self.load_bias.wrapping_add(sym.st_value as usize);
                return Ok(Some(addr as *const u8));
            }
            idx = hash.chain(idx);
        }
        Ok(None)
    }

    /// The total virtual memory span required to hold all `PT_LOAD`
    /// segments, from the lowest segment's page down to the highest
    /// segment's page-rounded end. 0 when there are none.
    ///
    /// A caller can reserve this much address space before [`load`]ing.
    ///
    /// [`load`]: Self::load
    pub fn loaded_size(&self) -> usize {
        let mut min_page = usize::MAX;
        let mut max_end = 0usize;
        for phdr in self.phdrs.as_slice() {
            if phdr.p_type != PT_LOAD || phdr.p_memsz == 0 {
                continue;
            }
            let vaddr = phdr.p_vaddr as usize;
            min_page = min_page.min(rounddown(vaddr, PAGE_SIZE));
            max_end = max_end.max(roundup(
                vaddr.saturating_add(phdr.p_memsz as usize),
                PAGE_SIZE,
            ));
        }
        max_end.saturating_sub(min_page.min(max_end))
    }

    /// Places every `PT_LOAD` segment at its virtual address inside one
    /// reserved span, producing the memory image a runtime executes from.
    ///
    /// Protection comes from each segment's flags; `executable = false`
    /// (ahead-of-time inspection) strips execute permission since the code
    /// is examined, not run. After a successful load, `begin`/`end`/`len`
    /// describe the loaded extent, and for a header-only image the
    /// dynamic-linking tables are recovered through `PT_DYNAMIC`.
    ///
    /// # Errors
    ///
    /// [`Error::Load`](crate::Error::Load) when a segment's geometry is
    /// inconsistent (`p_filesz > p_memsz`, file range past the end of the
    /// file, misaligned offset), when there is nothing to load, when the
    /// mapping primitive cannot place a segment, or on a second call. A
    /// failed load releases every mapping it created before returning.
    pub fn load(&mut self, executable: bool) -> Result<()> {
        if self.loaded {
            return Err(load_error("segments are already loaded"));
        }

        let file_len = self.file.len();
        let mut min_page = usize::MAX;
        let mut max_end = 0usize;
        let mut count = 0usize;
        for phdr in self.phdrs.as_slice() {
            if phdr.p_type != PT_LOAD {
                continue;
            }
            let offset = phdr.p_offset as usize;
            let vaddr = phdr.p_vaddr as usize;
            let filesz = phdr.p_filesz as usize;
            let memsz = phdr.p_memsz as usize;
            let align = phdr.p_align as usize;

            if filesz > memsz {
                return Err(load_error(format!(
                    "segment at {vaddr:#x}: file size {filesz:#x} exceeds memory size {memsz:#x}"
                )));
            }
            if offset.checked_add(filesz).is_none_or(|end| end > file_len) {
                return Err(load_error(format!(
                    "segment at {vaddr:#x}: file range {offset:#x}+{filesz:#x} extends past file of {file_len:#x} bytes"
                )));
            }
            if align > 1 && !align.is_power_of_two() {
                return Err(load_error(format!(
                    "segment at {vaddr:#x}: alignment {align:#x} is not a power of two"
                )));
            }
            if filesz > 0 && vaddr % PAGE_SIZE != offset % PAGE_SIZE {
                return Err(load_error(format!(
                    "segment at {vaddr:#x}: offset {offset:#x} is not congruent modulo the page size"
                )));
            }
            if memsz == 0 {
                continue;
            }
            count += 1;
            min_page = min_page.min(rounddown(vaddr, PAGE_SIZE));
            let end = vaddr
                .checked_add(memsz)
                .ok_or_else(|| load_error(format!("segment at {vaddr:#x}: size overflows")))?;
            max_end = max_end.max(roundup(end, PAGE_SIZE));
        }
        if count == 0 {
            return Err(load_error("no loadable segments"));
        }

        let span = max_end - min_page;
        let fd = self.file.as_fd();
        let ptr = unsafe { M::mmap_reserve(None, span, fd.is_some()) }?;
        // From here on, dropping `region` on any failure releases the
        // reservation and every segment fixed inside it.
        let region = unsafe { Mapping::new(ptr, span, M::munmap) };
        let bias = region.base().wrapping_sub(min_page);

        for phdr in self.phdrs.as_slice() {
            if phdr.p_type != PT_LOAD || phdr.p_memsz == 0 {
                continue;
            }
            let vaddr = phdr.p_vaddr as usize;
            let filesz = phdr.p_filesz as usize;
            let memsz = phdr.p_memsz as usize;

            let seg_page = rounddown(vaddr, PAGE_SIZE);
            let addr = bias.wrapping_add(seg_page);
            let head = vaddr - seg_page;
            let file_span = roundup(head + filesz, PAGE_SIZE);
            let mem_span = roundup(head + memsz, PAGE_SIZE);
            let prot = segment_prot(phdr.p_flags, executable);

            if let Some(fd) = fd {
                if filesz > 0 {
                    // Mapped writable first so the zero tail of the last
                    // file page can be cleared, then re-protected.
                    let mut need_copy = false;
                    unsafe {
                        M::mmap(
                            Some(addr),
                            file_span,
                            prot | ProtFlags::PROT_WRITE,
                            MapFlags::MAP_PRIVATE | MapFlags::MAP_FIXED,
                            rounddown(phdr.p_offset as usize, PAGE_SIZE),
                            Some(fd),
                            &mut need_copy,
                        )
                    }?;
                    let tail_start = head + filesz;
                    let tail_end = file_span.min(head + memsz);
                    if tail_end > tail_start {
                        unsafe {
                            core::ptr::write_bytes(
                                (addr + tail_start) as *mut u8,
                                0,
                                tail_end - tail_start,
                            )
                        };
                    }
                }
                if mem_span > file_span {
                    unsafe {
                        M::mmap_anonymous(
                            addr + file_span,
                            mem_span - file_span,
                            prot | ProtFlags::PROT_WRITE,
                            MapFlags::MAP_PRIVATE | MapFlags::MAP_FIXED,
                        )
                    }?;
                }
                unsafe { M::mprotect(addr as *mut _, mem_span, prot) }?;
            } else if filesz > 0 {
                // The reservation is zeroed read-write memory; copy the
                // segment's file bytes into place.
                let dst = unsafe {
                    core::slice::from_raw_parts_mut((addr + head) as *mut u8, filesz)
                };
                self.file.read(dst, phdr.p_offset as usize)?;
            }
        }

        if fd.is_none() {
            // Second pass: protections go on only after every segment has
            // been copied in.
            for phdr in self.phdrs.as_slice() {
                if phdr.p_type != PT_LOAD || phdr.p_memsz == 0 {
                    continue;
                }
                let vaddr = phdr.p_vaddr as usize;
                let seg_page = rounddown(vaddr, PAGE_SIZE);
                let head = vaddr - seg_page;
                let mem_span = roundup(head + phdr.p_memsz as usize, PAGE_SIZE);
                let prot = segment_prot(phdr.p_flags, executable);
                unsafe {
                    M::mprotect(bias.wrapping_add(seg_page) as *mut _, mem_span, prot)
                }?;
            }
        }

        // A header-only image recovers its dynamic-linking tables from the
        // loaded segments before the load is committed.
        let runtime = if self.header_only {
            self.locate_runtime_tables(&region, bias)?
        } else {
            None
        };

        #[cfg(feature = "log")]
        log::debug!(
            "[{}] loaded {} segments at {:#x}, span {:#x}",
            self.file.file_name(),
            count,
            region.base(),
            span,
        );

        self.load_bias = bias;
        self.segments.push(region);
        self.loaded = true;
        if let Some(runtime) = runtime {
            self.dynamic = Some(runtime.dynamic);
            self.dynsym = runtime.dynsym;
            self.hash = runtime.hash;
        }
        Ok(())
    }

    /// Walks `PT_DYNAMIC` inside the loaded region to recover the dynamic
    /// section, dynamic symbol table (sized by the hash table's chain
    /// count), its string table, and the hash table.
    fn locate_runtime_tables(
        &self,
        region: &Mapping,
        bias: usize,
    ) -> Result<Option<RuntimeTables>> {
        let Some(dyn_phdr) = self.find_phdr_by_type(PT_DYNAMIC) else {
            return Ok(None);
        };

        let begin = region.base();
        let end = begin + region.len();
        let in_region = |addr: usize, len: usize, what: &str| -> Result<usize> {
            match addr.checked_add(len) {
                Some(last) if addr >= begin && last <= end => Ok(addr),
                _ => Err(truncated_error(format!(
                    "{what} at {addr:#x} lies outside the loaded image"
                ))),
            }
        };

        let dyn_addr = in_region(
            bias.wrapping_add(dyn_phdr.p_vaddr as usize),
            dyn_phdr.p_filesz as usize,
            "dynamic segment",
        )?;
        if dyn_addr % align_of::<ElfDyn>() != 0 {
            return Err(truncated_error("dynamic segment is misaligned"));
        }
        let dynamic = unsafe {
            Table::from_raw(
                dyn_addr as *const ElfDyn,
                dyn_phdr.p_filesz as usize / DYN_SIZE,
            )
        };

        let mut hash_addr = None;
        let mut symtab_addr = None;
        let mut strtab_addr = None;
        let mut strsz = None;
        for entry in dynamic.as_slice() {
            match i64::from(entry.d_tag) {
                DT_NULL => break,
                DT_HASH => hash_addr = Some(bias.wrapping_add(entry.d_un as usize)),
                DT_SYMTAB => symtab_addr = Some(bias.wrapping_add(entry.d_un as usize)),
                DT_STRTAB => strtab_addr = Some(bias.wrapping_add(entry.d_un as usize)),
                DT_STRSZ => strsz = Some(entry.d_un as usize),
                _ => {}
            }
        }

        // The hash table comes first: its chain count is the only way to
        // size the symbol table without section headers.
        let hash = match hash_addr {
            Some(addr) => {
                let addr = in_region(addr, 8, "hash table")?;
                if addr % align_of::<u32>() != 0 {
                    return Err(truncated_error("hash table is misaligned"));
                }
                let avail_words = (end - addr) / 4;
                Some(
                    unsafe { HashTable::new(addr as *const u32, avail_words) }.ok_or_else(
                        || truncated_error("hash table extends past the loaded image"),
                    )?,
                )
            }
            None => None,
        };

        let dynsym = match (symtab_addr, strtab_addr, strsz, hash) {
            (Some(sym_addr), Some(str_addr), Some(str_len), Some(hash)) => {
                let num = hash.nchain() as usize;
                let sym_addr = in_region(sym_addr, num * SYM_SIZE, "dynamic symbol table")?;
                if sym_addr % align_of::<ElfSym>() != 0 {
                    return Err(truncated_error("dynamic symbol table is misaligned"));
                }
                let str_addr = in_region(str_addr, str_len, "dynamic string table")?;
                Some(SymbolSource {
                    syms: unsafe { Table::from_raw(sym_addr as *const ElfSym, num) },
                    strings: unsafe { StrBytes::from_raw(str_addr as *const u8, str_len) },
                })
            }
            _ => None,
        };

        Ok(Some(RuntimeTables {
            dynamic,
            dynsym,
            hash,
        }))
    }
}

/// Converts a segment's `PF_*` flags into mapping protection; execute
/// permission is granted only when the image is loaded to run.
fn segment_prot(p_flags: u32, executable: bool) -> ProtFlags {
    let mut prot = ProtFlags::PROT_NONE;
    if p_flags & PF_R != 0 {
        prot |= ProtFlags::PROT_READ;
    }
    if p_flags & PF_W != 0 {
        prot |= ProtFlags::PROT_WRITE;
    }
    if p_flags & PF_X != 0 && executable {
        prot |= ProtFlags::PROT_EXEC;
    }
    prot
}
