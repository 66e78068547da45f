//! Symbol resolution: the cached map, the plain scan, and the hash walk.

mod common;

use common::*;
use elf32_image::elf::abi::{SHT_DYNSYM, SHT_HASH, SHT_SYMTAB};
use elf32_image::{ElfImage, Error, input::ElfBinary};

#[test]
fn cache_and_scan_agree() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    for kind in [SHT_SYMTAB, SHT_DYNSYM] {
        for (name, value) in [
            ("alpha", Some(0x1111)),
            ("beta", Some(0x2222)),
            ("gamma", Some(0x6666)),
            ("delta", None),
        ] {
            let cached = image.find_symbol_address(kind, name, true).unwrap();
            let scanned = image.find_symbol_address(kind, name, false).unwrap();
            assert_eq!(cached, scanned, "{name} diverged");
            assert_eq!(cached, value, "{name} resolved wrong");
        }
    }
}

#[test]
fn duplicate_names_follow_table_order() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    // The cache keeps the last entry for a repeated name; the plain scan
    // stops at the first eligible match.
    assert_eq!(
        image.find_symbol_address(SHT_SYMTAB, "dup", true).unwrap(),
        Some(0x5555)
    );
    assert_eq!(
        image.find_symbol_address(SHT_SYMTAB, "dup", false).unwrap(),
        Some(0x3333)
    );
}

#[test]
fn untyped_symbols_are_not_resolvable_by_name() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    assert_eq!(
        image.find_symbol_by_name(SHT_SYMTAB, "loose", true).unwrap().map(|s| s.st_value),
        None
    );
    assert_eq!(
        image.find_symbol_by_name(SHT_SYMTAB, "loose", false).unwrap().map(|s| s.st_value),
        None
    );
    // The hash walk serves the dynamic linker and does not filter by type.
    let addr = image.find_dynamic_symbol_address("loose").unwrap();
    assert_eq!(addr.map(|p| p as usize), Some(0x4444));
}

#[test]
fn hash_walk_matches_linear_scan() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    for name in ["alpha", "beta", "gamma", "delta", "missing"] {
        let hashed = image
            .find_dynamic_symbol_address(name)
            .unwrap()
            .map(|p| p as usize as u32);
        let scanned = image.find_symbol_address(SHT_DYNSYM, name, false).unwrap();
        assert_eq!(hashed, scanned, "{name} diverged");
    }
}

#[test]
fn single_bucket_chain_resolves_deep_entries() {
    // The image's hash section has one bucket, so every name shares one
    // chain and the walk must get past the first candidates. "alpha" was
    // inserted first and therefore sits at the end of the chain.
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    for (name, value) in [("alpha", 0x1111), ("beta", 0x2222), ("gamma", 0x6666)] {
        let addr = image.find_dynamic_symbol_address(name).unwrap();
        assert_eq!(addr.map(|p| p as usize), Some(value), "{name}");
    }
}

#[test]
fn symbol_table_is_indexed_and_bounded() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    // Six written symbols plus the reserved zero entry.
    assert_eq!(image.symbol_num(SHT_SYMTAB).unwrap(), 7);
    assert_eq!(image.symbol_num(SHT_DYNSYM).unwrap(), 7);

    let sym = image.symbol(SHT_SYMTAB, 1).expect("symbol 1");
    assert_eq!(sym.st_value, 0x1111);
    assert_eq!(sym.st_type(), 2); // STT_FUNC
    assert_eq!(sym.st_bind(), 1); // STB_GLOBAL

    assert!(matches!(image.symbol(SHT_SYMTAB, 99), Err(Error::Index { .. })));
    // Only the two symbol table kinds are accepted.
    assert!(matches!(image.symbol_num(SHT_HASH), Err(Error::Index { .. })));
}

#[test]
fn strings_resolve_by_table_kind() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    assert_eq!(image.get_string_by_type(SHT_SYMTAB, 0).unwrap(), None);
    assert_eq!(
        image.get_string_by_type(SHT_SYMTAB, 1).unwrap(),
        Some("alpha")
    );
    assert_eq!(
        image.get_string_by_type(SHT_DYNSYM, 1).unwrap(),
        Some("alpha")
    );
}

#[test]
fn dynamic_entries_are_reachable() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    // Five written entries plus the DT_NULL terminator.
    assert_eq!(image.dynamic_num().unwrap(), 6);
    assert_eq!(image.dynamic(0).unwrap().d_tag, 4);
    assert!(matches!(image.dynamic(99), Err(Error::Index { .. })));

    assert_eq!(image.find_dynamic_value_by_type(4).unwrap(), Some(0x5000)); // DT_HASH
    assert_eq!(image.find_dynamic_value_by_type(6).unwrap(), Some(0x7000)); // DT_SYMTAB
    assert_eq!(image.find_dynamic_value_by_type(10).unwrap(), Some(0x40)); // DT_STRSZ
    assert_eq!(image.find_dynamic_value_by_type(3).unwrap(), None); // DT_PLTGOT absent
}

#[test]
fn relocation_entries_are_reachable() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    let rel_shdr = image.find_shdr_by_type(9).unwrap().expect(".rel");
    assert_eq!(image.rel_num(rel_shdr).unwrap(), 2);

    let first = image.rel(rel_shdr, 0).expect("rel 0");
    assert_eq!(first.r_offset, 0x100);
    assert_eq!(first.r_type(), 2);
    assert_eq!(first.r_symbol(), 7);

    assert!(matches!(image.rel(rel_shdr, 5), Err(Error::Index { .. })));
    // A REL section is not a RELA section.
    assert!(matches!(image.rela_num(rel_shdr), Err(Error::Index { .. })));
}

#[test]
fn images_without_dynamic_symbols_report_absence() {
    let symbols = sample_symbols();
    let (symtab, strtab) = build_symtab(&symbols);
    let bytes = assemble_sections(
        &[
            SectionSpec::new(2, symtab).entsize(16).link(2),
            SectionSpec::new(3, strtab),
        ],
        0,
    );
    let mut reader = ElfBinary::new("static.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    assert_eq!(image.symbol_num(SHT_DYNSYM).unwrap(), 0);
    assert_eq!(
        image.find_symbol_by_name(SHT_DYNSYM, "alpha", true).unwrap().map(|s| s.st_value),
        None
    );
    assert_eq!(image.find_dynamic_symbol_address("alpha").unwrap(), None);
    // The static table still resolves.
    assert_eq!(
        image.find_symbol_address(SHT_SYMTAB, "alpha", true).unwrap(),
        Some(0x1111)
    );
}
