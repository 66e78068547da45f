//! Open-time validation and structural accessors.

mod common;

use common::*;
use elf32_image::{ElfImage, Error, input::ElfBinary};

#[test]
fn header_fields_match_written_bytes() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    let header = image.header();
    assert_eq!(header.e_machine, EM_386);
    assert_eq!(header.e_type, ET_EXEC);
    assert_eq!(header.e_shnum(), 9);
    assert_eq!(header.entry_point(), 0);
    assert_eq!(image.phdr_num(), 0);
    assert_eq!(image.shdr_num().unwrap(), 9);
    assert_eq!(image.len(), bytes.len());
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = sectioned_image();
    bytes[0] = 0x7e;
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
}

#[test]
fn rejects_wrong_class() {
    let mut bytes = sectioned_image();
    bytes[4] = 2; // ELFCLASS64
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
}

#[test]
fn rejects_wrong_data_encoding() {
    let mut bytes = sectioned_image();
    bytes[5] = if cfg!(target_endian = "little") { 2 } else { 1 };
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
}

#[test]
fn rejects_wrong_version() {
    let mut bytes = sectioned_image();
    bytes[6] = 0;
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
}

#[test]
fn rejects_file_smaller_than_header() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("tiny.elf", &bytes[..20]);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Truncated { .. }), "{err}");
}

#[test]
fn rejects_phdr_table_past_eof() {
    let mut bytes = two_segment_image();
    put_u32(&mut bytes, 28, 0x10_0000); // e_phoff
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Truncated { .. }), "{err}");
}

#[test]
fn rejects_unexpected_phentsize() {
    let mut bytes = two_segment_image();
    put_u16(&mut bytes, 42, 24); // e_phentsize
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
}

#[test]
fn rejects_shdr_table_past_eof() {
    let mut bytes = sectioned_image();
    put_u32(&mut bytes, 32, 0x10_0000); // e_shoff
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let err = ElfImage::open(&mut reader, false, false).unwrap_err();
    assert!(matches!(err, Error::Truncated { .. }), "{err}");
}

#[test]
fn header_only_mode_gates_section_data() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, true).expect("open");

    assert!(image.is_header_only());
    assert_eq!(image.phdr_num(), 0);
    assert!(matches!(image.shdr_num(), Err(Error::Mode { .. })));
    assert!(matches!(image.find_shdr_by_type(2), Err(Error::Mode { .. })));
    assert!(matches!(image.dynamic_num(), Err(Error::Mode { .. })));
    assert!(matches!(image.symbol_num(2), Err(Error::Mode { .. })));
    assert!(matches!(
        image.find_dynamic_symbol_address("alpha"),
        Err(Error::Mode { .. })
    ));
}

#[test]
fn phdr_accessors_are_bounds_checked() {
    let bytes = two_segment_image();
    let mut reader = ElfBinary::new("segments.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    assert_eq!(image.phdr_num(), 2);
    let code = image.phdr(0).expect("phdr 0");
    assert_eq!(code.p_vaddr, 0x1000);
    assert_eq!(code.p_filesz, 0x2000);
    assert_eq!(code.p_flags, 5);
    assert!(matches!(image.phdr(5), Err(Error::Index { .. })));

    let load = image.find_phdr_by_type(1).expect("PT_LOAD present");
    assert_eq!(load.p_vaddr, 0x1000);
    assert!(image.find_phdr_by_type(7).is_none()); // no PT_TLS
}

#[test]
fn section_name_strings_resolve() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");

    let names = image.section_name_table().expect("shstrtab");
    assert_eq!(names.sh_type, 3); // SHT_STRTAB
    assert_eq!(image.get_string(names, 0).unwrap(), None);
    assert_eq!(image.get_string(names, 1).unwrap(), Some("hello"));
    assert_eq!(image.get_string(names, 7).unwrap(), Some("world"));
    assert!(matches!(
        image.get_string(names, 0x1000),
        Err(Error::Truncated { .. })
    ));

    // A non-string section is a usage error, not a lookup miss.
    let symtab = image.find_shdr_by_type(2).unwrap().expect(".symtab");
    assert!(matches!(
        image.get_string(symtab, 1),
        Err(Error::Index { .. })
    ));
}

#[test]
fn opens_from_a_real_file() {
    let bytes = two_segment_image();
    let mut path = std::env::temp_dir();
    path.push(format!("elf32-image-parse-{}.elf", std::process::id()));
    std::fs::write(&path, &bytes).expect("write temp file");

    {
        let mut file =
            elf32_image::input::ElfFile::from_path(path.to_str().unwrap()).expect("open file");
        let image = ElfImage::open(&mut file, false, false).expect("open image");
        assert_eq!(image.phdr_num(), 2);
        assert_eq!(image.header().entry_point(), 0x1000);
        assert_eq!(image.len(), bytes.len());
    }
    std::fs::remove_file(&path).ok();
}
