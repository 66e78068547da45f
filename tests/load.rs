//! Segment loading: geometry validation, placement, and the runtime view.

mod common;

use common::*;
use elf32_image::{ElfImage, Error, input::ElfBinary};

#[test]
fn loaded_size_spans_all_segments() {
    let bytes = two_segment_image();
    let mut reader = ElfBinary::new("segments.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");
    // 0x1000..0x5000: code page through the end of the data segment.
    assert_eq!(image.loaded_size(), 0x4000);
}

#[test]
fn loaded_size_is_zero_without_load_segments() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let image = ElfImage::open(&mut reader, false, false).expect("open");
    assert_eq!(image.loaded_size(), 0);
}

#[test]
fn load_places_segments_at_their_addresses() {
    let bytes = two_segment_image();
    let mut reader = ElfBinary::new("segments.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    image.load(true).expect("load");
    assert!(image.is_loaded());
    assert_eq!(image.len(), image.loaded_size());
    assert_eq!(image.end() as usize - image.begin() as usize, 0x4000);

    unsafe {
        // The base points at the lowest segment: the first code byte.
        assert_eq!(*image.begin(), 0xAA);
        // The data segment sits 0x3000 above it (vaddr 0x4000 - 0x1000).
        assert_eq!(*image.begin().add(0x3000), 0xBB);
        // Past the data segment's file bytes, memory is zero-filled.
        assert_eq!(*image.begin().add(0x3900), 0x00);
    }
}

#[test]
fn load_is_a_single_shot() {
    let bytes = two_segment_image();
    let mut reader = ElfBinary::new("segments.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    image.load(false).expect("first load");
    let err = image.load(false).unwrap_err();
    assert!(matches!(err, Error::Load { .. }), "{err}");
}

#[test]
fn load_from_a_real_file() {
    let bytes = two_segment_image();
    let mut path = std::env::temp_dir();
    path.push(format!("elf32-image-load-{}.elf", std::process::id()));
    std::fs::write(&path, &bytes).expect("write temp file");

    {
        let mut file =
            elf32_image::input::ElfFile::from_path(path.to_str().unwrap()).expect("open file");
        let mut image = ElfImage::open(&mut file, false, false).expect("open image");
        image.load(false).expect("load");
        unsafe {
            assert_eq!(*image.begin(), 0xAA);
            assert_eq!(*image.begin().add(0x3000), 0xBB);
            assert_eq!(*image.begin().add(0x3900), 0x00);
        }
    }
    std::fs::remove_file(&path).ok();
}

#[test]
fn header_only_load_exposes_dynamic_tables() {
    let bytes = runtime_dynamic_image();
    let mut reader = ElfBinary::new("runtime.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, true).expect("open");

    // Nothing section-level is reachable before the segments exist.
    assert!(matches!(
        image.find_dynamic_symbol_address("beta"),
        Err(Error::Mode { .. })
    ));

    image.load(false).expect("load");

    // Four written entries plus the DT_NULL terminator.
    assert_eq!(image.dynamic_num().unwrap(), 5);
    assert_eq!(image.find_dynamic_value_by_type(4).unwrap(), Some(0x1180)); // DT_HASH

    // Symbol addresses come back biased into the loaded region, which
    // starts at the segment page (vaddr 0x1000).
    for (name, vaddr) in [("alpha", 0x1111usize), ("beta", 0x1222), ("gamma", 0x1333)] {
        let addr = image.find_dynamic_symbol_address(name).unwrap();
        let expected = unsafe { image.begin().add(vaddr - 0x1000) };
        assert_eq!(addr, Some(expected as *const u8), "{name}");
    }
    assert_eq!(image.find_dynamic_symbol_address("delta").unwrap(), None);

    // Section headers were never mapped; that part of the mode holds.
    assert!(matches!(image.shdr_num(), Err(Error::Mode { .. })));
}

#[test]
fn rejects_file_size_exceeding_memory_size() {
    let mut bytes = two_segment_image();
    // Code segment: p_filesz (offset 16 into the phdr) grows past p_memsz.
    put_u32(&mut bytes, EHDR_SIZE + 16, 0x3000);
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    let err = image.load(false).unwrap_err();
    assert!(matches!(err, Error::Load { .. }), "{err}");
    assert!(!image.is_loaded());
}

#[test]
fn rejects_segment_file_range_past_eof() {
    let mut bytes = two_segment_image();
    // Data segment: p_offset walks off the end of the file.
    put_u32(&mut bytes, EHDR_SIZE + PHDR_SIZE + 4, 0x3800);
    put_u32(&mut bytes, EHDR_SIZE + PHDR_SIZE + 16, 0x1000);
    put_u32(&mut bytes, EHDR_SIZE + PHDR_SIZE + 20, 0x1000);
    let mut reader = ElfBinary::new("bad.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    let err = image.load(false).unwrap_err();
    assert!(matches!(err, Error::Load { .. }), "{err}");
}

#[test]
fn rejects_images_with_nothing_to_load() {
    let bytes = sectioned_image();
    let mut reader = ElfBinary::new("sectioned.elf", &bytes);
    let mut image = ElfImage::open(&mut reader, false, false).expect("open");

    let err = image.load(false).unwrap_err();
    assert!(matches!(err, Error::Load { .. }), "{err}");
    // The image is still usable for inspection after a refused load.
    assert_eq!(image.shdr_num().unwrap(), 9);
}
