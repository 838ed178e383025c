//! Header block decoding through the public API.

mod common;

use bstr::BStr;
use common::{RawHeader, MAGIC_USTAR};
use proptest::prelude::*;
use tarx::archive::header::{checksum, parse_octal, HeaderBlock, BLOCK_SIZE};
use tarx::archive::{EntryType, TarFormat};
use tarx::owner::{NumericOwners, OwnerLookup};

/// Resolves a single user and group name.
struct FixedOwners;

impl OwnerLookup for FixedOwners {
    fn uid_by_name(&mut self, name: &BStr) -> Option<u32> {
        (name == "builder").then_some(4242)
    }

    fn gid_by_name(&mut self, name: &BStr) -> Option<u32> {
        (name == "staff").then_some(50)
    }
}

#[test]
fn decodes_gnu_file_header() {
    let mut header = RawHeader::file("docs/readme.txt", 1234);
    header.octal(100..108, 0o640).owner("nobody-here", "");
    let block = header.to_block();
    let parsed = HeaderBlock::new(&block);
    assert!(parsed.is_checksum_valid());

    let entry = parsed.decode(&mut NumericOwners);
    assert_eq!(entry.name, "docs/readme.txt");
    assert_eq!(entry.entry_type, EntryType::Regular);
    assert_eq!(entry.format, TarFormat::Gnu);
    assert_eq!(entry.mode, 0o640);
    assert_eq!(entry.size, 1234);
    assert_eq!(entry.uid, 1000);
    assert_eq!(entry.gid, 1000);
    assert_eq!(entry.mtime, 1_700_000_000);
    assert_eq!(entry.user_name, "nobody-here");
    assert!(entry.group_name.is_empty());
}

#[test]
fn mode_field_with_nul_terminator() {
    assert_eq!(parse_octal(b"0000644\0"), 420);
    assert_eq!(parse_octal(b"        "), 0);
}

#[test]
fn ustar_prefix_is_joined() {
    let mut header = RawHeader::file("c.txt", 0);
    header.magic(MAGIC_USTAR).prefix(b"a/b");
    let block = header.to_block();
    let parsed = HeaderBlock::new(&block);
    assert_eq!(parsed.format(), TarFormat::Ustar);
    assert_eq!(parsed.decode(&mut NumericOwners).name, "a/b/c.txt");
}

#[test]
fn full_width_name_has_no_terminator() {
    let name = "n".repeat(100);
    let block = RawHeader::file(&name, 0).to_block();
    assert_eq!(HeaderBlock::new(&block).name(), name.as_str());
}

#[test]
fn names_stop_at_first_nul() {
    let mut header = RawHeader::file("abc", 0);
    header.set(4, b"hidden");
    let block = header.to_block();
    assert_eq!(HeaderBlock::new(&block).name(), "abc");
}

#[test]
fn magic_must_match_exactly() {
    let mut header = RawHeader::file("f", 0);
    header.magic(b"ustar\0xx");
    let block = header.to_block();
    assert_eq!(HeaderBlock::new(&block).format(), TarFormat::Old);

    header.magic(b"ustar 99");
    let block = header.to_block();
    assert_eq!(HeaderBlock::new(&block).format(), TarFormat::Old);

    header.magic(b"ustar  \0");
    let block = header.to_block();
    assert_eq!(HeaderBlock::new(&block).format(), TarFormat::Gnu);
}

#[test]
fn owner_names_override_numeric_ids() {
    let mut header = RawHeader::file("f", 0);
    header.owner("builder", "staff");
    let block = header.to_block();
    let entry = HeaderBlock::new(&block).decode(&mut FixedOwners);
    assert_eq!(entry.uid, 4242);
    assert_eq!(entry.gid, 50);

    let mut header = RawHeader::file("f", 0);
    header.owner("stranger", "");
    let block = header.to_block();
    let entry = HeaderBlock::new(&block).decode(&mut FixedOwners);
    assert_eq!(entry.uid, 1000);
    assert_eq!(entry.gid, 1000);
}

#[test]
fn device_numbers_pack_into_one_value() {
    let mut header = RawHeader::new("dev/sda", b'4');
    header.device(8, 1);
    let block = header.to_block();
    let entry = HeaderBlock::new(&block).decode(&mut NumericOwners);
    assert_eq!(entry.entry_type, EntryType::BlockDevice);
    assert_eq!(entry.device, 0x0801);
}

#[test]
fn zero_block_fails_checksum() {
    let block = [0u8; BLOCK_SIZE];
    let parsed = HeaderBlock::new(&block);
    assert!(!parsed.is_checksum_valid());
    assert!(parsed.name().is_empty());
}

proptest! {
    #[test]
    fn checksum_accepts_only_the_computed_sum(
        bytes in prop::collection::vec(any::<u8>(), BLOCK_SIZE),
        stored in 0u64..0o777777,
        use_real in any::<bool>(),
    ) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&bytes);
        let real = checksum(&block);
        let value = if use_real { real } else { stored };
        block[148..156].copy_from_slice(format!("{value:06o}\0 ").as_bytes());

        let parsed = HeaderBlock::new(&block);
        prop_assert_eq!(parsed.stored_checksum(), value);
        prop_assert_eq!(parsed.is_checksum_valid(), value == real);
    }
}
