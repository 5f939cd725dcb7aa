use lecode_core::lex::sections::{
    Cannon, TrackSettings, VANILLA_CANNONS, decode_cannons, encode_cannons, lookup,
};
use lecode_core::lex::types::{
    CANN_MAGIC, FEAT_MAGIC, HIPT_MAGIC, LexFeatures, LexSections, SET1_MAGIC, TEST_MAGIC,
};
use lecode_core::lex::{LexContainer, LexState};
use lecode_core::FormatError;

const ZZZZ_MAGIC: u32 = u32::from_be_bytes(*b"ZZZZ");

fn record(magic: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = magic.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn container(records: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = records.concat();
    let size = 0x10 + body.len() + 8;
    let mut out = b"LE-X".to_vec();
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(size as u32).to_be_bytes());
    out.extend_from_slice(&0x10u32.to_be_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&[0; 8]);
    out
}

fn decode(bytes: &[u8]) -> LexContainer {
    LexContainer::decode(bytes).unwrap_or_else(|e| panic!("container should decode: {e}"))
}

fn magics(lex: &LexContainer) -> Vec<u32> {
    lex.sorted().map(|e| e.magic).collect()
}

fn fast_track() -> Vec<u8> {
    TrackSettings {
        speed_factor: 1.5,
        ..TrackSettings::default()
    }
    .encode()
}

#[test]
fn empty_container_encodes_header_and_terminator() {
    let lex = LexContainer::new();
    assert_eq!(lex.state(), LexState::Empty);
    assert!(lex.is_empty());

    let bytes = lex.encode();
    assert_eq!(bytes.len(), 0x18);
    assert_eq!(&bytes[..4], b"LE-X");
    assert_eq!(&bytes[0x08..0x0c], &0x18u32.to_be_bytes());
    assert_eq!(&bytes[0x10..], &[0; 8]);

    let back = decode(&bytes);
    assert!(back.is_empty());
    assert_eq!(back, lex);
}

#[test]
fn encode_then_decode_keeps_every_section() {
    let mut lex = LexContainer::new();
    assert!(lex.append(ZZZZ_MAGIC, &[1, 2, 3, 4], false));
    assert!(lex.append(SET1_MAGIC, &fast_track(), false));
    assert!(lex.append(CANN_MAGIC, &encode_cannons(&VANILLA_CANNONS[..1]), false));
    assert_eq!(lex.state(), LexState::Ready);

    let back = decode(&lex.encode());
    assert_eq!(back, lex);
    assert!(back.warnings().is_empty());
    assert_eq!(
        back.have_sections(),
        LexSections::SET1 | LexSections::CANN | LexSections::UNKNOWN
    );
    assert_eq!(
        back.have_features(),
        LexFeatures::SPEED_FACTOR | LexFeatures::CANNON
    );
}

#[test]
fn sections_are_written_by_priority_then_insertion() {
    let mut lex = LexContainer::new();
    lex.append(ZZZZ_MAGIC, &[0; 4], false);
    lex.append(TEST_MAGIC, &[1; 8], false);
    lex.append(CANN_MAGIC, &encode_cannons(&VANILLA_CANNONS), false);
    lex.append(u32::from_be_bytes(*b"AAAA"), &[0; 4], false);
    lex.append(FEAT_MAGIC, &[], false);

    assert_eq!(
        magics(&lex),
        vec![
            FEAT_MAGIC,
            CANN_MAGIC,
            TEST_MAGIC,
            ZZZZ_MAGIC,
            u32::from_be_bytes(*b"AAAA"),
        ]
    );
}

#[test]
fn known_payloads_are_padded_and_fixed_up() {
    let mut lex = LexContainer::new();

    let mut broken = fast_track();
    broken[..4].copy_from_slice(&f32::NAN.to_be_bytes());
    broken[4..8].copy_from_slice(&(-2.0f32).to_be_bytes());
    lex.append(SET1_MAGIC, &broken[..0x10], false);

    let set1 = lex.get(SET1_MAGIC).unwrap();
    assert_eq!(set1.payload.len(), 0x14);
    let settings = TrackSettings::decode(&set1.payload);
    assert_eq!(settings.item_factor, [1.0, 1.0, 1.0]);
    // The missing speed factor was zero-filled, then repaired.
    assert_eq!(settings.speed_factor, 1.0);

    // Unknown sections are only padded to a multiple of 4.
    lex.append(ZZZZ_MAGIC, &[9; 5], false);
    assert_eq!(lex.get(ZZZZ_MAGIC).unwrap().payload, vec![9, 9, 9, 9, 9, 0, 0, 0]);
}

#[test]
fn counted_tables_are_clamped_to_their_payload() {
    let mut payload = encode_cannons(&VANILLA_CANNONS[..2]);
    payload[..4].copy_from_slice(&7u32.to_be_bytes());
    payload.extend_from_slice(&[0; 6]);

    let mut lex = LexContainer::new();
    lex.append(CANN_MAGIC, &payload, false);
    let cannons = decode_cannons(&lex.get(CANN_MAGIC).unwrap().payload);
    assert_eq!(cannons, VANILLA_CANNONS[..2].to_vec());
    assert_eq!(lex.get(CANN_MAGIC).unwrap().payload.len(), 4 + 2 * 0x10);

    let mut hipt = 3u32.to_be_bytes().to_vec();
    hipt.extend_from_slice(&[1; 8]);
    lex.append(HIPT_MAGIC, &hipt, false);
    assert_eq!(lex.get(HIPT_MAGIC).unwrap().payload[..4], 1u32.to_be_bytes());
    assert!(lex.have_features().contains(LexFeatures::HIDE_POSITION));
}

#[test]
fn append_respects_overwrite() {
    let mut lex = LexContainer::new();
    assert!(lex.append(TEST_MAGIC, &[1; 8], false));
    assert!(!lex.append(TEST_MAGIC, &[2; 8], false));
    assert_eq!(lex.get(TEST_MAGIC).unwrap().payload, vec![1; 8]);

    assert!(lex.append(TEST_MAGIC, &[3; 8], true));
    assert_eq!(lex.get(TEST_MAGIC).unwrap().payload, vec![3; 8]);
    assert_eq!(lex.sorted().count(), 1);

    assert!(!lex.append(0, &[0; 4], true));
}

#[test]
fn remove_updates_the_section_set() {
    let mut lex = LexContainer::new();
    lex.append(SET1_MAGIC, &fast_track(), false);
    lex.append(TEST_MAGIC, &[1; 8], false);

    assert!(lex.remove(SET1_MAGIC));
    assert!(!lex.remove(SET1_MAGIC));
    assert_eq!(lex.have_sections(), LexSections::TEST);
    assert_eq!(lex.have_features(), LexFeatures::TEST);
}

#[test]
fn purge_drops_defaults_and_unknown_sections() {
    let mut lex = LexContainer::new();
    lex.append(FEAT_MAGIC, &[], false);
    lex.append(SET1_MAGIC, &TrackSettings::default().encode(), false);
    lex.append(CANN_MAGIC, &encode_cannons(&VANILLA_CANNONS), false);
    lex.append(HIPT_MAGIC, &[0; 4], false);
    lex.append(TEST_MAGIC, &[0; 8], false);
    lex.append(ZZZZ_MAGIC, &[5; 4], false);

    lex.purge();
    assert!(lex.is_empty());
    assert!(lex.have_sections().is_empty());
}

#[test]
fn purge_keeps_live_sections_and_refreshes_features() {
    let custom = [Cannon::new(800.0, 100.0, 5000.0, -1.0)];
    let mut lex = LexContainer::new();
    lex.append(FEAT_MAGIC, &[], false);
    lex.append(SET1_MAGIC, &fast_track(), false);
    lex.append(CANN_MAGIC, &encode_cannons(&custom), false);
    lex.append(TEST_MAGIC, &[0; 8], false);

    lex.purge();
    assert_eq!(magics(&lex), vec![FEAT_MAGIC, SET1_MAGIC, CANN_MAGIC]);

    let mask = &lex.get(FEAT_MAGIC).unwrap().payload[..4];
    let expected = (LexFeatures::SPEED_FACTOR | LexFeatures::CANNON).bits();
    assert_eq!(mask, &expected.to_be_bytes());

    let once = lex.clone();
    lex.purge();
    assert_eq!(lex, once);
}

#[test]
fn decode_reports_overruns_and_duplicates() {
    let mut bytes = container(&[
        record(b"TEST", &[1; 8]),
        record(b"TEST", &[2; 8]),
        record(b"ZZZZ", &[0; 4]),
    ]);
    let lex = decode(&bytes);
    assert_eq!(lex.get(TEST_MAGIC).unwrap().payload, vec![1; 8]);
    assert_eq!(lex.warnings().len(), 1);
    assert!(lex.warnings()[0].message.contains("duplicate"));
    assert!(lex.get(ZZZZ_MAGIC).is_some());

    // Claim 0x100 bytes for the last record.
    let last = 0x10 + 2 * 0x10;
    bytes[last + 4..last + 8].copy_from_slice(&0x100u32.to_be_bytes());
    let lex = decode(&bytes);
    assert!(lex.get(ZZZZ_MAGIC).is_none());
    assert!(
        lex.warnings()
            .iter()
            .any(|w| w.offset == last && w.message.contains("ZZZZ"))
    );
}

#[test]
fn misaligned_record_is_fatal() {
    let mut bytes = container(&[record(b"TEST", &[1; 8])]);
    bytes[0x14..0x18].copy_from_slice(&6u32.to_be_bytes());
    assert!(matches!(
        LexContainer::decode(&bytes),
        Err(FormatError::Misaligned {
            offset: 0x14,
            size: 6,
            ..
        })
    ));
}

#[test]
fn header_failures_are_fatal() {
    let good = container(&[]);

    assert!(matches!(
        LexContainer::decode(&good[..0x0c]),
        Err(FormatError::TruncatedBuffer { .. })
    ));

    let mut bad_magic = good.clone();
    bad_magic[..4].copy_from_slice(b"LE-Y");
    assert!(matches!(
        LexContainer::decode(&bad_magic),
        Err(FormatError::InvalidMagic { offset: 0, .. })
    ));

    let mut bad_major = good.clone();
    bad_major[0x04..0x06].copy_from_slice(&2u16.to_be_bytes());
    assert!(matches!(
        LexContainer::decode(&bad_major),
        Err(FormatError::InvalidVersion { version: 2, .. })
    ));

    let mut bad_size = good.clone();
    bad_size[0x08..0x0c].copy_from_slice(&0x40u32.to_be_bytes());
    assert!(matches!(
        LexContainer::decode(&bad_size),
        Err(FormatError::TruncatedBuffer { .. })
    ));

    let mut bad_offset = good.clone();
    bad_offset[0x0c..0x10].copy_from_slice(&0x08u32.to_be_bytes());
    assert!(matches!(
        LexContainer::decode(&bad_offset),
        Err(FormatError::OffsetOutOfRange { .. })
    ));
}

#[test]
fn newer_minor_versions_are_accepted() {
    let mut bytes = container(&[record(b"TEST", &[1; 8])]);
    bytes[0x06..0x08].copy_from_slice(&9u16.to_be_bytes());
    let lex = decode(&bytes);
    assert_eq!(lex.version(), (1, 9));
    assert_eq!(lex.encode()[0x06..0x08], 9u16.to_be_bytes());
}

#[test]
fn unknown_sections_survive_without_warnings() {
    let bytes = container(&[record(b"ZZZZ", &[7; 12])]);
    let lex = decode(&bytes);
    assert!(lex.warnings().is_empty());

    let element = lex.get(ZZZZ_MAGIC).unwrap();
    assert!(!element.is_known());
    assert_eq!(element.name(), "ZZZZ");
    assert_eq!(lex.encode(), bytes);
}

#[test]
fn section_table_is_consistent() {
    for magic in [FEAT_MAGIC, SET1_MAGIC, CANN_MAGIC, HIPT_MAGIC, TEST_MAGIC] {
        let section = lookup(magic).unwrap();
        assert_eq!(section.magic(), magic);
        let default = section.default_payload();
        assert!(default.len() >= section.min_size());
        assert!(section.is_default(&default));
        assert!(section.features(&default).is_empty());
    }
    assert!(lookup(ZZZZ_MAGIC).is_none());
}
