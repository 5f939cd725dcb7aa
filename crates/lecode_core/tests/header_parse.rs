use lecode_core::FormatError;
use lecode_core::TOOL_VERSION;
use lecode_core::lecode::header::{HeaderDescriptor, HeaderLayout, SignatureRef, V5Layout};
use lecode_core::lecode::template::Template;
use lecode_core::lecode::types::{BuildMode, Region};

fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn parse(bytes: &[u8]) -> HeaderDescriptor {
    HeaderDescriptor::parse(bytes).unwrap_or_else(|e| panic!("header should parse: {e}"))
}

#[test]
fn v5_signature_header_from_template() {
    let template = Template::new(Region::Pal);
    let bytes = template.build();
    let header = parse(&bytes);

    assert_eq!(header.version, 5);
    assert_eq!(header.layout, HeaderLayout::V5(V5Layout::Signature));
    assert_eq!(header.header_size, 0x44);
    assert_eq!(header.region, Region::Pal);
    assert_eq!(header.build_mode, BuildMode::Release);
    assert_eq!(header.param_offset, 0x100);
    assert_eq!(header.file_size as usize, bytes.len());
    assert_eq!(header.creation_time, template.creation_time);
    assert_eq!(header.commit_time, template.creation_time);
    assert_eq!(header.signature, None);
    assert!(header.timestamp.is_none());
    assert!(header.has_edit_stamp());
}

#[test]
fn v3_header_has_only_the_generic_prefix() {
    let bytes = Template {
        version: 3,
        ..Template::new(Region::Usa)
    }
    .build();
    let header = parse(&bytes);

    assert_eq!(header.layout, HeaderLayout::V3);
    assert_eq!(header.header_size, 0x20);
    assert_eq!(header.region, Region::Usa);
    assert_eq!(header.szs_required, 0);
    assert_eq!(header.creation_time, 0);
    assert!(header.timestamp.is_none());
    assert!(!header.has_edit_stamp());
}

#[test]
fn v4_header_reads_build_timestamp() {
    let bytes = Template {
        version: 4,
        ..Template::new(Region::Japan)
    }
    .build();
    let header = parse(&bytes);

    assert_eq!(header.layout, HeaderLayout::V4);
    assert_eq!(header.header_size, 0x40);
    assert_eq!(header.timestamp.as_deref(), Some("2023-06-01 12:00:00"));
    assert!(!header.has_edit_stamp());
}

#[test]
fn v5_head_size_0x38_selects_recommended_layout() {
    let bytes = Template {
        v5_layout: V5Layout::Recommended,
        szs_recommended: 20_304,
        ..Template::new(Region::Pal)
    }
    .build();
    let header = parse(&bytes);

    assert_eq!(header.layout, HeaderLayout::V5(V5Layout::Recommended));
    assert_eq!(header.header_size, 0x38);
    assert_eq!(header.szs_recommended, 20_304);
    assert_eq!(header.commit_time, 0);
    assert_eq!(header.signature, None);
}

#[test]
fn v5_head_size_between_steps_picks_the_largest_fitting_layout() {
    let mut bytes = Template::new(Region::Pal).build();
    put_u32(&mut bytes, 0x28, 0x3e);
    let header = parse(&bytes);

    assert_eq!(header.layout, HeaderLayout::V5(V5Layout::Commit));
    assert_eq!(header.header_size, 0x3e);
    assert_eq!(header.signature, None);
}

#[test]
fn v5_signature_reference_is_reported() {
    let mut bytes = Template::new(Region::Pal).build();
    put_u32(&mut bytes, 0x3c, 0x80);
    put_u32(&mut bytes, 0x40, 0x40);
    let header = parse(&bytes);

    assert_eq!(
        header.signature,
        Some(SignatureRef {
            offset: 0x80,
            size: 0x40
        })
    );
}

#[test]
fn v5_head_size_below_base_is_rejected() {
    let mut bytes = Template::new(Region::Pal).build();
    put_u32(&mut bytes, 0x28, 0x30);

    let err = HeaderDescriptor::parse(&bytes).expect_err("head_size 0x30 must fail");
    assert!(matches!(
        err,
        FormatError::UnsupportedLayout {
            offset: 0x28,
            size: 0x30,
            ..
        }
    ));
}

#[test]
fn v5_head_size_beyond_buffer_is_truncated() {
    let mut bytes = Template::new(Region::Pal).build();
    let len = bytes.len() as u32;
    put_u32(&mut bytes, 0x28, len + 4);

    let err = HeaderDescriptor::parse(&bytes).expect_err("head_size past the end must fail");
    assert!(matches!(err, FormatError::TruncatedBuffer { .. }));
}

#[test]
fn future_version_keeps_generic_fields() {
    let bytes = Template {
        version: 6,
        ..Template::new(Region::Korea)
    }
    .build();
    let header = parse(&bytes);

    assert_eq!(header.layout, HeaderLayout::Future(6));
    assert_eq!(header.header_size, 0x20);
    assert_eq!(header.region, Region::Korea);
    assert_eq!(header.param_offset, 0x100);
}

#[test]
fn structural_failures_are_errors() {
    let good = Template::new(Region::Pal).build();

    let err = HeaderDescriptor::parse(&good[..0x1f]).expect_err("short buffer");
    assert!(matches!(err, FormatError::TruncatedBuffer { needed: 0x20, .. }));

    let mut bad_magic = good.clone();
    bad_magic[..4].copy_from_slice(b"LE-C");
    let err = HeaderDescriptor::parse(&bad_magic).expect_err("bad magic");
    assert!(matches!(err, FormatError::InvalidMagic { offset: 0, .. }));

    let mut old = good.clone();
    put_u32(&mut old, 0x04, 2);
    let err = HeaderDescriptor::parse(&old).expect_err("version 2");
    assert!(matches!(err, FormatError::InvalidVersion { version: 2, .. }));

    let mut oversized = good.clone();
    let len = oversized.len() as u32;
    put_u32(&mut oversized, 0x14, len + 1);
    let err = HeaderDescriptor::parse(&oversized).expect_err("file_size past the end");
    assert!(matches!(err, FormatError::TruncatedBuffer { offset: 0x14, .. }));
}

#[test]
fn errors_render_the_failing_offset() {
    let mut bytes = Template::new(Region::Pal).build();
    bytes[..4].copy_from_slice(b"XXXX");
    let err = HeaderDescriptor::parse(&bytes).expect_err("bad magic");
    let text = err.to_string();
    assert!(text.contains("0x0"), "{text}");
    assert!(text.contains("LE-B"), "{text}");
}

#[test]
fn compatibility_compares_required_version() {
    let current = parse(&Template::new(Region::Pal).build());
    assert!(current.is_compatible(TOOL_VERSION));

    let newer = parse(
        &Template {
            szs_required: TOOL_VERSION + 1,
            ..Template::new(Region::Pal)
        }
        .build(),
    );
    assert_eq!(newer.szs_required, TOOL_VERSION + 1);
    assert!(!newer.is_compatible(TOOL_VERSION));
    assert!(newer.is_compatible(TOOL_VERSION + 1));
}

#[test]
fn region_and_build_mode_codes_round_trip() {
    for region in [Region::Pal, Region::Usa, Region::Japan, Region::Korea] {
        let header = parse(&Template::new(region).build());
        assert_eq!(header.region, region);
    }

    let bytes = Template {
        build_mode: BuildMode::DebugTest,
        ..Template::new(Region::Pal)
    }
    .build();
    assert_eq!(parse(&bytes).build_mode, BuildMode::DebugTest);

    assert_eq!(Region::from_raw(b'X'), Region::Unknown(b'X'));
    assert_eq!(BuildMode::from_raw(9).to_string(), "unknown (9)");
    assert_eq!(Region::Usa.to_string(), "USA");
}
