use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use lecode_core::core_api::{
    CapabilityIssue, CompareAxis, CoreErrorCode, Engine, FileKind, Snapshot, UsageCount,
    compare_binaries,
};
use lecode_core::lecode::settings::{LparLayout, Settings};
use lecode_core::lecode::slots::UsageKind;
use lecode_core::lecode::template::{Template, default_binary};
use lecode_core::lecode::types::{Region, SlotFlags};
use lecode_core::lex::sections::TrackSettings;
use lecode_core::lex::types::{LexFeatures, SET1_MAGIC};
use lecode_core::{LexContainer, TOOL_VERSION, ToolConfig};

fn engine() -> Engine {
    Engine::with_config(ToolConfig::default().with_timestamp(1_700_000_000))
}

fn temp_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "lecode_core_{}_{}_{}.bin",
        prefix,
        std::process::id(),
        nanos
    ))
}

fn lex_bytes() -> Vec<u8> {
    let mut lex = LexContainer::new();
    let fast = TrackSettings {
        speed_factor: 1.2,
        ..TrackSettings::default()
    };
    lex.append(SET1_MAGIC, &fast.encode(), false);
    lex.encode()
}

#[test]
fn engine_auto_detects_lecode() {
    let session = engine()
        .open_bytes(default_binary(Region::Pal), None)
        .expect("failed to open reference binary");

    assert_eq!(session.kind(), FileKind::LeCode);
    let Snapshot::LeCode(snapshot) = session.snapshot() else {
        panic!("expected an LE-CODE snapshot");
    };
    assert!(snapshot.compatible);
    assert_eq!(snapshot.param_size, 0x276);
    assert_eq!(snapshot.lpar_layout, Some(LparLayout::TimeLimit));
    assert_eq!(snapshot.n_slot, 0x44);
    assert_eq!(snapshot.max_slot, 0x44);
    assert_eq!(snapshot.n_cup_track, 8);
    assert_eq!(snapshot.n_cup_arena, 2);
    assert_eq!(snapshot.flags_bits, 16);
    assert!(snapshot.usage.contains(&UsageCount {
        kind: UsageKind::Track,
        count: 32
    }));
    assert!(snapshot.warnings.is_empty());

    let caps = session.capabilities();
    assert!(caps.can_query);
    assert!(caps.can_plan_edits);
    assert!(caps.can_apply_edits);
    assert!(caps.issues.is_empty());
    assert!(session.lex().is_none());
}

#[test]
fn engine_auto_detects_lex() {
    let session = engine()
        .open_bytes(lex_bytes(), None)
        .expect("failed to open LEX container");

    assert_eq!(session.kind(), FileKind::Lex);
    let Snapshot::Lex(snapshot) = session.snapshot() else {
        panic!("expected a LEX snapshot");
    };
    assert_eq!((snapshot.major, snapshot.minor), (1, 1));
    assert_eq!(snapshot.sections.len(), 1);
    assert_eq!(snapshot.sections[0].magic, "SET1");
    assert!(snapshot.sections[0].known);
    assert_eq!(snapshot.features, LexFeatures::SPEED_FACTOR.bits());
    assert!(session.document().is_none());
}

#[test]
fn unreadable_input_is_a_parse_error() {
    let err = engine()
        .open_bytes(vec![0u8; 0x40], None)
        .expect_err("zeroes are neither format");
    assert_eq!(err.code, CoreErrorCode::Parse);
    assert!(err.message.contains("LE-CODE"));
    assert!(err.message.contains("LEX"));

    let err = engine()
        .open_bytes(lex_bytes(), Some(FileKind::LeCode))
        .expect_err("a LEX file is not an LE-CODE binary");
    assert_eq!(err.code, CoreErrorCode::Parse);
}

#[test]
fn open_path_reads_files_and_reports_io_errors() {
    let path = temp_path("open");
    fs::write(&path, default_binary(Region::Usa)).expect("failed to write fixture");
    let session = engine()
        .open_path(&path, None)
        .expect("failed to open fixture");
    assert_eq!(session.document().map(|d| d.header.region), Some(Region::Usa));
    fs::remove_file(&path).expect("failed to remove fixture");

    let err = engine()
        .open_path(&path, None)
        .expect_err("removed file must not open");
    assert_eq!(err.code, CoreErrorCode::Io);
}

#[test]
fn newer_binaries_are_read_only() {
    let bytes = Template {
        szs_required: TOOL_VERSION + 1,
        ..Template::new(Region::Pal)
    }
    .build();
    let mut session = engine().open_bytes(bytes, None).unwrap();

    let caps = session.capabilities();
    assert!(caps.can_query);
    assert!(!caps.can_apply_edits);
    assert_eq!(caps.issues, vec![CapabilityIssue::NewerToolRequired]);

    let err = session
        .set_settings(Settings::recommended())
        .expect_err("read-only session");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);
    assert!(session.settings().is_ok());
}

#[test]
fn future_headers_are_read_only() {
    let bytes = Template {
        version: 6,
        ..Template::new(Region::Pal)
    }
    .build();
    let mut session = engine().open_bytes(bytes, None).unwrap();

    assert!(
        session
            .capabilities()
            .issues
            .contains(&CapabilityIssue::FutureHeader)
    );
    let err = session.recompute_flags().expect_err("read-only session");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);
}

#[test]
fn soft_issues_keep_the_session_editable() {
    let bytes = Template {
        param_size: 0x30,
        ..Template::new(Region::Pal)
    }
    .build();
    let session = engine().open_bytes(bytes, None).unwrap();
    let caps = session.capabilities();
    assert!(caps.can_apply_edits);
    assert_eq!(caps.issues, vec![CapabilityIssue::SettingsAbsent]);
    assert_eq!(session.snapshot().warnings().len(), 1);
}

#[test]
fn set_settings_normalizes_and_persists() {
    let mut session = engine().open_default(Region::Pal).unwrap();
    let settings = Settings {
        engine: [50, 50, 50],
        block_track: 200,
        perfmon: 9,
        ..Settings::recommended()
    };
    session.set_settings(settings).unwrap();

    let stored = session.settings().unwrap();
    assert_eq!(stored.engine_sum(), 100);
    assert_eq!(stored.block_track, 50);
    assert_eq!(stored.perfmon, 2);

    let bytes = session.to_bytes_modified().unwrap();
    let reopened = engine().open_bytes(&bytes, None).unwrap();
    assert_eq!(reopened.settings().unwrap(), session.settings().unwrap());
    assert_eq!(
        reopened.document().unwrap().header.edit_time,
        1_700_000_000
    );
    assert_eq!(session.to_bytes_unmodified(), default_binary(Region::Pal));
}

#[test]
fn slot_and_cup_edits_are_validated() {
    let mut session = engine().open_default(Region::Pal).unwrap();

    session
        .set_slot(0x2b, 0x21, 0x90, SlotFlags::HIDDEN)
        .unwrap();
    let slots = session.slots().unwrap();
    assert_eq!(slots.property()[0x2b], 0x21);
    assert_eq!(slots.music()[0x2b], 0x90);
    assert_eq!(slots.slot_flags(0x2b), SlotFlags::HIDDEN);
    assert_eq!(session.usage_table().unwrap()[0x2b].kind, UsageKind::Track);

    let err = session
        .set_slot(0x44, 0, 0, SlotFlags::empty())
        .expect_err("slot past the table");
    assert_eq!(err.code, CoreErrorCode::InvalidInput);

    let err = session
        .set_cups(vec![0, 1, 2, 0x44], Vec::new())
        .expect_err("cup entry past the slot table");
    assert_eq!(err.code, CoreErrorCode::InvalidInput);

    session
        .set_cups((0..28).collect(), (0x20..0x2a).collect())
        .unwrap();
    let Snapshot::LeCode(snapshot) = session.snapshot() else {
        panic!("expected an LE-CODE snapshot");
    };
    assert_eq!(snapshot.n_cup_track, 7);
    assert_eq!(snapshot.n_cup_arena, 2);

    let bytes = session.to_bytes_modified().unwrap();
    let reopened = engine().open_bytes(bytes, None).unwrap();
    assert_eq!(reopened.slots().unwrap().n_cup_track(), 7);
    assert_eq!(reopened.slots().unwrap().music()[0x2b], 0x90);
}

#[test]
fn operations_check_the_session_kind() {
    let mut lecode = engine().open_default(Region::Pal).unwrap();
    let err = lecode
        .lex_append(SET1_MAGIC, &[0; 0x14], false)
        .expect_err("LE-CODE session");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);
    assert_eq!(
        lecode.lex_purge().unwrap_err().code,
        CoreErrorCode::UnsupportedOperation
    );

    let mut lex = engine().new_lex();
    assert_eq!(
        lex.settings().unwrap_err().code,
        CoreErrorCode::UnsupportedOperation
    );
    assert_eq!(
        lex.compare_with_default(&CompareAxis::ALL).unwrap_err().code,
        CoreErrorCode::UnsupportedOperation
    );
    assert_eq!(
        lex.lex_append(0, &[], false).unwrap_err().code,
        CoreErrorCode::InvalidInput
    );
}

#[test]
fn lex_sessions_edit_and_serialize() {
    let mut session = engine().new_lex();
    assert!(session.to_bytes_unmodified().is_empty());

    let fast = TrackSettings {
        start_pos: 1,
        ..TrackSettings::default()
    };
    assert!(session.lex_append(SET1_MAGIC, &fast.encode(), false).unwrap());
    assert!(!session.lex_append(SET1_MAGIC, &[0; 0x14], false).unwrap());

    let bytes = session.to_bytes_modified().unwrap();
    let reopened = engine().open_bytes(&bytes, None).unwrap();
    let Snapshot::Lex(snapshot) = reopened.snapshot() else {
        panic!("expected a LEX snapshot");
    };
    assert_eq!(snapshot.features, LexFeatures::START_POS.bits());

    assert!(session.lex_remove(SET1_MAGIC).unwrap());
    session.lex_purge().unwrap();
    assert!(session.lex().unwrap().is_empty());
}

#[test]
fn reference_binary_compares_equal_to_itself() {
    let session = engine().open_default(Region::Japan).unwrap();
    let comparison = session.compare_with_default(&CompareAxis::ALL).unwrap();
    assert!(comparison.is_equal());
    assert_eq!(comparison.results.len(), CompareAxis::ALL.len());
}

#[test]
fn edits_show_up_on_the_affected_axes() {
    let mut session = engine().open_default(Region::Pal).unwrap();
    let mut settings = session.settings().unwrap().clone();
    settings.speedometer = 1;
    session.set_settings(settings).unwrap();

    let comparison = session
        .compare_with(&default_binary(Region::Pal), &CompareAxis::ALL)
        .unwrap();
    let differences: Vec<CompareAxis> = comparison.differences().collect();
    assert_eq!(
        differences,
        vec![CompareAxis::Timestamp, CompareAxis::Body, CompareAxis::Params]
    );
    assert_eq!(comparison.get(CompareAxis::Header), Some(true));
    assert_eq!(comparison.get(CompareAxis::CupData), Some(true));

    // The unmodified bytes still match the reference.
    assert!(
        session
            .compare_with_default(&CompareAxis::ALL)
            .unwrap()
            .is_equal()
    );
}

#[test]
fn regions_differ_only_in_the_header() {
    let pal = default_binary(Region::Pal);
    let usa = default_binary(Region::Usa);
    let comparison = compare_binaries(
        &pal,
        &usa,
        &[
            CompareAxis::Size,
            CompareAxis::Header,
            CompareAxis::Params,
            CompareAxis::CupData,
            CompareAxis::Code,
        ],
    )
    .unwrap();
    let differences: Vec<CompareAxis> = comparison.differences().collect();
    assert_eq!(differences, vec![CompareAxis::Header]);

    let err = compare_binaries(&pal, &lex_bytes(), &[CompareAxis::Size]).unwrap_err();
    assert_eq!(err.code, CoreErrorCode::Parse);
}

#[test]
fn axis_names_round_trip() {
    for axis in CompareAxis::ALL {
        assert_eq!(CompareAxis::from_name(axis.as_str()), Some(axis));
    }
    assert_eq!(CompareAxis::from_name("cup-data"), Some(CompareAxis::CupData));
    assert_eq!(CompareAxis::from_name("everything"), None);
}

#[test]
fn snapshots_serialize_to_json() {
    let session = engine().open_default(Region::Korea).unwrap();
    let value = serde_json::to_value(session.snapshot()).expect("snapshot serializes");
    assert_eq!(value["LeCode"]["n_slot"], 0x44);
    assert_eq!(value["LeCode"]["header"]["region"], "Korea");
}

#[test]
fn settings_survive_a_json_round_trip() {
    let mut settings = Settings::recommended();
    settings.chat_mode_1[90] = 0x3a;
    settings.chat_mode_2[0] = 0x11;
    settings.debug[3].hide_speedo = true;

    let text = serde_json::to_string(&settings).unwrap();
    let back: Settings = serde_json::from_str(&text).unwrap();
    assert_eq!(back, settings);

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["chat_mode_1"].as_array().map(Vec::len), Some(96));
}
