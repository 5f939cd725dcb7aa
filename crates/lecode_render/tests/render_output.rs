use lecode_core::LexContainer;
use lecode_core::TOOL_VERSION;
use lecode_core::core_api::{Engine, Session};
use lecode_core::lecode::settings::Settings;
use lecode_core::lecode::template::{Template, default_slots};
use lecode_core::lecode::types::Region;
use lecode_core::lex::sections::{Cannon, TrackSettings, encode_cannons};
use lecode_core::lex::types::{CANN_MAGIC, SET1_MAGIC};
use lecode_render::{
    JsonStyle, TextRenderOptions, TextStyle, render_json_full, render_lex_text,
    render_lpar_text, render_text, render_text_with_options, render_usage_table,
};
use serde_json::{Value, json};

fn default_session() -> Session {
    Engine::new()
        .open_default(Region::Pal)
        .expect("reference binary should open")
}

fn sample_lex() -> LexContainer {
    let mut lex = LexContainer::new();
    let fast = TrackSettings {
        speed_factor: 1.25,
        ..TrackSettings::default()
    };
    lex.append(SET1_MAGIC, &fast.encode(), false);
    lex.append(
        CANN_MAGIC,
        &encode_cannons(&[Cannon::new(800.0, 100.0, 5000.0, -1.0)]),
        false,
    );
    lex
}

fn keys(value: &Value) -> Vec<&str> {
    value
        .as_object()
        .expect("json should be an object")
        .keys()
        .map(String::as_str)
        .collect()
}

#[test]
fn lpar_text_uses_crlf_and_keyword_order() {
    let text = render_lpar_text(&Settings::recommended());

    assert!(text.ends_with("\r\n"));
    assert!(!text.replace("\r\n", "").contains('\n'));

    let lines: Vec<&str> = text.split("\r\n").collect();
    assert_eq!(
        &lines[..5],
        &[
            "[LECODE-PARAMETERS]",
            "ENGINE = 10,60,30",
            "ENABLE-200CC = 0",
            "PERF-MONITOR = 0",
            "CUSTOM-TT = 0",
        ]
    );
    assert!(text.contains("\r\nTHCLOUD-TIME = 4500\r\n"));
    assert!(text.contains("\r\nTIME-LIMIT-MODE = 0\r\n"));

    let position = |needle: &str| {
        text.find(needle)
            .unwrap_or_else(|| panic!("{needle} missing from:\n{text}"))
    };
    assert!(position("[DEBUG-1]") < position("[DEBUG-4]"));
    assert!(position("[DEBUG-4]") < position("[CHAT-MODE-1]"));
    assert!(position("[CHAT-MODE-1]") < position("[CHAT-MODE-2]"));
}

#[test]
fn lpar_text_lists_debug_lines_and_assigned_messages() {
    let mut settings = Settings::recommended();
    settings.chat_mode_1[5] = 0x1234;
    settings.debug[1].lines[2] = 0xabc;
    settings.debug[1].hide_speedo = true;
    settings.custom_tt = true;

    let text = render_lpar_text(&settings);
    assert!(text.contains("\r\nCUSTOM-TT = 1\r\n"));
    assert!(text.contains("[DEBUG-2]\r\nHIDE-SPEEDO = 1\r\nLINE-1 = 0x00000000\r\n"));
    assert!(text.contains("\r\nLINE-3 = 0x00000abc\r\n"));
    assert!(text.contains("[CHAT-MODE-1]\r\nMSG-06 = 0x1234\r\n\r\n[CHAT-MODE-2]"));
    assert!(text.ends_with("[CHAT-MODE-2]\r\n"));
}

#[test]
fn full_json_uses_canonical_top_level_order() {
    let session = default_session();
    let value = render_json_full(&session, JsonStyle::CanonicalV1);

    assert_eq!(
        keys(&value),
        vec![
            "kind",
            "header",
            "compatible",
            "capabilities",
            "param",
            "settings",
            "slots",
            "usage",
            "warnings",
        ]
    );
    assert_eq!(value["kind"], "lecode");
    assert_eq!(value["header"]["region"], "PAL");
    assert_eq!(value["header"]["layout"], "v5-signature");
    assert_eq!(value["header"]["signature"], Value::Null);
    assert_eq!(value["compatible"], true);
    assert_eq!(value["capabilities"]["issues"], json!([]));
    assert_eq!(value["param"]["size"], 0x276);
    assert_eq!(value["param"]["layout"], "TimeLimit");
    assert_eq!(value["settings"]["engine"], json!([10, 60, 30]));
    assert_eq!(value["settings"]["thcloud_frames"], 4500);
    assert_eq!(keys(&value["settings"])[..3], ["engine", "enable_200cc", "perfmon"]);
    assert_eq!(value["slots"]["n_slot"], 0x44);
    assert_eq!(value["slots"]["cup_arena"][0], 0x20);
    assert_eq!(value["usage"]["track"], 32);
    assert_eq!(value["usage"]["special"], 5);
    assert_eq!(value["warnings"], json!([]));
}

#[test]
fn lex_json_lists_sections_and_features() {
    let session = Engine::new()
        .open_bytes(sample_lex().encode(), None)
        .expect("LEX container should open");
    let value = render_json_full(&session, JsonStyle::CanonicalV1);

    assert_eq!(
        keys(&value),
        vec!["kind", "major", "minor", "sections", "features", "warnings"]
    );
    assert_eq!(value["kind"], "lex");
    assert_eq!(value["sections"][0]["magic"], "SET1");
    assert_eq!(value["sections"][0]["name"], "track settings");
    assert_eq!(value["sections"][1]["magic"], "CANN");
    assert_eq!(value["features"], json!(["speed-factor", "cannon"]));
}

#[test]
fn lpar_style_renders_the_session_settings() {
    let session = default_session();
    let settings = session.settings().expect("LE-CODE session");
    assert_eq!(
        render_text(&session, TextStyle::Lpar),
        render_lpar_text(settings)
    );
}

#[test]
fn usage_table_hides_unused_slots_unless_verbose() {
    let slots = default_slots();

    let unused_rows = |table: &str| {
        table
            .lines()
            .filter(|l| {
                l.split_whitespace()
                    .last()
                    .is_some_and(|usage| usage == "unused" || usage.starts_with("unused+"))
            })
            .count()
    };

    let short = render_usage_table(&slots, TextRenderOptions::default());
    assert_eq!(short.lines().count(), 1 + 48 + 2);
    assert!(short.lines().next().unwrap_or_default().ends_with("usage"));
    assert!(short.contains("track+online"));
    assert!(short.contains("special"));
    assert_eq!(unused_rows(&short), 0);
    assert!(short.contains("68 slots, 48 used, room for 68"));

    let long = render_usage_table(&slots, TextRenderOptions { verbose: true });
    assert_eq!(long.lines().count(), 1 + 0x44 + 2);
    assert_eq!(unused_rows(&long), 20);
}

#[test]
fn lex_text_describes_each_section() {
    let text = render_lex_text(&sample_lex());
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[0],
        "LEX v1.1, 2 sections, features: speed-factor, cannon"
    );
    assert!(lines[1].contains("SET1") && lines[1].contains("track settings"));
    assert!(lines[2].contains("speed factor 1.25"));
    assert!(lines[3].contains("CANN") && lines[3].contains("cannons"));
    assert!(lines[4].contains("cannon 0: speed 800.0"));

    let empty = render_lex_text(&LexContainer::new());
    assert_eq!(empty, "LEX v1.1, 0 sections, features: none\n");
}

#[test]
fn report_style_summarizes_header_and_usage() {
    let session = default_session();
    let text = render_text_with_options(
        &session,
        TextStyle::Report,
        TextRenderOptions { verbose: false },
    );
    assert!(text.contains("Region: PAL"));
    assert!(text.contains("Version: 5 (v5-signature)"));
    assert!(text.contains("Editable: yes"));
    assert!(text.contains("track+online"));

    let newer = Template {
        szs_required: TOOL_VERSION + 1,
        ..Template::new(Region::Usa)
    }
    .build();
    let session = Engine::new().open_bytes(newer, None).unwrap();
    let text = render_text(&session, TextStyle::Report);
    assert!(text.contains("Editable: no [NewerToolRequired]"));
}
