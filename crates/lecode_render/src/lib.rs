use std::fmt::Write as _;

use lecode_core::FormatWarning;
use lecode_core::core_api::{Capabilities, FileKind, Session, Snapshot};
use lecode_core::lecode::Document;
use lecode_core::lecode::header::{HeaderDescriptor, HeaderLayout, V5Layout};
use lecode_core::lecode::settings::Settings;
use lecode_core::lecode::slots::{SlotModel, UsageKind};
use lecode_core::lex::LexContainer;
use lecode_core::lex::sections::{TrackSettings, decode_cannons, decode_hide_rules, lookup};
use lecode_core::lex::types::{CANN_MAGIC, HIPT_MAGIC, LexFeatures, SET1_MAGIC};
use serde_json::{Map as JsonMap, Value as JsonValue};

const CRLF: &str = "\r\n";
const USAGE_COL_SLOT: usize = 6;
const USAGE_COL_BYTE: usize = 9;
const USAGE_COL_FLAGS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    /// LPAR text for LE-CODE binaries, a section dump for LEX files.
    #[default]
    Lpar,
    /// Header summary followed by the slot usage table or section dump.
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// List unused slots in the usage table as well.
    pub verbose: bool,
}

/// One line of the `[LECODE-PARAMETERS]` section. The JSON dump uses the
/// same table so both outputs list the fields in the same order.
struct Keyword {
    key: &'static str,
    json: &'static str,
    value: fn(&Settings) -> JsonValue,
}

const KEYWORDS: &[Keyword] = &[
    Keyword {
        key: "ENGINE",
        json: "engine",
        value: |s| JsonValue::from(s.engine.to_vec()),
    },
    Keyword {
        key: "ENABLE-200CC",
        json: "enable_200cc",
        value: |s| JsonValue::Bool(s.enable_200cc),
    },
    Keyword {
        key: "PERF-MONITOR",
        json: "perfmon",
        value: |s| JsonValue::from(s.perfmon),
    },
    Keyword {
        key: "CUSTOM-TT",
        json: "custom_tt",
        value: |s| JsonValue::Bool(s.custom_tt),
    },
    Keyword {
        key: "XPFLAGS",
        json: "xpflags",
        value: |s| JsonValue::Bool(s.xpflags),
    },
    Keyword {
        key: "BLOCK-TRACK",
        json: "block_track",
        value: |s| JsonValue::from(s.block_track),
    },
    Keyword {
        key: "SPEEDOMETER",
        json: "speedometer",
        value: |s| JsonValue::from(s.speedometer),
    },
    Keyword {
        key: "DEBUG-MODE",
        json: "debug_mode",
        value: |s| JsonValue::from(s.debug_mode),
    },
    Keyword {
        key: "CHEAT-MODE",
        json: "cheat_mode",
        value: |s| JsonValue::from(s.cheat_mode),
    },
    Keyword {
        key: "ITEM-CHEAT",
        json: "item_cheat",
        value: |s| JsonValue::Bool(s.item_cheat),
    },
    Keyword {
        key: "DRAG-BLUE-SHELL",
        json: "drag_blue_shell",
        value: |s| JsonValue::Bool(s.drag_blue_shell),
    },
    Keyword {
        key: "THCLOUD-TIME",
        json: "thcloud_frames",
        value: |s| JsonValue::from(s.thcloud_frames),
    },
    Keyword {
        key: "WW-RACE",
        json: "ww_race",
        value: |s| JsonValue::Bool(s.ww_race),
    },
    Keyword {
        key: "WW-BATTLE",
        json: "ww_battle",
        value: |s| JsonValue::Bool(s.ww_battle),
    },
    Keyword {
        key: "TEXTURE-HACK",
        json: "texture_enabled",
        value: |s| JsonValue::Bool(s.texture_enabled),
    },
    Keyword {
        key: "TEXTURE-ALTERABLE",
        json: "texture_alterable",
        value: |s| JsonValue::from(s.texture_alterable),
    },
    Keyword {
        key: "TIME-LIMIT-RACE",
        json: "time_limit_race",
        value: |s| JsonValue::from(s.time_limit_race),
    },
    Keyword {
        key: "TIME-LIMIT-BATTLE",
        json: "time_limit_battle",
        value: |s| JsonValue::from(s.time_limit_battle),
    },
    Keyword {
        key: "TIME-LIMIT-MODE",
        json: "time_limit_mode",
        value: |s| JsonValue::from(s.time_limit_mode),
    },
];

pub fn render_json_full(session: &Session, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(default_json(session)),
    }
}

pub fn render_text(session: &Session, style: TextStyle) -> String {
    render_text_with_options(session, style, TextRenderOptions::default())
}

pub fn render_text_with_options(
    session: &Session,
    style: TextStyle,
    options: TextRenderOptions,
) -> String {
    match (style, session.document(), session.lex()) {
        (TextStyle::Lpar, Some(doc), _) => render_lpar_text(doc.settings()),
        (TextStyle::Report, Some(doc), _) => {
            let mut out = render_header_summary(&doc.header, session.capabilities());
            out.push('\n');
            out.push_str(&render_usage_table(doc.slots(), options));
            out
        }
        (_, None, Some(lex)) => render_lex_text(lex),
        (_, None, None) => String::new(),
    }
}

/// Settings as LPAR text: bracketed sections of `KEY = VALUE` lines with
/// CRLF line endings.
pub fn render_lpar_text(settings: &Settings) -> String {
    let mut out = String::new();

    crlf_line(&mut out, "[LECODE-PARAMETERS]");
    for keyword in KEYWORDS {
        let value = text_value(&(keyword.value)(settings));
        crlf_line(&mut out, &format!("{} = {value}", keyword.key));
    }

    for (index, debug) in settings.debug.iter().enumerate() {
        out.push_str(CRLF);
        crlf_line(&mut out, &format!("[DEBUG-{}]", index + 1));
        crlf_line(
            &mut out,
            &format!("HIDE-SPEEDO = {}", u8::from(debug.hide_speedo)),
        );
        for (line, value) in debug.lines.iter().enumerate() {
            crlf_line(&mut out, &format!("LINE-{} = {value:#010x}", line + 1));
        }
    }

    for (index, modes) in [&settings.chat_mode_1, &settings.chat_mode_2]
        .into_iter()
        .enumerate()
    {
        out.push_str(CRLF);
        crlf_line(&mut out, &format!("[CHAT-MODE-{}]", index + 1));
        // Unassigned messages are left out.
        for (message, mode) in modes.iter().enumerate().filter(|(_, m)| **m != 0) {
            crlf_line(&mut out, &format!("MSG-{:02} = {mode:#06x}", message + 1));
        }
    }

    out
}

pub fn render_usage_table(slots: &SlotModel, options: TextRenderOptions) -> String {
    let mut out = String::new();
    writeln!(
        &mut out,
        "{:>w_slot$} {:>w_byte$} {:>w_byte$} {:>w_flags$}  usage",
        "slot",
        "property",
        "music",
        "flags",
        w_slot = USAGE_COL_SLOT,
        w_byte = USAGE_COL_BYTE,
        w_flags = USAGE_COL_FLAGS,
    )
    .expect("writing to String cannot fail");

    for (slot, usage) in slots.usage_table().iter().enumerate() {
        if usage.kind == UsageKind::Unused && !options.verbose {
            continue;
        }
        let property = slots.property().get(slot).copied().unwrap_or(0);
        let music = slots.music().get(slot).copied().unwrap_or(0);
        let flags = slots.slot_flags(slot).bits();
        writeln!(
            &mut out,
            "{:>w_slot$} {:>w_byte$} {:>w_byte$} {:>w_flags$}  {usage}",
            format!("{slot:#05x}"),
            format!("{property:#04x}"),
            format!("{music:#04x}"),
            format!("{flags:#06x}"),
            w_slot = USAGE_COL_SLOT,
            w_byte = USAGE_COL_BYTE,
            w_flags = USAGE_COL_FLAGS,
        )
        .expect("writing to String cannot fail");
    }

    writeln!(&mut out).expect("writing to String cannot fail");
    let counts = slots.usage_counts();
    let unused = counts.get(&UsageKind::Unused).copied().unwrap_or(0);
    let used = slots.usage_table().len() - unused;
    let summary = counts
        .iter()
        .map(|(kind, count)| format!("{}={count}", kind.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        &mut out,
        "{} slots, {used} used, room for {}: {summary}",
        slots.n_slot(),
        slots.max_slot(),
    )
    .expect("writing to String cannot fail");

    out
}

pub fn render_lex_text(lex: &LexContainer) -> String {
    let mut out = String::new();
    let (major, minor) = lex.version();
    let count = lex.sorted().count();
    let features = feature_names(lex.have_features());
    writeln!(
        &mut out,
        "LEX v{major}.{minor}, {count} section{}, features: {}",
        if count == 1 { "" } else { "s" },
        if features.is_empty() {
            "none".to_string()
        } else {
            features.join(", ")
        },
    )
    .expect("writing to String cannot fail");

    for element in lex.sorted() {
        let name = lookup(element.magic).map_or("unknown", |s| s.name());
        writeln!(
            &mut out,
            "  {}  {:>6} bytes  {name}",
            element.name(),
            format!("{:#x}", element.payload.len()),
        )
        .expect("writing to String cannot fail");

        match element.magic {
            SET1_MAGIC => {
                let s = TrackSettings::decode(&element.payload);
                writeln!(
                    &mut out,
                    "      item factors {:.2}/{:.2}/{:.2}, speed factor {:.2}, start pos {}, online {}",
                    s.item_factor[0],
                    s.item_factor[1],
                    s.item_factor[2],
                    s.speed_factor,
                    s.start_pos,
                    s.apply_online_sec,
                )
                .expect("writing to String cannot fail");
            }
            CANN_MAGIC => {
                for (i, c) in decode_cannons(&element.payload).iter().enumerate() {
                    writeln!(
                        &mut out,
                        "      cannon {i}: speed {:.1}, height {:.1}, decel {:.1}, end decel {:.1}",
                        c.speed, c.height, c.deceleration, c.end_deceleration,
                    )
                    .expect("writing to String cannot fail");
                }
            }
            HIPT_MAGIC => {
                let rules = decode_hide_rules(&element.payload);
                writeln!(&mut out, "      {} hide rule(s)", rules.len())
                    .expect("writing to String cannot fail");
            }
            _ => {}
        }
    }

    for warning in lex.warnings() {
        writeln!(&mut out, "warning: {warning}").expect("writing to String cannot fail");
    }

    out
}

pub fn render_header_summary(header: &HeaderDescriptor, capabilities: &Capabilities) -> String {
    let mut out = String::new();
    let rows: [(&str, String); 8] = [
        ("Version", format!("{} ({})", header.version, layout_name(&header.layout))),
        ("Region", header.region.to_string()),
        ("Build", format!("{} ({})", header.build_number, header.build_mode)),
        ("Base address", format!("{:#010x}", header.base_address)),
        ("Entry point", format!("{:#010x}", header.entry_point)),
        ("File size", format!("{:#x}", header.file_size)),
        ("Param offset", format!("{:#x}", header.param_offset)),
        (
            "Editable",
            if capabilities.can_apply_edits {
                "yes".to_string()
            } else {
                format!("no {:?}", capabilities.issues)
            },
        ),
    ];
    for (label, value) in rows {
        writeln!(&mut out, "{label:>14}: {value}").expect("writing to String cannot fail");
    }
    if let Some(timestamp) = &header.timestamp {
        writeln!(&mut out, "{:>14}: {timestamp}", "Built").expect("writing to String cannot fail");
    }
    out
}

fn default_json(session: &Session) -> JsonMap<String, JsonValue> {
    match (session.document(), session.lex()) {
        (Some(doc), _) => lecode_json(session, doc),
        (None, Some(lex)) => lex_json(lex),
        (None, None) => JsonMap::new(),
    }
}

fn lecode_json(session: &Session, doc: &Document) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();
    out.insert("kind".to_string(), kind_to_json(session.kind()));
    out.insert("header".to_string(), header_to_json(&doc.header));

    let compatible = match session.snapshot() {
        Snapshot::LeCode(s) => s.compatible,
        Snapshot::Lex(_) => false,
    };
    out.insert("compatible".to_string(), JsonValue::Bool(compatible));
    out.insert(
        "capabilities".to_string(),
        capabilities_to_json(session.capabilities()),
    );

    let param = doc.param();
    let mut param_json = JsonMap::new();
    param_json.insert("size".to_string(), JsonValue::from(param.declared_size));
    param_json.insert("end_of_data".to_string(), JsonValue::from(param.region_len));
    param_json.insert(
        "layout".to_string(),
        match param.layout {
            Some(layout) => JsonValue::String(format!("{layout:?}")),
            None => JsonValue::Null,
        },
    );
    out.insert("param".to_string(), JsonValue::Object(param_json));

    out.insert("settings".to_string(), settings_to_json(doc.settings()));
    out.insert("slots".to_string(), slots_to_json(doc.slots()));
    out.insert("usage".to_string(), usage_to_json(doc.slots()));
    out.insert("warnings".to_string(), warnings_to_json(doc.warnings()));
    out
}

fn lex_json(lex: &LexContainer) -> JsonMap<String, JsonValue> {
    let (major, minor) = lex.version();
    let mut out = JsonMap::new();
    out.insert("kind".to_string(), kind_to_json(FileKind::Lex));
    out.insert("major".to_string(), JsonValue::from(major));
    out.insert("minor".to_string(), JsonValue::from(minor));
    out.insert(
        "sections".to_string(),
        JsonValue::Array(
            lex.sorted()
                .map(|e| {
                    let mut m = JsonMap::new();
                    m.insert("magic".to_string(), JsonValue::String(e.name()));
                    m.insert(
                        "name".to_string(),
                        match lookup(e.magic) {
                            Some(section) => JsonValue::String(section.name().to_string()),
                            None => JsonValue::Null,
                        },
                    );
                    m.insert("size".to_string(), JsonValue::from(e.payload.len()));
                    m.insert("known".to_string(), JsonValue::Bool(e.is_known()));
                    JsonValue::Object(m)
                })
                .collect(),
        ),
    );
    out.insert(
        "features".to_string(),
        JsonValue::from(feature_names(lex.have_features())),
    );
    out.insert("warnings".to_string(), warnings_to_json(lex.warnings()));
    out
}

fn kind_to_json(kind: FileKind) -> JsonValue {
    JsonValue::String(
        match kind {
            FileKind::LeCode => "lecode",
            FileKind::Lex => "lex",
        }
        .to_string(),
    )
}

fn header_to_json(header: &HeaderDescriptor) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("version".to_string(), JsonValue::from(header.version));
    m.insert(
        "layout".to_string(),
        JsonValue::String(layout_name(&header.layout)),
    );
    m.insert("header_size".to_string(), JsonValue::from(header.header_size));
    m.insert("build_number".to_string(), JsonValue::from(header.build_number));
    m.insert(
        "region".to_string(),
        JsonValue::String(header.region.to_string()),
    );
    m.insert(
        "build_mode".to_string(),
        JsonValue::String(header.build_mode.to_string()),
    );
    m.insert("phase".to_string(), JsonValue::from(header.phase));
    m.insert(
        "base_address".to_string(),
        JsonValue::String(format!("{:#010x}", header.base_address)),
    );
    m.insert(
        "entry_point".to_string(),
        JsonValue::String(format!("{:#010x}", header.entry_point)),
    );
    m.insert("file_size".to_string(), JsonValue::from(header.file_size));
    m.insert("param_offset".to_string(), JsonValue::from(header.param_offset));
    m.insert(
        "timestamp".to_string(),
        match &header.timestamp {
            Some(t) => JsonValue::String(t.clone()),
            None => JsonValue::Null,
        },
    );
    m.insert("szs_required".to_string(), JsonValue::from(header.szs_required));
    m.insert(
        "szs_recommended".to_string(),
        JsonValue::from(header.szs_recommended),
    );
    m.insert("edit_version".to_string(), JsonValue::from(header.edit_version));
    m.insert("creation_time".to_string(), JsonValue::from(header.creation_time));
    m.insert("edit_time".to_string(), JsonValue::from(header.edit_time));
    m.insert("commit_time".to_string(), JsonValue::from(header.commit_time));
    m.insert(
        "signature".to_string(),
        match header.signature {
            Some(sig) => {
                let mut s = JsonMap::new();
                s.insert("offset".to_string(), JsonValue::from(sig.offset));
                s.insert("size".to_string(), JsonValue::from(sig.size));
                JsonValue::Object(s)
            }
            None => JsonValue::Null,
        },
    );
    JsonValue::Object(m)
}

fn capabilities_to_json(capabilities: &Capabilities) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("can_query".to_string(), JsonValue::Bool(capabilities.can_query));
    m.insert(
        "can_plan_edits".to_string(),
        JsonValue::Bool(capabilities.can_plan_edits),
    );
    m.insert(
        "can_apply_edits".to_string(),
        JsonValue::Bool(capabilities.can_apply_edits),
    );
    m.insert(
        "issues".to_string(),
        JsonValue::Array(
            capabilities
                .issues
                .iter()
                .map(|issue| JsonValue::String(format!("{issue:?}")))
                .collect(),
        ),
    );
    JsonValue::Object(m)
}

fn settings_to_json(settings: &Settings) -> JsonValue {
    let mut m = JsonMap::new();
    for keyword in KEYWORDS {
        m.insert(keyword.json.to_string(), (keyword.value)(settings));
    }
    m.insert(
        "chat_mode_1".to_string(),
        JsonValue::from(settings.chat_mode_1.to_vec()),
    );
    m.insert(
        "chat_mode_2".to_string(),
        JsonValue::from(settings.chat_mode_2.to_vec()),
    );
    m.insert(
        "debug".to_string(),
        JsonValue::Array(
            settings
                .debug
                .iter()
                .map(|debug| {
                    let mut d = JsonMap::new();
                    d.insert(
                        "hide_speedo".to_string(),
                        JsonValue::Bool(debug.hide_speedo),
                    );
                    d.insert("lines".to_string(), JsonValue::from(debug.lines.to_vec()));
                    JsonValue::Object(d)
                })
                .collect(),
        ),
    );
    JsonValue::Object(m)
}

fn slots_to_json(slots: &SlotModel) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("n_slot".to_string(), JsonValue::from(slots.n_slot()));
    m.insert("max_slot".to_string(), JsonValue::from(slots.max_slot()));
    m.insert("n_cup_track".to_string(), JsonValue::from(slots.n_cup_track()));
    m.insert(
        "max_cup_track".to_string(),
        JsonValue::from(slots.max_cup_track()),
    );
    m.insert("n_cup_arena".to_string(), JsonValue::from(slots.n_cup_arena()));
    m.insert(
        "max_cup_arena".to_string(),
        JsonValue::from(slots.max_cup_arena()),
    );
    m.insert("flags_bits".to_string(), JsonValue::from(slots.flags_bits()));
    m.insert(
        "format_version".to_string(),
        JsonValue::from(slots.format_version()),
    );
    m.insert(
        "cup_track".to_string(),
        JsonValue::from(slots.cup_track().to_vec()),
    );
    m.insert(
        "cup_arena".to_string(),
        JsonValue::from(slots.cup_arena().to_vec()),
    );
    JsonValue::Object(m)
}

fn usage_to_json(slots: &SlotModel) -> JsonValue {
    let mut m = JsonMap::new();
    for (kind, count) in slots.usage_counts() {
        m.insert(kind.as_str().to_string(), JsonValue::from(count));
    }
    JsonValue::Object(m)
}

fn warnings_to_json(warnings: &[FormatWarning]) -> JsonValue {
    JsonValue::Array(
        warnings
            .iter()
            .map(|w| {
                let mut m = JsonMap::new();
                m.insert("offset".to_string(), JsonValue::from(w.offset));
                m.insert("message".to_string(), JsonValue::String(w.message.clone()));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn layout_name(layout: &HeaderLayout) -> String {
    match layout {
        HeaderLayout::V3 => "v3".to_string(),
        HeaderLayout::V4 => "v4".to_string(),
        HeaderLayout::V5(v5) => format!(
            "v5-{}",
            match v5 {
                V5Layout::Base => "base",
                V5Layout::Recommended => "recommended",
                V5Layout::Commit => "commit",
                V5Layout::Signature => "signature",
            }
        ),
        HeaderLayout::Future(version) => format!("future-{version}"),
    }
}

fn feature_names(features: LexFeatures) -> Vec<String> {
    features
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase().replace('_', "-"))
        .collect()
}

/// LPAR text form of a field value: booleans as 0/1, arrays comma separated.
fn text_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Bool(b) => u8::from(*b).to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items.iter().map(text_value).collect::<Vec<_>>().join(","),
        JsonValue::Null | JsonValue::Object(_) => String::new(),
    }
}

fn crlf_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}
