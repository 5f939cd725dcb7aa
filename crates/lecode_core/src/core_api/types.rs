use serde::{Deserialize, Serialize};

use crate::error::FormatWarning;
use crate::lecode::header::HeaderDescriptor;
use crate::lecode::settings::LparLayout;
use crate::lecode::slots::UsageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    LeCode,
    Lex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageCount {
    pub kind: UsageKind,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeCodeSnapshot {
    pub header: HeaderDescriptor,
    pub compatible: bool,
    pub param_size: usize,
    pub lpar_layout: Option<LparLayout>,
    pub n_slot: usize,
    pub max_slot: usize,
    pub n_cup_track: usize,
    pub n_cup_arena: usize,
    pub flags_bits: u8,
    pub usage: Vec<UsageCount>,
    pub warnings: Vec<FormatWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LexSectionEntry {
    pub magic: String,
    pub size: usize,
    pub known: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexSnapshot {
    pub major: u16,
    pub minor: u16,
    pub sections: Vec<LexSectionEntry>,
    pub features: u32,
    pub warnings: Vec<FormatWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Snapshot {
    LeCode(LeCodeSnapshot),
    Lex(LexSnapshot),
}

impl Snapshot {
    pub fn kind(&self) -> FileKind {
        match self {
            Self::LeCode(_) => FileKind::LeCode,
            Self::Lex(_) => FileKind::Lex,
        }
    }

    pub fn warnings(&self) -> &[FormatWarning] {
        match self {
            Self::LeCode(s) => &s.warnings,
            Self::Lex(s) => &s.warnings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityIssue {
    /// `szs_required` is newer than this library.
    NewerToolRequired,
    /// Header version above 5; only the generic prefix is understood.
    FutureHeader,
    /// The parameter block is larger than the newest known layout.
    UnknownParamLayout,
    /// The parameter block is too small to carry any setting.
    SettingsAbsent,
    /// A declared table count exceeds the room in the binary.
    TableOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    pub can_query: bool,
    pub can_plan_edits: bool,
    pub can_apply_edits: bool,
    pub issues: Vec<CapabilityIssue>,
}

impl Capabilities {
    pub fn read_only(issues: Vec<CapabilityIssue>) -> Self {
        Self {
            can_query: true,
            can_plan_edits: false,
            can_apply_edits: false,
            issues,
        }
    }

    /// Edits are possible; `issues` are informational.
    pub fn editable(issues: Vec<CapabilityIssue>) -> Self {
        Self {
            can_query: true,
            can_plan_edits: true,
            can_apply_edits: true,
            issues,
        }
    }
}
