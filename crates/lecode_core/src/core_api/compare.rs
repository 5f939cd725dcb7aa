//! Section-wise comparison of two LE-CODE binaries.

use serde::{Deserialize, Serialize};

use crate::layout::{ByteRange, SectionId};
use crate::lecode::Document;
use crate::lecode::header::HeaderLayout;

use super::error::CoreError;

// Header fields that change on every build or edit.
const V4_STAMPS: [ByteRange; 1] = [ByteRange {
    start: 0x20,
    end: 0x40,
}];
const V5_STAMPS: [ByteRange; 3] = [
    ByteRange {
        start: 0x24,
        end: 0x28,
    },
    ByteRange {
        start: 0x2c,
        end: 0x34,
    },
    ByteRange {
        start: 0x38,
        end: 0x3c,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareAxis {
    Size,
    /// Header bytes without the build and edit stamps.
    Header,
    /// Build timestamp (v4) or the creation, edit and commit stamps (v5).
    Timestamp,
    /// Everything after the header.
    Body,
    /// The settings part of the parameter block.
    Params,
    /// Parameter data: pointer-addressed cup and slot tables.
    CupData,
    /// Code between header and parameter block, plus the tail.
    Code,
}

impl CompareAxis {
    pub const ALL: [Self; 7] = [
        Self::Size,
        Self::Header,
        Self::Timestamp,
        Self::Body,
        Self::Params,
        Self::CupData,
        Self::Code,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Header => "header",
            Self::Timestamp => "timestamp",
            Self::Body => "body",
            Self::Params => "params",
            Self::CupData => "cup-data",
            Self::Code => "code",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisResult {
    pub axis: CompareAxis,
    pub equal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub results: Vec<AxisResult>,
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        self.results.iter().all(|r| r.equal)
    }

    pub fn get(&self, axis: CompareAxis) -> Option<bool> {
        self.results.iter().find(|r| r.axis == axis).map(|r| r.equal)
    }

    pub fn differences(&self) -> impl Iterator<Item = CompareAxis> + '_ {
        self.results.iter().filter(|r| !r.equal).map(|r| r.axis)
    }
}

/// Compare two binaries along `axes`. Both must decode.
pub fn compare_binaries(
    left: &[u8],
    right: &[u8],
    axes: &[CompareAxis],
) -> Result<Comparison, CoreError> {
    let a = Document::parse(left).map_err(|e| CoreError::format("left binary", e))?;
    let b = Document::parse(right).map_err(|e| CoreError::format("right binary", e))?;
    Ok(compare_documents(&a, left, &b, right, axes))
}

pub(crate) fn compare_documents(
    a: &Document,
    left: &[u8],
    b: &Document,
    right: &[u8],
    axes: &[CompareAxis],
) -> Comparison {
    let results = axes
        .iter()
        .map(|&axis| {
            let equal = match axis {
                CompareAxis::Size => left.len() == right.len(),
                CompareAxis::Header => masked_header(a, left) == masked_header(b, right),
                CompareAxis::Timestamp => stamps(a, left) == stamps(b, right),
                CompareAxis::Body => {
                    tail_from(left, a.header.header_size) == tail_from(right, b.header.header_size)
                }
                CompareAxis::Params => {
                    section(a, left, SectionId::Param) == section(b, right, SectionId::Param)
                }
                CompareAxis::CupData => {
                    section(a, left, SectionId::ParamData)
                        == section(b, right, SectionId::ParamData)
                }
                CompareAxis::Code => code(a, left) == code(b, right),
            };
            AxisResult { axis, equal }
        })
        .collect();
    Comparison { results }
}

fn stamp_ranges(doc: &Document) -> &'static [ByteRange] {
    match doc.header.layout {
        HeaderLayout::V4 => &V4_STAMPS,
        HeaderLayout::V5(_) => &V5_STAMPS,
        HeaderLayout::V3 | HeaderLayout::Future(_) => &[],
    }
}

fn masked_header(doc: &Document, bytes: &[u8]) -> Vec<u8> {
    let end = doc.header.header_size.min(bytes.len());
    let mut header = bytes[..end].to_vec();
    for range in stamp_ranges(doc) {
        let stop = range.end.min(end);
        if range.start < stop {
            header[range.start..stop].fill(0);
        }
    }
    header
}

fn stamps(doc: &Document, bytes: &[u8]) -> Vec<u8> {
    let end = doc.header.header_size.min(bytes.len());
    stamp_ranges(doc)
        .iter()
        .filter(|r| r.start < end)
        .flat_map(|r| bytes[r.start..r.end.min(end)].iter().copied())
        .collect()
}

fn tail_from(bytes: &[u8], start: usize) -> &[u8] {
    bytes.get(start..).unwrap_or(&[])
}

fn section<'a>(doc: &Document, bytes: &'a [u8], id: SectionId) -> &'a [u8] {
    let range = doc.layout().range_of(id);
    bytes.get(range.start..range.end).unwrap_or(&[])
}

fn code(doc: &Document, bytes: &[u8]) -> Vec<u8> {
    let mut out = section(doc, bytes, SectionId::Code).to_vec();
    out.extend_from_slice(section(doc, bytes, SectionId::Tail));
    out
}
