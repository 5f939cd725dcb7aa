//! LEX track extension containers.
//!
//! A container is a small header followed by `(magic, size, data)`
//! records. Recognized sections are normalized on insertion; anything
//! else is carried along opaque.

pub mod sections;
pub mod types;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatWarning, Warnings};
use crate::reader::ByteView;
use sections::{FeatSection, lookup};
use types::{
    FEAT_MAGIC, LEX_HEADER_SIZE, LEX_MAGIC, LEX_MAJOR, LEX_MINOR, LEX_RECORD_HEADER, LexFeatures,
    LexSections, UNKNOWN_PRIORITY, magic_name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexState {
    Empty,
    Decoding,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexElement {
    pub magic: u32,
    pub payload: Vec<u8>,
    /// Insertion order, used to keep equal-priority sections stable.
    pub seq: u32,
}

impl LexElement {
    pub fn name(&self) -> String {
        magic_name(self.magic)
    }

    pub fn is_known(&self) -> bool {
        lookup(self.magic).is_some()
    }

    fn priority(&self) -> u8 {
        lookup(self.magic).map_or(UNKNOWN_PRIORITY, |s| s.priority())
    }
}

#[derive(Debug, Clone)]
pub struct LexContainer {
    state: LexState,
    major: u16,
    minor: u16,
    elements: Vec<LexElement>,
    next_seq: u32,
    have_sections: LexSections,
    have_features: LexFeatures,
    warnings: Vec<FormatWarning>,
}

impl Default for LexContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for LexContainer {
    fn eq(&self, other: &Self) -> bool {
        let strip = |c: &Self| {
            c.sorted()
                .map(|e| (e.magic, e.payload.clone()))
                .collect::<Vec<_>>()
        };
        self.major == other.major && self.minor == other.minor && strip(self) == strip(other)
    }
}

impl LexContainer {
    pub fn new() -> Self {
        Self {
            state: LexState::Empty,
            major: LEX_MAJOR,
            minor: LEX_MINOR,
            elements: Vec::new(),
            next_seq: 0,
            have_sections: LexSections::empty(),
            have_features: LexFeatures::empty(),
            warnings: Vec::new(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let view = ByteView::new(bytes, "LEX header");
        if view.len() < LEX_HEADER_SIZE {
            return Err(FormatError::truncated(
                view.what(),
                0,
                LEX_HEADER_SIZE,
                view.len(),
            ));
        }
        let magic = view.bytes_at(0, 4)?;
        if magic != LEX_MAGIC {
            return Err(FormatError::magic(0, LEX_MAGIC, magic));
        }
        let major = view.read_u16(0x04)?;
        if major != LEX_MAJOR {
            return Err(FormatError::InvalidVersion {
                what: "LEX",
                offset: 0x04,
                version: u32::from(major),
            });
        }
        let minor = view.read_u16(0x06)?;
        let size = view.read_u32(0x08)? as usize;
        if size > view.len() {
            return Err(FormatError::truncated("LEX file", 0x08, size, view.len()));
        }
        let element_off = view.read_u32(0x0c)? as usize;
        if element_off < LEX_HEADER_SIZE || element_off > size {
            return Err(FormatError::OffsetOutOfRange {
                what: "LEX element list",
                offset: element_off,
                limit: size,
            });
        }

        let mut lex = Self::new();
        lex.minor = minor;
        lex.state = LexState::Decoding;
        let mut warnings = Warnings::default();

        let body = ByteView::new(&bytes[..size], "LEX element");
        let mut pos = element_off;
        while pos + LEX_RECORD_HEADER <= size {
            let magic = body.read_u32(pos)?;
            if magic == 0 {
                break;
            }
            let len = body.read_u32(pos + 4)? as usize;
            if len % 4 != 0 {
                return Err(FormatError::Misaligned {
                    what: "LEX element",
                    offset: pos + 4,
                    size: len,
                });
            }
            let data = pos + LEX_RECORD_HEADER;
            if len > size - data {
                warnings.warn(
                    pos,
                    format!(
                        "element {} of {len:#x} bytes runs past the end ({size:#x}), stopped",
                        magic_name(magic)
                    ),
                );
                break;
            }
            if !lex.append(magic, &bytes[data..data + len], false) {
                warnings.warn(pos, format!("duplicate element {} ignored", magic_name(magic)));
            }
            pos = data + len;
        }

        lex.state = LexState::Ready;
        lex.refresh();
        lex.warnings = warnings.into_vec();
        Ok(lex)
    }

    /// Serialize with sections sorted by priority, then insertion order.
    pub fn encode(&self) -> Vec<u8> {
        let body: usize = self
            .elements
            .iter()
            .map(|e| LEX_RECORD_HEADER + e.payload.len())
            .sum();
        let size = LEX_HEADER_SIZE + body + LEX_RECORD_HEADER;

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(LEX_MAGIC);
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&(size as u32).to_be_bytes());
        out.extend_from_slice(&(LEX_HEADER_SIZE as u32).to_be_bytes());
        for element in self.sorted() {
            out.extend_from_slice(&element.magic.to_be_bytes());
            out.extend_from_slice(&(element.payload.len() as u32).to_be_bytes());
            out.extend_from_slice(&element.payload);
        }
        out.extend_from_slice(&[0; LEX_RECORD_HEADER]);
        out
    }

    /// Insert a section, or replace it when `overwrite` is set.
    ///
    /// The payload is padded to the section minimum and to a multiple of
    /// 4, then normalized. Returns false when nothing was stored: a zero
    /// magic, or an existing section without `overwrite`.
    pub fn append(&mut self, magic: u32, payload: &[u8], overwrite: bool) -> bool {
        if magic == 0 {
            return false;
        }

        let section = lookup(magic);
        let mut data = payload.to_vec();
        let min = section.map_or(0, |s| s.min_size());
        if data.len() < min {
            data.resize(min, 0);
        }
        data.resize(data.len().div_ceil(4) * 4, 0);
        if let Some(section) = section {
            section.fixup(&mut data);
        }

        if let Some(existing) = self.elements.iter_mut().find(|e| e.magic == magic) {
            if !overwrite {
                return false;
            }
            existing.payload = data;
        } else {
            self.elements.push(LexElement {
                magic,
                payload: data,
                seq: self.next_seq,
            });
            self.next_seq += 1;
        }

        if self.state == LexState::Empty {
            self.state = LexState::Ready;
        }
        if self.state == LexState::Ready {
            self.refresh();
        }
        true
    }

    pub fn remove(&mut self, magic: u32) -> bool {
        let before = self.elements.len();
        self.elements.retain(|e| e.magic != magic);
        let removed = self.elements.len() != before;
        if removed {
            self.refresh();
        }
        removed
    }

    /// Drop recognized sections that hold only defaults and every
    /// section this library does not know.
    pub fn purge(&mut self) {
        self.refresh_features();
        self.elements.retain(|e| {
            lookup(e.magic).is_some_and(|section| !section.is_default(&e.payload))
        });
        self.refresh();
    }

    /// Re-derive the feature set and write it into the FEAT section if
    /// one is present.
    pub fn refresh_features(&mut self) {
        let features = self.derive_features();
        if let Some(feat) = self.elements.iter_mut().find(|e| e.magic == FEAT_MAGIC) {
            let mask = FeatSection::payload(features);
            feat.payload[..mask.len()].copy_from_slice(&mask);
        }
        self.have_features = features;
    }

    fn derive_features(&self) -> LexFeatures {
        self.elements
            .iter()
            .filter_map(|e| lookup(e.magic).map(|s| s.features(&e.payload)))
            .fold(LexFeatures::empty(), |acc, f| acc | f)
    }

    fn refresh(&mut self) {
        self.have_sections = self
            .elements
            .iter()
            .map(|e| lookup(e.magic).map_or(LexSections::UNKNOWN, |s| s.flag()))
            .fold(LexSections::empty(), |acc, f| acc | f);
        self.have_features = self.derive_features();
    }

    pub fn state(&self) -> LexState {
        self.state
    }

    pub fn version(&self) -> (u16, u16) {
        (self.major, self.minor)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, magic: u32) -> Option<&LexElement> {
        self.elements.iter().find(|e| e.magic == magic)
    }

    /// Elements in the order they are written.
    pub fn sorted(&self) -> impl Iterator<Item = &LexElement> {
        let mut order: Vec<&LexElement> = self.elements.iter().collect();
        order.sort_by_key(|e| (e.priority(), e.seq));
        order.into_iter()
    }

    pub fn have_sections(&self) -> LexSections {
        self.have_sections
    }

    pub fn have_features(&self) -> LexFeatures {
        self.have_features
    }

    pub fn warnings(&self) -> &[FormatWarning] {
        &self.warnings
    }
}
