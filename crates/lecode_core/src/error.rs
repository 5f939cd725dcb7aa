use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural failures of a binary decode or patch.
///
/// Every variant names the byte offset the failing check looked at so a
/// corrupt file can be diagnosed without a hex editor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid magic at offset {offset:#x}: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("unsupported {what} version {version} at offset {offset:#x}")]
    InvalidVersion {
        what: &'static str,
        offset: usize,
        version: u32,
    },

    #[error("truncated {what}: need {needed:#x} bytes at offset {offset:#x}, buffer has {available:#x}")]
    TruncatedBuffer {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{what} offset {offset:#x} outside of 0..{limit:#x}")]
    OffsetOutOfRange {
        what: &'static str,
        offset: usize,
        limit: usize,
    },

    #[error("{what} size {size:#x} at offset {offset:#x} does not match any known layout")]
    UnsupportedLayout {
        what: &'static str,
        offset: usize,
        size: usize,
    },

    #[error("{what} size {size:#x} at offset {offset:#x} is not a multiple of 4")]
    Misaligned {
        what: &'static str,
        offset: usize,
        size: usize,
    },

    #[error("parameter block of {size:#x} bytes is smaller than the minimal layout ({minimum:#x})")]
    ParamTooSmall { size: usize, minimum: usize },

    #[error("layout error at offset {offset:#x}: {message}")]
    Layout { offset: usize, message: String },
}

impl FormatError {
    pub fn truncated(what: &'static str, offset: usize, needed: usize, available: usize) -> Self {
        Self::TruncatedBuffer {
            what,
            offset,
            needed,
            available,
        }
    }

    pub fn magic(offset: usize, expected: &[u8], found: &[u8]) -> Self {
        Self::InvalidMagic {
            offset,
            expected: String::from_utf8_lossy(expected).into_owned(),
            found: String::from_utf8_lossy(found).into_owned(),
        }
    }

    /// Byte offset named by the diagnostic.
    pub fn offset(&self) -> usize {
        match *self {
            Self::InvalidMagic { offset, .. }
            | Self::InvalidVersion { offset, .. }
            | Self::TruncatedBuffer { offset, .. }
            | Self::OffsetOutOfRange { offset, .. }
            | Self::UnsupportedLayout { offset, .. }
            | Self::Misaligned { offset, .. }
            | Self::Layout { offset, .. } => offset,
            Self::ParamTooSmall { .. } => 0,
        }
    }
}

/// A locally recovered problem. Decoding continued with the affected
/// field treated as absent or clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatWarning {
    pub offset: usize,
    pub message: String,
}

impl FormatWarning {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for FormatWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {:#x}: {}", self.offset, self.message)
    }
}

impl From<FormatError> for FormatWarning {
    fn from(err: FormatError) -> Self {
        Self::new(err.offset(), err.to_string())
    }
}

/// Collects soft warnings and mirrors each one to the `log` facade.
#[derive(Debug, Default, Clone)]
pub(crate) struct Warnings {
    items: Vec<FormatWarning>,
}

impl Warnings {
    pub(crate) fn push(&mut self, warning: FormatWarning) {
        log::warn!("{warning}");
        self.items.push(warning);
    }

    pub(crate) fn warn(&mut self, offset: usize, message: impl Into<String>) {
        self.push(FormatWarning::new(offset, message));
    }

    pub(crate) fn extend(&mut self, other: Warnings) {
        self.items.extend(other.items);
    }

    pub(crate) fn into_vec(self) -> Vec<FormatWarning> {
        self.items
    }
}
