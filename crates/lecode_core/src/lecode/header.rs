use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::reader::ByteView;

use super::types::{
    BuildMode, HEADER_V3_SIZE, HEADER_V4_SIZE, HEADER_V4_TIMESTAMP_LEN, HEADER_V5_BASE_SIZE,
    HEADER_V5_COMMIT_SIZE, HEADER_V5_RECOMMENDED_SIZE, HEADER_V5_SIGNATURE_SIZE, LECODE_MAGIC,
    MIN_HEADER_SIZE, Region,
};

// Offsets shared by every version
const OFF_VERSION: usize = 0x04;
const OFF_BUILD_NUMBER: usize = 0x08;
const OFF_BASE_ADDRESS: usize = 0x0c;
const OFF_ENTRY_POINT: usize = 0x10;
const OFF_FILE_SIZE: usize = 0x14;
const OFF_PARAM: usize = 0x18;
const OFF_REGION: usize = 0x1c;
const OFF_BUILD_MODE: usize = 0x1d;
const OFF_PHASE: usize = 0x1e;

// v4
const OFF_TIMESTAMP: usize = 0x20;

// v5
const OFF_SZS_REQUIRED: usize = 0x20;
pub(crate) const OFF_EDIT_VERSION: usize = 0x24;
const OFF_HEAD_SIZE: usize = 0x28;
const OFF_CREATION_TIME: usize = 0x2c;
pub(crate) const OFF_EDIT_TIME: usize = 0x30;
const OFF_SZS_RECOMMENDED: usize = 0x34;
const OFF_COMMIT_TIME: usize = 0x38;
const OFF_SIGNATURE: usize = 0x3c;
const OFF_SIGNATURE_SIZE: usize = 0x40;

/// The four size steps of the v5 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum V5Layout {
    Base,
    Recommended,
    Commit,
    Signature,
}

impl V5Layout {
    pub const ALL: [Self; 4] = [Self::Base, Self::Recommended, Self::Commit, Self::Signature];

    pub fn size(&self) -> usize {
        match self {
            Self::Base => HEADER_V5_BASE_SIZE,
            Self::Recommended => HEADER_V5_RECOMMENDED_SIZE,
            Self::Commit => HEADER_V5_COMMIT_SIZE,
            Self::Signature => HEADER_V5_SIGNATURE_SIZE,
        }
    }

    /// Largest layout that fits in `head_size`.
    pub fn from_head_size(head_size: usize) -> Option<Self> {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|layout| layout.size() <= head_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderLayout {
    V3,
    V4,
    V5(V5Layout),
    /// A version newer than this library; only the generic prefix is known.
    Future(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRef {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDescriptor {
    pub version: u32,
    pub layout: HeaderLayout,
    pub header_size: usize,
    pub build_number: u32,
    pub base_address: u32,
    pub entry_point: u32,
    pub file_size: u32,
    pub param_offset: u32,
    pub region: Region,
    pub build_mode: BuildMode,
    pub phase: u8,
    /// v4 build timestamp, ASCII.
    pub timestamp: Option<String>,
    pub szs_required: u32,
    pub edit_version: u32,
    pub creation_time: u32,
    pub edit_time: u32,
    pub szs_recommended: u32,
    pub commit_time: u32,
    pub signature: Option<SignatureRef>,
}

impl HeaderDescriptor {
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let view = ByteView::new(bytes, "LE-CODE header");
        if view.len() < MIN_HEADER_SIZE {
            return Err(FormatError::truncated(
                view.what(),
                0,
                MIN_HEADER_SIZE,
                view.len(),
            ));
        }

        let magic = view.bytes_at(0, 4)?;
        if magic != LECODE_MAGIC {
            return Err(FormatError::magic(0, LECODE_MAGIC, magic));
        }

        let version = view.read_u32(OFF_VERSION)?;
        if version < 3 {
            return Err(FormatError::InvalidVersion {
                what: "LE-CODE",
                offset: OFF_VERSION,
                version,
            });
        }

        let mut header = Self {
            version,
            layout: HeaderLayout::V3,
            header_size: HEADER_V3_SIZE,
            build_number: view.read_u32(OFF_BUILD_NUMBER)?,
            base_address: view.read_u32(OFF_BASE_ADDRESS)?,
            entry_point: view.read_u32(OFF_ENTRY_POINT)?,
            file_size: view.read_u32(OFF_FILE_SIZE)?,
            param_offset: view.read_u32(OFF_PARAM)?,
            region: Region::from_raw(view.read_u8(OFF_REGION)?),
            build_mode: BuildMode::from_raw(view.read_u8(OFF_BUILD_MODE)?),
            phase: view.read_u8(OFF_PHASE)?,
            timestamp: None,
            szs_required: 0,
            edit_version: 0,
            creation_time: 0,
            edit_time: 0,
            szs_recommended: 0,
            commit_time: 0,
            signature: None,
        };

        if header.file_size as usize > view.len() {
            return Err(FormatError::truncated(
                "LE-CODE file",
                OFF_FILE_SIZE,
                header.file_size as usize,
                view.len(),
            ));
        }

        match version {
            3 => {}
            4 => {
                ensure_len(&view, HEADER_V4_SIZE)?;
                header.layout = HeaderLayout::V4;
                header.header_size = HEADER_V4_SIZE;
                header.timestamp =
                    Some(view.read_fixed_string(OFF_TIMESTAMP, HEADER_V4_TIMESTAMP_LEN)?);
            }
            5 => header.parse_v5(&view)?,
            other => header.layout = HeaderLayout::Future(other),
        }

        Ok(header)
    }

    fn parse_v5(&mut self, view: &ByteView<'_>) -> Result<(), FormatError> {
        ensure_len(view, HEADER_V5_BASE_SIZE)?;

        let head_size = view.read_u32(OFF_HEAD_SIZE)? as usize;
        let Some(layout) = V5Layout::from_head_size(head_size) else {
            return Err(FormatError::UnsupportedLayout {
                what: "LE-CODE v5 header",
                offset: OFF_HEAD_SIZE,
                size: head_size,
            });
        };
        ensure_len(view, head_size)?;

        self.layout = HeaderLayout::V5(layout);
        self.header_size = head_size;
        self.szs_required = view.read_u32(OFF_SZS_REQUIRED)?;
        self.edit_version = view.read_u32(OFF_EDIT_VERSION)?;
        self.creation_time = view.read_u32(OFF_CREATION_TIME)?;
        self.edit_time = view.read_u32(OFF_EDIT_TIME)?;

        if layout >= V5Layout::Recommended {
            self.szs_recommended = view.read_u32(OFF_SZS_RECOMMENDED)?;
        }
        if layout >= V5Layout::Commit {
            self.commit_time = view.read_u32(OFF_COMMIT_TIME)?;
        }
        if layout >= V5Layout::Signature {
            let offset = view.read_u32(OFF_SIGNATURE)?;
            let size = view.read_u32(OFF_SIGNATURE_SIZE)?;
            if offset != 0 && size != 0 {
                self.signature = Some(SignatureRef { offset, size });
            }
        }

        Ok(())
    }

    /// True when this tool version satisfies the binary's requirement.
    pub fn is_compatible(&self, tool_version: u32) -> bool {
        self.szs_required <= tool_version
    }

    /// Edit stamps only exist in the v5 header.
    pub fn has_edit_stamp(&self) -> bool {
        matches!(self.layout, HeaderLayout::V5(_))
    }
}

fn ensure_len(view: &ByteView<'_>, needed: usize) -> Result<(), FormatError> {
    if view.len() < needed {
        return Err(FormatError::truncated(view.what(), 0, needed, view.len()));
    }
    Ok(())
}
