use serde::{Deserialize, Serialize};

use crate::error::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Shift by `base`, used to turn block-relative ranges into file offsets.
    pub fn offset_by(&self, base: usize) -> Self {
        Self {
            start: self.start.saturating_add(base),
            end: self.end.saturating_add(base),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionId {
    Header,
    Code,
    Param,
    ParamData,
    Tail,
    /// Bytes after the declared file size.
    Trailer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLayout {
    pub id: SectionId,
    pub range: ByteRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLayout {
    pub file_len: usize,
    pub sections: Vec<SectionLayout>,
}

impl FileLayout {
    /// Build the layout of an LE-CODE binary from its structural offsets.
    /// Empty sections are skipped so the list only names bytes that exist.
    pub fn from_offsets(
        file_len: usize,
        header_size: usize,
        param_offset: usize,
        param_size: usize,
        param_eod: usize,
        declared_file_size: usize,
    ) -> Result<Self, FormatError> {
        let param_end = param_offset.saturating_add(param_size);
        let data_end = param_offset.saturating_add(param_eod.max(param_size));
        let declared_end = declared_file_size.max(data_end).min(file_len);

        let bounds = [
            (SectionId::Header, 0, header_size),
            (SectionId::Code, header_size, param_offset),
            (SectionId::Param, param_offset, param_end),
            (SectionId::ParamData, param_end, data_end),
            (SectionId::Tail, data_end, declared_end),
            (SectionId::Trailer, declared_end, file_len),
        ];

        let mut sections = Vec::with_capacity(bounds.len());
        for (id, start, end) in bounds {
            if end < start {
                return Err(FormatError::Layout {
                    offset: start,
                    message: format!("section {id:?} ends at {end:#x} before its start"),
                });
            }
            if start != end {
                sections.push(SectionLayout {
                    id,
                    range: ByteRange { start, end },
                });
            }
        }

        let layout = Self { file_len, sections };
        layout.validate()?;
        Ok(layout)
    }

    pub fn section(&self, id: SectionId) -> Option<&SectionLayout> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn range_of(&self, id: SectionId) -> ByteRange {
        self.section(id).map(|s| s.range).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        let Some(first) = self.sections.first() else {
            return Err(FormatError::Layout {
                offset: 0,
                message: "file layout must contain at least one section".to_string(),
            });
        };

        if first.range.start != 0 {
            return Err(FormatError::Layout {
                offset: first.range.start,
                message: "layout does not start at byte 0".to_string(),
            });
        }

        let mut expected = 0usize;
        for section in &self.sections {
            if section.range.start != expected {
                return Err(FormatError::Layout {
                    offset: section.range.start,
                    message: format!(
                        "layout gap/overlap around section {:?}: expected start {:#x}, got {:#x}",
                        section.id, expected, section.range.start
                    ),
                });
            }
            if section.range.end < section.range.start {
                return Err(FormatError::Layout {
                    offset: section.range.start,
                    message: format!(
                        "invalid section range {:?}: {:#x}..{:#x}",
                        section.id, section.range.start, section.range.end
                    ),
                });
            }
            expected = section.range.end;
        }

        if expected != self.file_len {
            return Err(FormatError::Layout {
                offset: expected,
                message: format!(
                    "layout does not cover file: ended at {:#x}, file length {:#x}",
                    expected, self.file_len
                ),
            });
        }

        Ok(())
    }
}
