pub mod header;
pub mod param;
pub mod patch;
pub mod settings;
pub mod slots;
pub mod template;
pub mod types;

use crate::config::ToolConfig;
use crate::error::{FormatError, FormatWarning, Warnings};
use crate::layout::{FileLayout, SectionId};
use header::HeaderDescriptor;
use param::{DecodedParam, decode_param};
use patch::{PatchReport, write_back, write_slots};
use settings::{LparLayout, Settings};
use slots::SlotModel;

/// A decoded LE-CODE binary.
///
/// The original bytes are kept untouched; edits go to `settings` and
/// `slots` and are only written when a modified copy is requested.
#[derive(Debug, Clone)]
pub struct Document {
    pub header: HeaderDescriptor,
    param: DecodedParam,
    settings: Settings,
    slots: SlotModel,
    layout: FileLayout,
    warnings: Vec<FormatWarning>,
    original: Vec<u8>,
}

impl Document {
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let header = HeaderDescriptor::parse(bytes)?;

        let param_offset = header.param_offset as usize;
        if param_offset < header.header_size {
            return Err(FormatError::Layout {
                offset: 0x18,
                message: format!(
                    "parameter block at {param_offset:#x} overlaps the {:#x}-byte header",
                    header.header_size
                ),
            });
        }
        let param = decode_param(bytes, param_offset)?;

        let layout = FileLayout::from_offsets(
            bytes.len(),
            header.header_size,
            param_offset,
            param.declared_size,
            param.region_len,
            header.file_size as usize,
        )?;

        let mut warnings = Warnings::default();
        if let Some(trailer) = layout.section(SectionId::Trailer) {
            warnings.warn(
                trailer.range.start,
                format!(
                    "{:#x} bytes follow the declared file size",
                    trailer.range.len()
                ),
            );
        }
        let mut all = param.warnings.clone();
        all.extend(warnings.into_vec());

        Ok(Self {
            header,
            settings: param.settings.clone(),
            slots: param.slots.clone(),
            param,
            layout,
            warnings: all,
            original: bytes.to_vec(),
        })
    }

    pub fn param(&self) -> &DecodedParam {
        &self.param
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    pub fn warnings(&self) -> &[FormatWarning] {
        &self.warnings
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn slots(&self) -> &SlotModel {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut SlotModel {
        &mut self.slots
    }

    pub fn is_compatible(&self, config: &ToolConfig) -> bool {
        self.header.is_compatible(config.tool_version)
    }

    pub fn is_modified(&self) -> bool {
        self.settings != self.param.settings || self.slots != self.param.slots
    }

    pub fn to_bytes_unmodified(&self) -> Vec<u8> {
        self.original.clone()
    }

    pub fn to_bytes_modified(&self, config: &ToolConfig) -> Result<Vec<u8>, FormatError> {
        self.patch(config).map(|(bytes, _)| bytes)
    }

    /// Apply the edited settings and slot tables to a copy of the original.
    ///
    /// Slot tables are only rewritten when they differ from what was
    /// decoded, so an untouched binary keeps its flag bytes even if they
    /// are stale.
    pub fn patch(&self, config: &ToolConfig) -> Result<(Vec<u8>, PatchReport), FormatError> {
        let mut bytes = self.original.clone();

        // A block without settings can still carry slot tables.
        let mut report = PatchReport::default();
        if self.param.declared_size >= LparLayout::SMALLEST.size()
            || self.settings != self.param.settings
        {
            report = write_back(
                &mut bytes,
                &self.header,
                &self.settings,
                self.param.declared_size,
                config,
            )?;
        }

        if self.slots != self.param.slots {
            let mut slots = self.slots.clone();
            if config.recompute_flags {
                slots.recompute_flags();
            }
            let written =
                write_slots(&mut bytes, &self.header, &self.param.bounds, &slots, config)?;
            report = report.merge(written);
        }

        Ok((bytes, report))
    }
}
