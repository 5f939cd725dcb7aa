//! Gated write-back into an existing parameter block.
//!
//! Fields are only written where the target block has room for them, so
//! patching an old, small block never grows it and bytes the decoder
//! never reached stay untouched.

use crate::bounds::BoundsMap;
use crate::config::ToolConfig;
use crate::error::FormatError;
use crate::layout::ByteRange;

use super::header::{HeaderDescriptor, OFF_EDIT_TIME, OFF_EDIT_VERSION};
use super::param::ParamArray;
use super::settings::{FieldVisitor, LparLayout, Settings};
use super::slots::SlotModel;

const OFF_CUP_PAR_RACING: usize = 0x08;
const OFF_CUP_PAR_BATTLE: usize = 0x0c;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchReport {
    pub changed_bytes: usize,
    pub stamped: bool,
}

impl PatchReport {
    pub fn is_noop(&self) -> bool {
        self.changed_bytes == 0
    }

    pub fn merge(self, other: PatchReport) -> PatchReport {
        PatchReport {
            changed_bytes: self.changed_bytes + other.changed_bytes,
            stamped: self.stamped || other.stamped,
        }
    }
}

struct WriteVisitor<'a> {
    block: &'a mut [u8],
    size: usize,
    changed: usize,
}

impl WriteVisitor<'_> {
    /// Same gate as the decoder: a step is written only when the whole
    /// step fits. Bytes of a partial step stay as they are.
    fn carries(&self, step: LparLayout) -> bool {
        step.size() <= self.size
    }

    fn put(&mut self, offset: usize, raw: &[u8]) {
        let Some(dest) = self.block.get_mut(offset..offset + raw.len()) else {
            return;
        };
        for (d, &s) in dest.iter_mut().zip(raw) {
            if *d != s {
                *d = s;
                self.changed += 1;
            }
        }
    }
}

impl FieldVisitor for WriteVisitor<'_> {
    fn byte(&mut self, step: LparLayout, offset: usize, value: &mut u8) {
        if self.carries(step) {
            self.put(offset, &[*value]);
        }
    }

    fn half(&mut self, step: LparLayout, offset: usize, value: &mut u16) {
        if self.carries(step) {
            self.put(offset, &value.to_be_bytes());
        }
    }

    fn word(&mut self, step: LparLayout, offset: usize, value: &mut u32) {
        if self.carries(step) {
            self.put(offset, &value.to_be_bytes());
        }
    }

    fn flag(&mut self, step: LparLayout, offset: usize, value: &mut bool) {
        if !self.carries(step) {
            return;
        }
        // Any non-zero byte already reads as true; keep it.
        if let Some(&current) = self.block.get(offset) {
            if (current != 0) != *value {
                self.put(offset, &[u8::from(*value)]);
            }
        }
    }

    fn bit(&mut self, step: LparLayout, offset: usize, mask: u8, value: &mut bool) {
        if !self.carries(step) {
            return;
        }
        if let Some(&current) = self.block.get(offset) {
            let next = if *value { current | mask } else { current & !mask };
            self.put(offset, &[next]);
        }
    }
}

/// Write `settings` into the parameter block of `bytes`.
///
/// `param_size` is the size of the block present in the target buffer.
/// Only cascade steps that fit completely below `param_size` are written;
/// trailing bytes of a partial step are left alone.
pub fn write_back(
    bytes: &mut [u8],
    header: &HeaderDescriptor,
    settings: &Settings,
    param_size: usize,
    config: &ToolConfig,
) -> Result<PatchReport, FormatError> {
    let minimum = LparLayout::SMALLEST.size();
    if param_size < minimum {
        return Err(FormatError::ParamTooSmall {
            size: param_size,
            minimum,
        });
    }

    let start = header.param_offset as usize;
    let block = block_mut(bytes, start, param_size)?;

    let mut report = PatchReport {
        changed_bytes: write_settings(block, param_size, settings),
        stamped: false,
    };
    if !report.is_noop() {
        log::debug!("patched {} parameter bytes at {start:#x}", report.changed_bytes);
        report.stamped = stamp_edit(bytes, header, config);
    }
    Ok(report)
}

/// Write the fields of every cascade step carried by a block of `size`
/// bytes, returning the number of bytes that changed.
pub(crate) fn write_settings(block: &mut [u8], size: usize, settings: &Settings) -> usize {
    let mut visitor = WriteVisitor {
        block,
        size,
        changed: 0,
    };
    settings.clone().visit_fields(&mut visitor);
    visitor.changed
}

/// Write the slot and cup tables back into their resolved ranges.
///
/// Rejected when any declared count exceeds the room the binary has.
pub fn write_slots(
    bytes: &mut [u8],
    header: &HeaderDescriptor,
    bounds: &BoundsMap<ParamArray>,
    slots: &SlotModel,
    config: &ToolConfig,
) -> Result<PatchReport, FormatError> {
    slots.check_capacity()?;

    let base = header.param_offset as usize;
    let flag_width = usize::from(slots.flags_bits() / 8);
    let mut changed = 0;

    let tables: [(ParamArray, Vec<u32>, usize); 5] = [
        (
            ParamArray::Property,
            slots.property().iter().map(|&v| u32::from(v)).collect(),
            1,
        ),
        (
            ParamArray::Music,
            slots.music().iter().map(|&v| u32::from(v)).collect(),
            1,
        ),
        (
            ParamArray::Flags,
            slots.raw_flags().iter().map(|&v| u32::from(v)).collect(),
            flag_width,
        ),
        (ParamArray::CupTrack, slots.cup_track().to_vec(), 4),
        (ParamArray::CupArena, slots.cup_arena().to_vec(), 4),
    ];

    for (array, values, width) in tables {
        let Some(range) = bounds.range(array) else {
            if !values.is_empty() {
                return Err(FormatError::OffsetOutOfRange {
                    what: array.as_str(),
                    offset: 0,
                    limit: bounds.region_len(),
                });
            }
            continue;
        };
        changed += write_elems(bytes, range.offset_by(base), &values, width, array.as_str())?;
    }

    if let Some(range) = bounds.range(ParamArray::CupPar) {
        let cup_par = range.offset_by(base);
        let counts = [
            (OFF_CUP_PAR_RACING, slots.n_cup_track() as u32),
            (OFF_CUP_PAR_BATTLE, slots.n_cup_arena() as u32),
        ];
        for (offset, count) in counts {
            let field = ByteRange::new(cup_par.start + offset, cup_par.start + offset + 4);
            if field.end <= cup_par.end {
                changed += write_elems(bytes, field, &[count], 4, "cup_par")?;
            }
        }
    }

    let mut report = PatchReport {
        changed_bytes: changed,
        stamped: false,
    };
    if !report.is_noop() {
        log::debug!("patched {changed} slot table bytes");
        report.stamped = stamp_edit(bytes, header, config);
    }
    Ok(report)
}

/// Stamp `edit_version` and `edit_time`. Only v5 headers carry them.
fn stamp_edit(bytes: &mut [u8], header: &HeaderDescriptor, config: &ToolConfig) -> bool {
    if !header.has_edit_stamp() || bytes.len() < OFF_EDIT_TIME + 4 {
        return false;
    }
    let now = config.now();
    bytes[OFF_EDIT_VERSION..OFF_EDIT_VERSION + 4]
        .copy_from_slice(&config.tool_version.to_be_bytes());
    bytes[OFF_EDIT_TIME..OFF_EDIT_TIME + 4].copy_from_slice(&now.to_be_bytes());
    log::debug!("stamped edit version {} at time {now}", config.tool_version);
    true
}

fn block_mut(bytes: &mut [u8], start: usize, size: usize) -> Result<&mut [u8], FormatError> {
    let available = bytes.len();
    let end = start
        .checked_add(size)
        .filter(|&end| end <= available)
        .ok_or_else(|| FormatError::truncated("parameter block", start, size, available))?;
    Ok(&mut bytes[start..end])
}

fn write_elems(
    bytes: &mut [u8],
    range: ByteRange,
    values: &[u32],
    width: usize,
    what: &'static str,
) -> Result<usize, FormatError> {
    let needed = values.len() * width;
    if needed > range.len() || range.end > bytes.len() {
        return Err(FormatError::OffsetOutOfRange {
            what,
            offset: range.start + needed,
            limit: range.end.min(bytes.len()),
        });
    }

    let mut changed = 0;
    for (i, &value) in values.iter().enumerate() {
        let raw = value.to_be_bytes();
        let src = &raw[4 - width..];
        let pos = range.start + i * width;
        for (d, &s) in bytes[pos..pos + width].iter_mut().zip(src) {
            if *d != s {
                *d = s;
                changed += 1;
            }
        }
    }
    Ok(changed)
}
