use serde::{Deserialize, Serialize};

use crate::bounds::{self, BoundsMap};
use crate::error::{FormatError, FormatWarning, Warnings};
use crate::reader::ByteView;

use super::settings::{FieldVisitor, LparLayout, Settings};
use super::slots::{SlotModel, SlotTables, stored_racing_cups};
use super::types::{
    ARENAS_PER_CUP, COURSE_PAR_MAGIC, COURSE_PAR_SIZE, CUP_PAR_MAGIC, CUP_PAR_SIZE, LPAR_MAGIC,
    LPAR_VERSION, MAX_SLOTS, NO_SLOT, TRACKS_PER_CUP,
};

pub const PARAM_HEADER_SIZE: usize = 0x14;
pub const PARAM_POINTERS_END: usize = 0x30;

const OFF_LPAR_VERSION: usize = 0x08;
pub(crate) const OFF_LPAR_SIZE: usize = 0x0c;
const OFF_LPAR_EOD: usize = 0x10;
const OFF_POINTERS: usize = 0x14;

/// Arrays addressed by the pointer table, in pointer-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParamArray {
    CupPar,
    CupTrack,
    CupArena,
    CoursePar,
    Property,
    Music,
    Flags,
}

impl ParamArray {
    pub const ALL: [Self; 7] = [
        Self::CupPar,
        Self::CupTrack,
        Self::CupArena,
        Self::CoursePar,
        Self::Property,
        Self::Music,
        Self::Flags,
    ];

    /// Offset of this array's pointer inside the parameter block.
    pub fn pointer_offset(&self) -> usize {
        OFF_POINTERS + 4 * (*self as usize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CupPar => "cup_par",
            Self::CupTrack => "cup_track",
            Self::CupArena => "cup_arena",
            Self::CoursePar => "course_par",
            Self::Property => "property",
            Self::Music => "music",
            Self::Flags => "flags",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CupPar {
    pub version: u32,
    pub n_racing_cups: u32,
    pub n_battle_cups: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoursePar {
    pub n_slot: u32,
    pub flags_bits: u32,
}

#[derive(Debug, Clone)]
pub struct DecodedParam {
    pub param_offset: usize,
    pub version: u32,
    pub declared_size: usize,
    /// Length of the pointer region (end of data), clamped to the buffer.
    pub region_len: usize,
    pub layout: Option<LparLayout>,
    pub settings: Settings,
    pub pointers: Vec<(ParamArray, u32)>,
    pub bounds: BoundsMap<ParamArray>,
    pub cup_par: Option<CupPar>,
    pub course_par: Option<CoursePar>,
    pub slots: SlotModel,
    pub warnings: Vec<FormatWarning>,
}

struct DecodeVisitor<'a> {
    view: ByteView<'a>,
    size: usize,
}

impl DecodeVisitor<'_> {
    fn carries(&self, step: LparLayout) -> bool {
        step.size() <= self.size
    }
}

impl FieldVisitor for DecodeVisitor<'_> {
    fn byte(&mut self, step: LparLayout, offset: usize, value: &mut u8) {
        if self.carries(step) {
            if let Ok(raw) = self.view.read_u8(offset) {
                *value = raw;
            }
        }
    }

    fn half(&mut self, step: LparLayout, offset: usize, value: &mut u16) {
        if self.carries(step) {
            if let Ok(raw) = self.view.read_u16(offset) {
                *value = raw;
            }
        }
    }

    fn word(&mut self, step: LparLayout, offset: usize, value: &mut u32) {
        if self.carries(step) {
            if let Ok(raw) = self.view.read_u32(offset) {
                *value = raw;
            }
        }
    }

    fn flag(&mut self, step: LparLayout, offset: usize, value: &mut bool) {
        if self.carries(step) {
            if let Ok(raw) = self.view.read_u8(offset) {
                *value = raw != 0;
            }
        }
    }

    fn bit(&mut self, step: LparLayout, offset: usize, mask: u8, value: &mut bool) {
        if self.carries(step) {
            if let Ok(raw) = self.view.read_u8(offset) {
                *value = raw & mask != 0;
            }
        }
    }
}

/// Decode the parameter block at `param_offset`.
///
/// Only a bad block header is fatal. Pointer, count and array problems
/// are recovered locally and reported in `DecodedParam::warnings`.
pub fn decode_param(bytes: &[u8], param_offset: usize) -> Result<DecodedParam, FormatError> {
    if param_offset >= bytes.len() {
        return Err(FormatError::OffsetOutOfRange {
            what: "parameter block",
            offset: param_offset,
            limit: bytes.len(),
        });
    }
    let file = ByteView::new(bytes, "parameter block");
    let header = file.bytes_at(param_offset, PARAM_HEADER_SIZE)?;

    if &header[..LPAR_MAGIC.len()] != LPAR_MAGIC {
        return Err(FormatError::magic(
            param_offset,
            LPAR_MAGIC,
            &header[..LPAR_MAGIC.len()],
        ));
    }

    let head = ByteView::new(header, "parameter block");
    let version = head.read_u32(OFF_LPAR_VERSION)?;
    if version != LPAR_VERSION {
        return Err(FormatError::InvalidVersion {
            what: "parameter block",
            offset: param_offset + OFF_LPAR_VERSION,
            version,
        });
    }

    let declared_size = head.read_u32(OFF_LPAR_SIZE)? as usize;
    let available = bytes.len() - param_offset;
    if declared_size > available {
        return Err(FormatError::truncated(
            "parameter block",
            param_offset + OFF_LPAR_SIZE,
            declared_size,
            available,
        ));
    }

    let mut warnings = Warnings::default();
    let block = ByteView::new(
        &bytes[param_offset..param_offset + declared_size],
        "parameter block",
    );

    let layout = LparLayout::from_size(declared_size);
    if declared_size > LparLayout::CURRENT.size() {
        warnings.push(
            FormatError::UnsupportedLayout {
                what: "parameter block",
                offset: param_offset + OFF_LPAR_SIZE,
                size: declared_size,
            }
            .into(),
        );
    } else if layout.is_none() {
        warnings.warn(
            param_offset + OFF_LPAR_SIZE,
            format!("parameter block of {declared_size:#x} bytes carries no settings"),
        );
    }

    let mut settings = Settings::default();
    settings.visit_fields(&mut DecodeVisitor {
        view: block,
        size: declared_size,
    });

    let pointers = read_pointers(&block);

    let off_eod = head.read_u32(OFF_LPAR_EOD)? as usize;
    let mut region_len = off_eod;
    if region_len < declared_size {
        warnings.warn(
            param_offset + OFF_LPAR_EOD,
            format!("end of data {off_eod:#x} lies inside the settings ({declared_size:#x})"),
        );
        region_len = declared_size;
    }
    if region_len > available {
        warnings.warn(
            param_offset + OFF_LPAR_EOD,
            format!("end of data {off_eod:#x} exceeds the buffer, clamped to {available:#x}"),
        );
        region_len = available;
    }

    for &(array, offset) in &pointers {
        if offset != 0 && offset as usize >= region_len {
            warnings.push(
                FormatError::OffsetOutOfRange {
                    what: array.as_str(),
                    offset: offset as usize,
                    limit: region_len,
                }
                .into(),
            );
        }
    }

    let bounds = bounds::resolve(&pointers, region_len);
    let region = ByteView::new(
        &bytes[param_offset..param_offset + region_len],
        "parameter data",
    );

    let cup_par = decode_cup_par(&region, &bounds, &mut warnings);
    let course_par = decode_course_par(&region, &bounds, &mut warnings);
    let slots = decode_slots(&region, &bounds, cup_par, course_par, &mut warnings);

    Ok(DecodedParam {
        param_offset,
        version,
        declared_size,
        region_len,
        layout,
        settings,
        pointers,
        bounds,
        cup_par,
        course_par,
        slots,
        warnings: warnings.into_vec(),
    })
}

fn read_pointers(block: &ByteView<'_>) -> Vec<(ParamArray, u32)> {
    ParamArray::ALL
        .iter()
        .map(|&array| {
            let offset = if block.len() >= PARAM_POINTERS_END {
                block.read_u32(array.pointer_offset()).unwrap_or(0)
            } else {
                0
            };
            (array, offset)
        })
        .collect()
}

fn decode_cup_par(
    region: &ByteView<'_>,
    bounds: &BoundsMap<ParamArray>,
    warnings: &mut Warnings,
) -> Option<CupPar> {
    let range = bounds.range(ParamArray::CupPar)?;
    let view = region.sub_clamped("cup_par", range);
    if view.len() < CUP_PAR_SIZE {
        warnings.warn(range.start, "cup_par too short, cups ignored");
        return None;
    }
    let magic = view.bytes_at(0, 4).ok()?;
    if magic != CUP_PAR_MAGIC {
        warnings.push(FormatError::magic(range.start, CUP_PAR_MAGIC, magic).into());
        return None;
    }
    Some(CupPar {
        version: view.read_u32(0x04).ok()?,
        n_racing_cups: view.read_u32(0x08).ok()?,
        n_battle_cups: view.read_u32(0x0c).ok()?,
    })
}

fn decode_course_par(
    region: &ByteView<'_>,
    bounds: &BoundsMap<ParamArray>,
    warnings: &mut Warnings,
) -> Option<CoursePar> {
    let range = bounds.range(ParamArray::CoursePar)?;
    let view = region.sub_clamped("course_par", range);
    if view.len() < COURSE_PAR_SIZE {
        warnings.warn(range.start, "course_par too short, slots ignored");
        return None;
    }
    let magic = view.bytes_at(0, 4).ok()?;
    if magic != COURSE_PAR_MAGIC {
        warnings.push(FormatError::magic(range.start, COURSE_PAR_MAGIC, magic).into());
        return None;
    }
    Some(CoursePar {
        n_slot: view.read_u32(0x04).ok()?,
        flags_bits: view.read_u32(0x08).ok()?,
    })
}

fn decode_slots(
    region: &ByteView<'_>,
    bounds: &BoundsMap<ParamArray>,
    cup_par: Option<CupPar>,
    course_par: Option<CoursePar>,
    warnings: &mut Warnings,
) -> SlotModel {
    let cup_par = cup_par.unwrap_or_default();
    let course_par = course_par.unwrap_or_default();

    let flags_bits: u8 = match course_par.flags_bits {
        8 | 0 => 8,
        16 => 16,
        other => {
            let offset = bounds.get(ParamArray::CoursePar).range.start + 0x08;
            warnings.warn(offset, format!("unsupported flag width {other}, using 8 bits"));
            8
        }
    };
    let flag_width = usize::from(flags_bits / 8);

    let mut n_slot = course_par.n_slot as usize;
    if n_slot > MAX_SLOTS {
        let offset = bounds.get(ParamArray::CoursePar).range.start + 0x04;
        warnings.warn(offset, format!("slot count {n_slot:#x} clamped to {MAX_SLOTS:#x}"));
        n_slot = MAX_SLOTS;
    }
    let max_slot = bounds
        .max_count(ParamArray::Property, 1)
        .min(bounds.max_count(ParamArray::Music, 1))
        .min(bounds.max_count(ParamArray::Flags, flag_width));
    let max_cup_track = bounds.max_count(ParamArray::CupTrack, 4 * TRACKS_PER_CUP);
    let max_cup_arena = bounds.max_count(ParamArray::CupArena, 4 * ARENAS_PER_CUP);

    let n_cup_track = cup_par.n_racing_cups as usize;
    let n_cup_arena = cup_par.n_battle_cups as usize;

    let slot_count = clip_count(n_slot, max_slot, "slot", bounds, ParamArray::Property, warnings);
    let track_cups = clip_count(
        n_cup_track,
        max_cup_track,
        "racing cup",
        bounds,
        ParamArray::CupTrack,
        warnings,
    );
    let arena_cups = clip_count(
        n_cup_arena,
        max_cup_arena,
        "battle cup",
        bounds,
        ParamArray::CupArena,
        warnings,
    );

    let read = |array: ParamArray, n: usize, width: usize| -> Vec<u32> {
        match bounds.range(array) {
            Some(range) => region
                .sub_clamped(array.as_str(), range)
                .read_be_vec(0, n, width)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    };

    let property = read(ParamArray::Property, slot_count, 1)
        .into_iter()
        .map(|v| v as u8)
        .collect();
    let music = read(ParamArray::Music, slot_count, 1)
        .into_iter()
        .map(|v| v as u8)
        .collect();
    let flags = read(ParamArray::Flags, slot_count, flag_width)
        .into_iter()
        .map(|v| v as u16)
        .collect();
    // The padding cup after an odd cup count is kept when the table has room.
    let stored_cups = stored_racing_cups(track_cups).min(max_cup_track.max(track_cups));
    let cup_track = read(ParamArray::CupTrack, stored_cups * TRACKS_PER_CUP, 4);
    let cup_arena = read(ParamArray::CupArena, arena_cups * ARENAS_PER_CUP, 4);

    let bad_refs = cup_track
        .iter()
        .chain(cup_arena.iter())
        .filter(|&&slot| slot != NO_SLOT && slot as usize >= n_slot)
        .count();
    if bad_refs > 0 {
        warnings.warn(
            bounds.get(ParamArray::CupTrack).range.start,
            format!("{bad_refs} cup entries reference slots beyond {n_slot:#x}"),
        );
    }

    SlotModel::from_tables(SlotTables {
        property,
        music,
        flags,
        flags_bits,
        cup_track,
        cup_arena,
        n_slot,
        n_cup_track,
        n_cup_arena,
        max_slot,
        max_cup_track,
        max_cup_arena,
        format_version: cup_par.version,
    })
}

fn clip_count(
    declared: usize,
    max: usize,
    label: &str,
    bounds: &BoundsMap<ParamArray>,
    array: ParamArray,
    warnings: &mut Warnings,
) -> usize {
    if declared > max {
        warnings.warn(
            bounds.get(array).range.start,
            format!("{declared} {label} entries declared, only room for {max}"),
        );
        max
    } else {
        declared
    }
}
