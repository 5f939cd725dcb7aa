//! Synthetic LE-CODE binaries.
//!
//! A template lays out a complete, decodable binary: header, a code stub,
//! the parameter block and its data arrays, then a short tail. The
//! per-region defaults double as the read-only reference binaries the
//! session API compares against.

use super::header::V5Layout;
use super::param::{PARAM_POINTERS_END, ParamArray};
use super::patch::write_settings;
use super::settings::{LparLayout, Settings};
use super::slots::{SlotModel, SlotTables, stored_racing_cups};
use super::types::{
    ARENA_SLOTS, BuildMode, COURSE_PAR_MAGIC, COURSE_PAR_SIZE, CUP_PAR_MAGIC, CUP_PAR_SIZE,
    FIRST_CUSTOM_SLOT, HEADER_V3_SIZE, HEADER_V4_SIZE, HEADER_V4_TIMESTAMP_LEN, LECODE_MAGIC,
    LPAR_MAGIC, LPAR_VERSION, MKW_N_TRACKS, NO_SLOT, Region,
};

const PPC_NOP: u32 = 0x6000_0000;
const PPC_BLR: u32 = 0x4e80_0020;
const TEMPLATE_TIMESTAMP: &str = "2023-06-01 12:00:00";
const TEMPLATE_CREATION_TIME: u32 = 1_685_620_800;
const FIRST_TRACK_MUSIC: u8 = 0x75;

#[derive(Debug, Clone)]
pub struct Template {
    /// Header version, 3 to 5. Anything above 5 is written with the
    /// generic 0x20-byte prefix only.
    pub version: u32,
    pub v5_layout: V5Layout,
    pub region: Region,
    pub build_mode: BuildMode,
    pub build_number: u32,
    pub szs_required: u32,
    pub szs_recommended: u32,
    pub creation_time: u32,
    pub param_offset: usize,
    /// Declared size of the parameter block; fields past it are not written.
    pub param_size: usize,
    pub settings: Settings,
    pub slots: SlotModel,
    pub tail_len: usize,
}

impl Template {
    pub fn new(region: Region) -> Self {
        Self {
            version: 5,
            v5_layout: V5Layout::Signature,
            region,
            build_mode: BuildMode::Release,
            build_number: 1,
            szs_required: 0,
            szs_recommended: 0,
            creation_time: TEMPLATE_CREATION_TIME,
            param_offset: 0x100,
            param_size: LparLayout::CURRENT.size(),
            settings: Settings::recommended(),
            slots: default_slots(),
            tail_len: 0x20,
        }
    }

    pub fn header_size(&self) -> usize {
        match self.version {
            4 => HEADER_V4_SIZE,
            5 => self.v5_layout.size(),
            _ => HEADER_V3_SIZE,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let header_size = self.header_size();
        let param_offset = align4(self.param_offset.max(header_size));
        let param_size = self.param_size.max(PARAM_POINTERS_END);

        let slots = &self.slots;
        let flag_width = usize::from(slots.flags_bits() / 8);
        let n_slot = slots.n_slot();
        let track_entries = stored_racing_cups(slots.n_cup_track()) * 4;
        let arena_entries = slots.n_cup_arena() * 5;

        // Array placement relative to the parameter block.
        let mut cursor = align4(param_size);
        let mut place = |len: usize| {
            let at = cursor;
            cursor = align4(cursor + len);
            if len == 0 { 0 } else { at }
        };
        let pointers = [
            (ParamArray::CupPar, place(CUP_PAR_SIZE)),
            (ParamArray::CupTrack, place(track_entries * 4)),
            (ParamArray::CupArena, place(arena_entries * 4)),
            (ParamArray::CoursePar, place(COURSE_PAR_SIZE)),
            (ParamArray::Property, place(n_slot)),
            (ParamArray::Music, place(n_slot)),
            (ParamArray::Flags, place(n_slot * flag_width)),
        ];
        let eod = cursor;

        let tail_start = param_offset + eod;
        let file_size = tail_start + align4(self.tail_len);
        let mut out = vec![0u8; file_size];

        self.write_header(&mut out, header_size, param_offset, file_size);
        fill_code(&mut out[header_size..param_offset]);
        fill_code(&mut out[tail_start..]);

        let block = &mut out[param_offset..];
        block[..LPAR_MAGIC.len()].copy_from_slice(LPAR_MAGIC);
        put_u32(block, 0x08, LPAR_VERSION);
        put_u32(block, 0x0c, param_size as u32);
        put_u32(block, 0x10, eod as u32);
        for &(array, offset) in &pointers {
            put_u32(block, array.pointer_offset(), offset as u32);
        }
        write_settings(&mut block[..param_size], param_size, &self.settings);

        let at = |array: ParamArray| {
            pointers
                .iter()
                .find(|(a, _)| *a == array)
                .map_or(0, |&(_, offset)| offset)
        };

        let cup_par = at(ParamArray::CupPar);
        block[cup_par..cup_par + 4].copy_from_slice(CUP_PAR_MAGIC);
        put_u32(block, cup_par + 0x04, slots.format_version());
        put_u32(block, cup_par + 0x08, slots.n_cup_track() as u32);
        put_u32(block, cup_par + 0x0c, slots.n_cup_arena() as u32);

        let course_par = at(ParamArray::CoursePar);
        block[course_par..course_par + 4].copy_from_slice(COURSE_PAR_MAGIC);
        put_u32(block, course_par + 0x04, n_slot as u32);
        put_u32(block, course_par + 0x08, u32::from(slots.flags_bits()));

        let cup_track = at(ParamArray::CupTrack);
        for i in 0..track_entries {
            let slot = slots.cup_track().get(i).copied().unwrap_or(NO_SLOT);
            put_u32(block, cup_track + i * 4, slot);
        }
        let cup_arena = at(ParamArray::CupArena);
        for (i, &slot) in slots.cup_arena().iter().take(arena_entries).enumerate() {
            put_u32(block, cup_arena + i * 4, slot);
        }

        let property = at(ParamArray::Property);
        for (i, &value) in slots.property().iter().take(n_slot).enumerate() {
            block[property + i] = value;
        }
        let music = at(ParamArray::Music);
        for (i, &value) in slots.music().iter().take(n_slot).enumerate() {
            block[music + i] = value;
        }
        let flags = at(ParamArray::Flags);
        for (i, &value) in slots.raw_flags().iter().take(n_slot).enumerate() {
            let raw = value.to_be_bytes();
            let pos = flags + i * flag_width;
            block[pos..pos + flag_width].copy_from_slice(&raw[2 - flag_width..]);
        }

        out
    }

    fn write_header(
        &self,
        out: &mut [u8],
        header_size: usize,
        param_offset: usize,
        file_size: usize,
    ) {
        let base_address = base_address(self.region);
        out[..4].copy_from_slice(LECODE_MAGIC);
        put_u32(out, 0x04, self.version);
        put_u32(out, 0x08, self.build_number);
        put_u32(out, 0x0c, base_address);
        put_u32(out, 0x10, base_address + header_size as u32);
        put_u32(out, 0x14, file_size as u32);
        put_u32(out, 0x18, param_offset as u32);
        out[0x1c] = self.region.raw();
        out[0x1d] = self.build_mode.raw();

        match self.version {
            4 => {
                let text = TEMPLATE_TIMESTAMP.as_bytes();
                let len = text.len().min(HEADER_V4_TIMESTAMP_LEN - 1);
                out[0x20..0x20 + len].copy_from_slice(&text[..len]);
            }
            5 => {
                put_u32(out, 0x20, self.szs_required);
                put_u32(out, 0x28, header_size as u32);
                put_u32(out, 0x2c, self.creation_time);
                if self.v5_layout >= V5Layout::Recommended {
                    put_u32(out, 0x34, self.szs_recommended);
                }
                if self.v5_layout >= V5Layout::Commit {
                    put_u32(out, 0x38, self.creation_time);
                }
            }
            _ => {}
        }
    }
}

/// The reference binary for `region`.
pub fn default_binary(region: Region) -> Vec<u8> {
    Template::new(region).build()
}

/// Original track and arena slots, the 8 original racing cups and the 2
/// original battle cups, with derived flags applied.
pub fn default_slots() -> SlotModel {
    let mut property = vec![0; FIRST_CUSTOM_SLOT];
    let mut music = vec![0; FIRST_CUSTOM_SLOT];
    for slot in 0..ARENA_SLOTS.end {
        property[slot] = slot as u8;
        music[slot] = FIRST_TRACK_MUSIC + slot as u8;
    }
    let mut slots = SlotModel::from_tables(SlotTables {
        property,
        music,
        flags: vec![0; FIRST_CUSTOM_SLOT],
        flags_bits: 16,
        n_slot: FIRST_CUSTOM_SLOT,
        max_slot: FIRST_CUSTOM_SLOT,
        format_version: 2,
        ..SlotTables::default()
    });
    slots.set_cup_track((0..MKW_N_TRACKS as u32).collect());
    slots.set_cup_arena(ARENA_SLOTS.map(|s| s as u32).collect());
    slots.recompute_flags();
    slots
}

fn base_address(region: Region) -> u32 {
    match region {
        Region::Pal => 0x8078_6000,
        Region::Usa => 0x8078_1c00,
        Region::Japan => 0x8078_5c00,
        Region::Korea => 0x8077_4000,
        Region::Unknown(_) => 0x8078_0000,
    }
}

fn fill_code(code: &mut [u8]) {
    for (i, word) in code.chunks_exact_mut(4).enumerate() {
        let op = if i == 0 { PPC_BLR } else { PPC_NOP };
        word.copy_from_slice(&op.to_be_bytes());
    }
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn align4(n: usize) -> usize {
    n.div_ceil(4) * 4
}
