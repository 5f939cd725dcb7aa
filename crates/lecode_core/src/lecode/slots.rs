//! Per-slot arrays, cup tables and the data derived from them.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

use super::types::{
    ARENA_SLOTS, ARENAS_PER_CUP, FIRST_CUSTOM_SLOT, LE_RANDOM_SLOTS, LEGACY_NETWORK_SLOT,
    MKW_N_ARENAS, MKW_N_TRACKS, NETWORK_SLOT, NO_SLOT, SPECIAL_SLOTS, SlotFlags,
    TRACKS_PER_CUP, is_arena_property,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UsageKind {
    Unused,
    Arena,
    ArenaHidden,
    ArenaRandom,
    Track,
    TrackHidden,
    TrackRandom,
    LeCodeRandom,
    Special,
    Network,
    Alias,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Arena => "arena",
            Self::ArenaHidden => "arena-hidden",
            Self::ArenaRandom => "arena-random",
            Self::Track => "track",
            Self::TrackHidden => "track-hidden",
            Self::TrackRandom => "track-random",
            Self::LeCodeRandom => "lecode-random",
            Self::Special => "special",
            Self::Network => "network",
            Self::Alias => "alias",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotUsage {
    pub kind: UsageKind,
    pub online: bool,
}

impl SlotUsage {
    pub const UNUSED: Self = Self::new(UsageKind::Unused, false);

    pub const fn new(kind: UsageKind, online: bool) -> Self {
        Self { kind, online }
    }
}

impl fmt::Display for SlotUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if self.online {
            f.write_str("+online")?;
        }
        Ok(())
    }
}

/// Raw tables handed over by the decoder.
#[derive(Debug, Clone, Default)]
pub(crate) struct SlotTables {
    pub property: Vec<u8>,
    pub music: Vec<u8>,
    pub flags: Vec<u16>,
    pub flags_bits: u8,
    pub cup_track: Vec<u32>,
    pub cup_arena: Vec<u32>,
    pub n_slot: usize,
    pub n_cup_track: usize,
    pub n_cup_arena: usize,
    pub max_slot: usize,
    pub max_cup_track: usize,
    pub max_cup_arena: usize,
    pub format_version: u32,
}

#[derive(Debug, Clone)]
pub struct SlotModel {
    tables: SlotTables,
    usage: OnceCell<Vec<SlotUsage>>,
}

impl PartialEq for SlotModel {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.tables, &other.tables);
        a.property == b.property
            && a.music == b.music
            && a.flags == b.flags
            && a.flags_bits == b.flags_bits
            && a.cup_track == b.cup_track
            && a.cup_arena == b.cup_arena
            && a.n_slot == b.n_slot
            && a.n_cup_track == b.n_cup_track
            && a.n_cup_arena == b.n_cup_arena
            && a.max_slot == b.max_slot
            && a.max_cup_track == b.max_cup_track
            && a.max_cup_arena == b.max_cup_arena
            && a.format_version == b.format_version
    }
}

impl Eq for SlotModel {}

/// Track cup entries are walked in whole cups; a trailing partial cup
/// is padded with `NO_SLOT` entries.
pub fn padded_cup_track_len(entries: usize) -> usize {
    entries.div_ceil(TRACKS_PER_CUP) * TRACKS_PER_CUP
}

/// Racing cups are stored in pairs. A binary with an odd cup count carries
/// one padding cup after the last declared one.
pub fn stored_racing_cups(cups: usize) -> usize {
    cups.next_multiple_of(2)
}

impl SlotModel {
    /// Empty model with `n_slot` zeroed slots and room for exactly that many.
    pub fn new(n_slot: usize, flags_bits: u8) -> Self {
        Self::from_tables(SlotTables {
            property: vec![0; n_slot],
            music: vec![0; n_slot],
            flags: vec![0; n_slot],
            flags_bits: if flags_bits == 16 { 16 } else { 8 },
            n_slot,
            max_slot: n_slot,
            format_version: 2,
            ..SlotTables::default()
        })
    }

    pub(crate) fn from_tables(tables: SlotTables) -> Self {
        Self {
            tables,
            usage: OnceCell::new(),
        }
    }

    fn invalidate(&mut self) {
        self.usage = OnceCell::new();
    }

    pub fn n_slot(&self) -> usize {
        self.tables.n_slot
    }

    pub fn n_cup_track(&self) -> usize {
        self.tables.n_cup_track
    }

    pub fn n_cup_arena(&self) -> usize {
        self.tables.n_cup_arena
    }

    pub fn max_slot(&self) -> usize {
        self.tables.max_slot
    }

    pub fn max_cup_track(&self) -> usize {
        self.tables.max_cup_track
    }

    pub fn max_cup_arena(&self) -> usize {
        self.tables.max_cup_arena
    }

    pub fn flags_bits(&self) -> u8 {
        self.tables.flags_bits
    }

    pub fn format_version(&self) -> u32 {
        self.tables.format_version
    }

    pub fn property(&self) -> &[u8] {
        &self.tables.property
    }

    pub fn music(&self) -> &[u8] {
        &self.tables.music
    }

    pub fn raw_flags(&self) -> &[u16] {
        &self.tables.flags
    }

    pub fn cup_track(&self) -> &[u32] {
        &self.tables.cup_track
    }

    pub fn cup_arena(&self) -> &[u32] {
        &self.tables.cup_arena
    }

    /// Counts clamped to capacity, for display.
    pub fn clamped_n_slot(&self) -> usize {
        self.tables.n_slot.min(self.tables.max_slot)
    }

    pub fn clamped_n_cup_track(&self) -> usize {
        self.tables.n_cup_track.min(self.tables.max_cup_track)
    }

    pub fn clamped_n_cup_arena(&self) -> usize {
        self.tables.n_cup_arena.min(self.tables.max_cup_arena)
    }

    /// Counts must fit their capacities before the tables may be written.
    pub fn check_capacity(&self) -> Result<(), FormatError> {
        let t = &self.tables;
        let checks = [
            ("slot table", t.n_slot, t.max_slot),
            ("racing cup table", t.n_cup_track, t.max_cup_track),
            ("battle cup table", t.n_cup_arena, t.max_cup_arena),
        ];
        for (what, n, max) in checks {
            if n > max {
                return Err(FormatError::OffsetOutOfRange {
                    what,
                    offset: n,
                    limit: max,
                });
            }
        }
        Ok(())
    }

    pub fn slot_flags(&self, slot: usize) -> SlotFlags {
        self.tables
            .flags
            .get(slot)
            .map(|&raw| SlotFlags::from_bits_retain(raw))
            .unwrap_or_default()
    }

    pub fn set_property(&mut self, slot: usize, property: u8) -> Result<(), FormatError> {
        let len = self.tables.property.len();
        let entry = self.tables.property.get_mut(slot).ok_or(FormatError::OffsetOutOfRange {
            what: "property slot",
            offset: slot,
            limit: len,
        })?;
        *entry = property;
        self.invalidate();
        Ok(())
    }

    pub fn set_music(&mut self, slot: usize, music: u8) -> Result<(), FormatError> {
        let len = self.tables.music.len();
        let entry = self.tables.music.get_mut(slot).ok_or(FormatError::OffsetOutOfRange {
            what: "music slot",
            offset: slot,
            limit: len,
        })?;
        *entry = music;
        self.invalidate();
        Ok(())
    }

    /// Store authored flags. Bits that do not fit the table width are dropped.
    pub fn set_flags(&mut self, slot: usize, flags: SlotFlags) -> Result<(), FormatError> {
        let len = self.tables.flags.len();
        let mask = self.flag_mask();
        let entry = self.tables.flags.get_mut(slot).ok_or(FormatError::OffsetOutOfRange {
            what: "flags slot",
            offset: slot,
            limit: len,
        })?;
        *entry = flags.bits() & mask;
        self.invalidate();
        Ok(())
    }

    /// Replace the racing cup table. A trailing partial cup is filled up
    /// with `NO_SLOT`.
    pub fn set_cup_track(&mut self, mut entries: Vec<u32>) {
        self.tables.n_cup_track = entries.len().div_ceil(TRACKS_PER_CUP);
        self.tables.max_cup_track = self.tables.max_cup_track.max(self.tables.n_cup_track);
        entries.resize(padded_cup_track_len(entries.len()), NO_SLOT);
        self.tables.cup_track = entries;
        self.invalidate();
    }

    pub fn set_cup_arena(&mut self, entries: Vec<u32>) {
        self.tables.n_cup_arena = entries.len().div_ceil(ARENAS_PER_CUP);
        self.tables.max_cup_arena = self.tables.max_cup_arena.max(self.tables.n_cup_arena);
        self.tables.cup_arena = entries;
        self.invalidate();
    }

    pub fn set_format_version(&mut self, version: u32) {
        self.tables.format_version = version;
        self.invalidate();
    }

    fn table_len(&self) -> usize {
        let t = &self.tables;
        t.n_slot
            .min(t.property.len())
            .min(t.music.len())
            .min(t.flags.len())
    }

    fn is_used(&self, slot: usize) -> bool {
        self.tables.music.get(slot).is_some_and(|&m| m != 0)
            || self.slot_flags(slot).intersects(SlotFlags::USED)
    }

    /// Kind of a used slot at or above the custom threshold, or inside the
    /// arena range.
    fn classify_used(&self, slot: usize) -> UsageKind {
        let flags = self.slot_flags(slot);
        if flags.contains(SlotFlags::ALIAS) {
            return UsageKind::Alias;
        }
        let arena = self
            .tables
            .property
            .get(slot)
            .is_some_and(|&p| is_arena_property(p));
        let random = flags.contains(SlotFlags::RND_HEAD);
        let hidden = flags.intersects(SlotFlags::RND_GROUP | SlotFlags::HIDDEN);
        match (arena, random, hidden) {
            (true, true, _) => UsageKind::ArenaRandom,
            (true, false, true) => UsageKind::ArenaHidden,
            (true, false, false) => UsageKind::Arena,
            (false, true, _) => UsageKind::TrackRandom,
            (false, false, true) => UsageKind::TrackHidden,
            (false, false, false) => UsageKind::Track,
        }
    }

    fn compute_usage(&self) -> Vec<SlotUsage> {
        let len = self.table_len();
        let mut usage = vec![SlotUsage::UNUSED; len];
        let mut reserved = vec![false; len];

        let mut mark = |usage: &mut [SlotUsage], slot: usize, value: SlotUsage| {
            if let Some(entry) = usage.get_mut(slot) {
                *entry = value;
                reserved[slot] = true;
            }
        };
        for slot in LE_RANDOM_SLOTS {
            mark(&mut usage, slot, SlotUsage::new(UsageKind::LeCodeRandom, true));
        }
        for slot in SPECIAL_SLOTS {
            mark(&mut usage, slot, SlotUsage::new(UsageKind::Special, false));
        }
        mark(&mut usage, NETWORK_SLOT, SlotUsage::new(UsageKind::Network, true));

        for slot in 0..len {
            if reserved[slot] {
                continue;
            }
            let used = self.is_used(slot);
            usage[slot] = if slot < FIRST_CUSTOM_SLOT {
                let kind = if used { UsageKind::Track } else { UsageKind::Unused };
                SlotUsage::new(kind, true)
            } else if used {
                SlotUsage::new(self.classify_used(slot), false)
            } else {
                SlotUsage::UNUSED
            };
        }

        for slot in ARENA_SLOTS.take_while(|&s| s < len) {
            if self.is_used(slot) {
                usage[slot].kind = self.classify_used(slot);
            }
        }

        if self.tables.format_version == 1 && LEGACY_NETWORK_SLOT < len {
            usage[LEGACY_NETWORK_SLOT] = SlotUsage::new(UsageKind::Network, true);
        }

        usage
    }

    pub fn usage_table(&self) -> &[SlotUsage] {
        self.usage.get_or_init(|| self.compute_usage())
    }

    pub fn classify(&self, slot: usize) -> SlotUsage {
        self.usage_table()
            .get(slot)
            .copied()
            .unwrap_or(SlotUsage::UNUSED)
    }

    pub fn usage_counts(&self) -> BTreeMap<UsageKind, usize> {
        let mut counts = BTreeMap::new();
        for usage in self.usage_table() {
            *counts.entry(usage.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Rebuild the derived flag bits from the property array and cup tables.
    /// Authored bits (alias, hidden, random head/group, new, texture) are
    /// kept as they are.
    pub fn recompute_flags(&mut self) {
        let mask = self.flag_mask();
        let t = &mut self.tables;
        let n = t.property.len().min(t.flags.len());

        for slot in 0..n {
            if slot >= ARENA_SLOTS.end && slot < FIRST_CUSTOM_SLOT {
                continue;
            }
            let mut flags = SlotFlags::from_bits_retain(t.flags[slot]);
            flags.remove(SlotFlags::DERIVED);
            if is_arena_property(t.property[slot]) {
                flags.insert(SlotFlags::BATTLE);
            } else {
                flags.insert(SlotFlags::VERSUS);
            }
            t.flags[slot] = flags.bits();
        }

        for slot in LE_RANDOM_SLOTS {
            if let Some(raw) = t.flags.get_mut(slot) {
                *raw |= SlotFlags::RANDOM.bits();
            }
        }

        // Padding entries take part in the walk; NO_SLOT ones match nothing.
        for (pos, &slot) in t.cup_track.iter().enumerate() {
            mark_cup(
                &mut t.flags,
                slot as usize,
                SlotFlags::VERSUS | SlotFlags::RANDOM,
                pos < MKW_N_TRACKS,
            );
        }
        for (pos, &slot) in t.cup_arena.iter().enumerate() {
            mark_cup(
                &mut t.flags,
                slot as usize,
                SlotFlags::BATTLE | SlotFlags::RANDOM,
                pos < MKW_N_ARENAS,
            );
        }

        // 8-bit tables cannot store the derived high byte.
        for raw in &mut t.flags {
            *raw &= mask;
        }

        self.invalidate();
    }

    /// Bits a flag table entry can hold.
    fn flag_mask(&self) -> u16 {
        if self.tables.flags_bits == 16 { 0xffff } else { 0x00ff }
    }
}

fn mark_cup(flags: &mut [u16], slot: usize, required: SlotFlags, original: bool) {
    let Some(raw) = flags.get_mut(slot) else {
        return;
    };
    let mut current = SlotFlags::from_bits_retain(*raw);
    if !current.intersects(required) {
        return;
    }
    current.insert(SlotFlags::CUP);
    current.insert(if original {
        SlotFlags::ORIG_CUP
    } else {
        SlotFlags::CUSTOM_CUP
    });
    *raw = current.bits();
}
