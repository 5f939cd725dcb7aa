//! Canonical LPAR settings and the cascade of block layouts that carry them.
//!
//! Every field belongs to exactly one cascade step. A block of size `n`
//! carries all steps whose size is `<= n`; fields of larger steps keep
//! their type default.

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

pub const N_CHAT_MODES: usize = 96;
pub const N_DEBUG_CONFIGS: usize = 4;
pub const N_DEBUG_LINES: usize = 10;
pub const MAX_BLOCK_TRACK: u8 = 50;
pub const MAX_THCLOUD_FRAMES: u16 = 0x7fff;

// Field offsets relative to the parameter block
pub(crate) const OFF_ENGINE: usize = 0x30;
pub(crate) const OFF_ENABLE_200CC: usize = 0x33;
pub(crate) const OFF_PERFMON: usize = 0x34;
pub(crate) const OFF_CUSTOM_TT: usize = 0x35;
pub(crate) const OFF_XPFLAGS: usize = 0x36;
pub(crate) const OFF_BLOCK_TRACK: usize = 0x37;
pub(crate) const OFF_SPEEDOMETER: usize = 0x38;
pub(crate) const OFF_DEBUG_MODE: usize = 0x39;
pub(crate) const OFF_CHEAT_MODE: usize = 0x3a;
pub(crate) const OFF_ITEM_CHEAT: usize = 0x3b;
pub(crate) const OFF_DRAG_BLUE_SHELL: usize = 0x3c;
pub(crate) const OFF_THCLOUD_FRAMES: usize = 0x3e;
pub(crate) const OFF_CHAT_MODE_1: usize = 0x40;
pub(crate) const OFF_CHAT_MODE_2: usize = 0x100;
pub(crate) const OFF_DEBUG_LINES: usize = 0x1c0;
pub(crate) const OFF_DEBUG_HIDE_SPEEDO: usize = 0x260;
pub(crate) const OFF_WW_RACE: usize = 0x264;
pub(crate) const OFF_WW_BATTLE: usize = 0x265;
pub(crate) const OFF_TEXTURE_ENABLED: usize = 0x268;
pub(crate) const OFF_TEXTURE_ALTERABLE: usize = 0x269;
pub(crate) const OFF_TIME_LIMIT_RACE: usize = 0x26c;
pub(crate) const OFF_TIME_LIMIT_BATTLE: usize = 0x270;
pub(crate) const OFF_TIME_LIMIT_MODE: usize = 0x274;

const DEBUG_CONFIG_SIZE: usize = N_DEBUG_LINES * 4;

/// Steps of the version 1 parameter block, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LparLayout {
    Engine,
    Options,
    Modes,
    ThunderCloud,
    ChatMode1,
    ChatMode2,
    DebugFirst,
    DebugAll,
    DebugSpeedo,
    Worldwide,
    Texture,
    TimeLimit,
}

impl LparLayout {
    pub const ALL: [Self; 12] = [
        Self::Engine,
        Self::Options,
        Self::Modes,
        Self::ThunderCloud,
        Self::ChatMode1,
        Self::ChatMode2,
        Self::DebugFirst,
        Self::DebugAll,
        Self::DebugSpeedo,
        Self::Worldwide,
        Self::Texture,
        Self::TimeLimit,
    ];

    pub const SMALLEST: Self = Self::Engine;
    pub const CURRENT: Self = Self::TimeLimit;

    pub fn size(&self) -> usize {
        match self {
            Self::Engine => 0x34,
            Self::Options => 0x38,
            Self::Modes => 0x3c,
            Self::ThunderCloud => 0x40,
            Self::ChatMode1 => 0x100,
            Self::ChatMode2 => 0x1c0,
            Self::DebugFirst => 0x1e8,
            Self::DebugAll => 0x260,
            Self::DebugSpeedo => 0x264,
            Self::Worldwide => 0x268,
            Self::Texture => 0x26c,
            Self::TimeLimit => 0x276,
        }
    }

    /// Largest step fully contained in a block of `size` bytes.
    pub fn from_size(size: usize) -> Option<Self> {
        Self::ALL.iter().rev().copied().find(|l| l.size() <= size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    pub hide_speedo: bool,
    pub lines: [u32; N_DEBUG_LINES],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub engine: [u8; 3],
    pub enable_200cc: bool,
    pub perfmon: u8,
    pub custom_tt: bool,
    pub xpflags: bool,
    pub block_track: u8,
    pub speedometer: u8,
    pub debug_mode: u8,
    pub cheat_mode: u8,
    pub item_cheat: bool,
    pub drag_blue_shell: bool,
    pub thcloud_frames: u16,
    #[serde(with = "BigArray")]
    pub chat_mode_1: [u16; N_CHAT_MODES],
    #[serde(with = "BigArray")]
    pub chat_mode_2: [u16; N_CHAT_MODES],
    pub debug: [DebugConfig; N_DEBUG_CONFIGS],
    pub ww_race: bool,
    pub ww_battle: bool,
    pub texture_enabled: bool,
    pub texture_alterable: u8,
    pub time_limit_race: u32,
    pub time_limit_battle: u32,
    pub time_limit_mode: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: [0; 3],
            enable_200cc: false,
            perfmon: 0,
            custom_tt: false,
            xpflags: false,
            block_track: 0,
            speedometer: 0,
            debug_mode: 0,
            cheat_mode: 0,
            item_cheat: false,
            drag_blue_shell: false,
            thcloud_frames: 0,
            chat_mode_1: [0; N_CHAT_MODES],
            chat_mode_2: [0; N_CHAT_MODES],
            debug: [DebugConfig::default(); N_DEBUG_CONFIGS],
            ww_race: false,
            ww_battle: false,
            texture_enabled: false,
            texture_alterable: 0,
            time_limit_race: 0,
            time_limit_battle: 0,
            time_limit_mode: 0,
        }
    }
}

/// One direction of the field table: decoding reads each field, patching
/// writes it. Both see the same offsets and cascade steps.
pub(crate) trait FieldVisitor {
    fn byte(&mut self, step: LparLayout, offset: usize, value: &mut u8);
    fn half(&mut self, step: LparLayout, offset: usize, value: &mut u16);
    fn word(&mut self, step: LparLayout, offset: usize, value: &mut u32);
    fn flag(&mut self, step: LparLayout, offset: usize, value: &mut bool);
    fn bit(&mut self, step: LparLayout, offset: usize, mask: u8, value: &mut bool);
}

impl Settings {
    /// Values recommended for a fresh binary.
    pub fn recommended() -> Self {
        Self {
            engine: [10, 60, 30],
            thcloud_frames: 0x1194,
            ..Self::default()
        }
    }

    pub(crate) fn visit_fields<V: FieldVisitor>(&mut self, v: &mut V) {
        use LparLayout as L;

        for (i, engine) in self.engine.iter_mut().enumerate() {
            v.byte(L::Engine, OFF_ENGINE + i, engine);
        }
        v.flag(L::Engine, OFF_ENABLE_200CC, &mut self.enable_200cc);

        v.byte(L::Options, OFF_PERFMON, &mut self.perfmon);
        v.flag(L::Options, OFF_CUSTOM_TT, &mut self.custom_tt);
        v.flag(L::Options, OFF_XPFLAGS, &mut self.xpflags);
        v.byte(L::Options, OFF_BLOCK_TRACK, &mut self.block_track);

        v.byte(L::Modes, OFF_SPEEDOMETER, &mut self.speedometer);
        v.byte(L::Modes, OFF_DEBUG_MODE, &mut self.debug_mode);
        v.byte(L::Modes, OFF_CHEAT_MODE, &mut self.cheat_mode);
        v.flag(L::Modes, OFF_ITEM_CHEAT, &mut self.item_cheat);

        v.flag(L::ThunderCloud, OFF_DRAG_BLUE_SHELL, &mut self.drag_blue_shell);
        v.half(L::ThunderCloud, OFF_THCLOUD_FRAMES, &mut self.thcloud_frames);

        for (i, mode) in self.chat_mode_1.iter_mut().enumerate() {
            v.half(L::ChatMode1, OFF_CHAT_MODE_1 + i * 2, mode);
        }
        for (i, mode) in self.chat_mode_2.iter_mut().enumerate() {
            v.half(L::ChatMode2, OFF_CHAT_MODE_2 + i * 2, mode);
        }

        for (cfg, debug) in self.debug.iter_mut().enumerate() {
            let step = if cfg == 0 { L::DebugFirst } else { L::DebugAll };
            let base = OFF_DEBUG_LINES + cfg * DEBUG_CONFIG_SIZE;
            for (i, line) in debug.lines.iter_mut().enumerate() {
                v.word(step, base + i * 4, line);
            }
        }
        for (cfg, debug) in self.debug.iter_mut().enumerate() {
            v.bit(
                L::DebugSpeedo,
                OFF_DEBUG_HIDE_SPEEDO,
                1 << cfg,
                &mut debug.hide_speedo,
            );
        }

        v.flag(L::Worldwide, OFF_WW_RACE, &mut self.ww_race);
        v.flag(L::Worldwide, OFF_WW_BATTLE, &mut self.ww_battle);

        v.flag(L::Texture, OFF_TEXTURE_ENABLED, &mut self.texture_enabled);
        v.byte(L::Texture, OFF_TEXTURE_ALTERABLE, &mut self.texture_alterable);

        v.word(L::TimeLimit, OFF_TIME_LIMIT_RACE, &mut self.time_limit_race);
        v.word(L::TimeLimit, OFF_TIME_LIMIT_BATTLE, &mut self.time_limit_battle);
        v.byte(L::TimeLimit, OFF_TIME_LIMIT_MODE, &mut self.time_limit_mode);
    }

    /// Clamp every field into its documented range.
    pub fn normalize(&mut self) {
        self.engine = normalize_engine(self.engine);
        self.perfmon = self.perfmon.min(2);
        self.speedometer = self.speedometer.min(3);
        self.cheat_mode = self.cheat_mode.min(2);
        self.block_track = self.block_track.min(MAX_BLOCK_TRACK);
        self.thcloud_frames = self.thcloud_frames.min(MAX_THCLOUD_FRAMES);
        self.time_limit_mode = self.time_limit_mode.min(2);
    }

    pub fn engine_sum(&self) -> u32 {
        self.engine.iter().map(|&e| u32::from(e)).sum()
    }
}

/// Scale the engine distribution so it sums to 100. An all-zero triple
/// means "not set" and is kept.
fn normalize_engine(engine: [u8; 3]) -> [u8; 3] {
    let sum: u32 = engine.iter().map(|&e| u32::from(e)).sum();
    if sum == 0 || sum == 100 {
        return engine;
    }

    let mut scaled = engine.map(|e| (u32::from(e) * 100 / sum) as u8);
    let total: u32 = scaled.iter().map(|&e| u32::from(e)).sum();
    let largest = (0..3).max_by_key(|&i| engine[i]).unwrap_or(0);
    scaled[largest] += (100 - total) as u8;
    scaled
}
