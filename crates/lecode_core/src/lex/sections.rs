//! Behaviour of the section types this library understands.
//!
//! Each section type normalizes its own payload, knows what its default
//! looks like and which features it switches on. The container only sees
//! the `LexSection` trait and dispatches on the record magic.

use serde::{Deserialize, Serialize};

use super::types::{
    CANN_MAGIC, FEAT_MAGIC, HIPT_MAGIC, LexFeatures, LexSections, SET1_MAGIC, TEST_MAGIC,
};

pub trait LexSection: Sync {
    fn magic(&self) -> u32;
    fn name(&self) -> &'static str;
    fn flag(&self) -> LexSections;
    /// Lower sorts first when the container is written.
    fn priority(&self) -> u8;
    fn min_size(&self) -> usize;
    fn default_payload(&self) -> Vec<u8>;

    /// Bring a payload of at least `min_size` bytes into canonical form.
    fn fixup(&self, _payload: &mut Vec<u8>) {}

    fn is_default(&self, payload: &[u8]) -> bool {
        payload == self.default_payload().as_slice()
    }

    fn features(&self, payload: &[u8]) -> LexFeatures;
}

static SECTIONS: [&dyn LexSection; 5] = [
    &FeatSection,
    &Set1Section,
    &CannonSection,
    &HidePosSection,
    &TestSection,
];

pub fn lookup(magic: u32) -> Option<&'static dyn LexSection> {
    SECTIONS.iter().copied().find(|s| s.magic() == magic)
}

pub fn known_sections() -> &'static [&'static dyn LexSection] {
    &SECTIONS
}

fn read_u32(payload: &[u8], offset: usize) -> u32 {
    payload
        .get(offset..offset + 4)
        .map_or(0, |b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_f32(payload: &[u8], offset: usize) -> Option<f32> {
    payload
        .get(offset..offset + 4)
        .map(|b| f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn sane_factor(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 { value } else { 1.0 }
}

/// Clamp the leading element count of a counted table to what the payload
/// holds and drop any partial trailing element.
fn fix_counted(payload: &mut Vec<u8>, elem_size: usize) {
    let available = payload.len().saturating_sub(4) / elem_size;
    let n = (read_u32(payload, 0) as usize).min(available);
    payload[..4].copy_from_slice(&(n as u32).to_be_bytes());
    payload.truncate(4 + n * elem_size);
}

// FEAT

pub struct FeatSection;

impl FeatSection {
    pub fn payload(features: LexFeatures) -> Vec<u8> {
        let mut out = features.bits().to_be_bytes().to_vec();
        out.extend_from_slice(&[0; 4]);
        out
    }

    pub fn mask(payload: &[u8]) -> LexFeatures {
        LexFeatures::from_bits_truncate(read_u32(payload, 0))
    }
}

impl LexSection for FeatSection {
    fn magic(&self) -> u32 {
        FEAT_MAGIC
    }

    fn name(&self) -> &'static str {
        "features"
    }

    fn flag(&self) -> LexSections {
        LexSections::FEAT
    }

    fn priority(&self) -> u8 {
        0
    }

    fn min_size(&self) -> usize {
        8
    }

    fn default_payload(&self) -> Vec<u8> {
        Self::payload(LexFeatures::empty())
    }

    fn fixup(&self, payload: &mut Vec<u8>) {
        let mask = Self::mask(payload);
        payload[..4].copy_from_slice(&mask.bits().to_be_bytes());
    }

    fn is_default(&self, payload: &[u8]) -> bool {
        !Self::mask(payload).intersects(LexFeatures::GAMEPLAY)
    }

    fn features(&self, _payload: &[u8]) -> LexFeatures {
        LexFeatures::empty()
    }
}

// SET1

pub const SET1_SIZE: usize = 0x14;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub item_factor: [f32; 3],
    pub start_pos: u8,
    pub apply_online_sec: u8,
    pub speed_factor: f32,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            item_factor: [1.0; 3],
            start_pos: 0,
            apply_online_sec: 0,
            speed_factor: 1.0,
        }
    }
}

impl TrackSettings {
    pub fn decode(payload: &[u8]) -> Self {
        let fallback = Self::default();
        let mut item_factor = fallback.item_factor;
        for (i, factor) in item_factor.iter_mut().enumerate() {
            if let Some(v) = read_f32(payload, i * 4) {
                *factor = v;
            }
        }
        Self {
            item_factor,
            start_pos: payload.get(0x0c).copied().unwrap_or(0),
            apply_online_sec: payload.get(0x0d).copied().unwrap_or(0),
            speed_factor: read_f32(payload, 0x10).unwrap_or(fallback.speed_factor),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SET1_SIZE);
        for factor in self.item_factor {
            out.extend_from_slice(&factor.to_be_bytes());
        }
        out.extend_from_slice(&[self.start_pos, self.apply_online_sec, 0, 0]);
        out.extend_from_slice(&self.speed_factor.to_be_bytes());
        out
    }

    pub fn features(&self) -> LexFeatures {
        let mut features = LexFeatures::empty();
        features.set(
            LexFeatures::ITEM_FACTOR,
            self.item_factor.iter().any(|&f| f != 1.0),
        );
        features.set(LexFeatures::START_POS, self.start_pos != 0);
        features.set(LexFeatures::APPLY_ONLINE_SEC, self.apply_online_sec != 0);
        features.set(LexFeatures::SPEED_FACTOR, self.speed_factor != 1.0);
        features
    }
}

pub struct Set1Section;

impl LexSection for Set1Section {
    fn magic(&self) -> u32 {
        SET1_MAGIC
    }

    fn name(&self) -> &'static str {
        "track settings"
    }

    fn flag(&self) -> LexSections {
        LexSections::SET1
    }

    fn priority(&self) -> u8 {
        1
    }

    fn min_size(&self) -> usize {
        SET1_SIZE
    }

    fn default_payload(&self) -> Vec<u8> {
        TrackSettings::default().encode()
    }

    fn fixup(&self, payload: &mut Vec<u8>) {
        let mut settings = TrackSettings::decode(payload);
        for factor in &mut settings.item_factor {
            *factor = sane_factor(*factor);
        }
        settings.speed_factor = sane_factor(settings.speed_factor);
        payload[..SET1_SIZE].copy_from_slice(&settings.encode());
    }

    fn is_default(&self, payload: &[u8]) -> bool {
        TrackSettings::decode(payload).features().is_empty()
            && payload.iter().skip(SET1_SIZE).all(|&b| b == 0)
    }

    fn features(&self, payload: &[u8]) -> LexFeatures {
        TrackSettings::decode(payload).features()
    }
}

// CANN

pub const CANNON_SIZE: usize = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cannon {
    pub speed: f32,
    pub height: f32,
    pub deceleration: f32,
    pub end_deceleration: f32,
}

impl Cannon {
    pub const fn new(speed: f32, height: f32, deceleration: f32, end_deceleration: f32) -> Self {
        Self {
            speed,
            height,
            deceleration,
            end_deceleration,
        }
    }
}

pub const VANILLA_CANNONS: [Cannon; 3] = [
    Cannon::new(500.0, 0.0, 6000.0, -1.0),
    Cannon::new(500.0, 5000.0, 6000.0, -1.0),
    Cannon::new(120.0, 2000.0, 1000.0, -1.0),
];

pub fn decode_cannons(payload: &[u8]) -> Vec<Cannon> {
    let available = payload.len().saturating_sub(4) / CANNON_SIZE;
    let n = (read_u32(payload, 0) as usize).min(available);
    (0..n)
        .map(|i| {
            let at = 4 + i * CANNON_SIZE;
            let field = |k: usize| read_f32(payload, at + k * 4).unwrap_or(0.0);
            Cannon::new(field(0), field(1), field(2), field(3))
        })
        .collect()
}

pub fn encode_cannons(cannons: &[Cannon]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + cannons.len() * CANNON_SIZE);
    out.extend_from_slice(&(cannons.len() as u32).to_be_bytes());
    for c in cannons {
        for v in [c.speed, c.height, c.deceleration, c.end_deceleration] {
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
    out
}

pub struct CannonSection;

impl LexSection for CannonSection {
    fn magic(&self) -> u32 {
        CANN_MAGIC
    }

    fn name(&self) -> &'static str {
        "cannons"
    }

    fn flag(&self) -> LexSections {
        LexSections::CANN
    }

    fn priority(&self) -> u8 {
        2
    }

    fn min_size(&self) -> usize {
        4
    }

    fn default_payload(&self) -> Vec<u8> {
        encode_cannons(&VANILLA_CANNONS)
    }

    fn fixup(&self, payload: &mut Vec<u8>) {
        fix_counted(payload, CANNON_SIZE);
    }

    fn features(&self, payload: &[u8]) -> LexFeatures {
        if self.is_default(payload) {
            LexFeatures::empty()
        } else {
            LexFeatures::CANNON
        }
    }
}

// HIPT

pub const HIDE_RULE_SIZE: usize = 8;

pub fn decode_hide_rules(payload: &[u8]) -> Vec<[u8; HIDE_RULE_SIZE]> {
    let available = payload.len().saturating_sub(4) / HIDE_RULE_SIZE;
    let n = (read_u32(payload, 0) as usize).min(available);
    payload
        .get(4..4 + n * HIDE_RULE_SIZE)
        .unwrap_or(&[])
        .chunks_exact(HIDE_RULE_SIZE)
        .map(|chunk| {
            let mut rule = [0u8; HIDE_RULE_SIZE];
            rule.copy_from_slice(chunk);
            rule
        })
        .collect()
}

pub struct HidePosSection;

impl LexSection for HidePosSection {
    fn magic(&self) -> u32 {
        HIPT_MAGIC
    }

    fn name(&self) -> &'static str {
        "hide position"
    }

    fn flag(&self) -> LexSections {
        LexSections::HIPT
    }

    fn priority(&self) -> u8 {
        3
    }

    fn min_size(&self) -> usize {
        4
    }

    fn default_payload(&self) -> Vec<u8> {
        vec![0; 4]
    }

    fn fixup(&self, payload: &mut Vec<u8>) {
        fix_counted(payload, HIDE_RULE_SIZE);
    }

    fn is_default(&self, payload: &[u8]) -> bool {
        read_u32(payload, 0) == 0
    }

    fn features(&self, payload: &[u8]) -> LexFeatures {
        if self.is_default(payload) {
            LexFeatures::empty()
        } else {
            LexFeatures::HIDE_POSITION
        }
    }
}

// TEST

pub const TEST_SIZE: usize = 8;

pub struct TestSection;

impl LexSection for TestSection {
    fn magic(&self) -> u32 {
        TEST_MAGIC
    }

    fn name(&self) -> &'static str {
        "offline test"
    }

    fn flag(&self) -> LexSections {
        LexSections::TEST
    }

    fn priority(&self) -> u8 {
        4
    }

    fn min_size(&self) -> usize {
        TEST_SIZE
    }

    fn default_payload(&self) -> Vec<u8> {
        vec![0; TEST_SIZE]
    }

    fn is_default(&self, payload: &[u8]) -> bool {
        payload.iter().all(|&b| b == 0)
    }

    fn features(&self, payload: &[u8]) -> LexFeatures {
        if self.is_default(payload) {
            LexFeatures::empty()
        } else {
            LexFeatures::TEST
        }
    }
}
