use bitflags::bitflags;

pub const LEX_MAGIC: &[u8; 4] = b"LE-X";
pub const LEX_MAJOR: u16 = 1;
pub const LEX_MINOR: u16 = 1;
pub const LEX_HEADER_SIZE: usize = 0x10;
pub const LEX_RECORD_HEADER: usize = 8;

pub const FEAT_MAGIC: u32 = u32::from_be_bytes(*b"FEAT");
pub const SET1_MAGIC: u32 = u32::from_be_bytes(*b"SET1");
pub const CANN_MAGIC: u32 = u32::from_be_bytes(*b"CANN");
pub const HIPT_MAGIC: u32 = u32::from_be_bytes(*b"HIPT");
pub const TEST_MAGIC: u32 = u32::from_be_bytes(*b"TEST");

/// Sort priority given to sections this library does not know.
pub const UNKNOWN_PRIORITY: u8 = u8::MAX;

bitflags! {
    /// Which sections a container holds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LexSections: u32 {
        const FEAT    = 0x01;
        const SET1    = 0x02;
        const CANN    = 0x04;
        const HIPT    = 0x08;
        const TEST    = 0x10;
        const UNKNOWN = 0x8000_0000;
    }
}

bitflags! {
    /// Track features switched on by the sections of a container.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LexFeatures: u32 {
        const ITEM_FACTOR      = 0x0001;
        const START_POS        = 0x0002;
        const APPLY_ONLINE_SEC = 0x0004;
        const SPEED_FACTOR     = 0x0008;
        const CANNON           = 0x0010;
        const HIDE_POSITION    = 0x0020;
        const TEST             = 0x0040;
    }
}

impl LexFeatures {
    /// Features that change how a race is played.
    pub const GAMEPLAY: Self = Self::ITEM_FACTOR
        .union(Self::START_POS)
        .union(Self::APPLY_ONLINE_SEC)
        .union(Self::SPEED_FACTOR)
        .union(Self::CANNON);
}

/// Printable form of a section magic, with non-ASCII bytes as `.`.
pub fn magic_name(magic: u32) -> String {
    magic
        .to_be_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect()
}
