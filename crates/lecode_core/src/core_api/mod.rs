mod compare;
mod engine;
mod error;
mod types;

pub use compare::{AxisResult, CompareAxis, Comparison, compare_binaries};
pub use engine::{Engine, Session};
pub use error::{CoreError, CoreErrorCode};
pub use types::{
    Capabilities, CapabilityIssue, FileKind, LeCodeSnapshot, LexSectionEntry, LexSnapshot,
    Snapshot, UsageCount,
};
