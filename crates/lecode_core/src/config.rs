use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const fn parse_decimal(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

/// This library's version as `major * 10000 + minor * 100 + patch`,
/// the encoding used by the `szs_required` and `edit_version` header fields.
pub const TOOL_VERSION: u32 = parse_decimal(env!("CARGO_PKG_VERSION_MAJOR")) * 10_000
    + parse_decimal(env!("CARGO_PKG_VERSION_MINOR")) * 100
    + parse_decimal(env!("CARGO_PKG_VERSION_PATCH"));

/// Options threaded through analysis and patch calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Version stamped into `edit_version` and compared with `szs_required`.
    pub tool_version: u32,
    /// Fixed edit time (unix seconds). `None` uses the wall clock.
    pub timestamp: Option<u32>,
    /// Recompute derived slot flags before slot tables are written.
    pub recompute_flags: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tool_version: TOOL_VERSION,
            timestamp: None,
            recompute_flags: true,
        }
    }
}

impl ToolConfig {
    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn now(&self) -> u32 {
        self.timestamp.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or(0)
        })
    }
}
