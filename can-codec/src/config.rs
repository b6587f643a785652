//! Codec configuration types
//!
//! The codec itself is pure; these settings only decide how strict it is when
//! building the registry and converting physical values.

use serde::{Deserialize, Serialize};

/// Largest classic CAN payload in bytes
pub const CLASSIC_CAN_MAX_DLC: usize = 8;

/// Largest CAN-FD payload in bytes
pub const CAN_FD_MAX_DLC: usize = 64;

/// What to do when a physical value does not fit the signal's raw range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Fail with `EncodeValueOutOfRange`
    #[default]
    Reject,
    /// Clip to the nearest representable raw value
    Saturate,
}

/// Configuration for the codec library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest frame length accepted for a message definition
    #[serde(default = "default_max_dlc")]
    pub max_dlc: usize,

    /// Physical-to-raw overflow handling
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Whether multiplexed signals are decoded (false = only plain signals)
    #[serde(default = "default_true")]
    pub decode_multiplexed: bool,

    /// Whether an identical definition loaded twice is tolerated
    #[serde(default = "default_true")]
    pub allow_identical_duplicates: bool,
}

fn default_max_dlc() -> usize {
    CAN_FD_MAX_DLC
}

fn default_true() -> bool {
    true
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_dlc: default_max_dlc(),
            overflow: OverflowPolicy::default(),
            decode_multiplexed: true,
            allow_identical_duplicates: true,
        }
    }
}

impl CodecConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: restrict message length to classic CAN (8 bytes)
    pub fn classic_can(mut self) -> Self {
        self.max_dlc = CLASSIC_CAN_MAX_DLC;
        self
    }

    /// Builder method: set the maximum message length
    pub fn with_max_dlc(mut self, max_dlc: usize) -> Self {
        self.max_dlc = max_dlc;
        self
    }

    /// Builder method: set the overflow policy
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Builder method: enable or disable multiplexed signal decoding
    pub fn with_multiplexed_decoding(mut self, enabled: bool) -> Self {
        self.decode_multiplexed = enabled;
        self
    }

    /// Builder method: reject identical duplicate definitions too
    pub fn with_identical_duplicates(mut self, allowed: bool) -> Self {
        self.allow_identical_duplicates = allowed;
        self
    }
}
