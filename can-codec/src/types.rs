//! Core types for the CAN signal codec
//!
//! This module defines the error taxonomy and the per-call value types the codec
//! produces (decoded frames) and consumes (signal values to encode). Nothing in
//! here is shared between calls: every decode returns a fresh snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur while building or using the codec
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Message not found: CAN ID 0x{0:X}")]
    MessageNotFound(u32),

    #[error("DLC mismatch for CAN ID 0x{can_id:X}: expected {expected} bytes, got {actual}")]
    DlcMismatch {
        can_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate CAN ID 0x{can_id:X}: '{first}' conflicts with '{second}'")]
    DuplicateMessageId {
        can_id: u32,
        first: String,
        second: String,
    },

    #[error(
        "Signal '{signal}' (start bit {start_bit}, length {length}) \
         does not fit in {available_bytes} bytes"
    )]
    SignalOutOfRange {
        signal: String,
        start_bit: u16,
        length: u16,
        available_bytes: usize,
    },

    #[error("Payload for CAN ID 0x{can_id:X} has {available} bytes, message needs {required}")]
    PayloadTooShort {
        can_id: u32,
        required: usize,
        available: usize,
    },

    #[error("Value {value} cannot be encoded into signal '{signal}'")]
    EncodeValueOutOfRange { signal: String, value: f64 },

    #[error("Signal '{signal}' not found in message '{message}'")]
    SignalNotFound { message: String, signal: String },

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Invalid message definition: {0}")]
    InvalidMessageDefinition(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid library name: {0}")]
    InvalidLibraryName(String),

    #[error("Unsupported output language: {0} (expected 'c' or 'cpp')")]
    UnsupportedLanguage(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A decoded message: one snapshot per decode call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    /// CAN message ID
    pub can_id: u32,
    /// Message name from the database
    pub name: String,
    /// Primary sender, if the database names one
    pub sender: Option<String>,
    /// Decoded signals in declaration order
    pub signals: Vec<DecodedSignal>,
    /// Raw selector value if the message is multiplexed
    pub multiplexer_value: Option<u64>,
}

impl DecodedMessage {
    /// Look up a decoded signal by name
    pub fn signal(&self, name: &str) -> Option<&DecodedSignal> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Physical value of a signal, if it was decoded
    pub fn physical(&self, name: &str) -> Option<f64> {
        self.signal(name).map(|s| s.physical_value)
    }

    /// Physical values keyed by signal name
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.signals
            .iter()
            .map(|s| (s.name.clone(), s.physical_value))
            .collect()
    }
}

/// A decoded signal with its raw and physical value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSignal {
    /// Signal name from the database
    pub name: String,
    /// Unsigned bit pattern as read from the frame
    pub raw_value: u64,
    /// Raw value after sign extension
    ///
    /// Equal to `raw_value` for unsigned signals, saturating at `i64::MAX`
    /// for unsigned patterns above it.
    pub signed_value: i64,
    /// `signed_value * factor + offset`
    pub physical_value: f64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Presentation hint derived from the signal's scaling
    pub value: SignalValue,
}

/// Signal value types, chosen from the signal's scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Signed integer value
    Integer(i64),
    /// Unsigned integer value above `i64::MAX`
    Unsigned(u64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
    /// Single-bit flag
    Boolean(bool),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Unsigned(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.3}", v),
            SignalValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
        }
    }
}

impl SignalValue {
    /// Convert signal value to f64
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Integer(v) => *v as f64,
            SignalValue::Unsigned(v) => *v as f64,
            SignalValue::Float(v) => *v,
            SignalValue::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Check if this is a truthy value
    pub fn as_bool(&self) -> bool {
        match self {
            SignalValue::Boolean(v) => *v,
            SignalValue::Integer(v) => *v != 0,
            SignalValue::Unsigned(v) => *v != 0,
            SignalValue::Float(v) => *v != 0.0,
        }
    }
}

/// Raw values to encode into one message, keyed by signal name
///
/// Signals that are not set encode as raw 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalValues {
    raw: BTreeMap<String, u64>,
}

impl SignalValues {
    /// Create an empty value set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw bit pattern of a signal
    pub fn set_raw(&mut self, signal: impl Into<String>, raw: u64) -> &mut Self {
        self.raw.insert(signal.into(), raw);
        self
    }

    /// Builder form of [`SignalValues::set_raw`]
    pub fn with_raw(mut self, signal: impl Into<String>, raw: u64) -> Self {
        self.set_raw(signal, raw);
        self
    }

    /// Convert a physical value to raw using the signal's scaling and store it
    pub fn set_physical(
        &mut self,
        signal: &crate::signals::SignalDefinition,
        value: f64,
        policy: crate::config::OverflowPolicy,
    ) -> Result<&mut Self> {
        let raw = signal.physical_to_raw(value, policy)?;
        self.raw.insert(signal.name.clone(), raw);
        Ok(self)
    }

    /// Raw value for a signal, if set
    pub fn get(&self, signal: &str) -> Option<u64> {
        self.raw.get(signal).copied()
    }

    /// Iterate over signal names that have a value
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.raw.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl From<&DecodedMessage> for SignalValues {
    fn from(decoded: &DecodedMessage) -> Self {
        let raw = decoded
            .signals
            .iter()
            .map(|s| (s.name.clone(), s.raw_value))
            .collect();
        Self { raw }
    }
}
