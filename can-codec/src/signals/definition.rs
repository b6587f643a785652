//! Signal and message definitions
//!
//! Immutable descriptions of a frame's layout. Values never live here: decoding
//! produces a [`DecodedSignal`] per call and encoding takes its input from
//! [`crate::SignalValues`].

use crate::bits::{self, BitError, MAX_SIGNAL_BITS};
use crate::config::OverflowPolicy;
use crate::types::{CodecError, DecodedSignal, Result, SignalValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Largest 29-bit extended identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Largest 11-bit standard identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

impl ByteOrder {
    /// Name used by generated code
    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "little_endian",
            ByteOrder::BigEndian => "big_endian",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

impl ValueType {
    /// Single-character tag used by generated code
    pub fn as_char(&self) -> char {
        match self {
            ValueType::Signed => 's',
            ValueType::Unsigned => 'u',
        }
    }
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplexerInfo {
    /// Name of the selector signal that controls this signal
    pub selector: String,
    /// Selector values for which this signal is present
    pub values: Vec<u64>,
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Signal name, unique within its message
    pub name: String,
    /// Start bit in the CAN frame (LSB for Intel, MSB for Motorola)
    pub start_bit: u16,
    /// Length in bits (1..=64)
    pub length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value (advisory)
    pub min: f64,
    /// Maximum physical value (advisory)
    pub max: f64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Receiving nodes
    #[serde(default)]
    pub receivers: Vec<String>,
    /// Multiplexer info (None if not multiplexed)
    #[serde(default)]
    pub multiplexer: Option<MultiplexerInfo>,
}

impl SignalDefinition {
    /// Unsigned little-endian signal with identity scaling
    pub fn new(name: impl Into<String>, start_bit: u16, length: u16) -> Self {
        Self {
            name: name.into(),
            start_bit,
            length,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: None,
            receivers: Vec::new(),
            multiplexer: None,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn big_endian(self) -> Self {
        self.with_byte_order(ByteOrder::BigEndian)
    }

    pub fn signed(mut self) -> Self {
        self.value_type = ValueType::Signed;
        self
    }

    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receivers.push(receiver.into());
        self
    }

    /// Mark this signal as present only for the given selector values
    pub fn multiplexed_by(mut self, selector: impl Into<String>, values: Vec<u64>) -> Self {
        self.multiplexer = Some(MultiplexerInfo {
            selector: selector.into(),
            values,
        });
        self
    }

    pub fn is_signed(&self) -> bool {
        self.value_type == ValueType::Signed
    }

    /// Number of payload bytes this signal touches
    pub fn required_bytes(&self) -> usize {
        bits::required_bytes(self.start_bit, self.length, self.byte_order)
    }

    /// Check the layout invariants that do not depend on the owning message
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CodecError::InvalidSignalDefinition(
                "signal name is empty".to_string(),
            ));
        }
        if self.length == 0 || self.length > MAX_SIGNAL_BITS {
            return Err(CodecError::InvalidSignalDefinition(format!(
                "signal '{}' has length {} (supported: 1..={})",
                self.name, self.length, MAX_SIGNAL_BITS
            )));
        }
        if !self.factor.is_finite() || !self.offset.is_finite() {
            return Err(CodecError::InvalidSignalDefinition(format!(
                "signal '{}' has a non-finite factor or offset",
                self.name
            )));
        }
        Ok(())
    }

    /// Check that the signal's bit span fits a `dlc`-byte payload
    pub fn check_fits(&self, dlc: usize) -> Result<()> {
        if self.required_bytes() > dlc {
            return Err(self.out_of_range(dlc));
        }
        Ok(())
    }

    fn out_of_range(&self, available_bytes: usize) -> CodecError {
        CodecError::SignalOutOfRange {
            signal: self.name.clone(),
            start_bit: self.start_bit,
            length: self.length,
            available_bytes,
        }
    }

    fn map_bit_error(&self, err: BitError) -> CodecError {
        match err {
            BitError::OutOfRange { available, .. } => self.out_of_range(available),
            BitError::InvalidLength(length) => CodecError::InvalidSignalDefinition(format!(
                "signal '{}' has length {}",
                self.name, length
            )),
        }
    }

    /// Unsigned raw bit pattern of this signal in `data`
    pub fn extract_raw(&self, data: &[u8]) -> Result<u64> {
        bits::extract(data, self.start_bit, self.length, self.byte_order)
            .map_err(|e| self.map_bit_error(e))
    }

    /// Raw pattern interpreted according to the value type
    pub fn interpret_raw(&self, raw: u64) -> i64 {
        match self.value_type {
            ValueType::Unsigned => i64::try_from(raw).unwrap_or(i64::MAX),
            ValueType::Signed => bits::sign_extend(raw, self.length),
        }
    }

    /// `raw * factor + offset`, with sign extension for signed signals
    pub fn raw_to_physical(&self, raw: u64) -> f64 {
        let numeric = match self.value_type {
            // u64 -> f64 directly so 64-bit unsigned patterns stay positive
            ValueType::Unsigned => raw as f64,
            ValueType::Signed => bits::sign_extend(raw, self.length) as f64,
        };
        numeric * self.factor + self.offset
    }

    /// Smallest and largest raw integer this signal can carry
    pub fn raw_bounds(&self) -> (i128, i128) {
        let length = self.length.min(MAX_SIGNAL_BITS) as u32;
        match self.value_type {
            ValueType::Unsigned => (0, (1i128 << length) - 1),
            ValueType::Signed => (-(1i128 << (length - 1)), (1i128 << (length - 1)) - 1),
        }
    }

    /// Convert a physical value to the raw pattern to transmit
    ///
    /// `raw = round((value - offset) / factor)`, checked against the signal's
    /// raw bounds. Signed results are stored as `length`-bit two's complement.
    pub fn physical_to_raw(&self, value: f64, policy: OverflowPolicy) -> Result<u64> {
        let out_of_range = || CodecError::EncodeValueOutOfRange {
            signal: self.name.clone(),
            value,
        };

        if !value.is_finite() || self.factor == 0.0 {
            return Err(out_of_range());
        }

        let scaled = ((value - self.offset) / self.factor).round();
        let (low, high) = self.raw_bounds();
        // Both bounds are powers of two, so the f64 comparisons are exact
        let raw = if scaled < low as f64 {
            match policy {
                OverflowPolicy::Reject => return Err(out_of_range()),
                OverflowPolicy::Saturate => low,
            }
        } else if scaled >= (high + 1) as f64 {
            match policy {
                OverflowPolicy::Reject => return Err(out_of_range()),
                OverflowPolicy::Saturate => high,
            }
        } else {
            scaled as i128
        };

        Ok((raw as u64) & bits::mask(self.length))
    }

    /// Reduce a caller-supplied raw value to this signal's width
    ///
    /// Accepts any pattern that fits in `length` bits, and for signed signals
    /// also the 64-bit sign-extended form of a negative value.
    pub fn normalize_raw(&self, raw: u64) -> Result<u64> {
        let mask = bits::mask(self.length);
        if raw & !mask == 0 {
            return Ok(raw);
        }
        if self.is_signed() && bits::sign_extend(raw & mask, self.length) as u64 == raw {
            return Ok(raw & mask);
        }
        Err(CodecError::EncodeValueOutOfRange {
            signal: self.name.clone(),
            value: raw as f64,
        })
    }

    /// Write a raw value into the frame
    pub fn insert_raw(&self, data: &mut [u8], raw: u64) -> Result<()> {
        bits::insert(data, raw, self.start_bit, self.length, self.byte_order)
            .map_err(|e| self.map_bit_error(e))
    }

    /// Decode this signal from a frame payload
    pub fn decode(&self, data: &[u8]) -> Result<DecodedSignal> {
        let raw_value = self.extract_raw(data)?;
        let signed_value = self.interpret_raw(raw_value);
        let physical_value = self.raw_to_physical(raw_value);

        let value = if self.factor == 1.0 && self.offset == 0.0 && self.length == 1 {
            SignalValue::Boolean(raw_value != 0)
        } else if self.factor != 1.0 || self.offset != 0.0 {
            SignalValue::Float(physical_value)
        } else if !self.is_signed() && raw_value > i64::MAX as u64 {
            SignalValue::Unsigned(raw_value)
        } else {
            SignalValue::Integer(signed_value)
        };

        Ok(DecodedSignal {
            name: self.name.clone(),
            raw_value,
            signed_value,
            physical_value,
            unit: self.unit.clone(),
            value,
        })
    }
}

/// A complete CAN message definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDefinition {
    /// CAN message ID (11-bit or 29-bit)
    pub id: u32,
    /// Message name
    pub name: String,
    /// Payload length in bytes
    pub dlc: usize,
    /// Transmitting nodes, primary sender first
    #[serde(default)]
    pub senders: Vec<String>,
    /// All signals in this message, in declaration order
    pub signals: Vec<SignalDefinition>,
}

impl MessageDefinition {
    pub fn new(id: u32, name: impl Into<String>, dlc: usize) -> Self {
        Self {
            id,
            name: name.into(),
            dlc,
            senders: Vec::new(),
            signals: Vec::new(),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.senders.push(sender.into());
        self
    }

    pub fn with_signal(mut self, signal: SignalDefinition) -> Self {
        self.signals.push(signal);
        self
    }

    /// Primary sender (first of the transmitter list)
    pub fn sender(&self) -> Option<&str> {
        self.senders.first().map(String::as_str)
    }

    /// True for payloads longer than classic CAN allows
    pub fn is_fd(&self) -> bool {
        self.dlc > crate::config::CLASSIC_CAN_MAX_DLC
    }

    /// True if the ID needs the 29-bit format
    pub fn is_extended(&self) -> bool {
        self.id > MAX_STANDARD_ID
    }

    pub fn signal(&self, name: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// True if any signal depends on a selector
    pub fn is_multiplexed(&self) -> bool {
        self.signals.iter().any(|s| s.multiplexer.is_some())
    }

    /// The selector signal, if the message is multiplexed
    pub fn multiplexer_signal(&self) -> Option<&SignalDefinition> {
        self.signals
            .iter()
            .find_map(|s| s.multiplexer.as_ref())
            .and_then(|mux| self.signal(&mux.selector))
    }

    /// Check all layout invariants of the message and its signals
    pub fn validate(&self, max_dlc: usize) -> Result<()> {
        if self.id > MAX_EXTENDED_ID {
            return Err(CodecError::InvalidMessageDefinition(format!(
                "message '{}' has ID 0x{:X} outside the 29-bit range",
                self.name, self.id
            )));
        }
        if self.dlc > max_dlc {
            return Err(CodecError::InvalidMessageDefinition(format!(
                "message '{}' has DLC {} (maximum {})",
                self.name, self.dlc, max_dlc
            )));
        }

        let mut names = HashSet::new();
        for signal in &self.signals {
            signal.validate()?;
            signal.check_fits(self.dlc)?;
            if !names.insert(signal.name.as_str()) {
                return Err(CodecError::InvalidMessageDefinition(format!(
                    "message '{}' declares signal '{}' twice",
                    self.name, signal.name
                )));
            }
        }

        for signal in &self.signals {
            if let Some(mux) = &signal.multiplexer {
                if mux.selector == signal.name || self.signal(&mux.selector).is_none() {
                    return Err(CodecError::InvalidMessageDefinition(format!(
                        "signal '{}' in '{}' refers to unknown selector '{}'",
                        signal.name, self.name, mux.selector
                    )));
                }
            }
        }

        Ok(())
    }
}
