//! DBC database adapter
//!
//! Text parsing is done by the `can-dbc` crate. This module converts its
//! parsed model into message definitions.

use crate::signals::definition::{
    ByteOrder, MessageDefinition, SignalDefinition, ValueType,
};
use crate::types::{CodecError, Result};
use std::path::Path;

/// Flag bit DBC files set on extended (29-bit) identifiers
const DBC_EXTENDED_ID_FLAG: u32 = 0x8000_0000;

/// Placeholder node name for "no node"
const DBC_NO_NODE: &str = "Vector__XXX";

/// Read a DBC file and return its message definitions
pub fn load_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Loading DBC file: {:?}", path);

    let bytes = std::fs::read(path)?;

    // DBC files from Windows tooling are often Latin-1 / Windows-1252
    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("DBC file {:?} is not UTF-8, decoding as Latin-1", path);
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let messages = parse_dbc_str(&content)?;
    log::info!("Loaded {} messages from {:?}", messages.len(), path);
    Ok(messages)
}

/// Parse DBC text with `can-dbc` and convert the result
pub fn parse_dbc_str(content: &str) -> Result<Vec<MessageDefinition>> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes())
        .map_err(|e| CodecError::DbcParseError(format!("{:?}", e)))?;
    messages_from_dbc(&dbc)
}

/// Convert an already-parsed DBC database
pub fn messages_from_dbc(dbc: &can_dbc::DBC) -> Result<Vec<MessageDefinition>> {
    dbc.messages().iter().map(convert_message).collect()
}

fn convert_message(dbc_msg: &can_dbc::Message) -> Result<MessageDefinition> {
    let raw_id = dbc_msg.message_id().0;
    let id = if raw_id & DBC_EXTENDED_ID_FLAG != 0 {
        raw_id & !DBC_EXTENDED_ID_FLAG
    } else {
        raw_id
    };

    let multiplexor = dbc_msg
        .signals()
        .iter()
        .find(|s| matches!(s.multiplexer_indicator(), can_dbc::MultiplexIndicator::Multiplexor))
        .map(|s| s.name().to_string());

    let signals = dbc_msg
        .signals()
        .iter()
        .map(|s| convert_signal(s, multiplexor.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    let senders = match dbc_msg.transmitter() {
        can_dbc::Transmitter::NodeName(name) if name != DBC_NO_NODE => vec![name.to_string()],
        _ => Vec::new(),
    };

    log::trace!(
        "Converted message '{}' (ID 0x{:X}) with {} signals",
        dbc_msg.message_name(),
        id,
        signals.len()
    );

    Ok(MessageDefinition {
        id,
        name: dbc_msg.message_name().to_string(),
        dlc: *dbc_msg.message_size() as usize,
        senders,
        signals,
    })
}

fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexor: Option<&str>,
) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let start_bit = u16::try_from(*dbc_sig.start_bit()).map_err(|_| {
        CodecError::InvalidSignalDefinition(format!(
            "signal '{}' has start bit {}",
            dbc_sig.name(),
            dbc_sig.start_bit()
        ))
    })?;
    let length = u16::try_from(*dbc_sig.signal_size()).map_err(|_| {
        CodecError::InvalidSignalDefinition(format!(
            "signal '{}' has length {}",
            dbc_sig.name(),
            dbc_sig.signal_size()
        ))
    })?;

    let mut signal = SignalDefinition::new(dbc_sig.name().to_string(), start_bit, length)
        .with_byte_order(byte_order)
        .with_scaling(*dbc_sig.factor(), *dbc_sig.offset())
        .with_range(*dbc_sig.min(), *dbc_sig.max());
    signal.value_type = value_type;

    if !dbc_sig.unit().is_empty() {
        signal.unit = Some(dbc_sig.unit().to_string());
    }
    signal.receivers = dbc_sig
        .receivers()
        .iter()
        .filter(|r| r.as_str() != DBC_NO_NODE)
        .cloned()
        .collect();

    match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(value)
        | can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(value) => {
            let selector = multiplexor.ok_or_else(|| {
                CodecError::InvalidSignalDefinition(format!(
                    "Multiplexed signal '{}' but no multiplexer found",
                    dbc_sig.name()
                ))
            })?;
            signal = signal.multiplexed_by(selector, vec![value]);
        }
        _ => {}
    }

    Ok(signal)
}
