//! Frame codec
//!
//! Decodes raw frames into [`DecodedMessage`] snapshots and encodes signal
//! values back into frame payloads. The codec holds only the read-only
//! registry, so a single instance can serve any number of threads.

use crate::config::CodecConfig;
use crate::selection::Selection;
use crate::signals::{MessageDefinition, MessageRegistry, SignalDefinition};
use crate::types::{CodecError, DecodedMessage, Result, SignalValues};

/// Encoder/decoder for the messages of one registry
#[derive(Debug, Clone)]
pub struct Codec {
    registry: MessageRegistry,
    config: CodecConfig,
}

impl Codec {
    /// Create a codec over an existing registry
    pub fn new(registry: MessageRegistry) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: MessageRegistry, config: CodecConfig) -> Self {
        Self { registry, config }
    }

    /// Build the registry from the selected subset of `messages`
    pub fn from_messages(
        messages: &[MessageDefinition],
        selection: &Selection,
        config: CodecConfig,
    ) -> Result<Self> {
        let selected = selection.apply(messages)?;
        let registry = MessageRegistry::build_with_config(selected, &config)?;
        Ok(Self::with_config(registry, config))
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Find a message by CAN ID
    pub fn find_message_by_id(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.registry.find_by_id(can_id)
    }

    fn lookup(&self, can_id: u32, dlc: usize, available: usize) -> Result<&MessageDefinition> {
        let message = self
            .registry
            .find_by_id(can_id)
            .ok_or(CodecError::MessageNotFound(can_id))?;

        if message.dlc != dlc {
            return Err(CodecError::DlcMismatch {
                can_id,
                expected: message.dlc,
                actual: dlc,
            });
        }
        if available < dlc {
            return Err(CodecError::PayloadTooShort {
                can_id,
                required: dlc,
                available,
            });
        }
        Ok(message)
    }

    fn is_active(&self, signal: &SignalDefinition, selector_value: Option<u64>) -> bool {
        match &signal.multiplexer {
            None => true,
            Some(_) if !self.config.decode_multiplexed => false,
            Some(mux) => selector_value.map_or(false, |v| mux.values.contains(&v)),
        }
    }

    /// Decode a received frame
    ///
    /// Fails with `MessageNotFound` for unknown IDs, `DlcMismatch` when
    /// `dlc` differs from the definition and `PayloadTooShort` when `data`
    /// holds fewer than `dlc` bytes. Signals are decoded in declaration
    /// order; multiplexed signals only when the selector value matches.
    pub fn decode(&self, can_id: u32, dlc: usize, data: &[u8]) -> Result<DecodedMessage> {
        let message = self.lookup(can_id, dlc, data.len())?;
        let payload = &data[..dlc];

        let multiplexer_value = match message.multiplexer_signal() {
            Some(selector) if self.config.decode_multiplexed => {
                Some(selector.extract_raw(payload)?)
            }
            _ => None,
        };

        let signals = message
            .signals
            .iter()
            .filter(|s| self.is_active(s, multiplexer_value))
            .map(|s| s.decode(payload))
            .collect::<Result<Vec<_>>>()?;

        log::trace!(
            "Decoded {} signals from '{}' (ID 0x{:X})",
            signals.len(),
            message.name,
            can_id
        );

        Ok(DecodedMessage {
            can_id,
            name: message.name.clone(),
            sender: message.sender().map(str::to_string),
            signals,
            multiplexer_value,
        })
    }

    /// Encode signal values into a frame payload
    ///
    /// Signals without a value are written as raw 0. Bits not covered by an
    /// active signal keep whatever `data` already holds. Every value and bit
    /// span is checked before the first byte is written.
    pub fn encode(
        &self,
        can_id: u32,
        dlc: usize,
        data: &mut [u8],
        values: &SignalValues,
    ) -> Result<()> {
        let message = self.lookup(can_id, dlc, data.len())?;

        if let Some(unknown) = values.names().find(|n| message.signal(n).is_none()) {
            return Err(CodecError::SignalNotFound {
                message: message.name.clone(),
                signal: unknown.to_string(),
            });
        }

        let selector_value = match message.multiplexer_signal() {
            Some(selector) => {
                Some(selector.normalize_raw(values.get(&selector.name).unwrap_or(0))?)
            }
            None => None,
        };

        let mut plan = Vec::with_capacity(message.signals.len());
        for signal in &message.signals {
            if !self.is_active(signal, selector_value) {
                if values.get(&signal.name).is_some() {
                    log::warn!(
                        "Signal '{}' is not present for the current selector value, skipping",
                        signal.name
                    );
                }
                continue;
            }
            let raw = signal.normalize_raw(values.get(&signal.name).unwrap_or(0))?;
            signal.check_fits(data.len())?;
            plan.push((signal, raw));
        }

        for (signal, raw) in plan {
            signal.insert_raw(data, raw)?;
        }

        log::trace!("Encoded '{}' (ID 0x{:X})", message.name, can_id);
        Ok(())
    }

    /// Encode into a fresh zeroed payload of the message's length
    pub fn encode_frame(&self, can_id: u32, values: &SignalValues) -> Result<Vec<u8>> {
        let dlc = self
            .registry
            .find_by_id(can_id)
            .ok_or(CodecError::MessageNotFound(can_id))?
            .dlc;
        let mut data = vec![0u8; dlc];
        self.encode(can_id, dlc, &mut data, values)?;
        Ok(data)
    }

    /// Convert physical values to raw values using the configured overflow policy
    pub fn values_from_physical<'a>(
        &self,
        can_id: u32,
        physical: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<SignalValues> {
        let message = self
            .registry
            .find_by_id(can_id)
            .ok_or(CodecError::MessageNotFound(can_id))?;

        let mut values = SignalValues::new();
        for (name, value) in physical {
            let signal = message.signal(name).ok_or_else(|| CodecError::SignalNotFound {
                message: message.name.clone(),
                signal: name.to_string(),
            })?;
            values.set_physical(signal, value, self.config.overflow)?;
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;
    use crate::types::SignalValue;

    fn registry() -> MessageRegistry {
        MessageRegistry::build(vec![
            MessageDefinition::new(0x100, "Climate", 8)
                .with_sender("BCM")
                .with_signal(
                    SignalDefinition::new("Temperature", 0, 16)
                        .with_scaling(0.1, -40.0)
                        .with_unit("C"),
                )
                .with_signal(SignalDefinition::new("Fan", 16, 4).signed())
                .with_signal(SignalDefinition::new("AcOn", 20, 1))
                .with_signal(SignalDefinition::new("Pressure", 31, 16).big_endian()),
            MessageDefinition::new(0x200, "Mux", 4)
                .with_signal(SignalDefinition::new("Mode", 0, 8))
                .with_signal(SignalDefinition::new("A", 8, 16).multiplexed_by("Mode", vec![0]))
                .with_signal(
                    SignalDefinition::new("B", 8, 16)
                        .with_scaling(0.5, 0.0)
                        .multiplexed_by("Mode", vec![1, 2]),
                ),
        ])
        .unwrap()
    }

    #[test]
    fn test_decode_physical_values() {
        let codec = Codec::new(registry());
        // Temperature raw 500, Fan 0b1000, AcOn 1, Pressure 0x1234
        let data = [0xF4, 0x01, 0x18, 0x12, 0x34, 0x00, 0x00, 0x00];
        let decoded = codec.decode(0x100, 8, &data).unwrap();

        assert_eq!(decoded.name, "Climate");
        assert_eq!(decoded.sender.as_deref(), Some("BCM"));
        assert_eq!(decoded.signals.len(), 4);

        let temp = decoded.signal("Temperature").unwrap();
        assert_eq!(temp.raw_value, 500);
        assert!((temp.physical_value - 10.0).abs() < 1e-9);
        assert!(matches!(temp.value, SignalValue::Float(_)));

        let fan = decoded.signal("Fan").unwrap();
        assert_eq!(fan.raw_value, 0b1000);
        assert_eq!(fan.signed_value, -8);
        assert_eq!(fan.physical_value, -8.0);

        assert_eq!(decoded.signal("AcOn").unwrap().value, SignalValue::Boolean(true));
        assert_eq!(decoded.physical("Pressure"), Some(0x1234 as f64));
    }

    #[test]
    fn test_unknown_id() {
        let codec = Codec::new(registry());
        assert!(matches!(
            codec.decode(0x7FF, 8, &[0; 8]),
            Err(CodecError::MessageNotFound(0x7FF))
        ));
        let mut data = [0u8; 8];
        assert!(matches!(
            codec.encode(0x7FF, 8, &mut data, &SignalValues::new()),
            Err(CodecError::MessageNotFound(0x7FF))
        ));
    }

    #[test]
    fn test_dlc_mismatch() {
        let codec = Codec::new(registry());
        match codec.decode(0x100, 4, &[0; 8]) {
            Err(CodecError::DlcMismatch {
                can_id,
                expected,
                actual,
            }) => {
                assert_eq!(can_id, 0x100);
                assert_eq!(expected, 8);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut data = [0xAA; 8];
        let values = SignalValues::new().with_raw("Temperature", 1);
        assert!(codec.encode(0x100, 7, &mut data, &values).is_err());
        assert_eq!(data, [0xAA; 8]);
    }

    #[test]
    fn test_short_buffer_is_checked() {
        let codec = Codec::new(registry());
        assert!(matches!(
            codec.decode(0x100, 8, &[0; 2]),
            Err(CodecError::PayloadTooShort {
                can_id: 0x100,
                required: 8,
                available: 2
            })
        ));

        let mut data = [0u8; 3];
        assert!(matches!(
            codec.encode(0x100, 8, &mut data, &SignalValues::new()),
            Err(CodecError::PayloadTooShort { .. })
        ));
        assert_eq!(data, [0, 0, 0]);
    }

    #[test]
    fn test_short_buffer_beyond_last_signal() {
        // Only the first byte is covered, the buffer still has to hold the full DLC
        let message =
            MessageDefinition::new(0x10, "Status", 8).with_signal(SignalDefinition::new("A", 0, 8));
        let codec = Codec::new(MessageRegistry::build(vec![message]).unwrap());
        assert!(matches!(
            codec.decode(0x10, 8, &[0x01]),
            Err(CodecError::PayloadTooShort {
                required: 8,
                available: 1,
                ..
            })
        ));

        let mut data = [0xAA];
        let values = SignalValues::new().with_raw("A", 1);
        assert!(codec.encode(0x10, 8, &mut data, &values).is_err());
        assert_eq!(data, [0xAA]);

        // Longer buffers are fine, only the first DLC bytes are used
        let decoded = codec.decode(0x10, 8, &[0x01; 12]).unwrap();
        assert_eq!(decoded.physical("A"), Some(1.0));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let codec = Codec::new(registry());
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        let first = codec.decode(0x100, 8, &data).unwrap();
        let second = codec.decode(0x100, 8, &data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_round_trip() {
        let codec = Codec::new(registry());
        let data = [0xF4, 0x01, 0x18, 0x12, 0x34, 0x00, 0x00, 0x00];
        let decoded = codec.decode(0x100, 8, &data).unwrap();

        let encoded = codec.encode_frame(0x100, &SignalValues::from(&decoded)).unwrap();
        assert_eq!(encoded, data.to_vec());
    }

    #[test]
    fn test_encode_leaves_uncovered_bits() {
        let codec = Codec::new(registry());
        let mut data = [0xFF; 8];
        codec
            .encode(0x100, 8, &mut data, &SignalValues::new())
            .unwrap();
        // bits 21..23 and bytes 5..7 are not covered by any signal
        assert_eq!(data, [0x00, 0x00, 0xE0, 0x00, 0x00, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_is_all_or_nothing() {
        let codec = Codec::new(registry());
        let mut data = [0u8; 8];
        let values = SignalValues::new()
            .with_raw("Temperature", 500)
            .with_raw("Fan", 0x1F);
        assert!(matches!(
            codec.encode(0x100, 8, &mut data, &values),
            Err(CodecError::EncodeValueOutOfRange { .. })
        ));
        assert_eq!(data, [0u8; 8]);
    }

    #[test]
    fn test_encode_unknown_signal() {
        let codec = Codec::new(registry());
        let mut data = [0u8; 8];
        let values = SignalValues::new().with_raw("Nope", 1);
        assert!(matches!(
            codec.encode(0x100, 8, &mut data, &values),
            Err(CodecError::SignalNotFound { .. })
        ));
    }

    #[test]
    fn test_values_from_physical() {
        let codec = Codec::new(registry());
        let values = codec
            .values_from_physical(0x100, [("Temperature", 10.0), ("Fan", -1.0)])
            .unwrap();
        assert_eq!(values.get("Temperature"), Some(500));
        assert_eq!(values.get("Fan"), Some(0xF));

        assert!(codec
            .values_from_physical(0x100, [("Temperature", 10_000.0)])
            .is_err());

        let saturating = Codec::with_config(
            registry(),
            CodecConfig::new().with_overflow(OverflowPolicy::Saturate),
        );
        let values = saturating
            .values_from_physical(0x100, [("Temperature", 10_000.0)])
            .unwrap();
        assert_eq!(values.get("Temperature"), Some(0xFFFF));
    }

    #[test]
    fn test_multiplexed_decode() {
        let codec = Codec::new(registry());

        let decoded = codec.decode(0x200, 4, &[0x00, 0x10, 0x00, 0x00]).unwrap();
        assert_eq!(decoded.multiplexer_value, Some(0));
        assert_eq!(decoded.physical("A"), Some(16.0));
        assert!(decoded.signal("B").is_none());

        let decoded = codec.decode(0x200, 4, &[0x02, 0x10, 0x00, 0x00]).unwrap();
        assert_eq!(decoded.multiplexer_value, Some(2));
        assert!(decoded.signal("A").is_none());
        assert_eq!(decoded.physical("B"), Some(8.0));

        let decoded = codec.decode(0x200, 4, &[0x07, 0x10, 0x00, 0x00]).unwrap();
        assert_eq!(decoded.signals.len(), 1);
    }

    #[test]
    fn test_multiplexed_decoding_disabled() {
        let codec = Codec::with_config(
            registry(),
            CodecConfig::new().with_multiplexed_decoding(false),
        );
        let decoded = codec.decode(0x200, 4, &[0x00, 0x10, 0x00, 0x00]).unwrap();
        assert_eq!(decoded.multiplexer_value, None);
        assert_eq!(decoded.signals.len(), 1);
        assert_eq!(decoded.signals[0].name, "Mode");
    }

    #[test]
    fn test_multiplexed_encode() {
        let codec = Codec::new(registry());
        let values = SignalValues::new().with_raw("Mode", 1).with_raw("B", 0x0102);
        let data = codec.encode_frame(0x200, &values).unwrap();
        assert_eq!(data, vec![0x01, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_from_messages_with_selection() {
        let messages = registry().messages().to_vec();
        let selection = Selection::none().with_signals("Climate", ["Temperature"]);
        let codec = Codec::from_messages(&messages, &selection, CodecConfig::new()).unwrap();

        assert!(codec.find_message_by_id(0x200).is_none());
        let decoded = codec.decode(0x100, 8, &[0xF4, 0x01, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(decoded.signals.len(), 1);
    }

    #[test]
    fn test_codec_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Codec>();
    }
}
