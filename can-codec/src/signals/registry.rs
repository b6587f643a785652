//! Message registry
//!
//! Lookup of message definitions by CAN ID. The registry is built once from
//! the active message set and is read-only afterwards, so it can be shared
//! freely between threads.

use crate::config::CodecConfig;
use crate::signals::definition::MessageDefinition;
use crate::types::{CodecError, Result};
use std::collections::HashMap;

/// Read-only set of message definitions indexed by CAN ID
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    /// Message definitions in declaration order
    messages: Vec<MessageDefinition>,

    /// Key: CAN ID, Value: index into `messages`
    by_id: HashMap<u32, usize>,

    /// Key: message name, Value: index into `messages`
    by_name: HashMap<String, usize>,
}

impl MessageRegistry {
    /// Build a registry with the default configuration
    pub fn build(messages: impl IntoIterator<Item = MessageDefinition>) -> Result<Self> {
        Self::build_with_config(messages, &CodecConfig::default())
    }

    /// Build a registry, validating every message against `config`
    ///
    /// Two different definitions with the same CAN ID fail with
    /// `DuplicateMessageId`. The same definition loaded twice (e.g. from two
    /// database files) is kept once when `allow_identical_duplicates` is set.
    pub fn build_with_config(
        messages: impl IntoIterator<Item = MessageDefinition>,
        config: &CodecConfig,
    ) -> Result<Self> {
        let mut registry = Self::default();

        for message in messages {
            message.validate(config.max_dlc)?;

            if let Some(&idx) = registry.by_id.get(&message.id) {
                let existing = &registry.messages[idx];
                if config.allow_identical_duplicates && *existing == message {
                    log::warn!(
                        "Message '{}' (ID 0x{:X}) defined twice with identical layout, keeping one",
                        message.name,
                        message.id
                    );
                    continue;
                }
                return Err(CodecError::DuplicateMessageId {
                    can_id: message.id,
                    first: existing.name.clone(),
                    second: message.name,
                });
            }

            if registry.by_name.contains_key(&message.name) {
                return Err(CodecError::InvalidMessageDefinition(format!(
                    "message name '{}' is used by more than one CAN ID",
                    message.name
                )));
            }

            let idx = registry.messages.len();
            registry.by_id.insert(message.id, idx);
            registry.by_name.insert(message.name.clone(), idx);
            registry.messages.push(message);
        }

        log::debug!(
            "Built message registry: {} messages, {} signals",
            registry.len(),
            registry.stats().num_signals
        );
        Ok(registry)
    }

    /// Find a message by CAN ID
    pub fn find_by_id(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.by_id.get(&can_id).map(|&idx| &self.messages[idx])
    }

    /// Find a message by name
    pub fn find_by_name(&self, name: &str) -> Option<&MessageDefinition> {
        self.by_name.get(name).map(|&idx| &self.messages[idx])
    }

    /// All messages in declaration order
    pub fn messages(&self) -> &[MessageDefinition] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.iter().map(|m| m.signals.len()).sum(),
            num_fd_messages: self.messages.iter().filter(|m| m.is_fd()).count(),
        }
    }

    /// All CAN IDs, sorted
    pub fn can_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
    /// Messages longer than 8 bytes
    pub num_fd_messages: usize,
}
