//! Message and signal selection
//!
//! A selection decides which messages (and which of their signals) are active
//! for the codec and the code emitter.

use crate::signals::MessageDefinition;
use crate::types::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Which messages and signals are active
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    /// Every message with every signal
    #[default]
    All,
    /// Message name -> signals to keep (empty = all signals of that message)
    Messages(BTreeMap<String, Vec<String>>),
}

impl Selection {
    /// Empty explicit selection
    pub fn none() -> Self {
        Selection::Messages(BTreeMap::new())
    }

    /// Builder method: select a message with all of its signals
    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with_signals(message, Vec::<String>::new())
    }

    /// Builder method: select a message with only the given signals
    pub fn with_signals<S: Into<String>>(
        self,
        message: impl Into<String>,
        signals: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut map = match self {
            Selection::All => BTreeMap::new(),
            Selection::Messages(map) => map,
        };
        map.entry(message.into())
            .or_default()
            .extend(signals.into_iter().map(Into::into));
        Selection::Messages(map)
    }

    /// Check if a message is selected
    pub fn includes_message(&self, message: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Messages(map) => map.contains_key(message),
        }
    }

    /// Check if a signal of a selected message is selected
    pub fn includes_signal(&self, message: &str, signal: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Messages(map) => match map.get(message) {
                Some(signals) => signals.is_empty() || signals.iter().any(|s| s == signal),
                None => false,
            },
        }
    }

    /// Reduce `messages` to the selected subset
    ///
    /// Messages keep their declaration order. When a multiplexed signal is
    /// kept, its selector is kept too. Names that match nothing in `messages`
    /// are an error.
    pub fn apply(&self, messages: &[MessageDefinition]) -> Result<Vec<MessageDefinition>> {
        if let Selection::Messages(map) = self {
            for (message_name, signal_names) in map {
                let message = messages
                    .iter()
                    .find(|m| &m.name == message_name)
                    .ok_or_else(|| {
                        CodecError::InvalidSelection(format!("unknown message '{}'", message_name))
                    })?;
                if let Some(missing) = signal_names.iter().find(|s| message.signal(s).is_none()) {
                    return Err(CodecError::InvalidSelection(format!(
                        "unknown signal '{}' in message '{}'",
                        missing, message_name
                    )));
                }
            }
        }

        let selected: Vec<MessageDefinition> = messages
            .iter()
            .filter(|m| self.includes_message(&m.name))
            .map(|m| self.filter_signals(m))
            .collect();

        log::debug!(
            "Selection kept {} of {} messages",
            selected.len(),
            messages.len()
        );
        Ok(selected)
    }

    fn filter_signals(&self, message: &MessageDefinition) -> MessageDefinition {
        let mut keep: HashSet<&str> = message
            .signals
            .iter()
            .filter(|s| self.includes_signal(&message.name, &s.name))
            .map(|s| s.name.as_str())
            .collect();

        let selectors: Vec<&str> = message
            .signals
            .iter()
            .filter(|s| keep.contains(s.name.as_str()))
            .filter_map(|s| s.multiplexer.as_ref().map(|mux| mux.selector.as_str()))
            .collect();
        keep.extend(selectors);

        let mut filtered = message.clone();
        filtered.signals.retain(|s| keep.contains(s.name.as_str()));
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalDefinition;

    fn messages() -> Vec<MessageDefinition> {
        vec![
            MessageDefinition::new(0x100, "Motor", 8)
                .with_signal(SignalDefinition::new("Speed", 0, 16))
                .with_signal(SignalDefinition::new("Torque", 16, 16))
                .with_signal(SignalDefinition::new("Crc", 56, 8)),
            MessageDefinition::new(0x200, "Mux", 8)
                .with_signal(SignalDefinition::new("Mode", 0, 8))
                .with_signal(SignalDefinition::new("A", 8, 8).multiplexed_by("Mode", vec![0])),
            MessageDefinition::new(0x300, "Other", 8),
        ]
    }

    #[test]
    fn test_select_all() {
        let selected = Selection::All.apply(&messages()).unwrap();
        assert_eq!(selected, messages());
    }

    #[test]
    fn test_select_subset() {
        let selection = Selection::none()
            .with_signals("Motor", ["Speed", "Crc"])
            .with_message("Other");
        let selected = selection.apply(&messages()).unwrap();

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "Motor");
        let names: Vec<&str> = selected[0].signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Speed", "Crc"]);
        assert_eq!(selected[1].name, "Other");
    }

    #[test]
    fn test_selector_follows_multiplexed_signal() {
        let selection = Selection::none().with_signals("Mux", ["A"]);
        let selected = selection.apply(&messages()).unwrap();
        let names: Vec<&str> = selected[0].signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Mode", "A"]);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let selection = Selection::none().with_message("Missing");
        assert!(matches!(
            selection.apply(&messages()),
            Err(CodecError::InvalidSelection(_))
        ));

        let selection = Selection::none().with_signals("Motor", ["Missing"]);
        assert!(selection.apply(&messages()).is_err());
    }

    #[test]
    fn test_includes() {
        let selection = Selection::none().with_signals("Motor", ["Speed"]);
        assert!(selection.includes_message("Motor"));
        assert!(!selection.includes_message("Other"));
        assert!(selection.includes_signal("Motor", "Speed"));
        assert!(!selection.includes_signal("Motor", "Torque"));
        assert!(Selection::All.includes_signal("Any", "Thing"));
    }
}
