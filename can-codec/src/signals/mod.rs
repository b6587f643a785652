//! Signal definitions, the message registry and the DBC adapter
//!
//! This module contains the immutable data model the codec works on and the
//! conversion from a parsed DBC database into it.

pub mod dbc;
pub mod definition;
pub mod registry;

// Re-export key types for convenience
pub use definition::{
    ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType,
    MAX_EXTENDED_ID, MAX_STANDARD_ID,
};
pub use registry::{MessageRegistry, RegistryStats};
