//! CAN Signal Codec Library
//!
//! A stateless, reusable library for decoding and encoding CAN frames with
//! signal definitions loaded from DBC files.
//!
//! # Architecture
//!
//! - [`bits`] extracts and inserts bit fields in Intel and Motorola layout
//! - [`signals`] holds the immutable message model and the DBC adapter
//! - [`selection`] narrows a database to the messages and signals in use
//! - [`Codec`] decodes frames into snapshots and encodes values into frames
//! - [`emit`] generates a standalone C or C++ library for the same messages
//!
//! Decoding never mutates the registry: every call returns a fresh
//! [`DecodedMessage`], so one codec can be shared between threads.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_codec::signals::dbc::load_dbc_file;
//! use can_codec::{Codec, CodecConfig, Selection, SignalValues};
//! use std::path::Path;
//!
//! let messages = load_dbc_file(Path::new("powertrain.dbc")).unwrap();
//! let selection = Selection::none().with_signals("EngineData", ["EngineSpeed"]);
//! let codec = Codec::from_messages(&messages, &selection, CodecConfig::default()).unwrap();
//!
//! let decoded = codec.decode(0x123, 8, &[0x10, 0x27, 0, 0, 0, 0, 0, 0]).unwrap();
//! println!("EngineSpeed = {:?}", decoded.physical("EngineSpeed"));
//!
//! let values = SignalValues::new().with_raw("EngineSpeed", 3000);
//! let frame = codec.encode_frame(0x123, &values).unwrap();
//! println!("{:02X?}", frame);
//! ```

// Public modules
pub mod bits;
pub mod codec;
pub mod config;
pub mod emit;
pub mod selection;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use codec::Codec;
pub use config::{CodecConfig, OverflowPolicy};
pub use emit::{CEmitter, CodeEmitter, CppEmitter, GeneratedLibrary, Language};
pub use selection::Selection;
pub use signals::{
    ByteOrder, MessageDefinition, MessageRegistry, MultiplexerInfo, RegistryStats,
    SignalDefinition, ValueType,
};
pub use types::{
    CodecError, DecodedMessage, DecodedSignal, Result, SignalValue, SignalValues,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
