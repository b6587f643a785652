//! DBC text to decode, encode and C/C++ generation

use can_codec::signals::dbc::{load_dbc_file, parse_dbc_str};
use can_codec::{
    CEmitter, Codec, CodeEmitter, CodecConfig, CodecError, CppEmitter, Language, OverflowPolicy,
    Selection, SignalValue, SignalValues,
};
use std::io::Write;

const POWERTRAIN_DBC: &str = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: ECU1 ECU2

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2
 SG_ EngineTemp : 16|8@1+ (1,-40) [-40|215] "C" ECU2

BO_ 512 BatteryStatus: 8 ECU1
 SG_ BatteryVoltage : 0|16@1+ (0.01,0) [0|16] "V" ECU2
 SG_ BatteryCurrent : 23|16@0- (0.1,0) [-3276.8|3276.7] "A" ECU2
"#;

fn codec(selection: &Selection) -> Codec {
    let messages = parse_dbc_str(POWERTRAIN_DBC).unwrap();
    Codec::from_messages(&messages, selection, CodecConfig::default()).unwrap()
}

#[test]
fn test_decode_from_dbc() {
    let codec = codec(&Selection::All);
    let data = [0x10, 0x27, 0x5A, 0, 0, 0, 0, 0];

    let decoded = codec.decode(291, 8, &data).unwrap();
    assert_eq!(decoded.name, "EngineData");
    assert_eq!(decoded.sender.as_deref(), Some("ECU1"));
    assert_eq!(decoded.physical("EngineSpeed"), Some(10000.0));
    assert_eq!(decoded.physical("EngineTemp"), Some(50.0));
    assert_eq!(
        decoded.signal("EngineSpeed").unwrap().value,
        SignalValue::Integer(10000)
    );
}

#[test]
fn test_encode_big_endian_signed() {
    let codec = codec(&Selection::All);
    let values = codec
        .values_from_physical(512, [("BatteryVoltage", 12.34), ("BatteryCurrent", -12.5)])
        .unwrap();

    let frame = codec.encode_frame(512, &values).unwrap();
    assert_eq!(frame, vec![0xD2, 0x04, 0xFF, 0x83, 0, 0, 0, 0]);

    let decoded = codec.decode(512, 8, &frame).unwrap();
    let current = decoded.signal("BatteryCurrent").unwrap();
    assert_eq!(current.raw_value, 0xFF83);
    assert_eq!(current.signed_value, -125);
    assert!((current.physical_value + 12.5).abs() < 1e-9);
    assert!((decoded.physical("BatteryVoltage").unwrap() - 12.34).abs() < 1e-9);
}

#[test]
fn test_overflow_policy_from_config() {
    let messages = parse_dbc_str(POWERTRAIN_DBC).unwrap();

    let strict = Codec::from_messages(&messages, &Selection::All, CodecConfig::default()).unwrap();
    assert!(matches!(
        strict.values_from_physical(291, [("EngineTemp", 500.0)]),
        Err(CodecError::EncodeValueOutOfRange { .. })
    ));

    let config = CodecConfig::default().with_overflow(OverflowPolicy::Saturate);
    let lenient = Codec::from_messages(&messages, &Selection::All, config).unwrap();
    let values = lenient
        .values_from_physical(291, [("EngineTemp", 500.0)])
        .unwrap();
    assert_eq!(values.get("EngineTemp"), Some(255));
}

#[test]
fn test_selection_limits_codec() {
    let selection = Selection::none().with_signals("EngineData", ["EngineSpeed"]);
    let codec = codec(&selection);

    assert_eq!(codec.registry().len(), 1);
    assert!(matches!(
        codec.decode(512, 8, &[0; 8]),
        Err(CodecError::MessageNotFound(512))
    ));

    let decoded = codec.decode(291, 8, &[0x01, 0x00, 0xFF, 0, 0, 0, 0, 0]).unwrap();
    assert_eq!(decoded.signals.len(), 1);
    assert!(decoded.signal("EngineTemp").is_none());

    let values = SignalValues::new().with_raw("EngineTemp", 1);
    assert!(matches!(
        codec.encode_frame(291, &values),
        Err(CodecError::SignalNotFound { .. })
    ));
}

#[test]
fn test_same_file_loaded_twice() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(POWERTRAIN_DBC.as_bytes()).unwrap();
    file.flush().unwrap();

    let mut messages = load_dbc_file(file.path()).unwrap();
    messages.extend(load_dbc_file(file.path()).unwrap());
    assert_eq!(messages.len(), 4);

    let codec = Codec::from_messages(&messages, &Selection::All, CodecConfig::default()).unwrap();
    assert_eq!(codec.registry().len(), 2);

    let strict = CodecConfig::default().with_identical_duplicates(false);
    assert!(matches!(
        Codec::from_messages(&messages, &Selection::All, strict),
        Err(CodecError::DuplicateMessageId { can_id: 291, .. })
    ));
}

#[test]
fn test_generate_c_library() {
    let codec = codec(&Selection::none().with_message("BatteryStatus"));
    let library = CEmitter::new("dbc_library")
        .unwrap()
        .emit(codec.registry())
        .unwrap();

    assert!(library.header.contains("int dbc_library_decode_message("));
    assert!(library.header.contains("extern dbc_library_message_t dbc_library_BatteryStatus;"));
    assert!(!library.header.contains("EngineData"));
    assert!(library.source.contains(".name = \"BatteryCurrent\","));
    assert!(library.source.contains(".valueType = 's',"));
    assert!(library.source.contains(".id = 0x200u,"));
    assert!(library.source.contains(".sender = \"ECU1\","));

    let dir = tempfile::tempdir().unwrap();
    let paths = library.write_to(dir.path()).unwrap();
    assert!(dir.path().join("dbc_library.h").exists());
    assert!(dir.path().join("dbc_library.c").exists());
    assert_eq!(paths.len(), 2);
}

#[test]
fn test_generate_cpp_library() {
    let codec = codec(&Selection::none().with_signals("BatteryStatus", ["BatteryCurrent"]));
    let library = CppEmitter::new("dbc_library")
        .unwrap()
        .emit(codec.registry())
        .unwrap();

    assert_eq!(library.header_name, "dbc_library.hpp");
    assert!(library.header.contains("namespace dbc_library {"));
    assert!(library.header.contains("extern Message BatteryStatus;"));
    assert!(library.source.contains("Message BatteryStatus = {\n    0x200u,\n"));
    assert!(library.source.contains("\"BatteryCurrent\", 23, 16, \"big_endian\", 's', 0.1,"));
    assert!(!library.source.contains("BatteryVoltage"));

    let by_language = Language::Cpp
        .emitter("dbc_library")
        .unwrap()
        .emit(codec.registry())
        .unwrap();
    assert_eq!(by_language.header_name, library.header_name);
    assert_eq!(by_language.source_name, library.source_name);
}
