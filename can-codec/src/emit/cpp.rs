//! C++ library emitter
//!
//! Produces `<lib>.hpp` and `<lib>.cpp`. Everything lives in `namespace <lib>`:
//! the `Signal` and `Message` aggregates, one `Message` instance per message,
//! the `all_messages` registry, and the same six codec functions as the C
//! output (`find_message_by_id`, `parse_signal`, `decode_message`,
//! `insert_signal`, `encode_message`, `set_physical_value`).
//!
//! The bit layout rules are the ones of the C output and of [`crate::bits`].
//! Decoded values are kept on the instances, so the code is not reentrant.

use super::{
    banner, c_double, c_identifier, c_string, validate_library_name, CodeEmitter,
    GeneratedLibrary,
};
use crate::signals::{MessageDefinition, MessageRegistry, SignalDefinition};
use crate::types::Result;
use chrono::NaiveDate;
use std::fmt::Write;

/// Names that cannot be used for message instances inside the namespace
const RESERVED: &[&str] = &[
    "Signal", "Message", "all_messages", "find_message_by_id", "parse_signal",
    "decode_message", "insert_signal", "encode_message", "set_physical_value",
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool",
    "break", "case", "catch", "char", "char16_t", "char32_t", "class", "compl",
    "const", "constexpr", "const_cast", "continue", "decltype", "default", "delete",
    "do", "double", "dynamic_cast", "else", "enum", "explicit", "export", "extern",
    "false", "float", "for", "friend", "goto", "if", "inline", "int", "long",
    "mutable", "namespace", "new", "noexcept", "not", "not_eq", "nullptr",
    "operator", "or", "or_eq", "private", "protected", "public", "register",
    "reinterpret_cast", "return", "short", "signed", "sizeof", "static",
    "static_assert", "static_cast", "struct", "switch", "template", "this",
    "thread_local", "throw", "true", "try", "typedef", "typeid", "typename",
    "union", "unsigned", "using", "virtual", "void", "volatile", "wchar_t",
    "while", "xor", "xor_eq",
];

/// Emits a C++11 library for a message registry
#[derive(Debug, Clone)]
pub struct CppEmitter {
    library_name: String,
    generated_on: NaiveDate,
}

impl CppEmitter {
    /// Emitter stamped with today's date
    pub fn new(library_name: impl Into<String>) -> Result<Self> {
        let library_name = library_name.into();
        validate_library_name(&library_name)?;
        Ok(Self {
            library_name,
            generated_on: chrono::Local::now().date_naive(),
        })
    }

    /// Builder method: fix the generation date (for reproducible output)
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.generated_on = date;
        self
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    fn instance_name(message: &MessageDefinition) -> String {
        let mut ident = c_identifier(&message.name);
        if RESERVED.contains(&ident.as_str()) {
            ident.push('_');
        }
        ident
    }

    fn render_header(&self, registry: &MessageRegistry) -> String {
        let lib = &self.library_name;
        let guard = format!("{}_HPP", lib.to_ascii_uppercase());
        let mut h = banner(
            &format!("{}.hpp", lib),
            "Definitions of structures and functions for CAN communication",
            self.generated_on,
        );

        let _ = write!(h, "#ifndef {guard}\n#define {guard}\n\n");
        h.push_str("#include <cstddef>\n#include <cstdint>\n");
        h.push_str("#include <string>\n#include <vector>\n\n");
        let _ = write!(h, "namespace {lib} {{\n\n");
        h.push_str(HEADER_TYPES);

        h.push_str("/* Message instances */\n");
        for message in registry.messages() {
            let _ = writeln!(
                h,
                "extern Message {}; /**< {} (ID 0x{:X}) */",
                Self::instance_name(message),
                message.name,
                message.id
            );
        }
        h.push('\n');

        h.push_str(HEADER_FUNCTIONS);
        let _ = write!(h, "}}  // namespace {lib}\n\n#endif /* {guard} */\n");
        h
    }

    fn render_signal(out: &mut String, message: &MessageDefinition, signal: &SignalDefinition) {
        let (selector, values) = signal
            .multiplexer
            .as_ref()
            .and_then(|info| {
                let selector = message
                    .signals
                    .iter()
                    .position(|s| s.name == info.selector)?;
                let values: Vec<String> =
                    info.values.iter().map(|v| format!("{}u", v)).collect();
                Some((selector as i64, format!("{{ {} }}", values.join(", "))))
            })
            .unwrap_or((-1, "{}".to_string()));

        let _ = writeln!(
            out,
            "        {{ {name}, {start}, {length}, \"{order}\", '{vt}', {factor}, {offset}, \
             {min}, {max}, {unit}, {receiver}, {selector}, {values}, 0, 0.0 }},",
            name = c_string(&signal.name),
            start = signal.start_bit,
            length = signal.length,
            order = signal.byte_order.as_str(),
            vt = signal.value_type.as_char(),
            factor = c_double(signal.factor),
            offset = c_double(signal.offset),
            min = c_double(signal.min),
            max = c_double(signal.max),
            unit = c_string(signal.unit.as_deref().unwrap_or("")),
            receiver = c_string(&signal.receivers.join(", ")),
            selector = selector,
            values = values,
        );
    }

    fn render_message(out: &mut String, message: &MessageDefinition) {
        let _ = write!(
            out,
            "/* Message: {} */\n\
             Message {instance} = {{\n\
             \x20   0x{id:X}u,\n\
             \x20   {name},\n\
             \x20   {dlc},\n\
             \x20   {fd},\n\
             \x20   {sender},\n\
             \x20   {{\n",
            message.name,
            instance = Self::instance_name(message),
            id = message.id,
            name = c_string(&message.name),
            dlc = message.dlc,
            fd = message.is_fd(),
            sender = c_string(message.sender().unwrap_or("")),
        );
        for signal in &message.signals {
            Self::render_signal(out, message, signal);
        }
        out.push_str("    }\n};\n\n");
    }

    fn render_source(&self, registry: &MessageRegistry) -> String {
        let lib = &self.library_name;
        let mut c = banner(
            &format!("{}.cpp", lib),
            "Implementation of functions for CAN communication",
            self.generated_on,
        );
        let _ = write!(c, "#include \"{lib}.hpp\"\n\n");
        c.push_str("#include <cmath>\n#include <limits>\n\n");
        let _ = write!(c, "namespace {lib} {{\n\n");

        for message in registry.messages() {
            Self::render_message(&mut c, message);
        }

        c.push_str("/* Message registry */\nconst std::vector<Message*> all_messages = {\n");
        for message in registry.messages() {
            let _ = writeln!(c, "    &{},", Self::instance_name(message));
        }
        c.push_str("};\n\n");

        c.push_str(SOURCE_FUNCTIONS);
        let _ = write!(c, "}}  // namespace {lib}\n");
        c
    }
}

impl CodeEmitter for CppEmitter {
    fn emit(&self, registry: &MessageRegistry) -> Result<GeneratedLibrary> {
        log::info!(
            "Generating C++ library '{}' for {} messages",
            self.library_name,
            registry.len()
        );
        Ok(GeneratedLibrary {
            header_name: format!("{}.hpp", self.library_name),
            header: self.render_header(registry),
            source_name: format!("{}.cpp", self.library_name),
            source: self.render_source(registry),
        })
    }
}

const HEADER_TYPES: &str = r#"/**
 * @brief Signal descriptor with the last decoded or staged value.
 */
struct Signal {
    std::string name;                 /**< Name of the signal. */
    uint16_t startBit;                /**< Start bit (LSB for little_endian, MSB for big_endian). */
    uint8_t length;                   /**< Length of the signal in bits (1..64). */
    std::string byteOrder;            /**< "little_endian" or "big_endian". */
    char valueType;                   /**< 's' for signed, 'u' for unsigned. */
    double factor;                    /**< Factor for conversion to physical value. */
    double offset;                    /**< Offset for conversion to physical value. */
    double min;                       /**< Minimum physical value (advisory). */
    double max;                       /**< Maximum physical value (advisory). */
    std::string unit;                 /**< Unit of the signal. */
    std::string receiver;             /**< Receivers of the signal, comma separated. */
    int16_t mux_selector;             /**< Index of the selector signal, -1 if not multiplexed. */
    std::vector<uint64_t> mux_values; /**< Selector values for which the signal is present. */
    uint64_t raw_value;               /**< Current raw value of the signal. */
    double value;                     /**< Current physical value of the signal. */
};

/**
 * @brief CAN message descriptor.
 */
struct Message {
    uint32_t id;                      /**< CAN ID of the message. */
    std::string name;                 /**< Name of the message. */
    uint8_t dlc;                      /**< Payload length in bytes. */
    bool is_fd;                       /**< True if the payload is longer than 8 bytes. */
    std::string sender;               /**< Primary sender of the message. */
    std::vector<Signal> signals;      /**< Signals of the message. */
};

"#;

const HEADER_FUNCTIONS: &str = r#"/* Global registry of all generated messages */
extern const std::vector<Message*> all_messages;

/**
 * @brief Finds a message in the registry by its CAN ID.
 * @return Pointer to the message or nullptr if the ID is unknown.
 */
Message* find_message_by_id(uint32_t can_id);

/**
 * @brief Extracts the raw bit pattern of a signal from CAN data.
 * @param byte_order "little_endian" or "big_endian".
 */
uint64_t parse_signal(const uint8_t* data, uint16_t start_bit, uint8_t length,
                      const std::string& byte_order);

/**
 * @brief Decodes a received frame into the message's signal values.
 * @return 0 on success, -1 if the ID is unknown or the DLC does not match.
 */
int decode_message(uint32_t can_id, uint8_t dlc, const uint8_t* data);

/**
 * @brief Writes the low length bits of raw_value into CAN data.
 * @details Bits outside the signal are left untouched.
 */
void insert_signal(uint8_t* data, uint64_t raw_value, uint16_t start_bit, uint8_t length,
                   const std::string& byte_order);

/**
 * @brief Encodes the staged raw values of a message into CAN data.
 * @return 0 on success, -1 if the ID is unknown or the DLC does not match.
 */
int encode_message(uint32_t can_id, uint8_t dlc, uint8_t* data);

/**
 * @brief Converts a physical value to raw and stages it on the signal.
 * @return 0 on success, -1 if the value does not fit the signal.
 */
int set_physical_value(Signal& sig, double value);

"#;

const SOURCE_FUNCTIONS: &str = r#"namespace {

uint64_t mask(uint8_t length) {
    return (length >= 64) ? std::numeric_limits<uint64_t>::max()
                          : ((uint64_t{1} << length) - 1u);
}

uint16_t next_motorola_bit(uint16_t pos) {
    return (pos % 8 == 0) ? static_cast<uint16_t>(pos + 15) : static_cast<uint16_t>(pos - 1);
}

bool signal_active(const Message& msg, const Signal& sig) {
    if (sig.mux_selector < 0) {
        return true;
    }
    uint64_t selector = msg.signals[static_cast<size_t>(sig.mux_selector)].raw_value;
    for (uint64_t value : sig.mux_values) {
        if (value == selector) {
            return true;
        }
    }
    return false;
}

void update_value(Signal& sig) {
    double raw;
    if (sig.valueType == 's' && sig.length < 64) {
        uint8_t shift = static_cast<uint8_t>(64 - sig.length);
        raw = static_cast<double>(static_cast<int64_t>(sig.raw_value << shift) >> shift);
    } else if (sig.valueType == 's') {
        raw = static_cast<double>(static_cast<int64_t>(sig.raw_value));
    } else {
        raw = static_cast<double>(sig.raw_value);
    }
    sig.value = raw * sig.factor + sig.offset;
}

}  // namespace

Message* find_message_by_id(uint32_t can_id) {
    for (Message* msg : all_messages) {
        if (msg->id == can_id) {
            return msg;
        }
    }
    return nullptr;
}

uint64_t parse_signal(const uint8_t* data, uint16_t start_bit, uint8_t length,
                      const std::string& byte_order) {
    uint64_t result = 0;

    if (byte_order == "little_endian") {
        uint16_t pos = start_bit;
        for (uint8_t i = 0; i < length; i++, pos++) {
            uint64_t bit = (data[pos / 8] >> (pos % 8)) & 0x1u;
            result |= bit << i;
        }
    } else {
        uint16_t pos = start_bit;
        for (uint8_t i = 0; i < length; i++) {
            uint64_t bit = (data[pos / 8] >> (pos % 8)) & 0x1u;
            result = (result << 1) | bit;
            pos = next_motorola_bit(pos);
        }
    }

    return result;
}

int decode_message(uint32_t can_id, uint8_t dlc, const uint8_t* data) {
    Message* msg = find_message_by_id(can_id);
    if (!msg || msg->dlc != dlc) {
        return -1;
    }

    /* Plain signals (selectors included) first, then the active multiplexed ones */
    for (int pass = 0; pass < 2; pass++) {
        for (Signal& sig : msg->signals) {
            if ((pass == 0) != (sig.mux_selector < 0) || !signal_active(*msg, sig)) {
                continue;
            }
            sig.raw_value = parse_signal(data, sig.startBit, sig.length, sig.byteOrder);
            update_value(sig);
        }
    }

    return 0;
}

void insert_signal(uint8_t* data, uint64_t raw_value, uint16_t start_bit, uint8_t length,
                   const std::string& byte_order) {
    uint16_t pos = start_bit;
    bool little_endian = byte_order == "little_endian";

    for (uint8_t i = 0; i < length; i++) {
        uint64_t shift = little_endian ? i : static_cast<uint64_t>(length - 1 - i);
        bool bit = ((raw_value >> shift) & 1u) != 0;
        uint8_t bit_mask = static_cast<uint8_t>(1u << (pos % 8));

        if (bit) {
            data[pos / 8] |= bit_mask;
        } else {
            data[pos / 8] &= static_cast<uint8_t>(~bit_mask);
        }
        pos = little_endian ? static_cast<uint16_t>(pos + 1) : next_motorola_bit(pos);
    }
}

int encode_message(uint32_t can_id, uint8_t dlc, uint8_t* data) {
    Message* msg = find_message_by_id(can_id);
    if (!msg || msg->dlc != dlc) {
        return -1;
    }

    for (const Signal& sig : msg->signals) {
        if (!signal_active(*msg, sig)) {
            continue;
        }
        insert_signal(data, sig.raw_value & mask(sig.length), sig.startBit, sig.length,
                      sig.byteOrder);
    }

    return 0;
}

int set_physical_value(Signal& sig, double value) {
    if (sig.factor == 0.0 || std::isnan(value) || std::isinf(value)) {
        return -1;
    }

    /* Both bounds are powers of two, so the comparisons stay exact at 64 bits */
    double scaled = std::round((value - sig.offset) / sig.factor);
    if (sig.valueType == 's') {
        double bound = std::ldexp(1.0, sig.length - 1);
        if (scaled < -bound || scaled >= bound) {
            return -1;
        }
        sig.raw_value = static_cast<uint64_t>(static_cast<int64_t>(scaled)) & mask(sig.length);
    } else {
        if (scaled < 0.0 || scaled >= std::ldexp(1.0, sig.length)) {
            return -1;
        }
        sig.raw_value = static_cast<uint64_t>(scaled);
    }
    sig.value = value;
    return 0;
}

"#;
