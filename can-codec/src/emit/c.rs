//! C library emitter
//!
//! Produces `<lib>.h` and `<lib>.c` with one statically allocated instance per
//! message, a registry array, and the codec functions:
//!
//! - `<lib>_find_message_by_id`
//! - `<lib>_parse_signal`
//! - `<lib>_decode_message`
//! - `<lib>_insert_signal`
//! - `<lib>_encode_message`
//! - `<lib>_set_physical_value`
//!
//! Unlike the Rust codec, the generated code keeps the last decoded values on
//! the message instances, so it is not reentrant.

use super::{
    banner, c_double, c_identifier, c_string, validate_library_name, CodeEmitter,
    GeneratedLibrary,
};
use crate::signals::{MessageDefinition, MessageRegistry, SignalDefinition};
use crate::types::Result;
use chrono::NaiveDate;
use std::fmt::Write;

/// Emits a C99 library for a message registry
#[derive(Debug, Clone)]
pub struct CEmitter {
    library_name: String,
    generated_on: NaiveDate,
}

impl CEmitter {
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

    fn instance_name(&self, message: &MessageDefinition) -> String {
        format!("{}_{}", self.library_name, c_identifier(&message.name))
    }

    fn render_header(&self, registry: &MessageRegistry) -> String {
        let lib = &self.library_name;
        let guard = format!("{}_H", lib.to_ascii_uppercase());
        let mut h = banner(
            &format!("{}.h", lib),
            "Definitions of structures and functions for CAN communication",
            self.generated_on,
        );

        let _ = write!(h, "#ifndef {guard}\n#define {guard}\n\n");
        h.push_str("#include <stdint.h>\n#include <stddef.h>\n\n");
        h.push_str(&HEADER_TYPES.replace("@LIB@", lib));

        h.push_str("/* Message instances */\n");
        for message in registry.messages() {
            let _ = writeln!(
                h,
                "extern {lib}_message_t {}; /**< {} (ID 0x{:X}) */",
                self.instance_name(message),
                message.name,
                message.id
            );
        }
        h.push('\n');

        h.push_str(&HEADER_FUNCTIONS.replace("@LIB@", lib));
        let _ = write!(h, "#endif /* {guard} */\n");
        h
    }

    fn render_signal(
        &self,
        out: &mut String,
        signal: &SignalDefinition,
        mux: Option<(usize, &str)>,
    ) {
        let _ = write!(
            out,
            "    {{\n\
             \x20       .name = {name},\n\
             \x20       .startBit = {start},\n\
             \x20       .length = {length},\n\
             \x20       .byteOrder = \"{order}\",\n\
             \x20       .valueType = '{vt}',\n\
             \x20       .factor = {factor},\n\
             \x20       .offset = {offset},\n\
             \x20       .min = {min},\n\
             \x20       .max = {max},\n\
             \x20       .unit = {unit},\n\
             \x20       .receiver = {receiver},\n",
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
        );
        match (mux, &signal.multiplexer) {
            (Some((selector, values)), Some(info)) => {
                let _ = write!(
                    out,
                    "        .mux_selector = {},\n\
                     \x20       .mux_values = {},\n\
                     \x20       .num_mux_values = {},\n",
                    selector,
                    values,
                    info.values.len()
                );
            }
            _ => out.push_str(
                "        .mux_selector = -1,\n\
                 \x20       .mux_values = NULL,\n\
                 \x20       .num_mux_values = 0,\n",
            ),
        }
        out.push_str("        .raw_value = 0,\n        .value = 0.0\n    },\n");
    }

    fn render_message(&self, out: &mut String, message: &MessageDefinition) {
        let instance = self.instance_name(message);
        let lib = &self.library_name;
        let _ = writeln!(out, "/* Message: {} */", message.name);

        let mux_arrays: Vec<Option<(usize, String)>> = message
            .signals
            .iter()
            .map(|signal| {
                let info = signal.multiplexer.as_ref()?;
                let selector = message
                    .signals
                    .iter()
                    .position(|s| s.name == info.selector)?;
                let array = format!("{}_{}_mux", instance, c_identifier(&signal.name));
                let values: Vec<String> =
                    info.values.iter().map(|v| format!("{}u", v)).collect();
                let _ = writeln!(
                    out,
                    "static const uint64_t {}[] = {{ {} }};",
                    array,
                    values.join(", ")
                );
                Some((selector, array))
            })
            .collect();

        let signals_array = if message.signals.is_empty() {
            "NULL".to_string()
        } else {
            let array = format!("{}_signals", instance);
            let _ = writeln!(out, "static {lib}_signal_t {array}[] = {{");
            for (signal, mux) in message.signals.iter().zip(&mux_arrays) {
                let mux = mux.as_ref().map(|(sel, arr)| (*sel, arr.as_str()));
                self.render_signal(out, signal, mux);
            }
            out.push_str("};\n");
            array
        };

        let _ = write!(
            out,
            "{lib}_message_t {instance} = {{\n\
             \x20   .id = 0x{id:X}u,\n\
             \x20   .name = {name},\n\
             \x20   .dlc = {dlc},\n\
             \x20   .is_fd = {fd},\n\
             \x20   .sender = {sender},\n\
             \x20   .num_signals = {count},\n\
             \x20   .signals = {signals}\n\
             }};\n\n",
            id = message.id,
            name = c_string(&message.name),
            dlc = message.dlc,
            fd = u8::from(message.is_fd()),
            sender = c_string(message.sender().unwrap_or("")),
            count = message.signals.len(),
            signals = signals_array,
        );
    }

    fn render_source(&self, registry: &MessageRegistry) -> String {
        let lib = &self.library_name;
        let mut c = banner(
            &format!("{}.c", lib),
            "Implementation of functions for CAN communication",
            self.generated_on,
        );
        let _ = write!(c, "#include \"{lib}.h\"\n\n");
        c.push_str("#include <math.h>\n#include <string.h>\n\n");

        for message in registry.messages() {
            self.render_message(&mut c, message);
        }

        c.push_str("/* Message registry */\n");
        if registry.is_empty() {
            let _ = writeln!(
                c,
                "{lib}_message_t* const {lib}_all_messages[1] = {{ NULL }};"
            );
        } else {
            let _ = writeln!(c, "{lib}_message_t* const {lib}_all_messages[] = {{");
            for message in registry.messages() {
                let _ = writeln!(c, "    &{},", self.instance_name(message));
            }
            c.push_str("};\n");
        }
        let _ = write!(
            c,
            "const size_t {lib}_all_messages_count = {};\n\n",
            registry.len()
        );

        c.push_str(&SOURCE_FUNCTIONS.replace("@LIB@", lib));
        c
    }
}

impl CodeEmitter for CEmitter {
    fn emit(&self, registry: &MessageRegistry) -> Result<GeneratedLibrary> {
        log::info!(
            "Generating C library '{}' for {} messages",
            self.library_name,
            registry.len()
        );
        Ok(GeneratedLibrary {
            header_name: format!("{}.h", self.library_name),
            header: self.render_header(registry),
            source_name: format!("{}.c", self.library_name),
            source: self.render_source(registry),
        })
    }
}

const HEADER_TYPES: &str = r#"/**
 * @brief Signal descriptor with the last decoded or staged value.
 */
typedef struct {
    const char *name;          /**< Name of the signal. */
    uint16_t startBit;         /**< Start bit (LSB for little_endian, MSB for big_endian). */
    uint8_t length;            /**< Length of the signal in bits (1..64). */
    const char *byteOrder;     /**< "little_endian" or "big_endian". */
    char valueType;            /**< 's' for signed, 'u' for unsigned. */
    double factor;             /**< Factor for conversion to physical value. */
    double offset;             /**< Offset for conversion to physical value. */
    double min;                /**< Minimum physical value (advisory). */
    double max;                /**< Maximum physical value (advisory). */
    const char *unit;          /**< Unit of the signal. */
    const char *receiver;      /**< Receivers of the signal, comma separated. */
    int16_t mux_selector;      /**< Index of the selector signal, -1 if not multiplexed. */
    const uint64_t *mux_values;/**< Selector values for which the signal is present. */
    size_t num_mux_values;     /**< Number of entries in mux_values. */
    uint64_t raw_value;        /**< Current raw value of the signal. */
    double value;              /**< Current physical value of the signal. */
} @LIB@_signal_t;

/**
 * @brief CAN message descriptor.
 */
typedef struct {
    uint32_t id;               /**< CAN ID of the message. */
    const char *name;          /**< Name of the message. */
    uint8_t dlc;               /**< Payload length in bytes. */
    uint8_t is_fd;             /**< 1 if the payload is longer than 8 bytes. */
    const char *sender;        /**< Primary sender of the message. */
    size_t num_signals;        /**< Number of signals in the message. */
    @LIB@_signal_t *signals;   /**< Signals of the message. */
} @LIB@_message_t;

"#;

const HEADER_FUNCTIONS: &str = r#"/* Global registry of all generated messages */
extern @LIB@_message_t* const @LIB@_all_messages[];
/* Number of messages in @LIB@_all_messages */
extern const size_t @LIB@_all_messages_count;

/**
 * @brief Finds a message in the registry by its CAN ID.
 * @return Pointer to the message or NULL if the ID is unknown.
 */
@LIB@_message_t* @LIB@_find_message_by_id(uint32_t can_id);

/**
 * @brief Extracts the raw bit pattern of a signal from CAN data.
 * @param byte_order "little_endian" or "big_endian".
 */
uint64_t @LIB@_parse_signal(const uint8_t* data, uint16_t start_bit, uint8_t length,
                            const char* byte_order);

/**
 * @brief Decodes a received frame into the message's signal values.
 * @return 0 on success, -1 if the ID is unknown or the DLC does not match.
 */
int @LIB@_decode_message(uint32_t can_id, uint8_t dlc, const uint8_t* data);

/**
 * @brief Writes the low length bits of raw_value into CAN data.
 * @details Bits outside the signal are left untouched.
 */
void @LIB@_insert_signal(uint8_t* data, uint64_t raw_value, uint16_t start_bit,
                         uint8_t length, const char* byte_order);

/**
 * @brief Encodes the staged raw values of a message into CAN data.
 * @return 0 on success, -1 if the ID is unknown or the DLC does not match.
 */
int @LIB@_encode_message(uint32_t can_id, uint8_t dlc, uint8_t* data);

/**
 * @brief Converts a physical value to raw and stages it on the signal.
 * @return 0 on success, -1 if the value does not fit the signal.
 */
int @LIB@_set_physical_value(@LIB@_signal_t* sig, double value);

"#;

const SOURCE_FUNCTIONS: &str = r#"static uint64_t @LIB@_mask(uint8_t length) {
    return (length >= 64) ? UINT64_MAX : ((UINT64_C(1) << length) - 1u);
}

static uint16_t @LIB@_next_motorola_bit(uint16_t pos) {
    return (pos % 8 == 0) ? (uint16_t)(pos + 15) : (uint16_t)(pos - 1);
}

static int @LIB@_signal_active(const @LIB@_message_t* msg, const @LIB@_signal_t* sig) {
    if (sig->mux_selector < 0) {
        return 1;
    }
    uint64_t selector = msg->signals[sig->mux_selector].raw_value;
    for (size_t i = 0; i < sig->num_mux_values; i++) {
        if (sig->mux_values[i] == selector) {
            return 1;
        }
    }
    return 0;
}

static void @LIB@_signal_update_value(@LIB@_signal_t* sig) {
    if (sig->valueType == 's' && sig->length < 64) {
        uint8_t shift = (uint8_t)(64 - sig->length);
        int64_t extended = (int64_t)(sig->raw_value << shift) >> shift;
        sig->value = (double)extended * sig->factor + sig->offset;
    } else if (sig->valueType == 's') {
        sig->value = (double)(int64_t)sig->raw_value * sig->factor + sig->offset;
    } else {
        sig->value = (double)sig->raw_value * sig->factor + sig->offset;
    }
}

@LIB@_message_t* @LIB@_find_message_by_id(uint32_t can_id) {
    for (size_t i = 0; i < @LIB@_all_messages_count; i++) {
        if (@LIB@_all_messages[i]->id == can_id) {
            return @LIB@_all_messages[i];
        }
    }
    return NULL;
}

uint64_t @LIB@_parse_signal(const uint8_t* data, uint16_t start_bit, uint8_t length,
                            const char* byte_order) {
    uint64_t result = 0;

    if (strcmp(byte_order, "little_endian") == 0) {
        uint16_t byte_index = start_bit / 8;
        uint8_t bit_index = start_bit % 8;
        uint8_t bits_left = length;
        uint8_t shift = 0;

        while (bits_left > 0) {
            uint8_t take = (bits_left < (8 - bit_index)) ? bits_left : (uint8_t)(8 - bit_index);
            uint8_t mask = (uint8_t)(((1u << take) - 1u) << bit_index);
            uint64_t bits = (uint64_t)((data[byte_index] & mask) >> bit_index);
            result |= bits << shift;

            bits_left -= take;
            shift += take;
            byte_index++;
            bit_index = 0;
        }
    } else {
        uint16_t pos = start_bit;
        for (uint8_t i = 0; i < length; i++) {
            uint8_t bit = (data[pos / 8] >> (pos % 8)) & 0x1u;
            result = (result << 1) | bit;
            pos = @LIB@_next_motorola_bit(pos);
        }
    }

    return result;
}

int @LIB@_decode_message(uint32_t can_id, uint8_t dlc, const uint8_t* data) {
    @LIB@_message_t* msg = @LIB@_find_message_by_id(can_id);
    if (!msg || msg->dlc != dlc) {
        return -1;
    }

    /* Plain signals (selectors included) first, then the active multiplexed ones */
    for (int pass = 0; pass < 2; pass++) {
        for (size_t i = 0; i < msg->num_signals; i++) {
            @LIB@_signal_t* sig = &msg->signals[i];
            if ((pass == 0) != (sig->mux_selector < 0) || !@LIB@_signal_active(msg, sig)) {
                continue;
            }
            sig->raw_value =
                @LIB@_parse_signal(data, sig->startBit, sig->length, sig->byteOrder);
            @LIB@_signal_update_value(sig);
        }
    }

    return 0;
}

void @LIB@_insert_signal(uint8_t* data, uint64_t raw_value, uint16_t start_bit,
                         uint8_t length, const char* byte_order) {
    uint16_t pos = start_bit;
    int little_endian = strcmp(byte_order, "little_endian") == 0;

    for (uint8_t i = 0; i < length; i++) {
        uint8_t bit = little_endian
            ? (uint8_t)((raw_value >> i) & 1u)
            : (uint8_t)((raw_value >> (length - 1 - i)) & 1u);
        uint8_t mask = (uint8_t)(1u << (pos % 8));

        if (bit) {
            data[pos / 8] |= mask;
        } else {
            data[pos / 8] &= (uint8_t)~mask;
        }
        pos = little_endian ? (uint16_t)(pos + 1) : @LIB@_next_motorola_bit(pos);
    }
}

int @LIB@_encode_message(uint32_t can_id, uint8_t dlc, uint8_t* data) {
    @LIB@_message_t* msg = @LIB@_find_message_by_id(can_id);
    if (!msg || msg->dlc != dlc) {
        return -1;
    }

    for (size_t i = 0; i < msg->num_signals; i++) {
        @LIB@_signal_t* sig = &msg->signals[i];
        if (!@LIB@_signal_active(msg, sig)) {
            continue;
        }
        @LIB@_insert_signal(data, sig->raw_value & @LIB@_mask(sig->length), sig->startBit,
                            sig->length, sig->byteOrder);
    }

    return 0;
}

int @LIB@_set_physical_value(@LIB@_signal_t* sig, double value) {
    if (sig->factor == 0.0 || isnan(value) || isinf(value)) {
        return -1;
    }

    /* Both bounds are powers of two, so the comparisons stay exact at 64 bits */
    double scaled = round((value - sig->offset) / sig->factor);
    if (sig->valueType == 's') {
        double bound = ldexp(1.0, sig->length - 1);
        if (scaled < -bound || scaled >= bound) {
            return -1;
        }
        sig->raw_value = (uint64_t)(int64_t)scaled & @LIB@_mask(sig->length);
    } else {
        if (scaled < 0.0 || scaled >= ldexp(1.0, sig->length)) {
            return -1;
        }
        sig->raw_value = (uint64_t)scaled;
    }
    sig->value = value;
    return 0;
}
"#;
