//! CAN Signal Codec CLI Application
//!
//! Command-line front end for the can-codec library:
//! - `info` summarises the messages of one or more DBC files
//! - `decode` turns a hex payload into signal values
//! - `encode` builds a payload from signal values
//! - `generate` writes a C or C++ library for the selected messages

use anyhow::{anyhow, bail, Context, Result};
use can_codec::signals::dbc::load_dbc_file;
use can_codec::{Codec, Language, MessageDefinition, SignalValues};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;

/// CAN Signal Codec - Decode, encode and generate code for CAN messages
#[derive(Parser, Debug)]
#[command(name = "can-codec")]
#[command(about = "Decode and encode CAN frames with DBC signal definitions", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the messages and signals of DBC files
    Info {
        /// Path to DBC file(s) (can be repeated)
        #[arg(long, value_name = "FILE", required = true)]
        dbc: Vec<PathBuf>,
    },

    /// Decode one frame
    Decode {
        /// Path to DBC file(s) (can be repeated)
        #[arg(long, value_name = "FILE", required = true)]
        dbc: Vec<PathBuf>,

        /// CAN ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_can_id)]
        id: u32,

        /// Payload as hex bytes, e.g. "01 02 0A" or "01020A"
        #[arg(long)]
        data: String,

        /// Print the decoded message as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode signal values into a frame
    Encode {
        /// Path to DBC file(s) (can be repeated)
        #[arg(long, value_name = "FILE", required = true)]
        dbc: Vec<PathBuf>,

        /// CAN ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_can_id)]
        id: u32,

        /// Signal value as NAME=VALUE (can be repeated)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Values are raw integers instead of physical values
        #[arg(long)]
        raw: bool,
    },

    /// Generate a C or C++ library for the selected messages
    Generate {
        /// Path to DBC file(s) (can be repeated)
        #[arg(long, value_name = "FILE", required = true)]
        dbc: Vec<PathBuf>,

        /// Library name (prefix of files and identifiers) [default: dbc_library]
        #[arg(long)]
        name: Option<String>,

        /// Target language: c or cpp [default: c]
        #[arg(long, value_name = "LANG")]
        language: Option<Language>,

        /// Output directory
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Codec CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using codec library v{}", can_codec::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };

    match &args.command {
        Command::Info { dbc } => info_mode(dbc, &app_config),
        Command::Decode { dbc, id, data, json } => decode_mode(dbc, &app_config, *id, data, *json),
        Command::Encode { dbc, id, set, raw } => encode_mode(dbc, &app_config, *id, set, *raw),
        Command::Generate {
            dbc,
            name,
            language,
            out,
        } => {
            generate_mode(dbc, &app_config, name.as_deref(), *language, out.as_ref())?;
            Ok(())
        }
    }
}

/// Load all DBC files into one list of definitions
fn load_messages(paths: &[PathBuf]) -> Result<Vec<MessageDefinition>> {
    let mut messages = Vec::new();
    for path in paths {
        let loaded = load_dbc_file(path)
            .with_context(|| format!("Failed to load DBC file: {:?}", path))?;
        messages.extend(loaded);
    }
    Ok(messages)
}

fn build_codec(paths: &[PathBuf], app_config: &config::AppConfig) -> Result<Codec> {
    let messages = load_messages(paths)?;
    let codec = Codec::from_messages(&messages, &app_config.selection, app_config.codec.clone())
        .context("Failed to build message registry")?;
    Ok(codec)
}

fn info_mode(paths: &[PathBuf], app_config: &config::AppConfig) -> Result<()> {
    let codec = build_codec(paths, app_config)?;

    let stats = codec.registry().stats();
    println!("Signal Database:");
    println!("  Messages:    {}", stats.num_messages);
    println!("  Signals:     {}", stats.num_signals);
    println!("  FD messages: {}", stats.num_fd_messages);

    for message in codec.registry().messages() {
        println!(
            "\n0x{:X} {} (DLC {}, sender {})",
            message.id,
            message.name,
            message.dlc,
            message.sender().unwrap_or("-")
        );
        for signal in &message.signals {
            let mux = signal
                .multiplexer
                .as_ref()
                .map(|m| format!(" [{} in {:?}]", m.selector, m.values))
                .unwrap_or_default();
            println!(
                "  {:<32} {:>3}|{:<2} {} {} ({}, {}) {}{}",
                signal.name,
                signal.start_bit,
                signal.length,
                signal.byte_order,
                signal.value_type.as_char(),
                signal.factor,
                signal.offset,
                signal.unit.as_deref().unwrap_or(""),
                mux
            );
        }
    }

    Ok(())
}

fn decode_mode(
    paths: &[PathBuf],
    app_config: &config::AppConfig,
    can_id: u32,
    data: &str,
    json: bool,
) -> Result<()> {
    let codec = build_codec(paths, app_config)?;
    let payload = parse_hex_payload(data)?;

    let decoded = codec
        .decode(can_id, payload.len(), &payload)
        .with_context(|| format!("Failed to decode frame 0x{:X}", can_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
        return Ok(());
    }

    println!("0x{:X} {}", decoded.can_id, decoded.name);
    for signal in &decoded.signals {
        println!(
            "  {:<32} = {} {} (raw {})",
            signal.name,
            signal.value,
            signal.unit.as_deref().unwrap_or(""),
            signal.raw_value
        );
    }
    Ok(())
}

fn encode_mode(
    paths: &[PathBuf],
    app_config: &config::AppConfig,
    can_id: u32,
    assignments: &[String],
    raw: bool,
) -> Result<()> {
    let codec = build_codec(paths, app_config)?;

    let parsed = assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>>>()?;

    let values = if raw {
        let mut values = SignalValues::new();
        for (name, value) in &parsed {
            let raw_value: u64 = value
                .parse()
                .with_context(|| format!("Raw value for '{}' is not an unsigned integer", name))?;
            values.set_raw(*name, raw_value);
        }
        values
    } else {
        let physical = parsed
            .iter()
            .map(|(name, value)| {
                value
                    .parse::<f64>()
                    .map(|v| (*name, v))
                    .with_context(|| format!("Value for '{}' is not a number", name))
            })
            .collect::<Result<Vec<_>>>()?;
        codec.values_from_physical(can_id, physical)?
    };

    let frame = codec
        .encode_frame(can_id, &values)
        .with_context(|| format!("Failed to encode frame 0x{:X}", can_id))?;
    println!("{}", format_hex_payload(&frame));
    Ok(())
}

/// Library name used when neither `--name` nor the config file gives one
const DEFAULT_LIBRARY_NAME: &str = "dbc_library";

/// Command line first, then the config file, then the defaults
fn generate_settings(
    app_config: &config::AppConfig,
    name: Option<&str>,
    language: Option<Language>,
) -> (String, Language) {
    let library_name = name
        .map(str::to_string)
        .or_else(|| app_config.output.library_name.clone())
        .unwrap_or_else(|| DEFAULT_LIBRARY_NAME.to_string());
    let language = language.unwrap_or(app_config.output.language);
    (library_name, language)
}

fn generate_mode(
    paths: &[PathBuf],
    app_config: &config::AppConfig,
    name: Option<&str>,
    language: Option<Language>,
    out: Option<&PathBuf>,
) -> Result<Vec<PathBuf>> {
    let (library_name, language) = generate_settings(app_config, name, language);
    let out_dir = out
        .cloned()
        .or_else(|| app_config.output.out_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let codec = build_codec(paths, app_config)?;
    log::info!("Generating {} library '{}'", language, library_name);
    let library = language.emitter(&library_name)?.emit(codec.registry())?;
    let written = library
        .write_to(&out_dir)
        .with_context(|| format!("Failed to write generated files to {:?}", out_dir))?;

    for path in &written {
        println!("Generated {}", path.display());
    }
    Ok(written)
}

/// Parse a CAN ID given in decimal or with a 0x prefix
fn parse_can_id(text: &str) -> Result<u32> {
    let text = text.trim();
    let id = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    }
    .with_context(|| format!("Invalid CAN ID: {}", text))?;
    Ok(id)
}

/// Parse hex bytes, ignoring whitespace and ':' separators
fn parse_hex_payload(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if digits.len() % 2 != 0 {
        bail!("Payload has an odd number of hex digits: {}", text);
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte: {}", &digits[i..i + 2]))
        })
        .collect()
}

fn format_hex_payload(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split NAME=VALUE
fn parse_assignment(text: &str) -> Result<(&str, &str)> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", text))?;
    Ok((name.trim(), value.trim()))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
