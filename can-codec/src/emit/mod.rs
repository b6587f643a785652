//! Source code generation
//!
//! Emitters turn the selected message registry into a standalone library for
//! another language. The generated code implements the same bit layout rules
//! as [`crate::bits`], so frames produced on either side are interchangeable.

pub mod c;
pub mod cpp;

use crate::signals::MessageRegistry;
use crate::types::{CodecError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use c::CEmitter;
pub use cpp::CppEmitter;

/// A generated library: one header and one implementation file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedLibrary {
    pub header_name: String,
    pub header: String,
    pub source_name: String,
    pub source: String,
}

impl GeneratedLibrary {
    /// Write both files into `dir`, returning their paths
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let header_path = dir.join(&self.header_name);
        std::fs::write(&header_path, &self.header)?;
        let source_path = dir.join(&self.source_name);
        std::fs::write(&source_path, &self.source)?;

        log::info!("Wrote {:?} and {:?}", header_path, source_path);
        Ok(vec![header_path, source_path])
    }
}

/// A code generator for one target language
pub trait CodeEmitter {
    /// Render the registry's messages and the codec functions
    fn emit(&self, registry: &MessageRegistry) -> Result<GeneratedLibrary>;
}

/// Target language of the generated library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    C,
    Cpp,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    /// Emitter for this language, stamped with today's date
    pub fn emitter(&self, library_name: &str) -> Result<Box<dyn CodeEmitter>> {
        Ok(match self {
            Language::C => Box::new(CEmitter::new(library_name)?),
            Language::Cpp => Box::new(CppEmitter::new(library_name)?),
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(Language::C),
            "cpp" | "c++" => Ok(Language::Cpp),
            other => Err(CodecError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Check that `name` can prefix C identifiers and file names
pub fn validate_library_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CodecError::InvalidLibraryName(name.to_string()));
    }
    Ok(())
}

/// File banner shared by every generated file
fn banner(file_name: &str, brief: &str, date: NaiveDate) -> String {
    format!(
        "/*******************************************************************************\n\
         *\n\
         * @file         {file}\n\
         * @brief        {brief}\n\
         * @date         {date}\n\
         *\n\
         * @details      Generated by can-codec {version}. Contains definitions of the\n\
         * selected CAN messages and functions to decode and encode them.\n\
         * Manual modifications will be overwritten on the next generation.\n\
         *\n\
         ******************************************************************************/\n\n",
        file = file_name,
        brief = brief,
        date = date.format("%d.%m.%Y"),
        version = crate::VERSION,
    )
}

/// Replace everything that cannot appear in a C identifier
fn c_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// Quote a string as a C literal
fn c_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format a double so C parses it back to the same value
fn c_double(value: f64) -> String {
    if value.is_finite() {
        format!("{:?}", value)
    } else {
        "0.0".to_string()
    }
}
