//! Markdown section extraction.
//!
//! Finds labeled JSON blocks in the source document and parses each into
//! records. A section looks like:
//!
//! ```text
//! Categories -
//! [
//!   {"id": 1, "name": "Dairy"},
//!   {"id": 2, "name": "Produce"}
//! ]
//!
//! ```
//!
//! Only the first match of a label is used. Missing or malformed sections
//! are reported and skipped; extraction of the other sections continues.

use regex::Regex;
use serde_json::Value;
use std::path::Path;

use crate::error::ExtractError;
use crate::models::{Record, SectionSpec, Terminator};

/// Length of the JSON excerpt kept for malformed sections
const SNIPPET_CHARS: usize = 200;

/// What happened to one section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome {
    /// Block found and parsed.
    Parsed(Vec<Record>),
    /// Block found but not an array of JSON objects.
    Malformed { error: String, snippet: String },
    /// Label pattern not found.
    Missing,
}

/// Outcome for a named section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    pub name: String,
    pub outcome: SectionOutcome,
}

/// Result of scanning a document for all sections of a plan.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// One report per requested section, in request order
    pub reports: Vec<SectionReport>,
}

impl Extraction {
    /// Records of a parsed section.
    pub fn records(&self, section: &str) -> Option<&[Record]> {
        self.reports
            .iter()
            .find(|r| r.name == section)
            .and_then(|r| match &r.outcome {
                SectionOutcome::Parsed(records) => Some(records.as_slice()),
                _ => None,
            })
    }

    /// Parsed sections, in request order.
    pub fn parsed(&self) -> impl Iterator<Item = (&str, &[Record])> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            SectionOutcome::Parsed(records) => Some((r.name.as_str(), records.as_slice())),
            _ => None,
        })
    }

    /// Number of sections that parsed.
    pub fn extracted_count(&self) -> usize {
        self.parsed().count()
    }

    /// Records across all parsed sections.
    pub fn total_records(&self) -> usize {
        self.parsed().map(|(_, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.extracted_count() == 0
    }
}

/// Build the delimiter pattern of a section.
///
/// The label is matched literally, followed by ` - ` and a newline; the
/// JSON array is captured lazily up to the terminator.
pub fn section_pattern(spec: &SectionSpec) -> Regex {
    let label = regex::escape(&spec.label);
    let tail = match spec.terminator {
        Terminator::BlankLine => r"\n\n",
        Terminator::EndOfDocument => r"\s*$",
    };
    let pattern = format!(r"(?s){}\s*-\s*\n(\s*\[.*?\]){}", label, tail);

    // Label is escaped, so the pattern is always valid.
    Regex::new(&pattern).expect("escaped section pattern")
}

/// Locate and parse every section of `specs` in `content`.
pub fn extract_sections(content: &str, specs: &[SectionSpec]) -> Extraction {
    let reports = specs
        .iter()
        .map(|spec| SectionReport {
            name: spec.name.clone(),
            outcome: extract_section(content, spec),
        })
        .collect();

    Extraction { reports }
}

fn extract_section(content: &str, spec: &SectionSpec) -> SectionOutcome {
    let Some(block) = section_pattern(spec)
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
    else {
        return SectionOutcome::Missing;
    };

    match parse_records(block) {
        Ok(records) => SectionOutcome::Parsed(records),
        Err(error) => SectionOutcome::Malformed {
            error,
            snippet: snippet(block),
        },
    }
}

/// Parse a JSON block as an array of objects.
pub fn parse_records(block: &str) -> Result<Vec<Record>, String> {
    let value: Value = serde_json::from_str(block).map_err(|e| e.to_string())?;

    let Value::Array(items) = value else {
        return Err("expected a JSON array".to_string());
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(format!("element {} is not an object: {}", i, other)),
        })
        .collect()
}

fn snippet(block: &str) -> String {
    let mut cut: String = block.chars().take(SNIPPET_CHARS).collect();
    if cut.len() < block.len() {
        cut.push_str("...");
    }
    cut
}

// =============================================================================
// Document loading
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0.to_lowercase();

    // chardet reports plain ASCII as "ascii" and undecided input as ""
    match charset.as_str() {
        "" | "ascii" | "utf8" => "utf-8".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding label
///
/// Labels follow the WHATWG Encoding Standard (`latin1`, `cp1252`,
/// `utf-16le`, `shift_jis`, ...). UTF-8 is strict; unknown labels fall
/// back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, ExtractError> {
    let label = encoding.trim().to_lowercase();
    if matches!(label.as_str(), "utf-8" | "utf8" | "ascii") {
        return String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::Encoding {
            encoding: encoding.to_string(),
            message: e.to_string(),
        });
    }

    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(codec) => Ok(codec.decode(bytes).0.into_owned()),
        None => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Decode document bytes, auto-detecting the encoding, with `\n` line endings.
pub fn decode_document(bytes: &[u8]) -> Result<String, ExtractError> {
    // UTF-8 first: chardet guesses poorly on short, mostly-ASCII documents
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => decode_content(bytes, &detect_encoding(bytes))?,
    };
    Ok(text.replace("\r\n", "\n"))
}

/// Read the source document from disk.
pub fn read_document(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_document(&bytes)
}
