//! Classification oracle for `VM.debug find` responses.
//!
//! The VM's answer is semi-structured prose, so classification is decided by
//! fixed marker substrings rather than a grammar. Each marker proves that a
//! particular branch of the VM's address resolution ran.

use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::error::HarnessError;
use crate::probe::ProbeResponse;

pub const THREAD_MARKER: &str = " is a thread";
pub const WAITING_MARKER: &str = "java.lang.Thread.State: WAITING";
pub const OOP_MARKER: &str = " is an oop: ";
pub const FIELDS_HEADER: &str = " - ---- fields (total size";
pub const UNSAFE_MARKER: &str = "address not safe";

/// What the VM said an address is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    IsThread,
    /// `fields` is the text following the fields header, when the VM printed one.
    IsManagedObject { fields: Option<String> },
    Unsafe,
    Unknown,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::IsThread => "thread",
            Classification::IsManagedObject { .. } => "object",
            Classification::Unsafe => "unsafe",
            Classification::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Interpret a response. Markers are checked thread, object, unsafe.
pub fn classify(response: &ProbeResponse) -> Classification {
    let text = response.text.as_str();
    if text.contains(THREAD_MARKER) {
        Classification::IsThread
    } else if text.contains(OOP_MARKER) {
        let fields = text
            .find(FIELDS_HEADER)
            .map(|at| text[at + FIELDS_HEADER.len()..].to_string());
        Classification::IsManagedObject { fields }
    } else if text.contains(UNSAFE_MARKER) {
        Classification::Unsafe
    } else {
        Classification::Unknown
    }
}

/// A field line the object dump must contain, e.g.
/// ` - private 'myInt' 'I' @12  12345 (0x00003039)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMarker {
    pub name: String,
    /// JVM type descriptor (`I`, `J`, `Ljava/lang/String;`, ...).
    pub type_tag: String,
    pub value: i64,
}

impl FieldMarker {
    pub fn new(name: &str, type_tag: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            value,
        }
    }

    fn width_bits(&self) -> u32 {
        match self.type_tag.as_str() {
            "Z" | "B" => 8,
            "C" | "S" => 16,
            "I" | "F" => 32,
            _ => 64,
        }
    }

    fn expected_hex(&self) -> u64 {
        let bits = self.width_bits();
        let raw = self.value as u64;
        if bits == 64 {
            raw
        } else {
            raw & ((1u64 << bits) - 1)
        }
    }

    /// Does any line of `text` show this field with the expected value?
    pub fn matches(&self, text: &str) -> bool {
        let pattern = format!(
            r"- (?:\w+ )*'{}' '{}'.*?\s(-?\d+) \(0x([0-9a-fA-F]+)\)",
            regex::escape(&self.name),
            regex::escape(&self.type_tag)
        );
        let Ok(regex) = Regex::new(&pattern) else {
            return false;
        };
        text.lines().any(|line| {
            regex.captures(line).is_some_and(|caps| {
                let decimal = caps[1].parse::<i64>().ok();
                let hex = u64::from_str_radix(&caps[2], 16).ok();
                decimal == Some(self.value) && hex == Some(self.expected_hex())
            })
        })
    }
}

impl fmt::Display for FieldMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' '{}' = {} ({:#x})",
            self.name,
            self.type_tag,
            self.value,
            self.expected_hex()
        )
    }
}

/// The classification a probe is required to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    Thread { verbose: bool },
    ManagedObject { field: Option<FieldMarker> },
    Unsafe,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Thread { verbose: false } => f.write_str("thread"),
            Expectation::Thread { verbose: true } => f.write_str("thread (verbose)"),
            Expectation::ManagedObject { field: None } => f.write_str("managed object"),
            Expectation::ManagedObject { field: Some(field) } => {
                write!(f, "managed object with {field}")
            }
            Expectation::Unsafe => f.write_str("unsafe address"),
        }
    }
}

fn mismatch(response: &ProbeResponse, expected: &Expectation, missing: String) -> HarnessError {
    HarnessError::ClassificationMismatch {
        expected: expected.to_string(),
        command: response.command.clone(),
        missing,
        response: response.text.clone(),
    }
}

fn require(
    response: &ProbeResponse,
    expected: &Expectation,
    marker: &str,
) -> Result<(), HarnessError> {
    if response.text.contains(marker) {
        Ok(())
    } else {
        Err(mismatch(response, expected, format!("{marker:?}")))
    }
}

fn forbid(
    response: &ProbeResponse,
    expected: &Expectation,
    marker: &str,
) -> Result<(), HarnessError> {
    if response.text.contains(marker) {
        Err(mismatch(response, expected, format!("absence of {marker:?}")))
    } else {
        Ok(())
    }
}

/// Fail unless `response` carries every marker `expected` requires.
pub fn assert_classification(
    response: &ProbeResponse,
    expected: &Expectation,
) -> Result<(), HarnessError> {
    match expected {
        Expectation::Thread { verbose } => {
            require(response, expected, THREAD_MARKER)?;
            if *verbose {
                require(response, expected, WAITING_MARKER)?;
            }
        }
        Expectation::ManagedObject { field } => {
            require(response, expected, OOP_MARKER)?;
            require(response, expected, FIELDS_HEADER)?;
            if let Some(field) = field {
                if !field.matches(&response.text) {
                    return Err(mismatch(response, expected, field.to_string()));
                }
            }
        }
        Expectation::Unsafe => {
            require(response, expected, UNSAFE_MARKER)?;
            for marker in [THREAD_MARKER, OOP_MARKER, FIELDS_HEADER] {
                forbid(response, expected, marker)?;
            }
        }
    }
    Ok(())
}
