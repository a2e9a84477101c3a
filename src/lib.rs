//! Field synchronization between HTML form controls and XML configuration
//! documents, plus the parent/child page handshake used by admin consoles.

use std::error::Error as StdError;
use std::fmt;

mod console;
mod control;
mod dependency;
mod document;
mod field_sync;
mod form;
mod page_link;
mod trace;
mod xml;
mod xml_path;

pub use console::Console;
pub use control::ControlKind;
pub use dependency::{NAMESPACE_ELEMENT, STARTUP_DEPENDENCY_ELEMENT, add_dependency, startup_dependencies};
pub use document::{ControlDocument, XmlTree};
pub use field_sync::{
    FieldDescriptor, FieldOutcome, copy_from_document_to_form, copy_from_form_to_document,
};
pub use form::FormDocument;
pub use page_link::{LinkSide, PageLink};
pub use xml::XmlDocument;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    XmlParse(String),
    HtmlParse(String),
    InvalidPath(String),
    InvalidName(String),
    PathNotCreatable(String),
    InvalidNode(String),
    NodeNotFound(String),
    Config(String),
    AssertionFailed {
        target: String,
        expected: String,
        actual: String,
        snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XmlParse(msg) => write!(f, "xml parse error: {msg}"),
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::InvalidPath(path) => write!(f, "invalid path expression: {path}"),
            Self::InvalidName(name) => write!(f, "invalid element name: {name}"),
            Self::PathNotCreatable(path) => write!(f, "path cannot be created: {path}"),
            Self::InvalidNode(msg) => write!(f, "invalid node: {msg}"),
            Self::NodeNotFound(target) => write!(f, "node not found: {target}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::AssertionFailed {
                target,
                expected,
                actual,
                snippet,
            } => write!(
                f,
                "assertion failed for {target}: expected {expected}, actual {actual}, snippet {snippet}"
            ),
        }
    }
}

impl StdError for Error {}

/// Index of a node inside the arena of the document that created it.
///
/// Ids are only meaningful for the document that handed them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for (count, ch) in value.chars().enumerate() {
        if count >= max_chars {
            out.push_str("...");
            return out;
        }
        out.push(ch);
    }
    out
}

fn decode_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    fn decode_numeric(value: &str) -> Option<char> {
        let codepoint =
            if let Some(hex) = value.strip_prefix('x').or_else(|| value.strip_prefix('X')) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                value.parse::<u32>().ok()?
            };
        char::from_u32(codepoint)
    }

    fn decode_named(value: &str) -> Option<char> {
        match value {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{00A0}'),
            _ => None,
        }
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail.find(';').and_then(|semicolon| {
            let raw = &tail[..semicolon];
            let ch = match raw.strip_prefix('#') {
                Some(numeric) => decode_numeric(numeric),
                None => decode_named(raw),
            }?;
            Some((ch, semicolon))
        });
        match decoded {
            Some((ch, semicolon)) => {
                out.push(ch);
                rest = &tail[semicolon + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests;
