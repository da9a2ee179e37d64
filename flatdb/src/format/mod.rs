//! Canonical rewriting of data files.
//!
//! Formatting keeps comments and scalar styles, sorts the elements of every
//! `items` sequence by their natural key, and optionally reorders record keys
//! to follow a type's field declarations.

mod emit;
mod node;
mod order;

pub use order::{FieldOrder, OrderedField};

use crate::error::{FlatDbError, Result};
use crate::store::file::FileFormat;
use crate::util;
use std::path::{Path, PathBuf};

/// Outcome of formatting one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatResult {
    pub path: PathBuf,
    pub content: Vec<u8>,
    /// Whether `content` differs from the bytes on disk.
    pub changed: bool,
}

impl FormatResult {
    /// Write the formatted content back if it changed. Returns whether a write happened.
    pub fn write_in_place(&self) -> Result<bool> {
        if !self.changed {
            return Ok(false);
        }
        util::write_atomic(&self.path, &self.content)?;
        log::debug!("formatted {}", self.path.display());
        Ok(true)
    }
}

/// Format a file on disk without modifying it.
pub fn format_file(path: impl AsRef<Path>, order: Option<&FieldOrder>) -> Result<FormatResult> {
    let path = path.as_ref();
    let raw = std::fs::read(path)?;
    let content = format_bytes(path, &raw, order)?;
    Ok(FormatResult {
        path: path.to_path_buf(),
        changed: content != raw,
        content,
    })
}

/// Format `raw` as the contents of `path`; the extension selects JSON or YAML output.
///
/// Empty and whitespace-only input is returned unchanged.
pub fn format_bytes(path: &Path, raw: &[u8], order: Option<&FieldOrder>) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| FlatDbError::Format(format!("{}: {e}", path.display())))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Ok(raw.to_vec());
    }

    let mut document = node::parse(text)
        .map_err(|e| FlatDbError::Format(format!("{}: {e}", path.display())))?;
    if let Some(root) = document.root.as_mut() {
        order::sort_items(root);
        if let Some(order) = order {
            order::apply_field_order(root, order);
        }
    }

    let output = match FileFormat::from_path(path) {
        FileFormat::Yaml => emit::to_yaml(&document),
        FileFormat::Json => emit::to_json(&document),
    };
    Ok(output.into_bytes())
}
