//! Error types for the presentation-model builder

use std::path::PathBuf;

/// Error types for the library.
///
/// Per-declaration problems (a missing name, an unresolvable type
/// reference) never surface here; they are rendered inline as placeholder
/// strings. These variants are the structural failures that abort a whole
/// build, plus the distinct "no debug info" outcome.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("DWARF parsing error: {0}")]
    Gimli(#[from] gimli::Error),
    #[error("Object file error: {0}")]
    Object(#[from] object::Error),
    #[error("no debug info in {}", .path.display())]
    NoDebugInfo { path: PathBuf },
    /// The scanning pass visited the same type DIE twice, or two type DIEs
    /// collided on one unit-relative offset. The table is not trustworthy.
    #[error("duplicate type registration in unit #{unit} at offset {offset:#x}")]
    DuplicateTypeKey { unit: usize, offset: u64 },
    /// A DIE outside the closed type-tag vocabulary reached the formatter.
    #[error("unsupported type tag {0}")]
    UnsupportedTag(gimli::DwTag),
    /// An attribute encoding with no defined meaning for this attribute.
    #[error("unsupported encoding {form} for {attr}")]
    UnsupportedForm {
        attr: gimli::DwAt,
        form: gimli::DwForm,
    },
}

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
