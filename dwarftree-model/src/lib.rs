//! Dwarftree Model Library
//!
//! Builds a human-navigable, typed presentation tree from an already-decoded
//! snapshot of DWARF debug-information entries: a two-pass type registry so
//! forward references resolve regardless of declaration order, a recursive
//! C-like type-name formatter, and a resumable/cancellable build process.

// Core modules
pub mod core;

// Debug-info snapshot and its producers
pub mod loader;
pub mod source;

// Model-building engine
pub mod builder;
pub mod data;
pub mod formatter;
pub mod process;

// Re-export main public API
pub use builder::PresentationTreeBuilder;
pub use core::{ChildrenGroup, Element, ModelError, Result, TypeKey};
pub use data::TypeTable;
pub use formatter::{TypeNameFormatter, ANONYMOUS, UNRESOLVED};
pub use process::{build, BuildController, BuildOutcome, BuildSession, BuildStep};
pub use source::{Attr, AttrValue, CuId, DebugInfoSource, DieId, SourceBuilder};

// Re-export gimli types that external users need for tags/attrs/forms
pub use gimli::{constants, DwAt, DwForm, DwTag};
