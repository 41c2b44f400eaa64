//! Core types and utilities for dwarftree-model

pub mod errors;
pub mod types;

pub use errors::*;
pub use types::*;
