//! Per-build indexes

pub mod type_table;

pub use type_table::TypeTable;
