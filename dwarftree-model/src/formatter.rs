//! Recursive C-like type-name formatter (pass 2 helper)
//!
//! Walks chains of pointer/array/const/volatile/typedef/subroutine
//! wrappers through the type table and produces a single textual type
//! expression, e.g. `struct foo *[4] const`. Pure function of the type
//! graph; total over the closed type-tag set and fatal outside it.

use crate::core::{ModelError, Result};
use crate::data::TypeTable;
use crate::source::{AttrValue, CuId, DebugInfoSource, DieId};
use gimli::constants;

/// Placeholder for declarations the debug info left unnamed.
pub const ANONYMOUS: &str = "<anonymous>";

/// Placeholder for type references the table cannot resolve.
pub const UNRESOLVED: &str = "???";

#[derive(Debug)]
pub struct TypeNameFormatter<'a> {
    source: &'a DebugInfoSource,
    table: &'a TypeTable,
}

impl<'a> TypeNameFormatter<'a> {
    pub fn new(source: &'a DebugInfoSource, table: &'a TypeTable) -> Self {
        Self { source, table }
    }

    /// Canonical textual type expression for a resolved type DIE.
    pub fn format(&self, die: DieId) -> Result<String> {
        let tag = self.source.tag(die);
        match tag {
            // typedefs intentionally keep their own declared name instead
            // of expanding to the aliased type
            constants::DW_TAG_base_type | constants::DW_TAG_typedef => {
                Ok(self.name_or_anonymous(die).to_string())
            }
            constants::DW_TAG_structure_type => {
                Ok(format!("struct {}", self.name_or_anonymous(die)))
            }
            constants::DW_TAG_union_type => Ok(format!("union {}", self.name_or_anonymous(die))),
            constants::DW_TAG_enumeration_type => {
                Ok(format!("enum {}", self.name_or_anonymous(die)))
            }
            constants::DW_TAG_array_type => self.format_array(die),
            constants::DW_TAG_pointer_type => self.format_wrapped(die, " *", "void*"),
            constants::DW_TAG_const_type => self.format_wrapped(die, " const", "void const"),
            constants::DW_TAG_volatile_type => self.format_wrapped(die, " volatile", "void volatile"),
            constants::DW_TAG_subroutine_type => self.format_subroutine(die),
            other => Err(ModelError::UnsupportedTag(other).into()),
        }
    }

    /// Resolve a unit-relative type reference and format it. A lookup miss
    /// is an expected outcome and renders as `"???"`.
    pub fn lookup_and_format(&self, unit: CuId, offset: u64) -> Result<String> {
        match self.table.lookup(unit, offset) {
            Some(die) => self.format(die),
            None => Ok(UNRESOLVED.to_string()),
        }
    }

    /// Wrapper tags (pointer/const/volatile): format the wrapped type and
    /// append the qualifier; an absent reference means plain `void`.
    fn format_wrapped(&self, die: DieId, suffix: &str, when_absent: &str) -> Result<String> {
        match self.source.type_ref(die) {
            None => Ok(when_absent.to_string()),
            Some(offset) => {
                let inner = self.lookup_and_format(self.source.unit_of(die), offset)?;
                Ok(inner + suffix)
            }
        }
    }

    fn format_array(&self, die: DieId) -> Result<String> {
        let unit = self.source.unit_of(die);
        let mut name = match self.source.type_ref(die) {
            Some(offset) => self.lookup_and_format(unit, offset)?,
            None => UNRESOLVED.to_string(),
        };
        for subrange in self
            .source
            .children_with_tag(die, constants::DW_TAG_subrange_type)
        {
            match self.upper_bound(subrange) {
                Some(bound) => name.push_str(&format!("[{}]", bound + 1)),
                None => name.push_str("[?]"),
            }
        }
        Ok(name)
    }

    fn format_subroutine(&self, die: DieId) -> Result<String> {
        let unit = self.source.unit_of(die);
        let ret = match self.source.type_ref(die) {
            Some(offset) => self.lookup_and_format(unit, offset)?,
            None => "void".to_string(),
        };
        let mut params = Vec::new();
        for param in self
            .source
            .children_with_tag(die, constants::DW_TAG_formal_parameter)
        {
            params.push(match self.source.type_ref(param) {
                Some(offset) => self.lookup_and_format(unit, offset)?,
                None => "void".to_string(),
            });
        }
        Ok(format!("{} function({})", ret, params.join(", ")))
    }

    /// An upper bound is honored only in the single-byte numeric form;
    /// every other encoding counts as absent.
    fn upper_bound(&self, subrange: DieId) -> Option<u64> {
        let attr = self.source.attr(subrange, constants::DW_AT_upper_bound)?;
        if attr.form != constants::DW_FORM_data1 {
            return None;
        }
        match attr.value {
            AttrValue::Unsigned(value) => Some(value),
            _ => None,
        }
    }

    fn name_or_anonymous(&self, die: DieId) -> &str {
        self.source.name(die).unwrap_or(ANONYMOUS)
    }
}
