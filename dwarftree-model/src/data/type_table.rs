//! Per-build type registry (pass 1 of the two-pass build)
//!
//! A compile unit's types can reference each other regardless of
//! declaration order, so a full index-building traversal runs before any
//! formatting pass consults the table. The table lives for exactly one
//! build and is discarded with it.

use crate::core::{ModelError, Result, TypeKey};
use crate::source::{CuId, DebugInfoSource, DieId};
use gimli::DwTag;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Tags whose DIEs declare a type and get registered during the scan.
const TYPE_TAGS: [DwTag; 10] = [
    gimli::constants::DW_TAG_base_type,
    gimli::constants::DW_TAG_structure_type,
    gimli::constants::DW_TAG_union_type,
    gimli::constants::DW_TAG_typedef,
    gimli::constants::DW_TAG_array_type,
    gimli::constants::DW_TAG_pointer_type,
    gimli::constants::DW_TAG_const_type,
    gimli::constants::DW_TAG_volatile_type,
    gimli::constants::DW_TAG_subroutine_type,
    gimli::constants::DW_TAG_enumeration_type,
];

/// Registry mapping (unit, unit-relative offset) to the declaring DIE.
#[derive(Debug, Default)]
pub struct TypeTable {
    entries: HashMap<TypeKey, DieId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-order scan of a unit's declaration tree, registering every
    /// type-bearing DIE at (unit, absolute offset − unit base offset).
    /// Visits every descendant: type declarations nest inside subprograms
    /// and lexical blocks too.
    ///
    /// A duplicate key means the scan double-visited a subtree or the
    /// debug info has colliding offsets; either way the table would be
    /// untrustworthy, so the whole build fails.
    pub fn register_types(&mut self, source: &DebugInfoSource, die: DieId) -> Result<()> {
        let tag = source.tag(die);
        if TYPE_TAGS.contains(&tag) {
            let unit = source.unit_of(die);
            let offset = source.offset(die) - source.unit_base_offset(unit);
            trace!("registering {} at {:#x} (unit #{})", tag, offset, unit.index());
            let key = TypeKey { unit, offset };
            if self.entries.insert(key, die).is_some() {
                return Err(ModelError::DuplicateTypeKey {
                    unit: unit.index(),
                    offset,
                }
                .into());
            }
        }
        for &child in source.children(die) {
            self.register_types(source, child)?;
        }
        Ok(())
    }

    /// Look up a type by unit-relative offset. A miss is a normal outcome
    /// (dangling or external reference); callers render a placeholder.
    pub fn lookup(&self, unit: CuId, offset: u64) -> Option<DieId> {
        let hit = self.entries.get(&TypeKey { unit, offset }).copied();
        if hit.is_none() {
            debug!(
                "type lookup miss at offset {:#x} in unit #{}",
                offset,
                unit.index()
            );
        }
        hit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceBuilder;
    use gimli::constants::*;

    #[test]
    fn test_registered_types_are_found_and_misses_are_none() {
        let mut builder = SourceBuilder::new();
        let (unit, root) = builder.add_unit(0x100, DW_TAG_compile_unit, 0x10b);
        let int_die = builder.add_die(root, DW_TAG_base_type, 0x120);
        let ptr_die = builder.add_die(root, DW_TAG_pointer_type, 0x130);
        let source = builder.finish();

        let mut table = TypeTable::new();
        table.register_types(&source, root).unwrap();

        assert_eq!(table.lookup(unit, 0x20), Some(int_die));
        assert_eq!(table.lookup(unit, 0x30), Some(ptr_die));
        assert_eq!(table.lookup(unit, 0x99), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_scan_reaches_types_nested_in_subprograms() {
        let mut builder = SourceBuilder::new();
        let (unit, root) = builder.add_unit(0, DW_TAG_compile_unit, 0xb);
        let func = builder.add_die(root, DW_TAG_subprogram, 0x20);
        let block = builder.add_die(func, DW_TAG_lexical_block, 0x30);
        let local_type = builder.add_die(block, DW_TAG_structure_type, 0x40);
        let source = builder.finish();

        let mut table = TypeTable::new();
        table.register_types(&source, root).unwrap();

        assert_eq!(table.lookup(unit, 0x40), Some(local_type));
        // subprogram and lexical block are visited but not type-bearing
        assert_eq!(table.lookup(unit, 0x20), None);
        assert_eq!(table.lookup(unit, 0x30), None);
    }

    #[test]
    fn test_duplicate_registration_is_fatal() {
        let mut builder = SourceBuilder::new();
        let (_, root) = builder.add_unit(0, DW_TAG_compile_unit, 0xb);
        builder.add_die(root, DW_TAG_base_type, 0x20);
        builder.add_die(root, DW_TAG_typedef, 0x20);
        let source = builder.finish();

        let mut table = TypeTable::new();
        let err = table.register_types(&source, root).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::DuplicateTypeKey { offset: 0x20, .. })
        ));
    }
}
