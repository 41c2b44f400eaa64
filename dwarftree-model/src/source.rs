//! Decoded debug-info snapshot
//!
//! The external parser's view of a file, flattened into an arena of DIE
//! nodes addressed by lightweight handles. The model-building passes only
//! ever read from this snapshot; they never own or mutate DIEs. Each node
//! keeps its tag, its absolute byte offset, its owning unit, the ordered
//! child list, and the recognized attributes as (value, source form) pairs
//! so form-sensitive logic downstream can inspect the encoding.

use gimli::{DwAt, DwForm, DwTag};

/// Handle to one compile unit in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CuId(pub(crate) usize);

impl CuId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to one DIE in a snapshot. Only valid for the snapshot that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DieId(pub(crate) usize);

impl DieId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    Unsigned(u64),
    Signed(i64),
    Flag(bool),
    /// Unit-relative reference to another DIE (DW_AT_type and friends).
    UnitRef(u64),
}

/// Attribute value together with the encoding form it was stored in.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub value: AttrValue,
    pub form: DwForm,
}

#[derive(Debug)]
struct DieNode {
    tag: DwTag,
    /// Absolute byte offset from the start of the debug-info section.
    offset: u64,
    unit: CuId,
    attrs: Vec<(DwAt, Attr)>,
    children: Vec<DieId>,
}

#[derive(Debug)]
struct UnitNode {
    /// Base offset of the unit; converts absolute DIE offsets into the
    /// unit-relative offsets used for type lookup.
    cu_offset: u64,
    root: DieId,
}

/// Read-only snapshot of a file's debug-information tree.
#[derive(Debug, Default)]
pub struct DebugInfoSource {
    dies: Vec<DieNode>,
    units: Vec<UnitNode>,
}

impl DebugInfoSource {
    pub fn units(&self) -> impl Iterator<Item = CuId> + '_ {
        (0..self.units.len()).map(CuId)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn unit_at(&self, index: usize) -> Option<CuId> {
        (index < self.units.len()).then_some(CuId(index))
    }

    /// Top-level declaration node of the unit.
    pub fn unit_root(&self, unit: CuId) -> DieId {
        self.units[unit.0].root
    }

    pub fn unit_base_offset(&self, unit: CuId) -> u64 {
        self.units[unit.0].cu_offset
    }

    pub fn tag(&self, die: DieId) -> DwTag {
        self.node(die).tag
    }

    pub fn offset(&self, die: DieId) -> u64 {
        self.node(die).offset
    }

    pub fn unit_of(&self, die: DieId) -> CuId {
        self.node(die).unit
    }

    pub fn children(&self, die: DieId) -> &[DieId] {
        &self.node(die).children
    }

    pub fn children_with_tag(&self, die: DieId, tag: DwTag) -> impl Iterator<Item = DieId> + '_ {
        self.children(die)
            .iter()
            .copied()
            .filter(move |&child| self.tag(child) == tag)
    }

    pub fn attr(&self, die: DieId, name: DwAt) -> Option<&Attr> {
        self.node(die)
            .attrs
            .iter()
            .find(|(at, _)| *at == name)
            .map(|(_, attr)| attr)
    }

    /// DW_AT_name as text, if present.
    pub fn name(&self, die: DieId) -> Option<&str> {
        match self.attr(die, gimli::DW_AT_name) {
            Some(Attr {
                value: AttrValue::String(s),
                ..
            }) => Some(s.as_str()),
            _ => None,
        }
    }

    /// DW_AT_type as a unit-relative offset, if present.
    pub fn type_ref(&self, die: DieId) -> Option<u64> {
        match self.attr(die, gimli::DW_AT_type) {
            Some(Attr {
                value: AttrValue::UnitRef(offset),
                ..
            }) => Some(*offset),
            _ => None,
        }
    }

    fn node(&self, die: DieId) -> &DieNode {
        &self.dies[die.0]
    }
}

/// Constructs snapshots. Used by the ELF loader and by test fixtures.
#[derive(Debug, Default)]
pub struct SourceBuilder {
    source: DebugInfoSource,
}

impl SourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new compile unit; creates its top-level DIE.
    pub fn add_unit(&mut self, cu_offset: u64, root_tag: DwTag, root_offset: u64) -> (CuId, DieId) {
        let unit = CuId(self.source.units.len());
        let root = DieId(self.source.dies.len());
        self.source.dies.push(DieNode {
            tag: root_tag,
            offset: root_offset,
            unit,
            attrs: Vec::new(),
            children: Vec::new(),
        });
        self.source.units.push(UnitNode { cu_offset, root });
        (unit, root)
    }

    /// Append a child DIE under `parent`. `offset` is absolute.
    pub fn add_die(&mut self, parent: DieId, tag: DwTag, offset: u64) -> DieId {
        let unit = self.source.node(parent).unit;
        let die = DieId(self.source.dies.len());
        self.source.dies.push(DieNode {
            tag,
            offset,
            unit,
            attrs: Vec::new(),
            children: Vec::new(),
        });
        self.source.dies[parent.0].children.push(die);
        die
    }

    pub fn set_attr(&mut self, die: DieId, name: DwAt, value: AttrValue, form: DwForm) {
        self.source.dies[die.0].attrs.push((name, Attr { value, form }));
    }

    /// Convenience: DW_AT_name in the string-pointer form.
    pub fn set_name(&mut self, die: DieId, name: &str) {
        self.set_attr(
            die,
            gimli::DW_AT_name,
            AttrValue::String(name.to_string()),
            gimli::DW_FORM_strp,
        );
    }

    /// Convenience: DW_AT_type as a unit-relative reference.
    pub fn set_type_ref(&mut self, die: DieId, offset: u64) {
        self.set_attr(
            die,
            gimli::DW_AT_type,
            AttrValue::UnitRef(offset),
            gimli::DW_FORM_ref4,
        );
    }

    pub fn finish(self) -> DebugInfoSource {
        self.source
    }
}
