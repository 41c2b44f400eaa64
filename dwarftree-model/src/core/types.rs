//! Presentation data model: grouped elements and the type-lookup key

use crate::source::{CuId, DieId};

/// Display grouping for an element's children. Purely presentational,
/// not part of identity; each group maps to a fixed human-readable label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildrenGroup {
    BaseType,
    StructType,
    /// Historical group, merged into `Enumeration` for display.
    EnumType,
    ArrayType,
    Typedef,
    Enumeration,
    PointerType,
    ConstType,
    VolatileType,
    SubProgram,
    FormalParameter,
    LexicalBlock,
    Variable,
}

impl ChildrenGroup {
    /// Fixed label a renderer shows as the group header.
    pub fn label(self) -> &'static str {
        match self {
            ChildrenGroup::BaseType => "Basic types",
            ChildrenGroup::StructType => "Structure types",
            ChildrenGroup::EnumType => "Enumeration types",
            ChildrenGroup::ArrayType => "Array types",
            ChildrenGroup::Typedef => "Typedefs",
            ChildrenGroup::Enumeration => "Enumerations",
            ChildrenGroup::PointerType => "Pointer types",
            ChildrenGroup::ConstType => "Const types",
            ChildrenGroup::VolatileType => "Volatile types",
            ChildrenGroup::SubProgram => "Subprograms",
            ChildrenGroup::FormalParameter => "Formal parameters",
            ChildrenGroup::LexicalBlock => "Lexical blocks",
            ChildrenGroup::Variable => "Variables",
        }
    }
}

/// Lookup key for the per-build type registry: owning unit plus
/// unit-relative DIE offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub unit: CuId,
    pub offset: u64,
}

/// One node of the output tree.
///
/// Children are kept in ordered buckets per group; the `None` bucket holds
/// structurally nested children (aggregate members, enumerator values)
/// that a renderer shows without a group header.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    die: Option<DieId>,
    type_string: Option<String>,
    buckets: Vec<ChildrenBucket>,
}

#[derive(Debug, Clone, PartialEq)]
struct ChildrenBucket {
    group: Option<ChildrenGroup>,
    elements: Vec<Element>,
}

impl Element {
    /// Element backed by a DIE, without a type column.
    pub fn new(name: impl Into<String>, die: DieId) -> Self {
        Self {
            name: name.into(),
            die: Some(die),
            type_string: None,
            buckets: Vec::new(),
        }
    }

    /// Variable-like element carrying a formatted type string.
    pub fn with_type(name: impl Into<String>, die: DieId, type_string: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            die: Some(die),
            type_string: Some(type_string.into()),
            buckets: Vec::new(),
        }
    }

    /// Root holder element ("File"); the only element without a DIE.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            die: None,
            type_string: None,
            buckets: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn die(&self) -> Option<DieId> {
        self.die
    }

    pub fn type_string(&self) -> Option<&str> {
        self.type_string.as_deref()
    }

    pub fn add_child(&mut self, group: Option<ChildrenGroup>, child: Element) {
        self.bucket_mut(group).push(child);
    }

    /// Append children to a group's bucket; an empty list adds nothing
    /// (so renderers never see an empty group header).
    pub fn add_children(&mut self, group: Option<ChildrenGroup>, children: Vec<Element>) {
        if children.is_empty() {
            return;
        }
        self.bucket_mut(group).extend(children);
    }

    /// Child buckets in first-insertion order.
    pub fn children_groups(&self) -> impl Iterator<Item = (Option<ChildrenGroup>, &[Element])> {
        self.buckets
            .iter()
            .map(|bucket| (bucket.group, bucket.elements.as_slice()))
    }

    /// Children of one group (empty slice if the group was never filled).
    pub fn group(&self, group: Option<ChildrenGroup>) -> &[Element] {
        self.buckets
            .iter()
            .find(|bucket| bucket.group == group)
            .map(|bucket| bucket.elements.as_slice())
            .unwrap_or(&[])
    }

    fn bucket_mut(&mut self, group: Option<ChildrenGroup>) -> &mut Vec<Element> {
        if let Some(idx) = self.buckets.iter().position(|bucket| bucket.group == group) {
            return &mut self.buckets[idx].elements;
        }
        self.buckets.push(ChildrenBucket {
            group,
            elements: Vec::new(),
        });
        let last = self.buckets.len() - 1;
        &mut self.buckets[last].elements
    }
}
