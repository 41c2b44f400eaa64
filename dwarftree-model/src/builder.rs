//! Presentation tree assembly (pass 2)
//!
//! Walks a compile unit's direct children, dispatches by tag to one
//! visitor per supported declaration kind, and groups the results under
//! display categories. Tags without a visitor are invisible in the
//! output, not errors.

use crate::core::{ChildrenGroup, Element, ModelError, Result};
use crate::data::TypeTable;
use crate::formatter::{TypeNameFormatter, ANONYMOUS, UNRESOLVED};
use crate::source::{AttrValue, DebugInfoSource, DieId};
use gimli::constants;
use tracing::trace;

#[derive(Debug)]
pub struct PresentationTreeBuilder<'a> {
    source: &'a DebugInfoSource,
    formatter: TypeNameFormatter<'a>,
}

impl<'a> PresentationTreeBuilder<'a> {
    /// The table must already contain the unit's pass-1 scan results.
    pub fn new(source: &'a DebugInfoSource, table: &'a TypeTable) -> Self {
        Self {
            source,
            formatter: TypeNameFormatter::new(source, table),
        }
    }

    /// Build the grouped element for one compile unit.
    pub fn build_unit(&self, top: DieId) -> Result<Element> {
        let name = self.source.name(top).unwrap_or(ANONYMOUS);
        trace!("building unit element '{}'", name);
        let mut unit_elem = Element::new(name, top);

        unit_elem.add_children(
            Some(ChildrenGroup::BaseType),
            self.visit_children(top, constants::DW_TAG_base_type, Self::visit_plain_type)?,
        );
        // structs and unions share the structure group
        let mut aggregates =
            self.visit_children(top, constants::DW_TAG_structure_type, Self::visit_aggregate)?;
        aggregates.extend(self.visit_children(
            top,
            constants::DW_TAG_union_type,
            Self::visit_aggregate,
        )?);
        unit_elem.add_children(Some(ChildrenGroup::StructType), aggregates);
        unit_elem.add_children(
            Some(ChildrenGroup::ArrayType),
            self.visit_children(top, constants::DW_TAG_array_type, Self::visit_plain_type)?,
        );
        unit_elem.add_children(
            Some(ChildrenGroup::Typedef),
            self.visit_children(top, constants::DW_TAG_typedef, Self::visit_plain_type)?,
        );
        unit_elem.add_children(
            Some(ChildrenGroup::Enumeration),
            self.visit_children(
                top,
                constants::DW_TAG_enumeration_type,
                Self::visit_enumeration,
            )?,
        );
        unit_elem.add_children(
            Some(ChildrenGroup::PointerType),
            self.visit_children(top, constants::DW_TAG_pointer_type, Self::visit_plain_type)?,
        );
        unit_elem.add_children(
            Some(ChildrenGroup::ConstType),
            self.visit_children(top, constants::DW_TAG_const_type, Self::visit_plain_type)?,
        );
        unit_elem.add_children(
            Some(ChildrenGroup::VolatileType),
            self.visit_children(top, constants::DW_TAG_volatile_type, Self::visit_plain_type)?,
        );
        unit_elem.add_children(
            Some(ChildrenGroup::SubProgram),
            self.visit_children(top, constants::DW_TAG_subprogram, Self::visit_subprogram)?,
        );

        Ok(unit_elem)
    }

    fn visit_children(
        &self,
        die: DieId,
        tag: gimli::DwTag,
        visit: fn(&Self, DieId) -> Result<Element>,
    ) -> Result<Vec<Element>> {
        self.source
            .children_with_tag(die, tag)
            .map(|child| visit(self, child))
            .collect()
    }

    /// Type declarations whose display name is just their formatted type.
    fn visit_plain_type(&self, die: DieId) -> Result<Element> {
        Ok(Element::new(self.formatter.format(die)?, die))
    }

    fn visit_aggregate(&self, die: DieId) -> Result<Element> {
        let mut elem = Element::new(self.formatter.format(die)?, die);
        elem.add_children(
            None,
            self.visit_children(die, constants::DW_TAG_member, Self::visit_variable_like)?,
        );
        Ok(elem)
    }

    /// Members, parameters, and variables: name plus formatted type.
    fn visit_variable_like(&self, die: DieId) -> Result<Element> {
        let name = self.source.name(die).unwrap_or(ANONYMOUS);
        let type_string = match self.source.type_ref(die) {
            Some(offset) => self
                .formatter
                .lookup_and_format(self.source.unit_of(die), offset)?,
            None => UNRESOLVED.to_string(),
        };
        Ok(Element::with_type(name, die, type_string))
    }

    fn visit_enumeration(&self, die: DieId) -> Result<Element> {
        let mut elem = Element::new(self.formatter.format(die)?, die);
        elem.add_children(
            None,
            self.visit_children(die, constants::DW_TAG_enumerator, Self::visit_enumerator)?,
        );
        Ok(elem)
    }

    fn visit_enumerator(&self, die: DieId) -> Result<Element> {
        let label = self.source.name(die).unwrap_or(ANONYMOUS);
        let name = match self.const_value(die) {
            Some(value) => format!("{label} = {value}"),
            None => label.to_string(),
        };
        Ok(Element::new(name, die))
    }

    fn visit_subprogram(&self, die: DieId) -> Result<Element> {
        let mut elem = Element::new(self.source.name(die).unwrap_or(ANONYMOUS), die);
        elem.add_children(
            Some(ChildrenGroup::FormalParameter),
            self.visit_children(
                die,
                constants::DW_TAG_formal_parameter,
                Self::visit_variable_like,
            )?,
        );
        elem.add_children(
            Some(ChildrenGroup::LexicalBlock),
            self.visit_children(
                die,
                constants::DW_TAG_lexical_block,
                Self::visit_lexical_block,
            )?,
        );
        elem.add_children(
            Some(ChildrenGroup::Variable),
            self.visit_children(die, constants::DW_TAG_variable, Self::visit_variable_like)?,
        );
        Ok(elem)
    }

    fn visit_lexical_block(&self, die: DieId) -> Result<Element> {
        let mut elem = Element::new(self.block_range_label(die)?, die);
        elem.add_children(
            Some(ChildrenGroup::LexicalBlock),
            self.visit_children(
                die,
                constants::DW_TAG_lexical_block,
                Self::visit_lexical_block,
            )?,
        );
        elem.add_children(
            Some(ChildrenGroup::Variable),
            self.visit_children(die, constants::DW_TAG_variable, Self::visit_variable_like)?,
        );
        Ok(elem)
    }

    /// Synthesize a block's display name from its pc range. DW_AT_high_pc
    /// is an absolute end address in DW_FORM_addr and a byte size in the
    /// constant data forms; any other form has no defined meaning here.
    fn block_range_label(&self, die: DieId) -> Result<String> {
        let low = match self.source.attr(die, constants::DW_AT_low_pc) {
            Some(attr) => match attr.value {
                AttrValue::Unsigned(value) => value,
                _ => return Ok(ANONYMOUS.to_string()),
            },
            None => return Ok(ANONYMOUS.to_string()),
        };
        let high_attr = match self.source.attr(die, constants::DW_AT_high_pc) {
            Some(attr) => attr,
            None => return Ok(ANONYMOUS.to_string()),
        };
        let value = match high_attr.value {
            AttrValue::Unsigned(value) => value,
            _ => {
                return Err(ModelError::UnsupportedForm {
                    attr: constants::DW_AT_high_pc,
                    form: high_attr.form,
                }
                .into())
            }
        };
        let high = if high_attr.form == constants::DW_FORM_addr {
            value
        } else if matches!(
            high_attr.form,
            constants::DW_FORM_data1
                | constants::DW_FORM_data2
                | constants::DW_FORM_data4
                | constants::DW_FORM_data8
                | constants::DW_FORM_udata
        ) {
            low + value
        } else {
            return Err(ModelError::UnsupportedForm {
                attr: constants::DW_AT_high_pc,
                form: high_attr.form,
            }
            .into());
        };
        Ok(format!("{low:#x}-{high:#x}"))
    }

    fn const_value(&self, die: DieId) -> Option<String> {
        match self.source.attr(die, constants::DW_AT_const_value)?.value {
            AttrValue::Unsigned(value) => Some(value.to_string()),
            AttrValue::Signed(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceBuilder;
    use gimli::constants::*;

    fn build_unit(f: impl FnOnce(&mut SourceBuilder, DieId)) -> Result<Element> {
        let mut builder = SourceBuilder::new();
        let (_, root) = builder.add_unit(0, DW_TAG_compile_unit, 0xb);
        builder.set_name(root, "demo.c");
        f(&mut builder, root);
        let source = builder.finish();
        let mut table = TypeTable::new();
        table.register_types(&source, root)?;
        PresentationTreeBuilder::new(&source, &table).build_unit(root)
    }

    #[test]
    fn test_struct_members_carry_formatted_types() {
        let elem = build_unit(|b, root| {
            let int_die = b.add_die(root, DW_TAG_base_type, 0x20);
            b.set_name(int_die, "int");
            let ptr = b.add_die(root, DW_TAG_pointer_type, 0x28);
            b.set_type_ref(ptr, 0x20);
            let st = b.add_die(root, DW_TAG_structure_type, 0x30);
            b.set_name(st, "point");
            let m0 = b.add_die(st, DW_TAG_member, 0x38);
            b.set_name(m0, "x");
            b.set_type_ref(m0, 0x20);
            let m1 = b.add_die(st, DW_TAG_member, 0x3c);
            b.set_name(m1, "next");
            b.set_type_ref(m1, 0x28);
        })
        .unwrap();

        let structs = elem.group(Some(ChildrenGroup::StructType));
        assert_eq!(structs.len(), 1);
        assert_eq!(structs[0].name(), "struct point");
        let members = structs[0].group(None);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name(), "x");
        assert_eq!(members[0].type_string(), Some("int"));
        assert_eq!(members[1].name(), "next");
        assert_eq!(members[1].type_string(), Some("int *"));
    }

    #[test]
    fn test_union_lands_in_structure_group() {
        let elem = build_unit(|b, root| {
            let un = b.add_die(root, DW_TAG_union_type, 0x20);
            b.set_name(un, "value");
        })
        .unwrap();
        let aggregates = elem.group(Some(ChildrenGroup::StructType));
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].name(), "union value");
    }

    #[test]
    fn test_enumerators_render_label_and_value() {
        let elem = build_unit(|b, root| {
            let en = b.add_die(root, DW_TAG_enumeration_type, 0x20);
            b.set_name(en, "color");
            let red = b.add_die(en, DW_TAG_enumerator, 0x28);
            b.set_name(red, "RED");
            b.set_attr(red, DW_AT_const_value, AttrValue::Unsigned(0), DW_FORM_data1);
            let blue = b.add_die(en, DW_TAG_enumerator, 0x2c);
            b.set_name(blue, "BLUE");
            b.set_attr(blue, DW_AT_const_value, AttrValue::Signed(-1), DW_FORM_sdata);
        })
        .unwrap();

        let enums = elem.group(Some(ChildrenGroup::Enumeration));
        assert_eq!(enums[0].name(), "enum color");
        let values = enums[0].group(None);
        assert_eq!(values[0].name(), "RED = 0");
        assert_eq!(values[1].name(), "BLUE = -1");
    }

    #[test]
    fn test_subprogram_recurses_into_params_blocks_and_locals() {
        let elem = build_unit(|b, root| {
            let int_die = b.add_die(root, DW_TAG_base_type, 0x20);
            b.set_name(int_die, "int");
            let func = b.add_die(root, DW_TAG_subprogram, 0x30);
            b.set_name(func, "main");
            let arg = b.add_die(func, DW_TAG_formal_parameter, 0x38);
            b.set_name(arg, "argc");
            b.set_type_ref(arg, 0x20);
            let block = b.add_die(func, DW_TAG_lexical_block, 0x40);
            b.set_attr(
                block,
                DW_AT_low_pc,
                AttrValue::Unsigned(0x1000),
                DW_FORM_addr,
            );
            b.set_attr(
                block,
                DW_AT_high_pc,
                AttrValue::Unsigned(0x20),
                DW_FORM_data4,
            );
            let inner_var = b.add_die(block, DW_TAG_variable, 0x48);
            b.set_name(inner_var, "tmp");
            b.set_type_ref(inner_var, 0x20);
            let local = b.add_die(func, DW_TAG_variable, 0x50);
            b.set_name(local, "total");
            b.set_type_ref(local, 0x20);
        })
        .unwrap();

        let subs = elem.group(Some(ChildrenGroup::SubProgram));
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name(), "main");

        let params = subs[0].group(Some(ChildrenGroup::FormalParameter));
        assert_eq!(params[0].name(), "argc");
        assert_eq!(params[0].type_string(), Some("int"));

        let blocks = subs[0].group(Some(ChildrenGroup::LexicalBlock));
        // data form: high = low + size
        assert_eq!(blocks[0].name(), "0x1000-0x1020");
        let block_vars = blocks[0].group(Some(ChildrenGroup::Variable));
        assert_eq!(block_vars[0].name(), "tmp");

        let locals = subs[0].group(Some(ChildrenGroup::Variable));
        assert_eq!(locals[0].name(), "total");
        assert_eq!(locals[0].type_string(), Some("int"));
    }

    #[test]
    fn test_lexical_block_with_absolute_high_pc() {
        let elem = build_unit(|b, root| {
            let func = b.add_die(root, DW_TAG_subprogram, 0x30);
            b.set_name(func, "f");
            let block = b.add_die(func, DW_TAG_lexical_block, 0x40);
            b.set_attr(
                block,
                DW_AT_low_pc,
                AttrValue::Unsigned(0x1000),
                DW_FORM_addr,
            );
            b.set_attr(
                block,
                DW_AT_high_pc,
                AttrValue::Unsigned(0x1040),
                DW_FORM_addr,
            );
        })
        .unwrap();

        let subs = elem.group(Some(ChildrenGroup::SubProgram));
        let blocks = subs[0].group(Some(ChildrenGroup::LexicalBlock));
        assert_eq!(blocks[0].name(), "0x1000-0x1040");
    }

    #[test]
    fn test_high_pc_in_undefined_form_aborts_build() {
        let err = build_unit(|b, root| {
            let func = b.add_die(root, DW_TAG_subprogram, 0x30);
            let block = b.add_die(func, DW_TAG_lexical_block, 0x40);
            b.set_attr(
                block,
                DW_AT_low_pc,
                AttrValue::Unsigned(0x1000),
                DW_FORM_addr,
            );
            b.set_attr(
                block,
                DW_AT_high_pc,
                AttrValue::Unsigned(0x20),
                DW_FORM_block,
            );
        })
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::UnsupportedForm { .. })
        ));
    }

    #[test]
    fn test_unknown_declaration_kinds_are_invisible() {
        let elem = build_unit(|b, root| {
            b.add_die(root, DW_TAG_imported_declaration, 0x20);
            let int_die = b.add_die(root, DW_TAG_base_type, 0x28);
            b.set_name(int_die, "int");
        })
        .unwrap();

        let total: usize = elem.children_groups().map(|(_, elems)| elems.len()).sum();
        assert_eq!(total, 1);
        assert_eq!(elem.group(Some(ChildrenGroup::BaseType))[0].name(), "int");
    }

    #[test]
    fn test_anonymous_member_and_missing_type_render_placeholders() {
        let elem = build_unit(|b, root| {
            let st = b.add_die(root, DW_TAG_structure_type, 0x20);
            b.set_name(st, "odd");
            b.add_die(st, DW_TAG_member, 0x28);
        })
        .unwrap();

        let members = elem.group(Some(ChildrenGroup::StructType))[0].group(None);
        assert_eq!(members[0].name(), "<anonymous>");
        assert_eq!(members[0].type_string(), Some("???"));
    }
}
