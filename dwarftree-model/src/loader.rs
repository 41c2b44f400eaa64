//! ELF → snapshot adapter
//!
//! Memory-maps an object file, loads its DWARF sections with gimli, and
//! decodes every unit's DIE tree into a [`DebugInfoSource`] snapshot. Only
//! the attributes the model consumes are decoded (name, type reference,
//! upper bound, constant value, low/high pc), each with its source
//! encoding form preserved so form-sensitive rendering downstream sees
//! what the compiler actually emitted.

use crate::core::{ModelError, Result};
use crate::source::{AttrValue, DebugInfoSource, DieId, SourceBuilder};
use gimli::{AttributeValue, DwForm, EndianSlice, LittleEndian};
use object::{Object, ObjectSection};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

type Reader<'a> = EndianSlice<'a, LittleEndian>;

/// Load a file's debug info into a decoded snapshot. A file without a
/// debug-info section is the distinct "no debug info" outcome, not a
/// parse failure.
pub fn load_file(path: &Path) -> Result<DebugInfoSource> {
    let file = File::open(path)?;
    let mmap = unsafe { memmap2::MmapOptions::new().map(&file)? };
    let object = object::File::parse(&mmap[..])?;

    if object.section_by_name(".debug_info").is_none() {
        return Err(ModelError::NoDebugInfo {
            path: path.to_path_buf(),
        }
        .into());
    }

    let dwarf = load_dwarf_sections(&object)?;
    let source = decode(&dwarf)?;
    info!(
        "decoded {} compile units from {}",
        source.unit_count(),
        path.display()
    );
    Ok(source)
}

/// Load DWARF sections using gimli. Compressed sections are treated as
/// absent, like any other section we cannot hand to the reader directly.
fn load_dwarf_sections<'a>(object: &object::File<'a>) -> Result<gimli::Dwarf<Reader<'a>>> {
    let load_section = |id: gimli::SectionId| -> Result<Reader<'a>> {
        let data = object
            .section_by_name(id.name())
            .and_then(|section| section.data().ok())
            .unwrap_or(&[]);
        Ok(EndianSlice::new(data, LittleEndian))
    };

    let dwarf = gimli::Dwarf::load(load_section)?;
    Ok(dwarf)
}

/// Walk every unit's DIE tree and rebuild it in the snapshot arena.
fn decode(dwarf: &gimli::Dwarf<Reader<'_>>) -> Result<DebugInfoSource> {
    let mut builder = SourceBuilder::new();

    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        let unit = dwarf.unit(header)?;
        let cu_offset = unit
            .header
            .offset()
            .as_debug_info_offset()
            .map(|offset| offset.0 as u64)
            .unwrap_or(0);
        debug!("decoding unit at {:#x}", cu_offset);

        // depth-first walk; the stack holds the snapshot ids of the
        // current ancestor chain
        let mut stack: Vec<DieId> = Vec::new();
        let mut depth: isize = 0;
        let mut entries = unit.entries();
        while let Some((delta, entry)) = entries.next_dfs()? {
            depth += delta;
            let abs_offset = entry
                .offset()
                .to_debug_info_offset(&unit.header)
                .map(|offset| offset.0 as u64)
                .unwrap_or(0);

            let die = if depth == 0 {
                let (_, root) = builder.add_unit(cu_offset, entry.tag(), abs_offset);
                root
            } else {
                let parent = stack[depth as usize - 1];
                builder.add_die(parent, entry.tag(), abs_offset)
            };
            stack.truncate(depth as usize);
            stack.push(die);

            decode_attrs(&mut builder, die, entry, &unit, dwarf)?;
        }
    }

    Ok(builder.finish())
}

fn decode_attrs(
    builder: &mut SourceBuilder,
    die: DieId,
    entry: &gimli::DebuggingInformationEntry<Reader<'_>>,
    unit: &gimli::Unit<Reader<'_>>,
    dwarf: &gimli::Dwarf<Reader<'_>>,
) -> Result<()> {
    let mut attrs = entry.attrs();
    while let Some(attr) = attrs.next()? {
        match attr.name() {
            gimli::DW_AT_name => {
                if let Ok(name) = dwarf.attr_string(unit, attr.value()) {
                    let form = match attr.value() {
                        AttributeValue::String(_) => gimli::DW_FORM_string,
                        AttributeValue::DebugLineStrRef(_) => gimli::DW_FORM_line_strp,
                        _ => gimli::DW_FORM_strp,
                    };
                    builder.set_attr(
                        die,
                        gimli::DW_AT_name,
                        AttrValue::String(name.to_string_lossy().into_owned()),
                        form,
                    );
                }
            }
            gimli::DW_AT_type => {
                // only same-unit references participate in type lookup;
                // cross-unit references stay unresolved ("???")
                if let AttributeValue::UnitRef(offset) = attr.value() {
                    builder.set_attr(
                        die,
                        gimli::DW_AT_type,
                        AttrValue::UnitRef(offset.0 as u64),
                        gimli::DW_FORM_ref4,
                    );
                }
            }
            name @ (gimli::DW_AT_upper_bound | gimli::DW_AT_const_value) => {
                if let Some((value, form)) = decode_constant(attr.value()) {
                    builder.set_attr(die, name, value, form);
                }
            }
            gimli::DW_AT_low_pc => {
                if let AttributeValue::Addr(addr) = attr.value() {
                    builder.set_attr(
                        die,
                        gimli::DW_AT_low_pc,
                        AttrValue::Unsigned(addr),
                        gimli::DW_FORM_addr,
                    );
                }
            }
            gimli::DW_AT_high_pc => match attr.value() {
                AttributeValue::Addr(addr) => builder.set_attr(
                    die,
                    gimli::DW_AT_high_pc,
                    AttrValue::Unsigned(addr),
                    gimli::DW_FORM_addr,
                ),
                other => {
                    if let Some((value, form)) = decode_constant(other) {
                        builder.set_attr(die, gimli::DW_AT_high_pc, value, form);
                    }
                }
            },
            _ => {}
        }
    }
    Ok(())
}

/// Decode a constant-class attribute, preserving the exact source form.
fn decode_constant(value: AttributeValue<Reader<'_>>) -> Option<(AttrValue, DwForm)> {
    match value {
        AttributeValue::Data1(v) => Some((AttrValue::Unsigned(v as u64), gimli::DW_FORM_data1)),
        AttributeValue::Data2(v) => Some((AttrValue::Unsigned(v as u64), gimli::DW_FORM_data2)),
        AttributeValue::Data4(v) => Some((AttrValue::Unsigned(v as u64), gimli::DW_FORM_data4)),
        AttributeValue::Data8(v) => Some((AttrValue::Unsigned(v), gimli::DW_FORM_data8)),
        AttributeValue::Udata(v) => Some((AttrValue::Unsigned(v), gimli::DW_FORM_udata)),
        AttributeValue::Sdata(v) => Some((AttrValue::Signed(v), gimli::DW_FORM_sdata)),
        _ => None,
    }
}
