//! Orchestrates the phases a single link invocation runs through, in order:
//! Read → Merge → Layout → Rebase → Write → Relocate. No phase re-enters an
//! earlier one (spec §5).

use std::fs::OpenOptions;

use crate::{
    base::Endian,
    config::Configuration,
    error::{Diagnostics, LinkError},
    layout,
    merge::{merge, MergedSection},
    object::{self, InputObject},
    relocate::relocate_object,
    strtab::StringTable,
    symtab::{rebase, resolve_object_symbols},
    writer::write_executable,
};

/// Run one link: read every input in `config.input_paths`, merge their
/// sections, lay them out, resolve and rebase symbols, write the output
/// executable, and apply relocations. Returns the accumulated
/// [`Diagnostics`] on success; fatal conditions (spec §7) short-circuit via
/// `?` as a [`LinkError`] instead.
pub fn link(config: &Configuration) -> Result<Diagnostics, LinkError> {
    config.validate()?;

    let mut diagnostics = Diagnostics::default();
    let mut objects: Vec<InputObject> = Vec::with_capacity(config.input_paths.len());
    let mut globstrtab = StringTable::new();
    let mut globals = Vec::new();
    let entry_name_index = globstrtab.add(&config.entry_label);
    let mut entry_symbol: Option<(usize, usize)> = None;

    // Pre-seed one empty MergedSection per configured section, in
    // configuration order, so later appends (sections first seen in an
    // input but never pre-declared) land after them (spec §3).
    let mut merged_sections: Vec<MergedSection> = config
        .sections
        .iter()
        .map(|s| MergedSection::new(s.name.clone(), Some(s.address)))
        .collect();

    for path in &config.input_paths {
        let object_index = objects.len();
        objects.push(object::read_object(path)?);

        let section_count = objects[object_index].sections.len();
        for section_index in 0..section_count {
            if !objects[object_index].sections[section_index].is_mergeable() {
                continue;
            }
            let name = objects[object_index].sections[section_index].name.clone();
            let configured_vaddr = config.configured_address(&name);
            merge(
                &mut merged_sections,
                &mut objects,
                object_index,
                section_index,
                configured_vaddr,
            )?;
        }

        resolve_object_symbols(
            &mut objects[object_index],
            object_index,
            &mut globals,
            &mut globstrtab,
            entry_name_index,
            &mut entry_symbol,
        )?;
    }

    layout::layout(&mut merged_sections, config.segment_alignment);
    rebase(&mut globals, &merged_sections);

    let entry_address = entry_symbol.and_then(|(obj_idx, sym_idx)| {
        let global_index = objects[obj_idx].symbols[sym_idx].global_index;
        if global_index == 0 {
            None
        } else {
            globals.get(global_index as usize - 1).map(|g| g.value)
        }
    });
    if entry_address.is_none() {
        diagnostics.warn("could not resolve entry point symbol");
    }

    let output_endian = objects.first().map(|o| o.endian).unwrap_or(Endian::host());

    let mut output = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&config.output_path)
        .map_err(LinkError::io(config.output_path.clone()))?;

    write_executable(
        &mut output,
        &objects,
        &mut merged_sections,
        config.segment_alignment,
        entry_address,
        &globstrtab,
    )?;

    for object in &objects {
        relocate_object(
            &mut output,
            output_endian,
            object,
            &merged_sections,
            &globals,
            &mut globstrtab,
            &mut diagnostics,
        )?;
    }

    Ok(diagnostics)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Configuration;
    use std::path::PathBuf;

    #[test]
    fn rejects_empty_input_list_before_touching_the_filesystem() {
        let config = Configuration::builder().input_paths(Vec::new()).build();
        assert!(matches!(link(&config), Err(LinkError::NoInputs)));
    }

    #[test]
    fn missing_input_file_is_a_fatal_io_error() {
        let config = Configuration::builder()
            .input_paths(vec![PathBuf::from("/nonexistent/object.o")])
            .output_path(PathBuf::from("/tmp/rvld-linker-test-missing.out"))
            .build();
        assert!(matches!(link(&config), Err(LinkError::Io { .. })));
    }
}
