//! Merges per-object symbol tables into one global table, rebases symbol
//! values to absolute virtual addresses, and resolves relocation targets
//! against that table (C5).

use std::io::Cursor;

use crate::{
    error::LinkError,
    header::symbol::{Elf32Sym, SHN_UNDEF},
    merge::MergedSection,
    object::{cstr_at, InputObject, InputSymbol},
    strtab::StringTable,
    FromReader,
};

/// A symbol entered into the global table: an `Elf32_Sym` whose `st_shndx`
/// has already been translated to a *merged* section index and whose
/// `st_value` starts out section-relative, becoming absolute once
/// [`rebase`] runs (spec §3).
#[derive(Debug, Clone)]
pub struct GlobalSymbol {
    /// Index into the shared global string table.
    pub name_index: usize,
    /// Section-relative offset until [`rebase`] runs; absolute virtual
    /// address afterward.
    pub value: u32,
    /// `st_size`, copied verbatim.
    pub size: u32,
    /// `st_info`, copied verbatim.
    pub info: u8,
    /// Index into `merged_sections` this symbol is defined in.
    pub merged_section: usize,
}

/// The outcome of resolving an `InputSymbol` reference against the global
/// symbol table (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Resolved to `globals[index]`.
    Resolved(usize),
    /// No global symbol matches.
    Undefined,
}

/// Parse `object`'s designated `SHT_SYMTAB` (if any), entering every
/// defined symbol into `globals` and `globstrtab`. Must run after every
/// mergeable section of `object` has already been merged, so each defined
/// symbol's owning section already has a `merged`/`translation_offset`
/// assigned (spec §4.5).
///
/// If the newly entered symbol's interned name matches `entry_name_index`
/// and no entry symbol has been found yet, records
/// `(object_index, symbol_index)` into `entry_symbol`.
pub fn resolve_object_symbols(
    object: &mut InputObject,
    object_index: usize,
    globals: &mut Vec<GlobalSymbol>,
    globstrtab: &mut StringTable,
    entry_name_index: usize,
    entry_symbol: &mut Option<(usize, usize)>,
) -> Result<(), LinkError> {
    let Some(symtab_index) = object.symtab_section else {
        return Ok(());
    };

    let symtab_header = object.sections[symtab_index].header;
    let strtab_index = symtab_header.link as usize;
    let strtab_bytes = object.section_bytes(strtab_index)?.clone();
    let raw = object.section_bytes(symtab_index)?.clone();
    let endian = object.endian;
    let count = symtab_header.element_count();

    let mut cursor = Cursor::new(raw);
    let mut symbols = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let sym =
            Elf32Sym::from_reader(&mut cursor, endian).map_err(|_| LinkError::Truncated)?;
        let name = cstr_at(&strtab_bytes, sym.name as usize);
        let mut input_symbol = InputSymbol {
            sym,
            name: name.clone(),
            global_index: 0,
        };

        if sym.shndx != SHN_UNDEF {
            if let Some(merged_index) = object
                .sections
                .get(sym.shndx as usize)
                .and_then(|s| s.merged)
            {
                let translation = object.sections[sym.shndx as usize].translation_offset;
                let name_index = globstrtab.add(&name);
                globals.push(GlobalSymbol {
                    name_index,
                    value: sym.value + translation,
                    size: sym.size,
                    info: sym.info,
                    merged_section: merged_index,
                });
                input_symbol.global_index = globals.len() as u32;

                if entry_symbol.is_none() && name_index == entry_name_index {
                    *entry_symbol = Some((object_index, symbols.len()));
                }
            }
        }

        symbols.push(input_symbol);
    }

    object.symbols = symbols;
    Ok(())
}

/// Convert every global symbol's section-relative `value` into an absolute
/// virtual address, now that C4 has assigned every merged section its
/// final `vaddr` (spec §4.5).
pub fn rebase(globals: &mut [GlobalSymbol], merged_sections: &[MergedSection]) {
    for global in globals.iter_mut() {
        if let Some(section) = merged_sections.get(global.merged_section) {
            global.value += section.vaddr;
        }
    }
}

/// Resolve `input_symbol`'s reference against the global symbol table,
/// caching the result back onto it (spec §4.5).
///
/// When `use_sym_name` is true and `input_symbol` has a name, that name is
/// interned and used as the lookup key; otherwise `fallback_name_index` is
/// used directly (the entry-symbol lookup's path, which has no `InputSymbol`
/// to query a name from).
pub fn resolve(
    input_symbol: &mut InputSymbol,
    fallback_name_index: usize,
    use_sym_name: bool,
    globals: &[GlobalSymbol],
    globstrtab: &mut StringTable,
) -> Resolution {
    if input_symbol.global_index != 0 {
        return Resolution::Resolved(input_symbol.global_index as usize - 1);
    }

    let key = if use_sym_name && !input_symbol.name.is_empty() {
        globstrtab.add(&input_symbol.name)
    } else {
        fallback_name_index
    };

    match globals.iter().position(|g| g.name_index == key) {
        Some(index) => {
            input_symbol.global_index = index as u32 + 1;
            Resolution::Resolved(index)
        }
        None => Resolution::Undefined,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    fn input_symbol(name: &str, global_index: u32) -> InputSymbol {
        InputSymbol {
            sym: Elf32Sym {
                name: 0,
                value: 0,
                size: 0,
                info: 0,
                other: 0,
                shndx: 0,
            },
            name: name.to_string(),
            global_index,
        }
    }

    fn global(name_index: usize, value: u32, merged_section: usize) -> GlobalSymbol {
        GlobalSymbol {
            name_index,
            value,
            size: 0,
            info: 0,
            merged_section,
        }
    }

    #[test]
    fn cached_resolution_short_circuits_the_scan() {
        let mut sym = input_symbol("main", 3);
        let globals = vec![global(0, 0, 0), global(1, 0, 0)];
        let mut strtab = StringTable::new();
        assert_eq!(
            resolve(&mut sym, 0, true, &globals, &mut strtab),
            Resolution::Resolved(2)
        );
    }

    #[test]
    fn unresolved_name_is_undefined() {
        let mut sym = input_symbol("missing", 0);
        let globals = vec![global(0, 0, 0)];
        let mut strtab = StringTable::new();
        strtab.add("main");
        assert_eq!(
            resolve(&mut sym, 0, true, &globals, &mut strtab),
            Resolution::Undefined
        );
    }

    #[test]
    fn resolved_by_name_caches_global_index() {
        let mut strtab = StringTable::new();
        let main_idx = strtab.add("main");
        let mut sym = input_symbol("main", 0);
        let globals = vec![global(main_idx, 0x400000, 0)];
        assert_eq!(
            resolve(&mut sym, 0, true, &globals, &mut strtab),
            Resolution::Resolved(0)
        );
        assert_eq!(sym.global_index, 1);
    }

    #[test]
    fn rebase_adds_section_vaddr() {
        let mut globals = vec![global(0, 0x10, 0)];
        let merged_sections = vec![MergedSection {
            name: ".text".to_string(),
            name_index: None,
            sh_type: 1,
            sh_flags: 0x2,
            sh_addralign: 4,
            sh_link: 0,
            sh_info: 0,
            sh_entsize: 0,
            vaddr: 0x400000,
            memsz: 0x1000,
            file_off: 0,
            children: vec![(0, 0)],
        }];
        rebase(&mut globals, &merged_sections);
        assert_eq!(globals[0].value, 0x400010);
    }
}
