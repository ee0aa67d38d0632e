//! Walks every input `SHT_RELA` section and patches the corresponding bytes
//! of the already-written output file (C7). Runs last, after C6 has placed
//! every merged section's final content at its file offset.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use log::warn;

use crate::{
    arch::riscv,
    base::{read_u32_at, write_u32_at, Endian},
    error::{Diagnostics, LinkError},
    header::{relocation::Elf32Rela, section::SectionHeaderType},
    merge::MergedSection,
    object::InputObject,
    symtab::{resolve, GlobalSymbol, Resolution},
    strtab::StringTable,
    FromReader,
};

/// Apply every relocation found in `object`'s `SHT_RELA` sections to
/// `output`, an already fully-laid-out and written file open for
/// read+write (spec §4.7).
///
/// `object_index` indexes `object` within the link's input list; used only
/// to look up `object`'s own sections, which carry the `merged`/
/// `translation_offset` bookkeeping C3 attached to them.
#[allow(clippy::too_many_arguments)]
pub fn relocate_object(
    output: &mut (impl Read + Write + Seek),
    output_endian: Endian,
    object: &InputObject,
    merged_sections: &[MergedSection],
    globals: &[GlobalSymbol],
    globstrtab: &mut StringTable,
    diagnostics: &mut Diagnostics,
) -> Result<(), LinkError> {
    for (section_index, section) in object.sections.iter().enumerate() {
        if section.header.kind() != Some(SectionHeaderType::Rela) {
            continue;
        }

        let target_section_index = section.header.info as usize;
        let Some(target) = object.sections.get(target_section_index) else {
            diagnostics.warn(format!(
                "{}: RELA section {:?} names a nonexistent target section {target_section_index}",
                object.path.display(),
                section.name
            ));
            continue;
        };
        let Some(merged_index) = target.merged else {
            diagnostics.warn(format!(
                "{}: RELA section {:?} targets an unmerged section; skipping",
                object.path.display(),
                section.name
            ));
            continue;
        };
        let merged = &merged_sections[merged_index];

        let raw = object.section_bytes(section_index)?;
        let mut cursor = Cursor::new(raw.clone());
        drop(raw);
        let count = section.header.element_count();

        for _ in 0..count {
            let rela = Elf32Rela::from_reader(&mut cursor, object.endian).map_err(|_| LinkError::Truncated)?;

            let Some(kind) = rela.kind() else {
                diagnostics.warn(format!(
                    "{}: unsupported relocation type {} in {:?}, skipping",
                    object.path.display(),
                    rela.raw_type(),
                    section.name
                ));
                continue;
            };

            let sym_index = rela.symbol_index() as usize;
            let Some(input_symbol) = object.symbols.get(sym_index) else {
                diagnostics.error(format!(
                    "{}: relocation in {:?} references nonexistent symbol table entry {sym_index}",
                    object.path.display(),
                    section.name
                ));
                continue;
            };

            let in_bounds = rela
                .offset
                .checked_add(4)
                .is_some_and(|end| end <= target.header.size);
            if !in_bounds {
                diagnostics.warn(format!(
                    "{}: relocation offset {:#x} in {:?} is out of bounds for a {}-byte target section",
                    object.path.display(),
                    rela.offset,
                    section.name,
                    target.header.size
                ));
                continue;
            }

            let mut input_symbol = input_symbol.clone();
            let resolution = resolve(&mut input_symbol, 0, true, globals, globstrtab);
            let symbol_value = match resolution {
                Resolution::Resolved(idx) => globals[idx].value,
                Resolution::Undefined => {
                    diagnostics.error(format!(
                        "{}: undefined reference to {:?} in {:?}",
                        object.path.display(),
                        input_symbol.name,
                        section.name
                    ));
                    continue;
                }
            };

            // `file_off` intentionally omits the target's translation
            // offset, matching the specified (and historically quirky)
            // relocator arithmetic verbatim; see DESIGN.md.
            let file_off = merged.file_off + rela.offset;
            let pc = merged.vaddr + target.translation_offset + rela.offset;
            let addend = rela.addend;
            // HI20/LO12_I patch the symbol's bare value; the addend only
            // folds in for BRANCH/JAL (via `pc`) and LO12_S.
            let value = symbol_value.wrapping_add(addend as u32);

            let mut word_buf = [0u8; 4];
            output
                .seek(SeekFrom::Start(file_off as u64))
                .map_err(LinkError::io(object.path.clone()))?;
            output
                .read_exact(&mut word_buf)
                .map_err(LinkError::io(object.path.clone()))?;
            let Some(word) = read_u32_at(&word_buf, 0, output_endian) else {
                diagnostics.error(format!(
                    "{}: truncated instruction word at relocation offset {:#x}",
                    object.path.display(),
                    file_off
                ));
                continue;
            };

            let patched = match kind {
                crate::header::relocation::RelocationType::Branch => {
                    riscv::patch_branch(word, value.wrapping_sub(pc) as i32)
                }
                crate::header::relocation::RelocationType::Jal => {
                    riscv::patch_jal(word, value.wrapping_sub(pc) as i32)
                }
                crate::header::relocation::RelocationType::Hi20 => {
                    riscv::patch_hi20(word, symbol_value as i32)
                }
                crate::header::relocation::RelocationType::Lo12I => {
                    riscv::patch_lo12_i(word, symbol_value as i32)
                }
                crate::header::relocation::RelocationType::Lo12S => {
                    riscv::patch_lo12_s(word, value as i32)
                }
            };

            let mut patched_buf = [0u8; 4];
            if write_u32_at(&mut patched_buf, 0, output_endian, patched).is_none() {
                warn!("impossible: 4-byte buffer rejected a 4-byte write");
                continue;
            }
            output
                .seek(SeekFrom::Start(file_off as u64))
                .map_err(LinkError::io(object.path.clone()))?;
            output
                .write_all(&patched_buf)
                .map_err(LinkError::io(object.path.clone()))?;
        }
    }

    Ok(())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn branch_relocation_computes_pc_relative_displacement() {
        let symbol_value: u32 = 0x1010;
        let pc: u32 = 0x1000;
        let disp = symbol_value.wrapping_sub(pc) as i32;
        assert_eq!(disp, 0x10);
        let patched = riscv::patch_branch(0, disp);
        assert_ne!(patched, 0);
    }

    #[test]
    fn hi20_relocation_uses_absolute_value_not_pc_relative() {
        let symbol_value: u32 = 0x4010_00;
        let patched = riscv::patch_hi20(0, symbol_value as i32);
        assert_eq!(patched, symbol_value & 0xFFFF_F000);
    }

    #[test]
    fn hi20_and_lo12_i_ignore_the_addend() {
        let symbol_value: u32 = 0x4010_00;
        let addend: i32 = 8;
        // HI20/LO12_I patch `sym.value` only; folding in `addend` here would
        // be the BRANCH/JAL/LO12_S behavior, not this one's.
        let hi = riscv::patch_hi20(0, symbol_value as i32);
        let lo = riscv::patch_lo12_i(0, symbol_value as i32);
        assert_eq!(hi, symbol_value & 0xFFFF_F000);
        assert_eq!(lo, (symbol_value & 0xFFF) << 20);
        assert_ne!(hi, riscv::patch_hi20(0, symbol_value.wrapping_add(addend as u32) as i32));
    }
}
