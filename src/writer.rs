//! Emits the final ELF32 executable (C6): the file header (entry address
//! patched in last), the program header table, every merged section's
//! contents, the two string tables, and the section header table.

use std::io::{Seek, SeekFrom, Write};

use log::info;

use crate::{
    base::Endian,
    error::LinkError,
    header::{
        elf::{ElfHeader, ElfMachine, ElfType},
        identification::ElfHeaderIdentifier,
        program::{Elf32ProgramHeader, ProgramFlags, ProgramHeaderType},
        section::{Elf32SectionHeader, SectionHeaderType},
    },
    merge::MergedSection,
    object::InputObject,
    strtab::StringTable,
    ToWriter,
};

/// `p_flags` derivation from `sh_flags` (spec §4.6, §9). Always starts from
/// `PF_R`, adds `PF_W` if `SHF_WRITE`, but an executable section gets its
/// flags *replaced* with `PF_X` alone rather than `PF_R|PF_X` — an
/// assignment, not an OR, in the source this preserves. Flagged as an open
/// question in DESIGN.md; implemented verbatim here.
fn segment_flags(section: &MergedSection) -> ProgramFlags {
    let mut flags = ProgramFlags::READ;
    if section.sh_flags & 0x1 != 0 {
        flags |= ProgramFlags::WRITE;
    }
    if section.sh_flags & 0x4 != 0 {
        flags = ProgramFlags::EXEC;
    }
    flags
}

/// Write the linked executable to `output`, returning the file offset each
/// merged section's contents were placed at (mirrored back into
/// `merged_sections[i].file_off` for [`crate::relocate`] to use) and the
/// entry point's resolved absolute address, or `0` with a warning if no
/// entry symbol was found (spec §4.6).
pub fn write_executable(
    output: &mut (impl Write + Seek),
    objects: &[InputObject],
    merged_sections: &mut [MergedSection],
    segment_alignment: u32,
    entry_address: Option<u32>,
    globstrtab: &StringTable,
) -> Result<(), LinkError> {
    let endian = objects
        .first()
        .map(|o| o.endian)
        .unwrap_or(Endian::host());
    let first = objects.first();

    let alloc_count = merged_sections.iter().filter(|s| s.is_alloc() && !s.is_empty()).count();
    let non_empty_count = merged_sections.iter().filter(|s| !s.is_empty()).count();
    let phnum = alloc_count as u16;
    let shnum = non_empty_count as u16 + 3; // null + non-empty-merged + .strtab + .shstrtab

    let ehsize = ElfHeader::SIZE as u32;
    let phoff = ehsize;
    let phentsize = Elf32ProgramHeader::SIZE as u32;
    let phtable_size = phentsize * phnum as u32;

    let mut cursor = phoff + phtable_size;

    for section in merged_sections.iter_mut() {
        if section.is_empty() {
            continue;
        }
        if section.sh_type == SectionHeaderType::NoBits as u32 {
            section.file_off = cursor;
            continue;
        }
        // Segment padding uses the same unconditional additive form as C4's
        // memsz padding: even an already-aligned cursor absorbs one more
        // alignment unit (spec §4.6, §9).
        let align = if section.is_alloc() {
            segment_alignment.max(1)
        } else {
            section.sh_addralign.max(1)
        };
        cursor += align - (cursor % align);
        section.file_off = cursor;
        cursor += section.memsz;
    }

    let strtab_off = cursor;

    let mut shstrtab = StringTable::new();
    for section in merged_sections.iter_mut() {
        if section.is_empty() {
            continue;
        }
        let idx = shstrtab.add(&section.name);
        section.name_index = Some(idx);
    }
    shstrtab.add(".strtab");
    shstrtab.add(".shstrtab");

    let strtab_bytes = globstrtab.to_bytes();
    let shstrtab_bytes = shstrtab.to_bytes();
    let shstrtab_off = strtab_off + strtab_bytes.len() as u32;
    cursor = shstrtab_off + shstrtab_bytes.len() as u32;

    let shoff = (cursor + 3) & !3;

    let ident = first.map(|o| o.header.ident).unwrap_or(ElfHeaderIdentifier {
        class: crate::header::identification::ElfClass::Elf32,
        data_encoding: endian.into(),
        version: 1,
        os_abi: 0,
        abi_version: 0,
    });

    let mut header = ElfHeader {
        ident,
        ty: ElfType::Executable,
        machine: ElfMachine::Riscv,
        version: 1,
        entry: entry_address.unwrap_or(0),
        phoff,
        shoff,
        flags: first.map(|o| o.header.flags).unwrap_or(0),
        ehsize: ElfHeader::SIZE as u16,
        phentsize: phentsize as u16,
        phnum,
        shentsize: Elf32SectionHeader::SIZE as u16,
        shnum,
        shstrndx: shnum - 1,
    };

    header.to_writer(output, endian).map_err(LinkError::from)?;

    for section in merged_sections.iter() {
        if !section.is_alloc() || section.is_empty() {
            continue;
        }
        let ph = Elf32ProgramHeader {
            p_type: ProgramHeaderType::Load as u32,
            offset: section.file_off,
            vaddr: section.vaddr,
            paddr: section.vaddr,
            filesz: if section.sh_type == SectionHeaderType::NoBits as u32 {
                0
            } else {
                section.memsz
            },
            memsz: section.memsz,
            flags: segment_flags(section).bits(),
            align: segment_alignment.max(1),
        };
        ph.to_writer(output, endian).map_err(LinkError::from)?;
    }

    for (obj_idx, object) in objects.iter().enumerate() {
        for (sec_idx, input_section) in object.sections.iter().enumerate() {
            let Some(merged_index) = input_section.merged else {
                continue;
            };
            let merged = &merged_sections[merged_index];
            if merged.sh_type == SectionHeaderType::NoBits as u32 {
                continue;
            }
            let _ = (obj_idx, sec_idx);
            let bytes = object.section_bytes(sec_idx)?;
            let offset = merged.file_off as u64 + input_section.translation_offset as u64;
            output
                .seek(SeekFrom::Start(offset))
                .map_err(LinkError::io(object.path.clone()))?;
            output
                .write_all(&bytes)
                .map_err(LinkError::io(object.path.clone()))?;
        }
    }

    output
        .seek(SeekFrom::Start(strtab_off as u64))
        .map_err(LinkError::io(std::path::PathBuf::new()))?;
    output
        .write_all(&strtab_bytes)
        .map_err(LinkError::io(std::path::PathBuf::new()))?;

    output
        .seek(SeekFrom::Start(shstrtab_off as u64))
        .map_err(LinkError::io(std::path::PathBuf::new()))?;
    output
        .write_all(&shstrtab_bytes)
        .map_err(LinkError::io(std::path::PathBuf::new()))?;

    output
        .seek(SeekFrom::Start(shoff as u64))
        .map_err(LinkError::io(std::path::PathBuf::new()))?;

    let null_header = Elf32SectionHeader {
        name: 0,
        sh_type: 0,
        flags: 0,
        addr: 0,
        offset: 0,
        size: 0,
        link: 0,
        info: 0,
        addralign: 0,
        entsize: 0,
    };
    null_header.to_writer(output, endian).map_err(LinkError::from)?;

    for section in merged_sections.iter().filter(|s| !s.is_empty()) {
        let sh = Elf32SectionHeader {
            name: shstrtab.offset_of(section.name_index.unwrap_or(0)).unwrap_or(0),
            sh_type: section.sh_type,
            flags: section.sh_flags,
            addr: section.vaddr,
            offset: section.file_off,
            size: section.memsz,
            link: section.sh_link,
            info: section.sh_info,
            addralign: section.sh_addralign,
            entsize: section.sh_entsize,
        };
        sh.to_writer(output, endian).map_err(LinkError::from)?;
    }

    let strtab_name = shstrtab.add(".strtab");
    let strtab_header = Elf32SectionHeader {
        name: shstrtab.offset_of(strtab_name).unwrap_or(0),
        sh_type: SectionHeaderType::StrTab as u32,
        flags: 0,
        addr: 0,
        offset: strtab_off,
        size: strtab_bytes.len() as u32,
        link: 0,
        info: 0,
        addralign: 1,
        entsize: 0,
    };
    strtab_header.to_writer(output, endian).map_err(LinkError::from)?;

    let shstrtab_name = shstrtab.add(".shstrtab");
    let shstrtab_header = Elf32SectionHeader {
        name: shstrtab.offset_of(shstrtab_name).unwrap_or(0),
        sh_type: SectionHeaderType::StrTab as u32,
        flags: 0,
        addr: 0,
        offset: shstrtab_off,
        size: shstrtab_bytes.len() as u32,
        link: 0,
        info: 0,
        addralign: 1,
        entsize: 0,
    };
    shstrtab_header.to_writer(output, endian).map_err(LinkError::from)?;

    output
        .seek(SeekFrom::Start(0))
        .map_err(LinkError::io(std::path::PathBuf::new()))?;
    header.entry = entry_address.unwrap_or(0);
    header.to_writer(output, endian).map_err(LinkError::from)?;

    info!(
        "wrote executable: {} section(s), {} segment(s), entry {:#x}",
        merged_sections.len(),
        phnum,
        header.entry
    );

    Ok(())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    fn section(flags: u32) -> MergedSection {
        MergedSection {
            name: ".text".to_string(),
            name_index: None,
            sh_type: 1,
            sh_flags: flags,
            sh_addralign: 4,
            sh_link: 0,
            sh_info: 0,
            sh_entsize: 0,
            vaddr: 0x1000,
            memsz: 0x100,
            file_off: 0,
            children: vec![(0, 0)],
        }
    }

    #[test]
    fn executable_section_drops_read_and_write_flags() {
        let flags = segment_flags(&section(0x2 | 0x1 | 0x4));
        assert_eq!(flags, ProgramFlags::EXEC);
    }

    #[test]
    fn writable_non_exec_section_is_writable() {
        let flags = segment_flags(&section(0x2 | 0x1));
        assert!(flags.contains(ProgramFlags::WRITE));
        assert!(!flags.contains(ProgramFlags::EXEC));
    }

    #[test]
    fn readonly_section_is_read_only() {
        let flags = segment_flags(&section(0x2));
        assert_eq!(flags, ProgramFlags::READ);
    }
}
