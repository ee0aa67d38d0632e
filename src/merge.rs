//! Groups same-named input sections from every object into contiguous
//! output sections (C3).

use crate::{error::LinkError, object::InputObject};

/// The output section that aggregates every input section sharing a name.
///
/// Invariants (spec §3, §8): every constituent shares `sh_type`,
/// `sh_flags`, and `sh_addralign`; constituents appear in the order they
/// were merged; `memsz` is the sum of constituent sizes until C4 pads it.
#[derive(Debug, Clone)]
pub struct MergedSection {
    /// The section's name.
    pub name: String,
    /// Index into the output section-header string table, assigned when
    /// the name is interned by the writer.
    pub name_index: Option<usize>,
    /// `sh_type` inherited from the first constituent.
    pub sh_type: u32,
    /// `sh_flags` inherited from the first constituent.
    pub sh_flags: u32,
    /// `sh_addralign` inherited from the first constituent.
    pub sh_addralign: u32,
    /// `sh_link` inherited from the first constituent.
    pub sh_link: u32,
    /// `sh_info` inherited from the first constituent.
    pub sh_info: u32,
    /// `sh_entsize` inherited from the first constituent.
    pub sh_entsize: u32,
    /// Base virtual address: from configuration if pre-declared, else 0
    /// until C4 assigns one.
    pub vaddr: u32,
    /// Cumulative size, summed across constituents then padded by C4.
    pub memsz: u32,
    /// File offset this section's contents start at, assigned by C6.
    pub file_off: u32,
    /// `(object_index, section_index)` pairs, in merge order — an arena
    /// index rather than a pointer, per the design notes (spec §9).
    pub children: Vec<(usize, usize)>,
}

impl MergedSection {
    /// An empty merged section, not yet populated with any children.
    /// Exposed so the orchestrator can pre-seed `merged_sections` with every
    /// configured section in configuration order before any input is
    /// merged, satisfying the ordering invariant in spec §3.
    pub(crate) fn new(name: String, configured_vaddr: Option<u32>) -> Self {
        Self {
            name,
            name_index: None,
            sh_type: 0,
            sh_flags: 0,
            sh_addralign: 1,
            sh_link: 0,
            sh_info: 0,
            sh_entsize: 0,
            vaddr: configured_vaddr.unwrap_or(0),
            memsz: 0,
            file_off: 0,
            children: Vec::new(),
        }
    }

    /// Whether this section occupies memory at runtime (`SHF_ALLOC`).
    pub fn is_alloc(&self) -> bool {
        self.sh_flags & 0x2 != 0
    }

    /// Whether any input section contributed to this merged section.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Merge the input section at `(object_index, section_index)` into
/// `merged_sections`, creating a new entry if no section of that name
/// exists yet (spec §4.3).
///
/// `configured_vaddr` supplies the base virtual address for a
/// newly-created merged section when its name was pre-declared in the
/// configuration's section list; it has no effect on an existing one.
pub fn merge(
    merged_sections: &mut Vec<MergedSection>,
    objects: &mut [InputObject],
    object_index: usize,
    section_index: usize,
    configured_vaddr: Option<u32>,
) -> Result<(), LinkError> {
    let name = objects[object_index].sections[section_index].name.clone();
    let merged_index = match merged_sections.iter().position(|m| m.name == name) {
        Some(idx) => idx,
        None => {
            merged_sections.push(MergedSection::new(name, configured_vaddr));
            merged_sections.len() - 1
        }
    };

    let merged = &merged_sections[merged_index];
    let (translation_offset, index_within_merged, conflict) = if merged.is_empty() {
        (0u32, 0usize, None)
    } else {
        let &(last_obj, last_sec) = merged.children.last().expect("just checked non-empty");
        let last_header = &objects[last_obj].sections[last_sec].header;
        let incoming_header = &objects[object_index].sections[section_index].header;
        let conflict = if last_header.sh_type != incoming_header.sh_type
            || last_header.flags != incoming_header.flags
            || last_header.addralign != incoming_header.addralign
        {
            Some(objects[last_obj].path.clone())
        } else {
            None
        };
        let offset = objects[last_obj].sections[last_sec].translation_offset
            + objects[last_obj].sections[last_sec].header.size;
        (offset, merged.children.len(), conflict)
    };

    if let Some(file_a) = conflict {
        return Err(LinkError::SectionConflict {
            name: merged_sections[merged_index].name.clone(),
            file_a,
            file_b: objects[object_index].path.clone(),
        });
    }

    {
        let incoming = &mut objects[object_index].sections[section_index];
        incoming.translation_offset = translation_offset;
        incoming.index_within_merged = index_within_merged;
        incoming.merged = Some(merged_index);
    }

    let incoming_header = objects[object_index].sections[section_index].header;
    let merged = &mut merged_sections[merged_index];
    if merged.is_empty() {
        merged.sh_type = incoming_header.sh_type;
        merged.sh_flags = incoming_header.flags;
        merged.sh_addralign = incoming_header.addralign.max(1);
        merged.sh_link = incoming_header.link;
        merged.sh_info = incoming_header.info;
        merged.sh_entsize = incoming_header.entsize;
    }
    merged.memsz += incoming_header.size;
    merged.children.push((object_index, section_index));

    Ok(())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::base::Endian;
    use crate::header::elf::{ElfHeader, ElfMachine, ElfType};
    use crate::header::identification::{ElfClass, ElfDataEncoding, ElfHeaderIdentifier};
    use crate::header::section::{Elf32SectionHeader, SectionHeaderType};
    use crate::object::InputSection;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn header(size: u32, flags: u32, addralign: u32) -> Elf32SectionHeader {
        Elf32SectionHeader {
            name: 0,
            sh_type: SectionHeaderType::ProgBits as u32,
            flags,
            addr: 0,
            offset: 0,
            size,
            link: 0,
            info: 0,
            addralign,
            entsize: 0,
        }
    }

    fn fake_object(path: &str, sections: Vec<(Elf32SectionHeader, &str)>) -> InputObject {
        InputObject {
            path: PathBuf::from(path),
            endian: Endian::Little,
            header: ElfHeader {
                ident: ElfHeaderIdentifier {
                    class: ElfClass::Elf32,
                    data_encoding: ElfDataEncoding::LittleEndian,
                    version: 1,
                    os_abi: 0,
                    abi_version: 0,
                },
                ty: ElfType::Relocatable,
                machine: ElfMachine::Riscv,
                version: 1,
                entry: 0,
                phoff: 0,
                shoff: 0,
                flags: 0,
                ehsize: ElfHeader::SIZE as u16,
                phentsize: 0,
                phnum: 0,
                shentsize: Elf32SectionHeader::SIZE as u16,
                shnum: sections.len() as u16,
                shstrndx: 0,
            },
            sections: sections
                .into_iter()
                .map(|(h, n)| InputSection::new(h, n.to_string()))
                .collect(),
            symtab_section: None,
            symbols: Vec::new(),
            stream: RefCell::new(Box::new(Cursor::new(Vec::<u8>::new()))),
        }
    }

    #[test]
    fn new_merged_section_inherits_configured_vaddr() {
        let merged = MergedSection::new(".text".to_string(), Some(0x400000));
        assert_eq!(merged.vaddr, 0x400000);
        assert!(merged.is_empty());
    }

    #[test]
    fn merging_two_compatible_sections_computes_translation_offsets() {
        let mut objects = vec![fake_object(
            "a.o",
            vec![(header(4, 0x2, 4), ".text"), (header(4, 0x2, 4), ".text")],
        )];
        let mut merged_sections = Vec::new();

        merge(&mut merged_sections, &mut objects, 0, 0, Some(0x400000)).unwrap();
        merge(&mut merged_sections, &mut objects, 0, 1, None).unwrap();

        assert_eq!(merged_sections.len(), 1);
        assert_eq!(merged_sections[0].memsz, 8);
        assert_eq!(merged_sections[0].children.len(), 2);
        assert_eq!(objects[0].sections[0].translation_offset, 0);
        assert_eq!(objects[0].sections[1].translation_offset, 4);
        assert_eq!(objects[0].sections[1].merged, Some(0));
    }

    #[test]
    fn conflicting_flags_on_same_name_is_a_bad_section_error() {
        let mut objects = vec![
            fake_object("a.o", vec![(header(4, 0x2, 4), ".rodata")]),
            fake_object("b.o", vec![(header(4, 0x3, 4), ".rodata")]),
        ];
        let mut merged_sections = Vec::new();

        merge(&mut merged_sections, &mut objects, 0, 0, None).unwrap();
        let err = merge(&mut merged_sections, &mut objects, 1, 0, None).unwrap_err();

        match err {
            LinkError::SectionConflict { name, file_a, file_b } => {
                assert_eq!(name, ".rodata");
                assert_eq!(file_a, PathBuf::from("a.o"));
                assert_eq!(file_b, PathBuf::from("b.o"));
            }
            other => panic!("expected SectionConflict, got {other:?}"),
        }
    }

    #[test]
    fn distinct_names_create_distinct_merged_sections() {
        let mut objects = vec![fake_object(
            "a.o",
            vec![(header(4, 0x2, 4), ".text"), (header(8, 0x3, 4), ".data")],
        )];
        let mut merged_sections = Vec::new();

        merge(&mut merged_sections, &mut objects, 0, 0, None).unwrap();
        merge(&mut merged_sections, &mut objects, 0, 1, None).unwrap();

        assert_eq!(merged_sections.len(), 2);
        assert_eq!(merged_sections[1].name, ".data");
    }
}
