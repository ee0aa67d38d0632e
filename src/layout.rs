//! Assigns virtual addresses and padding to merged sections (C4).

use log::warn;

use crate::merge::MergedSection;

/// Apply section- and segment-alignment padding to every merged section in
/// order, then detect and repair overlapping or misaligned virtual-address
/// ranges (spec §4.4).
///
/// Runs after every input has been merged and before C5's rebasing pass:
/// rebasing needs each merged section's final `vaddr`, which this function
/// computes.
pub fn layout(merged_sections: &mut [MergedSection], segment_alignment: u32) {
    let mut prev_end: Option<u32> = None;

    for section in merged_sections.iter_mut() {
        if section.is_empty() {
            warn!("section {:?} has no constituents", section.name);
            continue;
        }

        let effective_align = if section.is_alloc() {
            section.sh_addralign.max(segment_alignment).max(1)
        } else {
            section.sh_addralign.max(1)
        };

        // Unconditional additive padding: even an already-aligned size
        // gains one more alignment's worth. Preserved verbatim as a
        // faithful reimplementation of the source (spec §9).
        section.memsz += effective_align - (section.memsz % effective_align);

        if !section.is_alloc() {
            continue;
        }

        if let Some(prev_end) = prev_end {
            if section.vaddr < prev_end {
                let shift = prev_end - section.vaddr;
                warn!(
                    "section {:?} at {:#x} overlaps the previous section ending at {:#x}; shifting by {:#x}",
                    section.name, section.vaddr, prev_end, shift
                );
                section.vaddr += shift;
            }
        }

        if section.vaddr == 0 {
            warn!("section {:?} has a zero virtual address", section.name);
        }

        if section.vaddr % effective_align != 0 {
            let aligned = section.vaddr + (effective_align - (section.vaddr % effective_align));
            warn!(
                "section {:?} virtual address {:#x} is misaligned to {:#x}; realigning to {:#x}",
                section.name, section.vaddr, effective_align, aligned
            );
            section.vaddr = aligned;
        }

        prev_end = Some(section.vaddr + section.memsz);
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    fn alloc_section(name: &str, vaddr: u32, memsz: u32, addralign: u32) -> MergedSection {
        let mut merged = MergedSection {
            name: name.to_string(),
            name_index: None,
            sh_type: 1, // SHT_PROGBITS
            sh_flags: 0x2, // SHF_ALLOC
            sh_addralign: addralign,
            sh_link: 0,
            sh_info: 0,
            sh_entsize: 0,
            vaddr,
            memsz,
            file_off: 0,
            children: vec![(0, 0)],
        };
        merged.memsz = memsz;
        merged
    }

    #[test]
    fn padding_is_added_even_when_already_aligned() {
        let mut sections = vec![alloc_section(".text", 0x1000, 0x1000, 0x1000)];
        layout(&mut sections, 0x1000);
        assert_eq!(sections[0].memsz, 0x2000);
    }

    #[test]
    fn overlapping_sections_are_shifted_and_warn() {
        let mut sections = vec![
            alloc_section(".text", 0x1000, 0x1800, 0x1000),
            alloc_section(".data", 0x1000, 0x800, 0x1000),
        ];
        layout(&mut sections, 0x1000);
        assert!(sections[1].vaddr >= sections[0].vaddr + sections[0].memsz);
    }

    #[test]
    fn non_alloc_sections_are_padded_but_not_relocated() {
        let mut sections = vec![alloc_section(".comment", 0, 10, 4)];
        sections[0].sh_flags = 0;
        layout(&mut sections, 0x1000);
        assert_eq!(sections[0].vaddr, 0);
        assert_eq!(sections[0].memsz, 12);
    }

    #[test]
    fn empty_sections_are_skipped() {
        let mut sections = vec![MergedSection {
            name: ".bss".to_string(),
            name_index: None,
            sh_type: 8,
            sh_flags: 0x2,
            sh_addralign: 4,
            sh_link: 0,
            sh_info: 0,
            sh_entsize: 0,
            vaddr: 0,
            memsz: 0,
            file_off: 0,
            children: Vec::new(),
        }];
        layout(&mut sections, 0x1000);
        assert_eq!(sections[0].memsz, 0);
    }
}
