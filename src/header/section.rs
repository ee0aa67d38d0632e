//! The ELF32 section header (`Elf32_Shdr`) and the flags/types it carries.

use std::io::{Read, Seek, Write};

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    base::{Endian, ElfWord},
    error::Error,
    FromReader, HasWrittenSize, ToWriter,
};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `sh_type`: what kind of data a section holds.
pub enum SectionHeaderType {
    /// `SHT_NULL`: an inactive section header entry.
    Null = 0,
    /// `SHT_PROGBITS`: program-defined data (code or initialized data).
    ProgBits = 1,
    /// `SHT_SYMTAB`: a full symbol table, used for link editing.
    SymTab = 2,
    /// `SHT_STRTAB`: a string table.
    StrTab = 3,
    /// `SHT_RELA`: relocation entries with explicit addends — the only
    /// relocation section type this linker reads.
    Rela = 4,
    /// `SHT_NOBITS`: occupies no file space but reserves `sh_size` bytes in
    /// memory (`.bss`).
    NoBits = 8,
    /// `SHT_REL`: relocation entries without explicit addends. Out of
    /// scope (see spec Non-goals); sections of this type are neither
    /// merged nor relocated.
    Rel = 9,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `sh_flags`: attributes of a section.
    pub struct SectionFlags: u32 {
        /// `SHF_WRITE`: writable at runtime.
        const WRITE = 0x1;
        /// `SHF_ALLOC`: occupies memory during execution.
        const ALLOC = 0x2;
        /// `SHF_EXECINSTR`: contains executable instructions.
        const EXECINSTR = 0x4;
        /// `SHF_INFO_LINK`: `sh_info` holds a section header table index.
        const INFO_LINK = 0x40;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An `Elf32_Shdr` record, exactly as read from (or to be written to) an
/// input or output file. [`crate::object::InputSection`] wraps one of these
/// with the linker's own bookkeeping (owning object, merge target, translation offset).
pub struct Elf32SectionHeader {
    /// `sh_name`: byte offset into the section header string table.
    pub name: u32,
    /// `sh_type`.
    pub sh_type: u32,
    /// `sh_flags`.
    pub flags: u32,
    /// `sh_addr`: virtual address, if allocatable.
    pub addr: u32,
    /// `sh_offset`: byte offset of the section's data in the file.
    pub offset: u32,
    /// `sh_size`: size in bytes (conceptual size for `SHT_NOBITS`).
    pub size: u32,
    /// `sh_link`: section header table index whose interpretation depends on `sh_type`.
    pub link: u32,
    /// `sh_info`: extra information whose interpretation depends on `sh_type`.
    pub info: u32,
    /// `sh_addralign`: required alignment, or 0/1 for "no constraint".
    pub addralign: u32,
    /// `sh_entsize`: size of each fixed-size entry, or 0 if the section holds no such table.
    pub entsize: u32,
}

impl Elf32SectionHeader {
    /// The section's `sh_type` as a typed enum, or `None` if it's a value
    /// this linker doesn't recognize (it's still retained verbatim in
    /// `sh_type` for round-tripping into the output).
    pub fn kind(&self) -> Option<SectionHeaderType> {
        SectionHeaderType::from_u32(self.sh_type)
    }

    /// The section's flags, masked to the bits this linker understands.
    pub fn section_flags(&self) -> SectionFlags {
        SectionFlags::from_bits_truncate(self.flags)
    }

    /// Number of fixed-size entries in the section (symbol table entries,
    /// relocation entries), or the raw byte size if the section holds no
    /// such table (`sh_entsize == 0`), per spec §3's `InputSection` "number
    /// of elements" derivation.
    pub fn element_count(&self) -> u32 {
        if self.entsize == 0 {
            self.size
        } else {
            self.size / self.entsize
        }
    }
}

impl HasWrittenSize for Elf32SectionHeader {
    const SIZE: usize = 40;
}

impl<R> FromReader<R> for Elf32SectionHeader
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        Ok(Self {
            name: ElfWord::from_reader(reader, endian)?.0,
            sh_type: ElfWord::from_reader(reader, endian)?.0,
            flags: ElfWord::from_reader(reader, endian)?.0,
            addr: ElfWord::from_reader(reader, endian)?.0,
            offset: ElfWord::from_reader(reader, endian)?.0,
            size: ElfWord::from_reader(reader, endian)?.0,
            link: ElfWord::from_reader(reader, endian)?.0,
            info: ElfWord::from_reader(reader, endian)?.0,
            addralign: ElfWord::from_reader(reader, endian)?.0,
            entsize: ElfWord::from_reader(reader, endian)?.0,
        })
    }
}

impl<W> ToWriter<W> for Elf32SectionHeader
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        ElfWord(self.name).to_writer(writer, endian)?;
        ElfWord(self.sh_type).to_writer(writer, endian)?;
        ElfWord(self.flags).to_writer(writer, endian)?;
        ElfWord(self.addr).to_writer(writer, endian)?;
        ElfWord(self.offset).to_writer(writer, endian)?;
        ElfWord(self.size).to_writer(writer, endian)?;
        ElfWord(self.link).to_writer(writer, endian)?;
        ElfWord(self.info).to_writer(writer, endian)?;
        ElfWord(self.addralign).to_writer(writer, endian)?;
        ElfWord(self.entsize).to_writer(writer, endian)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let sh = Elf32SectionHeader {
            name: 1,
            sh_type: SectionHeaderType::ProgBits as u32,
            flags: (SectionFlags::ALLOC | SectionFlags::EXECINSTR).bits(),
            addr: 0,
            offset: 64,
            size: 16,
            link: 0,
            info: 0,
            addralign: 4,
            entsize: 0,
        };
        let mut bytes = Vec::new();
        sh.to_writer(&mut bytes, Endian::Little).unwrap();
        assert_eq!(bytes.len(), Elf32SectionHeader::SIZE);

        let mut cursor = Cursor::new(bytes);
        let back = Elf32SectionHeader::from_reader(&mut cursor, Endian::Little).unwrap();
        assert_eq!(back, sh);
        assert_eq!(back.kind(), Some(SectionHeaderType::ProgBits));
        assert!(back.section_flags().contains(SectionFlags::EXECINSTR));
    }

    #[test]
    fn element_count_uses_entsize_when_present() {
        let sh = Elf32SectionHeader {
            name: 0,
            sh_type: SectionHeaderType::SymTab as u32,
            flags: 0,
            addr: 0,
            offset: 0,
            size: 48,
            link: 0,
            info: 0,
            addralign: 4,
            entsize: 16,
        };
        assert_eq!(sh.element_count(), 3);
    }
}
