//! The ELF32 program header (`Elf32_Phdr`), describing one loadable segment
//! of the output executable. Input `ET_REL` objects carry none of these;
//! they are synthesized by the writer (C6) from the laid-out section list.

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
/// `p_type`: what kind of segment a program header describes. This linker
/// only ever emits [`ProgramHeaderType::Load`] segments.
pub enum ProgramHeaderType {
    /// `PT_NULL`: unused entry.
    Null = 0,
    /// `PT_LOAD`: a segment to be mapped into memory at load time.
    Load = 1,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `p_flags`: permissions the segment is mapped with.
    pub struct ProgramFlags: u32 {
        /// `PF_X`: executable.
        const EXEC = 0x1;
        /// `PF_W`: writable.
        const WRITE = 0x2;
        /// `PF_R`: readable.
        const READ = 0x4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An `Elf32_Phdr` record describing one `PT_LOAD` segment of the output.
pub struct Elf32ProgramHeader {
    /// `p_type`.
    pub p_type: u32,
    /// `p_offset`: byte offset of the segment's data in the file.
    pub offset: u32,
    /// `p_vaddr`: virtual address the segment is mapped at.
    pub vaddr: u32,
    /// `p_paddr`: physical address. This linker sets it equal to `p_vaddr`.
    pub paddr: u32,
    /// `p_filesz`: size of the segment's data in the file (zero for a
    /// segment built entirely from `SHT_NOBITS` sections).
    pub filesz: u32,
    /// `p_memsz`: size of the segment in memory, which may exceed
    /// `p_filesz` when it ends in `.bss`.
    pub memsz: u32,
    /// `p_flags`. See the design note on [`ProgramFlags`] regarding the
    /// executable-segment quirk this linker reproduces.
    pub flags: u32,
    /// `p_align`: required alignment of `p_offset` and `p_vaddr` relative
    /// to each other.
    pub align: u32,
}

impl Elf32ProgramHeader {
    /// The segment's `p_type` as a typed enum, or `None` for a value this
    /// linker never produces but could still round-trip.
    pub fn kind(&self) -> Option<ProgramHeaderType> {
        ProgramHeaderType::from_u32(self.p_type)
    }

    /// The segment's permissions.
    pub fn program_flags(&self) -> ProgramFlags {
        ProgramFlags::from_bits_truncate(self.flags)
    }
}

impl HasWrittenSize for Elf32ProgramHeader {
    const SIZE: usize = 32;
}

impl<R> FromReader<R> for Elf32ProgramHeader
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        Ok(Self {
            p_type: ElfWord::from_reader(reader, endian)?.0,
            offset: ElfWord::from_reader(reader, endian)?.0,
            vaddr: ElfWord::from_reader(reader, endian)?.0,
            paddr: ElfWord::from_reader(reader, endian)?.0,
            filesz: ElfWord::from_reader(reader, endian)?.0,
            memsz: ElfWord::from_reader(reader, endian)?.0,
            flags: ElfWord::from_reader(reader, endian)?.0,
            align: ElfWord::from_reader(reader, endian)?.0,
        })
    }
}

impl<W> ToWriter<W> for Elf32ProgramHeader
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        ElfWord(self.p_type).to_writer(writer, endian)?;
        ElfWord(self.offset).to_writer(writer, endian)?;
        ElfWord(self.vaddr).to_writer(writer, endian)?;
        ElfWord(self.paddr).to_writer(writer, endian)?;
        ElfWord(self.filesz).to_writer(writer, endian)?;
        ElfWord(self.memsz).to_writer(writer, endian)?;
        ElfWord(self.flags).to_writer(writer, endian)?;
        ElfWord(self.align).to_writer(writer, endian)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let ph = Elf32ProgramHeader {
            p_type: ProgramHeaderType::Load as u32,
            offset: 0x1000,
            vaddr: 0x10000,
            paddr: 0x10000,
            filesz: 0x200,
            memsz: 0x300,
            flags: (ProgramFlags::READ | ProgramFlags::EXEC).bits(),
            align: 0x1000,
        };
        let mut bytes = Vec::new();
        ph.to_writer(&mut bytes, Endian::Little).unwrap();
        assert_eq!(bytes.len(), Elf32ProgramHeader::SIZE);

        let mut cursor = Cursor::new(bytes);
        let back = Elf32ProgramHeader::from_reader(&mut cursor, Endian::Little).unwrap();
        assert_eq!(back, ph);
        assert_eq!(back.kind(), Some(ProgramHeaderType::Load));
        assert!(back.program_flags().contains(ProgramFlags::EXEC));
        assert!(!back.program_flags().contains(ProgramFlags::WRITE));
    }
}
