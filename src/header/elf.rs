//! The ELF file header (`Elf32_Ehdr`).

use std::io::{Read, Seek, Write};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    base::{Endian, ElfHalfWord, ElfWord},
    error::Error,
    header::identification::{check_magic, ElfClass, ElfDataEncoding, ElfHeaderIdentifier},
    FromReader, HasWrittenSize, ToWriter,
};

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `e_type`: the kind of ELF object a file is.
pub enum ElfType {
    /// No file type
    None = 0,
    /// `ET_REL`: a relocatable object file, i.e. this linker's input.
    Relocatable = 1,
    /// `ET_EXEC`: a statically-linked executable, i.e. this linker's output.
    Executable = 2,
    /// `ET_DYN`: a shared object or position-independent executable. Out of scope.
    Dynamic = 3,
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `e_machine`: the target instruction set architecture. Only
/// [`ElfMachine::Riscv`] is accepted as an input machine by this linker.
pub enum ElfMachine {
    /// No machine
    None = 0,
    /// Intel 80386
    I386 = 3,
    /// ARM 32-bit
    Arm = 40,
    /// RISC-V
    Riscv = 243,
    /// AMD x86-64
    X86_64 = 62,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The ELF32 file header, always located at file offset 0.
pub struct ElfHeader {
    /// `e_ident`: magic, class, data encoding, version, OS/ABI.
    pub ident: ElfHeaderIdentifier,
    /// `e_type`.
    pub ty: ElfType,
    /// `e_machine`.
    pub machine: ElfMachine,
    /// `e_version`, which must be 1 (`EV_CURRENT`).
    pub version: u32,
    /// `e_entry`: the virtual address the program starts executing at.
    /// Zero in every `ET_REL` input; set by the writer to the resolved
    /// entry symbol's final address in the `ET_EXEC` output.
    pub entry: u32,
    /// `e_phoff`: byte offset of the program header table.
    pub phoff: u32,
    /// `e_shoff`: byte offset of the section header table.
    pub shoff: u32,
    /// `e_flags`: processor-specific flags. Copied from the first input.
    pub flags: u32,
    /// `e_ehsize`: size of this header.
    pub ehsize: u16,
    /// `e_phentsize`: size of one program header table entry.
    pub phentsize: u16,
    /// `e_phnum`: number of program header table entries.
    pub phnum: u16,
    /// `e_shentsize`: size of one section header table entry.
    pub shentsize: u16,
    /// `e_shnum`: number of section header table entries.
    pub shnum: u16,
    /// `e_shstrndx`: index of the section-header string table in the section header table.
    pub shstrndx: u16,
}

impl HasWrittenSize for ElfHeader {
    const SIZE: usize = 16 + 2 + 2 + 4 + 4 + 4 + 4 + 4 + 2 + 2 + 2 + 2 + 2 + 2;
}

impl<R> FromReader<R> for ElfHeader
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        let ident = ElfHeaderIdentifier::from_reader(reader, endian)?;
        let ty = ElfHalfWord::from_reader(reader, endian)?;
        let machine = ElfHalfWord::from_reader(reader, endian)?;
        let version = ElfWord::from_reader(reader, endian)?;
        let entry = ElfWord::from_reader(reader, endian)?;
        let phoff = ElfWord::from_reader(reader, endian)?;
        let shoff = ElfWord::from_reader(reader, endian)?;
        let flags = ElfWord::from_reader(reader, endian)?;
        let ehsize = ElfHalfWord::from_reader(reader, endian)?;
        let phentsize = ElfHalfWord::from_reader(reader, endian)?;
        let phnum = ElfHalfWord::from_reader(reader, endian)?;
        let shentsize = ElfHalfWord::from_reader(reader, endian)?;
        let shnum = ElfHalfWord::from_reader(reader, endian)?;
        let shstrndx = ElfHalfWord::from_reader(reader, endian)?;

        Ok(Self {
            ident,
            ty: ElfType::from_u16(ty.0).unwrap_or(ElfType::None),
            machine: ElfMachine::from_u16(machine.0).unwrap_or(ElfMachine::None),
            version: version.0,
            entry: entry.0,
            phoff: phoff.0,
            shoff: shoff.0,
            flags: flags.0,
            ehsize: ehsize.0,
            phentsize: phentsize.0,
            phnum: phnum.0,
            shentsize: shentsize.0,
            shnum: shnum.0,
            shstrndx: shstrndx.0,
        })
    }
}

impl<W> ToWriter<W> for ElfHeader
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        self.ident.to_writer(writer, endian)?;
        ElfHalfWord(self.ty as u16).to_writer(writer, endian)?;
        ElfHalfWord(self.machine as u16).to_writer(writer, endian)?;
        ElfWord(self.version).to_writer(writer, endian)?;
        ElfWord(self.entry).to_writer(writer, endian)?;
        ElfWord(self.phoff).to_writer(writer, endian)?;
        ElfWord(self.shoff).to_writer(writer, endian)?;
        ElfWord(self.flags).to_writer(writer, endian)?;
        ElfHalfWord(self.ehsize).to_writer(writer, endian)?;
        ElfHalfWord(self.phentsize).to_writer(writer, endian)?;
        ElfHalfWord(self.phnum).to_writer(writer, endian)?;
        ElfHalfWord(self.shentsize).to_writer(writer, endian)?;
        ElfHalfWord(self.shnum).to_writer(writer, endian)?;
        ElfHalfWord(self.shstrndx).to_writer(writer, endian)
    }
}

/// `true` if `ident`'s magic bytes are a valid ELF magic. Checked
/// separately from the rest of [`ElfHeader::from_reader`] so the reader can
/// attach the offending path to a [`crate::LinkError::BadMagic`] before
/// attempting to interpret anything else.
pub fn has_valid_magic(bytes: &[u8; 4]) -> bool {
    check_magic(bytes)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn sample() -> ElfHeader {
        ElfHeader {
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
            shoff: 1234,
            flags: 0,
            ehsize: ElfHeader::SIZE as u16,
            phentsize: 0,
            phnum: 0,
            shentsize: 40,
            shnum: 5,
            shstrndx: 4,
        }
    }

    #[test]
    fn round_trips_little_endian() {
        let header = sample();
        let mut bytes = Vec::new();
        header.to_writer(&mut bytes, Endian::Little).unwrap();
        assert_eq!(bytes.len(), ElfHeader::SIZE);

        let mut cursor = Cursor::new(bytes);
        let back = ElfHeader::from_reader(&mut cursor, Endian::Little).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn round_trips_big_endian() {
        let header = sample();
        let mut bytes = Vec::new();
        header.to_writer(&mut bytes, Endian::Big).unwrap();
        let mut cursor = Cursor::new(bytes);
        let back = ElfHeader::from_reader(&mut cursor, Endian::Big).unwrap();
        assert_eq!(back, header);
    }
}
