//! `Elf32_Rela` relocation entries and the RV32 relocation types this
//! linker knows how to apply.

use std::io::{Read, Seek, Write};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    base::{Endian, ElfSignedWord, ElfWord},
    error::Error,
    FromReader, HasWrittenSize, ToWriter,
};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The RV32 relocation types this linker applies (spec §4.7). Any other
/// value decodes to `None` from [`Elf32Rela::kind`] and is reported as an
/// unsupported relocation rather than silently skipped.
pub enum RelocationType {
    /// `R_RISCV_BRANCH`: a conditional branch's split, sign-extended 13-bit
    /// PC-relative displacement.
    Branch = 16,
    /// `R_RISCV_JAL`: `jal`'s split, sign-extended 21-bit PC-relative displacement.
    Jal = 17,
    /// `R_RISCV_HI20`: the upper 20 bits of an absolute symbol address,
    /// rounded for a following `LO12` addition.
    Hi20 = 26,
    /// `R_RISCV_LO12_I`: the low 12 bits of an absolute address, encoded
    /// into an I-type instruction immediate.
    Lo12I = 27,
    /// `R_RISCV_LO12_S`: the low 12 bits of an absolute address, encoded
    /// into an S-type instruction's split immediate.
    Lo12S = 28,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An `Elf32_Rela` entry: one relocation to apply within the section named
/// by the owning `SHT_RELA` section's `sh_info`.
pub struct Elf32Rela {
    /// `r_offset`: byte offset within the target section to patch.
    pub offset: u32,
    /// `r_info`: packs the referenced symbol table index and relocation
    /// type. Use [`Elf32Rela::symbol_index`] and [`Elf32Rela::kind`]
    /// rather than unpacking this directly.
    pub info: u32,
    /// `r_addend`: the constant addend used in computing the relocated value.
    pub addend: i32,
}

impl Elf32Rela {
    /// Build a relocation entry from an unpacked symbol index and type.
    pub fn new(symbol_index: u32, relocation_type: RelocationType, addend: i32) -> Self {
        Self {
            offset: 0,
            info: (symbol_index << 8) | (relocation_type as u32 & 0xff),
            addend,
        }
    }

    /// `ELF32_R_SYM(r_info)`: the index of the referenced symbol in the
    /// associated symbol table.
    pub fn symbol_index(&self) -> u32 {
        self.info >> 8
    }

    /// `ELF32_R_TYPE(r_info)`: the raw relocation type byte.
    pub fn raw_type(&self) -> u8 {
        (self.info & 0xff) as u8
    }

    /// The relocation type as a typed enum, or `None` if this linker
    /// doesn't implement it.
    pub fn kind(&self) -> Option<RelocationType> {
        RelocationType::from_u8(self.raw_type())
    }
}

impl HasWrittenSize for Elf32Rela {
    const SIZE: usize = 12;
}

impl<R> FromReader<R> for Elf32Rela
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        Ok(Self {
            offset: ElfWord::from_reader(reader, endian)?.0,
            info: ElfWord::from_reader(reader, endian)?.0,
            addend: ElfSignedWord::from_reader(reader, endian)?.0,
        })
    }
}

impl<W> ToWriter<W> for Elf32Rela
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        ElfWord(self.offset).to_writer(writer, endian)?;
        ElfWord(self.info).to_writer(writer, endian)?;
        ElfSignedWord(self.addend).to_writer(writer, endian)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_and_packs_sym_type() {
        let mut rela = Elf32Rela::new(7, RelocationType::Hi20, -4);
        rela.offset = 0x40;

        let mut bytes = Vec::new();
        rela.to_writer(&mut bytes, Endian::Little).unwrap();
        assert_eq!(bytes.len(), Elf32Rela::SIZE);

        let mut cursor = Cursor::new(bytes);
        let back = Elf32Rela::from_reader(&mut cursor, Endian::Little).unwrap();
        assert_eq!(back, rela);
        assert_eq!(back.symbol_index(), 7);
        assert_eq!(back.kind(), Some(RelocationType::Hi20));
        assert_eq!(back.addend, -4);
    }

    #[test]
    fn unknown_type_decodes_to_none() {
        let rela = Elf32Rela {
            offset: 0,
            info: 0xff,
            addend: 0,
        };
        assert_eq!(rela.kind(), None);
    }
}
