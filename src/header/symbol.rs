//! `Elf32_Sym` symbol table entries.

use std::io::{Read, Seek, Write};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    base::{Endian, ElfByte, ElfHalfWord, ElfWord},
    error::Error,
    FromReader, HasWrittenSize, ToWriter,
};

/// `SHN_UNDEF`: the reserved section index meaning "this symbol is
/// undefined in the object that declares it" — the index an input must
/// carry for a symbol this linker is expected to resolve elsewhere.
pub const SHN_UNDEF: u16 = 0;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `ELF32_ST_BIND(st_info)`: a symbol's binding.
pub enum SymbolBinding {
    /// `STB_LOCAL`: not visible outside the object file that defines it.
    Local = 0,
    /// `STB_GLOBAL`: visible to all objects being combined; exactly one
    /// definition may exist across all inputs.
    Global = 1,
    /// `STB_WEAK`: global, but yields to a `Global` definition of the same
    /// name without conflict.
    Weak = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `ELF32_ST_TYPE(st_info)`: what kind of entity a symbol names.
pub enum SymbolType {
    /// `STT_NOTYPE`: type not specified.
    NoType = 0,
    /// `STT_OBJECT`: a data object.
    Object = 1,
    /// `STT_FUNC`: a function or other executable code.
    Func = 2,
    /// `STT_SECTION`: associated with a section; used by relocation entries
    /// that reference a section rather than a named symbol.
    Section = 3,
    /// `STT_FILE`: the name of the source file associated with the object file.
    File = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An `Elf32_Sym` record.
pub struct Elf32Sym {
    /// `st_name`: byte offset into the associated string table.
    pub name: u32,
    /// `st_value`: the symbol's value (a section-relative offset in an
    /// input object, an absolute address once rebased into the output).
    pub value: u32,
    /// `st_size`: the symbol's size, if known.
    pub size: u32,
    /// `st_info`: packs binding and type. Use [`Elf32Sym::binding`] and
    /// [`Elf32Sym::symbol_type`] rather than unpacking this directly.
    pub info: u8,
    /// `st_other`: reserved, must be zero.
    pub other: u8,
    /// `st_shndx`: the section this symbol is defined in, or [`SHN_UNDEF`].
    pub shndx: u16,
}

impl Elf32Sym {
    /// `ELF32_ST_BIND(st_info)`.
    pub fn binding(&self) -> Option<SymbolBinding> {
        SymbolBinding::from_u8(self.info >> 4)
    }

    /// `ELF32_ST_TYPE(st_info)`.
    pub fn symbol_type(&self) -> Option<SymbolType> {
        SymbolType::from_u8(self.info & 0xf)
    }

    /// `ELF32_ST_INFO(bind, type)`: pack a binding and type into `st_info`.
    pub fn pack_info(binding: SymbolBinding, symbol_type: SymbolType) -> u8 {
        ((binding as u8) << 4) | (symbol_type as u8 & 0xf)
    }

    /// Whether this symbol is defined in the object that declares it
    /// (`st_shndx != SHN_UNDEF`).
    pub fn is_defined(&self) -> bool {
        self.shndx != SHN_UNDEF
    }
}

impl HasWrittenSize for Elf32Sym {
    const SIZE: usize = 16;
}

impl<R> FromReader<R> for Elf32Sym
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        let name = ElfWord::from_reader(reader, endian)?.0;
        let value = ElfWord::from_reader(reader, endian)?.0;
        let size = ElfWord::from_reader(reader, endian)?.0;
        let info = ElfByte::from_reader(reader, endian)?.0;
        let other = ElfByte::from_reader(reader, endian)?.0;
        let shndx = ElfHalfWord::from_reader(reader, endian)?.0;
        Ok(Self {
            name,
            value,
            size,
            info,
            other,
            shndx,
        })
    }
}

impl<W> ToWriter<W> for Elf32Sym
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        ElfWord(self.name).to_writer(writer, endian)?;
        ElfWord(self.value).to_writer(writer, endian)?;
        ElfWord(self.size).to_writer(writer, endian)?;
        ElfByte(self.info).to_writer(writer, endian)?;
        ElfByte(self.other).to_writer(writer, endian)?;
        ElfHalfWord(self.shndx).to_writer(writer, endian)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let sym = Elf32Sym {
            name: 5,
            value: 0x40,
            size: 8,
            info: Elf32Sym::pack_info(SymbolBinding::Global, SymbolType::Func),
            other: 0,
            shndx: 1,
        };
        let mut bytes = Vec::new();
        sym.to_writer(&mut bytes, Endian::Little).unwrap();
        assert_eq!(bytes.len(), Elf32Sym::SIZE);

        let mut cursor = Cursor::new(bytes);
        let back = Elf32Sym::from_reader(&mut cursor, Endian::Little).unwrap();
        assert_eq!(back, sym);
        assert_eq!(back.binding(), Some(SymbolBinding::Global));
        assert_eq!(back.symbol_type(), Some(SymbolType::Func));
        assert!(back.is_defined());
    }

    #[test]
    fn undefined_symbol_reports_not_defined() {
        let sym = Elf32Sym {
            name: 0,
            value: 0,
            size: 0,
            info: Elf32Sym::pack_info(SymbolBinding::Global, SymbolType::NoType),
            other: 0,
            shndx: SHN_UNDEF,
        };
        assert!(!sym.is_defined());
    }
}
