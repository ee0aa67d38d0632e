//! The `e_ident` field of the ELF header. It sits at offset 0, is decoded
//! the same way regardless of class or data encoding, and tells the reader
//! how to decode everything that follows it.

use std::io::{Read, Seek, Write};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    base::{Endian, ElfByte},
    error::Error,
    FromReader, HasWrittenSize, ToWriter,
};

/// `e_ident[EI_MAG0..EI_MAG4]`: the four bytes every ELF file begins with.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The file's class: whether it is 32-bit or 64-bit. This linker only
/// accepts [`ElfClass::Elf32`]; [`ElfClass::Elf64`] is parsed (so a useful
/// `NotElf32` diagnostic can name the file) but never linked.
pub enum ElfClass {
    /// Unspecified class
    None = 0,
    /// 32-bit objects (`Elf32_*` types)
    Elf32 = 1,
    /// 64-bit objects (`Elf64_*` types) — out of scope for this linker.
    Elf64 = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The file's data encoding (byte order).
pub enum ElfDataEncoding {
    /// Unspecified encoding
    None = 0,
    /// Little-endian (`ELFDATA2LSB`)
    LittleEndian = 1,
    /// Big-endian (`ELFDATA2MSB`)
    BigEndian = 2,
}

impl From<ElfDataEncoding> for Option<Endian> {
    fn from(value: ElfDataEncoding) -> Self {
        match value {
            ElfDataEncoding::LittleEndian => Some(Endian::Little),
            ElfDataEncoding::BigEndian => Some(Endian::Big),
            ElfDataEncoding::None => None,
        }
    }
}

impl From<Endian> for ElfDataEncoding {
    fn from(value: Endian) -> Self {
        match value {
            Endian::Little => ElfDataEncoding::LittleEndian,
            Endian::Big => ElfDataEncoding::BigEndian,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// Identifies the OS/ABI extensions a file was built against. This linker
/// doesn't interpret the value, only copies it from the first input into
/// the output header, per spec §6 ("ABI and ABI version copied from the
/// first input").
pub enum ElfOsAbi {
    /// Unix System V ABI, or "none"
    SystemVOrNone = 0,
    /// Linux GNU extensions
    GnuLinux = 3,
    /// Standalone (embedded) ABI
    Standalone = 255,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The `e_ident` array, decoded field by field.
pub struct ElfHeaderIdentifier {
    /// The file's class. Must be [`ElfClass::Elf32`] for this linker to proceed.
    pub class: ElfClass,
    /// The file's data encoding, i.e. which [`Endian`] it was written in.
    pub data_encoding: ElfDataEncoding,
    /// `EI_VERSION`, which must be 1 (`EV_CURRENT`).
    pub version: u8,
    /// `EI_OSABI`.
    pub os_abi: u8,
    /// `EI_ABIVERSION`.
    pub abi_version: u8,
}

impl<R> FromReader<R> for ElfHeaderIdentifier
where
    R: Read + Seek,
{
    type Error = Error;

    /// `endian` is ignored: `e_ident` is a flat byte array with no
    /// multi-byte fields, so it decodes identically regardless of the
    /// file's declared byte order (which this function is, in fact, used
    /// to discover).
    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::io)?;
        let class = ElfByte::from_reader(reader, endian)?;
        let data_encoding = ElfByte::from_reader(reader, endian)?;
        let version = ElfByte::from_reader(reader, endian)?;
        let os_abi = ElfByte::from_reader(reader, endian)?;
        let abi_version = ElfByte::from_reader(reader, endian)?;
        let mut pad = [0u8; 7];
        reader.read_exact(&mut pad).map_err(Error::io)?;

        Ok(Self {
            class: ElfClass::from_u8(class.0).unwrap_or(ElfClass::None),
            data_encoding: ElfDataEncoding::from_u8(data_encoding.0).unwrap_or(ElfDataEncoding::None),
            version: version.0,
            os_abi: os_abi.0,
            abi_version: abi_version.0,
        })
    }
}

impl<W> ToWriter<W> for ElfHeaderIdentifier
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        writer.write_all(&ELF_MAGIC).map_err(Error::io)?;
        ElfByte(self.class as u8).to_writer(writer, endian)?;
        ElfByte(self.data_encoding as u8).to_writer(writer, endian)?;
        ElfByte(self.version).to_writer(writer, endian)?;
        ElfByte(self.os_abi).to_writer(writer, endian)?;
        ElfByte(self.abi_version).to_writer(writer, endian)?;
        writer.write_all(&[0u8; 7]).map_err(Error::io)
    }
}

impl HasWrittenSize for ElfHeaderIdentifier {
    const SIZE: usize = 16;
}

/// `e_ident` is the one part of the header that can be decoded without
/// already knowing the file's class or encoding; the caller reads the raw
/// magic bytes itself (rather than through [`FromReader`]) so it can check
/// them before committing to a class/encoding-dependent parse of the rest
/// of the header.
pub fn check_magic(bytes: &[u8; 4]) -> bool {
    bytes == &ELF_MAGIC
}
