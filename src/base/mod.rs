//! Base types for ELF32 object file structures: the raw on-disk integer
//! widths, the runtime byte-order they're encoded in, and newtypes that know
//! how to read/write themselves in that order.

use std::{
    io::{Read, Seek, Write},
    mem::size_of,
};

use crate::{error::Error, FromReader, HasWrittenSize, ToWriter};

/// Raw representation of a byte in an ELF32 file
pub type RawElfByte = u8;
/// Raw representation of a half-word (`Elf32_Half`) in an ELF32 file
pub type RawElfHalfWord = u16;
/// Raw representation of a word (`Elf32_Word`, `Elf32_Addr`, `Elf32_Off`) in an ELF32 file
pub type RawElfWord = u32;
/// Raw representation of a signed word (`Elf32_Sword`) in an ELF32 file
pub type RawElfSignedWord = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The byte order multi-byte fields of an ELF file are encoded in.
///
/// This is carried as an ordinary runtime value rather than threaded through
/// as a const generic parameter: a single linker invocation may read input
/// files of differing endianness (spec scenario: a little-endian and a
/// big-endian RISC-V object linked together), and every one of them still
/// has to end up in the same, non-generic merged section and global symbol
/// table. See `DESIGN.md`.
pub enum Endian {
    /// Least-significant byte first (`ELFDATA2LSB`)
    Little,
    /// Most-significant byte first (`ELFDATA2MSB`)
    Big,
}

impl Endian {
    /// The byte order of the machine this code is compiled for.
    pub const fn host() -> Self {
        #[cfg(target_endian = "little")]
        {
            Endian::Little
        }
        #[cfg(target_endian = "big")]
        {
            Endian::Big
        }
    }

    fn read_u16(self, buf: [u8; 2]) -> u16 {
        match self {
            Endian::Little => u16::from_le_bytes(buf),
            Endian::Big => u16::from_be_bytes(buf),
        }
    }

    fn read_u32(self, buf: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(buf),
            Endian::Big => u32::from_be_bytes(buf),
        }
    }

    fn write_u16(self, value: u16) -> [u8; 2] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

/// Read a `u16` at the current reader position, in `endian` order. Used
/// directly (rather than through [`FromReader`]) by the relocation patcher,
/// which mutates bytes already resident in a buffer rather than streaming
/// through a [`Read`].
pub fn read_u16_at(buf: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let bytes: [u8; 2] = buf.get(offset..offset + 2)?.try_into().ok()?;
    Some(endian.read_u16(bytes))
}

/// Read a `u32` at `offset` in `buf`, in `endian` order.
pub fn read_u32_at(buf: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(offset..offset + 4)?.try_into().ok()?;
    Some(endian.read_u32(bytes))
}

/// Write a `u32` at `offset` in `buf`, in `endian` order.
pub fn write_u32_at(buf: &mut [u8], offset: usize, endian: Endian, value: u32) -> Option<()> {
    let slice = buf.get_mut(offset..offset + 4)?;
    slice.copy_from_slice(&endian.write_u32(value));
    Some(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A single byte. Endianness has no effect on a one-byte field, but the
/// newtype keeps it symmetric with [`ElfHalfWord`] and [`ElfWord`].
pub struct ElfByte(pub u8);

impl<R> FromReader<R> for ElfByte
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, _endian: Endian) -> Result<Self, Self::Error> {
        let mut buf = [0u8; size_of::<RawElfByte>()];
        reader.read_exact(&mut buf).map_err(Error::io)?;
        Ok(ElfByte(buf[0]))
    }
}

impl<W> ToWriter<W> for ElfByte
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, _endian: Endian) -> Result<(), Self::Error> {
        writer.write_all(&[self.0]).map_err(Error::io)
    }
}

impl HasWrittenSize for ElfByte {
    const SIZE: usize = size_of::<RawElfByte>();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A half-word (`Elf32_Half`): section indices, `e_type`, `e_machine`, and symbol/relocation counts.
pub struct ElfHalfWord(pub RawElfHalfWord);

impl<R> FromReader<R> for ElfHalfWord
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        let mut buf = [0u8; size_of::<RawElfHalfWord>()];
        reader.read_exact(&mut buf).map_err(Error::io)?;
        Ok(ElfHalfWord(read_u16_at(&buf, 0, endian).ok_or(Error::Truncated)?))
    }
}

impl<W> ToWriter<W> for ElfHalfWord
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        writer.write_all(&endian.write_u16(self.0)).map_err(Error::io)
    }
}

impl HasWrittenSize for ElfHalfWord {
    const SIZE: usize = size_of::<RawElfHalfWord>();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A word (`Elf32_Word`, also used to represent `Elf32_Addr` and `Elf32_Off`).
pub struct ElfWord(pub RawElfWord);

impl<R> FromReader<R> for ElfWord
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        let mut buf = [0u8; size_of::<RawElfWord>()];
        reader.read_exact(&mut buf).map_err(Error::io)?;
        Ok(ElfWord(read_u32_at(&buf, 0, endian).ok_or(Error::Truncated)?))
    }
}

impl<W> ToWriter<W> for ElfWord
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        writer.write_all(&endian.write_u32(self.0)).map_err(Error::io)
    }
}

impl HasWrittenSize for ElfWord {
    const SIZE: usize = size_of::<RawElfWord>();
}

impl From<ElfWord> for u32 {
    fn from(value: ElfWord) -> Self {
        value.0
    }
}

impl From<u32> for ElfWord {
    fn from(value: u32) -> Self {
        ElfWord(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A signed word (`Elf32_Sword`), used for relocation addends.
pub struct ElfSignedWord(pub RawElfSignedWord);

impl<R> FromReader<R> for ElfSignedWord
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R, endian: Endian) -> Result<Self, Self::Error> {
        let word = ElfWord::from_reader(reader, endian)?;
        Ok(ElfSignedWord(word.0 as RawElfSignedWord))
    }
}

impl<W> ToWriter<W> for ElfSignedWord
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W, endian: Endian) -> Result<(), Self::Error> {
        ElfWord(self.0 as RawElfWord).to_writer(writer, endian)
    }
}

impl HasWrittenSize for ElfSignedWord {
    const SIZE: usize = size_of::<RawElfSignedWord>();
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn half_word_round_trips_both_orders() {
        for endian in [Endian::Little, Endian::Big] {
            let mut bytes = Vec::new();
            ElfHalfWord(0xBEEF).to_writer(&mut bytes, endian).unwrap();
            let mut cursor = Cursor::new(bytes);
            let back = ElfHalfWord::from_reader(&mut cursor, endian).unwrap();
            assert_eq!(back, ElfHalfWord(0xBEEF));
        }
    }

    #[test]
    fn little_and_big_endian_word_bytes_differ() {
        let mut le = Vec::new();
        let mut be = Vec::new();
        ElfWord(0x0102_0304).to_writer(&mut le, Endian::Little).unwrap();
        ElfWord(0x0102_0304).to_writer(&mut be, Endian::Big).unwrap();
        assert_eq!(le, vec![0x04, 0x03, 0x02, 0x01]);
        assert_eq!(be, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn read_u32_at_rejects_short_buffers() {
        assert_eq!(read_u32_at(&[1, 2, 3], 0, Endian::Little), None);
    }
}
