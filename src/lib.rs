//! `rvld` links one or more RV32 ELF relocatable object files into a single
//! statically-linked RV32 ELF executable.
//!
//! The crate is organized the way the linker actually works, leaves first:
//!
//! - [`base`] — raw on-disk integer types and endianness-aware read/write helpers.
//! - [`error`] — the fatal error hierarchy and non-fatal diagnostics sink.
//! - [`header`] — ELF header, section header, program header, symbol and
//!   relocation record definitions (C1's data shapes).
//! - [`strtab`] — the insertion-ordered string interner (C2).
//! - [`object`] — parses a single input object file (C1).
//! - [`merge`] — groups same-named input sections into merged output sections (C3).
//! - [`layout`] — assigns virtual addresses and padding to merged sections (C4).
//! - [`symtab`] — the global symbol table and name resolution (C5).
//! - [`arch`] — RISC-V relocation bit-field encoding (part of C7).
//! - [`relocate`] — walks `SHT_RELA` sections and patches the output file (C7).
//! - [`writer`] — emits the final ELF executable (C6).
//! - [`config`] — the linker's configuration surface (§6).
//! - [`linker`] — orchestrates the phases above into [`linker::link`].

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod arch;
pub mod base;
pub mod config;
pub mod error;
pub mod header;
pub mod layout;
pub mod linker;
pub mod merge;
pub mod object;
pub mod relocate;
pub mod strtab;
pub mod symtab;
pub mod writer;

pub use config::Configuration;
pub use error::{Diagnostics, LinkError};
pub use linker::link;

use std::io::{Read, Seek, Write};

/// Decode an instance of a type from a reader, given the byte order the
/// source file was written in.
///
/// Unlike the upstream ELF-parsing crate this one started from, endianness is
/// a runtime [`base::Endian`] value rather than a const generic parameter:
/// a single linker run may read input files of differing endianness (only
/// the *output*'s endianness is fixed, by the first input opened), so the
/// merged, non-generic [`object::InputObject`] et al. need a value they can
/// carry around rather than a type they'd have to be generic over. See
/// `DESIGN.md` for the full rationale.
pub trait FromReader<R>
where
    R: Read + Seek,
    Self: Sized,
{
    /// The error type produced by a failed decode
    type Error;

    /// Decode an instance of this type from `reader`, whose bytes are encoded
    /// in `endian` order.
    fn from_reader(reader: &mut R, endian: base::Endian) -> Result<Self, Self::Error>;
}

/// Encode an instance of a type to a writer in a given byte order.
pub trait ToWriter<W>
where
    W: Write,
    Self: Sized,
{
    /// The error type produced by a failed encode
    type Error;

    /// Encode an instance of this type to `writer` in `endian` order.
    fn to_writer(&self, writer: &mut W, endian: base::Endian) -> Result<(), Self::Error>;
}

/// A type which always has a known size when written to a writer.
pub trait HasWrittenSize {
    /// The size, in bytes, of this type's on-disk representation.
    const SIZE: usize;
}
