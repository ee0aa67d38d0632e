//! Parses a single input relocatable object file: its ELF header, the
//! `InputSection`s derived from its section header table, and (once C5 has
//! run over it) the `InputSymbol`s from its designated symbol table (C1).

use std::{
    cell::{Ref, RefCell},
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::warn;

use crate::{
    base::Endian,
    error::LinkError,
    header::{
        elf::{has_valid_magic, ElfHeader, ElfMachine, ElfType},
        identification::ElfClass,
        section::{Elf32SectionHeader, SectionFlags, SectionHeaderType},
        symbol::Elf32Sym,
    },
    FromReader,
};

/// Any stream an [`InputObject`] can read its section contents from. Real
/// runs use an open [`File`]; tests substitute an in-memory buffer.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

static EMPTY_BYTES: Vec<u8> = Vec::new();

/// One input section: an `Elf32_Shdr` plus the linker's own bookkeeping.
/// Contents are read from the owning object's stream on first use and
/// cached afterward (spec §3, §4.1).
#[derive(Debug)]
pub struct InputSection {
    /// The section's on-disk header, verbatim.
    pub header: Elf32SectionHeader,
    /// The section's name, resolved via the section-header string table.
    pub name: String,
    /// `sh_size / sh_entsize` if `sh_entsize > 0`, else `sh_size`.
    pub element_count: u32,
    /// Index of this section's `MergedSection` in the linker's
    /// `merged_sections`, once assigned by C3.
    pub merged: Option<usize>,
    /// Byte offset of this section's contribution within its merged section.
    pub translation_offset: u32,
    /// This section's position in its merged section's child list.
    pub index_within_merged: usize,
    buffer: RefCell<Option<Vec<u8>>>,
}

impl InputSection {
    pub(crate) fn new(header: Elf32SectionHeader, name: String) -> Self {
        let element_count = header.element_count();
        Self {
            header,
            name,
            element_count,
            merged: None,
            translation_offset: 0,
            index_within_merged: 0,
            buffer: RefCell::new(None),
        }
    }

    /// Whether this section type is one C3 merges (`SHT_PROGBITS` or `SHT_NOBITS`).
    pub fn is_mergeable(&self) -> bool {
        matches!(
            self.header.kind(),
            Some(SectionHeaderType::ProgBits) | Some(SectionHeaderType::NoBits)
        )
    }
}

/// One `Elf32_Sym` entry belonging to an object's designated symbol table,
/// plus the bookkeeping C5 attaches to it.
#[derive(Debug, Clone)]
pub struct InputSymbol {
    /// The symbol record, verbatim as read from the object.
    pub sym: Elf32Sym,
    /// The symbol's name, resolved via the symbol string table.
    pub name: String,
    /// 1-based index into the global symbol table once this symbol has
    /// been entered or resolved there; `0` means "not yet entered" and is
    /// reserved as the undefined/null sentinel (spec §3).
    pub global_index: u32,
}

/// One parsed input relocatable object file.
pub struct InputObject {
    /// The file this object was read from.
    pub path: PathBuf,
    /// The byte order this file's multi-byte fields are encoded in.
    pub endian: Endian,
    /// The parsed ELF file header.
    pub header: ElfHeader,
    /// Every section in `e_shnum` order, index 0 being the reserved null section.
    pub sections: Vec<InputSection>,
    /// Index into `sections` of this object's designated symbol table, if any.
    pub symtab_section: Option<usize>,
    /// This object's symbols, read from `symtab_section` once C5 processes it.
    pub symbols: Vec<InputSymbol>,
    pub(crate) stream: RefCell<Box<dyn ReadSeek>>,
}

impl InputObject {
    /// This object's raw section bytes at `index`, reading them from the
    /// underlying stream on first use.
    pub fn section_bytes(&self, index: usize) -> Result<Ref<'_, Vec<u8>>, LinkError> {
        let section = self
            .sections
            .get(index)
            .ok_or_else(|| LinkError::Truncated)?;

        if section.buffer.borrow().is_none() {
            let sh = &section.header;
            let mut buf = vec![0u8; sh.size as usize];
            if sh.kind() != Some(SectionHeaderType::NoBits) && sh.size > 0 {
                let mut stream = self.stream.borrow_mut();
                stream
                    .seek(SeekFrom::Start(sh.offset as u64))
                    .map_err(LinkError::io(self.path.clone()))?;
                stream
                    .read_exact(&mut buf)
                    .map_err(LinkError::io(self.path.clone()))?;
            }
            *section.buffer.borrow_mut() = Some(buf);
        }

        Ok(Ref::map(section.buffer.borrow(), |opt| match opt {
            Some(v) => v,
            None => &EMPTY_BYTES,
        }))
    }
}

pub(crate) fn cstr_at(buf: &[u8], offset: usize) -> String {
    let bytes = buf.get(offset..).unwrap_or(&[]);
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn read_section_headers(
    stream: &mut dyn ReadSeek,
    header: &ElfHeader,
    endian: Endian,
    path: &Path,
) -> Result<Vec<Elf32SectionHeader>, LinkError> {
    let mut headers = Vec::with_capacity(header.shnum as usize);
    for i in 0..header.shnum {
        stream
            .seek(SeekFrom::Start(
                header.shoff as u64 + (i as u64 * Elf32SectionHeader::SIZE as u64),
            ))
            .map_err(LinkError::io(path.to_path_buf()))?;
        headers.push(
            Elf32SectionHeader::from_reader(stream, endian).map_err(|_| LinkError::Truncated)?,
        );
    }
    Ok(headers)
}

/// Open and parse `path` as an input relocatable object file.
///
/// Validates `e_ident` magic, `EI_CLASS == ELFCLASS32`, and
/// `e_type == ET_REL`, failing with [`LinkError::BadMagic`],
/// [`LinkError::NotElf32`], or [`LinkError::NotRelocatable`] respectively
/// (spec §4.1). Does not merge sections or resolve symbols; the caller
/// drives that via [`crate::merge`] and [`crate::symtab`] once every input
/// has been read, so that a section-merge conflict or duplicate-symtab
/// warning can name the correct pair of files.
pub fn read_object(path: &Path) -> Result<InputObject, LinkError> {
    use crate::header::identification::ElfHeaderIdentifier;

    let mut file = File::open(path).map_err(LinkError::io(path.to_path_buf()))?;

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(LinkError::io(path.to_path_buf()))?;
    if !has_valid_magic(&magic) {
        return Err(LinkError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    file.seek(SeekFrom::Start(0))
        .map_err(LinkError::io(path.to_path_buf()))?;

    let ident = ElfHeaderIdentifier::from_reader(&mut file, Endian::host())
        .map_err(|_| LinkError::BadMagic {
            path: path.to_path_buf(),
        })?;
    if ident.class != ElfClass::Elf32 {
        return Err(LinkError::NotElf32 {
            path: path.to_path_buf(),
        });
    }
    let endian: Option<Endian> = ident.data_encoding.into();
    let endian = endian.ok_or_else(|| LinkError::NotElf32 {
        path: path.to_path_buf(),
    })?;

    file.seek(SeekFrom::Start(0))
        .map_err(LinkError::io(path.to_path_buf()))?;
    let header =
        ElfHeader::from_reader(&mut file, endian).map_err(|_| LinkError::BadMagic {
            path: path.to_path_buf(),
        })?;
    if header.ty != ElfType::Relocatable {
        return Err(LinkError::NotRelocatable {
            path: path.to_path_buf(),
        });
    }
    if header.machine != ElfMachine::Riscv {
        warn!(
            "{}: e_machine is not EM_RISCV; relocations targeting this file may be misinterpreted",
            path.display()
        );
    }

    let mut boxed: Box<dyn ReadSeek> = Box::new(file);
    let headers = read_section_headers(boxed.as_mut(), &header, endian, path)?;

    let shstrtab_index = header.shstrndx as usize;
    let shstrtab_bytes = if let Some(shstrtab_header) = headers.get(shstrtab_index) {
        if shstrtab_header.kind() != Some(SectionHeaderType::StrTab) {
            warn!(
                "{}: section at e_shstrndx ({shstrtab_index}) is not SHT_STRTAB",
                path.display()
            );
        }
        let mut buf = vec![0u8; shstrtab_header.size as usize];
        if shstrtab_header.size > 0 {
            boxed
                .seek(SeekFrom::Start(shstrtab_header.offset as u64))
                .map_err(LinkError::io(path.to_path_buf()))?;
            boxed
                .read_exact(&mut buf)
                .map_err(LinkError::io(path.to_path_buf()))?;
        }
        buf
    } else {
        Vec::new()
    };

    let mut sections = Vec::with_capacity(headers.len());
    let mut symtab_section = None;
    for (idx, sh) in headers.into_iter().enumerate() {
        let name = cstr_at(&shstrtab_bytes, sh.name as usize);
        if sh.kind() == Some(SectionHeaderType::SymTab) {
            if symtab_section.is_some() {
                warn!(
                    "{}: duplicate SHT_SYMTAB section at index {idx}; keeping the first one",
                    path.display()
                );
            } else {
                if !sh.section_flags().contains(SectionFlags::INFO_LINK) {
                    warn!(
                        "{}: SHT_SYMTAB section at index {idx} is missing SHF_INFO_LINK",
                        path.display()
                    );
                }
                symtab_section = Some(idx);
            }
        }
        sections.push(InputSection::new(sh, name));
    }

    Ok(InputObject {
        path: path.to_path_buf(),
        endian,
        header,
        sections,
        symtab_section,
        symbols: Vec::new(),
        stream: RefCell::new(boxed),
    })
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cstr_at_stops_at_nul() {
        let buf = b"\0.text\0.data\0";
        assert_eq!(cstr_at(buf, 1), ".text");
        assert_eq!(cstr_at(buf, 7), ".data");
    }

    #[test]
    fn cstr_at_out_of_range_is_empty() {
        let buf = b"\0abc\0";
        assert_eq!(cstr_at(buf, 100), "");
    }

    #[test]
    fn missing_file_is_a_link_error() {
        let err = read_object(Path::new("/nonexistent/path/to/object.o")).unwrap_err();
        assert!(matches!(err, LinkError::Io { .. }));
    }
}
