//! ELF32 on-disk structures: the file header, section and program headers,
//! symbol table entries, and `RELA` relocation entries.

pub mod elf;
pub mod identification;
pub mod program;
pub mod relocation;
pub mod section;
pub mod symbol;

pub use elf::{ElfHeader, ElfMachine, ElfType};
pub use identification::{ElfClass, ElfDataEncoding, ElfHeaderIdentifier, ElfOsAbi};
pub use program::{Elf32ProgramHeader, ProgramFlags, ProgramHeaderType};
pub use relocation::{Elf32Rela, RelocationType};
pub use section::{Elf32SectionHeader, SectionFlags, SectionHeaderType};
pub use symbol::{Elf32Sym, SymbolBinding, SymbolType};
