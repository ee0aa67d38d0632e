//! The fatal error hierarchy and the non-fatal diagnostics sink.
//!
//! Four severities are recognized (spec §7): `info`/`warning` never stop the
//! run, `error` is recorded but processing continues for the remainder of
//! the current phase where safe (an unresolved relocation is the
//! canonical example), and `fatal` aborts immediately via `?` and
//! [`LinkError`].

use std::path::PathBuf;

use log::{info, warn};

/// Exit codes, matching the names used throughout spec §6.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// A required command-line argument was missing.
    NoParam = 1,
    /// An input or output file could not be opened.
    NoFile = 2,
    /// An input was not a well-formed ELF32 `ET_REL` object.
    BadFile = 3,
    /// A heap allocation failed.
    NoMem = 4,
    /// Two same-named sections disagreed on type, flags, or alignment.
    BadSection = 5,
    /// A configuration value (CLI argument) was malformed.
    BadParam = 6,
}

#[derive(thiserror::Error, Debug)]
/// A fatal condition. Every variant aborts the link immediately.
pub enum LinkError {
    #[error("{path}: {source}")]
    /// A read, write, seek, or open syscall failed.
    Io {
        /// The file the failing operation was on, if known.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected end of data while decoding an ELF field")]
    /// A multi-byte field could not be read because the buffer or stream ran out.
    Truncated,

    #[error("{path}: not an ELF file (bad magic)")]
    /// `e_ident[EI_MAG0..4]` was not `0x7F 'E' 'L' 'F'`.
    BadMagic {
        /// The offending input path.
        path: PathBuf,
    },

    #[error("{path}: not a 32-bit ELF object")]
    /// `e_ident[EI_CLASS]` was not `ELFCLASS32`.
    NotElf32 {
        /// The offending input path.
        path: PathBuf,
    },

    #[error("{path}: not a relocatable object file (ET_REL)")]
    /// `e_type` was not `ET_REL`.
    NotRelocatable {
        /// The offending input path.
        path: PathBuf,
    },

    #[error(
        "section {name} in {file_b} conflicts with the same-named section already merged from {file_a}"
    )]
    /// Two input sections sharing a name disagreed on `sh_type`, `sh_flags`, or `sh_addralign`.
    SectionConflict {
        /// The section name both inputs share.
        name: String,
        /// The file whose section established the merged section's type/flags/alignment.
        file_a: PathBuf,
        /// The file whose section did not match.
        file_b: PathBuf,
    },

    #[error("no input files given")]
    /// The configuration named zero input object files.
    NoInputs,

    #[error("invalid value {value:?} for {what}")]
    /// A configuration value (e.g. `--section` spec, alignment) failed to parse.
    BadParam {
        /// Which configuration field was malformed.
        what: &'static str,
        /// The raw text that failed to parse.
        value: String,
    },
}

impl LinkError {
    /// Translate this error into the process exit code it corresponds to.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            LinkError::Io { .. } => ExitCode::NoFile,
            LinkError::Truncated
            | LinkError::BadMagic { .. }
            | LinkError::NotElf32 { .. }
            | LinkError::NotRelocatable { .. } => ExitCode::BadFile,
            LinkError::SectionConflict { .. } => ExitCode::BadSection,
            LinkError::NoInputs => ExitCode::NoParam,
            LinkError::BadParam { .. } => ExitCode::BadParam,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LinkError {
        let path = path.into();
        move |source| LinkError::Io { path, source }
    }
}

/// A lightweight, path-free I/O error conversion for use deep inside
/// decoders that don't carry a path (the path is attached higher up the
/// call stack, where the offending input is known).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    /// Wraps a raw `std::io::Error` encountered while decoding a primitive field.
    Io(#[from] std::io::Error),
    #[error("unexpected end of data while decoding an ELF field")]
    /// A fixed-size field ran past the end of its source.
    Truncated,
}

impl Error {
    pub(crate) fn io(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for LinkError {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(source) => LinkError::Io {
                path: PathBuf::new(),
                source,
            },
            Error::Truncated => LinkError::Truncated,
        }
    }
}

#[derive(Debug, Default)]
/// Accumulates non-fatal diagnostics over the course of a single link.
///
/// Each entry is also emitted immediately through the `log` crate (`warn!`
/// for warnings, `error!` for errors) so it's visible as it happens and
/// subject to the normal `RUST_LOG`/`-v` verbosity filter; this struct's job
/// is only to answer "did anything go wrong" once the run is over, since
/// spec scenario 3 requires the process to exit non-zero even though the
/// output file is still produced.
pub struct Diagnostics {
    warnings: usize,
    errors: usize,
}

impl Diagnostics {
    /// Record and log a warning-severity diagnostic.
    pub fn warn(&mut self, message: impl std::fmt::Display) {
        self.warnings += 1;
        warn!("{message}");
    }

    /// Record and log an error-severity diagnostic.
    pub fn error(&mut self, message: impl std::fmt::Display) {
        self.errors += 1;
        log::error!("{message}");
    }

    /// Record and log an info-severity diagnostic.
    pub fn info(&mut self, message: impl std::fmt::Display) {
        info!("{message}");
    }

    /// Number of error-severity diagnostics recorded so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Number of warning-severity diagnostics recorded so far.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// The process exit code implied by what's been recorded: `0` if no
    /// errors were recorded, `1` otherwise. Does not account for fatal
    /// errors, which bypass this type entirely via `LinkError`.
    pub fn exit_code(&self) -> i32 {
        if self.errors == 0 {
            0
        } else {
            1
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clean_run_exits_zero() {
        let diag = Diagnostics::default();
        assert_eq!(diag.exit_code(), 0);
    }

    #[test]
    fn recorded_error_exits_nonzero() {
        let mut diag = Diagnostics::default();
        diag.warn("cosmetic");
        assert_eq!(diag.exit_code(), 0);
        diag.error("undefined symbol");
        assert_eq!(diag.exit_code(), 1);
        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn exit_codes_match_spec_categories() {
        assert_eq!(LinkError::NoInputs.exit_code(), ExitCode::NoParam);
        assert_eq!(
            LinkError::BadMagic { path: "a.o".into() }.exit_code(),
            ExitCode::BadFile
        );
        assert_eq!(
            LinkError::SectionConflict {
                name: ".rodata".into(),
                file_a: "a.o".into(),
                file_b: "b.o".into(),
            }
            .exit_code(),
            ExitCode::BadSection
        );
    }
}
