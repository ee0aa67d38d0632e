//! The linker's configuration surface (spec §3, §6): input paths, the
//! output path, the entry symbol name, segment alignment, and the
//! pre-declared `(section-name, base-virtual-address)` layout.

use std::{path::PathBuf, str::FromStr};

use typed_builder::TypedBuilder;

use crate::error::LinkError;

/// Default segment (and therefore minimum section) alignment: a typical
/// page size.
pub const DEFAULT_SEGMENT_ALIGNMENT: u32 = 0x1000;
/// Default entry symbol name, looked up if `--entry` is not given.
pub const DEFAULT_ENTRY_LABEL: &str = "_start";
/// Default output file name.
pub const DEFAULT_OUTPUT_PATH: &str = "a.out";

#[derive(Debug, Clone, PartialEq, Eq)]
/// One `name=virtual_address` pair pre-declaring a section's base address
/// (spec §3's `Configuration.sections`).
pub struct SectionSpec {
    /// The section name, e.g. `.text`.
    pub name: String,
    /// The virtual address this section's first byte should be mapped at.
    pub address: u32,
}

impl FromStr for SectionSpec {
    type Err = LinkError;

    /// Parses `NAME=ADDR`, where `ADDR` may be hexadecimal (`0x...`),
    /// octal (`0...`), or decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, addr) = s.split_once('=').ok_or_else(|| LinkError::BadParam {
            what: "--section",
            value: s.to_string(),
        })?;
        if name.is_empty() {
            return Err(LinkError::BadParam {
                what: "--section",
                value: s.to_string(),
            });
        }
        let address = parse_address(addr).ok_or_else(|| LinkError::BadParam {
            what: "--section",
            value: s.to_string(),
        })?;
        Ok(SectionSpec {
            name: name.to_string(),
            address,
        })
    }
}

fn parse_address(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u32::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}

#[derive(Debug, Clone, TypedBuilder)]
/// The fully-resolved configuration for one link invocation.
pub struct Configuration {
    /// Input object file paths, in link order.
    #[builder(setter(into))]
    pub input_paths: Vec<PathBuf>,

    /// Where to write the linked executable.
    #[builder(default = PathBuf::from(DEFAULT_OUTPUT_PATH), setter(into))]
    pub output_path: PathBuf,

    /// The symbol whose final address becomes `e_entry`.
    #[builder(default = DEFAULT_ENTRY_LABEL.to_string(), setter(into))]
    pub entry_label: String,

    /// Segment (and minimum allocatable-section) alignment.
    #[builder(default = DEFAULT_SEGMENT_ALIGNMENT)]
    pub segment_alignment: u32,

    /// Pre-declared `(name, base-virtual-address)` pairs, in configuration
    /// order; merged sections not named here are appended in first-seen
    /// order (spec §3's ordering invariant).
    #[builder(default, setter(into))]
    pub sections: Vec<SectionSpec>,
}

impl Configuration {
    /// Validate the configuration, failing fast with a `NoParam`/`BadParam`
    /// [`LinkError`] before any file I/O is attempted.
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.input_paths.is_empty() {
            return Err(LinkError::NoInputs);
        }
        if self.segment_alignment == 0 || !self.segment_alignment.is_power_of_two() {
            return Err(LinkError::BadParam {
                what: "--segment-align",
                value: self.segment_alignment.to_string(),
            });
        }
        Ok(())
    }

    /// The pre-declared virtual address for `section_name`, if configured.
    pub fn configured_address(&self, section_name: &str) -> Option<u32> {
        self.sections
            .iter()
            .find(|s| s.name == section_name)
            .map(|s| s.address)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn section_spec_parses_hex_address() {
        let spec: SectionSpec = ".text=0x400000".parse().unwrap();
        assert_eq!(spec.name, ".text");
        assert_eq!(spec.address, 0x400000);
    }

    #[test]
    fn section_spec_parses_decimal_address() {
        let spec: SectionSpec = ".data=65536".parse().unwrap();
        assert_eq!(spec.address, 65536);
    }

    #[test]
    fn section_spec_rejects_missing_equals() {
        assert!("badspec".parse::<SectionSpec>().is_err());
    }

    #[test]
    fn empty_inputs_fail_validation() {
        let config = Configuration::builder().input_paths(Vec::new()).build();
        assert!(matches!(config.validate(), Err(LinkError::NoInputs)));
    }

    #[test]
    fn defaults_match_spec() {
        let config = Configuration::builder()
            .input_paths(vec![PathBuf::from("a.o")])
            .build();
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(config.entry_label, DEFAULT_ENTRY_LABEL);
        assert_eq!(config.segment_alignment, DEFAULT_SEGMENT_ALIGNMENT);
    }

    #[test]
    fn non_power_of_two_alignment_is_rejected() {
        let config = Configuration::builder()
            .input_paths(vec![PathBuf::from("a.o")])
            .segment_alignment(3)
            .build();
        assert!(matches!(config.validate(), Err(LinkError::BadParam { .. })));
    }
}
