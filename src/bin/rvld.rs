//! `rvld`: links one or more RV32 ELF relocatable object files into a
//! statically-linked RV32 ELF executable.

use std::path::PathBuf;
use std::process::ExitCode;

use structopt::StructOpt;

use rvld::config::SectionSpec;
use rvld::{link, Configuration};

#[derive(StructOpt, Debug)]
#[structopt(name = "rvld", about = "A static linker for RV32 ELF relocatable object files")]
struct CommandLine {
    /// Input relocatable object files, linked in the order given.
    #[structopt(name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Where to write the linked executable.
    #[structopt(short = "o", long = "output", default_value = "a.out")]
    output: PathBuf,

    /// The symbol whose final address becomes the entry point.
    #[structopt(long = "entry", default_value = "_start")]
    entry: String,

    /// Segment (and minimum allocatable-section) alignment.
    #[structopt(long = "segment-align", default_value = "4096", parse(try_from_str = parse_u32))]
    segment_align: u32,

    /// Pre-declare a section's base virtual address as NAME=ADDR. May be
    /// given more than once.
    #[structopt(long = "section", name = "NAME=ADDR")]
    sections: Vec<SectionSpec>,

    /// Increase log verbosity; may be repeated.
    #[structopt(short = "v", parse(from_occurrences))]
    verbosity: u8,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

fn main() -> ExitCode {
    let args = CommandLine::from_args();

    let level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    let config = Configuration::builder()
        .input_paths(args.inputs)
        .output_path(args.output)
        .entry_label(args.entry)
        .segment_alignment(args.segment_align)
        .sections(args.sections)
        .build();

    match link(&config) {
        Ok(diagnostics) => ExitCode::from(diagnostics.exit_code() as u8),
        Err(err) => {
            eprintln!("rvld: fatal: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
