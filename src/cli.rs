// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and run orchestration.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;

use crate::arch::demo::demo_architecture;
use crate::arch::json::architecture_from_file;
use crate::arch::ArchitectureDescription;
use crate::compiler::compile;
use crate::diagnostics::{AsmError, AsmErrorKind, Diagnostic};
use crate::image::MemoryImage;
use crate::listing::ListingWriter;
use crate::program::CompiledProgram;

pub const VERSION: &str = "0.1";

const LONG_ABOUT: &str = "Retargetable table-driven two-pass assembler.

The target CPU is a data description: pass --arch with a JSON file to
assemble for any register/instruction table, or omit it for the built-in
demo8 architecture. Outputs are opt-in: specify -l/--list, -x/--hex,
-b/--bin, or --labels. Use -o/--outfile to set the output base name when
filenames are omitted.";

#[derive(Parser, Debug)]
#[command(
    name = "retasm",
    version = VERSION,
    about = "Retargetable table-driven two-pass assembler",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(value_name = "FILE", required = true, help = "Input assembly file(s)")]
    pub infiles: Vec<PathBuf>,
    #[arg(
        long = "arch",
        value_name = "FILE",
        long_help = "JSON architecture description. Defaults to the built-in demo8 architecture."
    )]
    pub arch: Option<PathBuf>,
    #[arg(
        short = 'l',
        long = "list",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit a listing file. FILE is optional; when omitted, the output base is used and a .lst extension is added."
    )]
    pub list_name: Option<String>,
    #[arg(
        short = 'x',
        long = "hex",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit an Intel Hex file. FILE is optional; when omitted, the output base is used and a .hex extension is added."
    )]
    pub hex_name: Option<String>,
    #[arg(
        short = 'b',
        long = "bin",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit a binary image spanning the emitted output. FILE is optional; when omitted, the output base is used and a .bin extension is added."
    )]
    pub bin_name: Option<String>,
    #[arg(
        long = "labels",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit the label table as JSON. FILE is optional; when omitted, the output base is used and a .json extension is added."
    )]
    pub labels_name: Option<String>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "BASE",
        long_help = "Output filename base when -l/-x/-b/--labels omit filenames. Defaults to the input base."
    )]
    pub outfile: Option<String>,
    #[arg(
        short = 'f',
        long = "fill",
        value_name = "hh",
        long_help = "Fill byte for binary output (2 hex digits). Defaults to FF."
    )]
    pub fill_byte: Option<String>,
    #[arg(
        short = 'g',
        long = "go",
        value_name = "aaaa",
        long_help = "Set execution start address (4 hex digits). Adds a Start Segment Address record to hex output. Requires hex output."
    )]
    pub go_addr: Option<String>,
}

pub fn is_valid_hex_4(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_valid_hex_2(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Report from one assembled input.
pub struct RunReport {
    name: String,
    diagnostics: Vec<Diagnostic>,
    source_lines: Vec<String>,
}

impl RunReport {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == crate::diagnostics::Severity::Error)
            .count()
    }
}

/// Error from a failed run.
#[derive(Debug)]
pub struct RunError {
    error: AsmError,
}

impl RunError {
    fn new(error: AsmError) -> Self {
        Self { error }
    }

    fn cli(msg: &str, param: Option<&str>) -> Self {
        Self::new(AsmError::new(AsmErrorKind::Cli, msg, param))
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunError {}

struct RunConfig {
    fill_byte: u8,
    go_addr: Option<u16>,
}

fn validate_cli(cli: &Cli) -> Result<RunConfig, RunError> {
    let fill_byte = match cli.fill_byte.as_deref() {
        None => 0xff,
        Some(text) if is_valid_hex_2(text) => {
            u8::from_str_radix(text, 16).map_err(|_| RunError::cli("Invalid fill byte", Some(text)))?
        }
        Some(text) => return Err(RunError::cli("Invalid fill byte", Some(text))),
    };

    let go_addr = match cli.go_addr.as_deref() {
        None => None,
        Some(text) if is_valid_hex_4(text) => Some(
            u16::from_str_radix(text, 16)
                .map_err(|_| RunError::cli("Invalid start address", Some(text)))?,
        ),
        Some(text) => return Err(RunError::cli("Invalid start address", Some(text))),
    };
    if go_addr.is_some() && cli.hex_name.is_none() {
        return Err(RunError::cli("-g/--go requires hex output", None));
    }

    if cli.infiles.len() > 1 && cli.outfile.is_some() {
        return Err(RunError::cli(
            "-o/--outfile cannot be combined with multiple inputs",
            None,
        ));
    }

    Ok(RunConfig { fill_byte, go_addr })
}

/// Run the assembler with command-line arguments.
pub fn run() -> Result<Vec<RunReport>, RunError> {
    let cli = Cli::parse();
    let config = validate_cli(&cli)?;

    let arch = match &cli.arch {
        Some(path) => architecture_from_file(path)
            .map_err(|err| RunError::new(AsmError::new(AsmErrorKind::Arch, err.message(), None)))?,
        None => demo_architecture(),
    };

    let mut reports = Vec::new();
    for path in &cli.infiles {
        reports.push(run_one(&cli, &config, &arch, path)?);
    }
    Ok(reports)
}

fn run_one(
    cli: &Cli,
    config: &RunConfig,
    arch: &ArchitectureDescription,
    path: &Path,
) -> Result<RunReport, RunError> {
    let source = fs::read_to_string(path).map_err(|err| {
        RunError::new(AsmError::new(
            AsmErrorKind::Io,
            &format!("read {}: {err}", path.display()),
            None,
        ))
    })?;
    let source_lines: Vec<String> = source.lines().map(|line| line.to_string()).collect();

    let base = output_base(cli, path)?;
    let program = compile(arch, &source);
    let image = MemoryImage::from_program(&program);

    if let Some(out_path) = resolve_output_path(cli.list_name.as_deref(), &base, "lst") {
        let file = create_output(&out_path)?;
        let title = format!("retasm v{VERSION} - {} - {}", arch.name(), path.display());
        write_listing(file, &title, &program).map_err(|err| io_error(&out_path, err))?;
    }

    if let Some(out_path) = resolve_output_path(cli.hex_name.as_deref(), &base, "hex") {
        let mut file = create_output(&out_path)?;
        image
            .write_hex_file(&mut file, config.go_addr)
            .map_err(|err| io_error(&out_path, err))?;
    }

    if let Some(out_path) = resolve_output_path(cli.bin_name.as_deref(), &base, "bin") {
        if let Some((start, end)) = image.output_range() {
            let mut file = create_output(&out_path)?;
            image
                .write_bin_file(&mut file, start, end, config.fill_byte)
                .map_err(|err| io_error(&out_path, err))?;
        }
    }

    if let Some(out_path) = resolve_output_path(cli.labels_name.as_deref(), &base, "json") {
        let payload = labels_payload(&program);
        fs::write(&out_path, payload).map_err(|err| io_error(&out_path, err))?;
    }

    Ok(RunReport {
        name: path.display().to_string(),
        diagnostics: program.diagnostics,
        source_lines,
    })
}

fn output_base(cli: &Cli, path: &Path) -> Result<String, RunError> {
    if let Some(base) = cli.outfile.as_deref() {
        return Ok(base.to_string());
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
        .ok_or_else(|| RunError::cli("Invalid input filename", None))
}

/// `None` means the output was not requested; an empty name means "derive
/// from the output base".
fn resolve_output_path(name: Option<&str>, base: &str, ext: &str) -> Option<PathBuf> {
    match name {
        None => None,
        Some("") => Some(PathBuf::from(format!("{base}.{ext}"))),
        Some(name) => {
            let path = PathBuf::from(name);
            if path.extension().is_some() {
                Some(path)
            } else {
                Some(PathBuf::from(format!("{name}.{ext}")))
            }
        }
    }
}

fn write_listing<W: std::io::Write>(
    out: W,
    title: &str,
    program: &CompiledProgram,
) -> std::io::Result<()> {
    let mut listing = ListingWriter::new(out);
    listing.header(title)?;
    listing.write_program(program)?;
    listing.footer(program)
}

fn create_output(path: &Path) -> Result<File, RunError> {
    File::create(path).map_err(|err| io_error(path, err))
}

fn io_error(path: &Path, err: std::io::Error) -> RunError {
    RunError::new(AsmError::new(
        AsmErrorKind::Io,
        &format!("write {}: {err}", path.display()),
        None,
    ))
}

/// Label table as JSON, sorted by name.
fn labels_payload(program: &CompiledProgram) -> String {
    let mut entries = program.labels.entries().to_vec();
    entries.sort_by(|left, right| {
        left.name
            .to_ascii_lowercase()
            .cmp(&right.name.to_ascii_lowercase())
    });

    let labels: Vec<serde_json::Value> = entries
        .into_iter()
        .map(|entry| {
            json!({
                "name": entry.name,
                "section": entry.section,
                "address": entry.address,
                "dataSize": entry.data_size,
                "values": entry.values,
            })
        })
        .collect();
    let payload = json!({
        "labels": labels,
        "entryPoint": program.entry_point,
    });
    format!("{payload}\n")
}
