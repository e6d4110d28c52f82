// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Listing file generation.

use std::io::Write;

use crate::program::{ByteRecord, CompiledProgram, Section};

/// Writer for listing file output.
pub struct ListingWriter<W: Write> {
    out: W,
}

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn header(&mut self, title: &str) -> std::io::Result<()> {
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "ADDR    BYTES                    COMMENT")?;
        writeln!(self.out, "------  -----------------------  -------")?;
        Ok(())
    }

    /// Write every section, one row per statement-sized chunk of bytes.
    pub fn write_program(&mut self, program: &CompiledProgram) -> std::io::Result<()> {
        for section in &program.sections {
            if section.bytes.is_empty() {
                continue;
            }
            self.write_section(section)?;
        }
        Ok(())
    }

    fn write_section(&mut self, section: &Section) -> std::io::Result<()> {
        writeln!(
            self.out,
            "\n; section {} ({}) base {:04X}",
            section.name,
            section.kind.as_str(),
            section.base
        )?;
        for chunk in chunk_records(&section.bytes) {
            let bytes: Vec<u8> = chunk.iter().map(|rec| rec.value).collect();
            let comment = chunk
                .iter()
                .find_map(|rec| rec.comment.as_deref())
                .map(|text| format!("; {text}"))
                .unwrap_or_default();
            writeln!(
                self.out,
                "{:04X}    {:<23}  {}",
                chunk[0].address,
                format_bytes(&bytes),
                comment
            )?;
        }
        Ok(())
    }

    pub fn footer(&mut self, program: &CompiledProgram) -> std::io::Result<()> {
        writeln!(
            self.out,
            "\nErrors: {}  Warnings: {}",
            program.error_count(),
            program.warning_count()
        )?;
        writeln!(self.out, "\nSYMBOL TABLE\n")?;
        for entry in program.labels.entries() {
            writeln!(
                self.out,
                "{:<16}: {:04x} ({})",
                entry.name,
                entry.address,
                entry.resolved_value()
            )?;
        }
        let total: usize = program.sections.iter().map(|s| s.bytes.len()).sum();
        writeln!(self.out, "\nTotal memory is {} bytes", total)?;
        Ok(())
    }
}

/// Group records into display rows: a new row starts at each opcode byte, at
/// an address gap, and every 8 bytes.
fn chunk_records(records: &[ByteRecord]) -> Vec<&[ByteRecord]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for idx in 1..=records.len() {
        let split = match records.get(idx) {
            Some(rec) => {
                rec.is_opcode
                    || rec.address != records[idx - 1].address + 1
                    || idx - start >= 8
            }
            None => true,
        };
        if split {
            chunks.push(&records[start..idx]);
            start = idx;
        }
    }
    chunks
}

/// Format bytes as hex string for listing.
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{format_bytes, ListingWriter};
    use crate::arch::demo::demo_architecture;
    use crate::compiler::compile;

    #[test]
    fn format_bytes_is_space_separated_hex() {
        assert_eq!(format_bytes(&[0x14, 0x05]), "14 05");
        assert_eq!(format_bytes(&[]), "");
    }

    #[test]
    fn listing_shows_addresses_bytes_and_comments() {
        let arch = demo_architecture();
        let program = compile(&arch, "MOV A, 5 ; load accumulator\nHLT\n");
        let mut out = Vec::new();
        let mut listing = ListingWriter::new(&mut out);
        listing.header("retasm listing").unwrap();
        listing.write_program(&program).unwrap();
        listing.footer(&program).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("0000    14 05"));
        assert!(text.contains("; load accumulator"));
        assert!(text.contains("0002    00"));
        assert!(text.contains("Total memory is 3 bytes"));
    }

    #[test]
    fn listing_separates_sections() {
        let arch = demo_architecture();
        let program = compile(&arch, "HLT\n.DATA\nX DB 1, 2\n");
        let mut out = Vec::new();
        let mut listing = ListingWriter::new(&mut out);
        listing.write_program(&program).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("; section code (code) base 0000"));
        assert!(text.contains("; section data (data) base 0001"));
    }
}
