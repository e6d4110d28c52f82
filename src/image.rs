// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Flattened memory image with hex/bin output helpers.

use std::io::{self, Write};

use crate::program::CompiledProgram;

/// Address-ordered view over every emitted byte of a program.
pub struct MemoryImage {
    entries: Vec<(u32, u8)>,
}

impl MemoryImage {
    #[must_use]
    pub fn from_program(program: &CompiledProgram) -> Self {
        Self {
            entries: program.flatten().into_iter().collect(),
        }
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowest and highest occupied address.
    #[must_use]
    pub fn output_range(&self) -> Option<(u32, u32)> {
        let first = self.entries.first()?;
        let last = self.entries.last()?;
        Some((first.0, last.0))
    }

    /// Write Intel hex records. Addresses must fit 16 bits; an optional
    /// `go_addr` adds a Start Segment Address record.
    pub fn write_hex_file<W: Write>(&self, mut out: W, go_addr: Option<u16>) -> io::Result<()> {
        let mut line_addr: u16 = 0;
        let mut line_bytes: u8 = 0;
        let mut checksum: u8 = 0;
        let mut hex_data = String::new();
        const LINE_LIMIT: usize = 32;

        for (ix, entry) in self.entries.iter().enumerate() {
            let addr = u16::try_from(entry.0).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Address beyond hex record range",
                )
            })?;
            let val = entry.1;
            if line_bytes == 0 {
                line_addr = addr;
                checksum = 0;
                hex_data.clear();
            }
            hex_data.push(hex_digit((val >> 4) & 0x0f));
            hex_data.push(hex_digit(val & 0x0f));
            checksum = checksum.wrapping_add(val);
            line_bytes = line_bytes.wrapping_add(1);

            let next_addr = if ix + 1 < self.entries.len() {
                self.entries[ix + 1].0
            } else {
                entry.0
            };

            if (line_bytes as usize) >= LINE_LIMIT || next_addr != entry.0.wrapping_add(1) {
                checksum = checksum.wrapping_add(line_bytes);
                checksum = checksum.wrapping_add((line_addr >> 8) as u8);
                checksum = checksum.wrapping_add((line_addr & 0xff) as u8);
                checksum = (!checksum).wrapping_add(1);
                writeln!(
                    out,
                    ":{:02X}{:04X}00{}{:02X}",
                    line_bytes, line_addr, hex_data, checksum
                )?;
                line_bytes = 0;
            }
        }

        if let Some(addr) = go_addr {
            let mut csum: u8 = 0;
            csum = csum.wrapping_add(4);
            csum = csum.wrapping_add(3);
            csum = csum.wrapping_add((addr >> 8) as u8);
            csum = csum.wrapping_add((addr & 0xff) as u8);
            csum = (!csum).wrapping_add(1);
            writeln!(out, ":040000030000{:04X}{:02X}", addr, csum)?;
        }

        writeln!(out, ":00000001FF")?;
        Ok(())
    }

    /// Write a raw binary covering `start..=end`, with `fill` in the gaps.
    pub fn write_bin_file<W: Write>(
        &self,
        mut out: W,
        start: u32,
        end: u32,
        fill: u8,
    ) -> io::Result<()> {
        if end < start {
            return Ok(());
        }
        let mut buf = vec![fill; (end - start + 1) as usize];
        for (addr, val) in &self.entries {
            if (start..=end).contains(addr) {
                buf[(addr - start) as usize] = *val;
            }
        }
        out.write_all(&buf)
    }
}

fn hex_digit(val: u8) -> char {
    match val {
        0..=9 => (b'0' + val) as char,
        _ => (b'A' + (val - 10)) as char,
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryImage;
    use crate::arch::demo::demo_architecture;
    use crate::compiler::compile;

    fn parse_hex_byte(s: &str) -> u8 {
        u8::from_str_radix(s, 16).unwrap()
    }

    fn verify_checksum(line: &str) {
        assert!(line.starts_with(':'), "record must start with ':'");
        let bytes = &line[1..];
        let len = parse_hex_byte(&bytes[0..2]) as usize;
        let addr_hi = parse_hex_byte(&bytes[2..4]);
        let addr_lo = parse_hex_byte(&bytes[4..6]);
        let rec_type = parse_hex_byte(&bytes[6..8]);
        let data_start = 8;
        let data_end = data_start + len * 2;
        let checksum = parse_hex_byte(&bytes[data_end..data_end + 2]);

        let mut sum: u8 = 0;
        sum = sum.wrapping_add(len as u8);
        sum = sum.wrapping_add(addr_hi);
        sum = sum.wrapping_add(addr_lo);
        sum = sum.wrapping_add(rec_type);
        for idx in (data_start..data_end).step_by(2) {
            let b = parse_hex_byte(&bytes[idx..idx + 2]);
            sum = sum.wrapping_add(b);
        }
        let expected = (!sum).wrapping_add(1);
        assert_eq!(checksum, expected, "checksum mismatch for {line}");
    }

    fn demo_image(source: &str) -> MemoryImage {
        let arch = demo_architecture();
        let program = compile(&arch, source);
        assert!(!program.has_errors());
        MemoryImage::from_program(&program)
    }

    #[test]
    fn writes_hex_records_with_valid_checksums() {
        let image = demo_image("MOV A, 1\nMOV B, 2\nHLT\n");
        let mut out = Vec::new();
        image.write_hex_file(&mut out, None).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.len() >= 2);
        for line in &lines {
            verify_checksum(line);
        }
        assert_eq!(lines.last().copied(), Some(":00000001FF"));
    }

    #[test]
    fn includes_start_segment_record_when_requested() {
        let image = demo_image("HLT\n");
        let mut out = Vec::new();
        image.write_hex_file(&mut out, Some(0x1234)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut has_start = false;
        for line in text.lines() {
            if line.starts_with(":04000003") {
                has_start = true;
                verify_checksum(line);
            }
        }
        assert!(has_start);
    }

    #[test]
    fn non_contiguous_addresses_split_records() {
        let image = demo_image("HLT\n.ORG 0x0100\nHLT\n");
        let mut out = Vec::new();
        image.write_hex_file(&mut out, None).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3); // two data records plus EOF
        assert!(text.contains(":01000000"));
        assert!(text.contains(":01010000"));
    }

    #[test]
    fn write_bin_respects_range_and_fill() {
        let image = demo_image(".ORG 0x0010\nMOV A, 0xAA\n");
        // Bytes 0x14 0xAA at 0x10..0x11.
        let mut out = Vec::new();
        image.write_bin_file(&mut out, 0x000f, 0x0012, 0xff).unwrap();
        assert_eq!(out, vec![0xff, 0x14, 0xaa, 0xff]);
    }

    #[test]
    fn output_range_spans_occupied_addresses() {
        let image = demo_image("HLT\n.ORG 0x0100\nHLT\n");
        assert_eq!(image.output_range(), Some((0, 0x0100)));
    }
}
