// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Forward-reference resolution and byte-order helpers.
//!
//! After both passes every pending [`UnresolvedReference`] is patched in
//! place: the placeholder bytes Pass 2 emitted are overwritten with the
//! target's resolved value, honoring the configured endianness and the
//! reference's declared byte width. A missing target is a fatal diagnostic;
//! its placeholder stays zero so partial output remains inspectable.

use crate::arch::Endianness;
use crate::diagnostics::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::program::LabelEntry;

use super::Compiler;

/// Serialize the low `width` bytes of `value` in the given byte order.
pub fn endian_bytes(value: i64, width: usize, endianness: Endianness) -> Vec<u8> {
    let raw = (value as u64).to_le_bytes();
    let mut bytes: Vec<u8> = raw[..width.min(8)].to_vec();
    if endianness == Endianness::Big {
        bytes.reverse();
    }
    bytes
}

impl Compiler<'_> {
    /// Patch every pending reference, exactly once each.
    pub(super) fn resolve_references(&mut self) {
        let pending = std::mem::take(&mut self.unresolved);
        for reference in pending {
            let Some(value) = self
                .labels
                .lookup(&reference.target)
                .map(LabelEntry::resolved_value)
            else {
                self.diagnostics.push(Diagnostic::at_span(
                    reference.span,
                    Severity::Error,
                    AsmError::new(AsmErrorKind::Symbol, "Undefined label", Some(&reference.target)),
                ));
                continue;
            };

            let bytes = endian_bytes(value, reference.width as usize, self.arch.endianness());
            let patched = self
                .sections
                .iter_mut()
                .find(|section| section.name.eq_ignore_ascii_case(&reference.section))
                .is_some_and(|section| section.patch(reference.address, &bytes));
            if !patched {
                self.diagnostics.push(Diagnostic::at_span(
                    reference.span,
                    Severity::Error,
                    AsmError::new(
                        AsmErrorKind::Internal,
                        "Reference points outside emitted bytes",
                        Some(&reference.target),
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::endian_bytes;
    use crate::arch::Endianness;

    #[test]
    fn little_endian_orders_low_byte_first() {
        assert_eq!(endian_bytes(0x1234, 2, Endianness::Little), vec![0x34, 0x12]);
        assert_eq!(endian_bytes(0x1234, 1, Endianness::Little), vec![0x34]);
    }

    #[test]
    fn big_endian_orders_high_byte_first() {
        assert_eq!(endian_bytes(0x1234, 2, Endianness::Big), vec![0x12, 0x34]);
    }

    #[test]
    fn wide_fields_serialize_all_bytes() {
        assert_eq!(
            endian_bytes(0x0102_0304, 4, Endianness::Little),
            vec![0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(
            endian_bytes(0x0102_0304, 4, Endianness::Big),
            vec![0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn truncation_keeps_the_low_bytes() {
        assert_eq!(endian_bytes(0x1_0005, 2, Endianness::Little), vec![0x05, 0x00]);
    }
}
