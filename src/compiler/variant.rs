// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction-variant resolution.
//!
//! This is the disambiguation core: given a descriptor and a parsed operand
//! list, pick the concrete (opcode, size) to use. Both compiler passes call
//! this function for every instruction token; it is pure over its arguments
//! so the Pass-1 size and the Pass-2 emission can never disagree.

use crate::arch::pattern::OperandPattern;
use crate::arch::InstructionDescriptor;
use crate::operand::Operand;

/// The winning encoding for one instruction statement.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEncoding<'a> {
    pub mnemonic: &'a str,
    pub opcode: u8,
    pub size: u32,
    pub pattern: &'a OperandPattern,
}

/// Select an encoding for `operands`.
///
/// With no variants, the descriptor's own pattern must structurally match.
/// Otherwise variants are tried in declaration order; the first whose shape
/// and predicate both pass wins. First-match, not best-match: tables must
/// order specific variants before general fallbacks.
pub fn resolve_variant<'a>(
    descriptor: &'a InstructionDescriptor,
    operands: &[Operand],
) -> Option<ResolvedEncoding<'a>> {
    if descriptor.variants.is_empty() {
        if descriptor.pattern.matches(operands) {
            return Some(ResolvedEncoding {
                mnemonic: &descriptor.mnemonic,
                opcode: descriptor.opcode,
                size: descriptor.size,
                pattern: &descriptor.pattern,
            });
        }
        return None;
    }

    for variant in &descriptor.variants {
        if !variant.pattern.matches(operands) {
            continue;
        }
        if let Some(pred) = &variant.predicate {
            if !pred.eval(operands) {
                continue;
            }
        }
        return Some(ResolvedEncoding {
            mnemonic: &variant.mnemonic,
            opcode: variant.opcode,
            size: variant.size,
            pattern: &variant.pattern,
        });
    }
    None
}
