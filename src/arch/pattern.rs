// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand-shape patterns.
//!
//! A pattern is an underscore-joined shape descriptor such as `REG_IMM8` or
//! `NONE`. Patterns drive both variant matching and byte emission: each token
//! has a fixed encoded width, so a variant's size is fully determined by its
//! pattern.

use crate::operand::Operand;

/// One position in an operand-shape pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternToken {
    Reg,
    Imm8,
    Imm16,
    Mem,
}

impl PatternToken {
    /// Encoded width of this operand position in bytes.
    pub fn width(self) -> u32 {
        match self {
            PatternToken::Reg => 0,
            PatternToken::Imm8 => 1,
            PatternToken::Imm16 | PatternToken::Mem => 2,
        }
    }

    /// Structural match against a parsed operand. Labels may supply
    /// constants or addresses, so they satisfy both `IMM*` and `MEM`.
    pub fn matches(self, operand: &Operand) -> bool {
        match self {
            PatternToken::Reg => matches!(operand, Operand::Register(_)),
            PatternToken::Imm8 | PatternToken::Imm16 => {
                matches!(operand, Operand::Immediate(_) | Operand::LabelRef { .. })
            }
            PatternToken::Mem => {
                matches!(operand, Operand::Memory { .. } | Operand::LabelRef { .. })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandPattern {
    text: String,
    tokens: Vec<PatternToken>,
}

impl OperandPattern {
    /// Parse a pattern descriptor. `NONE` denotes zero operands.
    pub fn parse(text: &str) -> Result<Self, String> {
        let upper = text.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err("empty operand pattern".to_string());
        }
        if upper == "NONE" {
            return Ok(Self {
                text: upper,
                tokens: Vec::new(),
            });
        }
        let mut tokens = Vec::new();
        for part in upper.split('_') {
            let token = match part {
                "REG" => PatternToken::Reg,
                "IMM8" => PatternToken::Imm8,
                "IMM16" => PatternToken::Imm16,
                "MEM" => PatternToken::Mem,
                other => return Err(format!("unknown pattern token: {other}")),
            };
            tokens.push(token);
        }
        Ok(Self { text: upper, tokens })
    }

    #[must_use]
    pub fn none() -> Self {
        Self {
            text: "NONE".to_string(),
            tokens: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[PatternToken] {
        &self.tokens
    }

    pub fn arity(&self) -> usize {
        self.tokens.len()
    }

    /// Total encoded size: one opcode byte plus each operand field.
    pub fn encoded_size(&self) -> u32 {
        1 + self.tokens.iter().map(|t| t.width()).sum::<u32>()
    }

    /// Shape check: operand count and position-wise kinds must line up.
    pub fn matches(&self, operands: &[Operand]) -> bool {
        if self.tokens.len() != operands.len() {
            return false;
        }
        self.tokens
            .iter()
            .zip(operands)
            .all(|(token, operand)| token.matches(operand))
    }
}

#[cfg(test)]
mod tests {
    use super::{OperandPattern, PatternToken};
    use crate::arch::RegisterId;
    use crate::operand::Operand;

    #[test]
    fn parses_underscore_joined_tokens() {
        let pattern = OperandPattern::parse("REG_IMM8").unwrap();
        assert_eq!(pattern.tokens(), &[PatternToken::Reg, PatternToken::Imm8]);
        assert_eq!(pattern.encoded_size(), 2);
    }

    #[test]
    fn none_matches_zero_operands_only() {
        let pattern = OperandPattern::parse("NONE").unwrap();
        assert_eq!(pattern.arity(), 0);
        assert_eq!(pattern.encoded_size(), 1);
        assert!(pattern.matches(&[]));
        assert!(!pattern.matches(&[Operand::Immediate(1)]));
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(OperandPattern::parse("REG_BOGUS").is_err());
        assert!(OperandPattern::parse("").is_err());
    }

    #[test]
    fn labels_match_both_imm_and_mem_positions() {
        let label = Operand::LabelRef {
            name: "X".to_string(),
            resolved: None,
        };
        let imm16 = OperandPattern::parse("IMM16").unwrap();
        let mem = OperandPattern::parse("MEM").unwrap();
        assert!(imm16.matches(std::slice::from_ref(&label)));
        assert!(mem.matches(std::slice::from_ref(&label)));
    }

    #[test]
    fn registers_do_not_match_imm_positions() {
        let reg = Operand::Register(RegisterId::new(0));
        let imm8 = OperandPattern::parse("IMM8").unwrap();
        assert!(!imm8.matches(std::slice::from_ref(&reg)));
    }

    #[test]
    fn mem_pattern_accepts_memory_operands() {
        let mem = OperandPattern::parse("MEM").unwrap();
        let by_addr = Operand::Memory {
            base: None,
            address: Some(0x1000),
        };
        let by_reg = Operand::Memory {
            base: Some(RegisterId::new(0)),
            address: None,
        };
        assert!(mem.matches(std::slice::from_ref(&by_addr)));
        assert!(mem.matches(std::slice::from_ref(&by_reg)));
    }
}
