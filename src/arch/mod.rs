// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Architecture description model.
//!
//! The assembler is retargetable: the CPU it assembles for is supplied as a
//! pure data description, never hard-coded. A description carries the
//! register file, the instruction table (with per-instruction variant lists),
//! endianness, and address width. Construction validates the table up front
//! so the two-pass engine can rely on it unconditionally.
//!
//! # Components
//!
//! - [`pattern`] - operand-shape patterns (`REG_IMM8`, ...)
//! - [`demo`] - built-in demo architecture used by the CLI and tests
//! - [`json`] - JSON decoding of descriptions

pub mod demo;
pub mod json;
pub mod pattern;

use std::collections::HashMap;
use std::fmt;

use crate::operand::Operand;
use pattern::OperandPattern;

/// Canonical register identifier within one architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterId(u8);

impl RegisterId {
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

/// Byte order for multi-byte emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// One register in the described CPU.
#[derive(Debug, Clone)]
pub struct RegisterDescriptor {
    pub id: RegisterId,
    pub name: String,
    pub aliases: Vec<String>,
    /// Register width in bits.
    pub width: u8,
}

/// Predicate over a parsed operand list, stored as data so architecture
/// tables stay loadable from JSON. Evaluated by the ordered variant loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantPredicate {
    /// Operand at `index` is the given register.
    RegisterAt { index: usize, register: RegisterId },
    /// Operand at `index` is an immediate with exactly this literal value.
    ImmediateAt { index: usize, value: i64 },
    /// Operand at `index` is a memory access based on the given register.
    MemoryBaseAt { index: usize, register: RegisterId },
    All(Vec<VariantPredicate>),
    Any(Vec<VariantPredicate>),
}

impl VariantPredicate {
    /// Evaluate against concrete operand values. Reads nothing but the
    /// operand list.
    pub fn eval(&self, operands: &[Operand]) -> bool {
        match self {
            VariantPredicate::RegisterAt { index, register } => operands
                .get(*index)
                .is_some_and(|op| op.is_register(*register)),
            VariantPredicate::ImmediateAt { index, value } => operands
                .get(*index)
                .and_then(Operand::as_immediate)
                .is_some_and(|v| v == *value),
            VariantPredicate::MemoryBaseAt { index, register } => operands
                .get(*index)
                .is_some_and(|op| op.has_memory_base(*register)),
            VariantPredicate::All(preds) => preds.iter().all(|p| p.eval(operands)),
            VariantPredicate::Any(preds) => preds.iter().any(|p| p.eval(operands)),
        }
    }

    fn max_index(&self) -> Option<usize> {
        match self {
            VariantPredicate::RegisterAt { index, .. }
            | VariantPredicate::ImmediateAt { index, .. }
            | VariantPredicate::MemoryBaseAt { index, .. } => Some(*index),
            VariantPredicate::All(preds) | VariantPredicate::Any(preds) => {
                preds.iter().filter_map(VariantPredicate::max_index).max()
            }
        }
    }
}

/// One concrete encoding of an instruction.
#[derive(Debug, Clone)]
pub struct InstructionVariant {
    /// Display mnemonic, e.g. `MOV_A_IMM`.
    pub mnemonic: String,
    pub pattern: OperandPattern,
    pub opcode: u8,
    pub size: u32,
    pub predicate: Option<VariantPredicate>,
}

/// An instruction with its default encoding and optional variant list.
#[derive(Debug, Clone)]
pub struct InstructionDescriptor {
    pub mnemonic: String,
    pub opcode: u8,
    pub pattern: OperandPattern,
    pub size: u32,
    pub variants: Vec<InstructionVariant>,
}

/// Validation error for an architecture description.
#[derive(Debug, Clone)]
pub struct ArchError {
    message: String,
}

impl ArchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ArchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ArchError {}

/// Immutable CPU description, supplied once at Compiler construction.
#[derive(Debug, Clone)]
pub struct ArchitectureDescription {
    name: String,
    endianness: Endianness,
    /// Address width in bits (8..=32).
    address_width: u8,
    case_sensitive: bool,
    registers: Vec<RegisterDescriptor>,
    instructions: Vec<InstructionDescriptor>,
    register_lookup: HashMap<String, RegisterId>,
    instruction_lookup: HashMap<String, usize>,
}

impl ArchitectureDescription {
    /// Build and validate a description.
    ///
    /// Rejected: duplicate register names/aliases or mnemonics, declared
    /// sizes that disagree with the pattern's encoded width, predicate
    /// operand indices outside the pattern arity, and unknown predicate
    /// registers.
    pub fn new(
        name: impl Into<String>,
        endianness: Endianness,
        address_width: u8,
        case_sensitive: bool,
        registers: Vec<RegisterDescriptor>,
        instructions: Vec<InstructionDescriptor>,
    ) -> Result<Self, ArchError> {
        if !(8..=32).contains(&address_width) {
            return Err(ArchError::new(format!(
                "address width must be 8..=32 bits, got {address_width}"
            )));
        }

        let fold = |s: &str| -> String {
            if case_sensitive {
                s.to_string()
            } else {
                s.to_ascii_uppercase()
            }
        };

        let mut register_lookup = HashMap::new();
        for reg in &registers {
            for name in std::iter::once(&reg.name).chain(&reg.aliases) {
                if register_lookup.insert(fold(name), reg.id).is_some() {
                    return Err(ArchError::new(format!("duplicate register name: {name}")));
                }
            }
        }

        let mut instruction_lookup = HashMap::new();
        for (idx, instr) in instructions.iter().enumerate() {
            if instruction_lookup.insert(fold(&instr.mnemonic), idx).is_some() {
                return Err(ArchError::new(format!(
                    "duplicate mnemonic: {}",
                    instr.mnemonic
                )));
            }
            check_encoding(&instr.mnemonic, &instr.pattern, instr.size, None)?;
            for variant in &instr.variants {
                check_encoding(
                    &variant.mnemonic,
                    &variant.pattern,
                    variant.size,
                    variant.predicate.as_ref(),
                )?;
                if let Some(pred) = &variant.predicate {
                    check_predicate_registers(&variant.mnemonic, pred, &registers)?;
                }
            }
        }

        Ok(Self {
            name: name.into(),
            endianness,
            address_width,
            case_sensitive,
            registers,
            instructions,
            register_lookup,
            instruction_lookup,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn address_width(&self) -> u8 {
        self.address_width
    }

    /// Mask covering the addressable range.
    pub fn address_mask(&self) -> u32 {
        if self.address_width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.address_width) - 1
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn registers(&self) -> &[RegisterDescriptor] {
        &self.registers
    }

    pub fn instructions(&self) -> &[InstructionDescriptor] {
        &self.instructions
    }

    fn fold(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_uppercase()
        }
    }

    /// Map a register name or alias to its canonical id.
    #[must_use]
    pub fn register_id(&self, name: &str) -> Option<RegisterId> {
        self.register_lookup.get(&self.fold(name)).copied()
    }

    /// Descriptor for a canonical register id.
    #[must_use]
    pub fn register(&self, id: RegisterId) -> Option<&RegisterDescriptor> {
        self.registers.iter().find(|reg| reg.id == id)
    }

    #[must_use]
    pub fn is_register(&self, name: &str) -> bool {
        self.register_lookup.contains_key(&self.fold(name))
    }

    /// Look up an instruction by normalized mnemonic.
    #[must_use]
    pub fn instruction(&self, mnemonic: &str) -> Option<&InstructionDescriptor> {
        self.instruction_lookup
            .get(&self.fold(mnemonic))
            .map(|&idx| &self.instructions[idx])
    }

    #[must_use]
    pub fn is_instruction(&self, mnemonic: &str) -> bool {
        self.instruction_lookup.contains_key(&self.fold(mnemonic))
    }
}

fn check_encoding(
    mnemonic: &str,
    pattern: &OperandPattern,
    size: u32,
    predicate: Option<&VariantPredicate>,
) -> Result<(), ArchError> {
    let encoded = pattern.encoded_size();
    if size != encoded {
        return Err(ArchError::new(format!(
            "{mnemonic}: declared size {size} does not match pattern {} ({encoded} bytes)",
            pattern.text()
        )));
    }
    if let Some(pred) = predicate {
        if let Some(max) = pred.max_index() {
            if max >= pattern.arity() {
                return Err(ArchError::new(format!(
                    "{mnemonic}: predicate operand index {max} outside pattern {}",
                    pattern.text()
                )));
            }
        }
    }
    Ok(())
}

fn check_predicate_registers(
    mnemonic: &str,
    pred: &VariantPredicate,
    registers: &[RegisterDescriptor],
) -> Result<(), ArchError> {
    match pred {
        VariantPredicate::RegisterAt { register, .. }
        | VariantPredicate::MemoryBaseAt { register, .. } => {
            if !registers.iter().any(|reg| reg.id == *register) {
                return Err(ArchError::new(format!(
                    "{mnemonic}: predicate references unknown register id {}",
                    register.as_u8()
                )));
            }
            Ok(())
        }
        VariantPredicate::ImmediateAt { .. } => Ok(()),
        VariantPredicate::All(preds) | VariantPredicate::Any(preds) => preds
            .iter()
            .try_for_each(|p| check_predicate_registers(mnemonic, p, registers)),
    }
}
