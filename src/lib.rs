// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Retargetable table-driven two-pass assembler.
//!
//! The CPU being assembled for is supplied as a data description
//! ([`arch::ArchitectureDescription`]); nothing about a concrete instruction
//! set is hard-coded. [`compiler::compile`] turns UTF-8 source into a
//! [`program::CompiledProgram`]: per-section byte records, label and symbol
//! tables, an optional entry point, and diagnostics.

pub mod arch;
pub mod cli;
pub mod compiler;
pub mod diagnostics;
pub mod image;
pub mod lexer;
pub mod listing;
pub mod operand;
pub mod program;

// Re-exports for convenience
pub use arch::{ArchitectureDescription, Endianness, RegisterId};
pub use compiler::{compile, Compiler};
pub use diagnostics::{AsmError, AsmErrorKind, Diagnostic, Severity};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use operand::Operand;
pub use program::{CompiledProgram, Section, SectionKind};
