// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Two-pass compiler engine.
//!
//! Pass 1 walks the token list to fix every label and symbol address; Pass 2
//! re-walks the identical list and emits bytes. Both passes run through the
//! same statement walker ([`Compiler::run_pass`]) so they visit directives in
//! identical order and size every statement with the identical
//! [`resolve_variant`] call. Forward references are patched afterwards by the
//! reference resolver.
//!
//! One `Compiler` value performs one compilation; construct a fresh one per
//! job. The entry point is synchronous and total: recoverable problems end up
//! as diagnostics on the returned [`CompiledProgram`], never as panics.

pub mod resolver;
pub mod variant;

#[cfg(test)]
mod tests;

use crate::arch::ArchitectureDescription;
use crate::diagnostics::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::lexer::{parse_number, Lexer, Span, Token, TokenKind};
use crate::operand::Operand;
use crate::program::{
    CompiledProgram, LabelEntry, LabelTable, LabelTableResult, Section, SectionKind, SymbolEntry,
    SymbolKind, SymbolTable, UnresolvedReference,
};

use resolver::endian_bytes;
use variant::{resolve_variant, ResolvedEncoding};

/// Name of the implicit initial section.
pub const CODE_SECTION: &str = "code";

/// Conventional entry-point names recognized by `GLOBAL`.
const ENTRY_NAMES: &[&str] = &["start", "_start", "main"];

/// Compile `source` against `arch` in one call.
#[must_use]
pub fn compile(arch: &ArchitectureDescription, source: &str) -> CompiledProgram {
    Compiler::new(arch).compile(source)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    One,
    Two,
}

/// Per-pass cursor/section/address state. Recreated from scratch for each
/// pass so Pass 2 re-derives layout instead of reading Pass-1 results.
struct PassState {
    cursor: usize,
    address: u32,
    current: usize,
    sections: Vec<Section>,
    /// Statement start used for same-line comment association.
    last_emit: Option<(usize, u32)>,
}

impl PassState {
    fn new() -> Self {
        Self {
            cursor: 0,
            address: 0,
            current: 0,
            sections: vec![Section::new(CODE_SECTION, SectionKind::Code, 0)],
            last_emit: None,
        }
    }

    fn section_name(&self) -> &str {
        &self.sections[self.current].name
    }
}

pub struct Compiler<'a> {
    arch: &'a ArchitectureDescription,
    labels: LabelTable,
    symbols: SymbolTable,
    sections: Vec<Section>,
    unresolved: Vec<UnresolvedReference>,
    diagnostics: Vec<Diagnostic>,
    global_names: Vec<String>,
    duplicate_labels: Vec<String>,
    internal_fault: bool,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub fn new(arch: &'a ArchitectureDescription) -> Self {
        Self {
            arch,
            labels: LabelTable::new(arch.case_sensitive()),
            symbols: SymbolTable::new(arch.case_sensitive()),
            sections: Vec::new(),
            unresolved: Vec::new(),
            diagnostics: Vec::new(),
            global_names: Vec::new(),
            duplicate_labels: Vec::new(),
            internal_fault: false,
        }
    }

    /// Run the full compilation: lex, pass 1, pass 2, reference resolution.
    pub fn compile(mut self, source: &str) -> CompiledProgram {
        let (tokens, lex_diagnostics) = Lexer::new(self.arch, source).tokenize();
        self.diagnostics.extend(lex_diagnostics);

        self.run_pass(&tokens, Pass::One);
        if !self.internal_fault {
            self.run_pass(&tokens, Pass::Two);
        }
        if !self.internal_fault {
            self.resolve_references();
        }
        self.finalize()
    }

    fn run_pass(&mut self, tokens: &[Token], pass: Pass) {
        let mut state = PassState::new();

        while state.cursor < tokens.len() && !self.internal_fault {
            let token = &tokens[state.cursor];
            match &token.kind {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    state.last_emit = None;
                    state.cursor += 1;
                }
                TokenKind::Comment(text) => {
                    if pass == Pass::Two {
                        if let Some((section, address)) = state.last_emit {
                            state.sections[section].attach_comment(address, text.trim());
                        }
                    }
                    state.cursor += 1;
                }
                TokenKind::Label(name) => {
                    let name = name.clone();
                    let span = token.span;
                    state.cursor += 1;
                    match pass {
                        Pass::One => self.handle_label(&mut state, &name, span),
                        Pass::Two => self.verify_label(&state, &name, span),
                    }
                }
                TokenKind::Directive(name) => {
                    let name = name.clone();
                    let span = token.span;
                    state.cursor += 1;
                    self.handle_directive(tokens, &mut state, pass, &name, span);
                }
                TokenKind::Instruction(name) => {
                    let name = name.clone();
                    let span = token.span;
                    state.cursor += 1;
                    self.handle_instruction(tokens, &mut state, pass, &name, span);
                }
                TokenKind::Identifier(name) => {
                    let name = name.clone();
                    let span = token.span;
                    if let Some(directive) = data_directive_at(tokens, state.cursor + 1) {
                        state.cursor += 2;
                        self.handle_data(tokens, &mut state, pass, Some((name, span)), &directive);
                    } else {
                        self.report(
                            pass,
                            span,
                            Severity::Error,
                            AsmErrorKind::Instruction,
                            "Unknown mnemonic",
                            Some(&name),
                        );
                        skip_to_newline(tokens, &mut state.cursor);
                    }
                }
                _ => {
                    self.report(
                        pass,
                        token.span,
                        Severity::Warning,
                        AsmErrorKind::Instruction,
                        "Unexpected token",
                        Some(&token.to_source_text()),
                    );
                    state.cursor += 1;
                }
            }
        }

        if pass == Pass::Two {
            self.sections = state.sections;
        }
    }

    fn handle_label(&mut self, state: &mut PassState, name: &str, span: Span) {
        let entry = LabelEntry {
            name: name.to_string(),
            section: state.section_name().to_string(),
            address: state.address,
            values: Vec::new(),
            data_size: None,
        };
        if self.labels.add(entry) == LabelTableResult::Duplicate {
            self.duplicate_labels.push(name.to_string());
            self.diagnostics.push(Diagnostic::at_span(
                span,
                Severity::Error,
                AsmError::new(AsmErrorKind::Label, "Duplicate label", Some(name)),
            ));
            return;
        }
        self.symbols.define(SymbolEntry {
            name: name.to_string(),
            address: state.address,
            section: state.section_name().to_string(),
            kind: SymbolKind::Label,
            global: false,
            external: false,
        });
    }

    /// Pass-2 cross-check of the load-bearing invariant: the address Pass 1
    /// fixed for this label must be the address Pass 2 arrived at.
    fn verify_label(&mut self, state: &PassState, name: &str, span: Span) {
        if self
            .duplicate_labels
            .iter()
            .any(|dup| dup.eq_ignore_ascii_case(name))
        {
            return;
        }
        let consistent = self
            .labels
            .lookup(name)
            .is_some_and(|entry| entry.address == state.address);
        if !consistent {
            self.diagnostics.push(Diagnostic::at_span(
                span,
                Severity::Error,
                AsmError::new(
                    AsmErrorKind::Internal,
                    "Label address diverged between passes",
                    Some(name),
                ),
            ));
            self.internal_fault = true;
        }
    }

    fn handle_directive(
        &mut self,
        tokens: &[Token],
        state: &mut PassState,
        pass: Pass,
        name: &str,
        span: Span,
    ) {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "SECTION" => match take_name(tokens, &mut state.cursor) {
                Some(section) => {
                    // `SECTION .data` and `.DATA` land in the same section.
                    let section = section.trim_start_matches('.');
                    self.switch_section(state, section, section_kind_for(section));
                }
                None => {
                    self.report(
                        pass,
                        span,
                        Severity::Error,
                        AsmErrorKind::Directive,
                        "SECTION requires a name",
                        None,
                    );
                    skip_to_newline(tokens, &mut state.cursor);
                }
            },
            ".DATA" => self.switch_section(state, "data", SectionKind::Data),
            ".BSS" => self.switch_section(state, "bss", SectionKind::Bss),
            ".TEXT" | ".CODE" => self.switch_section(state, CODE_SECTION, SectionKind::Code),
            ".ORG" => match take_number(tokens, &mut state.cursor) {
                Some(value) if value >= 0 => {
                    state.address = (value as u32) & self.arch.address_mask();
                }
                _ => {
                    self.report(
                        pass,
                        span,
                        Severity::Error,
                        AsmErrorKind::Directive,
                        ".ORG requires an absolute address",
                        None,
                    );
                    skip_to_newline(tokens, &mut state.cursor);
                }
            },
            ".INCLUDE" => {
                // File inclusion is out of scope; the operand is consumed so
                // scanning continues cleanly.
                if !matches!(
                    tokens.get(state.cursor).map(|t| &t.kind),
                    Some(TokenKind::Str(_))
                ) {
                    self.report(
                        pass,
                        span,
                        Severity::Warning,
                        AsmErrorKind::Directive,
                        ".INCLUDE requires a file name string",
                        None,
                    );
                    skip_to_newline(tokens, &mut state.cursor);
                    return;
                }
                state.cursor += 1;
            }
            "GLOBAL" | "EXTERN" => match take_name(tokens, &mut state.cursor) {
                Some(symbol) => {
                    if pass == Pass::One {
                        if upper == "GLOBAL" {
                            self.symbols.mark_global(&symbol);
                            self.global_names.push(symbol);
                        } else {
                            self.symbols.mark_external(&symbol);
                        }
                    }
                }
                None => {
                    self.report(
                        pass,
                        span,
                        Severity::Error,
                        AsmErrorKind::Directive,
                        "Directive requires a symbol name",
                        Some(&upper),
                    );
                    skip_to_newline(tokens, &mut state.cursor);
                }
            },
            "EQU" | "DB" | "DW" | "DD" | "DQ" | "RESB" | "RESW" | "RESD" | "RESQ" => {
                self.handle_data(tokens, state, pass, None, &upper);
            }
            _ => {
                self.report(
                    pass,
                    span,
                    Severity::Warning,
                    AsmErrorKind::Directive,
                    "Unsupported directive",
                    Some(name),
                );
                skip_to_newline(tokens, &mut state.cursor);
            }
        }
    }

    /// Switch the current section. The first time a section is entered its
    /// base latches to the current cumulative address; switching never resets
    /// the address stream.
    fn switch_section(&mut self, state: &mut PassState, name: &str, kind: SectionKind) {
        if let Some(idx) = state
            .sections
            .iter()
            .position(|section| section.name.eq_ignore_ascii_case(name))
        {
            state.current = idx;
            return;
        }
        state
            .sections
            .push(Section::new(name.to_ascii_lowercase(), kind, state.address));
        state.current = state.sections.len() - 1;
    }

    fn handle_instruction(
        &mut self,
        tokens: &[Token],
        state: &mut PassState,
        pass: Pass,
        mnemonic: &str,
        span: Span,
    ) {
        let operands = match self.parse_operands(tokens, &mut state.cursor) {
            Ok(operands) => operands,
            Err(diagnostic) => {
                if pass == Pass::One {
                    self.diagnostics.push(diagnostic);
                }
                skip_to_newline(tokens, &mut state.cursor);
                return;
            }
        };

        let Some(descriptor) = self.arch.instruction(mnemonic) else {
            self.report(
                pass,
                span,
                Severity::Error,
                AsmErrorKind::Instruction,
                "Unknown mnemonic",
                Some(mnemonic),
            );
            return;
        };

        let Some(enc) = resolve_variant(descriptor, &operands) else {
            self.report(
                pass,
                span,
                Severity::Error,
                AsmErrorKind::Instruction,
                "No matching operand form",
                Some(mnemonic),
            );
            return;
        };

        if pass == Pass::Two {
            let bytes = self.build_instruction_bytes(&enc, &operands, state, span);
            if bytes.len() as u32 != enc.size {
                self.diagnostics.push(Diagnostic::at_span(
                    span,
                    Severity::Error,
                    AsmError::new(
                        AsmErrorKind::Internal,
                        "Emitted size diverged from resolved size",
                        Some(enc.mnemonic),
                    ),
                ));
                self.internal_fault = true;
                return;
            }
            let section = &mut state.sections[state.current];
            for (offset, byte) in bytes.iter().enumerate() {
                section.push(state.address + offset as u32, *byte, offset == 0);
            }
        }
        state.last_emit = Some((state.current, state.address));
        state.address += enc.size;
    }

    /// Emit the opcode byte, then one field per pattern token: nothing for
    /// `REG` (the register is encoded by the variant's opcode), one truncated
    /// byte for `IMM8`, two endian-ordered bytes for `IMM16`/`MEM`. Unknown
    /// labels leave zero placeholders and queue an `UnresolvedReference`.
    fn build_instruction_bytes(
        &mut self,
        enc: &ResolvedEncoding<'_>,
        operands: &[Operand],
        state: &PassState,
        span: Span,
    ) -> Vec<u8> {
        let mut bytes = vec![enc.opcode];
        for (token, operand) in enc.pattern.tokens().iter().zip(operands) {
            let width = token.width() as usize;
            if width == 0 {
                continue;
            }
            let field_address = state.address + bytes.len() as u32;
            match self.operand_value(operand) {
                Some(value) => {
                    bytes.extend(endian_bytes(value, width, self.arch.endianness()));
                }
                None => {
                    let name = operand.as_label().unwrap_or_default().to_string();
                    bytes.extend(std::iter::repeat(0).take(width));
                    self.unresolved.push(UnresolvedReference {
                        address: field_address,
                        section: state.section_name().to_string(),
                        target: name,
                        width: width as u8,
                        span,
                    });
                }
            }
        }
        bytes
    }

    /// Concrete value of an operand field, or `None` for a forward label.
    fn operand_value(&self, operand: &Operand) -> Option<i64> {
        match operand {
            Operand::Register(id) => Some(i64::from(id.as_u8())),
            Operand::Immediate(value) => Some(*value),
            Operand::Memory {
                address: Some(addr),
                ..
            } => Some(i64::from(*addr)),
            Operand::Memory { base: Some(id), .. } => Some(i64::from(id.as_u8())),
            Operand::Memory { .. } => Some(0),
            Operand::LabelRef { name, .. } => {
                self.labels.lookup(name).map(LabelEntry::resolved_value)
            }
        }
    }

    fn handle_data(
        &mut self,
        tokens: &[Token],
        state: &mut PassState,
        pass: Pass,
        label: Option<(String, Span)>,
        directive: &str,
    ) {
        match directive {
            "EQU" => self.handle_equ(tokens, state, pass, label),
            "RESB" | "RESW" | "RESD" | "RESQ" => {
                let width = reserve_width(directive);
                self.handle_reserve(tokens, state, pass, label, width);
            }
            _ => {
                let width = data_width(directive);
                self.handle_data_values(tokens, state, pass, label, width);
            }
        }
    }

    fn handle_equ(
        &mut self,
        tokens: &[Token],
        state: &mut PassState,
        pass: Pass,
        label: Option<(String, Span)>,
    ) {
        let Some((name, span)) = label else {
            let span = tokens
                .get(state.cursor.saturating_sub(1))
                .map(|t| t.span)
                .unwrap_or_default();
            self.report(
                pass,
                span,
                Severity::Error,
                AsmErrorKind::Directive,
                "EQU requires a name",
                None,
            );
            skip_to_newline(tokens, &mut state.cursor);
            return;
        };

        let value = match tokens.get(state.cursor).map(|t| &t.kind) {
            Some(TokenKind::Number(num)) => {
                state.cursor += 1;
                parse_number(&num.text)
            }
            Some(TokenKind::Identifier(target)) => {
                state.cursor += 1;
                self.labels.lookup(target).map(LabelEntry::resolved_value)
            }
            _ => None,
        };
        let Some(value) = value else {
            self.report(
                pass,
                span,
                Severity::Error,
                AsmErrorKind::Directive,
                "EQU requires a known value",
                Some(&name),
            );
            skip_to_newline(tokens, &mut state.cursor);
            return;
        };

        if pass == Pass::One {
            self.record_data_label(state, &name, span, vec![value], 0);
        }
        state.last_emit = Some((state.current, state.address));
    }

    fn handle_reserve(
        &mut self,
        tokens: &[Token],
        state: &mut PassState,
        pass: Pass,
        label: Option<(String, Span)>,
        width: u8,
    ) {
        let count = match take_number(tokens, &mut state.cursor) {
            Some(count) if count >= 0 => count as u32,
            _ => {
                let span = label.as_ref().map(|(_, span)| *span).unwrap_or_default();
                self.report(
                    pass,
                    span,
                    Severity::Error,
                    AsmErrorKind::Directive,
                    "Reservation requires a count",
                    None,
                );
                skip_to_newline(tokens, &mut state.cursor);
                return;
            }
        };

        let total = count * u32::from(width);
        if let Some((name, span)) = label {
            if pass == Pass::One {
                self.record_data_label(state, &name, span, Vec::new(), width);
            }
        }
        if pass == Pass::Two {
            let section = &mut state.sections[state.current];
            for offset in 0..total {
                section.push(state.address + offset, 0, false);
            }
        }
        state.last_emit = Some((state.current, state.address));
        state.address += total;
    }

    fn handle_data_values(
        &mut self,
        tokens: &[Token],
        state: &mut PassState,
        pass: Pass,
        label: Option<(String, Span)>,
        width: u8,
    ) {
        let literals = match self.parse_data_literals(tokens, &mut state.cursor) {
            Ok(literals) => literals,
            Err(diagnostic) => {
                if pass == Pass::One {
                    self.diagnostics.push(diagnostic);
                }
                skip_to_newline(tokens, &mut state.cursor);
                return;
            }
        };

        if let Some((name, span)) = label {
            if pass == Pass::One {
                let values = captured_values(&self.labels, &literals);
                self.record_data_label(state, &name, span, values, width);
            }
        }

        let start = state.address;
        let mut offset: u32 = 0;
        for literal in &literals {
            match literal {
                DataLiteral::Str(bytes) => {
                    if pass == Pass::Two {
                        let section = &mut state.sections[state.current];
                        for byte in bytes {
                            section.push(start + offset, *byte, false);
                            offset += 1;
                        }
                    } else {
                        offset += bytes.len() as u32;
                    }
                }
                DataLiteral::Number(value) => {
                    if pass == Pass::Two {
                        let bytes =
                            endian_bytes(*value, width as usize, self.arch.endianness());
                        let section = &mut state.sections[state.current];
                        for byte in bytes {
                            section.push(start + offset, byte, false);
                            offset += 1;
                        }
                    } else {
                        offset += u32::from(width);
                    }
                }
                DataLiteral::Label(name, span) => {
                    if pass == Pass::Two {
                        self.emit_label_field(state, start + offset, name, width, *span);
                    }
                    offset += u32::from(width);
                }
            }
        }

        state.last_emit = Some((state.current, state.address));
        state.address += offset;
    }

    /// Emit one label-valued data field of `width` bytes: the resolved
    /// absolute value when known, else zero placeholders plus a reference
    /// patching the low-order bytes.
    fn emit_label_field(
        &mut self,
        state: &mut PassState,
        field_address: u32,
        name: &str,
        width: u8,
        span: Span,
    ) {
        let resolved = self.labels.lookup(name).map(LabelEntry::resolved_value);
        match resolved {
            Some(value) => {
                let bytes = endian_bytes(value, width as usize, self.arch.endianness());
                let section = &mut state.sections[state.current];
                for (offset, byte) in bytes.into_iter().enumerate() {
                    section.push(field_address + offset as u32, byte, false);
                }
            }
            None => {
                let ref_width = width.min(2);
                // A patch covers at most two bytes; in a wider big-endian
                // field the low-order bytes sit at the end.
                let patch_address = match self.arch.endianness() {
                    crate::arch::Endianness::Little => field_address,
                    crate::arch::Endianness::Big => {
                        field_address + u32::from(width - ref_width)
                    }
                };
                let section = &mut state.sections[state.current];
                for offset in 0..u32::from(width) {
                    section.push(field_address + offset, 0, false);
                }
                self.unresolved.push(UnresolvedReference {
                    address: patch_address,
                    section: state.section_name().to_string(),
                    target: name.to_string(),
                    width: ref_width,
                    span,
                });
            }
        }
    }

    fn record_data_label(
        &mut self,
        state: &PassState,
        name: &str,
        span: Span,
        values: Vec<i64>,
        width: u8,
    ) {
        let entry = LabelEntry {
            name: name.to_string(),
            section: state.section_name().to_string(),
            address: state.address,
            values,
            data_size: Some(width),
        };
        if self.labels.add(entry) == LabelTableResult::Duplicate {
            self.duplicate_labels.push(name.to_string());
            self.diagnostics.push(Diagnostic::at_span(
                span,
                Severity::Error,
                AsmError::new(AsmErrorKind::Label, "Duplicate label", Some(name)),
            ));
            return;
        }
        let kind = if width == 0 {
            SymbolKind::Label
        } else {
            SymbolKind::Variable
        };
        self.symbols.define(SymbolEntry {
            name: name.to_string(),
            address: state.address,
            section: state.section_name().to_string(),
            kind,
            global: false,
            external: false,
        });
    }

    fn parse_data_literals(
        &self,
        tokens: &[Token],
        cursor: &mut usize,
    ) -> Result<Vec<DataLiteral>, Diagnostic> {
        let mut literals = Vec::new();
        loop {
            let token = match tokens.get(*cursor) {
                Some(token) => token,
                None => break,
            };
            match &token.kind {
                TokenKind::Newline | TokenKind::Comment(_) | TokenKind::Eof => break,
                TokenKind::Number(num) => {
                    let value = parse_number(&num.text).unwrap_or(0);
                    literals.push(DataLiteral::Number(value));
                    *cursor += 1;
                }
                TokenKind::Str(lit) => {
                    literals.push(DataLiteral::Str(lit.bytes.clone()));
                    *cursor += 1;
                }
                TokenKind::Identifier(name) => {
                    literals.push(DataLiteral::Label(name.clone(), token.span));
                    *cursor += 1;
                }
                _ => {
                    return Err(Diagnostic::at_span(
                        token.span,
                        Severity::Error,
                        AsmError::new(
                            AsmErrorKind::Directive,
                            "Unexpected token in data list",
                            Some(&token.to_source_text()),
                        ),
                    ));
                }
            }
            match tokens.get(*cursor).map(|t| &t.kind) {
                Some(TokenKind::Comma) => *cursor += 1,
                _ => break,
            }
        }
        if literals.is_empty() {
            let span = tokens.get(*cursor).map(|t| t.span).unwrap_or_default();
            return Err(Diagnostic::at_span(
                span,
                Severity::Error,
                AsmError::new(AsmErrorKind::Directive, "Data directive requires values", None),
            ));
        }
        Ok(literals)
    }

    /// Parse the comma-separated operand list of one instruction statement.
    /// Identical in both passes: the token consumption and operand shapes
    /// depend only on the token list.
    fn parse_operands(
        &self,
        tokens: &[Token],
        cursor: &mut usize,
    ) -> Result<Vec<Operand>, Diagnostic> {
        let mut operands = Vec::new();
        loop {
            let token = match tokens.get(*cursor) {
                Some(token) => token,
                None => break,
            };
            if matches!(
                token.kind,
                TokenKind::Newline | TokenKind::Comment(_) | TokenKind::Eof
            ) {
                break;
            }
            operands.push(self.parse_operand(tokens, cursor)?);
            match tokens.get(*cursor).map(|t| &t.kind) {
                Some(TokenKind::Comma) => *cursor += 1,
                Some(TokenKind::Newline) | Some(TokenKind::Comment(_)) | Some(TokenKind::Eof)
                | None => break,
                Some(_) => {
                    let token = &tokens[*cursor];
                    return Err(operand_error(token, "Expected comma between operands"));
                }
            }
        }
        Ok(operands)
    }

    fn parse_operand(&self, tokens: &[Token], cursor: &mut usize) -> Result<Operand, Diagnostic> {
        let token = &tokens[*cursor];
        match &token.kind {
            TokenKind::Register(name) => {
                *cursor += 1;
                match self.arch.register_id(name) {
                    Some(id) => Ok(Operand::Register(id)),
                    None => Err(operand_error(token, "Unknown register")),
                }
            }
            TokenKind::Number(num) => {
                *cursor += 1;
                let value = parse_number(&num.text)
                    .ok_or_else(|| operand_error(token, "Bad numeric literal"))?;
                Ok(Operand::Immediate(value))
            }
            TokenKind::Identifier(name) => {
                *cursor += 1;
                let resolved = self
                    .labels
                    .lookup(name)
                    .filter(|entry| !entry.is_constant())
                    .map(|entry| entry.address);
                Ok(Operand::LabelRef {
                    name: name.clone(),
                    resolved,
                })
            }
            TokenKind::Str(lit) if lit.bytes.len() == 1 => {
                *cursor += 1;
                Ok(Operand::Immediate(i64::from(lit.bytes[0])))
            }
            TokenKind::OpenBracket => {
                *cursor += 1;
                let operand = self.parse_memory_operand(tokens, cursor)?;
                match tokens.get(*cursor).map(|t| &t.kind) {
                    Some(TokenKind::CloseBracket) => {
                        *cursor += 1;
                        Ok(operand)
                    }
                    _ => Err(operand_error(token, "Missing closing bracket")),
                }
            }
            _ => Err(operand_error(token, "Unexpected operand")),
        }
    }

    fn parse_memory_operand(
        &self,
        tokens: &[Token],
        cursor: &mut usize,
    ) -> Result<Operand, Diagnostic> {
        let token = match tokens.get(*cursor) {
            Some(token) => token,
            None => {
                return Err(Diagnostic::new(
                    0,
                    Severity::Error,
                    AsmError::new(AsmErrorKind::Operand, "Unterminated memory operand", None),
                ))
            }
        };
        match &token.kind {
            TokenKind::Register(name) => {
                *cursor += 1;
                match self.arch.register_id(name) {
                    Some(id) => Ok(Operand::Memory {
                        base: Some(id),
                        address: None,
                    }),
                    None => Err(operand_error(token, "Unknown register")),
                }
            }
            TokenKind::Number(num) => {
                *cursor += 1;
                let value = parse_number(&num.text)
                    .ok_or_else(|| operand_error(token, "Bad numeric literal"))?;
                Ok(Operand::Memory {
                    base: None,
                    address: Some((value as u32) & self.arch.address_mask()),
                })
            }
            TokenKind::Identifier(name) => {
                *cursor += 1;
                let resolved = self
                    .labels
                    .lookup(name)
                    .filter(|entry| !entry.is_constant())
                    .map(|entry| entry.address);
                Ok(Operand::LabelRef {
                    name: name.clone(),
                    resolved,
                })
            }
            _ => Err(operand_error(token, "Unexpected token in memory operand")),
        }
    }

    /// Report a statement-level diagnostic once, during pass 1. Pass 2 walks
    /// the same statements and would duplicate every report.
    fn report(
        &mut self,
        pass: Pass,
        span: Span,
        severity: Severity,
        kind: AsmErrorKind,
        msg: &str,
        param: Option<&str>,
    ) {
        if pass == Pass::One {
            self.diagnostics.push(Diagnostic::at_span(
                span,
                severity,
                AsmError::new(kind, msg, param),
            ));
        }
    }

    fn finalize(mut self) -> CompiledProgram {
        let mut entry_point = None;
        for name in &self.global_names {
            let lowered = name.to_ascii_lowercase();
            if !ENTRY_NAMES.contains(&lowered.as_str()) {
                continue;
            }
            if let Some(entry) = self.labels.lookup(name) {
                if entry_point.is_none() {
                    entry_point = Some(entry.address);
                }
            }
        }

        // Global code labels surface as functions in the symbol table.
        let code_sections: Vec<String> = self
            .sections
            .iter()
            .filter(|section| section.kind == SectionKind::Code)
            .map(|section| section.name.clone())
            .collect();
        for entry in self.symbols.entries_mut() {
            if entry.global
                && !entry.external
                && entry.kind == SymbolKind::Label
                && code_sections
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&entry.section))
            {
                entry.kind = SymbolKind::Function;
            }
        }

        CompiledProgram {
            sections: self.sections,
            labels: self.labels,
            symbols: self.symbols,
            entry_point,
            diagnostics: self.diagnostics,
        }
    }
}

#[derive(Debug, Clone)]
enum DataLiteral {
    Number(i64),
    Str(Vec<u8>),
    Label(String, Span),
}

/// Values captured onto a data label for later EQU/memory-operand use.
fn captured_values(labels: &LabelTable, literals: &[DataLiteral]) -> Vec<i64> {
    let mut values = Vec::new();
    for literal in literals {
        match literal {
            DataLiteral::Number(value) => values.push(*value),
            DataLiteral::Str(bytes) => values.extend(bytes.iter().map(|b| i64::from(*b))),
            DataLiteral::Label(name, _) => values.push(
                labels
                    .lookup(name)
                    .map(LabelEntry::resolved_value)
                    .unwrap_or(0),
            ),
        }
    }
    values
}

fn operand_error(token: &Token, msg: &str) -> Diagnostic {
    Diagnostic::at_span(
        token.span,
        Severity::Error,
        AsmError::new(AsmErrorKind::Operand, msg, Some(&token.to_source_text())),
    )
}

fn data_directive_at(tokens: &[Token], cursor: usize) -> Option<String> {
    match tokens.get(cursor).map(|t| &t.kind) {
        Some(TokenKind::Directive(name)) => {
            let upper = name.to_ascii_uppercase();
            matches!(
                upper.as_str(),
                "EQU" | "DB" | "DW" | "DD" | "DQ" | "RESB" | "RESW" | "RESD" | "RESQ"
            )
            .then_some(upper)
        }
        _ => None,
    }
}

fn data_width(directive: &str) -> u8 {
    match directive {
        "DB" => 1,
        "DW" => 2,
        "DD" => 4,
        _ => 8,
    }
}

fn reserve_width(directive: &str) -> u8 {
    match directive {
        "RESB" => 1,
        "RESW" => 2,
        "RESD" => 4,
        _ => 8,
    }
}

fn section_kind_for(name: &str) -> SectionKind {
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("bss") {
        SectionKind::Bss
    } else if lowered.contains("data") {
        SectionKind::Data
    } else {
        SectionKind::Code
    }
}

fn take_name(tokens: &[Token], cursor: &mut usize) -> Option<String> {
    match tokens.get(*cursor).map(|t| &t.kind) {
        Some(TokenKind::Identifier(name))
        | Some(TokenKind::Directive(name))
        | Some(TokenKind::Instruction(name))
        | Some(TokenKind::Register(name)) => {
            *cursor += 1;
            Some(name.clone())
        }
        _ => None,
    }
}

fn take_number(tokens: &[Token], cursor: &mut usize) -> Option<i64> {
    match tokens.get(*cursor).map(|t| &t.kind) {
        Some(TokenKind::Number(num)) => {
            *cursor += 1;
            parse_number(&num.text)
        }
        _ => None,
    }
}

fn skip_to_newline(tokens: &[Token], cursor: &mut usize) {
    while let Some(token) = tokens.get(*cursor) {
        if matches!(token.kind, TokenKind::Newline | TokenKind::Eof) {
            break;
        }
        *cursor += 1;
    }
}
