// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Output model: sections, labels, symbols, and the compiled program.

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, Severity};
use crate::lexer::Span;

/// Section classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Code,
    Data,
    Bss,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Code => "code",
            SectionKind::Data => "data",
            SectionKind::Bss => "bss",
        }
    }
}

/// One emitted byte with its absolute address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRecord {
    pub address: u32,
    pub value: u8,
    pub comment: Option<String>,
    pub is_opcode: bool,
}

/// Named contiguous region of the output image.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub kind: SectionKind,
    pub base: u32,
    pub bytes: Vec<ByteRecord>,
}

impl Section {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SectionKind, base: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            base,
            bytes: Vec::new(),
        }
    }

    pub fn push(&mut self, address: u32, value: u8, is_opcode: bool) {
        self.bytes.push(ByteRecord {
            address,
            value,
            comment: None,
            is_opcode,
        });
    }

    /// Overwrite `values.len()` previously emitted bytes starting at
    /// `address`. Returns false when any byte is missing.
    pub fn patch(&mut self, address: u32, values: &[u8]) -> bool {
        for (offset, value) in values.iter().enumerate() {
            let target = address + offset as u32;
            match self.bytes.iter_mut().find(|rec| rec.address == target) {
                Some(rec) => rec.value = *value,
                None => return false,
            }
        }
        true
    }

    pub fn attach_comment(&mut self, address: u32, text: &str) {
        if let Some(rec) = self.bytes.iter_mut().find(|rec| rec.address == address) {
            match &mut rec.comment {
                Some(existing) => {
                    existing.push_str("; ");
                    existing.push_str(text);
                }
                None => rec.comment = Some(text.to_string()),
            }
        }
    }
}

/// Label table entry. `data_size` is `None` for code labels, `Some(0)` for
/// EQU constants, and the element width for sized variables.
#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub name: String,
    pub section: String,
    pub address: u32,
    pub values: Vec<i64>,
    pub data_size: Option<u8>,
}

impl LabelEntry {
    pub fn is_constant(&self) -> bool {
        self.data_size == Some(0)
    }

    /// Value a reference to this label resolves to: the EQU constant for
    /// constants, the absolute address otherwise.
    pub fn resolved_value(&self) -> i64 {
        if self.is_constant() {
            self.values.first().copied().unwrap_or(0)
        } else {
            i64::from(self.address)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum LabelTableResult {
    Ok,
    Duplicate,
}

/// Label table with insertion-ordered entries.
#[derive(Debug, Default)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
    case_sensitive: bool,
}

impl LabelTable {
    #[must_use]
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            entries: Vec::new(),
            case_sensitive,
        }
    }

    fn matches(&self, entry: &LabelEntry, name: &str) -> bool {
        if self.case_sensitive {
            entry.name == name
        } else {
            entry.name.eq_ignore_ascii_case(name)
        }
    }

    pub fn add(&mut self, entry: LabelEntry) -> LabelTableResult {
        if self.lookup(&entry.name).is_some() {
            return LabelTableResult::Duplicate;
        }
        self.entries.push(entry);
        LabelTableResult::Ok
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&LabelEntry> {
        self.entries.iter().find(|entry| self.matches(entry, name))
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Variable,
    Function,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Label => "label",
            SymbolKind::Variable => "variable",
            SymbolKind::Function => "function",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: String,
    pub address: u32,
    pub section: String,
    pub kind: SymbolKind,
    pub global: bool,
    pub external: bool,
}

/// Symbol table with insertion-ordered entries.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    case_sensitive: bool,
}

impl SymbolTable {
    #[must_use]
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            entries: Vec::new(),
            case_sensitive,
        }
    }

    fn matches(&self, entry: &SymbolEntry, name: &str) -> bool {
        if self.case_sensitive {
            entry.name == name
        } else {
            entry.name.eq_ignore_ascii_case(name)
        }
    }

    pub fn define(&mut self, entry: SymbolEntry) {
        if let Some(existing) = self.entry_mut(&entry.name) {
            // GLOBAL/EXTERN may have created a placeholder before the
            // definition; flags survive, the definition wins otherwise.
            let global = existing.global || entry.global;
            let external = existing.external || entry.external;
            *existing = SymbolEntry {
                global,
                external,
                ..entry
            };
            return;
        }
        self.entries.push(entry);
    }

    pub fn mark_global(&mut self, name: &str) {
        if let Some(entry) = self.entry_mut(name) {
            entry.global = true;
            return;
        }
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            address: 0,
            section: String::new(),
            kind: SymbolKind::Label,
            global: true,
            external: false,
        });
    }

    pub fn mark_external(&mut self, name: &str) {
        if let Some(entry) = self.entry_mut(name) {
            entry.external = true;
            return;
        }
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            address: 0,
            section: String::new(),
            kind: SymbolKind::Label,
            global: false,
            external: true,
        });
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.iter().find(|entry| self.matches(entry, name))
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut SymbolEntry> {
        let case_sensitive = self.case_sensitive;
        self.entries.iter_mut().find(|entry| {
            if case_sensitive {
                entry.name == name
            } else {
                entry.name.eq_ignore_ascii_case(name)
            }
        })
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [SymbolEntry] {
        &mut self.entries
    }
}

/// A forward reference awaiting its target address.
#[derive(Debug, Clone)]
pub struct UnresolvedReference {
    pub address: u32,
    pub section: String,
    pub target: String,
    /// Patched byte width, 1 or 2.
    pub width: u8,
    pub span: Span,
}

/// Result of one compilation.
#[derive(Debug)]
pub struct CompiledProgram {
    pub sections: Vec<Section>,
    pub labels: LabelTable,
    pub symbols: SymbolTable,
    pub entry_point: Option<u32>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledProgram {
    /// Flatten all sections into the address→byte map downstream
    /// collaborators (emulator, loaders) consume.
    #[must_use]
    pub fn flatten(&self) -> BTreeMap<u32, u8> {
        let mut out = BTreeMap::new();
        for section in &self.sections {
            for rec in &section.bytes {
                out.insert(rec.address, rec.value);
            }
        }
        out
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_table_is_case_insensitive_by_default() {
        let mut table = LabelTable::new(false);
        let entry = LabelEntry {
            name: "Start".to_string(),
            section: "code".to_string(),
            address: 0x10,
            values: Vec::new(),
            data_size: None,
        };
        assert_eq!(table.add(entry.clone()), LabelTableResult::Ok);
        assert!(table.lookup("START").is_some());
        assert_eq!(table.add(entry), LabelTableResult::Duplicate);
    }

    #[test]
    fn constant_labels_resolve_to_their_value() {
        let equ = LabelEntry {
            name: "LIMIT".to_string(),
            section: "code".to_string(),
            address: 0x100,
            values: vec![42],
            data_size: Some(0),
        };
        assert_eq!(equ.resolved_value(), 42);
        let code = LabelEntry {
            name: "loop".to_string(),
            section: "code".to_string(),
            address: 0x100,
            values: Vec::new(),
            data_size: None,
        };
        assert_eq!(code.resolved_value(), 0x100);
    }

    #[test]
    fn symbol_flags_survive_definition() {
        let mut table = SymbolTable::new(false);
        table.mark_global("start");
        table.define(SymbolEntry {
            name: "start".to_string(),
            address: 0x8000,
            section: "code".to_string(),
            kind: SymbolKind::Label,
            global: false,
            external: false,
        });
        let entry = table.lookup("START").unwrap();
        assert!(entry.global);
        assert_eq!(entry.address, 0x8000);
    }

    #[test]
    fn section_patch_rewrites_existing_bytes_only() {
        let mut section = Section::new("code", SectionKind::Code, 0);
        section.push(0, 0x40, true);
        section.push(1, 0x00, false);
        section.push(2, 0x00, false);
        assert!(section.patch(1, &[0x34, 0x12]));
        assert_eq!(section.bytes[1].value, 0x34);
        assert_eq!(section.bytes[2].value, 0x12);
        assert!(!section.patch(3, &[0xff]));
    }

    #[test]
    fn flatten_merges_sections_in_address_order() {
        let mut code = Section::new("code", SectionKind::Code, 0);
        code.push(0, 0xaa, true);
        let mut data = Section::new("data", SectionKind::Data, 2);
        data.push(2, 0xbb, false);
        let program = CompiledProgram {
            sections: vec![data, code],
            labels: LabelTable::new(false),
            symbols: SymbolTable::new(false),
            entry_point: None,
            diagnostics: Vec::new(),
        };
        let flat = program.flatten();
        assert_eq!(flat.get(&0), Some(&0xaa));
        assert_eq!(flat.get(&2), Some(&0xbb));
        assert_eq!(flat.len(), 2);
    }
}
