// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::compile;
use crate::arch::demo::demo_architecture;
use crate::arch::pattern::OperandPattern;
use crate::arch::{
    ArchitectureDescription, Endianness, InstructionDescriptor, RegisterDescriptor, RegisterId,
};
use crate::diagnostics::Severity;
use crate::program::{CompiledProgram, SectionKind, SymbolKind};

fn compile_demo(source: &str) -> CompiledProgram {
    let arch = demo_architecture();
    compile(&arch, source)
}

fn compile_clean(source: &str) -> CompiledProgram {
    let program = compile_demo(source);
    assert!(
        !program.has_errors(),
        "unexpected errors for {source:?}: {:?}",
        program
            .diagnostics
            .iter()
            .map(|d| d.format())
            .collect::<Vec<_>>()
    );
    program
}

fn flat_bytes(program: &CompiledProgram) -> Vec<(u32, u8)> {
    program.flatten().into_iter().collect()
}

fn bytes_from(source: &str) -> Vec<u8> {
    flat_bytes(&compile_clean(source))
        .into_iter()
        .map(|(_, value)| value)
        .collect()
}

#[test]
fn mov_a_imm_encodes_opcode_then_truncated_byte() {
    assert_eq!(bytes_from("MOV A, 0x05"), vec![0x14, 0x05]);
}

#[test]
fn register_pair_variants_encode_to_one_byte() {
    assert_eq!(bytes_from("MOV A, B"), vec![0x10]);
    assert_eq!(bytes_from("MOV B, A"), vec![0x12]);
}

#[test]
fn predicate_selects_by_register_not_declaration_gap() {
    assert_eq!(bytes_from("MOV B, 5"), vec![0x15, 0x05]);
    assert_eq!(bytes_from("MOV C, 5"), vec![0x16, 0x05]);
}

#[test]
fn immediate_predicate_wins_over_unconditioned_fallback() {
    assert_eq!(bytes_from("INT 0x80"), vec![0x62, 0x80]);
    assert_eq!(bytes_from("INT 0x21"), vec![0x63, 0x21]);
}

#[test]
fn memory_operands_emit_two_endian_bytes() {
    assert_eq!(bytes_from("MOV A, [0x1234]"), vec![0x17, 0x34, 0x12]);
    assert_eq!(bytes_from("MOV [0x10], A"), vec![0x18, 0x10, 0x00]);
}

#[test]
fn forward_reference_resolves_to_later_address() {
    let program = compile_clean("JMP $END\nHLT\nEND: SYSCALL 0\n");
    // JMP at 0..2, HLT at 3, SYSCALL at 4.
    assert_eq!(
        flat_bytes(&program),
        vec![
            (0, 0x40),
            (1, 0x04),
            (2, 0x00),
            (3, 0x00),
            (4, 0x60),
            (5, 0x00),
        ]
    );
    let end = program.labels.lookup("END").unwrap();
    assert_eq!(end.address, 4);
}

#[test]
fn backward_reference_needs_no_patching() {
    let program = compile_clean("loop: HLT\nJMP loop\n");
    assert_eq!(
        flat_bytes(&program),
        vec![(0, 0x00), (1, 0x40), (2, 0x00), (3, 0x00)]
    );
}

#[test]
fn undefined_label_reports_once_and_leaves_zeros() {
    let program = compile_demo("JMP $MISSING\n");
    let errors: Vec<_> = program
        .diagnostics
        .iter()
        .filter(|d| d.severity() == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].error().message().contains("MISSING"));
    assert_eq!(flat_bytes(&program), vec![(0, 0x40), (1, 0x00), (2, 0x00)]);
}

#[test]
fn db_records_label_with_element_width_one() {
    let program = compile_clean("MYVAR db 0x01, 0x02, 0x03\n");
    let label = program.labels.lookup("MYVAR").unwrap();
    assert_eq!(label.data_size, Some(1));
    assert_eq!(label.values, vec![1, 2, 3]);
    assert_eq!(
        flat_bytes(&program),
        vec![(0, 0x01), (1, 0x02), (2, 0x03)]
    );
}

#[test]
fn dw_emits_endian_ordered_words() {
    assert_eq!(bytes_from("WORDS DW 0x1234, 0x5678\n"), vec![0x34, 0x12, 0x78, 0x56]);
}

#[test]
fn strings_emit_one_byte_per_character() {
    assert_eq!(bytes_from("MSG DB \"AB\", 0\n"), vec![0x41, 0x42, 0x00]);
}

#[test]
fn data_label_reference_is_patched_forward() {
    let program = compile_clean("PTR DW END\nEND:\n");
    assert_eq!(flat_bytes(&program), vec![(0, 0x02), (1, 0x00)]);
}

#[test]
fn reservation_advances_without_value_tokens() {
    let program = compile_clean("BUF RESW 4\nHLT\n");
    let label = program.labels.lookup("BUF").unwrap();
    assert_eq!(label.data_size, Some(2));
    let flat = flat_bytes(&program);
    assert_eq!(flat.len(), 9);
    assert_eq!(flat[8], (8, 0x00)); // HLT after 8 reserved bytes
}

#[test]
fn equ_defines_a_constant_usable_as_immediate() {
    let program = compile_clean("LIMIT EQU 0x2A\nMOV A, LIMIT\n");
    let label = program.labels.lookup("LIMIT").unwrap();
    assert_eq!(label.data_size, Some(0));
    assert_eq!(label.values, vec![0x2a]);
    assert_eq!(flat_bytes(&program), vec![(0, 0x14), (1, 0x2a)]);
}

#[test]
fn org_relocates_without_touching_prior_bytes() {
    let program = compile_clean("HLT\n.ORG 0x8000\nSYSCALL 1\n");
    assert_eq!(
        flat_bytes(&program),
        vec![(0, 0x00), (0x8000, 0x60), (0x8001, 0x01)]
    );
}

#[test]
fn sections_latch_bases_from_the_cumulative_address() {
    let program = compile_clean("HLT\n.DATA\nX DB 1\n.TEXT\nHLT\n");
    let data = program.section("data").unwrap();
    assert_eq!(data.kind, SectionKind::Data);
    assert_eq!(data.base, 1);
    let label = program.labels.lookup("X").unwrap();
    assert_eq!(label.address, 1);
    assert_eq!(label.section, "data");
    // The address stream is cumulative across the switch back to code.
    assert_eq!(
        flat_bytes(&program),
        vec![(0, 0x00), (1, 0x01), (2, 0x00)]
    );
}

#[test]
fn section_directive_matches_dotted_spelling() {
    let program = compile_clean("SECTION .data\nX DB 1\n.DATA\nY DB 2\n");
    assert_eq!(program.sections.len(), 2);
    let data = program.section("data").unwrap();
    assert_eq!(data.bytes.len(), 2);
}

#[test]
fn global_on_start_sets_entry_point_and_function_kind() {
    let program = compile_clean("GLOBAL start\nNOP\nstart: HLT\n");
    assert_eq!(program.entry_point, Some(1));
    let symbol = program.symbols.lookup("start").unwrap();
    assert!(symbol.global);
    assert_eq!(symbol.kind, SymbolKind::Function);
}

#[test]
fn extern_marks_symbol_without_address() {
    let program = compile_clean("EXTERN print\nHLT\n");
    let symbol = program.symbols.lookup("print").unwrap();
    assert!(symbol.external);
}

#[test]
fn data_labels_surface_as_variables() {
    let program = compile_clean("COUNT DB 7\n");
    assert_eq!(
        program.symbols.lookup("COUNT").unwrap().kind,
        SymbolKind::Variable
    );
}

#[test]
fn comment_attaches_to_the_preceding_statement() {
    let program = compile_clean("HLT ; stop here\nNOP\n");
    let code = program.section("code").unwrap();
    assert_eq!(code.bytes[0].comment.as_deref(), Some("stop here"));
    assert!(code.bytes[1].comment.is_none());
}

#[test]
fn comment_on_its_own_line_attaches_nowhere() {
    let program = compile_clean("HLT\n; standalone\nNOP\n");
    let code = program.section("code").unwrap();
    assert!(code.bytes.iter().all(|rec| rec.comment.is_none()));
}

#[test]
fn unknown_mnemonic_is_recoverable() {
    let program = compile_demo("FROB A\nHLT\n");
    assert_eq!(program.error_count(), 1);
    assert!(program.diagnostics[0].error().message().contains("FROB"));
    // Scanning continued: the HLT on the next line still assembled.
    assert_eq!(flat_bytes(&program), vec![(0, 0x00)]);
}

#[test]
fn unmatched_operand_form_is_recoverable() {
    let program = compile_demo("MOV D, D\nHLT\n");
    assert_eq!(program.error_count(), 1);
    assert_eq!(flat_bytes(&program), vec![(0, 0x00)]);
}

#[test]
fn duplicate_label_is_reported_once() {
    let program = compile_demo("x: HLT\nx: NOP\n");
    assert_eq!(program.error_count(), 1);
    assert_eq!(program.labels.lookup("x").unwrap().address, 0);
}

#[test]
fn unsupported_directive_warns_and_continues() {
    let program = compile_demo("TIMES 4\nHLT\n");
    assert_eq!(program.error_count(), 0);
    assert_eq!(program.warning_count(), 1);
    assert_eq!(flat_bytes(&program), vec![(0, 0x00)]);
}

#[test]
fn include_consumes_its_string_operand() {
    let program = compile_clean(".INCLUDE \"other.asm\"\nHLT\n");
    assert_eq!(flat_bytes(&program), vec![(0, 0x00)]);
}

#[test]
fn compilation_is_deterministic() {
    let source = "GLOBAL start\nstart: MOV A, 1\nJMP $END\nMSG DB \"hi\", 0\nEND: HLT\n";
    let first = compile_demo(source);
    let second = compile_demo(source);
    assert_eq!(first.flatten(), second.flatten());
    assert_eq!(first.entry_point, second.entry_point);
    assert_eq!(
        first.diagnostics.iter().map(|d| d.format()).collect::<Vec<_>>(),
        second.diagnostics.iter().map(|d| d.format()).collect::<Vec<_>>()
    );
}

#[test]
fn pass_sizes_match_emitted_byte_counts() {
    // Every statement form in one program; each label's address must equal
    // the count of bytes emitted before it.
    let source = "a: MOV A, 5\nb: MOV A, [0x100]\nc: JMP a\nd: SYSCALL 2\ne: DB 1, \"xy\"\nf: HLT\n";
    let program = compile_clean(source);
    let flat = flat_bytes(&program);
    let expected = [
        ("a", 0u32),
        ("b", 2),
        ("c", 5),
        ("d", 8),
        ("e", 10),
        ("f", 13),
    ];
    for (name, address) in expected {
        assert_eq!(
            program.labels.lookup(name).unwrap().address,
            address,
            "label {name}"
        );
    }
    assert_eq!(flat.len(), 14);
    // Addresses are strictly increasing and dense here.
    for (idx, (address, _)) in flat.iter().enumerate() {
        assert_eq!(*address, idx as u32);
    }
}

#[test]
fn byte_record_addresses_are_strictly_increasing_per_section() {
    let program = compile_clean("MOV A, 1\n.DATA\nv DW 0x1234\n.TEXT\nHLT\n");
    for section in &program.sections {
        let mut prev: Option<u32> = None;
        for rec in &section.bytes {
            if let Some(prev) = prev {
                assert!(rec.address > prev, "section {}", section.name);
            }
            prev = Some(rec.address);
        }
    }
}

#[test]
fn case_folding_affects_classification_only() {
    let program = compile_clean("mov a, 5\nVALUE db 1\nmov a, [value]\n");
    assert!(program.labels.lookup("VALUE").is_some());
    let flat = flat_bytes(&program);
    // mov a,[value] resolves to the data label's address (2).
    assert_eq!(flat[3].1, 0x17);
    assert_eq!(flat[4].1, 0x02);
}

#[test]
fn big_endian_architectures_swap_emitted_words() {
    let arch = ArchitectureDescription::new(
        "be16",
        Endianness::Big,
        16,
        false,
        vec![RegisterDescriptor {
            id: RegisterId::new(0),
            name: "A".to_string(),
            aliases: Vec::new(),
            width: 8,
        }],
        vec![InstructionDescriptor {
            mnemonic: "JMP".to_string(),
            opcode: 0x40,
            pattern: OperandPattern::parse("IMM16").unwrap(),
            size: 3,
            variants: Vec::new(),
        }],
    )
    .unwrap();
    let program = compile(&arch, "JMP 0x1234\nJMP $FWD\nFWD:\n");
    assert!(!program.has_errors());
    let flat: Vec<u8> = program.flatten().into_values().collect();
    assert_eq!(flat, vec![0x40, 0x12, 0x34, 0x40, 0x00, 0x06]);
}
