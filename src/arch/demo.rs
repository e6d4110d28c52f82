// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Built-in demo architecture.
//!
//! A small 8-bit accumulator machine with a 16-bit little-endian address bus.
//! It is the default target for the CLI and the fixture for the engine tests.
//! Register-to-register and register-addressed forms get dedicated opcodes
//! through predicated variants; specific variants are listed before general
//! fallbacks because variant resolution is first-match.

use super::pattern::OperandPattern;
use super::{
    ArchitectureDescription, Endianness, InstructionDescriptor, InstructionVariant,
    RegisterDescriptor, RegisterId, VariantPredicate,
};

pub const REG_A: RegisterId = RegisterId::new(0);
pub const REG_B: RegisterId = RegisterId::new(1);
pub const REG_C: RegisterId = RegisterId::new(2);
pub const REG_D: RegisterId = RegisterId::new(3);
pub const REG_SP: RegisterId = RegisterId::new(4);

struct VariantSpec {
    mnemonic: &'static str,
    pattern: &'static str,
    opcode: u8,
    predicate: Option<VariantPredicate>,
}

fn reg_at(index: usize, register: RegisterId) -> VariantPredicate {
    VariantPredicate::RegisterAt { index, register }
}

fn reg_pair(first: RegisterId, second: RegisterId) -> VariantPredicate {
    VariantPredicate::All(vec![reg_at(0, first), reg_at(1, second)])
}

fn build_instruction(
    mnemonic: &str,
    opcode: u8,
    pattern: &str,
    variants: Vec<VariantSpec>,
) -> InstructionDescriptor {
    let pattern = OperandPattern::parse(pattern).expect("demo pattern");
    let variants = variants
        .into_iter()
        .map(|spec| {
            let pattern = OperandPattern::parse(spec.pattern).expect("demo pattern");
            let size = pattern.encoded_size();
            InstructionVariant {
                mnemonic: spec.mnemonic.to_string(),
                pattern,
                opcode: spec.opcode,
                size,
                predicate: spec.predicate,
            }
        })
        .collect();
    let size = pattern.encoded_size();
    InstructionDescriptor {
        mnemonic: mnemonic.to_string(),
        opcode,
        pattern,
        size,
        variants,
    }
}

/// Build the demo architecture description.
#[must_use]
pub fn demo_architecture() -> ArchitectureDescription {
    let registers = vec![
        RegisterDescriptor {
            id: REG_A,
            name: "A".to_string(),
            aliases: vec!["ACC".to_string()],
            width: 8,
        },
        RegisterDescriptor {
            id: REG_B,
            name: "B".to_string(),
            aliases: Vec::new(),
            width: 8,
        },
        RegisterDescriptor {
            id: REG_C,
            name: "C".to_string(),
            aliases: Vec::new(),
            width: 8,
        },
        RegisterDescriptor {
            id: REG_D,
            name: "D".to_string(),
            aliases: Vec::new(),
            width: 8,
        },
        RegisterDescriptor {
            id: REG_SP,
            name: "SP".to_string(),
            aliases: Vec::new(),
            width: 16,
        },
    ];

    let instructions = vec![
        build_instruction("HLT", 0x00, "NONE", Vec::new()),
        build_instruction(
            "MOV",
            0x10,
            "REG_REG",
            vec![
                VariantSpec {
                    mnemonic: "MOV_A_B",
                    pattern: "REG_REG",
                    opcode: 0x10,
                    predicate: Some(reg_pair(REG_A, REG_B)),
                },
                VariantSpec {
                    mnemonic: "MOV_A_C",
                    pattern: "REG_REG",
                    opcode: 0x11,
                    predicate: Some(reg_pair(REG_A, REG_C)),
                },
                VariantSpec {
                    mnemonic: "MOV_B_A",
                    pattern: "REG_REG",
                    opcode: 0x12,
                    predicate: Some(reg_pair(REG_B, REG_A)),
                },
                VariantSpec {
                    mnemonic: "MOV_C_A",
                    pattern: "REG_REG",
                    opcode: 0x13,
                    predicate: Some(reg_pair(REG_C, REG_A)),
                },
                VariantSpec {
                    mnemonic: "MOV_A_IMM",
                    pattern: "REG_IMM8",
                    opcode: 0x14,
                    predicate: Some(reg_at(0, REG_A)),
                },
                VariantSpec {
                    mnemonic: "MOV_B_IMM",
                    pattern: "REG_IMM8",
                    opcode: 0x15,
                    predicate: Some(reg_at(0, REG_B)),
                },
                VariantSpec {
                    mnemonic: "MOV_C_IMM",
                    pattern: "REG_IMM8",
                    opcode: 0x16,
                    predicate: Some(reg_at(0, REG_C)),
                },
                VariantSpec {
                    mnemonic: "MOV_A_MEM",
                    pattern: "REG_MEM",
                    opcode: 0x17,
                    predicate: Some(reg_at(0, REG_A)),
                },
                VariantSpec {
                    mnemonic: "MOV_MEM_A",
                    pattern: "MEM_REG",
                    opcode: 0x18,
                    predicate: Some(reg_at(1, REG_A)),
                },
            ],
        ),
        build_instruction(
            "ADD",
            0x20,
            "REG_REG",
            vec![
                VariantSpec {
                    mnemonic: "ADD_A_B",
                    pattern: "REG_REG",
                    opcode: 0x20,
                    predicate: Some(reg_pair(REG_A, REG_B)),
                },
                VariantSpec {
                    mnemonic: "ADD_A_IMM",
                    pattern: "REG_IMM8",
                    opcode: 0x21,
                    predicate: Some(reg_at(0, REG_A)),
                },
                VariantSpec {
                    mnemonic: "ADD_A_MEM",
                    pattern: "REG_MEM",
                    opcode: 0x22,
                    predicate: Some(reg_at(0, REG_A)),
                },
            ],
        ),
        build_instruction(
            "SUB",
            0x24,
            "REG_REG",
            vec![
                VariantSpec {
                    mnemonic: "SUB_A_B",
                    pattern: "REG_REG",
                    opcode: 0x24,
                    predicate: Some(reg_pair(REG_A, REG_B)),
                },
                VariantSpec {
                    mnemonic: "SUB_A_IMM",
                    pattern: "REG_IMM8",
                    opcode: 0x25,
                    predicate: Some(reg_at(0, REG_A)),
                },
            ],
        ),
        build_instruction(
            "CMP",
            0x28,
            "REG_REG",
            vec![
                VariantSpec {
                    mnemonic: "CMP_A_B",
                    pattern: "REG_REG",
                    opcode: 0x28,
                    predicate: Some(reg_pair(REG_A, REG_B)),
                },
                VariantSpec {
                    mnemonic: "CMP_A_IMM",
                    pattern: "REG_IMM8",
                    opcode: 0x29,
                    predicate: Some(reg_at(0, REG_A)),
                },
            ],
        ),
        build_instruction(
            "INC",
            0x30,
            "REG",
            vec![
                VariantSpec {
                    mnemonic: "INC_A",
                    pattern: "REG",
                    opcode: 0x30,
                    predicate: Some(reg_at(0, REG_A)),
                },
                VariantSpec {
                    mnemonic: "INC_B",
                    pattern: "REG",
                    opcode: 0x31,
                    predicate: Some(reg_at(0, REG_B)),
                },
                VariantSpec {
                    mnemonic: "INC_C",
                    pattern: "REG",
                    opcode: 0x32,
                    predicate: Some(reg_at(0, REG_C)),
                },
            ],
        ),
        build_instruction(
            "DEC",
            0x34,
            "REG",
            vec![
                VariantSpec {
                    mnemonic: "DEC_A",
                    pattern: "REG",
                    opcode: 0x34,
                    predicate: Some(reg_at(0, REG_A)),
                },
                VariantSpec {
                    mnemonic: "DEC_B",
                    pattern: "REG",
                    opcode: 0x35,
                    predicate: Some(reg_at(0, REG_B)),
                },
            ],
        ),
        build_instruction("JMP", 0x40, "IMM16", Vec::new()),
        build_instruction("JZ", 0x41, "IMM16", Vec::new()),
        build_instruction("JNZ", 0x42, "IMM16", Vec::new()),
        build_instruction("CALL", 0x48, "IMM16", Vec::new()),
        build_instruction("RET", 0x49, "NONE", Vec::new()),
        build_instruction(
            "PUSH",
            0x50,
            "REG",
            vec![
                VariantSpec {
                    mnemonic: "PUSH_A",
                    pattern: "REG",
                    opcode: 0x50,
                    predicate: Some(reg_at(0, REG_A)),
                },
                VariantSpec {
                    mnemonic: "PUSH_B",
                    pattern: "REG",
                    opcode: 0x51,
                    predicate: Some(reg_at(0, REG_B)),
                },
            ],
        ),
        build_instruction(
            "POP",
            0x54,
            "REG",
            vec![
                VariantSpec {
                    mnemonic: "POP_A",
                    pattern: "REG",
                    opcode: 0x54,
                    predicate: Some(reg_at(0, REG_A)),
                },
                VariantSpec {
                    mnemonic: "POP_B",
                    pattern: "REG",
                    opcode: 0x55,
                    predicate: Some(reg_at(0, REG_B)),
                },
            ],
        ),
        build_instruction("SYSCALL", 0x60, "IMM8", Vec::new()),
        build_instruction(
            "INT",
            0x63,
            "IMM8",
            vec![
                VariantSpec {
                    mnemonic: "INT_SYS",
                    pattern: "IMM8",
                    opcode: 0x62,
                    predicate: Some(VariantPredicate::ImmediateAt { index: 0, value: 0x80 }),
                },
                VariantSpec {
                    mnemonic: "INT_N",
                    pattern: "IMM8",
                    opcode: 0x63,
                    predicate: None,
                },
            ],
        ),
        build_instruction("NOP", 0x90, "NONE", Vec::new()),
    ];

    ArchitectureDescription::new(
        "demo8",
        Endianness::Little,
        16,
        false,
        registers,
        instructions,
    )
    .expect("demo architecture is valid")
}

#[cfg(test)]
mod tests {
    use super::demo_architecture;

    #[test]
    fn demo_architecture_builds_and_validates() {
        let arch = demo_architecture();
        assert_eq!(arch.name(), "demo8");
        assert!(arch.is_instruction("mov"));
        assert!(arch.is_register("acc"));
        assert_eq!(arch.address_mask(), 0xffff);
    }

    #[test]
    fn mov_lists_specific_variants_before_fallbacks() {
        let arch = demo_architecture();
        let mov = arch.instruction("MOV").unwrap();
        assert!(!mov.variants.is_empty());
        let imm_pos = mov
            .variants
            .iter()
            .position(|v| v.mnemonic == "MOV_A_IMM")
            .unwrap();
        let reg_pos = mov
            .variants
            .iter()
            .position(|v| v.mnemonic == "MOV_A_B")
            .unwrap();
        assert!(reg_pos < imm_pos);
    }

    #[test]
    fn int_orders_predicated_variant_first() {
        let arch = demo_architecture();
        let int = arch.instruction("INT").unwrap();
        assert_eq!(int.variants[0].mnemonic, "INT_SYS");
        assert!(int.variants[0].predicate.is_some());
        assert!(int.variants[1].predicate.is_none());
    }
}
