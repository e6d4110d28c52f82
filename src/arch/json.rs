// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! JSON decoding of architecture descriptions.
//!
//! The embedding application may supply the CPU description as a JSON file:
//!
//! ```json
//! {
//!   "name": "demo8",
//!   "endianness": "little",
//!   "addressWidth": 16,
//!   "registers": [{ "name": "A", "id": 0, "width": 8, "aliases": ["ACC"] }],
//!   "instructions": [{
//!     "mnemonic": "MOV", "opcode": 16, "pattern": "REG_REG",
//!     "variants": [{
//!       "mnemonic": "MOV_A_IMM", "opcode": 20, "pattern": "REG_IMM8",
//!       "when": [{ "register": { "index": 0, "name": "A" } }]
//!     }]
//!   }]
//! }
//! ```
//!
//! A variant's `when` list is implicitly conjoined. Decoding is manual
//! field-by-field `Value` traversal so every problem names the offending
//! field.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use super::pattern::OperandPattern;
use super::{
    ArchError, ArchitectureDescription, Endianness, InstructionDescriptor, InstructionVariant,
    RegisterDescriptor, RegisterId, VariantPredicate,
};

/// Load and validate a description from a JSON file.
pub fn architecture_from_file(path: &Path) -> Result<ArchitectureDescription, ArchError> {
    let text = fs::read_to_string(path)
        .map_err(|err| ArchError::new(format!("read {}: {err}", path.display())))?;
    architecture_from_str(&text)
}

/// Decode and validate a description from JSON text.
pub fn architecture_from_str(text: &str) -> Result<ArchitectureDescription, ArchError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| ArchError::new(format!("invalid architecture JSON: {err}")))?;
    architecture_from_value(&value)
}

pub fn architecture_from_value(value: &Value) -> Result<ArchitectureDescription, ArchError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("custom")
        .to_string();

    let endianness = match value.get("endianness").and_then(Value::as_str) {
        None => Endianness::Little,
        Some(text) if text.eq_ignore_ascii_case("little") => Endianness::Little,
        Some(text) if text.eq_ignore_ascii_case("big") => Endianness::Big,
        Some(other) => {
            return Err(ArchError::new(format!("unknown endianness: {other}")));
        }
    };

    let address_width = match value.get("addressWidth") {
        None => 16,
        Some(width) => width
            .as_u64()
            .and_then(|w| u8::try_from(w).ok())
            .ok_or_else(|| ArchError::new("addressWidth must be a small integer"))?,
    };

    let case_sensitive = value
        .get("caseSensitive")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let registers = decode_registers(value.get("registers"))?;
    let register_ids = register_id_map(&registers, case_sensitive);
    let instructions = decode_instructions(value.get("instructions"), &register_ids, case_sensitive)?;

    ArchitectureDescription::new(
        name,
        endianness,
        address_width,
        case_sensitive,
        registers,
        instructions,
    )
}

fn decode_registers(value: Option<&Value>) -> Result<Vec<RegisterDescriptor>, ArchError> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| ArchError::new("registers must be an array"))?;
    let mut registers = Vec::new();
    for item in items {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ArchError::new("register entry missing name"))?
            .to_string();
        let id = item
            .get("id")
            .and_then(Value::as_u64)
            .and_then(|id| u8::try_from(id).ok())
            .ok_or_else(|| ArchError::new(format!("register {name}: missing or bad id")))?;
        let width = match item.get("width") {
            None => 8,
            Some(width) => width
                .as_u64()
                .and_then(|w| u8::try_from(w).ok())
                .ok_or_else(|| ArchError::new(format!("register {name}: bad width")))?,
        };
        let aliases = read_string_array(item.get("aliases")).unwrap_or_default();
        registers.push(RegisterDescriptor {
            id: RegisterId::new(id),
            name,
            aliases,
            width,
        });
    }
    Ok(registers)
}

fn decode_instructions(
    value: Option<&Value>,
    register_ids: &HashMap<String, RegisterId>,
    case_sensitive: bool,
) -> Result<Vec<InstructionDescriptor>, ArchError> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| ArchError::new("instructions must be an array"))?;
    let mut instructions = Vec::new();
    for item in items {
        let mnemonic = item
            .get("mnemonic")
            .and_then(Value::as_str)
            .ok_or_else(|| ArchError::new("instruction entry missing mnemonic"))?
            .to_string();
        let opcode = decode_opcode(item, &mnemonic)?;
        let pattern = decode_pattern(item.get("pattern"), &mnemonic)?;
        let size = decode_size(item, &pattern);

        let mut variants = Vec::new();
        if let Some(list) = item.get("variants").and_then(Value::as_array) {
            for entry in list {
                variants.push(decode_variant(entry, &mnemonic, register_ids, case_sensitive)?);
            }
        }

        instructions.push(InstructionDescriptor {
            mnemonic,
            opcode,
            pattern,
            size,
            variants,
        });
    }
    Ok(instructions)
}

fn decode_variant(
    entry: &Value,
    parent: &str,
    register_ids: &HashMap<String, RegisterId>,
    case_sensitive: bool,
) -> Result<InstructionVariant, ArchError> {
    let mnemonic = entry
        .get("mnemonic")
        .and_then(Value::as_str)
        .ok_or_else(|| ArchError::new(format!("{parent}: variant missing mnemonic")))?
        .to_string();
    let opcode = decode_opcode(entry, &mnemonic)?;
    let pattern = decode_pattern(entry.get("pattern"), &mnemonic)?;
    let size = decode_size(entry, &pattern);

    let predicate = match entry.get("when") {
        None => None,
        Some(when) => {
            let list = when
                .as_array()
                .ok_or_else(|| ArchError::new(format!("{mnemonic}: when must be an array")))?;
            let mut preds = Vec::new();
            for item in list {
                preds.push(decode_predicate(item, &mnemonic, register_ids, case_sensitive)?);
            }
            match preds.len() {
                0 => None,
                1 => preds.pop(),
                _ => Some(VariantPredicate::All(preds)),
            }
        }
    };

    Ok(InstructionVariant {
        mnemonic,
        pattern,
        opcode,
        size,
        predicate,
    })
}

fn decode_predicate(
    value: &Value,
    mnemonic: &str,
    register_ids: &HashMap<String, RegisterId>,
    case_sensitive: bool,
) -> Result<VariantPredicate, ArchError> {
    if let Some(inner) = value.get("register") {
        let (index, register) = decode_register_ref(inner, mnemonic, register_ids, case_sensitive)?;
        return Ok(VariantPredicate::RegisterAt { index, register });
    }
    if let Some(inner) = value.get("memoryBase") {
        let (index, register) = decode_register_ref(inner, mnemonic, register_ids, case_sensitive)?;
        return Ok(VariantPredicate::MemoryBaseAt { index, register });
    }
    if let Some(inner) = value.get("immediate") {
        let index = decode_index(inner, mnemonic)?;
        let imm = inner
            .get("value")
            .and_then(Value::as_i64)
            .ok_or_else(|| ArchError::new(format!("{mnemonic}: immediate predicate needs value")))?;
        return Ok(VariantPredicate::ImmediateAt { index, value: imm });
    }
    if let Some(inner) = value.get("any") {
        let list = inner
            .as_array()
            .ok_or_else(|| ArchError::new(format!("{mnemonic}: any must be an array")))?;
        let mut preds = Vec::new();
        for item in list {
            preds.push(decode_predicate(item, mnemonic, register_ids, case_sensitive)?);
        }
        return Ok(VariantPredicate::Any(preds));
    }
    Err(ArchError::new(format!(
        "{mnemonic}: unknown predicate {value}"
    )))
}

fn decode_register_ref(
    value: &Value,
    mnemonic: &str,
    register_ids: &HashMap<String, RegisterId>,
    case_sensitive: bool,
) -> Result<(usize, RegisterId), ArchError> {
    let index = decode_index(value, mnemonic)?;
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ArchError::new(format!("{mnemonic}: register predicate needs name")))?;
    let key = fold_name(name, case_sensitive);
    let register = register_ids
        .get(&key)
        .copied()
        .ok_or_else(|| ArchError::new(format!("{mnemonic}: unknown register {name}")))?;
    Ok((index, register))
}

fn decode_index(value: &Value, mnemonic: &str) -> Result<usize, ArchError> {
    value
        .get("index")
        .and_then(Value::as_u64)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| ArchError::new(format!("{mnemonic}: predicate needs operand index")))
}

fn decode_opcode(value: &Value, mnemonic: &str) -> Result<u8, ArchError> {
    value
        .get("opcode")
        .and_then(Value::as_u64)
        .and_then(|op| u8::try_from(op).ok())
        .ok_or_else(|| ArchError::new(format!("{mnemonic}: missing or bad opcode")))
}

fn decode_pattern(value: Option<&Value>, mnemonic: &str) -> Result<OperandPattern, ArchError> {
    let text = value.and_then(Value::as_str).unwrap_or("NONE");
    OperandPattern::parse(text).map_err(|err| ArchError::new(format!("{mnemonic}: {err}")))
}

/// Declared size defaults to the pattern's encoded size; an explicit field
/// is still validated against it by the description constructor.
fn decode_size(value: &Value, pattern: &OperandPattern) -> u32 {
    value
        .get("size")
        .and_then(Value::as_u64)
        .and_then(|size| u32::try_from(size).ok())
        .unwrap_or_else(|| pattern.encoded_size())
}

fn register_id_map(
    registers: &[RegisterDescriptor],
    case_sensitive: bool,
) -> HashMap<String, RegisterId> {
    let mut map = HashMap::new();
    for reg in registers {
        for name in std::iter::once(&reg.name).chain(&reg.aliases) {
            map.insert(fold_name(name, case_sensitive), reg.id);
        }
    }
    map
}

fn fold_name(name: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        name.to_string()
    } else {
        name.to_ascii_uppercase()
    }
}

fn read_string_array(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect()
    })
}
