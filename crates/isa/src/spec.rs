use std::collections::BTreeMap;

use gbdec_expr::{Binding, Expr};
use gbdec_rom::Address;

use crate::effect::{OpcodeEffect, parse_template};
use crate::instruction::Instruction;
use crate::placeholders::placeholder;
use crate::{DecodeError, SpecError};

/// One compiled catalog line, for example
///
/// ```text
/// 01rrrsss 1 LD #r, #s @ read: #s; write: #r; #r := #s
/// ```
///
/// The bit pattern holds literal `0`/`1` positions and parameter letters;
/// each letter collects its bits most significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeSpec {
    pattern: [u8; 8],
    cycles: u32,
    mnemonic: String,
    operands: Vec<Expr>,
    arg_size: usize,
    prefix: Option<u8>,
    effect: OpcodeEffect,
}

impl OpcodeSpec {
    pub fn parse(line: &str) -> Result<Self, SpecError> {
        Self::parse_prefixed(line, None)
    }

    /// Parses a line whose pattern describes the byte following `prefix`.
    pub fn parse_prefixed(line: &str, prefix: Option<u8>) -> Result<Self, SpecError> {
        let missing = |field: &'static str| SpecError::Missing {
            line: line.to_string(),
            field,
        };
        let (head, effect_text) = line.split_once('@').unwrap_or((line, ""));

        let (pattern_text, rest) = next_word(head).ok_or_else(|| missing("bit pattern"))?;
        let pattern: [u8; 8] =
            pattern_text
                .as_bytes()
                .try_into()
                .map_err(|_| SpecError::Pattern {
                    pattern: pattern_text.to_string(),
                })?;
        if !pattern.iter().all(u8::is_ascii_alphanumeric) {
            return Err(SpecError::Pattern {
                pattern: pattern_text.to_string(),
            });
        }

        let (cycles_text, rest) = next_word(rest).ok_or_else(|| missing("cycle count"))?;
        let cycles = cycles_text.parse().map_err(|_| SpecError::Cycles {
            text: cycles_text.to_string(),
        })?;

        let (mnemonic, operand_text) = next_word(rest).ok_or_else(|| missing("mnemonic"))?;
        let operand_text = operand_text.trim();
        let operands = if operand_text.is_empty() {
            Vec::new()
        } else {
            operand_text
                .split(", ")
                .map(|text| parse_template(text.trim()))
                .collect::<Result<_, _>>()?
        };

        let arg_size = if operand_text.contains("v16") {
            2
        } else if operand_text.contains("v8") {
            1
        } else {
            0
        };

        Ok(Self {
            pattern,
            cycles,
            mnemonic: mnemonic.to_string(),
            operands,
            arg_size,
            prefix,
            effect: OpcodeEffect::parse(effect_text)?,
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn arg_size(&self) -> usize {
        self.arg_size
    }

    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }

    /// Total encoded length: prefix, opcode byte and immediate.
    pub fn length(&self) -> usize {
        usize::from(self.prefix.is_some()) + 1 + self.arg_size
    }

    /// Captured parameter values, or `None` when a literal bit differs.
    pub fn match_bits(&self, opcode: u8) -> Option<BTreeMap<char, u16>> {
        let mut params = BTreeMap::new();
        for (index, &position) in self.pattern.iter().enumerate() {
            let bit = (opcode >> (7 - index)) & 1;
            match position {
                b'0' | b'1' => {
                    if position - b'0' != bit {
                        return None;
                    }
                }
                letter => {
                    let value: &mut u16 = params.entry(char::from(letter)).or_default();
                    *value = (*value << 1) | u16::from(bit);
                }
            }
        }
        Some(params)
    }

    pub fn matches(&self, opcode: u8) -> bool {
        self.match_bits(opcode).is_some()
    }

    /// Decodes the raw bytes of one instruction at `addr`. `raw` must be
    /// exactly [`length`](Self::length) bytes long.
    pub fn decode(&self, raw: &[u8], addr: Address) -> Result<Instruction, DecodeError> {
        if raw.len() != self.length() {
            return Err(DecodeError::LengthMismatch {
                address: addr,
                mnemonic: self.mnemonic.clone(),
                expected: self.length(),
                got: raw.len(),
            });
        }
        let body = &raw[usize::from(self.prefix.is_some())..];
        let params = self
            .match_bits(body[0])
            .ok_or_else(|| DecodeError::PatternMismatch {
                opcode: body[0],
                mnemonic: self.mnemonic.clone(),
            })?;
        let argument = match &body[1..] {
            [lo] => u16::from(*lo),
            [lo, hi] => u16::from_le_bytes([*lo, *hi]),
            _ => 0,
        };

        let next = addr.offset(self.length() as i32);
        let binding = make_binding(&params, argument, next);
        let operands = self
            .operands
            .iter()
            .map(|template| template.bind(&binding))
            .collect::<Result<Vec<_>, _>>()?;
        let footprint = self.effect.fill(&self.mnemonic, &binding)?;

        Ok(Instruction::new(
            addr,
            self.length(),
            &self.mnemonic,
            self.cycles,
            operands,
            footprint,
        ))
    }
}

fn make_binding(params: &BTreeMap<char, u16>, argument: u16, next: Address) -> Binding {
    let low = argument & 0xFF;
    let displacement = i32::from(low as u8 as i8);
    let mut binding = Binding::new()
        .with("v8", Expr::byte(low as u8))
        .with("v16", Expr::word(argument))
        .with("FF00_v8", Expr::word(0xFF00 | low))
        .with(
            "v8_rel",
            Expr::word(next.offset(displacement).virtual_address()),
        );
    if let Some(bank) = next.bank().filter(|&bank| bank > 0) {
        binding.insert("ROMBANK", Expr::word(bank));
    }
    for (&letter, &value) in params {
        binding.insert(format!("#{letter}"), placeholder(letter, value));
    }
    binding
}

fn next_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    Some(text.split_once(char::is_whitespace).unwrap_or((text, "")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbdec_expr::Width;

    fn at(virtual_address: u16) -> Address {
        Address::from_virtual(virtual_address)
    }

    #[test]
    fn parses_fields_and_argument_size() {
        let spec = OpcodeSpec::parse("00qq0001 3 LD #q, v16 @ write: #q; #q := v16").expect("spec");
        assert_eq!(spec.mnemonic(), "LD");
        assert_eq!(spec.cycles(), 3);
        assert_eq!(spec.arg_size(), 2);
        assert_eq!(spec.length(), 3);

        let relative = OpcodeSpec::parse("00011000 3 JR v8_rel @").expect("spec");
        assert_eq!(relative.arg_size(), 1);
        let plain = OpcodeSpec::parse("00000000 1 NOP").expect("spec");
        assert_eq!(plain.arg_size(), 0);
    }

    #[test]
    fn captures_bits_msb_first_per_letter() {
        let spec = OpcodeSpec::parse("01rrrsss 1 LD #r, #s @").expect("spec");
        let params = spec.match_bits(0b0110_0011).expect("match");
        assert_eq!(params[&'r'], 0b100);
        assert_eq!(params[&'s'], 0b011);
        assert!(spec.match_bits(0b1110_0011).is_none());
    }

    #[test]
    fn interleaved_letters_accumulate_in_order() {
        let spec = OpcodeSpec::parse("1a0a1a0a 1 X #a @").expect("spec");
        let params = spec.match_bits(0b1101_1100).expect("match");
        assert_eq!(params[&'a'], 0b1110);
    }

    #[test]
    fn decodes_relative_branch_target() {
        let spec = OpcodeSpec::parse("001cc000 2 JR #c, v8_rel @ read: #c").expect("spec");
        let instr = spec.decode(&[0x20, 0xFE], at(0x200)).expect("decode");
        assert_eq!(instr.to_string(), "JR not FZ, 0000:0200");
        assert_eq!(instr.jumps(), vec![at(0x200)]);
        assert!(instr.reads().contains("FZ"));
    }

    #[test]
    fn decodes_high_page_operand() {
        let spec = OpcodeSpec::parse("11100000 3 LD [FF00_v8], A @ read: A; [FF00_v8] := A")
            .expect("spec");
        let instr = spec.decode(&[0xE0, 0x40], at(0x150)).expect("decode");
        assert_eq!(instr.operands()[0], Expr::mem(Expr::word(0xFF40)));
        assert_eq!(instr.memory_writes(), vec![&Expr::word(0xFF40)]);
    }

    #[test]
    fn rombank_binding_only_in_switchable_banks() {
        let spec = OpcodeSpec::parse("00000000 1 BANK ROMBANK @").expect("spec");
        let banked = Address::from_virtual_and_bank(0x4000, 2).expect("address");
        let instr = spec.decode(&[0x00], banked).expect("decode");
        assert_eq!(instr.operands()[0], Expr::constant(2, Width::W16));
        assert!(matches!(
            spec.decode(&[0x00], at(0x100)),
            Err(DecodeError::Bind(_))
        ));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let spec = OpcodeSpec::parse("00000001 3 LD BC, v16 @").expect("spec");
        assert!(matches!(
            spec.decode(&[0x01, 0x00], at(0)),
            Err(DecodeError::LengthMismatch {
                expected: 3,
                got: 2,
                ..
            })
        ));
    }

    #[test]
    fn malformed_lines_are_spec_errors() {
        assert!(matches!(
            OpcodeSpec::parse("0101 1 NOP"),
            Err(SpecError::Pattern { .. })
        ));
        assert!(matches!(
            OpcodeSpec::parse("00000000 x NOP"),
            Err(SpecError::Cycles { .. })
        ));
        assert!(matches!(
            OpcodeSpec::parse("00000000 1"),
            Err(SpecError::Missing { field: "mnemonic", .. })
        ));
        assert!(matches!(
            OpcodeSpec::parse("00000000 1 LD Q, A"),
            Err(SpecError::Template { .. })
        ));
    }

    #[test]
    fn prefixed_specs_span_two_bytes() {
        let spec =
            OpcodeSpec::parse_prefixed("01bbbrrr 2 BIT #b, #r @ read: #r", Some(0xCB)).expect("spec");
        assert_eq!(spec.length(), 2);
        let instr = spec.decode(&[0xCB, 0x7C], at(0x100)).expect("decode");
        assert_eq!(instr.to_string(), "BIT 0x07, H");
    }
}
