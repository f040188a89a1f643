use std::collections::BTreeSet;

use gbdec_expr::{Binding, Expr, parse};

use crate::instruction::{Effect, Footprint, Target};
use crate::{DecodeError, SpecError};

/// Effect template of one opcode: `;`-separated `read:` and `write:` lists,
/// the `sideeffects` marker and `TARGET := value` assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct OpcodeEffect {
    reads: Vec<Expr>,
    writes: Vec<Expr>,
    side_effects: bool,
    assignments: Vec<(Expr, Expr)>,
}

impl OpcodeEffect {
    pub(crate) fn parse(text: &str) -> Result<Self, SpecError> {
        let mut effect = Self::default();
        for statement in text.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(list) = statement.strip_prefix("read:") {
                effect.reads.extend(parse_list(list)?);
            } else if let Some(list) = statement.strip_prefix("write:") {
                effect.writes.extend(parse_list(list)?);
            } else if statement == "sideeffects" {
                effect.side_effects = true;
            } else if let Some((target, value)) = statement.split_once(":=") {
                let target = parse_template(target.trim())?;
                if !matches!(target, Expr::Reg(_) | Expr::Mem(_) | Expr::Param(_)) {
                    return Err(SpecError::Statement {
                        text: statement.to_string(),
                    });
                }
                effect.assignments.push((target, parse_template(value.trim())?));
            } else {
                return Err(SpecError::Statement {
                    text: statement.to_string(),
                });
            }
        }
        Ok(effect)
    }

    pub(crate) fn fill(&self, mnemonic: &str, binding: &Binding) -> Result<Footprint, DecodeError> {
        let mut reads = BTreeSet::new();
        let mut writes = BTreeSet::new();
        let mut loads = Vec::new();

        for template in &self.reads {
            let value = template.bind(binding)?;
            reads.extend(value.registers());
            push_loads(&mut loads, &value);
        }

        for template in &self.writes {
            match template.bind(binding)? {
                Expr::Reg(register) => {
                    writes.insert(register.name);
                }
                Expr::Mem(addr) => reads.extend(addr.registers()),
                _ => {}
            }
        }

        let mut effects = Vec::with_capacity(self.assignments.len());
        for (target, value) in &self.assignments {
            let value = value.bind(binding)?;
            push_loads(&mut loads, &value);
            let target = match target.bind(binding)? {
                Expr::Reg(register) => Target::Register(register.name),
                Expr::Mem(addr) => Target::Memory(*addr),
                other => {
                    return Err(DecodeError::Target {
                        mnemonic: mnemonic.to_string(),
                        target: other.to_string(),
                    });
                }
            };
            effects.push(Effect { target, value });
        }

        Ok(Footprint {
            reads,
            writes,
            loads,
            effects,
            side_effects: self.side_effects,
        })
    }
}

fn push_loads(loads: &mut Vec<Expr>, value: &Expr) {
    for addr in value.memory_refs() {
        if !loads.contains(addr) {
            loads.push(addr.clone());
        }
    }
}

fn parse_list(text: &str) -> Result<Vec<Expr>, SpecError> {
    text.split_whitespace().map(parse_template).collect()
}

pub(crate) fn parse_template(text: &str) -> Result<Expr, SpecError> {
    parse(text).map_err(|source| SpecError::Template {
        text: text.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> Binding {
        Binding::new()
            .with("#r", Expr::mem(Expr::reg("HL")))
            .with("#s", Expr::reg("B"))
            .with("v16", Expr::word(0xC000))
    }

    #[test]
    fn fills_register_and_memory_footprint() {
        let effect = OpcodeEffect::parse("read: #s; write: #r; #r := #s").expect("parse");
        let filled = effect.fill("LD", &binding()).expect("fill");
        assert!(filled.reads.contains("B"));
        assert!(filled.reads.contains("HL"));
        assert!(filled.writes.is_empty());
        assert_eq!(
            filled.effects,
            vec![Effect {
                target: Target::Memory(Expr::reg("HL")),
                value: Expr::reg("B"),
            }]
        );
    }

    #[test]
    fn folds_bound_addresses() {
        let effect =
            OpcodeEffect::parse("read: SP; [v16] := lo(SP); [v16 +. 1] := hi(SP)").expect("parse");
        let filled = effect.fill("LD", &binding()).expect("fill");
        let targets: Vec<_> = filled
            .effects
            .iter()
            .map(|effect| effect.target.clone())
            .collect();
        assert_eq!(
            targets,
            vec![
                Target::Memory(Expr::word(0xC000)),
                Target::Memory(Expr::word(0xC001)),
            ]
        );
    }

    #[test]
    fn collects_loads_and_side_effects() {
        let effect = OpcodeEffect::parse("read: A [v16]; write: A; sideeffects").expect("parse");
        let filled = effect.fill("LD", &binding()).expect("fill");
        assert_eq!(filled.loads, vec![Expr::word(0xC000)]);
        assert!(filled.side_effects);
        assert!(filled.writes.contains("A"));
    }

    #[test]
    fn rejects_unknown_statements() {
        assert!(matches!(
            OpcodeEffect::parse("flags: all"),
            Err(SpecError::Statement { .. })
        ));
        assert!(matches!(
            OpcodeEffect::parse("A + 1 := B"),
            Err(SpecError::Statement { .. })
        ));
    }
}
