use std::collections::BTreeMap;

use thiserror::Error;

use crate::Expr;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("unbound template parameter '{name}'")]
    Unbound { name: String },
}

/// Values for the template parameters of one decoded instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    values: BTreeMap<String, Expr>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Expr) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.values.get(name)
    }
}

impl Expr {
    /// Substitutes every parameter and re-simplifies bottom-up.
    pub fn bind(&self, binding: &Binding) -> Result<Expr, BindError> {
        self.map_params(&mut |name| {
            binding.get(name).cloned().ok_or_else(|| BindError::Unbound {
                name: name.to_string(),
            })
        })
    }

    fn map_params<E>(
        &self,
        resolve: &mut impl FnMut(&str) -> Result<Expr, E>,
    ) -> Result<Expr, E> {
        Ok(match self {
            Expr::Param(name) => resolve(name)?,
            Expr::Const(_) | Expr::Reg(_) => self.clone(),
            Expr::Mem(addr) => Expr::mem(addr.map_params(resolve)?),
            Expr::Binary(binary) => Expr::binary(
                binary.op(),
                binary.lhs().map_params(resolve)?,
                binary.rhs().map_params(resolve)?,
            ),
            Expr::Not(negation) => Expr::not(negation.inner().map_params(resolve)?),
            Expr::Call(call) => {
                let args = call
                    .args()
                    .iter()
                    .map(|arg| arg.map_params(resolve))
                    .collect::<Result<Vec<_>, E>>()?;
                Expr::call(call.func(), args)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinOp, parse};

    #[test]
    fn binding_folds_constants() {
        let template = parse("FF00_v8 +. 0").expect("parse");
        let binding = Binding::new().with("FF00_v8", Expr::word(0xFF44));
        assert_eq!(template.bind(&binding).expect("bind").as_const(), Some(0xFF44));
    }

    #[test]
    fn binding_reaches_nested_params() {
        let template = parse("[HL +. #d] & 0x0F").expect("parse");
        let binding = Binding::new().with("#d", Expr::word(0));
        let bound = template.bind(&binding).expect("bind");
        let and = bound.as_binary(BinOp::And).expect("and");
        assert!(matches!(and.lhs(), Expr::Mem(addr) if **addr == Expr::reg("HL")));
        assert!(!bound.has_params());
    }

    #[test]
    fn unbound_parameter_is_reported() {
        let template = parse("A + v8").expect("parse");
        assert_eq!(
            template.bind(&Binding::new()),
            Err(BindError::Unbound {
                name: "v8".to_string()
            })
        );
    }
}
