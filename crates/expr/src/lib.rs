mod bind;
mod display;
mod parse;
mod simplify;

use std::collections::BTreeSet;

pub use bind::{BindError, Binding};
pub use parse::{ParseError, parse};

const WIDE_REGISTERS: &[&str] = &["AF", "BC", "DE", "HL", "SP", "PC"];
const FLAG_REGISTERS: &[&str] = &["FZ", "FN", "FH", "FC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
}

impl Width {
    pub fn mask(self) -> u16 {
        match self {
            Self::W8 => 0xFF,
            Self::W16 => 0xFFFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Ge,
    Shl,
    Shr,
    Add16,
    Sub16,
    Shl16,
    Shr16,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Add16 => "+.",
            Self::Sub16 => "-.",
            Self::Shl16 => "<<.",
            Self::Shr16 => ">>.",
        }
    }

    pub fn width(self) -> Width {
        match self {
            Self::Add16 | Self::Sub16 | Self::Shl16 | Self::Shr16 => Width::W16,
            _ => Width::W8,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Ge)
    }

    /// The comparison that holds exactly when this one does not.
    pub fn inverse(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Ne),
            Self::Ne => Some(Self::Eq),
            Self::Lt => Some(Self::Ge),
            Self::Ge => Some(Self::Lt),
            _ => None,
        }
    }

    /// Constant-folds the operator, masking to its declared width.
    pub fn calculate(self, lhs: u16, rhs: u16) -> u16 {
        let (l, r) = (u32::from(lhs), u32::from(rhs));
        let raw = match self {
            Self::Add | Self::Add16 => l + r,
            Self::Sub | Self::Sub16 => l.wrapping_sub(r),
            Self::And => l & r,
            Self::Or => l | r,
            Self::Xor => l ^ r,
            Self::Eq => u32::from(l == r),
            Self::Ne => u32::from(l != r),
            Self::Lt => u32::from(l < r),
            Self::Ge => u32::from(l >= r),
            Self::Shl | Self::Shl16 => l.checked_shl(r).unwrap_or(0),
            Self::Shr | Self::Shr16 => l.checked_shr(r).unwrap_or(0),
        };
        (raw & u32::from(self.width().mask())) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Push,
    PopValue,
    PopStack,
    HighByte,
    LowByte,
    Word,
    CarryOfAdd,
    CarryOfSub,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::PopValue => "popval",
            Self::PopStack => "popst",
            Self::HighByte => "hi",
            Self::LowByte => "lo",
            Self::Word => "word",
            Self::CarryOfAdd => "c_add",
            Self::CarryOfSub => "c_sub",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "push" => Self::Push,
            "popval" => Self::PopValue,
            "popst" => Self::PopStack,
            "hi" => Self::HighByte,
            "lo" => Self::LowByte,
            "word" => Self::Word,
            "c_add" => Self::CarryOfAdd,
            "c_sub" => Self::CarryOfSub,
            _ => return None,
        })
    }

    pub fn arity(self) -> usize {
        match self {
            Self::PopValue | Self::PopStack | Self::HighByte | Self::LowByte => 1,
            Self::Push | Self::Word | Self::CarryOfAdd | Self::CarryOfSub => 2,
        }
    }

    pub fn width(self) -> Width {
        match self {
            Self::HighByte | Self::LowByte | Self::CarryOfAdd | Self::CarryOfSub => Width::W8,
            Self::Push | Self::PopValue | Self::PopStack | Self::Word => Width::W16,
        }
    }

    fn calculate(self, args: &[u16]) -> Option<u16> {
        let value = match (self, args) {
            (Self::HighByte, [value]) => value >> 8,
            (Self::LowByte, [value]) => value & 0xFF,
            (Self::Word, [hi, lo]) => ((hi & 0xFF) << 8) | (lo & 0xFF),
            (Self::CarryOfAdd, [a, b]) => u16::from((a & 0xFF) + (b & 0xFF) > 0xFF),
            (Self::CarryOfSub, [a, b]) => u16::from((a & 0xFF) < (b & 0xFF)),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constant {
    value: u16,
    width: Width,
}

impl Constant {
    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn width(&self) -> Width {
        self.width
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Register {
    pub name: String,
    pub width: Width,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    op: BinOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
}

impl Binary {
    pub fn op(&self) -> BinOp {
        self.op
    }

    pub fn lhs(&self) -> &Expr {
        &self.lhs
    }

    pub fn rhs(&self) -> &Expr {
        &self.rhs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Negation {
    inner: Box<Expr>,
}

impl Negation {
    pub fn inner(&self) -> &Expr {
        &self.inner
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    func: Func,
    args: Vec<Expr>,
}

impl Call {
    pub fn func(&self) -> Func {
        self.func
    }

    pub fn args(&self) -> &[Expr] {
        &self.args
    }
}

/// Operand and side-effect expression tree.
///
/// Composite nodes (`Binary`, `Not`, `Call`) have private payloads: they can
/// only be produced by [`Expr::binary`], [`Expr::not`] and [`Expr::call`],
/// which apply constant folding and the algebraic rewrites as the node is
/// built, so every tree is always in simplified form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(Constant),
    Reg(Register),
    Mem(Box<Expr>),
    Param(String),
    Binary(Binary),
    Not(Negation),
    Call(Call),
}

impl Expr {
    pub fn constant(value: u16, width: Width) -> Self {
        Self::Const(Constant {
            value: value & width.mask(),
            width,
        })
    }

    pub fn byte(value: u8) -> Self {
        Self::constant(u16::from(value), Width::W8)
    }

    pub fn word(value: u16) -> Self {
        Self::constant(value, Width::W16)
    }

    pub fn reg(name: &str) -> Self {
        let width = if WIDE_REGISTERS.contains(&name) {
            Width::W16
        } else {
            Width::W8
        };
        Self::Reg(Register {
            name: name.to_string(),
            width,
        })
    }

    pub fn mem(addr: Expr) -> Self {
        Self::Mem(Box::new(addr))
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    pub fn as_const(&self) -> Option<u16> {
        match self {
            Self::Const(constant) => Some(constant.value),
            _ => None,
        }
    }

    pub fn is_const_value(&self, value: u16) -> bool {
        self.as_const() == Some(value)
    }

    pub fn as_binary(&self, op: BinOp) -> Option<&Binary> {
        match self {
            Self::Binary(binary) if binary.op == op => Some(binary),
            _ => None,
        }
    }

    pub fn as_call(&self, func: Func) -> Option<&Call> {
        match self {
            Self::Call(call) if call.func == func => Some(call),
            _ => None,
        }
    }

    pub fn width(&self) -> Width {
        match self {
            Self::Const(constant) => constant.width,
            Self::Reg(register) => register.width,
            Self::Mem(_) | Self::Not(_) | Self::Param(_) => Width::W8,
            Self::Binary(binary) => binary.op.width(),
            Self::Call(call) => call.func.width(),
        }
    }

    /// Bit positions this expression could possibly have set.
    pub fn value_mask(&self) -> u16 {
        match self {
            Self::Const(constant) => constant.value,
            Self::Reg(register) if FLAG_REGISTERS.contains(&register.name.as_str()) => 1,
            Self::Reg(register) => register.width.mask(),
            Self::Mem(_) => 0xFF,
            Self::Param(_) => 0xFFFF,
            Self::Not(_) => 1,
            Self::Binary(binary) => binary_value_mask(binary),
            Self::Call(call) => match call.func {
                Func::CarryOfAdd | Func::CarryOfSub => 1,
                func => func.width().mask(),
            },
        }
    }

    /// Names of every register this expression reads.
    pub fn registers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.walk(&mut |node| {
            if let Self::Reg(register) = node {
                out.insert(register.name.clone());
            }
        });
        out
    }

    /// Address expressions of every memory load in this expression.
    pub fn memory_refs(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_memory_refs(&mut out);
        out
    }

    fn collect_memory_refs<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Self::Mem(addr) => {
                out.push(addr);
                addr.collect_memory_refs(out);
            }
            Self::Binary(binary) => {
                binary.lhs.collect_memory_refs(out);
                binary.rhs.collect_memory_refs(out);
            }
            Self::Not(negation) => negation.inner.collect_memory_refs(out),
            Self::Call(call) => call.args.iter().for_each(|arg| arg.collect_memory_refs(out)),
            Self::Const(_) | Self::Reg(_) | Self::Param(_) => {}
        }
    }

    pub fn walk(&self, visit: &mut impl FnMut(&Expr)) {
        visit(self);
        match self {
            Self::Mem(addr) => addr.walk(visit),
            Self::Binary(binary) => {
                binary.lhs.walk(visit);
                binary.rhs.walk(visit);
            }
            Self::Not(negation) => negation.inner.walk(visit),
            Self::Call(call) => call.args.iter().for_each(|arg| arg.walk(visit)),
            Self::Const(_) | Self::Reg(_) | Self::Param(_) => {}
        }
    }

    pub fn has_params(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| found |= matches!(node, Self::Param(_)));
        found
    }
}

fn binary_value_mask(binary: &Binary) -> u16 {
    let lhs = binary.lhs.value_mask();
    let rhs = binary.rhs.value_mask();
    match binary.op {
        BinOp::And => lhs & rhs,
        BinOp::Or | BinOp::Xor => lhs | rhs,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Ge => 1,
        BinOp::Shl | BinOp::Shl16 => match binary.rhs.as_const() {
            Some(amount) => {
                let shifted = u32::from(lhs).checked_shl(u32::from(amount)).unwrap_or(0);
                (shifted & u32::from(binary.op.width().mask())) as u16
            }
            None => binary.op.width().mask(),
        },
        BinOp::Shr | BinOp::Shr16 => match binary.rhs.as_const() {
            Some(amount) => u32::from(lhs).checked_shr(u32::from(amount)).unwrap_or(0) as u16,
            None => binary.op.width().mask(),
        },
        BinOp::Add | BinOp::Sub | BinOp::Add16 | BinOp::Sub16 => binary.op.width().mask(),
    }
}
