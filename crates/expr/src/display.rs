use std::fmt;

use crate::{Expr, Width};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(constant) => match constant.width() {
                Width::W8 => write!(f, "0x{:02X}", constant.value()),
                Width::W16 => write!(f, "0x{:04X}", constant.value()),
            },
            Expr::Reg(register) => f.write_str(&register.name),
            Expr::Param(name) => f.write_str(name),
            Expr::Mem(addr) => write!(f, "[{addr}]"),
            Expr::Binary(binary) => {
                write_operand(f, binary.lhs())?;
                write!(f, " {} ", binary.op().symbol())?;
                write_operand(f, binary.rhs())
            }
            Expr::Not(negation) => {
                f.write_str("not ")?;
                write_operand(f, negation.inner())
            }
            Expr::Call(call) => {
                write!(f, "{}(", call.func().name())?;
                for (index, arg) in call.args().iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr) -> fmt::Result {
    match operand {
        Expr::Binary(_) | Expr::Not(_) => write!(f, "({operand})"),
        _ => write!(f, "{operand}"),
    }
}
