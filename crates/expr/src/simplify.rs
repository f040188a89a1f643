//! Smart constructors. Each operator has one rewrite rule, looked up by tag,
//! that runs exactly once when a node is built.

use crate::{BinOp, Binary, Call, Expr, Func, Negation, Width};

type BinaryRule = fn(BinOp, Expr, Expr) -> Expr;
type CallRule = fn(Func, Vec<Expr>) -> Expr;

fn binary_rule(op: BinOp) -> BinaryRule {
    match op {
        BinOp::Add | BinOp::Add16 => add,
        BinOp::And => and,
        BinOp::Or => or,
        BinOp::Shl | BinOp::Shr => shift,
        BinOp::Sub
        | BinOp::Xor
        | BinOp::Eq
        | BinOp::Ne
        | BinOp::Lt
        | BinOp::Ge
        | BinOp::Sub16
        | BinOp::Shl16
        | BinOp::Shr16 => fold,
    }
}

fn call_rule(func: Func) -> CallRule {
    match func {
        Func::PopValue | Func::PopStack => pop,
        Func::Word => word,
        Func::Push | Func::HighByte | Func::LowByte | Func::CarryOfAdd | Func::CarryOfSub => {
            fold_call
        }
    }
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        binary_rule(op)(op, lhs, rhs)
    }

    pub fn not(inner: Expr) -> Expr {
        if let Expr::Binary(binary) = &inner
            && let Some(inverse) = binary.op.inverse()
        {
            return Expr::binary(inverse, (*binary.lhs).clone(), (*binary.rhs).clone());
        }
        Expr::Not(Negation {
            inner: Box::new(inner),
        })
    }

    pub fn call(func: Func, args: Vec<Expr>) -> Expr {
        debug_assert_eq!(args.len(), func.arity(), "arity of {}", func.name());
        call_rule(func)(func, args)
    }

    /// Rebuilds the tree bottom-up through the smart constructors. On a tree
    /// that was itself built by them this returns an equal tree.
    pub fn rebuild(&self) -> Expr {
        match self {
            Expr::Const(_) | Expr::Reg(_) | Expr::Param(_) => self.clone(),
            Expr::Mem(addr) => Expr::mem(addr.rebuild()),
            Expr::Binary(binary) => {
                Expr::binary(binary.op, binary.lhs.rebuild(), binary.rhs.rebuild())
            }
            Expr::Not(negation) => Expr::not(negation.inner.rebuild()),
            Expr::Call(call) => Expr::call(call.func, call.args.iter().map(Expr::rebuild).collect()),
        }
    }
}

fn raw(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn fold(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    match (lhs.as_const(), rhs.as_const()) {
        (Some(l), Some(r)) => Expr::constant(op.calculate(l, r), op.width()),
        _ => raw(op, lhs, rhs),
    }
}

fn constant_right(lhs: Expr, rhs: Expr) -> (Expr, Expr) {
    if lhs.as_const().is_some() {
        (rhs, lhs)
    } else {
        (lhs, rhs)
    }
}

fn add(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let (lhs, rhs) = if op == BinOp::Add16 {
        constant_right(lhs, rhs)
    } else {
        (lhs, rhs)
    };
    if lhs.is_const_value(0) {
        return rhs;
    }
    if rhs.is_const_value(0) {
        return lhs;
    }
    if lhs == rhs {
        let doubled = if op == BinOp::Add16 {
            BinOp::Shl16
        } else {
            BinOp::Shl
        };
        return Expr::binary(doubled, lhs, Expr::byte(1));
    }
    fold(op, lhs, rhs)
}

fn and(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let (lhs, rhs) = constant_right(lhs, rhs);
    if lhs.as_const().is_some() {
        return fold(op, lhs, rhs);
    }

    if let Some(mask) = rhs.as_const() {
        let possible = lhs.value_mask();
        if possible & mask == possible {
            return lhs;
        }
        if possible & mask == 0 {
            return Expr::constant(0, op.width());
        }
        if let Expr::Binary(inner) = &lhs
            && inner.op == BinOp::And
            && let Some(inner_mask) = inner.rhs.as_const()
        {
            let merged = Expr::constant(inner_mask & mask, op.width());
            return Expr::binary(BinOp::And, (*inner.lhs).clone(), merged);
        }
    }

    if lhs == rhs {
        return lhs;
    }
    fold(op, lhs, rhs)
}

fn or(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let (lhs, rhs) = constant_right(lhs, rhs);
    if rhs.is_const_value(0) {
        return lhs;
    }
    if let (Some(left), Some(right)) = (lhs.as_binary(BinOp::And), rhs.as_binary(BinOp::And))
        && left.lhs == right.lhs
    {
        let merged = Expr::binary(BinOp::Or, (*left.rhs).clone(), (*right.rhs).clone());
        return Expr::binary(BinOp::And, (*left.lhs).clone(), merged);
    }
    fold(op, lhs, rhs)
}

/// Rules shared by the 8-bit shifts. Only a constant amount on the right is
/// rewritten; the operands of a shift are never swapped.
fn shift(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let (Some(amount), None) = (rhs.as_const(), lhs.as_const()) else {
        return fold(op, lhs, rhs);
    };
    if amount == 0 {
        return lhs;
    }
    let opposite = if op == BinOp::Shl { BinOp::Shr } else { BinOp::Shl };

    if let Some(inner) = lhs.as_binary(op)
        && let Some(inner_amount) = inner.rhs.as_const()
    {
        let total = Expr::byte(amount.saturating_add(inner_amount).min(0xFF) as u8);
        return Expr::binary(op, (*inner.lhs).clone(), total);
    }

    if let Some(inner) = lhs.as_binary(opposite)
        && let Some(inner_amount) = inner.rhs.as_const()
    {
        let mask = match op {
            BinOp::Shl => shl8(shr8(0xFF, inner_amount), amount),
            _ => shr8(shl8(0xFF, inner_amount), amount),
        };
        let net = i32::from(amount) - i32::from(inner_amount);
        let (direction, distance) = if net < 0 {
            (opposite, -net)
        } else {
            (op, net)
        };
        let shifted = Expr::binary(direction, (*inner.lhs).clone(), Expr::byte(distance as u8));
        return Expr::binary(BinOp::And, shifted, Expr::byte(mask as u8));
    }

    if let Some(inner) = lhs.as_binary(BinOp::And) {
        let left = Expr::binary(op, (*inner.lhs).clone(), rhs.clone());
        let right = Expr::binary(op, (*inner.rhs).clone(), rhs);
        return Expr::binary(BinOp::And, left, right);
    }

    fold(op, lhs, rhs)
}

fn shl8(value: u16, amount: u16) -> u16 {
    BinOp::Shl.calculate(value, amount)
}

fn shr8(value: u16, amount: u16) -> u16 {
    BinOp::Shr.calculate(value, amount)
}

fn raw_call(func: Func, args: Vec<Expr>) -> Expr {
    Expr::Call(Call { func, args })
}

fn fold_call(func: Func, args: Vec<Expr>) -> Expr {
    let values: Option<Vec<u16>> = args.iter().map(Expr::as_const).collect();
    match values.and_then(|values| func.calculate(&values)) {
        Some(value) => Expr::constant(value, func.width()),
        None => raw_call(func, args),
    }
}

/// Popping right after a push yields what was pushed: `popval` the value,
/// `popst` the stack pointer from before the push.
fn pop(func: Func, args: Vec<Expr>) -> Expr {
    if let [Expr::Call(pushed)] = args.as_slice()
        && pushed.func == Func::Push
        && let [stack, value] = pushed.args.as_slice()
    {
        return match func {
            Func::PopStack => stack.clone(),
            _ => value.clone(),
        };
    }
    raw_call(func, args)
}

fn word(func: Func, args: Vec<Expr>) -> Expr {
    let [hi, lo] = args.as_slice() else {
        return raw_call(func, args);
    };
    if hi.as_const().is_some() && lo.as_const().is_some() {
        return fold_call(func, args);
    }

    if let (Some(high), Some(low)) = (hi.as_call(Func::HighByte), lo.as_call(Func::LowByte))
        && high.args == low.args
    {
        return high.args[0].clone();
    }

    if hi.is_const_value(0) {
        return lo.clone();
    }

    if let (Some(high), Some(low)) = (hi.as_binary(BinOp::Shr), lo.as_binary(BinOp::Shl))
        && high.lhs == low.lhs
        && let (Some(hi_shift), Some(lo_shift)) = (high.rhs.as_const(), low.rhs.as_const())
        && hi_shift + lo_shift == 8
    {
        return Expr::binary(
            BinOp::Shl16,
            (*low.lhs).clone(),
            Expr::constant(lo_shift, Width::W8),
        );
    }

    raw_call(func, args)
}
