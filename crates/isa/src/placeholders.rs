//! Operands selected by the bit fields captured from an opcode byte.

use gbdec_expr::Expr;

/// `None` is the byte addressed by HL.
const REG8: [Option<&str>; 8] = [
    Some("B"),
    Some("C"),
    Some("D"),
    Some("E"),
    Some("H"),
    Some("L"),
    None,
    Some("A"),
];
const REG16_SP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const REG16_AF: [&str; 4] = ["BC", "DE", "HL", "AF"];

/// Maps a captured field to its operand. `r`, `s` and `d` select an 8-bit
/// register or the byte at HL, `q` and `p` a register pair, `c` a branch
/// condition and `t` a restart vector. Any other letter is the raw value.
pub fn placeholder(letter: char, value: u16) -> Expr {
    match letter {
        'r' | 's' | 'd' => match REG8[usize::from(value & 7)] {
            Some(name) => Expr::reg(name),
            None => Expr::mem(Expr::reg("HL")),
        },
        'q' => Expr::reg(REG16_SP[usize::from(value & 3)]),
        'p' => Expr::reg(REG16_AF[usize::from(value & 3)]),
        'c' => condition(value & 3),
        't' => Expr::word((value & 7) * 8),
        _ => Expr::byte(value as u8),
    }
}

fn condition(code: u16) -> Expr {
    let flag = if code < 2 { "FZ" } else { "FC" };
    if code % 2 == 0 {
        Expr::not(Expr::reg(flag))
    } else {
        Expr::reg(flag)
    }
}
