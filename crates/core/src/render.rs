use std::fmt;

use gbdec_isa::{Flow, Instruction};
use gbdec_rom::Address;

/// Nestable output regions. Every `enter` is matched by a `leave` of the same
/// scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One listing line attributed to an address.
    LineAddr(Address),
    Comment,
    Indent,
}

/// Output sink for disassembly listings. Analyses describe what to show and
/// the renderer decides how it looks.
pub trait Renderer {
    fn label(&mut self, addr: Address);

    fn write(&mut self, text: &str);

    /// Writes a reference to `addr`, by name where one is known.
    fn write_symbol(&mut self, addr: Address);

    fn hline(&mut self);

    fn new_line(&mut self);

    fn enter(&mut self, scope: Scope);

    fn leave(&mut self, scope: Scope);

    fn scoped(&mut self, scope: Scope, body: impl FnOnce(&mut Self))
    where
        Self: Sized,
    {
        self.enter(scope);
        body(self);
        self.leave(scope);
    }

    fn render_list<T: fmt::Display>(&mut self, items: &[T])
    where
        Self: Sized,
    {
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                self.write(", ");
            }
            self.write(&item.to_string());
        }
    }
}

/// One instruction on its own line, with branch targets written as symbols.
pub fn render_instruction<R: Renderer>(renderer: &mut R, instr: &Instruction) {
    renderer.scoped(Scope::LineAddr(instr.address()), |out| {
        out.write(instr.mnemonic());
        if let Flow::Switch { table } = instr.flow() {
            out.write(" ");
            out.write_symbol(*table);
            return;
        }
        let target = instr.direct_target();
        for (index, operand) in instr.operands().iter().enumerate() {
            out.write(if index == 0 { " " } else { ", " });
            match target {
                Some(target) if operand.as_const() == Some(target.virtual_address()) => {
                    out.write_symbol(target)
                }
                _ => out.write(&operand.to_string()),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbdec_expr::Expr;
    use gbdec_isa::Footprint;

    /// Records calls as short tokens.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl Renderer for Trace {
        fn label(&mut self, addr: Address) {
            self.0.push(format!("label {addr}"));
        }
        fn write(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
        fn write_symbol(&mut self, addr: Address) {
            self.0.push(format!("sym {addr}"));
        }
        fn hline(&mut self) {
            self.0.push("---".to_string());
        }
        fn new_line(&mut self) {
            self.0.push("nl".to_string());
        }
        fn enter(&mut self, scope: Scope) {
            self.0.push(format!("enter {scope:?}"));
        }
        fn leave(&mut self, scope: Scope) {
            self.0.push(format!("leave {scope:?}"));
        }
    }

    #[test]
    fn instruction_targets_are_symbols() {
        let addr = Address::from_virtual(0x150);
        let call = Instruction::new(addr, 3, "CALL", 6, vec![Expr::word(0x2000)], Footprint::default());
        let mut trace = Trace::default();
        render_instruction(&mut trace, &call);
        assert_eq!(
            trace.0,
            vec![
                format!("enter LineAddr({addr:?})"),
                "CALL".to_string(),
                " ".to_string(),
                "sym 0000:2000".to_string(),
                format!("leave LineAddr({addr:?})"),
            ]
        );
    }

    #[test]
    fn list_items_are_comma_separated() {
        let mut trace = Trace::default();
        trace.render_list(&["a", "b"]);
        assert_eq!(trace.0, vec!["a", ", ", "b"]);
    }
}
