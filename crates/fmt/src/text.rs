use gbdec_core::{Renderer, Scope, default_symbol};
use gbdec_rom::Address;

const INDENT: &str = "    ";
const HLINE_WIDTH: usize = 40;

/// Plain-text listing: one line per instruction, address column first,
/// `;` comments and `name:` labels.
#[derive(Debug, Clone, Default)]
pub struct TextRenderer {
    out: String,
    line: Option<String>,
    indent: usize,
    comments: usize,
    in_line_addr: bool,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(mut self) -> String {
        self.end_line();
        self.out
    }

    fn symbol(addr: Address) -> String {
        default_symbol(addr).map_or_else(|| addr.to_string(), str::to_string)
    }

    fn line_mut(&mut self) -> &mut String {
        let prefix = if self.comments > 0 { "; " } else { "" };
        let indent = INDENT.repeat(self.indent);
        self.line
            .get_or_insert_with(|| format!("{indent}{prefix}"))
    }

    fn end_line(&mut self) {
        if let Some(line) = self.line.take() {
            self.out.push_str(line.trim_end());
            self.out.push('\n');
        }
    }
}

impl Renderer for TextRenderer {
    fn label(&mut self, addr: Address) {
        self.end_line();
        self.out.push_str(&Self::symbol(addr));
        self.out.push_str(":\n");
    }

    fn write(&mut self, text: &str) {
        self.line_mut().push_str(text);
    }

    fn write_symbol(&mut self, addr: Address) {
        let symbol = Self::symbol(addr);
        self.write(&symbol);
    }

    fn hline(&mut self) {
        self.end_line();
        self.write(&"-".repeat(HLINE_WIDTH));
        self.end_line();
    }

    fn new_line(&mut self) {
        self.end_line();
    }

    fn enter(&mut self, scope: Scope) {
        match scope {
            Scope::LineAddr(addr) => {
                self.end_line();
                self.line = Some(format!("{}{addr}  ", INDENT.repeat(self.indent)));
                self.in_line_addr = true;
            }
            Scope::Comment => {
                if let Some(line) = &mut self.line {
                    line.push_str(" ; ");
                }
                self.comments += 1;
            }
            Scope::Indent => self.indent += 1,
        }
    }

    fn leave(&mut self, scope: Scope) {
        match scope {
            Scope::LineAddr(_) => {
                self.end_line();
                self.in_line_addr = false;
            }
            Scope::Comment => {
                self.comments = self.comments.saturating_sub(1);
                if self.comments == 0 && !self.in_line_addr {
                    self.end_line();
                }
            }
            Scope::Indent => self.indent = self.indent.saturating_sub(1),
        }
    }
}
