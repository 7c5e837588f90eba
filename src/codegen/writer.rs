//! Indent-aware string builder for JavaScript code generation.
//!
//! Generated JavaScript uses 2-space indentation. The writer also counts
//! output lines and columns so statement emitters can record source-map
//! entries before writing.

/// Indent-aware string builder that produces formatted JavaScript source.
pub struct CodeWriter {
    buf: String,
    indent_level: usize,
    /// True if the current line has not yet been written to.
    at_line_start: bool,
    /// Completed lines so far; also the 0-based index of the current line.
    lines_written: u32,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(4096),
            indent_level: 0,
            at_line_start: true,
            lines_written: 0,
        }
    }

    /// Write a complete line (appends newline). Text spanning several lines
    /// (match IIFEs, lambda blocks) advances the line counter accordingly.
    pub fn line(&mut self, text: &str) {
        self.write_indent();
        self.buf.push_str(text);
        self.buf.push('\n');
        self.at_line_start = true;
        self.lines_written += 1 + text.matches('\n').count() as u32;
    }

    /// Write an empty line.
    pub fn blank(&mut self) {
        self.buf.push('\n');
        self.at_line_start = true;
        self.lines_written += 1;
    }

    /// Write pre-formatted multi-line text at the current indent.
    pub fn raw(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.blank();
            } else {
                self.line(line);
            }
        }
    }

    /// Increase indent by one level.
    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decrease indent by one level.
    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// Write `text {` and increase indent (e.g. `if (cond) {`).
    pub fn block_open(&mut self, text: &str) {
        self.line(&format!("{} {{", text));
        self.indent();
    }

    /// Decrease indent and write `}`.
    pub fn block_close(&mut self) {
        self.dedent();
        self.line("}");
    }

    /// Decrease indent and write `};`.
    pub fn block_close_semi(&mut self) {
        self.dedent();
        self.line("};");
    }

    /// Decrease indent and write `} else {` and re-indent.
    pub fn block_else(&mut self) {
        self.dedent();
        self.line("} else {");
        self.indent();
    }

    /// 0-based line the next `line()` call will land on.
    pub fn current_line(&self) -> u32 {
        self.lines_written
    }

    /// 0-based column the next `line()` call will start at.
    pub fn current_col(&self) -> u32 {
        if self.at_line_start {
            (self.indent_level * 2) as u32
        } else {
            0
        }
    }

    /// Consume the writer and return the generated string.
    pub fn finish(self) -> String {
        self.buf
    }

    fn write_indent(&mut self) {
        if self.at_line_start && self.indent_level > 0 {
            for _ in 0..self.indent_level {
                self.buf.push_str("  ");
            }
        }
        self.at_line_start = false;
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_line() {
        let mut w = CodeWriter::new();
        w.line("const x = 1;");
        assert_eq!(w.finish(), "const x = 1;\n");
    }

    #[test]
    fn block_open_close() {
        let mut w = CodeWriter::new();
        w.block_open("if (true)");
        w.line("doStuff();");
        w.block_close();
        assert_eq!(w.finish(), "if (true) {\n  doStuff();\n}\n");
    }

    #[test]
    fn block_else() {
        let mut w = CodeWriter::new();
        w.block_open("if (x)");
        w.line("a();");
        w.block_else();
        w.line("b();");
        w.block_close();
        assert_eq!(w.finish(), "if (x) {\n  a();\n} else {\n  b();\n}\n");
    }

    #[test]
    fn tracks_line_and_column() {
        let mut w = CodeWriter::new();
        assert_eq!(w.current_line(), 0);
        w.line("first();");
        assert_eq!(w.current_line(), 1);
        w.block_open("function f()");
        assert_eq!(w.current_line(), 2);
        assert_eq!(w.current_col(), 2);
        w.block_close();
        assert_eq!(w.current_line(), 4);
        assert_eq!(w.current_col(), 0);
    }

    #[test]
    fn embedded_newlines_advance_line_counter() {
        let mut w = CodeWriter::new();
        w.line("const x = ((s) => {\n  return s;\n})(y);");
        assert_eq!(w.current_line(), 3);
    }

    #[test]
    fn raw_preserves_blank_lines() {
        let mut w = CodeWriter::new();
        w.indent();
        w.raw("a();\n\nb();");
        assert_eq!(w.finish(), "  a();\n\n  b();\n");
    }

    #[test]
    fn dedent_saturates_at_zero() {
        let mut w = CodeWriter::new();
        w.dedent();
        w.line("x;");
        assert_eq!(w.finish(), "x;\n");
    }
}
