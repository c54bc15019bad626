use super::{Diagnostic, Severity};
use crate::source::SourceMap;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_color {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }

    fn bold_red(&self, s: &str) -> String {
        self.paint("1;31", s)
    }

    fn yellow(&self, s: &str) -> String {
        self.paint("1;33", s)
    }

    fn cyan(&self, s: &str) -> String {
        self.paint("36", s)
    }

    fn dim(&self, s: &str) -> String {
        self.paint("2", s)
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[FRM-P001]: message"
        let mut head = d.severity.name().to_string();
        if let Some(code) = d.code {
            head.push_str(&format!("[{code}]"));
        }
        let head = match d.severity {
            Severity::Error => self.bold_red(&head),
            Severity::Warning => self.yellow(&head),
        };
        out.push_str(&format!("{}: {}\n", head, self.bold(&d.message)));

        let primary = d.labels.iter().find(|l| l.is_primary);
        if let (Some(label), Some(source)) = (primary, &d.source) {
            let map = SourceMap::new(source);
            let (line, col) = map.lookup(label.span.start);
            let line_text = map.line_text(source, line);

            out.push_str(&format!("  {} {}:{}\n", self.cyan("-->"), line, col));

            let gutter = line.to_string().len();
            let pipe = self.cyan("|");
            let pad = " ".repeat(gutter);

            out.push_str(&format!("{pad} {pipe}\n"));
            let line_num = self.cyan(&format!("{line:>gutter$}"));
            out.push_str(&format!("{line_num} {pipe} {line_text}\n"));

            // Underline at most to the end of the line.
            let room = line_text.len().saturating_sub(col - 1).max(1);
            let span_len = label.span.len().clamp(1, room);
            let carets = self.bold_red(&"^".repeat(span_len));
            let indent = " ".repeat(col - 1);
            if label.message.is_empty() {
                out.push_str(&format!("{pad} {pipe} {indent}{carets}\n"));
            } else {
                out.push_str(&format!(
                    "{pad} {pipe} {indent}{carets} {}\n",
                    self.bold_red(&label.message)
                ));
            }
            out.push_str(&format!("{pad} {pipe}\n"));
        }

        for label in d.labels.iter().filter(|l| !l.is_primary) {
            if !label.message.is_empty() {
                out.push_str(&format!("  {} {}\n", self.dim("="), label.message));
            }
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} suggestion: {}\n", self.dim("="), suggestion));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;

    const LIB: &str = "Mandel {\n  z = 0:\n  z = z*z + + pixel\n}";

    fn make_diag(start: usize, end: usize) -> Diagnostic {
        Diagnostic::error("Should be an Argument")
            .with_code(Some("FRM-P000"))
            .with_span(Span::new(start, end), "here")
            .with_source(LIB)
            .with_note("in formula 'Mandel'")
            .with_suggestion("remove the extra operator")
    }

    #[test]
    fn render_contains_code_and_message() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag(30, 31));
        assert!(out.starts_with("error[FRM-P000]: Should be an Argument"), "{out}");
    }

    #[test]
    fn render_points_at_line_and_column() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag(30, 31));
        assert!(out.contains("--> 3:13"), "{out}");
        assert!(out.contains("3 |   z = z*z + + pixel"), "{out}");
        assert!(out.contains(&format!("| {}^ here", " ".repeat(12))), "{out}");
    }

    #[test]
    fn render_notes_and_suggestion() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag(30, 31));
        assert!(out.contains("note: in formula 'Mandel'"));
        assert!(out.contains("suggestion: remove the extra operator"));
    }

    #[test]
    fn render_without_source_has_no_snippet() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&Diagnostic::error("no formula named 'x'"));
        assert_eq!(out, "error: no formula named 'x'\n");
    }

    #[test]
    fn warning_header() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&Diagnostic::warning("Symmetry below is invalid, will use NOSYM"));
        assert!(out.starts_with("warning: "));
    }

    #[test]
    fn color_toggles_escape_codes() {
        let d = make_diag(30, 31);
        assert!(AnsiRenderer { use_color: true }.render(&d).contains("\x1b["));
        assert!(!AnsiRenderer { use_color: false }.render(&d).contains("\x1b["));
    }

    #[test]
    fn caret_length_matches_span() {
        let r = AnsiRenderer { use_color: false };
        let d = Diagnostic::error("bad")
            .with_span(Span::new(23, 26), "")
            .with_source(LIB);
        let out = r.render(&d);
        assert!(out.contains("^^^\n"), "{out}");
    }
}
