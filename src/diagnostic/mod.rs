pub mod ansi;
pub mod classic;
pub mod json;
pub mod registry;

use serde::Serialize;

use crate::entry::HeaderError;
use crate::formula::LoadError;
use crate::prescan::ParseError;
use crate::source::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    pub fn with_code(mut self, code: Option<&'static str>) -> Self {
        self.code = code;
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: label.into(),
            is_primary: true,
        });
        self
    }

    pub fn with_secondary_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: label.into(),
            is_primary: false,
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ── Message sink ───────────────────────────────────────────────────────────

/// Where load-time messages go: the classic error block for syntax errors
/// and the invalid-symmetry warning.
pub trait MessageSink {
    fn report(&mut self, severity: Severity, text: &str);
}

/// Writes every message to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl MessageSink for StderrSink {
    fn report(&mut self, severity: Severity, text: &str) {
        eprintln!("{}: {text}", severity.name());
    }
}

/// Keeps messages for the caller to inspect.
#[derive(Debug, Default, Clone)]
pub struct CollectSink {
    pub messages: Vec<(Severity, String)>,
}

impl MessageSink for CollectSink {
    fn report(&mut self, severity: Severity, text: &str) {
        self.messages.push((severity, text.to_string()));
    }
}

// ---- From impls for error types ----

impl From<&ParseError> for Diagnostic {
    fn from(e: &ParseError) -> Self {
        let mut d = Diagnostic::error(e.kind.message())
            .with_code(registry::parse_code(e.kind))
            .with_span(e.span, "here");
        if e.statement_start < e.span.start {
            d = d.with_secondary_span(
                Span::new(e.statement_start, e.span.start),
                "in this statement",
            );
        }
        d
    }
}

impl From<&HeaderError> for Diagnostic {
    fn from(e: &HeaderError) -> Self {
        let mut d = Diagnostic::error(e.kind.message()).with_code(registry::parse_code(e.kind));
        if let Some(name) = &e.detail {
            d = d.with_note(format!("name starts '{name}'"));
        }
        d
    }
}

impl LoadError {
    /// One diagnostic per problem. Syntax errors carry the library text so
    /// renderers can show the offending line.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            LoadError::Header(e) => vec![Diagnostic::from(e)],
            LoadError::Prescan { errors, text, .. } => errors
                .iter()
                .map(|e| Diagnostic::from(e).with_source(text.clone()))
                .collect(),
            other => {
                let mut d = Diagnostic::error(other.to_string()).with_code(registry::load_code(other));
                if let LoadError::NotFound { .. } = other {
                    d = d.with_suggestion("run with --list to see the formulas in the file");
                }
                vec![d]
            }
        }
    }
}
