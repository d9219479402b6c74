//! Diagnostic reporting for the Rill compiler
//!
//! This module provides structured error reporting with stable error codes,
//! source spans, and machine-readable JSON output.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod error_codes;
pub use error_codes::*;

/// A source location span
///
/// Spans are byte ranges into a single source file, plus the 1-indexed
/// line/column of the range start. Every AST node carries one, so the type
/// stays `Copy` and does not own the file path; diagnostics attach the path
/// when they are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (0-indexed)
    pub start: usize,

    /// End byte offset (0-indexed, exclusive)
    pub end: usize,

    /// Line of the range start (1-indexed)
    pub line: usize,

    /// Column of the range start (1-indexed)
    pub col: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self {
            start,
            end,
            line,
            col,
        }
    }

    /// Merge two spans into one that covers both
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: if self.start <= other.start {
                self.line
            } else {
                other.line
            },
            col: if self.start <= other.start {
                self.col
            } else {
                other.col
            },
        }
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// An additional note attached to a diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Note message
    pub message: String,
}

impl Note {
    /// Create a new note with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A compiler diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable error code (e.g., "E2003")
    pub code: String,

    /// Severity level
    pub severity: Severity,

    /// Primary message
    pub message: String,

    /// Source file the span points into
    pub file: PathBuf,

    /// Primary source span
    pub span: Span,

    /// Additional notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder {
            code: code.into(),
            severity: Severity::Error,
            message: String::new(),
            file: PathBuf::new(),
            span: Span::default(),
            notes: Vec::new(),
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder {
            code: code.into(),
            severity: Severity::Warning,
            message: String::new(),
            file: PathBuf::new(),
            span: Span::default(),
            notes: Vec::new(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }

    /// Format as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format as human-readable string
    pub fn to_human_readable(&self, source: &str) -> String {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };

        let mut output = format!(
            "{}[{}]: {}\n  --> {}:{}:{}\n",
            severity,
            self.code,
            self.message,
            self.file.display(),
            self.span.line,
            self.span.col
        );

        // Show the offending line with an underline
        let lines: Vec<&str> = source.lines().collect();
        if self.span.line > 0 && self.span.line <= lines.len() {
            let line = lines[self.span.line - 1];
            output.push_str(&format!("   |\n{:>3} | {}\n   |", self.span.line, line));

            let underline_start = self.span.col.saturating_sub(1).min(line.len());
            let underline_len = (self.span.end - self.span.start)
                .max(1)
                .min(line.len().saturating_sub(underline_start).max(1));
            output.push_str(&format!(
                " {}{}\n",
                " ".repeat(underline_start),
                "^".repeat(underline_len)
            ));
        }

        for note in &self.notes {
            output.push_str(&format!("   = note: {}\n", note.message));
        }

        output
    }
}

/// Builder for constructing diagnostics
pub struct DiagnosticBuilder {
    code: String,
    severity: Severity,
    message: String,
    file: PathBuf,
    span: Span,
    notes: Vec<Note>,
}

impl DiagnosticBuilder {
    /// Set the message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the source file
    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = file.into();
        self
    }

    /// Set the primary span
    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Add a note
    pub fn note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    /// Build the diagnostic
    pub fn build(self) -> Diagnostic {
        Diagnostic {
            code: self.code,
            severity: self.severity,
            message: self.message,
            file: self.file,
            span: self.span,
            notes: self.notes,
        }
    }
}

/// A collection of diagnostics
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    /// Create a new empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    /// Count errors
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Get all diagnostics
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get the number of diagnostics
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Check if the bag is empty
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Format all diagnostics as JSON
    pub fn to_json(&self) -> String {
        let json_array: Vec<String> = self.diagnostics.iter().map(|d| d.to_json()).collect();
        format!("[{}]", json_array.join(","))
    }

    /// Format all diagnostics as human-readable text
    pub fn format_text(&self, source: &str) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.to_human_readable(source))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl From<Diagnostic> for DiagnosticBag {
    fn from(diagnostic: Diagnostic) -> Self {
        let mut bag = DiagnosticBag::new();
        bag.push(diagnostic);
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_json() {
        let diag = Diagnostic::error("E2003")
            .message("type mismatch")
            .file("test.rl")
            .span(Span::new(10, 20, 1, 11))
            .build();

        let json = diag.to_json();
        assert!(json.contains("E2003"));
        assert!(json.contains("type mismatch"));
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(10, 20, 1, 11);
        let b = Span::new(15, 30, 2, 5);

        let merged = a.to(b);
        assert_eq!(merged.start, 10);
        assert_eq!(merged.end, 30);
        assert_eq!(merged.line, 1);
    }

    #[test]
    fn test_diagnostic_human_readable() {
        let diag = Diagnostic::error("E2002")
            .message("use of undeclared name `foo`")
            .file("test.rl")
            .span(Span::new(0, 3, 1, 1))
            .build();

        let output = diag.to_human_readable("foo");
        assert!(output.contains("error[E2002]"));
        assert!(output.contains("undeclared name"));
        assert!(output.contains("^^^"));
    }

    #[test]
    fn test_diagnostic_bag_operations() {
        let mut bag = DiagnosticBag::new();
        assert!(bag.is_empty());

        bag.push(Diagnostic::error("E1001").message("boom").build());
        bag.push(Diagnostic::warning("W0001").message("meh").build());

        assert_eq!(bag.len(), 2);
        assert!(bag.has_errors());
        assert_eq!(bag.error_count(), 1);
    }
}
