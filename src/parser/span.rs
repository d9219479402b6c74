//! Source file and span utilities

use crate::diagnostics::Span;
use std::path::PathBuf;

/// A source file with its content and line information
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    content: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Create a new source file
    pub fn new(path: PathBuf, content: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            path,
            content,
            line_starts,
        }
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Get the file content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Create a span for a byte range
    pub fn span(&self, start: usize, end: usize) -> Span {
        let (line, col) = self.line_col(start);
        Span {
            start,
            end,
            line,
            col,
        }
    }

    /// Create a span covering the end of the file
    pub fn eof_span(&self) -> Span {
        self.span(self.content.len(), self.content.len())
    }

    /// Convert a byte offset to line and column (1-indexed)
    fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        (line + 1, offset - line_start + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let file = SourceFile::new(PathBuf::from("test.rl"), "ab\ncd\nef".to_string());
        assert_eq!(file.span(0, 1).line, 1);
        assert_eq!(file.span(0, 1).col, 1);
        assert_eq!(file.span(3, 4).line, 2);
        assert_eq!(file.span(4, 5).col, 2);
        assert_eq!(file.span(6, 8).line, 3);
    }
}
