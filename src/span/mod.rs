use codespan_reporting::files::{Files, SimpleFile, SimpleFiles};
use std::{fmt, ops::Range};
use ustr::{ustr, Ustr};

pub type FileId = usize;

/// A byte range inside one file of a `FileSet`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub file_id: FileId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(file_id: FileId, start: usize, end: usize) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    pub fn initial(file_id: FileId) -> Self {
        Self::new(file_id, 0, 0)
    }

    pub fn unknown() -> Self {
        Self::new(usize::MAX, 0, 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.file_id == usize::MAX
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.file_id, self.start, self.end).cmp(&(other.file_id, other.start, other.end))
    }
}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A resolved, human readable source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub filename: Ustr,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn unknown() -> Self {
        Self {
            filename: ustr("-"),
            line: 0,
            column: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}:{}", self.filename, self.line, self.column)
        } else {
            write!(f, "{}", self.filename)
        }
    }
}

/// Maps spans to file names, lines and columns. The checker only ever reads
/// from it, so a single set can back many packages.
#[derive(Debug)]
pub struct FileSet {
    files: SimpleFiles<String, String>,
}

impl Default for FileSet {
    fn default() -> Self {
        Self {
            files: SimpleFiles::new(),
        }
    }
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> FileId {
        self.files.add(name.into(), source.into())
    }

    pub fn get_file(&self, file_id: FileId) -> Option<&SimpleFile<String, String>> {
        self.files.get(file_id).ok()
    }

    pub fn files(&self) -> &SimpleFiles<String, String> {
        &self.files
    }

    pub fn file_name(&self, file_id: FileId) -> Option<&str> {
        self.get_file(file_id).map(|file| file.name().as_str())
    }

    pub fn position(&self, span: Span) -> Position {
        if span.is_unknown() {
            return Position::unknown();
        }

        let filename = match self.file_name(span.file_id) {
            Some(name) => ustr(name),
            None => return Position::unknown(),
        };

        let line_index = match self.files.line_index(span.file_id, span.start) {
            Ok(index) => index,
            Err(_) => {
                return Position {
                    filename,
                    line: 0,
                    column: 0,
                }
            }
        };

        let line = self
            .files
            .line_number(span.file_id, line_index)
            .unwrap_or(line_index + 1);

        let column = self
            .files
            .column_number(span.file_id, line_index, span.start)
            .unwrap_or(1);

        Position {
            filename,
            line,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_line_and_column() {
        let mut fset = FileSet::new();
        let file = fset.add_file("a.go", "package a\nvar x = 1\n");

        let pos = fset.position(Span::new(file, 14, 15));
        assert_eq!(pos.filename.as_str(), "a.go");
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 5);
        assert_eq!(pos.to_string(), "a.go:2:5");
    }

    #[test]
    fn spans_order_by_file_then_offset() {
        let a = Span::new(0, 10, 12);
        let b = Span::new(0, 4, 30);
        let c = Span::new(1, 0, 1);
        let mut spans = vec![c, a, b];
        spans.sort();
        assert_eq!(spans, vec![b, a, c]);
        assert!(b.contains(10) && !a.contains(12));
    }

    #[test]
    fn unknown_span_has_no_position() {
        let fset = FileSet::new();
        assert!(!fset.position(Span::unknown()).is_valid());
    }
}
