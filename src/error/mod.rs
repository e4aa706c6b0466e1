pub mod emitter;

use crate::span::{FileId, FileSet, Position, Span};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use std::fmt;

pub use emitter::{emit_errors, ErrorEmitter};

/// The category of a checking error. Softness is a property of the kind.
#[derive(strum_macros::IntoStaticStr, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorKind {
    Redeclaration,
    UndefinedIdentifier,
    CyclicDeclaration,
    TypeMismatch,
    ConstantOverflow,
    Import,
    InvalidRecursiveType,
    /// Any other hard error: invalid operands, misuse of built-ins, bad
    /// statements and the like.
    InvalidOperation,
    UnusedImport,
    UnusedVariable,
    UnusedLabel,
}

impl ErrorKind {
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ErrorKind::UnusedImport | ErrorKind::UnusedVariable | ErrorKind::UnusedLabel
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

/// A type checking error. Secondary errors that elaborate on a primary one
/// (e.g. the participants of a cycle) have messages starting with `'\t'`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{position}: {msg}")]
pub struct Error {
    pub kind: ErrorKind,
    pub span: Span,
    pub position: Position,
    pub msg: String,
    pub soft: bool,
}

impl Error {
    pub fn new(fset: &FileSet, kind: ErrorKind, span: Span, msg: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            position: fset.position(span),
            msg: msg.into(),
            soft: kind.is_soft(),
        }
    }

    pub fn is_secondary(&self) -> bool {
        self.msg.starts_with('\t')
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let severity = if self.soft {
            Severity::Warning
        } else {
            Severity::Error
        };

        let diagnostic = Diagnostic::new(severity)
            .with_message(self.msg.trim_start())
            .with_code(self.kind.to_string());

        if self.span.is_unknown() {
            diagnostic
        } else {
            diagnostic.with_labels(vec![Label::primary(self.span.file_id, self.span.range())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let mut fset = FileSet::new();
        let file = fset.add_file("main.go", "package main\nvar x int = \"s\"\n");
        let err = Error::new(&fset, ErrorKind::TypeMismatch, Span::new(file, 25, 28), "bad");
        assert_eq!(err.to_string(), "main.go:2:13: bad");
        assert!(!err.soft);
    }

    #[test]
    fn softness_follows_kind() {
        let fset = FileSet::new();
        let err = Error::new(&fset, ErrorKind::UnusedVariable, Span::unknown(), "x declared but not used");
        assert!(err.soft);
        assert!(!err.is_secondary());
        assert_eq!(err.to_diagnostic().severity, Severity::Warning);
    }
}
