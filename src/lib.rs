//! The type checking core of a front end for a Go-like language: name
//! resolution, type inference and exact constant folding over a package,
//! invocable repeatedly against a growing package.

pub mod ast;
pub mod check;
pub mod common;
pub mod config;
pub mod constant;
pub mod error;
pub mod info;
pub mod span;
pub mod types;
pub mod workspace;

pub use check::Checker;
pub use config::{Config, ImportFailure, ImportMode, Importer, ImporterFrom};
pub use error::{Error, ErrorKind};
pub use info::{Info, OperandMode, TypeAndValue};
pub use span::{FileSet, Span};
pub use workspace::Workspace;
