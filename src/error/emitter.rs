use super::Error;
use crate::span::FileSet;
use codespan_reporting::term::{
    emit,
    termcolor::{ColorChoice, StandardStream, WriteColor},
    Chars, Config, DisplayStyle, Styles,
};

/// Renders errors for humans on top of a `FileSet`.
pub struct ErrorEmitter {
    config: Config,
}

impl Default for ErrorEmitter {
    fn default() -> Self {
        Self {
            config: Config {
                display_style: DisplayStyle::Rich,
                tab_width: 4,
                styles: Styles::default(),
                chars: Chars::ascii(),
                start_context_lines: 3,
                end_context_lines: 1,
            },
        }
    }
}

impl ErrorEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_one(
        &self,
        writer: &mut dyn WriteColor,
        fset: &FileSet,
        error: &Error,
    ) -> Result<(), codespan_reporting::files::Error> {
        emit(writer, &self.config, fset.files(), &error.to_diagnostic())
    }

    pub fn emit_many<'a>(
        &self,
        writer: &mut dyn WriteColor,
        fset: &FileSet,
        errors: impl IntoIterator<Item = &'a Error>,
    ) -> Result<(), codespan_reporting::files::Error> {
        errors
            .into_iter()
            .try_for_each(|error| self.emit_one(writer, fset, error))
    }
}

/// Writes all errors to stderr.
pub fn emit_errors(fset: &FileSet, errors: &[Error]) -> Result<(), codespan_reporting::files::Error> {
    let writer = StandardStream::stderr(ColorChoice::Auto);
    let emitter = ErrorEmitter::new();
    let mut lock = writer.lock();
    emitter.emit_many(&mut lock, fset, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        span::Span,
    };
    use codespan_reporting::term::termcolor::NoColor;

    #[test]
    fn renders_message_and_source_line() {
        let mut fset = FileSet::new();
        let file = fset.add_file("a.go", "package a\nvar x = y\n");
        let err = Error::new(&fset, ErrorKind::UndefinedIdentifier, Span::new(file, 18, 19), "undeclared name: y");

        let mut out = NoColor::new(Vec::<u8>::new());
        ErrorEmitter::new().emit_one(&mut out, &fset, &err).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("undeclared name: y"));
        assert!(text.contains("var x = y"));
    }
}
