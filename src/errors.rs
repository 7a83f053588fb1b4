use crate::span::Span;
use codespan_reporting::diagnostic::{self, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

/// Severity of a recorded diagnostic.
///
/// Analysis succeeds iff no non-`Warning` entry was recorded. Fatal unwinding
/// is signalled separately through [`FatalError`]; by the time the sentinel
/// propagates, the underlying diagnostic is already in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    DeclarationError,
    TypeError,
    ParserError,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::DeclarationError => "declaration error",
            Severity::TypeError => "type error",
            Severity::ParserError => "parser error",
        }
    }
}

/// A note pointing at a second source location ("The previous declaration is
/// here:").
#[derive(Debug, Clone)]
pub struct SecondaryNote {
    pub span: Span,
    pub message: String,
}

/// One entry in the diagnostics list.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    pub secondary: Vec<SecondaryNote>,
}

impl Diagnostic {
    pub fn new(severity: Severity, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity,
            span,
            message: message.into(),
            secondary: Vec::new(),
        }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, span, message)
    }

    pub fn declaration_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::DeclarationError, span, message)
    }

    pub fn type_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::TypeError, span, message)
    }

    pub fn parser_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::ParserError, span, message)
    }

    pub fn with_secondary(mut self, span: Span, message: impl Into<String>) -> Self {
        self.secondary.push(SecondaryNote {
            span,
            message: message.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity != Severity::Warning
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity.as_str(), self.message)
    }
}

/// Sentinel for non-local unwinding to the nearest recovery boundary.
///
/// Carried in `Result` return values instead of being thrown; callers bail
/// with `?` until a contract or source-unit boundary catches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalError;

pub type Fatal<T> = Result<T, FatalError>;

/// True iff the list contains a non-warning entry.
pub fn contains_error(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Renders diagnostics to stderr.
pub struct ErrorReporter {
    files: SimpleFiles<String, String>,
    file_id: usize,
}

impl ErrorReporter {
    pub fn new(filename: String, source: String) -> Self {
        let mut files = SimpleFiles::new();
        let file_id = files.add(filename, source);
        Self { files, file_id }
    }

    pub fn report(&self, diag: &Diagnostic) {
        let mut labels = vec![Label::primary(self.file_id, diag.span.start..diag.span.end)];
        for note in &diag.secondary {
            labels.push(
                Label::secondary(self.file_id, note.span.start..note.span.end)
                    .with_message(note.message.clone()),
            );
        }

        let rendered = match diag.severity {
            Severity::Warning => diagnostic::Diagnostic::warning(),
            _ => diagnostic::Diagnostic::error(),
        }
        .with_message(diag.message.clone())
        .with_labels(labels);
        self.emit(&rendered);
    }

    pub fn report_all(&self, diagnostics: &[Diagnostic]) {
        for diag in diagnostics {
            self.report(diag);
        }
    }

    fn emit(&self, diag: &diagnostic::Diagnostic<usize>) {
        let writer = StandardStream::stderr(ColorChoice::Auto);
        let config = term::Config::default();
        let _ = term::emit(&mut writer.lock(), &config, &self.files, diag);
    }
}
