//! Diagnostics.
//!
//! Every problem the front-end can report is one of the closed [`DiagCode`]
//! variants; a code knows its default severity. Diagnostics are recorded into
//! the compilation's sink and never thrown: construction always continues
//! with an error-marker entity so that one compile surfaces as many problems
//! as possible.

use crate::source::{SourceMap, Span};
use serde::Serialize;
use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

/// The closed set of diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagCode {
    // Lexer
    NonPrintableChar,
    Utf8Char,
    UnicodeBom,
    EmbeddedNull,
    EscapedWhitespace,
    ExpectedClosingQuote,
    OctalEscapeCodeTooBig,
    InvalidHexEscapeCode,
    UnknownEscapeCode,
    UnterminatedBlockComment,
    NestedBlockComment,
    MissingFractionalDigits,
    MisplacedDirectiveChar,

    // Preprocessor
    CouldNotOpenIncludeFile,
    ExpectedIncludeFileName,
    UnknownDirective,
    ExpectedMacroName,
    ExpectedMacroArgs,
    WrongMacroArgCount,
    RecursiveMacroDefinition,
    UnexpectedConditionalDirective,

    // Declarations
    DuplicateDefinition,
    ForwardTypedefDoesNotMatch,

    // Lookup
    UndeclaredIdentifier,
    UnknownMember,
    UsedBeforeDeclared,
    NotAType,
    NotAValue,
    NotAModport,
    UnknownSystemName,
    HierarchicalNotAllowed,

    // Types
    PackedMemberNotIntegral,
    InvalidEnumBase,
    DuplicateEnumValue,
    EnumValueNotIntegral,
    DimensionRequiresConstRange,
    BadAssignment,

    // Parameters & instantiation
    ParamHasNoValue,
    MixingOrderedAndNamedParams,
    DuplicateParamAssignment,
    AssignedToLocalPortParam,
    AssignedToLocalBodyParam,
    TooManyParamAssignments,
    ParameterDoesNotExist,
    BadTypeParamExpr,
    CyclicParameterDependency,
    UnknownModule,
    MaxInstanceDepthExceeded,

    // Expression binding & constant evaluation
    TooFewArguments,
    TooManyArguments,
    BadSystemSubroutineArg,
    FormatEmptyArg,
    FormatMismatchedType,
    FormatRealInt,
    FormatNoArgument,
    FormatTooManyArgs,
    FormatUnspecifiedType,
    MissingFormatSpecifier,
    BadUnaryExpression,
    BadBinaryExpression,
    ExpressionNotConstant,
    DivideByZero,
    IndexOutOfRange,

    // Notes attached to other diagnostics
    NotePreviousUsage,
    NotePreviousDefinition,
    NoteDeclarationHere,
}

impl DiagCode {
    /// The severity this code is reported at.
    pub fn severity(self) -> Severity {
        use DiagCode::*;
        match self {
            NotePreviousUsage | NotePreviousDefinition | NoteDeclarationHere => Severity::Note,
            FormatRealInt => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A single reported problem: code, severity, range, message arguments and
/// any attached notes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagCode,
    pub severity: Severity,
    pub span: Span,
    pub args: Vec<String>,
    pub notes: Vec<Diagnostic>,
}

impl Diagnostic {
    pub fn new(code: DiagCode, span: Span) -> Self {
        Self { code, severity: code.severity(), span, args: Vec::new(), notes: Vec::new() }
    }

    pub fn with_arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn with_note(mut self, code: DiagCode, span: Span) -> Self {
        self.notes.push(Diagnostic::new(code, span));
        self
    }

    /// One-line rendering with file/line/column context. Full rendering is a
    /// collaborator's job; this is enough for test output and logs.
    pub fn render(&self, sources: &SourceMap) -> String {
        let mut out = String::new();
        let severity = match self.severity {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        out.push_str(&format!("{}[{:?}]", severity, self.code));
        if let Some(source) = sources.get(self.span.source) {
            let (line, col) = source.line_col(self.span.start);
            out.push_str(&format!(" {}:{}:{}", source.name(), line, col));
        }
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        for note in &self.notes {
            out.push('\n');
            out.push_str("  ");
            out.push_str(&note.render(sources));
        }
        out
    }
}

/// Accumulates diagnostics in emission order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    list: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.list.push(diag);
    }

    /// Record a diagnostic and return a mutable handle so callers can attach
    /// arguments and notes.
    pub fn add(&mut self, code: DiagCode, span: Span) -> &mut Diagnostic {
        self.list.push(Diagnostic::new(code, span));
        self.list.last_mut().unwrap()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.list.extend(other.list);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.list.iter()
    }

    pub fn last(&self) -> Option<&Diagnostic> {
        self.list.last()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn has_errors(&self) -> bool {
        self.list.iter().any(|d| d.severity >= Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.list.iter().filter(|d| d.severity >= Severity::Error).count()
    }

    /// Codes in emission order, handy for test assertions.
    pub fn codes(&self) -> Vec<DiagCode> {
        self.list.iter().map(|d| d.code).collect()
    }
}

impl Diagnostic {
    /// Attach an argument to an already-recorded diagnostic.
    pub fn arg(&mut self, arg: impl fmt::Display) -> &mut Self {
        self.args.push(arg.to_string());
        self
    }

    /// Attach a note to an already-recorded diagnostic.
    pub fn note(&mut self, code: DiagCode, span: Span) -> &mut Self {
        self.notes.push(Diagnostic::new(code, span));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;

    fn span() -> Span {
        Span::new(SourceId(0), 0, 1)
    }

    #[test]
    fn test_severity_defaults() {
        assert_eq!(DiagCode::UnknownModule.severity(), Severity::Error);
        assert_eq!(DiagCode::FormatRealInt.severity(), Severity::Warning);
        assert_eq!(DiagCode::NoteDeclarationHere.severity(), Severity::Note);
    }

    #[test]
    fn test_error_counting() {
        let mut diags = Diagnostics::new();
        diags.add(DiagCode::FormatRealInt, span());
        assert!(!diags.has_errors());

        diags.add(DiagCode::UnknownModule, span()).arg("Foo");
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.codes(), vec![DiagCode::FormatRealInt, DiagCode::UnknownModule]);
    }

    #[test]
    fn test_notes_attach_to_last() {
        let mut diags = Diagnostics::new();
        diags
            .add(DiagCode::DuplicateParamAssignment, span())
            .arg("WIDTH")
            .note(DiagCode::NotePreviousUsage, span());
        let last = diags.last().unwrap();
        assert_eq!(last.notes.len(), 1);
        assert_eq!(last.notes[0].code, DiagCode::NotePreviousUsage);
    }
}
