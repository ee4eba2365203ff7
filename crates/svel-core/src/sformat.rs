//! Format-string parsing for the display-family system subroutines.
//!
//! A format string is scanned into a list of argument specs; the binder
//! matches subsequent call arguments against them. Positions are reported
//! relative to the string literal so diagnostics can point into it.

use crate::diag::{DiagCode, Diagnostics};
use crate::source::{SourceId, Span};

/// What kind of value a format spec consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArgKind {
    Integral,
    Float,
    Str,
    /// `%p`, prints any value.
    Pattern,
}

/// One `%` spec found in a format string.
#[derive(Debug, Clone, Copy)]
pub struct FormatArg {
    pub kind: FormatArgKind,
    pub spec: char,
    pub range: Span,
}

/// Scan a format string (its unquoted contents) into arg specs. `offset` is
/// the byte position of the contents within `source`. Problems are recorded
/// in the returned diagnostics; an empty list means success.
pub fn parse_format_specs(
    fmt: &str,
    source: SourceId,
    offset: usize,
) -> (Vec<FormatArg>, Diagnostics) {
    let mut specs = Vec::new();
    let mut diags = Diagnostics::new();

    let mut chars = fmt.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != '%' {
            continue;
        }

        // Width/precision/alignment prefix.
        while let Some(&(_, c)) = chars.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | ' ') {
                chars.next();
            } else {
                break;
            }
        }

        let Some((end, spec)) = chars.next() else {
            diags.add(
                DiagCode::MissingFormatSpecifier,
                Span::new(source, offset + start, offset + fmt.len()),
            );
            break;
        };
        let range = Span::new(source, offset + start, offset + end + spec.len_utf8());

        let kind = match spec.to_ascii_lowercase() {
            'b' | 'o' | 'd' | 'h' | 'x' | 'c' | 'v' | 'u' | 'z' => FormatArgKind::Integral,
            'e' | 'f' | 'g' | 't' => FormatArgKind::Float,
            's' => FormatArgKind::Str,
            'p' => FormatArgKind::Pattern,
            // These consume no argument.
            'm' | 'l' | '%' => continue,
            _ => {
                diags.add(DiagCode::MissingFormatSpecifier, range).arg(spec);
                continue;
            }
        };
        specs.push(FormatArg { kind, spec, range });
    }

    (specs, diags)
}
