//! The lexer: source text in, trivia-preserving tokens out.
//!
//! Diagnostics go straight into the sink passed to [`Lexer::lex`]; the lexer
//! itself never fails. Every token records its exact spelling and leading
//! trivia, so concatenating [`Token::full_text`] over the stream reproduces
//! the input.

use crate::diag::{DiagCode, Diagnostics};
use crate::source::{SourceId, Span};
use crate::token::{
    IdentifierType, Keyword, LiteralBase, NumericFlags, NumericInfo, NumericValue, Punct, TimeUnit,
    Token, TokenKind, Trivia, TriviaKind,
};

/// Lexing mode. Directive mode is active while the preprocessor consumes a
/// directive: keywords are not resolved and the macro-body tokens `` `" ``,
/// `` `\" `` and ```` `` ```` are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    Default,
    Directive,
}

pub struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    source: SourceId,
    /// Set after an `IntegerBase` token so the next token consumes the base's
    /// digit run (hex digits would otherwise lex as an identifier).
    pending_base: Option<LiteralBase>,
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c == '$' || c.is_ascii_alphanumeric()
}

fn is_horizontal_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0b' | '\x0c')
}

impl<'a> Lexer<'a> {
    pub fn new(source: SourceId, text: &'a str) -> Self {
        Self { text, pos: 0, source, pending_base: None }
    }

    /// Continue lexing an already partially consumed buffer. The preprocessor
    /// uses this to interleave lexing of multiple open files.
    pub fn resume(source: SourceId, text: &'a str, offset: usize) -> Self {
        Self { text, pos: offset, source, pending_base: None }
    }

    /// Current byte offset into the buffer.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Lex every remaining token including the trailing end-of-file token.
    pub fn lex_all(&mut self, diags: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.lex(LexerMode::Default, diags);
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// Lex one token in the given mode.
    pub fn lex(&mut self, mode: LexerMode, diags: &mut Diagnostics) -> Token {
        let trivia = self.lex_trivia(diags);
        let start = self.pos;

        let mut token = match self.peek() {
            None => Token::new(TokenKind::EndOfFile, Span::point(self.source, start), ""),
            Some(c) => self.lex_token(c, start, mode, diags),
        };
        token.trivia = trivia;
        token
    }

    fn lex_token(
        &mut self,
        c: char,
        start: usize,
        mode: LexerMode,
        diags: &mut Diagnostics,
    ) -> Token {
        if let Some(base) = self.pending_base.take() {
            if c.is_ascii_alphanumeric() || c == '?' {
                return self.lex_base_digits(base, start, diags);
            }
        }

        if is_ident_start(c) {
            return self.lex_identifier(start, mode);
        }
        if c.is_ascii_digit() {
            return self.lex_number(start, diags);
        }

        match c {
            '"' => self.lex_string(start, diags),
            '\\' if mode == LexerMode::Directive
                && matches!(self.peek_at(1), Some('\n') | Some('\r')) =>
            {
                self.bump();
                if self.peek() == Some('\r') {
                    self.bump();
                }
                if self.peek() == Some('\n') {
                    self.bump();
                }
                self.finish(TokenKind::LineContinuation, start)
            }
            '\\' => self.lex_escaped_identifier(start, diags),
            '$' => {
                self.bump();
                if self.peek().is_some_and(is_ident_char) {
                    self.eat_while(is_ident_char);
                    self.finish(TokenKind::SystemIdentifier, start)
                } else {
                    self.finish(TokenKind::Punct(Punct::Dollar), start)
                }
            }
            '\'' => self.lex_apostrophe(start),
            '`' => self.lex_backtick(start, mode, diags),
            '\0' => {
                self.bump();
                diags.add(DiagCode::EmbeddedNull, self.span_from(start));
                self.finish(TokenKind::Unknown, start)
            }
            c if !c.is_ascii() => {
                self.bump();
                diags.add(DiagCode::Utf8Char, self.span_from(start));
                self.finish(TokenKind::Unknown, start)
            }
            c if c.is_control() => {
                self.bump();
                diags.add(DiagCode::NonPrintableChar, self.span_from(start));
                self.finish(TokenKind::Unknown, start)
            }
            _ => self.lex_punct(start, mode, diags),
        }
    }

    // ------------------------------------------------------------------
    // Trivia
    // ------------------------------------------------------------------

    fn lex_trivia(&mut self, diags: &mut Diagnostics) -> Vec<Trivia> {
        let mut trivia = Vec::new();
        loop {
            let start = self.pos;
            match self.peek() {
                Some(c) if is_horizontal_ws(c) => {
                    self.eat_while(is_horizontal_ws);
                    trivia.push(self.make_trivia(TriviaKind::Whitespace, start));
                }
                Some('\r') => {
                    self.bump();
                    if self.peek() == Some('\n') {
                        self.bump();
                    }
                    trivia.push(self.make_trivia(TriviaKind::EndOfLine, start));
                }
                Some('\n') => {
                    self.bump();
                    trivia.push(self.make_trivia(TriviaKind::EndOfLine, start));
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    self.eat_while(|c| c != '\n' && c != '\r');
                    trivia.push(self.make_trivia(TriviaKind::LineComment, start));
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    trivia.push(self.lex_block_comment(start, diags));
                }
                Some('\u{FEFF}') if start == 0 => {
                    self.bump();
                    diags.add(DiagCode::UnicodeBom, self.span_from(start));
                    trivia.push(self.make_trivia(TriviaKind::Whitespace, start));
                }
                _ => break,
            }
        }
        trivia
    }

    fn lex_block_comment(&mut self, start: usize, diags: &mut Diagnostics) -> Trivia {
        self.bump(); // '/'
        self.bump(); // '*'
        loop {
            match self.peek() {
                None => {
                    diags.add(DiagCode::UnterminatedBlockComment, self.span_from(start));
                    break;
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    diags.add(
                        DiagCode::NestedBlockComment,
                        Span::new(self.source, self.pos, self.pos + 2),
                    );
                    self.bump();
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        self.make_trivia(TriviaKind::BlockComment, start)
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    fn lex_identifier(&mut self, start: usize, mode: LexerMode) -> Token {
        self.eat_while(is_ident_char);
        let text = &self.text[start..self.pos];
        if mode == LexerMode::Default {
            if let Some(kw) = Keyword::from_text(text) {
                return self.finish(TokenKind::Keyword(kw), start);
            }
        }
        self.finish(TokenKind::Identifier(IdentifierType::Normal), start)
    }

    fn lex_escaped_identifier(&mut self, start: usize, diags: &mut Diagnostics) -> Token {
        self.bump(); // backslash
        let body_start = self.pos;
        self.eat_while(|c| !c.is_whitespace());
        if self.pos == body_start {
            diags.add(DiagCode::EscapedWhitespace, self.span_from(start));
            return self.finish(TokenKind::Unknown, start);
        }
        let mut token = self.finish(TokenKind::Identifier(IdentifierType::Escaped), start);
        token.value = self.text[body_start..self.pos].to_string();
        token
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    fn lex_string(&mut self, start: usize, diags: &mut Diagnostics) -> Token {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    // A raw newline ends the literal; it is not consumed.
                    diags.add(
                        DiagCode::ExpectedClosingQuote,
                        Span::new(self.source, start, start + 1),
                    );
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    self.lex_string_escape(&mut value, diags);
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
        let mut token = self.finish(TokenKind::StringLiteral, start);
        token.value = value;
        token
    }

    fn lex_string_escape(&mut self, value: &mut String, diags: &mut Diagnostics) {
        let escape_start = self.pos - 1;
        match self.peek() {
            None => {}
            // Escaped line continuation: the newline joins the lines.
            Some('\r') => {
                self.bump();
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            Some('\n') => {
                self.bump();
            }
            Some(c @ '0'..='7') => {
                let mut code: u32 = 0;
                let mut digits = 0;
                let mut cur = c;
                while digits < 3 {
                    code = code * 8 + cur.to_digit(8).unwrap();
                    self.bump();
                    digits += 1;
                    match self.peek() {
                        Some(next @ '0'..='7') => cur = next,
                        _ => break,
                    }
                }
                if code > 255 {
                    diags.add(DiagCode::OctalEscapeCodeTooBig, self.span_from(escape_start));
                } else {
                    value.push(code as u8 as char);
                }
            }
            Some('x') => {
                self.bump();
                let mut code: u32 = 0;
                let mut digits = 0;
                while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                    if digits == 2 {
                        break;
                    }
                    code = code * 16 + d;
                    self.bump();
                    digits += 1;
                }
                if digits == 0 {
                    diags.add(DiagCode::InvalidHexEscapeCode, self.span_from(escape_start));
                    if let Some(c) = self.peek() {
                        if c != '"' && c != '\n' && c != '\r' {
                            self.bump();
                            value.push(c);
                        }
                    }
                } else {
                    value.push(code as u8 as char);
                }
            }
            Some(c) => {
                self.bump();
                match c {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'v' => value.push('\x0b'),
                    'f' => value.push('\x0c'),
                    'a' => value.push('\x07'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    _ => {
                        diags.add(DiagCode::UnknownEscapeCode, self.span_from(escape_start));
                        value.push(c);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------

    fn lex_number(&mut self, start: usize, diags: &mut Diagnostics) -> Token {
        self.eat_while(|c| c.is_ascii_digit() || c == '_');
        let mut is_real = false;

        if self.peek() == Some('.') {
            is_real = true;
            self.bump();
            let frac_start = self.pos;
            self.eat_while(|c| c.is_ascii_digit() || c == '_');
            if self.pos == frac_start {
                diags.add(DiagCode::MissingFractionalDigits, self.span_from(start));
            }
        }

        // An exponent needs a digit after the optional sign; otherwise the
        // token ends here and the `e...` re-lexes as whatever it is.
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut look = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                look = 2;
            }
            if self.peek_at(look).is_some_and(|c| c.is_ascii_digit()) {
                is_real = true;
                for _ in 0..=look {
                    self.bump();
                }
                self.eat_while(|c| c.is_ascii_digit() || c == '_');
            }
        }

        let digits: String = self.text[start..self.pos].chars().filter(|&c| c != '_').collect();
        let (kind, value) = if is_real {
            // Overflow saturates to infinity, matching IEEE conversion.
            let real = digits.parse::<f64>().unwrap_or(f64::INFINITY);
            (TokenKind::RealLiteral, NumericValue::Real(real))
        } else {
            let int = digits.parse::<u64>().unwrap_or(u64::MAX);
            (TokenKind::IntegerLiteral, NumericValue::Integer(int))
        };

        let mut flags = NumericFlags::default();
        let mut kind = kind;
        if let Some(unit) = self.try_time_suffix() {
            flags.unit = Some(unit);
            kind = TokenKind::TimeLiteral;
        }

        let mut token = self.finish(kind, start);
        token.numeric = Some(NumericInfo { value, flags });
        token
    }

    fn try_time_suffix(&mut self) -> Option<TimeUnit> {
        for len in [2usize, 1] {
            let end = self.pos + len;
            if end > self.text.len() || !self.text.is_char_boundary(end) {
                continue;
            }
            if let Some(unit) = TimeUnit::from_suffix(&self.text[self.pos..end]) {
                // Not a suffix if more identifier characters follow.
                let after = self.text[end..].chars().next();
                if after.is_some_and(is_ident_char) {
                    continue;
                }
                self.pos = end;
                return Some(unit);
            }
        }
        None
    }

    fn lex_apostrophe(&mut self, start: usize) -> Token {
        self.bump(); // apostrophe
        let mut signed = false;
        let mut look = self.peek();
        if matches!(look, Some('s') | Some('S')) {
            // Only a sign prefix when a base character follows.
            if matches!(self.peek_at(1), Some('b' | 'B' | 'o' | 'O' | 'd' | 'D' | 'h' | 'H')) {
                signed = true;
                self.bump();
                look = self.peek();
            }
        }

        let base = match look {
            Some('b') | Some('B') => Some(LiteralBase::Binary),
            Some('o') | Some('O') => Some(LiteralBase::Octal),
            Some('d') | Some('D') => Some(LiteralBase::Decimal),
            Some('h') | Some('H') => Some(LiteralBase::Hex),
            _ => None,
        };
        if let Some(base) = base {
            self.bump();
            self.pending_base = Some(base);
            let mut token = self.finish(TokenKind::IntegerBase, start);
            token.numeric = Some(NumericInfo {
                value: NumericValue::Integer(0),
                flags: NumericFlags { base: Some(base), signed, unit: None },
            });
            return token;
        }

        if !signed {
            match self.peek() {
                Some(c @ ('0' | '1' | 'x' | 'X' | 'z' | 'Z'))
                    if !self.peek_at(1).is_some_and(is_ident_char) =>
                {
                    self.bump();
                    let mut token = self.finish(TokenKind::UnbasedUnsizedLiteral, start);
                    token.numeric = Some(NumericInfo {
                        value: NumericValue::UnsizedBit(c.to_ascii_lowercase()),
                        flags: NumericFlags::default(),
                    });
                    return token;
                }
                Some('{') => {
                    self.bump();
                    return self.finish(TokenKind::Punct(Punct::ApostropheOpenBrace), start);
                }
                _ => {}
            }
        }
        self.finish(TokenKind::Punct(Punct::Apostrophe), start)
    }

    fn lex_base_digits(
        &mut self,
        base: LiteralBase,
        start: usize,
        diags: &mut Diagnostics,
    ) -> Token {
        let valid = |c: char| -> bool {
            c == '_'
                || matches!(c, 'x' | 'X' | 'z' | 'Z' | '?')
                || c.to_digit(base.radix()).is_some()
        };
        if !self.peek().is_some_and(valid) {
            // Not a digit run for this base; fall through to normal lexing.
            let c = self.peek().unwrap();
            return self.lex_token(c, start, LexerMode::Default, diags);
        }

        self.eat_while(valid);
        let mut value: u64 = 0;
        for c in self.text[start..self.pos].chars() {
            match c {
                '_' => {}
                'x' | 'X' | 'z' | 'Z' | '?' => {
                    value = value.wrapping_mul(base.radix() as u64);
                }
                c => {
                    value = value
                        .wrapping_mul(base.radix() as u64)
                        .wrapping_add(c.to_digit(base.radix()).unwrap() as u64);
                }
            }
        }

        let mut token = self.finish(TokenKind::IntegerLiteral, start);
        token.numeric = Some(NumericInfo {
            value: NumericValue::Integer(value),
            flags: NumericFlags { base: Some(base), signed: false, unit: None },
        });
        token
    }

    // ------------------------------------------------------------------
    // Directives & punctuation
    // ------------------------------------------------------------------

    fn lex_backtick(&mut self, start: usize, mode: LexerMode, diags: &mut Diagnostics) -> Token {
        self.bump(); // backtick
        if mode == LexerMode::Directive {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    return self.finish(TokenKind::MacroQuote, start);
                }
                Some('`') => {
                    self.bump();
                    return self.finish(TokenKind::MacroPaste, start);
                }
                Some('\\') if self.peek_at(1) == Some('"') => {
                    self.bump();
                    self.bump();
                    return self.finish(TokenKind::MacroEscapedQuote, start);
                }
                _ => {}
            }
        }

        if self.peek().is_some_and(is_ident_start) {
            let name_start = self.pos;
            self.eat_while(is_ident_char);
            let mut token = self.finish(TokenKind::Directive, start);
            token.value = self.text[name_start..self.pos].to_string();
            return token;
        }

        diags.add(DiagCode::MisplacedDirectiveChar, self.span_from(start));
        let mut token = self.finish(TokenKind::Directive, start);
        token.value.clear();
        token
    }

    fn lex_punct(&mut self, start: usize, _mode: LexerMode, diags: &mut Diagnostics) -> Token {
        // Longest-match against the closed punctuation table.
        for len in (1..=4usize).rev() {
            let end = start + len;
            if end > self.text.len() || !self.text.is_char_boundary(end) {
                continue;
            }
            if let Some(p) = Punct::from_text(&self.text[start..end]) {
                self.pos = end;
                return self.finish(TokenKind::Punct(p), start);
            }
        }

        self.bump();
        diags.add(DiagCode::NonPrintableChar, self.span_from(start));
        self.finish(TokenKind::Unknown, start)
    }

    // ------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.source, start, self.pos)
    }

    fn make_trivia(&self, kind: TriviaKind, start: usize) -> Trivia {
        Trivia { kind, raw: self.text[start..self.pos].to_string(), span: self.span_from(start) }
    }

    fn finish(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, self.span_from(start), &self.text[start..self.pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Keyword, Punct};

    fn lex_token(text: &str) -> (Token, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut lexer = Lexer::new(SourceId(0), text);
        let token = lexer.lex(LexerMode::Default, &mut diags);
        (token, diags)
    }

    fn lex_source(text: &str) -> (Vec<Token>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut lexer = Lexer::new(SourceId(0), text);
        (lexer.lex_all(&mut diags), diags)
    }

    #[test]
    fn test_line_comment_trivia() {
        let (token, diags) = lex_token("// comment");
        assert_eq!(token.kind, TokenKind::EndOfFile);
        assert_eq!(token.trivia.len(), 1);
        assert_eq!(token.trivia[0].kind, TriviaKind::LineComment);
        assert_eq!(token.trivia[0].raw, "// comment");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_block_comment() {
        let (token, diags) = lex_token("/* comment */");
        assert_eq!(token.kind, TokenKind::EndOfFile);
        assert_eq!(token.trivia[0].kind, TriviaKind::BlockComment);
        assert_eq!(token.full_text(), "/* comment */");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_block_comment_unterminated() {
        let (token, diags) = lex_token("/* comment");
        assert_eq!(token.kind, TokenKind::EndOfFile);
        assert_eq!(token.trivia[0].kind, TriviaKind::BlockComment);
        assert_eq!(token.full_text(), "/* comment");
        assert_eq!(diags.last().unwrap().code, DiagCode::UnterminatedBlockComment);
    }

    #[test]
    fn test_block_comment_nested() {
        let (token, diags) = lex_token("/* comment /* stuff */");
        assert_eq!(token.kind, TokenKind::EndOfFile);
        assert_eq!(diags.last().unwrap().code, DiagCode::NestedBlockComment);
    }

    #[test]
    fn test_newline_trivia() {
        for text in ["\r", "\r\n", "\n"] {
            let (token, diags) = lex_token(text);
            assert_eq!(token.kind, TokenKind::EndOfFile);
            assert_eq!(token.trivia.len(), 1, "input {:?}", text);
            assert_eq!(token.trivia[0].kind, TriviaKind::EndOfLine);
            assert_eq!(token.full_text(), text);
            assert!(diags.is_empty());
        }
    }

    #[test]
    fn test_whitespace_trivia() {
        let (token, diags) = lex_token(" \t\x0b\x0c token");
        assert_eq!(token.kind, TokenKind::Identifier(IdentifierType::Normal));
        assert_eq!(token.trivia.len(), 1);
        assert_eq!(token.trivia[0].kind, TriviaKind::Whitespace);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_identifiers() {
        let (token, diags) = lex_token("a92837asdf358");
        assert_eq!(token.kind, TokenKind::Identifier(IdentifierType::Normal));
        assert_eq!(token.value_text(), "a92837asdf358");
        assert!(diags.is_empty());

        let (token, _) = lex_token("__a$$asdf213$");
        assert_eq!(token.kind, TokenKind::Identifier(IdentifierType::Normal));
        assert_eq!(token.value_text(), "__a$$asdf213$");
    }

    #[test]
    fn test_escaped_identifier() {
        let (token, diags) = lex_token("\\98\\#$%)(*lkjsd__09...asdf345");
        assert_eq!(token.kind, TokenKind::Identifier(IdentifierType::Escaped));
        assert_eq!(token.value_text(), "98\\#$%)(*lkjsd__09...asdf345");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_escaped_whitespace() {
        for text in ["\\", "\\  "] {
            let (token, diags) = lex_token(text);
            assert_eq!(token.kind, TokenKind::Unknown);
            assert_eq!(token.raw, "\\");
            assert_eq!(diags.last().unwrap().code, DiagCode::EscapedWhitespace);
        }
    }

    #[test]
    fn test_system_identifier() {
        let (token, diags) = lex_token("$hello");
        assert_eq!(token.kind, TokenKind::SystemIdentifier);
        assert_eq!(token.value_text(), "$hello");
        assert!(diags.is_empty());

        let (token, _) = lex_token("$45__hello");
        assert_eq!(token.kind, TokenKind::SystemIdentifier);
        assert_eq!(token.value_text(), "$45__hello");

        let (token, _) = lex_token("$ ");
        assert_eq!(token.kind, TokenKind::Punct(Punct::Dollar));
    }

    #[test]
    fn test_string_literal() {
        let (token, diags) = lex_token("\"literal  #@$asdf\"");
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.value_text(), "literal  #@$asdf");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_string_raw_newline_ends_literal() {
        let (token, diags) = lex_token("\"literal\r\nwith new line\"");
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.value_text(), "literal");
        assert_ne!(token.full_text(), "\"literal\r\nwith new line\"");
        assert_eq!(diags.last().unwrap().code, DiagCode::ExpectedClosingQuote);
    }

    #[test]
    fn test_string_escaped_newline() {
        let (token, diags) = lex_token("\"literal\\\r\nwith new line\"");
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.value_text(), "literalwith new line");
        assert_eq!(token.full_text(), "\"literal\\\r\nwith new line\"");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_string_unterminated() {
        let (token, diags) = lex_token("\"literal");
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.value_text(), "literal");
        assert_eq!(diags.last().unwrap().code, DiagCode::ExpectedClosingQuote);
    }

    #[test]
    fn test_string_escapes() {
        let (token, diags) = lex_token("\"literal\\n\\t\\v\\f\\a \\\\ \\\" \"");
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.value_text(), "literal\n\t\x0b\x0c\x07 \\ \" ");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_string_octal_escape() {
        let (token, diags) = lex_token("\"literal\\377\"");
        assert_eq!(token.value_text(), "literal\u{00ff}");
        assert!(diags.is_empty());

        let (token, diags) = lex_token("\"literal\\400\"");
        assert_eq!(token.value_text(), "literal");
        assert_eq!(diags.last().unwrap().code, DiagCode::OctalEscapeCodeTooBig);
    }

    #[test]
    fn test_string_hex_escape() {
        let (token, diags) = lex_token("\"literal\\xFa\"");
        assert_eq!(token.value_text(), "literal\u{00fa}");
        assert!(diags.is_empty());

        let (token, diags) = lex_token("\"literal\\xz\"");
        assert_eq!(token.value_text(), "literalz");
        assert_eq!(diags.last().unwrap().code, DiagCode::InvalidHexEscapeCode);
    }

    #[test]
    fn test_string_unknown_escape() {
        let (token, diags) = lex_token("\"literal\\i\"");
        assert_eq!(token.value_text(), "literali");
        assert_eq!(diags.last().unwrap().code, DiagCode::UnknownEscapeCode);
    }

    #[test]
    fn test_integer_literal() {
        let (token, diags) = lex_token("19248");
        assert_eq!(token.kind, TokenKind::IntegerLiteral);
        assert_eq!(token.numeric.unwrap().value, NumericValue::Integer(19248));
        assert!(diags.is_empty());
    }

    fn check_vector_base(text: &str, base: LiteralBase, signed: bool) {
        let (token, diags) = lex_token(text);
        assert_eq!(token.kind, TokenKind::IntegerBase, "input {:?}", text);
        let flags = token.numeric.unwrap().flags;
        assert_eq!(flags.base, Some(base));
        assert_eq!(flags.signed, signed);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_vector_bases() {
        check_vector_base("'d", LiteralBase::Decimal, false);
        check_vector_base("'sD", LiteralBase::Decimal, true);
        check_vector_base("'Sb", LiteralBase::Binary, true);
        check_vector_base("'B", LiteralBase::Binary, false);
        check_vector_base("'so", LiteralBase::Octal, true);
        check_vector_base("'O", LiteralBase::Octal, false);
        check_vector_base("'h", LiteralBase::Hex, false);
        check_vector_base("'SH", LiteralBase::Hex, true);
    }

    #[test]
    fn test_based_digit_run() {
        let (tokens, diags) = lex_source("'hdEAD_beef");
        assert_eq!(tokens[0].kind, TokenKind::IntegerBase);
        assert_eq!(tokens[1].kind, TokenKind::IntegerLiteral);
        assert_eq!(tokens[1].numeric.unwrap().value, NumericValue::Integer(0xdead_beef));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_unbased_unsized() {
        let (token, diags) = lex_token("'1");
        assert_eq!(token.kind, TokenKind::UnbasedUnsizedLiteral);
        assert_eq!(token.numeric.unwrap().value, NumericValue::UnsizedBit('1'));
        assert!(diags.is_empty());

        let (token, _) = lex_token("'x");
        assert_eq!(token.kind, TokenKind::UnbasedUnsizedLiteral);
        assert_eq!(token.numeric.unwrap().value, NumericValue::UnsizedBit('x'));
    }

    fn real_value(token: &Token) -> f64 {
        match token.numeric.unwrap().value {
            NumericValue::Real(r) => r,
            other => panic!("not a real: {:?}", other),
        }
    }

    #[test]
    fn test_real_fraction() {
        let (token, diags) = lex_token("32.57");
        assert_eq!(token.kind, TokenKind::RealLiteral);
        assert!((real_value(&token) - 32.57).abs() < 1e-12);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_real_missing_fraction() {
        let (token, diags) = lex_token("32.");
        assert_eq!(token.kind, TokenKind::RealLiteral);
        assert_eq!(real_value(&token), 32.0);
        assert_eq!(diags.last().unwrap().code, DiagCode::MissingFractionalDigits);
    }

    #[test]
    fn test_real_exponent() {
        let (token, diags) = lex_token("32e57");
        assert_eq!(token.kind, TokenKind::RealLiteral);
        assert_eq!(real_value(&token), 32e57);
        assert!(diags.is_empty());

        let (token, _) = lex_token("0000032E+000__57");
        assert_eq!(real_value(&token), 32e57);

        let (token, _) = lex_token("3_2e-5__7");
        assert_eq!(real_value(&token), 32e-57);

        let (token, _) = lex_token("32.3456e57");
        assert_eq!(real_value(&token), 32.3456e57);
    }

    #[test]
    fn test_real_overflow_is_infinite() {
        let (token, diags) = lex_token("32e9000");
        assert!(real_value(&token).is_infinite());
        assert!(diags.is_empty());

        let text = "9".repeat(400) + ".0";
        let (token, diags) = lex_token(&text);
        assert!(real_value(&token).is_infinite());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_not_an_exponent() {
        let (tokens, diags) = lex_source("32e_9");
        assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(tokens[0].raw, "32");
        assert_eq!(tokens[1].kind, TokenKind::Identifier(IdentifierType::Normal));
        assert_eq!(tokens[1].raw, "e_9");
        assert!(diags.is_empty());
    }

    fn check_time_literal(text: &str, unit: TimeUnit) {
        let (token, diags) = lex_token(text);
        assert_eq!(token.kind, TokenKind::TimeLiteral, "input {:?}", text);
        assert_eq!(token.numeric.unwrap().flags.unit, Some(unit));
        assert_eq!(token.raw, text);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_time_literals() {
        check_time_literal("3.4s", TimeUnit::Seconds);
        check_time_literal("9999ms", TimeUnit::Milliseconds);
        check_time_literal("572.234us", TimeUnit::Microseconds);
        check_time_literal("97ns", TimeUnit::Nanoseconds);
        check_time_literal("42ps", TimeUnit::Picoseconds);
        check_time_literal("42fs", TimeUnit::Femtoseconds);
    }

    #[test]
    fn test_time_suffix_needs_boundary() {
        let (tokens, _) = lex_source("5sum");
        assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(tokens[1].kind, TokenKind::Identifier(IdentifierType::Normal));
        assert_eq!(tokens[1].raw, "sum");
    }

    #[test]
    fn test_misplaced_directive_char() {
        let (token, diags) = lex_token("`");
        assert_eq!(token.kind, TokenKind::Directive);
        assert_eq!(token.value_text(), "");
        assert_eq!(diags.last().unwrap().code, DiagCode::MisplacedDirectiveChar);
    }

    #[test]
    fn test_directive_token() {
        let (token, diags) = lex_token("`define");
        assert_eq!(token.kind, TokenKind::Directive);
        assert_eq!(token.value_text(), "define");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_all_keywords() {
        for &kw in Keyword::all() {
            let (token, diags) = lex_token(kw.text());
            assert_eq!(token.kind, TokenKind::Keyword(kw), "keyword {:?}", kw.text());
            assert_eq!(token.value_text(), kw.text());
            assert!(diags.is_empty(), "keyword {:?}", kw.text());
        }
    }

    #[test]
    fn test_all_punctuation() {
        // `'` and `'{` lex as literal-ish apostrophe forms handled above;
        // everything else must round-trip through the punct table.
        for &p in Punct::all() {
            let (token, diags) = lex_token(p.text());
            assert_eq!(token.kind, TokenKind::Punct(p), "punct {:?}", p.text());
            assert_eq!(token.value_text(), p.text());
            assert!(diags.is_empty(), "punct {:?}", p.text());
        }
    }

    #[test]
    fn test_directive_mode_macro_tokens() {
        let mut diags = Diagnostics::new();
        for (text, kind) in [
            ("`\"", TokenKind::MacroQuote),
            ("`\\\"", TokenKind::MacroEscapedQuote),
            ("``", TokenKind::MacroPaste),
        ] {
            let mut lexer = Lexer::new(SourceId(0), text);
            let token = lexer.lex(LexerMode::Directive, &mut diags);
            assert_eq!(token.kind, kind, "input {:?}", text);
            assert_eq!(token.raw, text);
        }
        assert!(diags.is_empty());
    }

    #[test]
    fn test_invalid_chars() {
        let (token, diags) = lex_token("\x04");
        assert_eq!(token.kind, TokenKind::Unknown);
        assert_eq!(diags.last().unwrap().code, DiagCode::NonPrintableChar);

        let (token, diags) = lex_token("\u{1f34c}");
        assert_eq!(token.kind, TokenKind::Unknown);
        assert_eq!(diags.last().unwrap().code, DiagCode::Utf8Char);

        let (token, diags) = lex_token("\0");
        assert_eq!(token.kind, TokenKind::Unknown);
        assert_eq!(diags.last().unwrap().code, DiagCode::EmbeddedNull);
    }

    #[test]
    fn test_unicode_bom() {
        let (token, diags) = lex_token("\u{FEFF} ");
        assert_eq!(token.kind, TokenKind::EndOfFile);
        assert_eq!(diags.last().unwrap().code, DiagCode::UnicodeBom);
        assert_eq!(token.full_text(), "\u{FEFF} ");
    }

    #[test]
    fn test_round_trip() {
        let text = "module m #(parameter int W = 8) (input logic [W-1:0] a);\n\
                    // keep\n  wire w = a[0]; /* b */\n  assign w = 'hff;\nendmodule\n";
        let (tokens, diags) = lex_source(text);
        let rebuilt: String = tokens.iter().map(Token::full_text).collect();
        assert_eq!(rebuilt, text);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_lex_determinism() {
        let text = "16'shBEEF 3.14ns foo $bar \"s\"";
        let (a, da) = lex_source(text);
        let (b, db) = lex_source(text);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.kind, y.kind);
            assert_eq!(x.raw, y.raw);
            assert_eq!(x.numeric, y.numeric);
        }
        assert_eq!(da.codes(), db.codes());
    }
}
