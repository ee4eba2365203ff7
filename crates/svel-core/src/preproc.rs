//! The preprocessor: directive handling, macro expansion, conditional
//! compilation and `` `include `` resolution.
//!
//! Consumed directives do not disappear: their exact text is attached as
//! [`TriviaKind::Directive`] trivia to the next token that survives, so the
//! output stream still renders back to the original source (modulo expanded
//! macro bodies).

use crate::diag::{DiagCode, Diagnostics};
use crate::lexer::{Lexer, LexerMode};
use crate::nettype::NetKind;
use crate::source::{SourceId, SourceMap, Span};
use crate::token::{
    DirectiveKind, IdentifierType, Keyword, Punct, Token, TokenKind, Trivia, TriviaKind,
};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// A recorded `` `define ``.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub span: Span,
    /// Formal argument names, `None` for object-like macros.
    pub formals: Option<Vec<String>>,
    pub body: Vec<Token>,
}

/// One branch level of `` `ifdef `` nesting.
#[derive(Debug, Clone, Copy)]
struct CondState {
    /// Whether any branch at this level has been taken yet.
    any_taken: bool,
    /// Whether the current branch is live.
    taken: bool,
}

enum Frame {
    /// An open source buffer being lexed on demand.
    Source { source: SourceId, text: Rc<str>, offset: usize },
    /// Replayed tokens from a macro expansion.
    Expansion { tokens: Vec<Token>, pos: usize, name: String },
}

/// Preprocessor state for one translation unit.
pub struct Preprocessor {
    macros: HashMap<String, MacroDef>,
    frames: Vec<Frame>,
    lookahead: Option<Token>,
    conditionals: Vec<CondState>,
    default_net_type: NetKind,
    in_cell_define: bool,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
            frames: Vec::new(),
            lookahead: None,
            conditionals: Vec::new(),
            default_net_type: NetKind::Wire,
            in_cell_define: false,
        }
    }

    /// The net type currently selected by `` `default_nettype ``;
    /// `` none `` maps to the error net kind.
    pub fn default_net_type(&self) -> NetKind {
        self.default_net_type
    }

    pub fn in_cell_define(&self) -> bool {
        self.in_cell_define
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Run the whole pipeline over one source buffer, producing the filtered
    /// token stream the parser consumes.
    pub fn preprocess(
        &mut self,
        sources: &mut SourceMap,
        source: SourceId,
        diags: &mut Diagnostics,
    ) -> Vec<Token> {
        let text: Rc<str> = match sources.get(source) {
            Some(src) => Rc::from(src.content.as_str()),
            None => Rc::from(""),
        };
        self.frames.push(Frame::Source { source, text, offset: 0 });

        let mut out = Vec::new();
        let mut pending: Vec<Trivia> = Vec::new();
        let mut skipped = String::new();

        loop {
            let token = self.next_raw(LexerMode::Default, diags);

            if self.skipping() && !is_conditional_directive(&token) {
                if token.is_eof() {
                    diags.add(DiagCode::UnexpectedConditionalDirective, token.span);
                    self.conditionals.clear();
                } else {
                    skipped.push_str(&token.full_text());
                    continue;
                }
            }
            if !skipped.is_empty() {
                pending.push(Trivia {
                    kind: TriviaKind::SkippedTokens,
                    raw: std::mem::take(&mut skipped),
                    span: token.span,
                });
            }

            match token.kind {
                TokenKind::Directive => {
                    self.handle_directive(token, sources, diags, &mut pending, &mut out);
                }
                TokenKind::EndOfFile => {
                    if !self.conditionals.is_empty() {
                        diags.add(DiagCode::UnexpectedConditionalDirective, token.span);
                        self.conditionals.clear();
                    }
                    let mut token = token;
                    prepend_trivia(&mut token, &mut pending);
                    out.push(token);
                    break;
                }
                _ => {
                    let mut token = token;
                    prepend_trivia(&mut token, &mut pending);
                    out.push(token);
                }
            }
        }

        self.frames.clear();
        self.lookahead = None;
        out
    }

    // ------------------------------------------------------------------
    // Raw token plumbing
    // ------------------------------------------------------------------

    fn next_raw(&mut self, mode: LexerMode, diags: &mut Diagnostics) -> Token {
        if let Some(token) = self.lookahead.take() {
            // Pushed-back tokens were lexed in directive mode; re-resolve
            // them for the requested mode.
            if let Some(resolved) = resolve_in_mode(token, mode) {
                return resolved;
            }
        }

        loop {
            let nframes = self.frames.len();
            let (token, exhausted) = match self.frames.last_mut() {
                None => {
                    return Token::new(TokenKind::EndOfFile, Span::default(), "");
                }
                Some(Frame::Expansion { tokens, pos, .. }) => {
                    if *pos >= tokens.len() {
                        (None, true)
                    } else {
                        let token = tokens[*pos].clone();
                        *pos += 1;
                        (Some(token), false)
                    }
                }
                Some(Frame::Source { source, text, offset }) => {
                    let mut lexer = Lexer::resume(*source, text, *offset);
                    let token = lexer.lex(mode, diags);
                    *offset = lexer.offset();
                    // A nested file's EOF pops back to the including file.
                    let at_eof = token.is_eof() && nframes > 1;
                    (Some(token), at_eof)
                }
            };

            if exhausted {
                self.frames.pop();
                continue;
            }

            let token = token.unwrap();
            if let Some(resolved) = resolve_in_mode(token, mode) {
                return resolved;
            }
        }
    }

    fn push_back(&mut self, token: Token) {
        debug_assert!(self.lookahead.is_none());
        self.lookahead = Some(token);
    }

    /// Read the rest of the current directive: every token up to (not
    /// including) the first one that begins a new line. Line continuations
    /// are consumed and kept in the raw text.
    fn read_directive_tail(&mut self, diags: &mut Diagnostics) -> Vec<Token> {
        let mut body = Vec::new();
        loop {
            let token = self.next_raw(LexerMode::Directive, diags);
            if token.is_eof() {
                self.push_back(token);
                break;
            }
            if token.starts_line() {
                self.push_back(token);
                break;
            }
            body.push(token);
        }
        body
    }

    fn skipping(&self) -> bool {
        self.conditionals.iter().any(|c| !c.taken)
    }

    // ------------------------------------------------------------------
    // Directive dispatch
    // ------------------------------------------------------------------

    fn handle_directive(
        &mut self,
        token: Token,
        sources: &mut SourceMap,
        diags: &mut Diagnostics,
        pending: &mut Vec<Trivia>,
        out: &mut Vec<Token>,
    ) {
        let kind = DirectiveKind::from_name(&token.value);
        match kind {
            DirectiveKind::Define => self.handle_define(token, diags, pending),
            DirectiveKind::Undef => {
                let tail = self.read_directive_tail(diags);
                if let Some(name) = first_identifier(&tail) {
                    self.macros.remove(name);
                } else {
                    diags.add(DiagCode::ExpectedMacroName, token.span);
                }
                push_directive_trivia(pending, kind, &token, &tail);
            }
            DirectiveKind::UndefineAll => {
                self.macros.clear();
                push_directive_trivia(pending, kind, &token, &[]);
            }
            DirectiveKind::IfDef | DirectiveKind::IfNDef => {
                let tail = self.read_directive_tail(diags);
                let defined = first_identifier(&tail).is_some_and(|n| self.macros.contains_key(n));
                let taken = if self.skipping() {
                    // Inside a dead region every branch stays dead.
                    self.conditionals.push(CondState { any_taken: true, taken: false });
                    false
                } else {
                    let taken = defined == (kind == DirectiveKind::IfDef);
                    self.conditionals.push(CondState { any_taken: taken, taken });
                    taken
                };
                trace!(directive = ?kind, taken, "conditional");
                push_directive_trivia(pending, kind, &token, &tail);
            }
            DirectiveKind::ElsIf => {
                let tail = self.read_directive_tail(diags);
                let defined = first_identifier(&tail).is_some_and(|n| self.macros.contains_key(n));
                match self.conditionals.last_mut() {
                    None => {
                        diags.add(DiagCode::UnexpectedConditionalDirective, token.span);
                    }
                    Some(state) => {
                        state.taken = !state.any_taken && defined;
                        state.any_taken |= state.taken;
                    }
                }
                push_directive_trivia(pending, kind, &token, &tail);
            }
            DirectiveKind::Else => {
                match self.conditionals.last_mut() {
                    None => {
                        diags.add(DiagCode::UnexpectedConditionalDirective, token.span);
                    }
                    Some(state) => {
                        state.taken = !state.any_taken;
                        state.any_taken = true;
                    }
                }
                push_directive_trivia(pending, kind, &token, &[]);
            }
            DirectiveKind::EndIf => {
                if self.conditionals.pop().is_none() {
                    diags.add(DiagCode::UnexpectedConditionalDirective, token.span);
                }
                push_directive_trivia(pending, kind, &token, &[]);
            }
            DirectiveKind::Include => self.handle_include(token, sources, diags, pending, out),
            DirectiveKind::DefaultNetType => {
                let tail = self.read_directive_tail(diags);
                if let Some(net) = tail.first().and_then(|t| NetKind::from_token_text(&t.value)) {
                    self.default_net_type = net;
                }
                push_directive_trivia(pending, kind, &token, &tail);
            }
            DirectiveKind::ResetAll => {
                self.default_net_type = NetKind::Wire;
                self.in_cell_define = false;
                push_directive_trivia(pending, kind, &token, &[]);
            }
            DirectiveKind::CellDefine => {
                self.in_cell_define = true;
                push_directive_trivia(pending, kind, &token, &[]);
            }
            DirectiveKind::EndCellDefine => {
                self.in_cell_define = false;
                push_directive_trivia(pending, kind, &token, &[]);
            }
            DirectiveKind::Line
            | DirectiveKind::Timescale
            | DirectiveKind::BeginKeywords
            | DirectiveKind::EndKeywords
            | DirectiveKind::UnconnectedDrive
            | DirectiveKind::NoUnconnectedDrive
            | DirectiveKind::Pragma => {
                let tail = self.read_directive_tail(diags);
                push_directive_trivia(pending, kind, &token, &tail);
            }
            DirectiveKind::Unknown | DirectiveKind::MacroUsage => {
                self.handle_macro_usage(token, diags, pending, out);
            }
        }
    }

    // ------------------------------------------------------------------
    // `define and macro expansion
    // ------------------------------------------------------------------

    fn handle_define(&mut self, token: Token, diags: &mut Diagnostics, pending: &mut Vec<Trivia>) {
        let mut consumed = Vec::new();

        let name_token = self.next_raw(LexerMode::Directive, diags);
        if name_token.starts_line()
            || !matches!(name_token.kind, TokenKind::Identifier(IdentifierType::Normal))
        {
            diags.add(DiagCode::ExpectedMacroName, token.span);
            self.push_back(name_token);
            push_directive_trivia(pending, DirectiveKind::Define, &token, &consumed);
            return;
        }
        let name = name_token.value.clone();
        let name_end = name_token.span.end;
        consumed.push(name_token);

        // A formal list only exists when the open paren hugs the macro name.
        let mut formals = None;
        let next = self.next_raw(LexerMode::Directive, diags);
        let is_formal_list = next.kind == TokenKind::Punct(Punct::OpenParenthesis)
            && next.trivia.is_empty()
            && next.span.start == name_end
            && !next.starts_line();
        if is_formal_list {
            consumed.push(next);
            let mut names = Vec::new();
            loop {
                let arg = self.next_raw(LexerMode::Directive, diags);
                let done = arg.kind == TokenKind::Punct(Punct::CloseParenthesis)
                    || arg.is_eof()
                    || arg.starts_line();
                if let TokenKind::Identifier(_) = arg.kind {
                    names.push(arg.value.clone());
                }
                if arg.is_eof() || arg.starts_line() {
                    self.push_back(arg);
                    break;
                }
                consumed.push(arg);
                if done {
                    break;
                }
            }
            formals = Some(names);
        } else {
            self.push_back(next);
        }

        let body = self.read_directive_tail(diags);
        consumed.extend(body.iter().cloned());

        let body: Vec<Token> =
            body.into_iter().filter(|t| t.kind != TokenKind::LineContinuation).collect();

        debug!(name = %name, formals = ?formals, body_len = body.len(), "define");
        self.macros.insert(
            name.clone(),
            MacroDef { name, span: token.span, formals, body },
        );
        push_directive_trivia(pending, DirectiveKind::Define, &token, &consumed);
    }

    fn handle_macro_usage(
        &mut self,
        token: Token,
        diags: &mut Diagnostics,
        pending: &mut Vec<Trivia>,
        out: &mut Vec<Token>,
    ) {
        let name = token.value.clone();
        let Some(def) = self.macros.get(&name).cloned() else {
            diags.add(DiagCode::UnknownDirective, token.span).arg(&name);
            let mut token = token;
            prepend_trivia(&mut token, pending);
            out.push(token);
            return;
        };

        if self.is_expanding(&name) {
            diags.add(DiagCode::RecursiveMacroDefinition, token.span).arg(&name);
            let mut token = token;
            prepend_trivia(&mut token, pending);
            out.push(token);
            return;
        }

        let mut consumed = Vec::new();
        let body = match &def.formals {
            None => def.body.clone(),
            Some(formals) => {
                let open = self.next_raw(LexerMode::Default, diags);
                if open.kind != TokenKind::Punct(Punct::OpenParenthesis) {
                    diags.add(DiagCode::ExpectedMacroArgs, token.span).arg(&name);
                    self.push_back(open);
                    let mut token = token;
                    prepend_trivia(&mut token, pending);
                    out.push(token);
                    return;
                }
                consumed.push(open);

                let args = self.read_macro_args(&mut consumed, diags);
                if args.len() != formals.len() {
                    diags
                        .add(DiagCode::WrongMacroArgCount, token.span)
                        .arg(args.len())
                        .arg(formals.len());
                    let mut token = token;
                    prepend_trivia(&mut token, pending);
                    out.push(token);
                    return;
                }

                substitute_args(&def.body, formals, &args)
            }
        };

        trace!(name = %name, "expanding macro");
        push_directive_trivia(pending, DirectiveKind::MacroUsage, &token, &consumed);
        self.frames.push(Frame::Expansion { tokens: body, pos: 0, name });
    }

    fn is_expanding(&self, name: &str) -> bool {
        self.frames.iter().any(|f| matches!(f, Frame::Expansion { name: n, .. } if n == name))
    }

    /// Read macro call arguments after the opening paren: comma-separated at
    /// nesting depth zero, up to the matching close paren.
    fn read_macro_args(
        &mut self,
        consumed: &mut Vec<Token>,
        diags: &mut Diagnostics,
    ) -> Vec<Vec<Token>> {
        let mut args: SmallVec<[Vec<Token>; 4]> = SmallVec::new();
        let mut current = Vec::new();
        let mut depth = 0u32;
        let mut saw_any = false;

        loop {
            let token = self.next_raw(LexerMode::Default, diags);
            if token.is_eof() {
                self.push_back(token);
                break;
            }
            match token.kind {
                TokenKind::Punct(Punct::OpenParenthesis) => depth += 1,
                TokenKind::Punct(Punct::CloseParenthesis) => {
                    if depth == 0 {
                        consumed.push(token);
                        break;
                    }
                    depth -= 1;
                }
                TokenKind::Punct(Punct::Comma) if depth == 0 => {
                    consumed.push(token);
                    args.push(std::mem::take(&mut current));
                    saw_any = true;
                    continue;
                }
                _ => {}
            }
            saw_any = true;
            consumed.push(token.clone());
            current.push(token);
        }

        if saw_any || !current.is_empty() {
            args.push(current);
        }
        args.into_vec()
    }

    // ------------------------------------------------------------------
    // `include
    // ------------------------------------------------------------------

    fn handle_include(
        &mut self,
        token: Token,
        sources: &mut SourceMap,
        diags: &mut Diagnostics,
        pending: &mut Vec<Trivia>,
        out: &mut Vec<Token>,
    ) {
        let from = token.span.source;
        let name_token = self.next_raw(LexerMode::Directive, diags);

        if name_token.kind != TokenKind::StringLiteral {
            // Angle-bracketed form: collect raw text between < and >.
            if name_token.kind == TokenKind::Punct(Punct::LessThan) {
                let mut consumed = vec![name_token];
                let mut name = String::new();
                loop {
                    let t = self.next_raw(LexerMode::Directive, diags);
                    if t.is_eof() || t.starts_line() {
                        self.push_back(t);
                        diags.add(DiagCode::ExpectedIncludeFileName, token.span);
                        push_directive_trivia(pending, DirectiveKind::Include, &token, &consumed);
                        return;
                    }
                    if t.kind == TokenKind::Punct(Punct::GreaterThan) {
                        consumed.push(t);
                        break;
                    }
                    name.push_str(&t.full_text());
                    consumed.push(t);
                }
                self.enter_include(&name, false, from, &token, consumed, sources, diags, pending, out);
                return;
            }

            diags.add(DiagCode::ExpectedIncludeFileName, token.span);
            self.push_back(name_token);
            push_directive_trivia(pending, DirectiveKind::Include, &token, &[]);
            return;
        }

        let name = name_token.value.clone();
        self.enter_include(
            &name,
            true,
            from,
            &token,
            vec![name_token],
            sources,
            diags,
            pending,
            out,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_include(
        &mut self,
        name: &str,
        quoted: bool,
        from: SourceId,
        directive: &Token,
        consumed: Vec<Token>,
        sources: &mut SourceMap,
        diags: &mut Diagnostics,
        pending: &mut Vec<Trivia>,
        out: &mut Vec<Token>,
    ) {
        match sources.resolve_include(name, quoted, from) {
            Some(id) => {
                debug!(file = %name, "include resolved");
                push_directive_trivia(pending, DirectiveKind::Include, directive, &consumed);
                let text: Rc<str> = Rc::from(sources.get(id).unwrap().content.as_str());
                self.frames.push(Frame::Source { source: id, text, offset: 0 });
            }
            None => {
                debug!(file = %name, "include not found");
                diags.add(DiagCode::CouldNotOpenIncludeFile, directive.span).arg(name);
                // The file name token passes through so downstream still
                // sees something where the include was.
                push_directive_trivia(pending, DirectiveKind::Include, directive, &[]);
                for mut t in consumed {
                    prepend_trivia(&mut t, pending);
                    out.push(t);
                }
            }
        }
    }
}

fn is_conditional_directive(token: &Token) -> bool {
    token.kind == TokenKind::Directive
        && matches!(
            DirectiveKind::from_name(&token.value),
            DirectiveKind::IfDef
                | DirectiveKind::IfNDef
                | DirectiveKind::ElsIf
                | DirectiveKind::Else
                | DirectiveKind::EndIf
        )
}

/// Directive-mode tokens leave keywords unresolved; fix that up when a token
/// re-enters the default stream (macro bodies, pushed-back tokens).
fn resolve_in_mode(token: Token, mode: LexerMode) -> Option<Token> {
    if mode == LexerMode::Directive {
        return Some(token);
    }
    match token.kind {
        TokenKind::LineContinuation => None,
        TokenKind::Identifier(IdentifierType::Normal) => {
            match Keyword::from_text(&token.value) {
                Some(kw) => Some(Token { kind: TokenKind::Keyword(kw), ..token }),
                None => Some(token),
            }
        }
        _ => Some(token),
    }
}

fn first_identifier(tokens: &[Token]) -> Option<&str> {
    tokens.iter().find_map(|t| match t.kind {
        TokenKind::Identifier(_) => Some(t.value.as_str()),
        _ => None,
    })
}

fn prepend_trivia(token: &mut Token, pending: &mut Vec<Trivia>) {
    if pending.is_empty() {
        return;
    }
    let mut trivia = std::mem::take(pending);
    trivia.append(&mut token.trivia);
    token.trivia = trivia;
}

/// Record a consumed directive (and everything it swallowed) as trivia.
fn push_directive_trivia(
    pending: &mut Vec<Trivia>,
    kind: DirectiveKind,
    directive: &Token,
    consumed: &[Token],
) {
    // Leading trivia of the backtick token stays ordinary trivia.
    pending.extend(directive.trivia.iter().cloned());
    let mut raw = directive.raw.clone();
    for t in consumed {
        raw.push_str(&t.full_text());
    }
    let span = consumed
        .last()
        .map(|t| directive.span.merge(t.span))
        .unwrap_or(directive.span);
    pending.push(Trivia { kind: TriviaKind::Directive(kind), raw, span });
}

/// Replace formal-name identifiers in a macro body with the captured
/// argument token sequences.
fn substitute_args(body: &[Token], formals: &[String], args: &[Vec<Token>]) -> Vec<Token> {
    let mut out = Vec::with_capacity(body.len());
    for token in body {
        let formal = match token.kind {
            TokenKind::Identifier(IdentifierType::Normal) => {
                formals.iter().position(|f| *f == token.value)
            }
            _ => None,
        };
        match formal {
            Some(idx) => {
                let arg = &args[idx];
                for (i, mut t) in arg.iter().cloned().enumerate() {
                    if i == 0 {
                        // Keep the spacing the formal had at its use site.
                        t.trivia = token.trivia.clone();
                    }
                    out.push(t);
                }
            }
            None => out.push(token.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::NumericValue;

    fn preprocess(text: &str) -> (Vec<Token>, Diagnostics) {
        let mut sources = SourceMap::new();
        let id = sources.add_inline(text);
        let mut diags = Diagnostics::new();
        let mut pp = Preprocessor::new();
        let tokens = pp.preprocess(&mut sources, id, &mut diags);
        (tokens, diags)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_include_missing_file() {
        let (tokens, diags) = preprocess("`include \"include.svh\"");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(diags.last().unwrap().code, DiagCode::CouldNotOpenIncludeFile);
    }

    #[test]
    fn test_define_simple() {
        let (tokens, diags) = preprocess("`define FOO (1)");
        assert_eq!(tokens.len(), 1);
        let eof = &tokens[0];
        assert_eq!(eof.kind, TokenKind::EndOfFile);
        assert!(diags.is_empty());
        let dir = eof
            .trivia
            .iter()
            .find(|t| t.kind == TriviaKind::Directive(DirectiveKind::Define))
            .unwrap();
        assert_eq!(dir.raw, "`define FOO (1)");
    }

    #[test]
    fn test_define_function_like() {
        let (tokens, diags) = preprocess("`define FOO(a) a+1");
        assert_eq!(tokens[0].kind, TokenKind::EndOfFile);
        assert!(diags.is_empty());
        assert_eq!(tokens[0].full_text(), "`define FOO(a) a+1");
    }

    #[test]
    fn test_macro_usage_undefined() {
        let (tokens, diags) = preprocess("`FOO");
        assert_eq!(diags.last().unwrap().code, DiagCode::UnknownDirective);
        assert_eq!(tokens[0].kind, TokenKind::Directive);
    }

    #[test]
    fn test_macro_usage_simple() {
        let (tokens, diags) = preprocess("`define FOO 42\n`FOO");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(tokens[0].numeric.unwrap().value, NumericValue::Integer(42));
        assert_eq!(tokens[1].kind, TokenKind::EndOfFile);
    }

    #[test]
    fn test_function_like_expansion() {
        let (tokens, diags) = preprocess("`define ADD(x, y) x + y\n`ADD(1, 2)");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::Punct(Punct::Plus),
                TokenKind::IntegerLiteral,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_function_like_wrong_arity() {
        let (_, diags) = preprocess("`define ADD(x, y) x + y\n`ADD(1)");
        assert_eq!(diags.last().unwrap().code, DiagCode::WrongMacroArgCount);
    }

    #[test]
    fn test_function_like_missing_parens() {
        let (_, diags) = preprocess("`define ADD(x) x\n`ADD zz");
        assert!(diags.codes().contains(&DiagCode::ExpectedMacroArgs));
    }

    #[test]
    fn test_nested_expansion() {
        let (tokens, diags) = preprocess("`define A 1\n`define B `A\n`B");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(tokens[0].numeric.unwrap().value, NumericValue::Integer(1));
    }

    #[test]
    fn test_recursive_macro_guard() {
        let (_, diags) = preprocess("`define A `A\n`A");
        assert_eq!(diags.last().unwrap().code, DiagCode::RecursiveMacroDefinition);
    }

    #[test]
    fn test_undef() {
        let (_, diags) = preprocess("`define FOO 1\n`undef FOO\n`FOO");
        assert_eq!(diags.last().unwrap().code, DiagCode::UnknownDirective);
    }

    #[test]
    fn test_undefineall() {
        let (_, diags) = preprocess("`define A 1\n`define B 2\n`undefineall\n`A");
        assert_eq!(diags.last().unwrap().code, DiagCode::UnknownDirective);
    }

    #[test]
    fn test_ifdef_not_taken() {
        let (tokens, diags) = preprocess("`ifdef MISSING\nfoo\n`endif\nbar");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].kind, TokenKind::Identifier(IdentifierType::Normal));
        assert_eq!(tokens[0].value_text(), "bar");
        assert!(tokens[0].trivia.iter().any(|t| t.kind == TriviaKind::SkippedTokens));
    }

    #[test]
    fn test_ifdef_taken() {
        let (tokens, diags) = preprocess("`define YES\n`ifdef YES\nfoo\n`endif");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].value_text(), "foo");
    }

    #[test]
    fn test_ifndef_else() {
        let (tokens, diags) = preprocess("`ifndef MISSING\na\n`else\nb\n`endif");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].value_text(), "a");
        assert_eq!(tokens[1].kind, TokenKind::EndOfFile);
    }

    #[test]
    fn test_elsif_chain() {
        let source = "`define B\n`ifdef A\na\n`elsif B\nb\n`else\nc\n`endif";
        let (tokens, diags) = preprocess(source);
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].value_text(), "b");
    }

    #[test]
    fn test_nested_conditionals_in_dead_region() {
        let source = "`ifdef A\n`ifdef B\nx\n`else\ny\n`endif\nz\n`endif\nok";
        let (tokens, diags) = preprocess(source);
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].value_text(), "ok");
    }

    #[test]
    fn test_unbalanced_endif() {
        let (_, diags) = preprocess("`endif");
        assert_eq!(diags.last().unwrap().code, DiagCode::UnexpectedConditionalDirective);
    }

    #[test]
    fn test_default_nettype_tracking() {
        let mut sources = SourceMap::new();
        let id = sources.add_inline("`default_nettype none\nmodule m; endmodule");
        let mut diags = Diagnostics::new();
        let mut pp = Preprocessor::new();
        pp.preprocess(&mut sources, id, &mut diags);
        assert_eq!(pp.default_net_type(), NetKind::Unknown);

        let id2 = sources.add_inline("`default_nettype triand");
        pp.preprocess(&mut sources, id2, &mut diags);
        assert_eq!(pp.default_net_type(), NetKind::TriAnd);

        let id3 = sources.add_inline("`resetall");
        pp.preprocess(&mut sources, id3, &mut diags);
        assert_eq!(pp.default_net_type(), NetKind::Wire);
    }

    #[test]
    fn test_celldefine_tracking() {
        let mut sources = SourceMap::new();
        let id = sources.add_inline("`celldefine");
        let mut diags = Diagnostics::new();
        let mut pp = Preprocessor::new();
        pp.preprocess(&mut sources, id, &mut diags);
        assert!(pp.in_cell_define());

        let id2 = sources.add_inline("`endcelldefine");
        pp.preprocess(&mut sources, id2, &mut diags);
        assert!(!pp.in_cell_define());
    }

    #[test]
    fn test_multiline_define() {
        let (tokens, diags) = preprocess("`define TWO 1 + \\\n 1\n`TWO");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::Punct(Punct::Plus),
                TokenKind::IntegerLiteral,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_keywords_resolved_in_expansion() {
        let (tokens, diags) = preprocess("`define M module\n`M");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Module));
    }

    #[test]
    fn test_directive_trivia_preserved() {
        let (tokens, _) = preprocess("`define FOO 1\nwire");
        let wire = &tokens[0];
        assert_eq!(wire.kind, TokenKind::Keyword(Keyword::Wire));
        assert!(wire
            .trivia
            .iter()
            .any(|t| t.kind == TriviaKind::Directive(DirectiveKind::Define)));
        // Full text of the stream still contains the directive text.
        let rebuilt: String = tokens.iter().map(Token::full_text).collect();
        assert_eq!(rebuilt, "`define FOO 1\nwire");
    }

    #[test]
    fn test_timescale_consumed() {
        let (tokens, diags) = preprocess("`timescale 1ns / 1ps\nwire");
        assert!(diags.is_empty(), "{:?}", diags.codes());
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Wire));
        let rebuilt: String = tokens.iter().map(Token::full_text).collect();
        assert_eq!(rebuilt, "`timescale 1ns / 1ps\nwire");
    }
}
