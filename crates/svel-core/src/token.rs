//! Token definitions: kinds, trivia, and the closed keyword and punctuation
//! sets.
//!
//! Tokens are trivia-preserving: each token carries its exact source spelling
//! plus the whitespace, comments and directives that preceded it, so
//! concatenating `full_text` over a token stream reproduces the original
//! source byte for byte.

use crate::source::Span;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Defines a closed token sub-kind enum together with its spelling table.
macro_rules! token_set {
    ($(#[$meta:meta])* $name:ident, $table:ident { $($variant:ident => $text:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// The source spelling.
            pub fn text(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }

            /// Every member of the set, for exhaustiveness tests.
            pub fn all() -> &'static [$name] {
                &[$(Self::$variant,)*]
            }
        }

        static $table: LazyLock<HashMap<&'static str, $name>> = LazyLock::new(|| {
            let mut map = HashMap::new();
            $(map.insert($text, $name::$variant);)*
            map
        });

        impl $name {
            pub fn from_text(text: &str) -> Option<Self> {
                $table.get(text).copied()
            }
        }
    };
}

token_set! {
    /// The complete SystemVerilog keyword set.
    Keyword, KEYWORD_TABLE {
        OneStep => "1step",
        AcceptOn => "accept_on",
        Alias => "alias",
        Always => "always",
        AlwaysComb => "always_comb",
        AlwaysFF => "always_ff",
        AlwaysLatch => "always_latch",
        And => "and",
        Assert => "assert",
        Assign => "assign",
        Assume => "assume",
        Automatic => "automatic",
        Before => "before",
        Begin => "begin",
        Bind => "bind",
        Bins => "bins",
        BinsOf => "binsof",
        Bit => "bit",
        Break => "break",
        Buf => "buf",
        BufIf0 => "bufif0",
        BufIf1 => "bufif1",
        Byte => "byte",
        Case => "case",
        CaseX => "casex",
        CaseZ => "casez",
        Cell => "cell",
        CHandle => "chandle",
        Checker => "checker",
        Class => "class",
        Clocking => "clocking",
        Cmos => "cmos",
        Config => "config",
        Const => "const",
        Constraint => "constraint",
        Context => "context",
        Continue => "continue",
        Cover => "cover",
        CoverGroup => "covergroup",
        CoverPoint => "coverpoint",
        Cross => "cross",
        Deassign => "deassign",
        Default => "default",
        DefParam => "defparam",
        Design => "design",
        Disable => "disable",
        Dist => "dist",
        Do => "do",
        Edge => "edge",
        Else => "else",
        End => "end",
        EndCase => "endcase",
        EndChecker => "endchecker",
        EndClass => "endclass",
        EndClocking => "endclocking",
        EndConfig => "endconfig",
        EndFunction => "endfunction",
        EndGenerate => "endgenerate",
        EndGroup => "endgroup",
        EndInterface => "endinterface",
        EndModule => "endmodule",
        EndPackage => "endpackage",
        EndPrimitive => "endprimitive",
        EndProgram => "endprogram",
        EndProperty => "endproperty",
        EndSpecify => "endspecify",
        EndSequence => "endsequence",
        EndTable => "endtable",
        EndTask => "endtask",
        Enum => "enum",
        Event => "event",
        Eventually => "eventually",
        Expect => "expect",
        Export => "export",
        Extends => "extends",
        Extern => "extern",
        Final => "final",
        FirstMatch => "first_match",
        For => "for",
        Force => "force",
        Foreach => "foreach",
        Forever => "forever",
        Fork => "fork",
        ForkJoin => "forkjoin",
        Function => "function",
        Generate => "generate",
        GenVar => "genvar",
        Global => "global",
        HighZ0 => "highz0",
        HighZ1 => "highz1",
        If => "if",
        Iff => "iff",
        IfNone => "ifnone",
        IgnoreBins => "ignore_bins",
        IllegalBins => "illegal_bins",
        Implements => "implements",
        Implies => "implies",
        Import => "import",
        IncDir => "incdir",
        Include => "include",
        Initial => "initial",
        InOut => "inout",
        Input => "input",
        Inside => "inside",
        Instance => "instance",
        Int => "int",
        Integer => "integer",
        Interconnect => "interconnect",
        Interface => "interface",
        Intersect => "intersect",
        Join => "join",
        JoinAny => "join_any",
        JoinNone => "join_none",
        Large => "large",
        Let => "let",
        LibList => "liblist",
        Library => "library",
        Local => "local",
        LocalParam => "localparam",
        Logic => "logic",
        LongInt => "longint",
        Macromodule => "macromodule",
        Matches => "matches",
        Medium => "medium",
        ModPort => "modport",
        Module => "module",
        Nand => "nand",
        NegEdge => "negedge",
        NetType => "nettype",
        New => "new",
        NextTime => "nexttime",
        Nmos => "nmos",
        Nor => "nor",
        NoShowCancelled => "noshowcancelled",
        Not => "not",
        NotIf0 => "notif0",
        NotIf1 => "notif1",
        Null => "null",
        Or => "or",
        Output => "output",
        Package => "package",
        Packed => "packed",
        Parameter => "parameter",
        Pmos => "pmos",
        PosEdge => "posedge",
        Primitive => "primitive",
        Priority => "priority",
        Program => "program",
        Property => "property",
        Protected => "protected",
        Pull0 => "pull0",
        Pull1 => "pull1",
        PullDown => "pulldown",
        PullUp => "pullup",
        PulseStyleOnDetect => "pulsestyle_ondetect",
        PulseStyleOnEvent => "pulsestyle_onevent",
        Pure => "pure",
        Rand => "rand",
        RandC => "randc",
        RandCase => "randcase",
        RandSequence => "randsequence",
        Rcmos => "rcmos",
        Real => "real",
        RealTime => "realtime",
        Ref => "ref",
        Reg => "reg",
        RejectOn => "reject_on",
        Release => "release",
        Repeat => "repeat",
        Restrict => "restrict",
        Return => "return",
        Rnmos => "rnmos",
        Rpmos => "rpmos",
        Rtran => "rtran",
        RtranIf0 => "rtranif0",
        RtranIf1 => "rtranif1",
        SAlways => "s_always",
        SEventually => "s_eventually",
        SNextTime => "s_nexttime",
        SUntil => "s_until",
        SUntilWith => "s_until_with",
        Scalared => "scalared",
        Sequence => "sequence",
        ShortInt => "shortint",
        ShortReal => "shortreal",
        ShowCancelled => "showcancelled",
        Signed => "signed",
        Small => "small",
        Soft => "soft",
        Solve => "solve",
        Specify => "specify",
        SpecParam => "specparam",
        Static => "static",
        String => "string",
        Strong => "strong",
        Strong0 => "strong0",
        Strong1 => "strong1",
        Struct => "struct",
        Super => "super",
        Supply0 => "supply0",
        Supply1 => "supply1",
        SyncAcceptOn => "sync_accept_on",
        SyncRejectOn => "sync_reject_on",
        Table => "table",
        Tagged => "tagged",
        Task => "task",
        This => "this",
        Throughout => "throughout",
        Time => "time",
        TimePrecision => "timeprecision",
        TimeUnit => "timeunit",
        Tran => "tran",
        TranIf0 => "tranif0",
        TranIf1 => "tranif1",
        Tri => "tri",
        Tri0 => "tri0",
        Tri1 => "tri1",
        TriAnd => "triand",
        TriOr => "trior",
        TriReg => "trireg",
        Type => "type",
        Typedef => "typedef",
        Union => "union",
        Unique => "unique",
        Unique0 => "unique0",
        Unsigned => "unsigned",
        Until => "until",
        UntilWith => "until_with",
        Untyped => "untyped",
        Use => "use",
        UWire => "uwire",
        Var => "var",
        Vectored => "vectored",
        Virtual => "virtual",
        Void => "void",
        Wait => "wait",
        WaitOrder => "wait_order",
        WAnd => "wand",
        Weak => "weak",
        Weak0 => "weak0",
        Weak1 => "weak1",
        While => "while",
        Wildcard => "wildcard",
        Wire => "wire",
        With => "with",
        Within => "within",
        WOr => "wor",
        Xnor => "xnor",
        Xor => "xor",
    }
}

token_set! {
    /// The complete punctuation set, including the multi-character sequence
    /// operators.
    Punct, PUNCT_TABLE {
        ApostropheOpenBrace => "'{",
        Apostrophe => "'",
        OpenBrace => "{",
        CloseBrace => "}",
        OpenBracket => "[",
        CloseBracket => "]",
        OpenParenthesis => "(",
        OpenParenthesisStar => "(*",
        OpenParenthesisStarCloseParenthesis => "(*)",
        CloseParenthesis => ")",
        StarCloseParenthesis => "*)",
        Semicolon => ";",
        Colon => ":",
        ColonEquals => ":=",
        ColonSlash => ":/",
        DoubleColon => "::",
        StarDoubleColonStar => "*::*",
        Comma => ",",
        DotStar => ".*",
        Dot => ".",
        Slash => "/",
        Star => "*",
        DoubleStar => "**",
        StarArrow => "*>",
        Plus => "+",
        DoublePlus => "++",
        PlusColon => "+:",
        Minus => "-",
        DoubleMinus => "--",
        MinusColon => "-:",
        MinusArrow => "->",
        MinusDoubleArrow => "->>",
        Tilde => "~",
        TildeAnd => "~&",
        TildeOr => "~|",
        TildeXor => "~^",
        Dollar => "$",
        Question => "?",
        Hash => "#",
        DoubleHash => "##",
        HashMinusHash => "#-#",
        HashEqualsHash => "#=#",
        Xor => "^",
        XorTilde => "^~",
        Equals => "=",
        DoubleEquals => "==",
        DoubleEqualsQuestion => "==?",
        TripleEquals => "===",
        EqualsArrow => "=>",
        PlusEqual => "+=",
        MinusEqual => "-=",
        SlashEqual => "/=",
        StarEqual => "*=",
        AndEqual => "&=",
        OrEqual => "|=",
        PercentEqual => "%=",
        XorEqual => "^=",
        LeftShiftEqual => "<<=",
        TripleLeftShiftEqual => "<<<=",
        RightShiftEqual => ">>=",
        TripleRightShiftEqual => ">>>=",
        LeftShift => "<<",
        RightShift => ">>",
        TripleLeftShift => "<<<",
        TripleRightShift => ">>>",
        Exclamation => "!",
        ExclamationEquals => "!=",
        ExclamationEqualsQuestion => "!=?",
        ExclamationDoubleEquals => "!==",
        Percent => "%",
        LessThan => "<",
        LessThanEquals => "<=",
        LessThanMinusArrow => "<->",
        GreaterThan => ">",
        GreaterThanEquals => ">=",
        Or => "|",
        DoubleOr => "||",
        OrMinusArrow => "|->",
        OrMinusDoubleArrow => "|->>",
        OrEqualsArrow => "|=>",
        At => "@",
        AtStar => "@*",
        DoubleAt => "@@",
        And => "&",
        DoubleAnd => "&&",
        TripleAnd => "&&&",
    }
}

/// How an identifier was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    Normal,
    /// `\escaped<ws>` form; the semantic value drops the backslash.
    Escaped,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    EndOfFile,
    Unknown,
    Identifier(IdentifierType),
    SystemIdentifier,
    StringLiteral,
    IntegerLiteral,
    RealLiteral,
    TimeLiteral,
    IntegerBase,
    UnbasedUnsizedLiteral,
    /// A `` `name `` reference; the semantic value is the name.
    Directive,
    /// `` `" `` inside a macro body.
    MacroQuote,
    /// `` `\" `` inside a macro body.
    MacroEscapedQuote,
    /// ```` `` ```` token paste operator.
    MacroPaste,
    /// Backslash-newline inside a directive.
    LineContinuation,
    Keyword(Keyword),
    Punct(Punct),
}

/// Trivia kinds attached before tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaKind {
    Whitespace,
    EndOfLine,
    LineComment,
    BlockComment,
    /// A consumed preprocessor directive, attached to the next substantive
    /// token so source-faithful rendering survives preprocessing.
    Directive(DirectiveKind),
    /// Tokens skipped by a false conditional-compilation branch.
    SkippedTokens,
}

/// The preprocessor directives the front-end understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Define,
    Undef,
    UndefineAll,
    IfDef,
    IfNDef,
    ElsIf,
    Else,
    EndIf,
    Include,
    Line,
    Timescale,
    ResetAll,
    DefaultNetType,
    BeginKeywords,
    EndKeywords,
    CellDefine,
    EndCellDefine,
    UnconnectedDrive,
    NoUnconnectedDrive,
    Pragma,
    /// A macro usage that was expanded.
    MacroUsage,
    Unknown,
}

impl DirectiveKind {
    pub fn from_name(name: &str) -> DirectiveKind {
        match name {
            "define" => DirectiveKind::Define,
            "undef" => DirectiveKind::Undef,
            "undefineall" => DirectiveKind::UndefineAll,
            "ifdef" => DirectiveKind::IfDef,
            "ifndef" => DirectiveKind::IfNDef,
            "elsif" => DirectiveKind::ElsIf,
            "else" => DirectiveKind::Else,
            "endif" => DirectiveKind::EndIf,
            "include" => DirectiveKind::Include,
            "line" => DirectiveKind::Line,
            "timescale" => DirectiveKind::Timescale,
            "resetall" => DirectiveKind::ResetAll,
            "default_nettype" => DirectiveKind::DefaultNetType,
            "begin_keywords" => DirectiveKind::BeginKeywords,
            "end_keywords" => DirectiveKind::EndKeywords,
            "celldefine" => DirectiveKind::CellDefine,
            "endcelldefine" => DirectiveKind::EndCellDefine,
            "unconnected_drive" => DirectiveKind::UnconnectedDrive,
            "nounconnected_drive" => DirectiveKind::NoUnconnectedDrive,
            "pragma" => DirectiveKind::Pragma,
            _ => DirectiveKind::Unknown,
        }
    }
}

/// A piece of leading trivia with its exact source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub raw: String,
    pub span: Span,
}

/// Base of a sized integer literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralBase {
    Binary,
    Octal,
    Decimal,
    Hex,
}

impl LiteralBase {
    pub fn radix(self) -> u32 {
        match self {
            LiteralBase::Binary => 2,
            LiteralBase::Octal => 8,
            LiteralBase::Decimal => 10,
            LiteralBase::Hex => 16,
        }
    }
}

/// Unit suffix of a time literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
    Picoseconds,
    Femtoseconds,
}

impl TimeUnit {
    pub fn from_suffix(s: &str) -> Option<TimeUnit> {
        match s {
            "s" => Some(TimeUnit::Seconds),
            "ms" => Some(TimeUnit::Milliseconds),
            "us" => Some(TimeUnit::Microseconds),
            "ns" => Some(TimeUnit::Nanoseconds),
            "ps" => Some(TimeUnit::Picoseconds),
            "fs" => Some(TimeUnit::Femtoseconds),
            _ => None,
        }
    }
}

/// Base/signedness/time-unit flags for numeric literal tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericFlags {
    pub base: Option<LiteralBase>,
    pub signed: bool,
    pub unit: Option<TimeUnit>,
}

/// The decoded value of a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Integer(u64),
    Real(f64),
    /// One of `'0 '1 'x 'z`; the payload is the bit character.
    UnsizedBit(char),
}

/// Numeric payload for literal tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericInfo {
    pub value: NumericValue,
    pub flags: NumericFlags,
}

/// A lexed token with its leading trivia.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Exact source spelling of the token itself (no trivia).
    pub raw: String,
    /// Semantic value: unescaped identifier text, string contents, keyword
    /// or punctuation spelling.
    pub value: String,
    pub trivia: Vec<Trivia>,
    pub numeric: Option<NumericInfo>,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, raw: impl Into<String>) -> Token {
        let raw = raw.into();
        let value = raw.clone();
        Token { kind, span, raw, value, trivia: Vec::new(), numeric: None }
    }

    /// The token's leading trivia followed by its own spelling; concatenated
    /// over a stream this reproduces the source.
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        for t in &self.trivia {
            out.push_str(&t.raw);
        }
        out.push_str(&self.raw);
        out
    }

    pub fn value_text(&self) -> &str {
        &self.value
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EndOfFile
    }

    /// True when any leading trivia is an end-of-line, i.e. the token starts
    /// a new source line. Directive parsing uses this to find the end of a
    /// directive body.
    pub fn starts_line(&self) -> bool {
        self.trivia.iter().any(|t| t.kind == TriviaKind::EndOfLine)
    }
}
