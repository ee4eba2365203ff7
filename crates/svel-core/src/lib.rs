//! SystemVerilog semantic front-end.
//!
//! Takes source text through lexing and preprocessing, and a parsed syntax
//! tree through elaboration: a hierarchy of scopes, symbols, types and bound
//! expressions ready for downstream analysis.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Compilation                             │
//! │  ┌──────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌─────────┐ │
//! │  │ Interner │ │ Symbols │ │  Types   │ │ NetTypes │ │  Diags  │ │
//! │  │ (names)  │ │ (graph) │ │ (canon.) │ │ (13+user)│ │ (sink)  │ │
//! │  └──────────┘ └─────────┘ └──────────┘ └──────────┘ └─────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//!        ↑              ↑            ↑
//!        │              │            │
//!   ┌────┴───┐    ┌─────┴────┐  ┌────┴────┐   ┌──────────┐
//!   │ Lexer  │ →  │ Preproc  │→ │ (parse) │ → │Elaborate │ → JSON dump
//!   │(tokens)│    │ (tokens) │  │ external│   │ + Bind   │
//!   └────────┘    └──────────┘  └─────────┘   └──────────┘
//! ```
//!
//! The parser is an external collaborator: [`syntax`] defines the node
//! shapes it produces. Scopes populate lazily, all lazy state is memoized
//! behind `&mut Compilation`, and errors are recorded as diagnostics rather
//! than thrown.

pub mod bind;
pub mod context;
pub mod diag;
pub mod ids;
pub mod index_vec;
pub mod inst;
pub mod interner;
pub mod lexer;
pub mod nettype;
pub mod preproc;
pub mod serialize;
pub mod sformat;
pub mod source;
pub mod symbol;
pub mod sysfunc;
pub mod syntax;
pub mod token;
pub mod types;
pub mod value;

pub use bind::{BindContext, BindFlags, ExprKind, Expression};
pub use context::{Compilation, CompilationOptions, ElaborationError};
pub use diag::{DiagCode, Diagnostic, Diagnostics, Severity};
pub use ids::{NetTypeId, SymbolId, TypeId};
pub use interner::{Interner, Name};
pub use lexer::{Lexer, LexerMode};
pub use nettype::{NetKind, NetTypes};
pub use preproc::Preprocessor;
pub use serialize::SymbolSerializer;
pub use source::{Source, SourceId, SourceMap, Span};
pub use symbol::{LookupLocation, ScopeState, Symbol, SymbolKind};
pub use token::{Keyword, Punct, Token, TokenKind, Trivia, TriviaKind};
pub use types::{TypeKind, Types};
pub use value::{ConstantRange, ConstantValue};
