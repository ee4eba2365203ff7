//! Syntax-tree interfaces.
//!
//! The concrete parser is an external collaborator; these are the node
//! shapes it hands to the semantic phases. Nodes own their children except
//! where a definition's body must be shared between instances, which is why
//! module declarations travel as `Rc`.

use crate::nettype::NetKind;
use crate::source::Span;
use crate::token::LiteralBase;
use std::rc::Rc;

/// An identifier use site.
#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    BinaryAnd,
    BinaryOr,
    BinaryXor,
    LogicalAnd,
    LogicalOr,
    ShiftLeft,
    ShiftRight,
    Equality,
    Inequality,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

#[derive(Debug, Clone)]
pub enum ExprSyntax {
    IntegerLiteral {
        value: u64,
        /// Declared vector width, when the literal was sized.
        width: Option<u32>,
        base: Option<LiteralBase>,
        signed: bool,
        span: Span,
    },
    RealLiteral {
        value: f64,
        span: Span,
    },
    StringLiteral {
        value: String,
        span: Span,
    },
    UnbasedLiteral {
        bit: char,
        span: Span,
    },
    NullLiteral {
        span: Span,
    },
    Identifier(Ident),
    Unary {
        op: UnaryOp,
        operand: Box<ExprSyntax>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<ExprSyntax>,
        rhs: Box<ExprSyntax>,
        span: Span,
    },
    Conditional {
        cond: Box<ExprSyntax>,
        if_true: Box<ExprSyntax>,
        if_false: Box<ExprSyntax>,
        span: Span,
    },
    Concat {
        parts: Vec<ExprSyntax>,
        span: Span,
    },
    ElementSelect {
        base: Box<ExprSyntax>,
        index: Box<ExprSyntax>,
        span: Span,
    },
    RangeSelect {
        base: Box<ExprSyntax>,
        left: Box<ExprSyntax>,
        right: Box<ExprSyntax>,
        span: Span,
    },
    MemberAccess {
        base: Box<ExprSyntax>,
        member: Ident,
        span: Span,
    },
    /// A call of a regular or system subroutine.
    Call {
        callee: Ident,
        args: Vec<ExprSyntax>,
        span: Span,
    },
    /// An omitted positional argument (`$display(,x)`).
    Empty {
        span: Span,
    },
    /// A data type in expression position. The parser produces this when it
    /// can tell; plain names stay `Identifier` and get reinterpreted when a
    /// type is required.
    DataType(Box<DataTypeSyntax>),
}

impl ExprSyntax {
    pub fn span(&self) -> Span {
        match self {
            ExprSyntax::IntegerLiteral { span, .. }
            | ExprSyntax::RealLiteral { span, .. }
            | ExprSyntax::StringLiteral { span, .. }
            | ExprSyntax::UnbasedLiteral { span, .. }
            | ExprSyntax::NullLiteral { span }
            | ExprSyntax::Unary { span, .. }
            | ExprSyntax::Binary { span, .. }
            | ExprSyntax::Conditional { span, .. }
            | ExprSyntax::Concat { span, .. }
            | ExprSyntax::ElementSelect { span, .. }
            | ExprSyntax::RangeSelect { span, .. }
            | ExprSyntax::MemberAccess { span, .. }
            | ExprSyntax::Call { span, .. }
            | ExprSyntax::Empty { span } => *span,
            ExprSyntax::Identifier(ident) => ident.span,
            ExprSyntax::DataType(ty) => ty.span(),
        }
    }
}

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A packed or unpacked `[left:right]` dimension.
#[derive(Debug, Clone)]
pub struct DimensionSyntax {
    pub left: ExprSyntax,
    pub right: ExprSyntax,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKindSyntax {
    Bit,
    Logic,
    Reg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefIntKindSyntax {
    ShortInt,
    Int,
    LongInt,
    Byte,
    Integer,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKindSyntax {
    Real,
    ShortReal,
    RealTime,
}

#[derive(Debug, Clone)]
pub struct EnumMemberSyntax {
    pub name: Ident,
    pub init: Option<ExprSyntax>,
}

#[derive(Debug, Clone)]
pub struct StructMemberSyntax {
    pub ty: DataTypeSyntax,
    pub name: Ident,
}

#[derive(Debug, Clone)]
pub enum DataTypeSyntax {
    Scalar {
        kind: ScalarKindSyntax,
        signed: bool,
        dims: Vec<DimensionSyntax>,
        span: Span,
    },
    PredefinedInt {
        kind: PredefIntKindSyntax,
        signed: Option<bool>,
        span: Span,
    },
    Floating {
        kind: FloatKindSyntax,
        span: Span,
    },
    Str {
        span: Span,
    },
    CHandle {
        span: Span,
    },
    EventType {
        span: Span,
    },
    Void {
        span: Span,
    },
    /// A reference to a named type, optionally with packed dimensions.
    Named {
        name: Ident,
        dims: Vec<DimensionSyntax>,
        span: Span,
    },
    Enum {
        base: Option<Box<DataTypeSyntax>>,
        members: Vec<EnumMemberSyntax>,
        span: Span,
    },
    StructUnion {
        is_union: bool,
        packed: bool,
        signed: bool,
        members: Vec<StructMemberSyntax>,
        span: Span,
    },
    /// Implicit type on net and port declarations: optional signing plus
    /// packed dimensions over the default single bit.
    Implicit {
        signed: bool,
        dims: Vec<DimensionSyntax>,
        span: Span,
    },
}

impl DataTypeSyntax {
    pub fn span(&self) -> Span {
        match self {
            DataTypeSyntax::Scalar { span, .. }
            | DataTypeSyntax::PredefinedInt { span, .. }
            | DataTypeSyntax::Floating { span, .. }
            | DataTypeSyntax::Str { span }
            | DataTypeSyntax::CHandle { span }
            | DataTypeSyntax::EventType { span }
            | DataTypeSyntax::Void { span }
            | DataTypeSyntax::Named { span, .. }
            | DataTypeSyntax::Enum { span, .. }
            | DataTypeSyntax::StructUnion { span, .. }
            | DataTypeSyntax::Implicit { span, .. } => *span,
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One declared name with its unpacked dimensions and initializer.
#[derive(Debug, Clone)]
pub struct DeclaratorSyntax {
    pub name: Ident,
    pub dims: Vec<DimensionSyntax>,
    pub init: Option<ExprSyntax>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKeywordSyntax {
    Parameter,
    LocalParam,
}

#[derive(Debug, Clone)]
pub struct TypeParamDeclSyntax {
    pub name: Ident,
    pub default: Option<DataTypeSyntax>,
}

#[derive(Debug, Clone)]
pub enum ParamBodySyntax {
    Value {
        ty: Option<DataTypeSyntax>,
        declarators: Vec<DeclaratorSyntax>,
    },
    Type {
        decls: Vec<TypeParamDeclSyntax>,
    },
}

/// A parameter declaration, in a parameter port list or a body statement.
/// In a port list the keyword may be omitted and inherits the previous
/// entry's.
#[derive(Debug, Clone)]
pub struct ParameterDeclSyntax {
    pub keyword: Option<ParamKeywordSyntax>,
    pub body: ParamBodySyntax,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImportSyntax {
    pub package: Ident,
    /// Imported member; `None` is the `::*` wildcard.
    pub item: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariableDeclSyntax {
    pub ty: DataTypeSyntax,
    pub declarators: Vec<DeclaratorSyntax>,
    pub span: Span,
}

/// The net type part of a net declaration: a built-in keyword or a
/// user-defined net type name.
#[derive(Debug, Clone)]
pub enum NetTypeSpecifierSyntax {
    Builtin(NetKind),
    Named(Ident),
}

#[derive(Debug, Clone)]
pub struct NetDeclSyntax {
    pub net_type: NetTypeSpecifierSyntax,
    pub ty: Option<DataTypeSyntax>,
    pub declarators: Vec<DeclaratorSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypedefSyntax {
    pub ty: DataTypeSyntax,
    pub name: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardCategorySyntax {
    None,
    Enum,
    Struct,
    Union,
    Class,
    InterfaceClass,
}

#[derive(Debug, Clone)]
pub struct ForwardTypedefSyntax {
    pub category: ForwardCategorySyntax,
    pub name: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKindSyntax {
    Task,
    Function,
}

#[derive(Debug, Clone)]
pub struct SubroutineDeclSyntax {
    pub kind: SubroutineKindSyntax,
    pub name: Ident,
    pub return_type: Option<DataTypeSyntax>,
    pub args: Vec<(Ident, DataTypeSyntax)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NetTypeDeclSyntax {
    pub ty: DataTypeSyntax,
    pub name: Ident,
    pub resolver: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ModportDeclSyntax {
    pub name: Ident,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct GenerateBlockSyntax {
    pub name: Option<Ident>,
    pub members: Vec<MemberSyntax>,
    pub span: Span,
}

/// A member of a module, interface, program, package or generate block.
#[derive(Debug, Clone)]
pub enum MemberSyntax {
    Parameter(ParameterDeclSyntax),
    Variable(VariableDeclSyntax),
    Net(NetDeclSyntax),
    Typedef(TypedefSyntax),
    ForwardTypedef(ForwardTypedefSyntax),
    Import(ImportSyntax),
    Instantiation(HierarchyInstantiationSyntax),
    Modport(ModportDeclSyntax),
    Subroutine(SubroutineDeclSyntax),
    NetTypeDecl(NetTypeDeclSyntax),
    GenerateBlock(GenerateBlockSyntax),
}

// ---------------------------------------------------------------------------
// Hierarchy instantiation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ParamArgSyntax {
    Ordered(ExprSyntax),
    Named {
        name: Ident,
        /// `None` for `.A()`, meaning "use the default".
        expr: Option<ExprSyntax>,
        span: Span,
    },
}

impl ParamArgSyntax {
    pub fn span(&self) -> Span {
        match self {
            ParamArgSyntax::Ordered(expr) => expr.span(),
            ParamArgSyntax::Named { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamAssignmentsSyntax {
    pub args: Vec<ParamArgSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PortConnectionSyntax {
    Ordered {
        expr: Option<ExprSyntax>,
        span: Span,
    },
    Named {
        name: Ident,
        expr: Option<ExprSyntax>,
        span: Span,
    },
    Wildcard {
        span: Span,
    },
}

#[derive(Debug, Clone)]
pub struct HierarchicalInstanceSyntax {
    pub name: Ident,
    pub dimensions: Vec<DimensionSyntax>,
    pub connections: Vec<PortConnectionSyntax>,
    pub span: Span,
}

/// `Type #(params) name[dims](ports), ...;`
#[derive(Debug, Clone)]
pub struct HierarchyInstantiationSyntax {
    pub type_name: Ident,
    pub parameters: Option<ParamAssignmentsSyntax>,
    pub instances: Vec<HierarchicalInstanceSyntax>,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Definitions & compilation units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKindSyntax {
    Module,
    Interface,
    Program,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirectionSyntax {
    Input,
    Output,
    InOut,
    Ref,
}

#[derive(Debug, Clone)]
pub struct PortDeclSyntax {
    pub direction: PortDirectionSyntax,
    pub ty: Option<DataTypeSyntax>,
    pub name: Ident,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ModuleDeclSyntax {
    pub kind: DefinitionKindSyntax,
    pub name: Ident,
    pub imports: Vec<ImportSyntax>,
    /// The `#(...)` parameter port list; `None` when absent entirely.
    pub param_ports: Option<Vec<ParameterDeclSyntax>>,
    pub ports: Vec<PortDeclSyntax>,
    pub members: Vec<MemberSyntax>,
    /// The `` `default_nettype `` in force at the declaration site, stamped
    /// by the parser from preprocessor state.
    pub default_net_type: NetKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PackageDeclSyntax {
    pub name: Ident,
    pub members: Vec<MemberSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TopSyntax {
    Module(Rc<ModuleDeclSyntax>),
    Package(Rc<PackageDeclSyntax>),
}

/// Everything the parser produced for one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnitSyntax {
    pub members: Vec<TopSyntax>,
}

// ---------------------------------------------------------------------------
// Test builders
// ---------------------------------------------------------------------------
