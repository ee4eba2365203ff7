//! The expression binder.
//!
//! Maps expression syntax onto typed bound expressions. Binding never fails:
//! problems are diagnosed and an invalid expression (with the error type)
//! flows onward so one compile surfaces every problem it can. Constant
//! evaluation is the small sibling entry point used by dimension ranges,
//! enum initializers and parameter values.

use crate::context::Compilation;
use crate::diag::DiagCode;
use crate::ids::{SymbolId, TypeId};
use crate::interner::Name;
use crate::source::Span;
use crate::symbol::{LookupLocation, ResolveState, SymbolKind};
use crate::syntax::{BinaryOp, ExprSyntax, UnaryOp};
use crate::types::{TypeKind, Types};
use crate::value::{ConstantValue, IntegerValue};

/// Flags altering how an expression is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindFlags(u8);

impl BindFlags {
    pub const NONE: BindFlags = BindFlags(0);
    /// The expression must be a compile-time constant.
    pub const CONSTANT: BindFlags = BindFlags(1 << 0);
    /// Cross-hierarchy references are disallowed.
    pub const NO_HIERARCHICAL_NAMES: BindFlags = BindFlags(1 << 1);
    /// The expression may be an assignment target.
    pub const ASSIGNMENT_ALLOWED: BindFlags = BindFlags(1 << 2);

    pub fn has(self, other: BindFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn with(self, other: BindFlags) -> BindFlags {
        BindFlags(self.0 | other.0)
    }

    #[must_use]
    pub fn without(self, other: BindFlags) -> BindFlags {
        BindFlags(self.0 & !other.0)
    }
}

/// Where and how an expression is being bound.
#[derive(Debug, Clone, Copy)]
pub struct BindContext {
    pub scope: SymbolId,
    pub location: LookupLocation,
    pub flags: BindFlags,
}

impl BindContext {
    pub fn new(scope: SymbolId, location: LookupLocation) -> Self {
        Self { scope, location, flags: BindFlags::NONE }
    }

    pub fn constant(scope: SymbolId, location: LookupLocation) -> Self {
        Self { scope, location, flags: BindFlags::CONSTANT }
    }

    /// Default values of non-constant system subroutine arguments bind
    /// without the constant requirement but must stay within the hierarchy.
    pub fn make_non_const(&self) -> BindContext {
        let mut ctx = *self;
        if ctx.flags.has(BindFlags::CONSTANT) {
            ctx.flags = ctx.flags.without(BindFlags::CONSTANT).with(BindFlags::NO_HIERARCHICAL_NAMES);
        }
        ctx
    }
}

/// Bound expression kinds.
#[derive(Debug, Clone)]
pub enum ExprKind {
    IntegerLiteral(ConstantValue),
    RealLiteral(f64),
    StringLiteral { value: String },
    UnbasedUnsizedLiteral(char),
    NullLiteral,
    /// A resolved reference to a value symbol.
    NamedValue(SymbolId),
    Unary { op: UnaryOp, operand: Box<Expression> },
    Binary { op: BinaryOp, lhs: Box<Expression>, rhs: Box<Expression> },
    Conditional { cond: Box<Expression>, if_true: Box<Expression>, if_false: Box<Expression> },
    Concat(Vec<Expression>),
    ElementSelect { base: Box<Expression>, index: Box<Expression> },
    RangeSelect { base: Box<Expression>, left: Box<Expression>, right: Box<Expression> },
    MemberAccess { base: Box<Expression>, member: Name },
    /// A call of a user-declared subroutine.
    Call { subroutine: SymbolId, args: Vec<Expression> },
    /// A call of a registered system subroutine.
    SystemCall { name: String, args: Vec<Expression> },
    /// An omitted positional argument.
    EmptyArgument,
    /// An implicit conversion inserted by assignment binding.
    Conversion { operand: Box<Expression> },
    Invalid,
}

/// A typed bound expression.
#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    pub ty: TypeId,
    pub span: Span,
}

impl Expression {
    pub fn invalid(span: Span) -> Expression {
        Expression { kind: ExprKind::Invalid, ty: Types::ERROR, span }
    }

    pub fn bad(&self) -> bool {
        matches!(self.kind, ExprKind::Invalid)
    }

    pub fn is_string_literal(&self) -> bool {
        matches!(self.kind, ExprKind::StringLiteral { .. })
    }
}

impl Compilation {
    /// Bind an expression syntax tree.
    pub fn bind_expression(&mut self, syntax: &ExprSyntax, ctx: &BindContext) -> Expression {
        match syntax {
            ExprSyntax::IntegerLiteral { value, width, base: _, signed, span } => {
                let (ty, cv) = match width {
                    Some(w) => {
                        let elem = Types::LOGIC;
                        let range = crate::value::ConstantRange::new(*w as i32 - 1, 0);
                        let ty = self.add_anon_type(TypeKind::PackedArray { elem, range });
                        (ty, ConstantValue::integer(*value as i64, *w, *signed))
                    }
                    None => (Types::INT, ConstantValue::integer(*value as i64, 32, *signed)),
                };
                Expression { kind: ExprKind::IntegerLiteral(cv), ty, span: *span }
            }
            ExprSyntax::RealLiteral { value, span } => {
                Expression { kind: ExprKind::RealLiteral(*value), ty: Types::REAL, span: *span }
            }
            ExprSyntax::StringLiteral { value, span } => Expression {
                kind: ExprKind::StringLiteral { value: value.clone() },
                ty: Types::STRING,
                span: *span,
            },
            ExprSyntax::UnbasedLiteral { bit, span } => Expression {
                kind: ExprKind::UnbasedUnsizedLiteral(*bit),
                ty: Types::LOGIC,
                span: *span,
            },
            ExprSyntax::NullLiteral { span } => {
                Expression { kind: ExprKind::NullLiteral, ty: Types::NULL, span: *span }
            }
            ExprSyntax::Identifier(ident) => self.bind_name(ident, ctx),
            ExprSyntax::Unary { op, operand, span } => {
                let operand = self.bind_expression(operand, ctx);
                if operand.bad() {
                    return Expression::invalid(*span);
                }
                let ty = match op {
                    UnaryOp::LogicalNot => self.bool_result_type(&[&operand]),
                    _ => {
                        if !self.numeric_operand(&operand) {
                            self.add_diag(DiagCode::BadUnaryExpression, *span);
                            return Expression::invalid(*span);
                        }
                        operand.ty
                    }
                };
                Expression { kind: ExprKind::Unary { op: *op, operand: Box::new(operand) }, ty, span: *span }
            }
            ExprSyntax::Binary { op, lhs, rhs, span } => self.bind_binary(*op, lhs, rhs, *span, ctx),
            ExprSyntax::Conditional { cond, if_true, if_false, span } => {
                let cond = self.bind_expression(cond, ctx);
                let if_true = self.bind_expression(if_true, ctx);
                let if_false = self.bind_expression(if_false, ctx);
                if cond.bad() || if_true.bad() || if_false.bad() {
                    return Expression::invalid(*span);
                }
                let ty = if_true.ty;
                Expression {
                    kind: ExprKind::Conditional {
                        cond: Box::new(cond),
                        if_true: Box::new(if_true),
                        if_false: Box::new(if_false),
                    },
                    ty,
                    span: *span,
                }
            }
            ExprSyntax::Concat { parts, span } => {
                let mut bound = Vec::with_capacity(parts.len());
                let mut width = 0u32;
                let mut four_state = false;
                for part in parts {
                    let expr = self.bind_expression(part, ctx);
                    if expr.bad() {
                        return Expression::invalid(*span);
                    }
                    if !self.types.is_integral(expr.ty) {
                        self.add_diag(DiagCode::BadBinaryExpression, expr.span);
                        return Expression::invalid(*span);
                    }
                    width += self.types.bit_width(expr.ty);
                    four_state |= self.types.is_four_state(expr.ty);
                    bound.push(expr);
                }
                let elem = if four_state { Types::LOGIC } else { Types::BIT };
                let range = crate::value::ConstantRange::new(width.saturating_sub(1) as i32, 0);
                let ty = self.add_anon_type(TypeKind::PackedArray { elem, range });
                Expression { kind: ExprKind::Concat(bound), ty, span: *span }
            }
            ExprSyntax::ElementSelect { base, index, span } => {
                let base = self.bind_expression(base, ctx);
                let index = self.bind_expression(index, ctx);
                if base.bad() || index.bad() {
                    return Expression::invalid(*span);
                }
                let ty = match self.select_element_type(base.ty) {
                    Some(ty) => ty,
                    None => {
                        self.add_diag(DiagCode::BadBinaryExpression, *span);
                        return Expression::invalid(*span);
                    }
                };
                Expression {
                    kind: ExprKind::ElementSelect { base: Box::new(base), index: Box::new(index) },
                    ty,
                    span: *span,
                }
            }
            ExprSyntax::RangeSelect { base, left, right, span } => {
                let base = self.bind_expression(base, ctx);
                let left = self.bind_expression(left, ctx);
                let right = self.bind_expression(right, ctx);
                if base.bad() || left.bad() || right.bad() {
                    return Expression::invalid(*span);
                }
                let lv = self.eval_constant(&left).as_integer();
                let rv = self.eval_constant(&right).as_integer();
                let ty = match (lv, rv) {
                    (Some(l), Some(r)) => {
                        let width = (l - r).unsigned_abs() as u32 + 1;
                        let elem =
                            if self.types.is_four_state(base.ty) { Types::LOGIC } else { Types::BIT };
                        let range = crate::value::ConstantRange::new(width as i32 - 1, 0);
                        self.add_anon_type(TypeKind::PackedArray { elem, range })
                    }
                    _ => {
                        self.add_diag(DiagCode::DimensionRequiresConstRange, *span);
                        Types::ERROR
                    }
                };
                Expression {
                    kind: ExprKind::RangeSelect {
                        base: Box::new(base),
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                    span: *span,
                }
            }
            ExprSyntax::MemberAccess { base, member, span } => self.bind_member_access(base, member, *span, ctx),
            ExprSyntax::Call { callee, args, span } => self.bind_call(callee, args, *span, ctx),
            ExprSyntax::Empty { span } => {
                Expression { kind: ExprKind::EmptyArgument, ty: Types::VOID, span: *span }
            }
            ExprSyntax::DataType(ty) => {
                self.add_diag(DiagCode::NotAValue, ty.span());
                Expression::invalid(ty.span())
            }
        }
    }

    /// Bind an expression and require assignment compatibility with a target
    /// type, inserting a conversion when the types differ.
    pub fn bind_rvalue(&mut self, syntax: &ExprSyntax, target: TypeId, ctx: &BindContext) -> Expression {
        let expr = self.bind_expression(syntax, ctx);
        if expr.bad() {
            return expr;
        }
        if !self.assignment_compatible(target, expr.ty) {
            self.add_diag(DiagCode::BadAssignment, expr.span);
            return Expression::invalid(expr.span);
        }
        if self.types_equivalent(target, expr.ty) {
            expr
        } else {
            let span = expr.span;
            Expression { kind: ExprKind::Conversion { operand: Box::new(expr) }, ty: target, span }
        }
    }

    fn bind_name(&mut self, ident: &crate::syntax::Ident, ctx: &BindContext) -> Expression {
        let symbol = self.lookup_name(&ident.name, ctx.location, ctx.scope, ident.span);
        self.bind_symbol_reference(symbol, ident.span, ctx)
    }

    fn bind_symbol_reference(&mut self, symbol: SymbolId, span: Span, ctx: &BindContext) -> Expression {
        let ty = match &self.symbol(symbol).kind {
            SymbolKind::ErrorSymbol => return Expression::invalid(span),
            SymbolKind::Parameter(_) => {
                self.parameter_value(symbol);
                self.parameter_ty(symbol)
            }
            SymbolKind::EnumValue(data) => data.ty,
            SymbolKind::Variable(data) => data.ty,
            SymbolKind::Net(data) => data.ty,
            SymbolKind::Port(data) => data.ty,
            SymbolKind::Instance(_) | SymbolKind::InstanceArray(_) | SymbolKind::Package => {
                // A scope reference: only meaningful as a member-access base.
                return Expression {
                    kind: ExprKind::NamedValue(symbol),
                    ty: Types::VOID,
                    span,
                };
            }
            _ => {
                let name = self.interner.resolve(self.symbol(symbol).name);
                self.add_diag(DiagCode::NotAValue, span).arg(name);
                return Expression::invalid(span);
            }
        };

        if ctx.flags.has(BindFlags::CONSTANT) {
            let constant_ok = matches!(
                self.symbol(symbol).kind,
                SymbolKind::Parameter(_) | SymbolKind::EnumValue(_)
            );
            if !constant_ok {
                let name = self.interner.resolve(self.symbol(symbol).name);
                self.add_diag(DiagCode::ExpressionNotConstant, span).arg(name);
                return Expression::invalid(span);
            }
        }

        Expression { kind: ExprKind::NamedValue(symbol), ty, span }
    }

    fn bind_member_access(
        &mut self,
        base: &ExprSyntax,
        member: &crate::syntax::Ident,
        span: Span,
        ctx: &BindContext,
    ) -> Expression {
        let base = self.bind_expression(base, ctx);
        if base.bad() {
            return Expression::invalid(span);
        }

        // Scope references (packages, instances) resolve hierarchically.
        if let ExprKind::NamedValue(symbol) = &base.kind {
            let symbol = *symbol;
            let is_scope_ref = matches!(
                self.symbol(symbol).kind,
                SymbolKind::Instance(_) | SymbolKind::InstanceArray(_) | SymbolKind::Package
            );
            if is_scope_ref {
                let crosses_hierarchy =
                    !matches!(self.symbol(symbol).kind, SymbolKind::Package);
                if crosses_hierarchy && ctx.flags.has(BindFlags::NO_HIERARCHICAL_NAMES) {
                    self.add_diag(DiagCode::HierarchicalNotAllowed, span).arg(&member.name);
                    return Expression::invalid(span);
                }
                if ctx.flags.has(BindFlags::CONSTANT) && crosses_hierarchy {
                    self.add_diag(DiagCode::ExpressionNotConstant, span).arg(&member.name);
                    return Expression::invalid(span);
                }
                return match self.find(symbol, &member.name) {
                    Some(found) => self.bind_symbol_reference(found, span, ctx),
                    None => {
                        let owner = self.interner.resolve(self.symbol(symbol).name);
                        self.add_diag(DiagCode::UnknownMember, member.span)
                            .arg(&member.name)
                            .arg(owner);
                        Expression::invalid(span)
                    }
                };
            }
        }

        let canon = self.canonical(base.ty);
        let field = match self.types.kind(canon) {
            TypeKind::PackedStruct { members, .. }
            | TypeKind::PackedUnion { members, .. }
            | TypeKind::UnpackedStruct { members }
            | TypeKind::UnpackedUnion { members } => {
                let name = self.intern(&member.name);
                members.iter().find(|m| m.name == name).map(|m| m.ty)
            }
            _ => None,
        };
        match field {
            Some(ty) => {
                let member_name = self.intern(&member.name);
                Expression {
                    kind: ExprKind::MemberAccess { base: Box::new(base), member: member_name },
                    ty,
                    span,
                }
            }
            None => {
                self.add_diag(DiagCode::UnknownMember, member.span).arg(&member.name);
                Expression::invalid(span)
            }
        }
    }

    fn bind_binary(
        &mut self,
        op: BinaryOp,
        lhs: &ExprSyntax,
        rhs: &ExprSyntax,
        span: Span,
        ctx: &BindContext,
    ) -> Expression {
        let lhs = self.bind_expression(lhs, ctx);
        let rhs = self.bind_expression(rhs, ctx);
        if lhs.bad() || rhs.bad() {
            return Expression::invalid(span);
        }

        use BinaryOp::*;
        let ty = match op {
            Equality | Inequality | LessThan | LessThanEqual | GreaterThan | GreaterThanEqual
            | LogicalAnd | LogicalOr => self.bool_result_type(&[&lhs, &rhs]),
            BinaryAnd | BinaryOr | BinaryXor | ShiftLeft | ShiftRight => {
                if !self.types.is_integral(lhs.ty) || !self.types.is_integral(rhs.ty) {
                    self.add_diag(DiagCode::BadBinaryExpression, span);
                    return Expression::invalid(span);
                }
                self.wider_type(&lhs, &rhs)
            }
            Add | Subtract | Multiply | Divide | Mod => {
                if !self.numeric_operand(&lhs) || !self.numeric_operand(&rhs) {
                    self.add_diag(DiagCode::BadBinaryExpression, span);
                    return Expression::invalid(span);
                }
                if self.types.is_floating(lhs.ty) || self.types.is_floating(rhs.ty) {
                    Types::REAL
                } else {
                    self.wider_type(&lhs, &rhs)
                }
            }
        };
        Expression {
            kind: ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            ty,
            span,
        }
    }

    fn bind_call(
        &mut self,
        callee: &crate::syntax::Ident,
        args: &[ExprSyntax],
        span: Span,
        ctx: &BindContext,
    ) -> Expression {
        if callee.name.starts_with('$') {
            let Some(subroutine) = self.system_subroutine(&callee.name) else {
                self.add_diag(DiagCode::UnknownSystemName, callee.span).arg(&callee.name);
                return Expression::invalid(span);
            };

            let mut bound = Vec::with_capacity(args.len());
            for (index, arg) in args.iter().enumerate() {
                let expr = match arg {
                    ExprSyntax::Empty { span } => {
                        if subroutine.allow_empty_argument(index) {
                            Expression { kind: ExprKind::EmptyArgument, ty: Types::VOID, span: *span }
                        } else {
                            self.add_diag(DiagCode::BadSystemSubroutineArg, *span)
                                .arg(subroutine.name());
                            Expression::invalid(*span)
                        }
                    }
                    _ => subroutine.bind_argument(index, ctx, arg, self),
                };
                bound.push(expr);
            }

            let ty = subroutine.check_arguments(ctx, &bound, span, self);
            return Expression {
                kind: ExprKind::SystemCall { name: callee.name.clone(), args: bound },
                ty,
                span,
            };
        }

        let symbol = self.lookup_name(&callee.name, ctx.location, ctx.scope, callee.span);
        let (arg_types, return_type) = match &self.symbol(symbol).kind {
            SymbolKind::ErrorSymbol => return Expression::invalid(span),
            SymbolKind::Subroutine(data) => (
                data.args.iter().map(|(_, ty)| *ty).collect::<Vec<_>>(),
                data.return_type,
            ),
            _ => {
                self.add_diag(DiagCode::NotAValue, callee.span).arg(&callee.name);
                return Expression::invalid(span);
            }
        };

        if args.len() < arg_types.len() {
            self.add_diag(DiagCode::TooFewArguments, span)
                .arg(arg_types.len())
                .arg(args.len());
            return Expression::invalid(span);
        }
        if args.len() > arg_types.len() {
            let extra = &args[arg_types.len()];
            self.add_diag(DiagCode::TooManyArguments, extra.span())
                .arg(arg_types.len())
                .arg(args.len());
            return Expression::invalid(span);
        }

        let mut bound = Vec::with_capacity(args.len());
        for (arg, &ty) in args.iter().zip(&arg_types) {
            let expr = self.bind_rvalue(arg, ty, ctx);
            if expr.bad() {
                return Expression::invalid(span);
            }
            bound.push(expr);
        }
        Expression {
            kind: ExprKind::Call { subroutine: symbol, args: bound },
            ty: return_type,
            span,
        }
    }

    fn numeric_operand(&self, expr: &Expression) -> bool {
        self.types.is_integral(expr.ty) || self.types.is_floating(expr.ty)
    }

    fn bool_result_type(&self, operands: &[&Expression]) -> TypeId {
        if operands.iter().any(|e| self.types.is_four_state(e.ty)) {
            Types::LOGIC
        } else {
            Types::BIT
        }
    }

    fn wider_type(&self, lhs: &Expression, rhs: &Expression) -> TypeId {
        if self.types.bit_width(rhs.ty) > self.types.bit_width(lhs.ty) {
            rhs.ty
        } else {
            lhs.ty
        }
    }

    fn select_element_type(&mut self, base: TypeId) -> Option<TypeId> {
        let canon = self.canonical(base);
        match self.types.kind(canon) {
            TypeKind::PackedArray { elem, .. } | TypeKind::UnpackedArray { elem, .. } => Some(*elem),
            _ if self.types.is_integral(canon) => {
                Some(if self.types.is_four_state(canon) { Types::LOGIC } else { Types::BIT })
            }
            TypeKind::Str => Some(Types::BYTE),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Constant evaluation
    // ------------------------------------------------------------------

    /// Evaluate a bound expression as a compile-time constant. Non-constant
    /// shapes yield `ConstantValue::Error` (the binder has already
    /// diagnosed them when the context required a constant).
    pub fn eval_constant(&mut self, expr: &Expression) -> ConstantValue {
        match &expr.kind {
            ExprKind::IntegerLiteral(value) => value.clone(),
            ExprKind::RealLiteral(value) => ConstantValue::Real(*value),
            ExprKind::StringLiteral { value } => ConstantValue::Str(value.clone()),
            ExprKind::UnbasedUnsizedLiteral(bit) => match bit {
                '0' => ConstantValue::integer(0, 1, false),
                '1' => ConstantValue::integer(1, 1, false),
                _ => ConstantValue::Integer(IntegerValue::unknown(1, false)),
            },
            ExprKind::NullLiteral => ConstantValue::Null,
            ExprKind::NamedValue(symbol) => match &self.symbol(*symbol).kind {
                SymbolKind::Parameter(_) => self.parameter_value(*symbol),
                SymbolKind::EnumValue(data) => data.value.clone(),
                _ => ConstantValue::Error,
            },
            ExprKind::Unary { op, operand } => {
                let value = self.eval_constant(operand);
                self.eval_unary(*op, value)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let span = expr.span;
                let lhs = self.eval_constant(lhs);
                let rhs = self.eval_constant(rhs);
                self.eval_binary(*op, lhs, rhs, span)
            }
            ExprKind::Conditional { cond, if_true, if_false } => {
                match self.eval_constant(cond).is_true() {
                    Some(true) => self.eval_constant(if_true),
                    Some(false) => self.eval_constant(if_false),
                    None => ConstantValue::Error,
                }
            }
            ExprKind::Concat(parts) => {
                let mut acc: i64 = 0;
                for part in parts {
                    let width = self.types.bit_width(part.ty);
                    match self.eval_constant(part).as_integer() {
                        Some(v) => acc = acc.wrapping_shl(width) | (v & mask_for(width)),
                        None => return ConstantValue::Error,
                    }
                }
                let total: u32 = parts.iter().map(|p| self.types.bit_width(p.ty)).sum();
                ConstantValue::integer(acc, total, false)
            }
            ExprKind::ElementSelect { base, index } => {
                let base_v = self.eval_constant(base);
                let index_v = self.eval_constant(index);
                match (base_v, index_v.as_integer()) {
                    (ConstantValue::Elements(elems), Some(i)) => {
                        if i < 0 || i as usize >= elems.len() {
                            self.add_diag(DiagCode::IndexOutOfRange, expr.span).arg(i);
                            ConstantValue::Error
                        } else {
                            elems[i as usize].clone()
                        }
                    }
                    (ConstantValue::Integer(iv), Some(i)) => {
                        if i < 0 || i as u32 >= iv.width {
                            self.add_diag(DiagCode::IndexOutOfRange, expr.span).arg(i);
                            ConstantValue::Error
                        } else {
                            ConstantValue::integer((iv.value >> i) & 1, 1, false)
                        }
                    }
                    _ => ConstantValue::Error,
                }
            }
            ExprKind::Conversion { operand } => self.eval_constant(operand),
            _ => ConstantValue::Error,
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, value: ConstantValue) -> ConstantValue {
        match op {
            UnaryOp::Plus => value,
            UnaryOp::Minus => match value {
                ConstantValue::Integer(iv) if !iv.has_unknown => {
                    ConstantValue::integer(-iv.value, iv.width, iv.signed)
                }
                ConstantValue::Real(r) => ConstantValue::Real(-r),
                _ => ConstantValue::Error,
            },
            UnaryOp::LogicalNot => match value.is_true() {
                Some(b) => ConstantValue::integer(!b as i64, 1, false),
                None => ConstantValue::Error,
            },
            UnaryOp::BitwiseNot => match value {
                ConstantValue::Integer(iv) if !iv.has_unknown => {
                    ConstantValue::Integer(IntegerValue::new(!iv.value, iv.width, iv.signed).coerce_width(iv.width))
                }
                _ => ConstantValue::Error,
            },
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: ConstantValue,
        rhs: ConstantValue,
        span: Span,
    ) -> ConstantValue {
        use BinaryOp::*;

        // Real arithmetic when either side is real.
        if matches!(lhs, ConstantValue::Real(_)) || matches!(rhs, ConstantValue::Real(_)) {
            let (Some(l), Some(r)) = (lhs.as_real(), rhs.as_real()) else {
                return ConstantValue::Error;
            };
            return match op {
                Add => ConstantValue::Real(l + r),
                Subtract => ConstantValue::Real(l - r),
                Multiply => ConstantValue::Real(l * r),
                Divide => ConstantValue::Real(l / r),
                Equality => ConstantValue::integer((l == r) as i64, 1, false),
                Inequality => ConstantValue::integer((l != r) as i64, 1, false),
                LessThan => ConstantValue::integer((l < r) as i64, 1, false),
                LessThanEqual => ConstantValue::integer((l <= r) as i64, 1, false),
                GreaterThan => ConstantValue::integer((l > r) as i64, 1, false),
                GreaterThanEqual => ConstantValue::integer((l >= r) as i64, 1, false),
                _ => ConstantValue::Error,
            };
        }

        let (Some(l), Some(r)) = (lhs.as_integer(), rhs.as_integer()) else {
            return ConstantValue::Error;
        };
        let width = match (&lhs, &rhs) {
            (ConstantValue::Integer(a), ConstantValue::Integer(b)) => a.width.max(b.width),
            _ => 32,
        };
        let signed = match (&lhs, &rhs) {
            (ConstantValue::Integer(a), ConstantValue::Integer(b)) => a.signed && b.signed,
            _ => true,
        };

        let value = match op {
            Add => l.wrapping_add(r),
            Subtract => l.wrapping_sub(r),
            Multiply => l.wrapping_mul(r),
            Divide | Mod => {
                if r == 0 {
                    self.add_diag(DiagCode::DivideByZero, span);
                    return ConstantValue::Error;
                }
                if op == Divide {
                    l.wrapping_div(r)
                } else {
                    l.wrapping_rem(r)
                }
            }
            BinaryAnd => l & r,
            BinaryOr => l | r,
            BinaryXor => l ^ r,
            ShiftLeft => l.wrapping_shl(r as u32),
            ShiftRight => l.wrapping_shr(r as u32),
            LogicalAnd => ((l != 0) && (r != 0)) as i64,
            LogicalOr => ((l != 0) || (r != 0)) as i64,
            Equality => (l == r) as i64,
            Inequality => (l != r) as i64,
            LessThan => (l < r) as i64,
            LessThanEqual => (l <= r) as i64,
            GreaterThan => (l > r) as i64,
            GreaterThanEqual => (l >= r) as i64,
        };

        match op {
            LogicalAnd | LogicalOr | Equality | Inequality | LessThan | LessThanEqual
            | GreaterThan | GreaterThanEqual => ConstantValue::integer(value, 1, false),
            _ => ConstantValue::integer(value, width, signed),
        }
    }

    /// Bind and evaluate an expression as a constant integer; the workhorse
    /// behind dimension ranges and enum initializers.
    pub fn eval_constant_int(
        &mut self,
        syntax: &ExprSyntax,
        location: LookupLocation,
        scope: SymbolId,
    ) -> Option<i64> {
        let ctx = BindContext::constant(scope, location);
        let expr = self.bind_expression(syntax, &ctx);
        if expr.bad() {
            return None;
        }
        self.eval_constant(&expr).as_integer()
    }

    // ------------------------------------------------------------------
    // Parameter values
    // ------------------------------------------------------------------

    /// The resolved constant value of a value parameter. Memoized behind the
    /// `Unresolved -> Resolving -> Resolved` lifecycle; re-entry while
    /// resolving is a cyclic dependency diagnosed once.
    pub fn parameter_value(&mut self, param: SymbolId) -> ConstantValue {
        let (state, ty_syntax, init, parent, index, span) = match &self.symbol(param).kind {
            SymbolKind::Parameter(data) => (
                data.state,
                data.ty_syntax.clone(),
                data.init.clone(),
                self.symbol(param).parent,
                self.symbol(param).decl_index,
                self.symbol(param).span,
            ),
            _ => return ConstantValue::Error,
        };

        match state {
            ResolveState::Resolved => {
                return match &self.symbol(param).kind {
                    SymbolKind::Parameter(data) => {
                        data.value.clone().unwrap_or(ConstantValue::Error)
                    }
                    _ => ConstantValue::Error,
                };
            }
            ResolveState::Resolving => {
                let name = self.interner.resolve(self.symbol(param).name);
                self.add_diag(DiagCode::CyclicParameterDependency, span).arg(name);
                self.set_parameter_resolved(param, Types::ERROR, ConstantValue::Error);
                return ConstantValue::Error;
            }
            ResolveState::Unresolved => {}
        }

        if let SymbolKind::Parameter(data) = &mut self.symbol_mut(param).kind {
            data.state = ResolveState::Resolving;
        }

        let Some(scope) = parent else {
            self.set_parameter_resolved(param, Types::ERROR, ConstantValue::Error);
            return ConstantValue::Error;
        };
        let location = LookupLocation::before(index);

        let value = match &init {
            Some(init) => {
                let ctx = BindContext::constant(scope, location);
                let expr = self.bind_expression(init, &ctx);
                if expr.bad() {
                    ConstantValue::Error
                } else {
                    self.eval_constant(&expr)
                }
            }
            None => ConstantValue::Error,
        };

        // Declared type when present, otherwise inferred from the value.
        let ty = match &ty_syntax {
            Some(syntax) => self.get_type(syntax, location, scope),
            None => match &value {
                ConstantValue::Real(_) => Types::REAL,
                ConstantValue::Str(_) => Types::STRING,
                _ => Types::INT,
            },
        };

        let value = match value {
            ConstantValue::Integer(iv) if self.types.is_integral(ty) => {
                let width = self.types.bit_width(ty);
                let signed = self.types.is_signed(ty);
                ConstantValue::Integer(IntegerValue { signed, ..iv }.coerce_width(width))
            }
            other => other,
        };

        self.set_parameter_resolved(param, ty, value.clone());
        value
    }

    /// The resolved type of a value parameter.
    pub fn parameter_ty(&mut self, param: SymbolId) -> TypeId {
        self.parameter_value(param);
        match &self.symbol(param).kind {
            SymbolKind::Parameter(data) => data.ty,
            _ => Types::ERROR,
        }
    }

    pub(crate) fn set_parameter_resolved(&mut self, param: SymbolId, ty: TypeId, value: ConstantValue) {
        if let SymbolKind::Parameter(data) = &mut self.symbol_mut(param).kind {
            data.state = ResolveState::Resolved;
            data.ty = ty;
            data.value = Some(value);
        }
    }
}

fn mask_for(width: u32) -> i64 {
    if width >= 64 {
        -1
    } else {
        (1i64 << width) - 1
    }
}
