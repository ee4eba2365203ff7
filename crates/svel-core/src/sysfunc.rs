//! System subroutine framework and the registered builtins.
//!
//! Each registered system task or function knows how to bind its own
//! arguments and check a finished call. The generic helpers here enforce
//! argument counts and the format-string discipline of the display family.

use crate::bind::{BindContext, ExprKind, Expression};
use crate::context::Compilation;
use crate::diag::DiagCode;
use crate::ids::TypeId;
use crate::sformat::{self, FormatArgKind};
use crate::source::Span;
use crate::symbol::SubroutineKind;
use crate::syntax::ExprSyntax;
use crate::types::Types;
use std::rc::Rc;

/// A registered system task or function.
pub trait SystemSubroutine {
    fn name(&self) -> &'static str;

    fn kind(&self) -> SubroutineKind;

    fn kind_str(&self) -> &'static str {
        match self.kind() {
            SubroutineKind::Task => "task",
            SubroutineKind::Function => "function",
        }
    }

    /// Whether an omitted positional argument is acceptable at `index`.
    fn allow_empty_argument(&self, _index: usize) -> bool {
        false
    }

    /// Bind one argument; the default is a plain expression bind.
    fn bind_argument(
        &self,
        _index: usize,
        ctx: &BindContext,
        syntax: &ExprSyntax,
        comp: &mut Compilation,
    ) -> Expression {
        comp.bind_expression(syntax, ctx)
    }

    /// Validate the bound argument list and produce the call's result type.
    fn check_arguments(
        &self,
        ctx: &BindContext,
        args: &[Expression],
        call_range: Span,
        comp: &mut Compilation,
    ) -> TypeId;
}

/// Enforce an argument-count window. For methods the receiver argument does
/// not count. Any already-bad argument fails the call quietly.
pub fn check_arg_count(
    comp: &mut Compilation,
    is_method: bool,
    args: &[Expression],
    call_range: Span,
    min: usize,
    max: usize,
) -> bool {
    let mut provided = args.len();
    if is_method {
        debug_assert!(provided > 0);
        provided -= 1;
    }

    if provided < min {
        comp.add_diag(DiagCode::TooFewArguments, call_range).arg(min).arg(provided);
        return false;
    }
    if provided > max {
        comp.add_diag(DiagCode::TooManyArguments, args[max].span).arg(max).arg(provided);
        return false;
    }

    args.iter().all(|arg| !arg.bad())
}

fn arg_type_valid(comp: &Compilation, kind: FormatArgKind, ty: TypeId) -> bool {
    let types = &comp.types;
    match kind {
        FormatArgKind::Integral => types.is_integral(ty),
        FormatArgKind::Float => types.is_floating(ty) || types.is_integral(ty),
        FormatArgKind::Str => {
            types.is_string(ty) || types.is_integral(ty) || types.is_byte_array(ty)
        }
        FormatArgKind::Pattern => true,
    }
}

fn real_to_int(comp: &Compilation, kind: FormatArgKind, ty: TypeId) -> bool {
    kind == FormatArgKind::Integral && comp.types.is_floating(ty)
}

/// Re-parse a literal format argument into specs, merging its diagnostics.
/// `None` means the string was malformed.
fn parse_literal_specs(
    comp: &mut Compilation,
    arg: &Expression,
) -> Option<Vec<sformat::FormatArg>> {
    let ExprKind::StringLiteral { value } = &arg.kind else { return None };
    let (specs, diags) = sformat::parse_format_specs(value, arg.span.source, arg.span.start + 1);
    if !diags.is_empty() {
        comp.diags.extend(diags);
        return None;
    }
    Some(specs)
}

/// Free-form format checking: any literal string argument begins a new spec
/// list that subsequent arguments are matched against.
pub fn check_format_args(comp: &mut Compilation, args: &[Expression]) -> bool {
    let mut specs: Vec<sformat::FormatArg> = Vec::new();
    let mut spec_index = 0usize;

    for arg in args {
        if matches!(arg.kind, ExprKind::EmptyArgument) {
            // Empty arguments are fine unless a format spec wants a value.
            if spec_index >= specs.len() {
                continue;
            }
            let fmt_arg = specs[spec_index];
            spec_index += 1;
            comp.add_diag(DiagCode::FormatEmptyArg, arg.span).arg(fmt_arg.spec);
            return false;
        }

        if arg.bad() {
            return false;
        }

        if spec_index >= specs.len() {
            if arg.is_string_literal() {
                match parse_literal_specs(comp, arg) {
                    Some(parsed) => {
                        specs = parsed;
                        spec_index = 0;
                    }
                    None => return false,
                }
            } else if comp.types.is_aggregate(arg.ty) && !comp.types.is_byte_array(arg.ty) {
                comp.add_diag(DiagCode::FormatUnspecifiedType, arg.span);
                return false;
            }
        } else {
            let fmt_arg = specs[spec_index];
            spec_index += 1;
            if !arg_type_valid(comp, fmt_arg.kind, arg.ty) {
                if real_to_int(comp, fmt_arg.kind, arg.ty) {
                    comp.add_diag(DiagCode::FormatRealInt, arg.span).arg(fmt_arg.spec);
                } else {
                    comp.add_diag(DiagCode::FormatMismatchedType, arg.span).arg(fmt_arg.spec);
                    return false;
                }
            }
        }
    }

    let mut ok = true;
    while spec_index < specs.len() {
        let fmt_arg = specs[spec_index];
        spec_index += 1;
        comp.add_diag(DiagCode::FormatNoArgument, fmt_arg.range).arg(fmt_arg.spec);
        ok = false;
    }
    ok
}

/// Fixed-format checking: the first argument is the format string; when it
/// is a compile-time literal the whole call is validated now.
pub fn check_format_values(comp: &mut Compilation, args: &[Expression]) -> bool {
    let Some(first) = args.first() else { return true };
    if !first.is_string_literal() {
        return true;
    }
    let Some(specs) = parse_literal_specs(comp, first) else { return false };

    let mut ok = true;
    let mut arg_index = 1usize;
    for fmt_arg in &specs {
        if arg_index >= args.len() {
            comp.add_diag(DiagCode::FormatNoArgument, fmt_arg.range).arg(fmt_arg.spec);
            ok = false;
            continue;
        }

        let arg = &args[arg_index];
        arg_index += 1;

        if !arg_type_valid(comp, fmt_arg.kind, arg.ty) {
            if real_to_int(comp, fmt_arg.kind, arg.ty) {
                comp.add_diag(DiagCode::FormatRealInt, arg.span).arg(fmt_arg.spec);
            } else {
                comp.add_diag(DiagCode::FormatMismatchedType, arg.span).arg(fmt_arg.spec);
                ok = false;
            }
        }
    }

    if arg_index < args.len() {
        comp.add_diag(DiagCode::FormatTooManyArgs, args[arg_index].span);
        ok = false;
    }
    ok
}

/// Diagnose an argument whose type the subroutine can't accept and recover
/// with the error type.
pub fn bad_arg(comp: &mut Compilation, sub: &dyn SystemSubroutine, arg: &Expression) -> TypeId {
    comp.add_diag(DiagCode::BadSystemSubroutineArg, arg.span)
        .arg(sub.name())
        .arg(sub.kind_str());
    comp.error_type()
}

// ---------------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------------

/// The `$display` family: free-form arguments checked against embedded
/// format strings.
struct DisplayTask {
    name: &'static str,
}

impl SystemSubroutine for DisplayTask {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> SubroutineKind {
        SubroutineKind::Task
    }

    fn allow_empty_argument(&self, _index: usize) -> bool {
        true
    }

    fn bind_argument(
        &self,
        _index: usize,
        ctx: &BindContext,
        syntax: &ExprSyntax,
        comp: &mut Compilation,
    ) -> Expression {
        let ctx = ctx.make_non_const();
        comp.bind_expression(syntax, &ctx)
    }

    fn check_arguments(
        &self,
        _ctx: &BindContext,
        args: &[Expression],
        _call_range: Span,
        comp: &mut Compilation,
    ) -> TypeId {
        if !check_format_args(comp, args) {
            return comp.error_type();
        }
        Types::VOID
    }
}

/// `$sformatf`: a required leading format string with matching values.
struct SformatfFunc;

impl SystemSubroutine for SformatfFunc {
    fn name(&self) -> &'static str {
        "$sformatf"
    }

    fn kind(&self) -> SubroutineKind {
        SubroutineKind::Function
    }

    fn check_arguments(
        &self,
        _ctx: &BindContext,
        args: &[Expression],
        call_range: Span,
        comp: &mut Compilation,
    ) -> TypeId {
        if !check_arg_count(comp, false, args, call_range, 1, usize::MAX) {
            return comp.error_type();
        }
        if !check_format_values(comp, args) {
            return comp.error_type();
        }
        Types::STRING
    }
}

/// A system subroutine declared by a fixed positional signature.
pub struct SimpleSystemSubroutine {
    pub name: &'static str,
    pub kind: SubroutineKind,
    pub required_args: usize,
    pub arg_types: Vec<TypeId>,
    pub return_type: TypeId,
    pub allow_non_const: bool,
    pub is_method: bool,
}

impl SystemSubroutine for SimpleSystemSubroutine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> SubroutineKind {
        self.kind
    }

    fn bind_argument(
        &self,
        index: usize,
        ctx: &BindContext,
        syntax: &ExprSyntax,
        comp: &mut Compilation,
    ) -> Expression {
        let non_const;
        let ctx = if self.allow_non_const {
            non_const = ctx.make_non_const();
            &non_const
        } else {
            ctx
        };

        match self.arg_types.get(index) {
            Some(&ty) => comp.bind_rvalue(syntax, ty, ctx),
            None => comp.bind_expression(syntax, ctx),
        }
    }

    fn check_arguments(
        &self,
        _ctx: &BindContext,
        args: &[Expression],
        call_range: Span,
        comp: &mut Compilation,
    ) -> TypeId {
        if !check_arg_count(
            comp,
            self.is_method,
            args,
            call_range,
            self.required_args,
            self.arg_types.len(),
        ) {
            return comp.error_type();
        }
        self.return_type
    }
}

/// Install the built-in system subroutines into a fresh compilation.
pub fn register_builtins(comp: &mut Compilation) {
    comp.register_system_subroutine(Rc::new(DisplayTask { name: "$display" }));
    comp.register_system_subroutine(Rc::new(DisplayTask { name: "$write" }));
    comp.register_system_subroutine(Rc::new(SformatfFunc));
    comp.register_system_subroutine(Rc::new(SimpleSystemSubroutine {
        name: "$clog2",
        kind: SubroutineKind::Function,
        required_args: 1,
        arg_types: vec![Types::LONG_INT],
        return_type: Types::INT,
        allow_non_const: false,
        is_method: false,
    }));
    comp.register_system_subroutine(Rc::new(SimpleSystemSubroutine {
        name: "$itor",
        kind: SubroutineKind::Function,
        required_args: 1,
        arg_types: vec![Types::INT],
        return_type: Types::REAL,
        allow_non_const: true,
        is_method: false,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::LookupLocation;
    use crate::syntax::build;

    fn bind_call(c: &mut Compilation, name: &str, args: Vec<ExprSyntax>) -> Expression {
        let root = c.root();
        let ctx = BindContext::new(root, LookupLocation::max());
        let syntax = ExprSyntax::Call {
            callee: build::ident(name),
            args,
            span: Span::default(),
        };
        c.bind_expression(&syntax, &ctx)
    }

    fn string_arg(s: &str) -> ExprSyntax {
        ExprSyntax::StringLiteral { value: s.into(), span: Span::default() }
    }

    fn real_arg(v: f64) -> ExprSyntax {
        ExprSyntax::RealLiteral { value: v, span: Span::default() }
    }

    #[test]
    fn test_unknown_system_name() {
        let mut c = Compilation::new();
        let expr = bind_call(&mut c, "$bogus", vec![]);
        assert!(expr.bad());
        assert_eq!(c.diags.last().unwrap().code, DiagCode::UnknownSystemName);
    }

    #[test]
    fn test_display_matching_args() {
        let mut c = Compilation::new();
        let expr = bind_call(
            &mut c,
            "$display",
            vec![string_arg("a=%d b=%s"), build::int(1), string_arg("x")],
        );
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
        assert_eq!(expr.ty, Types::VOID);
    }

    #[test]
    fn test_display_missing_arg_for_spec() {
        let mut c = Compilation::new();
        bind_call(&mut c, "$display", vec![string_arg("a=%d")]);
        assert_eq!(c.diags.last().unwrap().code, DiagCode::FormatNoArgument);
    }

    #[test]
    fn test_display_real_for_int_is_warning() {
        let mut c = Compilation::new();
        bind_call(&mut c, "$display", vec![string_arg("%d"), real_arg(1.5)]);
        assert_eq!(c.diags.last().unwrap().code, DiagCode::FormatRealInt);
        assert!(!c.diags.has_errors());
    }

    #[test]
    fn test_display_mismatched_type() {
        let mut c = Compilation::new();
        bind_call(
            &mut c,
            "$display",
            vec![string_arg("%f"), ExprSyntax::NullLiteral { span: Span::default() }],
        );
        assert_eq!(c.diags.last().unwrap().code, DiagCode::FormatMismatchedType);
    }

    #[test]
    fn test_display_empty_arg_for_spec() {
        let mut c = Compilation::new();
        bind_call(
            &mut c,
            "$display",
            vec![string_arg("%d"), ExprSyntax::Empty { span: Span::default() }],
        );
        assert_eq!(c.diags.last().unwrap().code, DiagCode::FormatEmptyArg);
    }

    #[test]
    fn test_display_empty_arg_without_spec_ok() {
        let mut c = Compilation::new();
        bind_call(
            &mut c,
            "$display",
            vec![ExprSyntax::Empty { span: Span::default() }, string_arg("done")],
        );
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_sformatf_fixed_format() {
        let mut c = Compilation::new();
        let expr = bind_call(&mut c, "$sformatf", vec![string_arg("%d"), build::int(3)]);
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
        assert_eq!(expr.ty, Types::STRING);
    }

    #[test]
    fn test_sformatf_too_many_args() {
        let mut c = Compilation::new();
        bind_call(
            &mut c,
            "$sformatf",
            vec![string_arg("%d"), build::int(3), build::int(4)],
        );
        assert_eq!(c.diags.last().unwrap().code, DiagCode::FormatTooManyArgs);
    }

    #[test]
    fn test_sformatf_needs_an_argument() {
        let mut c = Compilation::new();
        let expr = bind_call(&mut c, "$sformatf", vec![]);
        assert_eq!(c.diags.last().unwrap().code, DiagCode::TooFewArguments);
        assert_eq!(expr.ty, Types::ERROR);
    }

    #[test]
    fn test_clog2_signature() {
        let mut c = Compilation::new();
        let expr = bind_call(&mut c, "$clog2", vec![build::int(16)]);
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
        assert_eq!(expr.ty, Types::INT);

        bind_call(&mut c, "$clog2", vec![build::int(1), build::int(2)]);
        assert_eq!(c.diags.last().unwrap().code, DiagCode::TooManyArguments);
    }
}
