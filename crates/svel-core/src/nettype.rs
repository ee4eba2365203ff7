//! Net types.
//!
//! Nets have a typing discipline separate from data types: a small closed
//! set of built-in kinds plus user-defined net types declared with
//! `nettype`. A user-defined net type resolves lazily on first query: its
//! data type is computed, an alias link is discovered when the declared type
//! names another net type, and an optional resolution function is looked up.

use crate::context::Compilation;
use crate::diag::DiagCode;
use crate::ids::{NetTypeId, SymbolId, TypeId};
use crate::index_vec::IndexVec;
use crate::interner::Name;
use crate::source::Span;
use crate::symbol::{LookupLocation, ResolveState, Symbol, SymbolKind};
use crate::syntax::{DataTypeSyntax, NetTypeDeclSyntax, NetTypeSpecifierSyntax};
use crate::types::Types;
use std::rc::Rc;

/// The built-in net kinds plus the user-defined marker. `Unknown` doubles as
/// the error net type (`` `default_nettype none ``).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetKind {
    Unknown,
    Wire,
    WAnd,
    WOr,
    Tri,
    TriAnd,
    TriOr,
    Tri0,
    Tri1,
    TriReg,
    Supply0,
    Supply1,
    UWire,
    UserDefined,
}

impl NetKind {
    /// Map a net-type keyword (or `none`) to its kind; used by
    /// `` `default_nettype `` handling and net declarations.
    pub fn from_token_text(text: &str) -> Option<NetKind> {
        match text {
            "none" => Some(NetKind::Unknown),
            "wire" => Some(NetKind::Wire),
            "wand" => Some(NetKind::WAnd),
            "wor" => Some(NetKind::WOr),
            "tri" => Some(NetKind::Tri),
            "triand" => Some(NetKind::TriAnd),
            "trior" => Some(NetKind::TriOr),
            "tri0" => Some(NetKind::Tri0),
            "tri1" => Some(NetKind::Tri1),
            "trireg" => Some(NetKind::TriReg),
            "supply0" => Some(NetKind::Supply0),
            "supply1" => Some(NetKind::Supply1),
            "uwire" => Some(NetKind::UWire),
            _ => None,
        }
    }
}

/// One net-type table entry.
#[derive(Debug, Clone)]
pub struct NetTypeData {
    pub kind: NetKind,
    pub name: Name,
    pub span: Span,
    /// Declared data type syntax; `None` for builtins (always `logic`).
    decl: Option<Rc<NetTypeDeclSyntax>>,
    /// Scope the declaration lives in, for lazy resolution.
    decl_scope: Option<SymbolId>,
    // Lazily computed fields, guarded by `state`.
    state: ResolveState,
    data_type: TypeId,
    alias: Option<NetTypeId>,
    resolver: Option<SymbolId>,
}

/// The net-type table, pre-populated with every builtin.
pub struct NetTypes {
    list: IndexVec<NetTypeId, NetTypeData>,
}

const BUILTINS: [NetKind; 13] = [
    NetKind::Unknown,
    NetKind::Wire,
    NetKind::WAnd,
    NetKind::WOr,
    NetKind::Tri,
    NetKind::TriAnd,
    NetKind::TriOr,
    NetKind::Tri0,
    NetKind::Tri1,
    NetKind::TriReg,
    NetKind::Supply0,
    NetKind::Supply1,
    NetKind::UWire,
];

impl NetTypes {
    pub fn new() -> Self {
        let mut list = IndexVec::new();
        for kind in BUILTINS {
            list.push(NetTypeData {
                kind,
                name: Name::EMPTY,
                span: Span::default(),
                decl: None,
                decl_scope: None,
                state: ResolveState::Resolved,
                data_type: Types::LOGIC,
                alias: None,
                resolver: None,
            });
        }
        NetTypes { list }
    }

    /// The table slot for a builtin kind.
    pub fn builtin(&self, kind: NetKind) -> NetTypeId {
        let index = BUILTINS.iter().position(|&k| k == kind).unwrap_or(0);
        NetTypeId(index as u32)
    }

    pub fn get(&self, id: NetTypeId) -> &NetTypeData {
        &self.list[id]
    }

    fn get_mut(&mut self, id: NetTypeId) -> &mut NetTypeData {
        &mut self.list[id]
    }

    pub fn add_user_defined(
        &mut self,
        name: Name,
        span: Span,
        decl: Rc<NetTypeDeclSyntax>,
        scope: SymbolId,
    ) -> NetTypeId {
        self.list.push(NetTypeData {
            kind: NetKind::UserDefined,
            name,
            span,
            decl: Some(decl),
            decl_scope: Some(scope),
            state: ResolveState::Unresolved,
            data_type: Types::ERROR,
            alias: None,
            resolver: None,
        })
    }

    /// True iff this is the error net type.
    pub fn is_error(&self, id: NetTypeId) -> bool {
        self.list[id].kind == NetKind::Unknown
    }
}

impl Default for NetTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl NetTypeData {
    pub fn alias_target(&self) -> Option<NetTypeId> {
        self.alias
    }

    pub fn resolution_function(&self) -> Option<SymbolId> {
        self.resolver
    }
}

impl Compilation {
    /// Create the symbol for a `nettype` declaration.
    pub(crate) fn net_type_from_syntax(
        &mut self,
        decl: &NetTypeDeclSyntax,
        scope: SymbolId,
    ) -> SymbolId {
        let name = self.intern(&decl.name.name);
        let id =
            self.net_types.add_user_defined(name, decl.name.span, Rc::new(decl.clone()), scope);
        self.alloc_symbol(Symbol::new(SymbolKind::NetTypeDecl(id), name, decl.name.span))
    }

    /// The declared data type of a net type, resolving lazily.
    pub fn net_type_data_type(&mut self, id: NetTypeId) -> TypeId {
        self.resolve_net_type(id);
        self.net_types.get(id).data_type
    }

    /// Unwrap alias links to the canonical net type.
    pub fn net_type_canonical(&mut self, id: NetTypeId) -> NetTypeId {
        self.resolve_net_type(id);
        let mut current = id;
        let mut hops = 0;
        while let Some(next) = {
            self.resolve_net_type(current);
            self.net_types.get(current).alias
        } {
            current = next;
            hops += 1;
            if hops > 64 {
                break;
            }
        }
        current
    }

    /// One-shot lazy resolution of a user-defined net type. The flag is set
    /// before the declared type is chased, so aliasing cycles terminate
    /// instead of recursing.
    fn resolve_net_type(&mut self, id: NetTypeId) {
        if self.net_types.get(id).state != ResolveState::Unresolved {
            return;
        }
        self.net_types.get_mut(id).state = ResolveState::Resolved;

        let (decl, scope) = {
            let data = self.net_types.get(id);
            match (&data.decl, data.decl_scope) {
                (Some(decl), Some(scope)) => (decl.clone(), scope),
                _ => return,
            }
        };

        // A declared type that names another net type makes this an alias.
        if let DataTypeSyntax::Named { name, dims, .. } = &decl.ty {
            if dims.is_empty() {
                if let Some(found) = self.lookup_quiet(&name.name, LookupLocation::max(), scope) {
                    if let SymbolKind::NetTypeDecl(target) = self.symbol(found).kind {
                        let target_ty = self.net_type_data_type(target);
                        let data = self.net_types.get_mut(id);
                        data.alias = Some(target);
                        data.data_type = target_ty;
                        self.resolve_net_type_resolver(id, &decl, scope);
                        return;
                    }
                }
            }
        }

        let ty = self.get_type(&decl.ty, LookupLocation::max(), scope);
        self.net_types.get_mut(id).data_type = ty;
        self.resolve_net_type_resolver(id, &decl, scope);
    }

    fn resolve_net_type_resolver(
        &mut self,
        id: NetTypeId,
        decl: &NetTypeDeclSyntax,
        scope: SymbolId,
    ) {
        let Some(resolver) = &decl.resolver else { return };
        let symbol = self.lookup_name(&resolver.name, LookupLocation::max(), scope, resolver.span);
        if matches!(self.symbol(symbol).kind, SymbolKind::Subroutine(_)) {
            self.net_types.get_mut(id).resolver = Some(symbol);
        } else if !matches!(self.symbol(symbol).kind, SymbolKind::ErrorSymbol) {
            self.add_diag(DiagCode::NotAType, resolver.span).arg(&resolver.name);
        }
    }

    /// Resolve the net-type part of a net declaration.
    pub(crate) fn resolve_net_type_specifier(
        &mut self,
        spec: &NetTypeSpecifierSyntax,
        location: LookupLocation,
        scope: SymbolId,
    ) -> NetTypeId {
        match spec {
            NetTypeSpecifierSyntax::Builtin(kind) => self.net_types.builtin(*kind),
            NetTypeSpecifierSyntax::Named(name) => {
                let symbol = self.lookup_name(&name.name, location, scope, name.span);
                match self.symbol(symbol).kind {
                    SymbolKind::NetTypeDecl(id) => id,
                    SymbolKind::ErrorSymbol => self.net_types.builtin(NetKind::Unknown),
                    _ => {
                        self.add_diag(DiagCode::NotAType, name.span).arg(&name.name);
                        self.net_types.builtin(NetKind::Unknown)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build;
    use crate::syntax::MemberSyntax;

    #[test]
    fn test_builtin_table() {
        let nets = NetTypes::new();
        assert_eq!(nets.get(nets.builtin(NetKind::Wire)).kind, NetKind::Wire);
        assert_eq!(nets.get(nets.builtin(NetKind::Supply1)).kind, NetKind::Supply1);
        assert!(nets.is_error(nets.builtin(NetKind::Unknown)));
        assert!(!nets.is_error(nets.builtin(NetKind::Wire)));
    }

    #[test]
    fn test_user_defined_data_type() {
        let mut c = Compilation::new();
        let root = c.root();
        c.add_deferred_members(
            root,
            &[MemberSyntax::NetTypeDecl(NetTypeDeclSyntax {
                ty: build::int_ty(),
                name: build::ident("mynet"),
                resolver: None,
                span: Span::default(),
            })],
        );
        let sym = c.find(root, "mynet").unwrap();
        let id = match c.symbol(sym).kind {
            SymbolKind::NetTypeDecl(id) => id,
            _ => panic!("not a net type"),
        };
        assert_eq!(c.net_types.get(id).kind, NetKind::UserDefined);
        let ty = c.net_type_data_type(id);
        assert!(c.types_equivalent(ty, Types::INT));
        // Resolution is memoized.
        let ty2 = c.net_type_data_type(id);
        assert_eq!(ty, ty2);
    }

    #[test]
    fn test_net_type_alias_chain() {
        let mut c = Compilation::new();
        let root = c.root();
        c.add_deferred_members(
            root,
            &[
                MemberSyntax::NetTypeDecl(NetTypeDeclSyntax {
                    ty: build::int_ty(),
                    name: build::ident("base_net"),
                    resolver: None,
                    span: Span::default(),
                }),
                MemberSyntax::NetTypeDecl(NetTypeDeclSyntax {
                    ty: build::named_ty("base_net"),
                    name: build::ident("alias_net"),
                    resolver: None,
                    span: Span::default(),
                }),
            ],
        );
        let alias_sym = c.find(root, "alias_net").unwrap();
        let base_sym = c.find(root, "base_net").unwrap();
        let (alias_id, base_id) = match (&c.symbol(alias_sym).kind, &c.symbol(base_sym).kind) {
            (SymbolKind::NetTypeDecl(a), SymbolKind::NetTypeDecl(b)) => (*a, *b),
            _ => panic!("not net types"),
        };
        assert_eq!(c.net_type_canonical(alias_id), base_id);
        let ty = c.net_type_data_type(alias_id);
        assert!(c.types_equivalent(ty, Types::INT));
    }

    #[test]
    fn test_net_type_alias_cycle_terminates() {
        let mut c = Compilation::new();
        let root = c.root();
        c.add_deferred_members(
            root,
            &[
                MemberSyntax::NetTypeDecl(NetTypeDeclSyntax {
                    ty: build::named_ty("b"),
                    name: build::ident("a"),
                    resolver: None,
                    span: Span::default(),
                }),
                MemberSyntax::NetTypeDecl(NetTypeDeclSyntax {
                    ty: build::named_ty("a"),
                    name: build::ident("b"),
                    resolver: None,
                    span: Span::default(),
                }),
            ],
        );
        let a = c.find(root, "a").unwrap();
        let id = match c.symbol(a).kind {
            SymbolKind::NetTypeDecl(id) => id,
            _ => panic!(),
        };
        // Must terminate; the exact endpoint is whichever node cut the loop.
        let _ = c.net_type_canonical(id);
    }
}
