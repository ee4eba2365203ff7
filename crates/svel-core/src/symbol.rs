//! Symbols, scopes and name lookup.
//!
//! Scopes populate lazily: declaration syntax is recorded as deferred members
//! and expanded into real symbols the first time the scope is queried. The
//! tri-state lifecycle (unelaborated, elaborating, elaborated) makes the
//! drainage reentrant: a member whose construction looks up a sibling sees
//! the already-built prefix instead of recursing forever.

use crate::context::Compilation;
use crate::diag::DiagCode;
use crate::ids::{NetTypeId, SymbolId, TypeId};
use crate::interner::Name;
use crate::nettype::NetKind;
use crate::source::Span;
use crate::syntax::{
    DataTypeSyntax, DefinitionKindSyntax, ExprSyntax, ForwardCategorySyntax, ImportSyntax,
    MemberSyntax, ModuleDeclSyntax, PortConnectionSyntax, PortDeclSyntax, PortDirectionSyntax,
    SubroutineKindSyntax,
};
use crate::types::{TypeKind, Types};
use crate::value::{ConstantRange, ConstantValue};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

// ---------------------------------------------------------------------------
// Kind payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Module,
    Interface,
    Program,
}

impl From<DefinitionKindSyntax> for DefinitionKind {
    fn from(kind: DefinitionKindSyntax) -> Self {
        match kind {
            DefinitionKindSyntax::Module => DefinitionKind::Module,
            DefinitionKindSyntax::Interface => DefinitionKind::Interface,
            DefinitionKindSyntax::Program => DefinitionKind::Program,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Task,
    Function,
}

impl From<SubroutineKindSyntax> for SubroutineKind {
    fn from(kind: SubroutineKindSyntax) -> Self {
        match kind {
            SubroutineKindSyntax::Task => SubroutineKind::Task,
            SubroutineKindSyntax::Function => SubroutineKind::Function,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
    InOut,
    Ref,
}

impl From<PortDirectionSyntax> for PortDirection {
    fn from(dir: PortDirectionSyntax) -> Self {
        match dir {
            PortDirectionSyntax::Input => PortDirection::Input,
            PortDirectionSyntax::Output => PortDirection::Output,
            PortDirectionSyntax::InOut => PortDirection::InOut,
            PortDirectionSyntax::Ref => PortDirection::Ref,
        }
    }
}

/// Category tag on a forwarding typedef.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardCategory {
    None,
    Enum,
    Struct,
    Union,
    Class,
    InterfaceClass,
}

impl From<ForwardCategorySyntax> for ForwardCategory {
    fn from(cat: ForwardCategorySyntax) -> Self {
        match cat {
            ForwardCategorySyntax::None => ForwardCategory::None,
            ForwardCategorySyntax::Enum => ForwardCategory::Enum,
            ForwardCategorySyntax::Struct => ForwardCategory::Struct,
            ForwardCategorySyntax::Union => ForwardCategory::Union,
            ForwardCategorySyntax::Class => ForwardCategory::Class,
            ForwardCategorySyntax::InterfaceClass => ForwardCategory::InterfaceClass,
        }
    }
}

/// Lazy resolution lifecycle for parameters and net types. Re-entering
/// `Resolving` means a cyclic dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveState {
    #[default]
    Unresolved,
    Resolving,
    Resolved,
}

#[derive(Debug, Clone)]
pub struct DefinitionData {
    pub definition_kind: DefinitionKind,
    pub syntax: Rc<ModuleDeclSyntax>,
    /// Parameter symbols in declaration order, port params first.
    pub parameters: Vec<SymbolId>,
    pub default_net_type: NetKind,
}

#[derive(Debug, Clone)]
pub struct InstanceData {
    pub definition: SymbolId,
    pub definition_kind: DefinitionKind,
    pub depth: u32,
    /// Indices of the enclosing instance arrays, outermost first.
    pub array_path: Vec<i32>,
    /// Cloned parameter symbols, definition declaration order.
    pub parameters: Vec<SymbolId>,
    /// Port connections, resolved later during expression binding.
    pub connections: Vec<PortConnectionSyntax>,
}

#[derive(Debug, Clone)]
pub struct InstanceArrayData {
    pub range: ConstantRange,
    pub elements: Vec<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct ParameterData {
    pub is_local: bool,
    pub is_port: bool,
    pub ty_syntax: Option<Rc<DataTypeSyntax>>,
    /// Initializer syntax: the override expression if one was applied, else
    /// the declared default.
    pub init: Option<Rc<ExprSyntax>>,
    pub state: ResolveState,
    pub ty: TypeId,
    pub value: Option<ConstantValue>,
}

#[derive(Debug, Clone)]
pub struct TypeParameterData {
    pub is_local: bool,
    pub is_port: bool,
    pub default_syntax: Option<Rc<DataTypeSyntax>>,
    pub state: ResolveState,
    /// Set once an override or the default has been resolved.
    pub resolved: Option<TypeId>,
}

#[derive(Debug, Clone)]
pub struct VariableData {
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct NetData {
    pub net_type: NetTypeId,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct PortData {
    pub direction: PortDirection,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct SubroutineData {
    pub kind: SubroutineKind,
    pub return_type: TypeId,
    pub args: Vec<(Name, TypeId)>,
}

#[derive(Debug, Clone)]
pub struct EnumValueData {
    pub ty: TypeId,
    pub value: ConstantValue,
}

#[derive(Debug, Clone)]
pub struct ForwardingTypedefData {
    pub category: ForwardCategory,
    /// Next forward declaration of the same name, singly linked.
    pub next: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct TypeAliasData {
    /// The alias type node in the type table.
    pub ty: TypeId,
    /// Head of the forward-declaration list.
    pub first_forward: Option<SymbolId>,
}

/// The closed set of symbol kinds.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    Root,
    ErrorSymbol,
    Package,
    Definition(DefinitionData),
    Instance(InstanceData),
    InstanceArray(InstanceArrayData),
    Parameter(ParameterData),
    TypeParameter(TypeParameterData),
    Variable(VariableData),
    Net(NetData),
    Port(PortData),
    Modport,
    Subroutine(SubroutineData),
    EnumValue(EnumValueData),
    ForwardingTypedef(ForwardingTypedefData),
    TypeAlias(TypeAliasData),
    NetTypeDecl(NetTypeId),
    GenerateBlock,
}

impl SymbolKind {
    /// Stable kind name used in serialization and messages.
    pub fn describe(&self) -> &'static str {
        match self {
            SymbolKind::Root => "root",
            SymbolKind::ErrorSymbol => "error",
            SymbolKind::Package => "package",
            SymbolKind::Definition(_) => "definition",
            SymbolKind::Instance(data) => match data.definition_kind {
                DefinitionKind::Module => "module-instance",
                DefinitionKind::Interface => "interface-instance",
                DefinitionKind::Program => "program-instance",
            },
            SymbolKind::InstanceArray(_) => "instance-array",
            SymbolKind::Parameter(_) => "parameter",
            SymbolKind::TypeParameter(_) => "type-parameter",
            SymbolKind::Variable(_) => "variable",
            SymbolKind::Net(_) => "net",
            SymbolKind::Port(_) => "port",
            SymbolKind::Modport => "modport",
            SymbolKind::Subroutine(_) => "subroutine",
            SymbolKind::EnumValue(_) => "enum-value",
            SymbolKind::ForwardingTypedef(_) => "forwarding-typedef",
            SymbolKind::TypeAlias(_) => "type-alias",
            SymbolKind::NetTypeDecl(_) => "net-type",
            SymbolKind::GenerateBlock => "generate-block",
        }
    }
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeState {
    #[default]
    Unelaborated,
    Elaborating,
    Elaborated,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub package: Name,
    /// `None` is a wildcard import.
    pub item: Option<Name>,
    pub span: Span,
}

/// Scope payload carried by symbols that can contain members.
#[derive(Debug, Clone, Default)]
pub struct ScopeData {
    pub members: Vec<SymbolId>,
    name_map: HashMap<Name, SymbolId>,
    deferred: Vec<MemberSyntax>,
    pub imports: Vec<Import>,
    pub state: ScopeState,
}

/// A point in declaration order against which forward references are
/// checked. Only the innermost scope of a lookup applies the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupLocation {
    pub index: u32,
}

impl LookupLocation {
    /// After everything; no forward-reference restriction.
    pub fn max() -> Self {
        Self { index: u32::MAX }
    }

    /// Before the member at `index`.
    pub fn before(index: u32) -> Self {
        Self { index }
    }

    /// After the member at `index`.
    pub fn after(index: u32) -> Self {
        Self { index: index + 1 }
    }
}

/// An entity in the symbol graph.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: Name,
    pub span: Span,
    pub parent: Option<SymbolId>,
    /// Position in the parent's member list.
    pub decl_index: u32,
    scope: Option<Box<ScopeData>>,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: Name, span: Span) -> Symbol {
        Symbol { kind, name, span, parent: None, decl_index: 0, scope: None }
    }

    /// Same, but carrying an (empty, unelaborated) scope.
    pub fn new_scope(kind: SymbolKind, name: Name, span: Span) -> Symbol {
        Symbol { scope: Some(Box::new(ScopeData::default())), ..Symbol::new(kind, name, span) }
    }

    pub fn is_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub fn scope(&self) -> Option<&ScopeData> {
        self.scope.as_deref()
    }

    pub fn scope_mut(&mut self) -> Option<&mut ScopeData> {
        self.scope.as_deref_mut()
    }
}

// ---------------------------------------------------------------------------
// Scope operations
// ---------------------------------------------------------------------------

impl Compilation {
    /// Append a symbol to a scope in declaration order, updating the name
    /// map last-wins and reporting duplicate declarations.
    pub fn add_member(&mut self, scope: SymbolId, member: SymbolId) {
        let index = {
            let data = self
                .symbol(scope)
                .scope()
                .unwrap_or_else(|| panic!("symbol {} is not a scope", scope));
            data.members.len() as u32
        };

        let (name, span) = {
            let sym = self.symbol_mut(member);
            sym.parent = Some(scope);
            sym.decl_index = index;
            (sym.name, sym.span)
        };

        let previous = {
            let data = self.symbol_mut(scope).scope_mut().unwrap();
            data.members.push(member);
            if name != Name::EMPTY {
                data.name_map.insert(name, member)
            } else {
                None
            }
        };

        if let Some(previous) = previous {
            // Forward typedefs share their name with the eventual alias.
            let benign = matches!(self.symbol(previous).kind, SymbolKind::ForwardingTypedef(_))
                || matches!(self.symbol(member).kind, SymbolKind::ForwardingTypedef(_));
            if !benign {
                let prev_span = self.symbol(previous).span;
                let text = self.interner.resolve(name);
                self.add_diag(DiagCode::DuplicateDefinition, span)
                    .arg(text)
                    .note(DiagCode::NotePreviousDefinition, prev_span);
            }
        }
    }

    /// Record syntax nodes to be expanded into members on first access.
    pub fn add_deferred_members(&mut self, scope: SymbolId, members: &[MemberSyntax]) {
        let data = self.symbol_mut(scope).scope_mut().expect("not a scope");
        data.deferred.extend(members.iter().cloned());
        if data.state == ScopeState::Elaborated {
            data.state = ScopeState::Unelaborated;
        }
    }

    pub fn add_import_decl(&mut self, scope: SymbolId, syntax: &ImportSyntax) {
        let package = self.intern(&syntax.package.name);
        let item = syntax.item.as_ref().map(|i| self.intern(&i.name));
        let data = self.symbol_mut(scope).scope_mut().expect("not a scope");
        data.imports.push(Import { package, item, span: syntax.span });
    }

    /// Drain a scope's deferred members. Reentrant: while a scope is
    /// elaborating, nested queries see the already-built prefix.
    pub fn ensure_elaborated(&mut self, scope: SymbolId) {
        let data = match self.symbol_mut(scope).scope_mut() {
            Some(data) => data,
            None => return,
        };
        if data.state != ScopeState::Unelaborated {
            return;
        }
        data.state = ScopeState::Elaborating;
        let deferred = std::mem::take(&mut data.deferred);
        trace!(scope = %scope, count = deferred.len(), "draining deferred members");

        for member in &deferred {
            self.construct_member(scope, member);
        }

        let data = self.symbol_mut(scope).scope_mut().unwrap();
        data.state = ScopeState::Elaborated;
    }

    /// Find a symbol by name directly in this scope.
    pub fn find(&mut self, scope: SymbolId, name: &str) -> Option<SymbolId> {
        self.ensure_elaborated(scope);
        let name = self.intern(name);
        self.symbol(scope).scope()?.name_map.get(&name).copied()
    }

    /// The scope's members after drainage.
    pub fn members(&mut self, scope: SymbolId) -> Vec<SymbolId> {
        self.ensure_elaborated(scope);
        self.symbol(scope).scope().map(|s| s.members.clone()).unwrap_or_default()
    }

    /// Full name resolution: walk from `scope` outward consulting local
    /// names and imports; forward references are rejected in the innermost
    /// scope. Misses produce a diagnostic and the error symbol.
    pub fn lookup_name(
        &mut self,
        name: &str,
        location: LookupLocation,
        scope: SymbolId,
        span: Span,
    ) -> SymbolId {
        match self.lookup_inner(name, location, scope, true, span) {
            Some(sym) => sym,
            None => {
                self.add_diag(DiagCode::UndeclaredIdentifier, span).arg(name);
                self.error_symbol()
            }
        }
    }

    /// Like [`lookup_name`](Self::lookup_name) but silent on miss.
    pub fn lookup_quiet(
        &mut self,
        name: &str,
        location: LookupLocation,
        scope: SymbolId,
    ) -> Option<SymbolId> {
        self.lookup_inner(name, location, scope, false, Span::default())
    }

    fn lookup_inner(
        &mut self,
        name: &str,
        location: LookupLocation,
        scope: SymbolId,
        diagnose: bool,
        span: Span,
    ) -> Option<SymbolId> {
        let mut current = Some(scope);
        let mut innermost = true;
        while let Some(scope_id) = current {
            if self.symbol(scope_id).is_scope() {
                if let Some(found) = self.find(scope_id, name) {
                    if innermost && self.symbol(found).decl_index >= location.index {
                        // Declared later than the reference allows.
                        if diagnose {
                            let decl_span = self.symbol(found).span;
                            self.add_diag(DiagCode::UsedBeforeDeclared, span)
                                .arg(name)
                                .note(DiagCode::NoteDeclarationHere, decl_span);
                            return Some(self.error_symbol());
                        }
                        return None;
                    }
                    return Some(found);
                }

                if let Some(found) = self.lookup_imports(scope_id, name) {
                    return Some(found);
                }
                innermost = false;
            }
            current = self.symbol(scope_id).parent;
        }
        None
    }

    fn lookup_imports(&mut self, scope: SymbolId, name: &str) -> Option<SymbolId> {
        let imports = match self.symbol(scope).scope() {
            Some(data) => data.imports.clone(),
            None => return None,
        };
        let name_id = self.intern(name);
        for import in imports {
            let matches = match import.item {
                Some(item) => item == name_id,
                None => true,
            };
            if !matches {
                continue;
            }
            let root = self.root();
            let pkg_name = self.interner.resolve(import.package);
            let Some(package) = self.find(root, &pkg_name) else { continue };
            if !matches!(self.symbol(package).kind, SymbolKind::Package) {
                continue;
            }
            if let Some(found) = self.find(package, name) {
                return Some(found);
            }
        }
        None
    }

    /// Resolve a modport name against an interface definition. An empty
    /// name is simply "no modport"; a missing or non-modport member is
    /// diagnosed.
    pub fn modport_or_error(
        &mut self,
        definition: SymbolId,
        modport: &str,
        span: Span,
    ) -> Option<SymbolId> {
        if modport.is_empty() {
            return None;
        }
        match self.find(definition, modport) {
            None => {
                let owner = self.interner.resolve(self.symbol(definition).name);
                self.add_diag(DiagCode::UnknownMember, span).arg(modport).arg(owner);
                None
            }
            Some(found) => {
                if matches!(self.symbol(found).kind, SymbolKind::Modport) {
                    Some(found)
                } else {
                    let decl_span = self.symbol(found).span;
                    self.add_diag(DiagCode::NotAModport, span)
                        .arg(modport)
                        .note(DiagCode::NoteDeclarationHere, decl_span);
                    None
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Forwarding typedefs
    // ------------------------------------------------------------------

    /// Prepend a forward declaration to an alias's list.
    pub fn add_forward_decl(&mut self, alias: SymbolId, forward: SymbolId) {
        let head = match &self.symbol(alias).kind {
            SymbolKind::TypeAlias(data) => data.first_forward,
            _ => return,
        };
        if let SymbolKind::ForwardingTypedef(data) = &mut self.symbol_mut(forward).kind {
            data.next = head;
        }
        if let SymbolKind::TypeAlias(data) = &mut self.symbol_mut(alias).kind {
            data.first_forward = Some(forward);
        }
    }

    /// Verify each forward declaration's category against the alias's
    /// resolved target kind.
    pub fn check_forward_decls(&mut self, alias: SymbolId) {
        let (alias_ty, mut next) = match &self.symbol(alias).kind {
            SymbolKind::TypeAlias(data) => (data.ty, data.first_forward),
            _ => return,
        };
        let canon = self.canonical(alias_ty);
        let target_kind = self.types.kind(canon).clone();
        let alias_span = self.symbol(alias).span;

        while let Some(fwd) = next {
            let (category, span, link) = match &self.symbol(fwd).kind {
                SymbolKind::ForwardingTypedef(data) => (data.category, self.symbol(fwd).span, data.next),
                _ => break,
            };
            let ok = match category {
                ForwardCategory::None => true,
                ForwardCategory::Enum => matches!(target_kind, TypeKind::Enum { .. }),
                ForwardCategory::Struct => matches!(
                    target_kind,
                    TypeKind::PackedStruct { .. } | TypeKind::UnpackedStruct { .. }
                ),
                ForwardCategory::Union => matches!(
                    target_kind,
                    TypeKind::PackedUnion { .. } | TypeKind::UnpackedUnion { .. }
                ),
                // Class types are not part of this front-end's surface, so a
                // class-category forward can never match.
                ForwardCategory::Class | ForwardCategory::InterfaceClass => false,
            };
            if !ok && !self.types.is_error(canon) {
                let name = self.interner.resolve(self.symbol(fwd).name);
                self.add_diag(DiagCode::ForwardTypedefDoesNotMatch, span)
                    .arg(name)
                    .note(DiagCode::NoteDeclarationHere, alias_span);
            }
            next = link;
        }
    }

    // ------------------------------------------------------------------
    // Member construction from deferred syntax
    // ------------------------------------------------------------------

    pub(crate) fn construct_member(&mut self, scope: SymbolId, member: &MemberSyntax) {
        match member {
            MemberSyntax::Parameter(decl) => {
                let is_local = matches!(
                    decl.keyword,
                    Some(crate::syntax::ParamKeywordSyntax::LocalParam)
                );
                let params = self.parameter_symbols_from_decl(decl, is_local, false);
                for p in params {
                    self.add_member(scope, p);
                }
            }
            MemberSyntax::Variable(decl) => {
                let location = self.location_in(scope);
                let ty = self.get_type(&decl.ty, location, scope);
                for declarator in &decl.declarators {
                    let mut var_ty = ty;
                    for dim in declarator.dims.iter().rev() {
                        match self.eval_dimension(dim, location, scope) {
                            Some(range) => {
                                var_ty =
                                    self.add_anon_type(TypeKind::UnpackedArray { elem: var_ty, range });
                            }
                            None => var_ty = Types::ERROR,
                        }
                    }
                    let name = self.intern(&declarator.name.name);
                    let symbol = self.alloc_symbol(Symbol::new(
                        SymbolKind::Variable(VariableData { ty: var_ty }),
                        name,
                        declarator.name.span,
                    ));
                    self.add_member(scope, symbol);
                }
            }
            MemberSyntax::Net(decl) => {
                let location = self.location_in(scope);
                let net_type = self.resolve_net_type_specifier(&decl.net_type, location, scope);
                let ty = match &decl.ty {
                    Some(ty) => self.get_type(ty, location, scope),
                    None => Types::LOGIC,
                };
                for declarator in &decl.declarators {
                    let name = self.intern(&declarator.name.name);
                    let symbol = self.alloc_symbol(Symbol::new(
                        SymbolKind::Net(NetData { net_type, ty }),
                        name,
                        declarator.name.span,
                    ));
                    self.add_member(scope, symbol);
                }
            }
            MemberSyntax::Typedef(decl) => {
                let location = self.location_in(scope);
                let target = self.get_type(&decl.ty, location, scope);
                let name = self.intern(&decl.name.name);
                let alias_ty = self.types.add(crate::types::TypeData {
                    kind: TypeKind::Alias { target },
                    name,
                    span: decl.name.span,
                    canonical: None,
                });
                let symbol = self.alloc_symbol(Symbol::new(
                    SymbolKind::TypeAlias(TypeAliasData { ty: alias_ty, first_forward: None }),
                    name,
                    decl.name.span,
                ));

                // Adopt any forward declarations already seen in this scope.
                let forwards: Vec<SymbolId> = self
                    .symbol(scope)
                    .scope()
                    .map(|s| {
                        s.members
                            .iter()
                            .copied()
                            .filter(|&m| {
                                self.symbol(m).name == name
                                    && matches!(
                                        self.symbol(m).kind,
                                        SymbolKind::ForwardingTypedef(_)
                                    )
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                for fwd in forwards {
                    self.add_forward_decl(symbol, fwd);
                }

                self.add_member(scope, symbol);
                self.check_forward_decls(symbol);
            }
            MemberSyntax::ForwardTypedef(decl) => {
                let name = self.intern(&decl.name.name);
                let forward = self.alloc_symbol(Symbol::new(
                    SymbolKind::ForwardingTypedef(ForwardingTypedefData {
                        category: decl.category.into(),
                        next: None,
                    }),
                    name,
                    decl.name.span,
                ));
                // If the alias is already built, link and re-check now.
                let existing = self
                    .symbol(scope)
                    .scope()
                    .and_then(|s| s.name_map.get(&name).copied())
                    .filter(|&s| matches!(self.symbol(s).kind, SymbolKind::TypeAlias(_)));
                self.add_member(scope, forward);
                if let Some(alias) = existing {
                    self.add_forward_decl(alias, forward);
                    self.check_forward_decls(alias);
                }
            }
            MemberSyntax::Import(decl) => {
                self.add_import_decl(scope, decl);
            }
            MemberSyntax::Instantiation(decl) => {
                let location = self.location_in(scope);
                let created = self.instantiate_hierarchy(decl, location, scope);
                for symbol in created {
                    self.add_member(scope, symbol);
                }
            }
            MemberSyntax::Modport(decl) => {
                let name = self.intern(&decl.name.name);
                let symbol =
                    self.alloc_symbol(Symbol::new(SymbolKind::Modport, name, decl.name.span));
                self.add_member(scope, symbol);
            }
            MemberSyntax::Subroutine(decl) => {
                let location = self.location_in(scope);
                let return_type = match &decl.return_type {
                    Some(ty) => self.get_type(ty, location, scope),
                    None => Types::VOID,
                };
                let args = decl
                    .args
                    .iter()
                    .map(|(name, ty)| {
                        let ty = self.get_type(ty, location, scope);
                        let name = self.intern(&name.name);
                        (name, ty)
                    })
                    .collect();
                let name = self.intern(&decl.name.name);
                let symbol = self.alloc_symbol(Symbol::new(
                    SymbolKind::Subroutine(SubroutineData {
                        kind: decl.kind.into(),
                        return_type,
                        args,
                    }),
                    name,
                    decl.name.span,
                ));
                self.add_member(scope, symbol);
            }
            MemberSyntax::NetTypeDecl(decl) => {
                let symbol = self.net_type_from_syntax(decl, scope);
                self.add_member(scope, symbol);
            }
            MemberSyntax::GenerateBlock(decl) => {
                let name = match &decl.name {
                    Some(ident) => self.intern(&ident.name),
                    None => Name::EMPTY,
                };
                let symbol =
                    self.alloc_symbol(Symbol::new_scope(SymbolKind::GenerateBlock, name, decl.span));
                self.add_member(scope, symbol);
                self.add_deferred_members(symbol, &decl.members);
            }
        }
    }

    /// Lookup location corresponding to "after everything built so far" in a
    /// scope, used while constructing its members in order.
    pub(crate) fn location_in(&self, scope: SymbolId) -> LookupLocation {
        let index = self.symbol(scope).scope().map(|s| s.members.len() as u32).unwrap_or(0);
        LookupLocation::before(index)
    }

    /// Create port symbols from a definition header's port list.
    pub(crate) fn add_port_symbols(&mut self, scope: SymbolId, ports: &[PortDeclSyntax]) {
        for port in ports {
            let location = self.location_in(scope);
            let ty = match &port.ty {
                Some(ty) => self.get_type(ty, location, scope),
                None => Types::LOGIC,
            };
            let name = self.intern(&port.name.name);
            let symbol = self.alloc_symbol(Symbol::new(
                SymbolKind::Port(PortData { direction: port.direction.into(), ty }),
                name,
                port.name.span,
            ));
            self.add_member(scope, symbol);
        }
    }

    /// The resolved target type of a type parameter, resolving the default
    /// lazily. Re-entry during resolution is a cyclic dependency.
    pub fn type_parameter_type(&mut self, param: SymbolId) -> TypeId {
        let (state, resolved, default, parent, span, index) = match &self.symbol(param).kind {
            SymbolKind::TypeParameter(data) => (
                data.state,
                data.resolved,
                data.default_syntax.clone(),
                self.symbol(param).parent,
                self.symbol(param).span,
                self.symbol(param).decl_index,
            ),
            _ => return Types::ERROR,
        };

        if let Some(ty) = resolved {
            return ty;
        }
        match state {
            ResolveState::Resolving => {
                let name = self.interner.resolve(self.symbol(param).name);
                self.add_diag(DiagCode::CyclicParameterDependency, span).arg(name);
                self.set_type_parameter_resolved(param, Types::ERROR);
                return Types::ERROR;
            }
            ResolveState::Resolved => return Types::ERROR,
            ResolveState::Unresolved => {}
        }

        if let SymbolKind::TypeParameter(data) = &mut self.symbol_mut(param).kind {
            data.state = ResolveState::Resolving;
        }
        let ty = match (default, parent) {
            (Some(syntax), Some(parent)) => {
                self.get_type(&syntax, LookupLocation::before(index), parent)
            }
            _ => Types::ERROR,
        };
        self.set_type_parameter_resolved(param, ty);
        ty
    }

    pub(crate) fn set_type_parameter_resolved(&mut self, param: SymbolId, ty: TypeId) {
        if let SymbolKind::TypeParameter(data) = &mut self.symbol_mut(param).kind {
            data.resolved = Some(ty);
            data.state = ResolveState::Resolved;
        }
    }
}
