//! The compilation context.
//!
//! A [`Compilation`] owns every arena in the front-end: symbols, data types,
//! net types, source buffers, interned strings and the diagnostic sink. All
//! cross-references between entities are ids into these tables, so the
//! symbol graph can be cyclic while ownership stays flat.

use crate::diag::{DiagCode, Diagnostic, Diagnostics};
use crate::ids::{NetTypeId, SymbolId, TypeId};
use crate::index_vec::IndexVec;
use crate::interner::{Interner, Name};
use crate::nettype::{NetKind, NetTypes};
use crate::source::{SourceMap, Span};
use crate::symbol::{Symbol, SymbolKind};
use crate::syntax::{CompilationUnitSyntax, TopSyntax};
use crate::sysfunc::SystemSubroutine;
use crate::types::Types;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Failures of the top-level driver surface that are not diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ElaborationError {
    #[error("unknown top-level module `{0}`")]
    UnknownTopModule(String),
}

/// Knobs supplied at construction time.
#[derive(Debug, Clone)]
pub struct CompilationOptions {
    /// Hard cap on instance nesting, the only bounded loop in elaboration.
    pub max_instance_depth: u32,
    /// Net type used for implicit nets when no `` `default_nettype `` is in
    /// force.
    pub default_net_type: NetKind,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self { max_instance_depth: 128, default_net_type: NetKind::Wire }
    }
}

/// The root of a single elaboration run.
pub struct Compilation {
    pub options: CompilationOptions,
    pub interner: Interner,
    pub sources: SourceMap,
    pub diags: Diagnostics,
    pub(crate) symbols: IndexVec<SymbolId, Symbol>,
    pub(crate) types: Types,
    pub(crate) net_types: NetTypes,
    pub(crate) system_subroutines: HashMap<&'static str, Rc<dyn SystemSubroutine>>,
    root: SymbolId,
    error_symbol: SymbolId,
}

impl Default for Compilation {
    fn default() -> Self {
        Self::new()
    }
}

impl Compilation {
    pub fn new() -> Self {
        Self::with_options(CompilationOptions::default())
    }

    pub fn with_options(options: CompilationOptions) -> Self {
        let mut symbols = IndexVec::new();
        let root = symbols.push(Symbol::new_scope(SymbolKind::Root, Name::EMPTY, Span::default()));
        let error_symbol =
            symbols.push(Symbol::new(SymbolKind::ErrorSymbol, Name::EMPTY, Span::default()));

        let mut compilation = Self {
            options,
            interner: Interner::new(),
            sources: SourceMap::new(),
            diags: Diagnostics::new(),
            symbols,
            types: Types::new(),
            net_types: NetTypes::new(),
            system_subroutines: HashMap::new(),
            root,
            error_symbol,
        };
        crate::sysfunc::register_builtins(&mut compilation);
        debug!("compilation context created");
        compilation
    }

    /// The root scope holding packages and definitions.
    pub fn root(&self) -> SymbolId {
        self.root
    }

    /// The shared error-marker symbol returned by failed lookups.
    pub fn error_symbol(&self) -> SymbolId {
        self.error_symbol
    }

    /// The shared error type.
    pub fn error_type(&self) -> TypeId {
        Types::ERROR
    }

    pub fn intern(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    pub fn alloc_symbol(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol)
    }

    /// Record a diagnostic; the handle lets callers attach args and notes.
    pub fn add_diag(&mut self, code: DiagCode, span: Span) -> &mut Diagnostic {
        self.diags.add(code, span)
    }

    pub fn has_errors(&self) -> bool {
        self.diags.has_errors()
    }

    // ------------------------------------------------------------------
    // Definition registry
    // ------------------------------------------------------------------

    /// Register everything the parser produced for one compilation unit:
    /// packages become scopes under the root, module-like declarations
    /// become definitions.
    pub fn add_compilation_unit(&mut self, unit: &CompilationUnitSyntax) {
        for member in &unit.members {
            match member {
                TopSyntax::Module(decl) => {
                    let root = self.root;
                    self.create_definition(decl.clone(), root);
                }
                TopSyntax::Package(decl) => {
                    let name = self.intern(&decl.name.name);
                    let symbol = self.alloc_symbol(Symbol::new_scope(
                        SymbolKind::Package,
                        name,
                        decl.name.span,
                    ));
                    let root = self.root;
                    self.add_member(root, symbol);
                    self.add_deferred_members(symbol, &decl.members);
                    debug!(package = %decl.name.name, "registered package");
                }
            }
        }
    }

    /// Look up a definition visible from `scope`: the nearest enclosing
    /// package's definitions shadow the root's.
    pub fn get_definition(&mut self, name: &str, scope: SymbolId) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let is_container = matches!(
                self.symbol(id).kind,
                SymbolKind::Root | SymbolKind::Package
            );
            if is_container {
                if let Some(found) = self.find(id, name) {
                    if matches!(self.symbol(found).kind, SymbolKind::Definition(_)) {
                        return Some(found);
                    }
                }
            }
            current = self.symbol(id).parent;
        }
        None
    }

    /// The net type implicit nets take in `scope`: the innermost enclosing
    /// definition's captured `` `default_nettype ``, or the compilation
    /// default at the root.
    pub fn default_net_type_for(&mut self, scope: SymbolId) -> NetTypeId {
        let mut current = Some(scope);
        while let Some(id) = current {
            match &self.symbol(id).kind {
                SymbolKind::Definition(data) => {
                    return self.net_types.builtin(data.default_net_type)
                }
                SymbolKind::Instance(data) => {
                    let definition = data.definition;
                    if let SymbolKind::Definition(def) = &self.symbol(definition).kind {
                        return self.net_types.builtin(def.default_net_type);
                    }
                }
                _ => {}
            }
            current = self.symbol(id).parent;
        }
        self.net_types.builtin(self.options.default_net_type)
    }

    /// Register a parsed compilation unit and materialize the requested top
    /// modules. Problems inside the design surface as diagnostics; a top
    /// name that names no definition is a driver error.
    pub fn elaborate(
        &mut self,
        unit: &CompilationUnitSyntax,
        tops: &[&str],
    ) -> Result<Vec<SymbolId>, ElaborationError> {
        self.add_compilation_unit(unit);
        let mut instances = Vec::with_capacity(tops.len());
        for top in tops {
            match self.instantiate_top(top) {
                Some(instance) => instances.push(instance),
                None => return Err(ElaborationError::UnknownTopModule(top.to_string())),
            }
        }
        Ok(instances)
    }

    // ------------------------------------------------------------------
    // System subroutines
    // ------------------------------------------------------------------

    pub fn register_system_subroutine(&mut self, subroutine: Rc<dyn SystemSubroutine>) {
        self.system_subroutines.insert(subroutine.name(), subroutine);
    }

    pub fn system_subroutine(&self, name: &str) -> Option<Rc<dyn SystemSubroutine>> {
        self.system_subroutines.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build;
    use std::rc::Rc;

    #[test]
    fn test_builtin_types_reference_equal() {
        let mut a = Compilation::new();
        // Two independent requests for the same builtin yield the same id.
        let t1 = a.canonical(Types::INT);
        let t2 = a.canonical(Types::INT);
        assert_eq!(t1, t2);
        assert_eq!(t1, Types::INT);
    }

    #[test]
    fn test_definition_registry() {
        let mut c = Compilation::new();
        let unit = CompilationUnitSyntax {
            members: vec![TopSyntax::Module(Rc::new(build::module("m", None)))],
        };
        c.add_compilation_unit(&unit);
        let root = c.root();
        let def = c.get_definition("m", root).expect("definition registered");
        assert!(matches!(c.symbol(def).kind, SymbolKind::Definition(_)));
        assert!(c.get_definition("nope", root).is_none());
    }

    #[test]
    fn test_default_net_type_at_root() {
        let mut c = Compilation::new();
        let root = c.root();
        let net = c.default_net_type_for(root);
        assert_eq!(c.net_types.get(net).kind, NetKind::Wire);
    }
}
