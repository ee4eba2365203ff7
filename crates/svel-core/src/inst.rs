//! Definitions and the instantiation engine.
//!
//! A definition is the compile-time template of a module, interface or
//! program: its parameters are built eagerly so overrides can be matched by
//! position and name, while body members stay deferred syntax. Instantiation
//! materializes parameters once per instantiation site in a temporary scope
//! parented like the definition, applies overrides, then stamps out
//! instances (recursing through instance-array dimensions), creating
//! implicit nets for dangling port connection names along the way.

use crate::context::Compilation;
use crate::diag::DiagCode;
use crate::ids::SymbolId;
use crate::symbol::{
    DefinitionData, InstanceArrayData, InstanceData, LookupLocation, NetData, ParameterData,
    ResolveState, Symbol, SymbolKind, TypeParameterData,
};
use crate::syntax::{
    DataTypeSyntax, ExprSyntax, HierarchicalInstanceSyntax, HierarchyInstantiationSyntax,
    MemberSyntax, ModuleDeclSyntax, ParamArgSyntax, ParamBodySyntax, ParamKeywordSyntax,
    ParameterDeclSyntax, PortConnectionSyntax,
};
use crate::types::Types;
use crate::value::ConstantRange;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, trace};

impl Compilation {
    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Build a definition symbol from a module-like declaration. Parameters
    /// (port list, then body declarations) are created eagerly in
    /// declaration order; everything else is deferred.
    pub fn create_definition(&mut self, syntax: Rc<ModuleDeclSyntax>, scope: SymbolId) -> SymbolId {
        let name = self.intern(&syntax.name.name);
        let symbol = self.alloc_symbol(Symbol::new_scope(
            SymbolKind::Definition(DefinitionData {
                definition_kind: syntax.kind.into(),
                syntax: syntax.clone(),
                parameters: Vec::new(),
                default_net_type: syntax.default_net_type,
            }),
            name,
            syntax.name.span,
        ));
        self.add_member(scope, symbol);

        for import in &syntax.imports {
            self.add_import_decl(symbol, import);
        }

        let mut parameters = Vec::new();
        let has_port_params = syntax.param_ports.is_some();
        if let Some(port_params) = &syntax.param_ports {
            // An omitted parameter/localparam keyword inherits the previous
            // entry's.
            let mut last_local = false;
            for decl in port_params {
                if let Some(keyword) = decl.keyword {
                    last_local = keyword == ParamKeywordSyntax::LocalParam;
                }
                let params = self.parameter_symbols_from_decl(decl, last_local, true);
                for param in params {
                    parameters.push(param);
                    self.add_member(symbol, param);
                }
            }
        }

        self.add_port_symbols(symbol, &syntax.ports);

        let mut deferred = Vec::new();
        for member in &syntax.members {
            match member {
                MemberSyntax::Parameter(decl) => {
                    // Body parameters are implicitly local once a parameter
                    // port list exists.
                    let is_local = has_port_params
                        || decl.keyword == Some(ParamKeywordSyntax::LocalParam);
                    let params = self.parameter_symbols_from_decl(decl, is_local, false);
                    for param in params {
                        parameters.push(param);
                        self.add_member(symbol, param);
                    }
                }
                other => deferred.push(other.clone()),
            }
        }
        self.add_deferred_members(symbol, &deferred);

        if let SymbolKind::Definition(data) = &mut self.symbol_mut(symbol).kind {
            data.parameters = parameters;
        }
        debug!(definition = %syntax.name.name, "registered definition");
        symbol
    }

    /// Create the (value or type) parameter symbols of one declaration.
    pub(crate) fn parameter_symbols_from_decl(
        &mut self,
        decl: &ParameterDeclSyntax,
        is_local: bool,
        is_port: bool,
    ) -> Vec<SymbolId> {
        let mut result = Vec::new();
        match &decl.body {
            ParamBodySyntax::Value { ty, declarators } => {
                let ty_syntax = ty.clone().map(Rc::new);
                for declarator in declarators {
                    let name = self.intern(&declarator.name.name);
                    let symbol = self.alloc_symbol(Symbol::new(
                        SymbolKind::Parameter(ParameterData {
                            is_local,
                            is_port,
                            ty_syntax: ty_syntax.clone(),
                            init: declarator.init.clone().map(Rc::new),
                            state: ResolveState::Unresolved,
                            ty: Types::ERROR,
                            value: None,
                        }),
                        name,
                        declarator.name.span,
                    ));
                    result.push(symbol);
                }
            }
            ParamBodySyntax::Type { decls } => {
                for type_decl in decls {
                    let name = self.intern(&type_decl.name.name);
                    let symbol = self.alloc_symbol(Symbol::new(
                        SymbolKind::TypeParameter(TypeParameterData {
                            is_local,
                            is_port,
                            default_syntax: type_decl.default.clone().map(Rc::new),
                            state: ResolveState::Unresolved,
                            resolved: None,
                        }),
                        name,
                        type_decl.name.span,
                    ));
                    result.push(symbol);
                }
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Instantiation
    // ------------------------------------------------------------------

    /// Elaborate one hierarchy instantiation statement into instance (and
    /// instance array) symbols, plus any implicit nets its port connections
    /// require. The returned symbols are not yet members of any scope.
    pub fn instantiate_hierarchy(
        &mut self,
        syntax: &HierarchyInstantiationSyntax,
        location: LookupLocation,
        scope: SymbolId,
    ) -> Vec<SymbolId> {
        let mut results = Vec::new();

        let Some(definition) = self.get_definition(&syntax.type_name.name, scope) else {
            self.add_diag(DiagCode::UnknownModule, syntax.type_name.span)
                .arg(&syntax.type_name.name);
            return results;
        };

        let overrides = self.collect_param_overrides(syntax, definition, scope);
        let materialized = self.materialize_parameters(syntax, definition, &overrides, location, scope);

        // Depth is the nearest enclosing instance plus one; past the cap we
        // abort this instantiation entirely.
        let mut depth = 0;
        let mut current = Some(scope);
        while let Some(id) = current {
            if let SymbolKind::Instance(data) = &self.symbol(id).kind {
                depth = data.depth + 1;
                break;
            }
            current = self.symbol(id).parent;
        }
        if depth > self.options.max_instance_depth {
            let max_instance_depth = self.options.max_instance_depth;
            self.add_diag(DiagCode::MaxInstanceDepthExceeded, syntax.type_name.span)
                .arg(max_instance_depth);
            return results;
        }

        let net_type = self.default_net_type_for(scope);
        let mut implicit_names = HashSet::new();
        for instance in &syntax.instances {
            if !self.net_types.is_error(net_type) {
                self.create_implicit_nets(instance, scope, net_type, &mut implicit_names, &mut results);
            }

            let mut path: SmallVec<[i32; 4]> = SmallVec::new();
            let symbol = self.recurse_instance_array(
                definition,
                instance,
                &materialized,
                location,
                scope,
                0,
                &mut path,
                depth,
            );
            results.push(symbol);
        }
        results
    }

    /// Instantiate a definition at the top of the hierarchy with its default
    /// parameter values, adding the instance to the root scope.
    pub fn instantiate_top(&mut self, name: &str) -> Option<SymbolId> {
        let root = self.root();
        let definition = self.get_definition(name, root)?;
        let def_span = self.symbol(definition).span;

        let syntax = HierarchyInstantiationSyntax {
            type_name: crate::syntax::Ident::new(name, def_span),
            parameters: None,
            instances: vec![HierarchicalInstanceSyntax {
                name: crate::syntax::Ident::new(name, def_span),
                dimensions: vec![],
                connections: vec![],
                span: def_span,
            }],
            span: def_span,
        };
        let created = self.instantiate_hierarchy(&syntax, LookupLocation::max(), root);
        let top = created.into_iter().next()?;
        self.add_member(root, top);
        debug!(top = %name, "instantiated top level");
        Some(top)
    }

    // ------------------------------------------------------------------
    // Parameter overrides
    // ------------------------------------------------------------------

    fn param_facts(&self, param: SymbolId) -> (String, bool, bool) {
        let sym = self.symbol(param);
        let name = self.interner.resolve(sym.name).to_string();
        match &sym.kind {
            SymbolKind::Parameter(data) => (name, data.is_local, data.is_port),
            SymbolKind::TypeParameter(data) => (name, data.is_local, data.is_port),
            _ => (name, false, false),
        }
    }

    /// Index the parameter assignment clause against the definition's
    /// parameter list, producing `name -> override expression`.
    fn collect_param_overrides(
        &mut self,
        syntax: &HierarchyInstantiationSyntax,
        definition: SymbolId,
        _scope: SymbolId,
    ) -> HashMap<String, ExprSyntax> {
        let mut overrides = HashMap::new();
        let Some(assignments) = &syntax.parameters else { return overrides };

        // Ordered and named assignment can't be mixed in one clause.
        let mut has_assignments = false;
        let mut ordered_mode = true;
        let mut ordered: Vec<&ExprSyntax> = Vec::new();
        struct NamedEntry<'a> {
            expr: Option<&'a ExprSyntax>,
            span: crate::source::Span,
            used: bool,
        }
        let mut named: Vec<(String, NamedEntry)> = Vec::new();

        for arg in &assignments.args {
            let is_ordered = matches!(arg, ParamArgSyntax::Ordered(_));
            if !has_assignments {
                has_assignments = true;
                ordered_mode = is_ordered;
            } else if is_ordered != ordered_mode {
                self.add_diag(DiagCode::MixingOrderedAndNamedParams, arg.span());
                break;
            }

            match arg {
                ParamArgSyntax::Ordered(expr) => ordered.push(expr),
                ParamArgSyntax::Named { name, expr, span } => {
                    if name.name.is_empty() {
                        continue;
                    }
                    if let Some((_, prev)) = named.iter().find(|(n, _)| *n == name.name) {
                        let prev_span = prev.span;
                        self.add_diag(DiagCode::DuplicateParamAssignment, name.span)
                            .arg(&name.name)
                            .note(DiagCode::NotePreviousUsage, prev_span);
                        continue;
                    }
                    named.push((
                        name.name.clone(),
                        NamedEntry { expr: expr.as_ref(), span: *span, used: false },
                    ));
                }
            }
        }

        let (def_name, parameters) = match &self.symbol(definition).kind {
            SymbolKind::Definition(data) => (
                self.interner.resolve(self.symbol(definition).name).to_string(),
                data.parameters.clone(),
            ),
            _ => return overrides,
        };

        if ordered_mode {
            // Ordered entries are consumed by non-local slots only.
            let mut ordered_index = 0usize;
            for &param in &parameters {
                if ordered_index >= ordered.len() {
                    break;
                }
                let (name, is_local, _) = self.param_facts(param);
                if is_local {
                    continue;
                }
                overrides.insert(name, ordered[ordered_index].clone());
                ordered_index += 1;
            }

            if ordered_index < ordered.len() {
                let span = ordered[ordered_index].span();
                self.add_diag(DiagCode::TooManyParamAssignments, span)
                    .arg(&def_name)
                    .arg(ordered.len())
                    .arg(ordered_index);
            }
        } else {
            for &param in &parameters {
                let (name, is_local, is_port) = self.param_facts(param);
                let Some((_, entry)) = named.iter_mut().find(|(n, _)| *n == name) else {
                    continue;
                };
                entry.used = true;
                if is_local {
                    // Local parameters are not assignment targets.
                    let code = if is_port {
                        DiagCode::AssignedToLocalPortParam
                    } else {
                        DiagCode::AssignedToLocalBodyParam
                    };
                    let entry_span = entry.span;
                    let decl_span = self.symbol(param).span;
                    self.add_diag(code, entry_span)
                        .arg(&name)
                        .note(DiagCode::NoteDeclarationHere, decl_span);
                    continue;
                }
                // A bare `.N()` means "use the default".
                let Some(expr) = entry.expr else { continue };
                overrides.insert(name, expr.clone());
            }

            // Anything left unused names a parameter that doesn't exist.
            for (name, entry) in &named {
                if !entry.used {
                    self.add_diag(DiagCode::ParameterDoesNotExist, entry.span)
                        .arg(name)
                        .arg(&def_name);
                }
            }
        }

        overrides
    }

    /// Materialize parameter values once per instantiation site, inside a
    /// temporary scope parented like the definition so initializers resolve
    /// in the right environment.
    fn materialize_parameters(
        &mut self,
        syntax: &HierarchyInstantiationSyntax,
        definition: SymbolId,
        overrides: &HashMap<String, ExprSyntax>,
        location: LookupLocation,
        scope: SymbolId,
    ) -> Vec<SymbolId> {
        let (def_name, def_kind, def_parent, def_syntax, parameters) =
            match &self.symbol(definition).kind {
                SymbolKind::Definition(data) => (
                    self.symbol(definition).name,
                    data.definition_kind,
                    self.symbol(definition).parent,
                    data.syntax.clone(),
                    data.parameters.clone(),
                ),
                _ => return Vec::new(),
            };

        // The temp scope is never linked as a member; it only provides the
        // resolution environment and is abandoned afterwards.
        let temp = self.alloc_symbol(Symbol::new_scope(
            SymbolKind::Instance(InstanceData {
                definition,
                definition_kind: def_kind,
                depth: 0,
                array_path: Vec::new(),
                parameters: Vec::new(),
                connections: Vec::new(),
            }),
            def_name,
            self.symbol(definition).span,
        ));
        self.symbol_mut(temp).parent = def_parent;
        for import in &def_syntax.imports {
            self.add_import_decl(temp, import);
        }
        trace!(definition = %self.interner.resolve(def_name), "materializing parameters");

        // What still needs doing after the clone is allocated.
        enum Pending {
            Value { override_expr: Option<ExprSyntax>, ty_syntax: Option<Rc<DataTypeSyntax>> },
            Type { override_expr: Option<ExprSyntax>, missing_required: bool },
            Skip,
        }

        let mut materialized = Vec::with_capacity(parameters.len());
        for &original in &parameters {
            let (name, _, _) = self.param_facts(original);
            let mut clone = self.symbol(original).clone();
            clone.parent = None;
            clone.decl_index = 0;

            let pending = match &mut clone.kind {
                SymbolKind::Parameter(data) => {
                    data.state = ResolveState::Unresolved;
                    data.ty = Types::ERROR;
                    data.value = None;

                    let override_expr = overrides.get(&name).cloned();
                    if let Some(expr) = &override_expr {
                        data.init = Some(Rc::new(expr.clone()));
                    } else if !data.is_local && data.is_port && data.init.is_none() {
                        let def_text = self.interner.resolve(def_name);
                        self.add_diag(DiagCode::ParamHasNoValue, syntax.span)
                            .arg(def_text)
                            .arg(&name);
                    }
                    Pending::Value { override_expr, ty_syntax: data.ty_syntax.clone() }
                }
                SymbolKind::TypeParameter(data) => {
                    data.state = ResolveState::Unresolved;
                    data.resolved = None;
                    let override_expr = overrides.get(&name).cloned();
                    let missing_required = !data.is_local
                        && data.is_port
                        && data.default_syntax.is_none()
                        && override_expr.is_none();
                    Pending::Type { override_expr, missing_required }
                }
                _ => Pending::Skip,
            };

            let symbol = self.alloc_symbol(clone);
            match pending {
                Pending::Skip => continue,
                Pending::Value { override_expr, ty_syntax } => {
                    self.add_member(temp, symbol);
                    match override_expr {
                        Some(expr) => {
                            // Overrides bind at the instantiation site; only
                            // the declared type resolves in the temp scope.
                            let ctx = crate::bind::BindContext::constant(scope, location);
                            let bound = self.bind_expression(&expr, &ctx);
                            let value = if bound.bad() {
                                crate::value::ConstantValue::Error
                            } else {
                                self.eval_constant(&bound)
                            };
                            let param_location = self.location_in(temp);
                            let ty = match &ty_syntax {
                                Some(ty) => self.get_type(ty, param_location, temp),
                                None => match &value {
                                    crate::value::ConstantValue::Real(_) => Types::REAL,
                                    crate::value::ConstantValue::Str(_) => Types::STRING,
                                    _ => Types::INT,
                                },
                            };
                            let value = match value {
                                crate::value::ConstantValue::Integer(iv)
                                    if self.types.is_integral(ty) =>
                                {
                                    let width = self.types.bit_width(ty);
                                    let signed = self.types.is_signed(ty);
                                    crate::value::ConstantValue::Integer(
                                        crate::value::IntegerValue { signed, ..iv }
                                            .coerce_width(width),
                                    )
                                }
                                other => other,
                            };
                            self.set_parameter_resolved(symbol, ty, value);
                        }
                        None => {
                            // Defaults resolve in the temp environment; force
                            // the value now so every instance shares it.
                            self.parameter_value(symbol);
                        }
                    }
                    materialized.push(symbol);
                }
                Pending::Type { override_expr, missing_required } => {
                    self.add_member(temp, symbol);
                    match override_expr {
                        Some(expr) => {
                            // The parser didn't know this slot is a type;
                            // names get rewrapped as named types.
                            let ty = match expr {
                                ExprSyntax::Identifier(ident) => {
                                    let named = DataTypeSyntax::Named {
                                        name: ident.clone(),
                                        dims: vec![],
                                        span: ident.span,
                                    };
                                    self.get_type(&named, location, scope)
                                }
                                ExprSyntax::DataType(ty) => self.get_type(&ty, location, scope),
                                other => {
                                    self.add_diag(DiagCode::BadTypeParamExpr, other.span())
                                        .arg(&name);
                                    Types::ERROR
                                }
                            };
                            self.set_type_parameter_resolved(symbol, ty);
                        }
                        None => {
                            if missing_required {
                                let def_text = self.interner.resolve(def_name);
                                self.add_diag(DiagCode::ParamHasNoValue, syntax.span)
                                    .arg(def_text)
                                    .arg(&name);
                            }
                        }
                    }
                    materialized.push(symbol);
                }
            }
        }
        materialized
    }

    // ------------------------------------------------------------------
    // Instance creation
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn recurse_instance_array(
        &mut self,
        definition: SymbolId,
        instance: &HierarchicalInstanceSyntax,
        parameters: &[SymbolId],
        location: LookupLocation,
        scope: SymbolId,
        dim_index: usize,
        path: &mut SmallVec<[i32; 4]>,
        depth: u32,
    ) -> SymbolId {
        if dim_index >= instance.dimensions.len() {
            return self.create_instance(definition, instance, parameters, path, depth);
        }

        let name = self.intern(&instance.name.name);
        // A failed dimension still produces an empty array so later lookups
        // get targeted errors instead of crashes.
        let Some(range) =
            self.eval_dimension(&instance.dimensions[dim_index], location, scope)
        else {
            return self.alloc_symbol(Symbol::new_scope(
                SymbolKind::InstanceArray(InstanceArrayData {
                    range: ConstantRange::default(),
                    elements: Vec::new(),
                }),
                name,
                instance.name.span,
            ));
        };

        let mut elements = Vec::with_capacity(range.width() as usize);
        let array = self.alloc_symbol(Symbol::new_scope(
            SymbolKind::InstanceArray(InstanceArrayData { range, elements: Vec::new() }),
            name,
            instance.name.span,
        ));

        for index in range.lower()..=range.upper() {
            path.push(index);
            let element = self.recurse_instance_array(
                definition,
                instance,
                parameters,
                location,
                scope,
                dim_index + 1,
                path,
                depth,
            );
            path.pop();

            // Elements are reachable from the array by index-suffixed name.
            let suffixed = self.intern(&format!("{}[{}]", instance.name.name, index));
            self.symbol_mut(element).name = suffixed;
            self.add_member(array, element);
            elements.push(element);
        }

        if let SymbolKind::InstanceArray(data) = &mut self.symbol_mut(array).kind {
            data.elements = elements;
        }
        array
    }

    fn create_instance(
        &mut self,
        definition: SymbolId,
        instance: &HierarchicalInstanceSyntax,
        parameters: &[SymbolId],
        path: &[i32],
        depth: u32,
    ) -> SymbolId {
        let (def_kind, def_syntax) = match &self.symbol(definition).kind {
            SymbolKind::Definition(data) => (data.definition_kind, data.syntax.clone()),
            _ => unreachable!("instantiating a non-definition"),
        };

        let name = self.intern(&instance.name.name);
        let symbol = self.alloc_symbol(Symbol::new_scope(
            SymbolKind::Instance(InstanceData {
                definition,
                definition_kind: def_kind,
                depth,
                array_path: path.to_vec(),
                parameters: parameters.to_vec(),
                connections: instance.connections.clone(),
            }),
            name,
            instance.name.span,
        ));
        trace!(instance = %instance.name.name, depth, "created instance");

        // Package imports from the header come first.
        for import in &def_syntax.imports {
            self.add_import_decl(symbol, import);
        }

        // Port parameters, cloned from the materialized set so the computed
        // values carry over.
        let mut param_iter = parameters.iter().copied().peekable();
        while let Some(&param) = param_iter.peek() {
            let is_port = match &self.symbol(param).kind {
                SymbolKind::Parameter(data) => data.is_port,
                SymbolKind::TypeParameter(data) => data.is_port,
                _ => false,
            };
            if !is_port {
                break;
            }
            param_iter.next();
            let clone = self.clone_parameter(param);
            self.add_member(symbol, clone);
        }

        // Ports before body members, so connections can elaborate first.
        self.add_port_symbols(symbol, &def_syntax.ports);

        // Body members: parameter declaration statements consume the next
        // materialized entries; everything else defers.
        let mut deferred = Vec::new();
        for member in &def_syntax.members {
            match member {
                MemberSyntax::Parameter(decl) => {
                    let count = match &decl.body {
                        ParamBodySyntax::Value { declarators, .. } => declarators.len(),
                        ParamBodySyntax::Type { decls } => decls.len(),
                    };
                    for _ in 0..count {
                        let Some(param) = param_iter.next() else { break };
                        let clone = self.clone_parameter(param);
                        self.add_member(symbol, clone);
                    }
                }
                other => deferred.push(other.clone()),
            }
        }
        self.add_deferred_members(symbol, &deferred);
        symbol
    }

    fn clone_parameter(&mut self, param: SymbolId) -> SymbolId {
        let mut clone = self.symbol(param).clone();
        clone.parent = None;
        clone.decl_index = 0;
        self.alloc_symbol(clone)
    }

    // ------------------------------------------------------------------
    // Implicit nets
    // ------------------------------------------------------------------

    /// Create implicit nets for port-connection names that resolve to
    /// nothing, deduplicating across the whole instantiation group.
    fn create_implicit_nets(
        &mut self,
        instance: &HierarchicalInstanceSyntax,
        scope: SymbolId,
        net_type: crate::ids::NetTypeId,
        seen: &mut HashSet<String>,
        results: &mut Vec<SymbolId>,
    ) {
        let mut candidates: Vec<crate::syntax::Ident> = Vec::new();
        for connection in &instance.connections {
            let expr = match connection {
                PortConnectionSyntax::Ordered { expr, .. } => expr.as_ref(),
                PortConnectionSyntax::Named { expr, .. } => expr.as_ref(),
                PortConnectionSyntax::Wildcard { .. } => None,
            };
            if let Some(expr) = expr {
                collect_name_candidates(expr, &mut candidates);
            }
        }

        for ident in candidates {
            if self.lookup_quiet(&ident.name, LookupLocation::max(), scope).is_some() {
                continue;
            }
            if !seen.insert(ident.name.clone()) {
                continue;
            }
            let name = self.intern(&ident.name);
            let net = self.alloc_symbol(Symbol::new(
                SymbolKind::Net(NetData { net_type, ty: Types::LOGIC }),
                name,
                ident.span,
            ));
            trace!(net = %ident.name, "created implicit net");
            results.push(net);
        }
    }
}

/// Bare identifiers inside a connection expression that could become
/// implicit nets. Member accesses and call names never do.
fn collect_name_candidates(expr: &ExprSyntax, out: &mut Vec<crate::syntax::Ident>) {
    match expr {
        ExprSyntax::Identifier(ident) => out.push(ident.clone()),
        ExprSyntax::Unary { operand, .. } => collect_name_candidates(operand, out),
        ExprSyntax::Binary { lhs, rhs, .. } => {
            collect_name_candidates(lhs, out);
            collect_name_candidates(rhs, out);
        }
        ExprSyntax::Conditional { cond, if_true, if_false, .. } => {
            collect_name_candidates(cond, out);
            collect_name_candidates(if_true, out);
            collect_name_candidates(if_false, out);
        }
        ExprSyntax::Concat { parts, .. } => {
            for part in parts {
                collect_name_candidates(part, out);
            }
        }
        ExprSyntax::ElementSelect { base, index, .. } => {
            collect_name_candidates(base, out);
            collect_name_candidates(index, out);
        }
        ExprSyntax::RangeSelect { base, left, right, .. } => {
            collect_name_candidates(base, out);
            collect_name_candidates(left, out);
            collect_name_candidates(right, out);
        }
        ExprSyntax::Call { args, .. } => {
            for arg in args {
                collect_name_candidates(arg, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nettype::NetKind;
    use crate::source::Span;
    use crate::syntax::build;
    use crate::syntax::{
        CompilationUnitSyntax, DeclaratorSyntax, Ident, ParamAssignmentsSyntax, TopSyntax,
        VariableDeclSyntax,
    };
    use crate::value::ConstantValue;

    fn setup(modules: Vec<ModuleDeclSyntax>) -> Compilation {
        let mut c = Compilation::new();
        let unit = CompilationUnitSyntax {
            members: modules.into_iter().map(|m| TopSyntax::Module(Rc::new(m))).collect(),
        };
        c.add_compilation_unit(&unit);
        c
    }

    fn instantiate(
        c: &mut Compilation,
        type_name: &str,
        parameters: Option<ParamAssignmentsSyntax>,
        instances: Vec<HierarchicalInstanceSyntax>,
    ) -> Vec<SymbolId> {
        let root = c.root();
        let syntax = build::instantiation(type_name, parameters, instances);
        let created = c.instantiate_hierarchy(&syntax, LookupLocation::max(), root);
        for &s in &created {
            c.add_member(root, s);
        }
        created
    }

    fn ordered(args: Vec<ExprSyntax>) -> ParamAssignmentsSyntax {
        ParamAssignmentsSyntax {
            args: args.into_iter().map(ParamArgSyntax::Ordered).collect(),
            span: Span::default(),
        }
    }

    fn named(args: Vec<(&str, Option<ExprSyntax>)>) -> ParamAssignmentsSyntax {
        ParamAssignmentsSyntax {
            args: args
                .into_iter()
                .map(|(name, expr)| ParamArgSyntax::Named {
                    name: build::ident(name),
                    expr,
                    span: Span::default(),
                })
                .collect(),
            span: Span::default(),
        }
    }

    fn instance_params(c: &Compilation, inst: SymbolId) -> Vec<SymbolId> {
        match &c.symbol(inst).kind {
            SymbolKind::Instance(data) => data.parameters.clone(),
            _ => panic!("not an instance"),
        }
    }

    fn param_value_of(c: &mut Compilation, inst: SymbolId, name: &str) -> ConstantValue {
        let param = c.find(inst, name).expect("parameter exists");
        c.parameter_value(param)
    }

    #[test]
    fn test_unknown_module() {
        let mut c = setup(vec![]);
        let created = instantiate(&mut c, "Foo", None, vec![build::instance("u", vec![])]);
        assert!(created.is_empty());
        let diag = c.diags.last().unwrap();
        assert_eq!(diag.code, DiagCode::UnknownModule);
        assert_eq!(diag.args, vec!["Foo".to_string()]);
    }

    #[test]
    fn test_simple_instance_with_defaults() {
        let module = build::module(
            "m",
            Some(vec![build::value_param("W", Some(build::int(8)), false)]),
        );
        let mut c = setup(vec![module]);
        let created = instantiate(&mut c, "m", None, vec![build::instance("u", vec![])]);
        assert_eq!(created.len(), 1);
        let value = param_value_of(&mut c, created[0], "W");
        assert_eq!(value.as_integer(), Some(8));
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_ordered_override() {
        let module = build::module(
            "m",
            Some(vec![
                build::value_param("A", Some(build::int(1)), false),
                build::value_param("B", Some(build::int(2)), false),
            ]),
        );
        let mut c = setup(vec![module]);
        let created = instantiate(
            &mut c,
            "m",
            Some(ordered(vec![build::int(10), build::int(20)])),
            vec![build::instance("u", vec![])],
        );
        assert_eq!(param_value_of(&mut c, created[0], "A").as_integer(), Some(10));
        assert_eq!(param_value_of(&mut c, created[0], "B").as_integer(), Some(20));
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_ordered_skips_local_params() {
        let module = build::module(
            "m",
            Some(vec![
                build::value_param("L", Some(build::int(1)), true),
                build::value_param("A", Some(build::int(2)), false),
            ]),
        );
        let mut c = setup(vec![module]);
        let created = instantiate(
            &mut c,
            "m",
            Some(ordered(vec![build::int(42)])),
            vec![build::instance("u", vec![])],
        );
        // The single ordered entry lands on A, not the localparam.
        assert_eq!(param_value_of(&mut c, created[0], "L").as_integer(), Some(1));
        assert_eq!(param_value_of(&mut c, created[0], "A").as_integer(), Some(42));
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_too_many_ordered_assignments() {
        let module =
            build::module("m", Some(vec![build::value_param("A", Some(build::int(1)), false)]));
        let mut c = setup(vec![module]);
        instantiate(
            &mut c,
            "m",
            Some(ordered(vec![build::int(1), build::int(2)])),
            vec![build::instance("u", vec![])],
        );
        let diag = c.diags.iter().find(|d| d.code == DiagCode::TooManyParamAssignments).unwrap();
        // Reports the provided count and the consumed count.
        assert_eq!(diag.args, vec!["m".to_string(), "2".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_mixing_ordered_and_named() {
        let module = build::module(
            "M",
            Some(vec![
                build::value_param("A", Some(build::int(1)), false),
                build::value_param("B", Some(build::int(2)), false),
            ]),
        );
        let mut c = setup(vec![module]);
        let mixed = ParamAssignmentsSyntax {
            args: vec![
                ParamArgSyntax::Named {
                    name: build::ident("A"),
                    expr: Some(build::int(1)),
                    span: Span::default(),
                },
                ParamArgSyntax::Ordered(build::int(2)),
            ],
            span: Span::default(),
        };
        let created = instantiate(&mut c, "M", Some(mixed), vec![build::instance("u", vec![])]);
        assert!(c.diags.codes().contains(&DiagCode::MixingOrderedAndNamedParams));
        // Elaboration continues with the first-seen style honored.
        assert_eq!(created.len(), 1);
        assert_eq!(param_value_of(&mut c, created[0], "A").as_integer(), Some(1));
    }

    #[test]
    fn test_duplicate_named_assignment() {
        let module =
            build::module("m", Some(vec![build::value_param("A", Some(build::int(1)), false)]));
        let mut c = setup(vec![module]);
        instantiate(
            &mut c,
            "m",
            Some(named(vec![("A", Some(build::int(1))), ("A", Some(build::int(2)))])),
            vec![build::instance("u", vec![])],
        );
        let diag = c.diags.iter().find(|d| d.code == DiagCode::DuplicateParamAssignment).unwrap();
        assert_eq!(diag.notes[0].code, DiagCode::NotePreviousUsage);
    }

    #[test]
    fn test_named_override_and_empty_default() {
        let module = build::module(
            "m",
            Some(vec![
                build::value_param("A", Some(build::int(1)), false),
                build::value_param("B", Some(build::int(2)), false),
            ]),
        );
        let mut c = setup(vec![module]);
        let created = instantiate(
            &mut c,
            "m",
            Some(named(vec![("B", Some(build::int(99))), ("A", None)])),
            vec![build::instance("u", vec![])],
        );
        assert_eq!(param_value_of(&mut c, created[0], "A").as_integer(), Some(1));
        assert_eq!(param_value_of(&mut c, created[0], "B").as_integer(), Some(99));
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_assignment_to_local_param() {
        let module =
            build::module("m", Some(vec![build::value_param("L", Some(build::int(1)), true)]));
        let mut c = setup(vec![module]);
        instantiate(
            &mut c,
            "m",
            Some(named(vec![("L", Some(build::int(5)))])),
            vec![build::instance("u", vec![])],
        );
        assert!(c.diags.codes().contains(&DiagCode::AssignedToLocalPortParam));
    }

    #[test]
    fn test_parameter_does_not_exist() {
        let module =
            build::module("m", Some(vec![build::value_param("A", Some(build::int(1)), false)]));
        let mut c = setup(vec![module]);
        let created = instantiate(
            &mut c,
            "m",
            Some(named(vec![("A", Some(build::int(2))), ("NOPE", Some(build::int(3)))])),
            vec![build::instance("u", vec![])],
        );
        // The known override still applies before the stray one reports.
        assert_eq!(param_value_of(&mut c, created[0], "A").as_integer(), Some(2));
        let diag = c.diags.iter().find(|d| d.code == DiagCode::ParameterDoesNotExist).unwrap();
        assert_eq!(diag.args[0], "NOPE");
    }

    #[test]
    fn test_param_has_no_value() {
        let module = build::module("m", Some(vec![build::value_param("W", None, false)]));
        let mut c = setup(vec![module]);
        instantiate(&mut c, "m", None, vec![build::instance("u", vec![])]);
        assert!(c.diags.codes().contains(&DiagCode::ParamHasNoValue));
    }

    #[test]
    fn test_type_param_override_rewraps_name() {
        let module =
            build::module("m", Some(vec![build::type_param("T", Some(build::int_ty()))]));
        let mut c = setup(vec![module]);
        // Declare a typedef in root so the override name resolves.
        c.add_deferred_members(
            c.root(),
            &[MemberSyntax::Typedef(crate::syntax::TypedefSyntax {
                ty: DataTypeSyntax::Str { span: Span::default() },
                name: build::ident("string_t"),
                span: Span::default(),
            })],
        );
        let created = instantiate(
            &mut c,
            "m",
            Some(named(vec![("T", Some(build::name_expr("string_t")))])),
            vec![build::instance("u", vec![])],
        );
        let param = c.find(created[0], "T").unwrap();
        let ty = c.type_parameter_type(param);
        assert!(c.types_equivalent(ty, Types::STRING));
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_bad_type_param_expr() {
        let module =
            build::module("m", Some(vec![build::type_param("T", Some(build::int_ty()))]));
        let mut c = setup(vec![module]);
        instantiate(
            &mut c,
            "m",
            Some(named(vec![("T", Some(build::binary(
                crate::syntax::BinaryOp::Add,
                build::int(1),
                build::int(2),
            )))])),
            vec![build::instance("u", vec![])],
        );
        assert!(c.diags.codes().contains(&DiagCode::BadTypeParamExpr));
    }

    #[test]
    fn test_instance_array() {
        let module = build::module("M", None);
        let mut c = setup(vec![module]);
        let created =
            instantiate(&mut c, "M", None, vec![build::instance("u", vec![build::dim(0, 1)])]);
        assert_eq!(created.len(), 1);
        let array = created[0];
        let (range, elements) = match &c.symbol(array).kind {
            SymbolKind::InstanceArray(data) => (data.range, data.elements.clone()),
            other => panic!("expected array, got {:?}", other.describe()),
        };
        assert_eq!((range.lower(), range.upper()), (0, 1));
        assert_eq!(elements.len(), 2);

        let paths: Vec<Vec<i32>> = elements
            .iter()
            .map(|&e| match &c.symbol(e).kind {
                SymbolKind::Instance(data) => data.array_path.clone(),
                _ => panic!("not an instance"),
            })
            .collect();
        assert_eq!(paths, vec![vec![0], vec![1]]);

        // Children share the materialized parameter list by reference.
        let p0 = instance_params(&c, elements[0]);
        let p1 = instance_params(&c, elements[1]);
        assert_eq!(p0, p1);

        // Elements are reachable from the array by index-suffixed name.
        assert!(c.find(array, "u[0]").is_some());
        assert!(c.find(array, "u[1]").is_some());
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_nested_instance_array_paths() {
        let module = build::module("M", None);
        let mut c = setup(vec![module]);
        let created = instantiate(
            &mut c,
            "M",
            None,
            vec![build::instance("u", vec![build::dim(0, 1), build::dim(0, 1)])],
        );
        let outer = match &c.symbol(created[0]).kind {
            SymbolKind::InstanceArray(data) => data.elements.clone(),
            _ => panic!("expected array"),
        };
        let inner = match &c.symbol(outer[1]).kind {
            SymbolKind::InstanceArray(data) => data.elements.clone(),
            _ => panic!("expected nested array"),
        };
        match &c.symbol(inner[0]).kind {
            SymbolKind::Instance(data) => assert_eq!(data.array_path, vec![1, 0]),
            _ => panic!("not an instance"),
        }
    }

    #[test]
    fn test_bad_array_dimension_makes_empty_array() {
        let module = build::module("M", None);
        let mut c = setup(vec![module]);
        let dim = crate::syntax::DimensionSyntax {
            left: build::name_expr("not_a_constant"),
            right: build::int(0),
            span: Span::default(),
        };
        let created = instantiate(&mut c, "M", None, vec![build::instance("u", vec![dim])]);
        assert_eq!(created.len(), 1);
        match &c.symbol(created[0]).kind {
            SymbolKind::InstanceArray(data) => assert!(data.elements.is_empty()),
            _ => panic!("expected an empty array"),
        }
        assert!(c.diags.codes().contains(&DiagCode::DimensionRequiresConstRange));
    }

    #[test]
    fn test_max_instance_depth() {
        // A module that instantiates itself elaborates only to the cap.
        let mut module = build::module("m", None);
        module.members.push(MemberSyntax::Instantiation(build::instantiation(
            "m",
            None,
            vec![build::instance("u", vec![])],
        )));
        let mut c = Compilation::with_options(crate::context::CompilationOptions {
            max_instance_depth: 4,
            ..Default::default()
        });
        let unit = CompilationUnitSyntax {
            members: vec![TopSyntax::Module(Rc::new(module))],
        };
        c.add_compilation_unit(&unit);

        let top = c.instantiate_top("m").unwrap();

        fn deep_elaborate(c: &mut Compilation, symbol: SymbolId, max_seen: &mut u32) {
            if let SymbolKind::Instance(data) = &c.symbol(symbol).kind {
                *max_seen = (*max_seen).max(data.depth);
            }
            for member in c.members(symbol) {
                deep_elaborate(c, member, max_seen);
            }
        }
        let mut max_seen = 0;
        deep_elaborate(&mut c, top, &mut max_seen);

        assert!(c.diags.codes().contains(&DiagCode::MaxInstanceDepthExceeded));
        assert!(max_seen <= 4, "deepest instance {} exceeds the cap", max_seen);
    }

    #[test]
    fn test_implicit_net_creation() {
        let module = build::module("M", None);
        let mut c = setup(vec![module]);
        let mut inst = build::instance("u", vec![]);
        inst.connections.push(crate::syntax::PortConnectionSyntax::Named {
            name: build::ident("p"),
            expr: Some(build::name_expr("dangling")),
            span: Span::default(),
        });
        let created = instantiate(&mut c, "M", None, vec![inst]);
        // One net plus the instance itself.
        assert_eq!(created.len(), 2);
        let net = c.find(c.root(), "dangling").expect("implicit net created");
        match &c.symbol(net).kind {
            SymbolKind::Net(data) => {
                assert_eq!(c.net_types.get(data.net_type).kind, NetKind::Wire);
            }
            other => panic!("expected net, got {:?}", other.describe()),
        }
    }

    #[test]
    fn test_implicit_net_dedup_across_group() {
        let module = build::module("M", None);
        let mut c = setup(vec![module]);
        let mut a = build::instance("a", vec![]);
        a.connections.push(crate::syntax::PortConnectionSyntax::Ordered {
            expr: Some(build::name_expr("shared")),
            span: Span::default(),
        });
        let mut b = build::instance("b", vec![]);
        b.connections.push(crate::syntax::PortConnectionSyntax::Ordered {
            expr: Some(build::name_expr("shared")),
            span: Span::default(),
        });
        let created = instantiate(&mut c, "M", None, vec![a, b]);
        // One shared net and two instances.
        assert_eq!(created.len(), 3);
    }

    #[test]
    fn test_no_implicit_nets_when_nettype_none() {
        let mut module = build::module("M", None);
        module.default_net_type = NetKind::Unknown;
        // The instantiation happens inside another definition that captured
        // `default_nettype none.
        let mut outer = build::module("Outer", None);
        outer.default_net_type = NetKind::Unknown;
        let mut inst = build::instance("u", vec![]);
        inst.connections.push(crate::syntax::PortConnectionSyntax::Ordered {
            expr: Some(build::name_expr("dangling")),
            span: Span::default(),
        });
        outer.members.push(MemberSyntax::Instantiation(build::instantiation(
            "M",
            None,
            vec![inst],
        )));

        let mut c = setup(vec![module, outer]);
        let top = c.instantiate_top("Outer").unwrap();
        let members = c.members(top);
        // Only the inner instance; no implicit net was created.
        assert!(c.find(top, "dangling").is_none());
        assert_eq!(
            members
                .iter()
                .filter(|&&m| matches!(c.symbol(m).kind, SymbolKind::Net(_)))
                .count(),
            0
        );
    }

    #[test]
    fn test_body_params_consume_materialized_entries() {
        let mut module = build::module(
            "m",
            Some(vec![build::value_param("W", Some(build::int(4)), false)]),
        );
        module.members.push(MemberSyntax::Parameter(build::value_param(
            "DOUBLE",
            Some(build::binary(
                crate::syntax::BinaryOp::Multiply,
                build::name_expr("W"),
                build::int(2),
            )),
            true,
        )));
        // A variable after the parameters, to prove ordering survives.
        module.members.push(MemberSyntax::Variable(VariableDeclSyntax {
            ty: build::int_ty(),
            declarators: vec![DeclaratorSyntax {
                name: Ident::new("v", Span::default()),
                dims: vec![],
                init: None,
            }],
            span: Span::default(),
        }));

        let mut c = setup(vec![module]);
        let created = instantiate(
            &mut c,
            "m",
            Some(ordered(vec![build::int(16)])),
            vec![build::instance("u", vec![])],
        );
        let inst = created[0];
        assert_eq!(param_value_of(&mut c, inst, "W").as_integer(), Some(16));
        // The body localparam saw the overridden W.
        assert_eq!(param_value_of(&mut c, inst, "DOUBLE").as_integer(), Some(32));
        assert!(c.find(inst, "v").is_some());
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_override_binds_at_instantiation_site() {
        // `m #(.A(X)) u()` inside `n` must see n's X, which is invisible
        // from m's own environment.
        let inner = build::module(
            "m",
            Some(vec![build::value_param("A", Some(build::int(0)), false)]),
        );
        let mut outer = build::module("n", None);
        outer.members.push(MemberSyntax::Parameter(build::value_param(
            "X",
            Some(build::int(5)),
            false,
        )));
        outer.members.push(MemberSyntax::Instantiation(build::instantiation(
            "m",
            Some(named(vec![("A", Some(build::name_expr("X")))])),
            vec![build::instance("u", vec![])],
        )));

        let mut c = setup(vec![inner, outer]);
        let top = c.instantiate_top("n").unwrap();
        let u = c.find(top, "u").expect("inner instance");
        assert_eq!(param_value_of(&mut c, u, "A").as_integer(), Some(5));
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
    }

    #[test]
    fn test_instance_parameters_in_declaration_order() {
        let module = build::module(
            "m",
            Some(vec![
                build::value_param("A", Some(build::int(1)), false),
                build::value_param("B", Some(build::int(2)), false),
                build::value_param("C", Some(build::int(3)), false),
            ]),
        );
        let mut c = setup(vec![module]);
        let created = instantiate(&mut c, "m", None, vec![build::instance("u", vec![])]);
        let params = instance_params(&c, created[0]);
        assert_eq!(params.len(), 3);
        let names: Vec<String> = params
            .iter()
            .map(|&p| c.interner.resolve(c.symbol(p).name).to_string())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
