//! JSON serialization of the elaborated symbol graph.
//!
//! A visitor walks the graph top-down. Every symbol object carries `name`,
//! `kind` and `source_range`; scope members are embedded, while
//! cross-symbol references go through [`SymbolSerializer::write_link`] so
//! the output stays a tree.

use crate::context::Compilation;
use crate::ids::SymbolId;
use crate::symbol::{PortDirection, SymbolKind};
use serde_json::{json, Map, Value};

pub struct SymbolSerializer<'a> {
    comp: &'a mut Compilation,
}

impl<'a> SymbolSerializer<'a> {
    pub fn new(comp: &'a mut Compilation) -> Self {
        Self { comp }
    }

    /// Serialize the whole compilation, rooted at the root scope.
    pub fn serialize_root(&mut self) -> Value {
        let root = self.comp.root();
        self.serialize(root)
    }

    /// An opaque identifier for a cross-symbol reference.
    pub fn write_link(&self, symbol: SymbolId) -> Value {
        let sym = self.comp.symbol(symbol);
        Value::String(format!("{}@{}", sym.kind.describe(), symbol.0))
    }

    /// Serialize one symbol (and, for scopes, its members).
    pub fn serialize(&mut self, symbol: SymbolId) -> Value {
        let mut obj = Map::new();
        {
            let sym = self.comp.symbol(symbol);
            let name = self.comp.interner.resolve(sym.name).to_string();
            obj.insert("name".into(), Value::String(name));
            obj.insert("kind".into(), Value::String(sym.kind.describe().into()));
            obj.insert("source_range".into(), json!(sym.span));
        }

        self.write_kind_fields(symbol, &mut obj);

        if self.comp.symbol(symbol).is_scope() {
            let members = self.comp.members(symbol);
            let serialized: Vec<Value> = members.into_iter().map(|m| self.serialize(m)).collect();
            obj.insert("members".into(), Value::Array(serialized));
        }

        Value::Object(obj)
    }

    fn write_kind_fields(&mut self, symbol: SymbolId, obj: &mut Map<String, Value>) {
        match &self.comp.symbol(symbol).kind {
            SymbolKind::Definition(data) => {
                let kind = match data.definition_kind {
                    crate::symbol::DefinitionKind::Module => "module",
                    crate::symbol::DefinitionKind::Interface => "interface",
                    crate::symbol::DefinitionKind::Program => "program",
                };
                obj.insert("definition_kind".into(), Value::String(kind.into()));
            }
            SymbolKind::Instance(data) => {
                let definition = data.definition;
                let depth = data.depth;
                let path = data.array_path.clone();
                obj.insert("definition".into(), self.write_link(definition));
                obj.insert("depth".into(), json!(depth));
                if !path.is_empty() {
                    obj.insert("array_path".into(), json!(path));
                }
            }
            SymbolKind::InstanceArray(data) => {
                obj.insert("range".into(), Value::String(data.range.to_string()));
            }
            SymbolKind::Parameter(data) => {
                let is_local = data.is_local;
                let is_port = data.is_port;
                let ty = data.ty;
                let value = self.comp.parameter_value(symbol);
                obj.insert("is_local".into(), json!(is_local));
                obj.insert("is_port".into(), json!(is_port));
                let ty = if ty == crate::types::Types::ERROR {
                    // Resolution may have happened just now.
                    self.comp.parameter_ty(symbol)
                } else {
                    ty
                };
                obj.insert("type".into(), Value::String(self.comp.type_display(ty)));
                obj.insert("value".into(), Value::String(value.to_string()));
            }
            SymbolKind::TypeParameter(data) => {
                let is_local = data.is_local;
                obj.insert("is_local".into(), json!(is_local));
                let ty = self.comp.type_parameter_type(symbol);
                obj.insert("target".into(), Value::String(self.comp.type_display(ty)));
            }
            SymbolKind::Variable(data) => {
                obj.insert("type".into(), Value::String(self.comp.type_display(data.ty)));
            }
            SymbolKind::Net(data) => {
                let ty = data.ty;
                let net_kind = format!("{:?}", self.comp.net_types.get(data.net_type).kind);
                obj.insert("type".into(), Value::String(self.comp.type_display(ty)));
                obj.insert("net_kind".into(), Value::String(net_kind.to_lowercase()));
            }
            SymbolKind::Port(data) => {
                let direction = match data.direction {
                    PortDirection::Input => "input",
                    PortDirection::Output => "output",
                    PortDirection::InOut => "inout",
                    PortDirection::Ref => "ref",
                };
                let ty = data.ty;
                obj.insert("direction".into(), Value::String(direction.into()));
                obj.insert("type".into(), Value::String(self.comp.type_display(ty)));
            }
            SymbolKind::Subroutine(data) => {
                let kind = match data.kind {
                    crate::symbol::SubroutineKind::Task => "task",
                    crate::symbol::SubroutineKind::Function => "function",
                };
                let ret = data.return_type;
                obj.insert("subroutine_kind".into(), Value::String(kind.into()));
                obj.insert("return_type".into(), Value::String(self.comp.type_display(ret)));
            }
            SymbolKind::EnumValue(data) => {
                obj.insert("value".into(), Value::String(data.value.to_string()));
            }
            SymbolKind::TypeAlias(data) => {
                obj.insert("target".into(), Value::String(self.comp.type_display(data.ty)));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build;
    use crate::syntax::{CompilationUnitSyntax, TopSyntax};
    use std::rc::Rc;

    #[test]
    fn test_serialize_instance_tree() {
        let module = build::module(
            "m",
            Some(vec![build::value_param("W", Some(build::int(8)), false)]),
        );
        let mut c = Compilation::new();
        let unit = CompilationUnitSyntax {
            members: vec![TopSyntax::Module(Rc::new(module))],
        };
        c.elaborate(&unit, &["m"]).unwrap();

        let mut serializer = SymbolSerializer::new(&mut c);
        let value = serializer.serialize_root();

        let members = value["members"].as_array().unwrap();
        // The definition and the top instance.
        let kinds: Vec<&str> =
            members.iter().map(|m| m["kind"].as_str().unwrap()).collect();
        assert!(kinds.contains(&"definition"));
        assert!(kinds.contains(&"module-instance"));

        let instance =
            members.iter().find(|m| m["kind"] == "module-instance").unwrap();
        assert_eq!(instance["name"], "m");
        assert_eq!(instance["depth"], 0);
        // Cross-symbol references are links, not embedded objects.
        let link = instance["definition"].as_str().unwrap();
        assert!(link.starts_with("definition@"), "bad link {}", link);

        let params = instance["members"].as_array().unwrap();
        let w = params.iter().find(|m| m["name"] == "W").unwrap();
        assert_eq!(w["kind"], "parameter");
        assert_eq!(w["value"], "8");
        assert_eq!(w["type"], "int");
    }

    #[test]
    fn test_serialize_has_required_fields_everywhere() {
        let module = build::module("m", None);
        let mut c = Compilation::new();
        let unit = CompilationUnitSyntax {
            members: vec![TopSyntax::Module(Rc::new(module))],
        };
        c.elaborate(&unit, &["m"]).unwrap();

        let mut serializer = SymbolSerializer::new(&mut c);
        let value = serializer.serialize_root();

        fn check(value: &Value) {
            assert!(value.get("name").is_some());
            assert!(value.get("kind").is_some());
            assert!(value.get("source_range").is_some());
            if let Some(members) = value.get("members").and_then(Value::as_array) {
                for member in members {
                    check(member);
                }
            }
        }
        check(&value);
    }
}
