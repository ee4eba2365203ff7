//! Identifiers for arena-allocated entities.
//!
//! Symbols, data types and net types each live in their own table inside the
//! [`Compilation`](crate::context::Compilation); these handles are the only
//! way entities reference each other, which is what lets the graph be cyclic
//! without cyclic ownership.

use serde::Serialize;
use std::fmt;

/// Identifier of a symbol in the compilation's symbol table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0)
    }
}

/// Identifier of a data type in the compilation's type table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Identifier of a net type in the compilation's net-type table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct NetTypeId(pub u32);

impl fmt::Display for NetTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

crate::index_vec::impl_idx!(SymbolId, TypeId, NetTypeId);
