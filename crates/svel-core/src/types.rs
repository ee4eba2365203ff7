//! The data-type system: storage, construction from syntax, canonicalization
//! and compatibility queries.
//!
//! Types are table entries addressed by [`TypeId`]. Built-in types occupy
//! fixed slots so they compare reference-equal everywhere. Every type lazily
//! computes a canonical representative; two types are equivalent exactly when
//! their canonical ids are equal. Canonical forms of structural types
//! (vectors, arrays) are interned so equivalence survives independent
//! construction; enums and structs are nominal and canonicalize to
//! themselves.

use crate::context::Compilation;
use crate::diag::DiagCode;
use crate::ids::{SymbolId, TypeId};
use crate::index_vec::IndexVec;
use crate::interner::Name;
use crate::source::Span;
use crate::symbol::{EnumValueData, LookupLocation, Symbol, SymbolKind};
use crate::syntax::{
    DataTypeSyntax, DimensionSyntax, FloatKindSyntax, PredefIntKindSyntax, ScalarKindSyntax,
};
use crate::value::{ConstantRange, ConstantValue, IntegerValue};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bit,
    Logic,
    Reg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefIntKind {
    ShortInt,
    Int,
    LongInt,
    Byte,
    Integer,
    Time,
}

impl PredefIntKind {
    pub fn bit_width(self) -> u32 {
        match self {
            PredefIntKind::ShortInt => 16,
            PredefIntKind::Int => 32,
            PredefIntKind::LongInt => 64,
            PredefIntKind::Byte => 8,
            PredefIntKind::Integer => 32,
            PredefIntKind::Time => 64,
        }
    }

    pub fn default_signed(self) -> bool {
        !matches!(self, PredefIntKind::Time)
    }

    pub fn is_four_state(self) -> bool {
        matches!(self, PredefIntKind::Integer | PredefIntKind::Time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    Real,
    ShortReal,
    RealTime,
}

/// A named member of a struct or union type.
#[derive(Debug, Clone)]
pub struct FieldMember {
    pub name: Name,
    pub ty: TypeId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Error,
    Void,
    NullType,
    CHandle,
    Str,
    Event,
    Scalar { kind: ScalarKind, signed: bool },
    PredefInt { kind: PredefIntKind, signed: bool },
    Floating(FloatKind),
    PackedArray { elem: TypeId, range: ConstantRange },
    PackedStruct { width: u32, signed: bool, four_state: bool, members: Vec<FieldMember> },
    PackedUnion { width: u32, signed: bool, four_state: bool, members: Vec<FieldMember> },
    UnpackedArray { elem: TypeId, range: ConstantRange },
    UnpackedStruct { members: Vec<FieldMember> },
    UnpackedUnion { members: Vec<FieldMember> },
    Enum { base: TypeId, values: Vec<SymbolId> },
    /// A named indirection introduced by typedef or a type parameter.
    Alias { target: TypeId },
}

/// One type table entry.
#[derive(Debug, Clone)]
pub struct TypeData {
    pub kind: TypeKind,
    /// Declared name; `Name::EMPTY` for anonymous types.
    pub name: Name,
    pub span: Span,
    /// Memoized canonical representative; `None` until computed,
    /// self-referential for primitives.
    pub canonical: Option<TypeId>,
}

/// Structural key used to intern canonical forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CanonKey {
    Scalar(ScalarKind, bool),
    PredefInt(PredefIntKind, bool),
    Floating(FloatKind),
    PackedArray(TypeId, i32, i32),
    UnpackedArray(TypeId, i32, i32),
}

/// The type table.
pub struct Types {
    list: IndexVec<TypeId, TypeData>,
    canon_cache: HashMap<CanonKey, TypeId>,
}

macro_rules! builtin_ids {
    ($($name:ident = $index:expr;)*) => {
        impl Types {
            $(pub const $name: TypeId = TypeId($index);)*
        }
    };
}

builtin_ids! {
    ERROR = 0;
    VOID = 1;
    NULL = 2;
    CHANDLE = 3;
    STRING = 4;
    EVENT = 5;
    BIT = 6;
    LOGIC = 7;
    REG = 8;
    SHORT_INT = 9;
    INT = 10;
    LONG_INT = 11;
    BYTE = 12;
    INTEGER = 13;
    TIME = 14;
    REAL = 15;
    SHORT_REAL = 16;
    REAL_TIME = 17;
}

impl Types {
    pub fn new() -> Self {
        let mut types = Types { list: IndexVec::new(), canon_cache: HashMap::new() };
        let builtins = [
            (Types::ERROR, TypeKind::Error),
            (Types::VOID, TypeKind::Void),
            (Types::NULL, TypeKind::NullType),
            (Types::CHANDLE, TypeKind::CHandle),
            (Types::STRING, TypeKind::Str),
            (Types::EVENT, TypeKind::Event),
            (Types::BIT, TypeKind::Scalar { kind: ScalarKind::Bit, signed: false }),
            (Types::LOGIC, TypeKind::Scalar { kind: ScalarKind::Logic, signed: false }),
            (Types::REG, TypeKind::Scalar { kind: ScalarKind::Reg, signed: false }),
            (
                Types::SHORT_INT,
                TypeKind::PredefInt { kind: PredefIntKind::ShortInt, signed: true },
            ),
            (Types::INT, TypeKind::PredefInt { kind: PredefIntKind::Int, signed: true }),
            (
                Types::LONG_INT,
                TypeKind::PredefInt { kind: PredefIntKind::LongInt, signed: true },
            ),
            (Types::BYTE, TypeKind::PredefInt { kind: PredefIntKind::Byte, signed: true }),
            (
                Types::INTEGER,
                TypeKind::PredefInt { kind: PredefIntKind::Integer, signed: true },
            ),
            (Types::TIME, TypeKind::PredefInt { kind: PredefIntKind::Time, signed: false }),
            (Types::REAL, TypeKind::Floating(FloatKind::Real)),
            (Types::SHORT_REAL, TypeKind::Floating(FloatKind::ShortReal)),
            (Types::REAL_TIME, TypeKind::Floating(FloatKind::RealTime)),
        ];
        for (expected, kind) in builtins {
            let id = types.list.push(TypeData {
                kind,
                name: Name::EMPTY,
                span: Span::default(),
                canonical: Some(expected),
            });
            debug_assert_eq!(id, expected);
        }
        // Primitive canonical forms are pre-interned so later structural
        // canonicalization lands on the builtin slots.
        for index in 0..types.list.len() {
            let id = TypeId(index as u32);
            if let Some(key) = types.canon_key(id) {
                types.canon_cache.insert(key, id);
            }
        }
        types
    }

    pub fn add(&mut self, data: TypeData) -> TypeId {
        self.list.push(data)
    }

    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.list[id]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.list[id]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.list[id].kind
    }

    fn canon_key(&self, id: TypeId) -> Option<CanonKey> {
        match self.list[id].kind {
            TypeKind::Scalar { kind, signed } => Some(CanonKey::Scalar(kind, signed)),
            TypeKind::PredefInt { kind, signed } => Some(CanonKey::PredefInt(kind, signed)),
            TypeKind::Floating(kind) => Some(CanonKey::Floating(kind)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Property queries (follow aliases structurally, not via canonical, so
    // they stay usable before canonicalization runs)
    // ------------------------------------------------------------------

    fn unalias(&self, mut id: TypeId) -> TypeId {
        let mut hops = 0;
        while let TypeKind::Alias { target } = self.list[id].kind {
            id = target;
            hops += 1;
            if hops > self.list.len() {
                return Types::ERROR;
            }
        }
        id
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.list[self.unalias(id)].kind, TypeKind::Error)
    }

    pub fn is_integral(&self, id: TypeId) -> bool {
        matches!(
            self.list[self.unalias(id)].kind,
            TypeKind::Scalar { .. }
                | TypeKind::PredefInt { .. }
                | TypeKind::PackedArray { .. }
                | TypeKind::PackedStruct { .. }
                | TypeKind::PackedUnion { .. }
                | TypeKind::Enum { .. }
        )
    }

    pub fn is_floating(&self, id: TypeId) -> bool {
        matches!(self.list[self.unalias(id)].kind, TypeKind::Floating(_))
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        matches!(self.list[self.unalias(id)].kind, TypeKind::Str)
    }

    pub fn is_aggregate(&self, id: TypeId) -> bool {
        matches!(
            self.list[self.unalias(id)].kind,
            TypeKind::UnpackedArray { .. }
                | TypeKind::UnpackedStruct { .. }
                | TypeKind::UnpackedUnion { .. }
        )
    }

    /// Unpacked array whose element type is byte-sized integral; printable
    /// as a string without a format spec.
    pub fn is_byte_array(&self, id: TypeId) -> bool {
        match self.list[self.unalias(id)].kind {
            TypeKind::UnpackedArray { elem, .. } => {
                self.is_integral(elem) && self.bit_width(elem) == 8
            }
            _ => false,
        }
    }

    /// Total bit width of an integral type. Zero for non-integral types.
    pub fn bit_width(&self, id: TypeId) -> u32 {
        match &self.list[self.unalias(id)].kind {
            TypeKind::Scalar { .. } => 1,
            TypeKind::PredefInt { kind, .. } => kind.bit_width(),
            TypeKind::PackedArray { elem, range } => self.bit_width(*elem) * range.width(),
            TypeKind::PackedStruct { width, .. } | TypeKind::PackedUnion { width, .. } => *width,
            TypeKind::Enum { base, .. } => self.bit_width(*base),
            _ => 0,
        }
    }

    pub fn is_signed(&self, id: TypeId) -> bool {
        match &self.list[self.unalias(id)].kind {
            TypeKind::Scalar { signed, .. } => *signed,
            TypeKind::PredefInt { signed, .. } => *signed,
            TypeKind::PackedStruct { signed, .. } | TypeKind::PackedUnion { signed, .. } => *signed,
            TypeKind::PackedArray { elem, .. } => self.is_signed(*elem),
            TypeKind::Enum { base, .. } => self.is_signed(*base),
            _ => false,
        }
    }

    pub fn is_four_state(&self, id: TypeId) -> bool {
        match &self.list[self.unalias(id)].kind {
            TypeKind::Scalar { kind, .. } => !matches!(kind, ScalarKind::Bit),
            TypeKind::PredefInt { kind, .. } => kind.is_four_state(),
            TypeKind::PackedArray { elem, .. } => self.is_four_state(*elem),
            TypeKind::PackedStruct { four_state, .. }
            | TypeKind::PackedUnion { four_state, .. } => *four_state,
            TypeKind::Enum { base, .. } => self.is_four_state(*base),
            _ => false,
        }
    }

    /// The default (uninitialized) value for a type.
    pub fn default_value(&self, id: TypeId) -> ConstantValue {
        match &self.list[self.unalias(id)].kind {
            TypeKind::Error | TypeKind::Void => ConstantValue::Error,
            TypeKind::NullType | TypeKind::CHandle => ConstantValue::Null,
            TypeKind::Str => ConstantValue::Str(String::new()),
            TypeKind::Floating(_) => ConstantValue::Real(0.0),
            kind if matches!(
                kind,
                TypeKind::Scalar { .. }
                    | TypeKind::PredefInt { .. }
                    | TypeKind::PackedArray { .. }
                    | TypeKind::PackedStruct { .. }
                    | TypeKind::PackedUnion { .. }
                    | TypeKind::Enum { .. }
            ) =>
            {
                let width = self.bit_width(id);
                if self.is_four_state(id) {
                    ConstantValue::Integer(IntegerValue::unknown(width, self.is_signed(id)))
                } else {
                    ConstantValue::integer(0, width, self.is_signed(id))
                }
            }
            _ => ConstantValue::Error,
        }
    }
}

impl Default for Types {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Compilation-level type operations
// ---------------------------------------------------------------------------

impl Compilation {
    /// The canonical representative of a type. Idempotent and memoized:
    /// `canonical(canonical(t)) == canonical(t)`.
    pub fn canonical(&mut self, id: TypeId) -> TypeId {
        if let Some(c) = self.types.get(id).canonical {
            return c;
        }

        let canon = match self.types.kind(id).clone() {
            TypeKind::Alias { target } => self.canonical(target),
            TypeKind::PackedArray { elem, range } => {
                let elem = self.canonical(elem);
                self.intern_canonical(
                    CanonKey::PackedArray(elem, range.left, range.right),
                    TypeKind::PackedArray { elem, range },
                )
            }
            TypeKind::UnpackedArray { elem, range } => {
                let elem = self.canonical(elem);
                self.intern_canonical(
                    CanonKey::UnpackedArray(elem, range.left, range.right),
                    TypeKind::UnpackedArray { elem, range },
                )
            }
            TypeKind::Scalar { .. } | TypeKind::PredefInt { .. } | TypeKind::Floating(_) => {
                match self.types.canon_key(id) {
                    Some(key) => match self.types.canon_cache.get(&key) {
                        Some(&c) => c,
                        None => {
                            self.types.canon_cache.insert(key, id);
                            id
                        }
                    },
                    None => id,
                }
            }
            // Structs, unions and enums are nominal.
            _ => id,
        };

        self.types.get_mut(id).canonical = Some(canon);
        if self.types.get(canon).canonical.is_none() {
            self.types.get_mut(canon).canonical = Some(canon);
        }
        canon
    }

    fn intern_canonical(&mut self, key: CanonKey, kind: TypeKind) -> TypeId {
        if let Some(&existing) = self.types.canon_cache.get(&key) {
            return existing;
        }
        let id = self.types.add(TypeData {
            kind,
            name: Name::EMPTY,
            span: Span::default(),
            canonical: None,
        });
        self.types.get_mut(id).canonical = Some(id);
        self.types.canon_cache.insert(key, id);
        id
    }

    /// Type equivalence: identical canonical representatives.
    pub fn types_equivalent(&mut self, a: TypeId, b: TypeId) -> bool {
        self.canonical(a) == self.canonical(b)
    }

    /// Assignment compatibility under SystemVerilog rules: integral and
    /// floating sources coerce into integral and floating destinations;
    /// unpacked aggregates match structurally; the error type is compatible
    /// with everything so diagnostics don't cascade.
    pub fn assignment_compatible(&mut self, dest: TypeId, src: TypeId) -> bool {
        let dest = self.canonical(dest);
        let src = self.canonical(src);
        if dest == src {
            return true;
        }
        let t = &self.types;
        if t.is_error(dest) || t.is_error(src) {
            return true;
        }
        let dest_numeric = t.is_integral(dest) || t.is_floating(dest);
        let src_numeric = t.is_integral(src) || t.is_floating(src);
        if dest_numeric && src_numeric {
            return true;
        }
        // Strings accept integral bit patterns.
        if t.is_string(dest) && t.is_integral(src) {
            return true;
        }
        if matches!(t.kind(dest), TypeKind::CHandle)
            && matches!(t.kind(src), TypeKind::NullType)
        {
            return true;
        }
        match (t.kind(dest).clone(), t.kind(src).clone()) {
            (
                TypeKind::UnpackedArray { elem: de, range: dr },
                TypeKind::UnpackedArray { elem: se, range: sr },
            ) => dr.width() == sr.width() && self.assignment_compatible(de, se),
            (
                TypeKind::UnpackedStruct { members: dm },
                TypeKind::UnpackedStruct { members: sm },
            )
            | (TypeKind::UnpackedUnion { members: dm }, TypeKind::UnpackedUnion { members: sm }) => {
                dm.len() == sm.len()
                    && dm.iter().zip(sm.iter()).all(|(d, s)| self.assignment_compatible(d.ty, s.ty))
            }
            _ => false,
        }
    }

    /// Build (or reuse) a [`TypeId`] from data-type syntax, resolving names
    /// against `scope` at `location`.
    pub fn get_type(
        &mut self,
        syntax: &DataTypeSyntax,
        location: LookupLocation,
        scope: SymbolId,
    ) -> TypeId {
        match syntax {
            DataTypeSyntax::Scalar { kind, signed, dims, span } => {
                let base = self.scalar_type(*kind, *signed);
                self.wrap_packed_dims(base, dims, location, scope, *span)
            }
            DataTypeSyntax::PredefinedInt { kind, signed, span: _ } => {
                self.predefined_int_type(*kind, *signed)
            }
            DataTypeSyntax::Floating { kind, .. } => match kind {
                FloatKindSyntax::Real => Types::REAL,
                FloatKindSyntax::ShortReal => Types::SHORT_REAL,
                FloatKindSyntax::RealTime => Types::REAL_TIME,
            },
            DataTypeSyntax::Str { .. } => Types::STRING,
            DataTypeSyntax::CHandle { .. } => Types::CHANDLE,
            DataTypeSyntax::EventType { .. } => Types::EVENT,
            DataTypeSyntax::Void { .. } => Types::VOID,
            DataTypeSyntax::Implicit { signed, dims, span } => {
                let base = self.scalar_type(ScalarKindSyntax::Logic, *signed);
                self.wrap_packed_dims(base, dims, location, scope, *span)
            }
            DataTypeSyntax::Named { name, dims, span } => {
                let target = self.named_type(name, location, scope);
                self.wrap_packed_dims(target, dims, location, scope, *span)
            }
            DataTypeSyntax::Enum { base, members, span } => {
                self.enum_from_syntax(base.as_deref(), members, *span, location, scope)
            }
            DataTypeSyntax::StructUnion { is_union, packed, signed, members, span } => {
                self.struct_from_syntax(*is_union, *packed, *signed, members, *span, location, scope)
            }
        }
    }

    fn scalar_type(&mut self, kind: ScalarKindSyntax, signed: bool) -> TypeId {
        let kind = match kind {
            ScalarKindSyntax::Bit => ScalarKind::Bit,
            ScalarKindSyntax::Logic => ScalarKind::Logic,
            ScalarKindSyntax::Reg => ScalarKind::Reg,
        };
        if !signed {
            return match kind {
                ScalarKind::Bit => Types::BIT,
                ScalarKind::Logic => Types::LOGIC,
                ScalarKind::Reg => Types::REG,
            };
        }
        self.add_anon_type(TypeKind::Scalar { kind, signed: true })
    }

    fn predefined_int_type(&mut self, kind: PredefIntKindSyntax, signed: Option<bool>) -> TypeId {
        let kind = match kind {
            PredefIntKindSyntax::ShortInt => PredefIntKind::ShortInt,
            PredefIntKindSyntax::Int => PredefIntKind::Int,
            PredefIntKindSyntax::LongInt => PredefIntKind::LongInt,
            PredefIntKindSyntax::Byte => PredefIntKind::Byte,
            PredefIntKindSyntax::Integer => PredefIntKind::Integer,
            PredefIntKindSyntax::Time => PredefIntKind::Time,
        };
        let signed = signed.unwrap_or_else(|| kind.default_signed());
        if signed == kind.default_signed() {
            return match kind {
                PredefIntKind::ShortInt => Types::SHORT_INT,
                PredefIntKind::Int => Types::INT,
                PredefIntKind::LongInt => Types::LONG_INT,
                PredefIntKind::Byte => Types::BYTE,
                PredefIntKind::Integer => Types::INTEGER,
                PredefIntKind::Time => Types::TIME,
            };
        }
        self.add_anon_type(TypeKind::PredefInt { kind, signed })
    }

    fn named_type(
        &mut self,
        name: &crate::syntax::Ident,
        location: LookupLocation,
        scope: SymbolId,
    ) -> TypeId {
        let symbol = self.lookup_name(&name.name, location, scope, name.span);
        match &self.symbol(symbol).kind {
            SymbolKind::ErrorSymbol => Types::ERROR,
            SymbolKind::TypeAlias(data) => data.ty,
            SymbolKind::TypeParameter(_) => {
                let param = symbol;
                self.type_parameter_type(param)
            }
            _ => {
                self.add_diag(DiagCode::NotAType, name.span).arg(&name.name);
                Types::ERROR
            }
        }
    }

    fn wrap_packed_dims(
        &mut self,
        mut ty: TypeId,
        dims: &[DimensionSyntax],
        location: LookupLocation,
        scope: SymbolId,
        span: Span,
    ) -> TypeId {
        if dims.is_empty() {
            return ty;
        }
        if !self.types.is_integral(ty) && !self.types.is_error(ty) {
            self.add_diag(DiagCode::PackedMemberNotIntegral, span);
            return Types::ERROR;
        }
        // Rightmost dimension binds tightest.
        for dim in dims.iter().rev() {
            match self.eval_dimension(dim, location, scope) {
                Some(range) => {
                    ty = self.add_anon_type(TypeKind::PackedArray { elem: ty, range });
                }
                None => return Types::ERROR,
            }
        }
        ty
    }

    /// Evaluate a `[left:right]` dimension as a constant range. Failure emits
    /// `DimensionRequiresConstRange` and yields `None`.
    pub fn eval_dimension(
        &mut self,
        dim: &DimensionSyntax,
        location: LookupLocation,
        scope: SymbolId,
    ) -> Option<ConstantRange> {
        let left = self.eval_constant_int(&dim.left, location, scope);
        let right = self.eval_constant_int(&dim.right, location, scope);
        match (left, right) {
            (Some(left), Some(right)) => {
                let (Ok(left), Ok(right)) = (i32::try_from(left), i32::try_from(right)) else {
                    self.add_diag(DiagCode::DimensionRequiresConstRange, dim.span);
                    return None;
                };
                Some(ConstantRange::new(left, right))
            }
            _ => {
                self.add_diag(DiagCode::DimensionRequiresConstRange, dim.span);
                None
            }
        }
    }

    fn enum_from_syntax(
        &mut self,
        base: Option<&DataTypeSyntax>,
        members: &[crate::syntax::EnumMemberSyntax],
        span: Span,
        location: LookupLocation,
        scope: SymbolId,
    ) -> TypeId {
        let base_ty = match base {
            Some(b) => self.get_type(b, location, scope),
            None => Types::INT,
        };
        if !self.types.is_integral(base_ty) {
            self.add_diag(DiagCode::InvalidEnumBase, span);
            return Types::ERROR;
        }

        let width = self.types.bit_width(base_ty);
        let signed = self.types.is_signed(base_ty);
        let enum_ty = self.add_anon_type(TypeKind::Enum { base: base_ty, values: Vec::new() });

        let mut values = Vec::with_capacity(members.len());
        let mut seen = HashMap::new();
        let mut prev: Option<i64> = None;
        for member in members {
            // Default is previous value plus one, starting at zero.
            let value = match &member.init {
                Some(init) => match self.eval_constant_int(init, location, scope) {
                    Some(v) => v,
                    None => {
                        self.add_diag(DiagCode::EnumValueNotIntegral, init.span());
                        prev.map_or(0, |p| p + 1)
                    }
                },
                None => prev.map_or(0, |p| p + 1),
            };
            prev = Some(value);

            if let Some(&first_span) = seen.get(&value) {
                self.add_diag(DiagCode::DuplicateEnumValue, member.name.span)
                    .arg(&member.name.name)
                    .note(DiagCode::NoteDeclarationHere, first_span);
            } else {
                seen.insert(value, member.name.span);
            }

            let name = self.intern(&member.name.name);
            let symbol = self.alloc_symbol(Symbol::new(
                SymbolKind::EnumValue(EnumValueData {
                    ty: enum_ty,
                    value: ConstantValue::integer(value, width, signed),
                }),
                name,
                member.name.span,
            ));
            // Enum values are visible in the enclosing scope.
            self.add_member(scope, symbol);
            values.push(symbol);
        }

        match &mut self.types.get_mut(enum_ty).kind {
            TypeKind::Enum { values: slot, .. } => *slot = values,
            _ => unreachable!("enum type slot changed kind"),
        }
        enum_ty
    }

    #[allow(clippy::too_many_arguments)]
    fn struct_from_syntax(
        &mut self,
        is_union: bool,
        packed: bool,
        signed: bool,
        members: &[crate::syntax::StructMemberSyntax],
        _span: Span,
        location: LookupLocation,
        scope: SymbolId,
    ) -> TypeId {
        let mut fields = Vec::with_capacity(members.len());
        let mut width = 0u32;
        let mut four_state = false;
        for member in members {
            let ty = self.get_type(&member.ty, location, scope);
            if packed {
                if !self.types.is_integral(ty) {
                    self.add_diag(DiagCode::PackedMemberNotIntegral, member.name.span)
                        .arg(&member.name.name);
                    return Types::ERROR;
                }
                let member_width = self.types.bit_width(ty);
                if is_union {
                    width = width.max(member_width);
                } else {
                    width += member_width;
                }
                four_state |= self.types.is_four_state(ty);
            }
            let name = self.intern(&member.name.name);
            fields.push(FieldMember { name, ty, span: member.name.span });
        }

        let kind = match (packed, is_union) {
            (true, false) => TypeKind::PackedStruct { width, signed, four_state, members: fields },
            (true, true) => TypeKind::PackedUnion { width, signed, four_state, members: fields },
            (false, false) => TypeKind::UnpackedStruct { members: fields },
            (false, true) => TypeKind::UnpackedUnion { members: fields },
        };
        self.add_anon_type(kind)
    }

    pub(crate) fn add_anon_type(&mut self, kind: TypeKind) -> TypeId {
        self.types.add(TypeData { kind, name: Name::EMPTY, span: Span::default(), canonical: None })
    }

    /// Human-readable spelling of a type, for diagnostics and serialization.
    pub fn type_display(&self, id: TypeId) -> String {
        let data = self.types.get(id);
        if data.name != Name::EMPTY {
            return self.interner.resolve(data.name).to_string();
        }
        match &data.kind {
            TypeKind::Error => "<error>".to_string(),
            TypeKind::Void => "void".to_string(),
            TypeKind::NullType => "null".to_string(),
            TypeKind::CHandle => "chandle".to_string(),
            TypeKind::Str => "string".to_string(),
            TypeKind::Event => "event".to_string(),
            TypeKind::Scalar { kind, signed } => {
                let base = match kind {
                    ScalarKind::Bit => "bit",
                    ScalarKind::Logic => "logic",
                    ScalarKind::Reg => "reg",
                };
                if *signed {
                    format!("{} signed", base)
                } else {
                    base.to_string()
                }
            }
            TypeKind::PredefInt { kind, signed } => {
                let base = match kind {
                    PredefIntKind::ShortInt => "shortint",
                    PredefIntKind::Int => "int",
                    PredefIntKind::LongInt => "longint",
                    PredefIntKind::Byte => "byte",
                    PredefIntKind::Integer => "integer",
                    PredefIntKind::Time => "time",
                };
                if *signed != kind.default_signed() {
                    format!("{} {}", base, if *signed { "signed" } else { "unsigned" })
                } else {
                    base.to_string()
                }
            }
            TypeKind::Floating(kind) => match kind {
                FloatKind::Real => "real".to_string(),
                FloatKind::ShortReal => "shortreal".to_string(),
                FloatKind::RealTime => "realtime".to_string(),
            },
            TypeKind::PackedArray { elem, range } => {
                format!("{}{}", self.type_display(*elem), range)
            }
            TypeKind::UnpackedArray { elem, range } => {
                format!("{}${}", self.type_display(*elem), range)
            }
            TypeKind::PackedStruct { width, .. } => format!("struct packed<{}>", width),
            TypeKind::PackedUnion { width, .. } => format!("union packed<{}>", width),
            TypeKind::UnpackedStruct { .. } => "struct".to_string(),
            TypeKind::UnpackedUnion { .. } => "union".to_string(),
            TypeKind::Enum { base, .. } => format!("enum<{}>", self.type_display(*base)),
            TypeKind::Alias { target } => self.type_display(*target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build;

    fn comp() -> Compilation {
        Compilation::new()
    }

    #[test]
    fn test_builtin_widths() {
        let c = comp();
        assert_eq!(c.types.bit_width(Types::BIT), 1);
        assert_eq!(c.types.bit_width(Types::INT), 32);
        assert_eq!(c.types.bit_width(Types::LONG_INT), 64);
        assert_eq!(c.types.bit_width(Types::BYTE), 8);
        assert!(c.types.is_signed(Types::INT));
        assert!(!c.types.is_signed(Types::TIME));
        assert!(c.types.is_four_state(Types::LOGIC));
        assert!(!c.types.is_four_state(Types::BIT));
        assert!(c.types.is_four_state(Types::INTEGER));
    }

    #[test]
    fn test_packed_array_from_syntax() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::Scalar {
            kind: ScalarKindSyntax::Logic,
            signed: false,
            dims: vec![build::dim(7, 0)],
            span: Span::default(),
        };
        let ty = c.get_type(&syntax, LookupLocation::max(), root);
        assert_eq!(c.types.bit_width(ty), 8);
        assert!(c.types.is_four_state(ty));
        assert!(c.types.is_integral(ty));
        assert!(c.diags.is_empty());
    }

    #[test]
    fn test_canonical_idempotent() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::Scalar {
            kind: ScalarKindSyntax::Bit,
            signed: false,
            dims: vec![build::dim(3, 0)],
            span: Span::default(),
        };
        let ty = c.get_type(&syntax, LookupLocation::max(), root);
        let c1 = c.canonical(ty);
        let c2 = c.canonical(c1);
        assert_eq!(c1, c2);
        assert_eq!(c.canonical(c2), c2);
    }

    #[test]
    fn test_equivalence_of_independent_vectors() {
        let mut c = comp();
        let root = c.root();
        let make = |c: &mut Compilation| {
            let syntax = DataTypeSyntax::Scalar {
                kind: ScalarKindSyntax::Logic,
                signed: false,
                dims: vec![build::dim(7, 0)],
                span: Span::default(),
            };
            c.get_type(&syntax, LookupLocation::max(), root)
        };
        let a = make(&mut c);
        let b = make(&mut c);
        assert_ne!(a, b);
        assert!(c.types_equivalent(a, b));

        let other = DataTypeSyntax::Scalar {
            kind: ScalarKindSyntax::Logic,
            signed: false,
            dims: vec![build::dim(3, 0)],
            span: Span::default(),
        };
        let narrower = c.get_type(&other, LookupLocation::max(), root);
        assert!(!c.types_equivalent(a, narrower));
    }

    #[test]
    fn test_packed_struct_width() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::StructUnion {
            is_union: false,
            packed: true,
            signed: false,
            members: vec![
                crate::syntax::StructMemberSyntax { ty: build::logic_ty(), name: build::ident("a") },
                crate::syntax::StructMemberSyntax {
                    ty: DataTypeSyntax::Scalar {
                        kind: ScalarKindSyntax::Bit,
                        signed: false,
                        dims: vec![build::dim(3, 0)],
                        span: Span::default(),
                    },
                    name: build::ident("b"),
                },
            ],
            span: Span::default(),
        };
        let ty = c.get_type(&syntax, LookupLocation::max(), root);
        assert_eq!(c.types.bit_width(ty), 5);
        assert!(c.types.is_four_state(ty), "logic member makes the struct 4-state");
        assert!(c.diags.is_empty());
    }

    #[test]
    fn test_packed_struct_rejects_non_integral() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::StructUnion {
            is_union: false,
            packed: true,
            signed: false,
            members: vec![crate::syntax::StructMemberSyntax {
                ty: DataTypeSyntax::Floating { kind: FloatKindSyntax::Real, span: Span::default() },
                name: build::ident("r"),
            }],
            span: Span::default(),
        };
        let ty = c.get_type(&syntax, LookupLocation::max(), root);
        assert!(c.types.is_error(ty));
        assert_eq!(c.diags.last().unwrap().code, DiagCode::PackedMemberNotIntegral);
    }

    #[test]
    fn test_packed_union_width_is_max() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::StructUnion {
            is_union: true,
            packed: true,
            signed: false,
            members: vec![
                crate::syntax::StructMemberSyntax {
                    ty: DataTypeSyntax::Scalar {
                        kind: ScalarKindSyntax::Bit,
                        signed: false,
                        dims: vec![build::dim(15, 0)],
                        span: Span::default(),
                    },
                    name: build::ident("wide"),
                },
                crate::syntax::StructMemberSyntax { ty: build::logic_ty(), name: build::ident("narrow") },
            ],
            span: Span::default(),
        };
        let ty = c.get_type(&syntax, LookupLocation::max(), root);
        assert_eq!(c.types.bit_width(ty), 16);
    }

    #[test]
    fn test_enum_values() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::Enum {
            base: None,
            members: vec![
                crate::syntax::EnumMemberSyntax { name: build::ident("A"), init: None },
                crate::syntax::EnumMemberSyntax { name: build::ident("B"), init: Some(build::int(5)) },
                crate::syntax::EnumMemberSyntax { name: build::ident("C"), init: None },
            ],
            span: Span::default(),
        };
        let ty = c.get_type(&syntax, LookupLocation::max(), root);
        assert!(c.diags.is_empty(), "{:?}", c.diags.codes());
        assert_eq!(c.types.bit_width(ty), 32);

        // Values land in the enclosing scope with prev+1 defaults.
        let b = c.find(root, "B").unwrap();
        let c_sym = c.find(root, "C").unwrap();
        let get = |comp: &Compilation, id| match &comp.symbol(id).kind {
            SymbolKind::EnumValue(data) => data.value.as_integer().unwrap(),
            _ => panic!("not an enum value"),
        };
        assert_eq!(get(&c, b), 5);
        assert_eq!(get(&c, c_sym), 6);
    }

    #[test]
    fn test_enum_duplicate_value() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::Enum {
            base: None,
            members: vec![
                crate::syntax::EnumMemberSyntax { name: build::ident("A"), init: Some(build::int(1)) },
                crate::syntax::EnumMemberSyntax { name: build::ident("B"), init: Some(build::int(1)) },
            ],
            span: Span::default(),
        };
        c.get_type(&syntax, LookupLocation::max(), root);
        assert!(c.diags.codes().contains(&DiagCode::DuplicateEnumValue));
    }

    #[test]
    fn test_enum_base_must_be_integral() {
        let mut c = comp();
        let root = c.root();
        let syntax = DataTypeSyntax::Enum {
            base: Some(Box::new(DataTypeSyntax::Floating {
                kind: FloatKindSyntax::Real,
                span: Span::default(),
            })),
            members: vec![crate::syntax::EnumMemberSyntax { name: build::ident("A"), init: None }],
            span: Span::default(),
        };
        let ty = c.get_type(&syntax, LookupLocation::max(), root);
        assert!(c.types.is_error(ty));
        assert_eq!(c.diags.last().unwrap().code, DiagCode::InvalidEnumBase);
    }

    #[test]
    fn test_assignment_compatibility() {
        let mut c = comp();
        assert!(c.assignment_compatible(Types::INT, Types::BYTE));
        assert!(c.assignment_compatible(Types::INT, Types::REAL));
        assert!(c.assignment_compatible(Types::REAL, Types::INT));
        assert!(c.assignment_compatible(Types::STRING, Types::INT));
        assert!(!c.assignment_compatible(Types::STRING, Types::REAL));
        assert!(c.assignment_compatible(Types::CHANDLE, Types::NULL));
        assert!(c.assignment_compatible(Types::ERROR, Types::STRING));
        assert!(!c.assignment_compatible(Types::EVENT, Types::INT));
    }

    #[test]
    fn test_default_values() {
        let c = comp();
        assert_eq!(
            c.types.default_value(Types::BIT),
            ConstantValue::integer(0, 1, false)
        );
        match c.types.default_value(Types::LOGIC) {
            ConstantValue::Integer(iv) => assert!(iv.has_unknown),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.types.default_value(Types::STRING), ConstantValue::Str(String::new()));
        assert_eq!(c.types.default_value(Types::CHANDLE), ConstantValue::Null);
    }
}
