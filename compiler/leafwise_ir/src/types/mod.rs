//! Type pool for the leafwise IR.
//!
//! Every type is interned once and referenced by a 32-bit [`TypeId`].
//! Nominal types (structs and enums) carry their stored members in
//! declaration order; generic instantiations ([`TypeKind::Applied`]) have
//! their member types substituted eagerly when they are interned, so every
//! query on the pool is a read-only `&self` lookup.
//!
//! The analysis never looks at a [`TypeKind`] directly. It asks for a
//! [`TypeShape`] under an [`ExpansionContext`], which is the whole type
//! decomposition interface: leaf, tuple elements, struct stored fields
//! (plus a deinit flag), or enum case payloads.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

// ── TypeId ──────────────────────────────────────────────────────────

/// A 32-bit index into the [`TypePool`].
///
/// Primitive types have fixed indices so they can be named without a pool.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// The `int` type.
    pub const INT: Self = Self(0);
    /// The `float` type.
    pub const FLOAT: Self = Self(1);
    /// The `bool` type.
    pub const BOOL: Self = Self(2);
    /// The `str` type. Opaque to the analysis like every other primitive.
    pub const STR: Self = Self(3);

    /// Number of pre-interned primitive types.
    pub const PRIMITIVE_COUNT: u32 = 4;

    /// Sentinel value indicating no type.
    pub const NONE: Self = Self(u32::MAX);

    /// Create an id from a raw `u32`.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is one of the pre-interned primitives.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }
}

// ── Type kinds ──────────────────────────────────────────────────────

/// Builtin scalar types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Primitive {
    Int,
    Float,
    Bool,
    Str,
}

impl Primitive {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
        }
    }
}

/// A stored property of a struct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeId,
}

/// A struct declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructDef {
    pub name: String,
    /// Number of generic parameters. Field types refer to them via
    /// [`TypeKind::Param`].
    pub params: u32,
    /// Stored properties in declaration order.
    pub fields: Vec<FieldDef>,
    /// The struct has a value-destroying deinit.
    pub has_deinit: bool,
    /// Storage is not fully visible (foreign or resilient layout). Such a
    /// struct is never decomposed.
    pub unreferenceable_storage: bool,
}

/// An enum case. `payload` is `None` for cases without an associated value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaseDef {
    pub name: String,
    pub payload: Option<TypeId>,
}

/// An enum declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumDef {
    pub name: String,
    pub params: u32,
    pub cases: Vec<CaseDef>,
}

/// The structure of an interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    Primitive(Primitive),
    Tuple(Vec<TypeId>),
    Struct(StructDef),
    Enum(EnumDef),
    /// A generic nominal type applied to arguments.
    ///
    /// `members` holds the substituted stored-field types (struct base) or
    /// case payloads (enum base), in declaration order.
    Applied {
        base: TypeId,
        args: Vec<TypeId>,
        members: Vec<Option<TypeId>>,
    },
    /// Generic parameter `index` of the enclosing nominal declaration.
    Param(u32),
    /// Opaque result type. Only a maximal expansion sees `underlying`.
    Opaque {
        name: String,
        underlying: Option<TypeId>,
    },
}

/// How far types are expanded when they are decomposed.
///
/// One analysis must use one context throughout: leaf counts computed under
/// different contexts do not line up.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExpansionContext {
    /// Opaque types stay opaque and count as a single leaf.
    Minimal,
    /// Opaque types are replaced by their underlying type when known.
    #[default]
    Maximal,
}

/// One level of decomposition of a type, as seen by the analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeShape {
    /// Not decomposable: primitives, opaque storage, generic parameters.
    Leaf,
    /// Tuple element types in order.
    Tuple(SmallVec<[TypeId; 4]>),
    /// Stored field types in declaration order.
    Struct {
        fields: SmallVec<[TypeId; 4]>,
        has_deinit: bool,
    },
    /// One entry per case; `None` for cases without an associated value.
    Enum {
        payloads: SmallVec<[Option<TypeId>; 4]>,
    },
}

// ── Pool ────────────────────────────────────────────────────────────

/// Interning storage for every type in a module.
pub struct TypePool {
    kinds: Vec<TypeKind>,
    interned: FxHashMap<TypeKind, TypeId>,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// Create a pool with the primitives pre-interned at their fixed ids.
    pub fn new() -> Self {
        let mut pool = Self {
            kinds: Vec::new(),
            interned: FxHashMap::default(),
        };
        for prim in [
            Primitive::Int,
            Primitive::Float,
            Primitive::Bool,
            Primitive::Str,
        ] {
            pool.intern(TypeKind::Primitive(prim));
        }
        debug_assert_eq!(pool.kinds.len(), TypeId::PRIMITIVE_COUNT as usize);
        pool
    }

    /// Intern a type, returning the existing id if it is already present.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = TypeId(
            u32::try_from(self.kinds.len())
                .unwrap_or_else(|_| panic!("type count exceeds u32::MAX")),
        );
        self.kinds.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    /// Look up the structure of a type.
    ///
    /// # Panics
    ///
    /// Panics on [`TypeId::NONE`] or an id from another pool.
    #[inline]
    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        assert!(
            ty.index() < self.kinds.len(),
            "TypeId {} out of bounds (have {} types)",
            ty.raw(),
            self.kinds.len()
        );
        &self.kinds[ty.index()]
    }

    /// Number of interned types.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// The pool always holds the primitives, so this is `false` in practice.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    // === Construction ===

    /// Create a tuple type.
    pub fn tuple(&mut self, elements: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Tuple(elements))
    }

    /// Declare a struct type.
    pub fn struct_type(&mut self, def: StructDef) -> TypeId {
        self.intern(TypeKind::Struct(def))
    }

    /// Declare an enum type.
    pub fn enum_type(&mut self, def: EnumDef) -> TypeId {
        self.intern(TypeKind::Enum(def))
    }

    /// Generic parameter `index` of the declaration being built.
    pub fn param(&mut self, index: u32) -> TypeId {
        self.intern(TypeKind::Param(index))
    }

    /// Create an opaque type with an optional underlying type.
    pub fn opaque(&mut self, name: impl Into<String>, underlying: Option<TypeId>) -> TypeId {
        self.intern(TypeKind::Opaque {
            name: name.into(),
            underlying,
        })
    }

    /// Apply a generic struct or enum to arguments.
    ///
    /// Member types are substituted here, once.
    ///
    /// # Panics
    ///
    /// Panics if `base` is not a nominal type or the argument count does not
    /// match its parameter count.
    pub fn apply(&mut self, base: TypeId, args: Vec<TypeId>) -> TypeId {
        let (params, raw_members): (u32, Vec<Option<TypeId>>) = match self.kind(base) {
            TypeKind::Struct(def) => (def.params, def.fields.iter().map(|f| Some(f.ty)).collect()),
            TypeKind::Enum(def) => (def.params, def.cases.iter().map(|c| c.payload).collect()),
            other => panic!("cannot apply generic arguments to {other:?}"),
        };
        assert_eq!(
            params as usize,
            args.len(),
            "generic argument count mismatch for type {}",
            base.raw()
        );
        let members = raw_members
            .into_iter()
            .map(|member| member.map(|ty| self.substitute(ty, &args)))
            .collect();
        self.intern(TypeKind::Applied {
            base,
            args,
            members,
        })
    }

    /// Replace generic parameters in `ty` by `args`.
    fn substitute(&mut self, ty: TypeId, args: &[TypeId]) -> TypeId {
        match self.kind(ty).clone() {
            TypeKind::Param(index) => {
                let Some(&arg) = args.get(index as usize) else {
                    panic!("generic parameter {index} has no argument");
                };
                arg
            }
            TypeKind::Tuple(elements) => {
                let substituted = elements
                    .iter()
                    .map(|&elem| self.substitute(elem, args))
                    .collect::<Vec<_>>();
                if substituted == elements {
                    ty
                } else {
                    self.tuple(substituted)
                }
            }
            TypeKind::Applied {
                base, args: inner, ..
            } => {
                let substituted = inner
                    .iter()
                    .map(|&arg| self.substitute(arg, args))
                    .collect::<Vec<_>>();
                if substituted == inner {
                    ty
                } else {
                    self.apply(base, substituted)
                }
            }
            TypeKind::Opaque {
                name,
                underlying: Some(underlying),
            } => {
                let substituted = self.substitute(underlying, args);
                if substituted == underlying {
                    ty
                } else {
                    self.opaque(name, Some(substituted))
                }
            }
            TypeKind::Primitive(_)
            | TypeKind::Struct(_)
            | TypeKind::Enum(_)
            | TypeKind::Opaque { .. } => ty,
        }
    }

    // === Queries ===

    /// Strip opaque types the context is allowed to see through.
    pub fn lower(&self, mut ty: TypeId, ctx: ExpansionContext) -> TypeId {
        if ctx == ExpansionContext::Minimal {
            return ty;
        }
        while let TypeKind::Opaque {
            underlying: Some(underlying),
            ..
        } = self.kind(ty)
        {
            ty = *underlying;
        }
        ty
    }

    /// Decompose one level of `ty` under `ctx`.
    pub fn shape(&self, ty: TypeId, ctx: ExpansionContext) -> TypeShape {
        let ty = self.lower(ty, ctx);
        match self.kind(ty) {
            TypeKind::Primitive(_) | TypeKind::Param(_) | TypeKind::Opaque { .. } => {
                TypeShape::Leaf
            }
            TypeKind::Tuple(elements) => TypeShape::Tuple(elements.iter().copied().collect()),
            TypeKind::Struct(def) => Self::struct_shape(def, def.fields.iter().map(|f| f.ty)),
            TypeKind::Enum(def) => TypeShape::Enum {
                payloads: def.cases.iter().map(|c| c.payload).collect(),
            },
            TypeKind::Applied { base, members, .. } => match self.kind(*base) {
                TypeKind::Struct(def) => {
                    Self::struct_shape(def, members.iter().copied().flatten())
                }
                TypeKind::Enum(_) => TypeShape::Enum {
                    payloads: members.iter().copied().collect(),
                },
                _ => TypeShape::Leaf,
            },
        }
    }

    fn struct_shape(def: &StructDef, fields: impl Iterator<Item = TypeId>) -> TypeShape {
        // Only structs whose storage is fully visible can be decomposed.
        if def.unreferenceable_storage {
            return TypeShape::Leaf;
        }
        TypeShape::Struct {
            fields: fields.collect(),
            has_deinit: def.has_deinit,
        }
    }

    /// Type of stored field `field` of struct type `ty`.
    ///
    /// Returns `None` if `ty` is not a decomposable struct or has no such
    /// field.
    pub fn struct_field_type(&self, ty: TypeId, field: u32, ctx: ExpansionContext) -> Option<TypeId> {
        match self.shape(ty, ctx) {
            TypeShape::Struct { fields, .. } => fields.get(field as usize).copied(),
            _ => None,
        }
    }

    /// Type of element `index` of tuple type `ty`.
    pub fn tuple_element_type(&self, ty: TypeId, index: u32, ctx: ExpansionContext) -> Option<TypeId> {
        match self.shape(ty, ctx) {
            TypeShape::Tuple(elements) => elements.get(index as usize).copied(),
            _ => None,
        }
    }

    /// Payload type of case `case` of enum type `ty`.
    pub fn enum_payload_type(&self, ty: TypeId, case: u32, ctx: ExpansionContext) -> Option<TypeId> {
        match self.shape(ty, ctx) {
            TypeShape::Enum { payloads } => payloads.get(case as usize).copied().flatten(),
            _ => None,
        }
    }

    /// Render a type for dumps and log messages.
    pub fn display(&self, ty: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { pool: self, ty }
    }
}

/// Display adapter returned by [`TypePool::display`].
pub struct TypeDisplay<'pool> {
    pool: &'pool TypePool,
    ty: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ty == TypeId::NONE {
            return f.write_str("<none>");
        }
        match self.pool.kind(self.ty) {
            TypeKind::Primitive(prim) => f.write_str(prim.name()),
            TypeKind::Tuple(elements) => {
                f.write_str("(")?;
                for (i, &elem) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.pool.display(elem))?;
                }
                f.write_str(")")
            }
            TypeKind::Struct(StructDef { name, .. }) | TypeKind::Enum(EnumDef { name, .. }) => {
                f.write_str(name)
            }
            TypeKind::Applied { base, args, .. } => {
                write!(f, "{}<", self.pool.display(*base))?;
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.pool.display(arg))?;
                }
                f.write_str(">")
            }
            TypeKind::Param(index) => write!(f, "T{index}"),
            TypeKind::Opaque { name, .. } => write!(f, "some {name}"),
        }
    }
}

#[cfg(test)]
mod tests;
