//! Shared test utilities for the liveness passes.
//!
//! Factory functions for the handful of aggregate types and CFG shapes the
//! module tests build on. Only compiled in test builds.

use leafwise_ir::{
    BlockId, CaseDef, EnumDef, FieldDef, Function, InstId, InstKind, StructDef, TypeId, TypePool,
    ValueCategory, ValueId,
};

pub(crate) const OBJ: ValueCategory = ValueCategory::Object;
pub(crate) const ADDR: ValueCategory = ValueCategory::Address;

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

fn field(name: &str, ty: TypeId) -> FieldDef {
    FieldDef {
        name: name.to_owned(),
        ty,
    }
}

/// Build a non-generic struct with the given fields.
pub(crate) fn struct_of(pool: &mut TypePool, name: &str, fields: &[TypeId]) -> TypeId {
    let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
    pool.struct_type(StructDef {
        name: name.to_owned(),
        params: 0,
        fields: fields
            .iter()
            .zip(names.iter().cycle())
            .map(|(&ty, name)| field(name, ty))
            .collect(),
        has_deinit: false,
        unreferenceable_storage: false,
    })
}

/// `struct Pair { a: int, b: int }` (2 leaves).
pub(crate) fn pair(pool: &mut TypePool) -> TypeId {
    struct_of(pool, "Pair", &[TypeId::INT, TypeId::INT])
}

/// `struct Outer { p: Pair, c: str }` (3 leaves).
pub(crate) fn outer(pool: &mut TypePool) -> TypeId {
    let p = pair(pool);
    struct_of(pool, "Outer", &[p, TypeId::STR])
}

/// `enum E { small(int), big((int, int, int)) }` (4 leaves).
pub(crate) fn small_big_enum(pool: &mut TypePool) -> TypeId {
    let triple = pool.tuple(vec![TypeId::INT, TypeId::INT, TypeId::INT]);
    pool.enum_type(EnumDef {
        name: "E".to_owned(),
        params: 0,
        cases: vec![
            CaseDef {
                name: "small".to_owned(),
                payload: Some(TypeId::INT),
            },
            CaseDef {
                name: "big".to_owned(),
                payload: Some(triple),
            },
        ],
    })
}

/// Insert `kind` at the end of `block`, ahead of its terminator if it has one.
pub(crate) fn push(
    func: &mut Function,
    block: BlockId,
    kind: InstKind,
    results: &[(TypeId, ValueCategory)],
) -> InstId {
    match func.terminator(block) {
        Some(term) => func.insert_before(term, kind, results),
        None => func.append_inst(block, kind, results),
    }
}

/// Insert an opaque call `use(value)` with no results.
pub(crate) fn use_of(func: &mut Function, block: BlockId, value: ValueId) -> InstId {
    push(
        func,
        block,
        InstKind::Apply {
            callee: "use".to_owned(),
            args: vec![value],
        },
        &[],
    )
}

/// Insert an opaque call producing one object of type `ty`.
pub(crate) fn make(func: &mut Function, block: BlockId, ty: TypeId) -> (InstId, ValueId) {
    let inst = push(
        func,
        block,
        InstKind::Apply {
            callee: "make".to_owned(),
            args: vec![],
        },
        &[(ty, OBJ)],
    );
    match func.result(inst) {
        Some(value) => (inst, value),
        None => panic!("make has a result"),
    }
}

/// bb0 -> {bb1, bb2} -> bb3, every block terminated.
///
/// bb0 takes the branch condition as its only argument (`%0`).
pub(crate) fn diamond() -> (Function, [BlockId; 4]) {
    let mut func = Function::new("diamond");
    let b0 = func.add_block();
    let b1 = func.add_block();
    let b2 = func.add_block();
    let b3 = func.add_block();
    let cond = func.add_block_arg(b0, TypeId::BOOL, OBJ);
    func.append_inst(
        b0,
        InstKind::CondBr {
            cond,
            then_block: b1,
            else_block: b2,
        },
        &[],
    );
    func.append_inst(b1, InstKind::Br { target: b3, args: vec![] }, &[]);
    func.append_inst(b2, InstKind::Br { target: b3, args: vec![] }, &[]);
    func.append_inst(b3, InstKind::Return { value: None }, &[]);
    (func, [b0, b1, b2, b3])
}

/// bb0 -> bb1 -> {bb1, bb2}, every block terminated.
///
/// bb0 takes the loop condition as its only argument (`%0`).
pub(crate) fn looping() -> (Function, [BlockId; 3]) {
    let mut func = Function::new("looping");
    let b0 = func.add_block();
    let b1 = func.add_block();
    let b2 = func.add_block();
    let cond = func.add_block_arg(b0, TypeId::BOOL, OBJ);
    func.append_inst(b0, InstKind::Br { target: b1, args: vec![] }, &[]);
    func.append_inst(
        b1,
        InstKind::CondBr {
            cond,
            then_block: b1,
            else_block: b2,
        },
        &[],
    );
    func.append_inst(b2, InstKind::Return { value: None }, &[]);
    (func, [b0, b1, b2])
}

/// A single terminated block.
pub(crate) fn straight_line() -> (Function, BlockId) {
    let mut func = Function::new("straight");
    let b0 = func.add_block();
    func.append_inst(b0, InstKind::Return { value: None }, &[]);
    (func, b0)
}

/// A type tree description, built into a pool by [`TypeDesc::build`].
///
/// Used by property tests to generate arbitrary aggregate layouts.
#[derive(Clone, Debug)]
pub(crate) enum TypeDesc {
    Int,
    Tuple(Vec<TypeDesc>),
    Struct { fields: Vec<TypeDesc>, deinit: bool },
    Enum(Vec<Option<TypeDesc>>),
}

impl TypeDesc {
    pub(crate) fn build(&self, pool: &mut TypePool) -> TypeId {
        match self {
            TypeDesc::Int => TypeId::INT,
            TypeDesc::Tuple(elements) => {
                let elements = elements.iter().map(|e| e.build(pool)).collect();
                pool.tuple(elements)
            }
            TypeDesc::Struct { fields, deinit } => {
                let fields = fields
                    .iter()
                    .enumerate()
                    .map(|(i, f)| field(&format!("f{i}"), f.build(pool)))
                    .collect();
                pool.struct_type(StructDef {
                    name: "S".to_owned(),
                    params: 0,
                    fields,
                    has_deinit: *deinit,
                    unreferenceable_storage: false,
                })
            }
            TypeDesc::Enum(cases) => {
                let cases = cases
                    .iter()
                    .enumerate()
                    .map(|(i, c)| CaseDef {
                        name: format!("c{i}"),
                        payload: c.as_ref().map(|p| p.build(pool)),
                    })
                    .collect();
                pool.enum_type(EnumDef {
                    name: "E".to_owned(),
                    params: 0,
                    cases,
                })
            }
        }
    }

    /// Leaf count computed directly from the description.
    pub(crate) fn expected_leaves(&self) -> usize {
        match self {
            TypeDesc::Int => 1,
            TypeDesc::Tuple(elements) => elements.iter().map(TypeDesc::expected_leaves).sum(),
            TypeDesc::Struct { fields, deinit } => {
                let n: usize = fields.iter().map(TypeDesc::expected_leaves).sum();
                (n + usize::from(*deinit)).max(1)
            }
            TypeDesc::Enum(cases) => {
                cases
                    .iter()
                    .flatten()
                    .map(TypeDesc::expected_leaves)
                    .max()
                    .unwrap_or(0)
                    + 1
            }
        }
    }

    /// Strategy producing nested descriptions a few levels deep.
    pub(crate) fn strategy() -> impl proptest::strategy::Strategy<Value = TypeDesc> {
        use proptest::prelude::*;

        Just(TypeDesc::Int).prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(TypeDesc::Tuple),
                (proptest::collection::vec(inner.clone(), 0..4), any::<bool>())
                    .prop_map(|(fields, deinit)| TypeDesc::Struct { fields, deinit }),
                proptest::collection::vec(proptest::option::of(inner), 1..4)
                    .prop_map(TypeDesc::Enum),
            ]
        })
    }
}
