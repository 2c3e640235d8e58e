use pretty_assertions::assert_eq;

use leafwise_ir::{FieldDef, StructDef, TypeKind};

use crate::test_helpers::{outer, pair, small_big_enum, struct_of};

use super::*;

fn maximal(pool: &TypePool) -> LeafCounter<'_> {
    LeafCounter::new(pool, ExpansionContext::Maximal)
}

// Scalars

#[test]
fn primitives_are_one_leaf() {
    let pool = TypePool::new();
    let counter = maximal(&pool);
    for ty in [TypeId::INT, TypeId::FLOAT, TypeId::BOOL, TypeId::STR] {
        assert_eq!(counter.leaf_count(ty), 1);
    }
}

// Tuples and structs

#[test]
fn tuple_sums_elements() {
    let mut pool = TypePool::new();
    let p = pair(&mut pool);
    let t = pool.tuple(vec![TypeId::INT, p, TypeId::BOOL]);
    assert_eq!(maximal(&pool).leaf_count(t), 4);
}

#[test]
fn empty_tuple_has_no_leaves() {
    let mut pool = TypePool::new();
    let unit = pool.tuple(vec![]);
    assert_eq!(maximal(&pool).leaf_count(unit), 0);
}

#[test]
fn nested_struct_sums_fields() {
    let mut pool = TypePool::new();
    let o = outer(&mut pool);
    assert_eq!(maximal(&pool).leaf_count(o), 3);
}

/// The deinit bit trails the stored fields.
#[test]
fn struct_with_deinit_adds_one() {
    let mut pool = TypePool::new();
    let s = pool.struct_type(StructDef {
        name: "Handle".to_owned(),
        params: 0,
        fields: vec![
            FieldDef {
                name: "fd".to_owned(),
                ty: TypeId::INT,
            },
            FieldDef {
                name: "path".to_owned(),
                ty: TypeId::STR,
            },
        ],
        has_deinit: true,
        unreferenceable_storage: false,
    });
    assert_eq!(maximal(&pool).leaf_count(s), 3);
}

#[test]
fn fieldless_struct_is_one_leaf() {
    let mut pool = TypePool::new();
    let empty = struct_of(&mut pool, "Empty", &[]);
    assert_eq!(maximal(&pool).leaf_count(empty), 1);

    let with_deinit = pool.struct_type(StructDef {
        name: "EmptyDrop".to_owned(),
        params: 0,
        fields: vec![],
        has_deinit: true,
        unreferenceable_storage: false,
    });
    assert_eq!(maximal(&pool).leaf_count(with_deinit), 1);
}

#[test]
fn unreferenceable_struct_is_one_leaf() {
    let mut pool = TypePool::new();
    let p = pair(&mut pool);
    let foreign = pool.struct_type(StructDef {
        name: "Foreign".to_owned(),
        params: 0,
        fields: vec![FieldDef {
            name: "inner".to_owned(),
            ty: p,
        }],
        has_deinit: false,
        unreferenceable_storage: true,
    });
    assert_eq!(maximal(&pool).leaf_count(foreign), 1);
}

// Enums

/// Payloads of 1 and 3 leaves: the widest payload plus a discriminant bit.
#[test]
fn enum_is_widest_payload_plus_discriminant() {
    let mut pool = TypePool::new();
    let e = small_big_enum(&mut pool);
    assert_eq!(maximal(&pool).leaf_count(e), 4);
}

#[test]
fn payloadless_enum_is_discriminant_only() {
    let mut pool = TypePool::new();
    let e = pool.enum_type(leafwise_ir::EnumDef {
        name: "Ordering".to_owned(),
        params: 0,
        cases: ["less", "equal", "greater"]
            .iter()
            .map(|name| leafwise_ir::CaseDef {
                name: (*name).to_owned(),
                payload: None,
            })
            .collect(),
    });
    assert_eq!(maximal(&pool).leaf_count(e), 1);
}

// Contexts and generics

#[test]
fn opaque_counts_depend_on_context() {
    let mut pool = TypePool::new();
    let o = outer(&mut pool);
    let opaque = pool.opaque("Hidden", Some(o));
    assert_eq!(maximal(&pool).leaf_count(opaque), 3);
    assert_eq!(
        LeafCounter::new(&pool, ExpansionContext::Minimal).leaf_count(opaque),
        1
    );
}

#[test]
fn applied_generic_counts_substituted_fields() {
    let mut pool = TypePool::new();
    let t0 = pool.param(0);
    let generic = pool.struct_type(StructDef {
        name: "Wrapper".to_owned(),
        params: 1,
        fields: vec![
            FieldDef {
                name: "value".to_owned(),
                ty: t0,
            },
            FieldDef {
                name: "tag".to_owned(),
                ty: TypeId::INT,
            },
        ],
        has_deinit: false,
        unreferenceable_storage: false,
    });
    let p = pair(&mut pool);
    let applied = pool.apply(generic, vec![p]);
    let counter = maximal(&pool);
    assert_eq!(counter.leaf_count(applied), 3);
    // An unresolved parameter is a single leaf.
    assert_eq!(counter.leaf_count(generic), 2);
}

/// A struct whose field names the struct itself counts the inner
/// occurrence as one leaf instead of recursing forever.
#[test]
fn self_referential_struct_terminates() {
    let mut pool = TypePool::new();
    let Ok(next_raw) = u32::try_from(pool.len()) else {
        panic!("pool too large");
    };
    let future_self = TypeId::from_raw(next_raw);
    let node = struct_of(&mut pool, "Node", &[TypeId::INT, future_self]);
    assert_eq!(node, future_self);
    assert!(matches!(pool.kind(node), TypeKind::Struct(_)));
    assert_eq!(maximal(&pool).leaf_count(node), 2);
}

#[test]
fn counts_are_memoized() {
    let mut pool = TypePool::new();
    let o = outer(&mut pool);
    let counter = maximal(&pool);
    assert_eq!(counter.leaf_count(o), 3);
    assert_eq!(counter.cache.borrow().get(&o), Some(&3));
    assert!(counter.counting.borrow().is_empty());
    assert_eq!(counter.leaf_count(o), 3);
}

#[test]
fn leaves_before_sums_preceding_siblings() {
    let mut pool = TypePool::new();
    let p = pair(&mut pool);
    let counter = maximal(&pool);
    let siblings = [p, TypeId::INT, p];
    assert_eq!(counter.leaves_before(&siblings, 0), 0);
    assert_eq!(counter.leaves_before(&siblings, 1), 2);
    assert_eq!(counter.leaves_before(&siblings, 2), 3);
    assert_eq!(counter.leaves_before(&siblings, 3), 5);
}

#[allow(
    clippy::disallowed_types,
    reason = "proptest macros internally use Arc"
)]
mod proptest_additivity {
    use proptest::prelude::*;

    use crate::test_helpers::TypeDesc;

    use super::*;

    proptest! {
        #[test]
        fn leaf_count_matches_layout_arithmetic(desc in TypeDesc::strategy()) {
            let mut pool = TypePool::new();
            let ty = desc.build(&mut pool);
            let counter = LeafCounter::new(&pool, ExpansionContext::Maximal);
            prop_assert_eq!(counter.leaf_count(ty), desc.expected_leaves());
        }

        /// A tuple of arbitrary elements counts exactly the sum of its parts.
        #[test]
        fn tuple_is_additive(elements in proptest::collection::vec(TypeDesc::strategy(), 0..5)) {
            let mut pool = TypePool::new();
            let element_ids: Vec<TypeId> = elements.iter().map(|e| e.build(&mut pool)).collect();
            let tuple = pool.tuple(element_ids.clone());
            let counter = LeafCounter::new(&pool, ExpansionContext::Maximal);
            let parts: usize = element_ids.iter().map(|&e| counter.leaf_count(e)).sum();
            prop_assert_eq!(counter.leaf_count(tuple), parts);
        }
    }
}
