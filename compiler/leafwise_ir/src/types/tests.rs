use pretty_assertions::assert_eq;
use smallvec::smallvec;

use super::*;

fn pair_struct(pool: &mut TypePool, name: &str, has_deinit: bool) -> TypeId {
    pool.struct_type(StructDef {
        name: name.to_owned(),
        params: 0,
        fields: vec![
            FieldDef {
                name: "a".to_owned(),
                ty: TypeId::INT,
            },
            FieldDef {
                name: "b".to_owned(),
                ty: TypeId::STR,
            },
        ],
        has_deinit,
        unreferenceable_storage: false,
    })
}

#[test]
fn primitives_have_fixed_ids() {
    let pool = TypePool::new();
    assert_eq!(pool.len(), TypeId::PRIMITIVE_COUNT as usize);
    assert_eq!(pool.kind(TypeId::INT), &TypeKind::Primitive(Primitive::Int));
    assert_eq!(pool.kind(TypeId::STR), &TypeKind::Primitive(Primitive::Str));
    assert!(TypeId::BOOL.is_primitive());
}

#[test]
fn tuples_are_interned() {
    let mut pool = TypePool::new();
    let a = pool.tuple(vec![TypeId::INT, TypeId::BOOL]);
    let b = pool.tuple(vec![TypeId::INT, TypeId::BOOL]);
    let c = pool.tuple(vec![TypeId::BOOL, TypeId::INT]);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn struct_shape_lists_stored_fields() {
    let mut pool = TypePool::new();
    let s = pair_struct(&mut pool, "Pair", true);
    assert_eq!(
        pool.shape(s, ExpansionContext::Maximal),
        TypeShape::Struct {
            fields: smallvec![TypeId::INT, TypeId::STR],
            has_deinit: true,
        }
    );
    assert_eq!(
        pool.struct_field_type(s, 1, ExpansionContext::Maximal),
        Some(TypeId::STR)
    );
    assert_eq!(pool.struct_field_type(s, 2, ExpansionContext::Maximal), None);
}

#[test]
fn unreferenceable_struct_is_a_leaf() {
    let mut pool = TypePool::new();
    let s = pool.struct_type(StructDef {
        name: "Foreign".to_owned(),
        params: 0,
        fields: vec![FieldDef {
            name: "x".to_owned(),
            ty: TypeId::INT,
        }],
        has_deinit: false,
        unreferenceable_storage: true,
    });
    assert_eq!(pool.shape(s, ExpansionContext::Maximal), TypeShape::Leaf);
}

#[test]
fn applied_struct_substitutes_fields() {
    let mut pool = TypePool::new();
    let t0 = pool.param(0);
    let inner = pool.tuple(vec![t0, TypeId::BOOL]);
    let generic = pool.struct_type(StructDef {
        name: "Box2".to_owned(),
        params: 1,
        fields: vec![
            FieldDef {
                name: "value".to_owned(),
                ty: t0,
            },
            FieldDef {
                name: "pair".to_owned(),
                ty: inner,
            },
        ],
        has_deinit: false,
        unreferenceable_storage: false,
    });
    let applied = pool.apply(generic, vec![TypeId::STR]);
    let expected_pair = pool.tuple(vec![TypeId::STR, TypeId::BOOL]);
    assert_eq!(
        pool.shape(applied, ExpansionContext::Maximal),
        TypeShape::Struct {
            fields: smallvec![TypeId::STR, expected_pair],
            has_deinit: false,
        }
    );
    assert_eq!(pool.display(applied).to_string(), "Box2<str>");
}

#[test]
fn applied_enum_substitutes_payloads() {
    let mut pool = TypePool::new();
    let t0 = pool.param(0);
    let option = pool.enum_type(EnumDef {
        name: "Option".to_owned(),
        params: 1,
        cases: vec![
            CaseDef {
                name: "none".to_owned(),
                payload: None,
            },
            CaseDef {
                name: "some".to_owned(),
                payload: Some(t0),
            },
        ],
    });
    let applied = pool.apply(option, vec![TypeId::FLOAT]);
    assert_eq!(
        pool.shape(applied, ExpansionContext::Maximal),
        TypeShape::Enum {
            payloads: smallvec![None, Some(TypeId::FLOAT)],
        }
    );
    assert_eq!(
        pool.enum_payload_type(applied, 1, ExpansionContext::Maximal),
        Some(TypeId::FLOAT)
    );
    assert_eq!(
        pool.enum_payload_type(applied, 0, ExpansionContext::Maximal),
        None
    );
}

#[test]
fn opaque_depends_on_expansion_context() {
    let mut pool = TypePool::new();
    let pair = pair_struct(&mut pool, "Pair", false);
    let opaque = pool.opaque("P", Some(pair));
    assert_eq!(pool.shape(opaque, ExpansionContext::Minimal), TypeShape::Leaf);
    assert!(matches!(
        pool.shape(opaque, ExpansionContext::Maximal),
        TypeShape::Struct { .. }
    ));
    assert_eq!(pool.lower(opaque, ExpansionContext::Maximal), pair);
    assert_eq!(pool.display(opaque).to_string(), "some P");
}

#[test]
fn display_tuple() {
    let mut pool = TypePool::new();
    let t = pool.tuple(vec![TypeId::INT, TypeId::STR]);
    assert_eq!(pool.display(t).to_string(), "(int, str)");
}
