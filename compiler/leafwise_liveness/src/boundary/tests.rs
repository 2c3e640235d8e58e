use pretty_assertions::assert_eq;

use leafwise_ir::TypeId;

use crate::test_helpers::{b, diamond, make, use_of};

use super::*;

#[test]
fn entries_start_empty_and_accumulate() {
    let mut boundary = Boundary::new(3);
    assert!(boundary.is_empty());

    let inst = InstId::new(4);
    boundary.add_last_user(inst, 0);
    boundary.add_last_user(inst, 2);
    boundary.add_boundary_edge(b(1), 1);

    assert!(boundary.is_last_user(inst, 0));
    assert!(!boundary.is_last_user(inst, 1));
    assert!(boundary.is_boundary_edge(b(1), 1));
    assert!(!boundary.is_boundary_edge(b(2), 1));
    assert_eq!(boundary.last_user_bits(inst).map(BitVec::len), Some(3));
    assert!(boundary.dead_def_bits(Node::Inst(inst)).is_none());
    assert!(!boundary.is_empty());

    boundary.clear();
    assert!(boundary.is_empty());
    assert_eq!(boundary.num_bits(), 3);
}

#[test]
fn counts_last_users_and_dead_defs_per_bit() {
    let mut boundary = Boundary::new(2);
    boundary.add_last_user(InstId::new(1), 0);
    boundary.add_last_user(InstId::new(2), 0);
    boundary.add_dead_def(Node::Inst(InstId::new(0)), 0);
    boundary.add_dead_def(Node::Inst(InstId::new(0)), 1);
    boundary.add_boundary_edge(b(3), 1);

    assert_eq!(boundary.num_last_users_and_dead_defs(0), 3);
    assert_eq!(boundary.num_last_users_and_dead_defs(1), 1);
}

#[test]
fn iteration_is_ordered() {
    let mut boundary = Boundary::new(1);
    boundary.add_last_user(InstId::new(9), 0);
    boundary.add_last_user(InstId::new(2), 0);
    boundary.add_last_user(InstId::new(5), 0);
    let order: Vec<_> = boundary.last_users().into_iter().map(|(i, _)| i).collect();
    assert_eq!(order, vec![InstId::new(2), InstId::new(5), InstId::new(9)]);
}

#[test]
fn display_spells_out_entries() {
    let (mut func, [b0, b1, _, b3]) = diamond();
    let (def, value) = make(&mut func, b0, TypeId::INT);
    let user = use_of(&mut func, b1, value);
    let arg = func.block_args(b0)[0];

    let mut boundary = Boundary::new(2);
    boundary.add_last_user(user, 0);
    boundary.add_boundary_edge(b3, 0);
    boundary.add_dead_def(Node::Inst(def), 1);
    boundary.add_dead_def(Node::Arg(arg), 0);

    assert_eq!(
        boundary.display(&func).to_string(),
        "last user: apply @use %1\tat {0}\n\
         boundary edge: bb3\n\tat {0}\n\
         dead def: %1 = apply @make\tat {1}\n\
         dead def: %0 (argument of bb0)\tat {0}\n"
    );
}
