use pretty_assertions::assert_eq;

use leafwise_ir::{BlockId, Function, InstId, InstKind, TypeId, ValueId};

use crate::live_range::{MultiDefLiveRange, SsaLiveRange};
use crate::range::LeafRange;
use crate::test_helpers::{looping, make, push, straight_line, use_of, ADDR, OBJ};

fn alloc(func: &mut Function, block: BlockId) -> ValueId {
    let inst = push(func, block, InstKind::AllocStack { ty: TypeId::INT }, &[(TypeId::INT, ADDR)]);
    func.results(inst)[0]
}

fn store(func: &mut Function, block: BlockId, dest: ValueId) -> InstId {
    let src = func.block_args(func.entry())[0];
    push(func, block, InstKind::Store { src, dest }, &[])
}

fn load(func: &mut Function, block: BlockId, src: ValueId) -> InstId {
    push(func, block, InstKind::Load { src }, &[(TypeId::INT, OBJ)])
}

fn destroy(func: &mut Function, block: BlockId, addr: ValueId) -> InstId {
    push(func, block, InstKind::DestroyAddr { addr }, &[])
}

/// Run the search and collect every consuming use handed to the callback.
fn search<D: crate::live_range::DefTable>(
    range: &crate::live_range::LiveRange<'_, D>,
    inst: InstId,
    veto: Option<InstId>,
) -> (bool, Vec<InstId>) {
    let mut seen = Vec::new();
    let found = range.find_earlier_consuming_use(inst, 0, |user| {
        seen.push(user);
        Some(user) != veto
    });
    (found, seen)
}

/// store; destroy; load. Searching from the load finds the destroy, then
/// stops at the store.
fn consume_then_read() -> (Function, [InstId; 3]) {
    let (mut func, [b0, ..]) = looping();
    let addr = alloc(&mut func, b0);
    let def = store(&mut func, b0, addr);
    let consume = destroy(&mut func, b0, addr);
    let read = load(&mut func, b0, addr);
    (func, [def, consume, read])
}

fn multi_def_range<'f>(func: &'f Function, defs: &[InstId]) -> MultiDefLiveRange<'f> {
    let mut range = MultiDefLiveRange::new(func, 1);
    for &def in defs {
        range.initialize_def_inst(def, LeafRange::new(0, 1));
    }
    range.finished_initialization_of_defs();
    range
}

#[test]
fn consuming_use_above_in_block() {
    let (func, [def, consume, read]) = consume_then_read();
    let mut range = multi_def_range(&func, &[def]);
    range.update_for_use(consume, LeafRange::new(0, 1), true);
    range.update_for_use(read, LeafRange::new(0, 1), false);

    assert_eq!(search(&range, read, None), (true, vec![consume]));
}

#[test]
fn callback_veto_stops_search() {
    let (func, [def, consume, read]) = consume_then_read();
    let mut range = multi_def_range(&func, &[def]);
    range.update_for_use(consume, LeafRange::new(0, 1), true);
    range.update_for_use(read, LeafRange::new(0, 1), false);

    assert_eq!(search(&range, read, Some(consume)), (false, vec![consume]));
}

#[test]
fn non_consuming_uses_are_skipped() {
    let (func, [def, consume, read]) = consume_then_read();
    let mut range = multi_def_range(&func, &[def]);
    range.update_for_use(consume, LeafRange::new(0, 1), false);
    range.update_for_use(read, LeafRange::new(0, 1), false);

    assert_eq!(search(&range, read, None), (true, vec![]));
}

/// Def in the preheader, consume in the loop body, query in the exit.
#[test]
fn search_walks_predecessors() {
    let (mut func, [b0, b1, b2]) = looping();
    let addr = alloc(&mut func, b0);
    let def = store(&mut func, b0, addr);
    let consume = destroy(&mut func, b1, addr);
    let read = load(&mut func, b2, addr);

    let mut range = multi_def_range(&func, &[def]);
    range.update_for_use(consume, LeafRange::new(0, 1), true);
    range.update_for_use(read, LeafRange::new(0, 1), false);

    assert_eq!(search(&range, read, None), (true, vec![consume]));
    assert_eq!(search(&range, read, Some(consume)), (false, vec![consume]));
}

#[test]
fn search_without_reachable_def_exhausts() {
    let (mut func, [b0, ..]) = looping();
    let addr = alloc(&mut func, b0);
    let consume = destroy(&mut func, b0, addr);
    let read = load(&mut func, b0, addr);
    let def = store(&mut func, b0, addr);

    let mut range = multi_def_range(&func, &[def]);
    range.update_for_use(consume, LeafRange::new(0, 1), true);

    assert_eq!(search(&range, read, None), (true, vec![consume]));
}

#[test]
fn block_argument_def_ends_search() {
    let (mut func, b0) = straight_line();
    let addr = func.add_block_arg(b0, TypeId::INT, ADDR);
    let consume = destroy(&mut func, b0, addr);
    let read = load(&mut func, b0, addr);

    let mut range = MultiDefLiveRange::new(&func, 1);
    range.initialize_def_value(addr, LeafRange::new(0, 1));
    range.finished_initialization_of_defs();
    range.update_for_use(consume, LeafRange::new(0, 1), true);

    assert_eq!(search(&range, read, None), (true, vec![consume]));
}

#[test]
fn ssa_range_search() {
    let (mut func, b0) = straight_line();
    let (_, value) = make(&mut func, b0, TypeId::INT);
    let consume = use_of(&mut func, b0, value);
    let read = use_of(&mut func, b0, value);

    let mut range = SsaLiveRange::new(&func, 1);
    range.initialize_def(value, LeafRange::new(0, 1));
    range.update_for_use(consume, LeafRange::new(0, 1), true);
    range.update_for_use(read, LeafRange::new(0, 1), false);

    assert_eq!(search(&range, read, None), (true, vec![consume]));
}
