//! Live ranges with several definitions per leaf.
//!
//! Used for memory locations, where each store or initialization is a def
//! and nothing orders the defs. A block may define a leaf more than once
//! and may use it above its first def.

use bit_vec::BitVec;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use leafwise_ir::{BlockId, Function, InstId, Node, ValueId};

use crate::blocks::IsLive;
use crate::boundary::Boundary;
use crate::leaf_count::LeafCounter;
use crate::liveness::FieldLiveness;
use crate::range::LeafRange;

use super::{find_boundary_in_non_def_block, find_boundary_in_ssa_def_block, DefTable, LiveRange};

type Ranges = SmallVec<[LeafRange; 2]>;

/// Definitions keyed by node, plus the blocks they live in.
///
/// Built with the `initialize_def*` methods of [`MultiDefLiveRange`], then
/// frozen by [`finished_initialization_of_defs`].
///
/// [`finished_initialization_of_defs`]: LiveRange::finished_initialization_of_defs
#[derive(Clone, Debug, Default)]
pub struct MultiDefs {
    defs: FxHashMap<Node, Ranges>,
    /// Def nodes in registration order.
    order: Vec<Node>,
    def_blocks: FxHashMap<BlockId, Ranges>,
    frozen: bool,
}

impl MultiDefs {
    pub fn num_defs(&self) -> usize {
        self.order.len()
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (Node, &[LeafRange])> + '_ {
        self.order
            .iter()
            .map(|node| (*node, self.def_ranges(*node)))
    }

    pub fn def_ranges(&self, node: Node) -> &[LeafRange] {
        self.defs.get(&node).map_or(&[], SmallVec::as_slice)
    }

    fn add(&mut self, node: Node, block: BlockId, range: LeafRange) {
        assert!(
            !self.frozen,
            "cannot add a definition after finished_initialization_of_defs"
        );
        let ranges = self.defs.entry(node).or_default();
        if ranges.is_empty() {
            self.order.push(node);
        }
        ranges.push(range);
        self.def_blocks.entry(block).or_default().push(range);
    }

    fn any_contains(ranges: Option<&Ranges>, bit: usize) -> bool {
        ranges.is_some_and(|ranges| ranges.iter().any(|r| r.contains(bit)))
    }
}

impl DefTable for MultiDefs {
    fn is_initialized(&self) -> bool {
        self.frozen
    }

    fn is_def_block(&self, block: BlockId, bit: usize) -> bool {
        Self::any_contains(self.def_blocks.get(&block), bit)
    }

    fn is_def(&self, node: Node, bit: usize) -> bool {
        Self::any_contains(self.defs.get(&node), bit)
    }

    /// An instruction that both uses and defines a leaf uses it before the
    /// def: only strictly earlier instructions and block arguments count.
    fn is_user_before_def(&self, func: &Function, user: InstId, bit: usize) -> bool {
        let block = func.inst_block(user);
        if !self.is_def_block(block, bit) {
            return false;
        }
        if func
            .block_args(block)
            .iter()
            .any(|&arg| self.is_def(Node::Arg(arg), bit))
        {
            return false;
        }
        let position = func.inst_position(user);
        !func.block_insts(block)[..position]
            .iter()
            .any(|&inst| self.is_def(Node::Inst(inst), bit))
    }

    fn find_boundaries_in_block(
        &self,
        liveness: &FieldLiveness<'_>,
        block: BlockId,
        bit: usize,
        is_live_out: bool,
        boundary: &mut Boundary,
    ) {
        tracing::trace!(%block, bit, is_live_out, "multi-def boundary search");

        if !self.is_def_block(block, bit) {
            // A live-out block without defs has no boundary.
            if !is_live_out {
                find_boundary_in_non_def_block(liveness, block, bit, boundary);
            }
            return;
        }

        if let [single] = self.order.as_slice() {
            if !is_live_out {
                find_boundary_in_ssa_def_block(liveness, *single, bit, boundary);
            }
            return;
        }

        let before = cfg!(debug_assertions).then(|| boundary.num_last_users_and_dead_defs(bit));
        let func = liveness.function();
        let mut is_live = is_live_out;

        for &inst in func.block_insts(block).iter().rev() {
            // Defs first: one instruction can be both a dead def and the
            // last user.
            if self.is_def(Node::Inst(inst), bit) {
                if !is_live {
                    boundary.add_dead_def(Node::Inst(inst), bit);
                }
                is_live = false;
            }
            if !is_live && liveness.is_interesting_user(inst, bit) {
                boundary.add_last_user(inst, bit);
                is_live = true;
            }
        }

        if !is_live {
            for &arg in func.block_args(block) {
                if self.is_def(Node::Arg(arg), bit) {
                    boundary.add_dead_def(Node::Arg(arg), bit);
                }
            }
            // Dead on entry but live out of every predecessor: the value
            // flowing in needs cleanup at the top of this block.
            let preds = liveness.cfg().predecessors(block);
            if !preds.is_empty()
                && preds
                    .iter()
                    .all(|&pred| liveness.block_liveness(pred, bit) == IsLive::LiveOut)
            {
                boundary.add_boundary_edge(block, bit);
            }
        }

        if let Some(before) = before {
            debug_assert!(
                is_live_out || before < boundary.num_last_users_and_dead_defs(bit),
                "live-within block {block} produced no boundary for leaf {bit}"
            );
        }
    }
}

/// Live range whose leaves may be defined many times.
pub type MultiDefLiveRange<'f> = LiveRange<'f, MultiDefs>;

impl<'f> LiveRange<'f, MultiDefs> {
    pub fn new(func: &'f Function, num_sub_elements: usize) -> Self {
        Self::with_defs(func, num_sub_elements, MultiDefs::default())
    }

    /// A live range tracking every leaf of `root`'s type.
    pub fn for_root(func: &'f Function, counter: &LeafCounter<'_>, root: ValueId) -> Self {
        let num_sub_elements = counter.leaf_count(func.value_type(root));
        Self::new(func, num_sub_elements)
    }

    /// Register `node` as defining `range`.
    pub fn initialize_def_node(&mut self, node: Node, range: LeafRange) {
        let block = self.function().node_block(node);
        tracing::trace!(%node, %range, %block, "multi-def");
        self.defs.add(node, block, range);
        self.liveness.initialize_def_block(block, range);
    }

    /// Register the instruction `inst` as defining `range`.
    pub fn initialize_def_inst(&mut self, inst: InstId, range: LeafRange) {
        self.initialize_def_node(Node::Inst(inst), range);
    }

    /// Register `value`'s definition site as defining `range`.
    pub fn initialize_def_value(&mut self, value: ValueId, range: LeafRange) {
        let node = self.function().value_node(value);
        self.initialize_def_node(node, range);
    }

    /// Register `node` as defining each run of set bits in `defined`.
    pub fn initialize_def_bits(&mut self, node: Node, defined: &BitVec) {
        LeafRange::visit_contiguous_ranges(defined, |range| {
            self.initialize_def_node(node, range);
        });
    }

    /// Freeze the definitions. Uses may be registered from here on.
    pub fn finished_initialization_of_defs(&mut self) {
        self.defs.frozen = true;
    }

    pub fn num_defs(&self) -> usize {
        self.defs.num_defs()
    }
}
