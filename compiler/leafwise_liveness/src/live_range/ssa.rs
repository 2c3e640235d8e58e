//! Single-definition live ranges.

use leafwise_ir::{BlockId, Function, InstId, Node, ValueId};

use crate::boundary::Boundary;
use crate::leaf_count::LeafCounter;
use crate::liveness::FieldLiveness;
use crate::range::LeafRange;

use super::{find_boundary_in_non_def_block, find_boundary_in_ssa_def_block, DefTable, LiveRange};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Def {
    value: ValueId,
    node: Node,
    block: BlockId,
    range: LeafRange,
}

/// The one definition of an SSA live range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SsaDef {
    def: Option<Def>,
}

impl SsaDef {
    pub fn value(&self) -> Option<ValueId> {
        self.def.map(|d| d.value)
    }

    pub fn node(&self) -> Option<Node> {
        self.def.map(|d| d.node)
    }

    pub fn range(&self) -> Option<LeafRange> {
        self.def.map(|d| d.range)
    }
}

impl DefTable for SsaDef {
    fn is_initialized(&self) -> bool {
        self.def.is_some()
    }

    fn is_def_block(&self, block: BlockId, bit: usize) -> bool {
        self.def
            .is_some_and(|d| d.block == block && d.range.contains(bit))
    }

    fn is_def(&self, node: Node, bit: usize) -> bool {
        self.def
            .is_some_and(|d| d.node == node && d.range.contains(bit))
    }

    /// A single def dominates every use.
    fn is_user_before_def(&self, _func: &Function, _user: InstId, _bit: usize) -> bool {
        false
    }

    fn find_boundaries_in_block(
        &self,
        liveness: &FieldLiveness<'_>,
        block: BlockId,
        bit: usize,
        is_live_out: bool,
        boundary: &mut Boundary,
    ) {
        // Live out of a block means live below the def: no boundary here.
        if is_live_out {
            return;
        }
        let Some(def) = self.def.filter(|d| d.block == block && d.range.contains(bit)) else {
            find_boundary_in_non_def_block(liveness, block, bit, boundary);
            return;
        };
        find_boundary_in_ssa_def_block(liveness, def.node, bit, boundary);
    }
}

/// Live range of a value with exactly one definition.
pub type SsaLiveRange<'f> = LiveRange<'f, SsaDef>;

impl<'f> LiveRange<'f, SsaDef> {
    pub fn new(func: &'f Function, num_sub_elements: usize) -> Self {
        Self::with_defs(func, num_sub_elements, SsaDef::default())
    }

    /// A live range tracking every leaf of `root`'s type.
    pub fn for_root(func: &'f Function, counter: &LeafCounter<'_>, root: ValueId) -> Self {
        let num_sub_elements = counter.leaf_count(func.value_type(root));
        Self::new(func, num_sub_elements)
    }

    /// Set the definition: `value` defines the leaves of `range`.
    ///
    /// # Panics
    ///
    /// Panics if a definition was already set.
    pub fn initialize_def(&mut self, value: ValueId, range: LeafRange) {
        assert!(
            self.defs.def.is_none(),
            "SSA live range already has a definition"
        );
        let func = self.function();
        let node = func.value_node(value);
        let block = func.node_block(node);
        tracing::trace!(%value, %range, %block, "SSA def");
        self.defs.def = Some(Def {
            value,
            node,
            block,
            range,
        });
        self.liveness.initialize_def_block(block, range);
    }

    /// The definition, once set.
    pub fn def(&self) -> Option<(ValueId, LeafRange)> {
        self.defs.def.map(|d| (d.value, d.range))
    }
}
