//! Live ranges: liveness with definitions.
//!
//! [`LiveRange`] owns a [`FieldLiveness`] and a definition table. The table
//! type decides what counts as a def and how to find the boundary inside a
//! block that contains defs:
//!
//! - [`SsaDef`]: one definition of a range of leaves. Every use is below it.
//! - [`MultiDefs`]: any number of definitions per leaf, in any order. A use
//!   may sit above a def in the same block.
//!
//! Everything else (registering uses, the boundary walk over discovered
//! blocks, point queries) is shared.

mod multi_def;
mod ssa;

use std::fmt;

use bit_vec::BitVec;

use leafwise_ir::{BlockId, Function, InstId, Node};

use crate::bits;
use crate::blocks::{IsLive, LivenessVec};
use crate::boundary::Boundary;
use crate::liveness::{FieldLiveness, UseKind};
use crate::range::LeafRange;

pub use multi_def::{MultiDefLiveRange, MultiDefs};
pub use ssa::{SsaDef, SsaLiveRange};

/// Definition table plugged into a [`LiveRange`].
pub trait DefTable {
    /// `true` once the table is complete and uses may be registered.
    fn is_initialized(&self) -> bool;

    /// `true` if `block` holds a definition of `bit`.
    fn is_def_block(&self, block: BlockId, bit: usize) -> bool;

    /// `true` if `node` defines `bit`.
    fn is_def(&self, node: Node, bit: usize) -> bool;

    /// `true` if `user` sits above every definition of `bit` in its block,
    /// so liveness must still flow into the block from its predecessors.
    fn is_user_before_def(&self, func: &Function, user: InstId, bit: usize) -> bool;

    /// Record the boundary of `bit` inside `block`.
    ///
    /// `is_live_out` is `true` if `bit` is live out of `block`, in which
    /// case the caller has already recorded the block's outgoing edges.
    fn find_boundaries_in_block(
        &self,
        liveness: &FieldLiveness<'_>,
        block: BlockId,
        bit: usize,
        is_live_out: bool,
        boundary: &mut Boundary,
    );
}

/// Field-sensitive pruned live range over one root value.
pub struct LiveRange<'f, D> {
    pub(crate) liveness: FieldLiveness<'f>,
    pub(crate) defs: D,
}

impl<'f, D: DefTable> LiveRange<'f, D> {
    pub(crate) fn with_defs(func: &'f Function, num_sub_elements: usize, defs: D) -> Self {
        Self {
            liveness: FieldLiveness::new(func, num_sub_elements),
            defs,
        }
    }

    pub fn liveness(&self) -> &FieldLiveness<'f> {
        &self.liveness
    }

    pub fn defs(&self) -> &D {
        &self.defs
    }

    pub fn function(&self) -> &'f Function {
        self.liveness.function()
    }

    pub fn num_sub_elements(&self) -> usize {
        self.liveness.num_sub_elements()
    }

    pub fn discovered_blocks(&self) -> &[BlockId] {
        self.liveness.discovered_blocks()
    }

    pub fn block_liveness(&self, block: BlockId, bit: usize) -> IsLive {
        self.liveness.block_liveness(block, bit)
    }

    pub fn block_liveness_range(&self, block: BlockId, range: LeafRange) -> LivenessVec {
        self.liveness.block_liveness_range(block, range)
    }

    pub fn interesting_user(&self, user: InstId, bit: usize) -> Option<UseKind> {
        self.liveness.interesting_user(user, bit)
    }

    pub fn is_interesting_user(&self, user: InstId, bit: usize) -> bool {
        self.liveness.is_interesting_user(user, bit)
    }

    pub fn is_def_block(&self, block: BlockId, bit: usize) -> bool {
        self.defs.is_def_block(block, bit)
    }

    pub fn is_def(&self, node: Node, bit: usize) -> bool {
        self.defs.is_def(node, bit)
    }

    // === Registering uses ===

    fn use_before_def_bits(&self, user: InstId, leaves: impl Iterator<Item = usize>) -> BitVec {
        assert!(
            self.defs.is_initialized(),
            "live range definitions must be initialized before registering uses"
        );
        let func = self.function();
        let mut before = bits::zeroed(self.num_sub_elements());
        for bit in leaves {
            if self.defs.is_user_before_def(func, user, bit) {
                before.set(bit, true);
            }
        }
        before
    }

    /// Register `user` as a use of `range`.
    pub fn update_for_use(&mut self, user: InstId, range: LeafRange, lifetime_ending: bool) {
        let before = self.use_before_def_bits(user, range.bits());
        self.liveness
            .update_for_use(user, range, lifetime_ending, &before);
    }

    /// Register `user` as a use of the set leaves of `used`.
    pub fn update_for_use_bits(&mut self, user: InstId, used: &BitVec, lifetime_ending: bool) {
        let before = self.use_before_def_bits(user, bits::set_bits(used));
        self.liveness
            .update_for_use_bits(user, used, lifetime_ending, &before);
    }

    /// Extend liveness of `range` to `user` without making it a use.
    pub fn extend_to_non_use(&mut self, user: InstId, range: LeafRange) {
        let before = self.use_before_def_bits(user, range.bits());
        self.liveness.extend_to_non_use(user, range, &before);
    }

    pub fn extend_to_non_use_bits(&mut self, user: InstId, used: &BitVec) {
        let before = self.use_before_def_bits(user, bits::set_bits(used));
        self.liveness.extend_to_non_use_bits(user, used, &before);
    }

    // === Queries ===

    /// `true` if `inst` lies inside the live range of any leaf of `range`.
    ///
    /// This is a disjunction: one live leaf is enough. An empty range is
    /// trivially within the boundary.
    pub fn is_within_boundary(&self, inst: InstId, range: LeafRange) -> bool {
        assert!(self.defs.is_initialized(), "live range has no definitions");
        if range.is_empty() {
            return true;
        }

        let block = self.function().inst_block(inst);
        for bit in range.bits() {
            let live_out = match self.block_liveness(block, bit) {
                IsLive::Dead => continue,
                IsLive::LiveOut => {
                    if !self.is_def_block(block, bit) {
                        tracing::trace!(%inst, bit, "live out of a non-def block");
                        return true;
                    }
                    true
                }
                IsLive::LiveWithin => false,
            };
            if self.is_live_at(block, inst, bit, live_out) {
                return true;
            }
        }
        false
    }

    /// Scan `block` bottom-up to `inst`, tracking whether `bit` is live.
    fn is_live_at(&self, block: BlockId, inst: InstId, bit: usize, live_out: bool) -> bool {
        let mut is_live = live_out;
        for &block_inst in self.function().block_insts(block).iter().rev() {
            if self.is_def(Node::Inst(block_inst), bit) {
                is_live = false;
            }
            if block_inst == inst {
                return is_live;
            }
            if !is_live {
                is_live = self.is_interesting_user(block_inst, bit);
            }
        }
        panic!("{inst} is not in its parent block {block}");
    }

    /// Walk every discovered block and record where each leaf's live range
    /// ends.
    ///
    /// # Panics
    ///
    /// Panics if a discovered block has no live leaf, or if a live-within
    /// block has no use to end at.
    pub fn compute_boundary(&self, boundary: &mut Boundary) {
        assert!(self.defs.is_initialized(), "live range has no definitions");
        let func = self.function();
        tracing::debug!(
            func = %func.name,
            blocks = self.discovered_blocks().len(),
            "computing liveness boundary"
        );

        for &block in self.discovered_blocks() {
            let mut found_live = false;
            for bit in 0..self.num_sub_elements() {
                match self.block_liveness(block, bit) {
                    IsLive::LiveOut => {
                        for succ in func.successors(block) {
                            if self.block_liveness(succ, bit) == IsLive::Dead {
                                tracing::trace!(%block, %succ, bit, "boundary edge");
                                boundary.add_boundary_edge(succ, bit);
                            }
                        }
                        self.defs
                            .find_boundaries_in_block(&self.liveness, block, bit, true, boundary);
                        found_live = true;
                    }
                    IsLive::LiveWithin => {
                        self.defs
                            .find_boundaries_in_block(&self.liveness, block, bit, false, boundary);
                        found_live = true;
                    }
                    IsLive::Dead => {}
                }
            }
            assert!(found_live, "discovered block {block} has no live leaf");
        }
    }

    /// [`compute_boundary`](Self::compute_boundary) into a fresh boundary.
    pub fn boundary(&self) -> Boundary {
        let mut boundary = Boundary::new(self.num_sub_elements());
        self.compute_boundary(&mut boundary);
        boundary
    }
}

impl<D> fmt::Display for LiveRange<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.liveness)
    }
}

// === Boundary search helpers shared by the def tables ===

/// Record the last user of `bit` in a live-within block without defs.
///
/// # Panics
///
/// Panics if the block has no user of `bit`.
pub(crate) fn find_boundary_in_non_def_block(
    liveness: &FieldLiveness<'_>,
    block: BlockId,
    bit: usize,
    boundary: &mut Boundary,
) {
    debug_assert_eq!(liveness.block_liveness(block, bit), IsLive::LiveWithin);
    let func = liveness.function();
    for &inst in func.block_insts(block).iter().rev() {
        if liveness.is_interesting_user(inst, bit) {
            tracing::trace!(%inst, bit, "last user in non-def block");
            boundary.add_last_user(inst, bit);
            return;
        }
    }
    panic!("live-within block {block} has no user of leaf {bit}");
}

/// Record the last user of `bit` below the single definition `def`, or the
/// def itself when nothing below it uses the leaf.
///
/// No use of a single-def range can sit above the def in its block.
pub(crate) fn find_boundary_in_ssa_def_block(
    liveness: &FieldLiveness<'_>,
    def: Node,
    bit: usize,
    boundary: &mut Boundary,
) {
    let func = liveness.function();
    let def_inst = match def {
        Node::Inst(inst) => Some(inst),
        Node::Arg(_) => None,
    };
    for &inst in func.block_insts(func.node_block(def)).iter().rev() {
        if Some(inst) == def_inst {
            tracing::trace!(%inst, bit, "dead def");
            boundary.add_dead_def(def, bit);
            return;
        }
        if liveness.is_interesting_user(inst, bit) {
            tracing::trace!(%inst, bit, "last user in def block");
            boundary.add_last_user(inst, bit);
            return;
        }
    }
    tracing::trace!(%def, bit, "dead argument");
    boundary.add_dead_def(def, bit);
}
