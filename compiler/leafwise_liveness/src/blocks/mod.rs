//! Per-block, per-leaf liveness state.
//!
//! Each block touched by a query gets a row with one [`IsLive`] per tracked
//! leaf. Rows are created the first time a block is marked, which also
//! records the block in discovery order. States only move up the lattice
//! `Dead < LiveWithin < LiveOut` during a query.

use std::fmt;

use bit_vec::BitVec;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use leafwise_ir::BlockId;

use crate::bits;
use crate::graph::Cfg;
use crate::range::LeafRange;

/// Liveness of one leaf in one block.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsLive {
    /// Nothing keeps the leaf alive in this block.
    #[default]
    Dead,
    /// The liveness boundary is inside this block.
    LiveWithin,
    /// Live across the whole block; the boundary is downstream.
    LiveOut,
}

impl IsLive {
    pub const fn name(self) -> &'static str {
        match self {
            IsLive::Dead => "Dead",
            IsLive::LiveWithin => "LiveWithin",
            IsLive::LiveOut => "LiveOut",
        }
    }

    #[inline]
    pub const fn is_live(self) -> bool {
        !matches!(self, IsLive::Dead)
    }
}

impl fmt::Display for IsLive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inline capacity for per-bit state vectors.
pub type LivenessVec = SmallVec<[IsLive; 8]>;

/// Liveness rows for the blocks discovered by one query.
#[derive(Clone, Debug)]
pub struct LiveBlocks {
    num_bits: usize,
    rows: FxHashMap<BlockId, LivenessVec>,
    discovered: Vec<BlockId>,
}

impl LiveBlocks {
    pub fn new(num_bits: usize) -> Self {
        Self {
            num_bits,
            rows: FxHashMap::default(),
            discovered: Vec::new(),
        }
    }

    pub fn num_bits_to_track(&self) -> usize {
        self.num_bits
    }

    /// Blocks with at least one marked leaf, in the order they were first
    /// marked.
    pub fn discovered_blocks(&self) -> &[BlockId] {
        &self.discovered
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }

    pub fn block_liveness(&self, block: BlockId, bit: usize) -> IsLive {
        self.rows
            .get(&block)
            .and_then(|row| row.get(bit).copied())
            .unwrap_or_default()
    }

    /// States for every leaf of `range` in `block`.
    pub fn block_liveness_range(&self, block: BlockId, range: LeafRange) -> LivenessVec {
        range.bits().map(|bit| self.block_liveness(block, bit)).collect()
    }

    /// States for every tracked leaf in `block`.
    pub fn all_block_liveness(&self, block: BlockId) -> LivenessVec {
        self.block_liveness_range(block, LeafRange::new(0, self.num_bits))
    }

    /// Raise `bit` in `block` to at least `state`. Never lowers a state.
    ///
    /// # Panics
    ///
    /// Panics if `bit` is not a tracked leaf.
    pub fn mark_block_live(&mut self, block: BlockId, bit: usize, state: IsLive) {
        assert!(
            bit < self.num_bits,
            "leaf {bit} is out of range ({} tracked)",
            self.num_bits
        );
        if state == IsLive::Dead {
            return;
        }
        let num_bits = self.num_bits;
        let row = self.rows.entry(block).or_insert_with(|| {
            self.discovered.push(block);
            SmallVec::from_elem(IsLive::Dead, num_bits)
        });
        if state > row[bit] {
            row[bit] = state;
        }
    }

    /// Mark every leaf of `range` in `block`.
    pub fn mark_block_live_range(&mut self, block: BlockId, range: LeafRange, state: IsLive) {
        for bit in range.bits() {
            self.mark_block_live(block, bit, state);
        }
    }

    /// Seed a defining block: the definition bounds liveness inside it, so
    /// the backward walk from any use stops there.
    pub fn initialize_def_block(&mut self, block: BlockId, range: LeafRange) {
        self.mark_block_live_range(block, range, IsLive::LiveWithin);
    }

    /// Make `bit` live from the top of the function down to `user_block`.
    ///
    /// `user_block` becomes `LiveWithin` and every block that reaches it
    /// without passing a block already marked becomes `LiveOut`. A
    /// predecessor that is already `LiveWithin` is raised to `LiveOut` but
    /// not walked again: it was fully explored when it was first marked.
    pub fn compute_scalar_use_block_liveness(&mut self, cfg: &Cfg, user_block: BlockId, bit: usize) {
        self.mark_block_live(user_block, bit, IsLive::LiveWithin);

        let mut visited = FxHashSet::default();
        visited.insert(user_block);
        let mut worklist = vec![user_block];

        while let Some(block) = worklist.pop() {
            for &pred in cfg.predecessors(block) {
                match self.block_liveness(pred, bit) {
                    IsLive::Dead => {
                        if visited.insert(pred) {
                            worklist.push(pred);
                        }
                        self.mark_block_live(pred, bit, IsLive::LiveOut);
                    }
                    IsLive::LiveWithin => self.mark_block_live(pred, bit, IsLive::LiveOut),
                    IsLive::LiveOut => {}
                }
            }
        }
    }

    /// Record a use of `range` in `user_block` and return the block's
    /// resulting state for each leaf of the range.
    ///
    /// A leaf already live in the block needs no further work unless the
    /// use comes before the leaf's definition, in which case liveness must
    /// still flow in from the predecessors.
    pub fn update_for_use(
        &mut self,
        cfg: &Cfg,
        user_block: BlockId,
        range: LeafRange,
        use_before_def: &BitVec,
    ) -> LivenessVec {
        range
            .bits()
            .map(|bit| self.update_for_use_bit(cfg, user_block, bit, bits::test(use_before_def, bit)))
            .collect()
    }

    /// Single-leaf form of [`update_for_use`](Self::update_for_use).
    pub fn update_for_use_bit(
        &mut self,
        cfg: &Cfg,
        user_block: BlockId,
        bit: usize,
        is_use_before_def: bool,
    ) -> IsLive {
        match self.block_liveness(user_block, bit) {
            IsLive::LiveOut | IsLive::LiveWithin if !is_use_before_def => {}
            _ => self.compute_scalar_use_block_liveness(cfg, user_block, bit),
        }
        self.block_liveness(user_block, bit)
    }

    /// Forget every block. The tracked leaf count is kept.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.discovered.clear();
    }
}

impl fmt::Display for LiveBlocks {
    /// One line per discovered block: `bbN: LiveWithin, Dead, `.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &block in &self.discovered {
            write!(f, "{block}: ")?;
            for bit in 0..self.num_bits {
                write!(f, "{}, ", self.block_liveness(block, bit))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
