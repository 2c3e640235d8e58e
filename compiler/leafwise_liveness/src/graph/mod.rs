//! Predecessor lists for a [`Function`].
//!
//! The host IR only exposes successors (through terminators). Liveness walks
//! the CFG backward, so the predecessor lists are computed once when the
//! analysis is constructed and shared by every query.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use leafwise_ir::{BlockId, Function};

/// Deduplicated predecessor lists, indexed by block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cfg {
    preds: Vec<SmallVec<[BlockId; 4]>>,
}

impl Cfg {
    /// Compute the predecessor list for each block of `func`.
    ///
    /// A block that branches to the same successor twice (e.g. a
    /// `cond_br` with identical targets) is listed once.
    pub fn build(func: &Function) -> Self {
        let num_blocks = func.num_blocks();
        let mut preds: Vec<SmallVec<[BlockId; 4]>> = vec![SmallVec::new(); num_blocks];

        for block in func.block_ids() {
            let mut seen = FxHashSet::default();
            for succ in func.successors(block) {
                if succ.index() < num_blocks && seen.insert(succ) {
                    preds[succ.index()].push(block);
                }
            }
        }

        Cfg { preds }
    }

    /// Distinct predecessors of `block`, in block order.
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.preds.get(block.index()).map_or(&[], SmallVec::as_slice)
    }

    pub fn num_blocks(&self) -> usize {
        self.preds.len()
    }
}
