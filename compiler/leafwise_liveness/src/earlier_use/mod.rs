//! Backward search for an earlier consuming use.
//!
//! Starting just above an instruction, walk backward through its block and
//! then through predecessor blocks, looking at lifetime-ending uses of one
//! leaf until a definition of the leaf is reached. Each consuming use found
//! on the way is handed to a callback, which may stop the search.
//!
//! Diagnostics use this to find a consume that happened before a later use
//! of the same leaf.

use rustc_hash::FxHashSet;

use leafwise_ir::{BlockId, InstId, Node};

use crate::live_range::{DefTable, LiveRange};
use crate::liveness::UseKind;

/// Outcome of scanning one block bottom-up.
enum BlockScan {
    /// Hit a definition of the leaf.
    ReachedDef,
    /// The callback asked to stop.
    Stopped,
    /// Scanned the whole block, arguments included, without either.
    Exhausted,
}

impl<D: DefTable> LiveRange<'_, D> {
    /// Search backward from `inst` for lifetime-ending uses of `bit`.
    ///
    /// `visit` is called with each consuming use found. Returning `false`
    /// stops the search, and the whole call returns `false`. Otherwise the
    /// search ends at the first definition reached, or when no predecessor
    /// is left, and returns `true`.
    pub fn find_earlier_consuming_use(
        &self,
        inst: InstId,
        bit: usize,
        mut visit: impl FnMut(InstId) -> bool,
    ) -> bool {
        let func = self.function();
        let block = func.inst_block(inst);
        tracing::trace!(%inst, bit, "searching for an earlier consuming use");

        let above = &func.block_insts(block)[..func.inst_position(inst)];
        match self.scan_block(block, above, bit, &mut visit) {
            BlockScan::ReachedDef => return true,
            BlockScan::Stopped => return false,
            BlockScan::Exhausted => {}
        }

        let mut visited: FxHashSet<BlockId> = FxHashSet::default();
        let mut worklist: Vec<BlockId> = Vec::new();
        let cfg = self.liveness.cfg();
        for &pred in cfg.predecessors(block) {
            if visited.insert(pred) {
                worklist.push(pred);
            }
        }

        while let Some(next) = worklist.pop() {
            tracing::trace!(block = %next, "scanning predecessor");
            match self.scan_block(next, func.block_insts(next), bit, &mut visit) {
                BlockScan::ReachedDef => return true,
                BlockScan::Stopped => return false,
                BlockScan::Exhausted => {}
            }
            for &pred in cfg.predecessors(next) {
                if visited.insert(pred) {
                    worklist.push(pred);
                }
            }
        }

        true
    }

    /// Scan `insts` of `block` bottom-up, then the block's arguments.
    fn scan_block(
        &self,
        block: BlockId,
        insts: &[InstId],
        bit: usize,
        visit: &mut impl FnMut(InstId) -> bool,
    ) -> BlockScan {
        for &inst in insts.iter().rev() {
            if self.is_def(Node::Inst(inst), bit) {
                return BlockScan::ReachedDef;
            }
            if self.interesting_user(inst, bit) == Some(UseKind::LifetimeEnding) {
                tracing::trace!(%inst, bit, "found consuming use");
                if !visit(inst) {
                    return BlockScan::Stopped;
                }
            }
        }
        let func = self.function();
        if func
            .block_args(block)
            .iter()
            .any(|&arg| self.is_def(Node::Arg(arg), bit))
        {
            return BlockScan::ReachedDef;
        }
        BlockScan::Exhausted
    }
}

#[cfg(test)]
mod tests;
