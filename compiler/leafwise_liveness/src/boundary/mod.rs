//! Liveness boundary: where each leaf's live range ends.
//!
//! A boundary has three parts, each a map from a program point to the leaves
//! whose lifetime ends there:
//!
//! - **last users**: the final live use of a leaf along a path
//! - **dead defs**: definitions with no use below them
//! - **boundary edges**: blocks entered from a live predecessor with the
//!   leaf dead, where cleanup belongs at the top of the block

use std::fmt;

use bit_vec::BitVec;
use rustc_hash::FxHashMap;

use leafwise_ir::{BlockId, Function, InstId, Node};

use crate::bits::{self, BitsDisplay};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Boundary {
    num_bits: usize,
    last_users: FxHashMap<InstId, BitVec>,
    dead_defs: FxHashMap<Node, BitVec>,
    boundary_edges: FxHashMap<BlockId, BitVec>,
}

impl Boundary {
    pub fn new(num_bits: usize) -> Self {
        Self {
            num_bits,
            ..Self::default()
        }
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.last_users.is_empty() && self.dead_defs.is_empty() && self.boundary_edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.last_users.clear();
        self.dead_defs.clear();
        self.boundary_edges.clear();
    }

    // === Recording ===

    /// Leaves `user` is the last user of, created empty on first access.
    pub fn last_user_bits_mut(&mut self, user: InstId) -> &mut BitVec {
        let num_bits = self.num_bits;
        self.last_users
            .entry(user)
            .or_insert_with(|| bits::zeroed(num_bits))
    }

    pub fn dead_def_bits_mut(&mut self, def: Node) -> &mut BitVec {
        let num_bits = self.num_bits;
        self.dead_defs
            .entry(def)
            .or_insert_with(|| bits::zeroed(num_bits))
    }

    pub fn boundary_edge_bits_mut(&mut self, block: BlockId) -> &mut BitVec {
        let num_bits = self.num_bits;
        self.boundary_edges
            .entry(block)
            .or_insert_with(|| bits::zeroed(num_bits))
    }

    pub(crate) fn add_last_user(&mut self, user: InstId, bit: usize) {
        self.last_user_bits_mut(user).set(bit, true);
    }

    pub(crate) fn add_dead_def(&mut self, def: Node, bit: usize) {
        self.dead_def_bits_mut(def).set(bit, true);
    }

    pub(crate) fn add_boundary_edge(&mut self, block: BlockId, bit: usize) {
        self.boundary_edge_bits_mut(block).set(bit, true);
    }

    // === Queries ===

    pub fn last_user_bits(&self, user: InstId) -> Option<&BitVec> {
        self.last_users.get(&user)
    }

    pub fn dead_def_bits(&self, def: Node) -> Option<&BitVec> {
        self.dead_defs.get(&def)
    }

    pub fn boundary_edge_bits(&self, block: BlockId) -> Option<&BitVec> {
        self.boundary_edges.get(&block)
    }

    pub fn is_last_user(&self, user: InstId, bit: usize) -> bool {
        self.last_users.get(&user).is_some_and(|b| bits::test(b, bit))
    }

    pub fn is_dead_def(&self, def: Node, bit: usize) -> bool {
        self.dead_defs.get(&def).is_some_and(|b| bits::test(b, bit))
    }

    pub fn is_boundary_edge(&self, block: BlockId, bit: usize) -> bool {
        self.boundary_edges.get(&block).is_some_and(|b| bits::test(b, bit))
    }

    /// Last users ordered by instruction id.
    pub fn last_users(&self) -> Vec<(InstId, &BitVec)> {
        sorted(&self.last_users)
    }

    /// Dead definitions ordered by node.
    pub fn dead_defs(&self) -> Vec<(Node, &BitVec)> {
        sorted(&self.dead_defs)
    }

    /// Boundary edges ordered by block.
    pub fn boundary_edges(&self) -> Vec<(BlockId, &BitVec)> {
        sorted(&self.boundary_edges)
    }

    /// Number of last users and dead defs recorded for `bit`.
    ///
    /// Used to check that every live-within block produced a boundary
    /// entry. Linear in the size of the boundary.
    pub fn num_last_users_and_dead_defs(&self, bit: usize) -> usize {
        let users = self.last_users.values().filter(|b| bits::test(b, bit)).count();
        let defs = self.dead_defs.values().filter(|b| bits::test(b, bit)).count();
        users + defs
    }

    /// Render the boundary with instructions spelled out from `func`.
    pub fn display<'a>(&'a self, func: &'a Function) -> BoundaryDisplay<'a> {
        BoundaryDisplay {
            boundary: self,
            func,
        }
    }
}

fn sorted<K: Copy + Ord + std::hash::Hash + Eq>(map: &FxHashMap<K, BitVec>) -> Vec<(K, &BitVec)> {
    let mut entries: Vec<_> = map.iter().map(|(&k, v)| (k, v)).collect();
    entries.sort_unstable_by_key(|&(k, _)| k);
    entries
}

/// Display adapter returned by [`Boundary::display`].
pub struct BoundaryDisplay<'a> {
    boundary: &'a Boundary,
    func: &'a Function,
}

impl fmt::Display for BoundaryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (user, bits) in self.boundary.last_users() {
            writeln!(
                f,
                "last user: {}\tat {}",
                self.func.display_inst(user),
                BitsDisplay(bits)
            )?;
        }
        for (block, bits) in self.boundary.boundary_edges() {
            writeln!(f, "boundary edge: {block}\n\tat {}", BitsDisplay(bits))?;
        }
        for (def, bits) in self.boundary.dead_defs() {
            match def {
                Node::Inst(inst) => write!(f, "dead def: {}", self.func.display_inst(inst))?,
                Node::Arg(arg) => write!(
                    f,
                    "dead def: {arg} (argument of {})",
                    self.func.node_block(def)
                )?,
            }
            writeln!(f, "\tat {}", BitsDisplay(bits))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
