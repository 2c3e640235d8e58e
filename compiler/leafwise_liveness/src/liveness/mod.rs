//! Field-sensitive liveness: block states plus per-instruction uses.
//!
//! [`FieldLiveness`] layers use bookkeeping over [`LiveBlocks`]. Every
//! registered user gets an [`Interest`], a pair of bit vectors recording for
//! each leaf whether the instruction is a use and whether it ends the
//! leaf's lifetime.
//!
//! This layer knows nothing about definitions. The live-range types in
//! [`crate::live_range`] compute "is this use above its def" and pass the
//! answer down.

use std::fmt;

use bit_vec::BitVec;
use rustc_hash::FxHashMap;

use leafwise_ir::{BlockId, Function, InstId};

use crate::bits;
use crate::blocks::{IsLive, LiveBlocks, LivenessVec};
use crate::graph::Cfg;
use crate::range::LeafRange;

/// How an instruction uses one leaf.
///
/// The order is the meet order: recording two kinds on the same leaf keeps
/// the greater one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UseKind {
    /// Ends the lifetime without reading the leaf (e.g. a forced cleanup
    /// point).
    NonUse,
    /// Reads the leaf and ends its lifetime.
    LifetimeEnding,
    /// Reads the leaf; it stays alive.
    NonLifetimeEnding,
}

impl UseKind {
    pub const fn from_lifetime_ending(lifetime_ending: bool) -> Self {
        if lifetime_ending {
            UseKind::LifetimeEnding
        } else {
            UseKind::NonLifetimeEnding
        }
    }

    /// Label used in liveness dumps.
    pub const fn label(self) -> &'static str {
        match self {
            UseKind::NonUse => "non-user",
            UseKind::LifetimeEnding => "lifetime-ending user",
            UseKind::NonLifetimeEnding => "regular user",
        }
    }
}

/// Per-leaf use record of one instruction.
///
/// | live | consuming | meaning                  |
/// |------|-----------|--------------------------|
/// | 0    | 0         | not a user of this leaf  |
/// | 1    | 0         | [`UseKind::NonLifetimeEnding`] |
/// | 1    | 1         | [`UseKind::LifetimeEnding`]    |
/// | 0    | 1         | [`UseKind::NonUse`]            |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interest {
    live_bits: BitVec,
    consuming_bits: BitVec,
}

impl Interest {
    fn new(num_bits: usize) -> Self {
        Self {
            live_bits: bits::zeroed(num_bits),
            consuming_bits: bits::zeroed(num_bits),
        }
    }

    pub fn live_bits(&self) -> &BitVec {
        &self.live_bits
    }

    pub fn consuming_bits(&self) -> &BitVec {
        &self.consuming_bits
    }

    pub fn use_kind(&self, bit: usize) -> Option<UseKind> {
        match (bits::test(&self.live_bits, bit), bits::test(&self.consuming_bits, bit)) {
            (false, false) => None,
            (true, false) => Some(UseKind::NonLifetimeEnding),
            (true, true) => Some(UseKind::LifetimeEnding),
            (false, true) => Some(UseKind::NonUse),
        }
    }

    fn record(&mut self, bit: usize, kind: UseKind) {
        let merged = self.use_kind(bit).map_or(kind, |current| current.max(kind));
        let (live, consuming) = match merged {
            UseKind::NonUse => (false, true),
            UseKind::LifetimeEnding => (true, true),
            UseKind::NonLifetimeEnding => (true, false),
        };
        self.live_bits.set(bit, live);
        self.consuming_bits.set(bit, consuming);
    }
}

/// Liveness of the leaves of one root value, without definitions.
pub struct FieldLiveness<'f> {
    func: &'f Function,
    cfg: Cfg,
    live_blocks: LiveBlocks,
    users: FxHashMap<InstId, Interest>,
}

impl<'f> FieldLiveness<'f> {
    pub fn new(func: &'f Function, num_sub_elements: usize) -> Self {
        Self {
            func,
            cfg: Cfg::build(func),
            live_blocks: LiveBlocks::new(num_sub_elements),
            users: FxHashMap::default(),
        }
    }

    pub fn function(&self) -> &'f Function {
        self.func
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub fn live_blocks(&self) -> &LiveBlocks {
        &self.live_blocks
    }

    pub fn num_sub_elements(&self) -> usize {
        self.live_blocks.num_bits_to_track()
    }

    pub fn discovered_blocks(&self) -> &[BlockId] {
        self.live_blocks.discovered_blocks()
    }

    pub fn block_liveness(&self, block: BlockId, bit: usize) -> IsLive {
        self.live_blocks.block_liveness(block, bit)
    }

    pub fn block_liveness_range(&self, block: BlockId, range: LeafRange) -> LivenessVec {
        self.live_blocks.block_liveness_range(block, range)
    }

    pub fn all_block_liveness(&self, block: BlockId) -> LivenessVec {
        self.live_blocks.all_block_liveness(block)
    }

    /// How `user` uses `bit`, if it was registered for it.
    pub fn interesting_user(&self, user: InstId, bit: usize) -> Option<UseKind> {
        self.users.get(&user).and_then(|interest| interest.use_kind(bit))
    }

    pub fn is_interesting_user(&self, user: InstId, bit: usize) -> bool {
        self.interesting_user(user, bit).is_some()
    }

    pub fn interest(&self, user: InstId) -> Option<&Interest> {
        self.users.get(&user)
    }

    /// Registered users ordered by instruction id.
    pub fn users(&self) -> Vec<(InstId, &Interest)> {
        let mut users: Vec<_> = self.users.iter().map(|(&inst, i)| (inst, i)).collect();
        users.sort_unstable_by_key(|&(inst, _)| inst);
        users
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Seed `block` as defining `range`.
    pub(crate) fn initialize_def_block(&mut self, block: BlockId, range: LeafRange) {
        self.check_range(range);
        self.live_blocks.initialize_def_block(block, range);
    }

    /// Register `user` as a use of `range`.
    ///
    /// `use_before_def` marks leaves whose use precedes their definition in
    /// the user's block.
    pub fn update_for_use(
        &mut self,
        user: InstId,
        range: LeafRange,
        lifetime_ending: bool,
        use_before_def: &BitVec,
    ) {
        self.check_range(range);
        let block = self.func.inst_block(user);
        self.live_blocks
            .update_for_use(&self.cfg, block, range, use_before_def);
        self.record(user, range.bits(), UseKind::from_lifetime_ending(lifetime_ending));
    }

    /// Bit-vector form of [`update_for_use`](Self::update_for_use).
    pub fn update_for_use_bits(
        &mut self,
        user: InstId,
        used: &BitVec,
        lifetime_ending: bool,
        use_before_def: &BitVec,
    ) {
        let block = self.func.inst_block(user);
        for bit in bits::set_bits(used) {
            self.live_blocks.update_for_use_bit(
                &self.cfg,
                block,
                bit,
                bits::test(use_before_def, bit),
            );
        }
        self.record(user, bits::set_bits(used), UseKind::from_lifetime_ending(lifetime_ending));
    }

    /// Extend liveness to `user` without making it a use of `range`.
    ///
    /// The instruction becomes a lifetime-ending point for the leaves it
    /// does not already use.
    pub fn extend_to_non_use(&mut self, user: InstId, range: LeafRange, use_before_def: &BitVec) {
        self.check_range(range);
        let block = self.func.inst_block(user);
        self.live_blocks
            .update_for_use(&self.cfg, block, range, use_before_def);
        self.record(user, range.bits(), UseKind::NonUse);
    }

    /// Bit-vector form of [`extend_to_non_use`](Self::extend_to_non_use).
    pub fn extend_to_non_use_bits(&mut self, user: InstId, used: &BitVec, use_before_def: &BitVec) {
        let block = self.func.inst_block(user);
        for bit in bits::set_bits(used) {
            self.live_blocks.update_for_use_bit(
                &self.cfg,
                block,
                bit,
                bits::test(use_before_def, bit),
            );
        }
        self.record(user, bits::set_bits(used), UseKind::NonUse);
    }

    fn record(&mut self, user: InstId, leaves: impl Iterator<Item = usize>, kind: UseKind) {
        let num_bits = self.num_sub_elements();
        let interest = self
            .users
            .entry(user)
            .or_insert_with(|| Interest::new(num_bits));
        for bit in leaves {
            interest.record(bit, kind);
        }
    }

    fn check_range(&self, range: LeafRange) {
        assert!(
            range.end <= self.num_sub_elements(),
            "leaf range {range} exceeds the {} tracked leaves",
            self.num_sub_elements()
        );
    }
}

impl fmt::Display for FieldLiveness<'_> {
    /// Block states, then one line per registered (user, leaf) pair.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.live_blocks)?;
        for (inst, interest) in self.users() {
            for bit in 0..self.num_sub_elements() {
                if let Some(kind) = interest.use_kind(bit) {
                    writeln!(
                        f,
                        "{}: {}\tat {bit}",
                        kind.label(),
                        self.func.display_inst(inst)
                    )?;
                }
            }
        }
        Ok(())
    }
}
