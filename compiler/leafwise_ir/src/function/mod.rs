//! Function IR: basic blocks of instructions over typed SSA values.
//!
//! The analysis treats this IR as a graph of opaque nodes with identity:
//!
//! - **[`BlockId`]**: a basic block: arguments, then an instruction list
//!   whose last instruction is the terminator.
//! - **[`InstId`]**: an instruction, with zero or more result values.
//! - **[`ValueId`]**: a value, defined either by a block argument or by an
//!   instruction result, and living in memory ([`ValueCategory::Address`])
//!   or as an object.
//!
//! Ids are allocated sequentially and never reused. Inserting an
//! instruction shifts positions inside its block but never changes ids.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::types::TypeId;

// ── ID newtypes ─────────────────────────────────────────────────────

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Basic block id within a [`Function`]. Block 0 is the entry.
    BlockId,
    "bb"
);
define_id!(
    /// Instruction id within a [`Function`].
    InstId,
    "inst"
);
define_id!(
    /// Value id within a [`Function`].
    ValueId,
    "%"
);

fn id_from_len(len: usize, what: &str) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("{what} count exceeds u32::MAX"))
}

// ── Values ──────────────────────────────────────────────────────────

/// Whether a value is the object itself or the address of memory holding it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueCategory {
    #[default]
    Object,
    Address,
}

/// Where a value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueDef {
    /// Argument `index` of `block`.
    Arg { block: BlockId, index: u32 },
    /// Result `index` of `inst`. Single-result instructions use index 0.
    Result { inst: InstId, index: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeId,
    pub category: ValueCategory,
}

/// A definition site: an instruction or a block argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    Inst(InstId),
    Arg(ValueId),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Inst(inst) => write!(f, "{inst}"),
            Node::Arg(value) => write!(f, "{value}"),
        }
    }
}

// ── Instructions ────────────────────────────────────────────────────

/// A single instruction.
///
/// Field indices (`field`, `index`, `case`) are positions in declaration
/// order of the operand's type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstKind {
    // ── Memory ──────────────────────────────────────────────────
    AllocStack { ty: TypeId },
    AllocBox { ty: TypeId },
    ProjectBox { operand: ValueId },
    BeginAccess { source: ValueId },
    EndAccess { access: ValueId },
    /// Store a borrowed object into `dest`; the result aliases `dest`.
    StoreBorrow { src: ValueId, dest: ValueId },
    MoveOnlyWrapperToCopyableAddr { operand: ValueId },
    TupleElementAddr { operand: ValueId, index: u32 },
    StructElementAddr { operand: ValueId, field: u32 },
    UncheckedTakeEnumDataAddr { operand: ValueId, case: u32 },
    InitEnumDataAddr { operand: ValueId, case: u32 },
    Store { src: ValueId, dest: ValueId },
    Load { src: ValueId },
    CopyAddr { src: ValueId, dest: ValueId },
    DestroyAddr { addr: ValueId },

    // ── Objects ─────────────────────────────────────────────────
    BeginBorrow { operand: ValueId },
    EndBorrow { operand: ValueId },
    CopyValue { operand: ValueId },
    MoveValue { operand: ValueId },
    MoveOnlyWrapperToCopyableValue { operand: ValueId },
    DestroyValue { operand: ValueId },
    TupleExtract { operand: ValueId, index: u32 },
    StructExtract { operand: ValueId, field: u32 },
    UncheckedEnumData { operand: ValueId, case: u32 },
    /// One result per stored field.
    DestructureStruct { operand: ValueId },
    /// One result per tuple element.
    DestructureTuple { operand: ValueId },
    Struct { elements: Vec<ValueId> },
    Tuple { elements: Vec<ValueId> },
    Enum { case: u32, payload: Option<ValueId> },
    Literal { value: i64 },
    Apply { callee: String, args: Vec<ValueId> },

    // ── Terminators ─────────────────────────────────────────────
    Br { target: BlockId, args: Vec<ValueId> },
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    SwitchEnum {
        operand: ValueId,
        cases: Vec<(u32, BlockId)>,
        default: Option<BlockId>,
    },
    Return { value: Option<ValueId> },
    Unreachable,
}

impl InstKind {
    /// Textual mnemonic, used in dumps.
    pub const fn name(&self) -> &'static str {
        match self {
            InstKind::AllocStack { .. } => "alloc_stack",
            InstKind::AllocBox { .. } => "alloc_box",
            InstKind::ProjectBox { .. } => "project_box",
            InstKind::BeginAccess { .. } => "begin_access",
            InstKind::EndAccess { .. } => "end_access",
            InstKind::StoreBorrow { .. } => "store_borrow",
            InstKind::MoveOnlyWrapperToCopyableAddr { .. } => {
                "moveonlywrapper_to_copyable_addr"
            }
            InstKind::TupleElementAddr { .. } => "tuple_element_addr",
            InstKind::StructElementAddr { .. } => "struct_element_addr",
            InstKind::UncheckedTakeEnumDataAddr { .. } => "unchecked_take_enum_data_addr",
            InstKind::InitEnumDataAddr { .. } => "init_enum_data_addr",
            InstKind::Store { .. } => "store",
            InstKind::Load { .. } => "load",
            InstKind::CopyAddr { .. } => "copy_addr",
            InstKind::DestroyAddr { .. } => "destroy_addr",
            InstKind::BeginBorrow { .. } => "begin_borrow",
            InstKind::EndBorrow { .. } => "end_borrow",
            InstKind::CopyValue { .. } => "copy_value",
            InstKind::MoveValue { .. } => "move_value",
            InstKind::MoveOnlyWrapperToCopyableValue { .. } => "moveonlywrapper_to_copyable",
            InstKind::DestroyValue { .. } => "destroy_value",
            InstKind::TupleExtract { .. } => "tuple_extract",
            InstKind::StructExtract { .. } => "struct_extract",
            InstKind::UncheckedEnumData { .. } => "unchecked_enum_data",
            InstKind::DestructureStruct { .. } => "destructure_struct",
            InstKind::DestructureTuple { .. } => "destructure_tuple",
            InstKind::Struct { .. } => "struct",
            InstKind::Tuple { .. } => "tuple",
            InstKind::Enum { .. } => "enum",
            InstKind::Literal { .. } => "literal",
            InstKind::Apply { .. } => "apply",
            InstKind::Br { .. } => "br",
            InstKind::CondBr { .. } => "cond_br",
            InstKind::SwitchEnum { .. } => "switch_enum",
            InstKind::Return { .. } => "return",
            InstKind::Unreachable => "unreachable",
        }
    }

    /// Returns `true` for instructions that end a block.
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::SwitchEnum { .. }
                | InstKind::Return { .. }
                | InstKind::Unreachable
        )
    }

    /// All values read by this instruction, in operand order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            InstKind::AllocStack { .. }
            | InstKind::AllocBox { .. }
            | InstKind::Literal { .. }
            | InstKind::Unreachable
            | InstKind::Return { value: None } => SmallVec::new(),

            InstKind::ProjectBox { operand }
            | InstKind::MoveOnlyWrapperToCopyableAddr { operand }
            | InstKind::TupleElementAddr { operand, .. }
            | InstKind::StructElementAddr { operand, .. }
            | InstKind::UncheckedTakeEnumDataAddr { operand, .. }
            | InstKind::InitEnumDataAddr { operand, .. }
            | InstKind::BeginBorrow { operand }
            | InstKind::EndBorrow { operand }
            | InstKind::CopyValue { operand }
            | InstKind::MoveValue { operand }
            | InstKind::MoveOnlyWrapperToCopyableValue { operand }
            | InstKind::DestroyValue { operand }
            | InstKind::TupleExtract { operand, .. }
            | InstKind::StructExtract { operand, .. }
            | InstKind::UncheckedEnumData { operand, .. }
            | InstKind::DestructureStruct { operand }
            | InstKind::DestructureTuple { operand }
            | InstKind::SwitchEnum { operand, .. } => smallvec![*operand],

            InstKind::BeginAccess { source } => smallvec![*source],
            InstKind::EndAccess { access } => smallvec![*access],
            InstKind::Load { src } => smallvec![*src],
            InstKind::DestroyAddr { addr } => smallvec![*addr],
            InstKind::CondBr { cond, .. } => smallvec![*cond],
            InstKind::Return { value: Some(value) } => smallvec![*value],

            InstKind::StoreBorrow { src, dest }
            | InstKind::Store { src, dest }
            | InstKind::CopyAddr { src, dest } => smallvec![*src, *dest],

            InstKind::Struct { elements } | InstKind::Tuple { elements } => {
                elements.iter().copied().collect()
            }
            InstKind::Enum { payload, .. } => payload.iter().copied().collect(),
            InstKind::Apply { args, .. } | InstKind::Br { args, .. } => {
                args.iter().copied().collect()
            }
        }
    }

    /// Successor blocks of a terminator; empty for everything else.
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            InstKind::Br { target, .. } => smallvec![*target],
            InstKind::CondBr {
                then_block,
                else_block,
                ..
            } => smallvec![*then_block, *else_block],
            InstKind::SwitchEnum { cases, default, .. } => {
                let mut targets: SmallVec<[BlockId; 4]> =
                    cases.iter().map(|&(_, block)| block).collect();
                targets.extend(default.iter().copied());
                targets
            }
            _ => SmallVec::new(),
        }
    }

    /// Immediate field/element/case index, if the instruction carries one.
    fn immediate(&self) -> Option<u32> {
        match self {
            InstKind::TupleElementAddr { index, .. } | InstKind::TupleExtract { index, .. } => {
                Some(*index)
            }
            InstKind::StructElementAddr { field, .. } | InstKind::StructExtract { field, .. } => {
                Some(*field)
            }
            InstKind::UncheckedTakeEnumDataAddr { case, .. }
            | InstKind::InitEnumDataAddr { case, .. }
            | InstKind::UncheckedEnumData { case, .. }
            | InstKind::Enum { case, .. } => Some(*case),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstData {
    pub kind: InstKind,
    pub block: BlockId,
    pub results: SmallVec<[ValueId; 1]>,
}

// ── Blocks ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockData {
    pub id: BlockId,
    pub args: Vec<ValueId>,
    /// Instructions in program order. The last one is the terminator once
    /// the block is complete.
    pub insts: Vec<InstId>,
}

// ── Functions ───────────────────────────────────────────────────────

/// A function body. `blocks[0]` is the entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    blocks: Vec<BlockData>,
    insts: Vec<InstData>,
    values: Vec<ValueData>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            insts: Vec::new(),
            values: Vec::new(),
        }
    }

    // === Construction ===

    /// Append a new, empty block.
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId::new(id_from_len(self.blocks.len(), "block"));
        self.blocks.push(BlockData {
            id,
            args: Vec::new(),
            insts: Vec::new(),
        });
        id
    }

    /// Append an argument to `block`.
    pub fn add_block_arg(&mut self, block: BlockId, ty: TypeId, category: ValueCategory) -> ValueId {
        let index = id_from_len(self.blocks[block.index()].args.len(), "block argument");
        let value = self.new_value(ValueDef::Arg { block, index }, ty, category);
        self.blocks[block.index()].args.push(value);
        value
    }

    /// Append an instruction at the end of `block`.
    ///
    /// # Panics
    ///
    /// Panics if the block already ends in a terminator.
    pub fn append_inst(
        &mut self,
        block: BlockId,
        kind: InstKind,
        results: &[(TypeId, ValueCategory)],
    ) -> InstId {
        if let Some(term) = self.terminator(block) {
            panic!("cannot append {} after terminator {term} in {block}", kind.name());
        }
        let inst = self.new_inst(block, kind, results);
        self.blocks[block.index()].insts.push(inst);
        inst
    }

    /// Insert a non-terminator instruction immediately before `at`.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is a terminator.
    pub fn insert_before(
        &mut self,
        at: InstId,
        kind: InstKind,
        results: &[(TypeId, ValueCategory)],
    ) -> InstId {
        assert!(
            !kind.is_terminator(),
            "cannot insert terminator {} mid-block",
            kind.name()
        );
        let block = self.inst_block(at);
        let position = self.inst_position(at);
        let inst = self.new_inst(block, kind, results);
        self.blocks[block.index()].insts.insert(position, inst);
        inst
    }

    fn new_inst(
        &mut self,
        block: BlockId,
        kind: InstKind,
        results: &[(TypeId, ValueCategory)],
    ) -> InstId {
        let inst = InstId::new(id_from_len(self.insts.len(), "instruction"));
        let result_values = results
            .iter()
            .enumerate()
            .map(|(index, &(ty, category))| {
                let index = id_from_len(index, "result");
                self.new_value(ValueDef::Result { inst, index }, ty, category)
            })
            .collect();
        self.insts.push(InstData {
            kind,
            block,
            results: result_values,
        });
        inst
    }

    fn new_value(&mut self, def: ValueDef, ty: TypeId, category: ValueCategory) -> ValueId {
        let value = ValueId::new(id_from_len(self.values.len(), "value"));
        self.values.push(ValueData { def, ty, category });
        value
    }

    // === Blocks ===

    #[inline]
    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// All block ids in creation order.
    pub fn block_ids(&self) -> impl DoubleEndedIterator<Item = BlockId> + '_ {
        self.blocks.iter().map(|block| block.id)
    }

    #[inline]
    pub fn block_insts(&self, block: BlockId) -> &[InstId] {
        &self.blocks[block.index()].insts
    }

    #[inline]
    pub fn block_args(&self, block: BlockId) -> &[ValueId] {
        &self.blocks[block.index()].args
    }

    /// The block's terminator, if it has been appended.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.block_insts(block)
            .last()
            .copied()
            .filter(|&inst| self.inst_kind(inst).is_terminator())
    }

    /// Successor blocks, in terminator operand order (may repeat).
    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        self.terminator(block)
            .map(|term| self.inst_kind(term).successors())
            .unwrap_or_default()
    }

    /// The instruction at position `index` of `block`.
    pub fn inst_at(&self, block: BlockId, index: usize) -> Option<InstId> {
        self.blocks
            .get(block.index())
            .and_then(|data| data.insts.get(index).copied())
    }

    // === Instructions ===

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    #[inline]
    pub fn inst(&self, inst: InstId) -> &InstData {
        &self.insts[inst.index()]
    }

    #[inline]
    pub fn inst_kind(&self, inst: InstId) -> &InstKind {
        &self.insts[inst.index()].kind
    }

    #[inline]
    pub fn inst_block(&self, inst: InstId) -> BlockId {
        self.insts[inst.index()].block
    }

    /// Position of `inst` within its block.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is not listed in its parent block.
    pub fn inst_position(&self, inst: InstId) -> usize {
        let block = self.inst_block(inst);
        self.block_insts(block)
            .iter()
            .position(|&candidate| candidate == inst)
            .unwrap_or_else(|| panic!("{inst} not found in its parent block {block}"))
    }

    /// The instruction before `inst` in its block.
    pub fn prev_inst(&self, inst: InstId) -> Option<InstId> {
        let position = self.inst_position(inst);
        position
            .checked_sub(1)
            .map(|prev| self.block_insts(self.inst_block(inst))[prev])
    }

    #[inline]
    pub fn results(&self, inst: InstId) -> &[ValueId] {
        &self.insts[inst.index()].results
    }

    /// The first (usually only) result of `inst`.
    #[inline]
    pub fn result(&self, inst: InstId) -> Option<ValueId> {
        self.results(inst).first().copied()
    }

    // === Values ===

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn value(&self, value: ValueId) -> &ValueData {
        &self.values[value.index()]
    }

    #[inline]
    pub fn value_def(&self, value: ValueId) -> ValueDef {
        self.values[value.index()].def
    }

    #[inline]
    pub fn value_type(&self, value: ValueId) -> TypeId {
        self.values[value.index()].ty
    }

    #[inline]
    pub fn value_category(&self, value: ValueId) -> ValueCategory {
        self.values[value.index()].category
    }

    #[inline]
    pub fn is_address(&self, value: ValueId) -> bool {
        self.value_category(value) == ValueCategory::Address
    }

    /// The instruction producing `value`, or `None` for block arguments.
    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        match self.value_def(value) {
            ValueDef::Result { inst, .. } => Some(inst),
            ValueDef::Arg { .. } => None,
        }
    }

    /// The definition site of `value`.
    pub fn value_node(&self, value: ValueId) -> Node {
        match self.value_def(value) {
            ValueDef::Result { inst, .. } => Node::Inst(inst),
            ValueDef::Arg { .. } => Node::Arg(value),
        }
    }

    /// The block a definition site lives in.
    pub fn node_block(&self, node: Node) -> BlockId {
        match node {
            Node::Inst(inst) => self.inst_block(inst),
            Node::Arg(value) => match self.value_def(value) {
                ValueDef::Arg { block, .. } => block,
                ValueDef::Result { inst, .. } => self.inst_block(inst),
            },
        }
    }

    /// Render an instruction for dumps: `%2 = struct_extract %1, #0`.
    pub fn display_inst(&self, inst: InstId) -> InstDisplay<'_> {
        InstDisplay { func: self, inst }
    }
}

/// Display adapter returned by [`Function::display_inst`].
pub struct InstDisplay<'f> {
    func: &'f Function,
    inst: InstId,
}

impl fmt::Display for InstDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.func.inst(self.inst);
        for (i, result) in data.results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{result}")?;
        }
        if !data.results.is_empty() {
            f.write_str(" = ")?;
        }
        f.write_str(data.kind.name())?;
        if let InstKind::Apply { callee, .. } = &data.kind {
            write!(f, " @{callee}")?;
        }
        let mut sep = " ";
        for operand in data.kind.operands() {
            write!(f, "{sep}{operand}")?;
            sep = ", ";
        }
        if let Some(imm) = data.kind.immediate() {
            write!(f, "{sep}#{imm}")?;
            sep = ", ";
        }
        for succ in data.kind.successors() {
            write!(f, "{sep}{succ}")?;
            sep = ", ";
        }
        Ok(())
    }
}
