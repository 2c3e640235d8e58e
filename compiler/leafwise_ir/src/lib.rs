//! Host IR for the leafwise liveness analysis.
//!
//! This crate provides the two collaborators the analysis consumes:
//!
//! - **Type pool** ([`TypePool`], [`TypeId`], [`TypeShape`]): interned
//!   types with one decomposition query, [`TypePool::shape`], evaluated
//!   under an [`ExpansionContext`].
//!
//! - **Function IR** ([`Function`], [`BlockId`], [`InstId`], [`ValueId`]):
//!   basic blocks of instructions over typed values. The analysis reads the
//!   graph (predecessors, successors, instruction order, block arguments,
//!   projection operands) and only ever mutates it through
//!   [`Function::insert_before`].

pub mod function;
pub mod types;

pub use function::{
    BlockData, BlockId, Function, InstData, InstId, InstKind, Node, ValueCategory, ValueData,
    ValueDef, ValueId,
};
pub use types::{
    CaseDef, EnumDef, ExpansionContext, FieldDef, Primitive, StructDef, TypeId, TypeKind,
    TypePool, TypeShape,
};
