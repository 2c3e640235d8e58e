//! Sub-element offsets of projections.
//!
//! Given a value derived from a root by a chain of projections, walk the
//! chain back to the root and sum the leaves of every sibling that precedes
//! the selected element. The result is the first leaf of the derived value
//! inside the root's layout.
//!
//! Enum payload projections contribute nothing: a payload always starts at
//! its enum's first leaf, with the discriminant as the top bit.
//!
//! An instruction outside the recognized set ends the walk with `None`.
//! Callers treat that as "cannot explain this derivation" and give up on
//! whatever they were computing.

use std::fmt;

use leafwise_ir::{Function, InstKind, TypeShape, ValueCategory, ValueDef, ValueId};

use crate::leaf_count::LeafCounter;

/// First leaf of a projection inside its root's layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubElementOffset(usize);

impl SubElementOffset {
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// Offset of `derived` inside `root`, choosing the address or value walk
    /// from the root's category.
    pub fn compute(
        func: &Function,
        counter: &LeafCounter<'_>,
        derived: ValueId,
        root: ValueId,
    ) -> Option<Self> {
        match func.value_category(root) {
            ValueCategory::Address => Self::compute_for_address(func, counter, derived, root),
            ValueCategory::Object => Self::compute_for_value(func, counter, derived, root),
        }
    }

    /// Walk an address projection chain back to `root_address`.
    pub fn compute_for_address(
        func: &Function,
        counter: &LeafCounter<'_>,
        derived: ValueId,
        root_address: ValueId,
    ) -> Option<Self> {
        let mut offset = 0;
        let mut current = derived;

        while current != root_address {
            let Some(inst) = func.defining_inst(current) else {
                tracing::trace!(value = %current, "offset walk reached an argument");
                return None;
            };
            current = match *func.inst_kind(inst) {
                InstKind::ProjectBox { operand }
                | InstKind::MoveOnlyWrapperToCopyableAddr { operand }
                | InstKind::UncheckedTakeEnumDataAddr { operand, .. }
                | InstKind::InitEnumDataAddr { operand, .. } => operand,
                InstKind::BeginAccess { source } => source,
                InstKind::StoreBorrow { dest, .. } => dest,
                InstKind::TupleElementAddr { operand, index } => {
                    offset += tuple_prefix(func, counter, operand, index)?;
                    operand
                }
                InstKind::StructElementAddr { operand, field } => {
                    offset += struct_prefix(func, counter, operand, field)?;
                    operand
                }
                ref other => {
                    tracing::trace!(inst = other.name(), "offset walk gave up");
                    return None;
                }
            };
        }

        Some(Self(offset))
    }

    /// Walk an object projection chain back to `root_value`.
    ///
    /// Destructuring instructions contribute the offset of the result being
    /// followed, selected by its result index.
    pub fn compute_for_value(
        func: &Function,
        counter: &LeafCounter<'_>,
        derived: ValueId,
        root_value: ValueId,
    ) -> Option<Self> {
        let mut offset = 0;
        let mut current = derived;

        while current != root_value {
            let ValueDef::Result { inst, index: result } = func.value_def(current) else {
                tracing::trace!(value = %current, "offset walk reached an argument");
                return None;
            };
            current = match *func.inst_kind(inst) {
                InstKind::BeginBorrow { operand }
                | InstKind::CopyValue { operand }
                | InstKind::MoveOnlyWrapperToCopyableValue { operand }
                | InstKind::UncheckedEnumData { operand, .. } => operand,
                InstKind::TupleExtract { operand, index } => {
                    offset += tuple_prefix(func, counter, operand, index)?;
                    operand
                }
                InstKind::StructExtract { operand, field } => {
                    offset += struct_prefix(func, counter, operand, field)?;
                    operand
                }
                InstKind::DestructureTuple { operand } => {
                    offset += tuple_prefix(func, counter, operand, result)?;
                    operand
                }
                InstKind::DestructureStruct { operand } => {
                    offset += struct_prefix(func, counter, operand, result)?;
                    operand
                }
                ref other => {
                    tracing::trace!(inst = other.name(), "offset walk gave up");
                    return None;
                }
            };
        }

        Some(Self(offset))
    }
}

impl fmt::Display for SubElementOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Leaves of the tuple elements before `index` in the tuple `aggregate`.
fn tuple_prefix(
    func: &Function,
    counter: &LeafCounter<'_>,
    aggregate: ValueId,
    index: u32,
) -> Option<usize> {
    match counter.shape(func.value_type(aggregate)) {
        TypeShape::Tuple(elements) => Some(counter.leaves_before(&elements, index as usize)),
        _ => None,
    }
}

/// Leaves of the stored fields before `field` in the struct `aggregate`.
fn struct_prefix(
    func: &Function,
    counter: &LeafCounter<'_>,
    aggregate: ValueId,
    field: u32,
) -> Option<usize> {
    match counter.shape(func.value_type(aggregate)) {
        TypeShape::Struct { fields, .. } => Some(counter.leaves_before(&fields, field as usize)),
        _ => None,
    }
}
