//! Leaf ranges and the projection builder.
//!
//! A [`LeafRange`] is a half-open interval `[start, end)` of leaves inside
//! one root value's layout. Ranges come from a value's type
//! ([`LeafRange::for_value`]), from a projection's offset
//! ([`LeafRange::for_projection`]), or from splitting a parent range one
//! level at a time.
//!
//! The projection builder is the only part of the analysis that touches the
//! IR: [`LeafRange::split_filtered`] and [`LeafRange::cover_needed`] insert
//! element projections ahead of a caller-chosen instruction.

use std::fmt;
use std::ops::Range;

use bit_vec::BitVec;
use smallvec::SmallVec;

use leafwise_ir::{Function, InstId, InstKind, TypeId, TypeShape, ValueCategory, ValueId};

use crate::bits::{self, BitsDisplay};
use crate::leaf_count::LeafCounter;
use crate::offset::SubElementOffset;

/// A value paired with the leaves it covers.
pub type Projection = (ValueId, LeafRange);

/// Half-open interval of leaf indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeafRange {
    pub start: usize,
    pub end: usize,
}

impl LeafRange {
    /// # Panics
    ///
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "leaf range start {start} is past its end {end}");
        Self { start, end }
    }

    /// The range holding only `bit`.
    pub fn single(bit: usize) -> Self {
        Self::new(bit, bit + 1)
    }

    /// Every leaf of `value`'s type: `[0, leaf_count)`.
    pub fn for_value(func: &Function, counter: &LeafCounter<'_>, value: ValueId) -> Self {
        Self::new(0, counter.leaf_count(func.value_type(value)))
    }

    /// The leaves `derived` occupies inside `root`, or `None` if the
    /// projection chain between them cannot be explained.
    pub fn for_projection(
        func: &Function,
        counter: &LeafCounter<'_>,
        derived: ValueId,
        root: ValueId,
    ) -> Option<Self> {
        let offset = SubElementOffset::compute(func, counter, derived, root)?.get();
        let size = counter.leaf_count(func.value_type(derived));
        Some(Self::new(offset, offset + size))
    }

    #[inline]
    pub fn size(self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn contains(self, bit: usize) -> bool {
        self.start <= bit && bit < self.end
    }

    /// `true` if `other` nests inside `self`.
    pub fn contains_range(self, other: LeafRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The leaf indices of this range.
    #[inline]
    pub fn bits(self) -> Range<usize> {
        self.start..self.end
    }

    /// Set every bit of this range in `bits`.
    pub fn set_in(self, bits: &mut BitVec) {
        for bit in self.bits() {
            bits.set(bit, true);
        }
    }

    /// `true` if every bit of this range is set in `bits`.
    pub fn all_set_in(self, bits: &BitVec) -> bool {
        self.bits().all(|bit| bits::test(bits, bit))
    }

    /// `true` if no bit of this range is set in `bits`.
    pub fn none_set_in(self, bits: &BitVec) -> bool {
        !self.bits().any(|bit| bits::test(bits, bit))
    }

    /// Call `visit` with each maximal run of set bits in `bits`, in order.
    pub fn visit_contiguous_ranges(bits: &BitVec, mut visit: impl FnMut(LeafRange)) {
        let mut current: Option<usize> = None;
        for (bit, set) in bits.iter().enumerate() {
            match (current, set) {
                (Some(start), false) => {
                    visit(LeafRange::new(start, bit));
                    current = None;
                }
                (None, true) => current = Some(bit),
                _ => {}
            }
        }
        if let Some(start) = current {
            visit(LeafRange::new(start, bits.len()));
        }
    }

    /// Split `value`, which covers this range, one level into its elements.
    ///
    /// Struct fields and tuple elements each get a projection inserted
    /// before `insert_pt`, but only when `filter` has at least one of the
    /// element's bits set. A struct's deinit bit belongs to no element and
    /// is skipped. An enum is never split: it is returned whole when
    /// `filter` covers all of its bits and dropped when it covers none.
    ///
    /// # Panics
    ///
    /// Panics if `filter` covers only part of an enum, or if `value`'s type
    /// is a leaf.
    pub fn split_filtered(
        self,
        func: &mut Function,
        counter: &LeafCounter<'_>,
        value: ValueId,
        insert_pt: InstId,
        filter: &BitVec,
    ) -> SmallVec<[Projection; 4]> {
        tracing::trace!(range = %self, filter = %BitsDisplay(filter), "split filtered");
        let category = func.value_category(value);
        let mut out = SmallVec::new();

        match counter.shape(func.value_type(value)) {
            TypeShape::Struct { fields, has_deinit } => {
                let mut start = self.start;
                for (field, &ty) in (0u32..).zip(fields.iter()) {
                    let next = start + counter.leaf_count(ty);
                    let child = LeafRange::new(start, next);
                    start = next;
                    if child.none_set_in(filter) {
                        continue;
                    }
                    let kind = match category {
                        ValueCategory::Address => InstKind::StructElementAddr {
                            operand: value,
                            field,
                        },
                        ValueCategory::Object => InstKind::StructExtract {
                            operand: value,
                            field,
                        },
                    };
                    out.push((insert_projection(func, insert_pt, kind, ty, category), child));
                }
                if has_deinit {
                    start += 1;
                }
                // A fieldless struct still has its one bit.
                let start = start.max(self.start + 1);
                assert_eq!(start, self.end, "struct split does not cover {self}");
            }
            TypeShape::Tuple(elements) => {
                let mut start = self.start;
                for (index, &ty) in (0u32..).zip(elements.iter()) {
                    let next = start + counter.leaf_count(ty);
                    let child = LeafRange::new(start, next);
                    start = next;
                    if child.none_set_in(filter) {
                        continue;
                    }
                    let kind = match category {
                        ValueCategory::Address => InstKind::TupleElementAddr {
                            operand: value,
                            index,
                        },
                        ValueCategory::Object => InstKind::TupleExtract {
                            operand: value,
                            index,
                        },
                    };
                    out.push((insert_projection(func, insert_pt, kind, ty, category), child));
                }
                assert_eq!(start, self.end, "tuple split does not cover {self}");
            }
            TypeShape::Enum { .. } => {
                if self.none_set_in(filter) {
                    return out;
                }
                assert!(
                    self.all_set_in(filter),
                    "enum leaves {self} must be fully set or fully unset, found {}",
                    BitsDisplay(filter)
                );
                out.push((value, self));
            }
            TypeShape::Leaf => panic!(
                "cannot split {} of leaf type {}",
                value,
                counter.pool().display(func.value_type(value))
            ),
        }

        out
    }

    /// Find the coarsest projections of `root` whose ranges exactly cover
    /// the set bits of `needed`, inserting any projection that does not yet
    /// exist before `insert_pt`.
    ///
    /// The result is ordered by range start. A struct's deinit bit belongs
    /// to no field, so it is only covered when the whole struct is: a
    /// needed deinit bit inside a partially needed struct yields no
    /// projection.
    ///
    /// # Panics
    ///
    /// Panics if `needed` is not sized to `root`'s leaf count, or if it
    /// covers only part of a nested enum.
    pub fn cover_needed(
        func: &mut Function,
        counter: &LeafCounter<'_>,
        root: ValueId,
        insert_pt: InstId,
        needed: &BitVec,
    ) -> Vec<Projection> {
        let root_range = LeafRange::for_value(func, counter, root);
        assert_eq!(
            root_range.size(),
            needed.len(),
            "needed bits are not sized to the root's {} leaves",
            root_range.size()
        );
        tracing::debug!(%root, needed = %BitsDisplay(needed), "covering needed leaves");

        let mut result = Vec::new();
        let mut worklist: Vec<Projection> = vec![(root, root_range)];

        while let Some((value, range)) = worklist.pop() {
            if range.none_set_in(needed) {
                continue;
            }
            if range.all_set_in(needed) {
                result.push((value, range));
                continue;
            }
            let children = range.split_filtered(func, counter, value, insert_pt, needed);
            // Pushed in reverse so they pop in layout order.
            worklist.extend(children.into_iter().rev());
        }

        result
    }
}

fn insert_projection(
    func: &mut Function,
    insert_pt: InstId,
    kind: InstKind,
    ty: TypeId,
    category: ValueCategory,
) -> ValueId {
    let inst = func.insert_before(insert_pt, kind, &[(ty, category)]);
    func.results(inst)[0]
}

impl fmt::Display for LeafRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
