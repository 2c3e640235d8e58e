//! Leaf counting over the type pool.
//!
//! A *leaf* is one tracked bit of an aggregate's flattened layout. The
//! arithmetic here defines the bit layout every other module indexes into:
//!
//! - primitives, opaque and unreferenceable types: 1
//! - tuple: sum of its elements
//! - struct: sum of its stored fields plus 1 if it has a deinit, at least 1
//! - enum: the largest payload plus 1 for the discriminant
//!
//! Payloads occupy the low bits of an enum's range; the discriminant is the
//! top bit. A struct's deinit bit trails its fields.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use leafwise_ir::{ExpansionContext, TypeId, TypePool, TypeShape};

/// Leaf counter bound to one pool and one expansion context.
///
/// The context is fixed at construction, so every offset and range one
/// analysis computes agrees on the layout.
///
/// # Interior Mutability
///
/// Counts are memoized in a `RefCell` so queries take `&self`. A type that
/// re-enters itself while being counted is treated as a single leaf.
pub struct LeafCounter<'pool> {
    pool: &'pool TypePool,
    ctx: ExpansionContext,
    cache: RefCell<FxHashMap<TypeId, usize>>,
    /// Types currently being counted, for cycle detection.
    counting: RefCell<FxHashSet<TypeId>>,
}

impl<'pool> LeafCounter<'pool> {
    pub fn new(pool: &'pool TypePool, ctx: ExpansionContext) -> Self {
        Self {
            pool,
            ctx,
            cache: RefCell::new(FxHashMap::default()),
            counting: RefCell::new(FxHashSet::default()),
        }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &'pool TypePool {
        self.pool
    }

    pub fn context(&self) -> ExpansionContext {
        self.ctx
    }

    /// Decompose one level of `ty` under this counter's context.
    pub fn shape(&self, ty: TypeId) -> TypeShape {
        self.pool.shape(ty, self.ctx)
    }

    /// Number of leaves in `ty`.
    pub fn leaf_count(&self, ty: TypeId) -> usize {
        if ty.is_primitive() {
            return 1;
        }

        if let Some(&cached) = self.cache.borrow().get(&ty) {
            return cached;
        }

        if !self.counting.borrow_mut().insert(ty) {
            return 1;
        }

        let count = self.count_by_shape(ty);

        self.counting.borrow_mut().remove(&ty);
        self.cache.borrow_mut().insert(ty, count);
        count
    }

    fn count_by_shape(&self, ty: TypeId) -> usize {
        match self.shape(ty) {
            TypeShape::Leaf => 1,
            TypeShape::Tuple(elements) => self.sum(&elements),
            TypeShape::Struct { fields, has_deinit } => {
                // The deinit bit trails the fields; a struct never has zero bits.
                (self.sum(&fields) + usize::from(has_deinit)).max(1)
            }
            TypeShape::Enum { payloads } => {
                let widest = payloads
                    .iter()
                    .flatten()
                    .map(|&payload| self.leaf_count(payload))
                    .max()
                    .unwrap_or(0);
                widest + 1
            }
        }
    }

    fn sum(&self, types: &[TypeId]) -> usize {
        types.iter().map(|&ty| self.leaf_count(ty)).sum()
    }

    /// Leaves occupied by the siblings that precede `index` in `types`.
    ///
    /// This is the offset contributed by selecting element `index` of a
    /// tuple or field `index` of a struct.
    pub fn leaves_before(&self, types: &[TypeId], index: usize) -> usize {
        self.sum(&types[..index.min(types.len())])
    }
}

#[cfg(test)]
mod tests;
