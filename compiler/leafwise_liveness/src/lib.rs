//! Field-sensitive pruned liveness for aggregate values.
//!
//! An aggregate (struct, tuple or enum, possibly nested) is flattened into
//! *leaves*, numbered in depth-first order. Liveness is tracked per leaf, so
//! a use of one field keeps only that field alive. Blocks are only ever
//! visited backward from uses, so work is proportional to the live region.
//!
//! # Pieces
//!
//! - **Leaf numbering** ([`LeafCounter`], [`SubElementOffset`], [`LeafRange`]):
//!   how many leaves a type has, where a projection starts inside its root,
//!   and splitting a value into projections that cover a set of leaves.
//! - **Block liveness** ([`LiveBlocks`], [`IsLive`]): per-block, per-leaf
//!   `Dead < LiveWithin < LiveOut` states, grown by a backward walk.
//! - **Uses** ([`FieldLiveness`], [`UseKind`]): which instructions use
//!   which leaves, and whether the use ends the lifetime.
//! - **Live ranges** ([`SsaLiveRange`], [`MultiDefLiveRange`]): liveness
//!   plus definitions, with point queries and boundary computation into a
//!   [`Boundary`] of last users, dead defs and boundary edges.
//! - **Earlier-use search** ([`LiveRange::find_earlier_consuming_use`]).
//! - **Scripts** ([`script::run_script`]): a textual self-test harness.
//!
//! # Debugging
//!
//! Enable tracing with environment variables:
//! - `RUST_LOG=leafwise_liveness=debug` - query entry and exit
//! - `RUST_LOG=leafwise_liveness=trace` - per-instruction scans (very verbose)

mod bits;
pub mod blocks;
pub mod boundary;
pub mod earlier_use;
pub mod graph;
pub mod leaf_count;
pub mod live_range;
pub mod liveness;
pub mod offset;
pub mod range;
pub mod script;

#[cfg(test)]
mod test_helpers;

pub use bits::BitsDisplay;
pub use blocks::{IsLive, LiveBlocks, LivenessVec};
pub use boundary::{Boundary, BoundaryDisplay};
pub use graph::Cfg;
pub use leaf_count::LeafCounter;
pub use live_range::{DefTable, LiveRange, MultiDefLiveRange, MultiDefs, SsaDef, SsaLiveRange};
pub use liveness::{FieldLiveness, Interest, UseKind};
pub use offset::SubElementOffset;
pub use range::{LeafRange, Projection};
pub use script::{run_script, ScriptError};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Only the first call does anything, and only when `RUST_LOG` holds a
/// valid filter. A subscriber installed elsewhere is left in place.
/// [`run_script`] calls this, so harness runs honour `RUST_LOG`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let Ok(filter) = EnvFilter::try_from_default_env() else {
            return;
        };
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_test_writer())
            .with(filter)
            .try_init();
    });
}
