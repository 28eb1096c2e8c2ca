// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thicket Index: a 2D AABB index with batched updates and pluggable backends.
//!
//! The index stores one axis-aligned bounding box per entry, identified by a
//! generational [`Key`], and answers point and rectangle queries over the
//! last-committed boxes.
//!
//! ## Estimates, not exact answers
//!
//! Query results are **estimates**: every entry whose last-committed AABB
//! intersects the query region is reported, and boxes may be stale between a
//! geometry change and the next [`Index::commit`]. Callers are expected to
//! refine results with an exact geometric test. The guarantee the index does
//! make is the superset property: the exact result set is always contained
//! in the estimate.
//!
//! ## Batching
//!
//! Inserts, updates, and removals are recorded as pending marks and applied
//! by [`Index::commit`], which also returns a [`Damage`] summary of
//! added/removed/moved boxes. When the pending backlog crosses the rebuild
//! threshold, commit rebuilds the backend wholesale instead of applying
//! changes one at a time, amortizing cost across many mutations in one tick.
//!
//! ## Backends
//!
//! - [`backends::Linear`]: a flat vector with linear scans. O(1) updates;
//!   the right choice for small or highly dynamic sets.
//! - [`backends::Bsp`] (feature `backend_bsp`, default): recursive binary
//!   bisection of a world rectangle. Sub-linear queries for mostly static
//!   scenes.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod backend;
pub mod backends;
mod damage;
mod index;
mod types;

pub use backend::Backend;
pub use damage::Damage;
pub use index::{Index, Key};
pub use types::Aabb;
