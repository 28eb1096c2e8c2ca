// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thicket Scene: a retained-mode 2D scene graph with spatial indexing.
//!
//! The scene owns a tree of items, each with local bounds, a position and
//! transform relative to its parent, a z-value, opacity, and behavior flags.
//! On top of that tree it maintains:
//!
//! - A **lazy transform cache**: [`Scene::scene_transform`] memoizes each
//!   item's transform into scene coordinates and revalidates exactly the
//!   dirty ancestor prefix a query needs, never more.
//! - A **spatial index** ([`thicket_index`]) over scene-space AABBs,
//!   synchronized by the batched [`Scene::commit`] step.
//! - A **stacking order**: the behind-parent flag, then z-value, then
//!   sibling insertion order decide which of two items is in front. A
//!   cached global ordering integer, assigned by one depth-first traversal,
//!   makes repeated comparisons and sorts cheap.
//!
//! ## Queries
//!
//! [`Scene::items_at_point`] and [`Scene::items_in_rect`] consult the index
//! for an estimate and refine it with exact geometry: local-bounds tests in
//! item space, ancestor clip walks, visibility/enabled/opacity culling, and
//! optional exact shapes supplied through [`ShapeSource`]. Results are
//! ordered by stacking order. [`Scene::drawable_items_for`] is the paint
//! driver boundary: ascending paint order, culled to a viewport.
//!
//! ## Batching
//!
//! Mutations only record dirty state. [`Scene::commit`] is the drain point
//! the host calls once per tick; it revalidates the transforms the index
//! needs, flushes index updates, maintains the observed scene rectangle,
//! and returns coarse damage. Queries issued between mutations and commit
//! refine against the last-committed index content, which is why index
//! results are treated as estimates throughout.
//!
//! ## Handles
//!
//! Items are addressed by generational [`ItemId`] handles. Stale handles are
//! detected on every use and make the call a no-op (with a debug diagnostic)
//! rather than touching another item's slot.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod order;
mod query;
mod tree;
mod types;
mod util;

pub use query::{QueryMode, SortOrder};
pub use tree::{Scene, SceneError};
pub use types::{BoundsShape, ItemFlags, ItemId, LocalItem, ShapeSource, Visibility};
