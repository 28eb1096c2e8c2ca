// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thicket Damage: convert item mutations into minimal per-view repaint
//! regions.
//!
//! The tracker accumulates per-item dirty state between ticks and turns it
//! into invalidation rectangles for each attached view in one
//! [`DamageTracker::process`] pass. The bias is stated by contract: never
//! repaint more than necessary, but always err toward *some* repaint over a
//! missed one.
//!
//! ## Marking
//!
//! [`DamageTracker::mark_dirty`] records a [`DirtyRequest`] against an item:
//! a partial local rectangle or a whole-item update, optionally forcing a
//! repaint of hidden content or ignoring transparency. Requests coalesce:
//! a pending whole-item update subsumes later partial rectangles (while
//! still OR-ing their force flags), repeated partial rectangles union, and
//! a scene-wide [`DamageTracker::invalidate_all`] subsumes everything.
//! Marking also walks the parent chain so the processing pass can skip
//! clean subtrees wholesale.
//!
//! ## Processing
//!
//! [`DamageTracker::process`] runs once per tick, before paint: a
//! depth-first walk over the scene that skips clean, hidden, and fully
//! transparent subtrees (with the documented exceptions), maps each dirty
//! item's bounds through the transform cache and every view's device
//! transform, unions with the previously painted bounds to form the
//! invalidation delta, and maintains that painted-bounds bookkeeping for
//! the next pass.
//!
//! ## Views
//!
//! Views are the paint-driver boundary: the host registers each attached
//! viewport with its device transform via [`DamageTracker::add_view`] and
//! updates it on scroll/zoom with [`DamageTracker::set_view`].
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod tracker;
mod types;

pub use tracker::DamageTracker;
pub use types::{DamageOutput, DirtyRequest, ViewId};
