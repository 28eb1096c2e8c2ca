// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait implemented by the spatial structures behind [`crate::Index`].

use crate::types::Aabb;

/// Spatial structure abstraction used by [`crate::Index`].
///
/// A backend stores one AABB per slot index and reports slots matching point
/// and rectangle queries. Slot indices are dense and managed by the index;
/// backends never see generations or payloads. A backend reports each
/// matching slot exactly once per visit, in an unspecified order.
pub trait Backend {
    /// Insert a new slot into the spatial structure.
    fn insert(&mut self, slot: usize, aabb: Aabb);

    /// Update an existing slot's AABB.
    fn update(&mut self, slot: usize, aabb: Aabb);

    /// Remove a slot from the spatial structure.
    fn remove(&mut self, slot: usize);

    /// Clear all spatial structures.
    fn clear(&mut self);

    /// Visit slots whose AABB contains the point.
    fn visit_point<F: FnMut(usize)>(&self, x: f64, y: f64, f: F);

    /// Visit slots whose AABB intersects the rectangle.
    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb, f: F);
}
