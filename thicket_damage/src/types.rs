// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types: view handles, dirty requests, and the processing output.

use alloc::vec::Vec;
use kurbo::Rect;

/// Handle for a registered view (an attached viewport).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewId(pub(crate) u32);

impl ViewId {
    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A repaint request against one item.
///
/// `rect: None` means the whole item. A non-`None` zero-area rectangle is a
/// no-op by contract.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirtyRequest {
    /// Local-space rectangle to repaint, or `None` for the whole item.
    pub rect: Option<Rect>,
    /// Also repaint every descendant in full.
    pub invalidate_children: bool,
    /// Repaint even if the item is hidden (needed when hiding: the area the
    /// item used to cover must still be restored).
    pub force: bool,
    /// Repaint even if the item is fully transparent.
    pub ignore_opacity: bool,
    /// The item's bounds may have changed; ancestors refresh their
    /// children-bounds bookkeeping.
    pub update_bounds: bool,
}

impl DirtyRequest {
    /// Whole-item repaint with a bounds update (the geometry-change case).
    pub const fn full() -> Self {
        Self {
            rect: None,
            invalidate_children: false,
            force: false,
            ignore_opacity: false,
            update_bounds: true,
        }
    }

    /// Partial content repaint of a local-space rectangle.
    pub const fn rect(rect: Rect) -> Self {
        Self {
            rect: Some(rect),
            invalidate_children: false,
            force: false,
            ignore_opacity: false,
            update_bounds: false,
        }
    }

    /// Also repaint all descendants in full.
    pub const fn with_children(mut self) -> Self {
        self.invalidate_children = true;
        self
    }

    /// Repaint even if hidden.
    pub const fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Repaint even if fully transparent.
    pub const fn ignoring_opacity(mut self) -> Self {
        self.ignore_opacity = true;
        self
    }
}

/// Per-view invalidation regions produced by one processing pass.
#[derive(Clone, Debug, Default)]
pub struct DamageOutput {
    /// One entry per registered view; rectangles are in device coordinates,
    /// clipped to the viewport. Rectangles contained in another rectangle
    /// of the same view are dropped, but the list is not a minimal cover.
    pub per_view: Vec<(ViewId, Vec<Rect>)>,
}

impl DamageOutput {
    /// The region list for one view, if it was registered during the pass.
    pub fn regions(&self, view: ViewId) -> Option<&[Rect]> {
        self.per_view
            .iter()
            .find(|(v, _)| *v == view)
            .map(|(_, r)| r.as_slice())
    }

    /// True if no view needs any repaint.
    pub fn is_empty(&self) -> bool {
        self.per_view.iter().all(|(_, r)| r.is_empty())
    }
}
