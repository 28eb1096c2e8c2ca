// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene: item identifiers, flags, and local geometry.

use kurbo::{Affine, BezPath, Rect, Vec2};

/// Identifier for an item in the scene.
///
/// This is a small, copyable handle that stays stable across updates but
/// becomes invalid when the underlying slot is reused. It consists of a slot
/// index and a generation counter.
///
/// ## Semantics
///
/// - On insert, a fresh slot is allocated with generation `1`.
/// - On remove, the slot is freed; any existing `ItemId` that pointed to
///   that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a
///   new, distinct `ItemId`.
///
/// Use [`Scene::is_alive`](crate::Scene::is_alive) to check whether an
/// `ItemId` still refers to a live item. Stale `ItemId`s never alias a
/// different live item because the generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ItemId(pub(crate) u32, pub(crate) u32);

impl ItemId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Behavior flags for an item.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u16 {
        /// The item's local bounds clip descendant hit-testing and damage.
        const CLIPS_CHILDREN        = 1 << 0;
        /// Stack behind the parent instead of in front of it.
        const STACKS_BEHIND_PARENT  = 1 << 1;
        /// Do not inherit ancestor opacity.
        const IGNORES_PARENT_OPACITY = 1 << 2;
        /// Do not propagate this item's opacity to its children.
        const CHILDREN_IGNORE_OPACITY = 1 << 3;
        /// Ignore ancestor transforms; positioned in device space
        /// (screen-space overlays). Such items are kept out of the spatial
        /// index and resolved per query against the device transform.
        const IGNORES_TRANSFORM     = 1 << 4;
        /// The item paints nothing itself; it exists for structure (e.g. as
        /// a clip or grouping node).
        const NO_CONTENTS           = 1 << 5;
        /// The item wants hover enter/leave/move notifications.
        const ACCEPTS_HOVER         = 1 << 6;
        /// The item can take keyboard focus.
        const FOCUSABLE             = 1 << 7;
        /// The item is a modal panel: while active it blocks event delivery
        /// to items outside its subtree.
        const PANEL                 = 1 << 8;
    }
}

/// Effective visibility of an item.
///
/// Storage is a single explicitly-hidden bit per item; this enum is the
/// derived answer, so "hidden by an ancestor while locally visible" and
/// similar combinations cannot be mis-stated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// The item and all its ancestors are visible.
    Visible,
    /// The item itself was hidden with `set_visible(false)`.
    ExplicitlyHidden,
    /// The item is visible itself but some ancestor is hidden.
    ImplicitlyHidden,
}

/// Local geometry and behavior for an item.
#[derive(Clone, Debug)]
pub struct LocalItem {
    /// Local (untransformed) bounding rectangle, supplied by the item and
    /// treated as immutable input by the engine.
    pub local_bounds: Rect,
    /// Offset from the parent (or from the scene origin for top-level
    /// items).
    pub pos: Vec2,
    /// Additional local transform applied after `pos`.
    pub local_transform: Affine,
    /// Z-value within the parent stacking context. Higher is in front.
    pub z: f64,
    /// Own opacity in `[0, 1]`; effective opacity multiplies ancestors
    /// unless flags opt out.
    pub opacity: f64,
    /// Behavior flags.
    pub flags: ItemFlags,
}

impl Default for LocalItem {
    fn default() -> Self {
        Self {
            local_bounds: Rect::ZERO,
            pos: Vec2::ZERO,
            local_transform: Affine::IDENTITY,
            z: 0.0,
            opacity: 1.0,
            flags: ItemFlags::empty(),
        }
    }
}

/// Capability seam supplying exact item outlines.
///
/// The engine stores only bounding rectangles. Hosts whose items have
/// non-rectangular outlines implement this trait and pass it to the shape
/// query modes; returning `None` for an item falls back to its bounds
/// rectangle.
///
/// Point queries test the returned path exactly (winding rule). Rectangle
/// queries refine against the path's bounding box, which is conservative
/// for curved outlines.
pub trait ShapeSource {
    /// Exact local-space outline for an item, or `None` to use its bounds.
    fn shape(&self, id: ItemId) -> Option<BezPath>;
}

/// The trivial [`ShapeSource`]: every item is its bounds rectangle.
#[derive(Copy, Clone, Debug, Default)]
pub struct BoundsShape;

impl ShapeSource for BoundsShape {
    #[inline]
    fn shape(&self, _id: ItemId) -> Option<BezPath> {
        None
    }
}
