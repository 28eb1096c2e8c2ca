// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial queries: estimate collection, exact refinement, ordering.
//!
//! Every query runs in two stages. The spatial index (plus the bucket of
//! untransformable items) produces an **estimate**: a superset of the exact
//! answer based on last-committed AABBs. Refinement then maps the query into
//! each candidate's local space, tests exact geometry per [`QueryMode`],
//! walks ancestor clips, and culls invisible, disabled, and fully
//! transparent items. Results are sorted by stacking order.

use alloc::vec::Vec;
use kurbo::{Affine, Point, Rect, Shape as _};
use thicket_index::Backend;

use crate::tree::Scene;
use crate::types::{ItemFlags, ItemId, ShapeSource, Visibility};
use crate::util::{
    quad_overlaps_rect, rect_contains_quad, rect_to_aabb, transform_rect_bbox,
    transform_rect_quad,
};

/// How a rectangle query matches an item.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryMode {
    /// The query rectangle intersects the item's bounds.
    IntersectsBounds,
    /// The query rectangle fully contains the item's bounds.
    ContainsBounds,
    /// The query rectangle intersects the item's shape. Refines against the
    /// shape's bounding box, which is conservative for curved outlines.
    IntersectsShape,
    /// The query rectangle fully contains the item's shape (by its
    /// bounding box).
    ContainsShape,
}

/// Ordering of query results by stacking order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortOrder {
    /// Back-to-front (paint order).
    Ascending,
    /// Front-to-back (topmost first; hit-test order).
    Descending,
}

impl<B: Backend> Scene<B> {
    /// Items whose geometry contains the scene-space point, topmost first.
    ///
    /// Shorthand for [`Scene::hit_test`] with an identity device transform.
    pub fn items_at_point(&mut self, pt: Point, shapes: &impl ShapeSource) -> Vec<ItemId> {
        self.hit_test(pt, Affine::IDENTITY, shapes)
    }

    /// Items whose geometry contains the device-space point, topmost first.
    ///
    /// `device` maps scene to device coordinates; untransformable items are
    /// resolved against it per query. This is the hit-test boundary used by
    /// input sources feeding an event router.
    pub fn hit_test(
        &mut self,
        pt: Point,
        device: Affine,
        shapes: &impl ShapeSource,
    ) -> Vec<ItemId> {
        let scene_pt = device.inverse() * pt;
        let mut out: Vec<ItemId> = Vec::new();
        for id in self.point_candidates(scene_pt) {
            if !self.is_alive(id) || !self.hit_eligible(id) {
                continue;
            }
            if self.point_hits(id, pt, device, shapes) {
                out.push(id);
            }
        }
        self.ensure_stacking();
        out.sort_by_key(|id| core::cmp::Reverse(self.stacking_order_raw(*id)));
        out
    }

    /// Items matching a scene-space rectangle query, sorted per `order`.
    ///
    /// Untransformable items participate with their anchored (identity
    /// device) placement.
    pub fn items_in_rect(
        &mut self,
        rect: Rect,
        mode: QueryMode,
        order: SortOrder,
        shapes: &impl ShapeSource,
    ) -> Vec<ItemId> {
        let mut out: Vec<ItemId> = Vec::new();
        for id in self.rect_candidates(rect) {
            if !self.is_alive(id) || !self.hit_eligible(id) {
                continue;
            }
            if self.rect_hits(id, rect, mode, shapes) {
                out.push(id);
            }
        }
        self.ensure_stacking();
        match order {
            SortOrder::Ascending => out.sort_by_key(|id| self.stacking_order_raw(*id)),
            SortOrder::Descending => {
                out.sort_by_key(|id| core::cmp::Reverse(self.stacking_order_raw(*id)));
            }
        }
        out
    }

    /// Items matching an arbitrary query outline (polygon, path), sorted
    /// per `order`.
    ///
    /// The outline is reduced to its bounding box for both the index
    /// estimate and the refinement, so for non-rectangular outlines the
    /// result is conservative: a superset of the exact answer, which
    /// callers with stricter needs can filter further.
    pub fn items_in_shape(
        &mut self,
        region: &impl kurbo::Shape,
        order: SortOrder,
        shapes: &impl ShapeSource,
    ) -> Vec<ItemId> {
        self.items_in_rect(
            region.bounding_box(),
            QueryMode::IntersectsBounds,
            order,
            shapes,
        )
    }

    /// The items a paint driver should draw for `viewport` under `device`,
    /// in ascending paint order.
    ///
    /// Culls invisible, disabled, fully transparent, and `NO_CONTENTS`
    /// items, plus anything whose clip-intersected bounds miss the
    /// viewport.
    pub fn drawable_items_for(&mut self, viewport: Rect, device: Affine) -> Vec<ItemId> {
        let scene_region = transform_rect_bbox(device.inverse(), viewport);
        let mut out: Vec<ItemId> = Vec::new();
        for id in self.rect_candidates(scene_region) {
            if !self.is_alive(id) || !self.hit_eligible(id) {
                continue;
            }
            if self
                .node(id)
                .local
                .flags
                .contains(ItemFlags::NO_CONTENTS)
            {
                continue;
            }
            let Some(eff) = self.effective_scene_bounds(id) else {
                continue;
            };
            let i = eff.intersect(scene_region);
            if i.width() < 0.0 || i.height() < 0.0 {
                continue;
            }
            out.push(id);
        }
        self.ensure_stacking();
        out.sort_by_key(|id| self.stacking_order_raw(*id));
        out
    }

    // --- candidates ---

    fn point_candidates(&self, pt: Point) -> Vec<ItemId> {
        let mut out: Vec<ItemId> = self.index.query_point(pt.x, pt.y).map(|(_, id)| id).collect();
        out.extend(self.unindexed.iter().copied());
        out
    }

    fn rect_candidates(&self, rect: Rect) -> Vec<ItemId> {
        let mut out: Vec<ItemId> = self
            .index
            .query_rect(rect_to_aabb(rect))
            .map(|(_, id)| id)
            .collect();
        out.extend(self.unindexed.iter().copied());
        out
    }

    // --- refinement ---

    /// Visible, enabled, and not fully transparent.
    fn hit_eligible(&self, id: ItemId) -> bool {
        matches!(self.visibility(id), Some(Visibility::Visible))
            && self.is_effectively_enabled(id) == Some(true)
            && self
                .effective_opacity(id)
                .is_some_and(|o| o >= Self::OPACITY_EPSILON)
    }

    fn point_hits(
        &mut self,
        id: ItemId,
        pt: Point,
        device: Affine,
        shapes: &impl ShapeSource,
    ) -> bool {
        let Some(tf) = self.device_transform(id, device) else {
            return false;
        };
        let local = tf.inverse() * pt;
        let inside = match shapes.shape(id) {
            Some(path) => path.contains(local),
            None => self.node(id).local.local_bounds.contains(local),
        };
        if !inside {
            return false;
        }
        // Walk ancestor clips: each clipping ancestor must contain the
        // point within its own bounds, tested in its own space.
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            if self.node(p).local.flags.contains(ItemFlags::CLIPS_CHILDREN) {
                let Some(ptf) = self.device_transform(p, device) else {
                    return false;
                };
                let plocal = ptf.inverse() * pt;
                if !self.node(p).local.local_bounds.contains(plocal) {
                    return false;
                }
            }
            cur = self.node(p).parent;
        }
        true
    }

    fn rect_hits(
        &mut self,
        id: ItemId,
        rect: Rect,
        mode: QueryMode,
        shapes: &impl ShapeSource,
    ) -> bool {
        let Some(tf) = self.scene_transform(id) else {
            return false;
        };
        let base = match mode {
            QueryMode::IntersectsShape | QueryMode::ContainsShape => shapes
                .shape(id)
                .map(|p| p.bounding_box())
                .unwrap_or(self.node(id).local.local_bounds),
            QueryMode::IntersectsBounds | QueryMode::ContainsBounds => {
                self.node(id).local.local_bounds
            }
        };
        let quad = transform_rect_quad(tf, base);
        let geom_ok = match mode {
            QueryMode::IntersectsBounds | QueryMode::IntersectsShape => {
                quad_overlaps_rect(&quad, rect)
            }
            QueryMode::ContainsBounds | QueryMode::ContainsShape => {
                rect_contains_quad(rect, &quad)
            }
        };
        if !geom_ok {
            return false;
        }
        // Intersection queries respect ancestor clips: the clipped bounds
        // must still reach the query rectangle.
        if matches!(mode, QueryMode::IntersectsBounds | QueryMode::IntersectsShape)
            && let Some(eff) = self.effective_scene_bounds(id)
        {
            let i = eff.intersect(rect);
            if i.width() < 0.0 || i.height() < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundsShape, LocalItem};
    use kurbo::{Shape as _, Vec2};

    fn item(bounds: Rect, z: f64) -> LocalItem {
        LocalItem {
            local_bounds: bounds,
            z,
            ..LocalItem::default()
        }
    }

    /// Scene from the routing contract: A (z=0, 100x100) with child B
    /// (z=1, pos 10,10, 20x20).
    fn a_and_b() -> (Scene, ItemId, ItemId) {
        let mut scene: Scene = Scene::new();
        let a = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0), 0.0));
        let b = scene.insert(
            Some(a),
            LocalItem {
                pos: Vec2::new(10.0, 10.0),
                ..item(Rect::new(0.0, 0.0, 20.0, 20.0), 1.0)
            },
        );
        let _ = scene.commit();
        (scene, a, b)
    }

    #[test]
    fn point_query_topmost_first() {
        let (mut scene, a, b) = a_and_b();
        let hits = scene.items_at_point(Point::new(15.0, 15.0), &BoundsShape);
        assert_eq!(hits, [b, a], "descending stacking order expected");
        // A point outside B but inside A.
        let hits = scene.items_at_point(Point::new(50.0, 50.0), &BoundsShape);
        assert_eq!(hits, [a]);
    }

    #[test]
    fn reparenting_to_top_level_preserves_hit_result() {
        let (mut scene, a, b) = a_and_b();
        scene.reparent(b, None).unwrap();
        let _ = scene.commit();
        let hits = scene.items_at_point(Point::new(15.0, 15.0), &BoundsShape);
        assert_eq!(hits, [b, a], "same scene position, same order");
    }

    #[test]
    fn zero_opacity_parent_culls_subtree() {
        let (mut scene, a, b) = a_and_b();
        scene.set_opacity(a, 0.0);
        let hits = scene.items_at_point(Point::new(15.0, 15.0), &BoundsShape);
        assert_eq!(hits, [], "inherited zero opacity hides both");

        scene.set_flags(
            b,
            scene.flags(b).unwrap() | ItemFlags::IGNORES_PARENT_OPACITY,
        );
        let _ = scene.commit();
        let hits = scene.items_at_point(Point::new(15.0, 15.0), &BoundsShape);
        assert_eq!(hits, [b], "opacity-independent child survives alone");
    }

    #[test]
    fn hidden_and_disabled_subtrees_are_excluded() {
        let (mut scene, a, b) = a_and_b();
        scene.set_visible(a, false);
        assert!(
            scene
                .items_at_point(Point::new(15.0, 15.0), &BoundsShape)
                .is_empty()
        );
        scene.set_visible(a, true);
        scene.set_enabled(a, false);
        assert!(
            scene
                .items_at_point(Point::new(15.0, 15.0), &BoundsShape)
                .is_empty(),
            "disabled subtree must not hit"
        );
        let _ = b;
    }

    #[test]
    fn inside_aabb_but_outside_rotated_bounds_misses() {
        let mut scene: Scene = Scene::new();
        let _ = scene.insert(
            None,
            LocalItem {
                local_bounds: Rect::new(-100.0, -100.0, 100.0, 100.0),
                local_transform: Affine::rotate(45_f64.to_radians()),
                ..LocalItem::default()
            },
        );
        let _ = scene.commit();
        // (90, 90) is inside the rotated square's AABB but outside the
        // square itself; the estimate must be refined away.
        assert!(
            scene
                .items_at_point(Point::new(90.0, 90.0), &BoundsShape)
                .is_empty()
        );
        assert_eq!(
            scene
                .items_at_point(Point::new(0.0, 0.0), &BoundsShape)
                .len(),
            1
        );
    }

    #[test]
    fn clipping_ancestor_bounds_hits() {
        let mut scene: Scene = Scene::new();
        let clipper = scene.insert(
            None,
            LocalItem {
                local_bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
                flags: ItemFlags::CLIPS_CHILDREN,
                ..LocalItem::default()
            },
        );
        let child = scene.insert(
            Some(clipper),
            item(Rect::new(80.0, 80.0, 180.0, 180.0), 0.0),
        );
        let _ = scene.commit();

        // Inside the child and the clip.
        let hits = scene.items_at_point(Point::new(90.0, 90.0), &BoundsShape);
        assert_eq!(hits, [child, clipper]);
        // Inside the child, outside the clip.
        assert!(
            scene
                .items_at_point(Point::new(150.0, 150.0), &BoundsShape)
                .is_empty()
        );
    }

    #[test]
    fn estimate_superset_property() {
        let mut scene: Scene = Scene::new();
        let mut all = Vec::new();
        for i in 0..25 {
            let x = f64::from(i % 5) * 40.0;
            let y = f64::from(i / 5) * 40.0;
            all.push(scene.insert(None, item(Rect::new(x, y, x + 60.0, y + 60.0), 0.0)));
        }
        let _ = scene.commit();
        let query = Rect::new(50.0, 50.0, 130.0, 130.0);
        let exact = scene.items_in_rect(
            query,
            QueryMode::IntersectsBounds,
            SortOrder::Ascending,
            &BoundsShape,
        );
        // Exact result must be a subset of the raw index estimate.
        let estimate: Vec<ItemId> = scene
            .index
            .query_rect(rect_to_aabb(query))
            .map(|(_, id)| id)
            .collect();
        for id in &exact {
            assert!(estimate.contains(id), "refined hit missing from estimate");
        }
        assert!(!exact.is_empty());
    }

    #[test]
    fn rect_query_modes_and_order() {
        let mut scene: Scene = Scene::new();
        let small = scene.insert(None, item(Rect::new(10.0, 10.0, 20.0, 20.0), 0.0));
        let large = scene.insert(None, item(Rect::new(0.0, 0.0, 200.0, 200.0), 1.0));
        let _ = scene.commit();

        let q = Rect::new(0.0, 0.0, 50.0, 50.0);
        let contains = scene.items_in_rect(
            q,
            QueryMode::ContainsBounds,
            SortOrder::Ascending,
            &BoundsShape,
        );
        assert_eq!(contains, [small], "only the small item fits inside");

        let intersects = scene.items_in_rect(
            q,
            QueryMode::IntersectsBounds,
            SortOrder::Descending,
            &BoundsShape,
        );
        assert_eq!(intersects, [large, small], "descending stacking order");
    }

    #[test]
    fn shape_source_refines_point_hits() {
        struct Circle;
        impl ShapeSource for Circle {
            fn shape(&self, _id: ItemId) -> Option<kurbo::BezPath> {
                Some(kurbo::Circle::new(Point::new(50.0, 50.0), 50.0).to_path(1e-3))
            }
        }

        let mut scene: Scene = Scene::new();
        let _ = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0), 0.0));
        let _ = scene.commit();

        // The corner is inside the bounds but outside the circular shape.
        assert!(scene.items_at_point(Point::new(3.0, 3.0), &Circle).is_empty());
        assert_eq!(scene.items_at_point(Point::new(50.0, 50.0), &Circle).len(), 1);
    }

    #[test]
    fn shape_region_query_is_a_conservative_superset() {
        let mut scene: Scene = Scene::new();
        let near = scene.insert(None, item(Rect::new(0.0, 0.0, 20.0, 20.0), 0.0));
        let far = scene.insert(None, item(Rect::new(500.0, 500.0, 520.0, 520.0), 0.0));
        let _ = scene.commit();

        let region = kurbo::Circle::new(Point::new(10.0, 10.0), 30.0);
        let hits = scene.items_in_shape(&region, SortOrder::Ascending, &BoundsShape);
        assert!(hits.contains(&near));
        assert!(!hits.contains(&far));
    }

    #[test]
    fn drawable_set_is_paint_ordered_and_culled() {
        let mut scene: Scene = Scene::new();
        let back = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0), 0.0));
        let front = scene.insert(None, item(Rect::new(20.0, 20.0, 80.0, 80.0), 5.0));
        let offscreen = scene.insert(None, item(Rect::new(5000.0, 5000.0, 5100.0, 5100.0), 0.0));
        let structural = scene.insert(
            None,
            LocalItem {
                local_bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
                flags: ItemFlags::NO_CONTENTS,
                ..LocalItem::default()
            },
        );
        let _ = scene.commit();

        let drawables =
            scene.drawable_items_for(Rect::new(0.0, 0.0, 200.0, 200.0), Affine::IDENTITY);
        assert_eq!(drawables, [back, front], "ascending paint order");
        assert!(!drawables.contains(&offscreen));
        assert!(!drawables.contains(&structural));
    }

    #[test]
    fn untransformable_items_always_candidates() {
        let mut scene: Scene = Scene::new();
        let overlay = scene.insert(
            None,
            LocalItem {
                local_bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
                pos: Vec2::new(5.0, 5.0),
                flags: ItemFlags::IGNORES_TRANSFORM,
                ..LocalItem::default()
            },
        );
        let _ = scene.commit();

        // Under a zooming device transform the overlay keeps its size: a
        // device point near its anchor hits, scaled by nothing.
        let hits = scene.hit_test(Point::new(12.0, 12.0), Affine::scale(2.0), &BoundsShape);
        assert_eq!(hits, [overlay], "anchor at device (10,10), extent 10x10");
        let miss = scene.hit_test(Point::new(25.0, 25.0), Affine::scale(2.0), &BoundsShape);
        assert!(miss.is_empty(), "outside the unscaled overlay");
    }
}
