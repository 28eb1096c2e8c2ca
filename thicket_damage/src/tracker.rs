// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The damage tracker: per-item dirty records, parent-chain propagation,
//! and the once-per-tick processing pass.

use alloc::vec::Vec;
use hashbrown::HashMap;
use kurbo::{Affine, Rect};
use thicket_index::Backend;
use thicket_scene::{ItemFlags, ItemId, Scene, Visibility};

use crate::types::{DamageOutput, DirtyRequest, ViewId};

#[derive(Clone, Debug, Default)]
struct DirtyRecord {
    /// Whole-item repaint pending; subsumes partial rects.
    full: bool,
    /// Union of partial local-space repaint rects (when not `full`).
    rect: Option<Rect>,
    /// Every descendant repaints in full.
    descendants: bool,
    /// Some descendant is dirty; recurse.
    children: bool,
    /// Some descendant's bounds changed; refresh bookkeeping on the walk.
    children_bounds: bool,
    force: bool,
    ignore_opacity: bool,
}

#[derive(Debug)]
struct ViewRecord {
    viewport: Rect,
    device: Affine,
    /// Device-space bounds each item occupied when last painted.
    painted: HashMap<ItemId, Rect>,
    regions: Vec<Rect>,
}

/// Accumulates dirty state between ticks and converts it into per-view
/// invalidation regions. See the crate docs for the marking and processing
/// contracts.
#[derive(Debug, Default)]
pub struct DamageTracker {
    records: HashMap<ItemId, DirtyRecord>,
    views: Vec<Option<ViewRecord>>,
    all_dirty: bool,
    /// Items whose geometry-affecting state changed; drained by the host's
    /// effect/composition stage to invalidate its caches.
    effect_invalidations: Vec<ItemId>,
}

impl DamageTracker {
    /// Create an empty tracker with no views.
    pub fn new() -> Self {
        Self::default()
    }

    // --- views ---

    /// Register a view with its viewport rectangle and device transform
    /// (scene to device coordinates).
    pub fn add_view(&mut self, viewport: Rect, device: Affine) -> ViewId {
        self.views.push(Some(ViewRecord {
            viewport,
            device,
            painted: HashMap::new(),
            regions: Vec::new(),
        }));
        #[allow(
            clippy::cast_possible_truncation,
            reason = "View counts are tiny; 32 bits is ample."
        )]
        ViewId((self.views.len() - 1) as u32)
    }

    /// Update a view's viewport and device transform (scroll/zoom).
    pub fn set_view(&mut self, view: ViewId, viewport: Rect, device: Affine) {
        match self.views.get_mut(view.idx()) {
            Some(Some(v)) => {
                v.viewport = viewport;
                v.device = device;
            }
            _ => debug_assert!(false, "set_view: unknown view"),
        }
    }

    /// Remove a view and all its bookkeeping.
    pub fn remove_view(&mut self, view: ViewId) {
        if let Some(v) = self.views.get_mut(view.idx()) {
            *v = None;
        } else {
            debug_assert!(false, "remove_view: unknown view");
        }
    }

    // --- marking ---

    /// Mark everything dirty. Subsumes all finer-grained pending work; the
    /// next processing pass emits each view's whole viewport and
    /// short-circuits the tree walk.
    pub fn invalidate_all(&mut self) {
        self.all_dirty = true;
        self.records.clear();
    }

    /// Record a repaint request against an item.
    ///
    /// Coalescing rules:
    /// - a scene-wide `invalidate_all` already pending makes this a no-op;
    /// - a pending whole-item update subsumes partial rects, but force and
    ///   ignore-opacity flags still OR in (a later hide must be able to
    ///   force a repaint of a previously dirty area);
    /// - a zero-area (but non-`None`) rect is a no-op;
    /// - `None` means the whole item.
    ///
    /// Items flagged [`ItemFlags::NO_CONTENTS`] are not marked themselves
    /// but still propagate to ancestors and record an effect invalidation,
    /// since they can be structurally relevant (clip or effect source).
    pub fn mark_dirty<B: Backend>(&mut self, scene: &Scene<B>, id: ItemId, req: DirtyRequest) {
        if self.all_dirty {
            return;
        }
        if !scene.is_alive(id) {
            debug_assert!(false, "mark_dirty: stale item handle");
            return;
        }
        if let Some(r) = req.rect
            && (r.width() <= 0.0 || r.height() <= 0.0)
        {
            return;
        }
        let no_contents = scene
            .flags(id)
            .is_some_and(|f| f.contains(ItemFlags::NO_CONTENTS));
        self.effect_invalidations.push(id);

        let rec = self.records.entry(id).or_default();
        if !no_contents {
            if rec.full {
                // Partial request subsumed by the pending full update.
            } else if let Some(r) = req.rect {
                rec.rect = Some(match rec.rect {
                    Some(acc) => acc.union(r),
                    None => r,
                });
            } else {
                rec.full = true;
                rec.rect = None;
            }
        }
        rec.descendants |= req.invalidate_children;
        rec.force |= req.force;
        rec.ignore_opacity |= req.ignore_opacity;

        self.mark_parent_chain(scene, id, req.update_bounds);
    }

    /// Pull the scene's changed-item log and mark each entry fully dirty.
    ///
    /// Items that are no longer visible are marked with force and
    /// subtree-wide invalidation so the area they vacated repaints.
    pub fn absorb_scene_changes<B: Backend>(&mut self, scene: &mut Scene<B>) {
        let changed = scene.take_changed();
        for id in changed {
            if !scene.is_alive(id) {
                continue;
            }
            let req = if scene.visibility(id) == Some(Visibility::Visible) {
                DirtyRequest::full()
            } else {
                DirtyRequest::full().forced().with_children()
            };
            self.mark_dirty(scene, id, req);
        }
    }

    /// Items whose geometry-affecting state changed since the last drain;
    /// the host's effect/composition stage invalidates its caches from
    /// this list.
    pub fn take_effect_invalidations(&mut self) -> Vec<ItemId> {
        core::mem::take(&mut self.effect_invalidations)
    }

    /// Walk parent links, marking every ancestor as having dirty children.
    /// Bounded by tree depth; continues through already-marked ancestors
    /// because the bounds flag may be newly set.
    fn mark_parent_chain<B: Backend>(&mut self, scene: &Scene<B>, id: ItemId, update_bounds: bool) {
        let mut cur = scene.parent_of(id);
        while let Some(p) = cur {
            let rec = self.records.entry(p).or_default();
            rec.children = true;
            rec.children_bounds |= update_bounds;
            cur = scene.parent_of(p);
        }
    }

    // --- processing ---

    /// Convert accumulated dirty state into per-view invalidation regions.
    ///
    /// Invoked once per tick, before paint. Depth-first over top-level
    /// items; clean subtrees are skipped wholesale, hidden and fully
    /// transparent subtrees are dropped (honoring force and
    /// opacity-opt-out exceptions), and an ancestor whose full repaint
    /// already covers a child suppresses the child's redundant rect.
    pub fn process<B: Backend>(&mut self, scene: &mut Scene<B>) -> DamageOutput {
        if self.all_dirty {
            self.all_dirty = false;
            self.records.clear();
            let mut out = DamageOutput::default();
            for (i, v) in self.views.iter_mut().enumerate() {
                if let Some(v) = v {
                    v.regions.clear();
                    #[allow(
                        clippy::cast_possible_truncation,
                        reason = "View counts are tiny; 32 bits is ample."
                    )]
                    out.per_view.push((ViewId(i as u32), alloc::vec![v.viewport]));
                }
            }
            return out;
        }

        // Items that died since the last pass vacate their painted bounds.
        for v in self.views.iter_mut().flatten() {
            let dead: Vec<Rect> = v
                .painted
                .iter()
                .filter(|(id, _)| !scene.is_alive(**id))
                .map(|(_, r)| *r)
                .collect();
            v.painted.retain(|id, _| scene.is_alive(*id));
            for r in dead {
                push_region(v, r);
            }
        }
        self.records.retain(|id, _| scene.is_alive(*id));

        let tops: Vec<ItemId> = scene.top_items().to_vec();
        for t in tops {
            self.walk(scene, t, false, false, None);
        }

        let mut out = DamageOutput::default();
        for (i, v) in self.views.iter_mut().enumerate() {
            if let Some(v) = v {
                let mut regions = core::mem::take(&mut v.regions);
                coalesce(&mut regions);
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "View counts are tiny; 32 bits is ample."
                )]
                out.per_view.push((ViewId(i as u32), regions));
            }
        }
        out
    }

    fn walk<B: Backend>(
        &mut self,
        scene: &mut Scene<B>,
        id: ItemId,
        inherited_full: bool,
        inherited_force: bool,
        ancestor_cover: Option<Rect>,
    ) {
        let rec = self.records.remove(&id);
        if rec.is_none() && !inherited_full {
            return;
        }
        let rec = rec.unwrap_or_default();
        let force = rec.force || inherited_force;
        let flags = scene.flags(id).unwrap_or(ItemFlags::empty());

        // Hidden subtrees are handled (their records dropped) without
        // emitting anything, unless a force flag says otherwise.
        if scene.visibility(id) != Some(Visibility::Visible) && !force {
            self.clear_subtree_records(scene, id);
            return;
        }

        // Fully transparent subtrees are skipped too, but children that can
        // opt out of inherited opacity still need the recursion.
        let transparent = scene
            .effective_opacity(id)
            .is_some_and(|o| o < Scene::<B>::OPACITY_EPSILON);
        if transparent && !rec.ignore_opacity && !force {
            let children_may_ignore = flags.contains(ItemFlags::CHILDREN_IGNORE_OPACITY)
                || scene.children_of(id).iter().any(|c| {
                    scene
                        .flags(*c)
                        .is_some_and(|f| f.contains(ItemFlags::IGNORES_PARENT_OPACITY))
                });
            if !children_may_ignore {
                self.clear_subtree_records(scene, id);
                return;
            }
            let recurse_full = inherited_full || rec.descendants;
            if rec.children || recurse_full {
                let children = scene.children_of(id).to_vec();
                for c in children {
                    self.walk(scene, c, recurse_full, force, ancestor_cover);
                }
            }
            return;
        }

        let self_dirty = inherited_full || rec.full || rec.rect.is_some();
        let mut cover_for_children = ancestor_cover;

        if self_dirty
            && let Some(clipped) = scene.clipped_scene_bounds(id)
        {
            let local_bounds = scene.local(id).map(|l| l.local_bounds).unwrap_or(Rect::ZERO);
            let full_update = inherited_full || rec.full;
            let local_dirty = if full_update {
                local_bounds
            } else {
                rec.rect.unwrap_or(local_bounds).intersect(local_bounds)
            };
            if let Some(scene_rect) = scene.map_rect_to_scene(id, local_dirty) {
                let scene_rect = scene_rect.intersect(clipped);
                let covered = ancestor_cover.is_some_and(|cov| contains_rect(cov, scene_rect));
                for v in self.views.iter_mut().flatten() {
                    let new_full = map_rect(v.device, clipped);
                    let delta = if full_update {
                        // Geometry may have changed: both the vacated and
                        // the new bounds repaint.
                        match v.painted.get(&id) {
                            Some(prev) => prev.union(new_full),
                            None => new_full,
                        }
                    } else {
                        map_rect(v.device, scene_rect)
                    };
                    if !covered {
                        push_region(v, delta);
                    }
                    v.painted.insert(id, new_full);
                }
                // A full repaint of a clipping item bounds everything below
                // it; descendants inside it need no rects of their own.
                if full_update && flags.contains(ItemFlags::CLIPS_CHILDREN) {
                    cover_for_children = Some(match cover_for_children {
                        Some(cov) if contains_rect(cov, scene_rect) => cov,
                        _ => scene_rect,
                    });
                }
            }
        } else if rec.children_bounds
            && let Some(clipped) = scene.clipped_scene_bounds(id)
        {
            // Not dirty itself, but a descendant's bounds changed: refresh
            // this item's painted-bounds bookkeeping so future deltas are
            // computed against current geometry.
            for v in self.views.iter_mut().flatten() {
                if let Some(e) = v.painted.get_mut(&id) {
                    *e = map_rect(v.device, clipped);
                }
            }
        }

        let recurse_full = inherited_full || rec.descendants;
        if rec.children || recurse_full {
            let children = scene.children_of(id).to_vec();
            for c in children {
                self.walk(scene, c, recurse_full, force, cover_for_children);
            }
        }
    }

    fn clear_subtree_records<B: Backend>(&mut self, scene: &Scene<B>, id: ItemId) {
        self.records.remove(&id);
        let children = scene.children_of(id).to_vec();
        for c in children {
            self.clear_subtree_records(scene, c);
        }
    }
}

fn push_region(v: &mut ViewRecord, rect: Rect) {
    let clipped = rect.intersect(v.viewport);
    if clipped.width() > 0.0 && clipped.height() > 0.0 {
        v.regions.push(clipped);
    }
}

/// Conservative bbox of `rect` under `affine`.
fn map_rect(affine: Affine, rect: Rect) -> Rect {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let min_x = (a * rect.x0).min(a * rect.x1) + (c * rect.y0).min(c * rect.y1);
    let max_x = (a * rect.x0).max(a * rect.x1) + (c * rect.y0).max(c * rect.y1);
    let min_y = (b * rect.x0).min(b * rect.x1) + (d * rect.y0).min(d * rect.y1);
    let max_y = (b * rect.x0).max(b * rect.x1) + (d * rect.y0).max(d * rect.y1);
    Rect::new(min_x + e, min_y + f, max_x + e, max_y + f)
}

fn contains_rect(outer: Rect, inner: Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Drop rectangles fully contained in another rectangle of the same list.
fn coalesce(regions: &mut Vec<Rect>) {
    let mut i = 0;
    while i < regions.len() {
        let r = regions[i];
        let redundant = regions.iter().enumerate().any(|(j, o)| {
            j != i && contains_rect(*o, r) && (*o != r || j < i)
        });
        if redundant {
            regions.swap_remove(i);
        } else {
            i += 1;
        }
    }
}
