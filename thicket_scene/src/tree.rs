// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core scene implementation: structure, mutation, the transform cache, and
//! the batched commit step.

use alloc::vec::Vec;
use kurbo::{Affine, Point, Rect, Vec2};
use thicket_index::{Backend, Damage, Index, Key, backends::Bsp};

use crate::types::{ItemFlags, ItemId, LocalItem, Visibility};
use crate::util::{is_translation, rect_to_aabb, transform_rect_bbox};

/// Errors reported by structural mutations.
///
/// Most contract violations are warn-and-ignore (no-op returns with debug
/// diagnostics); reparenting returns an explicit error because silently
/// ignoring a cycle request tends to hide real host bugs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SceneError {
    /// The item handle does not refer to a live item.
    StaleItem,
    /// The requested reparent would make an item its own ancestor.
    WouldCycle,
}

impl core::fmt::Display for SceneError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StaleItem => write!(f, "stale item handle"),
            Self::WouldCycle => write!(f, "reparent would create a cycle"),
        }
    }
}

pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,
    /// Insertion-order tiebreak among siblings; compacted during the global
    /// stacking traversal.
    pub(crate) sibling_serial: u32,
    /// Next serial handed to a newly linked child.
    pub(crate) child_serial: u32,
    pub(crate) local: LocalItem,
    pub(crate) hidden: bool,
    pub(crate) enabled: bool,
    pub(crate) scene_transform: Affine,
    pub(crate) translate_only: bool,
    pub(crate) dirty_transform: bool,
    /// Cached global paint order (ascending is back-to-front); only valid
    /// while the scene's stacking cache is valid.
    pub(crate) stacking_order: i64,
    pub(crate) index_key: Option<Key>,
    pub(crate) index_stale: bool,
}

impl Node {
    fn new(generation: u32, local: LocalItem) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            sibling_serial: 0,
            child_serial: 0,
            local,
            hidden: false,
            enabled: true,
            scene_transform: Affine::IDENTITY,
            translate_only: true,
            dirty_transform: true,
            stacking_order: 0,
            index_key: None,
            // Freshly false so the first `mark_index_stale` enqueues the
            // item for commit.
            index_stale: false,
        }
    }
}

/// The scene: an item tree plus its spatial index and caches.
///
/// The type parameter `B` selects the spatial index backend. It defaults to
/// the BSP backend; highly dynamic scenes can construct with
/// [`thicket_index::backends::Linear`] instead, trading query speed for
/// O(1) index updates.
///
/// Structural and geometric mutations only record dirty state; call
/// [`Scene::commit`] once per tick to synchronize the spatial index before
/// issuing queries.
pub struct Scene<B: Backend = Bsp> {
    pub(crate) nodes: Vec<Option<Node>>,
    /// Last generation per slot (persists across frees).
    generations: Vec<u32>,
    free_list: Vec<usize>,
    pub(crate) top_items: Vec<ItemId>,
    top_serial: u32,
    pub(crate) index: Index<ItemId, B>,
    /// Items with `IGNORES_TRANSFORM`: kept out of the index, appended to
    /// every query's candidate set.
    pub(crate) unindexed: Vec<ItemId>,
    pub(crate) stacking_valid: bool,
    /// Items whose index entry is stale; drained by commit.
    index_dirty: Vec<ItemId>,
    /// Items mutated since the last `take_changed`; consumed by damage
    /// tracking.
    changed: Vec<ItemId>,
    explicit_rect: Option<Rect>,
    observed_rect: Option<Rect>,
    rect_growth: Option<Rect>,
}

impl<B: Backend + Default> Scene<B> {
    /// Create an empty scene using the backend's default constructor.
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<B: Backend + Default> Default for Scene<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> core::fmt::Debug for Scene<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Scene")
            .field("items_total", &total)
            .field("items_alive", &alive)
            .field("top_items", &self.top_items.len())
            .field("stacking_valid", &self.stacking_valid)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Scene<B> {
    /// Effective opacities below this threshold make a subtree count as
    /// fully transparent for damage and event purposes.
    ///
    /// This guards against floating-point noise around zero; it is a
    /// tunable parameter, not a load-bearing exact value.
    pub const OPACITY_EPSILON: f64 = 1e-3;

    /// Create a scene with a specific index backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            top_items: Vec::new(),
            top_serial: 0,
            index: Index::with_backend(backend),
            unindexed: Vec::new(),
            stacking_valid: false,
            index_dirty: Vec::new(),
            changed: Vec::new(),
            explicit_rect: None,
            observed_rect: None,
            rect_growth: None,
        }
    }

    /// Returns true if `id` refers to a live item.
    pub fn is_alive(&self, id: ItemId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    /// Insert a new item as a child of `parent` (or as a top-level item for
    /// `None`). A stale `parent` is diagnosed and treated as `None`.
    ///
    /// The returned [`ItemId`] is live immediately; the spatial index picks
    /// the item up on the next [`Scene::commit`].
    pub fn insert(&mut self, parent: Option<ItemId>, local: LocalItem) -> ItemId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, local));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ItemId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, local)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ItemId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = ItemId::new(idx, generation);
        match parent {
            Some(p) if self.is_alive(p) => self.link_parent(id, p),
            Some(_) => {
                debug_assert!(false, "insert: stale parent handle, inserting as top-level");
                self.link_top(id);
            }
            None => self.link_top(id),
        }
        self.stacking_valid = false;
        self.mark_index_stale(id);
        self.changed.push(id);
        id
    }

    /// Remove an item and its entire subtree.
    ///
    /// Children are destroyed before their parent so no child ever observes
    /// a freed parent slot. Spatial index entries are removed synchronously;
    /// the handles become stale immediately.
    pub fn remove(&mut self, id: ItemId) {
        if !self.is_alive(id) {
            debug_assert!(false, "remove: stale item handle");
            return;
        }
        match self.node(id).parent {
            Some(parent) => self.unlink_parent(id, parent),
            None => self.unlink_top(id),
        }
        self.remove_subtree(id);
        self.stacking_valid = false;
    }

    fn remove_subtree(&mut self, id: ItemId) {
        let children = self.node(id).children.clone();
        for child in children {
            self.remove_subtree(child);
        }
        if let Some(key) = self.node(id).index_key {
            self.index.remove(key);
        }
        if let Some(pos) = self.unindexed.iter().position(|x| *x == id) {
            self.unindexed.swap_remove(pos);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Reparent `id` under `new_parent` (or make it top-level).
    ///
    /// Sibling indices of the items left behind are preserved; the moved
    /// item gets a fresh, highest sibling index under its new parent. The
    /// whole subtree's cached transforms become dirty and its index entries
    /// stale.
    pub fn reparent(&mut self, id: ItemId, new_parent: Option<ItemId>) -> Result<(), SceneError> {
        if !self.is_alive(id) {
            debug_assert!(false, "reparent: stale item handle");
            return Err(SceneError::StaleItem);
        }
        if let Some(np) = new_parent {
            if !self.is_alive(np) {
                debug_assert!(false, "reparent: stale parent handle");
                return Err(SceneError::StaleItem);
            }
            if np == id || self.is_ancestor_of(id, np) {
                return Err(SceneError::WouldCycle);
            }
        }
        match self.node(id).parent {
            Some(parent) => self.unlink_parent(id, parent),
            None => self.unlink_top(id),
        }
        match new_parent {
            Some(p) => self.link_parent(id, p),
            None => self.link_top(id),
        }
        self.mark_subtree_transform_dirty(id);
        self.stacking_valid = false;
        self.changed.push(id);
        Ok(())
    }

    /// True if `ancestor` is a (transitive) ancestor of `id`.
    pub fn is_ancestor_of(&self, ancestor: ItemId, id: ItemId) -> bool {
        if !self.is_alive(ancestor) || !self.is_alive(id) {
            return false;
        }
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.node(p).parent;
        }
        false
    }

    // --- geometry mutators ---

    /// Set the item's offset from its parent.
    pub fn set_pos(&mut self, id: ItemId, pos: Vec2) {
        if let Some(n) = self.node_opt_mut(id)
            && n.local.pos != pos
        {
            n.local.pos = pos;
            self.mark_subtree_transform_dirty(id);
            self.changed.push(id);
        }
    }

    /// Set the item's local transform (applied after its position).
    pub fn set_local_transform(&mut self, id: ItemId, tf: Affine) {
        if let Some(n) = self.node_opt_mut(id)
            && n.local.local_transform != tf
        {
            n.local.local_transform = tf;
            self.mark_subtree_transform_dirty(id);
            self.changed.push(id);
        }
    }

    /// Replace the item's local bounding rectangle.
    pub fn set_local_bounds(&mut self, id: ItemId, bounds: Rect) {
        if let Some(n) = self.node_opt_mut(id)
            && n.local.local_bounds != bounds
        {
            n.local.local_bounds = bounds;
            self.mark_index_stale(id);
            self.changed.push(id);
        }
    }

    /// Set the item's z-value within its stacking context.
    pub fn set_z(&mut self, id: ItemId, z: f64) {
        if let Some(n) = self.node_opt_mut(id)
            && n.local.z != z
        {
            n.local.z = z;
            self.stacking_valid = false;
            self.changed.push(id);
        }
    }

    /// Set the item's own opacity, clamped to `[0, 1]`.
    ///
    /// Crossing [`Scene::OPACITY_EPSILON`] flips the subtree's effective
    /// transparency without any structural change.
    pub fn set_opacity(&mut self, id: ItemId, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        if let Some(n) = self.node_opt_mut(id)
            && n.local.opacity != opacity
        {
            n.local.opacity = opacity;
            self.changed.push(id);
        }
    }

    /// Show or hide the item and (implicitly) its subtree.
    ///
    /// Hidden subtrees keep all cached state for cheap re-activation.
    /// Calling this with the current state is a no-op, so hiding twice has
    /// exactly the side effects of hiding once.
    pub fn set_visible(&mut self, id: ItemId, visible: bool) {
        if let Some(n) = self.node_opt_mut(id)
            && n.hidden == visible
        {
            n.hidden = !visible;
            self.changed.push(id);
        }
    }

    /// Enable or disable the item and (implicitly) its subtree.
    pub fn set_enabled(&mut self, id: ItemId, enabled: bool) {
        if let Some(n) = self.node_opt_mut(id)
            && n.enabled != enabled
        {
            n.enabled = enabled;
            self.changed.push(id);
        }
    }

    /// Replace the item's behavior flags.
    pub fn set_flags(&mut self, id: ItemId, flags: ItemFlags) {
        if let Some(n) = self.node_opt_mut(id)
            && n.local.flags != flags
        {
            n.local.flags = flags;
            // Transform semantics and stacking both depend on flags.
            self.mark_subtree_transform_dirty(id);
            self.stacking_valid = false;
            self.changed.push(id);
        }
    }

    // --- derived state ---

    /// The memoized transform from the item's local space into scene space.
    ///
    /// Revalidates exactly the dirty prefix of the item's ancestor chain,
    /// top-down, before answering. For items with
    /// [`ItemFlags::IGNORES_TRANSFORM`] this is the device-independent
    /// anchored form (ancestor scale/rotation dropped); use
    /// [`Scene::device_transform`] for their on-screen transform.
    pub fn scene_transform(&mut self, id: ItemId) -> Option<Affine> {
        if !self.is_alive(id) {
            return None;
        }
        self.validate_transform(id);
        Some(self.node(id).scene_transform)
    }

    /// Whether the item's scene transform is a pure translation
    /// (fast-path flag for rect mapping).
    pub fn translate_only(&mut self, id: ItemId) -> Option<bool> {
        if !self.is_alive(id) {
            return None;
        }
        self.validate_transform(id);
        Some(self.node(id).translate_only)
    }

    /// The item's transform into device space under `device`.
    ///
    /// Ordinary items compose `device` with their scene transform. Items
    /// under an [`ItemFlags::IGNORES_TRANSFORM`] anchor keep their scene
    /// position (mapped through ancestors and the device transform) but
    /// drop all inherited scaling and rotation. This value is viewport
    /// dependent and never memoized.
    pub fn device_transform(&mut self, id: ItemId, device: Affine) -> Option<Affine> {
        if !self.is_alive(id) {
            return None;
        }
        let Some(anchor) = self.untransformable_anchor(id) else {
            return Some(device * self.scene_transform(id)?);
        };
        // Position of the anchor in parent space, mapped through the full
        // ancestor chain and the device transform.
        let parent_tf = match self.node(anchor).parent {
            Some(p) => {
                self.validate_transform(p);
                self.node(p).scene_transform
            }
            None => Affine::IDENTITY,
        };
        let pos = self.node(anchor).local.pos;
        let device_pos = device * (parent_tf * Point::new(pos.x, pos.y));
        // Compose the untransformed subtree below the anchor.
        let mut rel = self.node(anchor).local.local_transform;
        let mut chain: Vec<ItemId> = Vec::new();
        let mut cur = id;
        while cur != anchor {
            chain.push(cur);
            cur = self.node(cur).parent?;
        }
        for link in chain.iter().rev() {
            let local = &self.node(*link).local;
            rel = rel * Affine::translate(local.pos) * local.local_transform;
        }
        Some(Affine::translate(device_pos.to_vec2()) * rel)
    }

    /// The nearest self-or-ancestor with `IGNORES_TRANSFORM`, if any.
    pub(crate) fn untransformable_anchor(&self, id: ItemId) -> Option<ItemId> {
        let mut cur = Some(id);
        let mut found = None;
        while let Some(c) = cur {
            if self.node(c).local.flags.contains(ItemFlags::IGNORES_TRANSFORM) {
                found = Some(c);
            }
            cur = self.node(c).parent;
        }
        found
    }

    /// Effective visibility of the item.
    pub fn visibility(&self, id: ItemId) -> Option<Visibility> {
        if !self.is_alive(id) {
            return None;
        }
        if self.node(id).hidden {
            return Some(Visibility::ExplicitlyHidden);
        }
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            if self.node(p).hidden {
                return Some(Visibility::ImplicitlyHidden);
            }
            cur = self.node(p).parent;
        }
        Some(Visibility::Visible)
    }

    /// True if the item and all its ancestors are enabled.
    pub fn is_effectively_enabled(&self, id: ItemId) -> Option<bool> {
        if !self.is_alive(id) {
            return None;
        }
        let mut cur = Some(id);
        while let Some(c) = cur {
            if !self.node(c).enabled {
                return Some(false);
            }
            cur = self.node(c).parent;
        }
        Some(true)
    }

    /// Product of the item's own and inherited opacities.
    ///
    /// Inheritance stops at an item with `IGNORES_PARENT_OPACITY` or below
    /// a parent with `CHILDREN_IGNORE_OPACITY`.
    pub fn effective_opacity(&self, id: ItemId) -> Option<f64> {
        if !self.is_alive(id) {
            return None;
        }
        let mut o = self.node(id).local.opacity;
        let mut cur = id;
        while let Some(p) = self.node(cur).parent {
            let child_flags = self.node(cur).local.flags;
            if child_flags.contains(ItemFlags::IGNORES_PARENT_OPACITY)
                || self
                    .node(p)
                    .local
                    .flags
                    .contains(ItemFlags::CHILDREN_IGNORE_OPACITY)
            {
                break;
            }
            o *= self.node(p).local.opacity;
            cur = p;
        }
        Some(o.clamp(0.0, 1.0))
    }

    // --- accessors ---

    /// The parent of a live item, or `None` for top-level items and stale
    /// handles.
    pub fn parent_of(&self, id: ItemId) -> Option<ItemId> {
        if !self.is_alive(id) {
            return None;
        }
        self.node(id).parent
    }

    /// The children of an item in insertion order, or an empty slice for
    /// stale handles.
    pub fn children_of(&self, id: ItemId) -> &[ItemId] {
        if !self.is_alive(id) {
            return &[];
        }
        &self.node(id).children
    }

    /// Top-level items in insertion order.
    pub fn top_items(&self) -> &[ItemId] {
        &self.top_items
    }

    /// The item's local data, if live.
    pub fn local(&self, id: ItemId) -> Option<&LocalItem> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&self.node(id).local)
    }

    /// The item's behavior flags, if live.
    pub fn flags(&self, id: ItemId) -> Option<ItemFlags> {
        self.local(id).map(|l| l.flags)
    }

    // --- scene rectangle ---

    /// Pin the scene rectangle explicitly, or `None` to track the observed
    /// union of item bounds.
    pub fn set_scene_rect(&mut self, rect: Option<Rect>) {
        self.explicit_rect = rect;
    }

    /// The scene rectangle: the explicit one if set, otherwise the
    /// monotonically growing union of all bounds ever committed.
    pub fn scene_rect(&self) -> Rect {
        self.explicit_rect
            .or(self.observed_rect)
            .unwrap_or(Rect::ZERO)
    }

    /// The new observed scene rectangle, reported once per actual growth.
    pub fn take_scene_rect_growth(&mut self) -> Option<Rect> {
        self.rect_growth.take()
    }

    /// Items mutated since the last call; consumed by damage tracking.
    pub fn take_changed(&mut self) -> Vec<ItemId> {
        core::mem::take(&mut self.changed)
    }

    // --- commit ---

    /// Run the batched update: revalidate the transforms indexing needs,
    /// flush pending spatial index updates, grow the observed scene
    /// rectangle, and return coarse damage.
    ///
    /// Call once per host tick, after mutations and before queries.
    pub fn commit(&mut self) -> Damage {
        let dirty = core::mem::take(&mut self.index_dirty);
        for id in dirty {
            if !self.is_alive(id) || !self.node(id).index_stale {
                continue;
            }
            self.validate_transform(id);
            let n = self.node(id);
            let untransformable = n.local.flags.contains(ItemFlags::IGNORES_TRANSFORM);
            let bounds = transform_rect_bbox(n.scene_transform, n.local.local_bounds);
            let key = n.index_key;
            if untransformable {
                if let Some(k) = key {
                    self.index.remove(k);
                    self.node_mut(id).index_key = None;
                }
                if !self.unindexed.contains(&id) {
                    self.unindexed.push(id);
                }
            } else {
                if let Some(pos) = self.unindexed.iter().position(|x| *x == id) {
                    self.unindexed.swap_remove(pos);
                }
                let aabb = rect_to_aabb(bounds);
                match key {
                    Some(k) => self.index.update(k, aabb),
                    None => {
                        let k = self.index.insert(aabb, id);
                        self.node_mut(id).index_key = Some(k);
                    }
                }
            }
            self.grow_observed(bounds);
            self.node_mut(id).index_stale = false;
        }
        self.index.commit()
    }

    // --- internals ---

    pub(crate) fn node(&self, id: ItemId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling ItemId")
    }

    pub(crate) fn node_mut(&mut self, id: ItemId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling ItemId")
    }

    fn node_opt_mut(&mut self, id: ItemId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            debug_assert!(false, "stale item handle passed to a mutator");
            return None;
        }
        Some(n)
    }

    fn link_parent(&mut self, id: ItemId, parent: ItemId) {
        let serial = {
            let p = self.node_mut(parent);
            let serial = p.child_serial;
            p.child_serial += 1;
            p.children.push(id);
            serial
        };
        let n = self.node_mut(id);
        n.parent = Some(parent);
        n.sibling_serial = serial;
    }

    fn unlink_parent(&mut self, id: ItemId, parent: ItemId) {
        self.node_mut(parent).children.retain(|c| *c != id);
        self.node_mut(id).parent = None;
    }

    fn link_top(&mut self, id: ItemId) {
        let serial = self.top_serial;
        self.top_serial += 1;
        self.top_items.push(id);
        let n = self.node_mut(id);
        n.parent = None;
        n.sibling_serial = serial;
    }

    fn unlink_top(&mut self, id: ItemId) {
        self.top_items.retain(|c| *c != id);
    }

    fn mark_index_stale(&mut self, id: ItemId) {
        let fresh = {
            let n = self.node_mut(id);
            let fresh = !n.index_stale;
            n.index_stale = true;
            fresh
        };
        if fresh {
            self.index_dirty.push(id);
        }
    }

    /// Mark cached transforms of `id` and every descendant dirty, and their
    /// index entries stale.
    fn mark_subtree_transform_dirty(&mut self, id: ItemId) {
        if !self.is_alive(id) {
            return;
        }
        let children = {
            let n = self.node_mut(id);
            n.dirty_transform = true;
            n.children.clone()
        };
        self.mark_index_stale(id);
        for c in children {
            self.mark_subtree_transform_dirty(c);
        }
    }

    /// Revalidate the memoized scene transform of `id`.
    ///
    /// Walks toward the root to find the outermost dirty ancestor, then
    /// recomputes top-down along that chain only. Descendants off the chain
    /// keep their own dirty marks, so nothing outside the chain is touched.
    pub(crate) fn validate_transform(&mut self, id: ItemId) {
        let mut chain: Vec<ItemId> = Vec::new();
        let mut outermost_dirty: Option<usize> = None;
        let mut cur = Some(id);
        while let Some(c) = cur {
            chain.push(c);
            if self.node(c).dirty_transform {
                outermost_dirty = Some(chain.len() - 1);
            }
            cur = self.node(c).parent;
        }
        let Some(start) = outermost_dirty else {
            return;
        };
        // chain[0] is `id`, chain[last] the root; recompute outside-in.
        for i in (0..=start).rev() {
            let nid = chain[i];
            let (parent_tf, parent_translate_only) = match self.node(nid).parent {
                Some(p) => {
                    let pn = self.node(p);
                    (pn.scene_transform, pn.translate_only)
                }
                None => (Affine::IDENTITY, true),
            };
            let n = self.node_mut(nid);
            if n.local.flags.contains(ItemFlags::IGNORES_TRANSFORM) {
                // Anchored: inherit position only, not scale or rotation.
                let pos = n.local.pos;
                let anchor = parent_tf * Point::new(pos.x, pos.y);
                n.scene_transform = Affine::translate(anchor.to_vec2()) * n.local.local_transform;
                n.translate_only = is_translation(n.local.local_transform);
            } else {
                let local = Affine::translate(n.local.pos) * n.local.local_transform;
                n.scene_transform = parent_tf * local;
                n.translate_only = parent_translate_only && is_translation(n.local.local_transform);
            }
            n.dirty_transform = false;
        }
    }

    /// Map a local-space rectangle of `id` into scene space (conservative
    /// bounding box under the validated scene transform).
    pub fn map_rect_to_scene(&mut self, id: ItemId, local: Rect) -> Option<Rect> {
        let tf = self.scene_transform(id)?;
        Some(transform_rect_bbox(tf, local))
    }

    /// The item's scene-space bounding box after intersecting the bounds of
    /// every clipping ancestor. The result may be empty or inverted when a
    /// clip excludes the item entirely.
    pub fn clipped_scene_bounds(&mut self, id: ItemId) -> Option<Rect> {
        self.effective_scene_bounds(id)
    }

    /// The item's scene-space bounding box after intersecting the bounds of
    /// every clipping ancestor. `None` if stale.
    pub(crate) fn effective_scene_bounds(&mut self, id: ItemId) -> Option<Rect> {
        if !self.is_alive(id) {
            return None;
        }
        self.validate_transform(id);
        let n = self.node(id);
        let mut bounds = transform_rect_bbox(n.scene_transform, n.local.local_bounds);
        let mut cur = n.parent;
        while let Some(p) = cur {
            if self.node(p).local.flags.contains(ItemFlags::CLIPS_CHILDREN) {
                self.validate_transform(p);
                let pn = self.node(p);
                let clip = transform_rect_bbox(pn.scene_transform, pn.local.local_bounds);
                bounds = bounds.intersect(clip);
            }
            cur = self.node(p).parent;
        }
        Some(bounds)
    }

    fn grow_observed(&mut self, bounds: Rect) {
        if bounds.x0.is_nan() || bounds.y0.is_nan() || bounds.x1.is_nan() || bounds.y1.is_nan() {
            return;
        }
        let grown = match self.observed_rect {
            Some(prev) => {
                let u = prev.union(bounds);
                (u != prev).then_some(u)
            }
            None => Some(bounds),
        };
        if let Some(u) = grown {
            self.observed_rect = Some(u);
            if self.explicit_rect.is_none() {
                self.rect_growth = Some(u);
            }
        }
    }
}
