// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stacking order: the pairwise rule and its cached global linearization.
//!
//! Among siblings, three keys decide who is in front: the behind-parent
//! flag (behind-flagged items always lose), then the z-value (higher wins),
//! then the sibling index (more recently inserted wins). Between
//! non-siblings, the rule applies to the two ancestor-chain members
//! adjacent to the common ancestor; a descendant is in front of its
//! ancestor unless its chain stacks behind the parent.
//!
//! Rather than walking ancestor chains per comparison, one depth-first
//! traversal assigns every item a global paint-order integer (ascending is
//! back-to-front); comparisons and sorts then cost O(1) per pair until the
//! next structural or z mutation invalidates the cache. The same traversal
//! compacts sibling serials back to a dense `[0, n)` permutation.

use alloc::vec::Vec;
use core::cmp::Ordering;

use thicket_index::Backend;

use crate::tree::Scene;
use crate::types::{ItemFlags, ItemId};

impl<B: Backend> Scene<B> {
    /// Compare two live items by stacking order.
    ///
    /// `Ordering::Greater` means `a` is in front of `b`. Comparing an item
    /// with itself, or with a stale handle, yields `Ordering::Equal` (with
    /// a debug diagnostic for the stale case).
    pub fn stacking_cmp(&mut self, a: ItemId, b: ItemId) -> Ordering {
        if !self.is_alive(a) || !self.is_alive(b) {
            debug_assert!(false, "stacking_cmp: stale item handle");
            return Ordering::Equal;
        }
        if a == b {
            return Ordering::Equal;
        }
        self.ensure_stacking();
        self.node(a).stacking_order.cmp(&self.node(b).stacking_order)
    }

    /// True if `a` paints in front of `b`.
    pub fn is_in_front_of(&mut self, a: ItemId, b: ItemId) -> bool {
        self.stacking_cmp(a, b) == Ordering::Greater
    }

    /// The item's position in global paint order (ascending is
    /// back-to-front), validating the cache first.
    pub fn stacking_position(&mut self, id: ItemId) -> Option<i64> {
        if !self.is_alive(id) {
            return None;
        }
        self.ensure_stacking();
        Some(self.node(id).stacking_order)
    }

    pub(crate) fn stacking_order_raw(&self, id: ItemId) -> i64 {
        self.node(id).stacking_order
    }

    /// Rebuild the global stacking cache if a structural or z mutation
    /// invalidated it. One depth-first traversal; sibling serials are
    /// compacted to `[0, n)` along the way.
    pub(crate) fn ensure_stacking(&mut self) {
        if self.stacking_valid {
            return;
        }
        let mut tops: Vec<ItemId> = self.top_items.clone();
        self.compact_serials(&tops);
        tops.sort_by(|x, y| self.sibling_rule(*x, *y));
        let mut counter: i64 = 0;
        for t in tops {
            self.assign_order(t, &mut counter);
        }
        self.stacking_valid = true;
    }

    /// Assign paint-order integers for `id`'s subtree: behind-flagged
    /// children first, then the item, then the rest.
    fn assign_order(&mut self, id: ItemId, counter: &mut i64) {
        let children = self.node(id).children.clone();
        self.compact_serials(&children);
        let (mut behind, mut front): (Vec<ItemId>, Vec<ItemId>) =
            children.into_iter().partition(|c| {
                self.node(*c)
                    .local
                    .flags
                    .contains(ItemFlags::STACKS_BEHIND_PARENT)
            });
        behind.sort_by(|x, y| self.sibling_rule(*x, *y));
        front.sort_by(|x, y| self.sibling_rule(*x, *y));

        for c in behind {
            self.assign_order(c, counter);
        }
        *counter += 1;
        self.node_mut(id).stacking_order = *counter;
        for c in front {
            self.assign_order(c, counter);
        }
    }

    /// Reassign a sibling group's serials to their positions in insertion
    /// order. Serials are append-only, so the insertion-ordered list is
    /// already serial-ascending and relative order is preserved.
    fn compact_serials(&mut self, siblings: &[ItemId]) {
        for (i, c) in siblings.iter().enumerate() {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Sibling counts are bounded by the 32-bit item space."
            )]
            {
                self.node_mut(*c).sibling_serial = i as u32;
            }
        }
    }

    /// The sibling comparison: behind flag, then z, then sibling serial.
    /// `Less` means further behind.
    pub(crate) fn sibling_rule(&self, a: ItemId, b: ItemId) -> Ordering {
        let na = self.node(a);
        let nb = self.node(b);
        let behind_a = na.local.flags.contains(ItemFlags::STACKS_BEHIND_PARENT);
        let behind_b = nb.local.flags.contains(ItemFlags::STACKS_BEHIND_PARENT);
        match (behind_a, behind_b) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        match na.local.z.partial_cmp(&nb.local.z) {
            Some(Ordering::Less) => Ordering::Less,
            Some(Ordering::Greater) => Ordering::Greater,
            // Equal z (or NaN): newer sibling wins.
            _ => na.sibling_serial.cmp(&nb.sibling_serial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LocalItem;
    use kurbo::Rect;

    fn item(z: f64) -> LocalItem {
        LocalItem {
            local_bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            z,
            ..LocalItem::default()
        }
    }

    fn behind_item(z: f64) -> LocalItem {
        LocalItem {
            flags: ItemFlags::STACKS_BEHIND_PARENT,
            ..item(z)
        }
    }

    #[test]
    fn higher_z_wins_among_siblings() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let a = scene.insert(Some(p), item(1.0));
        let b = scene.insert(Some(p), item(5.0));
        assert!(scene.is_in_front_of(b, a));
        assert!(!scene.is_in_front_of(a, b));
    }

    #[test]
    fn insertion_order_breaks_z_ties() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let a = scene.insert(Some(p), item(1.0));
        let b = scene.insert(Some(p), item(1.0));
        assert!(
            scene.is_in_front_of(b, a),
            "later-inserted sibling must win the tie"
        );
    }

    #[test]
    fn descendants_in_front_of_ancestors() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let c = scene.insert(Some(p), item(0.0));
        let gc = scene.insert(Some(c), item(0.0));
        assert!(scene.is_in_front_of(c, p));
        assert!(scene.is_in_front_of(gc, p));
        assert!(scene.is_in_front_of(gc, c));
    }

    #[test]
    fn behind_parent_flag_inverts() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let shadow = scene.insert(Some(p), behind_item(10.0));
        let normal = scene.insert(Some(p), item(-10.0));
        // A behind-flagged child loses to its parent and to any
        // non-behind sibling regardless of z.
        assert!(scene.is_in_front_of(p, shadow));
        assert!(scene.is_in_front_of(normal, shadow));
    }

    #[test]
    fn non_siblings_compare_via_common_ancestor() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let low = scene.insert(Some(p), item(0.0));
        let high = scene.insert(Some(p), item(1.0));
        let low_child = scene.insert(Some(low), item(99.0));
        // low_child's huge z is scoped to its parent's stacking context; the
        // comparison is decided at the children-of-p level.
        assert!(scene.is_in_front_of(high, low_child));
    }

    #[test]
    fn top_level_items_compare_by_z_then_insertion() {
        let mut scene: Scene = Scene::new();
        let a = scene.insert(None, item(0.0));
        let b = scene.insert(None, item(0.0));
        let c = scene.insert(None, item(-1.0));
        assert!(scene.is_in_front_of(b, a));
        assert!(scene.is_in_front_of(a, c));
        assert!(scene.is_in_front_of(b, c));
    }

    #[test]
    fn totality_antisymmetry_transitivity() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let mut items = alloc::vec![p];
        items.push(scene.insert(Some(p), item(2.0)));
        items.push(scene.insert(Some(p), behind_item(1.0)));
        items.push(scene.insert(Some(items[1]), item(-3.0)));
        items.push(scene.insert(None, item(0.5)));
        items.push(scene.insert(Some(items[4]), behind_item(0.0)));

        for &a in &items {
            for &b in &items {
                let ab = scene.stacking_cmp(a, b);
                let ba = scene.stacking_cmp(b, a);
                assert_eq!(ab, ba.reverse(), "comparison must be antisymmetric");
                if a != b {
                    assert_ne!(ab, Ordering::Equal, "distinct items must be ordered");
                }
                for &c in &items {
                    if scene.is_in_front_of(a, b) && scene.is_in_front_of(b, c) {
                        assert!(
                            scene.is_in_front_of(a, c),
                            "in-front-of must be transitive"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn z_change_invalidates_cache() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let a = scene.insert(Some(p), item(0.0));
        let b = scene.insert(Some(p), item(1.0));
        assert!(scene.is_in_front_of(b, a));
        scene.set_z(a, 2.0);
        assert!(scene.is_in_front_of(a, b));
    }

    #[test]
    fn serials_compact_after_removal() {
        let mut scene: Scene = Scene::new();
        let p = scene.insert(None, item(0.0));
        let a = scene.insert(Some(p), item(0.0));
        let b = scene.insert(Some(p), item(0.0));
        let c = scene.insert(Some(p), item(0.0));
        scene.remove(b);
        assert_eq!(scene.children_of(p), [a, c]);
        // Relative order among the survivors is preserved across the
        // rebuild that compacts serials.
        assert!(scene.is_in_front_of(c, a), "relative order preserved");
        // And a fresh insertion still lands on top.
        let d = scene.insert(Some(p), item(0.0));
        assert!(scene.is_in_front_of(d, c));
    }
}
