// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The focus ring: a doubly-linked cycle of focusable items.
//!
//! The ring is independent of the parent/child tree. Members are linked in
//! registration order (which the host typically makes creation order), and
//! removal re-links the neighbors so the relative order of the remaining
//! members is preserved. Tab navigation walks the ring forward,
//! Shift-Tab backward.

use hashbrown::HashMap;
use thicket_scene::ItemId;

/// A doubly-linked ring of focusable items.
#[derive(Clone, Debug, Default)]
pub struct FocusRing {
    /// `(prev, next)` per member.
    links: HashMap<ItemId, (ItemId, ItemId)>,
    /// The first-registered live member; navigation starts here when
    /// nothing is focused.
    head: Option<ItemId>,
}

impl FocusRing {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True if the ring has no members.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// True if `id` is a member.
    pub fn contains(&self, id: ItemId) -> bool {
        self.links.contains_key(&id)
    }

    /// The first-registered member, if any.
    pub fn head(&self) -> Option<ItemId> {
        self.head
    }

    /// Link `id` at the end of the ring (just before the head).
    ///
    /// Re-inserting an existing member is a diagnosed no-op.
    pub fn insert(&mut self, id: ItemId) {
        if self.links.contains_key(&id) {
            debug_assert!(false, "focus ring: item already linked");
            return;
        }
        match self.head {
            None => {
                self.links.insert(id, (id, id));
                self.head = Some(id);
            }
            Some(head) => {
                let (last, _) = self.links[&head];
                self.links.get_mut(&last).expect("ring link").1 = id;
                self.links.get_mut(&head).expect("ring link").0 = id;
                self.links.insert(id, (last, head));
            }
        }
    }

    /// Unlink `id`, preserving the relative order of the remaining members.
    ///
    /// Removing a non-member is a diagnosed no-op.
    pub fn remove(&mut self, id: ItemId) {
        let Some((prev, next)) = self.links.remove(&id) else {
            debug_assert!(false, "focus ring: item not linked");
            return;
        };
        if prev == id {
            // Sole member.
            self.head = None;
            return;
        }
        self.links.get_mut(&prev).expect("ring link").1 = next;
        self.links.get_mut(&next).expect("ring link").0 = prev;
        if self.head == Some(id) {
            self.head = Some(next);
        }
    }

    /// The member after `id`, wrapping around. `None` if `id` is not
    /// linked.
    pub fn next(&self, id: ItemId) -> Option<ItemId> {
        self.links.get(&id).map(|(_, n)| *n)
    }

    /// The member before `id`, wrapping around. `None` if `id` is not
    /// linked.
    pub fn prev(&self, id: ItemId) -> Option<ItemId> {
        self.links.get(&id).map(|(p, _)| *p)
    }

    /// All members, in unspecified order.
    pub fn members(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.links.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Distinct handles from a throwaway scene; the ring never
    /// dereferences them.
    fn id(n: u32) -> ItemId {
        let mut scene: thicket_scene::Scene = thicket_scene::Scene::new();
        let mut last = scene.insert(None, thicket_scene::LocalItem::default());
        for _ in 0..n {
            last = scene.insert(None, thicket_scene::LocalItem::default());
        }
        last
    }

    #[test]
    fn registration_order_is_preserved() {
        let (a, b, c) = (id(0), id(1), id(2));
        let mut ring = FocusRing::new();
        ring.insert(a);
        ring.insert(b);
        ring.insert(c);

        assert_eq!(ring.head(), Some(a));
        assert_eq!(ring.next(a), Some(b));
        assert_eq!(ring.next(b), Some(c));
        assert_eq!(ring.next(c), Some(a), "ring wraps");
        assert_eq!(ring.prev(a), Some(c), "backward wrap");
    }

    #[test]
    fn removal_relinks_neighbors() {
        let (a, b, c, d) = (id(0), id(1), id(2), id(3));
        let mut ring = FocusRing::new();
        for x in [a, b, c, d] {
            ring.insert(x);
        }
        ring.remove(b);
        assert_eq!(ring.next(a), Some(c));
        assert_eq!(ring.prev(c), Some(a));
        assert_eq!(ring.len(), 3);

        ring.remove(a);
        assert_eq!(ring.head(), Some(c), "head advances past removed member");
        assert_eq!(ring.next(d), Some(c));
    }

    #[test]
    fn sole_member_ring() {
        let a = id(0);
        let mut ring = FocusRing::new();
        ring.insert(a);
        assert_eq!(ring.next(a), Some(a));
        assert_eq!(ring.prev(a), Some(a));
        ring.remove(a);
        assert!(ring.is_empty());
        assert_eq!(ring.head(), None);
    }

    #[test]
    fn nonmember_queries_return_none() {
        let (a, b) = (id(0), id(1));
        let mut ring = FocusRing::new();
        ring.insert(a);
        assert_eq!(ring.next(b), None);
        assert_eq!(ring.prev(b), None);
    }
}
