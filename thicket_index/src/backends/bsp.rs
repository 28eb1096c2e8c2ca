// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary space partition backend.
//!
//! The world rectangle is bisected recursively along its longer side. Leaves
//! hold small slot lists and split once they exceed a capacity threshold, up
//! to a depth limit. Boxes that straddle a split are binned into every
//! overlapping leaf and deduplicated at query time.
//!
//! Boxes that are not fully inside the world rectangle go to a linear
//! overflow list that every query visits, so queries remain correct (if
//! slower) for content outside the partitioned area. Callers that observe a
//! growing scene should rebuild with a larger world rectangle once the
//! overflow share becomes significant.

use alloc::vec::Vec;

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::backend::Backend;
use crate::types::Aabb;

/// Binary space partition backend with a fixed world rectangle.
pub struct Bsp {
    world: Aabb,
    leaf_capacity: usize,
    max_depth: u8,
    nodes: Vec<Node>,
    slots: Vec<Option<SlotEntry>>,
    /// Slots not fully inside `world`; scanned linearly by every query.
    outside: Vec<usize>,
}

struct SlotEntry {
    aabb: Aabb,
    placement: Placement,
}

enum Placement {
    /// Indices into `nodes` of the leaves holding this slot.
    Leaves(SmallVec<[u32; 4]>),
    Outside,
}

struct Node {
    bounds: Aabb,
    depth: u8,
    kind: NodeKind,
}

enum NodeKind {
    Leaf(SmallVec<[u32; 8]>),
    Split { lo: u32, hi: u32 },
}

impl Bsp {
    /// Default number of entries a leaf holds before it splits.
    pub const DEFAULT_LEAF_CAPACITY: usize = 16;
    /// Default maximum bisection depth.
    pub const DEFAULT_MAX_DEPTH: u8 = 12;

    /// Create a backend partitioning the given world rectangle with default
    /// leaf capacity and depth limit.
    pub fn new(world: Aabb) -> Self {
        Self::with_limits(world, Self::DEFAULT_LEAF_CAPACITY, Self::DEFAULT_MAX_DEPTH)
    }

    /// Create a backend with explicit leaf capacity and depth limit.
    ///
    /// `leaf_capacity` is clamped to at least 1.
    pub fn with_limits(world: Aabb, leaf_capacity: usize, max_depth: u8) -> Self {
        let mut nodes = Vec::new();
        nodes.push(Node {
            bounds: world,
            depth: 0,
            kind: NodeKind::Leaf(SmallVec::new()),
        });
        Self {
            world,
            leaf_capacity: leaf_capacity.max(1),
            max_depth,
            nodes,
            slots: Vec::new(),
            outside: Vec::new(),
        }
    }

    /// The world rectangle this backend partitions.
    pub fn world(&self) -> Aabb {
        self.world
    }

    /// Number of slots currently in the overflow list.
    pub fn overflow_len(&self) -> usize {
        self.outside.len()
    }

    fn place(&mut self, slot: usize, aabb: Aabb) {
        if !self.world.contains(&aabb) {
            self.outside.push(slot);
            self.slots[slot] = Some(SlotEntry {
                aabb,
                placement: Placement::Outside,
            });
            return;
        }

        // Record the entry before descending so a leaf split triggered by
        // this insertion redistributes it like any other slot.
        self.slots[slot] = Some(SlotEntry {
            aabb,
            placement: Placement::Leaves(SmallVec::new()),
        });

        let mut stack: SmallVec<[u32; 16]> = SmallVec::new();
        stack.push(0);
        while let Some(ni) = stack.pop() {
            if !self.nodes[ni as usize].bounds.overlaps(&aabb) {
                continue;
            }
            if let NodeKind::Split { lo, hi } = &self.nodes[ni as usize].kind {
                stack.push(*lo);
                stack.push(*hi);
                continue;
            }
            let (len, depth) = {
                let node = &mut self.nodes[ni as usize];
                let NodeKind::Leaf(list) = &mut node.kind else {
                    unreachable!("split arm handled above");
                };
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "Slot indices are bounded by the index's 32-bit key space."
                )]
                list.push(slot as u32);
                (list.len(), node.depth)
            };
            if let Some(Some(entry)) = self.slots.get_mut(slot)
                && let Placement::Leaves(leaves) = &mut entry.placement
            {
                leaves.push(ni);
            }
            if len > self.leaf_capacity && depth < self.max_depth {
                self.split_leaf(ni);
            }
        }
    }

    /// Turn a leaf into a split node, redistributing its slots into two
    /// freshly created child leaves.
    fn split_leaf(&mut self, ni: u32) {
        let (bounds, depth, old_list) = {
            let node = &mut self.nodes[ni as usize];
            let list = match &mut node.kind {
                NodeKind::Leaf(list) => core::mem::take(list),
                NodeKind::Split { .. } => return,
            };
            (node.bounds, node.depth, list)
        };

        // Bisect the longer side.
        let vertical = bounds.width() >= bounds.height();
        let (lo_bounds, hi_bounds) = if vertical {
            let at = 0.5 * (bounds.min_x + bounds.max_x);
            (
                Aabb::new(bounds.min_x, bounds.min_y, at, bounds.max_y),
                Aabb::new(at, bounds.min_y, bounds.max_x, bounds.max_y),
            )
        } else {
            let at = 0.5 * (bounds.min_y + bounds.max_y);
            (
                Aabb::new(bounds.min_x, bounds.min_y, bounds.max_x, at),
                Aabb::new(bounds.min_x, at, bounds.max_x, bounds.max_y),
            )
        };

        #[allow(
            clippy::cast_possible_truncation,
            reason = "Node count is bounded by 2^(max_depth + 1), far below u32::MAX."
        )]
        let lo = self.nodes.len() as u32;
        let hi = lo + 1;
        self.nodes.push(Node {
            bounds: lo_bounds,
            depth: depth + 1,
            kind: NodeKind::Leaf(SmallVec::new()),
        });
        self.nodes.push(Node {
            bounds: hi_bounds,
            depth: depth + 1,
            kind: NodeKind::Leaf(SmallVec::new()),
        });
        self.nodes[ni as usize].kind = NodeKind::Split { lo, hi };

        for slot in old_list {
            let Some(aabb) = self
                .slots
                .get(slot as usize)
                .and_then(|s| s.as_ref())
                .map(|entry| entry.aabb)
            else {
                continue;
            };
            let mut new_leaves: SmallVec<[u32; 4]> = SmallVec::new();
            for child in [lo, hi] {
                let node = &mut self.nodes[child as usize];
                if node.bounds.overlaps(&aabb) {
                    match &mut node.kind {
                        NodeKind::Leaf(list) => list.push(slot),
                        NodeKind::Split { .. } => unreachable!("children are fresh leaves"),
                    }
                    new_leaves.push(child);
                }
            }
            if let Some(Some(entry)) = self.slots.get_mut(slot as usize)
                && let Placement::Leaves(leaves) = &mut entry.placement
            {
                leaves.retain(|l| *l != ni);
                leaves.extend_from_slice(&new_leaves);
            }
        }
    }

    fn unplace(&mut self, slot: usize) -> Option<Aabb> {
        let entry = self.slots.get_mut(slot)?.take()?;
        match entry.placement {
            Placement::Outside => {
                if let Some(pos) = self.outside.iter().position(|s| *s == slot) {
                    self.outside.swap_remove(pos);
                }
            }
            Placement::Leaves(leaves) => {
                for ni in leaves {
                    if let NodeKind::Leaf(list) = &mut self.nodes[ni as usize].kind
                        && let Some(pos) = list.iter().position(|s| *s as usize == slot)
                    {
                        list.swap_remove(pos);
                    }
                }
            }
        }
        Some(entry.aabb)
    }

    fn visit_matching<F: FnMut(usize)>(&self, test: impl Fn(&Aabb) -> bool, mut f: F) {
        // Straddlers live in several leaves; report each slot once.
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack: SmallVec<[u32; 32]> = SmallVec::new();
        stack.push(0);
        while let Some(ni) = stack.pop() {
            let node = &self.nodes[ni as usize];
            if !test(&node.bounds) {
                continue;
            }
            match &node.kind {
                NodeKind::Split { lo, hi } => {
                    stack.push(*lo);
                    stack.push(*hi);
                }
                NodeKind::Leaf(list) => {
                    for &slot in list {
                        let slot = slot as usize;
                        if let Some(Some(entry)) = self.slots.get(slot)
                            && test(&entry.aabb)
                            && seen.insert(slot)
                        {
                            f(slot);
                        }
                    }
                }
            }
        }
        for &slot in &self.outside {
            if let Some(Some(entry)) = self.slots.get(slot)
                && test(&entry.aabb)
            {
                f(slot);
            }
        }
    }
}

impl Default for Bsp {
    /// A backend over a modest centered world rectangle.
    ///
    /// Content outside it still queries correctly through the overflow list;
    /// construct with [`Bsp::new`] and a real scene rectangle for best
    /// performance.
    fn default() -> Self {
        Self::new(Aabb::new(-1024.0, -1024.0, 1024.0, 1024.0))
    }
}

impl core::fmt::Debug for Bsp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.slots.iter().filter(|e| e.is_some()).count();
        f.debug_struct("Bsp")
            .field("world", &self.world)
            .field("nodes", &self.nodes.len())
            .field("alive", &alive)
            .field("overflow", &self.outside.len())
            .finish_non_exhaustive()
    }
}

impl Backend for Bsp {
    fn insert(&mut self, slot: usize, aabb: Aabb) {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        if self.slots[slot].is_some() {
            self.unplace(slot);
        }
        self.place(slot, aabb);
    }

    fn update(&mut self, slot: usize, aabb: Aabb) {
        if self.slots.get(slot).is_none_or(|s| s.is_none()) {
            return;
        }
        self.unplace(slot);
        self.place(slot, aabb);
    }

    fn remove(&mut self, slot: usize) {
        self.unplace(slot);
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node {
            bounds: self.world,
            depth: 0,
            kind: NodeKind::Leaf(SmallVec::new()),
        });
        self.slots.clear();
        self.outside.clear();
    }

    fn visit_point<F: FnMut(usize)>(&self, x: f64, y: f64, f: F) {
        self.visit_matching(|a| a.contains_point(x, y), f);
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb, f: F) {
        self.visit_matching(|a| a.overlaps(&rect), f);
    }
}
