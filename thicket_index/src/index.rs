// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API: generational keys, pending marks, batched commit.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::Linear;
use crate::damage::Damage;
use crate::types::Aabb;

/// Generational handle for index entries.
///
/// A `Key` stays stable across updates and becomes invalid when its slot is
/// reused; stale keys never alias a different live entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(u32, u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Index keys are intentionally 32-bit; higher bits are truncated by design."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Added,
    Updated,
    Removed,
}

#[derive(Clone, Debug)]
struct Entry<P> {
    generation: u32,
    aabb: Aabb,
    payload: P,
    mark: Option<Mark>,
    prev_aabb: Option<Aabb>, // for moved damage
}

/// An AABB index with payloads, parameterized by a spatial backend.
///
/// Mutations are recorded as pending marks; [`Index::commit`] applies them to
/// the backend and returns a [`Damage`] summary. Queries between a mutation
/// and the next commit answer from the last-committed boxes, which is why
/// results are estimates that callers refine geometrically.
#[derive(Debug)]
pub struct Index<P: Copy + Debug, B: Backend = Linear> {
    entries: Vec<Option<Entry<P>>>,
    free_list: Vec<usize>,
    backend: B,
    rebuild_threshold: usize,
}

impl<P, B> Index<P, B>
where
    P: Copy + Debug,
    B: Backend + Default,
{
    /// Create an empty index using the backend's default constructor.
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<P, B> Default for Index<P, B>
where
    P: Copy + Debug,
    B: Backend + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, B> Index<P, B>
where
    P: Copy + Debug,
    B: Backend,
{
    /// Pending-operation count at which commit rebuilds the backend
    /// wholesale instead of applying changes one by one.
    pub const DEFAULT_REBUILD_THRESHOLD: usize = 64;

    /// Create an empty index using an explicit backend instance.
    pub fn with_backend(backend: B) -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            backend,
            rebuild_threshold: Self::DEFAULT_REBUILD_THRESHOLD,
        }
    }

    /// Set the rebuild threshold (clamped to at least 1).
    ///
    /// This is a tunable batching parameter, not a correctness knob: any
    /// value yields the same query results after commit.
    pub fn set_rebuild_threshold(&mut self, threshold: usize) {
        self.rebuild_threshold = threshold.max(1);
    }

    /// Reserve space for at least `n` entries.
    pub fn reserve(&mut self, n: usize) {
        self.entries.reserve(n);
    }

    /// Insert a new AABB with payload. Returns a stable [`Key`].
    pub fn insert(&mut self, aabb: Aabb, payload: P) -> Key {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.entries[idx]
                .as_ref()
                .map(|e| e.generation)
                .unwrap_or(0)
                + 1;
            self.entries[idx] = Some(Entry {
                generation,
                aabb,
                payload,
                mark: Some(Mark::Added),
                prev_aabb: None,
            });
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.entries.push(Some(Entry {
                generation,
                aabb,
                payload,
                mark: Some(Mark::Added),
                prev_aabb: None,
            }));
            (self.entries.len() - 1, generation)
        };
        Key::new(idx, generation)
    }

    /// Update an existing entry's AABB. No-op for stale keys.
    pub fn update(&mut self, key: Key, aabb: Aabb) {
        if let Some(e) = self.entry_mut(key) {
            if e.mark.is_none() {
                e.prev_aabb = Some(e.aabb);
            }
            e.aabb = aabb;
            e.mark = Some(match e.mark {
                Some(Mark::Added) => Mark::Added,
                _ => Mark::Updated,
            });
        }
    }

    /// Remove an existing entry. No-op for stale keys.
    ///
    /// An entry added and removed within the same batch vanishes without
    /// reporting damage.
    pub fn remove(&mut self, key: Key) {
        if let Some(e) = self.entry_mut(key) {
            if matches!(e.mark, Some(Mark::Added)) {
                self.entries[key.idx()] = None;
                self.free_list.push(key.idx());
            } else {
                e.mark = Some(Mark::Removed);
            }
        }
    }

    /// The last-recorded AABB and payload for a live key.
    pub fn get(&self, key: Key) -> Option<(Aabb, P)> {
        let e = self.entries.get(key.idx())?.as_ref()?;
        if e.generation != key.1 {
            return None;
        }
        Some((e.aabb, e.payload))
    }

    /// Clear the index (without reporting damage).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_list.clear();
        self.backend.clear();
    }

    /// Apply pending changes, synchronize the backend, and return damage.
    ///
    /// If the number of pending operations has reached the rebuild
    /// threshold, the backend is cleared and rebuilt from all live entries
    /// instead of being patched one operation at a time.
    pub fn commit(&mut self) -> Damage {
        let pending = self
            .entries
            .iter()
            .flatten()
            .filter(|e| e.mark.is_some())
            .count();
        let rebuild = pending >= self.rebuild_threshold;

        let mut dmg = Damage::default();
        for i in 0..self.entries.len() {
            let Some(entry) = self.entries[i].as_mut() else {
                continue;
            };
            match entry.mark.take() {
                Some(Mark::Added) => {
                    let aabb = entry.aabb;
                    if !rebuild {
                        self.backend.insert(i, aabb);
                    }
                    dmg.added.push(aabb);
                }
                Some(Mark::Removed) => {
                    let aabb = entry.aabb;
                    dmg.removed.push(aabb);
                    self.entries[i] = None;
                    self.free_list.push(i);
                    if !rebuild {
                        self.backend.remove(i);
                    }
                }
                Some(Mark::Updated) => {
                    let aabb = entry.aabb;
                    let prev = entry.prev_aabb.take();
                    if !rebuild {
                        self.backend.update(i, aabb);
                    }
                    if let Some(prev) = prev
                        && prev != aabb
                    {
                        dmg.moved.push((prev, aabb));
                    }
                }
                None => {}
            }
        }

        if rebuild {
            self.backend.clear();
            for (i, e) in self.entries.iter().enumerate() {
                if let Some(e) = e {
                    self.backend.insert(i, e.aabb);
                }
            }
        }

        dmg
    }

    /// Query entries whose committed AABB contains the point.
    pub fn query_point(&self, x: f64, y: f64) -> impl Iterator<Item = (Key, P)> + '_ {
        let mut out = Vec::new();
        self.visit_point(x, y, |k, p| out.push((k, p)));
        out.into_iter()
    }

    /// Visit entries whose committed AABB contains the point.
    ///
    /// Calls `f(key, payload)` for each match. The order is
    /// backend-dependent.
    pub fn visit_point<F: FnMut(Key, P)>(&self, x: f64, y: f64, mut f: F) {
        self.backend.visit_point(x, y, |i| {
            if let Some(Some(e)) = self.entries.get(i) {
                f(Key::new(i, e.generation), e.payload);
            }
        });
    }

    /// Query entries whose committed AABB intersects the rectangle.
    pub fn query_rect(&self, rect: Aabb) -> impl Iterator<Item = (Key, P)> + '_ {
        let mut out = Vec::new();
        self.visit_rect(rect, |k, p| out.push((k, p)));
        out.into_iter()
    }

    /// Visit entries whose committed AABB intersects the rectangle.
    ///
    /// Calls `f(key, payload)` for each match. The order is
    /// backend-dependent.
    pub fn visit_rect<F: FnMut(Key, P)>(&self, rect: Aabb, mut f: F) {
        self.backend.visit_rect(rect, |i| {
            if let Some(Some(e)) = self.entries.get(i) {
                f(Key::new(i, e.generation), e.payload);
            }
        });
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut Entry<P>> {
        let e = self.entries.get_mut(key.idx())?.as_mut()?;
        if e.generation != key.1 {
            return None;
        }
        Some(e)
    }
}
