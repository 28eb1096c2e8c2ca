// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched damage summary returned from commit.

use alloc::vec::Vec;

use crate::types::Aabb;

/// A batched set of changes derived from [`crate::Index::commit`].
///
/// Damage is intentionally coarse: it summarizes the boxes that changed
/// between the previous and current commit, which is enough to bound repaint
/// or visibility work. Boxes may overlap and are not deduplicated.
#[derive(Clone, Debug, Default)]
pub struct Damage {
    /// Boxes of entries added since the last commit.
    pub added: Vec<Aabb>,
    /// Boxes of entries removed since the last commit.
    pub removed: Vec<Aabb>,
    /// `(previous, current)` box pairs of entries that moved or resized.
    pub moved: Vec<(Aabb, Aabb)>,
}

impl Damage {
    /// True if no changes were recorded.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }

    /// The union of every recorded box, or `None` if the damage is empty.
    pub fn union(&self) -> Option<Aabb> {
        let mut it = self
            .added
            .iter()
            .chain(self.removed.iter())
            .chain(self.moved.iter().flat_map(|(a, b)| [a, b]))
            .copied();
        let first = it.next()?;
        Some(it.fold(first, |acc, a| acc.union(&a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_all_categories() {
        let dmg = Damage {
            added: alloc::vec![Aabb::new(0.0, 0.0, 1.0, 1.0)],
            removed: alloc::vec![Aabb::new(10.0, 10.0, 11.0, 11.0)],
            moved: alloc::vec![(
                Aabb::new(-5.0, 0.0, -4.0, 1.0),
                Aabb::new(20.0, 0.0, 21.0, 1.0),
            )],
        };
        assert!(!dmg.is_empty());
        assert_eq!(dmg.union(), Some(Aabb::new(-5.0, 0.0, 21.0, 11.0)));
        assert!(Damage::default().union().is_none());
    }
}
