// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The router: grab stacks, the pointer/keyboard state machines, hover
//! transitions, and focus management.

use alloc::vec::Vec;
use hashbrown::HashMap;
use kurbo::{Affine, Point};
use thicket_index::Backend;
use thicket_scene::{ItemFlags, ItemId, Scene, ShapeSource, Visibility};

use crate::events::{
    EventSink, InputClass, ItemEvent, KeyEvent, Outcome, PointerEvent, PointerKind,
};
use crate::focus::FocusRing;

/// How a grab was acquired.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrabKind {
    /// Acquired automatically by an accepted press; released automatically
    /// on the matching all-buttons-up release.
    Implicit,
    /// Acquired programmatically (e.g. by a popup); stays until explicitly
    /// released.
    Explicit,
}

/// Input router over one scene.
///
/// The router holds no reference to the scene; every entry point takes
/// `&mut Scene` so handlers invoked through the [`EventSink`] can mutate
/// the tree mid-dispatch. See the crate docs for the routing rules.
#[derive(Debug, Default)]
pub struct Router {
    pointer_grabs: Vec<(ItemId, GrabKind)>,
    keyboard_grabs: Vec<(ItemId, GrabKind)>,
    /// Current hover path, root first.
    hover_path: Vec<ItemId>,
    ring: FocusRing,
    focused: Option<ItemId>,
    /// watched item -> filter item.
    filters: HashMap<ItemId, ItemId>,
    /// Modal activation stack, innermost last.
    modal_panels: Vec<ItemId>,
}

impl Router {
    /// Create a router with no grabs, hover, or focus.
    pub fn new() -> Self {
        Self::default()
    }

    // --- introspection ---

    /// The innermost pointer grabber, if any.
    pub fn pointer_grabber(&self) -> Option<ItemId> {
        self.pointer_grabs.last().map(|(g, _)| *g)
    }

    /// The innermost keyboard grabber, if any.
    pub fn keyboard_grabber(&self) -> Option<ItemId> {
        self.keyboard_grabs.last().map(|(g, _)| *g)
    }

    /// Depth of the pointer grab stack.
    pub fn pointer_grab_depth(&self) -> usize {
        self.pointer_grabs.len()
    }

    /// The current hover path, root first.
    pub fn hover_path(&self) -> &[ItemId] {
        &self.hover_path
    }

    /// The focused item, if any.
    pub fn focused(&self) -> Option<ItemId> {
        self.focused
    }

    // --- pointer ---

    /// Route one pointer event.
    ///
    /// Returns `true` if the event was consumed (delivered to a grabber,
    /// accepted by a hit item, or swallowed by a filter). Ungrabbed moves
    /// drive the hover chain and return `false`.
    pub fn pointer_event<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        device: Affine,
        shapes: &impl ShapeSource,
        ev: &PointerEvent,
    ) -> bool {
        self.drop_invalid_grabs(scene, sink, InputClass::Pointer);

        if let Some((grabber, _)) = self.pointer_grabs.last().copied() {
            // While grabbed, every pointer event goes to the innermost
            // grabber without hit-testing.
            if !self.pointer_filtered(scene, sink, grabber, ev) && scene.is_alive(grabber) {
                let local = local_point(scene, grabber, device, ev.pos);
                let _ = sink.deliver(scene, grabber, &ItemEvent::Pointer { event: ev, local });
            }
            if ev.kind == PointerKind::Release && ev.buttons.is_empty() {
                // The handler may have restructured the stack; only an
                // implicit innermost grab auto-releases.
                if matches!(self.pointer_grabs.last(), Some((_, GrabKind::Implicit))) {
                    self.pop_grab(scene, sink, InputClass::Pointer, false);
                }
            }
            return true;
        }

        match ev.kind {
            PointerKind::Press => self.offer_pointer(scene, sink, device, shapes, ev, true),
            PointerKind::Release => self.offer_pointer(scene, sink, device, shapes, ev, false),
            PointerKind::Move => {
                self.update_hover(scene, sink, device, shapes, ev.pos);
                false
            }
        }
    }

    /// Take an explicit pointer grab for `item`.
    ///
    /// If `item` already holds the innermost grab implicitly, the grab is
    /// upgraded in place; an explicit re-grab is diagnosed and ignored.
    pub fn grab_pointer<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        item: ItemId,
    ) {
        if !scene.is_alive(item) {
            debug_assert!(false, "grab_pointer: stale item handle");
            return;
        }
        self.push_grab(scene, sink, InputClass::Pointer, item, GrabKind::Explicit);
    }

    /// Release `item`'s pointer grab. Diagnosed no-op if it is not a
    /// grabber.
    pub fn ungrab_pointer<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        item: ItemId,
    ) {
        self.ungrab(scene, sink, InputClass::Pointer, item);
    }

    /// Take an explicit keyboard grab for `item` (same rules as
    /// [`Router::grab_pointer`]).
    pub fn grab_keyboard<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        item: ItemId,
    ) {
        if !scene.is_alive(item) {
            debug_assert!(false, "grab_keyboard: stale item handle");
            return;
        }
        self.push_grab(scene, sink, InputClass::Keyboard, item, GrabKind::Explicit);
    }

    /// Release `item`'s keyboard grab. Diagnosed no-op if it is not a
    /// grabber.
    pub fn ungrab_keyboard<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        item: ItemId,
    ) {
        self.ungrab(scene, sink, InputClass::Keyboard, item);
    }

    // --- keyboard ---

    /// Route one keyboard event: to the innermost keyboard grabber if any,
    /// otherwise along the focused item's ancestor chain until accepted.
    pub fn key_event<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        ev: &KeyEvent,
    ) -> bool {
        self.drop_invalid_grabs(scene, sink, InputClass::Keyboard);

        if let Some((grabber, _)) = self.keyboard_grabs.last().copied() {
            if !self.key_filtered(scene, sink, grabber, ev) && scene.is_alive(grabber) {
                let _ = sink.deliver(scene, grabber, &ItemEvent::Key { event: ev });
            }
            return true;
        }

        let mut cur = self.focused;
        while let Some(c) = cur {
            if !scene.is_alive(c) {
                break;
            }
            if self.key_filtered(scene, sink, c, ev) {
                return true;
            }
            if matches!(
                sink.deliver(scene, c, &ItemEvent::Key { event: ev }),
                Outcome::Accepted
            ) {
                return true;
            }
            cur = scene.parent_of(c);
        }
        false
    }

    // --- focus ---

    /// Link a focusable item into the focus ring, at the end of the
    /// registration order.
    pub fn register_focusable<B: Backend>(&mut self, scene: &Scene<B>, id: ItemId) {
        if !scene.is_alive(id) {
            debug_assert!(false, "register_focusable: stale item handle");
            return;
        }
        debug_assert!(
            scene
                .flags(id)
                .is_some_and(|f| f.contains(ItemFlags::FOCUSABLE)),
            "register_focusable: item is not flagged FOCUSABLE"
        );
        self.ring.insert(id);
    }

    /// Unlink an item from the focus ring, dropping focus from it first if
    /// needed.
    pub fn unregister_focusable<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        id: ItemId,
    ) {
        if self.focused == Some(id) {
            self.set_focus(scene, sink, None);
        }
        if self.ring.contains(id) {
            self.ring.remove(id);
        }
    }

    /// Move keyboard focus, emitting `FocusOut` to the old item before
    /// `FocusIn` to the new one.
    pub fn set_focus<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        item: Option<ItemId>,
    ) {
        if self.focused == item {
            return;
        }
        if let Some(new) = item
            && !scene.is_alive(new)
        {
            debug_assert!(false, "set_focus: stale item handle");
            return;
        }
        if let Some(old) = self.focused.take()
            && scene.is_alive(old)
        {
            let _ = sink.deliver(scene, old, &ItemEvent::FocusOut);
        }
        if let Some(new) = item
            // The FocusOut handler may have removed the new target.
            && scene.is_alive(new)
        {
            self.focused = Some(new);
            let _ = sink.deliver(scene, new, &ItemEvent::FocusIn);
        }
    }

    /// Advance focus to the next active ring member (Tab).
    pub fn focus_next<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
    ) -> Option<ItemId> {
        self.advance_focus(scene, sink, true)
    }

    /// Advance focus to the previous active ring member (Shift-Tab).
    pub fn focus_prev<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
    ) -> Option<ItemId> {
        self.advance_focus(scene, sink, false)
    }

    // --- filters and modality ---

    /// Install `filter` as the event filter for `watched`. The filter item
    /// sees every event aimed at `watched` first and can swallow it.
    pub fn install_filter(&mut self, watched: ItemId, filter: ItemId) {
        self.filters.insert(watched, filter);
    }

    /// Remove the event filter for `watched`, if any.
    pub fn remove_filter(&mut self, watched: ItemId) {
        self.filters.remove(&watched);
    }

    /// Activate a modal panel: presses aimed outside its subtree retarget
    /// to it.
    pub fn push_modal_panel(&mut self, panel: ItemId) {
        self.modal_panels.push(panel);
    }

    /// Deactivate the innermost modal panel.
    pub fn pop_modal_panel(&mut self) -> Option<ItemId> {
        self.modal_panels.pop()
    }

    // --- synchronization ---

    /// Post-mutation drain point.
    ///
    /// Force-releases grabs held by items that are dead, hidden, or
    /// disabled (innermost first, suppressing the ungrab notification to
    /// the item itself), prunes the hover chain, drops dead focus-ring
    /// members, moves focus off inactive items, and discards filters and
    /// modal panels attached to dead items.
    pub fn sync_with_scene<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
    ) {
        self.drop_invalid_grabs(scene, sink, InputClass::Pointer);
        self.drop_invalid_grabs(scene, sink, InputClass::Keyboard);

        // Hover: truncate at the first entry that is no longer a valid
        // hover ancestor, sending leaves innermost-out.
        let cut = self
            .hover_path
            .iter()
            .position(|i| !scene.is_alive(*i) || scene.visibility(*i) != Some(Visibility::Visible));
        if let Some(cut) = cut {
            let removed: Vec<ItemId> = self.hover_path.drain(cut..).collect();
            for &i in removed.iter().rev() {
                if scene.is_alive(i) && accepts_hover(scene, i) {
                    let _ = sink.deliver(scene, i, &ItemEvent::HoverLeave);
                }
            }
        }

        // Focus: dead members leave the ring silently; a dead or inactive
        // focused item loses focus to the next active member.
        let dead: Vec<ItemId> = self
            .ring
            .members()
            .filter(|i| !scene.is_alive(*i))
            .collect();
        let mut focus_died = false;
        for d in dead {
            if self.focused == Some(d) {
                self.focused = None;
                focus_died = true;
            }
            self.ring.remove(d);
        }
        if let Some(f) = self.focused
            && !item_active(scene, f)
        {
            self.set_focus(scene, sink, None);
            let _ = self.advance_focus(scene, sink, true);
        } else if focus_died {
            let _ = self.advance_focus(scene, sink, true);
        }

        self.filters
            .retain(|t, f| scene.is_alive(*t) && scene.is_alive(*f));
        self.modal_panels.retain(|p| scene.is_alive(*p));
    }

    // --- internals ---

    fn stack(&self, class: InputClass) -> &Vec<(ItemId, GrabKind)> {
        match class {
            InputClass::Pointer => &self.pointer_grabs,
            InputClass::Keyboard => &self.keyboard_grabs,
        }
    }

    fn stack_mut(&mut self, class: InputClass) -> &mut Vec<(ItemId, GrabKind)> {
        match class {
            InputClass::Pointer => &mut self.pointer_grabs,
            InputClass::Keyboard => &mut self.keyboard_grabs,
        }
    }

    fn push_grab<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        class: InputClass,
        item: ItemId,
        kind: GrabKind,
    ) {
        if let Some((top, top_kind)) = self.stack(class).last().copied() {
            if top == item {
                match (top_kind, kind) {
                    (GrabKind::Implicit, GrabKind::Explicit) => {
                        // An item may upgrade its own implicit grab.
                        self.stack_mut(class).last_mut().expect("non-empty").1 = GrabKind::Explicit;
                    }
                    _ => debug_assert!(false, "grab: item is already the innermost grabber"),
                }
                return;
            }
            // The current innermost is told it lost the active grab before
            // the new grab is pushed onto the stack.
            if scene.is_alive(top) {
                let _ = sink.deliver(scene, top, &ItemEvent::GrabLost(class));
            }
        }
        self.stack_mut(class).push((item, kind));
        if scene.is_alive(item) {
            let _ = sink.deliver(scene, item, &ItemEvent::GrabGained(class));
        }
    }

    /// Pop the innermost grab. `dying` suppresses the notification to the
    /// popped item (forced release of a removed/hidden/disabled grabber);
    /// the new innermost grabber, if any, always hears it regained the
    /// grab.
    fn pop_grab<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        class: InputClass,
        dying: bool,
    ) {
        let Some((item, _)) = self.stack_mut(class).pop() else {
            return;
        };
        if !dying && scene.is_alive(item) {
            let _ = sink.deliver(scene, item, &ItemEvent::GrabLost(class));
        }
        if let Some((inner, _)) = self.stack(class).last().copied()
            && scene.is_alive(inner)
        {
            let _ = sink.deliver(scene, inner, &ItemEvent::GrabGained(class));
        }
    }

    fn ungrab<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        class: InputClass,
        item: ItemId,
    ) {
        match self.stack(class).iter().rposition(|(g, _)| *g == item) {
            Some(pos) if pos + 1 == self.stack(class).len() => {
                self.pop_grab(scene, sink, class, false);
            }
            Some(pos) => {
                // A non-active grab vanishes without notifications; the
                // active grab is untouched.
                self.stack_mut(class).remove(pos);
            }
            None => debug_assert!(false, "ungrab: item is not a grabber"),
        }
    }

    /// Force-release grabs held by items that can no longer receive
    /// events, innermost first.
    fn drop_invalid_grabs<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        class: InputClass,
    ) {
        loop {
            let Some(pos) = self
                .stack(class)
                .iter()
                .rposition(|(g, _)| !item_active(scene, *g))
            else {
                break;
            };
            if pos + 1 == self.stack(class).len() {
                self.pop_grab(scene, sink, class, true);
            } else {
                self.stack_mut(class).remove(pos);
            }
        }
    }

    /// Offer a press (or ungrabbed release) to hit candidates in stacking
    /// order until one accepts. On an accepted press, the acceptor gains
    /// an implicit grab.
    fn offer_pointer<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        device: Affine,
        shapes: &impl ShapeSource,
        ev: &PointerEvent,
        grab_on_accept: bool,
    ) -> bool {
        let hits = scene.hit_test(ev.pos, device, shapes);
        let mut panel_offered = false;
        for candidate in hits {
            if !scene.is_alive(candidate) {
                // A previous handler removed this candidate mid-dispatch.
                continue;
            }
            let target = self.modal_retarget(scene, candidate);
            if target != candidate {
                // Each blocked candidate retargets to the same panel; offer
                // it once.
                if panel_offered {
                    continue;
                }
                panel_offered = true;
            }
            if self.pointer_filtered(scene, sink, target, ev) {
                return true;
            }
            if !scene.is_alive(target) {
                continue;
            }
            let local = local_point(scene, target, device, ev.pos);
            if matches!(
                sink.deliver(scene, target, &ItemEvent::Pointer { event: ev, local }),
                Outcome::Accepted
            ) {
                if grab_on_accept && ev.kind == PointerKind::Press && scene.is_alive(target) {
                    self.push_grab(scene, sink, InputClass::Pointer, target, GrabKind::Implicit);
                }
                return true;
            }
        }
        false
    }

    /// Re-hit-test and emit hover transitions against the common ancestor
    /// of the old and new hover paths.
    fn update_hover<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        device: Affine,
        shapes: &impl ShapeSource,
        pos: Point,
    ) {
        let new_leaf = scene.hit_test(pos, device, shapes).first().copied();
        let new_path = match new_leaf {
            Some(leaf) => path_to_root(scene, leaf),
            None => Vec::new(),
        };
        let old = core::mem::take(&mut self.hover_path);

        let mut lca = 0;
        while lca < old.len() && lca < new_path.len() && old[lca] == new_path[lca] {
            lca += 1;
        }
        // Leaves: old tail, innermost out. Items not opted into hover are
        // skipped for delivery but still anchor the chain walk.
        for &i in old[lca..].iter().rev() {
            if scene.is_alive(i) && accepts_hover(scene, i) {
                let _ = sink.deliver(scene, i, &ItemEvent::HoverLeave);
            }
        }
        // Enters: new tail, outermost in.
        for &i in &new_path[lca..] {
            if scene.is_alive(i) && accepts_hover(scene, i) {
                let _ = sink.deliver(scene, i, &ItemEvent::HoverEnter);
            }
        }
        if let Some(leaf) = new_leaf
            && scene.is_alive(leaf)
            && accepts_hover(scene, leaf)
        {
            let local = local_point(scene, leaf, device, pos);
            let _ = sink.deliver(scene, leaf, &ItemEvent::HoverMove { local });
        }
        self.hover_path = new_path;
    }

    fn advance_focus<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        forward: bool,
    ) -> Option<ItemId> {
        if self.ring.is_empty() {
            return None;
        }
        let (start, mut check_self) = match self.focused.filter(|f| self.ring.contains(*f)) {
            Some(f) => (f, false),
            // Nothing focused: the walk starts at (and may land on) the
            // first-registered member.
            None => (self.ring.head()?, true),
        };
        let mut cur = start;
        loop {
            let candidate = if check_self {
                check_self = false;
                cur
            } else {
                let n = if forward {
                    self.ring.next(cur)?
                } else {
                    self.ring.prev(cur)?
                };
                cur = n;
                if n == start {
                    return None;
                }
                n
            };
            if item_active(scene, candidate) {
                self.set_focus(scene, sink, Some(candidate));
                return self.focused;
            }
        }
    }

    fn modal_retarget<B: Backend>(&self, scene: &Scene<B>, target: ItemId) -> ItemId {
        for &panel in self.modal_panels.iter().rev() {
            if scene.is_alive(panel) {
                if target == panel || scene.is_ancestor_of(panel, target) {
                    return target;
                }
                return panel;
            }
        }
        target
    }

    fn pointer_filtered<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        target: ItemId,
        ev: &PointerEvent,
    ) -> bool {
        let Some(&filter) = self.filters.get(&target) else {
            return false;
        };
        if !scene.is_alive(filter) {
            return false;
        }
        matches!(
            sink.deliver(
                scene,
                filter,
                &ItemEvent::FilteredPointer { target, event: ev },
            ),
            Outcome::Accepted
        )
    }

    fn key_filtered<B: Backend, S: EventSink<B>>(
        &mut self,
        scene: &mut Scene<B>,
        sink: &mut S,
        target: ItemId,
        ev: &KeyEvent,
    ) -> bool {
        let Some(&filter) = self.filters.get(&target) else {
            return false;
        };
        if !scene.is_alive(filter) {
            return false;
        }
        matches!(
            sink.deliver(scene, filter, &ItemEvent::FilteredKey { target, event: ev }),
            Outcome::Accepted
        )
    }
}

/// Alive, visible, and enabled: able to receive events.
fn item_active<B: Backend>(scene: &Scene<B>, id: ItemId) -> bool {
    scene.is_alive(id)
        && scene.visibility(id) == Some(Visibility::Visible)
        && scene.is_effectively_enabled(id) == Some(true)
}

fn accepts_hover<B: Backend>(scene: &Scene<B>, id: ItemId) -> bool {
    scene
        .flags(id)
        .is_some_and(|f| f.contains(ItemFlags::ACCEPTS_HOVER))
}

fn local_point<B: Backend>(scene: &mut Scene<B>, id: ItemId, device: Affine, pos: Point) -> Point {
    scene
        .device_transform(id, device)
        .map(|tf| tf.inverse() * pos)
        .unwrap_or(pos)
}

fn path_to_root<B: Backend>(scene: &Scene<B>, leaf: ItemId) -> Vec<ItemId> {
    let mut path = Vec::new();
    let mut cur = Some(leaf);
    while let Some(c) = cur {
        path.push(c);
        cur = scene.parent_of(c);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KeyKind, PointerButtons};
    use alloc::vec;
    use kurbo::{Rect, Vec2};
    use thicket_scene::{BoundsShape, LocalItem};

    fn item(bounds: Rect) -> LocalItem {
        LocalItem {
            local_bounds: bounds,
            ..LocalItem::default()
        }
    }

    fn hover_item(bounds: Rect) -> LocalItem {
        LocalItem {
            flags: ItemFlags::ACCEPTS_HOVER,
            ..item(bounds)
        }
    }

    fn focusable(bounds: Rect) -> LocalItem {
        LocalItem {
            flags: ItemFlags::FOCUSABLE,
            ..item(bounds)
        }
    }

    fn press(x: f64, y: f64) -> PointerEvent {
        PointerEvent::press(
            Point::new(x, y),
            PointerButtons::PRIMARY,
            PointerButtons::PRIMARY,
        )
    }

    fn release_all(x: f64, y: f64) -> PointerEvent {
        PointerEvent::release(
            Point::new(x, y),
            PointerButtons::PRIMARY,
            PointerButtons::empty(),
        )
    }

    fn moved(x: f64, y: f64, buttons: PointerButtons) -> PointerEvent {
        PointerEvent::moved(Point::new(x, y), buttons)
    }

    #[derive(Default)]
    struct Recorder {
        log: Vec<(ItemId, &'static str)>,
        accepting: Vec<ItemId>,
        remove_on_press: Option<ItemId>,
    }

    impl Recorder {
        fn accepting(items: Vec<ItemId>) -> Self {
            Self {
                accepting: items,
                ..Self::default()
            }
        }

        fn count(&self, item: ItemId, tag: &str) -> usize {
            self.log.iter().filter(|(i, t)| *i == item && *t == tag).count()
        }
    }

    impl EventSink<thicket_index::backends::Bsp> for Recorder {
        fn deliver(&mut self, scene: &mut Scene, item: ItemId, event: &ItemEvent<'_>) -> Outcome {
            let tag = match event {
                ItemEvent::Pointer { event, .. } => match event.kind {
                    PointerKind::Press => "press",
                    PointerKind::Move => "move",
                    PointerKind::Release => "release",
                },
                ItemEvent::Key { .. } => "key",
                ItemEvent::FilteredPointer { .. } => "filter_pointer",
                ItemEvent::FilteredKey { .. } => "filter_key",
                ItemEvent::HoverEnter => "hover_enter",
                ItemEvent::HoverLeave => "hover_leave",
                ItemEvent::HoverMove { .. } => "hover_move",
                ItemEvent::GrabGained(_) => "grab_gained",
                ItemEvent::GrabLost(_) => "grab_lost",
                ItemEvent::FocusIn => "focus_in",
                ItemEvent::FocusOut => "focus_out",
            };
            self.log.push((item, tag));
            if let ItemEvent::Pointer { event, .. } = event
                && event.kind == PointerKind::Press
                && self.remove_on_press == Some(item)
            {
                scene.remove(item);
                return Outcome::Accepted;
            }
            let routable = matches!(
                event,
                ItemEvent::Pointer { .. }
                    | ItemEvent::Key { .. }
                    | ItemEvent::FilteredPointer { .. }
                    | ItemEvent::FilteredKey { .. }
            );
            if routable && self.accepting.contains(&item) {
                Outcome::Accepted
            } else {
                Outcome::Ignored
            }
        }
    }

    #[test]
    fn accepted_press_grabs_and_bypasses_hit_testing() {
        let mut scene: Scene = Scene::new();
        let c = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let d = scene.insert(None, hover_item(Rect::new(200.0, 200.0, 300.0, 300.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        let mut sink = Recorder::accepting(vec![c]);

        let handled = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(50.0, 50.0),
        );
        assert!(handled);
        assert_eq!(router.pointer_grabber(), Some(c));

        // A move far outside C still goes to C, never re-hit-tested.
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &moved(250.0, 250.0, PointerButtons::PRIMARY),
        );
        assert_eq!(sink.count(c, "move"), 1);
        assert_eq!(sink.count(d, "hover_enter"), 0, "no hit-test while grabbed");

        // A release with no buttons held clears the grab.
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &release_all(250.0, 250.0),
        );
        assert_eq!(router.pointer_grabber(), None);

        // The very next move re-hit-tests normally.
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &moved(250.0, 250.0, PointerButtons::empty()),
        );
        assert_eq!(sink.count(d, "hover_enter"), 1);
        assert_eq!(sink.count(c, "move"), 1, "no further delivery to C");
    }

    #[test]
    fn grab_stack_balances_across_multi_button_sequences() {
        let mut scene: Scene = Scene::new();
        let c = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let _ = scene.commit();
        let mut router = Router::new();
        let mut sink = Recorder::accepting(vec![c]);
        let dev = Affine::IDENTITY;

        let _ = router.pointer_event(&mut scene, &mut sink, dev, &BoundsShape, &press(10.0, 10.0));
        assert_eq!(router.pointer_grab_depth(), 1);

        // Second button while grabbed: routed to the grabber, no new grab.
        let both = PointerButtons::PRIMARY | PointerButtons::SECONDARY;
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            dev,
            &BoundsShape,
            &PointerEvent::press(Point::new(10.0, 10.0), PointerButtons::SECONDARY, both),
        );
        assert_eq!(router.pointer_grab_depth(), 1);

        // Releasing one button keeps the grab while the other is held.
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            dev,
            &BoundsShape,
            &PointerEvent::release(
                Point::new(10.0, 10.0),
                PointerButtons::PRIMARY,
                PointerButtons::SECONDARY,
            ),
        );
        assert_eq!(router.pointer_grab_depth(), 1);

        // All buttons up: the implicit grab pops.
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            dev,
            &BoundsShape,
            &PointerEvent::release(
                Point::new(10.0, 10.0),
                PointerButtons::SECONDARY,
                PointerButtons::empty(),
            ),
        );
        assert_eq!(router.pointer_grab_depth(), 0);
    }

    #[test]
    fn hiding_the_grabber_force_releases_without_self_notification() {
        let mut scene: Scene = Scene::new();
        let c = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let _ = scene.commit();
        let mut router = Router::new();
        let mut sink = Recorder::accepting(vec![c]);

        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(10.0, 10.0),
        );
        assert_eq!(router.pointer_grabber(), Some(c));

        scene.set_visible(c, false);
        router.sync_with_scene(&mut scene, &mut sink);
        assert_eq!(router.pointer_grabber(), None);
        assert_eq!(
            sink.count(c, "grab_lost"),
            0,
            "forced release must not notify the dying grabber"
        );
    }

    #[test]
    fn explicit_grab_upgrades_and_survives_release() {
        let mut scene: Scene = Scene::new();
        let c = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let _ = scene.commit();
        let mut router = Router::new();
        let mut sink = Recorder::accepting(vec![c]);
        let dev = Affine::IDENTITY;

        let _ = router.pointer_event(&mut scene, &mut sink, dev, &BoundsShape, &press(10.0, 10.0));
        router.grab_pointer(&mut scene, &mut sink, c);
        assert_eq!(router.pointer_grab_depth(), 1, "upgrade in place, no push");

        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            dev,
            &BoundsShape,
            &release_all(10.0, 10.0),
        );
        assert_eq!(
            router.pointer_grabber(),
            Some(c),
            "explicit grabs outlive the release"
        );

        router.ungrab_pointer(&mut scene, &mut sink, c);
        assert_eq!(router.pointer_grabber(), None);
        assert_eq!(sink.count(c, "grab_lost"), 1);
    }

    #[test]
    fn nested_grabs_notify_on_hand_over_and_regain() {
        let mut scene: Scene = Scene::new();
        let c = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let popup = scene.insert(None, item(Rect::new(200.0, 0.0, 300.0, 100.0)));
        let _ = scene.commit();
        let mut router = Router::new();
        let mut sink = Recorder::accepting(vec![c]);

        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(10.0, 10.0),
        );
        router.grab_pointer(&mut scene, &mut sink, popup);
        assert_eq!(router.pointer_grabber(), Some(popup));
        assert_eq!(sink.count(c, "grab_lost"), 1, "outer grabber told before push");
        assert_eq!(sink.count(popup, "grab_gained"), 1);

        router.ungrab_pointer(&mut scene, &mut sink, popup);
        assert_eq!(router.pointer_grabber(), Some(c));
        assert_eq!(sink.count(c, "grab_gained"), 2, "regained after the pop");
    }

    #[test]
    fn modal_panel_blocks_and_retargets_presses() {
        let mut scene: Scene = Scene::new();
        let outside = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let panel = scene.insert(
            None,
            LocalItem {
                flags: ItemFlags::PANEL,
                ..item(Rect::new(200.0, 0.0, 300.0, 100.0))
            },
        );
        let inside = scene.insert(Some(panel), item(Rect::new(200.0, 0.0, 250.0, 50.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        router.push_modal_panel(panel);
        let mut sink = Recorder::accepting(vec![outside, panel, inside]);

        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(50.0, 50.0),
        );
        assert_eq!(sink.count(outside, "press"), 0, "blocked by the modal panel");
        assert_eq!(sink.count(panel, "press"), 1, "retargeted to the panel");

        // Presses inside the panel's subtree route normally.
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &release_all(50.0, 50.0),
        );
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(225.0, 25.0),
        );
        assert_eq!(sink.count(inside, "press"), 1);
    }

    #[test]
    fn event_filter_is_consulted_first_and_can_swallow() {
        let mut scene: Scene = Scene::new();
        let target = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let watcher = scene.insert(None, item(Rect::new(500.0, 500.0, 510.0, 510.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        router.install_filter(target, watcher);

        // Swallowing filter: the target never sees the press.
        let mut sink = Recorder::accepting(vec![target, watcher]);
        let handled = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(50.0, 50.0),
        );
        assert!(handled);
        assert_eq!(sink.count(watcher, "filter_pointer"), 1);
        assert_eq!(sink.count(target, "press"), 0);
        assert_eq!(router.pointer_grabber(), None, "swallowed events grab nothing");

        // Declining filter: delivery proceeds to the target.
        let mut sink = Recorder::accepting(vec![target]);
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(50.0, 50.0),
        );
        assert_eq!(sink.count(watcher, "filter_pointer"), 1);
        assert_eq!(sink.count(target, "press"), 1);
        assert_eq!(router.pointer_grabber(), Some(target));
    }

    #[test]
    fn hover_transitions_at_the_common_ancestor() {
        let mut scene: Scene = Scene::new();
        let a = scene.insert(None, hover_item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let b = scene.insert(
            Some(a),
            LocalItem {
                pos: Vec2::new(10.0, 10.0),
                ..hover_item(Rect::new(0.0, 0.0, 30.0, 30.0))
            },
        );
        let d = scene.insert(None, hover_item(Rect::new(200.0, 200.0, 300.0, 300.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        let mut sink = Recorder::default();
        let dev = Affine::IDENTITY;
        let none = PointerButtons::empty();

        // Into B: enter outer-to-inner, then move to the leaf.
        let _ = router.pointer_event(&mut scene, &mut sink, dev, &BoundsShape, &moved(15.0, 15.0, none));
        assert_eq!(
            sink.log,
            vec![(a, "hover_enter"), (b, "hover_enter"), (b, "hover_move")]
        );
        assert_eq!(router.hover_path(), [a, b]);

        // To A-only area: leave B, move A; A never re-enters.
        sink.log.clear();
        let _ = router.pointer_event(&mut scene, &mut sink, dev, &BoundsShape, &moved(70.0, 70.0, none));
        assert_eq!(sink.log, vec![(b, "hover_leave"), (a, "hover_move")]);

        // Across to D: leave A, enter D.
        sink.log.clear();
        let _ = router.pointer_event(&mut scene, &mut sink, dev, &BoundsShape, &moved(250.0, 250.0, none));
        assert_eq!(
            sink.log,
            vec![(a, "hover_leave"), (d, "hover_enter"), (d, "hover_move")]
        );

        // Off everything: leave D.
        sink.log.clear();
        let _ = router.pointer_event(&mut scene, &mut sink, dev, &BoundsShape, &moved(500.0, 500.0, none));
        assert_eq!(sink.log, vec![(d, "hover_leave")]);
        assert!(router.hover_path().is_empty());
    }

    #[test]
    fn hover_skips_non_subscribers_but_keeps_them_in_the_chain() {
        let mut scene: Scene = Scene::new();
        let silent = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let leaf = scene.insert(
            Some(silent),
            hover_item(Rect::new(0.0, 0.0, 50.0, 50.0)),
        );
        let _ = scene.commit();

        let mut router = Router::new();
        let mut sink = Recorder::default();
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &moved(25.0, 25.0, PointerButtons::empty()),
        );
        assert_eq!(sink.log, vec![(leaf, "hover_enter"), (leaf, "hover_move")]);
        assert_eq!(
            router.hover_path(),
            [silent, leaf],
            "non-subscribers still anchor the chain"
        );
    }

    #[test]
    fn key_events_route_to_grabber_then_focus_chain() {
        let mut scene: Scene = Scene::new();
        let container = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let field = scene.insert(Some(container), focusable(Rect::new(0.0, 0.0, 50.0, 20.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        router.register_focusable(&scene, field);

        // The focused leaf ignores the key; its ancestor accepts it.
        let mut sink = Recorder::accepting(vec![container]);
        router.set_focus(&mut scene, &mut sink, Some(field));
        let ev = KeyEvent {
            kind: KeyKind::Down,
            code: 9,
        };
        assert!(router.key_event(&mut scene, &mut sink, &ev));
        assert_eq!(sink.count(field, "key"), 1);
        assert_eq!(sink.count(container, "key"), 1);

        // A keyboard grab bypasses the focus chain entirely.
        router.grab_keyboard(&mut scene, &mut sink, container);
        sink.log.clear();
        assert!(router.key_event(&mut scene, &mut sink, &ev));
        assert_eq!(sink.log, vec![(container, "key")]);
    }

    #[test]
    fn focus_ring_navigation_skips_inactive_members_and_wraps() {
        let mut scene: Scene = Scene::new();
        let a = scene.insert(None, focusable(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let b = scene.insert(None, focusable(Rect::new(20.0, 0.0, 30.0, 10.0)));
        let c = scene.insert(None, focusable(Rect::new(40.0, 0.0, 50.0, 10.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        for x in [a, b, c] {
            router.register_focusable(&scene, x);
        }
        let mut sink = Recorder::default();

        // Nothing focused: Tab lands on the first registered member.
        assert_eq!(router.focus_next(&mut scene, &mut sink), Some(a));
        scene.set_visible(b, false);
        assert_eq!(router.focus_next(&mut scene, &mut sink), Some(c), "skips hidden b");
        assert_eq!(router.focus_next(&mut scene, &mut sink), Some(a), "wraps");
        assert_eq!(router.focus_prev(&mut scene, &mut sink), Some(c), "backwards too");
        assert_eq!(sink.count(a, "focus_in"), 2);
        assert_eq!(sink.count(a, "focus_out"), 2);
    }

    #[test]
    fn removing_the_focused_item_moves_focus_to_a_live_member() {
        let mut scene: Scene = Scene::new();
        let a = scene.insert(None, focusable(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let b = scene.insert(None, focusable(Rect::new(20.0, 0.0, 30.0, 10.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        router.register_focusable(&scene, a);
        router.register_focusable(&scene, b);
        let mut sink = Recorder::default();
        router.set_focus(&mut scene, &mut sink, Some(a));

        scene.remove(a);
        router.sync_with_scene(&mut scene, &mut sink);
        assert_eq!(router.focused(), Some(b));
        assert_eq!(sink.count(b, "focus_in"), 1);
        assert_eq!(sink.count(a, "focus_out"), 0, "no notification to the dead");
    }

    #[test]
    fn target_removing_itself_mid_press_leaves_no_dangling_grab() {
        let mut scene: Scene = Scene::new();
        let c = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        let mut sink = Recorder {
            remove_on_press: Some(c),
            ..Recorder::default()
        };
        let handled = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(50.0, 50.0),
        );
        assert!(handled, "the handler accepted before dying");
        assert!(!scene.is_alive(c));
        assert_eq!(router.pointer_grab_depth(), 0, "no grab on a dead item");
    }

    #[test]
    fn grabber_dying_mid_dispatch_releases_on_next_event() {
        let mut scene: Scene = Scene::new();
        let c = scene.insert(None, item(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let _ = scene.commit();

        let mut router = Router::new();
        let mut sink = Recorder::accepting(vec![c]);
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &press(50.0, 50.0),
        );
        assert_eq!(router.pointer_grabber(), Some(c));

        // The grabber is removed outside any handler (host mutation).
        scene.remove(c);
        let _ = router.pointer_event(
            &mut scene,
            &mut sink,
            Affine::IDENTITY,
            &BoundsShape,
            &moved(60.0, 60.0, PointerButtons::PRIMARY),
        );
        assert_eq!(router.pointer_grabber(), None);
        assert_eq!(sink.count(c, "grab_lost"), 0, "dying pop is silent to the item");
    }
}
