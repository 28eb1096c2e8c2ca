// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event types and the delivery seam between the router and the host.

use kurbo::Point;
use thicket_index::Backend;
use thicket_scene::{ItemId, Scene};

bitflags::bitflags! {
    /// Pointer button state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PointerButtons: u8 {
        /// Primary (usually left) button.
        const PRIMARY   = 1 << 0;
        /// Secondary (usually right) button.
        const SECONDARY = 1 << 1;
        /// Middle button.
        const MIDDLE    = 1 << 2;
    }
}

/// What a pointer event reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerKind {
    /// A button went down.
    Press,
    /// The pointer moved.
    Move,
    /// A button went up.
    Release,
}

/// One pointer event in device coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerEvent {
    /// Press, move, or release.
    pub kind: PointerKind,
    /// Position in device (viewport) coordinates.
    pub pos: Point,
    /// The button that changed for press/release; empty for moves.
    pub button: PointerButtons,
    /// All buttons held *after* this event.
    pub buttons: PointerButtons,
}

impl PointerEvent {
    /// A press of `button` at `pos`, with `buttons` held afterwards.
    pub fn press(pos: Point, button: PointerButtons, buttons: PointerButtons) -> Self {
        Self {
            kind: PointerKind::Press,
            pos,
            button,
            buttons,
        }
    }

    /// A move at `pos` with `buttons` held.
    pub fn moved(pos: Point, buttons: PointerButtons) -> Self {
        Self {
            kind: PointerKind::Move,
            pos,
            button: PointerButtons::empty(),
            buttons,
        }
    }

    /// A release of `button` at `pos`, with `buttons` remaining held.
    pub fn release(pos: Point, button: PointerButtons, buttons: PointerButtons) -> Self {
        Self {
            kind: PointerKind::Release,
            pos,
            button,
            buttons,
        }
    }
}

/// Key press or release.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// Key went down.
    Down,
    /// Key went up.
    Up,
}

/// One keyboard event. The code's meaning is host-defined.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// Down or up.
    pub kind: KeyKind,
    /// Host-defined key code.
    pub code: u32,
}

/// The two event classes with independent grab stacks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InputClass {
    /// Pointer events (press/move/release).
    Pointer,
    /// Keyboard events.
    Keyboard,
}

/// An event as delivered to one item.
#[derive(Copy, Clone, Debug)]
pub enum ItemEvent<'a> {
    /// A pointer event targeted at the item, with the position mapped into
    /// the item's local coordinates.
    Pointer {
        /// The device-space event.
        event: &'a PointerEvent,
        /// `event.pos` in the item's local space.
        local: Point,
    },
    /// A keyboard event targeted at the item.
    Key {
        /// The event.
        event: &'a KeyEvent,
    },
    /// The item's installed filter is consulted about an event aimed at
    /// `target`. Returning [`Outcome::Accepted`] swallows the event.
    FilteredPointer {
        /// The item the event was going to.
        target: ItemId,
        /// The device-space event.
        event: &'a PointerEvent,
    },
    /// Keyboard variant of [`ItemEvent::FilteredPointer`].
    FilteredKey {
        /// The item the event was going to.
        target: ItemId,
        /// The event.
        event: &'a KeyEvent,
    },
    /// The pointer entered the item (or a descendant).
    HoverEnter,
    /// The pointer left the item's subtree.
    HoverLeave,
    /// The pointer moved within the hover leaf.
    HoverMove {
        /// Pointer position in the item's local space.
        local: Point,
    },
    /// The item became the innermost grabber for the class.
    GrabGained(InputClass),
    /// The item stopped being the innermost grabber for the class.
    GrabLost(InputClass),
    /// The item gained keyboard focus.
    FocusIn,
    /// The item lost keyboard focus.
    FocusOut,
}

/// Whether a delivered event was consumed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The item handled the event; offer loops stop, presses grab.
    Accepted,
    /// Not handled; the router keeps looking.
    Ignored,
}

/// The delivery seam the host implements.
///
/// The router never knows what an item *does* with an event; it hands the
/// event (and mutable scene access) to the sink and acts on the returned
/// [`Outcome`]. Notification events (hover, grab, focus) ignore the
/// outcome.
///
/// Handlers may mutate the scene, including removing the target item; the
/// router revalidates handles after every call.
pub trait EventSink<B: Backend> {
    /// Deliver `event` to `item`.
    fn deliver(&mut self, scene: &mut Scene<B>, item: ItemId, event: &ItemEvent<'_>) -> Outcome;
}
