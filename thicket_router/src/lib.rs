// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thicket Router: deterministic input routing over a scene.
//!
//! The router decides which item receives each pointer or keyboard event
//! and manages the stateful parts of input: grab stacks, the hover chain,
//! and the keyboard focus ring.
//!
//! ## Grabs
//!
//! Each event class (pointer, keyboard) has a grab stack, innermost last.
//! A press accepted by an item pushes an *implicit* grab: further pointer
//! events go straight to that item, bypassing hit testing, until a release
//! with no buttons held pops the grab. Items can also take *explicit*
//! grabs (popups) via [`Router::grab_pointer`] / [`Router::grab_keyboard`];
//! those stay until explicitly released. An item that grabs while already
//! holding an implicit grab upgrades it in place; other double grabs are
//! diagnosed and ignored. When a grabber is removed, hidden, or disabled,
//! the grab is force-popped with a dying flag that suppresses the
//! (meaningless) ungrab notification to the item itself.
//!
//! ## Delivery
//!
//! Events reach items through an [`EventSink`] the host implements; the
//! sink returns an [`Outcome`] deciding whether the offer loop continues.
//! Handlers may freely mutate the scene mid-dispatch — the router
//! revalidates every handle after each sink call, so an item removing
//! itself (or its grabber) in a handler is a first-class transition, not
//! an error.
//!
//! Before delivery the router consults the target's event filter, if one
//! is installed: the filter item sees the event first and can swallow it
//! unconditionally. Filters run before any enabled check, so a disabled
//! item can still block delivery to its watched target. If a modal panel
//! is active, presses aimed outside its subtree retarget to the panel.
//!
//! ## Hover
//!
//! On ungrabbed pointer moves the router re-hit-tests and diffs the old
//! and new hover paths at their common ancestor: leave notifications go
//! innermost-out, enter notifications outermost-in, then a move to the
//! leaf. Items that do not opt into hover (no
//! [`ItemFlags::ACCEPTS_HOVER`](thicket_scene::ItemFlags)) are skipped for
//! notifications but still occupy the chain, so their ancestors transition
//! correctly.
//!
//! ## Focus
//!
//! Focusable items are linked into a ring (independent of the tree, seeded
//! in registration order) used for Tab navigation; see [`FocusRing`].
//! Keyboard events route to the keyboard grabber if any, else along the
//! focused item's ancestor chain until accepted.
//!
//! ## Synchronization
//!
//! [`Router::sync_with_scene`] is the post-mutation drain point: call it
//! after tree mutations (once per tick is enough) to force-release grabs
//! held by dead, hidden, or disabled items, prune the hover chain, and
//! advance focus off dead items.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod events;
mod focus;
mod router;

pub use events::{
    EventSink, InputClass, ItemEvent, KeyEvent, KeyKind, Outcome, PointerButtons, PointerEvent,
    PointerKind,
};
pub use focus::FocusRing;
pub use router::{GrabKind, Router};
