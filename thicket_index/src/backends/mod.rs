// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial backend implementations.

#[cfg(feature = "backend_bsp")]
mod bsp;
mod linear;

#[cfg(feature = "backend_bsp")]
pub use bsp::Bsp;
pub use linear::Linear;
