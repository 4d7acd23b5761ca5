// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-output composition core for a display server.
//!
//! `stratum_core` turns the current set of application layers into one
//! presented frame per output, once per vsync. For every layer it decides
//! whether the display hardware can scan it out directly or whether the
//! compositor must blend it on the GPU, computes exactly which pixels need
//! redrawing, orchestrates buffer acquisition and present, and routes
//! release fences back to the producers.
//!
//! # Architecture
//!
//! A frame flows through the engine like this:
//!
//! ```text
//!   RefreshArgs (layers, color policy)
//!       │
//!       ▼
//!   Output::prepare ──► visibility & coverage ──► OutputLayers + dirty
//!       │
//!       ▼
//!   latch front-end state (once per layer per frame)
//!       │
//!       ▼
//!   Output::present
//!     ├─ color profile, per-layer HWC state, color transform
//!     ├─ beginFrame (recompose or skip) ── prepareFrame (HWC strategy)
//!     ├─ composeSurfaces (GPU client composition, when needed)
//!     └─ postFramebuffer (flip, collect fences, distribute releases)
//! ```
//!
//! **[`region`]** — Closed-open integer rectangles and normalized banded
//! regions; the coverage primitive used everywhere.
//!
//! **[`transform`]** / **[`matrix`]** — Axis-aligned orientations with
//! translation, and the 4×4 matrices handed to the render backend.
//!
//! **[`layer`]** — Input layers: the latched front-end state and the
//! [`LayerFe`](layer::LayerFe) contract.
//!
//! **[`output`]** / **[`output_layer`]** — The per-output pipeline and the
//! per-(output, layer) derived state.
//!
//! **[`engine`]** — The [`CompositionEngine`](engine::CompositionEngine)
//! façade owning the shared backends.
//!
//! **[`hwc`]**, **[`render`]**, **[`color`]**, **[`fence`]** — The narrow
//! contracts to the hardware composer, render backend/surface, display
//! color profile, and the fence handles routed between them.
//!
//! # Threading
//!
//! A single composition thread drives all outputs serially. Nothing here
//! spawns threads; the only internal lock is around latched front-end
//! state, which layers shared across outputs require.

pub mod color;
pub mod engine;
pub mod fence;
pub mod hwc;
pub mod layer;
pub mod matrix;
pub mod output;
pub mod output_layer;
pub mod region;
pub mod render;
pub mod transform;
