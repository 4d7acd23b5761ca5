// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Refresh-rate scheduling and vsync orchestration for a display server.
//!
//! `stratum_scheduler` decides how fast the display should run. Activity
//! signals (touch, content updates, display power) feed debounce timers and
//! a per-layer content-rate history; the scheduler aggregates them into a
//! DEFAULT-or-PERFORMANCE decision and notifies a registered callback when
//! it changes. It also manages hardware-vsync resynchronization: hardware
//! vsync is enabled while the software vsync model wants samples and
//! disabled once it has converged.
//!
//! # Data flow
//!
//! ```text
//!   touch / power / frame activity
//!        │ (reset)
//!        ▼
//!   OneShotTimer ──► feature state ──► calculate type ──► callback
//!        ▲                 ▲
//!        │                 │
//!   LayerHistory ── content rate estimate
//!
//!   vsync samples / present fences ──► VsyncTracker ──► EventControl
//! ```
//!
//! **[`scheduler`]** — The [`Scheduler`](scheduler::Scheduler) itself.
//!
//! **[`timer`]** — Debounce timers with reset/expired callbacks.
//!
//! **[`history`]** — Per-layer content-rate estimation.
//!
//! **[`config`]** — The refresh-rate table built from display configs.
//!
//! **[`connection`]** — Opaque handles for vsync-event subscribers.
//!
//! **[`vsync`]** — Contracts for the software vsync model and the
//! hardware vsync switch.
//!
//! **[`clock`]** — Injectable monotonic time.

pub mod clock;
pub mod config;
pub mod connection;
pub mod history;
pub mod scheduler;
pub mod timer;
pub mod vsync;
