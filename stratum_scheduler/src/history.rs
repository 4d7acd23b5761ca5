// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer content-rate history.
//!
//! Records when each layer last pushed content and estimates the refresh
//! rate its updates imply. [`summarize`](LayerHistory::summarize) reports
//! the maximum rate over recently active, visible layers, plus whether any
//! of them carries HDR content. Layers are unregistered implicitly when
//! their handle is dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::clock::Nanos;

/// Samples kept per layer.
const HISTORY_SIZE: usize = 30;

/// A layer is active when it updated within this window.
const ACTIVE_WINDOW: Nanos = 1_000_000_000;

struct LayerRecord {
    name: String,
    max_refresh_rate: f32,
    visible: bool,
    is_hdr: bool,
    present_times: VecDeque<Nanos>,
}

impl LayerRecord {
    /// Estimates the layer's update rate from recent present-time deltas,
    /// capped at the registered maximum. Zero without enough samples.
    fn refresh_rate(&self, now: Nanos) -> f32 {
        let newest = match self.present_times.back() {
            Some(&t) => t,
            None => return 0.0,
        };
        if now - newest > ACTIVE_WINDOW {
            return 0.0;
        }

        let recent: Vec<Nanos> = self
            .present_times
            .iter()
            .copied()
            .filter(|&t| now - t <= ACTIVE_WINDOW)
            .collect();
        let (Some(&first), Some(&last)) = (recent.first(), recent.last()) else {
            return 0.0;
        };
        if recent.len() < 2 {
            return 0.0;
        }

        let total: Nanos = last - first;
        let deltas = recent.len() - 1;
        if total <= 0 {
            return 0.0;
        }
        #[expect(
            clippy::cast_precision_loss,
            reason = "nanosecond deltas within a one second window fit f32 precision needs"
        )]
        let rate = 1e9 / (total as f32 / deltas as f32);
        rate.min(self.max_refresh_rate)
    }
}

/// A registration handle for one layer's history.
///
/// Dropping the handle unregisters the layer.
pub struct LayerHandle {
    record: Arc<Mutex<LayerRecord>>,
}

impl core::fmt::Debug for LayerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "LayerHandle({:?})", self.record.lock().name)
    }
}

/// The result of one history summarization.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    /// Maximum refresh rate among recently active visible layers.
    pub refresh_rate: f32,
    /// Whether any recently active visible layer is HDR.
    pub is_hdr: bool,
}

/// History of scheduling-relevant activity for all registered layers.
#[derive(Default)]
pub struct LayerHistory {
    layers: Mutex<Vec<Weak<Mutex<LayerRecord>>>>,
}

impl LayerHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layer. `max_refresh_rate` caps its estimated rate.
    pub fn register_layer(&self, name: &str, max_refresh_rate: f32) -> LayerHandle {
        let record = Arc::new(Mutex::new(LayerRecord {
            name: name.to_owned(),
            max_refresh_rate,
            visible: true,
            is_hdr: false,
            present_times: VecDeque::with_capacity(HISTORY_SIZE),
        }));
        self.layers.lock().push(Arc::downgrade(&record));
        LayerHandle { record }
    }

    /// Records a content update for the layer.
    pub fn insert(&self, handle: &LayerHandle, present_time: Nanos, is_hdr: bool) {
        let mut record = handle.record.lock();
        if record.present_times.len() == HISTORY_SIZE {
            record.present_times.pop_front();
        }
        record.present_times.push_back(present_time);
        record.is_hdr = is_hdr;
    }

    /// Marks the layer visible or hidden. Hidden layers never contribute to
    /// the summary.
    pub fn set_visibility(&self, handle: &LayerHandle, visible: bool) {
        handle.record.lock().visible = visible;
    }

    /// Summarizes recently active layers, pruning dropped registrations.
    pub fn summarize(&self, now: Nanos) -> Summary {
        let mut summary = Summary::default();
        let mut layers = self.layers.lock();
        layers.retain(|weak| {
            let Some(record) = weak.upgrade() else {
                return false;
            };
            let record = record.lock();
            if record.visible {
                let rate = record.refresh_rate(now);
                if rate > summary.refresh_rate {
                    summary.refresh_rate = rate;
                }
                if rate > 0.0 && record.is_hdr {
                    summary.is_hdr = true;
                }
            }
            true
        });
        summary
    }

    /// Drops all recorded samples so rate detection starts fresh.
    pub fn clear(&self) {
        let layers = self.layers.lock();
        for weak in layers.iter() {
            if let Some(record) = weak.upgrade() {
                record.lock().present_times.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_30HZ: Nanos = 33_333_333;
    const FRAME_60HZ: Nanos = 16_666_667;

    fn fill(history: &LayerHistory, handle: &LayerHandle, period: Nanos, frames: i64) -> Nanos {
        let mut t = 0;
        for _ in 0..frames {
            t += period;
            history.insert(handle, t, false);
        }
        t
    }

    #[test]
    fn empty_history_summarizes_to_zero() {
        let history = LayerHistory::new();
        assert_eq!(history.summarize(0), Summary::default());
    }

    #[test]
    fn steady_updates_estimate_their_rate() {
        let history = LayerHistory::new();
        let handle = history.register_layer("video", 90.0);
        let now = fill(&history, &handle, FRAME_30HZ, 10);

        let summary = history.summarize(now);
        assert!(
            (summary.refresh_rate - 30.0).abs() < 1.0,
            "expected ~30fps, got {}",
            summary.refresh_rate
        );
    }

    #[test]
    fn max_rate_wins_across_layers() {
        let history = LayerHistory::new();
        let slow = history.register_layer("slow", 90.0);
        let fast = history.register_layer("fast", 90.0);
        fill(&history, &slow, FRAME_30HZ, 10);
        let now = fill(&history, &fast, FRAME_60HZ, 20);

        let summary = history.summarize(now);
        assert!(
            (summary.refresh_rate - 60.0).abs() < 2.0,
            "expected ~60fps, got {}",
            summary.refresh_rate
        );
    }

    #[test]
    fn hidden_layers_do_not_contribute() {
        let history = LayerHistory::new();
        let handle = history.register_layer("hidden", 90.0);
        let now = fill(&history, &handle, FRAME_60HZ, 10);
        history.set_visibility(&handle, false);

        assert_eq!(history.summarize(now), Summary::default());
    }

    #[test]
    fn stale_layers_become_inactive() {
        let history = LayerHistory::new();
        let handle = history.register_layer("stale", 90.0);
        let last = fill(&history, &handle, FRAME_60HZ, 10);

        // Two seconds later the layer no longer counts.
        let summary = history.summarize(last + 2_000_000_000);
        assert_eq!(summary.refresh_rate, 0.0);
    }

    #[test]
    fn hdr_flag_reported_for_active_layers() {
        let history = LayerHistory::new();
        let handle = history.register_layer("hdr-video", 90.0);
        let mut t = 0;
        for _ in 0..10 {
            t += FRAME_30HZ;
            history.insert(&handle, t, true);
        }
        assert!(history.summarize(t).is_hdr);
    }

    #[test]
    fn dropped_handle_unregisters() {
        let history = LayerHistory::new();
        let handle = history.register_layer("temp", 90.0);
        let now = fill(&history, &handle, FRAME_60HZ, 10);
        drop(handle);

        assert_eq!(history.summarize(now), Summary::default());
    }

    #[test]
    fn clear_resets_detection() {
        let history = LayerHistory::new();
        let handle = history.register_layer("cleared", 90.0);
        let now = fill(&history, &handle, FRAME_60HZ, 10);

        history.clear();
        assert_eq!(history.summarize(now), Summary::default());
    }

    #[test]
    fn rate_clamped_to_registered_range() {
        let history = LayerHistory::new();
        let handle = history.register_layer("capped", 48.0);
        let now = fill(&history, &handle, FRAME_60HZ, 10);

        let summary = history.summarize(now);
        assert!((summary.refresh_rate - 48.0).abs() < f32::EPSILON);
    }
}
