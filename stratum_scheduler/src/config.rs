// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Refresh-rate configuration tables.
//!
//! A display exposes a set of configs, each with a vsync period. When
//! refresh-rate switching is supported, the two slowest configs become the
//! DEFAULT and PERFORMANCE rates; everything else is reachable only by
//! config id. The table is built once and never changes at runtime, apart
//! from the current-config index.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::error;

use crate::clock::Nanos;

/// Coarse refresh-rate selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefreshRateType {
    /// The baseline rate (the slowest config).
    #[default]
    Default,
    /// The boosted rate.
    Performance,
}

/// One display config's refresh rate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshRate {
    /// Position of the config in the device's config list.
    pub config_id: usize,
    /// Human readable name.
    pub name: String,
    /// Frames per second, rounded to the nearest integer.
    pub fps: u32,
    /// Vsync period in nanoseconds.
    pub vsync_period: Nanos,
    /// The device's id for this config.
    pub hwc_id: u32,
}

/// Raw per-config input used to build a [`RefreshRateConfigs`].
#[derive(Clone, Copy, Debug, Default)]
pub struct InputConfig {
    /// The device's id for this config.
    pub hwc_id: u32,
    /// Vsync period in nanoseconds.
    pub vsync_period: Nanos,
}

/// The refresh rates available on a display.
#[derive(Debug)]
pub struct RefreshRateConfigs {
    switching_supported: bool,
    rates: Vec<RefreshRate>,
    /// Type → rate mapping, ordered DEFAULT then PERFORMANCE.
    map: Vec<(RefreshRateType, RefreshRate)>,
    current_config: AtomicUsize,
}

impl RefreshRateConfigs {
    /// Builds the table from raw configs.
    ///
    /// Switching requires at least two configs with non-zero vsync periods;
    /// otherwise it is disabled regardless of `switching_supported`. The
    /// slowest config becomes DEFAULT and the second slowest PERFORMANCE.
    #[must_use]
    pub fn new(
        switching_supported: bool,
        configs: &[InputConfig],
        current_config: usize,
    ) -> Self {
        let rates: Vec<RefreshRate> = configs
            .iter()
            .enumerate()
            .map(|(config_id, config)| {
                let fps = if config.vsync_period > 0 {
                    #[expect(
                        clippy::cast_possible_truncation,
                        clippy::cast_sign_loss,
                        clippy::cast_precision_loss,
                        reason = "display refresh rates are far below integer precision limits"
                    )]
                    let fps = (1e9 / config.vsync_period as f64).round() as u32;
                    fps
                } else {
                    0
                };
                RefreshRate {
                    config_id,
                    name: format!("{fps}fps"),
                    fps,
                    vsync_period: config.vsync_period,
                    hwc_id: config.hwc_id,
                }
            })
            .collect();

        let map = if switching_supported {
            Self::find_default_and_performance(&rates)
        } else {
            Vec::new()
        };

        Self {
            switching_supported: !map.is_empty(),
            rates,
            map,
            current_config: AtomicUsize::new(current_config),
        }
    }

    fn find_default_and_performance(
        rates: &[RefreshRate],
    ) -> Vec<(RefreshRateType, RefreshRate)> {
        if rates.len() < 2 {
            return Vec::new();
        }

        let mut sorted: Vec<&RefreshRate> = rates.iter().collect();
        // Longest vsync period first: the slowest config is DEFAULT.
        sorted.sort_by(|a, b| b.vsync_period.cmp(&a.vsync_period));

        if sorted[0].vsync_period == 0 || sorted[1].vsync_period == 0 {
            return Vec::new();
        }

        vec![
            (RefreshRateType::Default, sorted[0].clone()),
            (RefreshRateType::Performance, sorted[1].clone()),
        ]
    }

    /// Returns whether this display switches refresh rates at all.
    #[must_use]
    pub fn refresh_rate_switching_supported(&self) -> bool {
        self.switching_supported
    }

    /// Returns the type → rate map, ordered DEFAULT then PERFORMANCE.
    ///
    /// Empty when switching is unsupported.
    #[must_use]
    pub fn refresh_rate_map(&self) -> &[(RefreshRateType, RefreshRate)] {
        &self.map
    }

    /// Returns the rate for a type, or the current rate when switching is
    /// unsupported.
    #[must_use]
    pub fn rate_for_type(&self, refresh_rate_type: RefreshRateType) -> RefreshRate {
        if !self.switching_supported {
            return self.current().1;
        }
        self.map
            .iter()
            .find(|(t, _)| *t == refresh_rate_type)
            .map(|(_, rate)| rate.clone())
            .unwrap_or_else(|| self.current().1)
    }

    /// Returns the current `(type, rate)` pair.
    ///
    /// A table built from no configs reports a zero rate.
    #[must_use]
    pub fn current(&self) -> (RefreshRateType, RefreshRate) {
        let Some(last_index) = self.rates.len().checked_sub(1) else {
            return (RefreshRateType::Default, RefreshRate::default());
        };
        let current = self.current_config.load(Ordering::Acquire).min(last_index);
        if self.switching_supported {
            for (refresh_rate_type, rate) in &self.map {
                if rate.config_id == current {
                    return (*refresh_rate_type, rate.clone());
                }
            }
        }
        (RefreshRateType::Default, self.rates[current].clone())
    }

    /// Returns the rate for a raw config id, if it exists.
    #[must_use]
    pub fn rate_for_config_id(&self, config_id: usize) -> Option<&RefreshRate> {
        self.rates.get(config_id)
    }

    /// Returns the type for a device config id, DEFAULT when unknown.
    #[must_use]
    pub fn type_for_hwc_id(&self, hwc_id: u32) -> RefreshRateType {
        if !self.switching_supported {
            return RefreshRateType::Default;
        }
        self.map
            .iter()
            .find(|(_, rate)| rate.hwc_id == hwc_id)
            .map_or(RefreshRateType::Default, |(t, _)| *t)
    }

    /// Makes `config_id` the current config. Out-of-range ids are ignored
    /// with an error log.
    pub fn set_current_config(&self, config_id: usize) {
        if config_id >= self.rates.len() {
            error!(config_id, configs = self.rates.len(), "invalid config id");
            return;
        }
        self.current_config.store(config_id, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD_60: Nanos = 16_666_667;
    const PERIOD_90: Nanos = 11_111_111;

    fn configs_60_90(switching: bool) -> RefreshRateConfigs {
        RefreshRateConfigs::new(
            switching,
            &[
                InputConfig {
                    hwc_id: 0,
                    vsync_period: PERIOD_60,
                },
                InputConfig {
                    hwc_id: 1,
                    vsync_period: PERIOD_90,
                },
            ],
            0,
        )
    }

    #[test]
    fn builds_default_and_performance_from_periods() {
        let configs = configs_60_90(true);
        assert!(configs.refresh_rate_switching_supported());

        let default = configs.rate_for_type(RefreshRateType::Default);
        assert_eq!(default.fps, 60);
        assert_eq!(default.vsync_period, PERIOD_60);

        let performance = configs.rate_for_type(RefreshRateType::Performance);
        assert_eq!(performance.fps, 90);
        assert_eq!(performance.hwc_id, 1);
    }

    #[test]
    fn map_is_ordered_default_then_performance() {
        let configs = configs_60_90(true);
        let map = configs.refresh_rate_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].0, RefreshRateType::Default);
        assert_eq!(map[1].0, RefreshRateType::Performance);
    }

    #[test]
    fn single_config_disables_switching() {
        let configs = RefreshRateConfigs::new(
            true,
            &[InputConfig {
                hwc_id: 0,
                vsync_period: PERIOD_60,
            }],
            0,
        );
        assert!(!configs.refresh_rate_switching_supported());
        assert!(configs.refresh_rate_map().is_empty());
        // rate_for_type falls back to the current rate.
        assert_eq!(configs.rate_for_type(RefreshRateType::Performance).fps, 60);
    }

    #[test]
    fn zero_period_disables_switching() {
        let configs = RefreshRateConfigs::new(
            true,
            &[
                InputConfig {
                    hwc_id: 0,
                    vsync_period: 0,
                },
                InputConfig {
                    hwc_id: 1,
                    vsync_period: PERIOD_90,
                },
            ],
            1,
        );
        assert!(!configs.refresh_rate_switching_supported());
    }

    #[test]
    fn current_config_tracks_updates() {
        let configs = configs_60_90(true);
        assert_eq!(configs.current().0, RefreshRateType::Default);

        configs.set_current_config(1);
        let (refresh_rate_type, rate) = configs.current();
        assert_eq!(refresh_rate_type, RefreshRateType::Performance);
        assert_eq!(rate.fps, 90);

        // Invalid ids are ignored.
        configs.set_current_config(7);
        assert_eq!(configs.current().1.fps, 90);
    }

    #[test]
    fn type_for_hwc_id_lookup() {
        let configs = configs_60_90(true);
        assert_eq!(configs.type_for_hwc_id(1), RefreshRateType::Performance);
        assert_eq!(configs.type_for_hwc_id(0), RefreshRateType::Default);
        assert_eq!(configs.type_for_hwc_id(99), RefreshRateType::Default);
    }
}
