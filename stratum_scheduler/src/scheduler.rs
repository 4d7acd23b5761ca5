// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The refresh-rate scheduler.
//!
//! Aggregates debounced activity signals (idle, touch, display power),
//! content-rate estimates from [`LayerHistory`], and display power state
//! into a single [`RefreshRateType`] decision, invoking a registered
//! callback whenever the decision changes. Also owns the hardware-vsync
//! resynchronization state machine: hardware vsync is turned on while the
//! software vsync model wants samples and off once it has converged.
//!
//! # Locking
//!
//! Three small locks, never held together: feature state, hardware-vsync
//! state, and the change callback slot. The callback is invoked while
//! holding only the callback lock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stratum_core::fence::Fence;
use stratum_core::hwc::HwcDisplayId;
use tracing::debug;

use crate::clock::{Clock, Nanos, NANOS_PER_MS};
use crate::config::{RefreshRateConfigs, RefreshRateType};
use crate::connection::{ConnectionHandle, ConnectionRegistry, EventThread};
use crate::history::{LayerHandle, LayerHistory};
use crate::timer::OneShotTimer;
use crate::vsync::{DisplayStats, EventControl, VsyncTracker};

/// Debounce timer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    /// The timer was recently reset by activity.
    Reset,
    /// The timer ran out without activity.
    Expired,
}

/// Touch interaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchState {
    /// No recent touch input.
    Inactive,
    /// The user is touching the screen.
    Active,
}

/// Whether content-based rate detection has data to work with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentDetectionState {
    /// No usable content rate.
    Off,
    /// A content rate estimate is available.
    On,
}

/// Whether a refresh-rate change came from a content decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigEvent {
    /// Not content related; subscribers need not be told.
    None,
    /// Content driven; subscribers should be notified.
    Changed,
}

/// Callback invoked when the scheduler wants a different refresh rate.
pub type ChangeRefreshRateCallback = Box<dyn Fn(RefreshRateType, ConfigEvent) + Send + Sync>;

/// Construction-time configuration.
///
/// Timer intervals of zero disable the corresponding timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulerConfig {
    /// Idle timer interval in milliseconds.
    pub idle_timer_ms: u64,
    /// Touch timer interval in milliseconds.
    pub touch_timer_ms: u64,
    /// Display-power timer interval in milliseconds.
    pub display_power_timer_ms: u64,
    /// The kernel manages idle rate switching; the idle timer only gates
    /// hardware vsync.
    pub support_kernel_timer: bool,
    /// Pin HDR content to the DEFAULT rate.
    pub force_hdr_content_to_default_refresh_rate: bool,
}

/// Ignore resync requests arriving closer together than this.
const RESYNC_IGNORE_DELAY: Nanos = 750 * NANOS_PER_MS;

struct FeatureState {
    content_detection: ContentDetectionState,
    idle_timer: TimerState,
    touch: TouchState,
    display_power_timer: TimerState,
    refresh_rate_type: RefreshRateType,
    content_refresh_rate: u32,
    is_hdr_content: bool,
    is_display_power_state_normal: bool,
}

impl Default for FeatureState {
    fn default() -> Self {
        Self {
            content_detection: ContentDetectionState::Off,
            idle_timer: TimerState::Reset,
            touch: TouchState::Inactive,
            display_power_timer: TimerState::Expired,
            refresh_rate_type: RefreshRateType::Default,
            content_refresh_rate: 0,
            is_hdr_content: false,
            is_display_power_state_normal: true,
        }
    }
}

#[derive(Default)]
struct HwVsyncState {
    enabled: bool,
    available: bool,
}

/// Shared scheduler state reachable from timer threads.
struct SchedulerCore {
    vsync: Arc<dyn VsyncTracker>,
    event_control: Arc<dyn EventControl>,
    configs: Arc<RefreshRateConfigs>,
    clock: Arc<dyn Clock>,
    layer_history: LayerHistory,
    registry: ConnectionRegistry,
    support_kernel_timer: bool,
    force_hdr_content_to_default: bool,
    features: Mutex<FeatureState>,
    hw_vsync: Mutex<HwVsyncState>,
    callback: Mutex<Option<ChangeRefreshRateCallback>>,
    last_resync_time: AtomicI64,
}

/// The refresh-rate scheduler.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    idle_timer: Option<OneShotTimer>,
    touch_timer: Option<OneShotTimer>,
    display_power_timer: Option<OneShotTimer>,
}

impl Scheduler {
    /// Creates a scheduler over the given vsync model, event control and
    /// refresh-rate table, starting any configured debounce timers.
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        vsync: Arc<dyn VsyncTracker>,
        event_control: Arc<dyn EventControl>,
        configs: Arc<RefreshRateConfigs>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let core = Arc::new(SchedulerCore {
            vsync,
            event_control,
            configs,
            clock,
            layer_history: LayerHistory::new(),
            registry: ConnectionRegistry::new(),
            support_kernel_timer: config.support_kernel_timer,
            force_hdr_content_to_default: config.force_hdr_content_to_default_refresh_rate,
            features: Mutex::new(FeatureState::default()),
            hw_vsync: Mutex::new(HwVsyncState::default()),
            callback: Mutex::new(None),
            // Make the first resync request pass the debounce.
            last_resync_time: AtomicI64::new(-(RESYNC_IGNORE_DELAY + 1)),
        });

        let idle_timer = (config.idle_timer_ms > 0).then(|| {
            let interval = Duration::from_millis(config.idle_timer_ms);
            if config.support_kernel_timer {
                let on_reset = Arc::clone(&core);
                let on_expired = Arc::clone(&core);
                OneShotTimer::new(
                    "IdleTimer",
                    interval,
                    move || on_reset.kernel_idle_timer_callback(TimerState::Reset),
                    move || on_expired.kernel_idle_timer_callback(TimerState::Expired),
                )
            } else {
                let on_reset = Arc::clone(&core);
                let on_expired = Arc::clone(&core);
                OneShotTimer::new(
                    "IdleTimer",
                    interval,
                    move || on_reset.idle_timer_callback(TimerState::Reset),
                    move || on_expired.idle_timer_callback(TimerState::Expired),
                )
            }
        });

        let touch_timer = (config.touch_timer_ms > 0).then(|| {
            let on_reset = Arc::clone(&core);
            let on_expired = Arc::clone(&core);
            OneShotTimer::new(
                "TouchTimer",
                Duration::from_millis(config.touch_timer_ms),
                move || on_reset.touch_timer_callback(TimerState::Reset),
                move || on_expired.touch_timer_callback(TimerState::Expired),
            )
        });

        let display_power_timer = (config.display_power_timer_ms > 0).then(|| {
            let on_reset = Arc::clone(&core);
            let on_expired = Arc::clone(&core);
            OneShotTimer::new(
                "DisplayPowerTimer",
                Duration::from_millis(config.display_power_timer_ms),
                move || on_reset.display_power_timer_callback(TimerState::Reset),
                move || on_expired.display_power_timer_callback(TimerState::Expired),
            )
        });

        Self {
            core,
            idle_timer,
            touch_timer,
            display_power_timer,
        }
    }

    // -- Connections -------------------------------------------------------

    /// Registers a vsync-event subscriber.
    pub fn create_connection(&self, thread: Arc<dyn EventThread>) -> ConnectionHandle {
        self.core.registry.create_connection(thread)
    }

    /// Forwards a hotplug event to a connection.
    pub fn on_hotplug_received(
        &self,
        handle: ConnectionHandle,
        display: HwcDisplayId,
        connected: bool,
    ) {
        self.core.registry.on_hotplug_received(handle, display, connected);
    }

    /// Forwards a screen-acquired event to a connection.
    pub fn on_screen_acquired(&self, handle: ConnectionHandle) {
        self.core.registry.on_screen_acquired(handle);
    }

    /// Forwards a screen-released event to a connection.
    pub fn on_screen_released(&self, handle: ConnectionHandle) {
        self.core.registry.on_screen_released(handle);
    }

    /// Forwards a config change to a connection.
    pub fn on_config_changed(
        &self,
        handle: ConnectionHandle,
        display: HwcDisplayId,
        config_id: usize,
    ) {
        self.core.registry.on_config_changed(handle, display, config_id);
    }

    /// Adjusts a connection's vsync phase offset.
    pub fn set_phase_offset(&self, handle: ConnectionHandle, phase_offset: Nanos) {
        self.core.registry.set_phase_offset(handle, phase_offset);
    }

    /// Dumps a connection's state, or `None` for unknown handles.
    #[must_use]
    pub fn dump_connection(&self, handle: ConnectionHandle) -> Option<String> {
        self.core.registry.dump(handle)
    }

    // -- Vsync -------------------------------------------------------------

    /// Returns current vsync timing for frame pacing.
    #[must_use]
    pub fn get_display_stats(&self) -> DisplayStats {
        DisplayStats {
            vsync_time: self.core.vsync.compute_next_refresh(0),
            vsync_period: self.core.vsync.period(),
        }
    }

    /// Turns hardware vsync on if it is available and off.
    pub fn enable_hardware_vsync(&self) {
        self.core.enable_hardware_vsync();
    }

    /// Turns hardware vsync off; optionally marks it unavailable.
    pub fn disable_hardware_vsync(&self, make_unavailable: bool) {
        self.core.disable_hardware_vsync(make_unavailable);
    }

    /// Starts resynchronizing the vsync model to the hardware.
    pub fn resync_to_hardware_vsync(&self, make_available: bool, period: Nanos) {
        self.core.resync_to_hardware_vsync(make_available, period);
    }

    /// Requests a resync, debounced to at most one per 750 ms.
    pub fn resync(&self) {
        self.core.resync();
    }

    /// Feeds a hardware vsync timestamp to the model.
    ///
    /// Returns whether a pending period change was applied.
    pub fn add_resync_sample(&self, timestamp: Nanos) -> bool {
        self.core.add_resync_sample(timestamp)
    }

    /// Feeds a present fence to the model.
    pub fn add_present_fence(&self, fence: Fence) {
        if self.core.vsync.add_present_fence(fence) {
            self.core.enable_hardware_vsync();
        } else {
            self.core.disable_hardware_vsync(false);
        }
    }

    /// Ignores (or stops ignoring) present fences.
    pub fn set_ignore_present_fences(&self, ignore: bool) {
        self.core.vsync.set_ignore_present_fences(ignore);
    }

    /// Returns the expected present time of the next frame.
    #[must_use]
    pub fn expected_present_time(&self) -> Nanos {
        self.core.vsync.expected_present_time()
    }

    // -- Layer history -----------------------------------------------------

    /// Registers a layer for content-rate detection.
    ///
    /// The layer's estimated rate is capped at the fastest rate the display
    /// can reach.
    #[expect(clippy::cast_precision_loss, reason = "display rates are small integers")]
    pub fn register_layer(&self, name: &str) -> LayerHandle {
        let max_refresh_rate = if self.core.configs.refresh_rate_switching_supported() {
            self.core
                .configs
                .rate_for_type(RefreshRateType::Performance)
                .fps as f32
        } else {
            self.core.configs.current().1.fps as f32
        };
        self.core.layer_history.register_layer(name, max_refresh_rate)
    }

    /// Records a content update for a layer.
    pub fn record_layer_present_time(
        &self,
        handle: &LayerHandle,
        present_time: Nanos,
        is_hdr: bool,
    ) {
        self.core.layer_history.insert(handle, present_time, is_hdr);
    }

    /// Updates a layer's visibility for rate detection.
    pub fn set_layer_visibility(&self, handle: &LayerHandle, visible: bool) {
        self.core.layer_history.set_visibility(handle, visible);
    }

    /// Re-evaluates the content-derived refresh rate and fires the change
    /// callback when the decision moves.
    pub fn update_fps_based_on_content(&self) {
        self.core.update_fps_based_on_content();
    }

    // -- Feature events ----------------------------------------------------

    /// Installs the refresh-rate change callback.
    pub fn set_change_refresh_rate_callback(&self, callback: ChangeRefreshRateCallback) {
        *self.core.callback.lock() = Some(callback);
    }

    /// Re-arms the idle timer (there was activity).
    pub fn reset_idle_timer(&self) {
        if let Some(timer) = &self.idle_timer {
            timer.reset();
        }
    }

    /// Notes a touch event, boosting to performance and restarting content
    /// detection.
    pub fn notify_touch_event(&self) {
        if let Some(timer) = &self.touch_timer {
            timer.reset();
        }
        if self.core.support_kernel_timer {
            if let Some(timer) = &self.idle_timer {
                timer.reset();
            }
        }
        // Start rate detection over so stale content estimates don't fight
        // the boost.
        self.core.layer_history.clear();
    }

    /// Notes a display power state change.
    pub fn set_display_power_state(&self, normal: bool) {
        {
            let mut features = self.core.features.lock();
            features.is_display_power_state_normal = normal;
        }
        if let Some(timer) = &self.display_power_timer {
            timer.reset();
        }
        self.core.layer_history.clear();
    }

    /// Returns the currently preferred refresh-rate type.
    #[must_use]
    pub fn get_preferred_refresh_rate_type(&self) -> RefreshRateType {
        self.core.features.lock().refresh_rate_type
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Stop the timer threads before the core state they reference.
        self.display_power_timer = None;
        self.touch_timer = None;
        self.idle_timer = None;
    }
}

impl SchedulerCore {
    fn enable_hardware_vsync(&self) {
        let mut hw_vsync = self.hw_vsync.lock();
        if !hw_vsync.enabled && hw_vsync.available {
            self.vsync.begin_resync();
            self.event_control.set_vsync_enabled(true);
            hw_vsync.enabled = true;
        }
    }

    fn disable_hardware_vsync(&self, make_unavailable: bool) {
        let mut hw_vsync = self.hw_vsync.lock();
        if hw_vsync.enabled {
            self.event_control.set_vsync_enabled(false);
            self.vsync.end_resync();
            hw_vsync.enabled = false;
        }
        if make_unavailable {
            hw_vsync.available = false;
        }
    }

    fn resync_to_hardware_vsync(&self, make_available: bool, period: Nanos) {
        {
            let mut hw_vsync = self.hw_vsync.lock();
            if make_available {
                hw_vsync.available = true;
            } else if !hw_vsync.available {
                // Hardware vsync is not available, so abort the resync
                // attempt for now.
                return;
            }
        }

        if period <= 0 {
            return;
        }

        self.set_vsync_period(period);
    }

    fn resync(&self) {
        let now = self.clock.now_ns();
        let last = self.last_resync_time.swap(now, Ordering::AcqRel);

        if now - last > RESYNC_IGNORE_DELAY {
            let period = self.configs.current().1.vsync_period;
            self.resync_to_hardware_vsync(false, period);
        }
    }

    fn set_vsync_period(&self, period: Nanos) {
        let mut hw_vsync = self.hw_vsync.lock();
        self.vsync.set_period(period);

        if !hw_vsync.enabled {
            self.vsync.begin_resync();
            self.event_control.set_vsync_enabled(true);
            hw_vsync.enabled = true;
        }
    }

    fn add_resync_sample(&self, timestamp: Nanos) -> bool {
        let mut period_flushed = false;
        let needs_hw_vsync = {
            let hw_vsync = self.hw_vsync.lock();
            if hw_vsync.enabled {
                let sample = self.vsync.add_resync_sample(timestamp);
                period_flushed = sample.period_flushed;
                sample.needs_hw_vsync
            } else {
                false
            }
        };

        if needs_hw_vsync {
            self.enable_hardware_vsync();
        } else {
            self.disable_hardware_vsync(false);
        }

        period_flushed
    }

    fn update_fps_based_on_content(&self) {
        let summary = self.layer_history.summarize(self.clock.now_ns());
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "refresh rates are small positive numbers"
        )]
        let refresh_rate_round = summary.refresh_rate.round() as u32;

        let new_refresh_rate_type;
        {
            let mut features = self.features.lock();
            if features.content_refresh_rate == refresh_rate_round
                && features.is_hdr_content == summary.is_hdr
            {
                return;
            }
            features.content_refresh_rate = refresh_rate_round;
            features.is_hdr_content = summary.is_hdr;
            features.content_detection = if refresh_rate_round > 0 {
                ContentDetectionState::On
            } else {
                ContentDetectionState::Off
            };

            new_refresh_rate_type = self.calculate_refresh_rate_type(&features);
            if features.refresh_rate_type == new_refresh_rate_type {
                return;
            }
            features.refresh_rate_type = new_refresh_rate_type;
        }
        self.change_refresh_rate(new_refresh_rate_type, ConfigEvent::Changed);
    }

    fn kernel_idle_timer_callback(&self, state: TimerState) {
        let (current_type, current_rate) = self.configs.current();
        if state == TimerState::Reset && current_type == RefreshRateType::Performance {
            // If we're not in performance mode then the kernel timer should
            // not do anything, as the refresh rate during DPU power
            // collapse will be the same.
            self.resync_to_hardware_vsync(true, current_rate.vsync_period);
        } else if state == TimerState::Expired && current_type != RefreshRateType::Performance {
            // Disable HW vsync if the timer expired, as we don't need it
            // enabled if we're not pushing frames, and if we're in
            // performance mode the model needs updating anyway.
            self.disable_hardware_vsync(false);
        }
    }

    fn idle_timer_callback(&self, state: TimerState) {
        self.handle_timer_state_changed(|features| &mut features.idle_timer, state, false);
        debug!(?state, "idle timer");
    }

    fn touch_timer_callback(&self, state: TimerState) {
        let touch = if state == TimerState::Reset {
            TouchState::Active
        } else {
            TouchState::Inactive
        };
        self.handle_timer_state_changed(|features| &mut features.touch, touch, true);
        debug!(?touch, "touch state");
    }

    fn display_power_timer_callback(&self, state: TimerState) {
        self.handle_timer_state_changed(
            |features| &mut features.display_power_timer,
            state,
            true,
        );
        debug!(?state, "display power timer");
    }

    fn handle_timer_state_changed<T: PartialEq + Copy>(
        &self,
        select: impl FnOnce(&mut FeatureState) -> &mut T,
        new_state: T,
        event_on_content_detection: bool,
    ) {
        let mut event = ConfigEvent::None;
        let new_refresh_rate_type;
        {
            let mut features = self.features.lock();
            let current_state = select(&mut features);
            if *current_state == new_state {
                return;
            }
            *current_state = new_state;

            new_refresh_rate_type = self.calculate_refresh_rate_type(&features);
            if features.refresh_rate_type == new_refresh_rate_type {
                return;
            }
            features.refresh_rate_type = new_refresh_rate_type;
            if event_on_content_detection
                && features.content_detection == ContentDetectionState::On
            {
                event = ConfigEvent::Changed;
            }
        }
        self.change_refresh_rate(new_refresh_rate_type, event);
    }

    /// The ordered refresh-rate decision; the first matching rule wins.
    fn calculate_refresh_rate_type(&self, features: &FeatureState) -> RefreshRateType {
        if !self.configs.refresh_rate_switching_supported() {
            return RefreshRateType::Default;
        }

        // HDR content is not supported on the performance rate.
        if self.force_hdr_content_to_default && features.is_hdr_content {
            return RefreshRateType::Default;
        }

        // Outside normal display power operation we want performance. When
        // coming back to normal, the display-power timer extends the boost
        // as a grace period.
        if !features.is_display_power_state_normal
            || features.display_power_timer == TimerState::Reset
        {
            return RefreshRateType::Performance;
        }

        // As long as touch is active we want performance.
        if features.touch == TouchState::Active {
            return RefreshRateType::Performance;
        }

        // An expired idle timer means nothing new is on screen.
        if features.idle_timer == TimerState::Expired {
            return RefreshRateType::Default;
        }

        // Without a content rate we don't know any better than performance.
        if features.content_detection == ContentDetectionState::Off {
            return RefreshRateType::Performance;
        }

        // Pick the rate closest to the content rate, preferring one it
        // divides evenly into: 45fps content plays cleanly at 90Hz.
        #[expect(clippy::cast_precision_loss, reason = "display rates are small integers")]
        let rate = features.content_refresh_rate as f32;
        let map = self.configs.refresh_rate_map();
        let Some(best_index) = (0..map.len()).min_by(|&a, &b| {
            #[expect(clippy::cast_precision_loss, reason = "display rates are small integers")]
            let da = (map[a].1.fps as f32 - rate).abs();
            #[expect(clippy::cast_precision_loss, reason = "display rates are small integers")]
            let db = (map[b].1.fps as f32 - rate).abs();
            da.total_cmp(&db)
        }) else {
            return RefreshRateType::Default;
        };
        let mut current_type = map[best_index].0;

        const MARGIN: f32 = 0.05;
        #[expect(clippy::cast_precision_loss, reason = "display rates are small integers")]
        let ratio = map[best_index].1.fps as f32 / rate;
        if (ratio.round() - ratio).abs() > MARGIN {
            for (candidate_type, candidate) in &map[best_index..] {
                #[expect(clippy::cast_precision_loss, reason = "display rates are small integers")]
                let ratio = candidate.fps as f32 / rate;
                if (ratio.round() - ratio).abs() <= MARGIN {
                    current_type = *candidate_type;
                    break;
                }
            }
        }

        current_type
    }

    fn change_refresh_rate(&self, refresh_rate_type: RefreshRateType, event: ConfigEvent) {
        let callback = self.callback.lock();
        if let Some(callback) = callback.as_ref() {
            callback(refresh_rate_type, event);
        }
    }
}
