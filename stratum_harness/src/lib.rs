// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reusable fakes for exercising the composition and scheduling crates.
//!
//! Every fake records the calls it receives behind an `Arc`, so a test can
//! keep a clone for inspection after moving the fake into the code under
//! test. Behavior knobs (dequeue failures, scripted HWC change responses,
//! vsync model answers, manual time) are all settable through the same
//! shared handle.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

use stratum_core::color::{
    ColorMode, Dataspace, DisplayColorProfile, HdrCapabilities, RenderIntent,
};
use stratum_core::engine::PowerAdvisor;
use stratum_core::fence::Fence;
use stratum_core::hwc::{
    DeviceRequestedChanges, DisplayCapability, HwComposer, HwcDisplayId, HwcError,
    HwcLayerConfig, HwcLayerId,
};
use stratum_core::layer::{
    ClientCompositionTargetSettings, LayerFe, LayerFeState, StateSubset,
};
use stratum_core::region::Size;
use stratum_core::render::{
    Buffer, DisplaySettings, LayerSettings, RenderEngine, RenderError, RenderSurface,
};
use stratum_scheduler::clock::{Clock, Nanos};
use stratum_scheduler::vsync::{EventControl, ResyncSample, VsyncTracker};

// ---------------------------------------------------------------------------
// Layer front-end
// ---------------------------------------------------------------------------

/// A scriptable layer front-end.
///
/// Holds the state that [`latch_composition_state`](LayerFe) serves, and
/// records every release fence delivered through
/// [`on_layer_displayed`](LayerFe).
pub struct FakeLayerFe {
    name: String,
    state: Mutex<LayerFeState>,
    latches: Mutex<Vec<StateSubset>>,
    displayed_fences: Mutex<Vec<Fence>>,
    /// The draw request returned from `prepare_client_composition`, or
    /// `None` to decline.
    prepared: Mutex<Option<LayerSettings>>,
}

impl FakeLayerFe {
    /// Creates a front-end serving the given state.
    #[must_use]
    pub fn new(name: &str, state: LayerFeState) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            state: Mutex::new(state),
            latches: Mutex::new(Vec::new()),
            displayed_fences: Mutex::new(Vec::new()),
            prepared: Mutex::new(Some(LayerSettings {
                alpha: 1.0,
                ..LayerSettings::default()
            })),
        })
    }

    /// Replaces the state served to future latches.
    pub fn set_state(&self, state: LayerFeState) {
        *self.state.lock() = state;
    }

    /// Mutates the state served to future latches.
    pub fn update_state(&self, update: impl FnOnce(&mut LayerFeState)) {
        update(&mut self.state.lock());
    }

    /// Sets the response to `prepare_client_composition`.
    pub fn set_prepared(&self, settings: Option<LayerSettings>) {
        *self.prepared.lock() = settings;
    }

    /// Returns every subset latched so far.
    #[must_use]
    pub fn latches(&self) -> Vec<StateSubset> {
        self.latches.lock().clone()
    }

    /// Returns every release fence received so far.
    #[must_use]
    pub fn displayed_fences(&self) -> Vec<Fence> {
        self.displayed_fences.lock().clone()
    }
}

impl LayerFe for FakeLayerFe {
    fn name(&self) -> &str {
        &self.name
    }

    fn latch_composition_state(&self, state: &mut LayerFeState, subset: StateSubset) {
        self.latches.lock().push(subset);
        *state = self.state.lock().clone();
    }

    fn prepare_client_composition(
        &self,
        _settings: ClientCompositionTargetSettings<'_>,
    ) -> Option<LayerSettings> {
        self.prepared.lock().clone()
    }

    fn on_layer_displayed(&self, release_fence: Fence) {
        self.displayed_fences.lock().push(release_fence);
    }
}

// ---------------------------------------------------------------------------
// Display color profile
// ---------------------------------------------------------------------------

/// A display color profile with settable capabilities.
///
/// `best_color_mode` maps a dataspace straight onto the matching mode and
/// echoes the intent, which is enough to observe the selection logic.
pub struct FakeDisplayColorProfile {
    /// Whether the display has a wide gamut.
    pub wide_color_gamut: bool,
    /// Reported HDR capabilities.
    pub hdr_capabilities: HdrCapabilities,
    legacy_hdr: Mutex<HashSet<Dataspace>>,
}

impl Default for FakeDisplayColorProfile {
    fn default() -> Self {
        Self {
            wide_color_gamut: true,
            hdr_capabilities: HdrCapabilities::default(),
            legacy_hdr: Mutex::new(HashSet::new()),
        }
    }
}

impl FakeDisplayColorProfile {
    /// Creates a wide-gamut profile with no legacy HDR support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a narrow-gamut profile.
    #[must_use]
    pub fn narrow() -> Self {
        Self {
            wide_color_gamut: false,
            ..Self::default()
        }
    }

    /// Marks a dataspace as having legacy HDR support.
    pub fn add_legacy_hdr_support(&self, dataspace: Dataspace) {
        self.legacy_hdr.lock().insert(dataspace);
    }
}

impl DisplayColorProfile for FakeDisplayColorProfile {
    fn has_wide_color_gamut(&self) -> bool {
        self.wide_color_gamut
    }

    fn hdr_capabilities(&self) -> HdrCapabilities {
        self.hdr_capabilities
    }

    fn has_legacy_hdr_support(&self, dataspace: Dataspace) -> bool {
        self.legacy_hdr.lock().contains(&dataspace)
    }

    fn best_color_mode(
        &self,
        dataspace: Dataspace,
        intent: RenderIntent,
    ) -> (Dataspace, ColorMode, RenderIntent) {
        let mode = match dataspace {
            Dataspace::Unknown => ColorMode::Native,
            Dataspace::DisplayP3 => ColorMode::DisplayP3,
            Dataspace::DisplayBt2020
            | Dataspace::Bt2020
            | Dataspace::Bt2020Itu
            | Dataspace::Bt2020Pq
            | Dataspace::Bt2020ItuPq
            | Dataspace::Bt2020Hlg
            | Dataspace::Bt2020ItuHlg => ColorMode::DisplayBt2020,
            _ => ColorMode::Srgb,
        };
        (dataspace, mode, intent)
    }

    fn target_dataspace(
        &self,
        _mode: ColorMode,
        dataspace: Dataspace,
        color_space_agnostic_dataspace: Dataspace,
    ) -> Dataspace {
        if color_space_agnostic_dataspace != Dataspace::Unknown {
            color_space_agnostic_dataspace
        } else {
            dataspace
        }
    }
}

// ---------------------------------------------------------------------------
// Render surface
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SurfaceState {
    size: Size,
    dataspace: Dataspace,
    begin_frames: Vec<bool>,
    prepare_frames: Vec<(bool, bool)>,
    queued_fences: Vec<Fence>,
    flips: u32,
    presents_completed: u32,
    dequeue_fails: bool,
    dequeued: Vec<Buffer>,
    client_target_acquire_fence: Fence,
    protected: bool,
    next_buffer_id: u64,
}

/// A render surface that records everything and vends buffers on demand.
#[derive(Clone)]
pub struct FakeRenderSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl FakeRenderSurface {
    /// Creates a surface of the given size.
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                size,
                dataspace: Dataspace::Unknown,
                begin_frames: Vec::new(),
                prepare_frames: Vec::new(),
                queued_fences: Vec::new(),
                flips: 0,
                presents_completed: 0,
                dequeue_fails: false,
                dequeued: Vec::new(),
                client_target_acquire_fence: Fence::new("client-target-acquire"),
                protected: false,
                next_buffer_id: 1,
            })),
        }
    }

    /// Makes future dequeues fail (or succeed again).
    pub fn set_dequeue_fails(&self, fails: bool) {
        self.state.lock().dequeue_fails = fails;
    }

    /// Replaces the client target acquire fence.
    pub fn set_client_target_acquire_fence(&self, fence: Fence) {
        self.state.lock().client_target_acquire_fence = fence;
    }

    /// Returns the `must_recompose` flags seen by `begin_frame`.
    #[must_use]
    pub fn begin_frames(&self) -> Vec<bool> {
        self.state.lock().begin_frames.clone()
    }

    /// Returns the `(client, device)` pairs seen by `prepare_frame`.
    #[must_use]
    pub fn prepare_frames(&self) -> Vec<(bool, bool)> {
        self.state.lock().prepare_frames.clone()
    }

    /// Returns the fences passed to `queue_buffer`.
    #[must_use]
    pub fn queued_fences(&self) -> Vec<Fence> {
        self.state.lock().queued_fences.clone()
    }

    /// Returns how many times the surface flipped.
    #[must_use]
    pub fn flips(&self) -> u32 {
        self.state.lock().flips
    }

    /// Returns how many presents completed.
    #[must_use]
    pub fn presents_completed(&self) -> u32 {
        self.state.lock().presents_completed
    }

    /// Returns the buffers handed out by `dequeue_buffer`.
    #[must_use]
    pub fn dequeued(&self) -> Vec<Buffer> {
        self.state.lock().dequeued.clone()
    }

    /// Returns the dataspace last set on the buffers.
    #[must_use]
    pub fn dataspace(&self) -> Dataspace {
        self.state.lock().dataspace
    }

    /// Returns whether the surface currently uses protected buffers.
    #[must_use]
    pub fn protected(&self) -> bool {
        self.state.lock().protected
    }
}

impl RenderSurface for FakeRenderSurface {
    fn set_display_size(&mut self, size: Size) {
        self.state.lock().size = size;
    }

    fn size(&self) -> Size {
        self.state.lock().size
    }

    fn set_buffer_dataspace(&mut self, dataspace: Dataspace) {
        self.state.lock().dataspace = dataspace;
    }

    fn begin_frame(&mut self, must_recompose: bool) {
        self.state.lock().begin_frames.push(must_recompose);
    }

    fn prepare_frame(&mut self, uses_client: bool, uses_device: bool) {
        self.state
            .lock()
            .prepare_frames
            .push((uses_client, uses_device));
    }

    fn dequeue_buffer(&mut self) -> Option<(Buffer, Fence)> {
        let mut state = self.state.lock();
        if state.dequeue_fails {
            return None;
        }
        let buffer = Buffer::new(state.next_buffer_id, state.size);
        state.next_buffer_id += 1;
        state.dequeued.push(buffer.clone());
        Some((buffer, Fence::new("buffer-acquire")))
    }

    fn queue_buffer(&mut self, ready_fence: Fence) {
        self.state.lock().queued_fences.push(ready_fence);
    }

    fn flip(&mut self) {
        self.state.lock().flips += 1;
    }

    fn on_present_completed(&mut self) {
        self.state.lock().presents_completed += 1;
    }

    fn client_target_acquire_fence(&self) -> Fence {
        self.state.lock().client_target_acquire_fence.clone()
    }

    fn set_protected(&mut self, protected: bool) {
        self.state.lock().protected = protected;
    }

    fn is_protected(&self) -> bool {
        self.state.lock().protected
    }
}

// ---------------------------------------------------------------------------
// Render engine
// ---------------------------------------------------------------------------

/// One recorded `draw_layers` invocation.
#[derive(Clone, Debug)]
pub struct DrawCall {
    /// The display settings of the draw.
    pub display: DisplaySettings,
    /// The submitted layer list.
    pub layers: Vec<LayerSettings>,
    /// The target buffer.
    pub buffer: Buffer,
    /// The ready-fence returned to the caller.
    pub ready_fence: Fence,
}

struct EngineState {
    supports_protected: bool,
    protected: bool,
    draws: Vec<DrawCall>,
    fail_draws: bool,
}

/// A render engine that records draw calls and returns fresh fences.
#[derive(Clone)]
pub struct FakeRenderEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeRenderEngine {
    /// Creates an engine without protected-content support.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                supports_protected: false,
                protected: false,
                draws: Vec::new(),
                fail_draws: false,
            })),
        }
    }

    /// Creates an engine with protected-content support.
    #[must_use]
    pub fn with_protected_support() -> Self {
        let engine = Self::new();
        engine.state.lock().supports_protected = true;
        engine
    }

    /// Makes future draws fail.
    pub fn set_fail_draws(&self, fail: bool) {
        self.state.lock().fail_draws = fail;
    }

    /// Returns the recorded draw calls.
    #[must_use]
    pub fn draws(&self) -> Vec<DrawCall> {
        self.state.lock().draws.clone()
    }

    /// Returns whether the engine is currently in a protected context.
    #[must_use]
    pub fn is_protected_now(&self) -> bool {
        self.state.lock().protected
    }
}

impl Default for FakeRenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for FakeRenderEngine {
    fn supports_protected_content(&self) -> bool {
        self.state.lock().supports_protected
    }

    fn is_protected(&self) -> bool {
        self.state.lock().protected
    }

    fn use_protected_context(&mut self, protected: bool) {
        self.state.lock().protected = protected;
    }

    fn draw_layers(
        &mut self,
        display: &DisplaySettings,
        layers: &[LayerSettings],
        buffer: &Buffer,
        _use_framebuffer_cache: bool,
        _buffer_fence: Fence,
    ) -> Result<Fence, RenderError> {
        let mut state = self.state.lock();
        if state.fail_draws {
            return Err(RenderError::SubmitFailed("scripted failure"));
        }
        let ready_fence = Fence::new("draw-ready");
        state.draws.push(DrawCall {
            display: display.clone(),
            layers: layers.to_vec(),
            buffer: buffer.clone(),
            ready_fence: ready_fence.clone(),
        });
        Ok(ready_fence)
    }
}

// ---------------------------------------------------------------------------
// Hardware composer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct HwcState {
    next_layer_id: u64,
    created_layers: Vec<HwcLayerId>,
    destroyed_layers: Vec<HwcLayerId>,
    layer_configs: Vec<(HwcLayerId, HwcLayerConfig)>,
    /// Scripted responses for composition-change queries, oldest first.
    change_responses: Vec<Result<Option<DeviceRequestedChanges>, HwcError>>,
    change_queries: Vec<bool>,
    presents: u32,
    present_fence: Fence,
    layer_release_fences: HashMap<HwcLayerId, Fence>,
    color_transforms: Vec<stratum_core::matrix::Mat4>,
    fail_color_transform: bool,
    color_modes: Vec<(ColorMode, RenderIntent)>,
    capabilities: HashSet<DisplayCapability>,
    vsync_enables: Vec<bool>,
    disconnected: Vec<HwcDisplayId>,
}

/// A hardware composer with scripted responses.
#[derive(Default)]
pub struct FakeHwc {
    state: Mutex<HwcState>,
}

impl FakeHwc {
    /// Creates a hardware composer with no scripted behavior.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a response for the next composition-changes query.
    pub fn push_change_response(
        &self,
        response: Result<Option<DeviceRequestedChanges>, HwcError>,
    ) {
        self.state.lock().change_responses.push(response);
    }

    /// Sets the present fence returned after the next present.
    pub fn set_present_fence(&self, fence: Fence) {
        self.state.lock().present_fence = fence;
    }

    /// Sets a layer's release fence.
    pub fn set_layer_release_fence(&self, layer: HwcLayerId, fence: Fence) {
        self.state.lock().layer_release_fences.insert(layer, fence);
    }

    /// Grants a display capability.
    pub fn add_capability(&self, capability: DisplayCapability) {
        self.state.lock().capabilities.insert(capability);
    }

    /// Makes color-transform calls fail.
    pub fn set_fail_color_transform(&self, fail: bool) {
        self.state.lock().fail_color_transform = fail;
    }

    /// Returns the layers created so far.
    #[must_use]
    pub fn created_layers(&self) -> Vec<HwcLayerId> {
        self.state.lock().created_layers.clone()
    }

    /// Returns the layers destroyed so far.
    #[must_use]
    pub fn destroyed_layers(&self) -> Vec<HwcLayerId> {
        self.state.lock().destroyed_layers.clone()
    }

    /// Returns the per-layer configs pushed so far.
    #[must_use]
    pub fn layer_configs(&self) -> Vec<(HwcLayerId, HwcLayerConfig)> {
        self.state.lock().layer_configs.clone()
    }

    /// Returns the `frame_uses_client_composition` flags of the change
    /// queries seen.
    #[must_use]
    pub fn change_queries(&self) -> Vec<bool> {
        self.state.lock().change_queries.clone()
    }

    /// Returns how many times a frame was presented.
    #[must_use]
    pub fn presents(&self) -> u32 {
        self.state.lock().presents
    }

    /// Returns the color transforms set so far.
    #[must_use]
    pub fn color_transforms(&self) -> Vec<stratum_core::matrix::Mat4> {
        self.state.lock().color_transforms.clone()
    }

    /// Returns the color modes set so far.
    #[must_use]
    pub fn color_modes(&self) -> Vec<(ColorMode, RenderIntent)> {
        self.state.lock().color_modes.clone()
    }

    /// Returns the vsync enable/disable calls seen.
    #[must_use]
    pub fn vsync_enables(&self) -> Vec<bool> {
        self.state.lock().vsync_enables.clone()
    }

    /// Returns the displays disconnected so far.
    #[must_use]
    pub fn disconnected(&self) -> Vec<HwcDisplayId> {
        self.state.lock().disconnected.clone()
    }
}

impl HwComposer for FakeHwc {
    fn create_layer(&self, _display: HwcDisplayId) -> Result<HwcLayerId, HwcError> {
        let mut state = self.state.lock();
        state.next_layer_id += 1;
        let id = HwcLayerId(state.next_layer_id);
        state.created_layers.push(id);
        Ok(id)
    }

    fn destroy_layer(&self, _display: HwcDisplayId, layer: HwcLayerId) -> Result<(), HwcError> {
        self.state.lock().destroyed_layers.push(layer);
        Ok(())
    }

    fn set_layer_state(
        &self,
        _display: HwcDisplayId,
        layer: HwcLayerId,
        config: &HwcLayerConfig,
    ) -> Result<(), HwcError> {
        self.state.lock().layer_configs.push((layer, config.clone()));
        Ok(())
    }

    fn get_device_composition_changes(
        &self,
        _display: HwcDisplayId,
        frame_uses_client_composition: bool,
    ) -> Result<Option<DeviceRequestedChanges>, HwcError> {
        let mut state = self.state.lock();
        state.change_queries.push(frame_uses_client_composition);
        if state.change_responses.is_empty() {
            Ok(None)
        } else {
            state.change_responses.remove(0)
        }
    }

    fn present_and_get_release_fences(&self, _display: HwcDisplayId) -> Result<(), HwcError> {
        self.state.lock().presents += 1;
        Ok(())
    }

    fn get_present_fence(&self, _display: HwcDisplayId) -> Fence {
        self.state.lock().present_fence.clone()
    }

    fn get_layer_release_fence(&self, _display: HwcDisplayId, layer: HwcLayerId) -> Fence {
        self.state
            .lock()
            .layer_release_fences
            .get(&layer)
            .cloned()
            .unwrap_or(Fence::NO_FENCE)
    }

    fn clear_release_fences(&self, _display: HwcDisplayId) {
        self.state.lock().layer_release_fences.clear();
    }

    fn set_color_transform(
        &self,
        _display: HwcDisplayId,
        matrix: &stratum_core::matrix::Mat4,
    ) -> Result<(), HwcError> {
        let mut state = self.state.lock();
        if state.fail_color_transform {
            return Err(HwcError::BadParameter("color transform rejected"));
        }
        state.color_transforms.push(*matrix);
        Ok(())
    }

    fn set_active_color_mode(
        &self,
        _display: HwcDisplayId,
        mode: ColorMode,
        intent: RenderIntent,
    ) -> Result<(), HwcError> {
        self.state.lock().color_modes.push((mode, intent));
        Ok(())
    }

    fn disconnect_display(&self, display: HwcDisplayId) {
        self.state.lock().disconnected.push(display);
    }

    fn has_display_capability(
        &self,
        _display: HwcDisplayId,
        capability: DisplayCapability,
    ) -> bool {
        self.state.lock().capabilities.contains(&capability)
    }

    fn set_vsync_enabled(&self, _display: HwcDisplayId, enabled: bool) {
        self.state.lock().vsync_enables.push(enabled);
    }
}

// ---------------------------------------------------------------------------
// Power advisor
// ---------------------------------------------------------------------------

/// Records expensive-rendering hints.
#[derive(Clone, Default)]
pub struct FakePowerAdvisor {
    hints: Arc<Mutex<Vec<(HwcDisplayId, bool)>>>,
}

impl FakePowerAdvisor {
    /// Creates an advisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the hints received so far.
    #[must_use]
    pub fn hints(&self) -> Vec<(HwcDisplayId, bool)> {
        self.hints.lock().clone()
    }
}

impl PowerAdvisor for FakePowerAdvisor {
    fn set_expensive_rendering_expected(&mut self, display: HwcDisplayId, expected: bool) {
        self.hints.lock().push((display, expected));
    }
}

// ---------------------------------------------------------------------------
// Scheduler fakes
// ---------------------------------------------------------------------------

/// A manually advanced clock.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the current time.
    pub fn set_now(&self, now: Nanos) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advances the current time.
    pub fn advance(&self, delta: Nanos) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> Nanos {
        self.now.load(Ordering::SeqCst)
    }
}

/// A vsync model with scripted answers and call counters.
pub struct FakeVsyncTracker {
    period: AtomicI64,
    needs_hw_vsync: AtomicBool,
    period_flushed: AtomicBool,
    begin_resyncs: AtomicU64,
    end_resyncs: AtomicU64,
    resync_samples: Mutex<Vec<Nanos>>,
    present_fences: Mutex<Vec<Fence>>,
    set_periods: Mutex<Vec<Nanos>>,
    ignore_present_fences: AtomicBool,
}

impl FakeVsyncTracker {
    /// Creates a model with the given initial period.
    #[must_use]
    pub fn new(period: Nanos) -> Arc<Self> {
        Arc::new(Self {
            period: AtomicI64::new(period),
            needs_hw_vsync: AtomicBool::new(true),
            period_flushed: AtomicBool::new(false),
            begin_resyncs: AtomicU64::new(0),
            end_resyncs: AtomicU64::new(0),
            resync_samples: Mutex::new(Vec::new()),
            present_fences: Mutex::new(Vec::new()),
            set_periods: Mutex::new(Vec::new()),
            ignore_present_fences: AtomicBool::new(false),
        })
    }

    /// Scripts whether the model keeps asking for hardware vsync.
    pub fn set_needs_hw_vsync(&self, needs: bool) {
        self.needs_hw_vsync.store(needs, Ordering::SeqCst);
    }

    /// Scripts whether the next sample reports a flushed period.
    pub fn set_period_flushed(&self, flushed: bool) {
        self.period_flushed.store(flushed, Ordering::SeqCst);
    }

    /// Returns how many times a resync began.
    #[must_use]
    pub fn begin_resyncs(&self) -> u64 {
        self.begin_resyncs.load(Ordering::SeqCst)
    }

    /// Returns how many times a resync ended.
    #[must_use]
    pub fn end_resyncs(&self) -> u64 {
        self.end_resyncs.load(Ordering::SeqCst)
    }

    /// Returns the timestamps fed to the model.
    #[must_use]
    pub fn resync_samples(&self) -> Vec<Nanos> {
        self.resync_samples.lock().clone()
    }

    /// Returns the periods set on the model.
    #[must_use]
    pub fn set_periods(&self) -> Vec<Nanos> {
        self.set_periods.lock().clone()
    }

    /// Returns the present fences fed to the model.
    #[must_use]
    pub fn present_fences(&self) -> Vec<Fence> {
        self.present_fences.lock().clone()
    }
}

impl VsyncTracker for FakeVsyncTracker {
    fn begin_resync(&self) {
        self.begin_resyncs.fetch_add(1, Ordering::SeqCst);
    }

    fn end_resync(&self) {
        self.end_resyncs.fetch_add(1, Ordering::SeqCst);
    }

    fn set_period(&self, period: Nanos) {
        self.period.store(period, Ordering::SeqCst);
        self.set_periods.lock().push(period);
    }

    fn period(&self) -> Nanos {
        self.period.load(Ordering::SeqCst)
    }

    fn add_resync_sample(&self, timestamp: Nanos) -> ResyncSample {
        self.resync_samples.lock().push(timestamp);
        ResyncSample {
            needs_hw_vsync: self.needs_hw_vsync.load(Ordering::SeqCst),
            period_flushed: self.period_flushed.load(Ordering::SeqCst),
        }
    }

    fn add_present_fence(&self, fence: Fence) -> bool {
        self.present_fences.lock().push(fence);
        self.needs_hw_vsync.load(Ordering::SeqCst)
    }

    fn set_ignore_present_fences(&self, ignore: bool) {
        self.ignore_present_fences.store(ignore, Ordering::SeqCst);
    }

    fn compute_next_refresh(&self, periods_from_now: i32) -> Nanos {
        let period = self.period.load(Ordering::SeqCst);
        period * (Nanos::from(periods_from_now) + 1)
    }

    fn expected_present_time(&self) -> Nanos {
        self.period.load(Ordering::SeqCst)
    }
}

/// Records hardware vsync enable/disable transitions.
#[derive(Default)]
pub struct FakeEventControl {
    calls: Mutex<Vec<bool>>,
}

impl FakeEventControl {
    /// Creates an event control.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the enable/disable calls seen.
    #[must_use]
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().clone()
    }
}

impl EventControl for FakeEventControl {
    fn set_vsync_enabled(&self, enabled: bool) {
        self.calls.lock().push(enabled);
    }
}
