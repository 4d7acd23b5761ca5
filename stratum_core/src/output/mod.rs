// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One composition target and its per-frame pipeline.
//!
//! An [`Output`] is a physical display or a virtual display sink. It owns
//! the per-output composition state, the ordered list of
//! [`OutputLayer`]s (back-to-front), the render surface it presents into,
//! and the display color profile it consults.
//!
//! Each frame runs a fixed sequence of phases:
//!
//! ```text
//!   prepare            rebuild output layers (visibility & coverage)
//!   update FE state    latch content state from each layer front-end
//!   present:
//!     update color profile
//!     update & write per-layer composition state
//!     set color transform
//!     begin frame      decide recompose vs skip
//!     prepare frame    pick client/device strategy with the HWC
//!     repaint flash    (debug only)
//!     finish frame     client composition into a dequeued buffer
//!     post framebuffer flip, collect fences, distribute releases
//! ```
//!
//! Physical and virtual outputs share the whole pipeline and differ only in
//! the hardware-composer-backed steps, keyed off the optional bound HWC
//! display.

pub mod state;

mod coverage;

use std::sync::{Arc, Weak};

use tracing::{debug, error, warn};

use crate::color::{
    best_dataspace, ColorMode, ColorProfile, Dataspace, DisplayColorProfile, OutputColorSetting,
    RenderIntent,
};
use crate::engine::{CompositionEngine, RefreshArgs};
use crate::fence::Fence;
use crate::hwc::{
    DeviceRequestedChanges, DisplayCapability, DisplayRequests, HwcDisplayId, HwcLayerId,
};
use crate::layer::{ClientCompositionTargetSettings, LayerFe, LayerFeSet, StateSubset};
use crate::output_layer::OutputLayer;
use crate::region::{Rect, Region, Size};
use crate::render::{DisplaySettings, LayerSettings, PixelSource};
use crate::transform::{Orientation, Transform};

use state::OutputCompositionState;

/// Fences collected from presenting one frame.
#[derive(Debug, Default)]
pub struct FrameFences {
    /// Signals when the frame has been scanned out.
    pub present_fence: Fence,
    /// Acquire fence of the client target buffer, when client composition
    /// ran.
    pub client_target_acquire_fence: Fence,
    /// Per-HWC-layer release fences.
    pub layer_fences: hashbrown::HashMap<HwcLayerId, Fence>,
}

/// Whether an output is a physical display or a virtual sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    /// A physical display.
    Physical,
    /// A virtual display writing into a buffer sink.
    Virtual,
}

/// A composition target: one physical or virtual display.
pub struct Output {
    name: String,
    kind: OutputKind,
    hwc_display: Option<HwcDisplayId>,
    state: OutputCompositionState,
    color_profile: Box<dyn DisplayColorProfile>,
    surface: Box<dyn crate::render::RenderSurface>,
    layers: Vec<OutputLayer>,
    released: Vec<Weak<dyn LayerFe>>,
    must_recompose: bool,
}

impl Output {
    /// Creates an output.
    ///
    /// `hwc_display` binds the output to a hardware composer display;
    /// virtual outputs pass `None`. Bounds are initialized from the render
    /// surface.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: OutputKind,
        hwc_display: Option<HwcDisplayId>,
        is_secure: bool,
        color_profile: Box<dyn DisplayColorProfile>,
        surface: Box<dyn crate::render::RenderSurface>,
    ) -> Self {
        let mut output = Self {
            name: name.into(),
            kind,
            hwc_display,
            state: OutputCompositionState::default(),
            color_profile,
            surface,
            layers: Vec::new(),
            released: Vec::new(),
            must_recompose: false,
        };
        output.state.is_secure = is_secure;
        output.state.bounds = Rect::from_size(output.surface.size());
        output.dirty_entire_output();
        output
    }

    // -- State accessors ---------------------------------------------------

    /// Returns the output's debug name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether this is a virtual output.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.kind == OutputKind::Virtual
    }

    /// Returns the composition state snapshot.
    ///
    /// The reference is only valid until the next mutation.
    #[must_use]
    pub fn state(&self) -> &OutputCompositionState {
        &self.state
    }

    /// Returns the ordered output layers, back-to-front.
    #[must_use]
    pub fn output_layers(&self) -> &[OutputLayer] {
        &self.layers
    }

    /// Returns the output layer for `layer`, if one exists this frame.
    #[must_use]
    pub fn output_layer_for_layer(&self, layer: &Arc<crate::layer::Layer>) -> Option<&OutputLayer> {
        self.layers.iter().find(|ol| Arc::ptr_eq(ol.layer(), layer))
    }

    /// Returns the front-ends awaiting a present fence from the next frame.
    #[must_use]
    pub fn released_layers(&self) -> &[Weak<dyn LayerFe>] {
        &self.released
    }

    /// Returns the dirty region in layer-stack space.
    ///
    /// With `repaint_everything`, the full viewport.
    #[must_use]
    pub fn dirty_region(&self, repaint_everything: bool) -> Region {
        let mut dirty = Region::from_rect(self.state.viewport);
        if !repaint_everything {
            dirty.and_self(&self.state.dirty_region);
        }
        dirty
    }

    /// Tests whether a layer stack belongs on this output.
    ///
    /// The ids must match, and an internal-only layer additionally requires
    /// an internal output.
    #[must_use]
    pub fn belongs_in_output(&self, layer_stack_id: u32, internal_only: bool) -> bool {
        layer_stack_id == self.state.layer_stack_id
            && (!internal_only || self.state.layer_stack_internal)
    }

    // -- Setters -----------------------------------------------------------

    /// Enables or disables composition. Any change dirties the whole
    /// output.
    pub fn set_composition_enabled(&mut self, enabled: bool) {
        if self.state.is_enabled == enabled {
            return;
        }
        self.state.is_enabled = enabled;
        self.dirty_entire_output();
    }

    /// Sets the projection from layer-stack space onto the output.
    pub fn set_projection(
        &mut self,
        transform: Transform,
        orientation: Orientation,
        frame: Rect,
        viewport: Rect,
        scissor: Rect,
        needs_filtering: bool,
    ) {
        self.state.transform = transform;
        self.state.orientation = orientation;
        self.state.frame = frame;
        self.state.viewport = viewport;
        self.state.scissor = scissor;
        self.state.needs_filtering = needs_filtering;
        self.dirty_entire_output();
    }

    /// Resizes the output, resizing the render surface with it.
    pub fn set_bounds(&mut self, size: Size) {
        self.surface.set_display_size(size);
        self.state.bounds = Rect::from_size(self.surface.size());
        self.dirty_entire_output();
    }

    /// Sets which layer stack this output displays.
    pub fn set_layer_stack_filter(&mut self, layer_stack_id: u32, internal: bool) {
        self.state.layer_stack_id = layer_stack_id;
        self.state.layer_stack_internal = internal;
        self.dirty_entire_output();
    }

    /// Applies a color profile.
    ///
    /// No-op when nothing changes. Virtual outputs reject profile changes
    /// with a warning. Any actual change re-dirties the whole output.
    pub fn set_color_profile(&mut self, engine: &CompositionEngine, profile: ColorProfile) {
        let target_dataspace = self.color_profile.target_dataspace(
            profile.mode,
            profile.dataspace,
            profile.color_space_agnostic_dataspace,
        );

        if self.state.color_mode == profile.mode
            && self.state.dataspace == profile.dataspace
            && self.state.render_intent == profile.render_intent
            && self.state.target_dataspace == target_dataspace
        {
            return;
        }

        if self.is_virtual() {
            warn!(output = %self.name, "setColorProfile is invalid on a virtual display, ignoring");
            return;
        }

        self.state.color_mode = profile.mode;
        self.state.dataspace = profile.dataspace;
        self.state.render_intent = profile.render_intent;
        self.state.target_dataspace = target_dataspace;

        self.surface.set_buffer_dataspace(profile.dataspace);

        debug!(
            output = %self.name,
            mode = ?profile.mode,
            dataspace = ?profile.dataspace,
            intent = ?profile.render_intent,
            "set active color mode"
        );

        if let Some(hwc_display) = self.hwc_display {
            if let Err(e) =
                engine
                    .hwc()
                    .set_active_color_mode(hwc_display, profile.mode, profile.render_intent)
            {
                error!(output = %self.name, error = %e, "failed to set active color mode");
            }
        }

        self.dirty_entire_output();
    }

    /// Unbinds the output from its hardware composer display.
    pub fn disconnect(&mut self, engine: &CompositionEngine) {
        if let Some(hwc_display) = self.hwc_display.take() {
            engine.hwc().disconnect_display(hwc_display);
        }
    }

    // -- Per-frame pipeline ------------------------------------------------

    /// Prepares the output for a frame: runs the visibility and coverage
    /// pass.
    pub fn prepare(
        &mut self,
        engine: &CompositionEngine,
        args: &RefreshArgs,
        latched: &mut LayerFeSet,
    ) {
        self.rebuild_layer_stacks(engine, args, latched);
    }

    /// Latches content (and, on geometry frames, geometry) state from every
    /// layer front-end on this output.
    pub fn update_layer_state_from_fe(&self, args: &RefreshArgs) {
        let subset = if args.updating_geometry_this_frame {
            StateSubset::GeometryAndContent
        } else {
            StateSubset::Content
        };
        for output_layer in &self.layers {
            output_layer
                .fe()
                .latch_composition_state(&mut output_layer.layer().fe_state_mut(), subset);
        }
    }

    /// Composes and presents one frame.
    pub fn present(&mut self, engine: &mut CompositionEngine, args: &RefreshArgs) {
        self.update_color_profile(engine, args);
        self.update_and_write_composition_state(engine, args);
        self.set_color_transform(engine, args);
        self.begin_frame();
        self.prepare_frame(engine);
        if self.must_recompose {
            self.dev_opt_repaint_flash(engine, args);
            self.finish_frame(engine);
            self.post_framebuffer(engine);
        }
    }

    /// Recomputes and applies the color profile for this frame.
    fn update_color_profile(&mut self, engine: &CompositionEngine, args: &RefreshArgs) {
        if !self.state.is_enabled {
            return;
        }
        let profile = self.pick_color_profile(args);
        self.set_color_profile(engine, profile);
    }

    /// Picks the best color profile given the frame's color setting and the
    /// dataspaces of the visible layers.
    fn pick_color_profile(&self, args: &RefreshArgs) -> ColorProfile {
        if args.output_color_setting == OutputColorSetting::Unmanaged {
            return ColorProfile {
                mode: ColorMode::Native,
                dataspace: Dataspace::Unknown,
                render_intent: RenderIntent::Colorimetric,
                color_space_agnostic_dataspace: args.color_space_agnostic_dataspace,
            };
        }

        let scan = best_dataspace(&self.layers);
        let mut best = scan.best;

        match args.force_output_color_mode {
            Some(ColorMode::Srgb) => best = Dataspace::V0Srgb,
            Some(ColorMode::DisplayP3) => best = Dataspace::DisplayP3,
            _ => {}
        }

        // Promote to the HDR dataspace only when the display cannot handle
        // it through legacy HDR support and no HDR layer fell back to
        // client composition.
        if scan.hdr != Dataspace::Unknown
            && !self.color_profile.has_legacy_hdr_support(scan.hdr)
            && !scan.hdr_in_client_composition
        {
            best = scan.hdr;
        }

        let is_hdr = scan.hdr != Dataspace::Unknown;
        let intent = match args.output_color_setting {
            OutputColorSetting::Managed | OutputColorSetting::Unmanaged => {
                if is_hdr {
                    RenderIntent::ToneMapColorimetric
                } else {
                    RenderIntent::Colorimetric
                }
            }
            OutputColorSetting::Enhanced => {
                if is_hdr {
                    RenderIntent::ToneMapEnhance
                } else {
                    RenderIntent::Enhance
                }
            }
            OutputColorSetting::Vendor(value) => RenderIntent::Vendor(value),
        };

        let (dataspace, mode, render_intent) = self.color_profile.best_color_mode(best, intent);
        ColorProfile {
            mode,
            dataspace,
            render_intent,
            color_space_agnostic_dataspace: args.color_space_agnostic_dataspace,
        }
    }

    /// Updates each output layer's derived state and pushes it to the
    /// hardware composer.
    fn update_and_write_composition_state(
        &mut self,
        engine: &CompositionEngine,
        args: &RefreshArgs,
    ) {
        if !self.state.is_enabled {
            return;
        }
        let Self {
            state,
            layers,
            hwc_display,
            ..
        } = self;
        for output_layer in layers.iter_mut() {
            output_layer.update_composition_state(state, args.dev_opt_force_client_composition);
            if let Some(hwc_display) = *hwc_display {
                output_layer.write_state_to_hwc(engine.hwc().as_ref(), hwc_display);
            }
        }
    }

    /// Applies the frame's color transform matrix if it changed.
    fn set_color_transform(&mut self, engine: &CompositionEngine, args: &RefreshArgs) {
        if !self.state.is_enabled {
            return;
        }
        let Some(matrix) = args.color_transform_matrix else {
            return;
        };
        if self.state.color_transform_matrix == matrix {
            return;
        }
        self.state.color_transform_matrix = matrix;
        self.dirty_entire_output();

        if let Some(hwc_display) = self.hwc_display {
            if let Err(e) = engine.hwc().set_color_transform(hwc_display, &matrix) {
                error!(output = %self.name, error = %e, "failed to set color transform on display");
            }
        }
    }

    /// Decides whether this frame needs recomposing.
    ///
    /// If nothing is dirty, skip. If something is dirty but there are no
    /// visible layers now and were none at the last composition, also skip:
    /// removing the last layer emits exactly one black frame, and an output
    /// that never had layers emits none.
    fn begin_frame(&mut self) {
        if !self.state.is_enabled {
            self.must_recompose = false;
            return;
        }
        let dirty = !self.dirty_region(false).is_empty();
        let empty = self.layers.is_empty();
        let was_empty = !self.state.last_composition_had_visible_layers;

        let must_recompose = dirty && !(empty && was_empty);
        debug!(
            output = %self.name,
            must_recompose, dirty, empty, was_empty,
            "begin frame"
        );

        self.surface.begin_frame(must_recompose);
        if must_recompose {
            self.state.last_composition_had_visible_layers = !empty;
        }
        self.must_recompose = must_recompose;
    }

    /// Chooses the composition strategy and primes the render surface.
    fn prepare_frame(&mut self, engine: &CompositionEngine) {
        if !self.state.is_enabled {
            return;
        }
        self.choose_composition_strategy(engine);
        self.surface.prepare_frame(
            self.state.uses_client_composition,
            self.state.uses_device_composition,
        );
    }

    /// Consults the hardware composer for this frame's composition
    /// strategy.
    ///
    /// Without a bound HWC display only client composition is possible. A
    /// failed changes query leaves the client-only defaults in place.
    fn choose_composition_strategy(&mut self, engine: &CompositionEngine) {
        self.state.uses_client_composition = true;
        self.state.uses_device_composition = false;

        let Some(hwc_display) = self.hwc_display else {
            return;
        };

        let changes = match engine
            .hwc()
            .get_device_composition_changes(hwc_display, self.any_layers_require_client_composition())
        {
            Ok(changes) => changes,
            Err(e) => {
                error!(output = %self.name, error = %e, "composition strategy query failed");
                return;
            }
        };
        if let Some(changes) = changes {
            self.apply_changed_types_to_layers(&changes);
            self.apply_display_requests(changes.display_requests);
            self.apply_layer_requests_to_layers(&changes);
        }

        self.state.uses_client_composition = self.any_layers_require_client_composition();
        self.state.uses_device_composition = !self.all_layers_require_client_composition();
    }

    fn any_layers_require_client_composition(&self) -> bool {
        self.layers.iter().any(OutputLayer::requires_client_composition)
    }

    fn all_layers_require_client_composition(&self) -> bool {
        self.layers.iter().all(OutputLayer::requires_client_composition)
    }

    fn apply_changed_types_to_layers(&mut self, changes: &DeviceRequestedChanges) {
        if changes.changed_types.is_empty() {
            return;
        }
        for output_layer in &mut self.layers {
            let Some(hwc_layer) = output_layer.hwc_layer() else {
                continue;
            };
            if let Some(new_type) = changes.changed_types.get(&hwc_layer) {
                output_layer.apply_device_composition_type_change(*new_type);
            }
        }
    }

    fn apply_display_requests(&mut self, requests: DisplayRequests) {
        self.state.flip_client_target = requests.contains(DisplayRequests::FLIP_CLIENT_TARGET);
        // DisplayRequests::WRITE_CLIENT_TARGET_TO_OUTPUT is currently
        // ignored.
    }

    fn apply_layer_requests_to_layers(&mut self, changes: &DeviceRequestedChanges) {
        for output_layer in &mut self.layers {
            output_layer.prepare_for_device_layer_requests();

            let Some(hwc_layer) = output_layer.hwc_layer() else {
                continue;
            };
            if let Some(request) = changes.layer_requests.get(&hwc_layer) {
                output_layer.apply_device_layer_request(*request);
            }
        }
    }

    /// Debug path: flashes the dirty region before the real composition.
    fn dev_opt_repaint_flash(&mut self, engine: &mut CompositionEngine, args: &RefreshArgs) {
        let Some(delay) = args.dev_opt_flash_dirty_regions_delay else {
            return;
        };

        if self.state.is_enabled {
            let dirty = self.dirty_region(args.repaint_everything);
            if !dirty.is_empty() {
                // The ready fence of the flash composition is intentionally
                // not connected to the queued buffer.
                let _ = self.compose_surfaces(engine, &dirty);
                self.surface.queue_buffer(Fence::NO_FENCE);
            }
        }

        self.post_framebuffer(engine);
        std::thread::sleep(delay);
        self.prepare_frame(engine);
    }

    /// Runs client composition (when needed) and queues the result.
    fn finish_frame(&mut self, engine: &mut CompositionEngine) {
        if !self.state.is_enabled {
            return;
        }
        let Some(ready_fence) = self.compose_surfaces(engine, &Region::new()) else {
            return;
        };
        self.surface.queue_buffer(ready_fence);
    }

    /// Performs client composition into a dequeued buffer.
    ///
    /// Returns the ready-fence of the draw, `Fence::NO_FENCE` when no
    /// client composition was needed, or `None` when the frame must be
    /// abandoned (no buffer available).
    fn compose_surfaces(
        &mut self,
        engine: &mut CompositionEngine,
        debug_flash_region: &Region,
    ) -> Option<Fence> {
        if !self.state.uses_client_composition {
            return Some(Fence::NO_FENCE);
        }

        let supports_protected_content = engine.render_engine().supports_protected_content();

        let mut display = DisplaySettings {
            physical_display: self.state.scissor,
            clip: self.state.scissor,
            global_transform: self.state.transform.to_matrix(),
            orientation: self.state.orientation,
            output_dataspace: if self.color_profile.has_wide_color_gamut() {
                self.state.dataspace
            } else {
                Dataspace::Unknown
            },
            max_luminance: self.color_profile.hdr_capabilities().desired_max_luminance,
            color_transform: crate::matrix::Mat4::IDENTITY,
            clear_region: Region::new(),
        };

        if !self.state.uses_device_composition && !self.skip_color_transform(engine) {
            display.color_transform = self.state.color_transform_matrix;
        }

        let mut clear_region = Region::new();
        let mut layer_settings =
            self.generate_client_composition_requests(supports_protected_content, &mut clear_region);
        display.clear_region = clear_region;
        self.append_region_flash_requests(debug_flash_region, &mut layer_settings);

        // A secure output with protected layers needs a protected back
        // buffer, when the backend can do that at all.
        if self.state.is_secure && supports_protected_content {
            let needs_protected = self
                .layers
                .iter()
                .any(|ol| ol.layer().fe_state().has_protected_content);
            let render_engine = engine.render_engine_mut();
            if needs_protected != render_engine.is_protected() {
                render_engine.use_protected_context(needs_protected);
            }
            if needs_protected != self.surface.is_protected()
                && needs_protected == engine.render_engine().is_protected()
            {
                self.surface.set_protected(needs_protected);
            }
        }

        let Some((buffer, buffer_fence)) = self.surface.dequeue_buffer() else {
            warn!(
                output = %self.name,
                "dequeuing a buffer failed, bailing out of client composition for this frame"
            );
            return None;
        };

        // Color space conversion to P3 is expensive; ask for a GPU
        // frequency boost around the draw.
        let expensive_rendering_expected = display.output_dataspace == Dataspace::DisplayP3;
        if expensive_rendering_expected {
            self.set_expensive_rendering_expected(engine, true);
        }

        let ready_fence = match engine.render_engine_mut().draw_layers(
            &display,
            &layer_settings,
            &buffer,
            true,
            buffer_fence,
        ) {
            Ok(fence) => fence,
            Err(e) => {
                error!(output = %self.name, error = %e, "client composition draw failed");
                Fence::NO_FENCE
            }
        };

        if expensive_rendering_expected {
            self.set_expensive_rendering_expected(engine, false);
        }

        Some(ready_fence)
    }

    /// Builds the client-composition draw list, back-to-front.
    fn generate_client_composition_requests(
        &self,
        supports_protected_content: bool,
        clear_region: &mut Region,
    ) -> Vec<LayerSettings> {
        let viewport_region = Region::from_rect(self.state.viewport);
        let mut first_layer = true;
        // Receives clear-region output for layers that are only clears.
        let mut scratch_region = Region::new();
        let mut requests = Vec::new();

        for output_layer in &self.layers {
            let layer_state = output_layer.state();
            let fe_state = output_layer.layer().fe_state().clone();

            let clip = viewport_region.intersect(&layer_state.visible_region);
            if clip.is_empty() {
                first_layer = false;
                continue;
            }

            let client_composition = output_layer.requires_client_composition();

            // Clear the client target under device-composed layers when the
            // HWC asked for it, but only for opaque rectangles (anything
            // else must blend with what is underneath) and never for the
            // first layer, whose buffer target is guaranteed to start out
            // cleared.
            let clear_client_composition =
                layer_state.clear_client_target && fe_state.is_opaque && !first_layer;

            if client_composition || clear_client_composition {
                let settings = ClientCompositionTargetSettings {
                    clip,
                    use_identity_transform: false,
                    needs_filtering: output_layer.needs_filtering() || self.state.needs_filtering,
                    is_secure: self.state.is_secure,
                    supports_protected_content,
                    clear_region: if client_composition {
                        &mut *clear_region
                    } else {
                        &mut scratch_region
                    },
                };
                if let Some(mut layer_settings) =
                    output_layer.fe().prepare_client_composition(settings)
                {
                    if clear_client_composition {
                        layer_settings.source.buffer = None;
                        layer_settings.source.solid_color = [0.0, 0.0, 0.0];
                        layer_settings.alpha = 0.0;
                        layer_settings.disable_blending = true;
                    }
                    requests.push(layer_settings);
                }
            }

            first_layer = false;
        }

        requests
    }

    /// Appends solid magenta draw requests for every rect of the debug
    /// flash region.
    fn append_region_flash_requests(
        &self,
        flash_region: &Region,
        requests: &mut Vec<LayerSettings>,
    ) {
        for rect in flash_region {
            requests.push(LayerSettings {
                boundaries: *rect,
                source: PixelSource {
                    buffer: None,
                    solid_color: [1.0, 0.0, 1.0],
                },
                alpha: 1.0,
                disable_blending: false,
            });
        }
    }

    /// Flips the surface, collects frame fences, and distributes release
    /// fences to layer front-ends.
    fn post_framebuffer(&mut self, engine: &CompositionEngine) {
        if !self.state.is_enabled {
            return;
        }

        self.state.dirty_region.clear();
        self.surface.flip();

        let frame = self.present_and_get_frame_fences(engine);

        self.surface.on_present_completed();

        for output_layer in &self.layers {
            // The previous frame's buffer is released by the device only
            // once this frame's release fence signals, so always take the
            // device fence first.
            let mut release_fence = Fence::NO_FENCE;
            if let Some(hwc_layer) = output_layer.hwc_layer() {
                if let Some(fence) = frame.layer_fences.get(&hwc_layer) {
                    release_fence = fence.clone();
                }
            }

            // A layer client composited last frame also has to wait for the
            // client target. The previous frame's acquire fence is not
            // tracked, so merge with the current one even though it is
            // later than strictly necessary.
            if self.state.uses_client_composition {
                release_fence = Fence::merge(
                    "LayerRelease",
                    &release_fence,
                    &frame.client_target_acquire_fence,
                );
            }

            output_layer.fe().on_layer_displayed(release_fence);
        }

        // Layers that left the output since last frame are disjoint from
        // the current list; the best available signal for them is the
        // present fence.
        for weak_fe in self.released.drain(..) {
            if let Some(fe) = weak_fe.upgrade() {
                fe.on_layer_displayed(frame.present_fence.clone());
            }
        }
    }

    /// Presents through the hardware composer and collects the frame's
    /// fences.
    fn present_and_get_frame_fences(&mut self, engine: &CompositionEngine) -> FrameFences {
        let mut result = FrameFences::default();
        if self.state.uses_client_composition {
            result.client_target_acquire_fence = self.surface.client_target_acquire_fence();
        }

        let Some(hwc_display) = self.hwc_display else {
            return result;
        };

        let hwc = engine.hwc();
        if let Err(e) = hwc.present_and_get_release_fences(hwc_display) {
            error!(output = %self.name, error = %e, "present failed");
            return result;
        }

        result.present_fence = hwc.get_present_fence(hwc_display);

        for output_layer in &self.layers {
            let Some(hwc_layer) = output_layer.hwc_layer() else {
                continue;
            };
            result
                .layer_fences
                .insert(hwc_layer, hwc.get_layer_release_fence(hwc_display, hwc_layer));
        }

        hwc.clear_release_fences(hwc_display);

        result
    }

    /// Returns whether client composition must leave the color transform to
    /// the display.
    fn skip_color_transform(&self, engine: &CompositionEngine) -> bool {
        let Some(hwc_display) = self.hwc_display else {
            return true;
        };
        engine
            .hwc()
            .has_display_capability(hwc_display, DisplayCapability::SkipClientColorTransform)
    }

    /// Flags expensive rendering to the power advisor on device-backed
    /// outputs.
    fn set_expensive_rendering_expected(&self, engine: &mut CompositionEngine, expected: bool) {
        if let (Some(hwc_display), Some(advisor)) = (self.hwc_display, engine.power_advisor_mut()) {
            advisor.set_expensive_rendering_expected(hwc_display, expected);
        }
    }

    fn dirty_entire_output(&mut self) {
        self.state.dirty_region.set(self.state.bounds);
    }
}

impl core::fmt::Debug for Output {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("hwc_display", &self.hwc_display)
            .field("layers", &self.layers.len())
            .finish_non_exhaustive()
    }
}
