// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-(output, layer) derived state.
//!
//! An [`OutputLayer`] exists for each input layer visible on an output. It
//! is created by the visibility pass on the first frame the layer shows up,
//! reused (state mutated in place) while the layer stays visible, and
//! discarded when the layer disappears from the output. Ownership is
//! exclusive to the output; the input [`Layer`] is only back-referenced.

use std::sync::Arc;

use tracing::{error, warn};

use crate::hwc::{HwComposer, HwcCompositionType, HwcDisplayId, HwcLayerConfig, HwcLayerId, HwcLayerRequest};
use crate::layer::{Layer, LayerFe};
use crate::output::state::OutputCompositionState;
use crate::region::{Rect, Region};

/// Hardware-composer binding for an output layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwcLayerState {
    /// The device layer handle.
    pub layer: HwcLayerId,
    /// The composition type currently assigned to the layer.
    pub composition_type: HwcCompositionType,
}

/// The derived state for one layer on one output.
#[derive(Clone, Debug, Default)]
pub struct OutputLayerState {
    /// Visible region in layer-stack space.
    pub visible_region: Region,
    /// Visible region minus the transparent-region hint.
    pub visible_non_transparent_region: Region,
    /// Portion of the visible region covered by layers above.
    pub covered_region: Region,
    /// Visible region transformed to output space.
    pub output_space_visible_region: Region,
    /// Z position on this output, 0 at the back.
    pub z: u32,
    /// The layer's frame in output space.
    pub display_frame: Rect,
    /// The layer must be composed by the GPU on this output.
    pub force_client_composition: bool,
    /// The hardware composer asked for the client target to be cleared
    /// underneath this layer.
    pub clear_client_target: bool,
    /// Drawing this layer requires texture filtering.
    pub needs_filtering: bool,
    /// The dataspace pushed to the hardware composer.
    pub dataspace: crate::color::Dataspace,
    /// Hardware-composer binding, when the output is device-backed.
    pub hwc: Option<HwcLayerState>,
}

/// A layer as composed on one specific output.
pub struct OutputLayer {
    layer: Arc<Layer>,
    fe: Arc<dyn LayerFe>,
    state: OutputLayerState,
}

impl OutputLayer {
    /// Creates an output layer with empty derived state.
    #[must_use]
    pub fn new(layer: Arc<Layer>, fe: Arc<dyn LayerFe>) -> Self {
        Self {
            layer,
            fe,
            state: OutputLayerState::default(),
        }
    }

    /// Binds a hardware-composer layer created for this output layer.
    pub fn set_hwc_layer(&mut self, layer: HwcLayerId) {
        self.state.hwc = Some(HwcLayerState {
            layer,
            composition_type: HwcCompositionType::Invalid,
        });
    }

    /// Returns the input layer this output layer derives from.
    #[must_use]
    pub fn layer(&self) -> &Arc<Layer> {
        &self.layer
    }

    /// Returns the layer's front-end.
    #[must_use]
    pub fn fe(&self) -> &Arc<dyn LayerFe> {
        &self.fe
    }

    /// Returns the derived state.
    #[must_use]
    pub fn state(&self) -> &OutputLayerState {
        &self.state
    }

    /// Returns the derived state for mutation.
    pub fn state_mut(&mut self) -> &mut OutputLayerState {
        &mut self.state
    }

    /// Returns the bound hardware-composer layer, if any.
    #[must_use]
    pub fn hwc_layer(&self) -> Option<HwcLayerId> {
        self.state.hwc.map(|h| h.layer)
    }

    /// Returns whether this layer must be composed by the GPU.
    #[must_use]
    pub fn requires_client_composition(&self) -> bool {
        self.state.force_client_composition
            || self
                .state
                .hwc
                .is_none_or(|h| h.composition_type == HwcCompositionType::Client)
    }

    /// Returns whether drawing this layer needs texture filtering.
    #[must_use]
    pub fn needs_filtering(&self) -> bool {
        self.state.needs_filtering
    }

    /// Recomputes the per-frame derived state from the latched front-end
    /// state and the output's current state.
    pub fn update_composition_state(
        &mut self,
        output_state: &OutputCompositionState,
        force_client_composition: bool,
    ) {
        let fe_state = self.layer.fe_state().clone();
        let stack_frame = fe_state
            .geom_layer_transform
            .transform_rect(fe_state.geom_layer_bounds)
            .intersect(&output_state.viewport);
        let display_frame = output_state.transform.transform_rect(stack_frame);

        let (sw, sh) = (
            fe_state.geom_layer_bounds.width(),
            fe_state.geom_layer_bounds.height(),
        );
        let (dw, dh) = (display_frame.width(), display_frame.height());

        let state = &mut self.state;
        state.display_frame = display_frame;
        // Scaling in either axis (rotation-aware) forces filtering.
        state.needs_filtering =
            !display_frame.is_empty() && (sw, sh) != (dw, dh) && (sw, sh) != (dh, dw);
        state.dataspace = fe_state.dataspace;
        state.force_client_composition =
            fe_state.force_client_composition || force_client_composition;
    }

    /// Pushes the current state to the bound hardware-composer layer.
    ///
    /// No-op when the output layer has no device binding.
    pub fn write_state_to_hwc(&mut self, hwc: &dyn HwComposer, display: HwcDisplayId) {
        let Some(hwc_state) = &mut self.state.hwc else {
            return;
        };

        let requested = if self.state.force_client_composition {
            HwcCompositionType::Client
        } else {
            HwcCompositionType::Device
        };
        hwc_state.composition_type = requested;

        let config = HwcLayerConfig {
            display_frame: self.state.display_frame,
            visible_region: self.state.output_space_visible_region.clone(),
            z: self.state.z,
            dataspace: self.state.dataspace,
            composition_type: requested,
        };
        if let Err(e) = hwc.set_layer_state(display, hwc_state.layer, &config) {
            warn!(layer = %self.fe.name(), error = %e, "failed to push layer state to HWC");
        }
    }

    /// Applies a composition-type change requested by the device.
    ///
    /// Disallowed transitions are logged but still applied; the device is
    /// authoritative once validation has run.
    pub fn apply_device_composition_type_change(&mut self, new_type: HwcCompositionType) {
        let Some(hwc_state) = &mut self.state.hwc else {
            error!(
                layer = %self.fe.name(),
                "device requested a composition type change for a layer with no device binding"
            );
            return;
        };

        let allowed = match hwc_state.composition_type {
            // The device may never change these.
            HwcCompositionType::Invalid | HwcCompositionType::Client => false,
            HwcCompositionType::Device | HwcCompositionType::SolidColor => {
                new_type == HwcCompositionType::Client
            }
            HwcCompositionType::Cursor | HwcCompositionType::Sideband => {
                new_type == HwcCompositionType::Client || new_type == HwcCompositionType::Device
            }
        };
        if !allowed {
            error!(
                layer = %self.fe.name(),
                from = ?hwc_state.composition_type,
                to = ?new_type,
                "disallowed device composition type change"
            );
        }
        hwc_state.composition_type = new_type;
    }

    /// Resets request-derived flags before device layer requests are
    /// applied.
    pub fn prepare_for_device_layer_requests(&mut self) {
        self.state.clear_client_target = false;
    }

    /// Applies a per-layer request from the device.
    pub fn apply_device_layer_request(&mut self, request: HwcLayerRequest) {
        match request {
            HwcLayerRequest::ClearClientTarget => {
                self.state.clear_client_target = true;
            }
        }
    }
}

impl core::fmt::Debug for OutputLayer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutputLayer")
            .field("layer", &self.fe.name())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fence::Fence;
    use crate::layer::{ClientCompositionTargetSettings, LayerFeState, StateSubset};
    use crate::render::LayerSettings;

    struct StubFe;

    impl LayerFe for StubFe {
        fn name(&self) -> &str {
            "stub"
        }
        fn latch_composition_state(&self, _state: &mut LayerFeState, _subset: StateSubset) {}
        fn prepare_client_composition(
            &self,
            _settings: ClientCompositionTargetSettings<'_>,
        ) -> Option<LayerSettings> {
            None
        }
        fn on_layer_displayed(&self, _release_fence: Fence) {}
    }

    fn make_output_layer() -> OutputLayer {
        let fe: Arc<dyn LayerFe> = Arc::new(StubFe);
        let layer = Arc::new(Layer::new(&fe));
        OutputLayer::new(layer, fe)
    }

    #[test]
    fn no_hwc_binding_means_client_composition() {
        let ol = make_output_layer();
        assert!(ol.requires_client_composition());
    }

    #[test]
    fn device_type_clears_client_requirement() {
        let mut ol = make_output_layer();
        ol.set_hwc_layer(HwcLayerId(1));
        ol.state_mut().hwc.as_mut().unwrap().composition_type = HwcCompositionType::Device;
        assert!(!ol.requires_client_composition());

        ol.state_mut().force_client_composition = true;
        assert!(ol.requires_client_composition());
    }

    #[test]
    fn device_change_to_client_applies() {
        let mut ol = make_output_layer();
        ol.set_hwc_layer(HwcLayerId(1));
        ol.state_mut().hwc.as_mut().unwrap().composition_type = HwcCompositionType::Device;
        ol.apply_device_composition_type_change(HwcCompositionType::Client);
        assert_eq!(
            ol.state().hwc.unwrap().composition_type,
            HwcCompositionType::Client
        );
        assert!(ol.requires_client_composition());
    }

    #[test]
    fn layer_requests_reset_then_apply() {
        let mut ol = make_output_layer();
        ol.state_mut().clear_client_target = true;
        ol.prepare_for_device_layer_requests();
        assert!(!ol.state().clear_client_target);

        ol.apply_device_layer_request(HwcLayerRequest::ClearClientTarget);
        assert!(ol.state().clear_client_target);
    }
}
