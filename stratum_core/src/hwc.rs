// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware composer contract.
//!
//! The hardware composer is the display driver's composition unit: given
//! per-layer state it either scans layers out directly ("device"
//! composition) or asks the compositor to blend some of them on the GPU
//! ("client" composition). The core only speaks this narrow interface; the
//! wire protocol behind it is out of scope.

use core::fmt;

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::color::{ColorMode, Dataspace, RenderIntent};
use crate::fence::Fence;
use crate::matrix::Mat4;
use crate::region::{Rect, Region};

/// Identifies a display known to the hardware composer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HwcDisplayId(pub u64);

impl fmt::Debug for HwcDisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HwcDisplayId({})", self.0)
    }
}

/// Identifies a layer created on a hardware composer display.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HwcLayerId(pub u64);

impl fmt::Debug for HwcLayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HwcLayerId({})", self.0)
    }
}

/// How a layer is composed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HwcCompositionType {
    /// No composition type has been set.
    #[default]
    Invalid,
    /// The compositor blends the layer on the GPU.
    Client,
    /// The display hardware scans the layer out directly.
    Device,
    /// The display hardware fills the layer with a solid color.
    SolidColor,
    /// The display hardware positions the layer as a cursor plane.
    Cursor,
    /// The layer's content arrives on a sideband stream.
    Sideband,
}

bitflags! {
    /// Whole-display requests returned from a composition-changes query.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DisplayRequests: u32 {
        /// The client target must be flipped even if no layer is client
        /// composed.
        const FLIP_CLIENT_TARGET = 1 << 0;
        /// The client target should also be written to the output buffer.
        const WRITE_CLIENT_TARGET_TO_OUTPUT = 1 << 1;
    }
}

/// A per-layer request returned from a composition-changes query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HwcLayerRequest {
    /// The client target must be cleared where this device-composed layer
    /// will be scanned out.
    ClearClientTarget,
}

/// Composition changes requested by the hardware composer for one frame.
#[derive(Clone, Debug, Default)]
pub struct DeviceRequestedChanges {
    /// New composition types for specific layers.
    pub changed_types: HashMap<HwcLayerId, HwcCompositionType>,
    /// Whole-display requests.
    pub display_requests: DisplayRequests,
    /// Per-layer requests.
    pub layer_requests: HashMap<HwcLayerId, HwcLayerRequest>,
}

/// Optional per-display capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayCapability {
    /// The display applies the color transform itself, so client
    /// composition must not.
    SkipClientColorTransform,
}

/// Failures reported by the hardware composer.
#[derive(Debug, thiserror::Error)]
pub enum HwcError {
    /// The display is gone (hotplug disconnect raced the frame).
    #[error("display {0:?} is not connected")]
    DisplayDisconnected(HwcDisplayId),
    /// A call was made with a parameter the device rejected.
    #[error("bad parameter: {0}")]
    BadParameter(&'static str),
    /// The device is out of layer or bandwidth resources.
    #[error("no device resources available")]
    NoResources,
}

/// Per-layer state pushed to the hardware composer each frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HwcLayerConfig {
    /// The layer's frame in output space.
    pub display_frame: Rect,
    /// The layer's visible region in output space.
    pub visible_region: Region,
    /// Z position, 0 at the back.
    pub z: u32,
    /// The layer's dataspace.
    pub dataspace: Dataspace,
    /// The composition type the compositor wants.
    pub composition_type: HwcCompositionType,
}

/// The hardware composer contract.
///
/// Implementations wrap the actual display driver. All methods take `&self`;
/// implementations handle their own interior synchronization.
pub trait HwComposer: Send + Sync {
    /// Creates a layer on a display.
    fn create_layer(&self, display: HwcDisplayId) -> Result<HwcLayerId, HwcError>;

    /// Destroys a previously created layer.
    fn destroy_layer(&self, display: HwcDisplayId, layer: HwcLayerId) -> Result<(), HwcError>;

    /// Pushes per-layer state for the upcoming frame.
    fn set_layer_state(
        &self,
        display: HwcDisplayId,
        layer: HwcLayerId,
        config: &HwcLayerConfig,
    ) -> Result<(), HwcError>;

    /// Validates the frame and returns the composition changes the device
    /// wants, if any.
    fn get_device_composition_changes(
        &self,
        display: HwcDisplayId,
        frame_uses_client_composition: bool,
    ) -> Result<Option<DeviceRequestedChanges>, HwcError>;

    /// Presents the validated frame and latches release fences.
    fn present_and_get_release_fences(&self, display: HwcDisplayId) -> Result<(), HwcError>;

    /// Returns the present fence for the last presented frame.
    fn get_present_fence(&self, display: HwcDisplayId) -> Fence;

    /// Returns the release fence for a layer from the last present.
    fn get_layer_release_fence(&self, display: HwcDisplayId, layer: HwcLayerId) -> Fence;

    /// Drops the latched release fences.
    fn clear_release_fences(&self, display: HwcDisplayId);

    /// Sets the display-wide color transform.
    fn set_color_transform(&self, display: HwcDisplayId, matrix: &Mat4) -> Result<(), HwcError>;

    /// Sets the active color mode and render intent.
    fn set_active_color_mode(
        &self,
        display: HwcDisplayId,
        mode: ColorMode,
        intent: RenderIntent,
    ) -> Result<(), HwcError>;

    /// Tears down a display.
    fn disconnect_display(&self, display: HwcDisplayId);

    /// Queries an optional display capability.
    fn has_display_capability(&self, display: HwcDisplayId, capability: DisplayCapability) -> bool;

    /// Enables or disables vsync callbacks for a display.
    fn set_vsync_enabled(&self, display: HwcDisplayId, enabled: bool);
}
