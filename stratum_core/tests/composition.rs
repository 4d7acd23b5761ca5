// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end composition pipeline tests over the harness fakes.

use std::sync::Arc;
use std::time::Duration;

use stratum_core::color::{ColorMode, Dataspace, OutputColorSetting, RenderIntent};
use stratum_core::engine::{CompositionEngine, RefreshArgs};
use stratum_core::fence::Fence;
use stratum_core::hwc::{
    DeviceRequestedChanges, DisplayRequests, HwComposer, HwcCompositionType, HwcDisplayId,
    HwcLayerRequest,
};
use stratum_core::layer::{Layer, LayerFe, LayerFeSet, LayerFeState};
use stratum_core::output::{Output, OutputKind};
use stratum_core::region::{Rect, Region, Size};
use stratum_core::transform::{Orientation, Transform};
use stratum_harness::{
    FakeDisplayColorProfile, FakeHwc, FakeLayerFe, FakeRenderEngine, FakeRenderSurface,
};

const DISPLAY: HwcDisplayId = HwcDisplayId(7);

struct Rig {
    engine: CompositionEngine,
    output: Output,
    surface: FakeRenderSurface,
    render: FakeRenderEngine,
    hwc: Arc<FakeHwc>,
}

impl Rig {
    fn new(kind: OutputKind, width: u32, height: u32) -> Self {
        let hwc = FakeHwc::new();
        let render = FakeRenderEngine::new();
        let surface = FakeRenderSurface::new(Size::new(width, height));
        let engine = CompositionEngine::new(
            Box::new(render.clone()),
            Arc::clone(&hwc) as Arc<dyn HwComposer>,
        );

        let hwc_display = (kind == OutputKind::Physical).then_some(DISPLAY);
        let full = Rect::from_size(Size::new(width, height));
        let mut output = Output::new(
            "test-output",
            kind,
            hwc_display,
            false,
            Box::new(FakeDisplayColorProfile::new()),
            Box::new(surface.clone()),
        );
        output.set_projection(
            Transform::IDENTITY,
            Orientation::ROT_0,
            full,
            full,
            full,
            false,
        );
        output.set_layer_stack_filter(0, true);
        output.set_composition_enabled(true);

        Self {
            engine,
            output,
            surface,
            render,
            hwc,
        }
    }

    fn prepare(&mut self, args: &RefreshArgs) {
        let mut latched = LayerFeSet::default();
        self.output.prepare(&self.engine, args, &mut latched);
    }

    fn frame(&mut self, args: &RefreshArgs) {
        self.prepare(args);
        self.output.update_layer_state_from_fe(args);
        self.output.present(&mut self.engine, args);
    }
}

fn base_fe_state(bounds: Rect, opaque: bool) -> LayerFeState {
    LayerFeState {
        is_visible: true,
        is_opaque: opaque,
        alpha: 1.0,
        content_dirty: true,
        geom_layer_bounds: bounds,
        geom_layer_transform: Transform::IDENTITY,
        transparent_region_hint: Region::new(),
        dataspace: Dataspace::V0Srgb,
        force_client_composition: false,
        has_protected_content: false,
        layer_stack_id: 0,
        internal_only: false,
    }
}

fn make_layer(name: &str, bounds: Rect, opaque: bool) -> (Arc<FakeLayerFe>, Arc<Layer>) {
    let fe = FakeLayerFe::new(name, base_fe_state(bounds, opaque));
    let fe_dyn: Arc<dyn LayerFe> = Arc::clone(&fe) as Arc<dyn LayerFe>;
    let layer = Arc::new(Layer::new(&fe_dyn));
    (fe, layer)
}

fn args_with(layers: Vec<Arc<Layer>>) -> RefreshArgs {
    RefreshArgs {
        layers,
        ..RefreshArgs::default()
    }
}

// ---------------------------------------------------------------------------
// Visibility & coverage
// ---------------------------------------------------------------------------

#[test]
fn single_opaque_fullscreen_layer() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let full = Rect::new(0, 0, 100, 100);
    let (_fe, layer) = make_layer("fullscreen", full, true);

    rig.prepare(&args_with(vec![Arc::clone(&layer)]));

    let layers = rig.output.output_layers();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].state().visible_region, Region::from_rect(full));
    assert_eq!(
        layers[0].state().visible_non_transparent_region,
        Region::from_rect(full)
    );
    assert!(layers[0].state().covered_region.is_empty());
    assert_eq!(rig.output.state().dirty_region, Region::from_rect(full));
    assert!(rig.output.state().undefined_region.is_empty());
}

#[test]
fn opaque_on_top_of_translucent() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_fe_a, layer_a) = make_layer("translucent", Rect::new(0, 0, 100, 100), false);
    let (_fe_b, layer_b) = make_layer("opaque", Rect::new(0, 0, 50, 50), true);

    // Back-to-front: A below B.
    rig.prepare(&args_with(vec![Arc::clone(&layer_a), Arc::clone(&layer_b)]));

    let layers = rig.output.output_layers();
    assert_eq!(layers.len(), 2);

    let a = rig.output.output_layer_for_layer(&layer_a).unwrap();
    let b = rig.output.output_layer_for_layer(&layer_b).unwrap();

    let full = Region::from_rect(Rect::new(0, 0, 100, 100));
    let corner = Region::from_rect(Rect::new(0, 0, 50, 50));
    assert_eq!(b.state().visible_region, corner);
    assert_eq!(a.state().visible_region, full.subtract(&corner));
    // Only the opaque corner defines pixels; the translucent layer leaves
    // the rest undefined.
    assert_eq!(rig.output.state().undefined_region, full.subtract(&corner));

    // Z is back-to-front, 0..n-1.
    assert_eq!(a.state().z, 0);
    assert_eq!(b.state().z, 1);
}

#[test]
fn opaque_bottom_layer_leaves_nothing_undefined() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_fe_a, layer_a) = make_layer("wallpaper", Rect::new(0, 0, 100, 100), true);
    let (_fe_b, layer_b) = make_layer("app", Rect::new(0, 0, 50, 50), true);

    rig.prepare(&args_with(vec![Arc::clone(&layer_a), Arc::clone(&layer_b)]));

    assert!(rig.output.state().undefined_region.is_empty());
}

#[test]
fn z_values_compact_and_layers_unique() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_f1, l1) = make_layer("l1", Rect::new(0, 0, 40, 40), false);
    let (_f2, l2) = make_layer("l2", Rect::new(20, 20, 60, 60), false);
    let (_f3, l3) = make_layer("l3", Rect::new(40, 40, 80, 80), false);

    rig.prepare(&args_with(vec![
        Arc::clone(&l1),
        Arc::clone(&l2),
        Arc::clone(&l3),
    ]));

    let layers = rig.output.output_layers();
    assert_eq!(layers.len(), 3);
    for (index, output_layer) in layers.iter().enumerate() {
        assert_eq!(output_layer.state().z as usize, index);
    }
    // No two output layers point at the same input layer.
    for (i, a) in layers.iter().enumerate() {
        for b in &layers[i + 1..] {
            assert!(!Arc::ptr_eq(a.layer(), b.layer()));
        }
    }
}

#[test]
fn opaque_layer_occludes_covered_layer_regions() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_fa, below) = make_layer("below", Rect::new(0, 0, 100, 100), true);
    let (_fb, above) = make_layer("above", Rect::new(0, 0, 100, 100), true);

    rig.prepare(&args_with(vec![Arc::clone(&below), Arc::clone(&above)]));

    // The fully covered opaque layer is culled entirely.
    assert!(rig.output.output_layer_for_layer(&below).is_none());
    let layers = rig.output.output_layers();
    assert_eq!(layers.len(), 1);

    // Disjointness of an opaque layer's visible region with anything below.
    let above_visible = &layers[0].state().visible_region;
    assert_eq!(*above_visible, Region::from_rect(Rect::new(0, 0, 100, 100)));
}

#[test]
fn invisible_layer_never_appears() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (fe, layer) = make_layer("hidden", Rect::new(0, 0, 100, 100), true);
    fe.update_state(|state| state.is_visible = false);

    rig.prepare(&args_with(vec![Arc::clone(&layer)]));
    assert!(rig.output.output_layers().is_empty());
}

#[test]
fn wrong_layer_stack_is_skipped() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (fe, layer) = make_layer("elsewhere", Rect::new(0, 0, 100, 100), true);
    fe.update_state(|state| state.layer_stack_id = 9);

    rig.prepare(&args_with(vec![Arc::clone(&layer)]));
    assert!(rig.output.output_layers().is_empty());
}

#[test]
fn non_rect_preserving_transform_ignores_transparent_hint() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (fe, layer) = make_layer("complex", Rect::new(0, 0, 100, 100), false);
    fe.update_state(|state| {
        state.transparent_region_hint = Region::from_rect(Rect::new(0, 0, 50, 50));
        state.geom_layer_transform = Transform::new(Orientation::ROT_INVALID, 0, 0);
    });

    rig.prepare(&args_with(vec![Arc::clone(&layer)]));

    let output_layer = rig.output.output_layer_for_layer(&layer).unwrap();
    // The hint is dropped: visible and visible-non-transparent agree.
    assert_eq!(
        output_layer.state().visible_non_transparent_region,
        output_layer.state().visible_region
    );
}

#[test]
fn visibility_pass_is_idempotent_on_unchanged_inputs() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (fe_a, layer_a) = make_layer("a", Rect::new(0, 0, 100, 100), false);
    let (fe_b, layer_b) = make_layer("b", Rect::new(10, 10, 60, 60), true);
    fe_a.update_state(|state| state.content_dirty = false);
    fe_b.update_state(|state| state.content_dirty = false);

    let args = args_with(vec![Arc::clone(&layer_a), Arc::clone(&layer_b)]);
    rig.prepare(&args);
    let first: Vec<(Region, Region, Region, u32)> = rig
        .output
        .output_layers()
        .iter()
        .map(|ol| {
            let s = ol.state();
            (
                s.visible_region.clone(),
                s.visible_non_transparent_region.clone(),
                s.covered_region.clone(),
                s.z,
            )
        })
        .collect();

    rig.prepare(&args);
    let second: Vec<(Region, Region, Region, u32)> = rig
        .output
        .output_layers()
        .iter()
        .map(|ol| {
            let s = ol.state();
            (
                s.visible_region.clone(),
                s.visible_non_transparent_region.clone(),
                s.covered_region.clone(),
                s.z,
            )
        })
        .collect();

    assert_eq!(first, second);
}

#[test]
fn dirty_region_stays_within_bounds() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    // A layer hanging off the edge of the output.
    let (_fe, layer) = make_layer("overhang", Rect::new(50, 50, 300, 300), true);

    rig.prepare(&args_with(vec![Arc::clone(&layer)]));

    let bounds = Region::from_rect(rig.output.state().bounds);
    assert!(bounds.contains_region(&rig.output.state().dirty_region));
    let output_layer = rig.output.output_layer_for_layer(&layer).unwrap();
    assert_eq!(
        output_layer.state().visible_region,
        Region::from_rect(Rect::new(50, 50, 100, 100))
    );
}

// ---------------------------------------------------------------------------
// Frame lifecycle
// ---------------------------------------------------------------------------

#[test]
fn unchanged_frame_skips_recomposition() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (fe, layer) = make_layer("static", Rect::new(0, 0, 100, 100), true);

    // Frame 1: content dirty, composes.
    rig.frame(&args_with(vec![Arc::clone(&layer)]));
    assert_eq!(rig.surface.begin_frames(), vec![true]);
    assert_eq!(rig.surface.flips(), 1);

    // Frame 2: nothing changed.
    fe.update_state(|state| state.content_dirty = false);
    rig.frame(&args_with(vec![Arc::clone(&layer)]));

    assert_eq!(rig.surface.begin_frames(), vec![true, false]);
    assert!(rig.output.state().dirty_region.is_empty());
    // postFramebuffer was not entered: no extra flip.
    assert_eq!(rig.surface.flips(), 1);
}

#[test]
fn removing_last_layer_emits_exactly_one_black_frame() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_fe, layer) = make_layer("only", Rect::new(0, 0, 100, 100), true);

    rig.frame(&args_with(vec![Arc::clone(&layer)]));
    assert!(rig.output.state().last_composition_had_visible_layers);

    // Layer removed: one black recompose.
    rig.frame(&args_with(vec![]));
    assert_eq!(rig.surface.begin_frames(), vec![true, true]);
    assert!(!rig.output.state().last_composition_had_visible_layers);
    assert_eq!(rig.surface.flips(), 2);

    // Still empty: skip from now on.
    rig.frame(&args_with(vec![]));
    assert_eq!(rig.surface.begin_frames(), vec![true, true, false]);
    assert_eq!(rig.surface.flips(), 2);
}

#[test]
fn disabled_output_does_nothing_per_frame() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);
    rig.output.set_composition_enabled(false);

    rig.frame(&args_with(vec![Arc::clone(&layer)]));

    assert!(rig.output.output_layers().is_empty());
    assert!(rig.surface.begin_frames().is_empty());
    assert_eq!(rig.surface.flips(), 0);
    assert!(rig.render.draws().is_empty());
}

#[test]
fn set_composition_enabled_is_idempotent_on_dirty() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);
    rig.frame(&args_with(vec![Arc::clone(&layer)]));
    assert!(rig.output.state().dirty_region.is_empty());

    // Setting the current value changes nothing.
    rig.output.set_composition_enabled(true);
    assert!(rig.output.state().dirty_region.is_empty());

    // An actual change dirties once; repeating it leaves dirty unchanged.
    rig.output.set_composition_enabled(false);
    let after_change = rig.output.state().dirty_region.clone();
    assert!(!after_change.is_empty());
    rig.output.set_composition_enabled(false);
    assert_eq!(rig.output.state().dirty_region, after_change);
}

#[test]
fn dequeue_failure_skips_frame_but_not_the_next() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);

    rig.surface.set_dequeue_fails(true);
    rig.frame(&args_with(vec![Arc::clone(&layer)]));

    // Composition bailed: nothing drawn, nothing queued, but the frame was
    // still posted.
    assert!(rig.render.draws().is_empty());
    assert!(rig.surface.queued_fences().is_empty());
    assert_eq!(rig.surface.flips(), 1);

    // The next frame proceeds normally.
    rig.surface.set_dequeue_fails(false);
    fe.update_state(|state| state.content_dirty = true);
    rig.frame(&args_with(vec![Arc::clone(&layer)]));
    assert_eq!(rig.render.draws().len(), 1);
    assert_eq!(rig.surface.queued_fences().len(), 1);
    assert_eq!(rig.surface.flips(), 2);
}

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

#[test]
fn device_composition_when_hwc_accepts_all_layers() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);

    rig.frame(&args_with(vec![Arc::clone(&layer)]));

    // The HWC accepted the layer as Device: no client composition.
    assert_eq!(rig.hwc.change_queries(), vec![false]);
    assert_eq!(rig.surface.prepare_frames(), vec![(false, true)]);
    assert!(rig.render.draws().is_empty());
    // finishFrame still queues (with no fence) and the frame presents.
    assert_eq!(rig.surface.queued_fences(), vec![Fence::NO_FENCE]);
    assert_eq!(rig.hwc.presents(), 1);
}

#[test]
fn hwc_change_to_client_forces_client_composition() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);

    // First prepare so the HWC layer exists.
    let args = args_with(vec![Arc::clone(&layer)]);
    rig.prepare(&args);
    let hwc_layer = rig
        .output
        .output_layer_for_layer(&layer)
        .unwrap()
        .hwc_layer()
        .unwrap();

    let mut changes = DeviceRequestedChanges::default();
    changes.changed_types.insert(hwc_layer, HwcCompositionType::Client);
    changes.display_requests = DisplayRequests::FLIP_CLIENT_TARGET;
    rig.hwc.push_change_response(Ok(Some(changes)));

    rig.output.update_layer_state_from_fe(&args);
    rig.output.present(&mut rig.engine, &args);

    assert!(rig.output.state().uses_client_composition);
    assert!(!rig.output.state().uses_device_composition);
    assert!(rig.output.state().flip_client_target);
    assert_eq!(rig.surface.prepare_frames(), vec![(true, false)]);
    assert_eq!(rig.render.draws().len(), 1);
}

#[test]
fn hwc_query_failure_leaves_client_defaults() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);

    rig.hwc.push_change_response(Err(
        stratum_core::hwc::HwcError::DisplayDisconnected(DISPLAY),
    ));
    rig.frame(&args_with(vec![Arc::clone(&layer)]));

    assert!(rig.output.state().uses_client_composition);
    assert!(!rig.output.state().uses_device_composition);
}

#[test]
fn clear_client_target_zeroes_draw_request() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    // Bottom layer forced to client composition so the frame has a client
    // pass; top layer device-composed with a clear request.
    let (fe_bottom, bottom) = make_layer("bottom", Rect::new(0, 0, 100, 100), false);
    fe_bottom.update_state(|state| state.force_client_composition = true);
    let (_fe_top, top) = make_layer("top", Rect::new(60, 60, 100, 100), true);

    let args = args_with(vec![Arc::clone(&bottom), Arc::clone(&top)]);
    rig.prepare(&args);
    let top_hwc = rig
        .output
        .output_layer_for_layer(&top)
        .unwrap()
        .hwc_layer()
        .unwrap();

    let mut changes = DeviceRequestedChanges::default();
    changes
        .layer_requests
        .insert(top_hwc, HwcLayerRequest::ClearClientTarget);
    rig.hwc.push_change_response(Ok(Some(changes)));

    rig.output.update_layer_state_from_fe(&args);
    rig.output.present(&mut rig.engine, &args);

    let draws = rig.render.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].layers.len(), 2);
    // The bottom layer draws normally.
    assert!((draws[0].layers[0].alpha - 1.0).abs() < f32::EPSILON);
    // The top layer became a blocking black clear.
    let clear = &draws[0].layers[1];
    assert!(clear.source.buffer.is_none());
    assert_eq!(clear.source.solid_color, [0.0, 0.0, 0.0]);
    assert_eq!(clear.alpha, 0.0);
    assert!(clear.disable_blending);
}

#[test]
fn clear_client_target_skipped_for_first_layer() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (_fe, only) = make_layer("only", Rect::new(0, 0, 100, 100), true);

    let args = args_with(vec![Arc::clone(&only)]);
    rig.prepare(&args);
    let hwc_layer = rig
        .output
        .output_layer_for_layer(&only)
        .unwrap()
        .hwc_layer()
        .unwrap();

    let mut changes = DeviceRequestedChanges::default();
    changes
        .layer_requests
        .insert(hwc_layer, HwcLayerRequest::ClearClientTarget);
    rig.hwc.push_change_response(Ok(Some(changes)));

    rig.output.update_layer_state_from_fe(&args);
    rig.output.present(&mut rig.engine, &args);

    // Device-only composition and the first layer never clears, so no
    // client draw happened at all.
    assert!(rig.render.draws().is_empty());
}

// ---------------------------------------------------------------------------
// Fences
// ---------------------------------------------------------------------------

#[test]
fn release_fence_distribution_on_layer_removal() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (fe_one, layer_one) = make_layer("one", Rect::new(0, 0, 50, 100), true);
    fe_one.update_state(|state| state.force_client_composition = true);
    let (fe_two, layer_two) = make_layer("two", Rect::new(50, 0, 100, 100), true);

    // Frame N-1 with both layers.
    rig.frame(&args_with(vec![
        Arc::clone(&layer_one),
        Arc::clone(&layer_two),
    ]));

    let one_hwc = rig
        .output
        .output_layer_for_layer(&layer_one)
        .unwrap()
        .hwc_layer()
        .unwrap();

    // Frame N: layer two is gone.
    let hwc_release = Fence::new("hwc-release-one");
    let client_acquire = Fence::new("client-target");
    let present = Fence::new("present");
    rig.hwc.set_layer_release_fence(one_hwc, hwc_release.clone());
    rig.hwc.set_present_fence(present.clone());
    rig.surface.set_client_target_acquire_fence(client_acquire.clone());

    fe_one.update_state(|state| state.content_dirty = true);
    rig.frame(&args_with(vec![Arc::clone(&layer_one)]));

    // Layer one got the HWC release fence merged with the client target
    // acquire fence.
    let fences = fe_one.displayed_fences();
    let last = fences.last().unwrap();
    let (a, b) = last.merged_from().expect("expected a merged fence");
    assert_eq!(*a, hwc_release);
    assert_eq!(*b, client_acquire);

    // Layer two moved into the released set and got the present fence.
    let fences = fe_two.displayed_fences();
    assert_eq!(*fences.last().unwrap(), present);
    assert!(rig.output.released_layers().is_empty());
}

#[test]
fn hwc_layers_destroyed_when_layer_leaves() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (_fe, layer) = make_layer("gone", Rect::new(0, 0, 100, 100), true);

    rig.frame(&args_with(vec![Arc::clone(&layer)]));
    assert_eq!(rig.hwc.created_layers().len(), 1);
    assert!(rig.hwc.destroyed_layers().is_empty());

    rig.frame(&args_with(vec![]));
    assert_eq!(rig.hwc.destroyed_layers(), rig.hwc.created_layers());
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

#[test]
fn unmanaged_color_stays_native() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);

    let args = RefreshArgs {
        output_color_setting: OutputColorSetting::Unmanaged,
        ..args_with(vec![Arc::clone(&layer)])
    };
    rig.frame(&args);

    assert_eq!(rig.output.state().color_mode, ColorMode::Native);
    assert_eq!(rig.output.state().dataspace, Dataspace::Unknown);
    assert!(rig.hwc.color_modes().is_empty());
}

#[test]
fn hdr_layer_promotes_dataspace_and_tone_maps() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (fe, layer) = make_layer("video", Rect::new(0, 0, 100, 100), true);
    fe.update_state(|state| state.dataspace = Dataspace::Bt2020Pq);

    rig.frame(&args_with(vec![Arc::clone(&layer)]));

    // No legacy HDR support and no HDR client composition: the HDR
    // dataspace wins and the intent tone maps.
    assert_eq!(rig.output.state().dataspace, Dataspace::Bt2020Pq);
    assert_eq!(rig.output.state().color_mode, ColorMode::DisplayBt2020);
    assert_eq!(
        rig.output.state().render_intent,
        RenderIntent::ToneMapColorimetric
    );
    assert_eq!(rig.surface.dataspace(), Dataspace::Bt2020Pq);
    assert_eq!(
        rig.hwc.color_modes(),
        vec![(ColorMode::DisplayBt2020, RenderIntent::ToneMapColorimetric)]
    );
}

#[test]
fn hdr_in_client_composition_blocks_promotion() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (fe, layer) = make_layer("hdr-ui", Rect::new(0, 0, 100, 100), true);
    fe.update_state(|state| {
        state.dataspace = Dataspace::Bt2020Pq;
        state.force_client_composition = true;
    });

    rig.frame(&args_with(vec![Arc::clone(&layer)]));

    // Wide gamut still selected, but not the HDR dataspace.
    assert_eq!(rig.output.state().dataspace, Dataspace::DisplayBt2020);
}

#[test]
fn set_color_profile_applies_only_on_change() {
    let mut rig = Rig::new(OutputKind::Physical, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);
    rig.frame(&args_with(vec![Arc::clone(&layer)]));
    assert!(rig.output.state().dirty_region.is_empty());

    let profile = stratum_core::color::ColorProfile {
        mode: ColorMode::DisplayP3,
        dataspace: Dataspace::DisplayP3,
        render_intent: RenderIntent::Colorimetric,
        color_space_agnostic_dataspace: Dataspace::Unknown,
    };
    let modes_before = rig.hwc.color_modes().len();
    rig.output.set_color_profile(&rig.engine, profile);
    assert!(!rig.output.state().dirty_region.is_empty());
    assert_eq!(rig.hwc.color_modes().len(), modes_before + 1);

    // Same profile again: no second application.
    rig.output.set_color_profile(&rig.engine, profile);
    assert_eq!(rig.hwc.color_modes().len(), modes_before + 1);
}

// ---------------------------------------------------------------------------
// Debug paths
// ---------------------------------------------------------------------------

#[test]
fn repaint_flash_draws_dirty_region_then_recomposes() {
    let mut rig = Rig::new(OutputKind::Virtual, 100, 100);
    let (_fe, layer) = make_layer("layer", Rect::new(0, 0, 100, 100), true);

    let args = RefreshArgs {
        dev_opt_flash_dirty_regions_delay: Some(Duration::from_millis(1)),
        ..args_with(vec![Arc::clone(&layer)])
    };
    rig.frame(&args);

    let draws = rig.render.draws();
    assert_eq!(draws.len(), 2, "flash draw plus the real composition");

    // The flash pass appended a magenta fill over the dirty rect.
    let flash = draws[0]
        .layers
        .iter()
        .find(|l| l.source.solid_color == [1.0, 0.0, 1.0])
        .expect("expected a flash layer");
    assert!((flash.alpha - 1.0).abs() < f32::EPSILON);
    assert_eq!(flash.boundaries, Rect::new(0, 0, 100, 100));

    // The flash queue uses a disconnected fence; the real pass queues the
    // draw's ready fence.
    let queued = rig.surface.queued_fences();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0], Fence::NO_FENCE);
    assert_eq!(queued[1], draws[1].ready_fence);

    // Both passes posted.
    assert_eq!(rig.surface.flips(), 2);
}

#[test]
fn protected_content_switches_contexts() {
    let hwc = FakeHwc::new();
    let render = FakeRenderEngine::with_protected_support();
    let surface = FakeRenderSurface::new(Size::new(100, 100));
    let mut engine = CompositionEngine::new(
        Box::new(render.clone()),
        Arc::clone(&hwc) as Arc<dyn HwComposer>,
    );
    let full = Rect::from_size(Size::new(100, 100));
    let mut output = Output::new(
        "secure-output",
        OutputKind::Virtual,
        None,
        true,
        Box::new(FakeDisplayColorProfile::new()),
        Box::new(surface.clone()),
    );
    output.set_projection(
        Transform::IDENTITY,
        Orientation::ROT_0,
        full,
        full,
        full,
        false,
    );
    output.set_layer_stack_filter(0, true);
    output.set_composition_enabled(true);

    let (fe, layer) = make_layer("drm-video", full, true);
    fe.update_state(|state| state.has_protected_content = true);

    let args = args_with(vec![Arc::clone(&layer)]);
    let mut latched = LayerFeSet::default();
    output.prepare(&engine, &args, &mut latched);
    output.update_layer_state_from_fe(&args);
    output.present(&mut engine, &args);

    assert!(render.is_protected_now());
    assert!(surface.protected());
}
