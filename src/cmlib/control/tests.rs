use super::*;
use crate::{
    annotations::GeoFig,
    calibration::square_marker,
    domain::{RectF, floats_close},
    events::WheelInput,
    measure::label,
};

fn calibration() -> CalibrationData {
    CalibrationData {
        markers: vec![
            square_marker(1, 0.0, 0.0, 10.0, 1.0),
            square_marker(2, 180.0, 80.0, 10.0, 0.5),
        ],
        ..Default::default()
    }
}

fn controller_with(calibration: CalibrationData) -> OverlayController {
    crate::tracing_setup::init_tracing_for_tests();
    let image = RgbaImage::from_pixel(200, 100, image::Rgba([128, 128, 128, 255]));
    let mut ctl = OverlayController::new(image, "bench.png", calibration, &OverlayCfg::default());
    // canvas and image coincide at zoom 1
    ctl.resize(ShapeF::new(200.0, 100.0), Insets::default(), 1.0);
    ctl
}
fn controller() -> OverlayController {
    controller_with(calibration())
}

fn ptr(x: f64, y: f64, t: f64) -> PointerInput {
    PointerInput::new(1, PtF::new(x, y)).time(t)
}
fn click(ctl: &mut OverlayController, x: f64, y: f64, t: f64) {
    ctl.handle_input(&InputEvent::PointerDown(ptr(x, y, t)), false);
    ctl.handle_input(&InputEvent::PointerUp(ptr(x, y, t + 0.05)), false);
}
fn drag(ctl: &mut OverlayController, from: (f64, f64), to: (f64, f64), t: f64) {
    ctl.handle_input(&InputEvent::PointerDown(ptr(from.0, from.1, t)), false);
    ctl.handle_input(&InputEvent::PointerMove(ptr(to.0, to.1, t + 0.1)), false);
    ctl.handle_input(&InputEvent::PointerUp(ptr(to.0, to.1, t + 0.2)), false);
}
fn press(ctl: &mut OverlayController, key: KeyCode) {
    ctl.handle_input(&InputEvent::KeyPressed(key, Modifiers::default()), false);
}
fn last_geo(ctl: &OverlayController) -> GeoFig {
    ctl.store().items().last().map(|a| a.geo.clone()).unwrap()
}

#[test]
fn test_first_resize_fits() {
    let ctl = controller();
    assert!(floats_close(ctl.viewport().k(), 1.0));
    assert_eq!(ctl.viewport().pan(), PtF::new(0.0, 0.0));
}

#[test]
fn test_segment_near_marker() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 10.0, 10.0, 0.0);
    assert_eq!(ctl.state().n_in_progress, 1);
    click(&mut ctl, 13.0, 14.0, 1.0);
    assert_eq!(ctl.state().n_in_progress, 0);
    assert_eq!(ctl.store().len(), 1);
    let geo = last_geo(&ctl);
    assert_eq!(label(&geo, Unit::Mm), "5.000 mm");
    let calib = geo.calib().unwrap();
    assert_eq!(calib.marker_id, Some(MarkerId::Int(1)));
    assert_eq!(ctl.store().selected_id(), ctl.store().items().last().map(|a| a.id));

    click(&mut ctl, 170.0, 90.0, 2.0);
    click(&mut ctl, 174.0, 93.0, 3.0);
    let geo = last_geo(&ctl);
    assert_eq!(label(&geo, Unit::Mm), "2.500 mm");
    assert_eq!(geo.calib().unwrap().marker_id, Some(MarkerId::Int(2)));
}

#[test]
fn test_hover_cleared_for_taps() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Segment);
    ctl.handle_input(
        &InputEvent::PointerMove(PointerInput::new(7, PtF::new(5.0, 5.0))),
        false,
    );
    click(&mut ctl, 5.0, 5.0, 0.0);
    press(&mut ctl, KeyCode::Escape);
    assert_eq!(ctl.hover(), None);
    // taps without moves in between, the scale comes from the points next to marker 2
    click(&mut ctl, 170.0, 90.0, 1.0);
    click(&mut ctl, 174.0, 93.0, 2.0);
    let geo = last_geo(&ctl);
    assert_eq!(geo.calib().unwrap().marker_id, Some(MarkerId::Int(2)));
    assert_eq!(label(&geo, Unit::Mm), "2.500 mm");
    assert_eq!(ctl.hover(), None);

    ctl.handle_input(
        &InputEvent::PointerMove(PointerInput::new(7, PtF::new(5.0, 5.0))),
        false,
    );
    ctl.set_mode(Mode::Polyline);
    ctl.handle_input(
        &InputEvent::PointerMove(PointerInput::new(7, PtF::new(5.0, 5.0))),
        false,
    );
    click(&mut ctl, 20.0, 20.0, 3.0);
    click(&mut ctl, 20.0, 40.0, 4.0);
    assert!(ctl.finish_polyline().is_some());
    assert_eq!(ctl.hover(), None);
}

#[test]
fn test_endpoint_drag_keeps_frozen_scale() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 10.0, 10.0, 0.0);
    click(&mut ctl, 40.0, 50.0, 1.0);
    assert_eq!(label(&last_geo(&ctl), Unit::Mm), "50.000 mm");
    ctl.set_mode(Mode::Select);
    // the endpoint ends up next to marker 2 with half the scale
    drag(&mut ctl, (40.0, 50.0), (178.0, 80.0), 2.0);
    let geo = last_geo(&ctl);
    assert!(matches!(geo, GeoFig::Segment { b, .. } if b == PtF::new(178.0, 80.0)));
    assert_eq!(label(&geo, Unit::Mm), "182.000 mm");
    let calib = geo.calib().unwrap();
    assert_eq!(calib.mm_per_px, 1.0);
    assert_eq!(calib.marker_id, Some(MarkerId::Int(1)));
    assert_eq!(ctl.store().len(), 1);
}

#[test]
fn test_frozen_scale() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 10.0, 10.0, 0.0);
    click(&mut ctl, 13.0, 14.0, 1.0);
    ctl.lock_marker(Some(MarkerId::Str("2".to_string())));
    assert!(floats_close(ctl.state().mm_per_px, 0.5));
    assert_eq!(label(&last_geo(&ctl), Unit::Mm), "5.000 mm");

    click(&mut ctl, 10.0, 10.0, 2.0);
    click(&mut ctl, 13.0, 14.0, 3.0);
    let geo = last_geo(&ctl);
    assert_eq!(label(&geo, Unit::Mm), "2.500 mm");
    assert_eq!(geo.calib().unwrap().marker_id, Some(MarkerId::Int(2)));

    ctl.lock_marker(Some(MarkerId::Str("zz".to_string())));
    assert_eq!(ctl.resolve_scale(), (0.0, None));
}

#[test]
fn test_no_markers() {
    let mut ctl = controller_with(CalibrationData::default());
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 10.0, 10.0, 0.0);
    click(&mut ctl, 50.0, 10.0, 1.0);
    let geo = last_geo(&ctl);
    let calib = geo.calib().unwrap();
    assert_eq!(calib.mm_per_px, 0.0);
    assert_eq!(calib.marker_id, None);
    assert!(ctl.state().kpi().starts_with("Scale: 0.00 µm/px"));
}

#[test]
fn test_angle() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Angle);
    click(&mut ctl, 50.0, 10.0, 0.0);
    click(&mut ctl, 50.0, 50.0, 1.0);
    assert!(ctl.store().is_empty());
    click(&mut ctl, 90.0, 50.0, 2.0);
    let geo = last_geo(&ctl);
    assert!(matches!(geo, GeoFig::Angle { v, .. } if v == PtF::new(50.0, 50.0)));
    assert_eq!(label(&geo, Unit::Mm), "θ 90.00°");
}

#[test]
fn test_polyline_double_tap() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Polyline);
    click(&mut ctl, 10.0, 50.0, 0.0);
    assert_eq!(ctl.finish_polyline(), None);
    assert_eq!(ctl.state().n_in_progress, 1);
    assert!(!ctl.state().can_finish_polyline);
    click(&mut ctl, 60.0, 50.0, 1.0);
    click(&mut ctl, 60.0, 90.0, 2.0);
    assert!(ctl.state().can_finish_polyline);
    // second tap right after the last one finishes without adding a vertex
    click(&mut ctl, 60.0, 90.0, 2.1);
    assert_eq!(ctl.store().len(), 1);
    assert_eq!(ctl.state().n_in_progress, 0);
    match last_geo(&ctl) {
        GeoFig::Polyline { pts, .. } => assert_eq!(pts.len(), 3),
        g => panic!("polyline expected, got {g:?}"),
    }
    assert_eq!(label(&last_geo(&ctl), Unit::Mm), "90.000 mm");
    click(&mut ctl, 20.0, 20.0, 5.0);
    assert_eq!(ctl.state().n_in_progress, 1);
    assert_eq!(ctl.store().len(), 1);
}

#[test]
fn test_polyline_enter() {
    let mut ctl = controller();
    press(&mut ctl, KeyCode::Key3);
    assert_eq!(ctl.options().mode, Mode::Polyline);
    click(&mut ctl, 10.0, 50.0, 0.0);
    press(&mut ctl, KeyCode::Enter);
    assert!(ctl.store().is_empty());
    click(&mut ctl, 30.0, 50.0, 1.0);
    press(&mut ctl, KeyCode::Enter);
    assert_eq!(ctl.store().len(), 1);
}

#[test]
fn test_delete_escape_undo() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 10.0, 10.0, 0.0);
    click(&mut ctl, 40.0, 10.0, 1.0);
    assert!(ctl.state().can_delete);
    press(&mut ctl, KeyCode::Delete);
    assert!(ctl.store().is_empty());

    click(&mut ctl, 10.0, 10.0, 2.0);
    click(&mut ctl, 40.0, 10.0, 3.0);
    click(&mut ctl, 10.0, 60.0, 4.0);
    assert_eq!(ctl.state().n_in_progress, 1);
    press(&mut ctl, KeyCode::Escape);
    assert_eq!(ctl.state().n_in_progress, 0);
    assert_eq!(ctl.store().selected_id(), None);
    // nothing selected, backspace pops the point in progress
    click(&mut ctl, 10.0, 60.0, 5.0);
    press(&mut ctl, KeyCode::Back);
    assert_eq!(ctl.state().n_in_progress, 0);
    assert_eq!(ctl.store().len(), 1);

    ctl.set_mode(Mode::Select);
    click(&mut ctl, 25.0, 11.0, 6.0);
    assert!(ctl.store().selected_id().is_some());
    ctl.handle_input(&InputEvent::KeyPressed(KeyCode::Z, Modifiers::ctrl()), false);
    assert!(ctl.store().is_empty());
}

#[test]
fn test_select_and_notes() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Note);
    ctl.set_note_text("  ");
    click(&mut ctl, 100.0, 50.0, 0.0);
    assert!(matches!(last_geo(&ctl), GeoFig::Note { text, .. } if text == "Note"));
    ctl.set_note_text("crack");
    click(&mut ctl, 150.0, 50.0, 1.0);
    assert!(matches!(last_geo(&ctl), GeoFig::Note { text, .. } if text == "crack"));

    ctl.set_mode(Mode::Select);
    click(&mut ctl, 102.0, 51.0, 2.0);
    assert_eq!(ctl.store().selected_id(), ctl.store().items().first().map(|a| a.id));
    click(&mut ctl, 20.0, 90.0, 3.0);
    assert_eq!(ctl.store().selected_id(), None);

    ctl.set_kind_visible(AnnoKind::Note, false);
    click(&mut ctl, 102.0, 51.0, 4.0);
    assert_eq!(ctl.store().selected_id(), None);
    assert!(ctl.live_scene().annotations.is_empty());
}

#[test]
fn test_rect_corner_drag() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Rectangle);
    click(&mut ctl, 20.0, 20.0, 0.0);
    click(&mut ctl, 60.0, 50.0, 1.0);
    ctl.set_mode(Mode::Select);
    // grabbing an edge far from the corners moves the whole rectangle
    drag(&mut ctl, (40.0, 20.0), (45.0, 25.0), 2.0);
    match last_geo(&ctl) {
        GeoFig::Rectangle { rect, .. } => {
            assert_eq!(rect, RectF::from([25.0, 25.0, 65.0, 55.0]))
        }
        g => panic!("rectangle expected, got {g:?}"),
    }
    // the opposite corner stays, the rectangle shrinks
    drag(&mut ctl, (65.0, 55.0), (45.0, 35.0), 3.0);
    match last_geo(&ctl) {
        GeoFig::Rectangle { rect, calib } => {
            assert_eq!(rect, RectF::from([25.0, 25.0, 45.0, 35.0]));
            assert_eq!(calib.mm_per_px, 1.0);
        }
        g => panic!("rectangle expected, got {g:?}"),
    }
    assert_eq!(ctl.store().len(), 1);
}

#[test]
fn test_snap() {
    let mut ctl = controller();
    ctl.set_snap(true);
    assert_eq!(ctl.snap(PtF::new(12.0, 8.0)), PtF::new(10.0, 10.0));
    assert_eq!(ctl.snap(PtF::new(100.0, 50.0)), PtF::new(100.0, 50.0));
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 12.0, 8.0, 0.0);
    assert_eq!(ctl.selected_points(), &[PtF::new(10.0, 10.0)]);
    ctl.set_snap(false);
    assert_eq!(ctl.snap(PtF::new(12.0, 8.0)), PtF::new(12.0, 8.0));
}

#[test]
fn test_keys_and_focus() {
    let mut ctl = controller();
    ctl.handle_input(
        &InputEvent::KeyPressed(KeyCode::Key2, Modifiers::default()),
        true,
    );
    assert_eq!(ctl.options().mode, Mode::Select);
    press(&mut ctl, KeyCode::Key2);
    assert_eq!(ctl.options().mode, Mode::Segment);

    press(&mut ctl, KeyCode::PlusEquals);
    assert!(floats_close(ctl.viewport().k(), 1.2));
    press(&mut ctl, KeyCode::Minus);
    assert!(floats_close(ctl.viewport().k(), 1.0));
    press(&mut ctl, KeyCode::PlusEquals);
    press(&mut ctl, KeyCode::F);
    assert!(floats_close(ctl.viewport().k(), 1.0));

    // held space pans, the release is seen even with focus elsewhere
    press(&mut ctl, KeyCode::Space);
    ctl.handle_input(&InputEvent::PointerDown(ptr(50.0, 50.0, 0.0)), false);
    assert_eq!(ctl.state().gesture, GestureState::Panning);
    ctl.handle_input(&InputEvent::PointerMove(ptr(70.0, 60.0, 0.1)), false);
    ctl.handle_input(&InputEvent::PointerUp(ptr(70.0, 60.0, 0.2)), false);
    assert_eq!(ctl.viewport().pan(), PtF::new(20.0, 10.0));
    assert_eq!(ctl.state().n_in_progress, 0);
    ctl.handle_input(
        &InputEvent::KeyReleased(KeyCode::Space, Modifiers::default()),
        true,
    );
    click(&mut ctl, 50.0, 50.0, 1.0);
    assert_eq!(ctl.state().n_in_progress, 1);
}

#[test]
fn test_pan_mode_wheel_pinch() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Pan);
    click(&mut ctl, 50.0, 50.0, 0.0);
    assert!(ctl.store().is_empty());

    ctl.handle_input(
        &InputEvent::Wheel(WheelInput {
            pos: PtF::new(100.0, 50.0),
            delta_y: -3.0,
        }),
        false,
    );
    assert!(floats_close(ctl.viewport().k(), 1.1));
    let c = ctl.viewport().image_to_canvas(PtF::new(100.0, 50.0));
    assert!(c.is_close_to(PtF::new(100.0, 50.0)));

    ctl.reset_view();
    ctl.set_mode(Mode::Select);
    let p1 = PointerInput::new(1, PtF::new(40.0, 50.0));
    let p2 = PointerInput::new(2, PtF::new(60.0, 50.0));
    ctl.handle_input(&InputEvent::PointerDown(p1), false);
    ctl.handle_input(&InputEvent::PointerDown(p2), false);
    assert_eq!(ctl.state().gesture, GestureState::Pinching);
    ctl.handle_input(
        &InputEvent::PointerMove(PointerInput::new(2, PtF::new(80.0, 50.0))),
        false,
    );
    assert!(floats_close(ctl.viewport().k(), 2.0));
    ctl.handle_input(&InputEvent::PointerUp(p1), false);
    ctl.handle_input(&InputEvent::PointerCancel(p2), false);
    assert_eq!(ctl.state().gesture, GestureState::Idle);
    assert!(ctl.store().is_empty());
}

#[test]
fn test_redraw_coalescing() {
    let mut ctl = controller();
    assert!(ctl.take_redraw_request());
    assert!(!ctl.take_redraw_request());
    ctl.set_snap(true);
    ctl.set_units(Unit::Inch);
    ctl.set_show_grid(true);
    assert!(ctl.take_redraw_request());
    assert!(!ctl.take_redraw_request());
    // hovering without anything in progress does not redraw
    ctl.handle_input(
        &InputEvent::PointerMove(PointerInput::new(7, PtF::new(100.0, 50.0))),
        false,
    );
    assert!(!ctl.take_redraw_request());
    assert_eq!(ctl.hover(), Some(PtF::new(100.0, 50.0)));
}

#[test]
fn test_state_kpi() {
    let mut ctl = controller();
    assert_eq!(
        ctl.state().kpi(),
        "Scale: 1000.00 µm/px | 1.000000 mm/px | Zoom: 100% | Snap: off | Annotations: 0"
    );
    ctl.set_units(Unit::Cm);
    ctl.set_snap(true);
    ctl.set_zoom(2.0);
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 10.0, 10.0, 0.0);
    click(&mut ctl, 13.0, 14.0, 1.0);
    let state = ctl.state();
    assert_eq!(state.units, Unit::Cm);
    assert!(floats_close(state.zoom_percent, 200.0));
    assert_eq!(state.n_annotations, 1);
    assert!(state.kpi().ends_with("Zoom: 200% | Snap: on | Annotations: 1"));
}

#[test]
fn test_scenes() {
    let mut ctl = controller();
    ctl.resize(ShapeF::new(100.0, 60.0), Insets::uniform(5.0), 2.0);
    ctl.set_mode(Mode::Segment);
    click(&mut ctl, 10.0, 10.0, 0.0);
    let live = ctl.live_scene();
    assert_eq!(live.canvas, (180, 100));
    assert!(live.preview.is_some());
    assert!(live.background);
    let export = ctl.export_scene();
    assert_eq!(export.canvas, (200, 100));
    assert!(export.preview.is_none());
    assert_eq!(export.k, 1.0);
    assert!(!export.background);
}
