use cmlib::{
    ExportPayload, GeoFig, Mode, OverlayController, Renderer, Unit,
    calibration::parse_calibration,
    cfg::OverlayCfg,
    domain::{PtF, ShapeF},
    events::{InputEvent, PointerInput},
    export::{encode_png, export_raster, import_annotations},
    measure::label,
    viewport::Insets,
};
use image::{Rgba, RgbaImage};

const CALIBRATION: &str = r#"{
    "plate_07.png": {
        "image_size": {"width": 400, "height": 200},
        "marker_size_mm": 10.0,
        "markers": [
            {"id": 3, "corners": [{"x": 10, "y": 10}, {"x": 30, "y": 10}, {"x": 30, "y": 30}, {"x": 10, "y": 30}], "mm_per_px": 0.5},
            {"id": "far", "corners": [{"x": 370, "y": 170}, {"x": 390, "y": 170}, {"x": 390, "y": 190}, {"x": 370, "y": 190}], "mm_per_px": 0.25},
            {"corners": [{"x": 200, "y": 100}]}
        ]
    }
}"#;

fn controller() -> OverlayController {
    let calibration = parse_calibration(CALIBRATION, Some("plate_07.png")).unwrap();
    let image = RgbaImage::from_pixel(400, 200, Rgba([90, 90, 90, 255]));
    let mut ctl = OverlayController::new(
        image,
        "https://lab.example/plate_07.png",
        calibration,
        &OverlayCfg::default(),
    );
    // css box of 210x110 with 5px border at device pixel ratio 2 gives a 400x200 canvas,
    // fitting shows the image at zoom 1
    ctl.resize(ShapeF::new(210.0, 110.0), Insets::uniform(5.0), 2.0);
    ctl
}

/// css position relative to the outer box of the image pixel `(x, y)` at zoom 1
fn css(x: f64, y: f64) -> PtF {
    PtF::new(x / 2.0 + 5.0, y / 2.0 + 5.0)
}

fn tap(ctl: &mut OverlayController, x: f64, y: f64, t: f64) {
    let down = PointerInput::new(0, css(x, y)).time(t);
    ctl.handle_input(&InputEvent::PointerDown(down), false);
    ctl.handle_input(&InputEvent::PointerUp(down.time(t + 0.05)), false);
}

#[test]
fn test_measure_session() {
    let mut ctl = controller();
    assert!((ctl.viewport().k() - 1.0).abs() < 1e-12);
    assert_eq!(ctl.calibration().markers.len(), 3);
    assert_eq!(ctl.calibration().usable_markers().count(), 2);

    ctl.set_mode(Mode::Segment);
    tap(&mut ctl, 40.0, 40.0, 0.0);
    tap(&mut ctl, 100.0, 120.0, 1.0);
    ctl.set_mode(Mode::Rectangle);
    tap(&mut ctl, 300.0, 140.0, 2.0);
    tap(&mut ctl, 340.0, 160.0, 3.0);

    let items = ctl.store().items();
    assert_eq!(items.len(), 2);
    // 100 px at 0.5 mm/px
    assert_eq!(label(&items[0].geo, Unit::Mm), "50.000 mm");
    assert_eq!(label(&items[0].geo, Unit::Cm), "5.000 cm");
    // 40x20 px at 0.25 mm/px
    assert_eq!(
        label(&items[1].geo, Unit::Mm),
        "10.000×5.000 mm • A 50.0 mm²"
    );
    match &items[1].geo {
        GeoFig::Rectangle { calib, .. } => assert_eq!(calib.marker_id.as_ref().map(|m| m.to_string()), Some("far".to_string())),
        g => panic!("rectangle expected, got {g:?}"),
    }
}

#[test]
fn test_export_and_reimport() {
    let mut ctl = controller();
    ctl.set_mode(Mode::Angle);
    tap(&mut ctl, 100.0, 50.0, 0.0);
    tap(&mut ctl, 100.0, 100.0, 1.0);
    tap(&mut ctl, 150.0, 100.0, 2.0);
    ctl.set_mode(Mode::Note);
    tap(&mut ctl, 200.0, 20.0, 3.0);
    ctl.set_units(Unit::Inch);

    let payload = ExportPayload::from_controller(&ctl);
    assert_eq!(payload.image, "https://lab.example/plate_07.png");
    assert_eq!(payload.units, Unit::Inch);
    assert_eq!(payload.calibration.marker_size_mm, Some(10.0));
    let json = payload.to_json().unwrap();
    assert!(json.contains("\"type\": \"angle\""));
    assert!(json.contains("\"markerId\": 3"));

    let mut renderer = Renderer::new(None);
    let raster = export_raster(&ctl, &mut renderer).unwrap();
    assert_eq!(raster.dimensions(), (400, 200));
    let png = encode_png(&raster).unwrap();
    assert_eq!(&png[1..4], b"PNG");

    let mut other = controller();
    assert_eq!(import_annotations(&mut other, &json).unwrap(), 2);
    assert_eq!(other.store().items(), ctl.store().items());
}
