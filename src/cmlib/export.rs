use crate::{
    annotations::Annotation,
    calibration::{CalibrationData, Marker},
    cmerr,
    control::OverlayController,
    file_util,
    render::Renderer,
    result::{CmResult, to_cm},
    units::Unit,
};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::{io::Cursor, path::Path};
use tracing::info;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ExportCalibration {
    pub marker_size_mm: Option<f64>,
    pub mm_per_px: Option<f64>,
    pub pixels_per_mm: Option<f64>,
    pub markers: Vec<Marker>,
}
impl From<&CalibrationData> for ExportCalibration {
    fn from(c: &CalibrationData) -> Self {
        ExportCalibration {
            marker_size_mm: c.marker_size_mm,
            mm_per_px: c.mm_per_px,
            pixels_per_mm: c.pixels_per_mm,
            markers: c.markers.clone(),
        }
    }
}

/// Structured result of a measurement session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportPayload {
    pub image: String,
    pub calibration: ExportCalibration,
    pub annotations: Vec<Annotation>,
    pub units: Unit,
}
impl ExportPayload {
    pub fn from_controller(ctl: &OverlayController) -> Self {
        ExportPayload {
            image: ctl.image_source().to_string(),
            calibration: ctl.calibration().into(),
            annotations: ctl.store().items().to_vec(),
            units: ctl.options().style.units,
        }
    }
    pub fn to_json(&self) -> CmResult<String> {
        serde_json::to_string_pretty(self).map_err(to_cm)
    }
    pub fn from_json(json: &str) -> CmResult<Self> {
        serde_json::from_str(json).map_err(to_cm)
    }
}

/// Image at native resolution with everything drawn on top that the export options allow.
pub fn export_raster(ctl: &OverlayController, renderer: &mut Renderer) -> CmResult<RgbaImage> {
    renderer.render(&ctl.export_scene())
}

pub fn encode_png(image: &RgbaImage) -> CmResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(to_cm)?;
    Ok(buffer.into_inner())
}

pub fn write_png(ctl: &OverlayController, renderer: &mut Renderer, path: &Path) -> CmResult<()> {
    let raster = export_raster(ctl, renderer)?;
    file_util::write(path, encode_png(&raster)?)?;
    info!("exported annotated image to {path:?}");
    Ok(())
}

pub fn write_json(ctl: &OverlayController, path: &Path) -> CmResult<()> {
    let payload = ExportPayload::from_controller(ctl);
    file_util::write(path, payload.to_json()?)?;
    info!(
        "exported {} annotations to {path:?}",
        payload.annotations.len()
    );
    Ok(())
}

/// Adds annotations from an earlier export or from a bare list of annotations. Returns how
/// many were added.
pub fn import_annotations(ctl: &mut OverlayController, json: &str) -> CmResult<usize> {
    let annotations = match ExportPayload::from_json(json) {
        Ok(payload) => payload.annotations,
        Err(_) => serde_json::from_str::<Vec<Annotation>>(json)
            .map_err(|e| cmerr!("neither an export nor a list of annotations, {e:?}"))?,
    };
    let n = annotations.len();
    let store = ctl.store_mut();
    for anno in annotations {
        store.insert(anno);
    }
    info!("imported {n} annotations");
    Ok(n)
}

/// Default output names next to each other, e.g., `photo_annotated.png` and
/// `photo_annotations.json`.
pub fn default_export_names(image_source: &str) -> (String, String) {
    let base = file_util::basename(image_source);
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
    let stem = if stem.is_empty() { "image" } else { stem };
    (
        format!("{stem}_annotated.png"),
        format!("{stem}_annotations.json"),
    )
}

#[cfg(test)]
use crate::{
    annotations::AnnoKind, calibration::square_marker, cfg::OverlayCfg, defer_file_removal,
    domain::{PtF, ShapeF}, file_util::DEFAULT_TMPDIR,
};

#[cfg(test)]
fn controller() -> OverlayController {
    let image = RgbaImage::from_pixel(64, 48, image::Rgba([200, 200, 200, 255]));
    let calibration = CalibrationData {
        markers: vec![square_marker(4, 0.0, 0.0, 10.0, 0.5)],
        marker_size_mm: Some(5.0),
        ..Default::default()
    };
    let mut ctl = OverlayController::new(image, "dir/shot.png", calibration, &OverlayCfg::default());
    let store = ctl.store_mut();
    store.add_note(PtF::new(3.0, 3.0), "here");
    store.add_segment(
        PtF::new(0.0, 0.0),
        PtF::new(30.0, 40.0),
        crate::annotations::Calib {
            mm_per_px: 0.5,
            ..Default::default()
        },
    );
    ctl
}

#[test]
fn test_payload() -> CmResult<()> {
    let mut ctl = controller();
    ctl.set_units(Unit::Cm);
    let payload = ExportPayload::from_controller(&ctl);
    let json = payload.to_json()?;
    let v: serde_json::Value = serde_json::from_str(&json).map_err(to_cm)?;
    assert_eq!(v["image"], "dir/shot.png");
    assert_eq!(v["units"], "cm");
    assert_eq!(v["calibration"]["marker_size_mm"], 5.0);
    assert!(v["calibration"]["mm_per_px"].is_null());
    assert_eq!(v["calibration"]["markers"][0]["corners"][1]["x"], 10.0);
    assert_eq!(v["annotations"][0]["type"], "note");
    assert_eq!(v["annotations"][1]["type"], "segment");
    assert_eq!(v["annotations"][1]["mm_per_px"], 0.5);
    assert_eq!(ExportPayload::from_json(&json)?, payload);
    Ok(())
}

#[test]
fn test_raster_and_files() -> CmResult<()> {
    let mut ctl = controller();
    let mut renderer = Renderer::new(None);
    ctl.resize(ShapeF::new(10.0, 10.0), Default::default(), 2.0);
    let raster = export_raster(&ctl, &mut renderer)?;
    assert_eq!(raster.dimensions(), (64, 48));

    ctl.set_kind_visible(AnnoKind::Segment, false);
    assert_eq!(ctl.export_scene().annotations.len(), 1);
    ctl.set_export_visible_only(false);
    assert_eq!(ctl.export_scene().annotations.len(), 2);

    let folder = DEFAULT_TMPDIR.join("export_test");
    let png = folder.join("out.png");
    let json = folder.join("out.json");
    defer_file_removal!(&png);
    defer_file_removal!(&json);
    write_png(&ctl, &mut renderer, &png)?;
    write_json(&ctl, &json)?;
    let decoded = image::open(&png).map_err(to_cm)?;
    assert_eq!((decoded.width(), decoded.height()), (64, 48));
    let payload = ExportPayload::from_json(&file_util::read_to_string(&json)?)?;
    assert_eq!(payload.annotations.len(), 2);
    Ok(())
}

#[test]
fn test_import() -> CmResult<()> {
    let src = controller();
    let json = ExportPayload::from_controller(&src).to_json()?;
    let mut dst = controller();
    assert_eq!(import_annotations(&mut dst, &json)?, 2);
    assert_eq!(dst.store().len(), 4);
    let ids: Vec<_> = dst.store().items().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let bare = r#"[{"id": 9, "type": "note", "p": [1.0, 2.0], "text": "t"}]"#;
    assert_eq!(import_annotations(&mut dst, bare)?, 1);
    assert_eq!(dst.store().items().last().map(|a| a.id), Some(9));
    assert!(import_annotations(&mut dst, "{}").is_err());

    // the largest id leaves no room for a successor and gets a fresh one
    let huge = r#"[{"id": 18446744073709551615, "type": "note", "p": [3.0, 4.0], "text": "h"}]"#;
    assert_eq!(import_annotations(&mut dst, huge)?, 1);
    assert_eq!(dst.store().items().last().map(|a| a.id), Some(10));
    let almost = r#"[{"id": 18446744073709551614, "type": "note", "p": [5.0, 6.0], "text": "a"}]"#;
    assert_eq!(import_annotations(&mut dst, almost)?, 1);
    let id = dst.store_mut().add_note(PtF::new(7.0, 8.0), "after");
    assert_eq!(id, u64::MAX);
    assert_eq!(dst.store().len(), 8);
    Ok(())
}

#[test]
fn test_default_names() {
    assert_eq!(
        default_export_names("https://x/y/photo.final.jpg"),
        (
            "photo.final_annotated.png".to_string(),
            "photo.final_annotations.json".to_string()
        )
    );
    assert_eq!(default_export_names("").0, "image_annotated.png");
}
