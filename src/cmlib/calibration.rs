//! Fiducial markers and the calibration document they come with. Marker detection happens
//! elsewhere, we only read its output.
use crate::{
    cmerr,
    domain::{PtF, TPtF, centroid},
    result::{CmResult, to_cm, trace_ok_warn},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum MarkerId {
    Int(i64),
    Str(String),
}
impl MarkerId {
    /// `3` and `"3"` refer to the same marker.
    pub fn same_as(&self, other: &MarkerId) -> bool {
        self.to_string() == other.to_string()
    }
}
impl Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerId::Int(i) => write!(f, "{i}"),
            MarkerId::Str(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Corner {
    pub x: TPtF,
    pub y: TPtF,
}
impl From<Corner> for PtF {
    fn from(c: Corner) -> Self {
        PtF::new(c.x, c.y)
    }
}
impl From<PtF> for Corner {
    fn from(p: PtF) -> Self {
        Corner { x: p.x, y: p.y }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Marker {
    #[serde(default)]
    pub id: Option<MarkerId>,
    #[serde(default)]
    pub corners: Vec<Corner>,
    #[serde(default)]
    pub mm_per_px: Option<f64>,
}
impl Marker {
    pub fn corner_points(&self) -> Vec<PtF> {
        self.corners.iter().map(|c| PtF::from(*c)).collect()
    }
    /// Finite positive scale, if any.
    pub fn scale(&self) -> Option<f64> {
        self.mm_per_px.filter(|s| s.is_finite() && *s > 0.0)
    }
    /// Markers with less than four corners or without scale still render but do not take
    /// part in scale resolution.
    pub fn is_usable(&self) -> bool {
        self.corners.len() >= 4 && self.scale().is_some()
    }
    pub fn centroid(&self) -> Option<PtF> {
        centroid(&self.corner_points())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct CalibrationData {
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub image_size: Option<ImageSize>,
    #[serde(default)]
    pub marker_size_mm: Option<f64>,
    #[serde(default)]
    pub mm_per_px: Option<f64>,
    #[serde(default)]
    pub pixels_per_mm: Option<f64>,
}
impl CalibrationData {
    pub fn empty(image_size: Option<ImageSize>) -> Self {
        CalibrationData {
            image_size,
            ..Default::default()
        }
    }
    fn assign_missing_ids(&mut self) {
        for (i, m) in self.markers.iter_mut().enumerate() {
            if m.id.is_none() {
                m.id = Some(MarkerId::Int(i as i64 + 1));
            }
        }
    }
    pub fn usable_markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(|m| m.is_usable())
    }
    pub fn find_marker(&self, id: &MarkerId) -> Option<&Marker> {
        self.markers
            .iter()
            .find(|m| m.id.as_ref().is_some_and(|mid| mid.same_as(id)))
    }
    /// Usable marker whose corner centroid is closest to `p`, first in order on ties.
    pub fn nearest_usable_marker(&self, p: PtF) -> Option<&Marker> {
        let mut best: Option<(&Marker, f64)> = None;
        for m in self.usable_markers() {
            if let Some(c) = m.centroid() {
                let d = c.dist_square(&p);
                if best.is_none_or(|(_, best_d)| d < best_d) {
                    best = Some((m, d));
                }
            }
        }
        best.map(|(m, _)| m)
    }
    pub fn corners_iter(&self) -> impl Iterator<Item = PtF> + '_ {
        self.markers
            .iter()
            .flat_map(|m| m.corners.iter().map(|c| PtF::from(*c)))
    }
}

fn select_entry(raw: Value, image_name: Option<&str>) -> CmResult<Value> {
    match raw {
        Value::Object(mut map) => {
            if map.contains_key("markers") {
                Ok(Value::Object(map))
            } else if let Some(entry) = image_name.and_then(|name| map.remove(name)) {
                Ok(entry)
            } else {
                map.into_iter()
                    .map(|(_, v)| v)
                    .find(Value::is_object)
                    .ok_or_else(|| cmerr!("calibration document contains no calibration entry"))
            }
        }
        _ => Err(cmerr!("calibration document is not a json object")),
    }
}

/// Parses either a calibration object or a map from image file names to calibration objects.
pub fn parse_calibration(json: &str, image_name: Option<&str>) -> CmResult<CalibrationData> {
    let raw: Value = serde_json::from_str(json).map_err(to_cm)?;
    let entry = select_entry(raw, image_name)?;
    let mut data: CalibrationData = serde_json::from_value(entry).map_err(to_cm)?;
    data.assign_missing_ids();
    Ok(data)
}

/// Never fails, broken documents lead to the empty default and a warning.
pub fn calibration_or_default(
    json: &str,
    image_name: Option<&str>,
    image_size: Option<ImageSize>,
) -> CalibrationData {
    let mut data = trace_ok_warn(parse_calibration(json, image_name))
        .unwrap_or_else(|| CalibrationData::empty(image_size));
    if data.image_size.is_none() {
        data.image_size = image_size;
    }
    data
}

#[cfg(test)]
pub(crate) fn square_marker(id: i64, x: f64, y: f64, size: f64, mm_per_px: f64) -> Marker {
    Marker {
        id: Some(MarkerId::Int(id)),
        corners: vec![
            Corner { x, y },
            Corner { x: x + size, y },
            Corner {
                x: x + size,
                y: y + size,
            },
            Corner { x, y: y + size },
        ],
        mm_per_px: Some(mm_per_px),
    }
}

#[test]
fn test_parse_direct() -> CmResult<()> {
    let json = r#"{
        "markers": [
            {"id": 7, "corners": [{"x":0,"y":0},{"x":10,"y":0},{"x":10,"y":10},{"x":0,"y":10}], "mm_per_px": 0.5},
            {"corners": [{"x":50,"y":50}], "mm_per_px": 0.2},
            {"id": "abc", "corners": [{"x":0,"y":0},{"x":1,"y":0},{"x":1,"y":1},{"x":0,"y":1}], "mm_per_px": null}
        ],
        "image_size": {"width": 640, "height": 480},
        "marker_size_mm": 5.0
    }"#;
    let data = parse_calibration(json, None)?;
    assert_eq!(data.markers.len(), 3);
    assert_eq!(data.markers[1].id, Some(MarkerId::Int(2)));
    assert_eq!(data.usable_markers().count(), 1);
    assert_eq!(
        data.image_size,
        Some(ImageSize {
            width: 640,
            height: 480
        })
    );
    assert!(data.find_marker(&MarkerId::Str("7".into())).is_some());
    assert!(data.find_marker(&MarkerId::Str("abc".into())).is_some());
    assert!(data.find_marker(&MarkerId::Int(99)).is_none());
    assert_eq!(data.corners_iter().count(), 9);
    Ok(())
}

#[test]
fn test_parse_keyed() -> CmResult<()> {
    let json = r#"{
        "a.png": {"markers": [{"id": 1, "corners": [], "mm_per_px": 1.0}]},
        "b.png": {"markers": [{"id": 2, "corners": [], "mm_per_px": 2.0}]}
    }"#;
    let data = parse_calibration(json, Some("b.png"))?;
    assert_eq!(data.markers[0].id, Some(MarkerId::Int(2)));
    let data = parse_calibration(json, Some("unknown.png"))?;
    assert_eq!(data.markers.len(), 1);
    Ok(())
}

#[test]
fn test_degrade() {
    let size = Some(ImageSize {
        width: 3,
        height: 4,
    });
    for broken in ["", "[1, 2]", "{\"a\": 1}", "{\"markers\": 5}", "not json"] {
        let data = calibration_or_default(broken, None, size);
        assert!(data.markers.is_empty());
        assert_eq!(data.image_size, size);
    }
}

#[test]
fn test_nearest() {
    let data = CalibrationData {
        markers: vec![
            square_marker(1, 0.0, 0.0, 10.0, 0.1),
            square_marker(2, 100.0, 0.0, 10.0, 0.2),
            Marker {
                id: Some(MarkerId::Int(3)),
                corners: vec![Corner { x: 90.0, y: 0.0 }],
                mm_per_px: Some(5.0),
            },
        ],
        ..Default::default()
    };
    let m = data.nearest_usable_marker(PtF::new(90.0, 5.0));
    assert_eq!(m.and_then(|m| m.scale()), Some(0.2));
    let m = data.nearest_usable_marker(PtF::new(-10.0, 5.0));
    assert_eq!(m.and_then(|m| m.scale()), Some(0.1));
    assert!(CalibrationData::default().nearest_usable_marker(PtF::default()).is_none());
}
