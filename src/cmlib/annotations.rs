use crate::{
    calibration::MarkerId,
    domain::{PtF, RectF, TPtF, dist_lineseg_point},
    units::Unit,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub type AnnotationId = u64;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnnoKind {
    Segment,
    Polyline,
    Rectangle,
    Angle,
    Note,
}
impl AnnoKind {
    pub const ALL: [AnnoKind; 5] = [
        AnnoKind::Segment,
        AnnoKind::Polyline,
        AnnoKind::Rectangle,
        AnnoKind::Angle,
        AnnoKind::Note,
    ];
    pub fn name(self) -> &'static str {
        match self {
            AnnoKind::Segment => "segment",
            AnnoKind::Polyline => "polyline",
            AnnoKind::Rectangle => "rectangle",
            AnnoKind::Angle => "angle",
            AnnoKind::Note => "note",
        }
    }
}

/// Which annotations are shown, hit-tested, and exported with the visible-only filter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Visibility {
    pub annotations: bool,
    hidden: Vec<AnnoKind>,
}
impl Default for Visibility {
    fn default() -> Self {
        Visibility {
            annotations: true,
            hidden: vec![],
        }
    }
}
impl Visibility {
    pub fn is_kind_visible(&self, kind: AnnoKind) -> bool {
        !self.hidden.contains(&kind)
    }
    pub fn set_kind_visible(&mut self, kind: AnnoKind, visible: bool) {
        self.hidden.retain(|k| *k != kind);
        if !visible {
            self.hidden.push(kind);
        }
    }
    pub fn shows(&self, anno: &Annotation) -> bool {
        self.annotations && self.is_kind_visible(anno.geo.kind())
    }
}

/// Scale related data frozen at creation time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Calib {
    pub mm_per_px: f64,
    pub units: Unit,
    #[serde(rename = "markerId", default)]
    pub marker_id: Option<MarkerId>,
}

/// Geometry of an annotation in image space.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeoFig {
    Segment {
        a: PtF,
        b: PtF,
        #[serde(flatten)]
        calib: Calib,
    },
    Polyline {
        pts: Vec<PtF>,
        #[serde(flatten)]
        calib: Calib,
    },
    Rectangle {
        rect: RectF,
        #[serde(flatten)]
        calib: Calib,
    },
    /// `v` is the vertex.
    Angle {
        a: PtF,
        v: PtF,
        b: PtF,
        #[serde(flatten)]
        calib: Calib,
    },
    Note {
        p: PtF,
        text: String,
    },
}
impl GeoFig {
    pub fn kind(&self) -> AnnoKind {
        match self {
            GeoFig::Segment { .. } => AnnoKind::Segment,
            GeoFig::Polyline { .. } => AnnoKind::Polyline,
            GeoFig::Rectangle { .. } => AnnoKind::Rectangle,
            GeoFig::Angle { .. } => AnnoKind::Angle,
            GeoFig::Note { .. } => AnnoKind::Note,
        }
    }
    pub fn calib(&self) -> Option<&Calib> {
        match self {
            GeoFig::Segment { calib, .. }
            | GeoFig::Polyline { calib, .. }
            | GeoFig::Rectangle { calib, .. }
            | GeoFig::Angle { calib, .. } => Some(calib),
            GeoFig::Note { .. } => None,
        }
    }
    /// Smallest distance between the figure's edges, rays, or anchor and `p`.
    pub fn dist_to(&self, p: PtF) -> TPtF {
        match self {
            GeoFig::Segment { a, b, .. } => dist_lineseg_point(&(*a, *b), p),
            GeoFig::Polyline { pts, .. } => pts
                .windows(2)
                .map(|w| dist_lineseg_point(&(w[0], w[1]), p))
                .fold(TPtF::INFINITY, TPtF::min),
            GeoFig::Rectangle { rect, .. } => rect
                .edges()
                .iter()
                .map(|e| dist_lineseg_point(e, p))
                .fold(TPtF::INFINITY, TPtF::min),
            GeoFig::Angle { a, v, b, .. } => {
                dist_lineseg_point(&(*v, *a), p).min(dist_lineseg_point(&(*v, *b), p))
            }
            GeoFig::Note { p: anchor, .. } => anchor.dist(&p),
        }
    }
    pub fn translate(&mut self, d: PtF) {
        match self {
            GeoFig::Segment { a, b, .. } => {
                *a = *a + d;
                *b = *b + d;
            }
            GeoFig::Polyline { pts, .. } => {
                for p in pts.iter_mut() {
                    *p = *p + d;
                }
            }
            GeoFig::Rectangle { rect, .. } => *rect = rect.translate(d),
            GeoFig::Angle { a, v, b, .. } => {
                *a = *a + d;
                *v = *v + d;
                *b = *b + d;
            }
            GeoFig::Note { p, .. } => *p = *p + d,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    #[serde(flatten)]
    pub geo: GeoFig,
}

/// Ordered annotations of one image, at most one of them is selected.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationStore {
    items: Vec<Annotation>,
    selected_id: Option<AnnotationId>,
    /// In image units.
    hit_tol: TPtF,
    next_id: AnnotationId,
}
impl Default for AnnotationStore {
    fn default() -> Self {
        AnnotationStore {
            items: vec![],
            selected_id: None,
            hit_tol: 24.0,
            next_id: 1,
        }
    }
}
impl AnnotationStore {
    pub fn items(&self) -> &[Annotation] {
        &self.items
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn selected_id(&self) -> Option<AnnotationId> {
        self.selected_id
    }
    pub fn selected(&self) -> Option<&Annotation> {
        self.selected_id.and_then(|id| self.get(id))
    }
    pub fn hit_tol(&self) -> TPtF {
        self.hit_tol
    }
    pub fn set_hit_tol(&mut self, hit_tol: TPtF) {
        if hit_tol.is_finite() && hit_tol > 0.0 {
            self.hit_tol = hit_tol;
        }
    }
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.items.iter().find(|a| a.id == id)
    }
    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.items.iter_mut().find(|a| a.id == id)
    }
    /// Unknown ids clear the selection.
    pub fn select(&mut self, id: Option<AnnotationId>) {
        self.selected_id = id.filter(|id| self.get(*id).is_some());
    }

    fn push(&mut self, geo: GeoFig) -> AnnotationId {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        debug!("adding {} with id {id}", geo.kind().name());
        self.items.push(Annotation { id, geo });
        self.selected_id = Some(id);
        id
    }
    pub fn add_segment(&mut self, a: PtF, b: PtF, calib: Calib) -> AnnotationId {
        self.push(GeoFig::Segment { a, b, calib })
    }
    /// Polylines need at least two points.
    pub fn add_polyline(&mut self, pts: Vec<PtF>, calib: Calib) -> Option<AnnotationId> {
        if pts.len() < 2 {
            None
        } else {
            Some(self.push(GeoFig::Polyline { pts, calib }))
        }
    }
    pub fn add_rectangle(&mut self, p1: PtF, p2: PtF, calib: Calib) -> AnnotationId {
        self.push(GeoFig::Rectangle {
            rect: RectF::from_corners(p1, p2),
            calib,
        })
    }
    pub fn add_angle(&mut self, a: PtF, v: PtF, b: PtF, calib: Calib) -> AnnotationId {
        self.push(GeoFig::Angle { a, v, b, calib })
    }
    pub fn add_note(&mut self, p: PtF, text: &str) -> AnnotationId {
        self.push(GeoFig::Note {
            p,
            text: text.to_string(),
        })
    }
    /// Re-imports an annotation keeping its id. Colliding ids get a fresh one.
    pub fn insert(&mut self, mut anno: Annotation) -> AnnotationId {
        if anno.id == 0 || anno.id == AnnotationId::MAX || self.get(anno.id).is_some() {
            anno.id = self.next_id;
        }
        self.next_id = self.next_id.max(anno.id.saturating_add(1));
        let id = anno.id;
        self.items.push(anno);
        id
    }

    /// Closest annotation accepted by `is_candidate` with distance strictly below `tol`.
    pub fn hit_test_with(
        &self,
        p: PtF,
        tol: TPtF,
        is_candidate: impl Fn(&Annotation) -> bool,
    ) -> Option<AnnotationId> {
        let mut best_d = tol;
        let mut best = None;
        for anno in self.items.iter().filter(|a| is_candidate(a)) {
            let d = anno.geo.dist_to(p);
            if d < best_d {
                best_d = d;
                best = Some(anno.id);
            }
        }
        best
    }
    pub fn hit_test(&self, p: PtF) -> Option<AnnotationId> {
        self.hit_test_with(p, self.hit_tol, |_| true)
    }

    pub fn remove(&mut self, id: AnnotationId) -> bool {
        let n_before = self.items.len();
        self.items.retain(|a| a.id != id);
        if self.selected_id == Some(id) {
            self.selected_id = None;
        }
        n_before != self.items.len()
    }
    pub fn remove_selected(&mut self) -> bool {
        match self.selected_id {
            Some(id) => self.remove(id),
            None => false,
        }
    }
    /// Ids are not reused afterwards.
    pub fn clear(&mut self) {
        info!("clearing {} annotations", self.items.len());
        self.items.clear();
        self.selected_id = None;
    }
}

#[cfg(test)]
fn calib1() -> Calib {
    Calib {
        mm_per_px: 1.0,
        units: Unit::Mm,
        marker_id: None,
    }
}

#[test]
fn test_ids_and_selection() {
    let mut store = AnnotationStore::default();
    let id1 = store.add_segment(PtF::new(0.0, 0.0), PtF::new(3.0, 4.0), calib1());
    let id2 = store.add_note(PtF::new(1.0, 1.0), "hello");
    assert!(id2 > id1);
    assert_eq!(store.selected_id(), Some(id2));
    assert!(store.add_polyline(vec![PtF::new(1.0, 1.0)], calib1()).is_none());
    assert_eq!(store.len(), 2);
    assert!(store.remove(id2));
    assert_eq!(store.selected_id(), None);
    assert!(!store.remove(id2));
    assert!(!store.remove_selected());
    store.clear();
    let id3 = store.add_note(PtF::new(1.0, 1.0), "again");
    assert!(id3 > id2);
    store.select(Some(12345));
    assert_eq!(store.selected_id(), None);
}

#[test]
fn test_rectangle_normalized() {
    let mut store = AnnotationStore::default();
    let id = store.add_rectangle(PtF::new(5.0, 9.0), PtF::new(1.0, 2.0), calib1());
    match &store.get(id).map(|a| &a.geo) {
        Some(GeoFig::Rectangle { rect, .. }) => {
            assert_eq!(*rect, RectF::from([1.0, 2.0, 5.0, 9.0]))
        }
        _ => panic!("expected rectangle"),
    }
}

#[test]
fn test_hit_test() {
    let mut store = AnnotationStore::default();
    let seg = store.add_segment(PtF::new(0.0, 0.0), PtF::new(100.0, 0.0), calib1());
    let rect = store.add_rectangle(PtF::new(0.0, 20.0), PtF::new(50.0, 60.0), calib1());
    let ang = store.add_angle(
        PtF::new(200.0, 0.0),
        PtF::new(200.0, 100.0),
        PtF::new(300.0, 100.0),
        calib1(),
    );
    let note = store.add_note(PtF::new(400.0, 400.0), "n");
    store.set_hit_tol(5.0);
    assert_eq!(store.hit_test(PtF::new(50.0, 0.0)), Some(seg));
    assert_eq!(store.hit_test(PtF::new(50.0, 6.0)), None);
    assert_eq!(store.hit_test(PtF::new(50.0, 5.0)), None);
    // closer one wins
    assert_eq!(store.hit_test(PtF::new(10.0, 17.0)), Some(rect));
    assert_eq!(store.hit_test(PtF::new(10.0, 3.0)), Some(seg));
    // inside a rectangle only edges count
    assert_eq!(store.hit_test(PtF::new(25.0, 40.0)), None);
    assert_eq!(store.hit_test(PtF::new(250.0, 102.0)), Some(ang));
    assert_eq!(store.hit_test(PtF::new(402.0, 401.0)), Some(note));
    let not_seg = store.hit_test_with(PtF::new(50.0, 0.0), 5.0, |a| a.id != seg);
    assert_eq!(not_seg, None);
}

#[test]
fn test_visibility() {
    let mut store = AnnotationStore::default();
    store.add_note(PtF::new(0.0, 0.0), "n");
    store.add_segment(PtF::new(0.0, 0.0), PtF::new(1.0, 0.0), calib1());
    let mut vis = Visibility::default();
    vis.set_kind_visible(AnnoKind::Note, false);
    assert!(!vis.shows(&store.items()[0]));
    assert!(vis.shows(&store.items()[1]));
    vis.set_kind_visible(AnnoKind::Note, true);
    assert!(vis.shows(&store.items()[0]));
    vis.annotations = false;
    assert!(!vis.shows(&store.items()[1]));
}

#[test]
fn test_json_shape() -> Result<(), serde_json::Error> {
    let mut store = AnnotationStore::default();
    store.add_segment(PtF::new(0.0, 0.0), PtF::new(3.0, 4.0), calib1());
    let v = serde_json::to_value(&store.items()[0])?;
    assert_eq!(v["type"], "segment");
    assert_eq!(v["id"], 1);
    assert_eq!(v["a"], serde_json::json!([0.0, 0.0]));
    assert_eq!(v["units"], "mm");
    assert!(v["markerId"].is_null());
    let back: Annotation = serde_json::from_value(v)?;
    assert_eq!(&back, &store.items()[0]);
    let mut other = AnnotationStore::default();
    other.add_note(PtF::new(0.0, 0.0), "x");
    let id = other.insert(back);
    assert_eq!(id, 2);
    assert_eq!(other.add_note(PtF::new(0.0, 0.0), "y"), 3);
    Ok(())
}
