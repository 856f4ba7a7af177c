//! The overlay controller owns the viewport, the annotation store, and everything that is
//! in progress. Frontends feed it input events and commands, read its state snapshot, and
//! render whenever a redraw was requested.
mod drag;

pub use drag::{DragHandle, DragKind};

use crate::{
    annotations::{AnnoKind, AnnotationId, AnnotationStore, Calib, Visibility},
    calibration::{CalibrationData, MarkerId},
    cfg::OverlayCfg,
    domain::{PtF, ShapeF, TPtF},
    events::{InputEvent, KeyCode, Modifiers, PointerInput},
    gestures::{Gesture, GestureRecognizer, GestureState},
    measure::scale_label,
    render::{Preview, Scene, Style},
    units::Unit,
    viewport::{Insets, Viewport, ZoomLimits},
};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Pan,
    #[default]
    Select,
    Segment,
    Polyline,
    Rectangle,
    Angle,
    Note,
}
impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Pan,
        Mode::Select,
        Mode::Segment,
        Mode::Polyline,
        Mode::Rectangle,
        Mode::Angle,
        Mode::Note,
    ];
    pub fn name(self) -> &'static str {
        match self {
            Mode::Pan => "Pan",
            Mode::Select => "Select",
            Mode::Segment => "Segment",
            Mode::Polyline => "Polyline",
            Mode::Rectangle => "Rectangle",
            Mode::Angle => "Angle",
            Mode::Note => "Note",
        }
    }
    pub fn from_key(key: KeyCode) -> Option<Mode> {
        match key {
            KeyCode::Key0 => Some(Mode::Pan),
            KeyCode::Key1 => Some(Mode::Select),
            KeyCode::Key2 => Some(Mode::Segment),
            KeyCode::Key3 => Some(Mode::Polyline),
            KeyCode::Key4 => Some(Mode::Rectangle),
            KeyCode::Key5 => Some(Mode::Angle),
            KeyCode::Key6 => Some(Mode::Note),
            _ => None,
        }
    }
    /// Number of clicks after which the figure is committed automatically.
    fn n_points(self) -> Option<usize> {
        match self {
            Mode::Segment | Mode::Rectangle => Some(2),
            Mode::Angle => Some(3),
            _ => None,
        }
    }
    fn drawn_kind(self) -> Option<AnnoKind> {
        match self {
            Mode::Segment => Some(AnnoKind::Segment),
            Mode::Polyline => Some(AnnoKind::Polyline),
            Mode::Rectangle => Some(AnnoKind::Rectangle),
            Mode::Angle => Some(AnnoKind::Angle),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayOptions {
    pub mode: Mode,
    pub style: Style,
    pub snap: bool,
    pub snap_px: TPtF,
    pub hit_tol_px: TPtF,
    pub zoom_step: TPtF,
    pub double_tap_s: f64,
    pub lock_marker: Option<MarkerId>,
    pub export_visible_only: bool,
    pub note_text: String,
}
impl OverlayOptions {
    pub fn from_cfg(cfg: &OverlayCfg) -> Self {
        OverlayOptions {
            mode: Mode::default(),
            style: Style {
                label_scale: cfg.label_scale,
                line_px: cfg.line_px,
                units: cfg.units,
                show_grid: cfg.show_grid,
                show_markers: cfg.show_markers,
                visibility: Visibility::default(),
            },
            snap: cfg.snap,
            snap_px: cfg.snap_px,
            hit_tol_px: cfg.hit_tol_px,
            zoom_step: if cfg.zoom_step > 1.0 { cfg.zoom_step } else { 1.2 },
            double_tap_s: cfg.double_tap_ms as f64 / 1000.0,
            lock_marker: None,
            export_visible_only: cfg.export_visible_only,
            note_text: cfg.note_text.clone(),
        }
    }
}

/// Read-only snapshot for toolbars and status lines.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayState {
    pub mode: Mode,
    pub units: Unit,
    pub zoom_percent: TPtF,
    pub mm_per_px: TPtF,
    pub scale_marker: Option<MarkerId>,
    pub n_annotations: usize,
    pub selected_id: Option<AnnotationId>,
    pub n_in_progress: usize,
    pub snap: bool,
    pub can_undo: bool,
    pub can_delete: bool,
    pub can_finish_polyline: bool,
    pub gesture: GestureState,
}
impl OverlayState {
    pub fn kpi(&self) -> String {
        format!(
            "{} | Zoom: {:.0}% | Snap: {} | Annotations: {}",
            scale_label(self.mm_per_px, self.units),
            self.zoom_percent,
            if self.snap { "on" } else { "off" },
            self.n_annotations
        )
    }
}

pub struct OverlayController {
    image: RgbaImage,
    image_source: String,
    calibration: CalibrationData,
    viewport: Viewport,
    gestures: GestureRecognizer,
    store: AnnotationStore,
    options: OverlayOptions,
    selected_points: Vec<PtF>,
    hover: Option<PtF>,
    drag: Option<DragHandle>,
    space_held: bool,
    last_down_time: Option<f64>,
    swallow_click: bool,
    fitted: bool,
    redraw_requested: bool,
}
impl OverlayController {
    pub fn new(
        image: RgbaImage,
        image_source: &str,
        calibration: CalibrationData,
        cfg: &OverlayCfg,
    ) -> Self {
        let shape = ShapeF::new(image.width() as TPtF, image.height() as TPtF);
        let limits = ZoomLimits {
            min: cfg.min_zoom,
            max: cfg.max_zoom,
        };
        info!(
            "overlay for {image_source} with {} markers of which {} carry a scale",
            calibration.markers.len(),
            calibration.usable_markers().count()
        );
        OverlayController {
            image,
            image_source: image_source.to_string(),
            calibration,
            viewport: Viewport::new(shape, limits),
            gestures: GestureRecognizer::new(cfg.click_threshold_px, cfg.wheel_step),
            store: AnnotationStore::default(),
            options: OverlayOptions::from_cfg(cfg),
            selected_points: vec![],
            hover: None,
            drag: None,
            space_held: false,
            last_down_time: None,
            swallow_click: false,
            fitted: false,
            redraw_requested: true,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
    pub fn image_source(&self) -> &str {
        &self.image_source
    }
    pub fn calibration(&self) -> &CalibrationData {
        &self.calibration
    }
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }
    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }
    pub fn store_mut(&mut self) -> &mut AnnotationStore {
        self.request_redraw();
        &mut self.store
    }
    pub fn options(&self) -> &OverlayOptions {
        &self.options
    }
    pub fn selected_points(&self) -> &[PtF] {
        &self.selected_points
    }
    pub fn hover(&self) -> Option<PtF> {
        self.hover
    }

    fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }
    /// Returns `true` at most once per batch of changes.
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    pub fn state(&self) -> OverlayState {
        let (mm_per_px, scale_marker) = self.resolve_scale();
        OverlayState {
            mode: self.options.mode,
            units: self.options.style.units,
            zoom_percent: self.viewport.zoom_percent(),
            mm_per_px,
            scale_marker,
            n_annotations: self.store.len(),
            selected_id: self.store.selected_id(),
            n_in_progress: self.selected_points.len(),
            snap: self.options.snap,
            can_undo: !self.selected_points.is_empty() || self.store.selected_id().is_some(),
            can_delete: self.store.selected_id().is_some(),
            can_finish_polyline: self.options.mode == Mode::Polyline
                && self.selected_points.len() >= 2,
            gesture: self.gestures.state(),
        }
    }

    /// Scale and the marker it comes from. A locked marker wins, otherwise the usable marker
    /// nearest to the reference point.
    pub fn resolve_scale(&self) -> (TPtF, Option<MarkerId>) {
        let marker = match &self.options.lock_marker {
            Some(lock) => self.calibration.find_marker(lock),
            None => self.calibration.nearest_usable_marker(self.scale_reference()),
        };
        match marker {
            Some(m) => (m.scale().unwrap_or(0.0), m.id.clone()),
            None => (0.0, None),
        }
    }
    fn scale_reference(&self) -> PtF {
        if let Some(h) = self.hover {
            return h;
        }
        match self.selected_points.as_slice() {
            [.., a, b] => a.midpoint(b),
            [a] => *a,
            [] => PtF::default(),
        }
    }

    /// Nearest marker corner within the snap radius, `p` otherwise.
    pub fn snap(&self, p: PtF) -> PtF {
        snap_with(&self.options, &self.viewport, &self.calibration, p)
    }

    fn hit_tol(&self) -> TPtF {
        self.viewport.px_to_img(self.options.hit_tol_px)
    }

    pub fn handle_input(&mut self, ev: &InputEvent, text_input_focused: bool) {
        match ev {
            InputEvent::PointerDown(p) => self.pointer_down(p),
            InputEvent::PointerMove(p) => {
                let g = self.gestures.pointer_move(p, &mut self.viewport);
                self.dispatch(g);
            }
            InputEvent::PointerUp(p) => {
                let g = self.gestures.pointer_up(p, &self.viewport);
                self.dispatch(g);
            }
            InputEvent::PointerCancel(p) => {
                let g = self.gestures.pointer_cancel(p, &self.viewport);
                self.drag = None;
                self.dispatch(g);
            }
            InputEvent::Wheel(w) => {
                let g = self.gestures.wheel(w, &mut self.viewport);
                self.dispatch(g);
            }
            InputEvent::KeyPressed(key, modifiers) => {
                if !text_input_focused {
                    self.key_pressed(*key, *modifiers);
                }
            }
            InputEvent::KeyReleased(key, _) => {
                if *key == KeyCode::Space {
                    self.space_held = false;
                }
            }
        }
    }

    fn is_double_tap(&self, time: f64) -> bool {
        self.options.mode == Mode::Polyline
            && self.selected_points.len() >= 2
            && self.gestures.n_active_pointers() == 0
            && self
                .last_down_time
                .is_some_and(|t| time - t >= 0.0 && time - t <= self.options.double_tap_s)
    }

    fn pointer_down(&mut self, ev: &PointerInput) {
        let double_tap = self.is_double_tap(ev.time);
        self.last_down_time = Some(ev.time);
        self.swallow_click = false;
        let pan_requested = self.options.mode == Mode::Pan || self.space_held;
        let gestures = self
            .gestures
            .pointer_down(ev, pan_requested, &self.viewport);
        if double_tap {
            debug!("double tap finishes polyline");
            self.finish_polyline();
            self.swallow_click = true;
            self.last_down_time = None;
        } else {
            self.dispatch(gestures);
        }
    }

    fn dispatch(&mut self, gestures: Vec<Gesture>) {
        for g in gestures {
            match g {
                Gesture::Down(p) => self.on_down(p),
                Gesture::Drag(p) => self.on_drag(p),
                Gesture::DragEnd(_) | Gesture::Up(_) => self.drag = None,
                Gesture::Hover(p) => self.on_hover(p),
                Gesture::Click(p) => {
                    if std::mem::take(&mut self.swallow_click) {
                        continue;
                    }
                    self.on_click(p);
                }
                Gesture::Transform => {
                    let tol = self.hit_tol();
                    self.store.set_hit_tol(tol);
                    self.request_redraw();
                }
            }
        }
    }

    fn on_down(&mut self, p: PtF) {
        if matches!(
            self.gestures.state(),
            GestureState::Panning | GestureState::Pinching
        ) {
            self.drag = None;
            return;
        }
        let tol = self.hit_tol();
        self.store.set_hit_tol(tol);
        let vis = &self.options.style.visibility;
        let hit = self.store.hit_test_with(p, tol, |a| vis.shows(a));
        if let Some(anno) = hit.and_then(|id| self.store.get(id)) {
            self.drag = Some(DragHandle::new(anno, p, tol));
            self.store.select(hit);
            self.request_redraw();
        }
    }

    fn on_drag(&mut self, p: PtF) {
        match self.drag.as_mut() {
            Some(handle) => {
                let p = if handle.moves_vertex() {
                    snap_with(&self.options, &self.viewport, &self.calibration, p)
                } else {
                    p
                };
                if let Some(anno) = self.store.get_mut(handle.id) {
                    handle.apply(&mut anno.geo, p);
                    self.redraw_requested = true;
                }
            }
            None => self.on_hover(p),
        }
    }

    fn on_hover(&mut self, p: PtF) {
        self.hover = Some(self.snap(p));
        if !self.selected_points.is_empty() {
            self.request_redraw();
        }
    }

    fn on_click(&mut self, p: PtF) {
        let p = self.snap(p);
        match self.options.mode {
            Mode::Pan => (),
            Mode::Select => {
                let vis = &self.options.style.visibility;
                let hit = self.store.hit_test_with(p, self.hit_tol(), |a| vis.shows(a));
                self.store.select(hit);
            }
            Mode::Note => {
                let text = if self.options.note_text.trim().is_empty() {
                    "Note"
                } else {
                    self.options.note_text.as_str()
                };
                let text = text.to_string();
                self.store.add_note(p, &text);
                self.hover = None;
            }
            mode => {
                self.selected_points.push(p);
                if mode.n_points() == Some(self.selected_points.len()) {
                    self.commit();
                }
            }
        }
        self.request_redraw();
    }

    fn frozen_calib(&self) -> Calib {
        let (mm_per_px, marker_id) = self.resolve_scale();
        Calib {
            mm_per_px,
            units: self.options.style.units,
            marker_id,
        }
    }

    fn commit(&mut self) {
        let calib = self.frozen_calib();
        let pts = std::mem::take(&mut self.selected_points);
        match (self.options.mode, pts.as_slice()) {
            (Mode::Segment, [a, b]) => {
                self.store.add_segment(*a, *b, calib);
            }
            (Mode::Rectangle, [a, b]) => {
                self.store.add_rectangle(*a, *b, calib);
            }
            (Mode::Angle, [a, v, b]) => {
                self.store.add_angle(*a, *v, *b, calib);
            }
            (mode, pts) => warn!("cannot commit {} points in mode {mode:?}", pts.len()),
        }
        self.hover = None;
    }

    fn key_pressed(&mut self, key: KeyCode, modifiers: Modifiers) {
        if let Some(mode) = Mode::from_key(key) {
            self.set_mode(mode);
            return;
        }
        match key {
            KeyCode::Delete | KeyCode::Back => {
                if !self.delete_selected() && self.selected_points.pop().is_some() {
                    self.request_redraw();
                }
            }
            KeyCode::Escape => {
                self.selected_points.clear();
                self.hover = None;
                self.store.select(None);
                self.drag = None;
                self.request_redraw();
            }
            KeyCode::PlusEquals => self.zoom_step(self.options.zoom_step),
            KeyCode::Minus => self.zoom_step(1.0 / self.options.zoom_step),
            KeyCode::Z if modifiers.ctrl => self.undo(),
            KeyCode::Enter => {
                self.finish_polyline();
            }
            KeyCode::F => self.fit_to_container(),
            KeyCode::Space => self.space_held = true,
            _ => (),
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.options.mode != mode {
            info!("mode {}", mode.name());
        }
        self.options.mode = mode;
        self.selected_points.clear();
        self.hover = None;
        self.drag = None;
        self.request_redraw();
    }
    /// Zooms around the canvas center.
    pub fn zoom_step(&mut self, factor: TPtF) {
        let anchor = self.viewport.center_anchor();
        self.viewport.zoom_by(factor, anchor);
        self.dispatch(vec![Gesture::Transform]);
    }
    pub fn set_zoom(&mut self, k: TPtF) {
        let anchor = self.viewport.center_anchor();
        self.viewport.set_zoom_around(k, anchor);
        self.dispatch(vec![Gesture::Transform]);
    }
    pub fn fit_to_container(&mut self) {
        self.viewport.fit();
        self.dispatch(vec![Gesture::Transform]);
    }
    pub fn fit_to_height(&mut self) {
        self.viewport.fit_height();
        self.dispatch(vec![Gesture::Transform]);
    }
    pub fn reset_view(&mut self) {
        self.viewport.reset();
        self.dispatch(vec![Gesture::Transform]);
    }
    /// Recomputes the backing store. The first call fits the image into the canvas.
    pub fn resize(&mut self, outer_css: ShapeF, insets: Insets, dpr: TPtF) {
        self.gestures.set_insets(insets);
        let changed = self.viewport.resize(outer_css, insets, dpr);
        if !self.fitted {
            self.fitted = true;
            self.fit_to_container();
        } else if changed {
            self.dispatch(vec![Gesture::Transform]);
        }
    }

    /// Removes the last in-progress point, otherwise the selected annotation.
    pub fn undo(&mut self) {
        if self.selected_points.pop().is_none() {
            self.store.remove_selected();
        }
        self.request_redraw();
    }
    /// Returns `false` if nothing was selected.
    pub fn delete_selected(&mut self) -> bool {
        let removed = self.store.remove_selected();
        if removed {
            self.drag = None;
            self.request_redraw();
        }
        removed
    }
    pub fn clear_all(&mut self) {
        self.store.clear();
        self.selected_points.clear();
        self.drag = None;
        self.request_redraw();
    }
    /// Commits the polyline in progress. Less than two points are rejected and kept.
    pub fn finish_polyline(&mut self) -> Option<AnnotationId> {
        if self.options.mode != Mode::Polyline {
            return None;
        }
        if self.selected_points.len() < 2 {
            debug!("polyline needs at least two points");
            return None;
        }
        let calib = self.frozen_calib();
        let pts = std::mem::take(&mut self.selected_points);
        self.hover = None;
        self.request_redraw();
        self.store.add_polyline(pts, calib)
    }
    pub fn set_units(&mut self, units: Unit) {
        self.options.style.units = units;
        self.request_redraw();
    }
    pub fn set_snap(&mut self, snap: bool) {
        self.options.snap = snap;
        self.request_redraw();
    }
    pub fn set_snap_px(&mut self, snap_px: TPtF) {
        if snap_px.is_finite() && snap_px >= 0.0 {
            self.options.snap_px = snap_px;
        }
    }
    pub fn lock_marker(&mut self, marker: Option<MarkerId>) {
        if let Some(m) = &marker {
            if self.calibration.find_marker(m).is_none() {
                warn!("locking unknown marker {m}, scale will be 0");
            }
        }
        self.options.lock_marker = marker;
        self.request_redraw();
    }
    pub fn set_note_text(&mut self, text: &str) {
        self.options.note_text = text.to_string();
    }
    pub fn set_label_scale(&mut self, label_scale: TPtF) {
        if label_scale.is_finite() && label_scale > 0.0 {
            self.options.style.label_scale = label_scale;
            self.request_redraw();
        }
    }
    pub fn set_line_px(&mut self, line_px: TPtF) {
        if line_px.is_finite() && line_px > 0.0 {
            self.options.style.line_px = line_px;
            self.request_redraw();
        }
    }
    pub fn set_show_annotations(&mut self, show: bool) {
        self.options.style.visibility.annotations = show;
        self.request_redraw();
    }
    pub fn set_kind_visible(&mut self, kind: AnnoKind, visible: bool) {
        self.options.style.visibility.set_kind_visible(kind, visible);
        self.request_redraw();
    }
    pub fn set_show_grid(&mut self, show: bool) {
        self.options.style.show_grid = show;
        self.request_redraw();
    }
    pub fn set_show_markers(&mut self, show: bool) {
        self.options.style.show_markers = show;
        self.request_redraw();
    }
    pub fn set_export_visible_only(&mut self, visible_only: bool) {
        self.options.export_visible_only = visible_only;
    }

    fn preview(&self) -> Option<Preview> {
        let kind = self.options.mode.drawn_kind()?;
        if self.selected_points.is_empty() {
            return None;
        }
        let mut points = self.selected_points.clone();
        points.extend(self.hover);
        Some(Preview {
            kind,
            points,
            mm_per_px: self.resolve_scale().0,
        })
    }

    /// What is on screen right now.
    pub fn live_scene(&self) -> Scene<'_> {
        let shape = self.viewport.canvas_shape();
        let vis = &self.options.style.visibility;
        Scene {
            image: &self.image,
            calibration: &self.calibration,
            annotations: self.store.items().iter().filter(|a| vis.shows(a)).collect(),
            selected: self.store.selected_id(),
            preview: self.preview(),
            style: self.options.style.clone(),
            canvas: (shape.w as u32, shape.h as u32),
            k: self.viewport.k(),
            pan: self.viewport.pan(),
            background: true,
        }
    }

    /// The image at native resolution without selection or previews.
    pub fn export_scene(&self) -> Scene<'_> {
        let mut style = self.options.style.clone();
        if !self.options.export_visible_only {
            style.visibility = Visibility::default();
        }
        let annotations = self
            .store
            .items()
            .iter()
            .filter(|a| style.visibility.shows(a))
            .collect();
        Scene {
            image: &self.image,
            calibration: &self.calibration,
            annotations,
            selected: None,
            preview: None,
            style,
            canvas: (self.image.width(), self.image.height()),
            k: 1.0,
            pan: PtF::default(),
            background: false,
        }
    }
}

fn snap_with(
    options: &OverlayOptions,
    viewport: &Viewport,
    calibration: &CalibrationData,
    p: PtF,
) -> PtF {
    if !options.snap {
        return p;
    }
    let mut best_d = viewport.px_to_img(options.snap_px);
    let mut best = p;
    for c in calibration.corners_iter() {
        let d = c.dist(&p);
        if d < best_d {
            best_d = d;
            best = c;
        }
    }
    best
}

#[cfg(test)]
mod tests;
