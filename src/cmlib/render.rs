//! Rasterizes a [`Scene`]. Shapes are drawn with tiny-skia under the viewport transform,
//! label text is drawn afterwards onto the resulting image in device pixels.
use crate::{
    annotations::{AnnoKind, Annotation, AnnotationId, Calib, GeoFig, Visibility},
    calibration::CalibrationData,
    domain::{PtF, RectF, TPtF},
    measure::{self, preview_label},
    result::{CmResult, to_cm, trace_ok_warn},
    units::Unit,
    cmerr,
};
use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::Path;
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap,
    PixmapPaint, Rect, Stroke, StrokeDash, Transform,
};
use tracing::{info, warn};

type Rgba8 = [u8; 4];

const BACKGROUND: Rgba8 = [32, 32, 32, 255];
const GRID: Rgba8 = [255, 255, 255, 31];
const GRID_SPACING: TPtF = 50.0;
const MARKER: Rgba8 = [255, 255, 0, 242];
const MARKER_CORNER: Rgba8 = [0, 255, 255, 255];
const DOT_OUTLINE: Rgba8 = [0, 0, 0, 255];
const SEGMENT: Rgba8 = [0, 255, 0, 255];
const SHAPE: Rgba8 = [255, 165, 0, 255];
const NOTE: Rgba8 = [0, 191, 255, 255];
const SELECTED: Rgba8 = [255, 170, 0, 255];
const PREVIEW: Rgba8 = [255, 230, 120, 235];
const LABEL_BG: Rgba8 = [0, 0, 0, 184];
const LABEL_BORDER: Rgba8 = [255, 255, 255, 89];
const LABEL_TEXT: Rgba8 = [255, 255, 255, 255];

/// Visual settings that do not change geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub label_scale: TPtF,
    pub line_px: TPtF,
    pub units: Unit,
    pub show_grid: bool,
    pub show_markers: bool,
    pub visibility: Visibility,
}
impl Default for Style {
    fn default() -> Self {
        Style {
            label_scale: 1.35,
            line_px: 3.0,
            units: Unit::Mm,
            show_grid: false,
            show_markers: true,
            visibility: Visibility::default(),
        }
    }
}

/// Figure under construction, the last point is usually the hover position.
#[derive(Clone, Debug, PartialEq)]
pub struct Preview {
    pub kind: AnnoKind,
    pub points: Vec<PtF>,
    pub mm_per_px: TPtF,
}
impl Preview {
    fn figure(&self) -> Option<GeoFig> {
        let calib = Calib {
            mm_per_px: self.mm_per_px,
            ..Default::default()
        };
        match (self.kind, self.points.as_slice()) {
            (AnnoKind::Segment, [a, b, ..]) => Some(GeoFig::Segment {
                a: *a,
                b: *b,
                calib,
            }),
            (AnnoKind::Polyline, pts) if pts.len() >= 2 => Some(GeoFig::Polyline {
                pts: pts.to_vec(),
                calib,
            }),
            (AnnoKind::Rectangle, [a, b, ..]) => Some(GeoFig::Rectangle {
                rect: RectF::from_corners(*a, *b),
                calib,
            }),
            (AnnoKind::Angle, [a, v, b, ..]) => Some(GeoFig::Angle {
                a: *a,
                v: *v,
                b: *b,
                calib,
            }),
            _ => None,
        }
    }
}

/// Everything needed to draw one frame.
pub struct Scene<'a> {
    pub image: &'a RgbaImage,
    pub calibration: &'a CalibrationData,
    /// Already filtered by visibility.
    pub annotations: Vec<&'a Annotation>,
    pub selected: Option<AnnotationId>,
    pub preview: Option<Preview>,
    pub style: Style,
    /// Width and height of the target in device pixels.
    pub canvas: (u32, u32),
    pub k: TPtF,
    pub pan: PtF,
    /// Fill the canvas before drawing the image.
    pub background: bool,
}

/// Converts configured pixel values to the canvas, such that line widths and labels look
/// alike on small and large canvases.
pub fn px(canvas: (u32, u32), v: TPtF) -> TPtF {
    let base = canvas.0.max(canvas.1) as TPtF / 1000.0;
    (v * base).max(1.0)
}

fn paint(color: Rgba8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

fn stroke(width: TPtF, dash: Option<[TPtF; 2]>) -> Stroke {
    Stroke {
        width: width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        dash: dash.and_then(|[on, off]| StrokeDash::new(vec![on as f32, off as f32], 0.0)),
        ..Default::default()
    }
}

fn image_to_pixmap(image: &RgbaImage) -> CmResult<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())
        .ok_or_else(|| cmerr!("cannot allocate pixmap for image {:?}", image.dimensions()))?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Ok(pixmap)
}

fn pixmap_to_image(pixmap: &Pixmap) -> CmResult<RgbaImage> {
    let raw = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect::<Vec<_>>();
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
        .ok_or_else(|| cmerr!("cannot construct output image"))
}

pub fn load_font(path: &Path) -> CmResult<FontArc> {
    let bytes = std::fs::read(path).map_err(to_cm)?;
    FontArc::try_from_vec(bytes).map_err(to_cm)
}

struct Label {
    text: String,
    /// Top left of the text in device pixels.
    pos: (i32, i32),
    size: f32,
}

/// Draws shapes into a pixmap and collects labels for the text pass.
struct Painter<'a> {
    pixmap: &'a mut Pixmap,
    ts: Transform,
    canvas: (u32, u32),
    k: TPtF,
    pan: PtF,
    style: &'a Style,
    font: Option<&'a FontArc>,
    labels: Vec<Label>,
}
impl Painter<'_> {
    fn px(&self, v: TPtF) -> TPtF {
        px(self.canvas, v)
    }
    fn line_width(&self) -> TPtF {
        self.px(self.style.line_px)
    }
    fn polyline(&mut self, pts: &[PtF], closed: bool, color: Rgba8, width: TPtF, dash: bool) {
        let mut pb = PathBuilder::new();
        for (i, p) in pts.iter().enumerate() {
            if i == 0 {
                pb.move_to(p.x as f32, p.y as f32);
            } else {
                pb.line_to(p.x as f32, p.y as f32);
            }
        }
        if closed {
            pb.close();
        }
        if let Some(path) = pb.finish() {
            let dash = dash.then(|| [self.px(10.0), self.px(8.0)]);
            self.pixmap
                .stroke_path(&path, &paint(color), &stroke(width, dash), self.ts, None);
        }
    }
    fn dot(&mut self, p: PtF, r: TPtF, color: Rgba8, outline: Option<(Rgba8, TPtF)>) {
        if let Some(path) = PathBuilder::from_circle(p.x as f32, p.y as f32, r as f32) {
            self.pixmap
                .fill_path(&path, &paint(color), FillRule::Winding, self.ts, None);
            if let Some((outline_color, width)) = outline {
                self.pixmap.stroke_path(
                    &path,
                    &paint(outline_color),
                    &stroke(width, None),
                    self.ts,
                    None,
                );
            }
        }
    }
    fn dots(&mut self, pts: &[PtF], color: Rgba8) {
        let r = self.px(8.0);
        for p in pts {
            self.dot(*p, r, color, None);
        }
    }

    fn text_w(&self, text: &str, font_size: TPtF, fallback_w: TPtF) -> TPtF {
        match self.font {
            Some(font) => {
                let device_scale = PxScale::from((font_size * self.k) as f32);
                text_size(device_scale, font, text).0 as TPtF / self.k
            }
            None => fallback_w,
        }
    }

    /// Box `[x, y, w, h]` in image space, `text_x` is where the text starts.
    fn text_box(&mut self, text: &str, [x, y, w, h]: [TPtF; 4], text_x: TPtF, pad: TPtF, font_size: TPtF) {
        if let Some(rect) = Rect::from_xywh(x as f32, y as f32, w as f32, h as f32) {
            let path = PathBuilder::from_rect(rect);
            self.pixmap
                .fill_path(&path, &paint(LABEL_BG), FillRule::Winding, self.ts, None);
            self.pixmap.stroke_path(
                &path,
                &paint(LABEL_BORDER),
                &stroke(self.px(1.5), None),
                self.ts,
                None,
            );
        }
        let top_left = PtF::new(text_x, y + pad) * self.k + self.pan;
        self.labels.push(Label {
            text: text.to_string(),
            pos: (top_left.x.round() as i32, top_left.y.round() as i32),
            size: (font_size * self.k) as f32,
        });
    }

    /// Measurement box centered horizontally above `anchor`, at least 200 px wide.
    fn label(&mut self, anchor: PtF, text: &str) {
        if text.is_empty() {
            return;
        }
        let scale = self.style.label_scale;
        let font_size = self.px(22.0 * scale);
        let pad = self.px(10.0 * scale);
        let min_w = self.px(TPtF::max(200.0, text.chars().count() as TPtF * 9.0) * scale * 0.9);
        let text_w = self.text_w(text, font_size, min_w - 2.0 * pad);
        let box_w = min_w.max(text_w + 2.0 * pad);
        let box_h = font_size + 2.0 * pad;
        let x = anchor.x - box_w * 0.5;
        let y = anchor.y - box_h - self.px(12.0);
        let text_x = anchor.x - text_w * 0.5;
        self.text_box(text, [x, y, box_w, box_h], text_x, pad, font_size);
    }

    /// Note text in a box to the right of the pin, vertically centered on it.
    fn note_label(&mut self, pin: PtF, text: &str) {
        if text.is_empty() {
            return;
        }
        let scale = self.style.label_scale;
        let font_size = self.px(18.0 * scale);
        let pad = self.px(8.0 * scale);
        let min_w = self.px(TPtF::max(140.0, text.chars().count() as TPtF * 10.0) * scale * 0.8);
        let text_w = self.text_w(text, font_size, min_w - 2.0 * pad);
        let box_w = min_w.max(text_w + 2.0 * pad);
        let box_h = font_size + 2.0 * pad;
        let x = pin.x + self.px(14.0);
        let y = pin.y - box_h * 0.5;
        self.text_box(text, [x, y, box_w, box_h], x + pad, pad, font_size);
    }

    fn grid(&mut self, w: TPtF, h: TPtF) {
        let width = self.px(1.0);
        let mut x = 0.0;
        while x <= w {
            self.polyline(&[PtF::new(x, 0.0), PtF::new(x, h)], false, GRID, width, false);
            x += GRID_SPACING;
        }
        let mut y = 0.0;
        while y <= h {
            self.polyline(&[PtF::new(0.0, y), PtF::new(w, y)], false, GRID, width, false);
            y += GRID_SPACING;
        }
    }

    fn markers(&mut self, calibration: &CalibrationData) {
        let width = self.line_width();
        let r = self.px(10.0);
        let outline = (DOT_OUTLINE, self.px(2.0));
        for m in &calibration.markers {
            let corners = m.corner_points();
            if corners.len() >= 2 {
                self.polyline(&corners, true, MARKER, width, false);
            }
            for c in &corners {
                self.dot(*c, r, MARKER_CORNER, Some(outline));
            }
        }
    }

    fn figure(&mut self, geo: &GeoFig, color: Rgba8, dash: bool) {
        let width = self.line_width();
        match geo {
            GeoFig::Segment { a, b, .. } => {
                self.polyline(&[*a, *b], false, color, width, dash);
                self.dots(&[*a, *b], color);
            }
            GeoFig::Polyline { pts, .. } => {
                self.polyline(pts, false, color, width, dash);
                self.dots(pts, color);
            }
            GeoFig::Rectangle { rect, .. } => {
                self.polyline(&rect.corners(), true, color, width, dash);
            }
            GeoFig::Angle { a, v, b, .. } => {
                self.polyline(&[*a, *v, *b], false, color, width, dash);
                self.dots(&[*a, *v, *b], color);
            }
            GeoFig::Note { p, .. } => {
                let r = self.px(9.0);
                let outline = (DOT_OUTLINE, self.px(2.0));
                self.dot(*p, r, color, Some(outline));
            }
        }
    }

    fn annotation(&mut self, anno: &Annotation, selected: bool) {
        let color = if selected {
            SELECTED
        } else {
            match anno.geo.kind() {
                AnnoKind::Segment => SEGMENT,
                AnnoKind::Note => NOTE,
                AnnoKind::Polyline | AnnoKind::Rectangle | AnnoKind::Angle => SHAPE,
            }
        };
        self.figure(&anno.geo, color, false);
        match &anno.geo {
            GeoFig::Note { p, text } => self.note_label(*p, text),
            geo => {
                let text = measure::label(geo, self.style.units);
                self.label(measure::label_anchor(geo), &text);
            }
        }
    }

    fn preview(&mut self, preview: &Preview) {
        let width = self.line_width();
        match preview.figure() {
            Some(geo) => {
                self.figure(&geo, PREVIEW, true);
                if let Some(text) = preview_label(measure::measure(&geo), self.style.units) {
                    self.label(measure::label_anchor(&geo), &text);
                }
            }
            None => {
                if preview.points.len() >= 2 {
                    self.polyline(&preview.points, false, PREVIEW, width, true);
                }
            }
        }
        self.dots(&preview.points, PREVIEW);
    }
}

/// Keeps the font and the converted base image between frames.
#[derive(Default)]
pub struct Renderer {
    font: Option<FontArc>,
    base: Option<(usize, (u32, u32), Pixmap)>,
    warned_no_font: bool,
}
impl Renderer {
    pub fn new(font: Option<FontArc>) -> Self {
        Renderer {
            font,
            base: None,
            warned_no_font: false,
        }
    }
    /// A font that cannot be loaded is logged and leaves labels without text.
    pub fn from_font_path(path: Option<&Path>) -> Self {
        let font = path.and_then(|p| {
            let font = trace_ok_warn(load_font(p));
            if font.is_some() {
                info!("loaded label font {p:?}");
            }
            font
        });
        Self::new(font)
    }

    fn base_pixmap(&mut self, image: &RgbaImage) -> CmResult<&Pixmap> {
        let key = image.as_raw().as_ptr() as usize;
        let dims = image.dimensions();
        let cached = matches!(&self.base, Some((k, d, _)) if *k == key && *d == dims);
        if !cached {
            self.base = Some((key, dims, image_to_pixmap(image)?));
        }
        self.base
            .as_ref()
            .map(|(_, _, p)| p)
            .ok_or_else(|| cmerr!("base image missing"))
    }

    pub fn render(&mut self, scene: &Scene) -> CmResult<RgbaImage> {
        let (w, h) = scene.canvas;
        let mut pixmap = Pixmap::new(w.max(1), h.max(1))
            .ok_or_else(|| cmerr!("cannot allocate canvas {w}x{h}"))?;
        if scene.background {
            let [r, g, b, a] = BACKGROUND;
            pixmap.fill(Color::from_rgba8(r, g, b, a));
        }
        let k = scene.k as f32;
        let ts = Transform::from_row(k, 0.0, 0.0, k, scene.pan.x as f32, scene.pan.y as f32);
        {
            let quality = if scene.k >= 1.0 {
                FilterQuality::Nearest
            } else {
                FilterQuality::Bilinear
            };
            let pixmap_paint = PixmapPaint {
                quality,
                ..Default::default()
            };
            let base = self.base_pixmap(scene.image)?;
            pixmap.draw_pixmap(0, 0, base.as_ref(), &pixmap_paint, ts, None);
        }

        let mut painter = Painter {
            pixmap: &mut pixmap,
            ts,
            canvas: scene.canvas,
            k: scene.k,
            pan: scene.pan,
            style: &scene.style,
            font: self.font.as_ref(),
            labels: vec![],
        };
        if scene.style.show_grid {
            painter.grid(scene.image.width() as TPtF, scene.image.height() as TPtF);
        }
        if scene.style.show_markers {
            painter.markers(scene.calibration);
        }
        for anno in &scene.annotations {
            painter.annotation(anno, scene.selected == Some(anno.id));
        }
        if let Some(preview) = &scene.preview {
            painter.preview(preview);
        }
        let labels = painter.labels;

        let mut out = pixmap_to_image(&pixmap)?;
        match &self.font {
            Some(font) => {
                let [r, g, b, a] = LABEL_TEXT;
                for label in labels {
                    draw_text_mut(
                        &mut out,
                        Rgba([r, g, b, a]),
                        label.pos.0,
                        label.pos.1,
                        label.size,
                        font,
                        &label.text,
                    );
                }
            }
            None => {
                if !labels.is_empty() && !self.warned_no_font {
                    warn!("no label font configured, labels are drawn without text");
                    self.warned_no_font = true;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
use crate::{annotations::AnnotationStore, calibration::square_marker};

#[cfg(test)]
fn test_image(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))
}

#[test]
fn test_px() {
    assert!((px((1000, 500), 3.0) - 3.0).abs() < 1e-12);
    assert!((px((500, 2000), 3.0) - 6.0).abs() < 1e-12);
    assert!((px((100, 100), 3.0) - 1.0).abs() < 1e-12);
}

#[test]
fn test_render_native() -> CmResult<()> {
    let image = test_image(120, 80);
    let calibration = CalibrationData {
        markers: vec![square_marker(1, 10.0, 10.0, 20.0, 0.1)],
        ..Default::default()
    };
    let mut store = AnnotationStore::default();
    store.add_segment(PtF::new(50.0, 40.0), PtF::new(110.0, 40.0), Calib::default());
    store.add_note(PtF::new(60.0, 70.0), "note");
    let scene = Scene {
        image: &image,
        calibration: &calibration,
        annotations: store.items().iter().collect(),
        selected: None,
        preview: Some(Preview {
            kind: AnnoKind::Angle,
            points: vec![PtF::new(1.0, 1.0), PtF::new(5.0, 5.0)],
            mm_per_px: 0.0,
        }),
        style: Style {
            show_grid: true,
            ..Default::default()
        },
        canvas: (120, 80),
        k: 1.0,
        pan: PtF::default(),
        background: false,
    };
    let mut renderer = Renderer::new(None);
    let out = renderer.render(&scene)?;
    assert_eq!(out.dimensions(), (120, 80));
    // far from all drawings the image is untouched
    assert_eq!(out.get_pixel(115, 75), &Rgba([10, 20, 30, 255]));
    // segment line
    let on_line = out.get_pixel(80, 40);
    assert!(on_line[1] > 100 && on_line[0] < 50);
    // marker corner dot
    assert_ne!(out.get_pixel(30, 30), &Rgba([10, 20, 30, 255]));
    Ok(())
}

#[test]
fn test_render_live_transform() -> CmResult<()> {
    let image = test_image(10, 10);
    let calibration = CalibrationData::default();
    let scene = Scene {
        image: &image,
        calibration: &calibration,
        annotations: vec![],
        selected: None,
        preview: None,
        style: Style::default(),
        canvas: (100, 50),
        k: 2.0,
        pan: PtF::new(30.0, 5.0),
        background: true,
    };
    let out = Renderer::default().render(&scene)?;
    assert_eq!(out.dimensions(), (100, 50));
    assert_eq!(out.get_pixel(2, 2), &Rgba(BACKGROUND));
    assert_eq!(out.get_pixel(40, 15), &Rgba([10, 20, 30, 255]));
    assert_eq!(out.get_pixel(60, 30), &Rgba(BACKGROUND));
    Ok(())
}

#[test]
fn test_label_boxes() -> CmResult<()> {
    let image = test_image(1000, 600);
    let calibration = CalibrationData::default();
    let mut store = AnnotationStore::default();
    store.add_segment(PtF::new(400.0, 300.0), PtF::new(600.0, 300.0), Calib::default());
    store.add_note(PtF::new(100.0, 100.0), "n");
    let scene = Scene {
        image: &image,
        calibration: &calibration,
        annotations: store.items().iter().collect(),
        selected: None,
        preview: None,
        style: Style::default(),
        canvas: (1000, 600),
        k: 1.0,
        pan: PtF::default(),
        background: false,
    };
    let out = Renderer::new(None).render(&scene)?;
    let untouched = Rgba([10, 20, 30, 255]);
    // short measurement texts still get a box 243 px wide centered over the midpoint
    assert_ne!(out.get_pixel(390, 260), &untouched);
    assert_ne!(out.get_pixel(610, 260), &untouched);
    assert_eq!(out.get_pixel(370, 260), &untouched);
    assert_eq!(out.get_pixel(500, 295), &untouched);
    // note text sits right of the pin, vertically centered
    assert_ne!(out.get_pixel(250, 100), &untouched);
    assert_eq!(out.get_pixel(275, 100), &untouched);
    assert_eq!(out.get_pixel(80, 100), &untouched);
    assert_eq!(out.get_pixel(100, 70), &untouched);
    Ok(())
}
