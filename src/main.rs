#![deny(clippy::all)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![forbid(unsafe_code)]

use clap::Parser;
use cmlib::{
    EguiInputMapper, OverlayController, Renderer, Unit,
    assets::{load_calibration, load_image},
    calibration::ImageSize,
    cfg::{Cfg, get_cfg_path, read_cfg, write_cfg},
    domain::{ShapeF, TPtF},
    export::{self, default_export_names},
    file_util::{self, DEFAULT_HOMEDIR},
    menu::{MenuActions, SidePanel, Toolbar},
    result::{CmResult, trace_ok_err},
    tracing_setup,
    viewport::Insets,
};
use egui::{Color32, ColorImage, Context, Rect, Sense, Style, TextureHandle, TextureOptions, Visuals};
use image::RgbaImage;
use std::{
    ops::Deref,
    panic,
    path::{Path, PathBuf},
};
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about = "Measure on calibrated images")]
struct Cli {
    /// Image file or http(s) url.
    image: Option<String>,
    /// Calibration json, file or http(s) url.
    #[arg(short, long)]
    calibration: Option<String>,
    /// Annotations from an earlier export.
    #[arg(short, long)]
    annotations: Option<PathBuf>,
    /// Writes the annotated image without opening a window.
    #[arg(long)]
    out_png: Option<PathBuf>,
    /// Writes the measurement json without opening a window.
    #[arg(long)]
    out_json: Option<PathBuf>,
    /// Exports hidden kinds too.
    #[arg(long)]
    all: bool,
    #[arg(short, long)]
    units: Option<Unit>,
}

fn open_controller(
    cfg: &Cfg,
    image_source: &str,
    calibration_source: Option<&str>,
) -> CmResult<OverlayController> {
    let image = load_image(image_source, cfg.fetch_timeout())?;
    let size = ImageSize {
        width: image.width(),
        height: image.height(),
    };
    let calibration = load_calibration(calibration_source, image_source, size, cfg.fetch_timeout());
    Ok(OverlayController::new(
        image,
        image_source,
        calibration,
        &cfg.overlay,
    ))
}

fn export_via_cli(cfg: &Cfg, cli: &Cli, image_source: &str) -> CmResult<()> {
    let mut ctl = open_controller(cfg, image_source, cli.calibration.as_deref())?;
    if let Some(units) = cli.units {
        ctl.set_units(units);
    }
    if cli.all {
        ctl.set_export_visible_only(false);
    }
    if let Some(path) = &cli.annotations {
        export::import_annotations(&mut ctl, &file_util::read_to_string(path)?)?;
    }
    if let Some(path) = &cli.out_png {
        let mut renderer = Renderer::from_font_path(cfg.font_path.as_deref());
        export::write_png(&ctl, &mut renderer, path)?;
    }
    if let Some(path) = &cli.out_json {
        export::write_json(&ctl, path)?;
    }
    Ok(())
}

fn to_color_image(im: &RgbaImage) -> ColorImage {
    ColorImage::from_rgba_unmultiplied([im.width() as usize, im.height() as usize], im.as_raw())
}

struct CalibMeasureApp {
    cfg: Cfg,
    ctl: Option<OverlayController>,
    calibration_source: Option<String>,
    renderer: Renderer,
    mapper: EguiInputMapper,
    texture: Option<TextureHandle>,
    text_focused: bool,
    status: String,
}
impl CalibMeasureApp {
    fn new(cfg: Cfg, image_source: Option<String>, calibration_source: Option<String>) -> Self {
        let renderer = Renderer::from_font_path(cfg.font_path.as_deref());
        let mut app = CalibMeasureApp {
            cfg,
            ctl: None,
            calibration_source,
            renderer,
            mapper: EguiInputMapper::default(),
            texture: None,
            text_focused: false,
            status: String::new(),
        };
        if let Some(src) = image_source {
            app.open(&src);
        }
        app
    }

    fn open(&mut self, image_source: &str) {
        match open_controller(&self.cfg, image_source, self.calibration_source.as_deref()) {
            Ok(ctl) => {
                self.status = format!("opened {image_source}");
                self.ctl = Some(ctl);
                self.texture = None;
            }
            Err(e) => {
                error!("{e}");
                self.status = e.to_string();
            }
        }
    }

    fn handle_actions(&mut self, actions: MenuActions) {
        if actions.open_calibration {
            if let Some(p) = rfd::FileDialog::new()
                .add_filter("calibration", &["json"])
                .pick_file()
            {
                self.calibration_source = Some(p.to_string_lossy().to_string());
                if let Some(src) = self.ctl.as_ref().map(|c| c.image_source().to_string()) {
                    self.open(&src);
                }
            }
        }
        if actions.open_image {
            if let Some(p) = rfd::FileDialog::new()
                .add_filter("images", &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"])
                .pick_file()
            {
                self.open(&p.to_string_lossy());
            }
        }
        let Some(ctl) = &self.ctl else {
            return;
        };
        let (png_name, json_name) = default_export_names(ctl.image_source());
        if actions.export_png {
            if let Some(p) = save_dialog("png", &png_name) {
                self.status = status_of(export::write_png(ctl, &mut self.renderer, &p), &p);
            }
        }
        if actions.export_json {
            if let Some(p) = save_dialog("json", &json_name) {
                self.status = status_of(export::write_json(ctl, &p), &p);
            }
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let Some(ctl) = &mut self.ctl else {
            ui.centered_and_justified(|ui| ui.label("Open an image to start measuring."));
            return;
        };
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, Sense::click_and_drag());
        let ctx = ui.ctx().clone();
        ctl.resize(
            ShapeF::new(TPtF::from(rect.width()), TPtF::from(rect.height())),
            Insets::default(),
            TPtF::from(ctx.pixels_per_point()),
        );
        let (events, time) = ctx.input(|i| (i.events.clone(), i.time));
        let text_focused = self.text_focused || ctx.wants_keyboard_input();
        for ev in self.mapper.map_events(&events, rect, time) {
            ctl.handle_input(&ev, text_focused);
        }
        if response.hovered() || self.mapper.is_mouse_down() {
            ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
        }
        if ctl.take_redraw_request() || self.texture.is_none() {
            match self.renderer.render(&ctl.live_scene()) {
                Ok(im) => {
                    let color_image = to_color_image(&im);
                    match &mut self.texture {
                        Some(t) => t.set(color_image, TextureOptions::NEAREST),
                        None => {
                            self.texture =
                                Some(ctx.load_texture("canvas", color_image, TextureOptions::NEAREST));
                        }
                    }
                }
                Err(e) => error!("rendering failed, {e}"),
            }
        }
        if let Some(t) = &self.texture {
            let uv = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            ui.painter().image(t.id(), rect, uv, Color32::WHITE);
        }
    }
}

fn save_dialog(ext: &str, file_name: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(ext, &[ext])
        .set_file_name(file_name)
        .save_file()
}

fn status_of(res: CmResult<()>, path: &Path) -> String {
    match res {
        Ok(()) => format!("exported to {path:?}"),
        Err(e) => {
            error!("{e}");
            e.to_string()
        }
    }
}

impl eframe::App for CalibMeasureApp {
    fn ui(&mut self, _: &mut egui::Ui, _: &mut eframe::Frame) {}

    fn update(&mut self, ctx: &Context, _: &mut eframe::Frame) {
        ctx.options_mut(|o| {
            o.zoom_with_keyboard = false;
        });
        let mut actions = MenuActions::default();
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| match &mut self.ctl {
            Some(ctl) => {
                ui.add(Toolbar::new(ctl, &mut actions));
            }
            None => {
                if ui.button("Open…").clicked() {
                    actions.open_image = true;
                }
            }
        });
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(egui::RichText::new(&self.status).monospace());
        });
        if let Some(ctl) = &mut self.ctl {
            egui::SidePanel::right("settings").show(ctx, |ui| {
                ui.add(SidePanel::new(ctl, &mut self.text_focused));
            });
        }
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.canvas(ui));
        self.handle_actions(actions);
    }
}

fn run_gui(cfg: Cfg, cli: Cli) {
    let native_options = eframe::NativeOptions::default();
    let darkmode = cfg.darkmode;
    if let Err(e) = eframe::run_native(
        "calibmeasure",
        native_options,
        Box::new(move |cc| {
            let visuals = if darkmode == Some(false) {
                Visuals::light()
            } else {
                Visuals::dark()
            };
            let mut style = Style {
                visuals,
                ..Style::default()
            };
            style.interaction.tooltip_delay = 0.01;
            cc.egui_ctx.set_style(style);
            Ok(Box::new(CalibMeasureApp::new(cfg, cli.image, cli.calibration)))
        }),
    ) {
        error!("{e:?}");
    }
}

fn main() {
    let _guard_flush_to_logfile = tracing_setup::tracing_setup(&DEFAULT_HOMEDIR);
    info!(
        "calibmeasure {}{}",
        env!("GIT_DESC"),
        if env!("GIT_DIRTY") == "true" { " (dirty)" } else { "" }
    );
    if let Err(e) = panic::catch_unwind(|| {
        let cli = Cli::parse();
        let cfg = trace_ok_err(read_cfg()).unwrap_or_default();
        if !get_cfg_path(&DEFAULT_HOMEDIR).exists() {
            trace_ok_err(write_cfg(&cfg));
        }
        let headless = cli.out_png.is_some() || cli.out_json.is_some();
        match (&cli.image, headless) {
            (Some(image), true) => {
                trace_ok_err(export_via_cli(&cfg, &cli, image));
            }
            (None, true) => error!("exporting needs an image"),
            (_, false) => run_gui(cfg, cli),
        }
    }) {
        let panic_s = e
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| e.downcast_ref::<&'static str>().map(Deref::deref));
        error!("{:?}", panic_s);
        if let Some(b) = tracing_setup::BACKTRACE.with(|b| b.borrow_mut().take()) {
            error!("{:?}", b);
        }
    }
}
