//! Toolbar and side panel of the desktop frontend. Everything goes through controller
//! commands, the widgets only keep copies of the state.
use crate::{
    annotations::AnnoKind,
    calibration::MarkerId,
    control::{Mode, OverlayController},
    units::Unit,
};
use egui::{Response, TextEdit, Ui, Widget};

/// Requests that need the app, e.g., file dialogs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MenuActions {
    pub open_image: bool,
    pub open_calibration: bool,
    pub export_png: bool,
    pub export_json: bool,
}

/// Keyboard shortcuts are off while a text field has the focus.
pub fn ui_with_deactivated_shortcuts(
    text_focused: &mut bool,
    mut f_ui: impl FnMut() -> Response,
) -> Response {
    let response = f_ui();
    *text_focused = if response.gained_focus() || response.has_focus() {
        true
    } else if response.lost_focus() {
        false
    } else {
        *text_focused
    };
    response
}

pub struct Toolbar<'a> {
    ctl: &'a mut OverlayController,
    actions: &'a mut MenuActions,
}
impl<'a> Toolbar<'a> {
    pub fn new(ctl: &'a mut OverlayController, actions: &'a mut MenuActions) -> Self {
        Toolbar { ctl, actions }
    }
}
impl Widget for Toolbar<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let state = self.ctl.state();
        ui.horizontal_wrapped(|ui| {
            if ui.button("Open…").clicked() {
                self.actions.open_image = true;
            }
            if ui.button("Calibration…").clicked() {
                self.actions.open_calibration = true;
            }
            ui.separator();
            let mut mode = state.mode;
            for (i, m) in Mode::ALL.iter().enumerate() {
                ui.selectable_value(&mut mode, *m, m.name())
                    .on_hover_text(format!("key {i}"));
            }
            if mode != state.mode {
                self.ctl.set_mode(mode);
            }
            ui.separator();
            if ui.button("−").clicked() {
                let step = self.ctl.options().zoom_step;
                self.ctl.zoom_step(1.0 / step);
            }
            ui.label(format!("{:.0}%", state.zoom_percent));
            if ui.button("+").clicked() {
                let step = self.ctl.options().zoom_step;
                self.ctl.zoom_step(step);
            }
            if ui.button("Fit").clicked() {
                self.ctl.fit_to_container();
            }
            if ui.button("Fit height").clicked() {
                self.ctl.fit_to_height();
            }
            if ui.button("1:1").clicked() {
                self.ctl.reset_view();
            }
            ui.separator();
            if ui
                .add_enabled(state.can_finish_polyline, egui::Button::new("Finish"))
                .clicked()
            {
                self.ctl.finish_polyline();
            }
            if ui
                .add_enabled(state.can_undo, egui::Button::new("Undo"))
                .clicked()
            {
                self.ctl.undo();
            }
            if ui
                .add_enabled(state.can_delete, egui::Button::new("Delete"))
                .clicked()
            {
                self.ctl.delete_selected();
            }
            if ui
                .add_enabled(state.n_annotations > 0, egui::Button::new("Clear"))
                .clicked()
            {
                self.ctl.clear_all();
            }
            ui.separator();
            if ui.button("Export PNG").clicked() {
                self.actions.export_png = true;
            }
            if ui.button("Export JSON").clicked() {
                self.actions.export_json = true;
            }
        })
        .response
    }
}

pub struct SidePanel<'a> {
    ctl: &'a mut OverlayController,
    text_focused: &'a mut bool,
}
impl<'a> SidePanel<'a> {
    pub fn new(ctl: &'a mut OverlayController, text_focused: &'a mut bool) -> Self {
        SidePanel { ctl, text_focused }
    }
}
impl Widget for SidePanel<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let state = self.ctl.state();
        let options = self.ctl.options().clone();
        ui.vertical(|ui| {
            ui.label(egui::RichText::new(state.kpi()).monospace());
            ui.separator();

            let mut units = state.units;
            egui::ComboBox::from_label("Units")
                .selected_text(units.label())
                .show_ui(ui, |ui| {
                    for u in Unit::ALL {
                        ui.selectable_value(&mut units, u, u.label());
                    }
                });
            if units != state.units {
                self.ctl.set_units(units);
            }

            let mut lock = options.lock_marker.clone();
            let lock_text = lock
                .as_ref()
                .map_or_else(|| "nearest".to_string(), |id| format!("marker {id}"));
            egui::ComboBox::from_label("Scale from")
                .selected_text(lock_text)
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut lock, None, "nearest");
                    let ids: Vec<MarkerId> = self
                        .ctl
                        .calibration()
                        .usable_markers()
                        .filter_map(|m| m.id.clone())
                        .collect();
                    for id in ids {
                        let text = format!("marker {id}");
                        ui.selectable_value(&mut lock, Some(id), text);
                    }
                });
            if lock != options.lock_marker {
                self.ctl.lock_marker(lock);
            }

            ui.separator();
            let mut snap = options.snap;
            if ui.checkbox(&mut snap, "Snap to marker corners").changed() {
                self.ctl.set_snap(snap);
            }
            let mut snap_px = options.snap_px;
            if ui
                .add(egui::Slider::new(&mut snap_px, 2.0..=60.0).text("snap radius px"))
                .changed()
            {
                self.ctl.set_snap_px(snap_px);
            }

            ui.separator();
            let mut note_text = options.note_text.clone();
            ui.label("Note text");
            let resp = ui_with_deactivated_shortcuts(self.text_focused, || {
                TextEdit::singleline(&mut note_text).ui(ui)
            });
            if resp.changed() {
                self.ctl.set_note_text(&note_text);
            }

            ui.separator();
            let mut label_scale = options.style.label_scale;
            if ui
                .add(egui::Slider::new(&mut label_scale, 0.5..=4.0).text("label size"))
                .changed()
            {
                self.ctl.set_label_scale(label_scale);
            }
            let mut line_px = options.style.line_px;
            if ui
                .add(egui::Slider::new(&mut line_px, 1.0..=12.0).text("line width"))
                .changed()
            {
                self.ctl.set_line_px(line_px);
            }

            ui.separator();
            let vis = &options.style.visibility;
            let mut show = vis.annotations;
            if ui.checkbox(&mut show, "Show annotations").changed() {
                self.ctl.set_show_annotations(show);
            }
            ui.indent("kinds", |ui| {
                for kind in AnnoKind::ALL {
                    let mut visible = vis.is_kind_visible(kind);
                    if ui
                        .add_enabled(vis.annotations, egui::Checkbox::new(&mut visible, kind.name()))
                        .changed()
                    {
                        self.ctl.set_kind_visible(kind, visible);
                    }
                }
            });
            let mut show_markers = options.style.show_markers;
            if ui.checkbox(&mut show_markers, "Show markers").changed() {
                self.ctl.set_show_markers(show_markers);
            }
            let mut show_grid = options.style.show_grid;
            if ui.checkbox(&mut show_grid, "Show grid").changed() {
                self.ctl.set_show_grid(show_grid);
            }
            let mut visible_only = options.export_visible_only;
            if ui
                .checkbox(&mut visible_only, "Export visible only")
                .changed()
            {
                self.ctl.set_export_visible_only(visible_only);
            }
            if state.mode == Mode::Polyline {
                ui.separator();
                ui.label("Double tap or Enter finishes the polyline.");
            }
        })
        .response
    }
}
