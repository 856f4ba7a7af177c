#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod annotations;
pub mod assets;
pub mod calibration;
pub mod cfg;
pub mod control;
pub mod domain;
mod egui_mappers;
pub mod events;
pub mod export;
pub mod file_util;
pub mod gestures;
pub mod measure;
pub mod menu;
pub mod render;
pub mod result;
pub mod tracing_setup;
pub mod units;
pub mod viewport;

pub use annotations::{AnnoKind, Annotation, AnnotationId, AnnotationStore, Calib, GeoFig};
pub use calibration::{CalibrationData, Marker, MarkerId};
pub use control::{Mode, OverlayController, OverlayState};
pub use egui_mappers::{EguiInputMapper, map_key, map_modifiers};
pub use export::ExportPayload;
pub use render::{Renderer, Scene};
pub use units::Unit;
