use crate::{
    cmerr,
    file_util::{self, DEFAULT_HOMEDIR},
    result::{CmResult, to_cm},
    units::Unit,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};

const CFG_DEFAULT: &str = r#"
    fetch_timeout_ms = 5000
    # font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
    [overlay]
    units = "mm"  # "mm", "cm" or "inch"
    label_scale = 1.35
    line_px = 3.0
    hit_tol_px = 18.0
    snap = false
    snap_px = 15.0
    min_zoom = 0.05
    max_zoom = 40.0
    zoom_step = 1.2
    wheel_step = 1.1
    click_threshold_px = 6.0
    double_tap_ms = 300
    note_text = "Note"
    show_grid = false
    show_markers = true
    export_visible_only = true
    "#;

/// Everything the overlay needs to know at construction time.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OverlayCfg {
    pub units: Unit,
    pub label_scale: f64,
    pub line_px: f64,
    /// Screen pixels, converted to image units with the current zoom.
    pub hit_tol_px: f64,
    pub snap: bool,
    pub snap_px: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub wheel_step: f64,
    pub click_threshold_px: f64,
    pub double_tap_ms: u64,
    pub note_text: String,
    pub show_grid: bool,
    pub show_markers: bool,
    pub export_visible_only: bool,
}
impl Default for OverlayCfg {
    fn default() -> Self {
        get_default_cfg().overlay
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Cfg {
    /// TrueType font for labels. Without it label boxes are drawn without text.
    pub font_path: Option<PathBuf>,
    pub fetch_timeout_ms: u64,
    pub darkmode: Option<bool>,
    pub overlay: OverlayCfg,
}
impl Cfg {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
    /// Reads from the given home folder, falls back to defaults if there is no config file.
    pub fn read(homefolder: &Path) -> CmResult<Self> {
        read_cfg_gen(&get_cfg_path(homefolder))
    }
    pub fn write(&self, homefolder: &Path) -> CmResult<()> {
        let cfg_str = toml::to_string_pretty(self).map_err(to_cm)?;
        let p = get_cfg_path(homefolder);
        file_util::write(&p, cfg_str)?;
        info!("wrote cfg to {p:?}");
        Ok(())
    }
}
impl Default for Cfg {
    fn default() -> Self {
        get_default_cfg()
    }
}

pub fn get_default_cfg() -> Cfg {
    toml::from_str(CFG_DEFAULT).expect("default config broken")
}

pub fn get_cfg_path(homefolder: &Path) -> PathBuf {
    homefolder.join("cfg.toml")
}

pub fn get_log_folder(homefolder: &Path) -> PathBuf {
    homefolder.join("logs")
}

pub fn read_cfg_gen<CFG: Debug + DeserializeOwned + Default>(cfg_toml_path: &Path) -> CmResult<CFG> {
    if cfg_toml_path.exists() {
        let toml_str = file_util::read_to_string(cfg_toml_path)?;
        toml::from_str(&toml_str).map_err(|e| cmerr!("could not parse cfg due to {:?}", e))
    } else {
        warn!("cfg {cfg_toml_path:?} file does not exist. using default cfg");
        Ok(CFG::default())
    }
}

pub fn read_cfg() -> CmResult<Cfg> {
    Cfg::read(&DEFAULT_HOMEDIR)
}

pub fn write_cfg(cfg: &Cfg) -> CmResult<()> {
    cfg.write(&DEFAULT_HOMEDIR)
}

#[cfg(test)]
use crate::{defer_file_removal, file_util::DEFAULT_TMPDIR};

#[test]
fn test_default_cfg() {
    let cfg = get_default_cfg();
    assert_eq!(cfg.overlay.units, Unit::Mm);
    assert_eq!(cfg.overlay.double_tap_ms, 300);
    assert_eq!(cfg.overlay.note_text, "Note");
    assert!(!cfg.overlay.snap);
    assert!(cfg.overlay.export_visible_only);
    assert_eq!(cfg.fetch_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.font_path, None);
    assert_eq!(OverlayCfg::default(), cfg.overlay);
}

#[test]
fn test_read_write() -> CmResult<()> {
    let home = DEFAULT_TMPDIR.join("cfg_test_home");
    let missing: Cfg = read_cfg_gen(&home.join("nothing_here.toml"))?;
    assert_eq!(missing, Cfg::default());
    let mut cfg = Cfg::default();
    cfg.overlay.units = Unit::Inch;
    cfg.overlay.snap_px = 22.0;
    cfg.font_path = Some(PathBuf::from("/some/font.ttf"));
    let p = get_cfg_path(&home);
    defer_file_removal!(&p);
    cfg.write(&home)?;
    let read = Cfg::read(&home)?;
    assert_eq!(read, cfg);
    file_util::write(&p, "overlay = 5")?;
    assert!(Cfg::read(&home).is_err());
    Ok(())
}
