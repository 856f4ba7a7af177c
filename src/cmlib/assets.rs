//! Loading the image and its calibration from files or http(s) urls.
use crate::{
    calibration::{CalibrationData, ImageSize, calibration_or_default},
    cmerr,
    file_util::{self, basename},
    result::{CmResult, to_cm},
};
use image::RgbaImage;
use std::{sync::mpsc, thread, time::Duration};
use tracing::{info, warn};

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn fetch_bytes(url: &str, timeout: Duration) -> CmResult<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(to_cm)?;
    let resp = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| cmerr!("cannot fetch {url} due to {e:?}"))?;
    resp.bytes().map(|b| b.to_vec()).map_err(to_cm)
}

/// Text of a local file or of an http(s) resource.
pub fn fetch_text(source: &str, timeout: Duration) -> CmResult<String> {
    if is_url(source) {
        let bytes = fetch_bytes(source, timeout)?;
        String::from_utf8(bytes).map_err(to_cm)
    } else {
        file_util::read_to_string(source)
    }
}

pub fn load_image(source: &str, timeout: Duration) -> CmResult<RgbaImage> {
    let im = if is_url(source) {
        image::load_from_memory(&fetch_bytes(source, timeout)?).map_err(to_cm)?
    } else {
        image::open(source).map_err(|e| cmerr!("cannot open image {source} due to {e:?}"))?
    };
    info!("loaded image {source} of size {}x{}", im.width(), im.height());
    Ok(im.into_rgba8())
}

/// Loads calibration data for the image `image_source`. Without a source, when loading
/// fails, or when it takes longer than `timeout`, the overlay starts without markers.
pub fn load_calibration(
    source: Option<&str>,
    image_source: &str,
    image_size: ImageSize,
    timeout: Duration,
) -> CalibrationData {
    let Some(source) = source else {
        info!("no calibration source, measurements will have scale 0");
        return CalibrationData::empty(Some(image_size));
    };
    let (tx, rx) = mpsc::channel();
    let src = source.to_string();
    thread::spawn(move || {
        // the receiver might have timed out already
        let _ = tx.send(fetch_text(&src, timeout));
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(json)) => {
            let data = calibration_or_default(&json, Some(basename(image_source)), Some(image_size));
            info!(
                "loaded calibration from {source} with {} markers",
                data.markers.len()
            );
            data
        }
        Ok(Err(e)) => {
            warn!("could not load calibration from {source}: {e}");
            CalibrationData::empty(Some(image_size))
        }
        Err(_) => {
            warn!("loading calibration from {source} timed out after {timeout:?}");
            CalibrationData::empty(Some(image_size))
        }
    }
}

#[cfg(test)]
use crate::{defer_file_removal, file_util::DEFAULT_TMPDIR};

#[test]
fn test_load_calibration_from_file() -> CmResult<()> {
    let path = DEFAULT_TMPDIR.join("assets_test").join("calib.json");
    defer_file_removal!(&path);
    let json = r#"{
        "a.png": {"markers": [{"id": "x", "corners": [{"x":0,"y":0},{"x":4,"y":0},{"x":4,"y":4},{"x":0,"y":4}], "mm_per_px": 0.1}]},
        "shot.png": {"markers": [{"corners": [{"x":0,"y":0},{"x":8,"y":0},{"x":8,"y":8},{"x":0,"y":8}], "mm_per_px": 0.3}]}
    }"#;
    file_util::write(&path, json)?;
    let size = ImageSize {
        width: 100,
        height: 50,
    };
    let src = path.to_string_lossy().to_string();
    let data = load_calibration(Some(src.as_str()), "/some/dir/shot.png", size, Duration::from_secs(5));
    assert_eq!(data.markers.len(), 1);
    assert_eq!(data.markers[0].mm_per_px, Some(0.3));
    assert_eq!(data.image_size, Some(size));
    Ok(())
}

#[test]
fn test_load_calibration_degrades() {
    let size = ImageSize {
        width: 3,
        height: 2,
    };
    let timeout = Duration::from_secs(5);
    let missing = DEFAULT_TMPDIR
        .join("assets_test")
        .join("does_not_exist.json")
        .to_string_lossy()
        .to_string();
    let data = load_calibration(Some(missing.as_str()), "x.png", size, timeout);
    assert!(data.markers.is_empty());
    assert_eq!(data.image_size, Some(size));
    let data = load_calibration(None, "x.png", size, timeout);
    assert!(data.markers.is_empty());
}

#[test]
fn test_load_image() -> CmResult<()> {
    let path = DEFAULT_TMPDIR.join("assets_test").join("im.png");
    defer_file_removal!(&path);
    let im = RgbaImage::from_pixel(5, 7, image::Rgba([1, 2, 3, 255]));
    file_util::write(&path, crate::export::encode_png(&im)?)?;
    let loaded = load_image(&path.to_string_lossy(), Duration::from_secs(1))?;
    assert_eq!(loaded, im);
    assert!(load_image("no/such/file.png", Duration::from_secs(1)).is_err());
    Ok(())
}
