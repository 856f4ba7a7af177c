use crate::result::{CmResult, to_cm};
use lazy_static::lazy_static;
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info};

lazy_static! {
    pub static ref DEFAULT_TMPDIR: PathBuf = std::env::temp_dir().join("calibmeasure");
}
lazy_static! {
    pub static ref DEFAULT_HOMEDIR: PathBuf = match dirs::home_dir() {
        Some(p) => p.join(".calibmeasure"),
        _ => std::env::temp_dir().join("calibmeasure"),
    };
}

/// File name of a path or url, used to look up per-image calibration entries.
pub fn basename(src: &str) -> &str {
    let src = src.split(['?', '#']).next().unwrap_or(src);
    src.rsplit(['/', '\\']).next().unwrap_or(src)
}

pub fn read_to_string<P>(p: P) -> CmResult<String>
where
    P: AsRef<Path> + Debug,
{
    fs::read_to_string(&p).map_err(|e| crate::cmerr!("could not read {:?} due to {:?}", p, e))
}

/// Creates missing parent folders.
pub fn write<P, C>(path: P, contents: C) -> CmResult<()>
where
    P: AsRef<Path> + Debug,
    C: AsRef<[u8]>,
{
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(to_cm)?;
        }
    }
    fs::write(&path, contents).map_err(|e| crate::cmerr!("could not write {:?} due to {:?}", path, e))
}

pub fn checked_remove<'a, P: AsRef<Path> + Debug>(
    path: &'a P,
    func: fn(p: &'a P) -> std::io::Result<()>,
) {
    match func(path) {
        Ok(_) => info!("removed {path:?}"),
        Err(e) => error!("could not remove {path:?} due to {e:?}"),
    }
}
#[macro_export]
macro_rules! defer_file_removal {
    ($path:expr) => {
        let func = || $crate::file_util::checked_remove($path, std::fs::remove_file);
        $crate::defer!(func);
    };
}
#[allow(clippy::crate_in_macro_def)]
#[macro_export]
macro_rules! defer {
    ($f:expr) => {
        let _dfr = $crate::file_util::Defer { func: $f };
    };
}
pub struct Defer<F: FnMut()> {
    pub func: F,
}
impl<F: FnMut()> Drop for Defer<F> {
    fn drop(&mut self) {
        (self.func)();
    }
}

#[test]
fn test_basename() {
    assert_eq!(basename("a/b/c.png"), "c.png");
    assert_eq!(basename("C:\\x\\y.jpg"), "y.jpg");
    assert_eq!(basename("https://host/img/k.png?token=1#frag"), "k.png");
    assert_eq!(basename("plain.png"), "plain.png");
}

#[test]
fn test_write_read() -> CmResult<()> {
    let path = DEFAULT_TMPDIR.join("file_util_test").join("x.txt");
    defer_file_removal!(&path);
    write(&path, "content")?;
    assert_eq!(read_to_string(&path)?, "content");
    Ok(())
}
