use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
};
use tracing::{error, warn};

/// Error of everything that touches the outside world, i.e., files, http, image codecs,
/// and configuration. The measurement core itself never fails.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct CmError {
    msg: String,
}
impl CmError {
    pub fn new(msg: &str) -> CmError {
        CmError {
            msg: msg.to_string(),
        }
    }
    pub fn msg(&self) -> &str {
        &self.msg
    }
}
impl Display for CmError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}
impl Error for CmError {}
impl From<&str> for CmError {
    fn from(value: &str) -> Self {
        CmError::new(value)
    }
}
/// Result type with [`CmError`](CmError) as error type.
pub type CmResult<U> = Result<U, CmError>;

pub fn trace_ok_err<T, E>(x: Result<T, E>) -> Option<T>
where
    E: Debug,
{
    match x {
        Ok(x) => Some(x),
        Err(e) => {
            error!("{e:?}");
            None
        }
    }
}
pub fn trace_ok_warn<T, E>(x: Result<T, E>) -> Option<T>
where
    E: Debug,
{
    match x {
        Ok(x) => Some(x),
        Err(e) => {
            warn!("{e:?}");
            None
        }
    }
}

#[macro_export]
macro_rules! cmerr {
    ($s:literal) => {
        $crate::result::CmError::new(format!($s).as_str())
    };
    ($s:literal, $( $exps:expr ),*) => {
        $crate::result::CmError::new(format!($s, $($exps,)*).as_str())
    }
}

pub fn to_cm<E: Debug>(e: E) -> CmError {
    cmerr!(
        "original error type is '{:?}', error message is '{:?}'",
        std::any::type_name::<E>(),
        e
    )
}

#[cfg(test)]
use std::fs;

#[test]
fn test_to_cm() {
    let io_err = fs::read_to_string("/definitely/not/here.json").map_err(to_cm);
    match io_err {
        Err(e) => assert!(e.msg().contains("io::error")),
        Ok(_) => panic!("reading a missing file must fail"),
    }
    let e = cmerr!("cannot parse {} at {}", "x", 3);
    assert_eq!(e.msg(), "cannot parse x at 3");
    assert_eq!(format!("{e}"), "cannot parse x at 3");
    assert_eq!(trace_ok_warn::<u8, _>(Err(e)), None);
    assert_eq!(trace_ok_err::<_, CmError>(Ok(1)), Some(1));
}
