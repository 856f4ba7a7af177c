use crate::{cmerr, result::CmError};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Linear length units with millimeters as base.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Mm,
    Cm,
    Inch,
}
impl Unit {
    pub const ALL: [Unit; 3] = [Unit::Mm, Unit::Cm, Unit::Inch];

    fn mm_per_unit(self) -> f64 {
        match self {
            Unit::Mm => 1.0,
            Unit::Cm => 10.0,
            Unit::Inch => 25.4,
        }
    }
    pub fn from_mm(self, mm: f64) -> f64 {
        mm / self.mm_per_unit()
    }
    pub fn label(self) -> &'static str {
        match self {
            Unit::Mm => "mm",
            Unit::Cm => "cm",
            Unit::Inch => "in",
        }
    }
}
impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
impl FromStr for Unit {
    type Err = CmError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mm" => Ok(Unit::Mm),
            "cm" => Ok(Unit::Cm),
            "inch" | "in" => Ok(Unit::Inch),
            _ => Err(cmerr!("unknown unit '{}', expected mm, cm or inch", s)),
        }
    }
}

#[cfg(test)]
use crate::domain::floats_close;

#[test]
fn test_units() {
    assert!(floats_close(Unit::Cm.from_mm(25.0), 2.5));
    assert!(floats_close(Unit::Inch.from_mm(25.4), 1.0));
    assert!(floats_close(Unit::Inch.mm_per_unit() * 2.0, 50.8));
    assert!(floats_close(Unit::Mm.from_mm(3.25), 3.25));
    assert_eq!("inch".parse::<Unit>(), Ok(Unit::Inch));
    assert_eq!(" CM ".parse::<Unit>(), Ok(Unit::Cm));
    assert!("furlong".parse::<Unit>().is_err());
    assert_eq!(serde_json::to_string(&Unit::Inch).unwrap(), "\"inch\"");
}
