//! Bandwidth ceilings for throttled copies.
//!
//! A size specification is a non-negative number with an optional unit
//! suffix: `b`, `k`, `m`, `g` or `t` (case-insensitive) for bytes, KiB,
//! MiB, GiB and TiB. A bare number means KiB.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

static SIZE_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?<value>[0-9]+(?:\.[0-9]+)?)(?<unit>[bkmgtBKMGT])?$").unwrap());

const UNIT: u64 = 1024;

/// Bytes per second. Always a non-zero multiple of 1024.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bandwidth(u64);

impl Bandwidth {
    pub fn from_bytes(bytes: u64) -> Self { Self((bytes / UNIT).max(1).saturating_mul(UNIT)) }

    pub fn from_kib(kib: u64) -> Self { Self::from_bytes(kib.saturating_mul(UNIT)) }

    pub fn bytes_per_second(self) -> u64 { self.0 }

    /// How long moving `bytes` should take at this rate.
    pub fn ideal_elapsed(self, bytes: u64) -> Duration {
        Duration::from_secs_f64(bytes as f64 / self.0 as f64)
    }

    fn from_scaled(bytes: f64) -> Self {
        // `as` saturates on overflow and maps NaN to zero.
        let units = (bytes / UNIT as f64) as u64;
        Self(units.max(1).saturating_mul(UNIT))
    }
}

impl FromStr for Bandwidth {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self> {
        let invalid = || Error::InvalidBandwidth(spec.to_string());

        let caps = SIZE_SPEC.captures(spec).ok_or_else(invalid)?;
        let value: f64 = caps["value"].parse().map_err(|_| invalid())?;

        let multiplier = match caps.name("unit").map(|m| m.as_str().to_ascii_lowercase()) {
            None => UNIT,
            Some(unit) => match unit.as_str() {
                "b" => 1,
                "k" => UNIT,
                "m" => UNIT.pow(2),
                "g" => UNIT.pow(3),
                "t" => UNIT.pow(4),
                _ => return Err(invalid()),
            },
        };

        Ok(Self::from_scaled(value * multiplier as f64))
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}b", self.0) }
}

impl Serialize for Bandwidth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bandwidth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Kib(u64),
            Spec(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Kib(kib) => Ok(Self::from_kib(kib)),
            Raw::Spec(spec) => spec.parse().map_err(serde::de::Error::custom),
        }
    }
}
