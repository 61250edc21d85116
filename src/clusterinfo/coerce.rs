//! Scalar coercions for single rladmin table cells.
//!
//! rladmin packs compound values into one token: memory sizes carry a unit
//! suffix and an optional sign, shard and memory usage are `used/max` pairs,
//! and database endpoints are slash-delimited lists. Each function here turns
//! one trimmed cell into a typed value.

use std::fmt;
use std::net::{AddrParseError, IpAddr};
use std::num::{ParseFloatError, ParseIntError};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Bytes per gibibyte; all memory values are reported in GiB.
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Errors produced while coercing a single cell.
#[derive(Error, Debug)]
pub enum CoerceError {
    #[error("unrecognized size suffix in '{raw}'")]
    SizeSuffix { raw: String },

    #[error("invalid number '{raw}': {source}")]
    Float {
        raw: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("invalid integer '{raw}': {source}")]
    Integer {
        raw: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid boolean '{raw}'")]
    Bool { raw: String },

    #[error("unable to parse '{raw}' as address: {source}")]
    Address {
        raw: String,
        #[source]
        source: AddrParseError,
    },

    #[error("unable to split '{raw}' into parts for {what}")]
    Split { raw: String, what: &'static str },

    #[error("unable to parse '{raw}' as {what}: {source}")]
    Part {
        raw: String,
        what: &'static str,
        #[source]
        source: Box<CoerceError>,
    },
}

/// A memory quantity in gibibytes.
///
/// Serializes as fixed five-decimal text rather than a raw float so JSON and
/// CSV output stay stable across platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct RamFloat(pub f64);

impl RamFloat {
    /// Parse a signed human-readable size such as `53.24GB` or `-1.2MB`.
    pub fn parse(raw: &str) -> Result<Self, CoerceError> {
        let (negative, magnitude) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let bytes = parse_byte_size(magnitude).map_err(|e| match e {
            CoerceError::SizeSuffix { .. } => CoerceError::SizeSuffix {
                raw: raw.to_string(),
            },
            other => other,
        })?;

        let gib = bytes / GIB;
        Ok(Self(if negative { -gib } else { gib }))
    }

    pub fn gib(self) -> f64 {
        self.0
    }
}

impl fmt::Display for RamFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}", self.0)
    }
}

impl Serialize for RamFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Binary unit multipliers keyed by upper-cased suffix.
fn unit_multiplier(unit: &str) -> Option<f64> {
    let exp = match unit {
        "B" | "BYTE" | "BYTES" => 0,
        "KB" | "KILOBYTE" | "KILOBYTES" => 1,
        "MB" | "MEGABYTE" | "MEGABYTES" => 2,
        "GB" | "GIGABYTE" | "GIGABYTES" => 3,
        "TB" | "TERABYTE" | "TERABYTES" => 4,
        "PB" | "PETABYTE" | "PETABYTES" => 5,
        "EB" | "EXABYTE" | "EXABYTES" => 6,
        _ => return None,
    };
    Some(1024f64.powi(exp))
}

/// Parse an unsigned size (`<number><unit>`) into bytes.
fn parse_byte_size(raw: &str) -> Result<f64, CoerceError> {
    let trimmed = raw.trim();
    let split_at = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| CoerceError::SizeSuffix {
            raw: raw.to_string(),
        })?;

    let (number, unit) = trimmed.split_at(split_at);
    let multiplier =
        unit_multiplier(&unit.trim().to_ascii_uppercase()).ok_or_else(|| {
            CoerceError::SizeSuffix {
                raw: raw.to_string(),
            }
        })?;

    let value: f64 = number.trim().parse().map_err(|source| CoerceError::Float {
        raw: number.to_string(),
        source,
    })?;

    Ok(value * multiplier)
}

/// Free and maximum memory, rendered by rladmin as `free/max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryInfo {
    pub free: RamFloat,
    pub max: RamFloat,
}

impl MemoryInfo {
    pub fn parse(raw: &str) -> Result<Self, CoerceError> {
        let (free, max) = split_pair(raw, "memory info")?;
        Ok(Self {
            free: RamFloat::parse(free).map_err(|e| part(free, "memory info", e))?,
            max: RamFloat::parse(max).map_err(|e| part(max, "memory info", e))?,
        })
    }
}

impl fmt::Display for MemoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.free, self.max)
    }
}

/// Shards in use against the node's shard limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShardInfo {
    #[serde(rename = "shardsInUse")]
    pub in_use: u16,
    #[serde(rename = "maxShards")]
    pub max: u16,
}

impl ShardInfo {
    pub fn parse(raw: &str) -> Result<Self, CoerceError> {
        let (in_use, max) = split_pair(raw, "shard counts")?;
        Ok(Self {
            in_use: parse_u16(in_use).map_err(|e| part(in_use, "number of shards", e))?,
            max: parse_u16(max).map_err(|e| part(max, "maximum number of shards", e))?,
        })
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.in_use, self.max)
    }
}

/// An optional IP address. Empty cells mean the node has no such address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Address(pub Option<IpAddr>);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, CoerceError> {
        if raw.is_empty() {
            return Ok(Self(None));
        }
        raw.parse::<IpAddr>()
            .map(|ip| Self(Some(ip)))
            .map_err(|source| CoerceError::Address {
                raw: raw.to_string(),
                source,
            })
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ip) => write!(f, "{ip}"),
            None => Ok(()),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Split a slash-delimited list. Never fails; order and duplicates are kept.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split('/').map(str::to_string).collect()
}

pub fn parse_u16(raw: &str) -> Result<u16, CoerceError> {
    raw.parse().map_err(|source| CoerceError::Integer {
        raw: raw.to_string(),
        source,
    })
}

pub fn parse_bool(raw: &str) -> Result<bool, CoerceError> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(CoerceError::Bool {
            raw: raw.to_string(),
        }),
    }
}

/// Split `a/b` into exactly two halves.
fn split_pair<'a>(raw: &'a str, what: &'static str) -> Result<(&'a str, &'a str), CoerceError> {
    let mut parts = raw.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(CoerceError::Split {
            raw: raw.to_string(),
            what,
        }),
    }
}

fn part(raw: &str, what: &'static str, source: CoerceError) -> CoerceError {
    CoerceError::Part {
        raw: raw.to_string(),
        what,
        source: Box::new(source),
    }
}
