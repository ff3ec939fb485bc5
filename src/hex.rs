use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axial coordinates for a hex grid (q, r). The implicit cube coordinate is `s = -q - r`.
///
/// Serialized as the string `"q,r"` so that it can key JSON maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid hex coordinate '{0}', expected \"q,r\"")]
pub struct ParseHexError(String);

impl Hex {
    pub const ORIGIN: Hex = Hex { q: 0, r: 0 };

    pub const DIRECTIONS: [Hex; 6] = [
        Hex { q: 1, r: 0 },  // East
        Hex { q: 1, r: -1 }, // Northeast
        Hex { q: 0, r: -1 }, // Northwest
        Hex { q: -1, r: 0 }, // West
        Hex { q: -1, r: 1 }, // Southwest
        Hex { q: 0, r: 1 },  // Southeast
    ];

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Converts "odd-r" offset coordinates (rows shoved right on odd rows) to axial.
    pub fn from_offset(col: i32, row: i32) -> Self {
        Self {
            q: col - (row - (row & 1)) / 2,
            r: row,
        }
    }

    pub fn to_offset(self) -> (i32, i32) {
        (self.q + (self.r - (self.r & 1)) / 2, self.r)
    }

    #[inline]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    pub fn neighbors(self) -> impl Iterator<Item = Hex> {
        Self::DIRECTIONS.into_iter().map(move |d| self + d)
    }

    #[inline]
    pub fn distance(self, other: Hex) -> i32 {
        ((self.q - other.q).abs() + (self.r - other.r).abs() + (self.s() - other.s()).abs()) / 2
    }

    /// All hexes with distance `<= radius`, ordered by q then r.
    pub fn ring_inclusive(self, radius: i32) -> impl Iterator<Item = Hex> {
        let radius = radius.max(0);
        (-radius..=radius).flat_map(move |dq| {
            let dr_min = (-radius).max(-dq - radius);
            let dr_max = radius.min(-dq + radius);
            (dr_min..=dr_max).map(move |dr| Hex::new(self.q + dq, self.r + dr))
        })
    }
}

impl std::ops::Add for Hex {
    type Output = Hex;

    fn add(self, other: Hex) -> Hex {
        Hex {
            q: self.q + other.q,
            r: self.r + other.r,
        }
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q, self.r)
    }
}

impl FromStr for Hex {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (q, r) = s
            .split_once(',')
            .ok_or_else(|| ParseHexError(s.to_string()))?;
        let q = q
            .trim()
            .parse()
            .map_err(|_| ParseHexError(s.to_string()))?;
        let r = r
            .trim()
            .parse()
            .map_err(|_| ParseHexError(s.to_string()))?;
        Ok(Hex { q, r })
    }
}

impl From<Hex> for String {
    fn from(hex: Hex) -> Self {
        hex.to_string()
    }
}

impl TryFrom<String> for Hex {
    type Error = ParseHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
