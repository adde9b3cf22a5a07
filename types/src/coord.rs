use std::collections::BTreeSet;

use jzon::JsonValue;
use serde::{Deserialize, Serialize};

/// Position of a tile in the device grid.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub row: usize,
    pub col: usize,
}

impl TileCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl core::fmt::Debug for TileCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "R{}C{}", self.row, self.col)
    }
}

/// Vendor-style name: 1-based `R{row}C{col}`.
impl core::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "R{}C{}", self.row + 1, self.col + 1)
    }
}

/// Position of a configuration bit within a single tile's bit window.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TileBit {
    pub row: usize,
    pub col: usize,
}

impl TileBit {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl core::fmt::Debug for TileBit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.row, self.col)
    }
}

pub type BitSet = BTreeSet<TileBit>;

pub fn bitset(bits: impl IntoIterator<Item = (usize, usize)>) -> BitSet {
    bits.into_iter()
        .map(|(row, col)| TileBit::new(row, col))
        .collect()
}

impl From<TileBit> for JsonValue {
    fn from(bit: TileBit) -> Self {
        jzon::array![bit.row, bit.col]
    }
}

impl From<TileCoord> for JsonValue {
    fn from(crd: TileCoord) -> Self {
        jzon::array![crd.row, crd.col]
    }
}
