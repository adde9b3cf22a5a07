use ndarray::{Array2, ArrayView1, s};
use serde::{Deserialize, Serialize};

use crate::coord::{BitSet, TileBit};

/// A dense 2-D matrix of configuration bits, indexed `[row, col]`.
///
/// Used both for the whole-device bitmap and for per-tile windows.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BitMatrix {
    bits: Array2<bool>,
}

impl BitMatrix {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            bits: Array2::from_elem((height, width), false),
        }
    }

    pub fn from_array(bits: Array2<bool>) -> Self {
        Self { bits }
    }

    /// Builds a matrix from equally long rows. Returns `None` on ragged input.
    pub fn from_rows(rows: &[Vec<bool>]) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.len());
        if rows.iter().any(|row| row.len() != width) {
            return None;
        }
        let bits = Array2::from_shape_fn((height, width), |(r, c)| rows[r][c]);
        Some(Self { bits })
    }

    pub fn height(&self) -> usize {
        self.bits.nrows()
    }

    pub fn width(&self) -> usize {
        self.bits.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[[row, col]]
    }

    pub fn set(&mut self, row: usize, col: usize, val: bool) {
        self.bits[[row, col]] = val;
    }

    pub fn bit(&self, bit: TileBit) -> bool {
        self.get(bit.row, bit.col)
    }

    pub fn set_bit(&mut self, bit: TileBit, val: bool) {
        self.set(bit.row, bit.col, val);
    }

    pub fn contains(&self, bit: TileBit) -> bool {
        bit.row < self.height() && bit.col < self.width()
    }

    /// The subset of `bits` that currently reads 1.
    pub fn observed(&self, bits: &BitSet) -> BitSet {
        bits.iter().copied().filter(|&bit| self.bit(bit)).collect()
    }

    pub fn is_zero(&self) -> bool {
        self.bits.iter().all(|&x| !x)
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&x| x).count()
    }

    pub fn window(&self, row: usize, col: usize, height: usize, width: usize) -> BitMatrix {
        BitMatrix {
            bits: self
                .bits
                .slice(s![row..row + height, col..col + width])
                .to_owned(),
        }
    }

    pub fn put_window(&mut self, row: usize, col: usize, window: &BitMatrix) {
        self.bits
            .slice_mut(s![row..row + window.height(), col..col + window.width()])
            .assign(&window.bits);
    }

    /// Left-right mirror image.
    pub fn mirrored(&self) -> BitMatrix {
        BitMatrix {
            bits: self.bits.slice(s![.., ..;-1]).to_owned(),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, bool>> {
        self.bits.rows().into_iter()
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.bits
    }
}

impl core::fmt::Display for BitMatrix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for row in self.rows() {
            for &bit in row {
                write!(f, "{}", u8::from(bit))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_roundtrip() {
        let mut m = BitMatrix::new(4, 6);
        m.set(1, 2, true);
        m.set(3, 5, true);
        let w = m.window(1, 2, 3, 4);
        assert_eq!((w.height(), w.width()), (3, 4));
        assert!(w.get(0, 0));
        assert!(w.get(2, 3));
        assert_eq!(w.count_ones(), 2);

        let mut n = BitMatrix::new(4, 6);
        n.put_window(1, 2, &w);
        assert_eq!(n, m);
    }

    #[test]
    fn mirror() {
        let m = BitMatrix::from_rows(&[vec![true, false, false], vec![false, true, true]]).unwrap();
        let r = m.mirrored();
        assert_eq!(
            r,
            BitMatrix::from_rows(&[vec![false, false, true], vec![true, true, false]]).unwrap()
        );
        assert_eq!(r.mirrored(), m);
    }

    #[test]
    fn ragged_rows() {
        assert!(BitMatrix::from_rows(&[vec![true], vec![true, false]]).is_none());
    }

    #[test]
    fn observed_subset() {
        let mut m = BitMatrix::new(2, 2);
        m.set(0, 1, true);
        let bits = crate::coord::bitset([(0, 0), (0, 1), (1, 1)]);
        assert_eq!(m.observed(&bits), crate::coord::bitset([(0, 1)]));
    }
}
