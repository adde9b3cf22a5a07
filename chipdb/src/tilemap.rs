use std::collections::BTreeMap;

use gowin_types::{BitMatrix, TileCoord};
use rayon::prelude::*;

use crate::device::Device;

/// Per-tile bit windows, keyed by grid position.
pub type TileMap = BTreeMap<TileCoord, BitMatrix>;

/// Bit offsets of every grid row and column; one extra trailing entry holds
/// the total size.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Offsets {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

fn prefix_sums(sizes: &[usize]) -> Vec<usize> {
    let mut res = Vec::with_capacity(sizes.len() + 1);
    let mut pos = 0;
    res.push(pos);
    for &size in sizes {
        pos += size;
        res.push(pos);
    }
    res
}

impl Offsets {
    pub fn new(device: &Device) -> Self {
        Self {
            rows: prefix_sums(&device.row_heights()),
            cols: prefix_sums(&device.col_widths()),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.last().copied().unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.cols.last().copied().unwrap_or(0)
    }
}

/// Cuts `bits` into tile windows. All-zero windows are left out unless
/// `include_empty` is set.
pub fn slice(device: &Device, bits: &BitMatrix, include_empty: bool) -> TileMap {
    let offsets = Offsets::new(device);
    let coords = Vec::from_iter(device.coords());
    coords
        .into_par_iter()
        .filter_map(|crd| {
            let tile = device.tile(crd);
            let window = bits.window(
                offsets.rows[crd.row],
                offsets.cols[crd.col],
                tile.height,
                tile.width,
            );
            if include_empty || !window.is_zero() {
                Some((crd, window))
            } else {
                None
            }
        })
        .collect()
}

/// Writes tile windows back into a device-sized matrix. Missing tiles stay 0.
pub fn reassemble(device: &Device, tiles: &TileMap) -> BitMatrix {
    let offsets = Offsets::new(device);
    let mut res = BitMatrix::new(offsets.height(), offsets.width());
    for (&crd, window) in tiles {
        res.put_window(offsets.rows[crd.row], offsets.cols[crd.col], window);
    }
    res
}

/// A working bitmap with every tile present, starting from the template.
pub fn template_tiles(device: &Device) -> TileMap {
    slice(device, &device.template, true)
}
