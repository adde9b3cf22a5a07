use std::collections::{BTreeMap, BTreeSet};

use gowin_bitstream::{BitstreamLayout, frame_padding, header_device};
use gowin_types::{BitMatrix, TileCoord};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;
use unnamed_entity::{EntityId, EntityVec};

use crate::{
    ChipDbError, TileTypeId,
    bel::{Bel, BelKind, bank_bel},
    tile::Tile,
};

/// A wire at a grid position.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Wire {
    pub tile: TileCoord,
    pub name: String,
}

impl Wire {
    pub fn new(tile: TileCoord, name: impl Into<String>) -> Self {
        Self {
            tile,
            name: name.into(),
        }
    }
}

impl core::fmt::Display for Wire {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}/{}", self.tile, self.name)
    }
}

/// A bel at a grid position.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct BelCoord {
    pub tile: TileCoord,
    pub bel: String,
}

impl BelCoord {
    pub fn new(tile: TileCoord, bel: impl Into<String>) -> Self {
        Self {
            tile,
            bel: bel.into(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Pin name to the I/O bel bonded to it.
    pub pins: BTreeMap<String, BelCoord>,
}

impl Package {
    pub fn pin_of(&self, bel: &BelCoord) -> Option<&str> {
        self.pins
            .iter()
            .find(|(_, loc)| *loc == bel)
            .map(|(pin, _)| pin.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub tiles: EntityVec<TileTypeId, Tile>,
    pub grid: Array2<TileTypeId>,
    /// Bit-free wire renames.
    pub aliases: BTreeMap<Wire, Wire>,
    pub cmd_hdr: Vec<Vec<u8>>,
    pub cmd_ftr: Vec<Vec<u8>>,
    pub layout: BitstreamLayout,
    /// The unconfigured bitmap.
    pub template: BitMatrix,
    /// Bank of every I/O bel.
    pub iob_banks: BTreeMap<BelCoord, u32>,
    /// Corner tile holding each bank's `BANK{n}` bel.
    pub bank_tiles: BTreeMap<u32, TileCoord>,
    pub packages: BTreeMap<String, Package>,
}

impl Device {
    pub fn rows(&self) -> usize {
        self.grid.nrows()
    }

    pub fn cols(&self) -> usize {
        self.grid.ncols()
    }

    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + use<> {
        let cols = self.cols();
        (0..self.rows()).flat_map(move |row| (0..cols).map(move |col| TileCoord::new(row, col)))
    }

    pub fn tile_type(&self, crd: TileCoord) -> TileTypeId {
        self.grid[[crd.row, crd.col]]
    }

    pub fn tile(&self, crd: TileCoord) -> &Tile {
        &self.tiles[self.tile_type(crd)]
    }

    pub fn get_tile(&self, crd: TileCoord) -> Option<&Tile> {
        let ttid = *self.grid.get([crd.row, crd.col])?;
        self.tiles.get(ttid)
    }

    pub fn bel(&self, bel: &BelCoord) -> Option<&Bel> {
        self.get_tile(bel.tile)?.bels.get(&bel.bel)
    }

    /// Height in bits of every grid row.
    pub fn row_heights(&self) -> Vec<usize> {
        (0..self.rows())
            .map(|row| self.tile(TileCoord::new(row, 0)).height)
            .collect()
    }

    /// Width in bits of every grid column.
    pub fn col_widths(&self) -> Vec<usize> {
        (0..self.cols())
            .map(|col| self.tile(TileCoord::new(0, col)).width)
            .collect()
    }

    pub fn iob_bank(&self, bel: &BelCoord) -> Option<u32> {
        self.iob_banks.get(bel).copied()
    }

    /// The canonical wire `wire` is an alias of, or `wire` itself.
    pub fn resolve_alias(&self, wire: &Wire) -> Wire {
        let mut cur = wire;
        let mut seen = BTreeSet::new();
        while let Some(next) = self.aliases.get(cur) {
            if !seen.insert(cur) {
                warn!("alias cycle through {cur}");
                break;
            }
            cur = next;
        }
        cur.clone()
    }

    pub fn has_alias(&self, tile: TileCoord, wire: &str) -> bool {
        self.aliases.contains_key(&Wire::new(tile, wire))
    }

    /// Checks the structural invariants the codec relies on.
    pub fn validate(&self) -> Result<(), ChipDbError> {
        for crd in self.coords() {
            let ttid = self.tile_type(crd);
            if ttid.to_idx() >= self.tiles.len() {
                return Err(ChipDbError::BadTileType {
                    tile: crd,
                    tile_type: ttid.to_idx(),
                });
            }
        }
        let heights = self.row_heights();
        let widths = self.col_widths();
        for crd in self.coords() {
            let tile = self.tile(crd);
            if tile.height != heights[crd.row] {
                return Err(ChipDbError::RaggedRow { row: crd.row });
            }
            if tile.width != widths[crd.col] {
                return Err(ChipDbError::RaggedColumn { col: crd.col });
            }
        }
        let expected: (usize, usize) = (heights.iter().sum(), widths.iter().sum());
        let found = (self.template.height(), self.template.width());
        if expected != found {
            return Err(ChipDbError::TemplateSize { expected, found });
        }
        // the parser strips the id code's padding, the emitter pads to a byte
        if let Some(id) = header_device(&self.cmd_hdr) {
            let width = self.template.width();
            if frame_padding(width) != id.padding {
                return Err(ChipDbError::FramePadding {
                    idcode: id.idcode,
                    width,
                    padding: id.padding,
                });
            }
        }
        for (&bank, &crd) in &self.bank_tiles {
            let ok = self
                .get_tile(crd)
                .and_then(|tile| tile.bels.get(&bank_bel(bank)))
                .is_some_and(|bel| matches!(bel.kind, BelKind::Bank(_)));
            if !ok {
                return Err(ChipDbError::UnknownBankTile { bank });
            }
        }
        for (bel, &bank) in &self.iob_banks {
            if !self.bank_tiles.contains_key(&bank) {
                return Err(ChipDbError::UnknownBankTile { bank });
            }
            if !matches!(self.bel(bel).map(|bel| &bel.kind), Some(BelKind::Iob(_))) {
                return Err(ChipDbError::UnknownBel { bel: bel.clone() });
            }
        }
        for (_, tile) in &self.tiles {
            for (a, b, bits) in tile.bel_overlaps() {
                warn!(
                    "{dev} tile {tile}: bels {a} and {b} share bits {bits:?}",
                    dev = self.name,
                    tile = tile.name
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bel::{BankTable, IobTable};
    use assert_matches::assert_matches;
    use gowin_types::bitset;

    /// 2x3 grid: row 0 is 2 bits high, row 1 is 3; columns are 4, 2, 4 wide.
    pub(crate) fn test_device() -> Device {
        let mut tiles = EntityVec::new();
        let mut corner = Tile::new("CORNER", 2, 4);
        corner.bels.insert(
            bank_bel(0),
            Bel::new(BelKind::Bank(BankTable::default())).with_mode("ENABLE", bitset([(0, 0)])),
        );
        let corner = tiles.push(corner);
        let narrow = tiles.push(Tile::new("NARROW_T", 2, 2));
        let mut iob = Tile::new("IOB", 2, 4);
        iob.bels
            .insert("IOBA".into(), Bel::new(BelKind::Iob(IobTable::default())));
        let iob = tiles.push(iob);
        let logic = tiles.push(Tile::new("LOGIC", 3, 4));
        let narrow_l = tiles.push(Tile::new("NARROW_L", 3, 2));
        let grid = Array2::from_shape_vec((2, 3), vec![corner, narrow, iob, logic, narrow_l, logic])
            .unwrap();
        Device {
            name: "TEST".into(),
            tiles,
            grid,
            aliases: BTreeMap::new(),
            cmd_hdr: vec![],
            cmd_ftr: vec![],
            layout: BitstreamLayout {
                config_line: 0,
                checksum_line: 0,
                footer_checksum_line: 0,
            },
            template: BitMatrix::new(5, 10),
            iob_banks: BTreeMap::from_iter([(BelCoord::new(TileCoord::new(0, 2), "IOBA"), 0)]),
            bank_tiles: BTreeMap::from_iter([(0, TileCoord::new(0, 0))]),
            packages: BTreeMap::new(),
        }
    }

    #[test]
    fn valid() {
        let dev = test_device();
        dev.validate().unwrap();
        assert_eq!(dev.row_heights(), [2, 3]);
        assert_eq!(dev.col_widths(), [4, 2, 4]);
        assert_eq!(dev.tile(TileCoord::new(1, 2)).name, "LOGIC");
        assert!(dev.get_tile(TileCoord::new(2, 0)).is_none());
    }

    #[test]
    fn ragged() {
        let mut dev = test_device();
        let wide = dev.tiles.push(Tile::new("WIDE", 3, 6));
        dev.grid[[1, 2]] = wide;
        assert_matches!(dev.validate(), Err(ChipDbError::RaggedColumn { col: 2 }));

        let mut dev = test_device();
        let tall = dev.tiles.push(Tile::new("TALL", 4, 2));
        dev.grid[[1, 1]] = tall;
        assert_matches!(dev.validate(), Err(ChipDbError::RaggedRow { row: 1 }));
    }

    #[test]
    fn template_size() {
        let mut dev = test_device();
        dev.template = BitMatrix::new(5, 9);
        assert_matches!(
            dev.validate(),
            Err(ChipDbError::TemplateSize {
                expected: (5, 10),
                found: (5, 9)
            })
        );
    }

    #[test]
    fn frame_padding_matches_id() {
        let gw1n9 = vec![
            vec![0xff; 4],
            vec![0xff; 4],
            vec![0xa5, 0xc3],
            vec![0x06, 0, 0, 0, 0x11, 0x00, 0x58, 0x1b],
        ];
        let mut dev = test_device();
        dev.cmd_hdr = gw1n9;
        assert_matches!(
            dev.validate(),
            Err(ChipDbError::FramePadding {
                idcode: 0x1100_581b,
                width: 10,
                padding: 4
            })
        );

        // 12-bit frames plus 4 filler bits fill two bytes
        for tile in dev.tiles.values_mut() {
            if tile.name.starts_with("NARROW") {
                tile.width = 4;
            }
        }
        dev.template = BitMatrix::new(5, 12);
        dev.validate().unwrap();

        // GW1N-1 frames carry no filler
        dev.cmd_hdr[3] = vec![0x06, 0, 0, 0, 0x09, 0x00, 0x28, 0x1b];
        assert_matches!(
            dev.validate(),
            Err(ChipDbError::FramePadding { padding: 0, .. })
        );

        // unknown id codes are left to the parser
        dev.cmd_hdr[3] = vec![0x06, 0, 0, 0, 0x12, 0x34, 0x56, 0x78];
        dev.validate().unwrap();
    }

    #[test]
    fn bad_bank() {
        let mut dev = test_device();
        dev.bank_tiles.insert(1, TileCoord::new(1, 1));
        assert_matches!(
            dev.validate(),
            Err(ChipDbError::UnknownBankTile { bank: 1 })
        );
    }

    #[test]
    fn aliases() {
        let mut dev = test_device();
        let a = Wire::new(TileCoord::new(0, 1), "SPINE0");
        let b = Wire::new(TileCoord::new(0, 0), "SPINE0");
        let c = Wire::new(TileCoord::new(1, 0), "GT00");
        dev.aliases.insert(a.clone(), b.clone());
        dev.aliases.insert(b.clone(), c.clone());
        assert_eq!(dev.resolve_alias(&a), c);
        assert_eq!(dev.resolve_alias(&c), c);
        assert!(dev.has_alias(TileCoord::new(0, 1), "SPINE0"));
        assert!(!dev.has_alias(TileCoord::new(1, 0), "GT00"));

        dev.aliases.insert(c.clone(), a.clone());
        // cycle: stops where it detects the loop
        let res = dev.resolve_alias(&a);
        assert!([&a, &b, &c].contains(&&res));
    }

    #[test]
    fn package_pin() {
        let pkg = Package {
            pins: BTreeMap::from_iter([(
                "T3".to_string(),
                BelCoord::new(TileCoord::new(0, 2), "IOBA"),
            )]),
        };
        assert_eq!(
            pkg.pin_of(&BelCoord::new(TileCoord::new(0, 2), "IOBA")),
            Some("T3")
        );
        assert_eq!(
            pkg.pin_of(&BelCoord::new(TileCoord::new(0, 2), "IOBB")),
            None
        );
    }
}
