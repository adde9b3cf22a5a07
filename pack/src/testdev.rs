//! Small synthetic devices for unit tests.

use std::collections::BTreeMap;

use gowin_bitstream::BitstreamLayout;
use gowin_chipdb::{
    BelCoord, Device, Pip, PipTable, Tile, Wire,
    bel::{
        BANK_ENABLE, BankTable, Bel, BelKind, IobAttr, IobConfig, IobMode, IobTable, alu_bel,
        bank_bel, dff_bel, iob_bel, lut_bel,
    },
};
use gowin_types::{BitMatrix, BitSet, TileCoord, bitset};
use ndarray::Array2;
use unnamed_entity::EntityVec;

pub const CORNER_TILE: TileCoord = TileCoord { row: 0, col: 0 };
pub const IOB_TILE: TileCoord = TileCoord { row: 0, col: 1 };
pub const LOGIC_TILE: TileCoord = TileCoord { row: 1, col: 0 };

const IOSTDS: [(&str, Option<usize>); 3] = [
    ("LVCMOS18", None),
    ("LVCMOS25", Some(2)),
    ("LVCMOS33", Some(3)),
];

fn pip(dest: &str, src: &str, bits: BitSet) -> Pip {
    Pip {
        dest: dest.into(),
        src: src.into(),
        bits,
    }
}

fn layout() -> BitstreamLayout {
    BitstreamLayout {
        config_line: 0,
        checksum_line: 0,
        footer_checksum_line: 0,
    }
}

/// An I/O bel using columns `o..o + 4` of a 2-row tile.
fn iob(o: usize) -> Bel {
    let mut configs = BTreeMap::new();
    for (iostd, std_bit) in IOSTDS {
        let std_bits = BitSet::from_iter(std_bit.map(|c| gowin_types::TileBit::new(0, o + c)));
        let mut modes = BTreeMap::new();
        for mode in IobMode::ALL {
            let mut base = std_bits.clone();
            let mut attrs = BTreeMap::new();
            match mode {
                IobMode::Ibuf => {
                    base.extend(bitset([(0, o), (1, o + 2)]));
                    attrs.insert(
                        "PULL_MODE".to_string(),
                        IobAttr {
                            mask: bitset([(1, o + 2), (1, o + 3)]),
                            options: BTreeMap::from_iter([
                                ("UP".to_string(), bitset([(1, o + 2)])),
                                ("DOWN".to_string(), bitset([(1, o + 3)])),
                                ("NONE".to_string(), BitSet::new()),
                            ]),
                        },
                    );
                }
                IobMode::Obuf | IobMode::Iobuf => {
                    base.extend(bitset([(0, o + 1), (1, o)]));
                    if mode == IobMode::Iobuf {
                        base.extend(bitset([(0, o)]));
                    }
                    attrs.insert(
                        "DRIVE".to_string(),
                        IobAttr {
                            mask: bitset([(1, o), (1, o + 1)]),
                            options: BTreeMap::from_iter([
                                ("8".to_string(), bitset([(1, o)])),
                                ("12".to_string(), bitset([(1, o + 1)])),
                            ]),
                        },
                    );
                }
            }
            modes.insert(mode, IobConfig { base, attrs });
        }
        configs.insert(iostd.to_string(), modes);
    }
    Bel::new(BelKind::Iob(IobTable { configs }))
}

fn logic_tile() -> Tile {
    let mut tile = Tile::new("LOGIC", 6, 8);
    for (idx, row) in [(0, 0), (1, 2)] {
        let mut lut = Bel::new(BelKind::Lut);
        for i in 0..16 {
            lut = lut.with_flag(i.to_string(), bitset([(row + i / 8, i % 8)]));
        }
        tile.bels.insert(lut_bel(idx), lut);
        let o = idx * 4;
        tile.bels.insert(
            dff_bel(idx),
            Bel::new(BelKind::Dff)
                .with_mode("NONE", BitSet::new())
                .with_mode("DFF", bitset([(4, o)]))
                .with_mode("DFFR", bitset([(4, o), (4, o + 1)]))
                .with_mode("DFFS", bitset([(4, o), (4, o + 2)]))
                .with_mode("DFFN", bitset([(4, o + 3)])),
        );
    }
    tile.bels.insert(
        alu_bel(0),
        Bel::new(BelKind::Alu { lut: lut_bel(0) })
            .with_mode("ADD", bitset([(0, 0), (0, 1), (5, 6)]))
            .with_mode("2", bitset([(5, 6), (5, 7)])),
    );
    tile.pips = PipTable::new([
        pip("A0", "N10", bitset([(5, 0)])),
        pip("A0", "W10", bitset([(5, 1)])),
        pip("A0", "E10", bitset([(5, 0), (5, 1)])),
        pip("B0", "N10", bitset([(5, 2)])),
        pip("B0", "S10", bitset([(5, 3)])),
    ]);
    tile.clock_pips = PipTable::new([
        pip("GB0", "SPINE0", bitset([(5, 4)])),
        pip("GB0", "SPINE1", bitset([(5, 5)])),
    ]);
    tile
}

/// Row 0: bank corner and an I/O tile, 2 bits high. Row 1: two logic tiles,
/// 6 bits high. Every column is 8 bits wide.
pub fn test_device() -> Device {
    let mut tiles = EntityVec::new();

    let mut corner = Tile::new("CORNER", 2, 8);
    corner.bels.insert(
        bank_bel(0),
        Bel::new(BelKind::Bank(BankTable {
            iostd: BTreeMap::from_iter([
                ("LVCMOS18".to_string(), bitset([(1, 0)])),
                ("LVCMOS25".to_string(), bitset([(1, 1)])),
                ("LVCMOS33".to_string(), bitset([(1, 2)])),
            ]),
        }))
        .with_mode(BANK_ENABLE, bitset([(0, 0)])),
    );
    let corner = tiles.push(corner);

    let mut io = Tile::new("IOB", 2, 8);
    io.bels.insert(iob_bel(0), iob(0));
    io.bels.insert(iob_bel(1), iob(4));
    let io = tiles.push(io);

    let logic = tiles.push(logic_tile());

    let grid = Array2::from_shape_vec((2, 2), vec![corner, io, logic, logic]).unwrap();
    let mut aliases = BTreeMap::new();
    for col in 0..2 {
        aliases.insert(
            Wire::new(TileCoord::new(1, col), "SPINE0"),
            Wire::new(CORNER_TILE, "SPINE0"),
        );
    }
    Device {
        name: "TEST".into(),
        tiles,
        grid,
        aliases,
        cmd_hdr: vec![],
        cmd_ftr: vec![],
        layout: layout(),
        template: BitMatrix::new(8, 16),
        iob_banks: BTreeMap::from_iter([
            (BelCoord::new(IOB_TILE, iob_bel(0)), 0),
            (BelCoord::new(IOB_TILE, iob_bel(1)), 0),
        ]),
        bank_tiles: BTreeMap::from_iter([(0, CORNER_TILE)]),
        packages: BTreeMap::new(),
    }
}

/// A single 1x4 tile holding a LUT with four truth table flags.
pub fn scenario_device() -> Device {
    let mut tiles = EntityVec::new();
    let mut tile = Tile::new("LUT", 1, 4);
    let mut lut = Bel::new(BelKind::Lut);
    for i in 0..4 {
        lut = lut.with_flag(i.to_string(), bitset([(0, i)]));
    }
    tile.bels.insert(lut_bel(0), lut);
    let tt = tiles.push(tile);
    Device {
        name: "SCENARIO".into(),
        tiles,
        grid: Array2::from_elem((1, 1), tt),
        aliases: BTreeMap::new(),
        cmd_hdr: vec![],
        cmd_ftr: vec![],
        layout: layout(),
        template: BitMatrix::new(1, 4),
        iob_banks: BTreeMap::new(),
        bank_tiles: BTreeMap::new(),
        packages: BTreeMap::new(),
    }
}

#[test]
fn fixtures_valid() {
    test_device().validate().unwrap();
    scenario_device().validate().unwrap();
}
