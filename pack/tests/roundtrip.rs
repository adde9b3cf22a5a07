use std::collections::{BTreeMap, BTreeSet};

use assert_matches::assert_matches;
use gowin_bitstream::{Bitstream, BitstreamLayout};
use gowin_chipdb::{
    BelCoord, Database, Device, Pip, PipTable, Tile, Wire,
    bel::{BANK_ENABLE, BankTable, Bel, BelKind, IobConfig, IobMode, IobTable},
};
use gowin_pack::{
    Cell, CellKind, DecodeOptions, Design, PackError, PackOptions, PipUse, PlaceError, lut_init,
    pack, unpack,
};
use gowin_types::{BitMatrix, BitSet, TileCoord, bitset};
use ndarray::Array2;
use unnamed_entity::EntityVec;

const NETLIST: &str = r#"{
    "creator": "Next Generation Place and Route",
    "modules": {
        "top": {
            "cells": {
                "cnt": {
                    "type": "SLICE",
                    "parameters": { "INIT": "1000000000000001", "FF_USED": "1", "FF_TYPE": "DFFR" },
                    "attributes": { "NEXTPNR_BEL": "X0Y1/SLICE0" }
                },
                "btn_ibuf": {
                    "type": "IOB",
                    "parameters": { "INPUT_USED": "1" },
                    "attributes": { "NEXTPNR_BEL": "X1Y0/IOBA", "&IO_TYPE=LVCMOS33": "1" }
                },
                "$PACKER_GND": {
                    "type": "GND",
                    "parameters": {},
                    "attributes": { "NEXTPNR_BEL": "X0Y0/GND" }
                }
            },
            "netnames": {
                "q": { "attributes": { "ROUTING": "X0Y1/F0;;1;X0Y1/A0;X0Y1/F0/A0;1" } },
                "clk": { "attributes": { "ROUTING": "X1Y1/GB0;X1Y1/SPINE0/GB0;1" } }
            }
        }
    }
}"#;

fn pip(dest: &str, src: &str, bits: BitSet) -> Pip {
    Pip {
        dest: dest.into(),
        src: src.into(),
        bits,
    }
}

fn header() -> Vec<Vec<u8>> {
    vec![
        vec![0xff; 4],
        vec![0xff; 4],
        vec![0xa5, 0xc3],
        // GW1N-1 id code
        vec![0x06, 0, 0, 0, 0x09, 0x00, 0x28, 0x1b],
        vec![0x10, 0, 0, 0, 0, 0, 0, 0],
        vec![0x51, 0, 0, 0, 0xff, 0xff, 0xff, 0xff],
        vec![0x0b, 0, 0, 0],
        vec![0xd2, 0, 0xff, 0xff, 0, 0, 0, 0],
        vec![0x12, 0, 0, 0],
        vec![0x3b, 0x80, 0, 0, 0, 0, 0, 0],
    ]
}

fn device() -> Device {
    let mut tiles = EntityVec::new();

    let mut corner = Tile::new("CORNER", 2, 8);
    corner.bels.insert(
        "BANK0".into(),
        Bel::new(BelKind::Bank(BankTable {
            iostd: BTreeMap::from_iter([
                ("LVCMOS18".to_string(), bitset([(1, 0)])),
                ("LVCMOS33".to_string(), bitset([(1, 1)])),
            ]),
        }))
        .with_mode(BANK_ENABLE, bitset([(0, 0)])),
    );
    let corner = tiles.push(corner);

    let mut configs = BTreeMap::new();
    for (iostd, extra) in [("LVCMOS18", vec![]), ("LVCMOS33", vec![(0, 2)])] {
        let mut modes = BTreeMap::new();
        for (mode, bits) in [
            (IobMode::Ibuf, vec![(0, 0)]),
            (IobMode::Obuf, vec![(0, 1)]),
            (IobMode::Iobuf, vec![(0, 0), (0, 1)]),
        ] {
            let base = bitset(bits.into_iter().chain(extra.iter().copied()));
            modes.insert(
                mode,
                IobConfig {
                    base,
                    attrs: BTreeMap::new(),
                },
            );
        }
        configs.insert(iostd.to_string(), modes);
    }
    let mut iob = Tile::new("IOB", 2, 8);
    iob.bels
        .insert("IOBA".into(), Bel::new(BelKind::Iob(IobTable { configs })));
    let iob = tiles.push(iob);

    let mut logic = Tile::new("LOGIC", 4, 8);
    let mut lut = Bel::new(BelKind::Lut);
    for i in 0..16 {
        lut = lut.with_flag(i.to_string(), bitset([(i / 8, i % 8)]));
    }
    logic.bels.insert("LUT0".into(), lut);
    logic.bels.insert(
        "DFF0".into(),
        Bel::new(BelKind::Dff)
            .with_mode("DFF", bitset([(2, 0)]))
            .with_mode("DFFR", bitset([(2, 0), (2, 1)])),
    );
    logic.pips = PipTable::new([
        pip("A0", "F0", bitset([(3, 0)])),
        pip("A0", "N10", bitset([(3, 1)])),
    ]);
    logic.clock_pips = PipTable::new([pip("GB0", "SPINE0", bitset([(3, 4)]))]);
    let logic = tiles.push(logic);

    Device {
        name: "GW1N-1".into(),
        tiles,
        grid: Array2::from_shape_vec((2, 2), vec![corner, iob, logic, logic]).unwrap(),
        aliases: BTreeMap::from_iter([(
            Wire::new(TileCoord::new(1, 1), "SPINE0"),
            Wire::new(TileCoord::new(0, 0), "SPINE0"),
        )]),
        cmd_hdr: header(),
        cmd_ftr: vec![vec![0; 8], vec![0x08, 0, 0, 0], vec![0xff; 4]],
        layout: BitstreamLayout {
            config_line: 4,
            checksum_line: 5,
            footer_checksum_line: 0,
        },
        template: BitMatrix::new(6, 16),
        iob_banks: BTreeMap::from_iter([(BelCoord::new(TileCoord::new(0, 1), "IOBA"), 0)]),
        bank_tiles: BTreeMap::from_iter([(0, TileCoord::new(0, 0))]),
        packages: BTreeMap::new(),
    }
}

fn items(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn pack_then_unpack() {
    let dev = device();
    dev.validate().unwrap();
    let design = Design::from_nextpnr_json(NETLIST).unwrap();
    let packed = pack(&dev, &design, &PackOptions::default()).unwrap();
    assert!(packed.unroutable.is_empty());

    let text = packed.bitstream.emit();
    let parsed = Bitstream::parse(&text).unwrap();
    assert_eq!(parsed, packed.bitstream);
    assert_eq!(parsed.emit(), text);

    let hdr = &parsed.header;
    assert_eq!(hdr[9], vec![0x3b, 0x80, 0, 0, 0, 0, 0, 6]);
    assert_eq!(&hdr[5][6..], &packed.checksum.to_be_bytes());
    assert_eq!(parsed.footer[0][0], 0x0a);
    assert_eq!(&parsed.footer[0][6..], &packed.checksum.to_be_bytes());

    let unpacked = unpack(&dev, &parsed, &DecodeOptions::default()).unwrap();
    let logic = &unpacked.tiles[&TileCoord::new(1, 0)];
    assert_eq!(lut_init(&logic.bels["LUT0"]), "1000000000000001");
    assert_eq!(logic.bels["DFF0"], items(&["DFFR"]));
    assert_eq!(logic.pips["A0"], "F0");
    assert!(logic.unresolved.is_empty());

    let io = &unpacked.tiles[&TileCoord::new(0, 1)];
    assert_eq!(io.bels["IOBA"], items(&["IBUF", "IO_TYPE=LVCMOS33"]));
    let corner = &unpacked.tiles[&TileCoord::new(0, 0)];
    assert_eq!(corner.bels["BANK0"], items(&["ENABLE", "IO_TYPE=LVCMOS33"]));
    let clk = &unpacked.tiles[&TileCoord::new(1, 1)];
    assert_eq!(clk.clock_pips["GB0"], "SPINE0");

    let mut out = vec![];
    unpacked.dump(&dev, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("INIT=1000000000000001"));
    assert!(out.contains("clock_pip GB0 <- SPINE0 (R0C0/SPINE0)"));
}

#[test]
fn pack_is_idempotent() {
    let dev = device();
    let design = Design::from_nextpnr_json(NETLIST).unwrap();
    let a = pack(&dev, &design, &PackOptions::default()).unwrap();
    let b = pack(&dev, &design, &PackOptions::default()).unwrap();
    assert_eq!(a.bitstream, b.bitstream);
    assert_eq!(a.checksum, b.checksum);
}

#[test]
fn compressed_flag() {
    let dev = device();
    let design = Design::from_nextpnr_json(NETLIST).unwrap();
    let opts = PackOptions {
        compress: true,
        ..Default::default()
    };
    let packed = pack(&dev, &design, &opts).unwrap();
    assert_eq!(packed.bitstream.header[4][6], 0x20);
}

#[test]
fn unroutable_pips_reported() {
    let dev = device();
    let mut design = Design::from_nextpnr_json(NETLIST).unwrap();
    design.pips.push(PipUse {
        tile: TileCoord::new(1, 0),
        src: "W20".into(),
        dest: "A0".into(),
    });
    design.pips.push(PipUse {
        tile: TileCoord::new(0, 1),
        src: "F0".into(),
        dest: "A0".into(),
    });
    let packed = pack(&dev, &design, &PackOptions::default()).unwrap();
    assert_eq!(packed.unroutable.len(), 2);
    // the valid routing is still present
    let unpacked = unpack(&dev, &packed.bitstream, &DecodeOptions::default()).unwrap();
    assert_eq!(unpacked.tiles[&TileCoord::new(1, 0)].pips["A0"], "F0");
}

#[test]
fn placement_errors_collected() {
    let dev = device();
    let design = Design {
        cells: vec![
            Cell::new("a", CellKind::Iob, TileCoord::new(0, 1), 0),
            Cell::new("b", CellKind::Slice, TileCoord::new(1, 1), 0).with_param("INIT", "2"),
            Cell::new("c", CellKind::Slice, TileCoord::new(1, 1), 3).with_param("INIT", "0"),
        ],
        pips: vec![],
    };
    let Err(PackError::Place(errors)) = pack(&dev, &design, &PackOptions::default()) else {
        panic!("expected placement errors");
    };
    assert_eq!(errors.len(), 3);
    assert_matches!(&errors[0], PlaceError::InvalidIoConfig { cell } if cell == "a");
    assert_matches!(&errors[1], PlaceError::InvalidInit { cell, .. } if cell == "b");
    assert_matches!(&errors[2], PlaceError::UnknownBel { cell, .. } if cell == "c");
}

#[test]
fn wrong_size_bitstream() {
    let dev = device();
    let bs = Bitstream::new(header(), BitMatrix::new(5, 16), vec![]);
    assert_matches!(
        unpack(&dev, &bs, &DecodeOptions::default()),
        Err(PackError::FrameSize {
            expected: (6, 16),
            found: (5, 16)
        })
    );
}

#[test]
fn pack_from_database_file() {
    let mut db = Database::new();
    db.insert(device());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gowin.db");
    db.to_file(&path).unwrap();
    let db = Database::from_file(&path).unwrap();
    let dev = db.device("GW1N-1").unwrap();
    let design = Design::from_nextpnr_json(NETLIST).unwrap();
    let packed = pack(dev, &design, &PackOptions::default()).unwrap();
    assert_eq!(packed.bitstream.frames.height(), 6);
}
