use gowin_types::BitSet;
use jzon::JsonValue;
use unnamed_entity::EntityId;

use crate::{
    bel::{Bel, BelKind, IobTable, PortWire},
    db::Database,
    device::Device,
    tile::{PipTable, Tile},
};

fn bits_to_json(bits: &BitSet) -> JsonValue {
    Vec::from_iter(bits.iter().copied()).into()
}

/// An object mapping each name to its bit list.
fn bits_map<'a>(items: impl IntoIterator<Item = (&'a str, &'a BitSet)>) -> JsonValue {
    let mut res = jzon::object::Object::new();
    for (name, bits) in items {
        res.insert(name, bits_to_json(bits));
    }
    res.into()
}

impl From<&PortWire> for JsonValue {
    fn from(wire: &PortWire) -> Self {
        match wire {
            PortWire::Single(w) => w.as_str().into(),
            PortWire::Bus(ws) => ws.clone().into(),
            PortWire::Bus2D(wss) => Vec::from_iter(wss.iter().cloned()).into(),
        }
    }
}

fn iob_table_to_json(table: &IobTable) -> JsonValue {
    let mut res = jzon::object::Object::new();
    for (iostd, modes) in &table.configs {
        let mut modes_json = jzon::object::Object::new();
        for (mode, config) in modes {
            let mut attrs = jzon::object::Object::new();
            for (name, attr) in &config.attrs {
                let attr_json = jzon::object! {
                    mask: bits_to_json(&attr.mask),
                    options: bits_map(attr.options.iter().map(|(v, b)| (v.as_str(), b))),
                };
                attrs.insert(name, attr_json);
            }
            let config_json = jzon::object! {
                base: bits_to_json(&config.base),
                attrs: JsonValue::from(attrs),
            };
            modes_json.insert(mode.name(), config_json);
        }
        res.insert(iostd, modes_json.into());
    }
    res.into()
}

impl From<&Bel> for JsonValue {
    fn from(bel: &Bel) -> Self {
        let mut res = jzon::object! {
            kind: match &bel.kind {
                BelKind::Lut => "LUT",
                BelKind::Alu { .. } => "ALU",
                BelKind::Dff => "DFF",
                BelKind::Iob(_) => "IOB",
                BelKind::Bank(_) => "BANK",
                BelKind::Other => "OTHER",
            },
            flags: bits_map(bel.flags.iter().map(|flag| (flag.name.as_str(), &flag.bits))),
            modes: bits_map(bel.modes.iter().map(|mode| (mode.name.as_str(), &mode.bits))),
            portmap: jzon::object::Object::from_iter(bel.portmap.iter().map(|(port, wire)| {
                (port.as_str(), wire)
            })),
        };
        match &bel.kind {
            BelKind::Alu { lut } => res["lut"] = lut.as_str().into(),
            BelKind::Iob(table) => res["iostd"] = iob_table_to_json(table),
            BelKind::Bank(table) => {
                res["iostd"] = bits_map(table.iostd.iter().map(|(s, b)| (s.as_str(), b)))
            }
            _ => (),
        }
        res
    }
}

impl From<&PipTable> for JsonValue {
    fn from(pips: &PipTable) -> Self {
        jzon::object::Object::from_iter(pips.dests().map(|(dest, srcs)| {
            (
                dest,
                bits_map(srcs.iter().map(|pip| (pip.src.as_str(), &pip.bits))),
            )
        }))
        .into()
    }
}

impl From<&Tile> for JsonValue {
    fn from(tile: &Tile) -> Self {
        jzon::object! {
            name: tile.name.as_str(),
            width: tile.width,
            height: tile.height,
            pips: &tile.pips,
            clock_pips: &tile.clock_pips,
            bels: jzon::object::Object::from_iter(tile.bels.iter().map(|(name, bel)| {
                (name.as_str(), bel)
            })),
        }
    }
}

impl From<&Device> for JsonValue {
    fn from(device: &Device) -> Self {
        jzon::object! {
            name: device.name.as_str(),
            rows: device.rows(),
            cols: device.cols(),
            tiles: Vec::from_iter(device.tiles.values().map(JsonValue::from)),
            grid: Vec::from_iter(device.grid.rows().into_iter().map(|row| {
                Vec::from_iter(row.iter().map(|ttid| ttid.to_idx()))
            })),
            aliases: Vec::from_iter(device.aliases.iter().map(|(from, to)| {
                jzon::array![from.to_string(), to.to_string()]
            })),
            banks: jzon::object::Object::from_iter(device.bank_tiles.iter().map(|(bank, crd)| {
                (bank.to_string(), *crd)
            })),
            iob_banks: Vec::from_iter(device.iob_banks.iter().map(|(bel, bank)| {
                jzon::array![bel.tile, bel.bel.as_str(), *bank]
            })),
            packages: jzon::object::Object::from_iter(device.packages.iter().map(|(name, pkg)| {
                (name.as_str(), jzon::object::Object::from_iter(pkg.pins.iter().map(|(pin, bel)| {
                    (pin.as_str(), jzon::array![bel.tile, bel.bel.as_str()])
                })))
            })),
        }
    }
}

impl From<&Database> for JsonValue {
    fn from(db: &Database) -> Self {
        jzon::object::Object::from_iter(db.devices.iter().map(|(name, dev)| (name.as_str(), dev)))
            .into()
    }
}
