use std::{collections::BTreeMap, io::Write};

use gowin_bitstream::Bitstream;
use gowin_chipdb::{Device, Wire, bel::BelKind, reassemble, slice, template_tiles};
use gowin_types::TileCoord;
use tracing::{info, warn};

use crate::{
    decode::{DecodeOptions, TileConfig, decode, lut_init},
    design::Design,
    error::{PackError, UnroutablePip},
    place::{PlaceCache, place},
    report::PlacementReport,
    route::route,
};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PackOptions {
    /// Set the payload compression flag in the header.
    pub compress: bool,
    /// Package used to name pins in the placement report.
    pub package: Option<String>,
}

pub struct Packed {
    pub bitstream: Bitstream,
    pub checksum: u16,
    pub unroutable: Vec<UnroutablePip>,
    pub report: PlacementReport,
}

/// Encodes a placed and routed design into a finalized bitstream.
pub fn pack(device: &Device, design: &Design, opts: &PackOptions) -> Result<Packed, PackError> {
    let mut tiles = template_tiles(device);
    let mut cache = PlaceCache::new();
    place(device, &mut tiles, &design.cells, &mut cache).map_err(PackError::Place)?;
    let unroutable = route(device, &mut tiles, &design.pips);
    if !unroutable.is_empty() {
        warn!("{n} pips could not be routed", n = unroutable.len());
    }
    let frames = reassemble(device, &tiles);
    let mut bitstream = Bitstream::new(device.cmd_hdr.clone(), frames, device.cmd_ftr.clone());
    let checksum = bitstream.finalize(&device.layout, opts.compress)?;
    info!(
        "packed {cells} cells and {pips} pips for {dev}, checksum {checksum:04x}",
        cells = design.cells.len(),
        pips = design.pips.len(),
        dev = device.name
    );
    let report = PlacementReport::new(device, opts.package.as_deref(), &design.cells);
    Ok(Packed {
        bitstream,
        checksum,
        unroutable,
        report,
    })
}

/// Configuration decoded from a whole bitstream, for tiles with any bits set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Unpacked {
    pub tiles: BTreeMap<TileCoord, TileConfig>,
}

pub fn unpack(
    device: &Device,
    bitstream: &Bitstream,
    opts: &DecodeOptions,
) -> Result<Unpacked, PackError> {
    let expected = (device.template.height(), device.template.width());
    let found = (bitstream.frames.height(), bitstream.frames.width());
    if expected != found {
        return Err(PackError::FrameSize { expected, found });
    }
    let tiles = slice(device, &bitstream.frames, false);
    let tiles = decode(device, &tiles, opts);
    let unresolved: usize = tiles.values().map(|t| t.unresolved.len()).sum();
    if unresolved != 0 {
        warn!("{unresolved} bit patterns could not be resolved");
    }
    Ok(Unpacked { tiles })
}

impl Unpacked {
    /// Text listing of the decoded configuration. Pip sources are shown with
    /// their alias-resolved wire.
    pub fn dump(&self, device: &Device, o: &mut dyn Write) -> std::io::Result<()> {
        for (&crd, cfg) in &self.tiles {
            if cfg == &TileConfig::default() {
                continue;
            }
            let tile = device.tile(crd);
            writeln!(o, "tile {crd} {name} {{", name = tile.name)?;
            for (bel, items) in &cfg.bels {
                write!(o, "\tbel {bel}:")?;
                for item in items {
                    write!(o, " {item}")?;
                }
                if matches!(tile.bels.get(bel).map(|b| &b.kind), Some(BelKind::Lut)) {
                    write!(o, " INIT={init}", init = lut_init(items))?;
                }
                writeln!(o)?;
            }
            for (kind, pips) in [("pip", &cfg.pips), ("clock_pip", &cfg.clock_pips)] {
                for (dest, src) in pips {
                    let wire = Wire::new(crd, src.as_str());
                    let canon = device.resolve_alias(&wire);
                    if canon == wire {
                        writeln!(o, "\t{kind} {dest} <- {src}")?;
                    } else {
                        writeln!(o, "\t{kind} {dest} <- {src} ({canon})")?;
                    }
                }
            }
            for item in &cfg.unresolved {
                writeln!(o, "\tunresolved {item:?}")?;
            }
            writeln!(o, "}}")?;
        }
        Ok(())
    }
}
