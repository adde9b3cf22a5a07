use std::{collections::BTreeMap, io::Write};

use gowin_chipdb::{BelCoord, Device, bel::iob_bel};
use gowin_types::TileCoord;

use crate::design::{Cell, CellKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Location {
    /// Package pin of an I/O cell.
    Pin(String),
    /// Grid position and bel index.
    Site(TileCoord, String),
}

/// Physical location of every placed instance, for constraint files.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlacementReport {
    pub locations: BTreeMap<String, Location>,
}

fn locate(device: &Device, package: Option<&str>, cell: &Cell) -> Option<Location> {
    match cell.kind {
        CellKind::Iob => {
            let bel = BelCoord::new(cell.tile, iob_bel(cell.sub));
            let pin = package
                .and_then(|pkg| device.packages.get(pkg))
                .and_then(|pkg| pkg.pin_of(&bel));
            Some(match pin {
                Some(pin) => Location::Pin(pin.to_string()),
                None => Location::Site(cell.tile, bel.bel[3..].to_string()),
            })
        }
        CellKind::Slice => Some(Location::Site(cell.tile, cell.sub.to_string())),
        _ => None,
    }
}

impl PlacementReport {
    pub fn new(device: &Device, package: Option<&str>, cells: &[Cell]) -> Self {
        let locations = cells
            .iter()
            .filter_map(|cell| Some((cell.name.clone(), locate(device, package, cell)?)))
            .collect();
        Self { locations }
    }

    pub fn write(&self, o: &mut dyn Write) -> std::io::Result<()> {
        for (name, loc) in &self.locations {
            match loc {
                Location::Pin(pin) => writeln!(o, "IO_LOC \"{name}\" {pin};")?,
                Location::Site(tile, sub) => writeln!(o, "INS_LOC \"{name}\" {tile}[{sub}];")?,
            }
        }
        Ok(())
    }
}
