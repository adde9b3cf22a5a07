use std::collections::{BTreeMap, HashMap};

use gowin_chipdb::{
    BelCoord, Device, TileMap,
    bel::{BANK_ENABLE, Bel, BelKind, IobMode, alu_bel, bank_bel, dff_bel, iob_bel, lut_bel},
};
use gowin_types::{BitMatrix, BitSet, TileBit, TileCoord};
use tracing::{debug, warn};

use crate::{
    design::{Cell, CellKind},
    error::PlaceError,
};

/// I/O standard used when neither the cell nor its bank names one. Board
/// dependent.
pub const DEFAULT_IOSTD: &str = "LVCMOS18";

/// Slices `0..DFF_SLICES` have a flip-flop next to the LUT.
pub const DFF_SLICES: usize = 6;

#[derive(Clone, Debug)]
struct BitWrite {
    owner: String,
    value: bool,
}

/// State of one placement run: the I/O standard fixed for each bank, and the
/// owner of every bit written so far.
#[derive(Clone, Debug, Default)]
pub struct PlaceCache {
    banks: BTreeMap<u32, String>,
    writes: HashMap<(TileCoord, TileBit), BitWrite>,
}

impl PlaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bank_iostd(&self, bank: u32) -> Option<&str> {
        self.banks.get(&bank).map(|s| s.as_str())
    }

    pub fn banks(&self) -> impl Iterator<Item = (u32, &str)> {
        self.banks.iter().map(|(&bank, s)| (bank, s.as_str()))
    }

    /// Fixes the bank's standard on first use. A cell that names no standard
    /// inherits the bank's.
    fn claim_bank(
        &mut self,
        cell: &str,
        bank: u32,
        iostd: Option<&str>,
    ) -> Result<String, PlaceError> {
        match (self.banks.get(&bank), iostd) {
            (None, iostd) => {
                let iostd = iostd.unwrap_or(DEFAULT_IOSTD).to_string();
                debug!("bank {bank}: {iostd} (from {cell})");
                self.banks.insert(bank, iostd.clone());
                Ok(iostd)
            }
            (Some(used), None) => Ok(used.clone()),
            (Some(used), Some(iostd)) if used == iostd => Ok(used.clone()),
            (Some(used), Some(iostd)) => Err(PlaceError::ConflictingBankStandard {
                cell: cell.to_string(),
                bank,
                iostd: iostd.to_string(),
                existing: used.clone(),
            }),
        }
    }
}

/// Splits I/O attributes into the requested standard and the remaining
/// `(name, value)` pairs. Both `&NAME=VALUE` keys and plain `IO_TYPE` are
/// understood.
fn io_attrs(cell: &Cell) -> (Option<&str>, Vec<(&str, &str)>) {
    let mut iostd = None;
    let mut rest = vec![];
    for (key, value) in &cell.attrs {
        let (name, value) = match key.split_once('=') {
            Some((name, value)) => (name.trim_start_matches('&'), value),
            None if key.trim_start_matches('&') == "IO_TYPE" => ("IO_TYPE", value.as_str()),
            None => continue,
        };
        if name == "IO_TYPE" {
            iostd = Some(value);
        } else {
            rest.push((name, value));
        }
    }
    (iostd, rest)
}

fn iob_mode(cell: &Cell) -> Result<IobMode, PlaceError> {
    let enable = cell.param_set("ENABLE_USED");
    let input = cell.param_set("INPUT_USED");
    let output = cell.param_set("OUTPUT_USED");
    match (enable, input, output) {
        (true, _, true) => Ok(IobMode::Iobuf),
        (false, true, false) => Ok(IobMode::Ibuf),
        (false, false, true) => Ok(IobMode::Obuf),
        _ => Err(PlaceError::InvalidIoConfig {
            cell: cell.name.clone(),
        }),
    }
}

/// LUT INIT string widened to 16 characters, or `None` if malformed.
pub fn normalize_init(init: &str) -> Option<String> {
    if ![1, 2, 4, 8, 16].contains(&init.len()) || !init.chars().all(|c| c == '0' || c == '1') {
        return None;
    }
    Some(init.repeat(16 / init.len()))
}

struct Encoder<'a> {
    device: &'a Device,
    tiles: &'a mut TileMap,
    cache: &'a mut PlaceCache,
}

impl<'a> Encoder<'a> {
    fn bel(&self, cell: &Cell, tile: TileCoord, name: String) -> Result<&'a Bel, PlaceError> {
        let bel = BelCoord::new(tile, name);
        self.device.bel(&bel).ok_or_else(|| PlaceError::UnknownBel {
            cell: cell.name.clone(),
            bel,
        })
    }

    fn write(
        &mut self,
        owner: &str,
        crd: TileCoord,
        bits: &BitSet,
        value: bool,
    ) -> Result<(), PlaceError> {
        let tile = self.device.tile(crd);
        let window = self
            .tiles
            .entry(crd)
            .or_insert_with(|| BitMatrix::new(tile.height, tile.width));
        for &bit in bits {
            match self.cache.writes.get(&(crd, bit)) {
                Some(prev) if prev.owner != owner && prev.value != value => {
                    return Err(PlaceError::ConflictingWrite {
                        cell: owner.to_string(),
                        other: prev.owner.clone(),
                        tile: crd,
                        bit,
                    });
                }
                _ => (),
            }
            self.cache.writes.insert(
                (crd, bit),
                BitWrite {
                    owner: owner.to_string(),
                    value,
                },
            );
            window.set_bit(bit, value);
        }
        Ok(())
    }

    fn place_slice(&mut self, cell: &Cell) -> Result<(), PlaceError> {
        let crd = cell.tile;
        let lut = self.bel(cell, crd, lut_bel(cell.sub))?;
        if let Some(mode) = cell.param("ALU_MODE") {
            let lut_bits = BitSet::from_iter(lut.flags.iter().flat_map(|f| f.bits.iter().copied()));
            let alu = self.bel(cell, crd, alu_bel(cell.sub))?;
            let bits = alu
                .mode(mode)
                .or_else(|| {
                    let val = u32::from_str_radix(mode, 2).ok()?;
                    alu.mode(&val.to_string())
                })
                .ok_or_else(|| PlaceError::UnknownAluMode {
                    cell: cell.name.clone(),
                    mode: mode.to_string(),
                })?
                .bits
                .clone();
            self.write(&cell.name, crd, &lut_bits, false)?;
            self.write(&cell.name, crd, &bits, true)?;
        } else if let Some(init) = cell.param("INIT") {
            let init = normalize_init(init).ok_or_else(|| PlaceError::InvalidInit {
                cell: cell.name.clone(),
                init: init.to_string(),
            })?;
            // flag i set excludes truth table entry i
            let mut bits = BitSet::new();
            for (i, c) in init.chars().rev().enumerate() {
                if c == '0' {
                    if let Some(flag) = lut.flag(&i.to_string()) {
                        bits.extend(flag.bits.iter().copied());
                    }
                }
            }
            self.write(&cell.name, crd, &bits, true)?;
        }

        if cell.sub < DFF_SLICES && cell.param_set("FF_USED") {
            let ff_type = cell.param("FF_TYPE").unwrap_or("DFF");
            let ff_type = ff_type.strip_suffix('E').unwrap_or(ff_type);
            let dff = self.bel(cell, crd, dff_bel(cell.sub))?;
            let bits = dff
                .mode(ff_type)
                .ok_or_else(|| PlaceError::UnknownDffMode {
                    cell: cell.name.clone(),
                    mode: ff_type.to_string(),
                })?
                .bits
                .clone();
            self.write(&cell.name, crd, &bits, true)?;
        }
        Ok(())
    }

    fn place_iob(&mut self, cell: &Cell) -> Result<(), PlaceError> {
        let crd = cell.tile;
        let name = iob_bel(cell.sub);
        let bel = self.bel(cell, crd, name.clone())?;
        let BelKind::Iob(table) = &bel.kind else {
            return Err(PlaceError::UnknownBel {
                cell: cell.name.clone(),
                bel: BelCoord::new(crd, name),
            });
        };
        let mode = iob_mode(cell)?;
        let bank = self
            .device
            .iob_bank(&BelCoord::new(crd, name))
            .ok_or_else(|| PlaceError::NoBank {
                cell: cell.name.clone(),
            })?;
        let (iostd, attrs) = io_attrs(cell);
        let iostd = self.cache.claim_bank(&cell.name, bank, iostd)?;
        let config = table
            .config(&iostd, mode)
            .ok_or_else(|| PlaceError::UnsupportedIoStandard {
                cell: cell.name.clone(),
                iostd: iostd.clone(),
                mode,
            })?;
        let bits = config
            .encode(attrs)
            .map_err(|(attr, value)| PlaceError::InvalidAttribute {
                cell: cell.name.clone(),
                attr,
                value,
                iostd: iostd.clone(),
                mode,
            })?;
        self.write(&cell.name, crd, &bits, true)
    }

    /// Enables every used bank, with the bits of its I/O standard.
    fn enable_banks(&mut self) -> Vec<PlaceError> {
        let mut errors = vec![];
        let banks = Vec::from_iter(self.cache.banks().map(|(b, s)| (b, s.to_string())));
        for (bank, iostd) in banks {
            let Some(&crd) = self.device.bank_tiles.get(&bank) else {
                warn!("bank {bank} has no corner tile");
                continue;
            };
            let owner = bank_bel(bank);
            let Some(bel) = self.device.bel(&BelCoord::new(crd, owner.clone())) else {
                warn!("bank {bank} has no bank bel at {crd:?}");
                continue;
            };
            let mut bits = bel
                .mode(BANK_ENABLE)
                .map(|m| m.bits.clone())
                .unwrap_or_default();
            if let BelKind::Bank(table) = &bel.kind {
                match table.iostd.get(&iostd) {
                    Some(iostd_bits) => bits.extend(iostd_bits.iter().copied()),
                    None => warn!("bank {bank}: no enable bits for {iostd}"),
                }
            }
            if let Err(e) = self.write(&owner, crd, &bits, true) {
                errors.push(e);
            }
        }
        errors
    }
}

/// Encodes every cell into `tiles`. All failing cells are reported together.
pub fn place(
    device: &Device,
    tiles: &mut TileMap,
    cells: &[Cell],
    cache: &mut PlaceCache,
) -> Result<(), Vec<PlaceError>> {
    let mut enc = Encoder {
        device,
        tiles,
        cache,
    };
    let mut errors = vec![];
    for cell in cells {
        if device.get_tile(cell.tile).is_none() {
            errors.push(PlaceError::UnknownBel {
                cell: cell.name.clone(),
                bel: BelCoord::new(cell.tile, format!("{:?}", cell.kind)),
            });
            continue;
        }
        let res = match &cell.kind {
            CellKind::Slice => enc.place_slice(cell),
            CellKind::Iob => enc.place_iob(cell),
            CellKind::Gsr | CellKind::Vcc | CellKind::Gnd => Ok(()),
            CellKind::Other(kind) => {
                warn!(
                    "{name}: skipping unsupported cell kind {kind}",
                    name = cell.name
                );
                Ok(())
            }
        };
        if let Err(e) = res {
            errors.push(e);
        }
    }
    errors.extend(enc.enable_banks());
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
