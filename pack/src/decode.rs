use std::collections::{BTreeMap, BTreeSet};

use gowin_chipdb::{
    Device, Pip, Tile, TileMap,
    bel::{BankTable, Bel, BelKind, IobTable},
};
use gowin_types::{BitMatrix, BitSet, TileCoord};
use itertools::Itertools;
use rayon::prelude::*;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DecodeOptions {
    /// Report flags, modes and pip sources whose bit set is empty when none
    /// of their bits are observed.
    pub default_modes: bool,
    /// Report clock pips even without a backing alias.
    pub ignore_alias_gate: bool,
}

/// A bit pattern that matches no declared configuration, or more than one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Unresolved {
    UnknownMode { bel: String, bits: BitSet },
    AmbiguousMode { bel: String, modes: Vec<String> },
    UnknownPip { dest: String, bits: BitSet },
    AmbiguousPip { dest: String, srcs: Vec<String> },
}

/// The configuration recovered from one tile.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TileConfig {
    /// Active flags and modes of each bel with any.
    pub bels: BTreeMap<String, BTreeSet<String>>,
    /// Destination to source.
    pub pips: BTreeMap<String, String>,
    pub clock_pips: BTreeMap<String, String>,
    pub unresolved: Vec<Unresolved>,
}

/// Names of the modes exactly matching the observed subset of `bits`.
fn match_modes<'a>(
    modes: impl IntoIterator<Item = (&'a str, &'a BitSet)>,
    bits: &BitMatrix,
    default_modes: bool,
) -> (BitSet, Vec<&'a str>) {
    let modes = Vec::from_iter(modes);
    let union = BitSet::from_iter(modes.iter().flat_map(|(_, b)| b.iter().copied()));
    let observed = bits.observed(&union);
    let matched = modes
        .into_iter()
        .filter(|(_, b)| **b == observed && (default_modes || !b.is_empty()))
        .map(|(name, _)| name)
        .collect();
    (observed, matched)
}

/// The source whose bits exactly match among `srcs`, or why there is none.
/// `Ok(None)` when nothing is set, unless `default_src` picks the one source
/// with no bits.
fn match_pip<'a>(
    dest: &str,
    srcs: &'a [Pip],
    bits: &BitMatrix,
    default_src: bool,
) -> Result<Option<&'a str>, Unresolved> {
    let union = BitSet::from_iter(srcs.iter().flat_map(|p| p.bits.iter().copied()));
    let observed = bits.observed(&union);
    if observed.is_empty() && !default_src {
        return Ok(None);
    }
    let matched = Vec::from_iter(
        srcs.iter()
            .filter(|p| p.bits == observed)
            .map(|p| p.src.as_str()),
    );
    match matched.as_slice() {
        [] if observed.is_empty() => Ok(None),
        [] => Err(Unresolved::UnknownPip {
            dest: dest.to_string(),
            bits: observed,
        }),
        [src] => Ok(Some(*src)),
        _ => Err(Unresolved::AmbiguousPip {
            dest: dest.to_string(),
            srcs: matched.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

fn decode_iob(name: &str, table: &IobTable, bits: &BitMatrix, res: &mut TileConfig) {
    let observed = bits.observed(&table.all_bits());
    if observed.is_empty() {
        return;
    }
    let mut candidates = vec![];
    for (iostd, modes) in &table.configs {
        'config: for (&mode, config) in modes {
            let masked =
                BitSet::from_iter(config.attrs.values().flat_map(|a| a.mask.iter().copied()));
            let fixed = |set: &BitSet| BitSet::from_iter(set.difference(&masked).copied());
            if fixed(&observed) != fixed(&config.base) {
                continue;
            }
            let mut attrs = BTreeSet::new();
            for (attr_name, attr) in &config.attrs {
                let seen = BitSet::from_iter(observed.intersection(&attr.mask).copied());
                let base = BitSet::from_iter(config.base.intersection(&attr.mask).copied());
                if seen == base {
                    continue;
                }
                match attr.options.iter().find(|(_, b)| **b == seen) {
                    Some((value, _)) => {
                        attrs.insert(format!("{attr_name}={value}"));
                    }
                    None => continue 'config,
                }
            }
            candidates.push((iostd.as_str(), mode, attrs));
        }
    }
    let modes = Vec::from_iter(candidates.iter().map(|(_, mode, _)| *mode).unique());
    match modes.as_slice() {
        [] => res.unresolved.push(Unresolved::UnknownMode {
            bel: name.to_string(),
            bits: observed,
        }),
        [mode] => {
            let items = res.bels.entry(name.to_string()).or_default();
            items.insert(mode.to_string());
            let iostds = Vec::from_iter(candidates.iter().map(|(s, _, _)| *s).unique());
            if let [iostd] = iostds.as_slice() {
                items.insert(format!("IO_TYPE={iostd}"));
            }
            // attributes common to every candidate encoding
            if let Some(((_, _, first), rest)) = candidates.split_first() {
                for attr in first {
                    if rest.iter().all(|(_, _, a)| a.contains(attr)) {
                        items.insert(attr.clone());
                    }
                }
            }
        }
        _ => res.unresolved.push(Unresolved::AmbiguousMode {
            bel: name.to_string(),
            modes: modes.iter().map(|m| m.to_string()).collect(),
        }),
    }
}

fn decode_bank(name: &str, table: &BankTable, bits: &BitMatrix, res: &mut TileConfig) {
    let (_, matched) = match_modes(
        table.iostd.iter().map(|(iostd, b)| (iostd.as_str(), b)),
        bits,
        false,
    );
    if let [iostd] = matched.as_slice() {
        res.bels
            .entry(name.to_string())
            .or_default()
            .insert(format!("IO_TYPE={iostd}"));
    }
}

fn decode_bel(
    name: &str,
    bel: &Bel,
    bits: &BitMatrix,
    opts: &DecodeOptions,
    res: &mut TileConfig,
) {
    let mut items = BTreeSet::new();
    for flag in &bel.flags {
        let set = flag.bits.iter().all(|&b| bits.bit(b));
        if set && (opts.default_modes || !flag.bits.is_empty()) {
            items.insert(flag.name.clone());
        }
    }
    if !bel.modes.is_empty() {
        let (observed, matched) = match_modes(
            bel.modes.iter().map(|m| (m.name.as_str(), &m.bits)),
            bits,
            opts.default_modes,
        );
        if matched.is_empty() && !observed.is_empty() {
            res.unresolved.push(Unresolved::UnknownMode {
                bel: name.to_string(),
                bits: observed,
            });
        }
        items.extend(matched.into_iter().map(String::from));
    }
    if !items.is_empty() {
        res.bels.entry(name.to_string()).or_default().extend(items);
    }
    match &bel.kind {
        BelKind::Iob(table) => decode_iob(name, table, bits, res),
        BelKind::Bank(table) => decode_bank(name, table, bits, res),
        _ => (),
    }
}

/// Recovers the configuration of the tile at `crd` from its bits.
pub fn decode_tile(
    device: &Device,
    crd: TileCoord,
    tile: &Tile,
    bits: &BitMatrix,
    opts: &DecodeOptions,
) -> TileConfig {
    let mut res = TileConfig::default();
    for (name, bel) in &tile.bels {
        decode_bel(name, bel, bits, opts, &mut res);
    }
    for (dest, srcs) in tile.pips.dests() {
        match match_pip(dest, srcs, bits, opts.default_modes) {
            Ok(Some(src)) => {
                res.pips.insert(dest.to_string(), src.to_string());
            }
            Ok(None) => (),
            Err(e) => res.unresolved.push(e),
        }
    }
    // clock mux encodings overlap unrelated features; only connections with
    // an alias edge are real
    for (dest, srcs) in tile.clock_pips.dests() {
        match match_pip(dest, srcs, bits, opts.default_modes) {
            Ok(Some(src)) => {
                if opts.ignore_alias_gate || device.has_alias(crd, src) {
                    res.clock_pips.insert(dest.to_string(), src.to_string());
                }
            }
            Ok(None) | Err(Unresolved::UnknownPip { .. }) => (),
            Err(e) => res.unresolved.push(e),
        }
    }
    res
}

/// Decodes every tile in `tiles`.
pub fn decode(
    device: &Device,
    tiles: &TileMap,
    opts: &DecodeOptions,
) -> BTreeMap<TileCoord, TileConfig> {
    tiles
        .par_iter()
        .map(|(&crd, bits)| (crd, decode_tile(device, crd, device.tile(crd), bits, opts)))
        .collect()
}

/// Reconstructs a 16-character LUT INIT from decoded LUT flags.
pub fn lut_init(flags: &BTreeSet<String>) -> String {
    (0..16)
        .rev()
        .map(|i| {
            if flags.contains(&i.to_string()) {
                '0'
            } else {
                '1'
            }
        })
        .collect()
}
