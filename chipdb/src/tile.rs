use std::{collections::BTreeMap, ops::Range};

use gowin_types::BitSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::bel::{Bel, BelKind};

/// A programmable connection from `src` to `dest`, active when all of `bits`
/// are set.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pip {
    pub dest: String,
    pub src: String,
    pub bits: BitSet,
}

/// Pips of one tile type, sorted by `(dest, src)` and indexed by destination.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PipTable {
    pips: Vec<Pip>,
    dests: BTreeMap<String, Range<usize>>,
}

impl PipTable {
    pub fn new(pips: impl IntoIterator<Item = Pip>) -> Self {
        let mut pips = Vec::from_iter(pips);
        pips.sort_by(|a, b| (&a.dest, &a.src).cmp(&(&b.dest, &b.src)));
        pips.dedup_by(|a, b| a.dest == b.dest && a.src == b.src);
        let mut dests = BTreeMap::new();
        let mut start = 0;
        for (dest, group) in &pips.iter().chunk_by(|pip| pip.dest.clone()) {
            let end = start + group.count();
            dests.insert(dest, start..end);
            start = end;
        }
        Self { pips, dests }
    }

    pub fn len(&self) -> usize {
        self.pips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pip> {
        self.pips.iter()
    }

    pub fn contains_dest(&self, dest: &str) -> bool {
        self.dests.contains_key(dest)
    }

    /// All candidate sources of `dest`, sorted by source name.
    pub fn sources(&self, dest: &str) -> &[Pip] {
        match self.dests.get(dest) {
            Some(range) => &self.pips[range.clone()],
            None => &[],
        }
    }

    pub fn get(&self, dest: &str, src: &str) -> Option<&Pip> {
        let sources = self.sources(dest);
        let idx = sources
            .binary_search_by(|pip| pip.src.as_str().cmp(src))
            .ok()?;
        Some(&sources[idx])
    }

    pub fn dests(&self) -> impl Iterator<Item = (&str, &[Pip])> {
        self.dests
            .iter()
            .map(|(dest, range)| (dest.as_str(), &self.pips[range.clone()]))
    }
}

impl FromIterator<Pip> for PipTable {
    fn from_iter<T: IntoIterator<Item = Pip>>(iter: T) -> Self {
        PipTable::new(iter)
    }
}

/// A tile type. Shared by every grid position of that type.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub pips: PipTable,
    pub clock_pips: PipTable,
    pub bels: BTreeMap<String, Bel>,
}

impl Tile {
    pub fn new(name: impl Into<String>, height: usize, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            pips: PipTable::default(),
            clock_pips: PipTable::default(),
            bels: BTreeMap::new(),
        }
    }

    /// Pairs of bels claiming common bits, except declared ALU/LUT sharing.
    pub fn bel_overlaps(&self) -> Vec<(&str, &str, BitSet)> {
        let bits = Vec::from_iter(
            self.bels
                .iter()
                .map(|(name, bel)| (name.as_str(), bel, bel.all_bits())),
        );
        let mut res = vec![];
        for ((na, ba, bits_a), (nb, bb, bits_b)) in bits.iter().tuple_combinations() {
            let shared =
                |x: &Bel, other: &str| matches!(&x.kind, BelKind::Alu { lut } if lut == other);
            if shared(ba, nb) || shared(bb, na) {
                continue;
            }
            let common = BitSet::from_iter(bits_a.intersection(bits_b).copied());
            if !common.is_empty() {
                res.push((*na, *nb, common));
            }
        }
        res
    }
}
