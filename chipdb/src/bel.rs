use std::collections::BTreeMap;

use gowin_types::BitSet;
use serde::{Deserialize, Serialize};

/// An independently settable boolean feature.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub bits: BitSet,
}

/// One of a set of mutually exclusive configurations, matched exactly.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub name: String,
    pub bits: BitSet,
}

/// Physical wire(s) a logical bel port is attached to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PortWire {
    Single(String),
    Bus(Vec<String>),
    Bus2D(Vec<Vec<String>>),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum IobMode {
    Ibuf,
    Obuf,
    Iobuf,
}

impl IobMode {
    pub const ALL: [IobMode; 3] = [IobMode::Ibuf, IobMode::Obuf, IobMode::Iobuf];

    pub fn name(self) -> &'static str {
        match self {
            IobMode::Ibuf => "IBUF",
            IobMode::Obuf => "OBUF",
            IobMode::Iobuf => "IOBUF",
        }
    }
}

impl core::fmt::Display for IobMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An I/O attribute: all bits it may touch, and the bits of each option.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct IobAttr {
    pub mask: BitSet,
    pub options: BTreeMap<String, BitSet>,
}

/// Encoding of one (I/O standard, buffer mode) pair.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct IobConfig {
    pub base: BitSet,
    pub attrs: BTreeMap<String, IobAttr>,
}

impl IobConfig {
    /// Base bits with each given attribute's masked bits replaced by the
    /// selected option. Fails with the first unknown `(attr, value)`.
    pub fn encode<'a>(
        &self,
        attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<BitSet, (String, String)> {
        let mut bits = self.base.clone();
        for (attr, value) in attrs {
            let Some(entry) = self.attrs.get(attr) else {
                return Err((attr.to_string(), value.to_string()));
            };
            let Some(option) = entry.options.get(value) else {
                return Err((attr.to_string(), value.to_string()));
            };
            bits.retain(|bit| !entry.mask.contains(bit));
            bits.extend(option.iter().copied());
        }
        Ok(bits)
    }
}

/// Per-I/O-standard, per-mode encodings of an I/O buffer bel.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct IobTable {
    pub configs: BTreeMap<String, BTreeMap<IobMode, IobConfig>>,
}

impl IobTable {
    pub fn config(&self, iostd: &str, mode: IobMode) -> Option<&IobConfig> {
        self.configs.get(iostd)?.get(&mode)
    }

    /// Every bit any standard, mode or attribute option can set.
    pub fn all_bits(&self) -> BitSet {
        let mut res = BitSet::new();
        for config in self.configs.values().flat_map(|m| m.values()) {
            res.extend(config.base.iter().copied());
            for attr in config.attrs.values() {
                res.extend(attr.mask.iter().copied());
                for bits in attr.options.values() {
                    res.extend(bits.iter().copied());
                }
            }
        }
        res
    }
}

/// Bank-corner bel: enable bits of each I/O standard.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BankTable {
    pub iostd: BTreeMap<String, BitSet>,
}

/// Kind of a bel, fixed when the database is built.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum BelKind {
    /// 4-input LUT; flags `0..16` are the inverted truth table entries.
    Lut,
    /// ALU sharing its bits with the named LUT bel.
    Alu { lut: String },
    /// Flip-flop; modes are the storage element types.
    Dff,
    Iob(IobTable),
    /// Bank corner; modes hold `ENABLE`.
    Bank(BankTable),
    Other,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bel {
    pub kind: BelKind,
    pub flags: Vec<Flag>,
    pub modes: Vec<Mode>,
    pub portmap: BTreeMap<String, PortWire>,
}

pub const BANK_ENABLE: &str = "ENABLE";

pub fn lut_bel(idx: usize) -> String {
    format!("LUT{idx}")
}

pub fn alu_bel(idx: usize) -> String {
    format!("ALU{idx}")
}

pub fn dff_bel(idx: usize) -> String {
    format!("DFF{idx}")
}

/// `IOBA`, `IOBB`, ...
/// `IOBA`, `IOBB`, ... for the first 26 indices. Later indices name no real
/// bel.
pub fn iob_bel(idx: usize) -> String {
    match u8::try_from(idx).ok().filter(|&i| i < 26) {
        Some(i) => format!("IOB{}", char::from(b'A' + i)),
        None => format!("IOB{idx}"),
    }
}

pub fn bank_bel(bank: u32) -> String {
    format!("BANK{bank}")
}

impl Bel {
    pub fn new(kind: BelKind) -> Self {
        Self {
            kind,
            flags: vec![],
            modes: vec![],
            portmap: BTreeMap::new(),
        }
    }

    pub fn with_flag(mut self, name: impl Into<String>, bits: BitSet) -> Self {
        self.flags.push(Flag {
            name: name.into(),
            bits,
        });
        self
    }

    pub fn with_mode(mut self, name: impl Into<String>, bits: BitSet) -> Self {
        self.modes.push(Mode {
            name: name.into(),
            bits,
        });
        self
    }

    pub fn with_port(mut self, port: impl Into<String>, wire: PortWire) -> Self {
        self.portmap.insert(port.into(), wire);
        self
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|flag| flag.name == name)
    }

    pub fn mode(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|mode| mode.name == name)
    }

    /// Union of all modes' bits.
    pub fn mode_bits(&self) -> BitSet {
        self.modes
            .iter()
            .flat_map(|mode| mode.bits.iter().copied())
            .collect()
    }

    /// Every bit this bel can write.
    pub fn all_bits(&self) -> BitSet {
        let mut res = self.mode_bits();
        for flag in &self.flags {
            res.extend(flag.bits.iter().copied());
        }
        match &self.kind {
            BelKind::Iob(table) => res.extend(table.all_bits()),
            BelKind::Bank(table) => {
                for bits in table.iostd.values() {
                    res.extend(bits.iter().copied());
                }
            }
            _ => (),
        }
        res
    }
}
