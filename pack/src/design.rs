use std::{collections::BTreeMap, path::Path, sync::LazyLock};

use gowin_types::TileCoord;
use jzon::JsonValue;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::DesignError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CellKind {
    Slice,
    Iob,
    Gsr,
    Vcc,
    Gnd,
    Other(String),
}

/// A placed cell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cell {
    pub name: String,
    pub kind: CellKind,
    pub tile: TileCoord,
    /// Slice number, or I/O bel letter index.
    pub sub: usize,
    pub params: BTreeMap<String, String>,
    pub attrs: BTreeMap<String, String>,
}

impl Cell {
    pub fn new(name: impl Into<String>, kind: CellKind, tile: TileCoord, sub: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            tile,
            sub,
            params: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    /// Whether a boolean-style parameter is present and non-zero.
    pub fn param_set(&self, key: &str) -> bool {
        self.param(key).is_some_and(is_truthy)
    }
}

/// Accepts binary strings (any width) and decimal integers.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    if !value.is_empty() && value.chars().all(|c| c == '0' || c == '1') {
        value.contains('1')
    } else {
        value.parse::<i64>().is_ok_and(|v| v != 0)
    }
}

/// A used pip: `src` drives `dest` inside `tile`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipUse {
    pub tile: TileCoord,
    pub src: String,
    pub dest: String,
}

/// A placed and routed design.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Design {
    pub cells: Vec<Cell>,
    pub pips: Vec<PipUse>,
}

static BEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^X(\d+)Y(\d+)/([A-Z_]+?)(\d*)$").unwrap());
static PIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^X(\d+)Y(\d+)/([^/]+)/([^/]+)$").unwrap());

fn json_to_string(value: &JsonValue) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.dump(),
    }
}

fn string_map(obj: &JsonValue) -> BTreeMap<String, String> {
    obj.entries()
        .map(|(k, v)| (k.to_string(), json_to_string(v)))
        .collect()
}

/// Splits `X{col}Y{row}/{BEL}{index}` into a cell location.
fn parse_bel(cell: &str, bel: &str) -> Result<(CellKind, TileCoord, usize), DesignError> {
    let bad = || DesignError::BadBel {
        cell: cell.to_string(),
        bel: bel.to_string(),
    };
    let caps = BEL_RE.captures(bel).ok_or_else(bad)?;
    let col: usize = caps[1].parse().map_err(|_| bad())?;
    let row: usize = caps[2].parse().map_err(|_| bad())?;
    let (kind, sub) = match (&caps[3], &caps[4]) {
        ("SLICE", index) => (CellKind::Slice, index.parse().map_err(|_| bad())?),
        ("GSR", "") => (CellKind::Gsr, 0),
        ("VCC", "") => (CellKind::Vcc, 0),
        ("GND", "") => (CellKind::Gnd, 0),
        (name, "") if name.len() == 4 && name.starts_with("IOB") => {
            (CellKind::Iob, usize::from(name.as_bytes()[3] - b'A'))
        }
        (name, index) => (
            CellKind::Other(name.to_string()),
            index.parse().unwrap_or(0),
        ),
    };
    Ok((kind, TileCoord::new(row, col), sub))
}

fn parse_pip(net: &str, pip: &str) -> Result<PipUse, DesignError> {
    let bad = || DesignError::BadPip {
        net: net.to_string(),
        pip: pip.to_string(),
    };
    let caps = PIP_RE.captures(pip).ok_or_else(bad)?;
    let col: usize = caps[1].parse().map_err(|_| bad())?;
    let row: usize = caps[2].parse().map_err(|_| bad())?;
    Ok(PipUse {
        tile: TileCoord::new(row, col),
        src: caps[3].to_string(),
        dest: caps[4].to_string(),
    })
}

impl Design {
    /// Reads a routed nextpnr JSON netlist.
    pub fn from_nextpnr_json(text: &str) -> Result<Self, DesignError> {
        let json = jzon::parse(text)?;
        let modules = &json["modules"];
        if !modules.is_object() {
            return Err(DesignError::MissingModules);
        }
        let mut design = Design::default();
        for (_, module) in modules.entries() {
            for (name, cell) in module["cells"].entries() {
                let attrs = string_map(&cell["attributes"]);
                let bel = attrs
                    .get("NEXTPNR_BEL")
                    .ok_or_else(|| DesignError::MissingBel {
                        cell: name.to_string(),
                    })?;
                let (kind, tile, sub) = parse_bel(name, bel)?;
                design.cells.push(Cell {
                    name: name.to_string(),
                    kind,
                    tile,
                    sub,
                    params: string_map(&cell["parameters"]),
                    attrs,
                });
            }
            for (name, net) in module["netnames"].entries() {
                let Some(routing) = net["attributes"]["ROUTING"].as_str() else {
                    continue;
                };
                // wire;pip;strength triples
                for pip in routing.split(';').skip(1).step_by(3) {
                    if pip.is_empty() {
                        continue;
                    }
                    // alias and dummy entries carry no tile prefix
                    match parse_pip(name, pip) {
                        Ok(pip) => design.pips.push(pip),
                        Err(e) => warn!("{e}, skipping"),
                    }
                }
            }
        }
        debug!(
            "netlist: {cells} cells, {pips} pips",
            cells = design.cells.len(),
            pips = design.pips.len()
        );
        Ok(design)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DesignError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_nextpnr_json(&text)
    }
}
