use gowin_bitstream::BitstreamError;
use gowin_chipdb::{BelCoord, ChipDbError, bel::IobMode};
use gowin_types::{TileBit, TileCoord};

/// A cell that cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceError {
    UnknownBel { cell: String, bel: BelCoord },
    InvalidInit { cell: String, init: String },
    UnknownAluMode { cell: String, mode: String },
    UnknownDffMode { cell: String, mode: String },
    /// None, or an inconsistent mix, of the input/output/enable uses.
    InvalidIoConfig { cell: String },
    NoBank { cell: String },
    ConflictingBankStandard {
        cell: String,
        bank: u32,
        iostd: String,
        existing: String,
    },
    UnsupportedIoStandard {
        cell: String,
        iostd: String,
        mode: IobMode,
    },
    InvalidAttribute {
        cell: String,
        attr: String,
        value: String,
        iostd: String,
        mode: IobMode,
    },
    /// Two cells drive one bit to different values.
    ConflictingWrite {
        cell: String,
        other: String,
        tile: TileCoord,
        bit: TileBit,
    },
}

impl core::fmt::Display for PlaceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PlaceError::UnknownBel { cell, bel } => write!(
                f,
                "{cell}: no bel {name} at {tile:?}",
                name = bel.bel,
                tile = bel.tile
            ),
            PlaceError::InvalidInit { cell, init } => {
                write!(f, "{cell}: invalid LUT INIT {init:?}")
            }
            PlaceError::UnknownAluMode { cell, mode } => {
                write!(f, "{cell}: unknown ALU mode {mode}")
            }
            PlaceError::UnknownDffMode { cell, mode } => {
                write!(f, "{cell}: unknown flip-flop type {mode}")
            }
            PlaceError::InvalidIoConfig { cell } => {
                write!(f, "{cell}: invalid combination of input, output and enable")
            }
            PlaceError::NoBank { cell } => write!(f, "{cell}: I/O bel is not in any bank"),
            PlaceError::ConflictingBankStandard {
                cell,
                bank,
                iostd,
                existing,
            } => write!(
                f,
                "{cell}: I/O standard {iostd} conflicts with {existing} already used in bank {bank}"
            ),
            PlaceError::UnsupportedIoStandard { cell, iostd, mode } => {
                write!(f, "{cell}: I/O standard {iostd} not available for {mode}")
            }
            PlaceError::InvalidAttribute {
                cell,
                attr,
                value,
                iostd,
                mode,
            } => write!(
                f,
                "{cell}: invalid attribute {attr}={value} for {iostd} {mode}"
            ),
            PlaceError::ConflictingWrite {
                cell,
                other,
                tile,
                bit,
            } => write!(
                f,
                "{cell}: bit {bit:?} of tile {tile:?} already set differently by {other}"
            ),
        }
    }
}

impl std::error::Error for PlaceError {}

/// A pip missing from its tile's pip tables. The pip is left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnroutablePip {
    pub tile: TileCoord,
    pub src: String,
    pub dest: String,
}

impl core::fmt::Display for UnroutablePip {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "no pip {src} -> {dest} at {tile:?}",
            src = self.src,
            dest = self.dest,
            tile = self.tile
        )
    }
}

#[derive(Debug)]
pub enum PackError {
    ChipDb(ChipDbError),
    Bitstream(BitstreamError),
    /// Every cell that failed to encode.
    Place(Vec<PlaceError>),
    FrameSize {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

impl From<ChipDbError> for PackError {
    fn from(value: ChipDbError) -> Self {
        Self::ChipDb(value)
    }
}

impl From<BitstreamError> for PackError {
    fn from(value: BitstreamError) -> Self {
        Self::Bitstream(value)
    }
}

impl core::fmt::Display for PackError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PackError::ChipDb(e) => write!(f, "{e}"),
            PackError::Bitstream(e) => write!(f, "{e}"),
            PackError::Place(errors) => {
                write!(f, "{n} cell(s) failed to place", n = errors.len())?;
                for e in errors {
                    write!(f, "\n  {e}")?;
                }
                Ok(())
            }
            PackError::FrameSize { expected, found } => write!(
                f,
                "bitstream has {}x{} configuration bits, device needs {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for PackError {}

/// A netlist that cannot be read.
#[derive(Debug)]
pub enum DesignError {
    Io(std::io::Error),
    Json(jzon::Error),
    MissingModules,
    MissingBel { cell: String },
    BadBel { cell: String, bel: String },
    BadPip { net: String, pip: String },
}

impl From<std::io::Error> for DesignError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<jzon::Error> for DesignError {
    fn from(value: jzon::Error) -> Self {
        Self::Json(value)
    }
}

impl core::fmt::Display for DesignError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DesignError::Io(e) => write!(f, "{e}"),
            DesignError::Json(e) => write!(f, "{e}"),
            DesignError::MissingModules => write!(f, "netlist has no modules"),
            DesignError::MissingBel { cell } => write!(f, "cell {cell} is not placed"),
            DesignError::BadBel { cell, bel } => {
                write!(f, "cell {cell} placed at unrecognized bel {bel}")
            }
            DesignError::BadPip { net, pip } => write!(f, "net {net} uses unrecognized pip {pip}"),
        }
    }
}

impl std::error::Error for DesignError {}
