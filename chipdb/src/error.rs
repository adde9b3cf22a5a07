use gowin_bitstream::frame_padding;
use gowin_types::TileCoord;

use crate::device::BelCoord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChipDbError {
    RaggedRow { row: usize },
    RaggedColumn { col: usize },
    TemplateSize {
        expected: (usize, usize),
        found: (usize, usize),
    },
    BadTileType { tile: TileCoord, tile_type: usize },
    UnknownBankTile { bank: u32 },
    UnknownBel { bel: BelCoord },
    UnknownDevice { name: String },
    FramePadding {
        idcode: u32,
        width: usize,
        padding: usize,
    },
}

impl core::fmt::Display for ChipDbError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChipDbError::RaggedRow { row } => write!(f, "tiles in grid row {row} differ in height"),
            ChipDbError::RaggedColumn { col } => {
                write!(f, "tiles in grid column {col} differ in width")
            }
            ChipDbError::TemplateSize { expected, found } => write!(
                f,
                "template is {}x{} bits, grid needs {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            ChipDbError::BadTileType { tile, tile_type } => write!(
                f,
                "grid position {tile:?} has unknown tile type {tile_type}"
            ),
            ChipDbError::UnknownBankTile { bank } => {
                write!(f, "bank {bank} has no corner tile with a bank bel")
            }
            ChipDbError::UnknownBel { bel } => write!(
                f,
                "no I/O bel {bel} at {tile:?}",
                bel = bel.bel,
                tile = bel.tile
            ),
            ChipDbError::UnknownDevice { name } => write!(f, "unknown device {name}"),
            ChipDbError::FramePadding {
                idcode,
                width,
                padding,
            } => write!(
                f,
                "device id {idcode:08x} pads frames by {padding} bits, {width}-bit frames need {}",
                frame_padding(*width)
            ),
        }
    }
}

impl std::error::Error for ChipDbError {}
