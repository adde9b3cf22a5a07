pub mod decode;
pub mod design;
mod error;
pub mod pipeline;
pub mod place;
pub mod report;
pub mod route;

#[cfg(test)]
mod testdev;

pub use decode::{DecodeOptions, TileConfig, Unresolved, decode, decode_tile, lut_init};
pub use design::{Cell, CellKind, Design, PipUse};
pub use error::{DesignError, PackError, PlaceError, UnroutablePip};
pub use pipeline::{PackOptions, Packed, Unpacked, pack, unpack};
pub use place::{PlaceCache, place};
pub use report::PlacementReport;
pub use route::route;
