pub mod bitmatrix;
pub mod coord;

pub use bitmatrix::BitMatrix;
pub use coord::{BitSet, TileBit, TileCoord, bitset};
