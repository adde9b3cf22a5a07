use unnamed_entity::entity_id;

pub mod bel;
pub mod db;
pub mod device;
mod error;
pub mod json;
pub mod tile;
pub mod tilemap;

entity_id! {
    pub id TileTypeId u16;
}

pub use db::{DB_VERSION, Database};
pub use device::{BelCoord, Device, Package, Wire};
pub use error::ChipDbError;
pub use tile::{Pip, PipTable, Tile};
pub use tilemap::{TileMap, reassemble, slice, template_tiles};
