use std::{collections::BTreeMap, error::Error, fs::File, path::Path};

use serde::{Deserialize, Serialize};
use simple_error::bail;
use tracing::debug;

use crate::{ChipDbError, device::Device};

/// Format version of the database file. Written ahead of the payload.
pub const DB_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub devices: BTreeMap<String, Device>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device: Device) {
        self.devices.insert(device.name.clone(), device);
    }

    pub fn device(&self, name: &str) -> Result<&Device, ChipDbError> {
        self.devices
            .get(name)
            .ok_or_else(|| ChipDbError::UnknownDevice {
                name: name.to_string(),
            })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let f = File::open(path)?;
        let mut cf = zstd::stream::Decoder::new(f)?;
        let config = bincode::config::legacy();
        let version: u32 = bincode::serde::decode_from_std_read(&mut cf, config)?;
        if version != DB_VERSION {
            bail!("chip database version {version}, expected {DB_VERSION}");
        }
        let db: Database = bincode::serde::decode_from_std_read(&mut cf, config)?;
        for device in db.devices.values() {
            device.validate()?;
            debug!(
                "loaded {name}: {rows}x{cols} tiles, {types} tile types",
                name = device.name,
                rows = device.rows(),
                cols = device.cols(),
                types = device.tiles.len()
            );
        }
        Ok(db)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let f = File::create(path)?;
        let mut cf = zstd::stream::Encoder::new(f, 9)?;
        let config = bincode::config::legacy();
        bincode::serde::encode_into_std_write(DB_VERSION, &mut cf, config)?;
        bincode::serde::encode_into_std_write(self, &mut cf, config)?;
        cf.finish()?;
        Ok(())
    }
}
