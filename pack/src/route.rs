use gowin_chipdb::{Device, TileMap};
use gowin_types::BitMatrix;
use tracing::{debug, warn};

use crate::{design::PipUse, error::UnroutablePip};

/// Sets the bits of every used pip. Pips not in their tile's tables are
/// returned; the rest of the routing is still applied.
pub fn route(device: &Device, tiles: &mut TileMap, pips: &[PipUse]) -> Vec<UnroutablePip> {
    let mut unroutable = vec![];
    for pip in pips {
        let found = device.get_tile(pip.tile).and_then(|tile| {
            tile.clock_pips
                .get(&pip.dest, &pip.src)
                .or_else(|| tile.pips.get(&pip.dest, &pip.src))
                .map(|p| (tile, p))
        });
        let Some((tile, entry)) = found else {
            let err = UnroutablePip {
                tile: pip.tile,
                src: pip.src.clone(),
                dest: pip.dest.clone(),
            };
            warn!("{err}");
            unroutable.push(err);
            continue;
        };
        let window = tiles
            .entry(pip.tile)
            .or_insert_with(|| BitMatrix::new(tile.height, tile.width));
        for &bit in &entry.bits {
            window.set_bit(bit, true);
        }
    }
    debug!(
        "routed {ok} of {total} pips",
        ok = pips.len() - unroutable.len(),
        total = pips.len()
    );
    unroutable
}
