use gowin_types::BitMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Bitstream, BitstreamError, MARKER_FRAME_COUNT, PREAMBLE_LINES, pack_frames};

/// Bit of the configuration word that enables payload compression.
pub const COMPRESS_BIT: usize = 13;
/// Tag byte in the top byte of the footer checksum word.
pub const FOOTER_CHECKSUM_TAG: u8 = 0x0a;

/// Position of the header/footer words patched after the frames are final.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BitstreamLayout {
    /// Header line holding the configuration word (compression flag).
    pub config_line: usize,
    /// Header line whose last two bytes hold the checksum.
    pub checksum_line: usize,
    /// Footer line replaced by the tagged 64-bit checksum word.
    pub footer_checksum_line: usize,
}

/// Whole-bitstream checksum over the padded, file-ordered frame bytes:
/// even bytes sum into the high byte, odd bytes into the low byte.
pub fn checksum(frames: &BitMatrix) -> u16 {
    let mut hi: u32 = 0;
    let mut lo: u32 = 0;
    for (i, byte) in pack_frames(frames).concat().into_iter().enumerate() {
        if i % 2 == 0 {
            hi = (hi + u32::from(byte)) & 0xffff;
        } else {
            lo = (lo + u32::from(byte)) & 0xffff;
        }
    }
    (hi.wrapping_mul(0x100).wrapping_add(lo) & 0xffff) as u16
}

fn set_be_tail(line: &mut [u8], val: u32, nbytes: usize) {
    let len = line.len();
    for i in 0..nbytes {
        line[len - 1 - i] = (val >> (8 * i)) as u8;
    }
}

impl Bitstream {
    /// Patches the frame count, checksum words and compression flag to match
    /// the current frames. Returns the checksum.
    pub fn finalize(
        &mut self,
        layout: &BitstreamLayout,
        compress: bool,
    ) -> Result<u16, BitstreamError> {
        let nframes = self.frames.height() as u32;
        let count_line = self
            .header
            .iter_mut()
            .skip(PREAMBLE_LINES)
            .find(|line| line.first() == Some(&MARKER_FRAME_COUNT) && line.len() >= 5)
            .ok_or(BitstreamError::MissingFrameCount)?;
        set_be_tail(count_line, nframes, 4);

        let sum = checksum(&self.frames);
        debug!("bitstream checksum {sum:04x}");

        let line = layout.checksum_line;
        let hdr = self
            .header
            .get_mut(line)
            .filter(|l| l.len() >= 2)
            .ok_or(BitstreamError::LayoutLine { line })?;
        set_be_tail(hdr, u32::from(sum), 2);

        let line = layout.footer_checksum_line;
        let ftr = self
            .footer
            .get_mut(line)
            .ok_or(BitstreamError::LayoutLine { line })?;
        let word = u64::from(FOOTER_CHECKSUM_TAG) << 56 | u64::from(sum);
        *ftr = word.to_be_bytes().to_vec();

        if compress {
            let line = layout.config_line;
            let cfg = self
                .header
                .get_mut(line)
                .filter(|l| l.len() >= 2)
                .ok_or(BitstreamError::LayoutLine { line })?;
            let len = cfg.len();
            cfg[len - 1 - COMPRESS_BIT / 8] |= 1 << (COMPRESS_BIT % 8);
        }
        Ok(sum)
    }
}
