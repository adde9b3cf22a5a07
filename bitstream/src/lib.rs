use std::fmt::Write;
use std::path::Path;

use gowin_types::BitMatrix;
use tracing::debug;

pub mod crc;
pub mod device;
mod finalize;

pub use finalize::{BitstreamLayout, checksum};

use crc::Crc16;

/// Number of leading header lines excluded from marker detection and CRC.
pub const PREAMBLE_LINES: usize = 3;
/// First byte of the header line carrying the frame count.
pub const MARKER_FRAME_COUNT: u8 = 0x3b;
/// First byte of the header line carrying the device id code.
pub const MARKER_DEVICE_ID: u8 = 0x06;
/// First byte of SPI address lines, which are not covered by the CRC.
pub const MARKER_SPI_ADDRESS: u8 = 0xd2;
/// Trailing bits of every frame: 16 bits of CRC followed by 48 filler bits.
pub const FRAME_TRAILER_BITS: usize = 64;
const FRAME_FILLER: [u8; 6] = [0xff; 6];

/// The contents of a textual Gowin bitstream.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Bitstream {
    /// Header lines, verbatim, including the preamble.
    pub header: Vec<Vec<u8>>,
    /// Footer lines, verbatim.
    pub footer: Vec<Vec<u8>>,
    /// The configuration bits, one row per frame, with padding and CRC
    /// stripped. Mirrored left-right relative to file order.
    pub frames: BitMatrix,
}

#[derive(Debug)]
pub enum BitstreamError {
    InvalidLine { line: usize },
    MissingDeviceId,
    MissingFrameCount,
    UnsupportedDevice { idcode: u32 },
    FrameTooShort { frame: usize },
    FrameWidthMismatch { frame: usize },
    CrcMismatch {
        frame: usize,
        expected: u16,
        found: u16,
    },
    TruncatedFrames { expected: usize, found: usize },
    LayoutLine { line: usize },
    IoError(std::io::Error),
}

impl From<std::io::Error> for BitstreamError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl std::fmt::Display for BitstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BitstreamError::InvalidLine { line } => write!(f, "line {line}: not a bit line"),
            BitstreamError::MissingDeviceId => {
                write!(f, "frame data reached before device id line")
            }
            BitstreamError::MissingFrameCount => write!(f, "header has no frame count line"),
            BitstreamError::UnsupportedDevice { idcode } => {
                write!(f, "unsupported device id {idcode:08x}")
            }
            BitstreamError::FrameTooShort { frame } => write!(f, "frame {frame} too short"),
            BitstreamError::FrameWidthMismatch { frame } => {
                write!(f, "frame {frame} differs in width from the first frame")
            }
            BitstreamError::CrcMismatch {
                frame,
                expected,
                found,
            } => write!(
                f,
                "frame {frame}: crc mismatch (computed {expected:04x}, stored {found:04x})"
            ),
            BitstreamError::TruncatedFrames { expected, found } => {
                write!(f, "expected {expected} frames, found {found}")
            }
            BitstreamError::LayoutLine { line } => {
                write!(f, "header/footer line {line} missing or malformed")
            }
            BitstreamError::IoError(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for BitstreamError {}

fn parse_line(line: &str) -> Option<Vec<u8>> {
    if line.is_empty() || line.len() % 8 != 0 {
        return None;
    }
    line.as_bytes()
        .chunks(8)
        .map(|chunk| {
            chunk.iter().try_fold(0u8, |acc, &c| match c {
                b'0' => Some(acc << 1),
                b'1' => Some(acc << 1 | 1),
                _ => None,
            })
        })
        .collect()
}

fn emit_bytes(out: &mut String, bytes: &[u8]) {
    for byte in bytes {
        write!(out, "{byte:08b}").unwrap();
    }
}

fn be_tail(bytes: &[u8]) -> u32 {
    let start = bytes.len().saturating_sub(4);
    bytes[start..]
        .iter()
        .fold(0, |acc, &byte| acc << 8 | u32::from(byte))
}

fn is_crc_covered(idx: usize, line: &[u8]) -> bool {
    idx >= PREAMBLE_LINES && line.first() != Some(&MARKER_SPI_ADDRESS)
}

/// Filler bits that bring a `width`-bit frame up to a byte boundary.
pub fn frame_padding(width: usize) -> usize {
    (8 - width % 8) % 8
}

/// The device named by the id code line of a header.
pub fn header_device(header: &[Vec<u8>]) -> Option<&'static device::DeviceId> {
    header
        .iter()
        .skip(PREAMBLE_LINES)
        .find(|line| line.first() == Some(&MARKER_DEVICE_ID))
        .and_then(|line| device::lookup(be_tail(line)))
}

/// Packs every frame into bytes in file order: mirrored, then left-padded
/// with 1 bits up to a byte boundary.
pub fn pack_frames(frames: &BitMatrix) -> Vec<Vec<u8>> {
    let width = frames.width();
    let padding = frame_padding(width);
    frames
        .mirrored()
        .rows()
        .map(|row| {
            let mut bytes = vec![0u8; (width + padding) / 8];
            for (i, bit) in std::iter::repeat_n(true, padding)
                .chain(row.iter().copied())
                .enumerate()
            {
                if bit {
                    bytes[i / 8] |= 0x80 >> (i % 8);
                }
            }
            bytes
        })
        .collect()
}

enum Section {
    Header,
    Frames { left: usize },
    Footer,
}

impl Bitstream {
    pub fn new(header: Vec<Vec<u8>>, frames: BitMatrix, footer: Vec<Vec<u8>>) -> Self {
        Self {
            header,
            footer,
            frames,
        }
    }

    pub fn parse(text: &str) -> Result<Bitstream, BitstreamError> {
        let mut header = vec![];
        let mut footer = vec![];
        let mut rows: Vec<Vec<bool>> = vec![];
        let mut crc = Crc16::new();
        let mut section = Section::Header;
        let mut padding = None;
        let mut expected = 0;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let bytes =
                parse_line(line).ok_or(BitstreamError::InvalidLine { line: lineno + 1 })?;
            match section {
                Section::Header => {
                    if is_crc_covered(header.len(), &bytes) {
                        crc.update(&bytes);
                    }
                    if header.len() >= PREAMBLE_LINES {
                        match bytes[0] {
                            MARKER_DEVICE_ID => {
                                let idcode = be_tail(&bytes);
                                let dev = device::lookup(idcode)
                                    .ok_or(BitstreamError::UnsupportedDevice { idcode })?;
                                debug!("bitstream for {name}", name = dev.name);
                                padding = Some(dev.padding);
                            }
                            MARKER_FRAME_COUNT => {
                                expected = be_tail(&bytes) as usize;
                                debug!("{expected} frames");
                                section = if expected == 0 {
                                    Section::Footer
                                } else {
                                    Section::Frames { left: expected }
                                };
                            }
                            _ => (),
                        }
                    }
                    header.push(bytes);
                }
                Section::Frames { left } => {
                    let frame = rows.len();
                    let padding = padding.ok_or(BitstreamError::MissingDeviceId)?;
                    if bytes.len() * 8 < padding + FRAME_TRAILER_BITS {
                        return Err(BitstreamError::FrameTooShort { frame });
                    }
                    let content_end = bytes.len() - FRAME_TRAILER_BITS / 8;
                    crc.update(&bytes[..content_end]);
                    let found = u16::from_le_bytes([bytes[content_end], bytes[content_end + 1]]);
                    if found != crc.get() {
                        return Err(BitstreamError::CrcMismatch {
                            frame,
                            expected: crc.get(),
                            found,
                        });
                    }
                    crc.reset();
                    crc.update(&bytes[bytes.len() - 6..]);
                    let row: Vec<bool> = bytes[..content_end]
                        .iter()
                        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i & 1) != 0))
                        .skip(padding)
                        .collect();
                    if rows.first().is_some_and(|first| first.len() != row.len()) {
                        return Err(BitstreamError::FrameWidthMismatch { frame });
                    }
                    rows.push(row);
                    section = if left == 1 {
                        Section::Footer
                    } else {
                        Section::Frames { left: left - 1 }
                    };
                }
                Section::Footer => footer.push(bytes),
            }
        }
        if let Section::Frames { left } = section {
            return Err(BitstreamError::TruncatedFrames {
                expected,
                found: expected - left,
            });
        }
        // from_rows only fails on ragged rows, which were rejected above
        let frames = BitMatrix::from_rows(&rows).unwrap_or_else(|| BitMatrix::new(0, 0));
        Ok(Bitstream {
            header,
            footer,
            frames: frames.mirrored(),
        })
    }

    /// The device named by the header's id code line.
    pub fn device_id(&self) -> Option<&'static device::DeviceId> {
        header_device(&self.header)
    }

    pub fn parse_from_file(fname: impl AsRef<Path>) -> Result<Self, BitstreamError> {
        let text = std::fs::read_to_string(fname)?;
        Self::parse(&text)
    }

    pub fn emit(&self) -> String {
        let mut out = String::new();
        let mut crc = Crc16::new();
        for (idx, line) in self.header.iter().enumerate() {
            if is_crc_covered(idx, line) {
                crc.update(line);
            }
            emit_bytes(&mut out, line);
            out.push('\n');
        }
        for row in pack_frames(&self.frames) {
            crc.update(&row);
            let val = crc.get();
            emit_bytes(&mut out, &row);
            emit_bytes(&mut out, &val.to_le_bytes());
            emit_bytes(&mut out, &FRAME_FILLER);
            out.push('\n');
            crc.reset();
            crc.update(&FRAME_FILLER);
        }
        for line in &self.footer {
            emit_bytes(&mut out, line);
            out.push('\n');
        }
        out
    }

    pub fn emit_to_file(&self, fname: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(fname, self.emit())
    }
}
