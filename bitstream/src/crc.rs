/// CRC-16/ARC: poly 0x8005 (reflected 0xa001), init 0, reflected in and out,
/// no final xor.
#[derive(Debug, Clone, Default)]
pub struct Crc16 {
    crc: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Self { crc: 0 }
    }

    pub fn reset(&mut self) {
        self.crc = 0;
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.crc ^= u16::from(byte);
            for _ in 0..8 {
                if (self.crc & 1) != 0 {
                    self.crc = self.crc >> 1 ^ 0xa001;
                } else {
                    self.crc >>= 1;
                }
            }
        }
    }

    pub fn get(&self) -> u16 {
        self.crc
    }
}

pub fn crc16_arc(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.get()
}
