//! Device identification codes found in the bitstream header and the
//! per-device frame padding that goes with them.

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DeviceId {
    pub idcode: u32,
    pub name: &'static str,
    /// Number of filler bits on the left of every frame.
    pub padding: usize,
}

pub const DEVICE_IDS: &[DeviceId] = &[
    DeviceId {
        idcode: 0x0900_281b,
        name: "GW1N-1",
        padding: 0,
    },
    DeviceId {
        idcode: 0x0100_681b,
        name: "GW1NZ-1",
        padding: 0,
    },
    DeviceId {
        idcode: 0x0100_381b,
        name: "GW1N-4",
        padding: 0,
    },
    DeviceId {
        idcode: 0x0100_981b,
        name: "GW1NS-4",
        padding: 0,
    },
    DeviceId {
        idcode: 0x1100_581b,
        name: "GW1N-9",
        padding: 4,
    },
    DeviceId {
        idcode: 0x1100_481b,
        name: "GW1N-9C",
        padding: 4,
    },
    DeviceId {
        idcode: 0x0000_081b,
        name: "GW2A-18",
        padding: 0,
    },
];

pub fn lookup(idcode: u32) -> Option<&'static DeviceId> {
    DEVICE_IDS.iter().find(|dev| dev.idcode == idcode)
}

pub fn lookup_name(name: &str) -> Option<&'static DeviceId> {
    DEVICE_IDS.iter().find(|dev| dev.name == name)
}
