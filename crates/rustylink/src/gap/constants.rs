// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

pub const BD_ADDR_SIZE: usize = 6;

// LE connection parameter bounds accepted by an update request
pub const CONN_INTERVAL_MIN: u16 = 6; // 7.5 ms
pub const CONN_INTERVAL_MAX: u16 = 3200; // 4 s
pub const CONN_LATENCY_MAX: u16 = 500;
pub const SUPERVISION_TIMEOUT_MIN: u16 = 10; // 100 ms
pub const SUPERVISION_TIMEOUT_MAX: u16 = 3200; // 32 s

// Unit conversions for connection parameters
pub const CONN_INTERVAL_UNIT_US: u32 = 1250;
pub const SUPERVISION_TIMEOUT_UNIT_MS: u32 = 10;
