//! Application-wide constants and compile-time configuration.
//!
//! All BLE identity, advertising, and timing parameters live here so they
//! can be tuned in one place.

// Identity

/// Complete local name carried in the advertisement payload.
pub const DEVICE_NAME: &str = "MY BLE DEVICE";

/// Manufacturer Name String characteristic value (UUID 0x2A29).
pub const MANUFACTURER_NAME: &str = "btperiph";

/// Random static identity address, set once at bring-up before advertising
/// starts. The two most significant bits of the last byte must be set per
/// the random-static address rules.
pub const STATIC_ADDRESS: [u8; 6] = [0x1e, 0x5c, 0xa4, 0x3b, 0x77, 0xfe];

// Advertising

/// Advertising interval (in 0.625 ms units). 400 = 250 ms.
pub const BLE_ADV_INTERVAL: u32 = 400;

/// Advertised transmit power (dBm), also encoded in the payload as the
/// Tx Power Level AD structure.
pub const BLE_ADV_TX_POWER: i8 = 0;

/// Advertising window (in 10 ms units). 18000 = 180 s; when the window
/// expires without a connection, advertising is simply restarted.
pub const BLE_ADV_TIMEOUT_10MS: u16 = 18_000;

// Battery sampling

/// Battery sampling period (seconds).
pub const BATTERY_TICK_SECS: u64 = 1;

/// Level the battery counter restarts from after reaching 0.
pub const BATTERY_LEVEL_FULL: u8 = 100;

// Inbox

/// Maximum accepted inbox write, in bytes. Longer writes are truncated.
pub const INBOX_MAX_LEN: usize = 64;
