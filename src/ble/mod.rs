//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Advertising** - builds the advertisement payload and keeps the
//!    device discoverable until a central connects.
//! 2. **Link state machine** - tracks the single connection handle and
//!    decides when advertising must be restarted.
//! 3. **Access handlers** - service attribute reads/writes, including the
//!    battery-level subscription descriptor that gates notifications.
//! 4. **Battery scheduler** - samples the battery level once per second
//!    and notifies the subscribed peer.
//!
//! The logic modules (`link`, `scheduler`, `access`, `adv`) are pure and
//! host-testable; `gatt` and `tasks` bind them to the SoftDevice and are
//! only built with the `embedded` feature.

pub mod access;
pub mod adv;
pub mod link;
pub mod scheduler;

#[cfg(feature = "embedded")]
pub mod gatt;
#[cfg(feature = "embedded")]
pub mod tasks;

/// BLE connection handle as assigned by the host stack, scoped to the
/// lifetime of the link.
pub type ConnHandle = u16;
