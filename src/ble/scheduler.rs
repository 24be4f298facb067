//! Battery sampler and notification scheduling.
//!
//! The sampler runs for the lifetime of the device; the client-controlled
//! *gate* decides whether a sample is also delivered as a notification.
//! This keeps arming and disarming trivially idempotent: both only flip
//! the gate, the periodic task itself is never started or stopped.

use crate::ble::ConnHandle;
use crate::config::BATTERY_LEVEL_FULL;

/// A battery-level notification addressed to the connected peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Notification {
    /// Connection the notification is addressed to.
    pub conn: ConnHandle,
    /// Attribute handle of the battery-level characteristic value.
    pub value_handle: u16,
    /// The single updated level byte.
    pub payload: [u8; 1],
}

/// Battery level counter plus the notification delivery gate.
#[derive(Debug)]
pub struct BatterySampler {
    level: u8,
    armed: bool,
}

impl BatterySampler {
    pub const fn new() -> Self {
        Self {
            level: BATTERY_LEVEL_FULL,
            armed: false,
        }
    }

    /// Advance one sampling period: count down one percent, wrapping from
    /// 0 back to full. Returns the updated level.
    pub fn advance(&mut self) -> u8 {
        self.level = match self.level {
            0 => BATTERY_LEVEL_FULL,
            n => n - 1,
        };
        self.level
    }

    /// Open the delivery gate. Arming an armed gate is a no-op.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Close the delivery gate. Disarming a closed gate is a no-op.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn level(&self) -> u8 {
        self.level
    }
}

impl Default for BatterySampler {
    fn default() -> Self {
        Self::new()
    }
}
