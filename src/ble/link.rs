//! Connection/event state machine for the single peripheral link.
//!
//! The host-stack glue feeds [`LinkEvent`]s in and performs the returned
//! [`Effect`]; all mutable peripheral state lives in one [`PeripheralCore`]
//! shared between the event path and the battery tick task.

use crate::ble::access::SubscriptionConfig;
use crate::ble::scheduler::{BatterySampler, Notification};
use crate::ble::ConnHandle;
use crate::config::MANUFACTURER_NAME;

/// Result of a connect-complete link event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectStatus {
    Success,
    /// The attempt failed below the host layer (e.g. a collision); no
    /// connection exists.
    Failed,
}

/// Link-layer events consumed by the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// A connection attempt finished, successfully or not.
    ConnectComplete {
        status: ConnectStatus,
        handle: ConnHandle,
    },
    /// The link dropped. The reason code is diagnostic only; the machine
    /// reacts the same way regardless.
    Disconnected { handle: ConnHandle, reason: u8 },
    /// An advertising window expired without a connection.
    AdvertisingComplete,
    /// The peer changed its subscription on `attr_handle`.
    Subscribe {
        attr_handle: u16,
        notify: bool,
        indicate: bool,
    },
}

/// Host-stack work requested by the machine in response to an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    None,
    /// (Re)start advertising. Failures are not retried here - the next
    /// triggering event re-issues the start.
    StartAdvertising,
}

/// Lifecycle of the peripheral link. There is no terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Idle,
    Advertising,
    Connected,
}

/// All mutable peripheral state: link bookkeeping, the subscription
/// descriptor value, and the battery sampler.
pub struct PeripheralCore {
    state: LinkState,
    conn: Option<ConnHandle>,
    battery_value_handle: u16,
    battery: BatterySampler,
    subscription: SubscriptionConfig,
}

impl PeripheralCore {
    /// `battery_value_handle` is the attribute handle assigned to the
    /// battery-level characteristic at registration; it never changes
    /// afterwards.
    pub const fn new(battery_value_handle: u16) -> Self {
        Self {
            state: LinkState::Idle,
            conn: None,
            battery_value_handle,
            battery: BatterySampler::new(),
            subscription: SubscriptionConfig::disabled(),
        }
    }

    /// Boot transition: leave `Idle` and request the first advertising
    /// start.
    pub fn start(&mut self) -> Effect {
        self.state = LinkState::Advertising;
        Effect::StartAdvertising
    }

    /// Process one link-layer event and return the work it requires.
    pub fn handle_event(&mut self, event: LinkEvent) -> Effect {
        match event {
            LinkEvent::ConnectComplete {
                status: ConnectStatus::Failed,
                ..
            } => {
                // stay discoverable after a failed attempt
                self.state = LinkState::Advertising;
                Effect::StartAdvertising
            }
            LinkEvent::ConnectComplete {
                status: ConnectStatus::Success,
                handle,
            } => {
                // a connect while a handle is still recorded is a stack
                // anomaly; the newer link supersedes the record
                self.conn = Some(handle);
                self.state = LinkState::Connected;
                Effect::None
            }
            LinkEvent::Disconnected { .. } => {
                // only one link is tracked: clear it whichever handle the
                // event names, and never notify without a connection
                self.conn = None;
                self.battery.disarm();
                self.state = LinkState::Advertising;
                Effect::StartAdvertising
            }
            LinkEvent::AdvertisingComplete => {
                self.state = LinkState::Advertising;
                Effect::StartAdvertising
            }
            LinkEvent::Subscribe {
                attr_handle,
                notify,
                ..
            } => {
                if attr_handle == self.battery_value_handle {
                    if notify {
                        self.battery.arm();
                    } else {
                        self.battery.disarm();
                    }
                }
                Effect::None
            }
        }
    }

    /// One sampling period: update the level and, when the gate is armed
    /// and a peer is connected, emit the notification to deliver. Without
    /// a connection the sample still happens but nothing is sent.
    pub fn tick(&mut self) -> (u8, Option<Notification>) {
        let level = self.battery.advance();
        let note = match self.conn {
            Some(conn) if self.battery.is_armed() => Some(Notification {
                conn,
                value_handle: self.battery_value_handle,
                payload: [level],
            }),
            _ => None,
        };
        (level, note)
    }

    // Attribute access handlers. Reads never fail and leave the link
    // state untouched; the subscription write is the only access with a
    // side effect beyond its own value.

    /// Device-info read: the fixed manufacturer string.
    pub fn manufacturer_name(&self) -> &'static str {
        MANUFACTURER_NAME
    }

    /// Battery-level read.
    pub fn battery_level(&self) -> u8 {
        self.battery.level()
    }

    /// Subscription-descriptor read.
    pub fn subscription(&self) -> &SubscriptionConfig {
        &self.subscription
    }

    /// Subscription-descriptor write: copy the payload (partial-write
    /// semantics, see [`SubscriptionConfig::write`]), then re-evaluate the
    /// notification gate from bit 0.
    pub fn write_subscription(&mut self, payload: &[u8]) {
        self.subscription.write(payload);
        if self.subscription.notify_enabled() {
            self.battery.arm();
        } else {
            self.battery.disarm();
        }
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.conn
    }

    pub fn link_state(&self) -> LinkState {
        self.state
    }

    pub fn battery_value_handle(&self) -> u16 {
        self.battery_value_handle
    }

    pub fn notifications_armed(&self) -> bool {
        self.battery.is_armed()
    }
}
