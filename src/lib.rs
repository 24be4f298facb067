//! Host-testable library interface for btperiph.
//!
//! The BLE logic modules (link state machine, battery scheduler,
//! attribute access, advertising payload) are pure and compile on the
//! host so they can be tested without embedded hardware.
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and is built with `--features embedded` for thumbv7em-none-eabihf; the
//! SoftDevice-facing modules (`ble::gatt`, `ble::tasks`) are gated behind
//! that feature.

#![cfg_attr(not(test), no_std)]

pub mod ble;
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use crate::ble::access::{accept_inbox, SubscriptionConfig};
    use crate::ble::adv::{build_adv_payload, SCAN_RESPONSE_DATA};
    use crate::ble::link::{ConnectStatus, Effect, LinkEvent, LinkState, PeripheralCore};
    use crate::ble::scheduler::BatterySampler;
    use crate::config::{BATTERY_LEVEL_FULL, INBOX_MAX_LEN, MANUFACTURER_NAME};
    use crate::error::AdvError;

    /// Attribute handle used for the battery-level value in these tests.
    const BATT_HANDLE: u16 = 0x000e;

    fn connected_core(handle: u16) -> PeripheralCore {
        let mut core = PeripheralCore::new(BATT_HANDLE);
        let _ = core.start();
        let effect = core.handle_event(LinkEvent::ConnectComplete {
            status: ConnectStatus::Success,
            handle,
        });
        assert_eq!(effect, Effect::None);
        core
    }

    // ════════════════════════════════════════════════════════════════════════
    // Subscription Config Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn subscription_config_starts_disabled() {
        let config = SubscriptionConfig::disabled();
        assert_eq!(config.as_bytes(), [0x00, 0x00]);
        assert!(!config.notify_enabled());
        assert!(!config.indicate_enabled());
    }

    #[test]
    fn subscription_config_notify_bit() {
        let mut config = SubscriptionConfig::disabled();
        config.write(&[0x01, 0x00]);
        assert!(config.notify_enabled());
        assert!(!config.indicate_enabled());
    }

    #[test]
    fn subscription_config_indicate_bit() {
        let mut config = SubscriptionConfig::disabled();
        config.write(&[0x02, 0x00]);
        assert!(!config.notify_enabled());
        assert!(config.indicate_enabled());
    }

    #[test]
    fn subscription_config_both_bits() {
        let mut config = SubscriptionConfig::disabled();
        config.write(&[0x03, 0x00]);
        assert!(config.notify_enabled());
        assert!(config.indicate_enabled());
    }

    #[test]
    fn subscription_config_short_write_keeps_trailing_byte() {
        let mut config = SubscriptionConfig::disabled();
        config.write(&[0x01, 0x07]);
        config.write(&[0x00]);
        // the 1-byte write replaces only the low byte
        assert_eq!(config.as_bytes(), [0x00, 0x07]);
        assert!(!config.notify_enabled());
    }

    #[test]
    fn subscription_config_empty_write_is_noop() {
        let mut config = SubscriptionConfig::disabled();
        config.write(&[0x01, 0x00]);
        config.write(&[]);
        assert_eq!(config.as_bytes(), [0x01, 0x00]);
        assert!(config.notify_enabled());
    }

    #[test]
    fn subscription_config_long_write_truncated() {
        let mut config = SubscriptionConfig::disabled();
        config.write(&[0x01, 0x00, 0xFF, 0xFF]);
        assert_eq!(config.as_bytes(), [0x01, 0x00]);
    }

    #[test]
    fn subscription_config_high_byte_does_not_enable() {
        let mut config = SubscriptionConfig::disabled();
        config.write(&[0x00, 0x01]);
        assert!(!config.notify_enabled());
        assert!(!config.indicate_enabled());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Inbox Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn inbox_accepts_arbitrary_payload() {
        let payload = accept_inbox(b"hello peripheral");
        assert_eq!(payload.as_slice(), b"hello peripheral");
    }

    #[test]
    fn inbox_accepts_empty_payload() {
        let payload = accept_inbox(&[]);
        assert!(payload.is_empty());
    }

    #[test]
    fn inbox_truncates_oversized_payload() {
        let big = [0xAB; 200];
        let payload = accept_inbox(&big);
        assert_eq!(payload.len(), INBOX_MAX_LEN);
        assert!(payload.iter().all(|&b| b == 0xAB));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Advertising Payload Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn adv_payload_layout() {
        let payload = build_adv_payload("AB", 0).unwrap();
        assert_eq!(
            payload.as_bytes(),
            &[
                0x02, 0x01, 0x06, // flags: LE General Discoverable, no BR/EDR
                0x02, 0x0A, 0x00, // tx power: 0 dBm
                0x03, 0x09, b'A', b'B', // complete local name
            ]
        );
    }

    #[test]
    fn adv_payload_negative_tx_power() {
        let payload = build_adv_payload("X", -8).unwrap();
        assert_eq!(payload.as_bytes()[5], 0xF8);
    }

    #[test]
    fn adv_payload_longest_name_fits() {
        let name = "ABCDEFGHIJKLMNOPQRSTUVW"; // 23 bytes
        let payload = build_adv_payload(name, 0).unwrap();
        assert_eq!(payload.as_bytes().len(), 31);
    }

    #[test]
    fn adv_payload_name_too_long() {
        let name = "ABCDEFGHIJKLMNOPQRSTUVWX"; // 24 bytes
        assert_eq!(build_adv_payload(name, 0), Err(AdvError::InvalidPayload));
    }

    #[test]
    fn adv_payload_empty_name_rejected() {
        assert_eq!(build_adv_payload("", 0), Err(AdvError::InvalidPayload));
    }

    #[test]
    fn scan_response_lists_both_services() {
        // AD structure: len=5, type=0x03 (complete 16-bit UUIDs)
        assert_eq!(SCAN_RESPONSE_DATA[..2], [0x05, 0x03]);
        assert_eq!(SCAN_RESPONSE_DATA[2..4], [0x0a, 0x18]); // 0x180A
        assert_eq!(SCAN_RESPONSE_DATA[4..6], [0x0f, 0x18]); // 0x180F
    }

    // ════════════════════════════════════════════════════════════════════════
    // Battery Sampler Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn sampler_starts_full_and_disarmed() {
        let sampler = BatterySampler::new();
        assert_eq!(sampler.level(), BATTERY_LEVEL_FULL);
        assert!(!sampler.is_armed());
    }

    #[test]
    fn sampler_counts_down() {
        let mut sampler = BatterySampler::new();
        assert_eq!(sampler.advance(), 99);
        assert_eq!(sampler.advance(), 98);
        assert_eq!(sampler.level(), 98);
    }

    #[test]
    fn sampler_wraps_from_zero_to_full() {
        let mut sampler = BatterySampler::new();
        for _ in 0..100 {
            sampler.advance();
        }
        assert_eq!(sampler.level(), 0);
        assert_eq!(sampler.advance(), BATTERY_LEVEL_FULL);
    }

    #[test]
    fn sampler_arming_is_idempotent() {
        let mut sampler = BatterySampler::new();
        sampler.arm();
        sampler.arm();
        assert!(sampler.is_armed());
        sampler.disarm();
        sampler.disarm();
        assert!(!sampler.is_armed());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Link State Machine Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn boot_requests_first_advertising_start() {
        let mut core = PeripheralCore::new(BATT_HANDLE);
        assert_eq!(core.link_state(), LinkState::Idle);
        assert_eq!(core.start(), Effect::StartAdvertising);
        assert_eq!(core.link_state(), LinkState::Advertising);
        assert_eq!(core.connection(), None);
    }

    #[test]
    fn successful_connect_records_handle() {
        let core = connected_core(7);
        assert_eq!(core.link_state(), LinkState::Connected);
        assert_eq!(core.connection(), Some(7));
    }

    #[test]
    fn failed_connect_restarts_advertising() {
        let mut core = PeripheralCore::new(BATT_HANDLE);
        let _ = core.start();
        let effect = core.handle_event(LinkEvent::ConnectComplete {
            status: ConnectStatus::Failed,
            handle: 7,
        });
        assert_eq!(effect, Effect::StartAdvertising);
        assert_eq!(core.connection(), None);
        assert_eq!(core.link_state(), LinkState::Advertising);
    }

    #[test]
    fn second_connect_supersedes_recorded_handle() {
        let mut core = connected_core(7);
        let _ = core.handle_event(LinkEvent::ConnectComplete {
            status: ConnectStatus::Success,
            handle: 9,
        });
        // at most one handle is ever recorded
        assert_eq!(core.connection(), Some(9));
    }

    #[test]
    fn disconnect_clears_handle_and_restarts_advertising() {
        let mut core = connected_core(7);
        let effect = core.handle_event(LinkEvent::Disconnected {
            handle: 7,
            reason: 0x13,
        });
        assert_eq!(effect, Effect::StartAdvertising);
        assert_eq!(core.connection(), None);
        assert_eq!(core.link_state(), LinkState::Advertising);
    }

    #[test]
    fn disconnect_with_unknown_handle_still_clears() {
        let mut core = connected_core(7);
        let _ = core.handle_event(LinkEvent::Disconnected {
            handle: 42,
            reason: 0x08,
        });
        assert_eq!(core.connection(), None);
    }

    #[test]
    fn disconnect_disarms_notifications() {
        let mut core = connected_core(7);
        core.write_subscription(&[0x01, 0x00]);
        assert!(core.notifications_armed());
        let _ = core.handle_event(LinkEvent::Disconnected {
            handle: 7,
            reason: 0x13,
        });
        assert!(!core.notifications_armed());
    }

    #[test]
    fn advertising_window_expiry_restarts_advertising() {
        let mut core = PeripheralCore::new(BATT_HANDLE);
        let _ = core.start();
        for _ in 0..3 {
            let effect = core.handle_event(LinkEvent::AdvertisingComplete);
            assert_eq!(effect, Effect::StartAdvertising);
            assert_eq!(core.link_state(), LinkState::Advertising);
        }
    }

    #[test]
    fn subscribe_event_arms_gate() {
        let mut core = connected_core(7);
        let effect = core.handle_event(LinkEvent::Subscribe {
            attr_handle: BATT_HANDLE,
            notify: true,
            indicate: false,
        });
        assert_eq!(effect, Effect::None);
        assert!(core.notifications_armed());
    }

    #[test]
    fn unsubscribe_event_disarms_gate() {
        let mut core = connected_core(7);
        core.write_subscription(&[0x01, 0x00]);
        let _ = core.handle_event(LinkEvent::Subscribe {
            attr_handle: BATT_HANDLE,
            notify: false,
            indicate: false,
        });
        assert!(!core.notifications_armed());
    }

    #[test]
    fn subscribe_to_other_attribute_is_ignored() {
        let mut core = connected_core(7);
        let _ = core.handle_event(LinkEvent::Subscribe {
            attr_handle: BATT_HANDLE + 1,
            notify: true,
            indicate: false,
        });
        assert!(!core.notifications_armed());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Tick / Notification Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn tick_without_connection_updates_level_only() {
        let mut core = PeripheralCore::new(BATT_HANDLE);
        let _ = core.start();
        let (level, note) = core.tick();
        assert_eq!(level, 99);
        assert!(note.is_none());
    }

    #[test]
    fn tick_connected_but_unsubscribed_sends_nothing() {
        let mut core = connected_core(7);
        let (level, note) = core.tick();
        assert_eq!(level, 99);
        assert!(note.is_none());
    }

    #[test]
    fn tick_armed_without_connection_sends_nothing() {
        let mut core = PeripheralCore::new(BATT_HANDLE);
        let _ = core.start();
        // gate armed via the descriptor while no peer is connected
        core.write_subscription(&[0x01, 0x00]);
        let (_, note) = core.tick();
        assert!(note.is_none());
    }

    #[test]
    fn tick_armed_and_connected_notifies_current_handle() {
        let mut core = connected_core(7);
        core.write_subscription(&[0x01, 0x00]);
        let (level, note) = core.tick();
        let note = note.unwrap();
        assert_eq!(level, 99);
        assert_eq!(note.conn, 7);
        assert_eq!(note.value_handle, BATT_HANDLE);
        assert_eq!(note.payload, [99]);
    }

    #[test]
    fn descriptor_write_arms_and_disarms_gate() {
        let mut core = connected_core(7);
        core.write_subscription(&[0x01, 0x00]);
        assert!(core.notifications_armed());
        core.write_subscription(&[0x00, 0x00]);
        assert!(!core.notifications_armed());
    }

    #[test]
    fn manufacturer_read_leaves_state_untouched() {
        let core = connected_core(7);
        assert_eq!(core.manufacturer_name(), MANUFACTURER_NAME);
        assert_eq!(core.link_state(), LinkState::Connected);
        assert_eq!(core.connection(), Some(7));
    }

    #[test]
    fn battery_read_reflects_sampler() {
        let mut core = connected_core(7);
        assert_eq!(core.battery_level(), BATTERY_LEVEL_FULL);
        let _ = core.tick();
        assert_eq!(core.battery_level(), 99);
    }
}
