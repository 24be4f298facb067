//! Embedded BLE tasks: the advertising/connection loop, GATT event
//! dispatch, and the battery tick.
//!
//! All tasks share one [`PeripheralCore`] behind a blocking mutex; the
//! critical sections are short and never block on the radio. The live
//! [`Connection`] is kept in a separate slot so the tick task can address
//! notifications without entering the event loop.

use core::cell::RefCell;

use crate::ble::adv::{self, AdvPayload, SCAN_RESPONSE_DATA};
use crate::ble::gatt::{BatteryServiceEvent, DeviceInfoServiceEvent, Server, ServerEvent};
use crate::ble::link::{ConnectStatus, Effect, LinkEvent, PeripheralCore};
use crate::config::{self, INBOX_MAX_LEN};
use crate::error::{AdvError, Error};
use defmt::{info, unwrap, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker, Timer};
use heapless::Vec;
use nrf_softdevice::ble::peripheral::{self as radio, AdvertiseError};
use nrf_softdevice::ble::{gatt_server, Connection, TxPower};
use nrf_softdevice::Softdevice;

/// Shared mutable peripheral state (see [`PeripheralCore`]).
pub type SharedCore = Mutex<CriticalSectionRawMutex, RefCell<PeripheralCore>>;

/// Inbox payloads forwarded from the GATT write path to the consumer task.
pub static INBOX_CHANNEL: Channel<CriticalSectionRawMutex, Vec<u8, INBOX_MAX_LEN>, 4> =
    Channel::new();

/// The single live connection, shared with the tick task for addressing
/// outgoing notifications. Cleared on disconnect before the link event is
/// fed to the core.
static ACTIVE_CONN: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

fn feed(core: &SharedCore, event: LinkEvent) -> Effect {
    core.lock(|c| c.borrow_mut().handle_event(event))
}

/// Outcome of one advertising session.
enum AdvOutcome {
    Connected(Connection),
    WindowExpired,
    Failed(AdvError),
}

async fn advertise_once(sd: &Softdevice, payload: &AdvPayload) -> AdvOutcome {
    let adv_config = radio::Config {
        interval: config::BLE_ADV_INTERVAL,
        // matches the tx-power AD structure carried in the payload
        tx_power: TxPower::ZerodBm,
        timeout: Some(config::BLE_ADV_TIMEOUT_10MS),
        ..Default::default()
    };
    let adv = radio::ConnectableAdvertisement::ScannableUndirected {
        adv_data: payload.as_bytes(),
        scan_data: &SCAN_RESPONSE_DATA,
    };
    match radio::advertise_connectable(sd, adv, &adv_config).await {
        Ok(conn) => AdvOutcome::Connected(conn),
        Err(AdvertiseError::Timeout) => AdvOutcome::WindowExpired,
        Err(e) => {
            warn!("[adv] start failed: {:?}", e);
            AdvOutcome::Failed(AdvError::RadioBusy)
        }
    }
}

/// Advertising/connection loop. Runs for the lifetime of the device: the
/// `StartAdvertising` effects the core requests are performed by looping
/// back into [`advertise_once`].
#[embassy_executor::task]
pub async fn ble_task(
    sd: &'static Softdevice,
    server: &'static Server,
    core: &'static SharedCore,
) -> ! {
    let payload = unwrap!(adv::build_adv_payload(
        config::DEVICE_NAME,
        config::BLE_ADV_TX_POWER
    ));

    // Boot transition: the machine asks for the first advertising start,
    // which the first loop iteration performs.
    let _ = core.lock(|c| c.borrow_mut().start());

    let mut retried = false;
    loop {
        let conn = match advertise_once(sd, &payload).await {
            AdvOutcome::Connected(conn) => conn,
            AdvOutcome::WindowExpired => {
                retried = false;
                let _ = feed(core, LinkEvent::AdvertisingComplete);
                continue;
            }
            AdvOutcome::Failed(e) => {
                // a failed attempt leaves the machine advertising
                let _ = feed(
                    core,
                    LinkEvent::ConnectComplete {
                        status: ConnectStatus::Failed,
                        handle: 0,
                    },
                );
                if retried {
                    // bounded policy: one immediate retry, then wait out
                    // a tick instead of spinning on a busy radio
                    warn!("[adv] still failing: {:?}", Error::Adv(e));
                    Timer::after(Duration::from_secs(config::BATTERY_TICK_SECS)).await;
                    retried = false;
                } else {
                    retried = true;
                }
                continue;
            }
        };
        retried = false;

        let Some(handle) = conn.handle() else {
            warn!("[link] connection without a handle, dropping");
            continue;
        };
        if core.lock(|c| c.borrow().connection().is_some()) {
            warn!("[link] connect while a handle is recorded, superseding");
        }
        let _ = feed(
            core,
            LinkEvent::ConnectComplete {
                status: ConnectStatus::Success,
                handle,
            },
        );
        ACTIVE_CONN.lock(|slot| *slot.borrow_mut() = Some(conn.clone()));
        info!("[link] connected, handle {}", handle);

        // Serve GATT events until the connection drops.
        let _reason = gatt_server::run(&conn, server, |event| {
            dispatch_gatt_event(core, event);
        })
        .await;
        info!("[link] disconnected, handle {}", handle);

        ACTIVE_CONN.lock(|slot| *slot.borrow_mut() = None);
        // The HCI reason code is not surfaced by the run loop; the machine
        // ignores it anyway. The requested advertising restart happens on
        // the next loop iteration.
        let _ = feed(core, LinkEvent::Disconnected { handle, reason: 0 });
    }
}

/// Access-handler dispatch for peer writes.
fn dispatch_gatt_event(core: &SharedCore, event: ServerEvent) {
    match event {
        ServerEvent::Dis(DeviceInfoServiceEvent::InboxWrite(payload)) => {
            info!("[inbox] {} byte write", payload.len());
            if INBOX_CHANNEL.try_send(payload).is_err() {
                warn!("[inbox] consumer backlog full - dropping payload");
            }
        }
        ServerEvent::Bas(BatteryServiceEvent::BatteryLevelCccdWrite { payload }) => {
            let (attr_handle, notify, indicate) = core.lock(|c| {
                let mut c = c.borrow_mut();
                c.write_subscription(&payload);
                (
                    c.battery_value_handle(),
                    c.subscription().notify_enabled(),
                    c.subscription().indicate_enabled(),
                )
            });
            let _ = feed(
                core,
                LinkEvent::Subscribe {
                    attr_handle,
                    notify,
                    indicate,
                },
            );
            info!("[bas] subscription update: notify={} indicate={}", notify, indicate);
        }
    }
}

/// Battery sampler. Runs every second for the lifetime of the device;
/// whether a sample is also delivered is decided by the core.
#[embassy_executor::task]
pub async fn battery_tick_task(
    sd: &'static Softdevice,
    server: &'static Server,
    core: &'static SharedCore,
) -> ! {
    let mut ticker = Ticker::every(Duration::from_secs(config::BATTERY_TICK_SECS));
    loop {
        ticker.next().await;
        let (level, pending) = core.lock(|c| c.borrow_mut().tick());

        // keep the readable attribute value current
        if let Err(e) = server.bas.battery_level_set(sd, level) {
            warn!("[bas] level update failed: {:?}", e);
        }

        let Some(note) = pending else { continue };
        let conn = ACTIVE_CONN.lock(|slot| slot.borrow().clone());
        match conn {
            Some(conn) if conn.handle() == Some(note.conn) => {
                if let Err(e) = server.bas.battery_level_notify(&conn, note.payload[0]) {
                    warn!("[bas] dropping notification: {:?}", e);
                }
            }
            // the link went down after the tick decided to send; drop it
            _ => {}
        }
    }
}

/// Logs inbox payloads handed over by the GATT write path.
#[embassy_executor::task]
pub async fn inbox_task() -> ! {
    loop {
        let payload = INBOX_CHANNEL.receive().await;
        match core::str::from_utf8(&payload) {
            Ok(text) => info!("[inbox] received: {}", text),
            Err(_) => info!("[inbox] received {} bytes", payload.len()),
        }
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}
