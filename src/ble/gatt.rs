//! GATT attribute table: Device Information and Battery services.
//!
//! Services are registered against the SoftDevice attribute registry at
//! bring-up; the handles assigned there are immutable afterwards. Peer
//! writes surface through the [`gatt_server::Server`] impl as typed
//! events which the tasks module dispatches to the access handlers.

use crate::ble::access;
use crate::config::{BATTERY_LEVEL_FULL, INBOX_MAX_LEN, MANUFACTURER_NAME};
use crate::error::Error;
use heapless::Vec;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, RegisterError, WriteOp};
use nrf_softdevice::ble::{Connection, Uuid};
use nrf_softdevice::Softdevice;

const DEVICE_INFO_SERVICE: Uuid = Uuid::new_16(0x180a);
const MANUFACTURER_NAME_CHAR: Uuid = Uuid::new_16(0x2a29);
const BATTERY_SERVICE: Uuid = Uuid::new_16(0x180f);
const BATTERY_LEVEL_CHAR: Uuid = Uuid::new_16(0x2a19);

/// Write-only inbox characteristic 57d9a170-2414-4c8b-a733-12f2ecbf9f42,
/// as the little-endian byte array the SoftDevice expects.
const INBOX_CHAR_UUID128: [u8; 16] = [
    0x42, 0x9f, 0xbf, 0xec, 0xf2, 0x12, 0x33, 0xa7, 0x8b, 0x4c, 0x14, 0x24, 0x70, 0xa1, 0xd9, 0x57,
];

/// Device Information Service (0x180A): fixed manufacturer string plus
/// the custom write-only inbox.
pub struct DeviceInfoService {
    inbox_value_handle: u16,
}

pub enum DeviceInfoServiceEvent {
    /// A peer wrote the inbox; the payload is already sanitized.
    InboxWrite(Vec<u8, INBOX_MAX_LEN>),
}

impl DeviceInfoService {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut service_builder = ServiceBuilder::new(sd, DEVICE_INFO_SERVICE)?;

        let manufacturer_builder = service_builder.add_characteristic(
            MANUFACTURER_NAME_CHAR,
            Attribute::new(MANUFACTURER_NAME.as_bytes()),
            Metadata::new(Properties::new().read()),
        )?;
        let _manufacturer_handles = manufacturer_builder.build();

        let inbox_builder = service_builder.add_characteristic(
            Uuid::new_128(&INBOX_CHAR_UUID128),
            Attribute::new(&[0u8]).variable_len(INBOX_MAX_LEN as u16),
            Metadata::new(Properties::new().write()),
        )?;
        let inbox_handles = inbox_builder.build();

        let _service_handle = service_builder.build();

        Ok(Self {
            inbox_value_handle: inbox_handles.value_handle,
        })
    }

    pub fn on_write(&self, handle: u16, data: &[u8]) -> Option<DeviceInfoServiceEvent> {
        if handle == self.inbox_value_handle {
            return Some(DeviceInfoServiceEvent::InboxWrite(access::accept_inbox(
                data,
            )));
        }
        None
    }
}

/// Battery Service (0x180F): the notifiable battery-level characteristic
/// with its client characteristic configuration descriptor.
pub struct BatteryService {
    value_handle: u16,
    cccd_handle: u16,
}

pub enum BatteryServiceEvent {
    /// A peer rewrote the subscription descriptor; `payload` carries the
    /// raw bytes as written (at most 2).
    BatteryLevelCccdWrite {
        payload: Vec<u8, { access::SUBSCRIPTION_CONFIG_LEN }>,
    },
}

impl BatteryService {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut service_builder = ServiceBuilder::new(sd, BATTERY_SERVICE)?;

        let level_builder = service_builder.add_characteristic(
            BATTERY_LEVEL_CHAR,
            Attribute::new(&[BATTERY_LEVEL_FULL]),
            Metadata::new(Properties::new().read().notify()),
        )?;
        let level_handles = level_builder.build();

        let _service_handle = service_builder.build();

        Ok(Self {
            value_handle: level_handles.value_handle,
            cccd_handle: level_handles.cccd_handle,
        })
    }

    /// Attribute handle identifying the battery-level value for addressed
    /// notifications.
    pub fn value_handle(&self) -> u16 {
        self.value_handle
    }

    /// Update the readable attribute value.
    pub fn battery_level_set(
        &self,
        sd: &Softdevice,
        val: u8,
    ) -> Result<(), gatt_server::SetValueError> {
        gatt_server::set_value(sd, self.value_handle, &[val])
    }

    /// Push the level to the connected peer.
    pub fn battery_level_notify(&self, conn: &Connection, val: u8) -> Result<(), Error> {
        gatt_server::notify_value(conn, self.value_handle, &[val]).map_err(|_| Error::NotifyFailed)
    }

    pub fn on_write(&self, handle: u16, data: &[u8]) -> Option<BatteryServiceEvent> {
        if handle == self.cccd_handle {
            let mut payload = Vec::new();
            let n = data.len().min(access::SUBSCRIPTION_CONFIG_LEN);
            let _ = payload.extend_from_slice(&data[..n]);
            return Some(BatteryServiceEvent::BatteryLevelCccdWrite { payload });
        }
        None
    }
}

/// The peripheral's whole attribute surface.
pub struct Server {
    pub dis: DeviceInfoService,
    pub bas: BatteryService,
}

pub enum ServerEvent {
    Dis(DeviceInfoServiceEvent),
    Bas(BatteryServiceEvent),
}

impl Server {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        Ok(Self {
            dis: DeviceInfoService::new(sd)?,
            bas: BatteryService::new(sd)?,
        })
    }
}

impl gatt_server::Server for Server {
    type Event = ServerEvent;

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        self.dis
            .on_write(handle, data)
            .map(ServerEvent::Dis)
            .or_else(|| self.bas.on_write(handle, data).map(ServerEvent::Bas))
    }
}
