//! Firmware entry point for the nRF52840.
//!
//! Brings up the SoftDevice, sets the random static identity address,
//! registers the GATT services, and spawns the BLE tasks. Everything past
//! this point is event-driven; see `ble::tasks`.

#![no_std]
#![no_main]

use core::cell::RefCell;

use btperiph::ble::gatt::Server;
use btperiph::ble::link::PeripheralCore;
use btperiph::ble::tasks::{self, SharedCore};
use btperiph::config;
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::Mutex;
use nrf_softdevice::ble::{set_address, Address, AddressType};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

use defmt_rtt as _;
use panic_probe as _;

fn enable_softdevice(name: &'static str) -> &'static mut Softdevice {
    // Single peripheral link, no central role.
    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_50_PPM as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 256 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: 2048,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: name.as_ptr() as *const u8 as _,
            current_len: name.len() as u16,
            max_len: name.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };
    Softdevice::enable(&sd_config)
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // The SoftDevice claims the highest interrupt priorities; the
    // application must stay below them.
    let mut hw_config = embassy_nrf::config::Config::default();
    hw_config.gpiote_interrupt_priority = Priority::P2;
    hw_config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(hw_config);

    info!("starting SoftDevice");
    let sd = enable_softdevice(config::DEVICE_NAME);

    // Advertise with a random static (non-public) identity, established
    // once before the first advertising start.
    set_address(
        sd,
        &Address::new(AddressType::RandomStatic, config::STATIC_ADDRESS),
    );

    static SERVER: StaticCell<Server> = StaticCell::new();
    let server = SERVER.init(unwrap!(Server::new(sd)));
    info!(
        "GATT services registered, battery value handle {}",
        server.bas.value_handle()
    );

    static CORE: StaticCell<SharedCore> = StaticCell::new();
    let core = CORE.init(Mutex::new(RefCell::new(PeripheralCore::new(
        server.bas.value_handle(),
    ))));

    // registration is done; the tasks only need shared access
    let sd: &'static Softdevice = sd;

    unwrap!(spawner.spawn(tasks::softdevice_task(sd)));
    unwrap!(spawner.spawn(tasks::ble_task(sd, server, core)));
    unwrap!(spawner.spawn(tasks::battery_tick_task(sd, server, core)));
    unwrap!(spawner.spawn(tasks::inbox_task()));
}
