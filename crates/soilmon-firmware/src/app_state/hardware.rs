//! Hardware initialization for the soilmon device
//!
//! Sets up the peripherals the core needs in the order they depend on each
//! other: flash before anything reads credentials, the radio before either
//! network stack.

use core::net::Ipv4Addr;

use embassy_net::{Ipv4Cidr, Runner, Stack, StackResources, StaticConfigV4};
use esp_radio::wifi::{Interfaces, WifiDevice};
use esp_storage::FlashStorage;
use log::info;
use soilmon_core::config::AP_GATEWAY;
use soilmon_core::storage::{CredentialStore, FlashRecord};
use static_cell::StaticCell;

/// Flash offset of the credential record: the start of the `nvs` data
/// partition of the default partition table, which nothing else uses.
pub const CREDENTIALS_FLASH_OFFSET: u32 = 0x9000;

/// Sockets per stack: a listener and an uplink socket on the station, the
/// portal listener and the DHCP server on the access point, plus DNS.
const STACK_SOCKETS: usize = 4;

pub type FlashCredentialStore = CredentialStore<FlashRecord<FlashStorage<'static>>>;

/// Open the credential record in on-chip flash.
pub fn init_credential_store(flash: esp_hal::peripherals::FLASH<'static>) -> FlashCredentialStore {
    let flash = FlashStorage::new(flash);
    CredentialStore::new(FlashRecord::new(flash, CREDENTIALS_FLASH_OFFSET))
}

pub fn ap_gateway() -> Ipv4Addr {
    let [a, b, c, d] = AP_GATEWAY;
    Ipv4Addr::new(a, b, c, d)
}

/// Both network stacks and the runners that must be spawned to drive them.
pub struct NetworkStacks {
    pub sta: Stack<'static>,
    pub sta_runner: Runner<'static, WifiDevice<'static>>,
    pub ap: Stack<'static>,
    pub ap_runner: Runner<'static, WifiDevice<'static>>,
}

/// Create the station stack (DHCP client) and the access-point stack
/// (static gateway address).
pub fn init_network_stacks(interfaces: Interfaces<'static>, seed: u64) -> NetworkStacks {
    let gateway = ap_gateway();

    static STA_RESOURCES: StaticCell<StackResources<STACK_SOCKETS>> = StaticCell::new();
    let (sta, sta_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STA_RESOURCES.init(StackResources::new()),
        seed,
    );

    static AP_RESOURCES: StaticCell<StackResources<STACK_SOCKETS>> = StaticCell::new();
    let (ap, ap_runner) = embassy_net::new(
        interfaces.ap,
        embassy_net::Config::ipv4_static(StaticConfigV4 {
            address: Ipv4Cidr::new(gateway, 24),
            gateway: Some(gateway),
            dns_servers: Default::default(),
        }),
        AP_RESOURCES.init(StackResources::new()),
        seed,
    );

    info!("Network stacks ready (AP gateway {})", gateway);

    NetworkStacks {
        sta,
        sta_runner,
        ap,
        ap_runner,
    }
}
