#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use embassy_executor::Spawner;
use embassy_net::{Runner, Stack};
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::WifiDevice;
use log::{info, warn};
use rtt_target::rprintln;
use static_cell::StaticCell;

use soilmon_core::app_state::LastReading;
use soilmon_core::config::{CALIBRATION, HTTP_PORT, UplinkConfig};
use soilmon_core::connectivity::{BootOutcome, ConnectivityManager};
use soilmon_core::operational::OperationalLoop;
use soilmon_core::sensors::MoistureSensor;
use soilmon_core::status_server::StatusServer;
use soilmon_core::uplink::Uplink;
use soilmon_firmware::adc::ProbeAdc;
use soilmon_firmware::app_state::{ap_gateway, init_credential_store, init_network_stacks};
use soilmon_firmware::net::{SocketListener, TcpTransport};
use soilmon_firmware::time::EmbassyClock;
use soilmon_firmware::wifi::EspWifi;

const UPLINK: UplinkConfig<'static> = UplinkConfig::new(
    env!("SOILMON_BASE_URL"),
    env!("SOILMON_API_KEY"),
    env!("SOILMON_TABLE"),
);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static LAST_READING: LastReading = LastReading::new();

#[embassy_executor::task(pool_size = 2)]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Hands out addresses on the provisioning access point.
#[embassy_executor::task]
async fn dhcp_server_task(stack: Stack<'static>, gateway: Ipv4Addr) {
    use edge_dhcp::io::{self, DEFAULT_SERVER_PORT};
    use edge_dhcp::server::{Server, ServerOptions};
    use edge_nal::UdpBind;
    use edge_nal_embassy::{Udp, UdpBuffers};

    let mut buf = [0u8; 1500];
    let mut gateways = [gateway];

    let buffers = UdpBuffers::<1, 1024, 1024, 4>::new();
    let udp = Udp::new(stack, &buffers);
    let mut socket = match udp
        .bind(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::UNSPECIFIED,
            DEFAULT_SERVER_PORT,
        )))
        .await
    {
        Ok(socket) => socket,
        Err(e) => {
            warn!("DHCP server bind failed: {:?}", e);
            return;
        }
    };

    loop {
        if let Err(e) = io::server::run(
            &mut Server::<_, 16>::new_with_et(gateway),
            &ServerOptions::new(gateway, Some(&mut gateways)),
            &mut socket,
            &mut buf,
        )
        .await
        {
            warn!("DHCP server error: {:?}", e);
        }
        Timer::after(Duration::from_millis(500)).await;
    }
}

fn socket_buffers() -> (&'static mut [u8], &'static mut [u8]) {
    (
        alloc::vec![0u8; 1536].leak(),
        alloc::vec![0u8; 1536].leak(),
    )
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let mut store = init_credential_store(peripherals.FLASH);

    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi controller"));
    let (controller, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let stacks = init_network_stacks(interfaces, seed);

    spawner
        .spawn(net_task(stacks.sta_runner))
        .expect("Failed to spawn station net task");
    spawner
        .spawn(net_task(stacks.ap_runner))
        .expect("Failed to spawn access point net task");
    spawner
        .spawn(dhcp_server_task(stacks.ap, ap_gateway()))
        .expect("Failed to spawn DHCP server");

    // Boot: join the saved network or run the provisioning portal.
    let wifi = EspWifi::new(controller, stacks.sta, stacks.ap);
    let (portal_rx, portal_tx) = socket_buffers();
    let mut portal_listener = SocketListener::new(stacks.ap, HTTP_PORT, portal_rx, portal_tx);
    let mut manager = ConnectivityManager::new(wifi, Delay, EmbassyClock);

    if manager.boot(&mut store, &mut portal_listener).await == BootOutcome::Restart {
        info!("Restarting");
        esp_hal::system::software_reset();
    }
    drop(portal_listener);

    // Operational phase.
    UPLINK.log_config();

    let sensor = MoistureSensor::new(ProbeAdc::new(peripherals.ADC1, peripherals.GPIO34), CALIBRATION);
    let indicator = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let (uplink_rx, uplink_tx) = socket_buffers();
    let uplink = Uplink::new(TcpTransport::new(stacks.sta, uplink_rx, uplink_tx), &UPLINK);

    let (status_rx, status_tx) = socket_buffers();
    let status = StatusServer::new(SocketListener::new(stacks.sta, HTTP_PORT, status_rx, status_tx));
    info!("Status server listening on port {}", HTTP_PORT);
    rprintln!("soilmon running");

    // The controller must stay alive: dropping it shuts the radio down.
    let (_wifi, delay) = manager.into_parts();
    let mut operational = OperationalLoop::new(
        sensor,
        uplink,
        status,
        indicator,
        EmbassyClock,
        delay,
        &LAST_READING,
    );
    operational.run().await
}
