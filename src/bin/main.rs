#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_time::{Duration as EmbassyDuration, Timer, WithTimeout};
use esp_hal::{
    clock::CpuClock,
    delay::Delay,
    gpio::{DriveMode, Flex, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    rng::Rng,
    spi::{
        Mode as SpiMode,
        master::{Config as SpiConfig, Spi},
    },
    time::{Duration as HalDuration, Instant, Rate},
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart},
};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use log::{LevelFilter, info, warn};
use plantlink_core::{
    app::{Gateway, TickResult},
    config::GatewayConfig,
    device::{IndicatorStrip, Rgb},
    observer::LogObserver,
    publish::{self, Publisher},
    retry::RetryPolicy,
};
use plantlink_hal_esp32::{
    cloud::{KvOutbox, OutcomeChannel, REQUEST_DEPTH, RequestChannel, SheetOutbox},
    network::{
        ConnectivityHandle, WIFI_RETRY, WifiConfig,
        clock::{ClockHandle, SystemClock},
    },
    platform::{
        BusyLed,
        lcd::{self, Lcd1602},
        strip::{self, ColorOrder, SpiStrip},
    },
    sensor::ambient::DhtAmbient,
    serial::line_uart::UartLines,
};
use static_cell::StaticCell;

use uplink::CloudCredentials;

#[path = "main/time_sync.rs"]
mod time_sync;
#[path = "main/uplink.rs"]
mod uplink;

const SENSOR_UART_BAUD: u32 = 9_600;
const SENSOR_LINE_TIMEOUT_MS: u64 = 1_000;
const LCD_I2C_KHZ: u32 = 100;
const LCD_INIT: RetryPolicy = RetryPolicy::forever(100).with_max_attempts(3);
const STRIP_PIXELS: usize = 70;
const STRIP_BRIGHTNESS: u8 = 100;
const CONTROL_TICK_MS: u64 = 50;
const NETWORK_POLL_INTERVAL_MS: u64 = 500;
const DHCP_TIMEOUT_SECS: u64 = 15;

const WIFI_SSID: &str = env!(
    "PLANTLINK_WIFI_SSID",
    "Set PLANTLINK_WIFI_SSID in your environment before building/flashing."
);
const WIFI_PASSWORD: &str = env!(
    "PLANTLINK_WIFI_PASSWORD",
    "Set PLANTLINK_WIFI_PASSWORD in your environment before building/flashing."
);
const WIFI_CONFIG: WifiConfig = WifiConfig::new(WIFI_SSID, WIFI_PASSWORD);

const CLOUD: CloudCredentials = CloudCredentials {
    db_host: env!(
        "PLANTLINK_DB_HOST",
        "Set PLANTLINK_DB_HOST (realtime database host) before building/flashing."
    ),
    db_secret: env!(
        "PLANTLINK_DB_SECRET",
        "Set PLANTLINK_DB_SECRET (database secret) before building/flashing."
    ),
    sheet_id: env!(
        "PLANTLINK_SHEET_ID",
        "Set PLANTLINK_SHEET_ID (spreadsheet id) before building/flashing."
    ),
    sheets_token: env!(
        "PLANTLINK_SHEETS_TOKEN",
        "Set PLANTLINK_SHEETS_TOKEN (OAuth access token) before building/flashing."
    ),
};

const GATEWAY_CONFIG: GatewayConfig = GatewayConfig::DEFAULT;
const _: () = assert!(
    publish::cycle_sink_calls(GATEWAY_CONFIG.max_frames_per_cycle()) <= REQUEST_DEPTH,
    "request queue cannot hold one full cycle"
);

static CONNECTIVITY: ConnectivityHandle = ConnectivityHandle::new();
static CLOCK: ClockHandle = ClockHandle::new();
static REQUESTS: RequestChannel = RequestChannel::new();
static OUTCOMES: OutcomeChannel = OutcomeChannel::new();
static NET_RESOURCES: StaticCell<embassy_net::StackResources<4>> = StaticCell::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

async fn halt(what: &str) -> ! {
    info!("boot: {} failed; halting", what);
    loop {
        Timer::after_secs(1).await;
    }
}

async fn wait_before_wifi_retry(consecutive_failures: &mut u32) {
    *consecutive_failures = consecutive_failures.saturating_add(1);
    let delay_ms = WIFI_RETRY.delay_ms();
    info!(
        "wifi: retrying in {}ms (consecutive_failures={})",
        delay_ms, *consecutive_failures
    );
    Timer::after_millis(u64::from(delay_ms)).await;
}

async fn wifi_connection_loop(
    wifi_controller: &mut WifiController<'_>,
    stack: Stack<'_>,
    connectivity: &'static ConnectivityHandle,
) -> ! {
    let mut consecutive_failures = 0u32;

    loop {
        if !wifi_controller.is_started().unwrap_or(false) {
            if let Err(err) = wifi_controller.start_async().await {
                info!("wifi: start failed: {:?}", err);
                connectivity.mark_disconnected();
                wait_before_wifi_retry(&mut consecutive_failures).await;
                continue;
            }
        }

        if let Err(err) = wifi_controller.connect_async().await {
            info!("wifi: connect failed: {:?}", err);
            connectivity.mark_disconnected();
            let _ = wifi_controller.disconnect_async().await;
            wait_before_wifi_retry(&mut consecutive_failures).await;
            continue;
        }

        match stack
            .wait_config_up()
            .with_timeout(EmbassyDuration::from_secs(DHCP_TIMEOUT_SECS))
            .await
        {
            Ok(()) => {
                connectivity.update_link_ip(stack.is_link_up(), stack.config_v4().is_some());
                if let Some(config) = stack.config_v4() {
                    info!("wifi: connected ip={}", config.address);
                }
            }
            Err(_) => {
                info!("wifi: dhcp timeout; forcing reconnect");
                connectivity.update_link_ip(stack.is_link_up(), false);
                let _ = wifi_controller.disconnect_async().await;
                wait_before_wifi_retry(&mut consecutive_failures).await;
                continue;
            }
        }

        consecutive_failures = 0;

        loop {
            let link_up = stack.is_link_up();
            let has_ipv4 = stack.config_v4().is_some();
            let is_connected = matches!(wifi_controller.is_connected(), Ok(true));

            connectivity.update_link_ip(link_up, has_ipv4);

            if !(link_up && has_ipv4 && is_connected) {
                info!(
                    "wifi: state lost (link_up={} has_ipv4={} connected={}); reconnecting",
                    link_up, has_ipv4, is_connected
                );
                break;
            }

            Timer::after_millis(NETWORK_POLL_INTERVAL_MS).await;
        }

        connectivity.mark_disconnected();
        let _ = wifi_controller.disconnect_async().await;
        wait_before_wifi_retry(&mut consecutive_failures).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: plantlink starting");

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);
    let boot = Instant::now();

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Wiring: UART2 RX=GPIO22 TX=GPIO23, DHT11=GPIO15, LCD SDA=GPIO18 SCL=GPIO19,
    // strip DIN=GPIO5, busy LED=GPIO2
    let busy_led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let uart_config = UartConfig::default().with_baudrate(SENSOR_UART_BAUD);
    let sensor_uart = match Uart::new(peripherals.UART2, uart_config) {
        Ok(uart) => uart
            .with_rx(peripherals.GPIO22)
            .with_tx(peripherals.GPIO23),
        Err(err) => {
            info!("uart: config failed: {:?}", err);
            halt("sensor uart").await
        }
    };
    let lines = UartLines::new(
        sensor_uart,
        Some(HalDuration::from_millis(SENSOR_LINE_TIMEOUT_MS)),
    );

    let mut dht_pin = Flex::new(peripherals.GPIO15);
    dht_pin.apply_output_config(
        &OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    dht_pin.set_input_enable(true);
    dht_pin.set_output_enable(true);
    let ambient = match DhtAmbient::new(dht_pin, Delay::new()) {
        Ok(ambient) => ambient,
        Err(err) => {
            info!("dht11: pin setup failed: {:?}", err);
            halt("dht11").await
        }
    };

    let i2c_config = I2cConfig::default().with_frequency(Rate::from_khz(LCD_I2C_KHZ));
    let i2c = match I2c::new(peripherals.I2C0, i2c_config) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO18).with_scl(peripherals.GPIO19),
        Err(err) => {
            info!("i2c: config failed: {:?}", err);
            halt("lcd i2c").await
        }
    };
    let display = Lcd1602::new(i2c, lcd::DEFAULT_ADDRESS, Delay::new(), &LCD_INIT);

    let spi_config = SpiConfig::default()
        .with_frequency(Rate::from_hz(strip::SPI_HZ))
        .with_mode(SpiMode::_0);
    let spi = match Spi::new(peripherals.SPI2, spi_config) {
        Ok(spi) => spi.with_mosi(peripherals.GPIO5),
        Err(err) => {
            info!("spi: config failed: {:?}", err);
            halt("strip spi").await
        }
    };
    let mut led_strip = match SpiStrip::new(spi, STRIP_PIXELS, ColorOrder::Rgb, STRIP_BRIGHTNESS) {
        Ok(led_strip) => led_strip,
        Err(err) => {
            info!("strip: setup failed: {:?}", err);
            halt("strip").await
        }
    };
    led_strip.fill(Rgb::OFF);
    if let Err(err) = led_strip.show() {
        warn!("strip: initial clear failed: {:?}", err);
    }

    let publisher = Publisher::new(
        KvOutbox::new(&REQUESTS, &OUTCOMES, LogObserver),
        SheetOutbox::new(&REQUESTS),
        display,
        led_strip,
        LogObserver,
        GATEWAY_CONFIG,
    );
    let mut gateway = Gateway::new(
        lines,
        ambient,
        SystemClock::new(&CLOCK, boot),
        BusyLed::new(busy_led),
        publisher,
        &GATEWAY_CONFIG,
    );

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            info!("esp-radio init failed: {:?}", err);
            halt("radio").await
        }
    };

    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                info!("wifi peripheral init failed: {:?}", err);
                halt("wifi peripheral").await
            }
        };

    let client_config = ClientConfig::default()
        .with_ssid(WIFI_CONFIG.ssid.into())
        .with_password(WIFI_CONFIG.password.into());
    let wifi_mode = ModeConfig::Client(client_config);
    if let Err(err) = wifi_controller.set_config(&wifi_mode) {
        info!("wifi mode config failed: {:?}", err);
        halt("wifi mode").await
    }

    let mut rng = Rng::new();
    let net_seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let tls_seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());

    let stack_config = embassy_net::Config::dhcpv4(Default::default());
    let (stack, mut net_runner) = embassy_net::new(
        interfaces.sta,
        stack_config,
        NET_RESOURCES.init(embassy_net::StackResources::<4>::new()),
        net_seed,
    );

    info!(
        "gateway: root={} plant={} poll_interval_ms={}",
        GATEWAY_CONFIG.device_root(),
        GATEWAY_CONFIG.plant(),
        GATEWAY_CONFIG.poll_interval_ms()
    );
    info!("wifi: bootstrap configured from env ssid={}", WIFI_CONFIG.ssid);

    let net_future = net_runner.run();
    let wifi_future = wifi_connection_loop(&mut wifi_controller, stack, &CONNECTIVITY);
    let sntp_future = time_sync::sntp_loop(stack, &CONNECTIVITY, &CLOCK, boot);
    let uplink_future =
        uplink::uplink_loop(stack, &CONNECTIVITY, &REQUESTS, &OUTCOMES, CLOUD, tls_seed);
    let control_future = async {
        while !CONNECTIVITY.snapshot().online() {
            Timer::after_millis(NETWORK_POLL_INTERVAL_MS).await;
        }
        info!("gateway: network up, starting control loop");

        loop {
            if let TickResult::CycleRan { frames } = gateway.tick(boot.elapsed().as_millis()) {
                let stats = gateway.reader_stats();
                info!(
                    "gateway: cycle done frames={} total_frames={} abandoned={}",
                    frames, stats.frames, stats.abandoned_frames
                );
            }
            Timer::after_millis(CONTROL_TICK_MS).await;
        }
    };

    let _ = embassy_futures::join::join5(
        net_future,
        wifi_future,
        sntp_future,
        uplink_future,
        control_future,
    )
    .await;
    unreachable!()
}
