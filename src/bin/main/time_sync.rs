use embassy_net::{
    Stack,
    dns::{DnsQueryType, Error as DnsError},
    udp::{BindError, PacketMetadata, RecvError, SendError, UdpSocket},
};
use embassy_time::{Duration as EmbassyDuration, Timer, WithTimeout};
use esp_hal::time::Instant;
use log::{info, warn};
use plantlink_core::clock::{self, NTP_PORT, SNTP_PACKET_BYTES, SntpError};
use plantlink_hal_esp32::network::{ConnectivityHandle, clock::ClockHandle};

const NTP_HOST: &str = "pool.ntp.org";
const LOCAL_PORT: u16 = 50_123;
const RESYNC_INTERVAL_SECS: u64 = 3_600;
const RETRY_INTERVAL_SECS: u64 = 10;
const OFFLINE_POLL_SECS: u64 = 1;
const REPLY_TIMEOUT_MS: u64 = 3_000;

#[derive(Debug)]
enum SyncError {
    Dns(DnsError),
    NoAddress,
    Bind(BindError),
    Send(SendError),
    Recv(RecvError),
    Timeout,
    Reply(SntpError),
}

/// Keeps [`ClockHandle`] anchored to SNTP time while the network is up.
pub async fn sntp_loop(
    stack: Stack<'_>,
    connectivity: &'static ConnectivityHandle,
    clock: &'static ClockHandle,
    boot: Instant,
) -> ! {
    loop {
        if !connectivity.snapshot().online() {
            Timer::after_secs(OFFLINE_POLL_SECS).await;
            continue;
        }

        let wait_secs = match sync_once(stack).await {
            Ok(epoch_secs) => {
                clock.anchor(epoch_secs, boot.elapsed().as_millis());
                info!("sntp: synced epoch={}", epoch_secs);
                RESYNC_INTERVAL_SECS
            }
            Err(err) => {
                warn!("sntp: sync failed: {:?}", err);
                RETRY_INTERVAL_SECS
            }
        };
        Timer::after_secs(wait_secs).await;
    }
}

async fn sync_once(stack: Stack<'_>) -> Result<u64, SyncError> {
    let addresses = stack
        .dns_query(NTP_HOST, DnsQueryType::A)
        .await
        .map_err(SyncError::Dns)?;
    let server = *addresses.first().ok_or(SyncError::NoAddress)?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0u8; SNTP_PACKET_BYTES * 2];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0u8; SNTP_PACKET_BYTES * 2];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(LOCAL_PORT).map_err(SyncError::Bind)?;

    socket
        .send_to(&clock::sntp_request(), (server, NTP_PORT))
        .await
        .map_err(SyncError::Send)?;

    let mut reply = [0u8; SNTP_PACKET_BYTES];
    let (len, _) = socket
        .recv_from(&mut reply)
        .with_timeout(EmbassyDuration::from_millis(REPLY_TIMEOUT_MS))
        .await
        .map_err(|_| SyncError::Timeout)?
        .map_err(SyncError::Recv)?;

    clock::sntp_transmit_epoch(&reply[..len]).map_err(SyncError::Reply)
}
