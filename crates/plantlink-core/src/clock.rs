//! Wall-clock time: the trait the control loop reads, the anchor math that
//! turns one SNTP answer into a running clock, and the SNTP packet codec.

/// Seconds between the NTP era (1900) and the Unix epoch.
pub const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;
/// Size of an SNTP request/reply without extensions.
pub const SNTP_PACKET_BYTES: usize = 48;
pub const NTP_PORT: u16 = 123;

const SNTP_MODE_CLIENT: u8 = 3;
const SNTP_MODE_SERVER: u8 = 4;
const SNTP_VERSION: u8 = 4;
const SNTP_LEAP_UNSYNCHRONIZED: u8 = 3;
const TRANSMIT_SECS_OFFSET: usize = 40;

/// Network-synchronized clock.
pub trait WallClock {
    /// Unix seconds, or `None` until the first successful sync.
    fn epoch_secs(&mut self) -> Option<u64>;
}

/// Unix time captured at a known uptime.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EpochAnchor {
    epoch_secs: u64,
    uptime_ms: u64,
}

impl EpochAnchor {
    pub const fn new(epoch_secs: u64, uptime_ms: u64) -> Self {
        Self {
            epoch_secs,
            uptime_ms,
        }
    }

    /// Unix seconds at `uptime_ms`; never earlier than the anchor itself.
    pub const fn epoch_at(&self, uptime_ms: u64) -> u64 {
        self.epoch_secs + uptime_ms.saturating_sub(self.uptime_ms) / 1_000
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SntpError {
    Truncated,
    NotServerReply,
    /// Kiss-o'-death or alarm leap indicator.
    Unsynchronized,
    BeforeUnixEpoch,
}

/// Client request: LI 0, version 4, mode 3, everything else zero.
pub const fn sntp_request() -> [u8; SNTP_PACKET_BYTES] {
    let mut packet = [0u8; SNTP_PACKET_BYTES];
    packet[0] = (SNTP_VERSION << 3) | SNTP_MODE_CLIENT;
    packet
}

/// Extracts the server transmit time as Unix seconds.
pub fn sntp_transmit_epoch(packet: &[u8]) -> Result<u64, SntpError> {
    if packet.len() < SNTP_PACKET_BYTES {
        return Err(SntpError::Truncated);
    }

    let leap = packet[0] >> 6;
    let mode = packet[0] & 0x07;
    let stratum = packet[1];

    if mode != SNTP_MODE_SERVER {
        return Err(SntpError::NotServerReply);
    }
    if stratum == 0 || leap == SNTP_LEAP_UNSYNCHRONIZED {
        return Err(SntpError::Unsynchronized);
    }

    let mut secs = [0u8; 4];
    secs.copy_from_slice(&packet[TRANSMIT_SECS_OFFSET..TRANSMIT_SECS_OFFSET + 4]);
    let ntp_secs = u64::from(u32::from_be_bytes(secs));

    ntp_secs
        .checked_sub(NTP_UNIX_OFFSET_SECS)
        .ok_or(SntpError::BeforeUnixEpoch)
}
