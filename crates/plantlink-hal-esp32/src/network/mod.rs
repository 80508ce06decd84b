//! Link state shared between the Wi-Fi worker, the uploader and the
//! control loop.

pub mod clock;

use core::sync::atomic::{AtomicBool, Ordering};

use plantlink_core::retry::RetryPolicy;

/// Fixed delay between Wi-Fi connection attempts.
pub const WIFI_RETRY: RetryPolicy = RetryPolicy::forever(300);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WifiConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl WifiConfig {
    pub const fn new(ssid: &'static str, password: &'static str) -> Self {
        Self { ssid, password }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectivitySnapshot {
    pub link_up: bool,
    pub has_ipv4: bool,
}

impl ConnectivitySnapshot {
    /// Link up with a DHCP lease.
    pub const fn online(self) -> bool {
        self.link_up && self.has_ipv4
    }
}

/// Lock-free shared connectivity status.
#[derive(Debug)]
pub struct ConnectivityHandle {
    link_up: AtomicBool,
    has_ipv4: AtomicBool,
}

impl ConnectivityHandle {
    pub const fn new() -> Self {
        Self {
            link_up: AtomicBool::new(false),
            has_ipv4: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        ConnectivitySnapshot {
            link_up: self.link_up.load(Ordering::Acquire),
            has_ipv4: self.has_ipv4.load(Ordering::Acquire),
        }
    }

    pub fn mark_disconnected(&self) {
        self.update_link_ip(false, false);
    }

    pub fn update_link_ip(&self, link_up: bool, has_ipv4: bool) {
        self.link_up.store(link_up, Ordering::Release);
        self.has_ipv4.store(has_ipv4, Ordering::Release);
    }
}

impl Default for ConnectivityHandle {
    fn default() -> Self {
        Self::new()
    }
}
