// Hub discovery on the local network
//
// Broadcasts a single `D` datagram on UDP 30303 and collects the
// colon-delimited `product:mac:code:firmware` replies until the timeout
// elapses. Unsupported products and too-old TellStick Net firmware are
// skipped.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::Error;

pub const DISCOVERY_PORT: u16 = 30303;
pub const DISCOVERY_PAYLOAD: &[u8] = b"D";
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub const SUPPORTED_PRODUCTS: &[&str] = &[
    "TellStickNet",
    "TellstickZnetLite",
    "TellstickZnet",
    "TellstickNetV2",
];

/// Products exposing the local HTTP API.
pub const LOCAL_API_PRODUCTS: &[&str] = &["TellstickZnet", "TellstickNetV2"];

pub const MIN_TELLSTICKNET_FIRMWARE: u32 = 17;

/// A hub that answered the discovery broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHub {
    pub address: IpAddr,
    pub product: String,
    pub mac: String,
    pub code: String,
    pub firmware: String,
}

impl DiscoveredHub {
    /// Parse one discovery reply. `None` for malformed datagrams.
    pub fn parse(address: IpAddr, reply: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(reply).ok()?;
        let mut parts = text.trim().split(':');
        let (Some(product), Some(mac), Some(code), Some(firmware), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return None;
        };
        Some(Self {
            address,
            product: product.to_owned(),
            mac: mac.to_owned(),
            code: code.to_owned(),
            firmware: firmware.to_owned(),
        })
    }

    /// Whether this product/firmware combination can be used.
    pub fn is_supported(&self) -> bool {
        if !SUPPORTED_PRODUCTS
            .iter()
            .any(|supported| supported.contains(self.product.as_str()))
        {
            return false;
        }
        if self.product == "TellStickNet" {
            return self
                .firmware
                .parse::<u32>()
                .is_ok_and(|v| v >= MIN_TELLSTICKNET_FIRMWARE);
        }
        true
    }

    pub fn supports_local_api(&self) -> bool {
        supports_local_api(&self.product)
    }
}

/// Return true if the product string names a hub with a local HTTP API.
pub fn supports_local_api(product: &str) -> bool {
    LOCAL_API_PRODUCTS.iter().any(|p| product.contains(p))
}

/// Scan the local network for hubs.
pub async fn discover(timeout: Duration) -> Result<Vec<DiscoveredHub>, Error> {
    info!("discovering tellstick devices");
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    socket
        .send_to(DISCOVERY_PAYLOAD, (Ipv4Addr::BROADCAST, DISCOVERY_PORT))
        .await?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 1024];
    let mut hubs = Vec::new();

    while let Ok(received) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
        let (len, from) = received?;
        let Some(hub) = buf
            .get(..len)
            .and_then(|reply| DiscoveredHub::parse(from.ip(), reply))
        else {
            info!(%from, "malformed reply");
            continue;
        };

        info!(
            product = %hub.product,
            firmware = %hub.firmware,
            address = %hub.address,
            "found device"
        );
        if hub.is_supported() {
            hubs.push(hub);
        } else {
            debug!(product = %hub.product, firmware = %hub.firmware, "unsupported product or firmware");
        }
    }

    Ok(hubs)
}
