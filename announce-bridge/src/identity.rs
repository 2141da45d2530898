//! Server identity: the address the display uses to fetch artifacts.
//!
//! Detected once at startup and never refreshed.

use announce_common::config::Config;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Unroutable probe target. Connecting a UDP socket sends nothing; it only
/// makes the kernel pick the outbound interface.
pub const PROBE_ADDR: &str = "10.255.255.255:1";

/// Host and port baked into every published artifact URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    host: String,
    port: u16,
}

impl ServerIdentity {
    /// Use a known host.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `ADVERTISE_HOST` if configured, otherwise the detected LAN address.
    pub async fn from_config(config: &Config) -> Self {
        match &config.advertise_host {
            Some(host) => Self::new(host.clone(), config.http_port),
            None => Self::new(detect_local_ip().await.to_string(), config.http_port),
        }
    }

    /// Advertised host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Artifact server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://host:port`, with IPv6 hosts bracketed.
    pub fn base_url(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    /// URL of one artifact.
    pub fn artifact_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url(), file_name)
    }
}

/// Local address of the default outbound interface, or loopback.
pub async fn detect_local_ip() -> IpAddr {
    match probe_local_ip().await {
        Ok(ip) => {
            debug!(%ip, "Detected local address");
            ip
        }
        Err(e) => {
            warn!(error = %e, "Could not detect local address, using 127.0.0.1");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn probe_local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(PROBE_ADDR).await?;
    let ip = socket.local_addr()?.ip();
    if ip.is_unspecified() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "no outbound interface",
        ));
    }
    Ok(ip)
}
