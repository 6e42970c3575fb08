//! Local address resolution and access URLs.

use std::net::{IpAddr, Ipv4Addr};

use tokio::net::UdpSocket;
use tracing::debug;

/// Non-routable address used only to select the outbound interface.
const PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 255, 255, 255), 1);

/// The IPv4 address this host uses for outbound traffic.
///
/// A UDP socket is connected (nothing is sent) and its local address read
/// back. Falls back to `127.0.0.1` on any failure.
pub async fn local_ipv4() -> Ipv4Addr {
    usable_ipv4(probe_local_addr().await)
}

fn usable_ipv4(probed: std::io::Result<IpAddr>) -> Ipv4Addr {
    match probed {
        Ok(IpAddr::V4(ip)) if !ip.is_unspecified() => ip,
        Ok(other) => {
            debug!("unusable local address {other}; using loopback");
            Ipv4Addr::LOCALHOST
        }
        Err(e) => {
            debug!("local address probe failed: {e}; using loopback");
            Ipv4Addr::LOCALHOST
        }
    }
}

async fn probe_local_addr() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(PROBE_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}

/// `http://<ip>:<port>/<page>`.
pub fn access_url(ip: Ipv4Addr, port: u16, page: &str) -> String {
    format!("http://{ip}:{port}/{}", page.trim_start_matches('/'))
}
