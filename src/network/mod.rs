pub mod grpc;
pub mod messages;

use std::net::UdpSocket;

use log::warn;

use crate::chord::DEFAULT_PORT;
use crate::error::NetworkError;

/// Expand the shorthand endpoint forms: ":port" gets the local address,
/// a bare host gets the default port.
pub fn resolve_address(address: &str, local: &str) -> String {
    if let Some(port) = address.strip_prefix(':') {
        format!("{local}:{port}")
    } else if !address.contains(':') {
        format!("{address}:{DEFAULT_PORT}")
    } else {
        address.to_string()
    }
}

/// Local IP on the default route, found by "connecting" a UDP socket to a
/// public address. No packet is sent.
pub fn local_address() -> Result<String, NetworkError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip().to_string())
}

/// Best-effort public address discovery through an HTTPS echo service.
pub async fn public_ipv4() -> Option<String> {
    let response = match reqwest::get("https://api.ipify.org").await {
        Ok(response) => response,
        Err(err) => {
            warn!("could not get public IP: {err}");
            return None;
        }
    };
    match response.text().await {
        Ok(text) => Some(text.trim().to_string()),
        Err(err) => {
            warn!("could not read public IP response: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_address_expands_bare_port() {
        assert_eq!(resolve_address(":3410", "10.0.0.5"), "10.0.0.5:3410");
    }

    #[test]
    fn resolve_address_adds_default_port() {
        assert_eq!(resolve_address("example.org", "10.0.0.5"), "example.org:3410");
    }

    #[test]
    fn resolve_address_keeps_full_endpoints() {
        assert_eq!(
            resolve_address("example.org:4000", "10.0.0.5"),
            "example.org:4000"
        );
    }
}
