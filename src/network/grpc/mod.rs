pub mod client;
pub mod server;
pub mod thread;

pub use client::ChordGrpcClient;

use std::fs;
use std::sync::OnceLock;

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

use crate::error::NetworkError;

pub const SERVER_CERT_PATH: &str = "certs/server-cert.pem";
pub const SERVER_KEY_PATH: &str = "certs/server-key.pem";
pub const CA_CERT_PATH: &str = "certs/ca-cert.pem";

/// Server identity from the fixed certificate paths.
pub fn server_tls_config() -> Result<ServerTlsConfig, NetworkError> {
    let cert = fs::read(SERVER_CERT_PATH)?;
    let key = fs::read(SERVER_KEY_PATH)?;
    Ok(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
}

/// CA bundle outbound channels verify peers against. Loaded once; every
/// call still opens its own connection.
pub(crate) fn client_tls_config() -> Result<&'static ClientTlsConfig, NetworkError> {
    static CONFIG: OnceLock<ClientTlsConfig> = OnceLock::new();
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let ca = fs::read(CA_CERT_PATH)?;
    let config = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca));
    Ok(CONFIG.get_or_init(|| config))
}
