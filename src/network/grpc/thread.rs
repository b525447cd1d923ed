use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use tonic::transport::{Server, ServerTlsConfig};

use crate::chord::node::Node;
use crate::error::NetworkError;
use crate::network::grpc::server::ChordGrpcServer;
use crate::network::messages::chord::chord_server::ChordServer;

/// Bind the RPC listener with the node's TLS identity and serve until the
/// process exits.
pub async fn serve(node: Arc<Node>, bind: SocketAddr, tls: ServerTlsConfig) -> Result<(), NetworkError> {
    info!("starting Chord node server on {}", node.address());
    Server::builder()
        .tls_config(tls)?
        .add_service(ChordServer::new(ChordGrpcServer::new(node)))
        .serve(bind)
        .await?;
    Ok(())
}
