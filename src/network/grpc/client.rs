use std::collections::HashMap;
use std::time::Duration;

use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::Request;

use crate::chord::id::Id;
use crate::chord::node::PredecessorView;
use crate::chord::RPC_TIMEOUT;
use crate::error::NetworkError;
use crate::network::grpc::client_tls_config;
use crate::network::messages::chord::chord_client::ChordClient;
use crate::network::messages::chord::{
    DeleteRequest, FindSuccessorRequest, GetAllRequest, GetPredecessorRequest, GetRequest,
    NotifyRequest, PingRequest, PutRequest,
};

/// Metadata key carrying the number of delegations a FindSuccessor chain
/// has already taken.
pub const LOOKUP_STEPS_HEADER: &str = "chord-lookup-steps";

/// One outbound call: a fresh TLS channel, torn down when the client is
/// dropped.
pub struct ChordGrpcClient {
    client: ChordClient<Channel>,
}

impl ChordGrpcClient {
    pub async fn connect(address: &str) -> Result<Self, NetworkError> {
        Self::connect_with_timeout(address, RPC_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        address: &str,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let channel = Channel::from_shared(format!("https://{address}"))
            .map_err(|_| NetworkError::InvalidAddress(address.to_string()))?
            .tls_config(client_tls_config()?.clone())?
            .connect_timeout(timeout)
            .timeout(timeout)
            .connect()
            .await?;
        Ok(Self {
            client: ChordClient::new(channel),
        })
    }

    pub async fn ping(&mut self) -> Result<(), NetworkError> {
        self.client.ping(PingRequest {}).await?;
        Ok(())
    }

    pub async fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), NetworkError> {
        self.client
            .put(PutRequest {
                key: key.to_string(),
                value,
            })
            .await?;
        Ok(())
    }

    /// An empty value on the wire means a miss.
    pub async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, NetworkError> {
        let response = self
            .client
            .get(GetRequest {
                key: key.to_string(),
            })
            .await?
            .into_inner();
        if response.value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(response.value))
        }
    }

    pub async fn delete(&mut self, key: &str) -> Result<(), NetworkError> {
        self.client
            .delete(DeleteRequest {
                key: key.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn get_all(&mut self) -> Result<HashMap<String, Vec<u8>>, NetworkError> {
        Ok(self
            .client
            .get_all(GetAllRequest {})
            .await?
            .into_inner()
            .key_values)
    }

    pub async fn get_predecessor(&mut self) -> Result<PredecessorView, NetworkError> {
        Ok(self
            .client
            .get_predecessor(GetPredecessorRequest {})
            .await?
            .into_inner()
            .into())
    }

    pub async fn notify(&mut self, address: &str) -> Result<(), NetworkError> {
        self.client
            .notify(NotifyRequest {
                address: address.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn find_successor(&mut self, id: Id, steps: u32) -> Result<String, NetworkError> {
        let mut request = Request::new(FindSuccessorRequest {
            id: id.to_be_bytes(),
        });
        let steps: MetadataValue<_> = steps
            .to_string()
            .parse()
            .expect("decimal digits are valid metadata");
        request.metadata_mut().insert(LOOKUP_STEPS_HEADER, steps);
        Ok(self
            .client
            .find_successor(request)
            .await?
            .into_inner()
            .address)
    }
}
