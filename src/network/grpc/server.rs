use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};

use crate::chord::id::Id;
use crate::chord::node::Node;
use crate::error::ChordError;
use crate::network::grpc::client::LOOKUP_STEPS_HEADER;
use crate::network::messages::chord::chord_server::Chord;
use crate::network::messages::chord::{
    DeleteRequest, DeleteResponse, FindSuccessorRequest, FindSuccessorResponse, GetAllRequest,
    GetAllResponse, GetPredecessorRequest, GetPredecessorResponse, GetRequest, GetResponse,
    NotifyRequest, NotifyResponse, PingRequest, PingResponse, PutRequest, PutResponse,
};

/// gRPC face of the node: thin handlers over the shared ring state.
pub struct ChordGrpcServer {
    node: Arc<Node>,
}

impl ChordGrpcServer {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[tonic::async_trait]
impl Chord for ChordGrpcServer {
    async fn ping(&self, _: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        Ok(Response::new(PingResponse {}))
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        self.node.put(req.key, req.value);
        Ok(Response::new(PutResponse {}))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let value = self.node.get(&request.into_inner().key).unwrap_or_default();
        Ok(Response::new(GetResponse { value }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        self.node.delete(&request.into_inner().key);
        Ok(Response::new(DeleteResponse {}))
    }

    async fn get_all(
        &self,
        _: Request<GetAllRequest>,
    ) -> Result<Response<GetAllResponse>, Status> {
        Ok(Response::new(GetAllResponse {
            key_values: self.node.bucket_snapshot(),
        }))
    }

    async fn get_predecessor(
        &self,
        _: Request<GetPredecessorRequest>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        Ok(Response::new(self.node.predecessor_view().into()))
    }

    async fn notify(
        &self,
        request: Request<NotifyRequest>,
    ) -> Result<Response<NotifyResponse>, Status> {
        self.node.apply_notify(&request.into_inner().address);
        Ok(Response::new(NotifyResponse {}))
    }

    async fn find_successor(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<FindSuccessorResponse>, Status> {
        let steps = lookup_steps(request.metadata());
        let id_bytes = &request.get_ref().id;
        if id_bytes.len() > 20 {
            return Err(Status::invalid_argument("identifier longer than 20 bytes"));
        }
        let id = Id::from_be_slice(id_bytes);
        match self.node.find_successor(id, steps).await {
            Ok(address) => Ok(Response::new(FindSuccessorResponse { address })),
            Err(err @ ChordError::LookupStepsExceeded) => {
                Err(Status::resource_exhausted(err.to_string()))
            }
            Err(err) => Err(Status::unavailable(err.to_string())),
        }
    }
}

fn lookup_steps(metadata: &MetadataMap) -> u32 {
    metadata
        .get(LOOKUP_STEPS_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_steps_defaults_to_zero() {
        assert_eq!(lookup_steps(&MetadataMap::new()), 0);
    }

    #[test]
    fn lookup_steps_reads_the_header() {
        let mut metadata = MetadataMap::new();
        metadata.insert(LOOKUP_STEPS_HEADER, "7".parse().unwrap());
        assert_eq!(lookup_steps(&metadata), 7);
    }

    #[test]
    fn lookup_steps_tolerates_garbage() {
        let mut metadata = MetadataMap::new();
        metadata.insert(LOOKUP_STEPS_HEADER, "not-a-number".parse().unwrap());
        assert_eq!(lookup_steps(&metadata), 0);
    }
}
