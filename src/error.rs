use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ChordError {
    #[error("lookup exceeded the routing step limit")]
    LookupStepsExceeded,

    #[error("failed to join ring: {0}")]
    JoinFailed(String),

    #[error("invalid file path: {0}")]
    InvalidPath(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
