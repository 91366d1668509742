//! Client error types for the editlock SDK

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced an HTTP response (connect, timeout, decode)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned error: status={status}, code={code}, message={message}")]
    Server {
        status: u16,
        code: i32,
        message: String,
    },

    /// The server answered 200 with a body that breaks the protocol
    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("controller already torn down")]
    TornDown,
}

impl ClientError {
    /// Worth retrying on the next tick: network trouble or a 5xx answer
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Server { status, .. } => *status >= 500,
            ClientError::Protocol(_) | ClientError::TornDown => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
