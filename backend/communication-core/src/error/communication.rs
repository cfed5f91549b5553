use models::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CommunicationError {
    /// The message could not be delivered. Only the local error chain is kept.
    #[error("Send Error: {message} {location}")]
    FailedToSend {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Endpoint Signed Off Error: {message} {location}")]
    EndpointSignedOff {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connection Rejected Error: {message} {location}")]
    ConnectionRejected {
        message: String,
        location: ErrorLocation,
    },
}
