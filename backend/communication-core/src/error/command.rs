use crate::error::communication::CommunicationError;

use models::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("Missing Parameter Error: {message} {location}")]
    MissingParameter {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Parameter Origin Error: {message} {location}")]
    InvalidParameterOrigin {
        message: String,
        location: ErrorLocation,
    },

    #[error("Argument Mismatch Error: {message} {location}")]
    ArgumentMismatch {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Command Method Error: {message} {location}")]
    UnknownMethod {
        message: String,
        location: ErrorLocation,
    },

    #[error("Command Method Not Mapped Error: {message} {location}")]
    CommandMethodNotMapped {
        message: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Command Error: {message} {location}")]
    DuplicateCommand {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not A Command Set Error: {message} {location}")]
    NotACommandSet {
        message: String,
        location: ErrorLocation,
    },

    /// The remote side reported a failure; `message` carries its diagnostic.
    #[error("Command Invocation Failed Error: {message} {location}")]
    InvocationFailed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unexpected Response Error: {message} {location}")]
    UnexpectedResponse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Serialization Error: {message} {location}")]
    Serialization {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Communication(#[from] CommunicationError),
}

impl From<serde_json::Error> for CommandError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        CommandError::Serialization {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
