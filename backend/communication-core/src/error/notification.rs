use crate::error::communication::CommunicationError;

use models::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum NotificationError {
    #[error("Not A Notification Set Error: {message} {location}")]
    NotANotificationSet {
        message: String,
        location: ErrorLocation,
    },

    #[error("Notification Not Supported Error: {message} {location}")]
    NotificationNotSupported {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Notification Error: {message} {location}")]
    UnknownNotification {
        message: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Notification Error: {message} {location}")]
    DuplicateNotification {
        message: String,
        location: ErrorLocation,
    },

    #[error("Argument Mismatch Error: {message} {location}")]
    ArgumentMismatch {
        message: String,
        location: ErrorLocation,
    },

    #[error("Registration Failed Error: {message} {location}")]
    RegistrationFailed {
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

impl From<serde_json::Error> for NotificationError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        NotificationError::Serialization {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
