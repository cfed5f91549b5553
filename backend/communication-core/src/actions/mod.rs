//! One [`MessageProcessAction`](crate::protocol::MessageProcessAction) per incoming
//! request kind.

pub mod command_invoked;
pub mod endpoint_connection;
pub mod interaction_information;
pub mod notification_raised;
pub mod notification_registration;

pub use command_invoked::CommandInvokedProcessAction;
pub use endpoint_connection::{EndpointConnectProcessAction, EndpointDisconnectProcessAction};
pub use interaction_information::EndpointInteractionInformationProcessAction;
pub use notification_raised::NotificationRaisedProcessAction;
pub use notification_registration::{
    RegisterForNotificationProcessAction, UnregisterFromNotificationProcessAction,
};

use crate::error::{CommunicationError, CoreError};

use models::{ErrorLocation, MessageKind, Payload};

use std::panic::Location;

#[track_caller]
pub(crate) fn unexpected_payload(expected: MessageKind, payload: &Payload) -> CoreError {
    CoreError::Communication(CommunicationError::Transport {
        message: format!("Expected a {expected:?} message, got {:?}", payload.kind()),
        location: ErrorLocation::from(Location::caller()),
    })
}
