//! Messages exchanged between endpoints.
//!
//! The transport decodes bytes into a [`CommunicationMessage`] and the protocol core routes
//! it purely by the [`MessageKind`] of its payload.

use crate::{
    ChannelConnectionInformation, CommandId, CommunicationDescription, EndpointId,
    InteractionConnectionState, InteractionSubjects, MessageId, NotificationId,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationMessage {
    pub id: MessageId,
    pub sender: EndpointId,
    pub in_response_to: Option<MessageId>,
    pub payload: Payload,
}

impl CommunicationMessage {
    pub fn new(sender: EndpointId, payload: Payload) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            in_response_to: None,
            payload,
        }
    }

    pub fn response_to(sender: EndpointId, original: MessageId, payload: Payload) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            in_response_to: Some(original),
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    EndpointConnect {
        connection: ChannelConnectionInformation,
        description: CommunicationDescription,
    },
    EndpointDisconnect,
    CommandInvoked(CommandInvocationData),
    CommandInvokedResponse {
        result: Value,
    },
    Success,
    Failure {
        error: String,
    },
    EndpointInteractionInformation(InteractionSubjects),
    EndpointInteractionInformationResponse {
        state: InteractionConnectionState,
    },
    RegisterForNotification {
        notification: NotificationId,
    },
    UnregisterFromNotification {
        notification: NotificationId,
    },
    NotificationRaised(NotificationRaisedData),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::EndpointConnect { .. } => MessageKind::EndpointConnect,
            Payload::EndpointDisconnect => MessageKind::EndpointDisconnect,
            Payload::CommandInvoked(_) => MessageKind::CommandInvoked,
            Payload::CommandInvokedResponse { .. } => MessageKind::CommandInvokedResponse,
            Payload::Success => MessageKind::Success,
            Payload::Failure { .. } => MessageKind::Failure,
            Payload::EndpointInteractionInformation(_) => {
                MessageKind::EndpointInteractionInformation
            }
            Payload::EndpointInteractionInformationResponse { .. } => {
                MessageKind::EndpointInteractionInformationResponse
            }
            Payload::RegisterForNotification { .. } => MessageKind::RegisterForNotification,
            Payload::UnregisterFromNotification { .. } => MessageKind::UnregisterFromNotification,
            Payload::NotificationRaised(_) => MessageKind::NotificationRaised,
        }
    }
}

/// Payload discriminant, used as the key of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    EndpointConnect,
    EndpointDisconnect,
    CommandInvoked,
    CommandInvokedResponse,
    Success,
    Failure,
    EndpointInteractionInformation,
    EndpointInteractionInformationResponse,
    RegisterForNotification,
    UnregisterFromNotification,
    NotificationRaised,
}

impl MessageKind {
    /// Kinds that only ever travel as the answer to an earlier message.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            MessageKind::CommandInvokedResponse
                | MessageKind::Success
                | MessageKind::Failure
                | MessageKind::EndpointInteractionInformationResponse
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInvocationData {
    pub command: CommandId,
    pub parameters: Vec<CommandParameterValue>,
}

/// One caller-supplied argument, matched to the command's parameters by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandParameterValue {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRaisedData {
    pub notification: NotificationId,
    pub arguments: Value,
}
