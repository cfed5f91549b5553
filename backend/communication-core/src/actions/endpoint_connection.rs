use crate::actions::unexpected_payload;
use crate::error::CoreError;
use crate::protocol::{EndpointConnectionConductor, MessageProcessAction};

use models::{CommunicationMessage, MessageKind, Payload};

use std::sync::Arc;

use async_trait::async_trait;

pub struct EndpointConnectProcessAction {
    conductor: Arc<EndpointConnectionConductor>,
}

impl EndpointConnectProcessAction {
    pub fn new(conductor: Arc<EndpointConnectionConductor>) -> Self {
        Self { conductor }
    }
}

#[async_trait]
impl MessageProcessAction for EndpointConnectProcessAction {
    fn message_type_to_process(&self) -> MessageKind {
        MessageKind::EndpointConnect
    }

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError> {
        match message.payload {
            Payload::EndpointConnect {
                connection,
                description,
            } => {
                self.conductor
                    .on_receipt_of_connect(message.id, &message.sender, connection, description)
                    .await;
                Ok(())
            }
            other => Err(unexpected_payload(MessageKind::EndpointConnect, &other)),
        }
    }
}

pub struct EndpointDisconnectProcessAction {
    conductor: Arc<EndpointConnectionConductor>,
}

impl EndpointDisconnectProcessAction {
    pub fn new(conductor: Arc<EndpointConnectionConductor>) -> Self {
        Self { conductor }
    }
}

#[async_trait]
impl MessageProcessAction for EndpointDisconnectProcessAction {
    fn message_type_to_process(&self) -> MessageKind {
        MessageKind::EndpointDisconnect
    }

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError> {
        match message.payload {
            Payload::EndpointDisconnect => {
                self.conductor.on_receipt_of_disconnect(&message.sender);
                Ok(())
            }
            other => Err(unexpected_payload(MessageKind::EndpointDisconnect, &other)),
        }
    }
}
