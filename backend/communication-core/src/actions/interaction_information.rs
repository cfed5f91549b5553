use crate::actions::unexpected_payload;
use crate::error::CoreError;
use crate::interaction::InteractionHandshakeConductor;
use crate::protocol::MessageProcessAction;

use models::{CommunicationMessage, MessageKind, Payload};

use std::sync::Arc;

use async_trait::async_trait;

pub struct EndpointInteractionInformationProcessAction {
    conductor: Arc<InteractionHandshakeConductor>,
}

impl EndpointInteractionInformationProcessAction {
    pub fn new(conductor: Arc<InteractionHandshakeConductor>) -> Self {
        Self { conductor }
    }
}

#[async_trait]
impl MessageProcessAction for EndpointInteractionInformationProcessAction {
    fn message_type_to_process(&self) -> MessageKind {
        MessageKind::EndpointInteractionInformation
    }

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError> {
        match message.payload {
            Payload::EndpointInteractionInformation(subjects) => {
                self.conductor
                    .continue_handshake_with(&message.sender, subjects, message.id)
                    .await;
                Ok(())
            }
            other => Err(unexpected_payload(
                MessageKind::EndpointInteractionInformation,
                &other,
            )),
        }
    }
}
