use crate::actions::unexpected_payload;
use crate::config::ExchangeConfig;
use crate::endpoints::EndpointInformationStorage;
use crate::error::CoreError;
use crate::notifications::LocalNotificationCollection;
use crate::protocol::{MessageProcessAction, SendMessages};

use models::{CommunicationMessage, EndpointId, MessageId, MessageKind, Payload};

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

async fn respond(
    sender: &dyn SendMessages,
    endpoint: &EndpointId,
    original: MessageId,
    payload: Payload,
    max_retries: u32,
) -> Result<(), CoreError> {
    let response =
        CommunicationMessage::response_to(sender.local_endpoint().clone(), original, payload);
    sender.send_message(endpoint, response, max_retries).await?;
    Ok(())
}

/// Registers an approved endpoint as listener. Other senders are answered with `Failure`.
pub struct RegisterForNotificationProcessAction {
    endpoints: Arc<EndpointInformationStorage>,
    notifications: Arc<LocalNotificationCollection>,
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
}

impl RegisterForNotificationProcessAction {
    pub fn new(
        endpoints: Arc<EndpointInformationStorage>,
        notifications: Arc<LocalNotificationCollection>,
        sender: Arc<dyn SendMessages>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            endpoints,
            notifications,
            sender,
            config,
        }
    }
}

#[async_trait]
impl MessageProcessAction for RegisterForNotificationProcessAction {
    fn message_type_to_process(&self) -> MessageKind {
        MessageKind::RegisterForNotification
    }

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError> {
        let Payload::RegisterForNotification { notification } = &message.payload else {
            return Err(unexpected_payload(
                MessageKind::RegisterForNotification,
                &message.payload,
            ));
        };

        if !self.endpoints.can_communicate_with_endpoint(&message.sender) {
            warn!(
                "{} asked for {notification} without being connected",
                message.sender
            );
            return respond(
                self.sender.as_ref(),
                &message.sender,
                message.id,
                Payload::Failure {
                    error: format!("{} is not connected", message.sender),
                },
                self.config.max_retries,
            )
            .await;
        }

        let payload = match self
            .notifications
            .register_for_notification(&message.sender, notification)
        {
            Ok(()) => Payload::Success,
            Err(e) => {
                warn!("Registration of {} failed: {e}", message.sender);
                Payload::Failure {
                    error: e.to_string(),
                }
            }
        };

        respond(
            self.sender.as_ref(),
            &message.sender,
            message.id,
            payload,
            self.config.max_retries,
        )
        .await
    }
}

pub struct UnregisterFromNotificationProcessAction {
    notifications: Arc<LocalNotificationCollection>,
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
}

impl UnregisterFromNotificationProcessAction {
    pub fn new(
        notifications: Arc<LocalNotificationCollection>,
        sender: Arc<dyn SendMessages>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            notifications,
            sender,
            config,
        }
    }
}

#[async_trait]
impl MessageProcessAction for UnregisterFromNotificationProcessAction {
    fn message_type_to_process(&self) -> MessageKind {
        MessageKind::UnregisterFromNotification
    }

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError> {
        let Payload::UnregisterFromNotification { notification } = &message.payload else {
            return Err(unexpected_payload(
                MessageKind::UnregisterFromNotification,
                &message.payload,
            ));
        };

        if !self
            .notifications
            .unregister_from_notification(&message.sender, notification)
        {
            debug!("{} was not registered for {notification}", message.sender);
        }

        respond(
            self.sender.as_ref(),
            &message.sender,
            message.id,
            Payload::Success,
            self.config.max_retries,
        )
        .await
    }
}
