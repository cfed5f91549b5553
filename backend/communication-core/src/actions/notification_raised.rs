use crate::actions::unexpected_payload;
use crate::error::CoreError;
use crate::notifications::RemoteNotificationHub;
use crate::protocol::MessageProcessAction;

use models::{CommunicationMessage, MessageKind, Payload};

use std::sync::Arc;

use async_trait::async_trait;
use log::trace;

pub struct NotificationRaisedProcessAction {
    hub: Arc<RemoteNotificationHub>,
}

impl NotificationRaisedProcessAction {
    pub fn new(hub: Arc<RemoteNotificationHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl MessageProcessAction for NotificationRaisedProcessAction {
    fn message_type_to_process(&self) -> MessageKind {
        MessageKind::NotificationRaised
    }

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError> {
        let Payload::NotificationRaised(data) = &message.payload else {
            return Err(unexpected_payload(
                MessageKind::NotificationRaised,
                &message.payload,
            ));
        };

        let delivered = self.hub.forward(&message.sender, data);
        trace!(
            "{} from {} delivered to {delivered} listeners",
            data.notification, message.sender
        );
        Ok(())
    }
}
