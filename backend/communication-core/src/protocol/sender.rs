use crate::error::CommunicationError;
use crate::protocol::handler::MessageHandler;
use crate::protocol::transport::{MessageTransport, SendMessages};

use models::{CommunicationMessage, EndpointId, ErrorLocation};

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, warn};
use tokio::time::sleep as TokioSleep;
use tokio::time::timeout as TokioTimeout;

const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(50);
const RETRY_MAX_INTERVAL: Duration = Duration::from_secs(2);

/// Sends messages through a [`MessageTransport`], retrying with exponential backoff.
///
/// Response waiters are registered with the shared [`MessageHandler`] before the first
/// delivery attempt.
pub struct MessageSender {
    local: EndpointId,
    transport: Arc<dyn MessageTransport>,
    handler: Arc<MessageHandler>,
}

impl MessageSender {
    pub fn new(
        local: EndpointId,
        transport: Arc<dyn MessageTransport>,
        handler: Arc<MessageHandler>,
    ) -> Self {
        Self {
            local,
            transport,
            handler,
        }
    }

    /// The returned error carries the location this was called from.
    #[track_caller]
    fn deliver<'a>(
        &'a self,
        endpoint: &'a EndpointId,
        message: &'a CommunicationMessage,
        max_retries: u32,
    ) -> impl Future<Output = Result<(), CommunicationError>> + Send + 'a {
        let location = ErrorLocation::from(Location::caller());
        async move {
            let mut backoff = ExponentialBackoff {
                initial_interval: RETRY_INITIAL_INTERVAL,
                max_interval: RETRY_MAX_INTERVAL,
                max_elapsed_time: None,
                ..Default::default()
            };

            let mut attempt = 0;
            loop {
                match self.transport.send(endpoint, message).await {
                    Ok(()) => {
                        debug!("Sent {:?} message {} to {endpoint}", message.kind(), message.id);
                        return Ok(());
                    }
                    Err(e) if attempt < max_retries => {
                        attempt += 1;
                        let delay = backoff.next_backoff().unwrap_or(RETRY_MAX_INTERVAL);
                        warn!(
                            "Sending message {} to {endpoint} failed ({e}), retry {attempt}/{max_retries} after {delay:?}",
                            message.id
                        );
                        TokioSleep(delay).await;
                    }
                    Err(e) => {
                        return Err(CommunicationError::FailedToSend {
                            message: format!(
                                "Failed to send {:?} message {} to {endpoint} after {} attempts",
                                message.kind(),
                                message.id,
                                attempt + 1
                            ),
                            location,
                            source: Some(Box::new(e)),
                        });
                    }
                }
            }
        }
    }
}

#[async_trait]
impl SendMessages for MessageSender {
    fn local_endpoint(&self) -> &EndpointId {
        &self.local
    }

    async fn send_message(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
        max_retries: u32,
    ) -> Result<(), CommunicationError> {
        self.deliver(endpoint, &message, max_retries).await
    }

    async fn send_message_and_wait_for_response(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<CommunicationMessage, CommunicationError> {
        let message_id = message.id;
        let response = self.handler.forward_after_response(endpoint, message_id);

        if let Err(e) = self.deliver(endpoint, &message, max_retries).await {
            self.handler.cancel(&message_id);
            return Err(e);
        }

        match TokioTimeout(timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(CommunicationError::EndpointSignedOff {
                message: format!("{endpoint} signed off before answering message {message_id}"),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(_) => {
                self.handler.cancel(&message_id);
                Err(CommunicationError::Timeout {
                    message: format!(
                        "No response from {endpoint} to message {message_id} within {timeout:?}"
                    ),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }
}
