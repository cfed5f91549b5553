use crate::error::CommunicationError;

use models::{CommunicationMessage, EndpointId};

use std::time::Duration;

use async_trait::async_trait;

/// A channel implementation that can deliver one message to one endpoint.
///
/// Implementations make a single attempt per call. Retries are handled by the caller.
/// Incoming messages are handed to the protocol core through
/// [`CommunicationLayer::process_message`](crate::CommunicationLayer::process_message),
/// each on its own task: some messages are only answered after a response from the
/// sender, which has to be processed concurrently.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(
        &self,
        endpoint: &EndpointId,
        message: &CommunicationMessage,
    ) -> Result<(), CommunicationError>;
}

/// Outgoing side of the protocol core.
#[async_trait]
pub trait SendMessages: Send + Sync {
    fn local_endpoint(&self) -> &EndpointId;

    /// Deliver a message, retrying up to `max_retries` times.
    async fn send_message(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
        max_retries: u32,
    ) -> Result<(), CommunicationError>;

    /// Deliver a message and wait for the message answering it.
    ///
    /// # Errors
    ///
    /// - [`CommunicationError::FailedToSend`] if delivery failed after all retries
    /// - [`CommunicationError::Timeout`] if no response arrived within `timeout`
    /// - [`CommunicationError::EndpointSignedOff`] if the endpoint disconnected while waiting
    async fn send_message_and_wait_for_response(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<CommunicationMessage, CommunicationError>;
}
