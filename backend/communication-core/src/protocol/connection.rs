//! Protocol level connection between two endpoints.
//!
//! Both sides send an `EndpointConnect` carrying their connection information and
//! description, and both answer the other's with `Success` or `Failure`. An endpoint is
//! approved once the remote's connect has been accepted locally and the local connect
//! has been accepted remotely, in whichever order those happen.

use crate::config::ExchangeConfig;
use crate::endpoints::EndpointInformationStorage;
use crate::error::CommunicationError;
use crate::interaction::CommunicationDescriptionStorage;
use crate::protocol::transport::SendMessages;

use models::{
    ChannelConnectionInformation, CommunicationDescription, CommunicationMessage, EndpointId,
    ErrorLocation, MessageId, Payload,
};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};

#[derive(Debug, Default)]
struct ConnectProgress {
    local_connect_sent: bool,
    local_connect_accepted: bool,
}

pub struct EndpointConnectionConductor {
    local_connection: ChannelConnectionInformation,
    descriptions: Arc<CommunicationDescriptionStorage>,
    endpoints: Arc<EndpointInformationStorage>,
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
    progress: Mutex<HashMap<EndpointId, ConnectProgress>>,
}

impl EndpointConnectionConductor {
    pub fn new(
        local_connection: ChannelConnectionInformation,
        descriptions: Arc<CommunicationDescriptionStorage>,
        endpoints: Arc<EndpointInformationStorage>,
        sender: Arc<dyn SendMessages>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            local_connection,
            descriptions,
            endpoints,
            sender,
            config,
            progress: Mutex::new(HashMap::new()),
        }
    }

    /// Start connecting to a remote endpoint.
    ///
    /// Returns once the remote answered our connect. Approval completes when the remote's
    /// own connect has been processed as well.
    pub async fn connect_to(
        &self,
        connection: ChannelConnectionInformation,
    ) -> Result<(), CommunicationError> {
        let endpoint = connection.id().clone();
        if self.endpoints.can_communicate_with_endpoint(&endpoint) {
            debug!("Already connected to {endpoint}");
            return Ok(());
        }

        self.add_or_update(connection);

        if !self.mark_connect_sent(&endpoint) {
            debug!("Connect to {endpoint} already in progress");
            return Ok(());
        }

        self.send_connect(&endpoint).await
    }

    /// Tell the remote we are leaving and forget it locally.
    pub async fn disconnect_from(&self, endpoint: &EndpointId) {
        let message = CommunicationMessage::new(
            self.sender.local_endpoint().clone(),
            Payload::EndpointDisconnect,
        );
        if let Err(e) = self
            .sender
            .send_message(endpoint, message, self.config.max_retries)
            .await
        {
            warn!("Could not notify {endpoint} of disconnect: {e}");
        }
        self.endpoints.try_remove_endpoint(endpoint);
        self.forget(endpoint);
    }

    /// Handle a remote's `EndpointConnect`.
    pub async fn on_receipt_of_connect(
        &self,
        message_id: MessageId,
        remote: &EndpointId,
        connection: ChannelConnectionInformation,
        description: CommunicationDescription,
    ) {
        if connection.id() != remote {
            warn!(
                "Connect from {remote} carries connection information for {}",
                connection.id()
            );
            self.respond(remote, message_id, failure("Connection information does not match sender"))
                .await;
            return;
        }

        let local_description = self.descriptions.to_description();
        if !description.is_compatible_with(&local_description) {
            info!(
                "Refusing {remote}: protocol {} is incompatible with {}",
                description.protocol_version, local_description.protocol_version
            );
            self.respond(
                remote,
                message_id,
                failure(&format!(
                    "Protocol version {} is not compatible with {}",
                    description.protocol_version, local_description.protocol_version
                )),
            )
            .await;
            self.endpoints.try_remove_endpoint(remote);
            self.forget(remote);
            return;
        }

        if self.endpoints.can_communicate_with_endpoint(remote) {
            self.respond(remote, message_id, Payload::Success).await;
            return;
        }

        self.add_or_update(connection);

        if !self.endpoints.is_waiting_for_approval(remote)
            && !self.endpoints.try_start_approval(remote, description)
        {
            self.respond(remote, message_id, failure("Endpoint could not be approved"))
                .await;
            return;
        }

        self.respond(remote, message_id, Payload::Success).await;

        if self.mark_connect_sent(remote) {
            if let Err(e) = self.send_connect(remote).await {
                warn!("Connecting back to {remote} failed: {e}");
            }
        } else {
            self.try_complete(remote);
        }
    }

    /// Handle a remote's `EndpointDisconnect`.
    pub fn on_receipt_of_disconnect(&self, remote: &EndpointId) {
        info!("{remote} disconnected");
        self.endpoints.try_remove_endpoint(remote);
        self.forget(remote);
    }

    pub fn forget(&self, endpoint: &EndpointId) {
        self.lock_progress().remove(endpoint);
    }

    async fn send_connect(&self, endpoint: &EndpointId) -> Result<(), CommunicationError> {
        let message = CommunicationMessage::new(
            self.sender.local_endpoint().clone(),
            Payload::EndpointConnect {
                connection: self.local_connection.clone(),
                description: self.descriptions.to_description(),
            },
        );

        let response = self
            .sender
            .send_message_and_wait_for_response(
                endpoint,
                message,
                self.config.max_retries,
                self.config.wait_for_response_timeout(),
            )
            .await;

        match response.map(|response| response.payload) {
            Ok(Payload::Success) => {
                if let Some(progress) = self.lock_progress().get_mut(endpoint) {
                    progress.local_connect_accepted = true;
                }
                self.try_complete(endpoint);
                Ok(())
            }
            Ok(Payload::Failure { error }) => {
                self.abandon(endpoint);
                Err(CommunicationError::ConnectionRejected {
                    message: format!("{endpoint} refused the connection: {error}"),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            Ok(other) => {
                self.abandon(endpoint);
                Err(CommunicationError::ConnectionRejected {
                    message: format!("{endpoint} answered connect with {:?}", other.kind()),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            Err(e) => {
                self.abandon(endpoint);
                Err(e)
            }
        }
    }

    /// Progress left by an earlier attempt is dropped when the endpoint is new to the store,
    /// since endpoints removed before their approval raise no disconnect event.
    fn add_or_update(&self, connection: ChannelConnectionInformation) {
        let endpoint = connection.id().clone();
        if self.endpoints.try_add(&endpoint, connection.clone()) {
            self.forget(&endpoint);
        } else {
            self.endpoints.try_update(connection);
        }
    }

    fn try_complete(&self, endpoint: &EndpointId) {
        let accepted = self
            .lock_progress()
            .get(endpoint)
            .is_some_and(|progress| progress.local_connect_accepted);

        if accepted
            && self.endpoints.is_waiting_for_approval(endpoint)
            && self.endpoints.try_complete_approval(endpoint)
        {
            info!("Connected to {endpoint}");
        }
    }

    fn abandon(&self, endpoint: &EndpointId) {
        self.endpoints.try_remove_endpoint(endpoint);
        self.forget(endpoint);
    }

    /// Returns `true` if this call is the one that should send the connect.
    fn mark_connect_sent(&self, endpoint: &EndpointId) -> bool {
        let mut progress = self.lock_progress();
        let entry = progress.entry(endpoint.clone()).or_default();
        !std::mem::replace(&mut entry.local_connect_sent, true)
    }

    async fn respond(&self, endpoint: &EndpointId, original: MessageId, payload: Payload) {
        let response =
            CommunicationMessage::response_to(self.sender.local_endpoint().clone(), original, payload);
        if let Err(e) = self
            .sender
            .send_message(endpoint, response, self.config.max_retries)
            .await
        {
            warn!("Could not answer connect {original} from {endpoint}: {e}");
        }
    }

    fn lock_progress(&self) -> std::sync::MutexGuard<'_, HashMap<EndpointId, ConnectProgress>> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn failure(reason: &str) -> Payload {
    Payload::Failure {
        error: reason.to_string(),
    }
}
