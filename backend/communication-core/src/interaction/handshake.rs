//! Interaction handshake: deciding whether two connected endpoints want to interact.
//!
//! Once the protocol layer approves an endpoint, each side sends the subjects it
//! provides and requires. A side accepts the other when every requirement on either
//! side is met by a provision of the other, fallback by fallback. On acceptance the
//! best mutually supported revision of every required capability is handed to the
//! proxy hubs. On rejection the endpoint is removed from the endpoint store.
//!
//! Per endpoint the conductor moves through:
//! - **Idle**: nothing exchanged yet
//! - **AwaitingRemote**: local information sent first, waiting for the remote's
//! - **RemoteInitiated**: remote information arrived before ours was sent
//! - **Resolved**: accepted or rejected

use crate::config::ExchangeConfig;
use crate::commands::StoreRemoteCommandProxies;
use crate::endpoints::EndpointInformationStorage;
use crate::interaction::subject_storage::InteractionSubjectGroupStorage;
use crate::notifications::StoreRemoteNotificationProxies;
use crate::protocol::SendMessages;

use models::{
    ChannelConnectionInformation, CommunicationMessage, CommunicationSubjectGroup, EndpointId,
    InteractionConnectionState, InteractionSubjects, MessageId, Payload, TypeIdentity,
    VersionedTypeFallback,
};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeResolution {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    AwaitingRemote,
    RemoteInitiated,
    Resolved(HandshakeResolution),
}

#[derive(Debug, Default)]
struct HandshakeProgress {
    local_information_sent: bool,
    remote_information_received: bool,
    resolution: Option<HandshakeResolution>,
    // Accepted before the protocol layer approved the endpoint
    awaiting_approval: Option<NegotiatedSets>,
}

impl HandshakeProgress {
    fn state(&self) -> HandshakeState {
        match (
            self.resolution,
            self.local_information_sent,
            self.remote_information_received,
        ) {
            (Some(resolution), _, _) => HandshakeState::Resolved(resolution),
            (None, true, _) => HandshakeState::AwaitingRemote,
            (None, false, true) => HandshakeState::RemoteInitiated,
            (None, false, false) => HandshakeState::Idle,
        }
    }
}

enum Outcome {
    AlreadyResolved(HandshakeResolution),
    Accepted(Option<NegotiatedSets>),
    Rejected(String),
}

/// Capabilities agreed with a remote endpoint, at the revision to use for each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiatedSets {
    pub command_sets: Vec<TypeIdentity>,
    pub notification_sets: Vec<TypeIdentity>,
}

pub struct InteractionHandshakeConductor {
    endpoints: Arc<EndpointInformationStorage>,
    subjects: Arc<InteractionSubjectGroupStorage>,
    command_proxies: Arc<dyn StoreRemoteCommandProxies>,
    notification_proxies: Arc<dyn StoreRemoteNotificationProxies>,
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
    progress: Mutex<HashMap<EndpointId, HandshakeProgress>>,
}

impl InteractionHandshakeConductor {
    pub fn new(
        endpoints: Arc<EndpointInformationStorage>,
        subjects: Arc<InteractionSubjectGroupStorage>,
        command_proxies: Arc<dyn StoreRemoteCommandProxies>,
        notification_proxies: Arc<dyn StoreRemoteNotificationProxies>,
        sender: Arc<dyn SendMessages>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            endpoints,
            subjects,
            command_proxies,
            notification_proxies,
            sender,
            config,
            progress: Mutex::new(HashMap::new()),
        }
    }

    pub fn handshake_state(&self, endpoint: &EndpointId) -> HandshakeState {
        self.lock_progress()
            .get(endpoint)
            .map_or(HandshakeState::Idle, HandshakeProgress::state)
    }

    /// Start the handshake with an endpoint the protocol layer just approved.
    ///
    /// Sends the local subjects and waits for the answer. Does nothing if the local
    /// subjects were already sent. Capabilities accepted before the approval are handed
    /// to the proxy hubs now.
    pub async fn on_endpoint_connected(&self, connection: &ChannelConnectionInformation) {
        let endpoint = connection.id();
        if !self.endpoints.can_communicate_with_endpoint(endpoint) {
            debug!("{endpoint} is no longer approved, skipping the handshake");
            return;
        }

        let accepted = self
            .lock_progress()
            .get_mut(endpoint)
            .and_then(|entry| entry.awaiting_approval.take());
        if let Some(negotiated) = accepted {
            self.store_remote_capabilities(endpoint, &negotiated);
        }

        if !self.mark_local_information_sent(endpoint) {
            debug!("Interaction information already sent to {endpoint}");
            return;
        }
        self.send_local_information(endpoint).await;
    }

    /// Handle the remote's `EndpointInteractionInformation`.
    ///
    /// Information arriving after the handshake resolved is answered with the existing
    /// resolution and not negotiated again.
    pub async fn continue_handshake_with(
        &self,
        remote: &EndpointId,
        remote_subjects: InteractionSubjects,
        message_id: MessageId,
    ) {
        if !self.endpoints.has_been_contacted(remote) {
            warn!("Interaction information from unknown endpoint {remote}");
            self.respond(remote, message_id, InteractionConnectionState::Neutral)
                .await;
            return;
        }

        let local_subjects = self.subjects.interaction_subjects();
        let outcome = {
            let mut progress = self.lock_progress();
            let entry = self.progress_of(&mut progress, remote);
            entry.remote_information_received = true;

            match entry.resolution {
                Some(resolution) => Outcome::AlreadyResolved(resolution),
                None => match negotiate(&local_subjects, &remote_subjects) {
                    Ok(negotiated) => {
                        entry.resolution = Some(HandshakeResolution::Accepted);
                        // Approval is checked under the lock so the connect event cannot miss it
                        if self.endpoints.can_communicate_with_endpoint(remote) {
                            Outcome::Accepted(Some(negotiated))
                        } else {
                            entry.awaiting_approval = Some(negotiated);
                            Outcome::Accepted(None)
                        }
                    }
                    Err(reason) => {
                        self.mark_rejected(entry, remote);
                        Outcome::Rejected(reason)
                    }
                },
            }
        };

        match outcome {
            Outcome::AlreadyResolved(resolution) => {
                debug!("Interaction with {remote} already resolved as {resolution:?}");
                let state = match resolution {
                    HandshakeResolution::Accepted => InteractionConnectionState::Desired,
                    HandshakeResolution::Rejected => InteractionConnectionState::Neutral,
                };
                self.respond(remote, message_id, state).await;
            }
            Outcome::Rejected(reason) => {
                info!("Rejecting interaction with {remote}: {reason}");
                self.respond(remote, message_id, InteractionConnectionState::Neutral)
                    .await;
            }
            Outcome::Accepted(negotiated) => {
                match negotiated {
                    Some(negotiated) => self.store_remote_capabilities(remote, &negotiated),
                    None => debug!("Proxies for {remote} wait for its approval"),
                }
                info!("Accepted interaction with {remote}");

                self.respond(remote, message_id, InteractionConnectionState::Desired)
                    .await;

                // Before the approval the connect event sends the local information
                if self.endpoints.can_communicate_with_endpoint(remote)
                    && self.mark_local_information_sent(remote)
                {
                    self.send_local_information(remote).await;
                }
            }
        }
    }

    /// Drop all handshake state for an endpoint.
    pub fn forget(&self, endpoint: &EndpointId) {
        self.lock_progress().remove(endpoint);
    }

    async fn send_local_information(&self, endpoint: &EndpointId) {
        let message = CommunicationMessage::new(
            self.sender.local_endpoint().clone(),
            Payload::EndpointInteractionInformation(self.subjects.interaction_subjects()),
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
            Ok(Payload::EndpointInteractionInformationResponse {
                state: InteractionConnectionState::Desired,
            }) => debug!("{endpoint} wants to interact"),
            Ok(Payload::EndpointInteractionInformationResponse {
                state: InteractionConnectionState::Neutral,
            }) => {
                info!("{endpoint} does not want to interact");
                self.reject(endpoint);
            }
            Ok(other) => {
                warn!(
                    "{endpoint} answered interaction information with {:?}",
                    other.kind()
                );
                self.reject(endpoint);
            }
            Err(e) => {
                warn!("Interaction handshake with {endpoint} abandoned: {e}");
                self.reject(endpoint);
            }
        }
    }

    /// Hand the negotiated sets to the proxy hubs. A failing hub does not stop the other.
    ///
    /// Proxies stored for an endpoint that left the store meanwhile are dropped again,
    /// since no disconnect event follows for them.
    fn store_remote_capabilities(&self, remote: &EndpointId, negotiated: &NegotiatedSets) {
        if let Err(e) = self
            .command_proxies
            .on_receipt_of_endpoint_commands(remote, &negotiated.command_sets)
        {
            error!("Storing command proxies for {remote} failed: {e}");
        }
        if let Err(e) = self
            .notification_proxies
            .on_receipt_of_endpoint_notifications(remote, &negotiated.notification_sets)
        {
            error!("Storing notification proxies for {remote} failed: {e}");
        }

        if !self.endpoints.can_communicate_with_endpoint(remote) {
            debug!("{remote} left while its proxies were stored");
            self.command_proxies.on_removal_of_endpoint(remote);
            self.notification_proxies.on_removal_of_endpoint(remote);
        }
    }

    /// Resolve as rejected and remove the endpoint, once.
    ///
    /// Endpoints without handshake state were forgotten after a disconnect and are left alone.
    fn reject(&self, endpoint: &EndpointId) {
        let mut progress = self.lock_progress();
        if let Some(entry) = progress.get_mut(endpoint) {
            self.mark_rejected(entry, endpoint);
        }
    }

    /// Must be called with the progress lock held.
    fn mark_rejected(&self, entry: &mut HandshakeProgress, endpoint: &EndpointId) {
        entry.awaiting_approval = None;
        if entry.resolution.replace(HandshakeResolution::Rejected)
            != Some(HandshakeResolution::Rejected)
        {
            self.endpoints.try_remove_endpoint(endpoint);
        }
    }

    /// Progress for `endpoint`, started over when the rejection on record belongs to an
    /// earlier connection.
    ///
    /// A rejection removes the endpoint while the progress lock is held, so a rejected
    /// endpoint that is known to the store again has reconnected since.
    fn progress_of<'a>(
        &self,
        progress: &'a mut HashMap<EndpointId, HandshakeProgress>,
        endpoint: &EndpointId,
    ) -> &'a mut HandshakeProgress {
        let entry = progress.entry(endpoint.clone()).or_default();
        if entry.resolution == Some(HandshakeResolution::Rejected)
            && self.endpoints.has_been_contacted(endpoint)
        {
            debug!("Starting a new handshake with {endpoint}");
            *entry = HandshakeProgress::default();
        }
        entry
    }

    /// Returns `true` if this call is the one that should send the local information.
    fn mark_local_information_sent(&self, endpoint: &EndpointId) -> bool {
        let mut progress = self.lock_progress();
        let entry = self.progress_of(&mut progress, endpoint);
        if entry.resolution == Some(HandshakeResolution::Rejected) {
            return false;
        }
        !std::mem::replace(&mut entry.local_information_sent, true)
    }

    async fn respond(
        &self,
        endpoint: &EndpointId,
        original: MessageId,
        state: InteractionConnectionState,
    ) {
        let response = CommunicationMessage::response_to(
            self.sender.local_endpoint().clone(),
            original,
            Payload::EndpointInteractionInformationResponse { state },
        );
        if let Err(e) = self
            .sender
            .send_message(endpoint, response, self.config.max_retries)
            .await
        {
            warn!("Could not answer interaction information from {endpoint}: {e}");
        }
    }

    fn lock_progress(&self) -> MutexGuard<'_, HashMap<EndpointId, HandshakeProgress>> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decide whether `local` and `remote` can interact.
///
/// Every group the remote requires must be provided locally with at least one
/// overlapping type per fallback, and vice versa. For the local requirements the
/// revision the remote provides at its highest version is selected.
///
/// Returns the reason for the first unmet requirement on failure.
pub fn negotiate(
    local: &InteractionSubjects,
    remote: &InteractionSubjects,
) -> Result<NegotiatedSets, String> {
    for required in &remote.required {
        let provided = find_group(&local.provided, required)
            .ok_or_else(|| format!("subject '{}' is not provided locally", required.subject))?;
        ensure_all_overlap(&required.commands, &provided.commands).map_err(|fallback| {
            format!(
                "no local command set matches {fallback} for subject '{}'",
                required.subject
            )
        })?;
        ensure_all_overlap(&required.notifications, &provided.notifications).map_err(
            |fallback| {
                format!(
                    "no local notification set matches {fallback} for subject '{}'",
                    required.subject
                )
            },
        )?;
    }

    let mut negotiated = NegotiatedSets::default();
    for required in &local.required {
        let provided = find_group(&remote.provided, required).ok_or_else(|| {
            format!("subject '{}' is not provided by the remote", required.subject)
        })?;
        for fallback in &required.commands {
            let identity = resolve(fallback, &provided.commands).ok_or_else(|| {
                format!(
                    "the remote provides no command set matching {} for subject '{}'",
                    describe(fallback),
                    required.subject
                )
            })?;
            negotiated.command_sets.push(identity);
        }
        for fallback in &required.notifications {
            let identity = resolve(fallback, &provided.notifications).ok_or_else(|| {
                format!(
                    "the remote provides no notification set matching {} for subject '{}'",
                    describe(fallback),
                    required.subject
                )
            })?;
            negotiated.notification_sets.push(identity);
        }
    }

    Ok(negotiated)
}

fn find_group<'a>(
    groups: &'a [CommunicationSubjectGroup],
    wanted: &CommunicationSubjectGroup,
) -> Option<&'a CommunicationSubjectGroup> {
    groups.iter().find(|group| group.subject == wanted.subject)
}

fn ensure_all_overlap(
    required: &[VersionedTypeFallback],
    provided: &[VersionedTypeFallback],
) -> Result<(), String> {
    match required
        .iter()
        .find(|fallback| !provided.iter().any(|p| p.is_partial_match(fallback)))
    {
        Some(fallback) => Err(describe(fallback)),
        None => Ok(()),
    }
}

fn resolve(
    required: &VersionedTypeFallback,
    provided: &[VersionedTypeFallback],
) -> Option<TypeIdentity> {
    provided
        .iter()
        .find_map(|candidate| required.highest_version_match(candidate))
        .cloned()
}

fn describe(fallback: &VersionedTypeFallback) -> String {
    let types: Vec<String> = fallback
        .types()
        .iter()
        .map(|(identity, version)| format!("{identity}@{version}"))
        .collect();
    format!("[{}]", types.join(", "))
}
