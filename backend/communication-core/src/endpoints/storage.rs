//! Registry of every endpoint this side has heard from.
//!
//! Each endpoint moves through three states:
//! - **Contacted**: its connection information is known
//! - **PendingApproval**: its description arrived and approval is underway
//! - **Approved**: both sides accepted the connection and messages may flow
//!
//! Transitions into and out of **Approved** are published as [`EndpointEvent`]s on a
//! broadcast channel. Events are sent while the write lock is held, so subscribers see
//! them in the same order as the state changes that caused them.

use models::{ChannelConnectionInformation, CommunicationDescription, EndpointId};

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use log::{debug, info, warn};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    Contacted,
    PendingApproval,
    Approved,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndpointEvent {
    /// Fired once per endpoint when approval completes.
    Connected {
        connection: ChannelConnectionInformation,
        description: CommunicationDescription,
    },
    /// Fired when an approved endpoint is removed.
    Disconnected { id: EndpointId },
}

#[derive(Debug)]
struct EndpointRecord {
    connection: ChannelConnectionInformation,
    description: Option<CommunicationDescription>,
    state: ApprovalState,
}

/// Thread-safe endpoint registry.
///
/// All operations are synchronous and report failure through their return value; an
/// operation that does not apply to the current state is a no-op returning `false`.
#[derive(Debug)]
pub struct EndpointInformationStorage {
    endpoints: RwLock<HashMap<EndpointId, EndpointRecord>>,
    events: broadcast::Sender<EndpointEvent>,
}

impl Default for EndpointInformationStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointInformationStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            endpoints: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to connect and disconnect events.
    ///
    /// Only events sent after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.events.subscribe()
    }

    /// Record a newly contacted endpoint.
    ///
    /// Fails if the id is already known or does not match the connection's id.
    pub fn try_add(&self, id: &EndpointId, connection: ChannelConnectionInformation) -> bool {
        if connection.id() != id {
            warn!(
                "Refusing to add endpoint {id}: connection information belongs to {}",
                connection.id()
            );
            return false;
        }

        let mut endpoints = self.write();
        if endpoints.contains_key(id) {
            return false;
        }

        endpoints.insert(
            id.clone(),
            EndpointRecord {
                connection,
                description: None,
                state: ApprovalState::Contacted,
            },
        );
        debug!("Endpoint {id} contacted");
        true
    }

    /// Move a contacted endpoint into approval, storing its description.
    pub fn try_start_approval(&self, id: &EndpointId, description: CommunicationDescription) -> bool {
        let mut endpoints = self.write();
        match endpoints.get_mut(id) {
            Some(record) if record.state == ApprovalState::Contacted => {
                record.description = Some(description);
                record.state = ApprovalState::PendingApproval;
                debug!("Endpoint {id} waiting for approval");
                true
            }
            _ => false,
        }
    }

    /// Approve an endpoint that is waiting for approval and fire [`EndpointEvent::Connected`].
    pub fn try_complete_approval(&self, id: &EndpointId) -> bool {
        let mut endpoints = self.write();
        let Some(record) = endpoints.get_mut(id) else {
            return false;
        };
        if record.state != ApprovalState::PendingApproval {
            return false;
        }
        let Some(description) = record.description.clone() else {
            return false;
        };

        record.state = ApprovalState::Approved;
        info!("Endpoint {id} approved");

        // No subscribers is not an error
        let _ = self.events.send(EndpointEvent::Connected {
            connection: record.connection.clone(),
            description,
        });
        true
    }

    /// Replace the connection information of a known, not yet approved endpoint.
    pub fn try_update(&self, connection: ChannelConnectionInformation) -> bool {
        let mut endpoints = self.write();
        match endpoints.get_mut(connection.id()) {
            Some(record) if record.state != ApprovalState::Approved => {
                debug!("Connection information for endpoint {} updated", connection.id());
                record.connection = connection;
                true
            }
            _ => false,
        }
    }

    /// Forget an endpoint in any state.
    ///
    /// [`EndpointEvent::Disconnected`] is fired only when the endpoint had been approved.
    pub fn try_remove_endpoint(&self, id: &EndpointId) -> bool {
        let mut endpoints = self.write();
        let Some(record) = endpoints.remove(id) else {
            return false;
        };

        if record.state == ApprovalState::Approved {
            info!("Endpoint {id} disconnected");
            let _ = self.events.send(EndpointEvent::Disconnected { id: id.clone() });
        } else {
            debug!("Endpoint {id} removed before approval");
        }
        true
    }

    pub fn has_been_contacted(&self, id: &EndpointId) -> bool {
        self.read().contains_key(id)
    }

    pub fn is_waiting_for_approval(&self, id: &EndpointId) -> bool {
        self.state_of(id) == Some(ApprovalState::PendingApproval)
    }

    pub fn can_communicate_with_endpoint(&self, id: &EndpointId) -> bool {
        self.state_of(id) == Some(ApprovalState::Approved)
    }

    pub fn state_of(&self, id: &EndpointId) -> Option<ApprovalState> {
        self.read().get(id).map(|record| record.state)
    }

    pub fn try_get_connection_for(&self, id: &EndpointId) -> Option<ChannelConnectionInformation> {
        self.read().get(id).map(|record| record.connection.clone())
    }

    pub fn description_for(&self, id: &EndpointId) -> Option<CommunicationDescription> {
        self.read()
            .get(id)
            .and_then(|record| record.description.clone())
    }

    /// Ids of every endpoint that completed approval.
    pub fn approved_endpoints(&self) -> Vec<EndpointId> {
        let mut approved: Vec<EndpointId> = self
            .read()
            .iter()
            .filter(|(_, record)| record.state == ApprovalState::Approved)
            .map(|(id, _)| id.clone())
            .collect();
        approved.sort();
        approved
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EndpointId, EndpointRecord>> {
        self.endpoints.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EndpointId, EndpointRecord>> {
        self.endpoints.write().unwrap_or_else(PoisonError::into_inner)
    }
}
