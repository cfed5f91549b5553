use crate::endpoints::{ApprovalState, EndpointEvent, EndpointInformationStorage};
use crate::tests::support::connection;

use models::{CommunicationDescription, EndpointId, Version};

use tokio::sync::broadcast::error::TryRecvError;

fn description() -> CommunicationDescription {
    CommunicationDescription::new(Version::new(1, 0, 0))
}

/// **VALUE**: Verifies the full contacted → pending → approved lifecycle and its events.
///
/// **WHY THIS MATTERS**: The interaction handshake starts from the connected event. A missing
/// or duplicated event either stalls the handshake or runs it twice.
///
/// **BUG THIS CATCHES**: Would catch firing `Connected` before approval completes, or more
/// than once.
#[test]
fn given_contacted_endpoint_when_approved_then_fires_connected_once() {
    // GIVEN: A contacted endpoint and a subscriber
    let storage = EndpointInformationStorage::new();
    let mut events = storage.subscribe();
    let id = EndpointId::new("remote");
    assert!(storage.try_add(&id, connection("remote")));
    assert!(storage.has_been_contacted(&id));
    assert!(!storage.can_communicate_with_endpoint(&id));

    // WHEN: Approval starts and completes
    assert!(storage.try_start_approval(&id, description()));
    assert!(storage.is_waiting_for_approval(&id));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert!(storage.try_complete_approval(&id));

    // THEN: Exactly one Connected event with the stored data
    assert_eq!(
        events.try_recv().unwrap(),
        EndpointEvent::Connected {
            connection: connection("remote"),
            description: description(),
        }
    );
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert!(storage.can_communicate_with_endpoint(&id));
    assert!(!storage.try_complete_approval(&id));
}

/// **VALUE**: Verifies that removal fires `Disconnected` only for approved endpoints.
///
/// **BUG THIS CATCHES**: Would catch cleanup running for endpoints that never connected,
/// which signs off proxies that were never created.
#[test]
fn given_endpoints_in_different_states_when_removed_then_only_approved_fire_disconnected() {
    // GIVEN: One pending and one approved endpoint
    let storage = EndpointInformationStorage::new();
    let pending = EndpointId::new("pending");
    let approved = EndpointId::new("approved");
    storage.try_add(&pending, connection("pending"));
    storage.try_start_approval(&pending, description());
    storage.try_add(&approved, connection("approved"));
    storage.try_start_approval(&approved, description());
    storage.try_complete_approval(&approved);
    let mut events = storage.subscribe();

    // WHEN
    assert!(storage.try_remove_endpoint(&pending));
    assert!(storage.try_remove_endpoint(&approved));

    // THEN: A single Disconnected for the approved endpoint
    assert_eq!(
        events.try_recv().unwrap(),
        EndpointEvent::Disconnected {
            id: approved.clone()
        }
    );
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert!(!storage.try_remove_endpoint(&approved));
    assert!(!storage.has_been_contacted(&pending));
}

/// **VALUE**: Verifies that transitions out of order are rejected.
#[test]
fn given_unknown_or_wrong_state_when_transitioning_then_returns_false() {
    let storage = EndpointInformationStorage::new();
    let id = EndpointId::new("remote");

    assert!(!storage.try_start_approval(&id, description()));
    assert!(!storage.try_complete_approval(&id));

    storage.try_add(&id, connection("remote"));
    assert!(!storage.try_complete_approval(&id));
    assert!(!storage.try_add(&id, connection("remote")));
    assert_eq!(storage.state_of(&id), Some(ApprovalState::Contacted));
}

/// **VALUE**: Verifies that connection information cannot change after approval.
///
/// **WHY THIS MATTERS**: Proxies are built against the approved connection. Silently changing
/// it would route messages to an endpoint that never took part in the handshake.
///
/// **BUG THIS CATCHES**: Would catch `try_update` ignoring the approval state.
#[test]
fn given_approved_endpoint_when_updating_connection_then_update_is_rejected() {
    // GIVEN
    let storage = EndpointInformationStorage::new();
    let id = EndpointId::new("remote");
    storage.try_add(&id, connection("remote"));

    // WHEN / THEN: Allowed before approval
    assert!(storage.try_update(connection("remote")));

    storage.try_start_approval(&id, description());
    storage.try_complete_approval(&id);

    // WHEN / THEN: Refused after approval
    assert!(!storage.try_update(connection("remote")));
    assert!(!storage.try_update(connection("stranger")));
}

/// **VALUE**: Verifies that an id and connection for different endpoints are refused.
#[test]
fn given_mismatched_id_when_adding_then_returns_false() {
    let storage = EndpointInformationStorage::new();

    assert!(!storage.try_add(&EndpointId::new("a"), connection("b")));
    assert!(storage.try_get_connection_for(&EndpointId::new("a")).is_none());
}
