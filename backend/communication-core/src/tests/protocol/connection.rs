use crate::config::ExchangeConfig;
use crate::endpoints::{ApprovalState, EndpointEvent, EndpointInformationStorage};
use crate::error::CommunicationError;
use crate::interaction::{CommunicationDescriptionStorage, InteractionSubjectGroupStorage};
use crate::protocol::EndpointConnectionConductor;
use crate::tests::support::{RecordingSender, connection, timeout_error};

use models::{CommunicationDescription, EndpointId, MessageId, MessageKind, Payload, Version};

use std::sync::Arc;

struct Fixture {
    endpoints: Arc<EndpointInformationStorage>,
    sender: Arc<RecordingSender>,
    conductor: EndpointConnectionConductor,
}

fn fixture(sender: Arc<RecordingSender>) -> Fixture {
    let endpoints = Arc::new(EndpointInformationStorage::new());
    let descriptions = Arc::new(CommunicationDescriptionStorage::new(
        Version::new(1, 0, 0),
        Arc::new(InteractionSubjectGroupStorage::new()),
    ));
    let conductor = EndpointConnectionConductor::new(
        connection("local"),
        descriptions,
        Arc::clone(&endpoints),
        Arc::clone(&sender) as _,
        ExchangeConfig::new(100, 0),
    );
    Fixture {
        endpoints,
        sender,
        conductor,
    }
}

/// **VALUE**: Verifies that a remote's connect plus our accepted connect approves it.
///
/// **WHY THIS MATTERS**: Approval is what starts the interaction handshake. Both sides must
/// have accepted each other first.
///
/// **BUG THIS CATCHES**: Would catch approving before our own connect was answered, or
/// never connecting back.
#[tokio::test]
async fn given_remote_connect_when_our_connect_is_accepted_then_endpoint_is_approved() {
    // GIVEN: Remote answers our connect with Success
    let f = fixture(RecordingSender::new("local"));
    let mut events = f.endpoints.subscribe();
    let remote = EndpointId::new("remote");

    // WHEN
    f.conductor
        .on_receipt_of_connect(
            MessageId::new(),
            &remote,
            connection("remote"),
            CommunicationDescription::new(Version::new(1, 3, 0)),
        )
        .await;

    // THEN: Remote answered, connect sent back, approval fired
    assert_eq!(f.sender.sent_of_kind(MessageKind::Success).len(), 1);
    assert_eq!(f.sender.sent_of_kind(MessageKind::EndpointConnect).len(), 1);
    assert_eq!(f.endpoints.state_of(&remote), Some(ApprovalState::Approved));
    assert!(matches!(
        events.try_recv().unwrap(),
        EndpointEvent::Connected { .. }
    ));
}

/// **VALUE**: Verifies that a different protocol major version is refused.
///
/// **BUG THIS CATCHES**: Would catch comparing full versions (refusing minor upgrades) or not
/// comparing at all.
#[tokio::test]
async fn given_incompatible_major_version_when_remote_connects_then_refuses_and_forgets() {
    let f = fixture(RecordingSender::new("local"));
    let remote = EndpointId::new("remote");

    f.conductor
        .on_receipt_of_connect(
            MessageId::new(),
            &remote,
            connection("remote"),
            CommunicationDescription::new(Version::new(2, 0, 0)),
        )
        .await;

    assert_eq!(f.sender.sent_of_kind(MessageKind::Failure).len(), 1);
    assert!(f.sender.sent_of_kind(MessageKind::EndpointConnect).is_empty());
    assert!(!f.endpoints.has_been_contacted(&remote));
}

/// **VALUE**: Verifies that a refused or unanswered connect removes the endpoint.
#[tokio::test]
async fn given_refusing_remote_when_connecting_then_returns_error_and_removes_endpoint() {
    // GIVEN: Remote refuses
    let refusing = fixture(RecordingSender::with_responder("local", |_, _| {
        Ok(Payload::Failure {
            error: "busy".to_string(),
        })
    }));

    // WHEN
    let result = refusing.conductor.connect_to(connection("remote")).await;

    // THEN
    assert!(matches!(
        result,
        Err(CommunicationError::ConnectionRejected { .. })
    ));
    assert!(!refusing.endpoints.has_been_contacted(&EndpointId::new("remote")));

    // GIVEN: Remote never answers
    let silent = fixture(RecordingSender::with_responder("local", |_, _| {
        Err(timeout_error())
    }));

    // WHEN
    let result = silent.conductor.connect_to(connection("remote")).await;

    // THEN
    assert!(matches!(result, Err(CommunicationError::Timeout { .. })));
    assert!(!silent.endpoints.has_been_contacted(&EndpointId::new("remote")));
}

/// **VALUE**: Verifies that an accepted connect alone does not approve the endpoint.
///
/// **WHY THIS MATTERS**: Without the remote's description there is nothing to advertise in
/// the connected event.
#[tokio::test]
async fn given_accepted_connect_without_remote_connect_when_connecting_then_stays_contacted() {
    let f = fixture(RecordingSender::new("local"));

    f.conductor.connect_to(connection("remote")).await.unwrap();

    assert_eq!(
        f.endpoints.state_of(&EndpointId::new("remote")),
        Some(ApprovalState::Contacted)
    );
}

/// **VALUE**: Verifies that a remote's disconnect removes it.
#[test]
fn given_contacted_remote_when_disconnect_received_then_endpoint_is_removed() {
    let f = fixture(RecordingSender::new("local"));
    let remote = EndpointId::new("remote");
    f.endpoints.try_add(&remote, connection("remote"));

    f.conductor.on_receipt_of_disconnect(&remote);

    assert!(!f.endpoints.has_been_contacted(&remote));
}

/// **VALUE**: Verifies that an endpoint removed before its approval can be connected again.
///
/// **WHY THIS MATTERS**: Removals of endpoints that were never approved raise no disconnect
/// event, so nothing else clears the progress of the earlier attempt.
///
/// **BUG THIS CATCHES**: Would catch a second `connect_to` being treated as "already in
/// progress" and never sending a connect, leaving the endpoint Contacted forever.
#[tokio::test]
async fn given_endpoint_removed_before_approval_when_connecting_again_then_connect_is_resent() {
    // GIVEN: Our connect was accepted, then the endpoint was dropped before approval
    let f = fixture(RecordingSender::new("local"));
    let remote = EndpointId::new("remote");
    f.conductor.connect_to(connection("remote")).await.unwrap();
    assert!(f.endpoints.try_remove_endpoint(&remote));

    // WHEN
    f.conductor.connect_to(connection("remote")).await.unwrap();

    // THEN
    assert_eq!(f.sender.sent_of_kind(MessageKind::EndpointConnect).len(), 2);
    assert_eq!(f.endpoints.state_of(&remote), Some(ApprovalState::Contacted));
}
