use crate::helpers::{
    LoopbackNetwork, Provision, THERMOSTAT_EVENTS, connect_and_wait_for_thermostat, peer,
    provide_thermostat, require_thermostat, wait_until,
};

use communication_core::endpoints::ApprovalState;
use communication_core::interaction::{HandshakeResolution, HandshakeState};

use models::{CommunicationSubject, TypeIdentity, Version};

use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Connect and interaction handshake between two layers
// ============================================================================

/// **VALUE**: Verifies the full connect and handshake between a consumer and a provider.
///
/// **WHY THIS MATTERS**: Every command and notification depends on both layers approving
/// each other and agreeing on capabilities. This is the path every real session takes.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Either side never completes approval
/// - The handshake resolves on one side only
/// - Negotiated capabilities never reach the proxy hubs
#[tokio::test]
async fn given_matching_subjects_when_consumer_connects_then_both_sides_accept() {
    // GIVEN
    let network = LoopbackNetwork::new();
    let provider = peer(&network, "provider");
    let consumer = peer(&network, "consumer");
    provide_thermostat(&provider, Provision { commands: true });
    require_thermostat(&consumer);

    // WHEN
    let _thermostat = connect_and_wait_for_thermostat(&consumer, &provider).await;

    // THEN
    assert_eq!(
        consumer.endpoints().state_of(provider.id()),
        Some(ApprovalState::Approved)
    );
    let interaction = Arc::clone(provider.interaction());
    let provider_endpoints = Arc::clone(provider.endpoints());
    let consumer_id = consumer.id().clone();
    assert!(
        wait_until(
            move || {
                provider_endpoints.state_of(&consumer_id) == Some(ApprovalState::Approved)
                    && interaction.handshake_state(&consumer_id)
                        == HandshakeState::Resolved(HandshakeResolution::Accepted)
            },
            Duration::from_secs(5)
        )
        .await
    );
    assert!(consumer.notification_hub().has_notification_for(
        provider.id(),
        &TypeIdentity::new(THERMOSTAT_EVENTS)
    ));
}

/// **VALUE**: Verifies that an unmet requirement ends the relationship on both sides.
///
/// **WHY THIS MATTERS**: A peer that cannot serve a requirement must not linger as an
/// approved endpoint that silently fails every call.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The rejecting side keeps the endpoint
/// - The other side ignores the `Neutral` answer
/// - Proxies are created for a rejected endpoint
#[tokio::test]
async fn given_unmet_requirement_when_connecting_then_both_sides_drop_each_other() {
    // GIVEN: The provider requires a subject nobody provides
    let network = LoopbackNetwork::new();
    let provider = peer(&network, "provider");
    let consumer = peer(&network, "consumer");
    provide_thermostat(&provider, Provision { commands: true });
    provider.subjects().register_command_for_required_subject_group(
        &CommunicationSubject::new("x"),
        TypeIdentity::new("integration.Unavailable"),
        Version::new(1, 0, 0),
        "unavailable",
    );
    require_thermostat(&consumer);

    // WHEN
    consumer
        .connect_to(provider.local_connection().clone())
        .await
        .expect("Connect was refused");

    // THEN
    let provider_endpoints = Arc::clone(provider.endpoints());
    let consumer_endpoints = Arc::clone(consumer.endpoints());
    let (provider_id, consumer_id) = (provider.id().clone(), consumer.id().clone());
    let consumer_hub = Arc::clone(consumer.command_hub());
    assert!(
        wait_until(
            move || {
                !provider_endpoints.has_been_contacted(&consumer_id)
                    && !consumer_endpoints.has_been_contacted(&provider_id)
                    && !consumer_hub.has_commands_for(&provider_id)
            },
            Duration::from_secs(5)
        )
        .await,
        "Rejected endpoints are still known"
    );
}

/// **VALUE**: Verifies that a rejected consumer can connect again once its requirement
/// can be met.
///
/// **WHY THIS MATTERS**: A rejection ends one connection, not the relationship. Providers
/// register capabilities at runtime and consumers retry.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The old rejection blocks the new handshake
/// - Connect progress of the rejected attempt swallows the new connect
/// - The reconnected consumer never receives proxies
#[tokio::test]
async fn given_rejected_consumer_when_provider_adds_capability_and_consumer_reconnects_then_accepts() {
    // GIVEN: The provider offers nothing the consumer requires
    let network = LoopbackNetwork::new();
    let provider = peer(&network, "provider");
    let consumer = peer(&network, "consumer");
    require_thermostat(&consumer);
    consumer
        .connect_to(provider.local_connection().clone())
        .await
        .expect("Connect was refused");

    let provider_endpoints = Arc::clone(provider.endpoints());
    let consumer_endpoints = Arc::clone(consumer.endpoints());
    let (provider_id, consumer_id) = (provider.id().clone(), consumer.id().clone());
    assert!(
        wait_until(
            move || {
                !provider_endpoints.has_been_contacted(&consumer_id)
                    && !consumer_endpoints.has_been_contacted(&provider_id)
            },
            Duration::from_secs(5)
        )
        .await,
        "First connection was not rejected"
    );
    // Let both layers finish cleaning up after the rejection
    tokio::time::sleep(Duration::from_millis(100)).await;

    // WHEN
    provide_thermostat(&provider, Provision { commands: true });
    let thermostat = connect_and_wait_for_thermostat(&consumer, &provider).await;

    // THEN
    assert_eq!(
        consumer.interaction().handshake_state(provider.id()),
        HandshakeState::Resolved(HandshakeResolution::Accepted)
    );
    assert_eq!(thermostat.set_target(20.0).await.unwrap(), 18.0);
}
