use crate::helpers::{
    LoopbackNetwork, Provision, connect_and_wait_for_thermostat, peer, provide_thermostat,
    require_thermostat, wait_until,
};

use communication_core::{CommandError, CommunicationError};

use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Commands invoked across two layers
// ============================================================================

/// **VALUE**: Verifies a typed command call from consumer to provider and back.
///
/// **WHY THIS MATTERS**: This is the main reason endpoints connect at all.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Arguments lose their names on the way
/// - The response is not matched to the waiting invocation
/// - Commands without a return value hang instead of completing
#[tokio::test]
async fn given_connected_consumer_when_invoking_then_provider_result_is_returned() {
    // GIVEN
    let network = LoopbackNetwork::new();
    let provider = peer(&network, "provider");
    let consumer = peer(&network, "consumer");
    provide_thermostat(&provider, Provision { commands: true });
    require_thermostat(&consumer);
    let thermostat = connect_and_wait_for_thermostat(&consumer, &provider).await;

    // WHEN
    let first = thermostat.set_target(21.5).await.expect("set_target failed");
    let second = thermostat.set_target(19.0).await.expect("set_target failed");
    thermostat.calibrate().await.expect("calibrate failed");

    // THEN
    assert_eq!(first, 18.0);
    assert_eq!(second, 21.5);
}

/// **VALUE**: Verifies that a command advertised but not implemented answers with a failure.
///
/// **WHY THIS MATTERS**: The caller must get an error right away instead of waiting for
/// its timeout.
///
/// **BUG THIS CATCHES**: Would catch unknown commands being dropped without a response,
/// or a response not linked to the invocation.
#[tokio::test]
async fn given_unimplemented_command_when_invoking_then_caller_gets_failure() {
    // GIVEN: Advertised but not mapped
    let network = LoopbackNetwork::new();
    let provider = peer(&network, "provider");
    let consumer = peer(&network, "consumer");
    provide_thermostat(&provider, Provision { commands: false });
    require_thermostat(&consumer);
    let thermostat = connect_and_wait_for_thermostat(&consumer, &provider).await;

    // WHEN
    let result = thermostat.calibrate().await;

    // THEN
    match result {
        Err(CommandError::InvocationFailed { message, .. }) => {
            assert!(message.contains("not registered"), "unexpected message: {message}");
        }
        other => panic!("Expected InvocationFailed, got {other:?}"),
    }
}

/// **VALUE**: Verifies that disconnecting signs off every proxy held by callers.
///
/// **WHY THIS MATTERS**: Callers keep typed clients around. After a disconnect they must
/// fail immediately rather than send into the void.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Proxies survive the disconnect
/// - The remote side keeps the departed endpoint approved
#[tokio::test]
async fn given_held_client_when_consumer_disconnects_then_calls_fail_to_send() {
    // GIVEN
    let network = LoopbackNetwork::new();
    let provider = peer(&network, "provider");
    let consumer = peer(&network, "consumer");
    provide_thermostat(&provider, Provision { commands: true });
    require_thermostat(&consumer);
    let thermostat = connect_and_wait_for_thermostat(&consumer, &provider).await;

    // WHEN
    consumer.disconnect_from(provider.id()).await;

    // THEN
    let hub = Arc::clone(consumer.command_hub());
    let provider_endpoints = Arc::clone(provider.endpoints());
    let (provider_id, consumer_id) = (provider.id().clone(), consumer.id().clone());
    assert!(
        wait_until(
            move || {
                !hub.has_commands_for(&provider_id)
                    && !provider_endpoints.has_been_contacted(&consumer_id)
            },
            Duration::from_secs(5)
        )
        .await,
        "Disconnect was not processed on both sides"
    );
    assert!(matches!(
        thermostat.set_target(25.0).await,
        Err(CommandError::Communication(CommunicationError::FailedToSend { .. }))
    ));
}
