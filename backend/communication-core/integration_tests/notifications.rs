use crate::helpers::{
    LoopbackNetwork, Provision, THERMOSTAT_EVENTS, TargetChanged, ThermostatEvents,
    connect_and_wait_for_thermostat, peer, provide_thermostat, require_thermostat, wait_until,
};

use models::NotificationId;

use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Notifications raised by a provider and received by a consumer
// ============================================================================

/// **VALUE**: Verifies that a subscribed consumer receives notifications the provider raises.
///
/// **WHY THIS MATTERS**: Subscribing involves a registration round trip and forwarding
/// through a background task on the provider. All of it has to line up for a single
/// event to arrive.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The registration never reaches the provider's collection
/// - Raised notifications are not forwarded to registered endpoints
/// - The consumer's hub hands notifications to the wrong proxy
#[tokio::test]
async fn given_subscribed_consumer_when_provider_raises_then_listener_receives_event() {
    // GIVEN
    let network = LoopbackNetwork::new();
    let provider = peer(&network, "provider");
    let consumer = peer(&network, "consumer");
    provide_thermostat(&provider, Provision { commands: true });
    require_thermostat(&consumer);
    let thermostat = connect_and_wait_for_thermostat(&consumer, &provider).await;

    let events = consumer
        .notification_hub()
        .notifications_for::<ThermostatEvents>(provider.id())
        .expect("Provider does not support thermostat events")
        .expect("Provider is unknown");
    let received: Arc<Mutex<Vec<TargetChanged>>> = Arc::default();
    let sink = Arc::clone(&received);
    events
        .on_target_changed(move |event| {
            sink.lock()
                .unwrap()
                .push(event.arguments().expect("Malformed TargetChanged"));
        })
        .await
        .expect("Subscription failed");

    // WHEN: The command raises target_changed on the provider
    thermostat.set_target(23.0).await.expect("set_target failed");

    // THEN
    let observed = Arc::clone(&received);
    assert!(
        wait_until(
            move || !observed.lock().unwrap().is_empty(),
            Duration::from_secs(5)
        )
        .await,
        "No notification arrived"
    );
    assert_eq!(
        *received.lock().unwrap(),
        vec![TargetChanged {
            previous: 18.0,
            celsius: 23.0
        }]
    );
    let target_changed = NotificationId::new(format!("{THERMOSTAT_EVENTS}#target_changed"));
    assert!(
        provider
            .local_notifications()
            .is_registered(consumer.id(), &target_changed)
    );
}
