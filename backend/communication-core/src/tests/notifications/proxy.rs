use crate::config::ExchangeConfig;
use crate::error::{CommunicationError, NotificationError};
use crate::notifications::NotificationProxyBuilder;
use crate::tests::support::{
    RecordingSender, TEMPERATURE, TemperatureChanged, TemperatureNotifications,
};

use models::{EndpointId, MessageKind, NotificationId, Payload};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

fn temperature_on(sender: Arc<RecordingSender>) -> TemperatureNotifications {
    NotificationProxyBuilder::new(sender, ExchangeConfig::new(100, 0))
        .proxy_connecting_to::<TemperatureNotifications>(&EndpointId::new("remote"))
        .unwrap()
}

fn changed() -> NotificationId {
    NotificationId::new(format!("{TEMPERATURE}#changed"))
}

/// **VALUE**: Verifies that the remote is asked to forward only once per notification.
///
/// **WHY THIS MATTERS**: Registration is a round trip. Every extra listener must not cost
/// another one, and the remote must stop forwarding once nobody listens.
///
/// **BUG THIS CATCHES**: Would catch a register per listener or an unregister sent while
/// listeners remain.
#[tokio::test]
async fn given_two_listeners_when_subscribing_and_unsubscribing_then_remote_is_told_once() {
    // GIVEN
    let sender = RecordingSender::new("local");
    let temperature = temperature_on(Arc::clone(&sender));

    // WHEN
    let first = temperature.on_changed(|_| {}).await.unwrap();
    let second = temperature.on_changed(|_| {}).await.unwrap();

    // THEN
    assert_eq!(sender.sent_of_kind(MessageKind::RegisterForNotification).len(), 1);
    assert_eq!(temperature.proxy().subscriber_count("changed"), 2);

    // WHEN
    temperature.proxy().unsubscribe(&first).await.unwrap();
    assert!(
        sender
            .sent_of_kind(MessageKind::UnregisterFromNotification)
            .is_empty()
    );
    temperature.proxy().unsubscribe(&second).await.unwrap();

    // THEN
    let unregistered = sender.sent_of_kind(MessageKind::UnregisterFromNotification);
    assert_eq!(unregistered.len(), 1);
    assert_eq!(
        unregistered[0].1.payload,
        Payload::UnregisterFromNotification {
            notification: changed()
        }
    );
    assert_eq!(temperature.proxy().subscriber_count("changed"), 0);
}

/// **VALUE**: Verifies that a refused registration leaves no listener behind.
///
/// **BUG THIS CATCHES**: Would catch a listener that silently never fires because the
/// remote never agreed to forward.
#[tokio::test]
async fn given_remote_refuses_when_subscribing_then_listener_is_not_added() {
    let temperature = temperature_on(RecordingSender::with_responder("local", |_, _| {
        Ok(Payload::Failure {
            error: "not raised here".to_string(),
        })
    }));

    let result = temperature.on_changed(|_| {}).await;

    assert!(matches!(result, Err(NotificationError::RegistrationFailed { .. })));
    assert_eq!(temperature.proxy().subscriber_count("changed"), 0);
}

/// **VALUE**: Verifies that raised notifications reach listeners with typed arguments.
#[tokio::test]
async fn given_listener_when_notification_raised_then_listener_receives_arguments() {
    // GIVEN
    let temperature = temperature_on(RecordingSender::new("local"));
    let received: Arc<Mutex<Vec<TemperatureChanged>>> = Arc::default();
    let sink = Arc::clone(&received);
    temperature
        .on_changed(move |event| {
            sink.lock().unwrap().push(event.arguments().unwrap());
        })
        .await
        .unwrap();

    // WHEN
    let called = temperature
        .proxy()
        .raise(&changed(), &json!({ "celsius": 30.5 }));

    // THEN
    assert_eq!(called, 1);
    assert_eq!(
        *received.lock().unwrap(),
        vec![TemperatureChanged { celsius: 30.5 }]
    );
}

/// **VALUE**: Verifies that sign off drops listeners and refuses new subscriptions.
///
/// **WHY THIS MATTERS**: After the remote leaves, nothing can arrive for these listeners
/// and nothing should be sent to the remote.
#[tokio::test]
async fn given_signed_off_proxy_when_subscribing_then_fails_without_sending() {
    // GIVEN
    let sender = RecordingSender::new("local");
    let temperature = temperature_on(Arc::clone(&sender));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let subscription = temperature
        .on_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    // WHEN
    temperature.proxy().sign_off();

    // THEN
    assert_eq!(temperature.proxy().raise(&changed(), &json!({ "celsius": 1.0 })), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(
        temperature.on_changed(|_| {}).await,
        Err(NotificationError::Communication(CommunicationError::FailedToSend { .. }))
    ));
    temperature.proxy().unsubscribe(&subscription).await.unwrap();
    assert_eq!(sender.sent().len(), 1);
}
