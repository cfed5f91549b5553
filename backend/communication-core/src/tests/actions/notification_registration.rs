use crate::PROTOCOL_VERSION;
use crate::actions::{
    RegisterForNotificationProcessAction, UnregisterFromNotificationProcessAction,
};
use crate::config::ExchangeConfig;
use crate::interaction::{CommunicationDescriptionStorage, InteractionSubjectGroupStorage};
use crate::notifications::{LocalNotificationCollection, NotificationMap};
use crate::protocol::MessageProcessAction;
use crate::tests::support::{
    RecordingSender, TEMPERATURE, TemperatureNotifications, approved_endpoints,
};

use models::{CommunicationMessage, EndpointId, NotificationId, Payload};

use std::sync::Arc;

/// **VALUE**: Verifies registration answers and their effect on the local collection.
///
/// **WHY THIS MATTERS**: The remote proxy only keeps a listener after a `Success`, so a
/// registration for a notification this endpoint never raises must be refused.
///
/// **BUG THIS CATCHES**: Would catch unknown registrations answered with `Success`, or
/// unregistering of a stranger answered with `Failure`.
#[tokio::test]
async fn given_registration_requests_when_processed_then_answers_match_collection() {
    // GIVEN
    let sender = RecordingSender::new("local");
    let descriptions = Arc::new(CommunicationDescriptionStorage::new(
        PROTOCOL_VERSION,
        Arc::new(InteractionSubjectGroupStorage::new()),
    ));
    let notifications = Arc::new(LocalNotificationCollection::new(
        sender.clone(),
        ExchangeConfig::default(),
        descriptions,
    ));
    notifications
        .register(&NotificationMap::for_set::<TemperatureNotifications>().unwrap())
        .unwrap();
    let register = RegisterForNotificationProcessAction::new(
        approved_endpoints(&["remote"]),
        Arc::clone(&notifications),
        sender.clone(),
        ExchangeConfig::default(),
    );
    let unregister = UnregisterFromNotificationProcessAction::new(
        Arc::clone(&notifications),
        sender.clone(),
        ExchangeConfig::default(),
    );
    let remote = EndpointId::new("remote");
    let changed = NotificationId::new(format!("{TEMPERATURE}#changed"));
    let request = |payload| CommunicationMessage::new(remote.clone(), payload);

    // WHEN
    register
        .invoke(request(Payload::RegisterForNotification {
            notification: changed.clone(),
        }))
        .await
        .unwrap();
    register
        .invoke(request(Payload::RegisterForNotification {
            notification: NotificationId::new("tests.Other#tick"),
        }))
        .await
        .unwrap();
    assert!(notifications.is_registered(&remote, &changed));
    unregister
        .invoke(request(Payload::UnregisterFromNotification {
            notification: changed.clone(),
        }))
        .await
        .unwrap();
    unregister
        .invoke(request(Payload::UnregisterFromNotification {
            notification: changed.clone(),
        }))
        .await
        .unwrap();

    // THEN
    let answers: Vec<Payload> = sender
        .sent()
        .into_iter()
        .map(|(_, message)| message.payload)
        .collect();
    assert_eq!(answers.len(), 4);
    assert_eq!(answers[0], Payload::Success);
    assert!(matches!(answers[1], Payload::Failure { .. }));
    assert_eq!(answers[2], Payload::Success);
    assert_eq!(answers[3], Payload::Success);
    assert!(!notifications.is_registered(&remote, &changed));
}

/// **VALUE**: Verifies that a registration from an endpoint that is not connected is refused.
///
/// **WHY THIS MATTERS**: Registrations are only cleaned up when a connected endpoint
/// disconnects. A stranger's registration would receive every notification forever.
///
/// **BUG THIS CATCHES**: Would catch registrations stored for any sender.
#[tokio::test]
async fn given_unknown_sender_when_registering_then_answers_failure_and_stores_nothing() {
    // GIVEN
    let sender = RecordingSender::new("local");
    let descriptions = Arc::new(CommunicationDescriptionStorage::new(
        PROTOCOL_VERSION,
        Arc::new(InteractionSubjectGroupStorage::new()),
    ));
    let notifications = Arc::new(LocalNotificationCollection::new(
        sender.clone(),
        ExchangeConfig::default(),
        descriptions,
    ));
    notifications
        .register(&NotificationMap::for_set::<TemperatureNotifications>().unwrap())
        .unwrap();
    let register = RegisterForNotificationProcessAction::new(
        approved_endpoints(&["remote"]),
        Arc::clone(&notifications),
        sender.clone(),
        ExchangeConfig::default(),
    );
    let stranger = EndpointId::new("stranger");
    let changed = NotificationId::new(format!("{TEMPERATURE}#changed"));

    // WHEN
    register
        .invoke(CommunicationMessage::new(
            stranger.clone(),
            Payload::RegisterForNotification {
                notification: changed.clone(),
            },
        ))
        .await
        .unwrap();

    // THEN
    assert!(!notifications.is_registered(&stranger, &changed));
    let answers = sender.sent();
    assert_eq!(answers.len(), 1);
    assert!(matches!(answers[0].1.payload, Payload::Failure { .. }));
}
