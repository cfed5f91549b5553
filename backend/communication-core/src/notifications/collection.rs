//! Notifications this endpoint raises, and the remote endpoints listening to them.
//!
//! Raising a notification never blocks on the network. The forwarder installed on each
//! definition queues the notification on an unbounded channel; a background task sends
//! it to every registered endpoint as a `NotificationRaised` message.

use crate::config::ExchangeConfig;
use crate::error::NotificationError;
use crate::interaction::CommunicationDescriptionStorage;
use crate::notifications::definition::{NotificationDefinition, NotificationMap};
use crate::protocol::SendMessages;

use models::{
    CommunicationMessage, EndpointId, ErrorLocation, NotificationId, NotificationRaisedData,
    Payload,
};

use std::collections::{BTreeSet, HashMap};
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;

type Registrations = Arc<RwLock<HashMap<NotificationId, BTreeSet<EndpointId>>>>;

pub struct LocalNotificationCollection {
    definitions: RwLock<HashMap<NotificationId, Arc<NotificationDefinition>>>,
    registrations: Registrations,
    raised: mpsc::UnboundedSender<NotificationRaisedData>,
    descriptions: Arc<CommunicationDescriptionStorage>,
}

impl LocalNotificationCollection {
    /// Create the collection and spawn its forwarding task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        sender: Arc<dyn SendMessages>,
        config: ExchangeConfig,
        descriptions: Arc<CommunicationDescriptionStorage>,
    ) -> Self {
        let (raised, receiver) = mpsc::unbounded_channel();
        let registrations: Registrations = Arc::new(RwLock::new(HashMap::new()));

        TokioSpawn(forward_raised_notifications(
            receiver,
            Arc::clone(&registrations),
            sender,
            config.max_retries,
        ));

        Self {
            definitions: RwLock::new(HashMap::new()),
            registrations,
            raised,
            descriptions,
        }
    }

    /// Register every notification of a notification set.
    ///
    /// Nothing is registered if any of the notifications already exists.
    pub fn register(&self, map: &NotificationMap) -> Result<(), NotificationError> {
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(duplicate) = map
            .definitions()
            .find(|definition| definitions.contains_key(definition.id()))
        {
            return Err(NotificationError::DuplicateNotification {
                message: format!("{} is already registered", duplicate.id()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        for definition in map.definitions() {
            let raised = self.raised.clone();
            definition.forward_to_listeners(Arc::new(move |notification: &NotificationId, arguments: &Value| {
                let data = NotificationRaisedData {
                    notification: notification.clone(),
                    arguments: arguments.clone(),
                };
                if raised.send(data).is_err() {
                    warn!("Notification forwarding has stopped, dropping {notification}");
                }
            }));
            definitions.insert(definition.id().clone(), Arc::clone(definition));
        }
        drop(definitions);

        self.descriptions
            .register_notification_set(map.notification_set().clone());
        info!("Registered notifications for {}", map.notification_set());
        Ok(())
    }

    pub fn contains(&self, notification: &NotificationId) -> bool {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(notification)
    }

    /// Start forwarding `notification` to `endpoint`.
    pub fn register_for_notification(
        &self,
        endpoint: &EndpointId,
        notification: &NotificationId,
    ) -> Result<(), NotificationError> {
        if !self.contains(notification) {
            return Err(NotificationError::UnknownNotification {
                message: format!("{endpoint} registered for unknown notification {notification}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(notification.clone())
            .or_default()
            .insert(endpoint.clone());
        debug!("{endpoint} registered for {notification}");
        Ok(())
    }

    /// Stop forwarding `notification` to `endpoint`. Returns `false` if it was not registered.
    pub fn unregister_from_notification(
        &self,
        endpoint: &EndpointId,
        notification: &NotificationId,
    ) -> bool {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(endpoints) = registrations.get_mut(notification) else {
            return false;
        };
        let removed = endpoints.remove(endpoint);
        if endpoints.is_empty() {
            registrations.remove(notification);
        }
        removed
    }

    /// Drop every registration of `endpoint`.
    pub fn unregister_endpoint(&self, endpoint: &EndpointId) {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for endpoints in registrations.values_mut() {
            endpoints.remove(endpoint);
        }
        registrations.retain(|_, endpoints| !endpoints.is_empty());
    }

    pub fn is_registered(&self, endpoint: &EndpointId, notification: &NotificationId) -> bool {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(notification)
            .is_some_and(|endpoints| endpoints.contains(endpoint))
    }
}

async fn forward_raised_notifications(
    mut receiver: mpsc::UnboundedReceiver<NotificationRaisedData>,
    registrations: Registrations,
    sender: Arc<dyn SendMessages>,
    max_retries: u32,
) {
    while let Some(data) = receiver.recv().await {
        let endpoints: Vec<EndpointId> = registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&data.notification)
            .map(|endpoints| endpoints.iter().cloned().collect())
            .unwrap_or_default();

        for endpoint in endpoints {
            let message = CommunicationMessage::new(
                sender.local_endpoint().clone(),
                Payload::NotificationRaised(data.clone()),
            );
            if let Err(e) = sender.send_message(&endpoint, message, max_retries).await {
                warn!("Forwarding {} to {endpoint} failed: {e}", data.notification);
            }
        }
    }
    debug!("Notification forwarding stopped");
}
