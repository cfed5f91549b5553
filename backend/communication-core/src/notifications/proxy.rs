//! Client side of a remote notification set.
//!
//! Local listeners subscribe per notification. The remote endpoint is asked to start
//! forwarding a notification when its first listener subscribes and to stop when the
//! last one unsubscribes. Whether the remote is currently forwarding is tracked
//! explicitly per notification.

use crate::config::ExchangeConfig;
use crate::error::{CommunicationError, NotificationError};
use crate::notifications::descriptor::{
    NotificationSet, NotificationSetDescriptor, verify_that_type_is_a_correct_notification_set,
};
use crate::protocol::SendMessages;

use models::{
    CommunicationMessage, EndpointId, ErrorLocation, NotificationId, Payload, TypeIdentity,
};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

/// A notification received from a remote endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub endpoint: EndpointId,
    pub notification_set: TypeIdentity,
    pub notification: NotificationId,
    pub arguments: Value,
}

impl NotificationEvent {
    pub fn arguments<A: DeserializeOwned>(&self) -> Result<A, NotificationError> {
        Ok(serde_json::from_value(self.arguments.clone())?)
    }
}

pub type NotificationListener = Arc<dyn Fn(&NotificationEvent) + Send + Sync>;

/// Token returned by [`NotificationProxy::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationSubscription {
    notification: NotificationId,
    token: u64,
}

impl NotificationSubscription {
    pub fn notification(&self) -> &NotificationId {
        &self.notification
    }
}

#[derive(Default)]
struct Subscribers {
    listeners: Vec<(u64, NotificationListener)>,
    registered_with_remote: bool,
}

struct NotificationProxyInner {
    endpoint: EndpointId,
    descriptor: NotificationSetDescriptor,
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
    next_token: AtomicU64,
    subscribers: Mutex<HashMap<NotificationId, Subscribers>>,
    // Serializes register/unregister round trips so they cannot interleave
    registration: AsyncMutex<()>,
    signed_off: AtomicBool,
}

/// Proxy for one notification set on one remote endpoint.
#[derive(Clone)]
pub struct NotificationProxy {
    inner: Arc<NotificationProxyInner>,
}

impl NotificationProxy {
    pub fn endpoint(&self) -> &EndpointId {
        &self.inner.endpoint
    }

    pub fn notification_set(&self) -> &TypeIdentity {
        self.inner.descriptor.identity()
    }

    pub fn is_signed_off(&self) -> bool {
        self.inner.signed_off.load(Ordering::SeqCst)
    }

    pub fn contains_notification(&self, notification: &NotificationId) -> bool {
        self.inner
            .descriptor
            .notifications()
            .iter()
            .any(|signature| &self.inner.descriptor.notification_id(signature.name()) == notification)
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        let id = self.inner.descriptor.notification_id(name);
        self.lock_subscribers()
            .get(&id)
            .map_or(0, |subscribers| subscribers.listeners.len())
    }

    /// Add a listener for the notification called `name`.
    ///
    /// The first listener registers this endpoint with the remote. If that fails the
    /// listener is not added.
    pub async fn subscribe<F>(
        &self,
        name: &str,
        listener: F,
    ) -> Result<NotificationSubscription, NotificationError>
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        let inner = &self.inner;
        self.ensure_not_signed_off()?;

        if inner.descriptor.notification(name).is_none() {
            return Err(NotificationError::UnknownNotification {
                message: format!("{} has no notification '{name}'", inner.descriptor.identity()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        let notification = inner.descriptor.notification_id(name);

        let _registration = inner.registration.lock().await;

        let registered = self
            .lock_subscribers()
            .get(&notification)
            .is_some_and(|subscribers| subscribers.registered_with_remote);

        if !registered {
            self.exchange(Payload::RegisterForNotification {
                notification: notification.clone(),
            })
            .await?;
            self.ensure_not_signed_off()?;
        }

        let token = inner.next_token.fetch_add(1, Ordering::SeqCst);
        let mut subscribers = self.lock_subscribers();
        let entry = subscribers.entry(notification.clone()).or_default();
        entry.registered_with_remote = true;
        entry.listeners.push((token, Arc::new(listener)));

        Ok(NotificationSubscription {
            notification,
            token,
        })
    }

    /// Remove a listener. The last listener unregisters this endpoint with the remote.
    pub async fn unsubscribe(
        &self,
        subscription: &NotificationSubscription,
    ) -> Result<(), NotificationError> {
        let _registration = self.inner.registration.lock().await;

        let unregister = {
            let mut subscribers = self.lock_subscribers();
            let Some(entry) = subscribers.get_mut(&subscription.notification) else {
                return Ok(());
            };
            entry.listeners.retain(|(token, _)| *token != subscription.token);
            if entry.listeners.is_empty() {
                let was_registered = entry.registered_with_remote;
                subscribers.remove(&subscription.notification);
                was_registered
            } else {
                false
            }
        };

        if unregister && !self.is_signed_off() {
            self.exchange(Payload::UnregisterFromNotification {
                notification: subscription.notification.clone(),
            })
            .await?;
        }
        Ok(())
    }

    /// Deliver a notification from the remote endpoint to the local listeners.
    ///
    /// Returns the number of listeners called.
    pub fn raise(&self, notification: &NotificationId, arguments: &Value) -> usize {
        let listeners: Vec<NotificationListener> = self
            .lock_subscribers()
            .get(notification)
            .map(|subscribers| {
                subscribers
                    .listeners
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect()
            })
            .unwrap_or_default();

        let event = NotificationEvent {
            endpoint: self.inner.endpoint.clone(),
            notification_set: self.inner.descriptor.identity().clone(),
            notification: notification.clone(),
            arguments: arguments.clone(),
        };
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    /// Drop every listener and refuse further subscriptions.
    pub(crate) fn sign_off(&self) {
        self.inner.signed_off.store(true, Ordering::SeqCst);
        let dropped: usize = self
            .lock_subscribers()
            .drain()
            .map(|(_, subscribers)| subscribers.listeners.len())
            .sum();
        if dropped > 0 {
            debug!(
                "Dropped {dropped} listeners of {} on {}",
                self.inner.descriptor.identity(),
                self.inner.endpoint
            );
        }
    }

    async fn exchange(&self, payload: Payload) -> Result<(), NotificationError> {
        let inner = &self.inner;
        let kind = payload.kind();
        let message = CommunicationMessage::new(inner.sender.local_endpoint().clone(), payload);

        let response = inner
            .sender
            .send_message_and_wait_for_response(
                &inner.endpoint,
                message,
                inner.config.max_retries,
                inner.config.wait_for_response_timeout(),
            )
            .await?;

        match response.payload {
            Payload::Success => Ok(()),
            Payload::Failure { error } => {
                warn!("{} refused {kind:?}: {error}", inner.endpoint);
                Err(NotificationError::RegistrationFailed {
                    message: format!("{} refused {kind:?}: {error}", inner.endpoint),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            other => Err(NotificationError::RegistrationFailed {
                message: format!("{kind:?} was answered with {:?}", other.kind()),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    #[track_caller]
    fn ensure_not_signed_off(&self) -> Result<(), NotificationError> {
        if self.is_signed_off() {
            return Err(NotificationError::Communication(
                CommunicationError::FailedToSend {
                    message: format!("{} has signed off", self.inner.endpoint),
                    location: ErrorLocation::from(Location::caller()),
                    source: None,
                },
            ));
        }
        Ok(())
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<NotificationId, Subscribers>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates notification proxies that send through one [`SendMessages`] implementation.
#[derive(Clone)]
pub struct NotificationProxyBuilder {
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
}

impl NotificationProxyBuilder {
    pub fn new(sender: Arc<dyn SendMessages>, config: ExchangeConfig) -> Self {
        Self { sender, config }
    }

    pub fn proxy_connecting_to<T: NotificationSet>(
        &self,
        endpoint: &EndpointId,
    ) -> Result<T, NotificationError> {
        Ok(T::from_proxy(
            self.proxy_for_descriptor(endpoint, T::descriptor())?,
        ))
    }

    pub fn proxy_for_descriptor(
        &self,
        endpoint: &EndpointId,
        descriptor: NotificationSetDescriptor,
    ) -> Result<NotificationProxy, NotificationError> {
        verify_that_type_is_a_correct_notification_set(&descriptor)?;
        Ok(NotificationProxy {
            inner: Arc::new(NotificationProxyInner {
                endpoint: endpoint.clone(),
                descriptor,
                sender: Arc::clone(&self.sender),
                config: self.config,
                next_token: AtomicU64::new(0),
                subscribers: Mutex::new(HashMap::new()),
                registration: AsyncMutex::new(()),
                signed_off: AtomicBool::new(false),
            }),
        })
    }
}
