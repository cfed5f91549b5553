use crate::error::NotificationError;
use crate::notifications::descriptor::{KnownNotificationSets, NotificationSet};
use crate::notifications::proxy::{NotificationProxy, NotificationProxyBuilder};

use models::{
    ChannelConnectionInformation, CommunicationDescription, EndpointId, ErrorLocation,
    NotificationRaisedData, TypeIdentity,
};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};

/// Receives the notification sets negotiated with a remote endpoint.
pub trait StoreRemoteNotificationProxies: Send + Sync {
    fn on_receipt_of_endpoint_notifications(
        &self,
        endpoint: &EndpointId,
        notification_sets: &[TypeIdentity],
    ) -> Result<(), NotificationError>;

    /// Drop everything stored for an endpoint that left without a disconnect event.
    fn on_removal_of_endpoint(&self, endpoint: &EndpointId);
}

/// Proxies for the notification sets of every connected remote endpoint.
pub struct RemoteNotificationHub {
    known: Arc<KnownNotificationSets>,
    builder: NotificationProxyBuilder,
    endpoints: RwLock<HashMap<EndpointId, HashMap<TypeIdentity, NotificationProxy>>>,
}

impl RemoteNotificationHub {
    pub fn new(known: Arc<KnownNotificationSets>, builder: NotificationProxyBuilder) -> Self {
        Self {
            known,
            builder,
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    pub fn on_endpoint_signed_in(
        &self,
        connection: &ChannelConnectionInformation,
        description: &CommunicationDescription,
    ) {
        if let Err(e) = self.store_proxies(connection.id(), &description.notification_sets) {
            warn!(
                "Some notification sets of {} could not be stored: {e}",
                connection.id()
            );
        }
    }

    /// Drop every proxy for the endpoint, disposing their subscriptions first.
    pub fn on_endpoint_signed_off(&self, endpoint: &EndpointId) {
        let removed = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(endpoint);

        if let Some(proxies) = removed {
            for proxy in proxies.values() {
                proxy.sign_off();
            }
            debug!("Dropped {} notification proxies for {endpoint}", proxies.len());
        }
    }

    pub fn has_notifications_for(&self, endpoint: &EndpointId) -> bool {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(endpoint)
    }

    pub fn has_notification_for(&self, endpoint: &EndpointId, notification_set: &TypeIdentity) -> bool {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .is_some_and(|proxies| proxies.contains_key(notification_set))
    }

    /// Typed client for `T` on `endpoint`.
    ///
    /// Returns `Ok(None)` when nothing is known about the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::NotificationNotSupported`] when the endpoint is known
    /// but does not provide `T`.
    pub fn notifications_for<T: NotificationSet>(
        &self,
        endpoint: &EndpointId,
    ) -> Result<Option<T>, NotificationError> {
        let identity = T::descriptor().identity().clone();
        let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        let Some(proxies) = endpoints.get(endpoint) else {
            return Ok(None);
        };

        match proxies.get(&identity) {
            Some(proxy) => Ok(Some(T::from_proxy(proxy.clone()))),
            None => Err(NotificationError::NotificationNotSupported {
                message: format!("{endpoint} does not provide {identity}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Hand a notification raised by `endpoint` to the proxy owning it.
    ///
    /// Returns the number of listeners called.
    pub fn forward(&self, endpoint: &EndpointId, data: &NotificationRaisedData) -> usize {
        let proxy = self
            .endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .and_then(|proxies| {
                proxies
                    .values()
                    .find(|proxy| proxy.contains_notification(&data.notification))
                    .cloned()
            });

        match proxy {
            Some(proxy) => proxy.raise(&data.notification, &data.arguments),
            None => {
                debug!(
                    "No proxy on {endpoint} handles {}, dropping it",
                    data.notification
                );
                0
            }
        }
    }

    fn store_proxies(
        &self,
        endpoint: &EndpointId,
        notification_sets: &[TypeIdentity],
    ) -> Result<(), NotificationError> {
        let mut first_error = None;
        let mut proxies = HashMap::new();

        for identity in notification_sets {
            let Some(descriptor) = self.known.descriptor_for(identity) else {
                debug!("No local definition of {identity} offered by {endpoint}");
                continue;
            };
            match self.builder.proxy_for_descriptor(endpoint, descriptor) {
                Ok(proxy) => {
                    proxies.insert(identity.clone(), proxy);
                }
                Err(e) => {
                    warn!("Could not create proxy for {identity} on {endpoint}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        let mut endpoints = self.endpoints.write().unwrap_or_else(PoisonError::into_inner);
        let stored = endpoints.entry(endpoint.clone()).or_default();
        let mut added = 0;
        for (identity, proxy) in proxies {
            // Live proxies keep their subscriptions
            if let Entry::Vacant(slot) = stored.entry(identity) {
                slot.insert(proxy);
                added += 1;
            }
        }
        info!("Stored {added} notification proxies for {endpoint}");
        drop(endpoints);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl StoreRemoteNotificationProxies for RemoteNotificationHub {
    fn on_receipt_of_endpoint_notifications(
        &self,
        endpoint: &EndpointId,
        notification_sets: &[TypeIdentity],
    ) -> Result<(), NotificationError> {
        self.store_proxies(endpoint, notification_sets)
    }

    fn on_removal_of_endpoint(&self, endpoint: &EndpointId) {
        self.on_endpoint_signed_off(endpoint);
    }
}
