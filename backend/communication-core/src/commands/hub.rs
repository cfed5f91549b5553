use crate::commands::descriptor::{CommandSet, KnownCommandSets};
use crate::commands::proxy::{CommandProxy, CommandProxyBuilder};
use crate::error::CommandError;

use models::{ChannelConnectionInformation, CommunicationDescription, EndpointId, TypeIdentity};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};

/// Receives the command sets negotiated with a remote endpoint.
pub trait StoreRemoteCommandProxies: Send + Sync {
    fn on_receipt_of_endpoint_commands(
        &self,
        endpoint: &EndpointId,
        command_sets: &[TypeIdentity],
    ) -> Result<(), CommandError>;

    /// Drop everything stored for an endpoint that left without a disconnect event.
    fn on_removal_of_endpoint(&self, endpoint: &EndpointId);
}

/// Proxies for the command sets of every connected remote endpoint.
pub struct RemoteCommandHub {
    known: Arc<KnownCommandSets>,
    builder: CommandProxyBuilder,
    endpoints: RwLock<HashMap<EndpointId, HashMap<TypeIdentity, CommandProxy>>>,
}

impl RemoteCommandHub {
    pub fn new(known: Arc<KnownCommandSets>, builder: CommandProxyBuilder) -> Self {
        Self {
            known,
            builder,
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Create proxies for every known command set the endpoint advertises.
    pub fn on_endpoint_signed_in(
        &self,
        connection: &ChannelConnectionInformation,
        description: &CommunicationDescription,
    ) {
        if let Err(e) = self.store_proxies(connection.id(), &description.command_sets) {
            warn!("Some command sets of {} could not be stored: {e}", connection.id());
        }
    }

    /// Drop every proxy for the endpoint. Clones still held by callers fail to send.
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
            debug!("Dropped {} command proxies for {endpoint}", proxies.len());
        }
    }

    pub fn has_commands_for(&self, endpoint: &EndpointId) -> bool {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(endpoint)
    }

    pub fn has_command_for(&self, endpoint: &EndpointId, command_set: &TypeIdentity) -> bool {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .is_some_and(|proxies| proxies.contains_key(command_set))
    }

    /// Typed client for `T` on `endpoint`, if the endpoint provides it.
    pub fn commands_for<T: CommandSet>(&self, endpoint: &EndpointId) -> Option<T> {
        let identity = T::descriptor().identity().clone();
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .and_then(|proxies| proxies.get(&identity))
            .cloned()
            .map(T::from_proxy)
    }

    pub fn available_command_sets(&self, endpoint: &EndpointId) -> Vec<TypeIdentity> {
        let mut sets: Vec<TypeIdentity> = self
            .endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .map(|proxies| proxies.keys().cloned().collect())
            .unwrap_or_default();
        sets.sort();
        sets
    }

    /// Store proxies for each command set, skipping the ones that fail.
    ///
    /// Returns the first failure after all sets were attempted.
    fn store_proxies(
        &self,
        endpoint: &EndpointId,
        command_sets: &[TypeIdentity],
    ) -> Result<(), CommandError> {
        let mut first_error = None;
        let mut proxies = HashMap::new();

        for identity in command_sets {
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
        info!("Stored {added} command proxies for {endpoint}");
        drop(endpoints);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl StoreRemoteCommandProxies for RemoteCommandHub {
    fn on_receipt_of_endpoint_commands(
        &self,
        endpoint: &EndpointId,
        command_sets: &[TypeIdentity],
    ) -> Result<(), CommandError> {
        self.store_proxies(endpoint, command_sets)
    }

    fn on_removal_of_endpoint(&self, endpoint: &EndpointId) {
        self.on_endpoint_signed_off(endpoint);
    }
}
