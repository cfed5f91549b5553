use crate::commands::descriptor::is_member_name;
use crate::error::NotificationError;
use crate::notifications::proxy::NotificationProxy;

use models::{ErrorLocation, NotificationId, TypeIdentity};

use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::panic::Location;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSignature {
    name: String,
    argument_type: &'static str,
}

impl NotificationSignature {
    pub fn new<A: Serialize + DeserializeOwned>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument_type: type_name::<A>(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argument_type(&self) -> &'static str {
        self.argument_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSetDescriptor {
    identity: TypeIdentity,
    notifications: Vec<NotificationSignature>,
}

impl NotificationSetDescriptor {
    pub fn new(identity: impl Into<TypeIdentity>) -> Self {
        Self {
            identity: identity.into(),
            notifications: Vec::new(),
        }
    }

    pub fn with_notification(mut self, signature: NotificationSignature) -> Self {
        self.notifications.push(signature);
        self
    }

    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    pub fn notifications(&self) -> &[NotificationSignature] {
        &self.notifications
    }

    pub fn notification(&self, name: &str) -> Option<&NotificationSignature> {
        self.notifications
            .iter()
            .find(|notification| notification.name == name)
    }

    pub fn notification_id(&self, name: &str) -> NotificationId {
        NotificationId::from_member(&self.identity, name)
    }
}

/// A notification set interface with a typed client.
pub trait NotificationSet: Send + Sync + Sized + 'static {
    fn descriptor() -> NotificationSetDescriptor;

    fn from_proxy(proxy: NotificationProxy) -> Self;
}

#[track_caller]
pub fn verify_that_type_is_a_correct_notification_set(
    descriptor: &NotificationSetDescriptor,
) -> Result<(), NotificationError> {
    let location = ErrorLocation::from(Location::caller());
    let invalid = |reason: String| NotificationError::NotANotificationSet {
        message: format!("{}: {reason}", descriptor.identity),
        location,
    };

    if descriptor.identity.as_str().trim().is_empty() {
        return Err(invalid("identity must not be empty".to_string()));
    }
    if descriptor.notifications.is_empty() {
        return Err(invalid(
            "a notification set must declare at least one notification".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for notification in &descriptor.notifications {
        if !is_member_name(&notification.name) {
            return Err(invalid(format!(
                "'{}' is not a valid notification name",
                notification.name
            )));
        }
        if !names.insert(notification.name.as_str()) {
            return Err(invalid(format!(
                "notification '{}' is declared more than once",
                notification.name
            )));
        }
    }

    Ok(())
}

/// Notification sets this endpoint can build proxies for.
#[derive(Debug, Default)]
pub struct KnownNotificationSets {
    sets: RwLock<HashMap<TypeIdentity, NotificationSetDescriptor>>,
}

impl KnownNotificationSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: NotificationSet>(&self) -> Result<TypeIdentity, NotificationError> {
        let descriptor = T::descriptor();
        verify_that_type_is_a_correct_notification_set(&descriptor)?;
        let identity = descriptor.identity().clone();
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.clone(), descriptor);
        Ok(identity)
    }

    pub fn descriptor_for(&self, identity: &TypeIdentity) -> Option<NotificationSetDescriptor> {
        self.sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    pub fn contains(&self, identity: &TypeIdentity) -> bool {
        self.sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identity)
    }
}
