//! Locally raised notifications.
//!
//! The owner of a [`NotificationMap`] raises notifications through its definitions.
//! Each definition hands the serialized arguments to its forwarders; the
//! [`LocalNotificationCollection`](crate::notifications::LocalNotificationCollection)
//! installs the forwarder that sends them to registered endpoints.

use crate::error::NotificationError;
use crate::notifications::descriptor::{
    NotificationSet, verify_that_type_is_a_correct_notification_set,
};

use models::{ErrorLocation, NotificationId, TypeIdentity};

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;

pub type NotificationForwarder = Arc<dyn Fn(&NotificationId, &Value) + Send + Sync>;

pub struct NotificationDefinition {
    id: NotificationId,
    argument_type: &'static str,
    forwarders: RwLock<Vec<NotificationForwarder>>,
}

impl Debug for NotificationDefinition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("NotificationDefinition")
            .field("id", &self.id)
            .field("argument_type", &self.argument_type)
            .field("forwarders", &self.forwarder_count())
            .finish()
    }
}

impl NotificationDefinition {
    pub fn new(id: NotificationId, argument_type: &'static str) -> Self {
        Self {
            id,
            argument_type,
            forwarders: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    pub fn argument_type(&self) -> &'static str {
        self.argument_type
    }

    pub fn forward_to_listeners(&self, forwarder: NotificationForwarder) {
        self.forwarders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(forwarder);
    }

    pub fn forwarder_count(&self) -> usize {
        self.forwarders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Raise the notification with `arguments`.
    ///
    /// # Errors
    ///
    /// - [`NotificationError::ArgumentMismatch`] if `A` is not the declared argument type
    /// - [`NotificationError::Serialization`] if the arguments cannot be serialized
    #[track_caller]
    pub fn raise<A: Serialize>(&self, arguments: &A) -> Result<(), NotificationError> {
        if type_name::<A>() != self.argument_type {
            return Err(NotificationError::ArgumentMismatch {
                message: format!(
                    "{} expects {} but was raised with {}",
                    self.id,
                    self.argument_type,
                    type_name::<A>()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let value = serde_json::to_value(arguments)?;
        let forwarders = self
            .forwarders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for forwarder in forwarders {
            forwarder(&self.id, &value);
        }
        Ok(())
    }
}

/// The definitions of every notification in one notification set.
#[derive(Debug, Clone)]
pub struct NotificationMap {
    notification_set: TypeIdentity,
    definitions: BTreeMap<String, Arc<NotificationDefinition>>,
}

impl NotificationMap {
    pub fn for_set<T: NotificationSet>() -> Result<Self, NotificationError> {
        let descriptor = T::descriptor();
        verify_that_type_is_a_correct_notification_set(&descriptor)?;

        let definitions = descriptor
            .notifications()
            .iter()
            .map(|signature| {
                (
                    signature.name().to_string(),
                    Arc::new(NotificationDefinition::new(
                        descriptor.notification_id(signature.name()),
                        signature.argument_type(),
                    )),
                )
            })
            .collect();

        Ok(Self {
            notification_set: descriptor.identity().clone(),
            definitions,
        })
    }

    pub fn notification_set(&self) -> &TypeIdentity {
        &self.notification_set
    }

    pub fn definition(&self, name: &str) -> Option<Arc<NotificationDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<NotificationDefinition>> {
        self.definitions.values()
    }
}
