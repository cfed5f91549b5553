use crate::interaction::subject_storage::InteractionSubjectGroupStorage;

use models::{CommunicationDescription, TypeIdentity, Version};

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct RegisteredSets {
    command_sets: BTreeSet<TypeIdentity>,
    notification_sets: BTreeSet<TypeIdentity>,
}

/// Builds the description this endpoint sends with its connect message.
///
/// Subjects come from the subject storage; command and notification sets are registered
/// by the local collections as implementations are added.
#[derive(Debug)]
pub struct CommunicationDescriptionStorage {
    protocol_version: Version,
    subjects: Arc<InteractionSubjectGroupStorage>,
    sets: RwLock<RegisteredSets>,
}

impl CommunicationDescriptionStorage {
    pub fn new(protocol_version: Version, subjects: Arc<InteractionSubjectGroupStorage>) -> Self {
        Self {
            protocol_version,
            subjects,
            sets: RwLock::new(RegisteredSets::default()),
        }
    }

    pub fn protocol_version(&self) -> Version {
        self.protocol_version
    }

    pub fn register_command_set(&self, command_set: TypeIdentity) {
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .command_sets
            .insert(command_set);
    }

    pub fn register_notification_set(&self, notification_set: TypeIdentity) {
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .notification_sets
            .insert(notification_set);
    }

    pub fn to_description(&self) -> CommunicationDescription {
        let sets = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        CommunicationDescription {
            protocol_version: self.protocol_version,
            subjects: self.subjects.subjects(),
            command_sets: sets.command_sets.iter().cloned().collect(),
            notification_sets: sets.notification_sets.iter().cloned().collect(),
        }
    }
}
