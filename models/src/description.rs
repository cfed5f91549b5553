use crate::{CommunicationSubject, TypeIdentity, Version};

use serde::{Deserialize, Serialize};

/// What an endpoint advertises about itself when it connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationDescription {
    pub protocol_version: Version,
    pub subjects: Vec<CommunicationSubject>,
    pub command_sets: Vec<TypeIdentity>,
    pub notification_sets: Vec<TypeIdentity>,
}

impl CommunicationDescription {
    pub fn new(protocol_version: Version) -> Self {
        Self {
            protocol_version,
            subjects: Vec::new(),
            command_sets: Vec::new(),
            notification_sets: Vec::new(),
        }
    }

    /// Two endpoints can talk when their protocol major versions agree.
    pub fn is_compatible_with(&self, other: &CommunicationDescription) -> bool {
        self.protocol_version.major == other.protocol_version.major
    }
}
