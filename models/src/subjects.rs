use crate::{CommunicationSubject, VersionedTypeFallback};

use serde::{Deserialize, Serialize};

/// The command and notification sets one endpoint offers (or needs) under a subject.
///
/// Each fallback is one logical capability; its entries are the revisions of that capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationSubjectGroup {
    pub subject: CommunicationSubject,
    pub commands: Vec<VersionedTypeFallback>,
    pub notifications: Vec<VersionedTypeFallback>,
}

impl CommunicationSubjectGroup {
    pub fn new(
        subject: CommunicationSubject,
        commands: Vec<VersionedTypeFallback>,
        notifications: Vec<VersionedTypeFallback>,
    ) -> Self {
        Self {
            subject,
            commands,
            notifications,
        }
    }
}

/// Payload of the interaction handshake: everything a side provides and requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionSubjects {
    pub provided: Vec<CommunicationSubjectGroup>,
    pub required: Vec<CommunicationSubjectGroup>,
}

/// Answer to an interaction handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionConnectionState {
    /// The subjects match and the sender wants to interact.
    Desired,
    /// The sender has no interest in interacting.
    Neutral,
}
