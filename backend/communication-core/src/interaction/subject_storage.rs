//! Local registry of provided and required subject groups.
//!
//! A subject holds any number of groups, each identified by a caller chosen group id.
//! Registering several types under the same group id builds a fallback: alternative
//! revisions of one capability, in registration order.

use models::{
    CommunicationSubject, CommunicationSubjectGroup, InteractionSubjects, TypeIdentity, Version,
    VersionedTypeFallback,
};

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use log::debug;

type GroupedFallbacks = Vec<(String, VersionedTypeFallback)>;

#[derive(Debug, Default)]
struct SubjectEntries {
    commands: GroupedFallbacks,
    notifications: GroupedFallbacks,
}

impl SubjectEntries {
    fn to_group(&self, subject: &CommunicationSubject) -> CommunicationSubjectGroup {
        CommunicationSubjectGroup::new(
            subject.clone(),
            self.commands.iter().map(|(_, fallback)| fallback.clone()).collect(),
            self.notifications
                .iter()
                .map(|(_, fallback)| fallback.clone())
                .collect(),
        )
    }
}

#[derive(Debug, Default)]
struct Registrations {
    provided: BTreeMap<CommunicationSubject, SubjectEntries>,
    required: BTreeMap<CommunicationSubject, SubjectEntries>,
}

#[derive(Debug, Default)]
pub struct InteractionSubjectGroupStorage {
    registrations: RwLock<Registrations>,
}

fn add_to_group(
    groups: &mut GroupedFallbacks,
    group_id: &str,
    identity: TypeIdentity,
    version: Version,
) {
    match groups.iter_mut().find(|(id, _)| id == group_id) {
        Some((_, fallback)) => {
            if !fallback.push(identity.clone(), version) {
                debug!("{identity} already registered in group {group_id}");
            }
        }
        None => groups.push((
            group_id.to_string(),
            VersionedTypeFallback::single(identity, version),
        )),
    }
}

impl InteractionSubjectGroupStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command_for_provided_subject_group(
        &self,
        subject: &CommunicationSubject,
        command_set: TypeIdentity,
        version: Version,
        group_id: &str,
    ) {
        let mut registrations = self.write();
        let entries = registrations.provided.entry(subject.clone()).or_default();
        add_to_group(&mut entries.commands, group_id, command_set, version);
    }

    pub fn register_command_for_required_subject_group(
        &self,
        subject: &CommunicationSubject,
        command_set: TypeIdentity,
        version: Version,
        group_id: &str,
    ) {
        let mut registrations = self.write();
        let entries = registrations.required.entry(subject.clone()).or_default();
        add_to_group(&mut entries.commands, group_id, command_set, version);
    }

    pub fn register_notification_for_provided_subject_group(
        &self,
        subject: &CommunicationSubject,
        notification_set: TypeIdentity,
        version: Version,
        group_id: &str,
    ) {
        let mut registrations = self.write();
        let entries = registrations.provided.entry(subject.clone()).or_default();
        add_to_group(&mut entries.notifications, group_id, notification_set, version);
    }

    pub fn register_notification_for_required_subject_group(
        &self,
        subject: &CommunicationSubject,
        notification_set: TypeIdentity,
        version: Version,
        group_id: &str,
    ) {
        let mut registrations = self.write();
        let entries = registrations.required.entry(subject.clone()).or_default();
        add_to_group(&mut entries.notifications, group_id, notification_set, version);
    }

    /// Every subject with at least one provision or requirement, sorted.
    pub fn subjects(&self) -> Vec<CommunicationSubject> {
        let registrations = self.read();
        let mut subjects: Vec<CommunicationSubject> = registrations
            .provided
            .keys()
            .chain(registrations.required.keys())
            .cloned()
            .collect();
        subjects.sort();
        subjects.dedup();
        subjects
    }

    pub fn provided_subjects(&self) -> Vec<CommunicationSubject> {
        self.read().provided.keys().cloned().collect()
    }

    pub fn required_subjects(&self) -> Vec<CommunicationSubject> {
        self.read().required.keys().cloned().collect()
    }

    pub fn contains_group_provisions_for_subject(&self, subject: &CommunicationSubject) -> bool {
        self.read().provided.contains_key(subject)
    }

    pub fn group_provisions_for(
        &self,
        subject: &CommunicationSubject,
    ) -> Option<CommunicationSubjectGroup> {
        self.read()
            .provided
            .get(subject)
            .map(|entries| entries.to_group(subject))
    }

    pub fn contains_group_requirements_for_subject(&self, subject: &CommunicationSubject) -> bool {
        self.read().required.contains_key(subject)
    }

    pub fn group_requirements_for(
        &self,
        subject: &CommunicationSubject,
    ) -> Option<CommunicationSubjectGroup> {
        self.read()
            .required
            .get(subject)
            .map(|entries| entries.to_group(subject))
    }

    /// Snapshot sent to a remote endpoint during the interaction handshake.
    pub fn interaction_subjects(&self) -> InteractionSubjects {
        let registrations = self.read();
        InteractionSubjects {
            provided: registrations
                .provided
                .iter()
                .map(|(subject, entries)| entries.to_group(subject))
                .collect(),
            required: registrations
                .required
                .iter()
                .map(|(subject, entries)| entries.to_group(subject))
                .collect(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registrations> {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registrations> {
        self.registrations.write().unwrap_or_else(PoisonError::into_inner)
    }
}
