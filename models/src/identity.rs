//! Identifiers shared by both sides of a connection.
//!
//! All identifiers are immutable values with total ordering so they can be used as
//! map keys and compared across processes without any registration step.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};
use uuid::Uuid;

const PROCESS_MACHINE_SEPARATOR: char = ':';
const MEMBER_SEPARATOR: char = '#';

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
                formatter.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier!(
    /// Identity of a communicating process, conventionally `"<process>:<machine>"`.
    EndpointId
);

string_identifier!(
    /// Name of a capability group that endpoints provide or require.
    CommunicationSubject
);

string_identifier!(
    /// Stable, cross-process name of one revision of a command or notification set.
    TypeIdentity
);

string_identifier!(
    /// Identity of one command, derived from its command set and member name.
    CommandId
);

string_identifier!(
    /// Identity of one notification, derived from its notification set and member name.
    NotificationId
);

impl EndpointId {
    /// Builds the identity of a process from explicitly supplied process and machine names.
    pub fn for_process(process_id: u32, machine_name: &str) -> Self {
        Self(format!(
            "{process_id}{PROCESS_MACHINE_SEPARATOR}{machine_name}"
        ))
    }
}

impl CommandId {
    /// Both sides derive the same id for the same member, so ids never need to be negotiated.
    pub fn from_member(command_set: &TypeIdentity, member: &str) -> Self {
        Self(format!("{command_set}{MEMBER_SEPARATOR}{member}"))
    }
}

impl NotificationId {
    pub fn from_member(notification_set: &TypeIdentity, member: &str) -> Self {
        Self(format!("{notification_set}{MEMBER_SEPARATOR}{member}"))
    }
}

/// Globally unique message identity, generated when the message is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl Display for MessageId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}", self.0)
    }
}
