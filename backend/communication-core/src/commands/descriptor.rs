//! Shape of a command set: its identity and the signature of every command in it.
//!
//! A command set is an interface shared by both sides. The provider maps each command to
//! a delegate with [`CommandMapper`](crate::commands::CommandMapper); the consumer gets a
//! typed client built on a [`CommandProxy`].

use crate::commands::proxy::CommandProxy;
use crate::error::CommandError;

use models::{CommandId, ErrorLocation, TypeIdentity};

use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::panic::Location;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSignature {
    pub name: String,
    pub type_name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSignature {
    name: String,
    parameters: Vec<ParameterSignature>,
    return_type: Option<&'static str>,
}

impl CommandSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
        }
    }

    pub fn parameter<T: Serialize + DeserializeOwned>(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterSignature {
            name: name.into(),
            type_name: type_name::<T>(),
        });
        self
    }

    pub fn returns<T: Serialize + DeserializeOwned>(mut self) -> Self {
        self.return_type = Some(type_name::<T>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterSignature] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&'static str> {
        self.return_type
    }

    pub fn has_return_value(&self) -> bool {
        self.return_type.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSetDescriptor {
    identity: TypeIdentity,
    commands: Vec<CommandSignature>,
}

impl CommandSetDescriptor {
    pub fn new(identity: impl Into<TypeIdentity>) -> Self {
        Self {
            identity: identity.into(),
            commands: Vec::new(),
        }
    }

    pub fn with_command(mut self, signature: CommandSignature) -> Self {
        self.commands.push(signature);
        self
    }

    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    pub fn commands(&self) -> &[CommandSignature] {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&CommandSignature> {
        self.commands.iter().find(|command| command.name == name)
    }

    pub fn command_id(&self, name: &str) -> CommandId {
        CommandId::from_member(&self.identity, name)
    }
}

/// A command set interface with a typed client.
pub trait CommandSet: Send + Sync + Sized + 'static {
    fn descriptor() -> CommandSetDescriptor;

    fn from_proxy(proxy: CommandProxy) -> Self;
}

/// Check that a descriptor can be used as a command set.
///
/// A command set needs a non-empty identity and at least one command. Command names
/// must be unique and non-empty (overloads are not supported), and so must the
/// parameter names within a command.
#[track_caller]
pub fn verify_that_type_is_a_correct_command_set(
    descriptor: &CommandSetDescriptor,
) -> Result<(), CommandError> {
    let location = ErrorLocation::from(Location::caller());
    let invalid = |reason: String| CommandError::NotACommandSet {
        message: format!("{}: {reason}", descriptor.identity),
        location,
    };

    if descriptor.identity.as_str().trim().is_empty() {
        return Err(invalid("identity must not be empty".to_string()));
    }
    if descriptor.commands.is_empty() {
        return Err(invalid("a command set must declare at least one command".to_string()));
    }

    let mut names = HashSet::new();
    for command in &descriptor.commands {
        if !is_member_name(&command.name) {
            return Err(invalid(format!("'{}' is not a valid command name", command.name)));
        }
        if !names.insert(command.name.as_str()) {
            return Err(invalid(format!(
                "command '{}' is declared more than once",
                command.name
            )));
        }

        let mut parameters = HashSet::new();
        for parameter in &command.parameters {
            if parameter.name.trim().is_empty() {
                return Err(invalid(format!(
                    "command '{}' has a parameter without a name",
                    command.name
                )));
            }
            if !parameters.insert(parameter.name.as_str()) {
                return Err(invalid(format!(
                    "command '{}' declares parameter '{}' twice",
                    command.name, parameter.name
                )));
            }
        }
    }

    Ok(())
}

pub(crate) fn is_member_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Command sets this endpoint can build proxies for.
#[derive(Debug, Default)]
pub struct KnownCommandSets {
    sets: RwLock<HashMap<TypeIdentity, CommandSetDescriptor>>,
}

impl KnownCommandSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: CommandSet>(&self) -> Result<TypeIdentity, CommandError> {
        let descriptor = T::descriptor();
        verify_that_type_is_a_correct_command_set(&descriptor)?;
        let identity = descriptor.identity().clone();
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.clone(), descriptor);
        Ok(identity)
    }

    pub fn descriptor_for(&self, identity: &TypeIdentity) -> Option<CommandSetDescriptor> {
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
