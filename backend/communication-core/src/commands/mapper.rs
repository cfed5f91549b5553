use crate::commands::definition::{
    CommandDefinition, CommandDelegate, CommandParameterDefinition, CommandParameterOrigin,
};
use crate::commands::descriptor::{
    CommandSet, CommandSetDescriptor, verify_that_type_is_a_correct_command_set,
};
use crate::error::CommandError;

use models::{ErrorLocation, TypeIdentity};

use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use std::panic::Location;

/// Maps every command of a command set to a delegate.
///
/// Each mapping is validated against the command's signature: the parameters sent by
/// the invoking endpoint must match the signature by name, type, and order. Extra
/// parameters may receive the invoking endpoint id or message id.
pub struct CommandMapper<T: CommandSet> {
    descriptor: CommandSetDescriptor,
    definitions: BTreeMap<String, CommandDefinition>,
    _command_set: PhantomData<fn() -> T>,
}

impl<T: CommandSet> CommandMapper<T> {
    pub fn new() -> Result<Self, CommandError> {
        let descriptor = T::descriptor();
        verify_that_type_is_a_correct_command_set(&descriptor)?;
        Ok(Self {
            descriptor,
            definitions: BTreeMap::new(),
            _command_set: PhantomData,
        })
    }

    #[track_caller]
    pub fn map(
        &mut self,
        method: &str,
        parameters: Vec<CommandParameterDefinition>,
        delegate: CommandDelegate,
    ) -> Result<&mut Self, CommandError> {
        let location = ErrorLocation::from(Location::caller());
        let identity = self.descriptor.identity().clone();

        let signature = self
            .descriptor
            .command(method)
            .ok_or_else(|| CommandError::UnknownMethod {
                message: format!("{identity} has no command '{method}'"),
                location,
            })?;

        if self.definitions.contains_key(method) {
            return Err(CommandError::DuplicateCommand {
                message: format!("{identity}#{method} is already mapped"),
                location,
            });
        }

        let mut names = HashSet::new();
        for parameter in &parameters {
            if parameter.origin() == CommandParameterOrigin::Unknown {
                return Err(CommandError::InvalidParameterOrigin {
                    message: format!(
                        "Parameter '{}' of {identity}#{method} has no known origin",
                        parameter.name()
                    ),
                    location,
                });
            }
            if !names.insert(parameter.name()) {
                return Err(CommandError::ArgumentMismatch {
                    message: format!(
                        "Parameter '{}' of {identity}#{method} is mapped twice",
                        parameter.name()
                    ),
                    location,
                });
            }
        }

        let from_command: Vec<&CommandParameterDefinition> = parameters
            .iter()
            .filter(|parameter| parameter.origin() == CommandParameterOrigin::FromCommand)
            .collect();

        if from_command.len() != signature.parameters().len() {
            return Err(CommandError::ArgumentMismatch {
                message: format!(
                    "{identity}#{method} takes {} parameters but the delegate maps {}",
                    signature.parameters().len(),
                    from_command.len()
                ),
                location,
            });
        }

        for (mapped, expected) in from_command.iter().zip(signature.parameters()) {
            if mapped.name() != expected.name || mapped.type_name() != expected.type_name {
                return Err(CommandError::ArgumentMismatch {
                    message: format!(
                        "{identity}#{method} expects '{}: {}' but the delegate maps '{}: {}'",
                        expected.name,
                        expected.type_name,
                        mapped.name(),
                        mapped.type_name()
                    ),
                    location,
                });
            }
        }

        let definition = CommandDefinition::new(
            self.descriptor.command_id(method),
            parameters,
            signature.has_return_value(),
            delegate,
        );
        self.definitions.insert(method.to_string(), definition);
        Ok(self)
    }

    /// Finish mapping.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::CommandMethodNotMapped`] if any command has no delegate.
    #[track_caller]
    pub fn to_map(self) -> Result<CommandMap, CommandError> {
        let unmapped: Vec<&str> = self
            .descriptor
            .commands()
            .iter()
            .map(|command| command.name())
            .filter(|name| !self.definitions.contains_key(*name))
            .collect();

        if !unmapped.is_empty() {
            return Err(CommandError::CommandMethodNotMapped {
                message: format!(
                    "{} has unmapped commands: {}",
                    self.descriptor.identity(),
                    unmapped.join(", ")
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(CommandMap {
            command_set: self.descriptor.identity().clone(),
            definitions: self.definitions.into_values().collect(),
        })
    }
}

/// A fully mapped command set, ready to register with
/// [`LocalCommandCollection`](crate::commands::LocalCommandCollection).
#[derive(Debug)]
pub struct CommandMap {
    command_set: TypeIdentity,
    definitions: Vec<CommandDefinition>,
}

impl CommandMap {
    pub fn command_set(&self) -> &TypeIdentity {
        &self.command_set
    }

    pub fn definitions(&self) -> &[CommandDefinition] {
        &self.definitions
    }

    pub(crate) fn into_parts(self) -> (TypeIdentity, Vec<CommandDefinition>) {
        (self.command_set, self.definitions)
    }
}
