use crate::commands::definition::CommandDefinition;
use crate::commands::mapper::CommandMap;
use crate::error::CommandError;
use crate::interaction::CommunicationDescriptionStorage;

use models::{CommandId, ErrorLocation};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};

use log::info;

/// Commands this endpoint implements, keyed by command id.
#[derive(Debug)]
pub struct LocalCommandCollection {
    commands: RwLock<HashMap<CommandId, Arc<CommandDefinition>>>,
    descriptions: Arc<CommunicationDescriptionStorage>,
}

impl LocalCommandCollection {
    pub fn new(descriptions: Arc<CommunicationDescriptionStorage>) -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
            descriptions,
        }
    }

    /// Register every command of a mapped command set.
    ///
    /// Nothing is registered if any of the commands already exists.
    pub fn register(&self, map: CommandMap) -> Result<(), CommandError> {
        let (command_set, definitions) = map.into_parts();
        let mut commands = self.commands.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(duplicate) = definitions
            .iter()
            .find(|definition| commands.contains_key(definition.id()))
        {
            return Err(CommandError::DuplicateCommand {
                message: format!("{} is already registered", duplicate.id()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let count = definitions.len();
        for definition in definitions {
            commands.insert(definition.id().clone(), Arc::new(definition));
        }
        drop(commands);

        self.descriptions.register_command_set(command_set.clone());
        info!("Registered {count} commands for {command_set}");
        Ok(())
    }

    pub fn command_for(&self, id: &CommandId) -> Option<Arc<CommandDefinition>> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &CommandId) -> bool {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}
