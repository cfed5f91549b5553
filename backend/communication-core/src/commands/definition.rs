//! Locally implemented commands and how their arguments are assembled.

use crate::error::CommandError;

use models::{CommandId, CommandParameterValue, EndpointId, ErrorLocation, MessageId};

use std::any::type_name;
use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Where the value of a delegate parameter comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandParameterOrigin {
    /// Sent by the invoking endpoint, matched by name.
    FromCommand,
    /// Id of the invoking endpoint.
    InvokingEndpointId,
    /// Id of the invocation message.
    InvokingMessageId,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParameterDefinition {
    type_name: &'static str,
    name: String,
    origin: CommandParameterOrigin,
}

impl CommandParameterDefinition {
    pub fn new(type_name: &'static str, name: impl Into<String>, origin: CommandParameterOrigin) -> Self {
        Self {
            type_name,
            name: name.into(),
            origin,
        }
    }

    pub fn from_command<T: Serialize + DeserializeOwned>(name: impl Into<String>) -> Self {
        Self::new(type_name::<T>(), name, CommandParameterOrigin::FromCommand)
    }

    pub fn invoking_endpoint(name: impl Into<String>) -> Self {
        Self::new(
            type_name::<EndpointId>(),
            name,
            CommandParameterOrigin::InvokingEndpointId,
        )
    }

    pub fn invoking_message(name: impl Into<String>) -> Self {
        Self::new(
            type_name::<MessageId>(),
            name,
            CommandParameterOrigin::InvokingMessageId,
        )
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> CommandParameterOrigin {
        self.origin
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationArgument {
    Value(Value),
    Endpoint(EndpointId),
    Message(MessageId),
}

/// Arguments handed to a delegate, in the order of its parameter definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationArguments {
    arguments: Vec<InvocationArgument>,
}

impl InvocationArguments {
    pub fn new(arguments: Vec<InvocationArgument>) -> Self {
        Self { arguments }
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    #[track_caller]
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> Result<T, CommandError> {
        match self.arguments.get(index) {
            Some(InvocationArgument::Value(value)) => Ok(serde_json::from_value(value.clone())?),
            other => Err(mismatch(index, "a command value", other)),
        }
    }

    #[track_caller]
    pub fn endpoint(&self, index: usize) -> Result<&EndpointId, CommandError> {
        match self.arguments.get(index) {
            Some(InvocationArgument::Endpoint(endpoint)) => Ok(endpoint),
            other => Err(mismatch(index, "the invoking endpoint", other)),
        }
    }

    #[track_caller]
    pub fn message(&self, index: usize) -> Result<MessageId, CommandError> {
        match self.arguments.get(index) {
            Some(InvocationArgument::Message(message)) => Ok(*message),
            other => Err(mismatch(index, "the invoking message", other)),
        }
    }
}

#[track_caller]
fn mismatch(index: usize, expected: &str, found: Option<&InvocationArgument>) -> CommandError {
    CommandError::ArgumentMismatch {
        message: format!("Argument {index} is not {expected}: {found:?}"),
        location: ErrorLocation::from(Location::caller()),
    }
}

pub type CommandResult = Result<Option<Value>, CommandError>;

pub type CommandDelegate =
    Arc<dyn Fn(InvocationArguments) -> BoxFuture<'static, CommandResult> + Send + Sync>;

/// Wrap an async closure as a [`CommandDelegate`].
pub fn command_delegate<F, Fut>(delegate: F) -> CommandDelegate
where
    F: Fn(InvocationArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    Arc::new(move |arguments| delegate(arguments).boxed())
}

pub struct CommandDefinition {
    id: CommandId,
    parameters: Vec<CommandParameterDefinition>,
    has_return_value: bool,
    delegate: CommandDelegate,
}

impl Debug for CommandDefinition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("CommandDefinition")
            .field("id", &self.id)
            .field("parameters", &self.parameters)
            .field("has_return_value", &self.has_return_value)
            .finish_non_exhaustive()
    }
}

impl CommandDefinition {
    pub fn new(
        id: CommandId,
        parameters: Vec<CommandParameterDefinition>,
        has_return_value: bool,
        delegate: CommandDelegate,
    ) -> Self {
        Self {
            id,
            parameters,
            has_return_value,
            delegate,
        }
    }

    pub fn id(&self) -> &CommandId {
        &self.id
    }

    pub fn parameters(&self) -> &[CommandParameterDefinition] {
        &self.parameters
    }

    pub fn has_return_value(&self) -> bool {
        self.has_return_value
    }

    /// Assemble the delegate's arguments and run it.
    ///
    /// Commands with a return value always produce `Some`, using `null` when the
    /// delegate returned nothing. Commands without one always produce `None`.
    ///
    /// # Errors
    ///
    /// - [`CommandError::InvalidParameterOrigin`] if any parameter has an unknown origin
    /// - [`CommandError::MissingParameter`] if a command parameter was not sent
    /// - whatever the delegate returns
    pub async fn invoke(
        &self,
        calling_endpoint: &EndpointId,
        calling_message: MessageId,
        values: &[CommandParameterValue],
    ) -> CommandResult {
        let arguments = self.assemble_arguments(calling_endpoint, calling_message, values)?;
        let result = (self.delegate)(arguments).await?;

        if self.has_return_value {
            Ok(Some(result.unwrap_or(Value::Null)))
        } else {
            Ok(None)
        }
    }

    fn assemble_arguments(
        &self,
        calling_endpoint: &EndpointId,
        calling_message: MessageId,
        values: &[CommandParameterValue],
    ) -> Result<InvocationArguments, CommandError> {
        if let Some(parameter) = self
            .parameters
            .iter()
            .find(|parameter| parameter.origin == CommandParameterOrigin::Unknown)
        {
            return Err(self.unknown_origin(parameter));
        }

        let mut arguments = Vec::with_capacity(self.parameters.len());
        for parameter in &self.parameters {
            let argument = match parameter.origin {
                CommandParameterOrigin::FromCommand => {
                    let value = values
                        .iter()
                        .find(|value| value.name == parameter.name)
                        .ok_or_else(|| CommandError::MissingParameter {
                            message: format!(
                                "{} was invoked without parameter '{}'",
                                self.id, parameter.name
                            ),
                            location: ErrorLocation::from(Location::caller()),
                        })?;
                    InvocationArgument::Value(value.value.clone())
                }
                CommandParameterOrigin::InvokingEndpointId => {
                    InvocationArgument::Endpoint(calling_endpoint.clone())
                }
                CommandParameterOrigin::InvokingMessageId => {
                    InvocationArgument::Message(calling_message)
                }
                CommandParameterOrigin::Unknown => return Err(self.unknown_origin(parameter)),
            };
            arguments.push(argument);
        }

        Ok(InvocationArguments::new(arguments))
    }

    #[track_caller]
    fn unknown_origin(&self, parameter: &CommandParameterDefinition) -> CommandError {
        CommandError::InvalidParameterOrigin {
            message: format!(
                "Parameter '{}' of {} has no known origin",
                parameter.name, self.id
            ),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
