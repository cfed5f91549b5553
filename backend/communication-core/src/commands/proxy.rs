//! Client side of a remote command set.
//!
//! A [`CommandProxy`] turns a method name and its arguments into a `CommandInvoked`
//! message and waits for the answer. Typed clients implementing
//! [`CommandSet`](crate::commands::CommandSet) wrap a proxy and expose ordinary async
//! methods.

use crate::commands::descriptor::{
    CommandSet, CommandSetDescriptor, verify_that_type_is_a_correct_command_set,
};
use crate::config::ExchangeConfig;
use crate::error::{CommandError, CommunicationError};
use crate::protocol::SendMessages;

use models::{
    CommandInvocationData, CommandParameterValue, CommunicationMessage, EndpointId, ErrorLocation,
    Payload, TypeIdentity,
};

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

struct CommandProxyInner {
    endpoint: EndpointId,
    descriptor: CommandSetDescriptor,
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
    signed_off: AtomicBool,
}

/// Proxy for one command set on one remote endpoint.
///
/// Clones share state: once the endpoint signs off, every clone fails to send.
#[derive(Clone)]
pub struct CommandProxy {
    inner: Arc<CommandProxyInner>,
}

impl CommandProxy {
    pub fn endpoint(&self) -> &EndpointId {
        &self.inner.endpoint
    }

    pub fn command_set(&self) -> &TypeIdentity {
        self.inner.descriptor.identity()
    }

    pub fn is_signed_off(&self) -> bool {
        self.inner.signed_off.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_off(&self) {
        self.inner.signed_off.store(true, Ordering::SeqCst);
    }

    /// Invoke `method` on the remote endpoint.
    ///
    /// Returns `Some(value)` for commands with a return value and `None` otherwise.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownMethod`] or [`CommandError::ArgumentMismatch`] for a call
    ///   that does not fit the command set
    /// - [`CommandError::Communication`] if the message could not be delivered or answered
    /// - [`CommandError::InvocationFailed`] if the remote reported a failure
    pub async fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<Option<Value>, CommandError> {
        let inner = &self.inner;

        if self.is_signed_off() {
            return Err(CommandError::Communication(CommunicationError::FailedToSend {
                message: format!("{} has signed off", inner.endpoint),
                location: ErrorLocation::from(Location::caller()),
                source: None,
            }));
        }

        let signature =
            inner
                .descriptor
                .command(method)
                .ok_or_else(|| CommandError::UnknownMethod {
                    message: format!("{} has no command '{method}'", inner.descriptor.identity()),
                    location: ErrorLocation::from(Location::caller()),
                })?;

        if arguments.len() != signature.parameters().len() {
            return Err(CommandError::ArgumentMismatch {
                message: format!(
                    "{}#{method} takes {} arguments, {} given",
                    inner.descriptor.identity(),
                    signature.parameters().len(),
                    arguments.len()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let command = inner.descriptor.command_id(method);
        let parameters = signature
            .parameters()
            .iter()
            .zip(arguments)
            .map(|(parameter, value)| CommandParameterValue {
                name: parameter.name.clone(),
                value,
            })
            .collect();

        let message = CommunicationMessage::new(
            inner.sender.local_endpoint().clone(),
            Payload::CommandInvoked(CommandInvocationData {
                command: command.clone(),
                parameters,
            }),
        );

        debug!("Invoking {command} on {}", inner.endpoint);
        let response = inner
            .sender
            .send_message_and_wait_for_response(
                &inner.endpoint,
                message,
                inner.config.max_retries,
                inner.config.wait_for_response_timeout(),
            )
            .await?;

        match response.payload {
            Payload::CommandInvokedResponse { result } => Ok(Some(result)),
            Payload::Success => Ok(None),
            Payload::Failure { error } => Err(CommandError::InvocationFailed {
                message: format!("{command} failed on {}: {error}", inner.endpoint),
                location: ErrorLocation::from(Location::caller()),
            }),
            other => Err(CommandError::UnexpectedResponse {
                message: format!("{command} was answered with {:?}", other.kind()),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Invoke `method` and deserialize its return value.
    pub async fn invoke_for<R: DeserializeOwned>(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<R, CommandError> {
        let value = self.invoke(method, arguments).await?.unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    pub async fn invoke_without_result(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<(), CommandError> {
        self.invoke(method, arguments).await.map(|_| ())
    }
}

/// Serialize one argument for [`CommandProxy::invoke`].
#[track_caller]
pub fn to_argument<T: Serialize>(value: &T) -> Result<Value, CommandError> {
    Ok(serde_json::to_value(value)?)
}

/// Creates command proxies that send through one [`SendMessages`] implementation.
#[derive(Clone)]
pub struct CommandProxyBuilder {
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
}

impl CommandProxyBuilder {
    pub fn new(sender: Arc<dyn SendMessages>, config: ExchangeConfig) -> Self {
        Self { sender, config }
    }

    /// Build a typed client for `T` on `endpoint`.
    pub fn proxy_connecting_to<T: CommandSet>(&self, endpoint: &EndpointId) -> Result<T, CommandError> {
        let proxy = self.proxy_for_descriptor(endpoint, T::descriptor())?;
        Ok(T::from_proxy(proxy))
    }

    pub fn proxy_for_descriptor(
        &self,
        endpoint: &EndpointId,
        descriptor: CommandSetDescriptor,
    ) -> Result<CommandProxy, CommandError> {
        verify_that_type_is_a_correct_command_set(&descriptor)?;
        Ok(CommandProxy {
            inner: Arc::new(CommandProxyInner {
                endpoint: endpoint.clone(),
                descriptor,
                sender: Arc::clone(&self.sender),
                config: self.config,
                signed_off: AtomicBool::new(false),
            }),
        })
    }
}
