use crate::actions::unexpected_payload;
use crate::commands::LocalCommandCollection;
use crate::config::ExchangeConfig;
use crate::endpoints::EndpointInformationStorage;
use crate::error::CoreError;
use crate::protocol::{MessageProcessAction, SendMessages};

use models::{CommandInvocationData, CommunicationMessage, MessageKind, Payload};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use log::{debug, error, warn};

/// Runs a locally implemented command and answers with its result.
///
/// Every outcome produces exactly one response: `CommandInvokedResponse` for commands
/// with a return value, `Success` for the others, and `Failure` for unknown commands,
/// delegate errors, and panics. Endpoints that are not approved are refused without
/// running anything.
pub struct CommandInvokedProcessAction {
    endpoints: Arc<EndpointInformationStorage>,
    commands: Arc<LocalCommandCollection>,
    sender: Arc<dyn SendMessages>,
    config: ExchangeConfig,
}

impl CommandInvokedProcessAction {
    pub fn new(
        endpoints: Arc<EndpointInformationStorage>,
        commands: Arc<LocalCommandCollection>,
        sender: Arc<dyn SendMessages>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            endpoints,
            commands,
            sender,
            config,
        }
    }

    async fn run(
        &self,
        message: &CommunicationMessage,
        invocation: &CommandInvocationData,
    ) -> Payload {
        match self.commands.command_for(&invocation.command) {
            None => {
                warn!(
                    "{} invoked unknown command {}",
                    message.sender, invocation.command
                );
                Payload::Failure {
                    error: format!("Command {} is not registered", invocation.command),
                }
            }
            Some(command) => {
                let outcome = AssertUnwindSafe(command.invoke(
                    &message.sender,
                    message.id,
                    &invocation.parameters,
                ))
                .catch_unwind()
                .await;

                match outcome {
                    Ok(Ok(Some(result))) => Payload::CommandInvokedResponse { result },
                    Ok(Ok(None)) => Payload::Success,
                    Ok(Err(e)) => {
                        warn!("Command {} failed: {e}", invocation.command);
                        Payload::Failure {
                            error: e.to_string(),
                        }
                    }
                    Err(_) => {
                        error!("Command {} panicked", invocation.command);
                        Payload::Failure {
                            error: format!("Command {} panicked", invocation.command),
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl MessageProcessAction for CommandInvokedProcessAction {
    fn message_type_to_process(&self) -> MessageKind {
        MessageKind::CommandInvoked
    }

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError> {
        let Payload::CommandInvoked(invocation) = &message.payload else {
            return Err(unexpected_payload(MessageKind::CommandInvoked, &message.payload));
        };

        let payload = if self.endpoints.can_communicate_with_endpoint(&message.sender) {
            self.run(&message, invocation).await
        } else {
            warn!(
                "{} invoked {} without being connected",
                message.sender, invocation.command
            );
            Payload::Failure {
                error: format!("{} is not connected", message.sender),
            }
        };

        debug!(
            "Answering {} from {} with {:?}",
            invocation.command,
            message.sender,
            payload.kind()
        );
        let response = CommunicationMessage::response_to(
            self.sender.local_endpoint().clone(),
            message.id,
            payload,
        );
        if let Err(e) = self
            .sender
            .send_message(&message.sender, response, self.config.max_retries)
            .await
        {
            // The invoker's own timeout reports the loss
            error!(
                "Could not answer {} from {}: {e}",
                invocation.command, message.sender
            );
        }
        Ok(())
    }
}
