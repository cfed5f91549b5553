//! Composition root for one local endpoint.
//!
//! [`CommunicationLayer`] owns every component of the protocol core and registers the
//! message actions. The host supplies a [`MessageTransport`] for outgoing messages and
//! feeds incoming messages to [`CommunicationLayer::process_message`], one task per
//! message.

use crate::actions::{
    CommandInvokedProcessAction, EndpointConnectProcessAction, EndpointDisconnectProcessAction,
    EndpointInteractionInformationProcessAction, NotificationRaisedProcessAction,
    RegisterForNotificationProcessAction, UnregisterFromNotificationProcessAction,
};
use crate::commands::{
    CommandProxyBuilder, KnownCommandSets, LocalCommandCollection, RemoteCommandHub,
};
use crate::config::CommunicationConfig;
use crate::endpoints::{EndpointEvent, EndpointInformationStorage};
use crate::error::CommunicationError;
use crate::interaction::{
    CommunicationDescriptionStorage, InteractionHandshakeConductor,
    InteractionSubjectGroupStorage,
};
use crate::notifications::{
    KnownNotificationSets, LocalNotificationCollection, NotificationProxyBuilder,
    RemoteNotificationHub,
};
use crate::protocol::{
    EndpointConnectionConductor, MessageHandler, MessageProcessAction, MessageSender,
    MessageTransport, SendMessages,
};
use crate::PROTOCOL_VERSION;

use models::{
    ChannelConnectionInformation, CommunicationDescription, CommunicationMessage, EndpointId,
};

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::spawn as TokioSpawn;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub struct CommunicationLayer {
    local_connection: ChannelConnectionInformation,
    config: CommunicationConfig,
    endpoints: Arc<EndpointInformationStorage>,
    subjects: Arc<InteractionSubjectGroupStorage>,
    descriptions: Arc<CommunicationDescriptionStorage>,
    handler: Arc<MessageHandler>,
    sender: Arc<dyn SendMessages>,
    local_commands: Arc<LocalCommandCollection>,
    local_notifications: Arc<LocalNotificationCollection>,
    known_command_sets: Arc<KnownCommandSets>,
    known_notification_sets: Arc<KnownNotificationSets>,
    command_hub: Arc<RemoteCommandHub>,
    notification_hub: Arc<RemoteNotificationHub>,
    connections: Arc<EndpointConnectionConductor>,
    interaction: Arc<InteractionHandshakeConductor>,
}

impl CommunicationLayer {
    /// Wire the protocol core for `local_connection`.
    ///
    /// Must be called from within a Tokio runtime. Call [`start`](Self::start) before
    /// connecting to any endpoint.
    pub fn new(
        local_connection: ChannelConnectionInformation,
        config: CommunicationConfig,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        let local = local_connection.id().clone();

        let endpoints = Arc::new(EndpointInformationStorage::new());
        let subjects = Arc::new(InteractionSubjectGroupStorage::new());
        let descriptions = Arc::new(CommunicationDescriptionStorage::new(
            PROTOCOL_VERSION,
            Arc::clone(&subjects),
        ));
        let handler = Arc::new(MessageHandler::new());
        let sender: Arc<dyn SendMessages> = Arc::new(MessageSender::new(
            local.clone(),
            transport,
            Arc::clone(&handler),
        ));

        let local_commands = Arc::new(LocalCommandCollection::new(Arc::clone(&descriptions)));
        let local_notifications = Arc::new(LocalNotificationCollection::new(
            Arc::clone(&sender),
            config.notifications,
            Arc::clone(&descriptions),
        ));

        let known_command_sets = Arc::new(KnownCommandSets::new());
        let known_notification_sets = Arc::new(KnownNotificationSets::new());
        let command_hub = Arc::new(RemoteCommandHub::new(
            Arc::clone(&known_command_sets),
            CommandProxyBuilder::new(Arc::clone(&sender), config.commands),
        ));
        let notification_hub = Arc::new(RemoteNotificationHub::new(
            Arc::clone(&known_notification_sets),
            NotificationProxyBuilder::new(Arc::clone(&sender), config.notifications),
        ));

        let connections = Arc::new(EndpointConnectionConductor::new(
            local_connection.clone(),
            Arc::clone(&descriptions),
            Arc::clone(&endpoints),
            Arc::clone(&sender),
            config.protocol,
        ));
        let interaction = Arc::new(InteractionHandshakeConductor::new(
            Arc::clone(&endpoints),
            Arc::clone(&subjects),
            Arc::clone(&command_hub) as _,
            Arc::clone(&notification_hub) as _,
            Arc::clone(&sender),
            config.handshake,
        ));

        let actions: Vec<Arc<dyn MessageProcessAction>> = vec![
            Arc::new(EndpointConnectProcessAction::new(Arc::clone(&connections))),
            Arc::new(EndpointDisconnectProcessAction::new(Arc::clone(&connections))),
            Arc::new(EndpointInteractionInformationProcessAction::new(
                Arc::clone(&interaction),
            )),
            Arc::new(CommandInvokedProcessAction::new(
                Arc::clone(&endpoints),
                Arc::clone(&local_commands),
                Arc::clone(&sender),
                config.commands,
            )),
            Arc::new(RegisterForNotificationProcessAction::new(
                Arc::clone(&endpoints),
                Arc::clone(&local_notifications),
                Arc::clone(&sender),
                config.notifications,
            )),
            Arc::new(UnregisterFromNotificationProcessAction::new(
                Arc::clone(&local_notifications),
                Arc::clone(&sender),
                config.notifications,
            )),
            Arc::new(NotificationRaisedProcessAction::new(Arc::clone(
                &notification_hub,
            ))),
        ];
        for action in actions {
            handler.register_action(action);
        }

        Self {
            local_connection,
            config,
            endpoints,
            subjects,
            descriptions,
            handler,
            sender,
            local_commands,
            local_notifications,
            known_command_sets,
            known_notification_sets,
            command_hub,
            notification_hub,
            connections,
            interaction,
        }
    }

    /// Spawn the task reacting to endpoint connects and disconnects.
    pub fn start(&self) -> JoinHandle<()> {
        info!("Communication layer for {} started", self.id());
        TokioSpawn(watch_endpoint_events(
            self.endpoints.subscribe(),
            EventRoutes {
                endpoints: Arc::clone(&self.endpoints),
                handler: Arc::clone(&self.handler),
                local_notifications: Arc::clone(&self.local_notifications),
                command_hub: Arc::clone(&self.command_hub),
                notification_hub: Arc::clone(&self.notification_hub),
                connections: Arc::clone(&self.connections),
                interaction: Arc::clone(&self.interaction),
            },
        ))
    }

    /// Entry point for every message the transport receives.
    ///
    /// Drive each message on its own task, for example with `tokio::spawn`. Handling a
    /// connect or an interaction message waits for a response that arrives through this
    /// same method, so awaiting messages one after another deadlocks.
    pub async fn process_message(&self, message: CommunicationMessage) {
        self.handler.process_message(message).await;
    }

    pub async fn connect_to(
        &self,
        connection: ChannelConnectionInformation,
    ) -> Result<(), CommunicationError> {
        self.connections.connect_to(connection).await
    }

    pub async fn disconnect_from(&self, endpoint: &EndpointId) {
        self.connections.disconnect_from(endpoint).await;
    }

    pub fn id(&self) -> &EndpointId {
        self.local_connection.id()
    }

    pub fn local_connection(&self) -> &ChannelConnectionInformation {
        &self.local_connection
    }

    pub fn config(&self) -> &CommunicationConfig {
        &self.config
    }

    pub fn description(&self) -> CommunicationDescription {
        self.descriptions.to_description()
    }

    pub fn endpoints(&self) -> &Arc<EndpointInformationStorage> {
        &self.endpoints
    }

    pub fn subjects(&self) -> &Arc<InteractionSubjectGroupStorage> {
        &self.subjects
    }

    pub fn local_commands(&self) -> &Arc<LocalCommandCollection> {
        &self.local_commands
    }

    pub fn local_notifications(&self) -> &Arc<LocalNotificationCollection> {
        &self.local_notifications
    }

    pub fn known_command_sets(&self) -> &Arc<KnownCommandSets> {
        &self.known_command_sets
    }

    pub fn known_notification_sets(&self) -> &Arc<KnownNotificationSets> {
        &self.known_notification_sets
    }

    pub fn command_hub(&self) -> &Arc<RemoteCommandHub> {
        &self.command_hub
    }

    pub fn notification_hub(&self) -> &Arc<RemoteNotificationHub> {
        &self.notification_hub
    }

    pub fn interaction(&self) -> &Arc<InteractionHandshakeConductor> {
        &self.interaction
    }

    pub fn sender(&self) -> &Arc<dyn SendMessages> {
        &self.sender
    }
}

struct EventRoutes {
    endpoints: Arc<EndpointInformationStorage>,
    handler: Arc<MessageHandler>,
    local_notifications: Arc<LocalNotificationCollection>,
    command_hub: Arc<RemoteCommandHub>,
    notification_hub: Arc<RemoteNotificationHub>,
    connections: Arc<EndpointConnectionConductor>,
    interaction: Arc<InteractionHandshakeConductor>,
}

async fn watch_endpoint_events(mut events: Receiver<EndpointEvent>, routes: EventRoutes) {
    loop {
        match events.recv().await {
            Ok(EndpointEvent::Connected { connection, .. }) => {
                let interaction = Arc::clone(&routes.interaction);
                // The handshake waits for a response that arrives through this same layer
                TokioSpawn(async move {
                    interaction.on_endpoint_connected(&connection).await;
                });
            }
            Ok(EndpointEvent::Disconnected { id }) => {
                debug!("Cleaning up after {id}");
                routes.command_hub.on_endpoint_signed_off(&id);
                routes.notification_hub.on_endpoint_signed_off(&id);
                routes.local_notifications.unregister_endpoint(&id);
                // A reconnect may already be under way
                if routes.endpoints.has_been_contacted(&id) {
                    debug!("{id} is connecting again, keeping its connection state");
                    continue;
                }
                routes.handler.on_endpoint_signed_off(&id);
                routes.interaction.forget(&id);
                routes.connections.forget(&id);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Endpoint event watcher skipped {skipped} events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
