//! Fakes and fixture types shared by the unit tests.

use crate::commands::{
    CommandProxy, CommandSet, CommandSetDescriptor, CommandSignature, to_argument,
};
use crate::endpoints::EndpointInformationStorage;
use crate::error::{CommandError, CommunicationError, NotificationError};
use crate::notifications::{
    NotificationEvent, NotificationProxy, NotificationSet, NotificationSetDescriptor,
    NotificationSignature, NotificationSubscription,
};
use crate::protocol::SendMessages;

use models::{
    ChannelConnectionInformation, ChannelConnectionInformationBuilder, ChannelType,
    CommunicationDescription, CommunicationMessage, EndpointId, ErrorLocation, MessageKind,
    Payload, Version,
};

use std::panic::Location;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Responder =
    Box<dyn Fn(&EndpointId, &CommunicationMessage) -> Result<Payload, CommunicationError> + Send + Sync>;

/// [`SendMessages`] fake that records every message and answers waits through a responder.
pub struct RecordingSender {
    local: EndpointId,
    sent: Mutex<Vec<(EndpointId, CommunicationMessage)>>,
    responder: Responder,
}

impl RecordingSender {
    /// Answers every wait with `Success`.
    pub fn new(local: &str) -> Arc<Self> {
        Self::with_responder(local, |_, _| Ok(Payload::Success))
    }

    pub fn with_responder<F>(local: &str, responder: F) -> Arc<Self>
    where
        F: Fn(&EndpointId, &CommunicationMessage) -> Result<Payload, CommunicationError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            local: EndpointId::new(local),
            sent: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    pub fn sent(&self) -> Vec<(EndpointId, CommunicationMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_kind(&self, kind: MessageKind) -> Vec<(EndpointId, CommunicationMessage)> {
        self.sent()
            .into_iter()
            .filter(|(_, message)| message.kind() == kind)
            .collect()
    }

    fn record(&self, endpoint: &EndpointId, message: &CommunicationMessage) {
        self.sent
            .lock()
            .unwrap()
            .push((endpoint.clone(), message.clone()));
    }
}

#[async_trait]
impl SendMessages for RecordingSender {
    fn local_endpoint(&self) -> &EndpointId {
        &self.local
    }

    async fn send_message(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
        _max_retries: u32,
    ) -> Result<(), CommunicationError> {
        self.record(endpoint, &message);
        Ok(())
    }

    async fn send_message_and_wait_for_response(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
        _max_retries: u32,
        _timeout: Duration,
    ) -> Result<CommunicationMessage, CommunicationError> {
        self.record(endpoint, &message);
        let payload = (self.responder)(endpoint, &message)?;
        Ok(CommunicationMessage::response_to(
            endpoint.clone(),
            message.id,
            payload,
        ))
    }
}

pub fn timeout_error() -> CommunicationError {
    CommunicationError::Timeout {
        message: "no response".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

pub fn connection(id: &str) -> ChannelConnectionInformation {
    ChannelConnectionInformationBuilder::default()
        .with_id(EndpointId::new(id))
        .with_channel_type(ChannelType::TcpIp)
        .with_message_address(format!("net.tcp://localhost:9000/{id}"))
        .build()
        .unwrap()
}

/// Endpoint store in which every endpoint of `ids` is approved.
pub fn approved_endpoints(ids: &[&str]) -> Arc<EndpointInformationStorage> {
    let endpoints = Arc::new(EndpointInformationStorage::new());
    for id in ids {
        let endpoint = EndpointId::new(*id);
        endpoints.try_add(&endpoint, connection(id));
        endpoints.try_start_approval(&endpoint, CommunicationDescription::new(Version::new(1, 0, 0)));
        endpoints.try_complete_approval(&endpoint);
    }
    endpoints
}

/// Poll `condition` until it holds or `timeout` expires.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// ============================================
// FIXTURE COMMAND AND NOTIFICATION SETS
// ============================================

pub const CALCULATOR: &str = "tests.Calculator";
pub const TEMPERATURE: &str = "tests.Temperature";

pub struct CalculatorCommands {
    proxy: CommandProxy,
}

impl CommandSet for CalculatorCommands {
    fn descriptor() -> CommandSetDescriptor {
        CommandSetDescriptor::new(CALCULATOR)
            .with_command(
                CommandSignature::new("add")
                    .parameter::<i64>("left")
                    .parameter::<i64>("right")
                    .returns::<i64>(),
            )
            .with_command(CommandSignature::new("reset"))
    }

    fn from_proxy(proxy: CommandProxy) -> Self {
        Self { proxy }
    }
}

impl CalculatorCommands {
    pub async fn add(&self, left: i64, right: i64) -> Result<i64, CommandError> {
        self.proxy
            .invoke_for("add", vec![to_argument(&left)?, to_argument(&right)?])
            .await
    }

    pub async fn reset(&self) -> Result<(), CommandError> {
        self.proxy.invoke_without_result("reset", Vec::new()).await
    }

    pub fn proxy(&self) -> &CommandProxy {
        &self.proxy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureChanged {
    pub celsius: f64,
}

pub struct TemperatureNotifications {
    proxy: NotificationProxy,
}

impl NotificationSet for TemperatureNotifications {
    fn descriptor() -> NotificationSetDescriptor {
        NotificationSetDescriptor::new(TEMPERATURE)
            .with_notification(NotificationSignature::new::<TemperatureChanged>("changed"))
    }

    fn from_proxy(proxy: NotificationProxy) -> Self {
        Self { proxy }
    }
}

impl TemperatureNotifications {
    pub async fn on_changed<F>(&self, listener: F) -> Result<NotificationSubscription, NotificationError>
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.proxy.subscribe("changed", listener).await
    }

    pub fn proxy(&self) -> &NotificationProxy {
        &self.proxy
    }
}
