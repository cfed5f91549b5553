//! Test helpers for layer-to-layer integration tests.
//!
//! This module provides:
//! - An in-process loopback network standing in for a real channel
//! - Peers wired to that network
//! - A thermostat command set and notification set shared by every peer

use communication_core::commands::{
    CommandMapper, CommandParameterDefinition, CommandProxy, CommandSet, CommandSetDescriptor,
    CommandSignature, command_delegate, to_argument,
};
use communication_core::notifications::{
    NotificationEvent, NotificationMap, NotificationProxy, NotificationSet,
    NotificationSetDescriptor, NotificationSignature, NotificationSubscription,
};
use communication_core::{
    CommandError, CommunicationConfig, CommunicationError, CommunicationLayer, ExchangeConfig,
    NotificationError,
};
use communication_core::protocol::MessageTransport;

use models::{
    ChannelConnectionInformation, ChannelConnectionInformationBuilder, ChannelType,
    CommunicationMessage, CommunicationSubject, EndpointId, ErrorLocation, TypeIdentity, Version,
};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const CLIMATE: &str = "climate";
pub const THERMOSTAT: &str = "integration.Thermostat";
pub const THERMOSTAT_EVENTS: &str = "integration.ThermostatEvents";

// ============================================
// LOOPBACK NETWORK
// ============================================

/// Routes messages between layers in the same process.
///
/// Each delivery is processed on its own task, like a real transport handing
/// messages to the layer as they arrive.
#[derive(Default)]
pub struct LoopbackNetwork {
    layers: RwLock<HashMap<EndpointId, Weak<CommunicationLayer>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn attach(&self, layer: &Arc<CommunicationLayer>) {
        self.layers
            .write()
            .unwrap()
            .insert(layer.id().clone(), Arc::downgrade(layer));
    }
}

struct LoopbackTransport {
    network: Arc<LoopbackNetwork>,
}

#[async_trait]
impl MessageTransport for LoopbackTransport {
    async fn send(
        &self,
        endpoint: &EndpointId,
        message: &CommunicationMessage,
    ) -> Result<(), CommunicationError> {
        let layer = self
            .network
            .layers
            .read()
            .unwrap()
            .get(endpoint)
            .and_then(Weak::upgrade);

        let Some(layer) = layer else {
            return Err(CommunicationError::Transport {
                message: format!("{endpoint} is not on the loopback network"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let message = message.clone();
        tokio::spawn(async move {
            layer.process_message(message).await;
        });
        Ok(())
    }
}

pub fn connection(id: &str) -> ChannelConnectionInformation {
    ChannelConnectionInformationBuilder::default()
        .with_id(EndpointId::new(id))
        .with_channel_type(ChannelType::TcpIp)
        .with_message_address(format!("net.tcp://localhost:9100/{id}"))
        .build()
        .expect("Failed to build connection information")
}

fn fast_config() -> CommunicationConfig {
    let exchange = ExchangeConfig::new(2_000, 1);
    CommunicationConfig {
        protocol: exchange,
        handshake: exchange,
        commands: exchange,
        notifications: exchange,
        ..CommunicationConfig::default()
    }
}

/// Create a started layer for `id` attached to `network`.
pub fn peer(network: &Arc<LoopbackNetwork>, id: &str) -> Arc<CommunicationLayer> {
    let layer = Arc::new(CommunicationLayer::new(
        connection(id),
        fast_config(),
        Arc::new(LoopbackTransport {
            network: Arc::clone(network),
        }),
    ));
    network.attach(&layer);
    layer.start();
    layer
}

/// Poll `condition` until it holds or `timeout` expires.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ============================================
// THERMOSTAT
// ============================================

pub struct ThermostatCommands {
    proxy: CommandProxy,
}

impl CommandSet for ThermostatCommands {
    fn descriptor() -> CommandSetDescriptor {
        CommandSetDescriptor::new(THERMOSTAT)
            .with_command(
                CommandSignature::new("set_target")
                    .parameter::<f64>("celsius")
                    .returns::<f64>(),
            )
            .with_command(CommandSignature::new("calibrate"))
    }

    fn from_proxy(proxy: CommandProxy) -> Self {
        Self { proxy }
    }
}

impl ThermostatCommands {
    /// Returns the previous target.
    pub async fn set_target(&self, celsius: f64) -> Result<f64, CommandError> {
        self.proxy
            .invoke_for("set_target", vec![to_argument(&celsius)?])
            .await
    }

    pub async fn calibrate(&self) -> Result<(), CommandError> {
        self.proxy.invoke_without_result("calibrate", Vec::new()).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetChanged {
    pub previous: f64,
    pub celsius: f64,
}

pub struct ThermostatEvents {
    proxy: NotificationProxy,
}

impl NotificationSet for ThermostatEvents {
    fn descriptor() -> NotificationSetDescriptor {
        NotificationSetDescriptor::new(THERMOSTAT_EVENTS)
            .with_notification(NotificationSignature::new::<TargetChanged>("target_changed"))
    }

    fn from_proxy(proxy: NotificationProxy) -> Self {
        Self { proxy }
    }
}

impl ThermostatEvents {
    pub async fn on_target_changed<F>(
        &self,
        listener: F,
    ) -> Result<NotificationSubscription, NotificationError>
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.proxy.subscribe("target_changed", listener).await
    }
}

/// What a provider registers.
pub struct Provision {
    pub commands: bool,
}

/// Advertise the thermostat under the climate subject and, if asked, implement it.
///
/// The implementation starts at 18 degrees and raises `target_changed` on every change.
pub fn provide_thermostat(layer: &CommunicationLayer, provision: Provision) {
    let subject = CommunicationSubject::new(CLIMATE);
    let subjects = layer.subjects();
    subjects.register_command_for_provided_subject_group(
        &subject,
        TypeIdentity::new(THERMOSTAT),
        Version::new(1, 0, 0),
        "thermostat",
    );
    subjects.register_notification_for_provided_subject_group(
        &subject,
        TypeIdentity::new(THERMOSTAT_EVENTS),
        Version::new(1, 0, 0),
        "thermostat",
    );

    let events = NotificationMap::for_set::<ThermostatEvents>()
        .expect("Failed to build notification map");
    layer
        .local_notifications()
        .register(&events)
        .expect("Failed to register notifications");

    if !provision.commands {
        return;
    }

    let target_changed = events
        .definition("target_changed")
        .expect("Missing target_changed");
    let target = Arc::new(Mutex::new(18.0_f64));
    let mut mapper =
        CommandMapper::<ThermostatCommands>::new().expect("Thermostat is not a command set");
    mapper
        .map(
            "set_target",
            vec![CommandParameterDefinition::from_command::<f64>("celsius")],
            command_delegate(move |arguments| {
                let target = Arc::clone(&target);
                let target_changed = Arc::clone(&target_changed);
                async move {
                    let celsius: f64 = arguments.value(0)?;
                    let previous = std::mem::replace(&mut *target.lock().unwrap(), celsius);
                    target_changed
                        .raise(&TargetChanged { previous, celsius })
                        .map_err(|e| CommandError::InvocationFailed {
                            message: e.to_string(),
                            location: ErrorLocation::from(Location::caller()),
                        })?;
                    Ok(Some(json!(previous)))
                }
            }),
        )
        .expect("Failed to map set_target")
        .map(
            "calibrate",
            Vec::new(),
            command_delegate(|_| async { Ok(None) }),
        )
        .expect("Failed to map calibrate");
    layer
        .local_commands()
        .register(mapper.to_map().expect("Thermostat is not fully mapped"))
        .expect("Failed to register commands");
}

/// Require the thermostat under the climate subject and make its proxies known.
pub fn require_thermostat(layer: &CommunicationLayer) {
    let subject = CommunicationSubject::new(CLIMATE);
    layer.subjects().register_command_for_required_subject_group(
        &subject,
        TypeIdentity::new(THERMOSTAT),
        Version::new(1, 0, 0),
        "thermostat",
    );
    layer.subjects().register_notification_for_required_subject_group(
        &subject,
        TypeIdentity::new(THERMOSTAT_EVENTS),
        Version::new(1, 0, 0),
        "thermostat",
    );
    layer
        .known_command_sets()
        .register::<ThermostatCommands>()
        .expect("Thermostat is not a command set");
    layer
        .known_notification_sets()
        .register::<ThermostatEvents>()
        .expect("ThermostatEvents is not a notification set");
}

/// Connect `consumer` to `provider` and wait until the consumer holds thermostat proxies.
pub async fn connect_and_wait_for_thermostat(
    consumer: &CommunicationLayer,
    provider: &CommunicationLayer,
) -> ThermostatCommands {
    consumer
        .connect_to(provider.local_connection().clone())
        .await
        .expect("Connect was refused");

    let hub = Arc::clone(consumer.command_hub());
    let provider_id = provider.id().clone();
    assert!(
        wait_until(
            move || hub.has_command_for(&provider_id, &TypeIdentity::new(THERMOSTAT)),
            Duration::from_secs(5)
        )
        .await,
        "Handshake did not produce thermostat proxies"
    );

    consumer
        .command_hub()
        .commands_for::<ThermostatCommands>(provider.id())
        .expect("Thermostat proxy missing")
}
