//! Protocol core for peer-to-peer communication between endpoints.
//!
//! Endpoints connect, exchange the subjects they provide and require, and then invoke
//! each other's commands and subscribe to each other's notifications through proxies.
//! The transport is supplied by the host through [`protocol::MessageTransport`].

pub mod actions;
pub mod commands;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod interaction;
pub mod layer;
pub mod logger;
pub mod notifications;
pub mod protocol;

pub use config::{CommunicationConfig, ExchangeConfig};
pub use error::{
    CommandError, CommunicationError, ConfigError, CoreError, LoggerError, NotificationError,
};
pub use layer::CommunicationLayer;

use models::Version;

/// Version advertised in every connect. Endpoints with a different major version are refused.
pub const PROTOCOL_VERSION: Version = Version::new(1, 0, 0);
