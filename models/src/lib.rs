//! Data model for the peer-to-peer communication layer.
//!
//! This crate holds the values that travel between endpoints and the values the
//! protocol core reasons about. Nothing in here talks to the network or keeps
//! shared state.
//!
//! ## Contents
//!
//! - **identity**: endpoint, message, command, notification, subject and type identifiers
//! - **versioning**: interface versions and [`VersionedTypeFallback`] matching
//! - **connection**: [`ChannelConnectionInformation`] and its validating builder
//! - **description**: what an endpoint advertises when it connects
//! - **subjects**: subject groups exchanged during the interaction handshake
//! - **message**: the [`CommunicationMessage`] union handed to and from the transport

pub mod connection;
pub mod description;
pub mod error;
pub mod identity;
pub mod message;
pub mod subjects;
pub mod versioning;


pub use connection::builder::ChannelConnectionInformationBuilder;
pub use connection::{ChannelConnectionInformation, ChannelType};
pub use description::CommunicationDescription;
pub use error::error_location::ErrorLocation;
pub use error::model_error::ModelError;
pub use identity::{
    CommandId, CommunicationSubject, EndpointId, MessageId, NotificationId, TypeIdentity,
};
pub use message::{
    CommandInvocationData, CommandParameterValue, CommunicationMessage, MessageKind,
    NotificationRaisedData, Payload,
};
pub use subjects::{CommunicationSubjectGroup, InteractionConnectionState, InteractionSubjects};
pub use versioning::{Version, VersionedTypeFallback};
