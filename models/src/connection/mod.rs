//! How to reach an endpoint.

pub mod builder;

use crate::EndpointId;

use serde::{Deserialize, Serialize};
use url::Url;

const NAMED_PIPE_SCHEME: &str = "net.pipe";
const TCP_SCHEME: &str = "net.tcp";
const HTTP_SCHEME: &str = "http";
const HTTPS_SCHEME: &str = "https";

/// Transport family an endpoint listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// The endpoint is known but cannot be addressed.
    None,
    NamedPipe,
    TcpIp,
    Http,
}

impl ChannelType {
    /// Whether an address with the given URL scheme can be served by this channel type.
    pub fn accepts_scheme(&self, scheme: &str) -> bool {
        match self {
            ChannelType::None => false,
            ChannelType::NamedPipe => scheme == NAMED_PIPE_SCHEME,
            ChannelType::TcpIp => scheme == TCP_SCHEME,
            ChannelType::Http => scheme == HTTP_SCHEME || scheme == HTTPS_SCHEME,
        }
    }
}

/// Endpoint id plus the addresses its channel listens on.
///
/// Only constructed through [`builder::ChannelConnectionInformationBuilder`], which rejects
/// channel types that are incompatible with the supplied addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConnectionInformation {
    id: EndpointId,
    channel_type: ChannelType,
    message_address: Option<Url>,
    data_address: Option<Url>,
}

impl ChannelConnectionInformation {
    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    pub fn message_address(&self) -> Option<&Url> {
        self.message_address.as_ref()
    }

    pub fn data_address(&self) -> Option<&Url> {
        self.data_address.as_ref()
    }
}
