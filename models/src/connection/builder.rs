use crate::error::model_error::ModelError;
use crate::{ChannelConnectionInformation, ChannelType, EndpointId, ErrorLocation};

use std::panic::Location;

use url::Url;

/// Builder for validated [`ChannelConnectionInformation`] instances.
#[derive(Debug, Default)]
pub struct ChannelConnectionInformationBuilder {
    id: Option<EndpointId>,
    channel_type: Option<ChannelType>,
    message_address: Option<String>,
    data_address: Option<String>,
}

impl ChannelConnectionInformationBuilder {
    pub fn with_id(mut self, id: EndpointId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_channel_type(mut self, channel_type: ChannelType) -> Self {
        self.channel_type = Some(channel_type);
        self
    }

    pub fn with_message_address(mut self, address: impl Into<String>) -> Self {
        self.message_address = Some(address.into());
        self
    }

    pub fn with_data_address(mut self, address: impl Into<String>) -> Self {
        self.data_address = Some(address.into());
        self
    }

    /// Build the connection information with validation.
    #[track_caller]
    pub fn build(self) -> Result<ChannelConnectionInformation, ModelError> {
        let id = self.id.ok_or_else(|| ModelError::Validation {
            message: String::from("Endpoint id is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if id.as_str().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Endpoint id cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let channel_type = self.channel_type.ok_or_else(|| ModelError::Validation {
            message: String::from("Channel type is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if channel_type == ChannelType::None {
            if self.message_address.is_some() || self.data_address.is_some() {
                return Err(ModelError::Validation {
                    message: format!("Channel type None cannot carry addresses (endpoint {id})"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            return Ok(ChannelConnectionInformation {
                id,
                channel_type,
                message_address: None,
                data_address: None,
            });
        }

        let message_address = self.message_address.ok_or_else(|| ModelError::Validation {
            message: format!("Message address is required for {channel_type:?} channels"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let message_address = parse_address(channel_type, &message_address)?;

        let data_address = match self.data_address {
            Some(address) => Some(parse_address(channel_type, &address)?),
            None => None,
        };

        Ok(ChannelConnectionInformation {
            id,
            channel_type,
            message_address: Some(message_address),
            data_address,
        })
    }
}

#[track_caller]
fn parse_address(channel_type: ChannelType, address: &str) -> Result<Url, ModelError> {
    let url = Url::parse(address).map_err(|e| ModelError::Validation {
        message: format!("Invalid address '{address}': {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    if !channel_type.accepts_scheme(url.scheme()) {
        return Err(ModelError::Validation {
            message: format!(
                "Address scheme '{}' is not compatible with {channel_type:?} channels",
                url.scheme()
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(url)
}
