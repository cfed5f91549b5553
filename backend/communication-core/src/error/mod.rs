pub mod command;
pub mod communication;
pub mod config;
pub mod logger;
pub mod notification;

pub use command::CommandError;
pub use communication::CommunicationError;
pub use config::ConfigError;
pub use logger::LoggerError;
pub use notification::NotificationError;

use models::ModelError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Communication(#[from] CommunicationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logger(#[from] LoggerError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
