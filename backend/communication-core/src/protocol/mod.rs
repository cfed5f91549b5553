pub mod connection;
pub mod handler;
pub mod sender;
pub mod transport;

pub use connection::EndpointConnectionConductor;
pub use handler::{MessageHandler, MessageProcessAction};
pub use sender::MessageSender;
pub use transport::{MessageTransport, SendMessages};
