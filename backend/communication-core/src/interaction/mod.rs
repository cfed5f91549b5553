pub mod descriptions;
pub mod handshake;
pub mod subject_storage;

pub use descriptions::CommunicationDescriptionStorage;
pub use handshake::{
    HandshakeResolution, HandshakeState, InteractionHandshakeConductor, NegotiatedSets, negotiate,
};
pub use subject_storage::InteractionSubjectGroupStorage;
