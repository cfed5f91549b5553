pub mod storage;

pub use storage::{ApprovalState, EndpointEvent, EndpointInformationStorage};
