pub mod error_location;
pub mod model_error;
