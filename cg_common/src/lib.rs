pub mod helpers;
mod secret;

pub use helpers::{parse_boolean_flag, parse_flag};
pub use secret::{Secret, SecretError};
