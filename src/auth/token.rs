//! Token value types.

pub mod secret;
pub mod state;
