//! Token state, client credentials, and the token lifecycle manager.

pub mod credentials;
pub mod manager;
pub mod token;

pub use credentials::*;
pub use manager::*;
pub use token::{secret::*, state::*};
