//! IWBH partner pairing core.
//!
//! Couples pair their devices with a short-lived six-digit code and then
//! see each other's presence. The crate owns the pairing state machine and
//! integrates against three collaborators supplied by the app:
//!
//! - [`store::KeyValueStore`]: durable storage on this device
//! - [`remote::DocumentStore`]: a document store shared by both devices
//! - [`identity::IdentitySource`]: the signed-in user's stable id

pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod pairing;
pub mod remote;
pub mod store;

pub use config::{Config, PairingConfig};
pub use error::{Error, PairingError, Result};
pub use pairing::{PairingCoordinator, PairingEvent, PairingState};
