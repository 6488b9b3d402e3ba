//! Partner pairing.
//!
//! One partner generates a six-digit code valid for fifteen minutes; the
//! other redeems it on their own device. Redemption consumes the code
//! exactly once, tells the owner through a pairing notice, and both sides
//! then follow each other's presence until one of them unpairs.

mod code;
mod coordinator;
mod model;
mod state;
mod tasks;

pub use code::{CODE_LENGTH, PairCode};
pub use coordinator::{CodeSource, PROFILE_KEY, PairingCoordinator};
pub use model::{
    LoveLanguage, PairingCodeRecord, PairingNotice, PartnerInfo, ProfileUpdate, UserProfile,
};
pub use state::{PairingEvent, PairingState, PendingCode};
