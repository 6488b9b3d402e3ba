//! Identity of the local user.
//!
//! The pairing core never authenticates anyone. It only needs a stable user
//! id and a display name from whatever sign-in layer the app uses.

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::remote::validate_name;

/// Stable identity supplied at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

impl Identity {
    /// Build an identity, rejecting blank user ids and ids the shared
    /// store cannot address.
    ///
    /// A blank display name falls back to the user id.
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let user_id = user_id.into();
        // The id names documents in the shared store.
        if user_id.trim().is_empty() || validate_name("user", &user_id).is_err() {
            return Err(IdentityError::InvalidUserId(user_id));
        }
        let display_name = display_name.into();
        let display_name = if display_name.trim().is_empty() {
            user_id.clone()
        } else {
            display_name
        };
        Ok(Self {
            user_id,
            display_name,
        })
    }
}

/// Supplies the signed-in user's identity.
pub trait IdentitySource: Send + Sync {
    fn identity(&self) -> Result<Identity, IdentityError>;
}

/// An identity fixed at construction time.
#[derive(Debug, Clone)]
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self(identity)
    }
}

impl IdentitySource for StaticIdentity {
    fn identity(&self) -> Result<Identity, IdentityError> {
        Ok(self.0.clone())
    }
}
