//! Pairing state machine states and the events published on transitions.
//!
//! ```text
//!               generate_code()                 redeem / notice
//!  Unpaired ──► GeneratingCode ──► WaitingForPartner ──────────► Paired
//!     ▲  ▲                              │                           │
//!     │  └──────── expiry timer ────────┘                           │
//!     └───────────────────────────── unpair() ──────────────────────┘
//!
//!  EnteringCode: UI-only sub-state of Unpaired, never persisted.
//!  Failed: a store call failed; any operation may be retried from it.
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::code::PairCode;
use super::model::{PartnerInfo, UserProfile};

/// A code this user generated and is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCode {
    pub code: PairCode,
    pub expires_at: DateTime<Utc>,
}

/// Explicit pairing state of the local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PairingState {
    Unpaired,
    GeneratingCode,
    WaitingForPartner(PendingCode),
    EnteringCode,
    #[serde(rename_all = "camelCase")]
    Paired {
        partner_id: String,
    },
    /// `pending` is a code that is still live despite the failure.
    Failed {
        reason: String,
        pending: Option<PendingCode>,
    },
}

impl PairingState {
    /// Derive the durable state from a restored profile.
    ///
    /// A partner wins over a residual code. The caller is responsible for
    /// expiring a pending code whose deadline has already passed.
    pub fn from_profile(profile: &UserProfile) -> Self {
        if let Some(partner_id) = &profile.partner_id {
            return PairingState::Paired {
                partner_id: partner_id.clone(),
            };
        }
        match (&profile.pair_code, profile.pair_code_expires_at) {
            (Some(code), Some(expires_at)) => PairingState::WaitingForPartner(PendingCode {
                code: code.clone(),
                expires_at,
            }),
            _ => PairingState::Unpaired,
        }
    }

    /// The live code held in this state, if any.
    pub fn pending(&self) -> Option<&PendingCode> {
        match self {
            PairingState::WaitingForPartner(pending) => Some(pending),
            PairingState::Failed {
                pending: Some(pending),
                ..
            } => Some(pending),
            _ => None,
        }
    }

    pub fn partner_id(&self) -> Option<&str> {
        match self {
            PairingState::Paired { partner_id } => Some(partner_id),
            _ => None,
        }
    }

    /// Write the derived pairing fields onto `profile`.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        match self.pending() {
            Some(pending) => {
                profile.pair_code = Some(pending.code.clone());
                profile.pair_code_expires_at = Some(pending.expires_at);
            }
            None => {
                profile.pair_code = None;
                profile.pair_code_expires_at = None;
            }
        }
        match self.partner_id() {
            Some(partner_id) => {
                if profile.partner_id.as_deref() != Some(partner_id) {
                    profile.partner_profile = None;
                }
                profile.partner_id = Some(partner_id.to_string());
            }
            None => {
                profile.partner_id = None;
                profile.partner_profile = None;
            }
        }
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            PairingState::Unpaired => "unpaired",
            PairingState::GeneratingCode => "generating_code",
            PairingState::WaitingForPartner(_) => "waiting_for_partner",
            PairingState::EnteringCode => "entering_code",
            PairingState::Paired { .. } => "paired",
            PairingState::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for PairingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingState::WaitingForPartner(pending) => {
                write!(f, "waiting for partner (code {})", pending.code)
            }
            PairingState::Paired { partner_id } => write!(f, "paired with {}", partner_id),
            PairingState::Failed { reason, .. } => write!(f, "failed: {}", reason),
            other => f.write_str(&other.label().replace('_', " ")),
        }
    }
}

/// Discrete notifications published by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum PairingEvent {
    StateChanged {
        from: PairingState,
        to: PairingState,
    },
    CodeIssued(PendingCode),
    /// Informational: the code ran out without being redeemed.
    CodeExpired {
        code: PairCode,
    },
    Paired {
        partner_id: String,
    },
    Unpaired {
        former_partner: Option<String>,
    },
    PartnerPresence(PartnerInfo),
    Failed {
        reason: String,
    },
}
