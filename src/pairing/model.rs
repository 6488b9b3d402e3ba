//! Records exchanged and persisted by the pairing protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::code::PairCode;

/// The five love languages a user can pick on their profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoveLanguage {
    WordsOfAffirmation,
    QualityTime,
    ReceivingGifts,
    ActsOfService,
    PhysicalTouch,
}

impl std::fmt::Display for LoveLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoveLanguage::WordsOfAffirmation => write!(f, "Words of Affirmation"),
            LoveLanguage::QualityTime => write!(f, "Quality Time"),
            LoveLanguage::ReceivingGifts => write!(f, "Receiving Gifts"),
            LoveLanguage::ActsOfService => write!(f, "Acts of Service"),
            LoveLanguage::PhysicalTouch => write!(f, "Physical Touch"),
        }
    }
}

impl std::str::FromStr for LoveLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "wordsofaffirmation" | "words" => Ok(LoveLanguage::WordsOfAffirmation),
            "qualitytime" | "time" => Ok(LoveLanguage::QualityTime),
            "receivinggifts" | "gifts" => Ok(LoveLanguage::ReceivingGifts),
            "actsofservice" | "service" => Ok(LoveLanguage::ActsOfService),
            "physicaltouch" | "touch" => Ok(LoveLanguage::PhysicalTouch),
            _ => Err(format!("unknown love language: {}", s)),
        }
    }
}

/// Public presence of a user, as published under `users/{userId}`.
///
/// Written only by the user it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerInfo {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub bio: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

/// The local user's profile, persisted on this device.
///
/// The pairing fields (`pair_code`, `pair_code_expires_at`, `partner_id`)
/// are written by the coordinator from its state and never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub love_language: Option<LoveLanguage>,
    #[serde(default)]
    pub pair_code: Option<PairCode>,
    #[serde(default)]
    pub pair_code_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub partner_profile: Option<PartnerInfo>,
}

impl UserProfile {
    /// Fresh, unpaired profile.
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            bio: String::new(),
            emoji: "❤️".to_string(),
            interests: Vec::new(),
            love_language: None,
            pair_code: None,
            pair_code_expires_at: None,
            partner_id: None,
            partner_profile: None,
        }
    }

    /// This user's public presence record.
    pub fn presence(&self, is_online: bool, at: DateTime<Utc>) -> PartnerInfo {
        PartnerInfo {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            emoji: self.emoji.clone(),
            bio: self.bio.clone(),
            is_online,
            last_seen: at,
        }
    }

    pub fn is_paired(&self) -> bool {
        self.partner_id.is_some()
    }
}

/// Edits to the user-facing profile fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub emoji: Option<String>,
    pub interests: Option<Vec<String>>,
    /// `Some(None)` clears the love language.
    pub love_language: Option<Option<LoveLanguage>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.emoji.is_none()
            && self.interests.is_none()
            && self.love_language.is_none()
    }

    pub(crate) fn apply_to(self, profile: &mut UserProfile) {
        if let Some(name) = self.display_name
            && !name.trim().is_empty()
        {
            profile.display_name = name;
        }
        if let Some(bio) = self.bio {
            profile.bio = bio;
        }
        if let Some(emoji) = self.emoji {
            profile.emoji = emoji;
        }
        if let Some(interests) = self.interests {
            profile.interests = interests
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
        }
        if let Some(love_language) = self.love_language {
            profile.love_language = love_language;
        }
    }
}

/// Shared record under `pairCodes/{code}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCodeRecord {
    pub owner_user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PairingCodeRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Shared record under `pairingNotices/{ownerUserId}`, telling a code's
/// owner who redeemed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingNotice {
    pub partner_id: String,
    pub partner_display_name: String,
    pub code: PairCode,
    pub paired_at: DateTime<Utc>,
}
