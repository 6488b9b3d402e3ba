//! Profile CLI command.

use clap::Args;

use crate::pairing::{LoveLanguage, PairingCoordinator, ProfileUpdate};

/// Show the profile, or edit it when any flag is given.
#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArgs {
    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// New bio
    #[arg(long)]
    pub bio: Option<String>,

    /// New profile emoji
    #[arg(long)]
    pub emoji: Option<String>,

    /// Replace interests (repeat for several)
    #[arg(long = "interest")]
    pub interests: Vec<String>,

    /// Remove all interests
    #[arg(long, conflicts_with = "interests")]
    pub clear_interests: bool,

    /// Love language (words, time, gifts, service, touch)
    #[arg(long)]
    pub love_language: Option<LoveLanguage>,

    /// Remove the love language
    #[arg(long, conflicts_with = "love_language")]
    pub clear_love_language: bool,
}

impl ProfileArgs {
    fn into_update(self) -> ProfileUpdate {
        let interests = if self.clear_interests {
            Some(Vec::new())
        } else if self.interests.is_empty() {
            None
        } else {
            Some(self.interests)
        };
        let love_language = if self.clear_love_language {
            Some(None)
        } else {
            self.love_language.map(Some)
        };
        ProfileUpdate {
            display_name: self.name,
            bio: self.bio,
            emoji: self.emoji,
            interests,
            love_language,
        }
    }
}

/// Run the profile command.
pub async fn run_profile_command(
    coordinator: &PairingCoordinator,
    args: ProfileArgs,
) -> anyhow::Result<()> {
    let update = args.into_update();
    let profile = if update.is_empty() {
        coordinator.profile().await?
    } else {
        let profile = coordinator.update_profile(update).await?;
        println!("Profile updated.");
        profile
    };

    println!("{} {}", profile.emoji, profile.display_name);
    println!("  Id: {}", profile.user_id);
    if !profile.bio.is_empty() {
        println!("  Bio: {}", profile.bio);
    }
    if !profile.interests.is_empty() {
        println!("  Interests: {}", profile.interests.join(", "));
    }
    if let Some(love_language) = profile.love_language {
        println!("  Love language: {}", love_language);
    }
    match &profile.partner_id {
        Some(partner_id) => println!("  Partner: {}", partner_id),
        None => println!("  Partner: none"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_is_empty_update() {
        assert!(ProfileArgs::default().into_update().is_empty());
    }

    #[test]
    fn test_clear_flags_map_to_explicit_clears() {
        let update = ProfileArgs {
            clear_interests: true,
            clear_love_language: true,
            ..ProfileArgs::default()
        }
        .into_update();
        assert_eq!(update.interests, Some(Vec::new()));
        assert_eq!(update.love_language, Some(None));
    }
}
