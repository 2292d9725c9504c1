//! User-facing reply templates.
//!
//! Every notice the dispatcher sends on its own (gate denials, cooldown
//! blocks, command failures) comes from [`ReplyTemplates`]. The templates
//! deserialize from the `replies` section of the bot configuration; missing
//! keys keep their defaults.
//!
//! Two placeholders are substituted:
//! - `{name}` with the handler name
//! - `{remaining}` with the cooldown seconds left, or `{error}` with the
//!   failure message

use serde::{Deserialize, Serialize};

use crate::condition::Denial;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTemplates {
    pub group: String,
    pub private: String,
    pub rowner: String,
    pub owner: String,
    pub admin: String,
    pub bot_admin: String,
    pub premium: String,
    pub vip: String,
    pub quoted: String,
    pub nsfw: String,
    pub game: String,
    pub cooldown: String,
    pub error: String,
}

impl Default for ReplyTemplates {
    fn default() -> Self {
        Self {
            group: "This command can only be used in groups.".into(),
            private: "This command can only be used in private chat.".into(),
            rowner: "This command is reserved for the bot's real owner.".into(),
            owner: "This command is reserved for the bot owner.".into(),
            admin: "This command is reserved for group admins.".into(),
            bot_admin: "I need to be a group admin to do that.".into(),
            premium: "This command is for premium users only.".into(),
            vip: "This command is for VIP users only.".into(),
            quoted: "Reply to a message to use this command.".into(),
            nsfw: "NSFW commands are disabled in this group.".into(),
            game: "Game commands are disabled in this group.".into(),
            cooldown: "⏳ Please wait {remaining} seconds before using the *{name}* command again."
                .into(),
            error: "❌ Error executing command: {error}".into(),
        }
    }
}

impl ReplyTemplates {
    /// The notice for a gate denial.
    pub fn denial(&self, denial: Denial) -> &str {
        match denial {
            Denial::Group => &self.group,
            Denial::Private => &self.private,
            Denial::RealOwner => &self.rowner,
            Denial::Owner => &self.owner,
            Denial::Admin => &self.admin,
            Denial::BotAdmin => &self.bot_admin,
            Denial::Premium => &self.premium,
            Denial::Vip => &self.vip,
            Denial::Quoted => &self.quoted,
            Denial::Nsfw => &self.nsfw,
            Denial::Game => &self.game,
        }
    }

    /// The notice for a cooldown block.
    pub fn cooldown(&self, name: &str, remaining_secs: u64) -> String {
        self.cooldown
            .replace("{name}", name)
            .replace("{remaining}", &remaining_secs.to_string())
    }

    /// The notice for a failed command.
    pub fn error(&self, name: &str, error: &str) -> String {
        self.error.replace("{name}", name).replace("{error}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cooldown_notice() {
        let replies = ReplyTemplates::default();
        assert_eq!(
            replies.cooldown("ping", 4),
            "⏳ Please wait 4 seconds before using the *ping* command again."
        );
    }

    #[test]
    fn test_default_error_notice() {
        let replies = ReplyTemplates::default();
        assert_eq!(
            replies.error("ping", "boom"),
            "❌ Error executing command: boom"
        );
    }

    #[test]
    fn test_denial_picks_matching_template() {
        let replies = ReplyTemplates {
            admin: "admins only".into(),
            ..Default::default()
        };
        assert_eq!(replies.denial(Denial::Admin), "admins only");
        assert_eq!(replies.denial(Denial::Group), replies.group);
    }
}
