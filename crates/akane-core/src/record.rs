//! Persisted per-sender and per-chat records.
//!
//! Both record types are `#[serde(default)]`: a persisted entry missing a
//! field (older database, hand edits) is repaired with the default value on
//! load instead of failing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::message::InboundMessage;

/// Command name → last successful invocation, in Unix milliseconds.
pub type CooldownMap = HashMap<String, u64>;

// ============================================================================
// UserRecord
// ============================================================================

/// Per-sender persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    /// Last seen display name.
    pub name: String,
    /// Last message timestamp (Unix milliseconds).
    pub last_chat: u64,
    pub registered: bool,
    pub age: u32,

    /// Premium entitlement.
    pub premium: bool,
    /// VIP entitlement.
    #[serde(alias = "VIP")]
    pub vip: bool,
    pub banned: bool,
    pub warning: u32,
    pub autolevelup: bool,
    /// Premium expiry (Unix milliseconds, 0 = none).
    pub premium_time: u64,

    pub level: u32,
    pub exp: u64,
    pub limit: i64,

    /// AFK start timestamp, -1 when not AFK.
    pub afk: i64,
    pub afk_reason: String,

    /// Last-use timestamps for rate-limited commands.
    pub cooldowns: CooldownMap,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            last_chat: 0,
            registered: false,
            age: 0,
            premium: false,
            vip: false,
            banned: false,
            warning: 0,
            autolevelup: true,
            premium_time: 0,
            level: 1,
            exp: 0,
            limit: 10,
            afk: -1,
            afk_reason: String::new(),
            cooldowns: CooldownMap::new(),
        }
    }
}

impl UserRecord {
    /// The record stored for a sender seen for the first time.
    ///
    /// Owners start with premium and VIP entitlements.
    pub fn seed(message: &InboundMessage, now: u64) -> Self {
        Self {
            name: message
                .push_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            last_chat: now,
            premium: message.roles.owner,
            vip: message.roles.owner,
            ..Default::default()
        }
    }
}

// ============================================================================
// GroupRecord
// ============================================================================

/// Per-chat persisted feature toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRecord {
    /// Last message timestamp (Unix milliseconds).
    pub last_chat: u64,
    pub mute: bool,
    pub welcome: bool,
    pub leave: bool,
    pub antilink: bool,
    pub antispam: bool,
    pub antibot: bool,
    pub antitagsw: bool,
    pub antisticker: bool,
    /// NSFW commands allowed in this group.
    pub nsfw: bool,
    /// Game commands allowed in this group.
    pub game: bool,
    pub autolevelup: bool,
}

impl Default for GroupRecord {
    fn default() -> Self {
        Self {
            last_chat: 0,
            mute: false,
            welcome: true,
            leave: true,
            antilink: false,
            antispam: false,
            antibot: false,
            antitagsw: false,
            antisticker: false,
            nsfw: false,
            game: false,
            autolevelup: true,
        }
    }
}

impl GroupRecord {
    /// The record stored for a group seen for the first time.
    pub fn seed(now: u64) -> Self {
        Self {
            last_chat: now,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SenderRoles;

    #[test]
    fn test_owner_seed_gets_entitlements() {
        let msg = InboundMessage::builder("1", "op", "chat")
            .push_name("Op")
            .roles(SenderRoles {
                owner: true,
                ..Default::default()
            })
            .build();
        let user = UserRecord::seed(&msg, 42);
        assert!(user.premium);
        assert!(user.vip);
        assert_eq!(user.name, "Op");
        assert_eq!(user.last_chat, 42);
        assert_eq!(user.level, 1);
        assert_eq!(user.limit, 10);
        assert_eq!(user.afk, -1);
    }

    #[test]
    fn test_missing_fields_are_repaired_on_load() {
        let user: UserRecord =
            serde_json::from_str(r#"{"name":"bob","VIP":true,"cooldowns":{"ping":5}}"#).unwrap();
        assert_eq!(user.name, "bob");
        assert!(user.vip);
        assert!(!user.premium);
        assert_eq!(user.level, 1);
        assert_eq!(user.cooldowns.get("ping"), Some(&5));

        let group: GroupRecord = serde_json::from_str(r#"{"nsfw":true}"#).unwrap();
        assert!(group.nsfw);
        assert!(group.welcome);
        assert!(!group.game);
    }
}
