//! Requirement gates.
//!
//! [`ConditionEvaluator`] checks a descriptor's [`Requirements`] against the
//! message, the sender's stored record and the group's stored record. Gates are
//! evaluated in a fixed order and the first failure is reported as a
//! [`Denial`]. The NSFW and game gates only apply inside a group that has a
//! stored record.

use std::fmt;

use akane_core::{GroupRecord, InboundMessage, UserRecord};
use serde::Serialize;

use crate::descriptor::Requirements;

/// The gate that denied a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Denial {
    #[serde(rename = "group")]
    Group,
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "rowner")]
    RealOwner,
    #[serde(rename = "owner")]
    Owner,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "botAdmin")]
    BotAdmin,
    #[serde(rename = "premium")]
    Premium,
    #[serde(rename = "VIP")]
    Vip,
    #[serde(rename = "quoted")]
    Quoted,
    #[serde(rename = "nsfw")]
    Nsfw,
    #[serde(rename = "game")]
    Game,
}

impl Denial {
    /// The stable reason code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Denial::Group => "group",
            Denial::Private => "private",
            Denial::RealOwner => "rowner",
            Denial::Owner => "owner",
            Denial::Admin => "admin",
            Denial::BotAdmin => "botAdmin",
            Denial::Premium => "premium",
            Denial::Vip => "VIP",
            Denial::Quoted => "quoted",
            Denial::Nsfw => "nsfw",
            Denial::Game => "game",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied(Denial),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// Evaluates requirement gates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn evaluate(
        requirements: &Requirements,
        message: &InboundMessage,
        user: &UserRecord,
        group: Option<&GroupRecord>,
    ) -> Verdict {
        let roles = &message.roles;
        let checks = [
            (requirements.group, message.is_group, Denial::Group),
            (requirements.private, !message.is_group, Denial::Private),
            (requirements.real_owner, roles.real_owner, Denial::RealOwner),
            (requirements.owner, roles.owner, Denial::Owner),
            (requirements.admin, roles.admin, Denial::Admin),
            (requirements.bot_admin, roles.bot_admin, Denial::BotAdmin),
            (requirements.premium, user.premium, Denial::Premium),
            (requirements.vip, user.vip, Denial::Vip),
            (requirements.quoted, message.is_quoted(), Denial::Quoted),
        ];

        if let Some((_, _, denial)) = checks
            .iter()
            .find(|(required, held, _)| *required && !held)
        {
            return Verdict::Denied(*denial);
        }

        // Keyed on the stored record, not on whether group metadata resolved.
        if message.is_group
            && let Some(group) = group
        {
            if requirements.nsfw && !group.nsfw {
                return Verdict::Denied(Denial::Nsfw);
            }
            if requirements.game && !group.game {
                return Verdict::Denied(Denial::Game);
            }
        }

        Verdict::Allowed
    }
}
