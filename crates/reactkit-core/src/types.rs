use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform identifier of a single chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// Platform identifier of a channel (guild text channel, DM, thread, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

/// Platform identifier of a user or bot account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

macro_rules! id_impls {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                pub fn get(self) -> u64 {
                    self.0
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<u64> for $ty {
                fn from(v: u64) -> Self {
                    Self(v)
                }
            }
        )*
    };
}

id_impls!(MessageId, ChannelId, UserId);

/// An emoji as it arrives on a reaction event.
///
/// Buttons are keyed by [`ReactionEmoji::symbol`], so a custom emoji is matched
/// by its name and a unicode emoji by the literal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionEmoji {
    Unicode(String),
    Custom { id: u64, name: String },
}

impl ReactionEmoji {
    pub fn unicode(symbol: impl Into<String>) -> Self {
        Self::Unicode(symbol.into())
    }

    /// Key used to look up the button bound to this emoji.
    pub fn symbol(&self) -> &str {
        match self {
            Self::Unicode(s) => s,
            Self::Custom { name, .. } => name,
        }
    }
}

impl fmt::Display for ReactionEmoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode(s) => write!(f, "{s}"),
            Self::Custom { id, name } => write!(f, "<:{name}:{id}>"),
        }
    }
}

impl From<&str> for ReactionEmoji {
    fn from(s: &str) -> Self {
        Self::Unicode(s.to_string())
    }
}

/// Channel-scoped permissions the button layer needs to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AddReactions,
    ReadMessageHistory,
    /// Allows removing other users' reactions.
    ManageMessages,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddReactions => write!(f, "add_reactions"),
            Self::ReadMessageHistory => write!(f, "read_message_history"),
            Self::ManageMessages => write!(f, "manage_messages"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_emoji_symbol_is_its_name() {
        let emoji = ReactionEmoji::Custom {
            id: 42,
            name: "next_page".to_string(),
        };
        assert_eq!(emoji.symbol(), "next_page");
        assert_eq!(emoji.to_string(), "<:next_page:42>");
    }

    #[test]
    fn unicode_emoji_symbol_is_literal() {
        let emoji = ReactionEmoji::from("\u{27a1}\u{fe0f}");
        assert_eq!(emoji.symbol(), "\u{27a1}\u{fe0f}");
    }

    #[test]
    fn ids_display_as_raw_numbers() {
        assert_eq!(MessageId(17).to_string(), "17");
        assert_eq!(UserId::from(5).get(), 5);
    }
}
