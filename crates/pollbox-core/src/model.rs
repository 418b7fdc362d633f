//! Domain model structs shared by every storage backend.
//!
//! Every struct derives `Serialize`/`Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(PollId);
uuid_id!(OptionId);
uuid_id!(VoteId);

// ---------------------------------------------------------------------------
// Category / status vocabularies
// ---------------------------------------------------------------------------

/// Fixed set of poll categories.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PollCategory {
    Tech,
    Sports,
    Entertainment,
    Politics,
    Lifestyle,
    Business,
    #[default]
    Other,
}

impl PollCategory {
    pub const ALL: [PollCategory; 7] = [
        PollCategory::Tech,
        PollCategory::Sports,
        PollCategory::Entertainment,
        PollCategory::Politics,
        PollCategory::Lifestyle,
        PollCategory::Business,
        PollCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PollCategory::Tech => "tech",
            PollCategory::Sports => "sports",
            PollCategory::Entertainment => "entertainment",
            PollCategory::Politics => "politics",
            PollCategory::Lifestyle => "lifestyle",
            PollCategory::Business => "business",
            PollCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

/// Poll lifecycle state. The stored value may lag behind reality: once the
/// expiry timestamp has passed the poll is `Completed` no matter what the
/// row says, and every read path re-derives this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Active,
    Completed,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Active => "active",
            PollStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PollStatus::Active),
            "completed" => Some(PollStatus::Completed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// A question open for voting until an optional expiry time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub description: Option<String>,
    pub category: PollCategory,
    /// Stored status flag. Prefer [`crate::aggregate::effective_status`].
    pub status: PollStatus,
    pub is_featured: bool,
    /// `None` means the poll never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PollOption
// ---------------------------------------------------------------------------

/// One selectable answer within a poll. The counter only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOption {
    pub id: OptionId,
    pub poll_id: PollId,
    pub text: String,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Vote
// ---------------------------------------------------------------------------

/// A single visitor's one-time choice within a poll. At most one row per
/// (poll, visitor) pair ever exists; the backend enforces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vote {
    pub id: VoteId,
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub visitor_id: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Derived view
// ---------------------------------------------------------------------------

/// An option annotated with its share of the total vote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionTally {
    pub id: OptionId,
    pub text: String,
    pub votes: i64,
    /// `round(votes / total * 100)`, or 0 when the poll has no votes.
    pub percentage: u8,
}

/// The denormalized poll view handed to presentation. Never stored;
/// recomputed from the raw counters on every read, so it is always
/// consistent with the last recorded vote. `status` here is the effective
/// status, already reconciled against the expiry timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollWithOptions {
    pub id: PollId,
    pub question: String,
    pub description: Option<String>,
    pub category: PollCategory,
    pub status: PollStatus,
    pub is_featured: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub options: Vec<OptionTally>,
    pub total_votes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trip() {
        for cat in PollCategory::ALL {
            assert_eq!(PollCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(PollCategory::parse("gardening"), None);
    }

    #[test]
    fn status_round_trip() {
        assert_eq!(PollStatus::parse("active"), Some(PollStatus::Active));
        assert_eq!(PollStatus::parse("completed"), Some(PollStatus::Completed));
        assert_eq!(PollStatus::parse("archived"), None);
    }

    #[test]
    fn category_serde_is_lowercase() {
        let json = serde_json::to_string(&PollCategory::Entertainment).unwrap();
        assert_eq!(json, "\"entertainment\"");
    }
}
