//! The storage contract every backend implements.
//!
//! The reference behavior requires two things of the backend beyond plain
//! CRUD: a uniqueness constraint over (poll, visitor) for votes, enforced
//! at the storage boundary so concurrent duplicate submissions cannot both
//! succeed, and an atomic multi-write unit covering the vote-insert +
//! counter-increment pair.
//!
//! Backends: [`crate::memory::MemoryStore`] (in-process) and the SQLite
//! `Database` in `pollbox-store` (embedded file). The handle is constructed
//! by the process entry point and injected into [`crate::PollService`];
//! there is no lazily-initialized global.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{OptionId, Poll, PollCategory, PollId, PollOption, PollStatus, Vote};

/// Validated input for creating a poll together with its options.
#[derive(Debug, Clone)]
pub struct PollDraft {
    pub question: String,
    pub description: Option<String>,
    pub category: PollCategory,
    /// Option texts in display order; the backend persists this order.
    pub options: Vec<String>,
    /// `None` = never expires. A timestamp in the past is accepted; the
    /// poll simply reads as completed from the start.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
}

impl PollDraft {
    pub fn new(question: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            question: question.into(),
            description: None,
            category: PollCategory::default(),
            options,
            expires_at: None,
            is_featured: false,
        }
    }
}

/// Row-level filter for listings. `status` filters on *effective* status:
/// backends compare the expiry timestamp against the `now` passed to
/// [`PollStore::list_polls`], never the stored flag alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<PollStatus>,
    pub category: Option<PollCategory>,
    pub featured: Option<bool>,
}

/// Ordering policy for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    /// Newest first.
    #[default]
    Recent,
    /// Most total votes first.
    Popular,
    /// Closest expiry first; never-expiring polls sort last.
    Ending,
}

/// The two fields vote submission needs to decide whether a poll is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollLifecycle {
    pub status: PollStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Raw platform counters, computed by the backend in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    pub total_polls: u64,
    /// Effectively active (expiry reconciled against `now`).
    pub active_polls: u64,
    pub completed_polls: u64,
    pub total_votes: u64,
    /// Votes recorded in the 24 hours before `now`.
    pub votes_last_day: u64,
    pub polls_per_category: BTreeMap<PollCategory, u64>,
}

/// Storage operations the core requires, regardless of backing technology.
pub trait PollStore: Send + Sync {
    /// Persist a poll and its options as one atomic unit. Either the poll
    /// and every option land, or nothing does.
    fn create_poll(&self, draft: &PollDraft) -> Result<PollId>;

    /// Fetch one poll row plus its options in creation order.
    /// Absent id is `PollError::NotFound`.
    fn fetch_poll(&self, id: PollId) -> Result<(Poll, Vec<PollOption>)>;

    /// List polls matching `filter`, ordered per `order`, paginated.
    /// An empty result is a valid empty listing, not an error.
    fn list_polls(
        &self,
        filter: &ListFilter,
        order: ListOrder,
        limit: u32,
        offset: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Poll, Vec<PollOption>)>>;

    /// Case-insensitive substring match on the question, newest first.
    fn search_polls(&self, needle: &str, limit: u32) -> Result<Vec<(Poll, Vec<PollOption>)>>;

    /// Stored status flag and expiry for one poll.
    fn poll_lifecycle(&self, id: PollId) -> Result<PollLifecycle>;

    /// Whether `option_id` exists and belongs to `poll_id`.
    fn option_belongs_to_poll(&self, option_id: OptionId, poll_id: PollId) -> Result<bool>;

    /// The visitor's existing vote on this poll, if any.
    fn find_vote(&self, poll_id: PollId, visitor_id: &str) -> Result<Option<Vote>>;

    /// Insert the vote row and increment the option counter, atomically.
    /// A concurrent duplicate for the same (poll, visitor) pair fails with
    /// `PollError::Conflict` via the backend's uniqueness constraint; the
    /// counter is untouched in that case.
    fn record_vote(&self, poll_id: PollId, option_id: OptionId, visitor_id: &str) -> Result<Vote>;

    /// Eagerly persist `completed` for polls whose expiry has passed.
    /// Optional optimization over lazy derivation; one-way and idempotent.
    /// Returns the number of polls transitioned.
    fn mark_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Platform counters for the stats endpoint.
    fn tally_stats(&self, now: DateTime<Utc>) -> Result<PlatformStats>;
}
