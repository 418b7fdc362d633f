//! # pollbox-store
//!
//! Embedded SQLite storage backend for pollbox.
//!
//! The crate exposes a [`Database`] handle that wraps a
//! `rusqlite::Connection` and implements the [`PollStore`] contract from
//! `pollbox-core`. Two properties the core depends on live here: the
//! `UNIQUE (poll_id, visitor_id)` constraint on the votes table, which
//! makes concurrent duplicate submissions safe, and the transaction that
//! covers the vote-insert + counter-increment pair.

pub mod database;
pub mod migrations;

mod error;
mod polls;
mod votes;

pub use database::Database;
pub use error::StoreError;

use chrono::{DateTime, Utc};
use pollbox_core::model::{OptionId, Poll, PollId, PollOption, Vote};
use pollbox_core::store::{
    ListFilter, ListOrder, PlatformStats, PollDraft, PollLifecycle, PollStore,
};

impl PollStore for Database {
    fn create_poll(&self, draft: &PollDraft) -> pollbox_core::Result<PollId> {
        Ok(self.insert_poll(draft)?)
    }

    fn fetch_poll(&self, id: PollId) -> pollbox_core::Result<(Poll, Vec<PollOption>)> {
        Ok(self.poll_by_id(id)?)
    }

    fn list_polls(
        &self,
        filter: &ListFilter,
        order: ListOrder,
        limit: u32,
        offset: u32,
        now: DateTime<Utc>,
    ) -> pollbox_core::Result<Vec<(Poll, Vec<PollOption>)>> {
        Ok(self.polls_filtered(filter, order, limit, offset, now)?)
    }

    fn search_polls(
        &self,
        needle: &str,
        limit: u32,
    ) -> pollbox_core::Result<Vec<(Poll, Vec<PollOption>)>> {
        Ok(self.search_by_question(needle, limit)?)
    }

    fn poll_lifecycle(&self, id: PollId) -> pollbox_core::Result<PollLifecycle> {
        Ok(self.lifecycle_fields(id)?)
    }

    fn option_belongs_to_poll(
        &self,
        option_id: OptionId,
        poll_id: PollId,
    ) -> pollbox_core::Result<bool> {
        Ok(self.option_in_poll(option_id, poll_id)?)
    }

    fn find_vote(&self, poll_id: PollId, visitor_id: &str) -> pollbox_core::Result<Option<Vote>> {
        Ok(self.vote_for(poll_id, visitor_id)?)
    }

    fn record_vote(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        visitor_id: &str,
    ) -> pollbox_core::Result<Vote> {
        Ok(self.insert_vote(poll_id, option_id, visitor_id)?)
    }

    fn mark_expired(&self, now: DateTime<Utc>) -> pollbox_core::Result<usize> {
        Ok(self.sweep_expired(now)?)
    }

    fn tally_stats(&self, now: DateTime<Utc>) -> pollbox_core::Result<PlatformStats> {
        Ok(self.platform_counters(now)?)
    }
}
