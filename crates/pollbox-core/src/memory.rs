//! In-memory storage backend.
//!
//! The second interchangeable implementation of [`PollStore`], alongside
//! the SQLite file database in `pollbox-store`. One mutex guards all three
//! tables, so every operation is atomic as seen by other callers; the
//! (poll, visitor) uniqueness check runs under that lock, which is this
//! backend's equivalent of the SQLite `UNIQUE` constraint.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::aggregate::effective_status;
use crate::error::{PollError, Result};
use crate::model::{OptionId, Poll, PollId, PollOption, PollStatus, Vote, VoteId};
use crate::store::{
    ListFilter, ListOrder, PlatformStats, PollDraft, PollLifecycle, PollStore,
};

#[derive(Debug, Default)]
struct Tables {
    polls: Vec<Poll>,
    /// Insertion order doubles as creation order for a poll's options.
    options: Vec<PollOption>,
    votes: Vec<Vote>,
}

impl Tables {
    fn options_of(&self, poll_id: PollId) -> Vec<PollOption> {
        self.options
            .iter()
            .filter(|o| o.poll_id == poll_id)
            .cloned()
            .collect()
    }

    fn total_votes(&self, poll_id: PollId) -> i64 {
        self.options
            .iter()
            .filter(|o| o.poll_id == poll_id)
            .map(|o| o.votes)
            .sum()
    }
}

/// Heap-backed [`PollStore`] with no persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PollStore for MemoryStore {
    fn create_poll(&self, draft: &PollDraft) -> Result<PollId> {
        let mut tables = self.lock();
        let now = Utc::now();
        let id = PollId::new();

        tables.polls.push(Poll {
            id,
            question: draft.question.clone(),
            description: draft.description.clone(),
            category: draft.category,
            status: PollStatus::Active,
            is_featured: draft.is_featured,
            expires_at: draft.expires_at,
            created_at: now,
            updated_at: now,
        });

        for text in &draft.options {
            tables.options.push(PollOption {
                id: OptionId::new(),
                poll_id: id,
                text: text.clone(),
                votes: 0,
                created_at: now,
            });
        }

        Ok(id)
    }

    fn fetch_poll(&self, id: PollId) -> Result<(Poll, Vec<PollOption>)> {
        let tables = self.lock();
        let poll = tables
            .polls
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(PollError::NotFound)?;
        let options = tables.options_of(id);
        Ok((poll, options))
    }

    fn list_polls(
        &self,
        filter: &ListFilter,
        order: ListOrder,
        limit: u32,
        offset: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Poll, Vec<PollOption>)>> {
        let tables = self.lock();

        let mut matches: Vec<&Poll> = tables
            .polls
            .iter()
            .filter(|p| {
                if let Some(status) = filter.status {
                    if effective_status(p.status, p.expires_at, now) != status {
                        return false;
                    }
                }
                if let Some(category) = filter.category {
                    if p.category != category {
                        return false;
                    }
                }
                if let Some(featured) = filter.featured {
                    if p.is_featured != featured {
                        return false;
                    }
                }
                true
            })
            .collect();

        match order {
            ListOrder::Recent => matches.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ListOrder::Popular => matches.sort_by(|a, b| {
                tables
                    .total_votes(b.id)
                    .cmp(&tables.total_votes(a.id))
                    .then(b.created_at.cmp(&a.created_at))
            }),
            ListOrder::Ending => matches.sort_by(|a, b| match (a.expires_at, b.expires_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.created_at.cmp(&b.created_at),
            }),
        }

        Ok(matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|p| (p.clone(), tables.options_of(p.id)))
            .collect())
    }

    fn search_polls(&self, needle: &str, limit: u32) -> Result<Vec<(Poll, Vec<PollOption>)>> {
        let tables = self.lock();
        let needle = needle.to_lowercase();

        let mut matches: Vec<&Poll> = tables
            .polls
            .iter()
            .filter(|p| p.question.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matches
            .into_iter()
            .take(limit as usize)
            .map(|p| (p.clone(), tables.options_of(p.id)))
            .collect())
    }

    fn poll_lifecycle(&self, id: PollId) -> Result<PollLifecycle> {
        let tables = self.lock();
        tables
            .polls
            .iter()
            .find(|p| p.id == id)
            .map(|p| PollLifecycle {
                status: p.status,
                expires_at: p.expires_at,
            })
            .ok_or(PollError::NotFound)
    }

    fn option_belongs_to_poll(&self, option_id: OptionId, poll_id: PollId) -> Result<bool> {
        let tables = self.lock();
        Ok(tables
            .options
            .iter()
            .any(|o| o.id == option_id && o.poll_id == poll_id))
    }

    fn find_vote(&self, poll_id: PollId, visitor_id: &str) -> Result<Option<Vote>> {
        let tables = self.lock();
        Ok(tables
            .votes
            .iter()
            .find(|v| v.poll_id == poll_id && v.visitor_id == visitor_id)
            .cloned())
    }

    fn record_vote(&self, poll_id: PollId, option_id: OptionId, visitor_id: &str) -> Result<Vote> {
        let mut tables = self.lock();

        // Uniqueness check and both writes happen under one lock, so a
        // racing duplicate sees either nothing or the committed vote.
        if tables
            .votes
            .iter()
            .any(|v| v.poll_id == poll_id && v.visitor_id == visitor_id)
        {
            return Err(PollError::Conflict("already voted on this poll".into()));
        }

        let option = tables
            .options
            .iter_mut()
            .find(|o| o.id == option_id && o.poll_id == poll_id)
            .ok_or(PollError::NotFound)?;
        option.votes += 1;

        let vote = Vote {
            id: VoteId::new(),
            poll_id,
            option_id,
            visitor_id: visitor_id.to_string(),
            created_at: Utc::now(),
        };
        tables.votes.push(vote.clone());
        Ok(vote)
    }

    fn mark_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.lock();
        let mut transitioned = 0;

        for poll in &mut tables.polls {
            if poll.status == PollStatus::Active
                && poll.expires_at.is_some_and(|expiry| expiry <= now)
            {
                poll.status = PollStatus::Completed;
                poll.updated_at = now;
                transitioned += 1;
            }
        }

        Ok(transitioned)
    }

    fn tally_stats(&self, now: DateTime<Utc>) -> Result<PlatformStats> {
        let tables = self.lock();

        let total_polls = tables.polls.len() as u64;
        let active_polls = tables
            .polls
            .iter()
            .filter(|p| effective_status(p.status, p.expires_at, now) == PollStatus::Active)
            .count() as u64;

        let cutoff = now - Duration::hours(24);
        let votes_last_day = tables
            .votes
            .iter()
            .filter(|v| v.created_at >= cutoff)
            .count() as u64;

        let mut polls_per_category = std::collections::BTreeMap::new();
        for poll in &tables.polls {
            *polls_per_category.entry(poll.category).or_insert(0) += 1;
        }

        Ok(PlatformStats {
            total_polls,
            active_polls,
            completed_polls: total_polls - active_polls,
            total_votes: tables.votes.len() as u64,
            votes_last_day,
            polls_per_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PollCategory;

    fn draft(question: &str, options: &[&str]) -> PollDraft {
        PollDraft::new(question, options.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn create_and_fetch_preserves_option_order() {
        let store = MemoryStore::new();
        let id = store
            .create_poll(&draft("Best season?", &["spring", "summer", "autumn", "winter"]))
            .unwrap();

        let (poll, options) = store.fetch_poll(id).unwrap();
        assert_eq!(poll.question, "Best season?");
        assert_eq!(poll.status, PollStatus::Active);
        let texts: Vec<_> = options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, ["spring", "summer", "autumn", "winter"]);
        assert!(options.iter().all(|o| o.votes == 0));
    }

    #[test]
    fn fetch_unknown_poll_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.fetch_poll(PollId::new()),
            Err(PollError::NotFound)
        ));
    }

    #[test]
    fn duplicate_vote_is_conflict_and_leaves_counter_alone() {
        let store = MemoryStore::new();
        let id = store.create_poll(&draft("Tabs or spaces?", &["tabs", "spaces"])).unwrap();
        let (_, options) = store.fetch_poll(id).unwrap();

        store.record_vote(id, options[0].id, "v-1").unwrap();
        let err = store.record_vote(id, options[1].id, "v-1").unwrap_err();
        assert!(matches!(err, PollError::Conflict(_)));

        let (_, options) = store.fetch_poll(id).unwrap();
        assert_eq!(options[0].votes, 1);
        assert_eq!(options[1].votes, 0);
    }

    #[test]
    fn active_filter_excludes_stale_active_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut expired = draft("Old poll now?", &["a", "b"]);
        expired.expires_at = Some(now - Duration::hours(1));
        store.create_poll(&expired).unwrap();

        let open_id = store.create_poll(&draft("Open poll now?", &["a", "b"])).unwrap();

        let filter = ListFilter {
            status: Some(PollStatus::Active),
            ..ListFilter::default()
        };
        let active = store.list_polls(&filter, ListOrder::Recent, 10, 0, now).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0.id, open_id);

        let filter = ListFilter {
            status: Some(PollStatus::Completed),
            ..ListFilter::default()
        };
        let completed = store.list_polls(&filter, ListOrder::Recent, 10, 0, now).unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn ending_order_sorts_never_expiring_last() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let forever = store.create_poll(&draft("No expiry here", &["a", "b"])).unwrap();
        let mut soon = draft("Closing soon ok", &["a", "b"]);
        soon.expires_at = Some(now + Duration::hours(1));
        let soon_id = store.create_poll(&soon).unwrap();
        let mut later = draft("Closing later ok", &["a", "b"]);
        later.expires_at = Some(now + Duration::days(7));
        let later_id = store.create_poll(&later).unwrap();

        let rows = store
            .list_polls(&ListFilter::default(), ListOrder::Ending, 10, 0, now)
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|(p, _)| p.id).collect();
        assert_eq!(ids, [soon_id, later_id, forever]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = MemoryStore::new();
        store.create_poll(&draft("Best Rust web framework?", &["axum", "actix"])).unwrap();
        store.create_poll(&draft("Lunch options today", &["soup", "salad"])).unwrap();

        let hits = store.search_polls("web rust", 10).unwrap();
        assert_eq!(hits.len(), 0); // substring, not token match

        let hits = store.search_polls("RUST WEB", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.question, "Best Rust web framework?");
    }

    #[test]
    fn mark_expired_is_idempotent() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut d = draft("About to expire", &["a", "b"]);
        d.expires_at = Some(now - Duration::minutes(1));
        let id = store.create_poll(&d).unwrap();

        assert_eq!(store.mark_expired(now).unwrap(), 1);
        assert_eq!(store.mark_expired(now).unwrap(), 0);

        let (poll, _) = store.fetch_poll(id).unwrap();
        assert_eq!(poll.status, PollStatus::Completed);
    }

    #[test]
    fn stats_reflect_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut tech = draft("Which language next?", &["rust", "go"]);
        tech.category = PollCategory::Tech;
        let tech_id = store.create_poll(&tech).unwrap();

        let mut done = draft("Already wrapped up", &["a", "b"]);
        done.category = PollCategory::Sports;
        done.expires_at = Some(now - Duration::hours(2));
        store.create_poll(&done).unwrap();

        let (_, options) = store.fetch_poll(tech_id).unwrap();
        store.record_vote(tech_id, options[0].id, "v-1").unwrap();
        store.record_vote(tech_id, options[1].id, "v-2").unwrap();

        let stats = store.tally_stats(now).unwrap();
        assert_eq!(stats.total_polls, 2);
        assert_eq!(stats.active_polls, 1);
        assert_eq!(stats.completed_polls, 1);
        assert_eq!(stats.total_votes, 2);
        assert_eq!(stats.votes_last_day, 2);
        assert_eq!(stats.polls_per_category.get(&PollCategory::Tech), Some(&1));
        assert_eq!(stats.polls_per_category.get(&PollCategory::Sports), Some(&1));
    }
}
