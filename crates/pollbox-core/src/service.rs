//! The request-facing service: poll creation, lookups, and vote submission.
//!
//! [`PollService`] owns an injected storage backend and enforces the
//! business rules on top of it. It performs no retries: a `Conflict` or
//! `InvalidState` is a legitimate outcome to show the end user, and failed
//! writes leave no partial state, so callers may retry on their own terms.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate;
use crate::error::{PollError, Result};
use crate::model::{OptionId, PollCategory, PollId, PollStatus, PollWithOptions, Vote};
use crate::store::{ListFilter, ListOrder, PollDraft, PollStore};
use crate::validate;

/// Trending listings return at most this many polls unless asked otherwise.
pub const DEFAULT_TRENDING_LIMIT: u32 = 4;

/// Search queries shorter than this return an empty result instead of
/// scanning everything.
const MIN_SEARCH_CHARS: usize = 2;

const SEARCH_LIMIT: u32 = 20;
const TOP_POLL_LIMIT: u32 = 5;

/// Platform stats plus the leaderboard, as served to presentation.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub total_polls: u64,
    pub active_polls: u64,
    pub completed_polls: u64,
    pub total_votes: u64,
    pub votes_last_day: u64,
    pub polls_per_category: std::collections::BTreeMap<PollCategory, u64>,
    pub top_polls: Vec<PollSummary>,
}

/// Leaderboard entry for the stats report.
#[derive(Debug, Clone, Serialize)]
pub struct PollSummary {
    pub id: PollId,
    pub question: String,
    pub total_votes: i64,
}

pub struct PollService<S> {
    store: S,
}

impl<S: PollStore> PollService<S> {
    /// Wrap an explicitly constructed storage backend. The caller owns the
    /// backend's lifecycle; the service never initializes storage itself.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Validate and persist a new poll. All-or-nothing: a validation or
    /// storage failure leaves no poll behind.
    pub fn create_poll(&self, draft: PollDraft) -> Result<PollWithOptions> {
        validate::poll_draft(&draft)?;

        let id = self.store.create_poll(&draft)?;
        tracing::info!(poll = %id, options = draft.options.len(), "poll created");

        self.poll(id)
    }

    /// Submit one visitor's vote.
    ///
    /// Validation short-circuits on the first failure and a failed request
    /// has no side effects. The sequence: poll exists, poll is open by the
    /// wall clock (the stored status flag alone is never trusted), the
    /// option belongs to the poll, the visitor has not voted yet. Only
    /// then is the vote recorded, atomically with the counter increment.
    ///
    /// If two submissions race past the prior-vote check, the backend's
    /// uniqueness constraint still lets exactly one through; the other
    /// surfaces here as `Conflict`.
    pub fn submit_vote(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        visitor_id: &str,
    ) -> Result<PollWithOptions> {
        validate::visitor_id(visitor_id)?;

        let lifecycle = self.store.poll_lifecycle(poll_id)?;
        let now = Utc::now();
        if aggregate::effective_status(lifecycle.status, lifecycle.expires_at, now)
            != PollStatus::Active
        {
            return Err(PollError::InvalidState("poll is not active".into()));
        }

        if !self.store.option_belongs_to_poll(option_id, poll_id)? {
            return Err(PollError::InvalidInput(
                "option does not belong to this poll".into(),
            ));
        }

        if self.store.find_vote(poll_id, visitor_id)?.is_some() {
            return Err(PollError::Conflict("already voted on this poll".into()));
        }

        self.store.record_vote(poll_id, option_id, visitor_id)?;
        tracing::debug!(poll = %poll_id, option = %option_id, "vote recorded");

        // Fresh aggregation so the caller renders without a second trip.
        self.poll(poll_id)
    }

    /// Persist `completed` for every poll past its expiry. Reads re-derive
    /// status regardless, so running this is optional.
    pub fn sweep_expired(&self) -> Result<usize> {
        let transitioned = self.store.mark_expired(Utc::now())?;
        if transitioned > 0 {
            tracing::info!(count = transitioned, "polls transitioned to completed");
        }
        Ok(transitioned)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// One poll with percentages, or `NotFound`.
    pub fn poll(&self, id: PollId) -> Result<PollWithOptions> {
        let (poll, options) = self.store.fetch_poll(id)?;
        aggregate::poll_view(poll, options, Utc::now()).ok_or(PollError::NotFound)
    }

    /// Filtered, ordered, paginated listing. An empty page is a valid
    /// result, not an error.
    pub fn list(
        &self,
        filter: &ListFilter,
        order: ListOrder,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PollWithOptions>> {
        let now = Utc::now();
        let rows = self.store.list_polls(filter, order, limit, offset, now)?;
        Ok(Self::views(rows, now))
    }

    /// The featured poll, if an active one exists. Writers keep at most
    /// one poll featured; should several exist anyway, the most recently
    /// created wins.
    pub fn featured(&self) -> Result<Option<PollWithOptions>> {
        let filter = ListFilter {
            status: Some(PollStatus::Active),
            featured: Some(true),
            ..ListFilter::default()
        };
        Ok(self.list(&filter, ListOrder::Recent, 1, 0)?.into_iter().next())
    }

    /// Active, non-featured polls ranked by total votes.
    pub fn trending(&self, limit: u32) -> Result<Vec<PollWithOptions>> {
        let filter = ListFilter {
            status: Some(PollStatus::Active),
            featured: Some(false),
            ..ListFilter::default()
        };
        self.list(&filter, ListOrder::Popular, limit, 0)
    }

    /// Substring search over questions; queries under two characters
    /// return nothing.
    pub fn search(&self, query: &str) -> Result<Vec<PollWithOptions>> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_CHARS {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let rows = self.store.search_polls(query, SEARCH_LIMIT)?;
        Ok(Self::views(rows, now))
    }

    /// The visitor's existing vote on a poll, if any.
    pub fn visitor_vote(&self, poll_id: PollId, visitor_id: &str) -> Result<Option<Vote>> {
        validate::visitor_id(visitor_id)?;
        self.store.find_vote(poll_id, visitor_id)
    }

    /// Platform counters plus the top polls by vote count.
    pub fn stats(&self) -> Result<StatsReport> {
        let now = Utc::now();
        let stats = self.store.tally_stats(now)?;

        let top_polls = self
            .store
            .list_polls(&ListFilter::default(), ListOrder::Popular, TOP_POLL_LIMIT, 0, now)?
            .into_iter()
            .filter_map(|(poll, options)| aggregate::poll_view(poll, options, now))
            .map(|view| PollSummary {
                id: view.id,
                question: view.question,
                total_votes: view.total_votes,
            })
            .collect();

        Ok(StatsReport {
            total_polls: stats.total_polls,
            active_polls: stats.active_polls,
            completed_polls: stats.completed_polls,
            total_votes: stats.total_votes,
            votes_last_day: stats.votes_last_day,
            polls_per_category: stats.polls_per_category,
            top_polls,
        })
    }

    fn views(
        rows: Vec<(crate::model::Poll, Vec<crate::model::PollOption>)>,
        now: DateTime<Utc>,
    ) -> Vec<PollWithOptions> {
        rows.into_iter()
            .filter_map(|(poll, options)| aggregate::poll_view(poll, options, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn service() -> PollService<MemoryStore> {
        PollService::new(MemoryStore::new())
    }

    fn draft(question: &str, options: &[&str]) -> PollDraft {
        PollDraft::new(question, options.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn vote_flow_updates_percentages() {
        let svc = service();
        let poll = svc.create_poll(draft("Cats or dogs?", &["cats", "dogs"])).unwrap();
        let cats = poll.options[0].id;
        let dogs = poll.options[1].id;

        let after_v1 = svc.submit_vote(poll.id, cats, "v1").unwrap();
        assert_eq!(after_v1.total_votes, 1);
        assert_eq!(after_v1.options[0].votes, 1);
        assert_eq!(after_v1.options[0].percentage, 100);
        assert_eq!(after_v1.options[1].votes, 0);
        assert_eq!(after_v1.options[1].percentage, 0);

        let after_v2 = svc.submit_vote(poll.id, dogs, "v2").unwrap();
        assert_eq!(after_v2.total_votes, 2);
        assert_eq!(after_v2.options[0].percentage, 50);
        assert_eq!(after_v2.options[1].percentage, 50);

        // v1 tries again, on either option.
        let err = svc.submit_vote(poll.id, dogs, "v1").unwrap_err();
        assert!(matches!(err, PollError::Conflict(_)));

        let unchanged = svc.poll(poll.id).unwrap();
        assert_eq!(unchanged.options[0].votes, 1);
        assert_eq!(unchanged.options[1].votes, 1);
        assert_eq!(unchanged.total_votes, 2);
    }

    #[test]
    fn vote_on_unknown_poll_is_not_found() {
        let svc = service();
        let err = svc.submit_vote(PollId::new(), OptionId::new(), "v1").unwrap_err();
        assert!(matches!(err, PollError::NotFound));
    }

    #[test]
    fn vote_on_expired_poll_is_invalid_state_with_no_side_effects() {
        let svc = service();
        let mut d = draft("Too late to ask?", &["yes", "no"]);
        d.expires_at = Some(Utc::now() - Duration::hours(1));
        let poll = svc.create_poll(d).unwrap();

        // The derived status already reads completed even though the
        // stored flag still says active.
        assert_eq!(poll.status, PollStatus::Completed);

        let err = svc.submit_vote(poll.id, poll.options[0].id, "v1").unwrap_err();
        assert!(matches!(err, PollError::InvalidState(_)));

        let after = svc.poll(poll.id).unwrap();
        assert_eq!(after.total_votes, 0);
        assert!(svc.visitor_vote(poll.id, "v1").unwrap().is_none());
    }

    #[test]
    fn vote_with_foreign_option_is_invalid_input_with_no_side_effects() {
        let svc = service();
        let poll_a = svc.create_poll(draft("Poll A question", &["a1", "a2"])).unwrap();
        let poll_b = svc.create_poll(draft("Poll B question", &["b1", "b2"])).unwrap();

        let err = svc
            .submit_vote(poll_a.id, poll_b.options[0].id, "v1")
            .unwrap_err();
        assert!(matches!(err, PollError::InvalidInput(_)));

        assert_eq!(svc.poll(poll_a.id).unwrap().total_votes, 0);
        assert_eq!(svc.poll(poll_b.id).unwrap().total_votes, 0);
    }

    #[test]
    fn vote_with_blank_visitor_is_invalid_input() {
        let svc = service();
        let poll = svc.create_poll(draft("Blank visitor?", &["yes", "no"])).unwrap();
        let err = svc.submit_vote(poll.id, poll.options[0].id, "  ").unwrap_err();
        assert!(matches!(err, PollError::InvalidInput(_)));
    }

    #[test]
    fn invalid_draft_persists_nothing() {
        let svc = service();
        assert!(svc.create_poll(draft("Ugh?", &["yes", "no"])).is_err());
        assert!(svc.create_poll(draft("Only one choice", &["yes"])).is_err());

        let all = svc
            .list(&ListFilter::default(), ListOrder::Recent, 10, 0)
            .unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn concurrent_duplicate_votes_yield_one_success_one_conflict() {
        let svc = Arc::new(service());
        let poll = svc.create_poll(draft("Race condition?", &["yes", "no"])).unwrap();
        let option = poll.options[0].id;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let svc = Arc::clone(&svc);
                let poll_id = poll.id;
                std::thread::spawn(move || svc.submit_vote(poll_id, option, "same-visitor"))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(PollError::Conflict(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(svc.poll(poll.id).unwrap().total_votes, 1);
    }

    #[test]
    fn featured_returns_most_recent_active_featured() {
        let svc = service();

        let mut first = draft("Featured but older", &["a", "b"]);
        first.is_featured = true;
        svc.create_poll(first).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));

        let mut second = draft("Featured and newer", &["a", "b"]);
        second.is_featured = true;
        let newer = svc.create_poll(second).unwrap();

        let mut expired = draft("Featured but over", &["a", "b"]);
        expired.is_featured = true;
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        svc.create_poll(expired).unwrap();

        let featured = svc.featured().unwrap().unwrap();
        assert_eq!(featured.id, newer.id);
    }

    #[test]
    fn featured_is_none_when_nothing_is_featured() {
        let svc = service();
        svc.create_poll(draft("Ordinary poll", &["a", "b"])).unwrap();
        assert!(svc.featured().unwrap().is_none());
    }

    #[test]
    fn trending_excludes_featured_and_ranks_by_votes() {
        let svc = service();

        let mut featured = draft("The featured one", &["a", "b"]);
        featured.is_featured = true;
        let featured = svc.create_poll(featured).unwrap();
        svc.submit_vote(featured.id, featured.options[0].id, "v1").unwrap();

        let quiet = svc.create_poll(draft("The quiet one", &["a", "b"])).unwrap();
        let busy = svc.create_poll(draft("The busy one", &["a", "b"])).unwrap();
        svc.submit_vote(busy.id, busy.options[0].id, "v2").unwrap();
        svc.submit_vote(busy.id, busy.options[1].id, "v3").unwrap();

        let trending = svc.trending(DEFAULT_TRENDING_LIMIT).unwrap();
        let ids: Vec<_> = trending.iter().map(|p| p.id).collect();
        assert_eq!(ids, [busy.id, quiet.id]);
    }

    #[test]
    fn short_search_queries_return_empty() {
        let svc = service();
        svc.create_poll(draft("Searchable question", &["a", "b"])).unwrap();

        assert!(svc.search("s").unwrap().is_empty());
        assert!(svc.search("  q ").unwrap().is_empty());
        assert_eq!(svc.search("searchable").unwrap().len(), 1);
    }

    #[test]
    fn visitor_vote_reports_choice() {
        let svc = service();
        let poll = svc.create_poll(draft("Remember my vote?", &["yes", "no"])).unwrap();

        assert!(svc.visitor_vote(poll.id, "v1").unwrap().is_none());
        svc.submit_vote(poll.id, poll.options[1].id, "v1").unwrap();

        let vote = svc.visitor_vote(poll.id, "v1").unwrap().unwrap();
        assert_eq!(vote.option_id, poll.options[1].id);
        assert_eq!(vote.visitor_id, "v1");
    }

    #[test]
    fn stats_report_includes_top_polls() {
        let svc = service();
        let busy = svc.create_poll(draft("Popular question", &["a", "b"])).unwrap();
        svc.create_poll(draft("Ignored question", &["a", "b"])).unwrap();
        svc.submit_vote(busy.id, busy.options[0].id, "v1").unwrap();

        let report = svc.stats().unwrap();
        assert_eq!(report.total_polls, 2);
        assert_eq!(report.total_votes, 1);
        assert_eq!(report.top_polls[0].id, busy.id);
        assert_eq!(report.top_polls[0].total_votes, 1);
    }

    #[test]
    fn sweep_then_read_agree_on_status() {
        let svc = service();
        let mut d = draft("Sweep target poll", &["a", "b"]);
        d.expires_at = Some(Utc::now() - Duration::minutes(1));
        let poll = svc.create_poll(d).unwrap();

        assert_eq!(svc.sweep_expired().unwrap(), 1);
        assert_eq!(svc.sweep_expired().unwrap(), 0);
        assert_eq!(svc.poll(poll.id).unwrap().status, PollStatus::Completed);
    }
}
