//! Read-side aggregation: totals, percentages, effective status.
//!
//! Everything here is a pure function of the raw rows and the caller's
//! wall clock, so the derived view can never drift from the counters.

use chrono::{DateTime, Utc};

use crate::model::{OptionTally, Poll, PollOption, PollStatus, PollWithOptions};

/// Reconcile a stored status flag against the expiry timestamp.
///
/// The transition is one-way: an expired poll reads as `Completed` even if
/// a sweep has not yet rewritten the row, and a row already marked
/// `Completed` stays that way.
pub fn effective_status(
    stored: PollStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> PollStatus {
    match expires_at {
        Some(expiry) if now >= expiry => PollStatus::Completed,
        _ => stored,
    }
}

/// `round(votes / total * 100)`; 0 when the poll has no votes at all.
///
/// Each option rounds independently, so a poll's percentages may sum to
/// 99 or 101.
pub fn percentage(votes: i64, total: i64) -> u8 {
    if total <= 0 {
        return 0;
    }
    (votes as f64 / total as f64 * 100.0).round() as u8
}

/// Build the denormalized view from a poll row and its option rows.
///
/// Options keep the order they arrive in (backends return creation order).
/// Returns `None` for a poll with no options, which a well-formed store
/// never produces; listings drop such polls rather than render them.
pub fn poll_view(
    poll: Poll,
    options: Vec<PollOption>,
    now: DateTime<Utc>,
) -> Option<PollWithOptions> {
    if options.is_empty() {
        return None;
    }

    let total_votes: i64 = options.iter().map(|o| o.votes).sum();
    let status = effective_status(poll.status, poll.expires_at, now);

    let options = options
        .into_iter()
        .map(|o| OptionTally {
            id: o.id,
            text: o.text,
            votes: o.votes,
            percentage: percentage(o.votes, total_votes),
        })
        .collect();

    Some(PollWithOptions {
        id: poll.id,
        question: poll.question,
        description: poll.description,
        category: poll.category,
        status,
        is_featured: poll.is_featured,
        expires_at: poll.expires_at,
        created_at: poll.created_at,
        options,
        total_votes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OptionId, PollCategory, PollId};
    use chrono::Duration;

    fn poll(expires_at: Option<DateTime<Utc>>) -> Poll {
        let now = Utc::now();
        Poll {
            id: PollId::new(),
            question: "Best editor?".into(),
            description: None,
            category: PollCategory::Tech,
            status: PollStatus::Active,
            is_featured: false,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    fn option(poll_id: PollId, text: &str, votes: i64) -> PollOption {
        PollOption {
            id: OptionId::new(),
            poll_id,
            text: text.into(),
            votes,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn zero_votes_means_zero_percent_everywhere() {
        let p = poll(None);
        let opts = vec![option(p.id, "a", 0), option(p.id, "b", 0)];
        let view = poll_view(p, opts, Utc::now()).unwrap();

        assert_eq!(view.total_votes, 0);
        assert!(view.options.iter().all(|o| o.percentage == 0));
    }

    #[test]
    fn single_vote_takes_all() {
        let p = poll(None);
        let opts = vec![option(p.id, "a", 1), option(p.id, "b", 0)];
        let view = poll_view(p, opts, Utc::now()).unwrap();

        assert_eq!(view.total_votes, 1);
        assert_eq!(view.options[0].percentage, 100);
        assert_eq!(view.options[1].percentage, 0);
    }

    #[test]
    fn percentages_sum_within_rounding_tolerance() {
        // 1/3 each rounds to 33+33+33 = 99; independent rounding is accepted.
        let p = poll(None);
        let opts = vec![
            option(p.id, "a", 1),
            option(p.id, "b", 1),
            option(p.id, "c", 1),
        ];
        let n = opts.len() as i64;
        let view = poll_view(p, opts, Utc::now()).unwrap();

        let sum: i64 = view.options.iter().map(|o| o.percentage as i64).sum();
        assert!((sum - 100).abs() <= n - 1, "sum was {sum}");
    }

    #[test]
    fn half_votes_round_to_fifty() {
        let p = poll(None);
        let opts = vec![option(p.id, "a", 1), option(p.id, "b", 1)];
        let view = poll_view(p, opts, Utc::now()).unwrap();

        assert_eq!(view.options[0].percentage, 50);
        assert_eq!(view.options[1].percentage, 50);
        assert_eq!(view.total_votes, 2);
    }

    #[test]
    fn option_order_is_preserved() {
        let p = poll(None);
        let opts = vec![
            option(p.id, "first", 5),
            option(p.id, "second", 1),
            option(p.id, "third", 9),
        ];
        let view = poll_view(p, opts, Utc::now()).unwrap();

        let texts: Vec<_> = view.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn zero_option_poll_is_dropped() {
        let p = poll(None);
        assert!(poll_view(p, vec![], Utc::now()).is_none());
    }

    #[test]
    fn expired_poll_reads_as_completed() {
        let now = Utc::now();
        let p = poll(Some(now - Duration::hours(1)));
        assert_eq!(p.status, PollStatus::Active); // stored flag is stale

        let opts = vec![option(p.id, "a", 0), option(p.id, "b", 0)];
        let view = poll_view(p, opts, now).unwrap();
        assert_eq!(view.status, PollStatus::Completed);
    }

    #[test]
    fn effective_status_is_one_way_and_idempotent() {
        let now = Utc::now();
        let past = Some(now - Duration::minutes(5));
        let future = Some(now + Duration::minutes(5));

        assert_eq!(
            effective_status(PollStatus::Active, past, now),
            PollStatus::Completed
        );
        assert_eq!(
            effective_status(PollStatus::Completed, past, now),
            PollStatus::Completed
        );
        // A completed flag is not resurrected by a future expiry.
        assert_eq!(
            effective_status(PollStatus::Completed, future, now),
            PollStatus::Completed
        );
        assert_eq!(
            effective_status(PollStatus::Active, future, now),
            PollStatus::Active
        );
        assert_eq!(
            effective_status(PollStatus::Active, None, now),
            PollStatus::Active
        );
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        assert_eq!(
            effective_status(PollStatus::Active, Some(now), now),
            PollStatus::Completed
        );
    }
}
