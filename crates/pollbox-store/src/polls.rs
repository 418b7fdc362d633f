//! Poll and option queries.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use uuid::Uuid;

use pollbox_core::model::{OptionId, Poll, PollCategory, PollId, PollOption, PollStatus};
use pollbox_core::store::{ListFilter, ListOrder, PlatformStats, PollDraft, PollLifecycle};

use crate::database::Database;
use crate::error::{Result, StoreError};

const POLL_COLUMNS: &str =
    "id, question, description, category, status, is_featured, expires_at, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a poll and its options in one transaction. If any option
    /// insert fails the whole poll is rolled back, so a poll with fewer
    /// than its declared options can never persist.
    pub(crate) fn insert_poll(&self, draft: &PollDraft) -> Result<PollId> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let id = PollId::new();
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO polls (id, question, description, category, status, is_featured, expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.to_string(),
                draft.question,
                draft.description,
                draft.category.as_str(),
                PollStatus::Active.as_str(),
                draft.is_featured as i64,
                draft.expires_at.map(|t| t.to_rfc3339()),
                now,
                now,
            ],
        )?;

        for (position, text) in draft.options.iter().enumerate() {
            tx.execute(
                "INSERT INTO poll_options (id, poll_id, text, votes, position, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                params![
                    OptionId::new().to_string(),
                    id.to_string(),
                    text,
                    position as i64,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single poll with its options in creation order.
    pub(crate) fn poll_by_id(&self, id: PollId) -> Result<(Poll, Vec<PollOption>)> {
        let poll = self
            .conn()
            .query_row(
                &format!("SELECT {POLL_COLUMNS} FROM polls WHERE id = ?1"),
                params![id.to_string()],
                row_to_poll,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        let options = self.options_for(id)?;
        Ok((poll, options))
    }

    pub(crate) fn options_for(&self, poll_id: PollId) -> Result<Vec<PollOption>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, poll_id, text, votes, created_at
             FROM poll_options
             WHERE poll_id = ?1
             ORDER BY position ASC",
        )?;

        let rows = stmt.query_map(params![poll_id.to_string()], row_to_option)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Filtered, ordered, paginated listing.
    ///
    /// Status filtering is on *effective* status: the expiry timestamp is
    /// compared against `now` in SQL, so a row whose stored flag lags
    /// behind its expiry is still classified correctly.
    pub(crate) fn polls_filtered(
        &self,
        filter: &ListFilter,
        order: ListOrder,
        limit: u32,
        offset: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Poll, Vec<PollOption>)>> {
        let mut sql = format!("SELECT {POLL_COLUMNS} FROM polls");
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        let now_str = now.to_rfc3339();

        match filter.status {
            Some(PollStatus::Active) => {
                clauses.push("status = 'active' AND (expires_at IS NULL OR expires_at > ?)");
                args.push(now_str.clone());
            }
            Some(PollStatus::Completed) => {
                clauses.push(
                    "(status = 'completed' OR (expires_at IS NOT NULL AND expires_at <= ?))",
                );
                args.push(now_str.clone());
            }
            None => {}
        }

        if let Some(category) = filter.category {
            clauses.push("category = ?");
            args.push(category.as_str().to_string());
        }

        if let Some(featured) = filter.featured {
            clauses.push(if featured {
                "is_featured = 1"
            } else {
                "is_featured = 0"
            });
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(match order {
            ListOrder::Recent => " ORDER BY created_at DESC",
            ListOrder::Popular => {
                " ORDER BY (SELECT COALESCE(SUM(o.votes), 0)
                            FROM poll_options o WHERE o.poll_id = polls.id) DESC,
                           created_at DESC"
            }
            // expires_at IS NULL sorts never-expiring polls last.
            ListOrder::Ending => " ORDER BY expires_at IS NULL, expires_at ASC",
        });
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));

        let polls = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_poll)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(StoreError::Sqlite)?
        };

        self.with_options(polls)
    }

    /// Case-insensitive substring match on the question, newest first.
    pub(crate) fn search_by_question(
        &self,
        needle: &str,
        limit: u32,
    ) -> Result<Vec<(Poll, Vec<PollOption>)>> {
        let escaped = needle
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");

        let polls = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&format!(
                "SELECT {POLL_COLUMNS} FROM polls
                 WHERE question LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC
                 LIMIT {limit}"
            ))?;
            let rows = stmt.query_map(params![pattern], row_to_poll)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(StoreError::Sqlite)?
        };

        self.with_options(polls)
    }

    /// The two fields vote submission needs: stored status and expiry.
    pub(crate) fn lifecycle_fields(&self, id: PollId) -> Result<PollLifecycle> {
        self.conn()
            .query_row(
                "SELECT status, expires_at FROM polls WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    let status_str: String = row.get(0)?;
                    let expires_str: Option<String> = row.get(1)?;
                    let status = parse_status(0, &status_str)?;
                    let expires_at = expires_str
                        .as_deref()
                        .map(|s| parse_timestamp(1, s))
                        .transpose()?;
                    Ok(PollLifecycle { status, expires_at })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    // ------------------------------------------------------------------
    // Expiry sweep
    // ------------------------------------------------------------------

    /// Persist `completed` for polls past their expiry. One-way and
    /// idempotent; rows already completed are not touched again.
    pub(crate) fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE polls
             SET status = 'completed', updated_at = ?1
             WHERE status = 'active'
               AND expires_at IS NOT NULL
               AND expires_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    pub(crate) fn platform_counters(&self, now: DateTime<Utc>) -> Result<PlatformStats> {
        let conn = self.conn();
        let now_str = now.to_rfc3339();

        let total_polls: i64 = conn.query_row("SELECT COUNT(*) FROM polls", [], |r| r.get(0))?;
        let active_polls: i64 = conn.query_row(
            "SELECT COUNT(*) FROM polls
             WHERE status = 'active' AND (expires_at IS NULL OR expires_at > ?1)",
            params![now_str],
            |r| r.get(0),
        )?;
        let total_votes: i64 = conn.query_row("SELECT COUNT(*) FROM votes", [], |r| r.get(0))?;

        let cutoff = (now - Duration::hours(24)).to_rfc3339();
        let votes_last_day: i64 = conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE created_at >= ?1",
            params![cutoff],
            |r| r.get(0),
        )?;

        let mut polls_per_category = std::collections::BTreeMap::new();
        let mut stmt = conn.prepare("SELECT category, COUNT(*) FROM polls GROUP BY category")?;
        let rows = stmt.query_map([], |row| {
            let category: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((category, count))
        })?;
        for row in rows {
            let (category, count) = row?;
            if let Some(category) = PollCategory::parse(&category) {
                polls_per_category.insert(category, count as u64);
            }
        }

        Ok(PlatformStats {
            total_polls: total_polls as u64,
            active_polls: active_polls as u64,
            completed_polls: (total_polls - active_polls) as u64,
            total_votes: total_votes as u64,
            votes_last_day: votes_last_day as u64,
            polls_per_category,
        })
    }

    fn with_options(&self, polls: Vec<Poll>) -> Result<Vec<(Poll, Vec<PollOption>)>> {
        polls
            .into_iter()
            .map(|poll| {
                let options = self.options_for(poll.id)?;
                Ok((poll, options))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

pub(crate) fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_status(idx: usize, s: &str) -> rusqlite::Result<PollStatus> {
    PollStatus::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown poll status: {s}").into(),
        )
    })
}

fn parse_category(idx: usize, s: &str) -> rusqlite::Result<PollCategory> {
    PollCategory::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown poll category: {s}").into(),
        )
    })
}

/// Map a `rusqlite::Row` (selected via [`POLL_COLUMNS`]) to a [`Poll`].
fn row_to_poll(row: &rusqlite::Row<'_>) -> rusqlite::Result<Poll> {
    let id_str: String = row.get(0)?;
    let question: String = row.get(1)?;
    let description: Option<String> = row.get(2)?;
    let category_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let is_featured: bool = row.get(5)?;
    let expires_str: Option<String> = row.get(6)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(Poll {
        id: PollId(parse_uuid(0, &id_str)?),
        question,
        description,
        category: parse_category(3, &category_str)?,
        status: parse_status(4, &status_str)?,
        is_featured,
        expires_at: expires_str
            .as_deref()
            .map(|s| parse_timestamp(6, s))
            .transpose()?,
        created_at: parse_timestamp(7, &created_str)?,
        updated_at: parse_timestamp(8, &updated_str)?,
    })
}

/// Map a `rusqlite::Row` to a [`PollOption`].
fn row_to_option(row: &rusqlite::Row<'_>) -> rusqlite::Result<PollOption> {
    let id_str: String = row.get(0)?;
    let poll_id_str: String = row.get(1)?;
    let text: String = row.get(2)?;
    let votes: i64 = row.get(3)?;
    let created_str: String = row.get(4)?;

    Ok(PollOption {
        id: OptionId(parse_uuid(0, &id_str)?),
        poll_id: PollId(parse_uuid(1, &poll_id_str)?),
        text,
        votes,
        created_at: parse_timestamp(4, &created_str)?,
    })
}
