//! Vote queries and the atomic vote-insert + counter-increment pair.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use pollbox_core::model::{OptionId, PollId, Vote, VoteId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::polls::{parse_timestamp, parse_uuid};

impl Database {
    /// Whether `option_id` exists and belongs to `poll_id`.
    pub(crate) fn option_in_poll(&self, option_id: OptionId, poll_id: PollId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM poll_options WHERE id = ?1 AND poll_id = ?2",
            params![option_id.to_string(), poll_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// The visitor's existing vote on this poll, if any.
    pub(crate) fn vote_for(&self, poll_id: PollId, visitor_id: &str) -> Result<Option<Vote>> {
        self.conn()
            .query_row(
                "SELECT id, poll_id, option_id, visitor_id, created_at
                 FROM votes
                 WHERE poll_id = ?1 AND visitor_id = ?2",
                params![poll_id.to_string(), visitor_id],
                row_to_vote,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// Insert the vote row and bump the option counter in one transaction.
    ///
    /// The `UNIQUE (poll_id, visitor_id)` constraint decides races: when
    /// two submissions for the same pair arrive together, one insert
    /// succeeds and the other fails here with [`StoreError::DuplicateVote`]
    /// before its counter update runs. Any failure after the insert rolls
    /// the whole pair back, so a counter can never drift from the vote
    /// rows.
    pub(crate) fn insert_vote(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        visitor_id: &str,
    ) -> Result<Vote> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let vote = Vote {
            id: VoteId::new(),
            poll_id,
            option_id,
            visitor_id: visitor_id.to_string(),
            created_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO votes (id, poll_id, option_id, visitor_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                vote.id.to_string(),
                vote.poll_id.to_string(),
                vote.option_id.to_string(),
                vote.visitor_id,
                vote.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateVote
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        let affected = tx.execute(
            "UPDATE poll_options SET votes = votes + 1 WHERE id = ?1 AND poll_id = ?2",
            params![vote.option_id.to_string(), vote.poll_id.to_string()],
        )?;
        if affected == 0 {
            // Option vanished or belongs elsewhere; dropping the
            // transaction rolls the vote insert back with it.
            return Err(StoreError::NotFound);
        }

        tx.commit()?;
        Ok(vote)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Map a `rusqlite::Row` to a [`Vote`].
fn row_to_vote(row: &rusqlite::Row<'_>) -> rusqlite::Result<Vote> {
    let id_str: String = row.get(0)?;
    let poll_id_str: String = row.get(1)?;
    let option_id_str: String = row.get(2)?;
    let visitor_id: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    Ok(Vote {
        id: VoteId(parse_uuid(0, &id_str)?),
        poll_id: PollId(parse_uuid(1, &poll_id_str)?),
        option_id: OptionId(parse_uuid(2, &option_id_str)?),
        visitor_id,
        created_at: parse_timestamp(4, &created_str)?,
    })
}
