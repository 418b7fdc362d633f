//! Creation- and submission-time validation.
//!
//! Failures are `PollError::InvalidInput` and short-circuit before any
//! storage call, so a rejected request has no side effects.

use crate::error::{PollError, Result};
use crate::store::PollDraft;

pub const QUESTION_MIN_CHARS: usize = 5;
pub const QUESTION_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const OPTION_MIN_CHARS: usize = 1;
pub const OPTION_MAX_CHARS: usize = 100;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

/// Validate a poll draft against the creation rules.
pub fn poll_draft(draft: &PollDraft) -> Result<()> {
    let question_len = draft.question.chars().count();
    if question_len < QUESTION_MIN_CHARS || question_len > QUESTION_MAX_CHARS {
        return Err(PollError::InvalidInput(format!(
            "question must be {QUESTION_MIN_CHARS}-{QUESTION_MAX_CHARS} characters"
        )));
    }

    if let Some(description) = &draft.description {
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(PollError::InvalidInput(format!(
                "description must be at most {DESCRIPTION_MAX_CHARS} characters"
            )));
        }
    }

    if draft.options.len() < MIN_OPTIONS || draft.options.len() > MAX_OPTIONS {
        return Err(PollError::InvalidInput(format!(
            "a poll needs {MIN_OPTIONS}-{MAX_OPTIONS} options"
        )));
    }

    for option in &draft.options {
        let len = option.chars().count();
        if len < OPTION_MIN_CHARS || len > OPTION_MAX_CHARS {
            return Err(PollError::InvalidInput(format!(
                "each option must be {OPTION_MIN_CHARS}-{OPTION_MAX_CHARS} characters"
            )));
        }
    }

    Ok(())
}

/// The visitor identifier is opaque and caller-supplied; the only rule is
/// that it is non-empty.
pub fn visitor_id(visitor_id: &str) -> Result<()> {
    if visitor_id.trim().is_empty() {
        return Err(PollError::InvalidInput("visitor id is required".into()));
    }
    Ok(())
}
