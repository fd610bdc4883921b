use crate::{
    error::{Result, WorkItemError},
    models::{NewWorkItem, NoteUpsert, UpdateWorkItem, MAX_NOTE_KEY_LEN, MAX_SUMMARY_LEN},
    roles::Role,
};

/// Validation utilities for work-item inputs.
///
/// Validation runs at the tool boundary, before any state mutation; the
/// orchestrators assume inputs that pass these checks.
pub struct ItemValidator;

impl ItemValidator {
    /// Titles must be non-empty after trimming.
    pub fn validate_title(title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(WorkItemError::empty_field("title"));
        }
        Ok(())
    }

    /// Summaries are capped at [`MAX_SUMMARY_LEN`] characters.
    pub fn validate_summary(summary: &str) -> Result<()> {
        if summary.chars().count() > MAX_SUMMARY_LEN {
            return Err(WorkItemError::Validation(format!(
                "summary exceeds {MAX_SUMMARY_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Complexity is an estimate in 1..=10.
    pub fn validate_complexity(complexity: i64) -> Result<()> {
        if !(1..=10).contains(&complexity) {
            return Err(WorkItemError::Validation(format!(
                "complexity must be between 1 and 10, got {complexity}"
            )));
        }
        Ok(())
    }

    /// Tags are comma-joined lower-case kebab identifiers: letters, digits
    /// and single interior hyphens.
    pub fn validate_tags(tags: &str) -> Result<()> {
        for tag in tags.split(',') {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            let well_formed = tag
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && !tag.starts_with('-')
                && !tag.ends_with('-')
                && !tag.contains("--");
            if !well_formed {
                return Err(WorkItemError::Validation(format!(
                    "tag '{tag}' is not a lower-case kebab identifier"
                )));
            }
        }
        Ok(())
    }

    /// Note keys are non-blank and capped at [`MAX_NOTE_KEY_LEN`] characters.
    pub fn validate_note_key(key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(WorkItemError::empty_field("key"));
        }
        if key.chars().count() > MAX_NOTE_KEY_LEN {
            return Err(WorkItemError::Validation(format!(
                "note key exceeds {MAX_NOTE_KEY_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Notes belong to a ladder phase before terminal: queue, work or review.
    pub fn validate_note_role(role: Role) -> Result<()> {
        match role {
            Role::Queue | Role::Work | Role::Review => Ok(()),
            other => Err(WorkItemError::Validation(format!(
                "note role must be queue, work or review, got '{other}'"
            ))),
        }
    }

    /// Full check of creation input.
    pub fn validate_new_item(new: &NewWorkItem) -> Result<()> {
        Self::validate_title(&new.title)?;
        Self::validate_summary(&new.summary)?;
        Self::validate_complexity(new.complexity)?;
        if let Some(ref tags) = new.tags {
            Self::validate_tags(tags)?;
        }
        Ok(())
    }

    /// Full check of update input (structural parent checks live in the
    /// item manager, which has store access).
    pub fn validate_update(update: &UpdateWorkItem) -> Result<()> {
        if let Some(ref title) = update.title {
            Self::validate_title(title)?;
        }
        if let Some(ref summary) = update.summary {
            Self::validate_summary(summary)?;
        }
        if let Some(complexity) = update.complexity {
            Self::validate_complexity(complexity)?;
        }
        if let Some(Some(ref tags)) = update.tags {
            Self::validate_tags(tags)?;
        }
        Ok(())
    }

    /// Full check of note upsert input.
    pub fn validate_note(note: &NoteUpsert) -> Result<()> {
        Self::validate_note_key(&note.key)?;
        Self::validate_note_role(note.role)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_must_not_be_blank() {
        assert!(ItemValidator::validate_title("ship it").is_ok());
        assert!(ItemValidator::validate_title("   ").is_err());
        assert!(ItemValidator::validate_title("").is_err());
    }

    #[test]
    fn test_summary_length_cap() {
        assert!(ItemValidator::validate_summary(&"x".repeat(MAX_SUMMARY_LEN)).is_ok());
        assert!(ItemValidator::validate_summary(&"x".repeat(MAX_SUMMARY_LEN + 1)).is_err());
    }

    #[test]
    fn test_complexity_bounds() {
        assert!(ItemValidator::validate_complexity(1).is_ok());
        assert!(ItemValidator::validate_complexity(10).is_ok());
        assert!(ItemValidator::validate_complexity(0).is_err());
        assert!(ItemValidator::validate_complexity(11).is_err());
    }

    #[test]
    fn test_tag_format() {
        assert!(ItemValidator::validate_tags("feature-task,bug-fix").is_ok());
        assert!(ItemValidator::validate_tags("a, b2, c-3").is_ok());
        assert!(ItemValidator::validate_tags("Feature").is_err());
        assert!(ItemValidator::validate_tags("-leading").is_err());
        assert!(ItemValidator::validate_tags("trailing-").is_err());
        assert!(ItemValidator::validate_tags("double--hyphen").is_err());
        assert!(ItemValidator::validate_tags("under_score").is_err());
    }

    #[test]
    fn test_note_key_bounds() {
        assert!(ItemValidator::validate_note_key("acceptance-criteria").is_ok());
        assert!(ItemValidator::validate_note_key(" ").is_err());
        assert!(ItemValidator::validate_note_key(&"k".repeat(MAX_NOTE_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_note_role_subset() {
        assert!(ItemValidator::validate_note_role(Role::Queue).is_ok());
        assert!(ItemValidator::validate_note_role(Role::Review).is_ok());
        assert!(ItemValidator::validate_note_role(Role::Terminal).is_err());
        assert!(ItemValidator::validate_note_role(Role::Blocked).is_err());
    }
}
