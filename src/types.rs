//! Core data types for the Tether task tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum title length in characters (after trimming).
pub const TITLE_MAX: usize = 100;

/// Minimum title length in characters (after trimming).
pub const TITLE_MIN: usize = 3;

/// Maximum description length in characters.
pub const DESCRIPTION_MAX: usize = 500;

/// The unit of work in Tether.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier: "tt-" + 10 hex chars from content hash + entropy
    pub id: String,

    /// Short description of the work
    pub title: String,

    /// Optional longer description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current state
    pub status: Status,

    /// Scheduling weight
    pub priority: Priority,

    /// When work is planned to begin
    pub start_at: DateTime<Utc>,

    /// Deadline; never earlier than start_at
    pub due_at: DateTime<Utc>,

    /// Tasks that must complete before this one may start, resolved to
    /// summaries for display
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<DependencySummary>,

    /// Status timeline, oldest first; seeded with the creation status
    pub history: Vec<HistoryEntry>,

    /// When created
    pub created_at: DateTime<Utc>,

    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Identifiers of this task's direct dependencies.
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.depends_on.iter().map(|d| d.id.as_str())
    }
}

/// Task status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl Status {
    /// Stable textual form, as persisted and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "in_progress" => Ok(Status::InProgress),
            "completed" => Ok(Status::Completed),
            "overdue" => Ok(Status::Overdue),
            other => Err(format!(
                "unknown status '{}' (expected pending, in_progress, completed, or overdue)",
                other
            )),
        }
    }
}

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Stable textual form, as persisted and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!(
                "unknown priority '{}' (expected low, medium, or high)",
                other
            )),
        }
    }
}

/// A dependency reference resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencySummary {
    /// Identifier of the task depended on
    pub id: String,

    /// Its title at load time
    pub title: String,

    /// Its status at load time
    pub status: Status,
}

/// One entry in a task's status timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// The status entered
    pub status: Status,

    /// When it was entered
    pub at: DateTime<Utc>,
}

/// Input for creating a task. Status is not accepted here: every task
/// starts as `pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Defaults to `medium` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    pub start_at: DateTime<Utc>,

    pub due_at: DateTime<Utc>,

    /// Identifiers of tasks this one depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl NewTask {
    /// Validate field bounds. Range and reference checks live in the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_description(self.description.as_deref())
    }
}

/// Partial update applied to an existing task. Absent fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,

    /// Replaces the whole dependency set when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
}

impl TaskPatch {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.start_at.is_none()
            && self.due_at.is_none()
            && self.depends_on.is_none()
    }

    /// Validate field bounds. Range and reference checks live in the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_description(self.description.as_deref())
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = trimmed.chars().count();
    if len < TITLE_MIN {
        return Err(ValidationError::TitleTooShort);
    }
    if len > TITLE_MAX {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    if let Some(description) = description {
        if description.chars().count() > DESCRIPTION_MAX {
            return Err(ValidationError::DescriptionTooLong);
        }
    }
    Ok(())
}

/// Validation errors for task fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyTitle,
    TitleTooShort,
    TitleTooLong,
    DescriptionTooLong,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "title cannot be empty"),
            ValidationError::TitleTooShort => {
                write!(f, "title must be at least {} characters", TITLE_MIN)
            }
            ValidationError::TitleTooLong => {
                write!(f, "title exceeds {} characters", TITLE_MAX)
            }
            ValidationError::DescriptionTooLong => {
                write!(f, "description exceeds {} characters", DESCRIPTION_MAX)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_new(title: &str) -> NewTask {
        let now = Utc::now();
        NewTask {
            title: title.to_string(),
            description: None,
            priority: None,
            start_at: now,
            due_at: now + chrono::Duration::days(1),
            depends_on: vec![],
        }
    }

    #[test]
    fn test_new_task_validation_valid() {
        assert!(make_new("Valid title").validate().is_ok());
    }

    #[test]
    fn test_new_task_validation_empty_title() {
        assert_eq!(make_new("").validate(), Err(ValidationError::EmptyTitle));
        assert_eq!(make_new("   ").validate(), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_new_task_validation_title_too_short() {
        assert_eq!(make_new("ab").validate(), Err(ValidationError::TitleTooShort));
        // Surrounding whitespace does not count toward the length
        assert_eq!(make_new("  ab  ").validate(), Err(ValidationError::TitleTooShort));
    }

    #[test]
    fn test_new_task_validation_title_too_long() {
        assert_eq!(
            make_new(&"x".repeat(TITLE_MAX + 1)).validate(),
            Err(ValidationError::TitleTooLong)
        );
        assert!(make_new(&"x".repeat(TITLE_MAX)).validate().is_ok());
    }

    #[test]
    fn test_new_task_validation_description_too_long() {
        let mut new = make_new("Valid title");
        new.description = Some("d".repeat(DESCRIPTION_MAX + 1));
        assert_eq!(new.validate(), Err(ValidationError::DescriptionTooLong));

        new.description = Some("d".repeat(DESCRIPTION_MAX));
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_patch_validation_skips_absent_fields() {
        let patch = TaskPatch::default();
        assert!(patch.is_empty());
        assert!(patch.validate().is_ok());

        let patch = TaskPatch {
            title: Some("ab".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(patch.validate(), Err(ValidationError::TitleTooShort));
    }

    #[test]
    fn test_status_str_roundtrip() {
        for status in [Status::Pending, Status::InProgress, Status::Completed, Status::Overdue] {
            assert_eq!(status.as_str().parse::<Status>(), Ok(status));
        }
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn test_priority_str_roundtrip() {
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(priority.as_str().parse::<Priority>(), Ok(priority));
        }
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_task_serialization_roundtrip() {
        let now = Utc::now();
        let task = Task {
            id: "tt-test1234ab".to_string(),
            title: "Test task".to_string(),
            description: Some("details".to_string()),
            status: Status::Pending,
            priority: Priority::High,
            start_at: now,
            due_at: now + chrono::Duration::days(2),
            depends_on: vec![DependencySummary {
                id: "tt-dep0000001".to_string(),
                title: "Upstream".to_string(),
                status: Status::Completed,
            }],
            history: vec![HistoryEntry { status: Status::Pending, at: now }],
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&task).unwrap();
        let deserialized: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(task, deserialized);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"medium\"");
    }
}
