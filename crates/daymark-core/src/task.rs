use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datekey::DateKey;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    /// Marker color shown for this priority.
    pub fn color(self) -> &'static str {
        match self {
            Priority::High => "#f87171",
            Priority::Medium => "#a78bfa",
            Priority::Low => "#4ade80",
        }
    }

    /// SGR code used when painting terminal output.
    pub fn ansi_code(self) -> &'static str {
        match self {
            Priority::High => "31",
            Priority::Medium => "35",
            Priority::Low => "32",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(anyhow!("unknown priority: {other} (expected High, Medium or Low)")),
        }
    }
}

/// A task as the backend delivers it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    pub date: DateKey,

    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub done: bool,

    #[serde(default)]
    pub alert_enabled: bool,
}

/// Fields for a task that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub content: Option<String>,
    pub date: DateKey,
    pub priority: Priority,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub alert_enabled: bool,
}

impl NewTask {
    pub fn new(title: impl Into<String>, date: DateKey, priority: Priority) -> Self {
        Self {
            title: title.into(),
            content: None,
            date,
            priority,
            start_time: None,
            end_time: None,
            alert_enabled: false,
        }
    }

    pub fn into_task(self, id: String) -> anyhow::Result<Task> {
        let task = Task {
            id,
            title: self.title.trim().to_string(),
            content: self.content.filter(|c| !c.trim().is_empty()),
            date: self.date,
            priority: self.priority,
            start_time: self.start_time,
            end_time: self.end_time,
            done: false,
            alert_enabled: self.alert_enabled,
        };
        task.validate()?;
        Ok(task)
    }
}

/// Partial update. `None` leaves a field alone; the nested `Option`s
/// on clearable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub date: Option<DateKey>,
    pub priority: Option<Priority>,
    pub start_time: Option<Option<DateTime<Utc>>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub done: Option<bool>,
    pub alert_enabled: Option<bool>,
}

impl TaskPatch {
    pub fn done(done: bool) -> Self {
        Self {
            done: Some(done),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Task {
    /// Returns the patched copy, validated; `self` is untouched on error.
    pub fn patched(&self, patch: &TaskPatch) -> anyhow::Result<Task> {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(content) = &patch.content {
            next.content = content.clone().filter(|c| !c.trim().is_empty());
        }
        if let Some(date) = &patch.date {
            next.date = date.clone();
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(start) = patch.start_time {
            next.start_time = start;
        }
        if let Some(end) = patch.end_time {
            next.end_time = end;
        }
        if let Some(done) = patch.done {
            next.done = done;
        }
        if let Some(alert) = patch.alert_enabled {
            next.alert_enabled = alert;
        }
        next.validate()?;
        Ok(next)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.title.trim().is_empty() {
            return Err(anyhow!("task title cannot be empty"));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time)
            && end <= start
        {
            return Err(anyhow!(
                "end time {} must be after start time {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            ));
        }
        Ok(())
    }
}
