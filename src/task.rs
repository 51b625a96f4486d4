//! Agenda tasks (activities bound to a single calendar day)

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, NaiveTime};

use crate::error::{AgendaError, AgendaResult};

/// Opaque, immutable identifier of a task
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}


/// The lifecycle stage of a task.
///
/// It only moves forward through [`TaskStatus::next`], in the fixed cycle
/// `pending → in_progress → completed → pending`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn next(self) -> Self {
        match self {
            TaskStatus::Pending => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        }
    }

    pub fn is_completed(&self) -> bool {
        *self == TaskStatus::Completed
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// User-assigned priority tier, independent of the status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Medium
    }
}


/// An optional `[start, end)` time range within the task's day
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "hh_mm")]
    start: NaiveTime,
    #[serde(with = "hh_mm")]
    end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> AgendaResult<Self> {
        if start >= end {
            return Err(AgendaError::Validation(format!("time slot must end after it starts ({} - {})", start.format("%H:%M"), end.format("%H:%M"))));
        }
        Ok(Self { start, end })
    }

    /// Parse a slot from two `HH:MM` strings
    pub fn parse(start: &str, end: &str) -> AgendaResult<Self> {
        let start = hh_mm::parse(start).map_err(AgendaError::Validation)?;
        let end = hh_mm::parse(end).map_err(AgendaError::Validation)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveTime { self.start }
    pub fn end(&self) -> NaiveTime   { self.end   }

    /// Whether this slot covers the given instant
    pub fn covers(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// (De)serializes times as `HH:MM`
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(s: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(s, FORMAT)
            .map_err(|err| format!("invalid time {:?}: {}", s, err))
    }

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}


/// A schedulable item bound to exactly one calendar day
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Assigned once at creation, never changed
    id: TaskId,
    /// The display name, never empty
    name: String,
    #[serde(default)]
    description: String,
    /// The day bucket this task belongs to. Edits never move a task to another day
    date: NaiveDate,
    status: TaskStatus,
    #[serde(default)]
    urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<TimeSlot>,
}


impl Task {
    /// Build a brand new task from a draft. The status is always `pending`.
    pub(crate) fn new(id: TaskId, date: NaiveDate, draft: TaskDraft) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            date,
            status: TaskStatus::Pending,
            urgency: draft.urgency,
            time: draft.time,
        }
    }

    pub fn id(&self) -> &TaskId              { &self.id          }
    pub fn name(&self) -> &str               { &self.name        }
    pub fn description(&self) -> &str        { &self.description }
    pub fn date(&self) -> NaiveDate          { self.date         }
    pub fn status(&self) -> TaskStatus       { self.status       }
    pub fn urgency(&self) -> Urgency         { self.urgency      }
    pub fn time(&self) -> Option<&TimeSlot>  { self.time.as_ref() }
    pub fn completed(&self) -> bool          { self.status.is_completed() }

    /// Move to the next status of the cycle
    pub(crate) fn advance_status(&mut self) {
        self.status = self.status.next();
    }

    /// Merge the fields of a patch into this task.
    /// `id`, `date` and `status` cannot be changed this way.
    pub(crate) fn apply(&mut self, patch: TaskPatch) -> AgendaResult<()> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }

        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(urgency) = patch.urgency {
            self.urgency = urgency;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        Ok(())
    }

    /// Whether both tasks carry the same user-visible data
    pub fn has_same_observable_content_as(&self, other: &Task) -> bool {
           self.id == other.id
        && self.name == other.name
        && self.date == other.date
        && self.status == other.status
        && self.urgency == other.urgency
    }
}

pub(crate) fn validate_name(name: &str) -> AgendaResult<()> {
    if name.trim().is_empty() {
        return Err(AgendaError::Validation("a task needs a name".to_string()));
    }
    Ok(())
}


/// What the user typed before hitting "save"
#[derive(Clone, Debug, Default)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    /// The day to file the task under. `None` means the currently selected day
    pub date: Option<NaiveDate>,
    pub urgency: Urgency,
    pub time: Option<TimeSlot>,
}

impl TaskDraft {
    pub fn new<S: ToString>(name: S) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_description<S: ToString>(mut self, description: S) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_time(mut self, time: TimeSlot) -> Self {
        self.time = Some(time);
        self
    }
}

/// A partial edit of a task. `None` fields are left untouched
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub urgency: Option<Urgency>,
    /// `Some(None)` clears the time slot
    pub time: Option<Option<TimeSlot>>,
}
