use crate::utils::{noon, start_of_day};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The local identifier of a task.  Zero means "not yet stored" when used as an id, and "no
/// parent" when used as a parent reference.
pub type TaskId = u64;

/// A task, as stored in the local repository.
///
/// Tasks form a forest through [`Task::parent`].  The remote-list membership of a task is not
/// recorded here, but in its association row (see [`crate::lists`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Local id, assigned by storage on creation.
    pub id: TaskId,
    /// Global id.  `Uuid::nil()` means no uuid has been assigned yet; storage invents one when
    /// the task is created.
    pub uuid: Uuid,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub deleted: Option<DateTime<Utc>>,
    pub due: Option<DateTime<Utc>>,
    pub hide_until: Option<DateTime<Utc>>,
    pub priority: i32,
    /// Random reminder period, in milliseconds.  Zero disables random reminders.
    pub reminder_period: i64,
    pub reminder_flags: u32,
    pub recurrence: Option<String>,
    pub repeat_from_completion: bool,
    /// Parent task, or 0 for a top-level task.
    pub parent: TaskId,
    pub calendar_uri: Option<String>,
    /// Do not trigger a remote sync for this save.  Not persisted.
    #[serde(skip)]
    pub suppress_sync: bool,
    /// Do not broadcast a refresh for this save.  Not persisted.
    #[serde(skip)]
    pub suppress_refresh: bool,
}

impl Default for Task {
    fn default() -> Self {
        Task {
            id: 0,
            uuid: Uuid::nil(),
            title: None,
            notes: None,
            created: None,
            modified: None,
            completed: None,
            deleted: None,
            due: None,
            hide_until: None,
            priority: Task::PRIORITY_NONE,
            reminder_period: 0,
            reminder_flags: 0,
            recurrence: None,
            repeat_from_completion: false,
            parent: 0,
            calendar_uri: None,
            suppress_sync: false,
            suppress_refresh: false,
        }
    }
}

/// Default due-date settings, as stored in preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    None,
    Today,
    Tomorrow,
    DayAfter,
    NextWeek,
    InTwoWeeks,
    NextMonth,
    SpecificDay,
    SpecificDayTime,
}

impl Urgency {
    pub fn from_setting(value: i64) -> Urgency {
        match value {
            1 => Urgency::Today,
            2 => Urgency::Tomorrow,
            3 => Urgency::DayAfter,
            4 => Urgency::NextWeek,
            5 => Urgency::InTwoWeeks,
            6 => Urgency::NextMonth,
            7 => Urgency::SpecificDay,
            8 => Urgency::SpecificDayTime,
            _ => Urgency::None,
        }
    }
}

/// Default hide-until settings, as stored in preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideUntil {
    None,
    Due,
    DayBefore,
    WeekBefore,
    SpecificDay,
    SpecificDayTime,
    DueTime,
}

impl HideUntil {
    pub fn from_setting(value: i64) -> HideUntil {
        match value {
            1 => HideUntil::Due,
            2 => HideUntil::DayBefore,
            3 => HideUntil::WeekBefore,
            4 => HideUntil::SpecificDay,
            5 => HideUntil::SpecificDayTime,
            6 => HideUntil::DueTime,
            _ => HideUntil::None,
        }
    }
}

impl Task {
    pub const PRIORITY_HIGH: i32 = 0;
    pub const PRIORITY_MEDIUM: i32 = 1;
    pub const PRIORITY_LOW: i32 = 2;
    pub const PRIORITY_NONE: i32 = 3;

    pub fn new() -> Task {
        Task::default()
    }

    pub fn has_parent(&self) -> bool {
        self.parent != 0
    }

    pub fn has_due_date(&self) -> bool {
        self.due.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    pub fn has_calendar_event(&self) -> bool {
        self.calendar_uri.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn set_recurrence(&mut self, rule: impl Into<String>, from_completion: bool) {
        self.recurrence = Some(rule.into());
        self.repeat_from_completion = from_completion;
    }

    /// Compute a due date from an urgency setting, relative to `now`.
    ///
    /// Date-only due dates are placed at noon; `SpecificDayTime` keeps the custom time.
    pub fn create_due_date(
        urgency: Urgency,
        custom: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let date = match urgency {
            Urgency::None => return None,
            Urgency::Today => now,
            Urgency::Tomorrow => now + Duration::days(1),
            Urgency::DayAfter => now + Duration::days(2),
            Urgency::NextWeek => now + Duration::weeks(1),
            Urgency::InTwoWeeks => now + Duration::weeks(2),
            Urgency::NextMonth => now.checked_add_months(Months::new(1))?,
            Urgency::SpecificDay => custom?,
            Urgency::SpecificDayTime => return custom,
        };
        Some(noon(date))
    }

    /// Compute a hide-until date from a setting, relative to this task's due date.
    pub fn create_hide_until(
        &self,
        setting: HideUntil,
        custom: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let date = match setting {
            HideUntil::None => return None,
            HideUntil::Due | HideUntil::DueTime => self.due?,
            HideUntil::DayBefore => self.due? - Duration::days(1),
            HideUntil::WeekBefore => self.due? - Duration::weeks(1),
            HideUntil::SpecificDay | HideUntil::SpecificDayTime => custom?,
        };
        match setting {
            HideUntil::SpecificDayTime | HideUntil::DueTime => Some(date),
            _ => Some(start_of_day(date)),
        }
    }
}
