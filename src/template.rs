//! Values for new tasks, as carried by a list or filter the task is created from.

use crate::utils::noon;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// Add a tag, by name.  May appear more than once.
pub const TAG: &str = "tag";
/// Put the task in the ordered list with this remote id.
pub const ORDERED_LIST: &str = "gtasks";
/// Put the task in the journal list with this uuid.
pub const JOURNAL_LIST: &str = "caldav";
/// Add a geofence for the place with this uid.
pub const PLACE: &str = "place";
/// Due date, in epoch milliseconds.  Placeholders are substituted.
pub const DUE_DATE: &str = "dueDate";
/// Priority.  Placeholders are substituted.
pub const IMPORTANCE: &str = "importance";
/// Hide-until date, in epoch milliseconds; truncated to the start of the day.
pub const HIDE_UNTIL: &str = "hideUntil";

/// An ordered collection of key/value pairs to apply to a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateValues(Vec<(String, String)>);

impl TemplateValues {
    pub fn new() -> TemplateValues {
        TemplateValues::default()
    }

    /// Add a value, returning self for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> TemplateValues {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Replace date placeholders in `value` with epoch-millisecond values relative to `now`.
///
/// For new tasks every end-of-day placeholder means noon of that day, so that a task created
/// from a "due today" list is due today without a specific time.
pub fn replace_placeholders_for_new_task(value: &str, now: DateTime<Utc>) -> String {
    let day = |days: i64| noon(now + Duration::days(days)).timestamp_millis();
    let next_month = noon(now.checked_add_months(Months::new(1)).unwrap_or(now)).timestamp_millis();

    let replacements = [
        ("NOW()", now.timestamp_millis()),
        ("EOD()", day(0)),
        ("NOON()", day(0)),
        ("EOD_YESTERDAY()", day(-1)),
        ("NOON_YESTERDAY()", day(-1)),
        ("EOD_TOMORROW()", day(1)),
        ("NOON_TOMORROW()", day(1)),
        ("EOD_DAY_AFTER()", day(2)),
        ("NOON_DAY_AFTER()", day(2)),
        ("EOD_NEXT_WEEK()", day(7)),
        ("NOON_NEXT_WEEK()", day(7)),
        ("EOD_NEXT_MONTH()", next_month),
        ("NOON_NEXT_MONTH()", next_month),
    ];

    let mut value = value.to_string();
    for (placeholder, millis) in replacements {
        if value.contains(placeholder) {
            value = value.replace(placeholder, &millis.to_string());
        }
    }
    value
}
