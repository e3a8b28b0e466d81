/*!
User preferences consulted when creating and duplicating tasks.

Preferences are read through a [`PreferenceSource`], which yields raw string values by key, and
interpreted by [`Preferences`].  Values that are missing or fail to parse fall back to the
defaults below.

| key                          | type   | default | meaning                                            |
|------------------------------|--------|---------|----------------------------------------------------|
| `default_priority`           | int    | 2       | priority of new tasks                              |
| `default_recurrence`         | string |         | recurrence rule of new tasks                       |
| `default_recurrence_from`    | int    | 0       | 1 to repeat from the completion date               |
| `default_location`           | string |         | place uid new tasks get a geofence for             |
| `default_random_hours`       | int    | 0       | random reminder period, in hours                   |
| `default_reminders`          | int    | 0       | reminder flags                                     |
| `default_ring_mode`          | int    | 0       | reminder ring-mode flags                           |
| `default_urgency`            | int    | 0       | due-date setting, see [`Urgency`]                  |
| `default_hide_until`         | int    | 0       | hide-until setting, see [`HideUntil`]              |
| `default_tags`               | string |         | comma-separated tag uids                           |
| `default_list`               | string |         | `ordered:<id>` or `journal:<uuid>`                 |
| `add_tasks_to_top`           | bool   | true    | insert new tasks first rather than last            |
| `default_calendar`           | string |         | calendar for task events; unset disables events    |
| `default_geofence_radius`    | int    | 250     | radius of new geofences, in meters                 |
| `default_geofence_arrival`   | bool   | true    | notify on arrival                                  |
| `default_geofence_departure` | bool   | false   | notify on departure                                |
*/

use crate::errors::{Error, Result};
use crate::lists::DefaultList;
use crate::task::{HideUntil, Task, Urgency};
use std::collections::HashMap;

const ONE_HOUR_MILLIS: i64 = 60 * 60 * 1000;

/// A source of raw preference values.
pub trait PreferenceSource: Send {
    /// Get the value stored for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// A [`PreferenceSource`] backed by a map, suitable for tests and for preferences loaded from a
/// JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapPreferences(HashMap<String, String>);

impl MapPreferences {
    pub fn new() -> MapPreferences {
        MapPreferences::default()
    }

    /// Load preferences from a JSON object.  Strings, numbers and booleans are accepted as
    /// values; `null` leaves the key unset.
    pub fn from_json(json: &str) -> Result<MapPreferences> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(obj) = value else {
            return Err(Error::Usage("Preferences must be a JSON object".into()));
        };
        let mut map = HashMap::new();
        for (key, value) in obj {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                serde_json::Value::Bool(_) | serde_json::Value::Number(_) => value.to_string(),
                _ => {
                    return Err(Error::Usage(format!(
                        "Preference {key} must be a string, number or boolean"
                    )))
                }
            };
            map.insert(key, value);
        }
        Ok(MapPreferences(map))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }
}

impl PreferenceSource for MapPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Typed access to preferences.
pub struct Preferences {
    source: Box<dyn PreferenceSource>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences::new(MapPreferences::new())
    }
}

impl Preferences {
    pub fn new(source: impl PreferenceSource + 'static) -> Preferences {
        Preferences {
            source: Box::new(source),
        }
    }

    /// A non-blank string value.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.source.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.parsed(key).unwrap_or(default)
    }

    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        self.parsed(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.parsed(key).unwrap_or(default)
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let value = self.source.get(key)?;
        match value.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("Ignoring unparsable value {value:?} for preference {key}");
                None
            }
        }
    }

    pub fn default_priority(&self) -> i32 {
        self.get_int("default_priority", Task::PRIORITY_LOW)
    }

    /// The default recurrence rule, and whether it repeats from the completion date.
    pub fn default_recurrence(&self) -> Option<(String, bool)> {
        let rule = self.get_string("default_recurrence")?;
        Some((rule, self.get_int("default_recurrence_from", 0) == 1))
    }

    pub fn default_location(&self) -> Option<String> {
        self.get_string("default_location")
    }

    /// The default random reminder period, in milliseconds.
    pub fn default_reminder_period(&self) -> i64 {
        ONE_HOUR_MILLIS * self.get_long("default_random_hours", 0)
    }

    pub fn default_reminder_flags(&self) -> u32 {
        let reminders = self.get_long("default_reminders", 0);
        let ring_mode = self.get_long("default_ring_mode", 0);
        u32::try_from(reminders | ring_mode).unwrap_or(0)
    }

    pub fn default_urgency(&self) -> Urgency {
        Urgency::from_setting(self.get_long("default_urgency", 0))
    }

    pub fn default_hide_until(&self) -> HideUntil {
        HideUntil::from_setting(self.get_long("default_hide_until", 0))
    }

    /// Uids of the tags new tasks get when no tags are given.
    pub fn default_tags(&self) -> Vec<String> {
        self.get_string("default_tags")
            .map(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn default_list(&self) -> DefaultList {
        self.get_string("default_list")
            .map(|v| DefaultList::parse(&v))
            .unwrap_or(DefaultList::Local)
    }

    pub fn add_tasks_to_top(&self) -> bool {
        self.get_bool("add_tasks_to_top", true)
    }

    pub fn default_calendar(&self) -> Option<String> {
        self.get_string("default_calendar")
    }

    pub fn is_default_calendar_set(&self) -> bool {
        self.default_calendar().is_some()
    }

    pub fn default_geofence_radius(&self) -> u32 {
        u32::try_from(self.get_long("default_geofence_radius", 250)).unwrap_or(250)
    }

    pub fn default_geofence_arrival(&self) -> bool {
        self.get_bool("default_geofence_arrival", true)
    }

    pub fn default_geofence_departure(&self) -> bool {
        self.get_bool("default_geofence_departure", false)
    }
}
