#![allow(clippy::module_inception)]
mod alarm;
mod location;
mod tag;
mod task;

pub use alarm::Alarm;
pub use location::{Geofence, Place};
pub use tag::{Tag, TagData};
pub use task::{HideUntil, Task, TaskId, Urgency};
