use super::TaskId;
use serde::{Deserialize, Serialize};

/// A named geographic location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub uid: String,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A location-based reminder for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geofence {
    /// Local id, assigned by storage.
    pub id: u64,
    pub task_id: TaskId,
    /// Uid of the [`Place`] this geofence surrounds.
    pub place: String,
    pub arrival: bool,
    pub departure: bool,
    /// Radius in meters.
    pub radius: u32,
}

impl Geofence {
    pub fn new(
        task_id: TaskId,
        place: impl Into<String>,
        arrival: bool,
        departure: bool,
        radius: u32,
    ) -> Geofence {
        Geofence {
            id: 0,
            task_id,
            place: place.into(),
            arrival,
            departure,
            radius,
        }
    }
}
