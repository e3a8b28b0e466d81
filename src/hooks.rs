use crate::errors::Result;
use crate::task::Task;
use async_trait::async_trait;

/// Side effects of task operations that live outside the task store: calendar events and
/// change notifications.
#[async_trait]
pub trait Hooks: Send {
    /// Create a calendar event for the task in the given calendar, returning the event's URI,
    /// or `None` if no event was created.
    async fn create_task_event(&mut self, task: &Task, calendar: &str) -> Result<Option<String>>;

    /// Tell observers that tasks have changed.
    async fn broadcast_refresh(&mut self);
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl Hooks for NoopHooks {
    async fn create_task_event(&mut self, _task: &Task, _calendar: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn broadcast_refresh(&mut self) {}
}

/// Create the calendar event for a task, logging rather than returning failures.
pub(crate) async fn create_event(hooks: &mut dyn Hooks, task: &mut Task, calendar: &str) {
    match hooks.create_task_event(task, calendar).await {
        Ok(Some(uri)) => task.calendar_uri = Some(uri),
        Ok(None) => {}
        Err(e) => log::error!("Could not create calendar event for task {}: {e}", task.id),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::errors::Error;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub(crate) struct Recorded {
        /// (task id, calendar) for every event created.
        pub(crate) events: Vec<(u64, String)>,
        pub(crate) refreshes: usize,
    }

    /// Hooks that record what they were asked to do.  Clones share the record.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct RecordingHooks {
        pub(crate) recorded: Arc<Mutex<Recorded>>,
        pub(crate) fail_events: bool,
    }

    #[async_trait]
    impl Hooks for RecordingHooks {
        async fn create_task_event(
            &mut self,
            task: &Task,
            calendar: &str,
        ) -> Result<Option<String>> {
            if self.fail_events {
                return Err(Error::Usage("no calendar access".into()));
            }
            let mut recorded = self.recorded.lock().unwrap();
            recorded.events.push((task.id, calendar.to_string()));
            Ok(Some(format!("content://events/{}", recorded.events.len())))
        }

        async fn broadcast_refresh(&mut self) {
            self.recorded.lock().unwrap().refreshes += 1;
        }
    }

    #[tokio::test]
    async fn create_event_sets_uri() {
        let mut hooks = RecordingHooks::default();
        let mut task = Task {
            id: 7,
            ..Task::default()
        };
        create_event(&mut hooks, &mut task, "cal").await;
        assert_eq!(task.calendar_uri, Some("content://events/1".into()));
        assert_eq!(hooks.recorded.lock().unwrap().events, vec![(7, "cal".into())]);
    }

    #[tokio::test]
    async fn create_event_failure_is_logged() {
        let mut hooks = RecordingHooks {
            fail_events: true,
            ..RecordingHooks::default()
        };
        let mut task = Task::default();
        create_event(&mut hooks, &mut task, "cal").await;
        assert_eq!(task.calendar_uri, None);
    }

    #[tokio::test]
    async fn noop_hooks() -> Result<()> {
        let mut hooks = NoopHooks;
        assert_eq!(hooks.create_task_event(&Task::default(), "cal").await?, None);
        hooks.broadcast_refresh().await;
        Ok(())
    }
}
