/*!
Creation of new tasks from a title and template values.

Building a task ([`create`]) is separate from storing it ([`insert`]), so that callers can adjust
a [`NewTask`] before it is persisted.  Storing happens in a single transaction: the task row is
created first to obtain its id, then its tags, list association and geofence, and finally the
task is saved again with its final state.
*/

use crate::errors::Result;
use crate::hooks::{self, Hooks};
use crate::lists::{DefaultList, JournalTask, OrderedListTask};
use crate::ordering::{journal_list, ordered_list};
use crate::prefs::Preferences;
use crate::storage::StorageTxn;
use crate::task::{Geofence, Tag, TagData, Task};
use crate::template::{self, replace_placeholders_for_new_task, TemplateValues};
use crate::title;
use crate::utils::{from_millis, start_of_day};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a new task should go once it has been stored.  These hints are never persisted on the
/// task itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingPlacement {
    /// Remote id of an ordered list.
    pub ordered_list_id: Option<String>,
    /// Uuid of a journal list.
    pub journal_list_id: Option<String>,
    /// Uid of a place to add a geofence for.
    pub place_id: Option<String>,
}

/// A task that has been built but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub task: Task,
    /// Names of the tags to add.
    pub tags: Vec<String>,
    pub placement: PendingPlacement,
}

fn add_tag(tags: &mut Vec<String>, name: &str) {
    if !tags.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        tags.push(name.to_string());
    }
}

/// Build a new task from preferences, template values and a title.
pub(crate) async fn create(
    txn: &mut dyn StorageTxn,
    prefs: &Preferences,
    values: Option<&TemplateValues>,
    title: Option<&str>,
    now: DateTime<Utc>,
) -> Result<NewTask> {
    let mut task = Task {
        uuid: Uuid::new_v4(),
        created: Some(now),
        modified: Some(now),
        priority: prefs.default_priority(),
        reminder_period: prefs.default_reminder_period(),
        reminder_flags: prefs.default_reminder_flags(),
        ..Task::default()
    };
    if let Some((rule, from_completion)) = prefs.default_recurrence() {
        task.set_recurrence(rule, from_completion);
    }
    let mut placement = PendingPlacement {
        place_id: prefs.default_location(),
        ..PendingPlacement::default()
    };

    let mut tags = vec![];
    for (key, value) in values.into_iter().flat_map(TemplateValues::iter) {
        match key {
            template::TAG => add_tag(&mut tags, value),
            template::ORDERED_LIST => placement.ordered_list_id = Some(value.to_string()),
            template::JOURNAL_LIST => placement.journal_list_id = Some(value.to_string()),
            template::PLACE => placement.place_id = Some(value.to_string()),
            template::DUE_DATE => {
                if let Ok(millis) = replace_placeholders_for_new_task(value, now).parse::<i64>() {
                    task.due = from_millis(millis);
                }
            }
            template::IMPORTANCE => {
                if let Ok(priority) = replace_placeholders_for_new_task(value, now).parse() {
                    task.priority = priority;
                }
            }
            template::HIDE_UNTIL => {
                if let Ok(millis) = replace_placeholders_for_new_task(value, now).parse::<i64>() {
                    task.hide_until = from_millis(millis).map(start_of_day);
                }
            }
            _ => log::debug!("Ignoring unknown template value {key}"),
        }
    }

    let has = |key: &str| values.is_some_and(|v| v.contains(key));
    if !has(template::DUE_DATE) {
        task.due = Task::create_due_date(prefs.default_urgency(), None, now);
    }
    if !has(template::HIDE_UNTIL) {
        task.hide_until = task.create_hide_until(prefs.default_hide_until(), None);
    }

    if tags.is_empty() {
        for uid in prefs.default_tags() {
            let Ok(uid) = Uuid::parse_str(&uid) else {
                log::warn!("Ignoring malformed default tag {uid}");
                continue;
            };
            if let Some(tag_data) = txn.get_tag_data_by_uid(uid).await? {
                add_tag(&mut tags, &tag_data.name);
            }
        }
    }

    if let Some(title) = title {
        let parsed = title::parse(title);
        task.title = Some(parsed.title);
        if let Some(priority) = parsed.priority {
            task.priority = priority;
        }
        for name in parsed.tags {
            // use the spelling of an existing tag, if there is one
            match txn.get_tag_data_by_name(&name).await {
                Ok(Some(existing)) => add_tag(&mut tags, &existing.name),
                Ok(None) => add_tag(&mut tags, &name),
                Err(e) => {
                    log::error!("Could not look up tag {name}: {e}");
                    add_tag(&mut tags, &name);
                }
            }
        }
    }

    Ok(NewTask {
        task,
        tags,
        placement,
    })
}

/// Store a new task with its tags, list association and geofence.
pub(crate) async fn insert(
    txn: &mut dyn StorageTxn,
    prefs: &Preferences,
    new_task: NewTask,
) -> Result<Task> {
    let task = txn.create_task(new_task.task).await?;
    finish(txn, prefs, task, new_task.tags, new_task.placement).await
}

/// Build and store a task from a title, creating a calendar event for it when a default
/// calendar is configured.
pub(crate) async fn basic_quick_add_task(
    txn: &mut dyn StorageTxn,
    prefs: &Preferences,
    hooks: &mut dyn Hooks,
    title: &str,
    now: DateTime<Utc>,
) -> Result<Task> {
    let NewTask {
        task,
        tags,
        placement,
    } = create(txn, prefs, None, Some(title), now).await?;
    let mut task = txn.create_task(task).await?;
    if let Some(calendar) = prefs.default_calendar() {
        if task.has_due_date() && !task.has_calendar_event() {
            hooks::create_event(hooks, &mut task, &calendar).await;
        }
    }
    finish(txn, prefs, task, tags, placement).await
}

async fn finish(
    txn: &mut dyn StorageTxn,
    prefs: &Preferences,
    task: Task,
    tags: Vec<String>,
    placement: PendingPlacement,
) -> Result<Task> {
    create_tags(txn, &task, &tags).await?;
    associate(txn, prefs, &task, &placement).await?;
    if let Some(place) = placement.place_id {
        if txn.get_place(&place).await?.is_some() {
            txn.add_geofence(Geofence::new(
                task.id,
                place,
                prefs.default_geofence_arrival(),
                prefs.default_geofence_departure(),
                prefs.default_geofence_radius(),
            ))
            .await?;
        } else {
            log::warn!("Not adding geofence for unknown place {place}");
        }
    }
    txn.set_task(task.clone()).await?;
    Ok(task)
}

/// Tag the task with each named tag, creating tag data for names not seen before.
async fn create_tags(txn: &mut dyn StorageTxn, task: &Task, names: &[String]) -> Result<()> {
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let tag_data = match txn.get_tag_data_by_name(name).await? {
            Some(tag_data) => tag_data,
            None => txn.create_tag_data(TagData::new(name.as_str())).await?,
        };
        tags.push(Tag::new(task.id, task.uuid, &tag_data));
    }
    txn.add_tags(tags).await
}

/// Put the task in the hinted list, or in the default list if there is no hint.
async fn associate(
    txn: &mut dyn StorageTxn,
    prefs: &Preferences,
    task: &Task,
    placement: &PendingPlacement,
) -> Result<()> {
    let add_to_top = prefs.add_tasks_to_top();
    if let Some(list_id) = &placement.ordered_list_id {
        let row = OrderedListTask::new(task.id, list_id.as_str());
        return ordered_list::insert(txn, row, add_to_top).await;
    }
    if let Some(calendar) = &placement.journal_list_id {
        return journal_list::insert(txn, new_journal_task(task, calendar), add_to_top).await;
    }
    match prefs.default_list() {
        DefaultList::Local => Ok(()),
        DefaultList::Ordered(list_id) => {
            let row = OrderedListTask::new(task.id, list_id);
            ordered_list::insert(txn, row, add_to_top).await
        }
        DefaultList::Journal(calendar) => {
            if txn.get_calendar(&calendar).await?.is_none() {
                log::warn!("Default list {calendar} does not exist; keeping task {} local", task.id);
                return Ok(());
            }
            journal_list::insert(txn, new_journal_task(task, &calendar), add_to_top).await
        }
    }
}

/// A journal association with a fresh remote id.
pub(crate) fn new_journal_task(task: &Task, calendar: &str) -> JournalTask {
    JournalTask {
        remote_id: Some(Uuid::new_v4().to_string()),
        parent: task.parent,
        ..JournalTask::new(task.id, calendar)
    }
}
