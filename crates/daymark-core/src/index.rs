use std::collections::BTreeMap;

use tracing::debug;

use crate::datekey::DateKey;
use crate::progress::{Progress, progress_for};
use crate::task::{Priority, Task};

pub type DateGroups<'a> = BTreeMap<DateKey, Vec<&'a Task>>;

/// Groups tasks by their date key, keeping input order within each day.
/// Days without tasks get no entry.
pub fn group_by_date(tasks: &[Task]) -> DateGroups<'_> {
    let mut groups: DateGroups<'_> = BTreeMap::new();
    for task in tasks {
        groups.entry(task.date.clone()).or_default().push(task);
    }
    groups
}

/// Per-day priority lists, in the same order as the grouped tasks.
pub fn markers_for(groups: &DateGroups<'_>) -> BTreeMap<DateKey, Vec<Priority>> {
    groups
        .iter()
        .map(|(key, tasks)| (key.clone(), tasks.iter().map(|t| t.priority).collect()))
        .collect()
}

/// The single marker a calendar day shows: the priority of the task
/// appended last for that day.
pub fn display_marker(priorities: &[Priority]) -> Option<Priority> {
    priorities.last().copied()
}

pub fn lookup_by_id<'a>(tasks: &'a [Task], id: &str) -> Option<&'a Task> {
    tasks.iter().find(|task| task.id == id)
}

/// Date-keyed projection over one snapshot of the task collection.
///
/// Never patched in place: rebuild it after the collection changes.
#[derive(Debug, Clone)]
pub struct TaskDateIndex<'a> {
    groups: DateGroups<'a>,
}

impl<'a> TaskDateIndex<'a> {
    #[tracing::instrument(skip(tasks), fields(tasks = tasks.len()))]
    pub fn build(tasks: &'a [Task]) -> Self {
        let groups = group_by_date(tasks);
        debug!(days = groups.len(), "built task date index");
        Self { groups }
    }

    pub fn groups(&self) -> &DateGroups<'a> {
        &self.groups
    }

    pub fn tasks_on(&self, key: &DateKey) -> &[&'a Task] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn markers(&self) -> BTreeMap<DateKey, Vec<Priority>> {
        markers_for(&self.groups)
    }

    pub fn marker_on(&self, key: &DateKey) -> Option<Priority> {
        self.tasks_on(key).last().map(|task| task.priority)
    }

    pub fn progress_on(&self, key: &DateKey) -> Progress {
        progress_for(self.tasks_on(key).iter().copied())
    }

    pub fn progress_across<'k, I>(&self, keys: I) -> Progress
    where
        I: IntoIterator<Item = &'k DateKey>,
    {
        progress_for(keys.into_iter().flat_map(|key| self.tasks_on(key).iter().copied()))
    }

    pub fn day_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;

    fn task(id: &str, date: &str, priority: Priority) -> Task {
        NewTask::new(format!("task {id}"), date.parse().expect("date key"), priority)
            .into_task(id.to_string())
            .expect("task")
    }

    fn key(raw: &str) -> DateKey {
        raw.parse().expect("date key")
    }

    #[test]
    fn groups_preserve_insertion_order() {
        let tasks = vec![
            task("1", "2025-10-09", Priority::Low),
            task("2", "2025-10-09", Priority::High),
            task("3", "2025-10-10", Priority::Medium),
        ];

        let groups = group_by_date(&tasks);
        assert_eq!(groups.len(), 2);
        let ids = groups[&key("2025-10-09")]
            .iter()
            .map(|t| t.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(groups[&key("2025-10-10")][0].id, "3");
    }

    #[test]
    fn every_task_lands_in_exactly_one_group() {
        let tasks = (0..50)
            .map(|i| {
                let date = format!("2025-10-{:02}", i % 7 + 1);
                task(&i.to_string(), &date, Priority::Low)
            })
            .collect::<Vec<_>>();

        let groups = group_by_date(&tasks);
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, tasks.len());
        assert!(groups.values().all(|g| !g.is_empty()));

        let mut seen = groups
            .values()
            .flatten()
            .map(|t| t.id.clone())
            .collect::<Vec<_>>();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), tasks.len());
    }

    #[test]
    fn empty_input_gives_empty_results() {
        let index = TaskDateIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.markers().is_empty());
        assert!(index.tasks_on(&key("2025-10-09")).is_empty());
        assert_eq!(index.marker_on(&key("2025-10-09")), None);
        assert_eq!(index.progress_on(&key("2025-10-09")), Progress::EMPTY);
    }

    #[test]
    fn last_appended_priority_is_the_day_marker() {
        let tasks = vec![
            task("1", "2025-10-09", Priority::High),
            task("2", "2025-10-09", Priority::Low),
            task("3", "2025-10-10", Priority::Medium),
        ];
        let index = TaskDateIndex::build(&tasks);

        let markers = index.markers();
        assert_eq!(
            markers[&key("2025-10-09")],
            vec![Priority::High, Priority::Low]
        );
        assert_eq!(
            display_marker(&markers[&key("2025-10-09")]),
            Some(Priority::Low)
        );
        assert_eq!(index.marker_on(&key("2025-10-09")), Some(Priority::Low));
        assert_eq!(index.marker_on(&key("2025-10-10")), Some(Priority::Medium));
        assert_eq!(display_marker(&[]), None);
    }

    #[test]
    fn lookup_scans_by_id() {
        let tasks = vec![
            task("a", "2025-10-09", Priority::High),
            task("b", "2025-10-10", Priority::Low),
        ];
        assert_eq!(lookup_by_id(&tasks, "b").map(|t| t.priority), Some(Priority::Low));
        assert!(lookup_by_id(&tasks, "missing").is_none());
    }

    #[test]
    fn progress_spans_several_days() {
        let mut tasks = vec![
            task("1", "2025-10-09", Priority::High),
            task("2", "2025-10-09", Priority::Low),
            task("3", "2025-10-10", Priority::Medium),
            task("4", "2025-10-11", Priority::Medium),
        ];
        tasks[0].done = true;
        tasks[2].done = true;
        tasks[3].done = true;

        let index = TaskDateIndex::build(&tasks);
        let progress = index.progress_across([&key("2025-10-09"), &key("2025-10-10")]);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.total, 3);
        assert_eq!(index.progress_on(&key("2025-10-09")).completed, 1);
    }

    #[test]
    fn rebuilding_reflects_mutations() {
        let mut tasks = vec![task("1", "2025-10-09", Priority::High)];
        assert_eq!(TaskDateIndex::build(&tasks).day_count(), 1);

        tasks.push(task("2", "2025-10-12", Priority::Low));
        tasks[0].date = key("2025-10-12");
        let index = TaskDateIndex::build(&tasks);
        assert_eq!(index.day_count(), 1);
        assert_eq!(index.tasks_on(&key("2025-10-12")).len(), 2);

        tasks.clear();
        assert!(TaskDateIndex::build(&tasks).is_empty());
    }
}
