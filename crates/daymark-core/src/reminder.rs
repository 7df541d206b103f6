use chrono::{
  DateTime,
  Duration,
  Utc
};
use serde::Serialize;

use crate::task::Task;

pub const DEFAULT_ADVANCE_MINUTES: u32 =
  1;

/// Triggers closer than this to "now" are dropped instead of scheduled.
const MIN_LEAD_SECONDS: i64 = 5;

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct Reminder {
  pub task_id:    String,
  pub trigger_at: DateTime<Utc>,
  pub title:      String,
  pub body:       String
}

/// Local notifications to schedule for the given tasks.
///
/// A task gets one reminder `advance_minutes` before its start time when
/// alerts are enabled and it is not done yet. Sorted by trigger time.
#[tracing::instrument(skip(tasks), fields(tasks = tasks.len()))]
pub fn plan_reminders(
  tasks: &[Task],
  now: DateTime<Utc>,
  advance_minutes: u32
) -> Vec<Reminder> {
  let advance = advance_minutes
    .min(43_200);
  let earliest = now
    + Duration::seconds(
      MIN_LEAD_SECONDS
    );

  let mut reminders = Vec::new();
  for task in tasks {
    if !task.alert_enabled || task.done
    {
      continue;
    }

    let Some(start) = task.start_time
    else {
      tracing::debug!(
        task = %task.id,
        "alert enabled but no start \
         time; skipping"
      );
      continue;
    };

    let trigger_at = start
      - Duration::minutes(i64::from(
        advance
      ));
    if trigger_at <= earliest {
      tracing::debug!(
        task = %task.id,
        trigger = %trigger_at,
        "trigger already passed or \
         imminent; skipping"
      );
      continue;
    }

    reminders.push(Reminder {
      task_id: task.id.clone(),
      trigger_at,
      title: format!(
        "Task starts in {advance} min"
      ),
      body: format!(
        "{} starts soon",
        task.title
      )
    });
  }

  reminders.sort_by_key(|r| r.trigger_at);
  tracing::debug!(
    planned = reminders.len(),
    advance_minutes = advance,
    "planned reminders"
  );
  reminders
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };

  use super::plan_reminders;
  use crate::task::{
    NewTask,
    Priority,
    Task
  };

  fn task(
    id: &str,
    start_offset_minutes: Option<i64>,
    alert: bool
  ) -> Task {
    let now = base_now();
    let mut new_task = NewTask::new(
      format!("task {id}"),
      "2025-10-09"
        .parse()
        .expect("date key"),
      Priority::Medium
    );
    new_task.alert_enabled = alert;
    new_task.start_time =
      start_offset_minutes.map(|m| {
        now + Duration::minutes(m)
      });
    new_task
      .into_task(id.to_string())
      .expect("task")
  }

  fn base_now() -> chrono::DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2025, 10, 9, 9, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn schedules_one_minute_before_start() {
    let tasks =
      vec![task("a", Some(30), true)];
    let reminders = plan_reminders(
      &tasks,
      base_now(),
      1
    );
    assert_eq!(reminders.len(), 1);
    assert_eq!(
      reminders[0].trigger_at,
      base_now() + Duration::minutes(29)
    );
    assert_eq!(
      reminders[0].body,
      "task a starts soon"
    );
  }

  #[test]
  fn skips_disabled_done_and_untimed_tasks(
  ) {
    let mut done =
      task("done", Some(30), true);
    done.done = true;
    let tasks = vec![
      task("off", Some(30), false),
      task("untimed", None, true),
      done
    ];
    assert!(
      plan_reminders(
        &tasks,
        base_now(),
        1
      )
      .is_empty()
    );
  }

  #[test]
  fn skips_past_and_imminent_triggers() {
    let tasks = vec![
      task("past", Some(-10), true),
      // Trigger lands exactly at now.
      task("now", Some(1), true),
      task("later", Some(2), true)
    ];
    let reminders = plan_reminders(
      &tasks,
      base_now(),
      1
    );
    let ids = reminders
      .iter()
      .map(|r| r.task_id.as_str())
      .collect::<Vec<_>>();
    assert_eq!(ids, vec!["later"]);
  }

  #[test]
  fn orders_by_trigger_time() {
    let tasks = vec![
      task("b", Some(120), true),
      task("a", Some(60), true)
    ];
    let reminders = plan_reminders(
      &tasks,
      base_now(),
      10
    );
    let ids = reminders
      .iter()
      .map(|r| r.task_id.as_str())
      .collect::<Vec<_>>();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(
      reminders[0].title,
      "Task starts in 10 min"
    );
  }
}
