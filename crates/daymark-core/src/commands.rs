use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::agenda::agenda;
use crate::calendar::{MonthView, shift_month};
use crate::cli::{AddArgs, Command, EditArgs};
use crate::config::Config;
use crate::datekey::DateKey;
use crate::datetime::{parse_date_expr, parse_time_on, to_project_date};
use crate::reminder::plan_reminders;
use crate::render::Renderer;
use crate::store::{TaskCache, TaskService};
use crate::task::{NewTask, Priority, TaskPatch};

#[instrument(skip(service, cfg, renderer, command))]
pub fn dispatch<S: TaskService>(
    service: &S,
    cfg: &Config,
    renderer: &Renderer,
    command: Option<Command>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let today = to_project_date(now);
    let command = command.unwrap_or(Command::Month {
        date: None,
        prev: 0,
        next: 0,
    });
    debug!(?command, %today, "dispatching command");

    let mut cache = TaskCache::default();
    cache.reload(service)?;

    match command {
        Command::Month { date, prev, next } => {
            let reference = resolve_date(date.as_deref(), today)?;
            let offset = i64::from(next) - i64::from(prev);
            let target = shift_month(reference, offset)
                .ok_or_else(|| anyhow!("month offset out of range: {offset}"))?;
            let view = MonthView::build(target, today);
            renderer.print_month(&view, &cache.index())
        }
        Command::Day { date } => {
            let key = match date.as_deref() {
                Some(raw) => DateKey::from_date(&parse_date_expr(raw, today)?),
                None => DateKey::from_instant(now),
            };
            let index = cache.index();
            renderer.print_day(&key, index.tasks_on(&key), index.progress_on(&key))
        }
        Command::Agenda => renderer.print_agenda(&agenda(&cache.index(), today)),
        Command::List => renderer.print_task_list(&cache.index()),
        Command::Info { id } => {
            let task = cache.get(&id).ok_or_else(|| anyhow!("task not found: {id}"))?;
            renderer.print_task_info(task)
        }
        Command::Add(args) => cmd_add(service, cfg, args, today),
        Command::Edit(args) => cmd_edit(service, &cache, args, today),
        Command::Done { id } => cmd_toggle(service, &id, true),
        Command::Undone { id } => cmd_toggle(service, &id, false),
        Command::Delete { id } => {
            service.delete(&id)?;
            println!("Deleted task {id}.");
            Ok(())
        }
        Command::Remind => {
            let advance = cfg.reminder_advance_minutes()?;
            let reminders = plan_reminders(cache.tasks(), now, advance);
            renderer.print_reminders(&reminders)
        }
    }
}

fn resolve_date(expr: Option<&str>, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    match expr {
        Some(raw) => parse_date_expr(raw, today),
        None => Ok(today),
    }
}

fn parse_priority(raw: Option<&str>, cfg: &Config) -> anyhow::Result<Priority> {
    match raw {
        Some(raw) => raw.parse(),
        None => cfg.default_priority(),
    }
}

#[instrument(skip(service, cfg, args), fields(title = %args.title))]
fn cmd_add<S: TaskService>(service: &S, cfg: &Config, args: AddArgs, today: NaiveDate) -> anyhow::Result<()> {
    let date = parse_date_expr(&args.date, today)?;
    let mut new_task = NewTask::new(
        args.title,
        DateKey::from_date(&date),
        parse_priority(args.priority.as_deref(), cfg)?,
    );
    new_task.content = args.content;
    new_task.start_time = args
        .start
        .as_deref()
        .map(|raw| parse_time_on(raw, date))
        .transpose()
        .context("invalid --start")?;
    new_task.end_time = args
        .end
        .as_deref()
        .map(|raw| parse_time_on(raw, date))
        .transpose()
        .context("invalid --end")?;
    new_task.alert_enabled = args.alert;

    let task = service.create(new_task)?;
    info!(id = %task.id, date = %task.date, "task created");
    println!("Created task {} on {}.", task.id, task.date);
    Ok(())
}

#[instrument(skip(service, cache, args), fields(id = %args.id))]
fn cmd_edit<S: TaskService>(
    service: &S,
    cache: &TaskCache,
    args: EditArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let current = cache
        .get(&args.id)
        .ok_or_else(|| anyhow!("task not found: {}", args.id))?;

    let date = args
        .date
        .as_deref()
        .map(|raw| parse_date_expr(raw, today))
        .transpose()?;
    // Clock times are read against the task's (possibly new) date.
    let time_base = match date {
        Some(date) => date,
        None => current.date.to_date()?,
    };

    let mut patch = TaskPatch {
        title: args.title,
        content: args.content.map(|c| Some(c).filter(|c| !c.trim().is_empty())),
        date: date.map(DateKey::from),
        priority: args.priority.as_deref().map(str::parse::<Priority>).transpose()?,
        ..TaskPatch::default()
    };
    if args.clear_times {
        patch.start_time = Some(None);
        patch.end_time = Some(None);
    } else {
        patch.start_time = args
            .start
            .as_deref()
            .map(|raw| parse_time_on(raw, time_base).map(Some))
            .transpose()
            .context("invalid --start")?;
        patch.end_time = args
            .end
            .as_deref()
            .map(|raw| parse_time_on(raw, time_base).map(Some))
            .transpose()
            .context("invalid --end")?;
    }
    if args.alert {
        patch.alert_enabled = Some(true);
    } else if args.no_alert {
        patch.alert_enabled = Some(false);
    }

    if patch.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    let task = service.update(&args.id, patch)?;
    println!("Updated task {}.", task.id);
    Ok(())
}

fn cmd_toggle<S: TaskService>(service: &S, id: &str, done: bool) -> anyhow::Result<()> {
    service.toggle_done(id, done)?;
    if done {
        println!("Completed task {id}.");
    } else {
        println!("Reopened task {id}.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Days, TimeZone, Utc};
    use clap::Parser;
    use tempfile::tempdir;

    use super::dispatch;
    use crate::cli::GlobalCli;
    use crate::config::Config;
    use crate::datekey::DateKey;
    use crate::datetime::to_project_date;
    use crate::render::Renderer;
    use crate::store::{TaskService, TaskStore};
    use crate::task::{NewTask, Priority};

    fn run_cli(store: &TaskStore, args: &[&str], now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
        let cli = GlobalCli::parse_from(std::iter::once("daymark").chain(args.iter().copied()));
        dispatch(store, &Config::default(), &Renderer::plain(), cli.command, now)
    }

    #[test]
    fn edit_date_expressions_are_relative_to_today() {
        let temp = tempdir().expect("tempdir");
        let store = TaskStore::open(temp.path()).expect("open store");
        let task = store
            .create(NewTask::new("Dentist", "2025-01-05".parse().expect("key"), Priority::Medium))
            .expect("create");

        let now = Utc
            .with_ymd_and_hms(2025, 10, 9, 3, 0, 0)
            .single()
            .expect("valid now");
        let today = to_project_date(now);
        let tomorrow = today.checked_add_days(Days::new(1)).expect("tomorrow");

        run_cli(&store, &["edit", task.id.as_str(), "--date", "tomorrow", "--start", "10:00"], now).expect("edit");

        let edited = store.list().expect("list").remove(0);
        assert_eq!(edited.date, DateKey::from_date(&tomorrow));
        let start = edited.start_time.expect("start time set");
        assert_eq!(to_project_date(start), tomorrow);

        run_cli(&store, &["edit", task.id.as_str(), "--date", "today"], now).expect("edit");
        let edited = store.list().expect("list").remove(0);
        assert_eq!(edited.date, DateKey::from_date(&today));
    }

    #[test]
    fn edit_without_date_keeps_clock_times_on_the_task_day() {
        let temp = tempdir().expect("tempdir");
        let store = TaskStore::open(temp.path()).expect("open store");
        let task = store
            .create(NewTask::new("Gym", "2025-01-05".parse().expect("key"), Priority::High))
            .expect("create");
        let now = Utc
            .with_ymd_and_hms(2025, 10, 9, 3, 0, 0)
            .single()
            .expect("valid now");

        run_cli(&store, &["edit", task.id.as_str(), "--start", "07:30"], now).expect("edit");

        let edited = store.list().expect("list").remove(0);
        assert_eq!(edited.date.as_str(), "2025-01-05");
        let start = edited.start_time.expect("start time set");
        assert_eq!(DateKey::from_instant(start).as_str(), "2025-01-05");
    }

    #[test]
    fn month_offsets_beyond_the_calendar_are_errors() {
        let temp = tempdir().expect("tempdir");
        let store = TaskStore::open(temp.path()).expect("open store");
        let now = Utc
            .with_ymd_and_hms(2025, 10, 9, 3, 0, 0)
            .single()
            .expect("valid now");

        let err = run_cli(&store, &["month", "--next", "4294967295"], now).expect_err("out of range");
        assert!(err.to_string().contains("month offset out of range"));
        run_cli(&store, &["month", "--prev", "4294967295"], now).expect_err("out of range");
        run_cli(&store, &["month", "--next", "14"], now).expect("in range");
    }
}
