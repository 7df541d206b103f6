use std::io::{self, IsTerminal, Write};

use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use crate::agenda::Agenda;
use crate::calendar::{MonthView, WEEKDAY_LABELS};
use crate::config::Config;
use crate::datekey::DateKey;
use crate::datetime::format_project_time;
use crate::index::TaskDateIndex;
use crate::progress::Progress;
use crate::reminder::Reminder;
use crate::task::Task;

const PROGRESS_BAR_WIDTH: usize = 20;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true) && io::stdout().is_terminal();
        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, view, index), fields(year = view.year, month = view.month))]
    pub fn print_month(&self, view: &MonthView, index: &TaskDateIndex<'_>) -> anyhow::Result<()> {
        self.write_month(io::stdout().lock(), view, index)
    }

    /// Draws the grid: one 5-column cell per day, the day's marker letter
    /// after the number, today in brackets.
    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        view: &MonthView,
        index: &TaskDateIndex<'_>,
    ) -> anyhow::Result<()> {
        let label = view.label();
        writeln!(out, "{:^35}", label)?;

        for name in WEEKDAY_LABELS {
            write!(out, " {name:<3} ")?;
        }
        writeln!(out)?;

        for week in view.weeks() {
            for cell in week {
                let marker = index.marker_on(&cell.key());
                let letter = marker
                    .map(|p| self.paint(&p.as_str()[..1], p.ansi_code()))
                    .unwrap_or_else(|| " ".to_string());
                let day = format!("{:>2}", cell.date.day());
                let day = if cell.in_current_month {
                    day
                } else {
                    self.paint(&day, "2")
                };

                if cell.is_today {
                    write!(out, "[{day}{letter}]")?;
                } else {
                    write!(out, " {day}{letter} ")?;
                }
            }
            writeln!(out)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, tasks, progress))]
    pub fn print_day(&self, key: &DateKey, tasks: &[&Task], progress: Progress) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{key} ({} tasks)", tasks.len())?;
        writeln!(out, "{}", self.progress_line(progress))?;
        if tasks.is_empty() {
            writeln!(out, "No tasks on this day.")?;
            return Ok(());
        }
        writeln!(out)?;
        self.write_task_rows(&mut out, tasks, false)
    }

    #[tracing::instrument(skip(self, agenda))]
    pub fn print_agenda(&self, agenda: &Agenda<'_>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "You have {} tasks in total to complete", agenda.total())?;
        writeln!(out)?;
        writeln!(out, "Daily Task Progress")?;
        writeln!(out, "{}", self.progress_line(agenda.progress))?;

        for (heading, key, tasks) in [
            ("Today", &agenda.today_key, &agenda.today),
            ("Tomorrow", &agenda.tomorrow_key, &agenda.tomorrow),
        ] {
            writeln!(out)?;
            writeln!(out, "{heading}'s tasks ({key})")?;
            if tasks.is_empty() {
                writeln!(out, "No tasks for {}.", heading.to_ascii_lowercase())?;
            } else {
                self.write_task_rows(&mut out, tasks, false)?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, index))]
    pub fn print_task_list(&self, index: &TaskDateIndex<'_>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let tasks = index.groups().values().flatten().copied().collect::<Vec<_>>();
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }
        self.write_task_rows(&mut out, &tasks, true)
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "date      {}", task.date)?;
        writeln!(out, "priority  {}", self.paint(task.priority.as_str(), task.priority.ansi_code()))?;
        writeln!(out, "done      {}", if task.done { "yes" } else { "no" })?;
        writeln!(out, "alert     {}", if task.alert_enabled { "on" } else { "off" })?;

        if let Some(start) = task.start_time {
            writeln!(out, "start     {}", start.to_rfc3339())?;
        }
        if let Some(end) = task.end_time {
            writeln!(out, "end       {}", end.to_rfc3339())?;
        }
        if let Some(content) = &task.content {
            writeln!(out, "content   {content}")?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, reminders))]
    pub fn print_reminders(&self, reminders: &[Reminder]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if reminders.is_empty() {
            writeln!(out, "No reminders to schedule.")?;
            return Ok(());
        }

        let headers = vec!["When".to_string(), "Task".to_string(), "Message".to_string()];
        let rows = reminders
            .iter()
            .map(|reminder| {
                vec![
                    reminder.trigger_at.to_rfc3339(),
                    short_id(&reminder.task_id),
                    format!("{}: {}", reminder.title, reminder.body),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    pub fn progress_line(&self, progress: Progress) -> String {
        let filled = ((progress.ratio * PROGRESS_BAR_WIDTH as f64).round() as usize).min(PROGRESS_BAR_WIDTH);
        let bar = format!(
            "{}{}",
            "#".repeat(filled),
            "-".repeat(PROGRESS_BAR_WIDTH - filled)
        );
        format!(
            "[{}] {:>3}% ({}/{} completed)",
            self.paint(&bar, "35"),
            progress.percent(),
            progress.completed,
            progress.total
        )
    }

    fn write_task_rows<W: Write>(&self, out: &mut W, tasks: &[&Task], with_date: bool) -> anyhow::Result<()> {
        let mut headers = vec![
            "ID".to_string(),
            "Pri".to_string(),
            "Done".to_string(),
            "Time".to_string(),
            "Title".to_string(),
        ];
        if with_date {
            headers.insert(0, "Date".to_string());
        }

        let rows = tasks
            .iter()
            .map(|task| {
                let mut row = vec![
                    self.paint(&short_id(&task.id), "33"),
                    self.paint(task.priority.as_str(), task.priority.ansi_code()),
                    if task.done { "x".to_string() } else { String::new() },
                    time_window(task),
                    task.title.clone(),
                ];
                if with_date {
                    row.insert(0, task.date.to_string());
                }
                row
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn time_window(task: &Task) -> String {
    match (task.start_time, task.end_time) {
        (Some(start), Some(end)) => format!("{}-{}", format_project_time(start), format_project_time(end)),
        (Some(start), None) => format_project_time(start),
        (None, Some(end)) => format!("-{}", format_project_time(end)),
        (None, None) => String::new(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
