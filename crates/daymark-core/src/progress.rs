use serde::Serialize;

use crate::task::Task;

/// Completion counts for a set of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub ratio: f64,
}

impl Progress {
    pub const EMPTY: Progress = Progress {
        completed: 0,
        total: 0,
        ratio: 0.0,
    };

    fn from_counts(completed: usize, total: usize) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        Self {
            completed,
            total,
            ratio,
        }
    }

    /// Whole-number percentage, rounded half away from zero.
    pub fn percent(&self) -> u32 {
        (self.ratio * 100.0).round() as u32
    }
}

pub fn progress_for<'a, I>(tasks: I) -> Progress
where
    I: IntoIterator<Item = &'a Task>,
{
    let (completed, total) = tasks
        .into_iter()
        .fold((0usize, 0usize), |(done, total), task| {
            (done + usize::from(task.done), total + 1)
        });
    Progress::from_counts(completed, total)
}
