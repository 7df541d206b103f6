use chrono::{Days, NaiveDate};

use crate::datekey::DateKey;
use crate::index::TaskDateIndex;
use crate::progress::Progress;
use crate::task::Task;

/// Today's and tomorrow's tasks with their combined progress.
#[derive(Debug, Clone)]
pub struct Agenda<'a> {
    pub today_key: DateKey,
    pub tomorrow_key: DateKey,
    pub today: Vec<&'a Task>,
    pub tomorrow: Vec<&'a Task>,
    pub progress: Progress,
}

pub fn agenda<'a>(index: &TaskDateIndex<'a>, today: NaiveDate) -> Agenda<'a> {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let today_key = DateKey::from_date(&today);
    let tomorrow_key = DateKey::from_date(&tomorrow);

    let progress = if today_key == tomorrow_key {
        index.progress_on(&today_key)
    } else {
        index.progress_across([&today_key, &tomorrow_key])
    };

    Agenda {
        today: index.tasks_on(&today_key).to_vec(),
        tomorrow: index.tasks_on(&tomorrow_key).to_vec(),
        today_key,
        tomorrow_key,
        progress,
    }
}

impl Agenda<'_> {
    pub fn total(&self) -> usize {
        self.today.len() + self.tomorrow.len()
    }
}
