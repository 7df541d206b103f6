use chrono::{
  Datelike,
  Days,
  NaiveDate
};
use serde::Serialize;

use crate::datekey::DateKey;

pub const WEEKDAY_LABELS: [&str; 7] = [
  "SUN", "MON", "TUE", "WED", "THU",
  "FRI", "SAT"
];

const DAYS_PER_WEEK: usize = 7;
const SHORT_GRID_CELLS: usize = 35;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct DayCell {
  pub date:             NaiveDate,
  pub in_current_month: bool,
  pub is_today:         bool
}

impl DayCell {
  #[must_use]
  pub fn key(&self) -> DateKey {
    DateKey::from_date(&self.date)
  }
}

/// Builds the Sunday-first grid of day cells for the month containing
/// `reference`.
///
/// The grid is 5 weeks when the month's leading padding plus its days
/// fit in 35 cells and 6 weeks otherwise. Only the year, month and
/// day-of-month of `reference` and `today` are read, so any time-of-day
/// component is irrelevant.
#[must_use]
pub fn build_month_matrix<R, T>(
  reference: &R,
  today: &T
) -> Vec<DayCell>
where
  R: Datelike,
  T: Datelike
{
  let year = reference.year();
  let month = reference.month();

  let Some(first) =
    NaiveDate::from_ymd_opt(
      year, month, 1
    )
  else {
    tracing::warn!(
      year,
      month,
      "reference month has no first \
       day; returning empty grid"
    );
    return Vec::new();
  };

  let leading = first
    .weekday()
    .num_days_from_sunday()
    as usize;
  let month_days =
    days_in_month(year, month) as usize;
  let needed = leading + month_days;
  let weeks =
    if needed <= SHORT_GRID_CELLS {
      5
    } else {
      6
    };
  let total = weeks * DAYS_PER_WEEK;

  let Some(grid_start) = first
    .checked_sub_days(Days::new(
      leading as u64
    ))
  else {
    tracing::warn!(
      %first,
      leading,
      "grid start underflows the \
       calendar; returning empty grid"
    );
    return Vec::new();
  };

  let cells = grid_start
    .iter_days()
    .take(total)
    .map(|date| {
      DayCell {
        date,
        in_current_month: date.year()
          == year
          && date.month() == month,
        is_today: same_calendar_day(
          &date, today
        )
      }
    })
    .collect::<Vec<_>>();

  tracing::trace!(
    year,
    month,
    leading,
    month_days,
    weeks,
    cells = cells.len(),
    "built month matrix"
  );
  cells
}

/// A rendered month: the target year/month plus its grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthView {
  pub year:  i32,
  pub month: u32,
  pub today: NaiveDate,
  pub cells: Vec<DayCell>
}

impl MonthView {
  #[must_use]
  pub fn build(
    reference: NaiveDate,
    today: NaiveDate
  ) -> Self {
    Self {
      year: reference.year(),
      month: reference.month(),
      today,
      cells: build_month_matrix(
        &reference, &today
      )
    }
  }

  /// Rebuilds the view `months` away from this one.
  #[must_use]
  pub fn shifted(
    &self,
    months: i64
  ) -> Option<Self> {
    let anchor = first_day_of_month(
      self.year, self.month
    );
    shift_month(anchor, months).map(
      |reference| {
        Self::build(reference, self.today)
      }
    )
  }

  pub fn weeks(
    &self
  ) -> impl Iterator<Item = &[DayCell]>
  {
    self.cells.chunks(DAYS_PER_WEEK)
  }

  #[must_use]
  pub fn label(&self) -> String {
    first_day_of_month(
      self.year, self.month
    )
    .format("%B %Y")
    .to_string()
  }
}

/// Moves `date` by whole months, clamping the day to the target
/// month's length (Jan 31 + 1 month is Feb 28/29). `None` when the
/// target falls outside chrono's representable years.
#[must_use]
pub fn shift_month(
  date: NaiveDate,
  months: i64
) -> Option<NaiveDate> {
  let total = i64::from(date.year())
    .checked_mul(12)?
    .checked_add(i64::from(
      date.month0()
    ))?
    .checked_add(months)?;

  let year = i32::try_from(
    total.div_euclid(12)
  )
  .ok()?;
  let month =
    u32::try_from(total.rem_euclid(12))
      .ok()?
      + 1;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  first_day_of_month(
    next_year, next_month
  )
  .pred_opt()
  .map(|last| last.day())
  .unwrap_or(31)
}

fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

fn same_calendar_day<A, B>(
  a: &A,
  b: &B
) -> bool
where
  A: Datelike,
  B: Datelike
{
  a.year() == b.year()
    && a.month() == b.month()
    && a.day() == b.day()
}
