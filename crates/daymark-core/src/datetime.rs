use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "daymark-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DAYMARK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DAYMARK_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "Asia/Seoul";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

fn relative_days_regex()
-> anyhow::Result<&'static Regex> {
  static RELATIVE_DAYS: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  RELATIVE_DAYS
    .get_or_init(|| {
      Regex::new(
        r"^(?P<sign>[+-])(?P<num>\d+)d$"
      )
    })
    .as_ref()
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })
}

/// The zone whose calendar fields define "local" dates.
pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

#[must_use]
pub fn format_project_time(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(project_timezone())
    .format("%H:%M")
    .to_string()
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn to_utc_from_local_in(
  tz: &Tz,
  local_naive: NaiveDateTime,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz.from_local_datetime(
    &local_naive
  ) {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in configured \
         timezone: {context}"
      ))
    }
  }
}

/// Resolves a date expression to a local calendar date.
///
/// Accepts `today`, `tomorrow`, `yesterday`, `YYYY-MM-DD`, `+Nd`/`-Nd`,
/// weekday names (next such day) and month names (the 1st of the next
/// such month).
#[tracing::instrument(fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Some(caps) =
    relative_days_regex()?
      .captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days =
      if sign == "-" { -num } else { num };
    return Duration::try_days(days)
      .and_then(|delta| {
        today.checked_add_signed(delta)
      })
      .ok_or_else(|| {
        anyhow!(
          "relative date out of \
           range: {token}"
        )
      });
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    let mut year = today.year();
    if target_month <= today.month() {
      year = year.saturating_add(1);
    }
    return NaiveDate::from_ymd_opt(
      year,
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year \
         candidate"
      )
    });
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     YYYY-MM-DD, +Nd/-Nd, weekday \
     names (e.g. monday), month \
     names (e.g. march)"
  })
}

/// Resolves a time expression on `date` in the project timezone.
///
/// Accepts clock times (`18:00`, `6:30pm`) or a full RFC 3339 instant,
/// in which case `date` is ignored.
pub fn parse_time_on(
  input: &str,
  date: NaiveDate
) -> anyhow::Result<DateTime<Utc>> {
  parse_time_on_in(
    project_timezone(),
    input,
    date
  )
}

pub fn parse_time_on_in(
  tz: &Tz,
  input: &str,
  date: NaiveDate
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  let (hour, minute) =
    parse_clock_time(token)
      .ok_or_else(|| {
        anyhow!(
          "unrecognized time \
           expression: {input} \
           (expected HH:MM, h:mmam/pm \
           or RFC3339)"
        )
      })?;
  let time = NaiveTime::from_hms_opt(
    hour, minute, 0
  )
  .ok_or_else(|| {
    anyhow!(
      "invalid clock time: {input}"
    )
  })?;
  to_utc_from_local_in(
    tz,
    date.and_time(time),
    "clock-time"
  )
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let clock_re = Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
  )
  .ok()?;
  let captures =
    clock_re.captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    let ampm = ampm_match
      .as_str()
      .to_ascii_lowercase();
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match (ampm.as_str(), raw_hour) {
      | ("am", 12) => 0,
      | ("am", h) => h,
      | ("pm", 12) => 12,
      | ("pm", h) => h + 12,
      | _ => return None
    }
  } else {
    if raw_hour > 23 {
      return None;
    }
    raw_hour
  };

  Some((hour, minute))
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    parse_date_expr,
    parse_time_on_in
  };

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_relative_words() {
    let today = ymd(2026, 2, 28);
    assert_eq!(
      parse_date_expr("tomorrow", today)
        .expect("parse tomorrow"),
      ymd(2026, 3, 1)
    );
    assert_eq!(
      parse_date_expr("-3d", today)
        .expect("parse offset"),
      ymd(2026, 2, 25)
    );
    assert_eq!(
      parse_date_expr("+1d", today)
        .expect("parse offset"),
      ymd(2026, 3, 1)
    );
  }

  #[test]
  fn parses_weekday_name() {
    let today = ymd(2026, 2, 17);
    assert_eq!(
      parse_date_expr("wednesday", today)
        .expect("parse weekday"),
      ymd(2026, 2, 18)
    );
    assert_eq!(
      parse_date_expr("tue", today)
        .expect("parse weekday"),
      ymd(2026, 2, 24)
    );
  }

  #[test]
  fn parses_month_name() {
    let today = ymd(2026, 2, 17);
    assert_eq!(
      parse_date_expr("march", today)
        .expect("parse month"),
      ymd(2026, 3, 1)
    );
    assert_eq!(
      parse_date_expr("feb", today)
        .expect("parse month"),
      ymd(2027, 2, 1)
    );
    assert_eq!(
      parse_date_expr(
        "october",
        ymd(2025, 10, 1)
      )
      .expect("parse month"),
      ymd(2026, 10, 1)
    );
  }

  #[test]
  fn huge_relative_offsets_are_errors() {
    let today = ymd(2025, 10, 1);
    for expr in [
      "+999999999999999d",
      "-999999999999999d",
      "+9223372036854775807d",
      "+100000000d"
    ] {
      let err = parse_date_expr(expr, today)
        .expect_err("out of range");
      assert!(
        err
          .to_string()
          .contains("out of range"),
        "{expr}: {err}"
      );
    }
    assert_eq!(
      parse_date_expr("+365d", today)
        .expect("parse offset"),
      ymd(2026, 10, 1)
    );
  }

  #[test]
  fn rejects_unknown_expressions() {
    assert!(
      parse_date_expr(
        "someday",
        ymd(2026, 2, 17)
      )
      .is_err()
    );
  }

  #[test]
  fn clock_times_resolve_in_zone() {
    let seoul: chrono_tz::Tz =
      "Asia/Seoul"
        .parse()
        .expect("valid zone");
    let start = parse_time_on_in(
      &seoul,
      "6:30pm",
      ymd(2025, 10, 9)
    )
    .expect("parse clock time");
    assert_eq!(
      start.to_rfc3339(),
      "2025-10-09T09:30:00+00:00"
    );

    let rfc = parse_time_on_in(
      &seoul,
      "2025-10-09T09:00:00Z",
      ymd(2000, 1, 1)
    )
    .expect("parse rfc3339");
    assert_eq!(
      rfc.to_rfc3339(),
      "2025-10-09T09:00:00+00:00"
    );

    assert!(
      parse_time_on_in(
        &seoul,
        "25:00",
        ymd(2025, 10, 9)
      )
      .is_err()
    );
  }
}
